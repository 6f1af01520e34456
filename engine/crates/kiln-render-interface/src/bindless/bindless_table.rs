use std::rc::Rc;

use ash::vk;
use kiln_gfx::descriptors::descriptor_set::{
    GfxDescriptorBinding, GfxDescriptorPoolDesc, GfxDescriptorSetLayoutDesc, GfxWriteDescriptorSet,
};
use kiln_gfx::foundation::GfxDevice;
use kiln_gfx::{GfxError, GfxResult, profile_scope};

use crate::bindless::error::{BindlessError, BindlessResult};
use crate::bindless::handles::{BindlessBufferHandle, BindlessBufferKind, BindlessSlotKind, BindlessTextureHandle};
use crate::bindless::slot_arena::BindlessSlotArena;
use crate::frame_counter::{FrameCounter, FrameLabel};
use crate::render_settings::BindlessSettings;

/// 纹理 slot 中保存的 view 和 sampler
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BindlessTextureEntry {
    pub image_view: vk::ImageView,
    pub sampler: vk::Sampler,
}

/// buffer slot 中保存的 buffer 区间
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BindlessBufferEntry {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub range: vk::DeviceSize,
}

/// Bindless 描述符表
///
/// 固定容量的 slot 分配器，把句柄映射到原始的 GPU 资源 view，
/// 着色器通过数组索引访问资源。
///
/// # Bindless 架构
/// - Binding 0: 纹理数组（COMBINED_IMAGE_SAMPLER）
/// - Binding 1: 存储缓冲数组（STORAGE_BUFFER）
/// - Binding 2: uniform 缓冲数组（UNIFORM_BUFFER）
/// - 着色器通过索引访问：`textures[index]`
///
/// 每个 frame in flight 有独立的描述符集。注册/注销只修改 CPU 端的 slot，
/// 描述符集在 [`Self::update_descriptor_set`] 中只在过期时整体重写，
/// 未使用的 slot 写入 null descriptor。
///
/// # 使用示例
/// ```ignore
/// let handle = bindless.register_texture(view, sampler)?;
/// bindless.update_descriptor_set(frame_label);
/// // 在着色器中: textures[handle.index()]
/// ```
pub struct BindlessTable {
    device: Rc<dyn GfxDevice>,

    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    descriptor_sets: [vk::DescriptorSet; FrameCounter::fif_count()],
    update_after_bind: bool,

    textures: BindlessSlotArena<BindlessTextureEntry>,
    storage_buffers: BindlessSlotArena<BindlessBufferEntry>,
    uniform_buffers: BindlessSlotArena<BindlessBufferEntry>,

    /// null 纹理 descriptor 使用的 sampler
    fallback_sampler: vk::Sampler,

    /// 每次注册/注销都会递增
    generation: u64,
    /// 每个 frame 的描述符集最后一次写入时的 generation
    written_generation: [Option<u64>; FrameCounter::fif_count()],
}

// new & init
impl BindlessTable {
    const TEXTURE_BINDING: u32 = 0;
    const STORAGE_BUFFER_BINDING: u32 = 1;
    const UNIFORM_BUFFER_BINDING: u32 = 2;

    pub fn new(device: Rc<dyn GfxDevice>, settings: BindlessSettings) -> BindlessResult<Self> {
        let (layout, update_after_bind) = Self::create_layout(device.as_ref(), &settings)?;

        let pool = match Self::create_pool(device.as_ref(), &settings, update_after_bind) {
            Ok(pool) => pool,
            Err(e) => {
                device.destroy_descriptor_set_layout(layout);
                return Err(e.into());
            }
        };

        let layouts = [layout; FrameCounter::fif_count()];
        let descriptor_sets = device.allocate_descriptor_sets(pool, &layouts).and_then(|sets| {
            <[vk::DescriptorSet; FrameCounter::fif_count()]>::try_from(sets).map_err(|_| GfxError::Vulkan {
                call: "vkAllocateDescriptorSets",
                result: vk::Result::ERROR_OUT_OF_POOL_MEMORY,
            })
        });
        let descriptor_sets = match descriptor_sets {
            Ok(sets) => sets,
            Err(e) => {
                device.destroy_descriptor_pool(pool);
                device.destroy_descriptor_set_layout(layout);
                return Err(e.into());
            }
        };

        log::info!(
            "create bindless table: {} textures, {} storage buffers, {} uniform buffers, update after bind: {}",
            settings.max_textures,
            settings.max_storage_buffers,
            settings.max_uniform_buffers,
            update_after_bind
        );

        Ok(Self {
            device,
            layout,
            pool,
            descriptor_sets,
            update_after_bind,
            textures: BindlessSlotArena::new(settings.max_textures),
            storage_buffers: BindlessSlotArena::new(settings.max_storage_buffers),
            uniform_buffers: BindlessSlotArena::new(settings.max_uniform_buffers),
            fallback_sampler: vk::Sampler::null(),
            generation: 0,
            written_generation: [None; FrameCounter::fif_count()],
        })
    }

    fn layout_desc(settings: &BindlessSettings, update_after_bind: bool) -> GfxDescriptorSetLayoutDesc {
        let (layout_flags, binding_flags) = if update_after_bind {
            (
                vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL,
                vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND,
            )
        } else {
            (vk::DescriptorSetLayoutCreateFlags::empty(), vk::DescriptorBindingFlags::PARTIALLY_BOUND)
        };

        let binding = |binding, ty, count| {
            GfxDescriptorBinding::new(binding, ty, count, vk::ShaderStageFlags::ALL).binding_flags(binding_flags)
        };

        GfxDescriptorSetLayoutDesc {
            name: "bindless-layout".to_string(),
            flags: layout_flags,
            bindings: vec![
                binding(Self::TEXTURE_BINDING, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, settings.max_textures),
                binding(Self::STORAGE_BUFFER_BINDING, vk::DescriptorType::STORAGE_BUFFER, settings.max_storage_buffers),
                binding(Self::UNIFORM_BUFFER_BINDING, vk::DescriptorType::UNIFORM_BUFFER, settings.max_uniform_buffers),
            ],
        }
    }

    /// 优先使用 UPDATE_AFTER_BIND，不支持时退回到只有 PARTIALLY_BOUND
    fn create_layout(
        device: &dyn GfxDevice,
        settings: &BindlessSettings,
    ) -> BindlessResult<(vk::DescriptorSetLayout, bool)> {
        match device.create_descriptor_set_layout(&Self::layout_desc(settings, true)) {
            Ok(layout) => Ok((layout, true)),
            Err(e) => {
                log::warn!("bindless layout with update-after-bind is not supported ({}), fallback", e);
                let layout = device.create_descriptor_set_layout(&Self::layout_desc(settings, false))?;
                Ok((layout, false))
            }
        }
    }

    fn create_pool(
        device: &dyn GfxDevice,
        settings: &BindlessSettings,
        update_after_bind: bool,
    ) -> GfxResult<vk::DescriptorPool> {
        let fif_count = FrameCounter::fif_count() as u32;
        device.create_descriptor_pool(&GfxDescriptorPoolDesc {
            name: "bindless-pool".to_string(),
            flags: if update_after_bind {
                vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND
            } else {
                vk::DescriptorPoolCreateFlags::empty()
            },
            max_sets: fif_count,
            pool_sizes: vec![
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: settings.max_textures * fif_count,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::STORAGE_BUFFER,
                    descriptor_count: settings.max_storage_buffers * fif_count,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: settings.max_uniform_buffers * fif_count,
                },
            ],
        })
    }
}

// destroy
impl Drop for BindlessTable {
    fn drop(&mut self) {
        log::info!("Dropping BindlessTable");
        self.device.destroy_descriptor_pool(self.pool);
        self.device.destroy_descriptor_set_layout(self.layout);
    }
}

// register & unregister
impl BindlessTable {
    pub fn register_texture(
        &mut self,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> BindlessResult<BindlessTextureHandle> {
        if image_view == vk::ImageView::null() {
            return Err(BindlessError::InvalidResource {
                kind: BindlessSlotKind::Texture,
                reason: "image view is null",
            });
        }
        // 未指定 sampler 时使用 fallback sampler
        let sampler = if sampler != vk::Sampler::null() {
            sampler
        } else if self.fallback_sampler != vk::Sampler::null() {
            self.fallback_sampler
        } else {
            return Err(BindlessError::InvalidResource {
                kind: BindlessSlotKind::Texture,
                reason: "sampler is null and no fallback sampler is set",
            });
        };

        let Some((index, generation)) = self.textures.allocate(BindlessTextureEntry { image_view, sampler }) else {
            log::error!("bindless texture slots exhausted, capacity: {}", self.textures.capacity());
            return Err(BindlessError::SlotsExhausted {
                kind: BindlessSlotKind::Texture,
                capacity: self.textures.capacity(),
            });
        };

        self.mark_dirty();
        log::debug!("bindless register texture {:?} at {}", image_view, index);
        Ok(BindlessTextureHandle::new(index, generation))
    }

    pub fn unregister_texture(&mut self, handle: BindlessTextureHandle) -> BindlessResult<()> {
        if self.textures.free(handle.index(), handle.generation()).is_none() {
            log::error!("unregister invalid bindless texture handle: {}", handle.index());
            return Err(BindlessError::InvalidHandle {
                kind: BindlessSlotKind::Texture,
                index: handle.index(),
            });
        }
        self.mark_dirty();
        Ok(())
    }

    pub fn register_buffer(
        &mut self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
        kind: BindlessBufferKind,
    ) -> BindlessResult<BindlessBufferHandle> {
        let slot_kind = kind.slot_kind();
        if buffer == vk::Buffer::null() {
            return Err(BindlessError::InvalidResource {
                kind: slot_kind,
                reason: "buffer is null",
            });
        }
        if range == 0 {
            return Err(BindlessError::InvalidResource {
                kind: slot_kind,
                reason: "buffer range is zero",
            });
        }

        let arena = self.buffer_arena_mut(kind);
        let Some((index, generation)) = arena.allocate(BindlessBufferEntry { buffer, offset, range }) else {
            let capacity = arena.capacity();
            log::error!("bindless {} slots exhausted, capacity: {}", slot_kind, capacity);
            return Err(BindlessError::SlotsExhausted {
                kind: slot_kind,
                capacity,
            });
        };

        self.mark_dirty();
        log::debug!("bindless register {} {:?} at {}", slot_kind, buffer, index);
        Ok(BindlessBufferHandle::new(index, generation, kind))
    }

    pub fn unregister_buffer(&mut self, handle: BindlessBufferHandle) -> BindlessResult<()> {
        let kind = handle.kind();
        if self.buffer_arena_mut(kind).free(handle.index(), handle.generation()).is_none() {
            log::error!("unregister invalid bindless {} handle: {}", kind.slot_kind(), handle.index());
            return Err(BindlessError::InvalidHandle {
                kind: kind.slot_kind(),
                index: handle.index(),
            });
        }
        self.mark_dirty();
        Ok(())
    }

    /// 释放所有 slot，之前的句柄全部失效
    pub fn clear(&mut self) {
        self.textures.clear();
        self.storage_buffers.clear();
        self.uniform_buffers.clear();
        self.mark_dirty();
    }

    /// null 纹理 descriptor 使用的 sampler，需要在 table 销毁前保持有效
    pub fn set_fallback_sampler(&mut self, sampler: vk::Sampler) {
        self.fallback_sampler = sampler;
        self.mark_dirty();
    }

    #[inline]
    fn mark_dirty(&mut self) {
        self.generation += 1;
    }

    #[inline]
    fn buffer_arena_mut(&mut self, kind: BindlessBufferKind) -> &mut BindlessSlotArena<BindlessBufferEntry> {
        match kind {
            BindlessBufferKind::Storage => &mut self.storage_buffers,
            BindlessBufferKind::Uniform => &mut self.uniform_buffers,
        }
    }

    #[inline]
    fn buffer_arena(&self, kind: BindlessBufferKind) -> &BindlessSlotArena<BindlessBufferEntry> {
        match kind {
            BindlessBufferKind::Storage => &self.storage_buffers,
            BindlessBufferKind::Uniform => &self.uniform_buffers,
        }
    }
}

// update
impl BindlessTable {
    /// # Phase: Before Render
    ///
    /// 当前 frame 的描述符集过期时整体重写，返回是否进行了写入
    pub fn update_descriptor_set(&mut self, frame_label: FrameLabel) -> bool {
        if !self.is_dirty(frame_label) {
            return false;
        }
        self.rebuild_descriptor_set(frame_label);
        true
    }

    /// 无条件重写当前 frame 的描述符集
    pub fn rebuild_descriptor_set(&mut self, frame_label: FrameLabel) {
        profile_scope!("BindlessTable::rebuild_descriptor_set");

        let dst_set = self.descriptor_sets[*frame_label];

        let null_image = vk::DescriptorImageInfo {
            sampler: self.fallback_sampler,
            image_view: vk::ImageView::null(),
            image_layout: vk::ImageLayout::UNDEFINED,
        };
        let image_infos = self
            .textures
            .iter_all()
            .map(|entry| match entry {
                Some(entry) => vk::DescriptorImageInfo {
                    sampler: entry.sampler,
                    image_view: entry.image_view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
                None => null_image,
            })
            .collect::<Vec<_>>();

        let writes = [
            GfxWriteDescriptorSet::images(
                dst_set,
                Self::TEXTURE_BINDING,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                image_infos,
            ),
            GfxWriteDescriptorSet::buffers(
                dst_set,
                Self::STORAGE_BUFFER_BINDING,
                vk::DescriptorType::STORAGE_BUFFER,
                Self::buffer_infos(&self.storage_buffers),
            ),
            GfxWriteDescriptorSet::buffers(
                dst_set,
                Self::UNIFORM_BUFFER_BINDING,
                vk::DescriptorType::UNIFORM_BUFFER,
                Self::buffer_infos(&self.uniform_buffers),
            ),
        ];
        self.device.write_descriptor_sets(&writes);

        self.written_generation[*frame_label] = Some(self.generation);
        log::debug!(
            "rebuild bindless descriptor set {}: {} textures, {} storage buffers, {} uniform buffers",
            frame_label,
            self.textures.live_count(),
            self.storage_buffers.live_count(),
            self.uniform_buffers.live_count()
        );
    }

    /// 未使用的 slot 写入 null buffer，range 必须为 WHOLE_SIZE
    fn buffer_infos(arena: &BindlessSlotArena<BindlessBufferEntry>) -> Vec<vk::DescriptorBufferInfo> {
        arena
            .iter_all()
            .map(|entry| match entry {
                Some(entry) => vk::DescriptorBufferInfo {
                    buffer: entry.buffer,
                    offset: entry.offset,
                    range: entry.range,
                },
                None => vk::DescriptorBufferInfo {
                    buffer: vk::Buffer::null(),
                    offset: 0,
                    range: vk::WHOLE_SIZE,
                },
            })
            .collect()
    }
}

// getters
impl BindlessTable {
    #[inline]
    pub fn is_dirty(&self, frame_label: FrameLabel) -> bool {
        self.written_generation[*frame_label] != Some(self.generation)
    }

    #[inline]
    pub fn descriptor_set(&self, frame_label: FrameLabel) -> vk::DescriptorSet {
        self.descriptor_sets[*frame_label]
    }

    #[inline]
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    #[inline]
    pub fn uses_update_after_bind(&self) -> bool {
        self.update_after_bind
    }

    #[inline]
    pub fn texture(&self, handle: BindlessTextureHandle) -> Option<&BindlessTextureEntry> {
        self.textures.get(handle.index(), handle.generation())
    }

    #[inline]
    pub fn buffer(&self, handle: BindlessBufferHandle) -> Option<&BindlessBufferEntry> {
        self.buffer_arena(handle.kind()).get(handle.index(), handle.generation())
    }

    #[inline]
    pub fn texture_count(&self) -> u32 {
        self.textures.live_count()
    }

    #[inline]
    pub fn buffer_count(&self, kind: BindlessBufferKind) -> u32 {
        self.buffer_arena(kind).live_count()
    }

    #[inline]
    pub fn texture_capacity(&self) -> u32 {
        self.textures.capacity()
    }

    #[inline]
    pub fn buffer_capacity(&self, kind: BindlessBufferKind) -> u32 {
        self.buffer_arena(kind).capacity()
    }
}
