//! Pass 级别的 barrier 描述
//!
//! 帧图在执行每个 pass 之前计算它需要的所有 barrier，
//! 然后合并到一次 `vkCmdPipelineBarrier2` 中。

use ash::vk;
use kiln_gfx::commands::barrier::{GfxBufferBarrier, GfxDependencyInfo, GfxImageBarrier};

use crate::frame_graph::handle::FgResourceHandle;
use crate::frame_graph::resource_state::FgResourceState;

/// 图像 barrier 描述
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FgImageBarrierDesc {
    pub handle: FgResourceHandle,
    pub image: vk::Image,
    pub aspect: vk::ImageAspectFlags,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub src_state: FgResourceState,
    pub dst_state: FgResourceState,
}

impl FgImageBarrierDesc {
    /// 覆盖整个 image 的 barrier
    pub fn to_gfx_barrier(&self) -> GfxImageBarrier {
        GfxImageBarrier::new()
            .image(self.image)
            .layout_transfer(self.src_state.layout, self.dst_state.layout)
            .src_mask(self.src_state.stage, self.src_state.src_access())
            .dst_mask(self.dst_state.stage, self.dst_state.access)
            .subresource_range(self.aspect, self.mip_levels, self.array_layers)
    }
}

/// 缓冲区 barrier 描述，覆盖整个 buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FgBufferBarrierDesc {
    pub handle: FgResourceHandle,
    pub buffer: vk::Buffer,
    pub src_state: FgResourceState,
    pub dst_state: FgResourceState,
}

impl FgBufferBarrierDesc {
    pub fn to_gfx_barrier(&self) -> GfxBufferBarrier {
        GfxBufferBarrier::new()
            .buffer(self.buffer, 0, vk::WHOLE_SIZE)
            .src_mask(self.src_state.stage, self.src_state.src_access())
            .dst_mask(self.dst_state.stage, self.dst_state.access)
    }
}

/// Pass 执行前需要的 barrier 集合
#[derive(Clone, Debug, Default)]
pub struct FgPassBarriers {
    pub image_barriers: Vec<FgImageBarrierDesc>,
    pub buffer_barriers: Vec<FgBufferBarrierDesc>,
}

impl FgPassBarriers {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn has_barriers(&self) -> bool {
        !self.image_barriers.is_empty() || !self.buffer_barriers.is_empty()
    }

    #[inline]
    pub fn image_barrier_count(&self) -> usize {
        self.image_barriers.len()
    }

    #[inline]
    pub fn buffer_barrier_count(&self) -> usize {
        self.buffer_barriers.len()
    }

    /// 转换为一次 pipeline barrier 调用的参数
    pub fn to_dependency_info(&self) -> GfxDependencyInfo {
        GfxDependencyInfo {
            memory_barriers: Vec::new(),
            buffer_barriers: self.buffer_barriers.iter().map(FgBufferBarrierDesc::to_gfx_barrier).collect(),
            image_barriers: self.image_barriers.iter().map(FgImageBarrierDesc::to_gfx_barrier).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;
    use slotmap::SlotMap;

    use super::*;

    #[test]
    fn test_image_barrier_conversion() {
        let mut sm: SlotMap<FgResourceHandle, ()> = SlotMap::with_key();
        let handle = sm.insert(());

        let desc = FgImageBarrierDesc {
            handle,
            image: vk::Image::from_raw(7),
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: 4,
            array_layers: 2,
            src_state: FgResourceState::STORAGE_IMAGE,
            dst_state: FgResourceState::SHADER_READ_FRAGMENT,
        };

        let barrier = desc.to_gfx_barrier();
        let inner = barrier.inner();
        assert_eq!(inner.image, vk::Image::from_raw(7));
        assert_eq!(inner.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(inner.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        // src 只保留写访问
        assert_eq!(inner.src_access_mask, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(inner.dst_access_mask, vk::AccessFlags2::SHADER_SAMPLED_READ);
        assert_eq!(inner.subresource_range.level_count, 4);
        assert_eq!(inner.subresource_range.layer_count, 2);
    }

    #[test]
    fn test_dependency_info_batches_all_barriers() {
        let mut sm: SlotMap<FgResourceHandle, ()> = SlotMap::with_key();
        let image_handle = sm.insert(());
        let buffer_handle = sm.insert(());

        let mut barriers = FgPassBarriers::new();
        assert!(!barriers.has_barriers());

        barriers.image_barriers.push(FgImageBarrierDesc {
            handle: image_handle,
            image: vk::Image::from_raw(1),
            aspect: vk::ImageAspectFlags::DEPTH,
            mip_levels: 1,
            array_layers: 1,
            src_state: FgResourceState::UNDEFINED,
            dst_state: FgResourceState::DEPTH_ATTACHMENT_WRITE,
        });
        barriers.buffer_barriers.push(FgBufferBarrierDesc {
            handle: buffer_handle,
            buffer: vk::Buffer::from_raw(2),
            src_state: FgResourceState::STORAGE_BUFFER,
            dst_state: FgResourceState::INDIRECT_BUFFER,
        });

        let info = barriers.to_dependency_info();
        assert!(barriers.has_barriers());
        assert_eq!(info.barrier_count(), 2);
        assert_eq!(info.buffer_barriers[0].inner().size, vk::WHOLE_SIZE);
        assert_eq!(info.buffer_barriers[0].inner().dst_access_mask, vk::AccessFlags2::INDIRECT_COMMAND_READ);
    }
}
