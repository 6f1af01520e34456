use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::ptr::NonNull;

use ash::vk;
use ash::vk::Handle;

use crate::descriptors::descriptor_set::{GfxDescriptorPoolDesc, GfxDescriptorSetLayoutDesc, GfxWriteDescriptorSet};
use crate::error::{GfxError, GfxResult};
use crate::foundation::device::{self, GfxDevice};
use crate::foundation::memory::GfxMemoryProperties;
use crate::pipelines::compute_pipeline::{GfxComputePipeline, GfxComputePipelineDesc, GfxSpecializationConstant};
use crate::resources::buffer::{GfxBuffer, GfxBufferDesc, GfxMemoryLocation};

/// 不依赖驱动的 [`GfxDevice`]
///
/// - 所有 handle 都是递增的假值
/// - host-visible buffer 的内容保存在内存里，可以正常读写
/// - 记录所有 descriptor 写入，并可以注入失败
pub struct GfxRecordingDevice {
    memory_properties: GfxMemoryProperties,
    next_handle: Cell<u64>,

    host_memory: RefCell<HashMap<u64, Box<[u8]>>>,
    live_buffers: RefCell<HashSet<u64>>,
    live_layouts: RefCell<HashSet<u64>>,
    live_pools: RefCell<HashSet<u64>>,
    live_pipelines: RefCell<HashSet<u64>>,

    buffer_create_calls: Cell<usize>,
    fail_buffer_create_at: Cell<Option<usize>>,
    reject_update_after_bind: Cell<bool>,

    layout_descs: RefCell<Vec<GfxDescriptorSetLayoutDesc>>,
    descriptor_write_calls: Cell<usize>,
    descriptor_writes: RefCell<Vec<GfxWriteDescriptorSet>>,
    pipeline_specializations: RefCell<Vec<Vec<GfxSpecializationConstant>>>,
}

impl Default for GfxRecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl GfxRecordingDevice {
    pub fn new() -> Self {
        Self {
            memory_properties: GfxMemoryProperties::from_type_flags(&[
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ]),
            next_handle: Cell::new(1),
            host_memory: RefCell::default(),
            live_buffers: RefCell::default(),
            live_layouts: RefCell::default(),
            live_pools: RefCell::default(),
            live_pipelines: RefCell::default(),
            buffer_create_calls: Cell::new(0),
            fail_buffer_create_at: Cell::new(None),
            reject_update_after_bind: Cell::new(false),
            layout_descs: RefCell::default(),
            descriptor_write_calls: Cell::new(0),
            descriptor_writes: RefCell::default(),
            pipeline_specializations: RefCell::default(),
        }
    }

    /// 第 `index` 次（从 0 开始计数）创建 buffer 时返回 OUT_OF_DEVICE_MEMORY
    pub fn fail_buffer_creation_at(&self, index: usize) {
        self.fail_buffer_create_at.set(Some(index));
    }

    /// 模拟不支持 UPDATE_AFTER_BIND 的设备
    pub fn reject_update_after_bind(&self, reject: bool) {
        self.reject_update_after_bind.set(reject);
    }

    fn alloc_handle(&self) -> u64 {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        handle
    }
}

// getters
impl GfxRecordingDevice {
    /// 尚未销毁的 buffer / layout / pool / pipeline 数量
    pub fn live_object_count(&self) -> usize {
        self.live_buffers.borrow().len()
            + self.live_layouts.borrow().len()
            + self.live_pools.borrow().len()
            + self.live_pipelines.borrow().len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.borrow().len()
    }

    pub fn layout_descs(&self) -> Vec<GfxDescriptorSetLayoutDesc> {
        self.layout_descs.borrow().clone()
    }

    /// `write_descriptor_sets` 的调用次数
    pub fn descriptor_write_calls(&self) -> usize {
        self.descriptor_write_calls.get()
    }

    pub fn descriptor_writes(&self) -> Vec<GfxWriteDescriptorSet> {
        self.descriptor_writes.borrow().clone()
    }

    pub fn clear_descriptor_writes(&self) {
        self.descriptor_writes.borrow_mut().clear();
    }

    /// 每次成功创建 compute pipeline 时使用的 specialization constant
    pub fn pipeline_specializations(&self) -> Vec<Vec<GfxSpecializationConstant>> {
        self.pipeline_specializations.borrow().clone()
    }

    /// host-visible buffer 的全部内容
    pub fn host_memory(&self, buffer: vk::Buffer) -> Option<Vec<u8>> {
        self.host_memory.borrow().get(&buffer.as_raw()).map(|memory| memory.to_vec())
    }

    /// 模拟 GPU 写入 host-visible buffer，返回是否写入成功
    pub fn write_host_memory(&self, buffer: vk::Buffer, offset: usize, data: &[u8]) -> bool {
        let mut host_memory = self.host_memory.borrow_mut();
        let Some(memory) = host_memory.get_mut(&buffer.as_raw()) else {
            return false;
        };
        let Some(dst) = memory.get_mut(offset..offset + data.len()) else {
            return false;
        };
        dst.copy_from_slice(data);
        true
    }
}

impl GfxDevice for GfxRecordingDevice {
    fn memory_properties(&self) -> &GfxMemoryProperties {
        &self.memory_properties
    }

    fn create_buffer(&self, desc: &GfxBufferDesc) -> GfxResult<GfxBuffer> {
        let call_index = self.buffer_create_calls.get();
        self.buffer_create_calls.set(call_index + 1);
        if self.fail_buffer_create_at.get() == Some(call_index) {
            return Err(GfxError::Vulkan {
                call: "vmaCreateBuffer",
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            });
        }

        // 走一遍和真实设备相同的内存类型查询
        self.find_memory_type(u32::MAX, desc.location.property_flags())?;

        let raw = self.alloc_handle();
        let map_ptr = match desc.location {
            GfxMemoryLocation::DeviceLocal => None,
            GfxMemoryLocation::HostVisible => {
                let mut memory = vec![0u8; desc.size as usize].into_boxed_slice();
                let ptr = NonNull::new(memory.as_mut_ptr().cast());
                self.host_memory.borrow_mut().insert(raw, memory);
                ptr
            }
        };
        self.live_buffers.borrow_mut().insert(raw);

        Ok(GfxBuffer {
            handle: vk::Buffer::from_raw(raw),
            size: desc.size,
            usage: desc.usage,
            map_ptr,
            debug_name: desc.name.clone(),
        })
    }

    fn destroy_buffer(&self, buffer: GfxBuffer) {
        let raw = buffer.handle.as_raw();
        self.live_buffers.borrow_mut().remove(&raw);
        self.host_memory.borrow_mut().remove(&raw);
    }

    fn write_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
        device::write_mapped(buffer, offset, data)
    }

    fn read_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, out: &mut [u8]) -> GfxResult<()> {
        device::read_mapped(buffer, offset, out)
    }

    fn create_descriptor_set_layout(&self, desc: &GfxDescriptorSetLayoutDesc) -> GfxResult<vk::DescriptorSetLayout> {
        let update_after_bind = desc.requires_update_after_bind()
            || desc.bindings.iter().any(|b| b.flags.contains(vk::DescriptorBindingFlags::UPDATE_AFTER_BIND));
        if update_after_bind && self.reject_update_after_bind.get() {
            return Err(GfxError::Vulkan {
                call: "vkCreateDescriptorSetLayout",
                result: vk::Result::ERROR_FEATURE_NOT_PRESENT,
            });
        }

        self.layout_descs.borrow_mut().push(desc.clone());
        let raw = self.alloc_handle();
        self.live_layouts.borrow_mut().insert(raw);
        Ok(vk::DescriptorSetLayout::from_raw(raw))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.live_layouts.borrow_mut().remove(&layout.as_raw());
    }

    fn create_descriptor_pool(&self, _desc: &GfxDescriptorPoolDesc) -> GfxResult<vk::DescriptorPool> {
        let raw = self.alloc_handle();
        self.live_pools.borrow_mut().insert(raw);
        Ok(vk::DescriptorPool::from_raw(raw))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.live_pools.borrow_mut().remove(&pool.as_raw());
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> GfxResult<Vec<vk::DescriptorSet>> {
        if !self.live_pools.borrow().contains(&pool.as_raw()) {
            return Err(GfxError::Vulkan {
                call: "vkAllocateDescriptorSets",
                result: vk::Result::ERROR_OUT_OF_POOL_MEMORY,
            });
        }
        Ok(layouts.iter().map(|_| vk::DescriptorSet::from_raw(self.alloc_handle())).collect())
    }

    fn write_descriptor_sets(&self, writes: &[GfxWriteDescriptorSet]) {
        self.descriptor_write_calls.set(self.descriptor_write_calls.get() + 1);
        self.descriptor_writes.borrow_mut().extend_from_slice(writes);
    }

    fn create_compute_pipeline(&self, desc: &GfxComputePipelineDesc<'_>) -> GfxResult<GfxComputePipeline> {
        if desc.spirv.is_empty() {
            return Err(GfxError::InvalidShader {
                name: desc.name.clone(),
            });
        }
        let raw = self.alloc_handle();
        self.live_pipelines.borrow_mut().insert(raw);
        self.pipeline_specializations.borrow_mut().push(desc.specialization_constants.clone());
        Ok(GfxComputePipeline {
            pipeline: vk::Pipeline::from_raw(raw),
            layout: vk::PipelineLayout::from_raw(self.alloc_handle()),
        })
    }

    fn destroy_compute_pipeline(&self, pipeline: GfxComputePipeline) {
        self.live_pipelines.borrow_mut().remove(&pipeline.pipeline.as_raw());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_visible_buffer_round_trip() {
        let device = GfxRecordingDevice::new();
        let buffer = device
            .create_buffer(&GfxBufferDesc::new(
                16,
                vk::BufferUsageFlags::STORAGE_BUFFER,
                GfxMemoryLocation::HostVisible,
                "test",
            ))
            .unwrap();

        device.write_buffer(&buffer, 4, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 8];
        device.read_buffer(&buffer, 0, &mut out).unwrap();
        assert_eq!(out, [0, 0, 0, 0, 1, 2, 3, 4]);

        assert!(matches!(
            device.write_buffer(&buffer, 14, &[0; 4]),
            Err(GfxError::BufferOutOfRange { .. })
        ));

        device.destroy_buffer(buffer);
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_device_local_buffer_is_not_mapped() {
        let device = GfxRecordingDevice::new();
        let buffer = device
            .create_buffer(&GfxBufferDesc::new(
                16,
                vk::BufferUsageFlags::STORAGE_BUFFER,
                GfxMemoryLocation::DeviceLocal,
                "gpu-only",
            ))
            .unwrap();
        assert!(!buffer.is_mapped());
        assert!(matches!(device.write_buffer(&buffer, 0, &[0]), Err(GfxError::BufferNotMapped { .. })));
        device.destroy_buffer(buffer);
    }

    #[test]
    fn test_injected_buffer_failure() {
        let device = GfxRecordingDevice::new();
        device.fail_buffer_creation_at(1);
        let desc = GfxBufferDesc::new(4, vk::BufferUsageFlags::UNIFORM_BUFFER, GfxMemoryLocation::HostVisible, "u");

        let first = device.create_buffer(&desc).unwrap();
        assert!(device.create_buffer(&desc).is_err());
        let third = device.create_buffer(&desc).unwrap();

        device.destroy_buffer(first);
        device.destroy_buffer(third);
        assert_eq!(device.live_buffer_count(), 0);
    }
}
