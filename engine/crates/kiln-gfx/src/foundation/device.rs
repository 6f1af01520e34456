use ash::vk;

use crate::descriptors::descriptor_set::{GfxDescriptorPoolDesc, GfxDescriptorSetLayoutDesc, GfxWriteDescriptorSet};
use crate::error::{GfxError, GfxResult};
use crate::foundation::memory::GfxMemoryProperties;
use crate::pipelines::compute_pipeline::{GfxComputePipeline, GfxComputePipelineDesc};
use crate::resources::buffer::{GfxBuffer, GfxBufferDesc};

/// 渲染核心使用的逻辑设备抽象
///
/// 真实实现见 [`crate::foundation::GfxVulkanDevice`]，测试使用 `testing::GfxRecordingDevice`
pub trait GfxDevice {
    fn memory_properties(&self) -> &GfxMemoryProperties;

    /// 查找满足条件的内存类型
    fn find_memory_type(&self, type_bits: u32, properties: vk::MemoryPropertyFlags) -> GfxResult<u32> {
        self.memory_properties()
            .find_memory_type_index(type_bits, properties)
            .ok_or(GfxError::NoSuitableMemoryType { type_bits, properties })
    }

    // buffer
    fn create_buffer(&self, desc: &GfxBufferDesc) -> GfxResult<GfxBuffer>;
    fn destroy_buffer(&self, buffer: GfxBuffer);

    /// 通过持久映射的指针写入数据，只适用于 host-visible buffer
    fn write_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()>;

    /// 通过持久映射的指针读取数据，只适用于 host-visible buffer
    fn read_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, out: &mut [u8]) -> GfxResult<()>;

    // descriptor
    fn create_descriptor_set_layout(&self, desc: &GfxDescriptorSetLayoutDesc) -> GfxResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_descriptor_pool(&self, desc: &GfxDescriptorPoolDesc) -> GfxResult<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> GfxResult<Vec<vk::DescriptorSet>>;

    fn write_descriptor_sets(&self, writes: &[GfxWriteDescriptorSet]);

    // pipeline
    fn create_compute_pipeline(&self, desc: &GfxComputePipelineDesc<'_>) -> GfxResult<GfxComputePipeline>;
    fn destroy_compute_pipeline(&self, pipeline: GfxComputePipeline);
}

/// 检查 CPU 访问 buffer 的范围是否合法
pub(crate) fn check_host_access(buffer: &GfxBuffer, offset: vk::DeviceSize, len: usize) -> GfxResult<()> {
    if buffer.map_ptr.is_none() {
        return Err(GfxError::BufferNotMapped {
            name: buffer.debug_name.clone(),
        });
    }
    if offset.checked_add(len as vk::DeviceSize).is_none_or(|end| end > buffer.size) {
        return Err(GfxError::BufferOutOfRange {
            name: buffer.debug_name.clone(),
            offset,
            len,
            size: buffer.size,
        });
    }
    Ok(())
}

/// 通过映射指针写入
pub(crate) fn write_mapped(buffer: &GfxBuffer, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
    check_host_access(buffer, offset, data.len())?;
    let Some(ptr) = buffer.map_ptr else {
        unreachable!("checked by check_host_access")
    };
    // SAFETY: 范围已检查，映射内存在 buffer 销毁前有效
    unsafe {
        let dst = ptr.as_ptr().cast::<u8>().add(offset as usize);
        std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
    }
    Ok(())
}

/// 通过映射指针读取
pub(crate) fn read_mapped(buffer: &GfxBuffer, offset: vk::DeviceSize, out: &mut [u8]) -> GfxResult<()> {
    check_host_access(buffer, offset, out.len())?;
    let Some(ptr) = buffer.map_ptr else {
        unreachable!("checked by check_host_access")
    };
    // SAFETY: 同 write_mapped
    unsafe {
        let src = ptr.as_ptr().cast::<u8>().add(offset as usize);
        std::ptr::copy_nonoverlapping(src, out.as_mut_ptr(), out.len());
    }
    Ok(())
}
