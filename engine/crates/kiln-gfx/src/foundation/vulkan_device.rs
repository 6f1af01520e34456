use std::cell::RefCell;
use std::collections::HashMap;
use std::ptr::NonNull;

use ash::vk;
use ash::vk::Handle;
use vk_mem::Alloc;

use crate::descriptors::descriptor_set::{GfxDescriptorPoolDesc, GfxDescriptorSetLayoutDesc, GfxWriteDescriptorSet};
use crate::error::{GfxError, GfxResult};
use crate::foundation::device::{self, GfxDevice};
use crate::foundation::memory::GfxMemoryProperties;
use crate::pipelines::compute_pipeline::{GfxComputePipeline, GfxComputePipelineDesc, GfxSpecializationConstant};
use crate::resources::buffer::{GfxBuffer, GfxBufferDesc, GfxMemoryLocation};

/// 基于 `ash::Device` 的 [`GfxDevice`] 实现
///
/// instance / physical device / queue 的创建不在这里，需要外部传入已经创建好的 device。
/// device 需要开启 synchronization2 以及 descriptor indexing 的相关 feature。
///
/// buffer 的内存由 vk_mem 分配，`GfxVulkanDevice` 需要在 `ash::Device` 销毁之前 drop
pub struct GfxVulkanDevice {
    allocator: vk_mem::Allocator,
    /// buffer handle -> vk_mem allocation
    allocations: RefCell<HashMap<u64, vk_mem::Allocation>>,

    device: ash::Device,
    memory_properties: GfxMemoryProperties,
    debug_utils: Option<ash::ext::debug_utils::Device>,
}

// new & init
impl GfxVulkanDevice {
    pub fn new(instance: &ash::Instance, device: ash::Device, physical_device: vk::PhysicalDevice) -> GfxResult<Self> {
        let allocator = unsafe {
            vk_mem::Allocator::new(vk_mem::AllocatorCreateInfo::new(instance, &device, physical_device))
                .map_err(GfxError::vk("vmaCreateAllocator"))?
        };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

        Ok(Self {
            allocator,
            allocations: RefCell::default(),
            device,
            memory_properties: GfxMemoryProperties::new(memory_properties),
            debug_utils: None,
        })
    }

    /// 开启 debug name
    pub fn with_debug_utils(mut self, instance: &ash::Instance) -> Self {
        self.debug_utils = Some(ash::ext::debug_utils::Device::new(instance, &self.device));
        self
    }
}

// getters
impl GfxVulkanDevice {
    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    #[inline]
    pub fn debug_utils(&self) -> Option<&ash::ext::debug_utils::Device> {
        self.debug_utils.as_ref()
    }
}

// tools
impl GfxVulkanDevice {
    fn set_debug_name<T: Handle>(&self, handle: T, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = std::ffi::CString::new(name) else {
            return;
        };
        let name_info = vk::DebugUtilsObjectNameInfoEXT::default().object_handle(handle).object_name(&name);
        unsafe {
            if let Err(e) = debug_utils.set_debug_utils_object_name(&name_info) {
                log::warn!("failed to set debug name {:?}: {}", name, e);
            }
        }
    }

    fn allocation_create_info(location: GfxMemoryLocation) -> vk_mem::AllocationCreateInfo {
        vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: match location {
                GfxMemoryLocation::DeviceLocal => vk_mem::AllocationCreateFlags::empty(),
                // count buffer 需要回读，所以使用 random access
                GfxMemoryLocation::HostVisible => vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
            },
            required_flags: location.property_flags(),
            ..Default::default()
        }
    }
}

impl Drop for GfxVulkanDevice {
    fn drop(&mut self) {
        let allocations = std::mem::take(self.allocations.get_mut());
        if !allocations.is_empty() {
            log::warn!("GfxVulkanDevice dropped with {} live buffers", allocations.len());
        }
        for (raw, mut allocation) in allocations {
            unsafe { self.allocator.destroy_buffer(vk::Buffer::from_raw(raw), &mut allocation) }
        }
    }
}

impl GfxDevice for GfxVulkanDevice {
    fn memory_properties(&self) -> &GfxMemoryProperties {
        &self.memory_properties
    }

    fn create_buffer(&self, desc: &GfxBufferDesc) -> GfxResult<GfxBuffer> {
        // 没有满足 location 的内存类型时，直接报错，不交给 vk_mem
        self.find_memory_type(u32::MAX, desc.location.property_flags())?;

        let buffer_ci = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_ci = Self::allocation_create_info(desc.location);

        unsafe {
            let (handle, mut allocation) =
                self.allocator.create_buffer(&buffer_ci, &alloc_ci).map_err(GfxError::vk("vmaCreateBuffer"))?;

            let map_ptr = match desc.location {
                GfxMemoryLocation::DeviceLocal => None,
                GfxMemoryLocation::HostVisible => match self.allocator.map_memory(&mut allocation) {
                    Ok(ptr) => NonNull::new(ptr.cast()),
                    Err(e) => {
                        self.allocator.destroy_buffer(handle, &mut allocation);
                        return Err(GfxError::vk("vmaMapMemory")(e));
                    }
                },
            };

            self.allocations.borrow_mut().insert(handle.as_raw(), allocation);
            self.set_debug_name(handle, &desc.name);
            log::debug!("create buffer {}: size {}, usage {:?}", desc.name, desc.size, desc.usage);

            Ok(GfxBuffer::from_raw_parts(handle, desc.size, desc.usage, map_ptr, desc.name.clone()))
        }
    }

    fn destroy_buffer(&self, buffer: GfxBuffer) {
        let Some(mut allocation) = self.allocations.borrow_mut().remove(&buffer.handle.as_raw()) else {
            log::error!("destroy buffer {}: buffer was not created by this device", buffer.debug_name);
            return;
        };
        unsafe {
            if buffer.is_mapped() {
                self.allocator.unmap_memory(&mut allocation);
            }
            self.allocator.destroy_buffer(buffer.handle, &mut allocation);
        }
    }

    fn write_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
        device::write_mapped(buffer, offset, data)
    }

    fn read_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, out: &mut [u8]) -> GfxResult<()> {
        device::read_mapped(buffer, offset, out)
    }

    fn create_descriptor_set_layout(&self, desc: &GfxDescriptorSetLayoutDesc) -> GfxResult<vk::DescriptorSetLayout> {
        let bindings = desc
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(b.descriptor_count)
                    .stage_flags(b.stage_flags)
            })
            .collect::<Vec<_>>();
        let binding_flags = desc.bindings.iter().map(|b| b.flags).collect::<Vec<_>>();

        let mut binding_flags_ci = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
        let mut layout_ci = vk::DescriptorSetLayoutCreateInfo::default().flags(desc.flags).bindings(&bindings);
        if desc.has_binding_flags() {
            layout_ci = layout_ci.push_next(&mut binding_flags_ci);
        }

        let layout = unsafe {
            self.device
                .create_descriptor_set_layout(&layout_ci, None)
                .map_err(GfxError::vk("vkCreateDescriptorSetLayout"))?
        };
        self.set_debug_name(layout, &desc.name);
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_descriptor_pool(&self, desc: &GfxDescriptorPoolDesc) -> GfxResult<vk::DescriptorPool> {
        let pool_ci = vk::DescriptorPoolCreateInfo::default()
            .flags(desc.flags)
            .max_sets(desc.max_sets)
            .pool_sizes(&desc.pool_sizes);
        let pool = unsafe {
            self.device.create_descriptor_pool(&pool_ci, None).map_err(GfxError::vk("vkCreateDescriptorPool"))?
        };
        self.set_debug_name(pool, &desc.name);
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> GfxResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(pool).set_layouts(layouts);
        unsafe {
            self.device.allocate_descriptor_sets(&alloc_info).map_err(GfxError::vk("vkAllocateDescriptorSets"))
        }
    }

    fn write_descriptor_sets(&self, writes: &[GfxWriteDescriptorSet]) {
        let writes = writes.iter().map(|w| w.to_vk_type()).collect::<Vec<_>>();
        unsafe { self.device.update_descriptor_sets(&writes, &[]) }
    }

    fn create_compute_pipeline(&self, desc: &GfxComputePipelineDesc<'_>) -> GfxResult<GfxComputePipeline> {
        if desc.spirv.is_empty() {
            return Err(GfxError::InvalidShader {
                name: desc.name.clone(),
            });
        }

        unsafe {
            let layout_ci = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&desc.set_layouts)
                .push_constant_ranges(&desc.push_constant_ranges);
            let layout = self
                .device
                .create_pipeline_layout(&layout_ci, None)
                .map_err(GfxError::vk("vkCreatePipelineLayout"))?;

            let module_ci = vk::ShaderModuleCreateInfo::default().code(desc.spirv);
            let module = match self.device.create_shader_module(&module_ci, None) {
                Ok(module) => module,
                Err(e) => {
                    self.device.destroy_pipeline_layout(layout, None);
                    return Err(GfxError::vk("vkCreateShaderModule")(e));
                }
            };

            let (map_entries, specialization_data) =
                GfxSpecializationConstant::to_vk_entries(&desc.specialization_constants);
            let specialization_info =
                vk::SpecializationInfo::default().map_entries(&map_entries).data(&specialization_data);
            let stage = vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::COMPUTE)
                .module(module)
                .name(desc.entry_point)
                .specialization_info(&specialization_info);
            let pipeline_ci = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout);

            let result =
                self.device.create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_ci), None);
            self.device.destroy_shader_module(module, None);

            match result {
                Ok(pipelines) => {
                    let pipeline = pipelines[0];
                    self.set_debug_name(pipeline, &desc.name);
                    Ok(GfxComputePipeline { pipeline, layout })
                }
                Err((_, e)) => {
                    self.device.destroy_pipeline_layout(layout, None);
                    Err(GfxError::vk("vkCreateComputePipelines")(e))
                }
            }
        }
    }

    fn destroy_compute_pipeline(&self, pipeline: GfxComputePipeline) {
        unsafe {
            self.device.destroy_pipeline(pipeline.pipeline, None);
            self.device.destroy_pipeline_layout(pipeline.layout, None);
        }
    }
}
