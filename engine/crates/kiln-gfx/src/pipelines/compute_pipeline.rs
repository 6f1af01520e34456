use std::ffi::CStr;

use ash::vk;

pub struct GfxComputePipelineDesc<'a> {
    pub name: String,
    pub spirv: &'a [u32],
    pub entry_point: &'a CStr,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    /// 32 位的 specialization constant，例如 `local_size_x_id`
    pub specialization_constants: Vec<GfxSpecializationConstant>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxSpecializationConstant {
    pub constant_id: u32,
    pub value: u32,
}

impl GfxSpecializationConstant {
    #[inline]
    pub fn new(constant_id: u32, value: u32) -> Self {
        Self { constant_id, value }
    }

    /// 转换为 `vk::SpecializationInfo` 需要的 map entries 和数据
    pub fn to_vk_entries(constants: &[Self]) -> (Vec<vk::SpecializationMapEntry>, Vec<u8>) {
        let entry_size = size_of::<u32>();
        let entries = constants
            .iter()
            .enumerate()
            .map(|(i, c)| vk::SpecializationMapEntry {
                constant_id: c.constant_id,
                offset: (i * entry_size) as u32,
                size: entry_size,
            })
            .collect();
        let data = constants.iter().flat_map(|c| c.value.to_ne_bytes()).collect();
        (entries, data)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxComputePipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl GfxComputePipeline {
    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        vk::PipelineBindPoint::COMPUTE
    }
}
