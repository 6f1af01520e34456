use ash::vk;

/// descriptor set layout 中的一个 binding
#[derive(Clone, Debug)]
pub struct GfxDescriptorBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stage_flags: vk::ShaderStageFlags,
    pub flags: vk::DescriptorBindingFlags,
}

impl GfxDescriptorBinding {
    pub fn new(
        binding: u32,
        descriptor_type: vk::DescriptorType,
        descriptor_count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        Self {
            binding,
            descriptor_type,
            descriptor_count,
            stage_flags,
            flags: vk::DescriptorBindingFlags::empty(),
        }
    }

    /// builder
    #[inline]
    pub fn binding_flags(mut self, flags: vk::DescriptorBindingFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct GfxDescriptorSetLayoutDesc {
    pub name: String,
    pub flags: vk::DescriptorSetLayoutCreateFlags,
    pub bindings: Vec<GfxDescriptorBinding>,
}

impl GfxDescriptorSetLayoutDesc {
    /// 是否有 binding 需要 descriptor indexing 的 binding flags
    #[inline]
    pub fn has_binding_flags(&self) -> bool {
        self.bindings.iter().any(|b| !b.flags.is_empty())
    }

    #[inline]
    pub fn requires_update_after_bind(&self) -> bool {
        self.flags.contains(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
    }
}

#[derive(Clone, Debug, Default)]
pub struct GfxDescriptorPoolDesc {
    pub name: String,
    pub flags: vk::DescriptorPoolCreateFlags,
    pub max_sets: u32,
    pub pool_sizes: Vec<vk::DescriptorPoolSize>,
}

/// 对 vk::WriteDescriptorSet 的封装，持有 image_infos / buffer_infos 的所有权
#[derive(Clone, Debug)]
pub struct GfxWriteDescriptorSet {
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_type: vk::DescriptorType,

    pub buffer_infos: Vec<vk::DescriptorBufferInfo>,
    pub image_infos: Vec<vk::DescriptorImageInfo>,
}

impl GfxWriteDescriptorSet {
    pub fn images(
        dst_set: vk::DescriptorSet,
        dst_binding: u32,
        descriptor_type: vk::DescriptorType,
        image_infos: Vec<vk::DescriptorImageInfo>,
    ) -> Self {
        Self {
            dst_set,
            dst_binding,
            dst_array_element: 0,
            descriptor_type,
            buffer_infos: Vec::new(),
            image_infos,
        }
    }

    pub fn buffers(
        dst_set: vk::DescriptorSet,
        dst_binding: u32,
        descriptor_type: vk::DescriptorType,
        buffer_infos: Vec<vk::DescriptorBufferInfo>,
    ) -> Self {
        Self {
            dst_set,
            dst_binding,
            dst_array_element: 0,
            descriptor_type,
            buffer_infos,
            image_infos: Vec::new(),
        }
    }

    #[inline]
    pub fn descriptor_count(&self) -> u32 {
        (self.buffer_infos.len() + self.image_infos.len()) as u32
    }

    /// 返回的 vk 结构体借用 self 中的 infos
    pub fn to_vk_type(&self) -> vk::WriteDescriptorSet<'_> {
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.dst_set)
            .dst_binding(self.dst_binding)
            .dst_array_element(self.dst_array_element)
            .descriptor_type(self.descriptor_type);

        if !self.image_infos.is_empty() {
            write.image_info(&self.image_infos)
        } else {
            write.buffer_info(&self.buffer_infos)
        }
    }
}
