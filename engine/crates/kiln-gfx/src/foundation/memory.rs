use ash::vk;

/// 物理设备的内存属性
#[derive(Clone, Debug, Default)]
pub struct GfxMemoryProperties {
    inner: vk::PhysicalDeviceMemoryProperties,
}

impl GfxMemoryProperties {
    pub fn new(inner: vk::PhysicalDeviceMemoryProperties) -> Self {
        Self { inner }
    }

    /// 从若干个 memory type 的属性构造，heap 都视为 0 号
    pub fn from_type_flags(flags: &[vk::MemoryPropertyFlags]) -> Self {
        let mut inner = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len().min(vk::MAX_MEMORY_TYPES) as u32,
            memory_heap_count: 1,
            ..Default::default()
        };
        for (memory_type, &property_flags) in inner.memory_types.iter_mut().zip(flags) {
            memory_type.property_flags = property_flags;
            memory_type.heap_index = 0;
        }
        Self { inner }
    }

    #[inline]
    pub fn inner(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.inner
    }

    /// 找到第一个满足条件的 memory type
    ///
    /// - `type_bits`: 通常来自 `vk::MemoryRequirements::memory_type_bits`
    /// - `required`: memory type 必须包含的全部属性
    pub fn find_memory_type_index(&self, type_bits: u32, required: vk::MemoryPropertyFlags) -> Option<u32> {
        self.inner.memory_types[..self.inner.memory_type_count as usize]
            .iter()
            .enumerate()
            .find(|(index, memory_type)| {
                (type_bits & (1 << index)) != 0 && memory_type.property_flags.contains(required)
            })
            .map(|(index, _)| index as u32)
    }
}
