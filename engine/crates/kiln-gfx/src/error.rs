use ash::vk;

/// GFX 层的错误类型
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    /// Vulkan API 调用失败
    #[error("vulkan call `{call}` failed: {result}")]
    Vulkan { call: &'static str, result: vk::Result },

    /// 没有满足要求的内存类型
    #[error("no memory type matches bits {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// 对非 host-visible 的 buffer 进行 CPU 读写
    #[error("buffer `{name}` is not host visible")]
    BufferNotMapped { name: String },

    /// CPU 读写越界
    #[error("access [{offset}, {offset}+{len}) is out of range for buffer `{name}` of size {size}")]
    BufferOutOfRange {
        name: String,
        offset: vk::DeviceSize,
        len: usize,
        size: vk::DeviceSize,
    },

    /// 无效的 SPIR-V 代码
    #[error("invalid spirv for pipeline `{name}`")]
    InvalidShader { name: String },
}

impl GfxError {
    #[inline]
    pub fn vk(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Vulkan { call, result }
    }
}

pub type GfxResult<T> = Result<T, GfxError>;
