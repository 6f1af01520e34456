use std::fmt::Display;

/// shader 中表示无效资源的索引
pub const INVALID_BINDLESS_INDEX: u32 = u32::MAX;

/// 在描述符表中的位置
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindlessSlotKind {
    Texture,
    StorageBuffer,
    UniformBuffer,
}
impl Display for BindlessSlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Texture => write!(f, "texture"),
            Self::StorageBuffer => write!(f, "storage buffer"),
            Self::UniformBuffer => write!(f, "uniform buffer"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindlessBufferKind {
    Storage,
    Uniform,
}
impl BindlessBufferKind {
    #[inline]
    pub(crate) fn slot_kind(self) -> BindlessSlotKind {
        match self {
            Self::Storage => BindlessSlotKind::StorageBuffer,
            Self::Uniform => BindlessSlotKind::UniformBuffer,
        }
    }
}

/// 纹理在 bindless 数组中的句柄
///
/// `index` 会直接写入 shader 数据；`generation` 只在 CPU 端用于识别过期句柄
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindlessTextureHandle {
    index: u32,
    generation: u32,
}
impl BindlessTextureHandle {
    #[inline]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
    #[inline]
    pub fn null() -> Self {
        Self {
            index: INVALID_BINDLESS_INDEX,
            generation: 0,
        }
    }
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
    #[inline]
    pub fn is_null(&self) -> bool {
        self.index == INVALID_BINDLESS_INDEX
    }
}
impl Default for BindlessTextureHandle {
    fn default() -> Self {
        Self::null()
    }
}

/// buffer 在 bindless 数组中的句柄，storage 和 uniform 各自独立编号
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindlessBufferHandle {
    index: u32,
    generation: u32,
    kind: BindlessBufferKind,
}
impl BindlessBufferHandle {
    #[inline]
    pub(crate) fn new(index: u32, generation: u32, kind: BindlessBufferKind) -> Self {
        Self {
            index,
            generation,
            kind,
        }
    }
    #[inline]
    pub fn null(kind: BindlessBufferKind) -> Self {
        Self {
            index: INVALID_BINDLESS_INDEX,
            generation: 0,
            kind,
        }
    }
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
    #[inline]
    pub fn kind(&self) -> BindlessBufferKind {
        self.kind
    }
    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
    #[inline]
    pub fn is_null(&self) -> bool {
        self.index == INVALID_BINDLESS_INDEX
    }
}
