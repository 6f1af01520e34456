use std::ffi::c_void;
use std::ptr::NonNull;

use ash::vk;

/// buffer 所在的内存位置
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GfxMemoryLocation {
    /// GPU 独占，CPU 不可访问
    DeviceLocal,
    /// HOST_VISIBLE | HOST_COHERENT，创建时持久映射
    HostVisible,
}

impl GfxMemoryLocation {
    #[inline]
    pub fn property_flags(self) -> vk::MemoryPropertyFlags {
        match self {
            Self::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            Self::HostVisible => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GfxBufferDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub location: GfxMemoryLocation,
    pub name: String,
}

impl GfxBufferDesc {
    pub fn new(
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: GfxMemoryLocation,
        name: impl Into<String>,
    ) -> Self {
        Self {
            size,
            usage,
            location,
            name: name.into(),
        }
    }
}

/// 由 [`crate::foundation::GfxDevice`] 创建和销毁的 buffer
///
/// 不实现 Drop：销毁需要 device，调用者需要显式调用 `GfxDevice::destroy_buffer`
#[derive(Debug)]
pub struct GfxBuffer {
    pub(crate) handle: vk::Buffer,
    pub(crate) size: vk::DeviceSize,
    pub(crate) usage: vk::BufferUsageFlags,

    /// 在初始化阶段写死
    pub(crate) map_ptr: Option<NonNull<c_void>>,

    pub(crate) debug_name: String,
}

// getters
impl GfxBuffer {
    /// 由 device 实现构造 buffer
    ///
    /// # Safety
    /// `map_ptr` 必须指向至少 `size` 字节的、在 buffer 销毁前一直有效的映射内存
    pub unsafe fn from_raw_parts(
        handle: vk::Buffer,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        map_ptr: Option<NonNull<c_void>>,
        debug_name: impl Into<String>,
    ) -> Self {
        Self {
            handle,
            size,
            usage,
            map_ptr,
            debug_name: debug_name.into(),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    #[inline]
    pub fn mapped_ptr(&self) -> Option<NonNull<c_void>> {
        self.map_ptr
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.map_ptr.is_some()
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// 作为整体绑定到描述符时使用
    #[inline]
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.handle,
            offset: 0,
            range: vk::WHOLE_SIZE,
        }
    }
}
