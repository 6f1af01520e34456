use std::fmt::Display;

use ash::vk;
use kiln_gfx::resources::image::infer_image_aspect;

use crate::frame_graph::resource_state::FgResourceState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FgResourceKind {
    Image,
    Buffer,
}
impl Display for FgResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Buffer => write!(f, "buffer"),
        }
    }
}

/// 虚拟 image 的描述
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FgImageDesc {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
}
impl Default for FgImageDesc {
    fn default() -> Self {
        Self {
            extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            format: vk::Format::R8G8B8A8_UNORM,
            mip_levels: 1,
            array_layers: 1,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        }
    }
}
impl FgImageDesc {
    pub fn new_2d(width: u32, height: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            format,
            usage,
            ..Default::default()
        }
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        infer_image_aspect(self.format)
    }
}

/// 虚拟 buffer 的描述
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FgBufferDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}
impl FgBufferDesc {
    pub fn new(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self { size, usage }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FgResourceDesc {
    Image(FgImageDesc),
    Buffer(FgBufferDesc),
}
impl FgResourceDesc {
    #[inline]
    pub fn kind(&self) -> FgResourceKind {
        match self {
            Self::Image(_) => FgResourceKind::Image,
            Self::Buffer(_) => FgResourceKind::Buffer,
        }
    }
}
impl From<FgImageDesc> for FgResourceDesc {
    fn from(desc: FgImageDesc) -> Self {
        Self::Image(desc)
    }
}
impl From<FgBufferDesc> for FgResourceDesc {
    fn from(desc: FgBufferDesc) -> Self {
        Self::Buffer(desc)
    }
}

/// 虚拟资源对应的真实 Vulkan 句柄，由外部创建和绑定
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FgPhysicalResource {
    #[default]
    Unbound,
    Image(vk::Image),
    Buffer(vk::Buffer),
}

/// 资源表中的一个节点
#[derive(Clone, Debug)]
pub struct FgResourceNode {
    pub(crate) name: String,
    pub(crate) desc: FgResourceDesc,
    pub(crate) physical: FgPhysicalResource,
    /// 最近一次录制的 barrier 之后的状态
    pub(crate) state: FgResourceState,
}

// getters
impl FgResourceNode {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn desc(&self) -> &FgResourceDesc {
        &self.desc
    }

    #[inline]
    pub fn kind(&self) -> FgResourceKind {
        self.desc.kind()
    }

    #[inline]
    pub fn physical(&self) -> FgPhysicalResource {
        self.physical
    }

    #[inline]
    pub fn state(&self) -> FgResourceState {
        self.state
    }

    #[inline]
    pub fn image(&self) -> Option<vk::Image> {
        match self.physical {
            FgPhysicalResource::Image(image) => Some(image),
            _ => None,
        }
    }

    #[inline]
    pub fn buffer(&self) -> Option<vk::Buffer> {
        match self.physical {
            FgPhysicalResource::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.physical != FgPhysicalResource::Unbound
    }
}
