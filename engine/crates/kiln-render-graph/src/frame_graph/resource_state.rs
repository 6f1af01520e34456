//! 资源状态定义
//!
//! 封装 Vulkan 的 pipeline stage、access mask 和 image layout，
//! 以及 pass 使用方式到目标状态的固定映射。

use ash::vk;

use crate::frame_graph::resource::FgResourceKind;

/// 资源的同步状态
///
/// buffer 的 layout 始终为 UNDEFINED
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FgResourceState {
    /// Pipeline stage
    pub stage: vk::PipelineStageFlags2,
    /// Access mask
    pub access: vk::AccessFlags2,
    /// Image layout
    pub layout: vk::ImageLayout,
}

impl Default for FgResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// new & 常量定义
impl FgResourceState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    #[inline]
    pub const fn buffer(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self::new(stage, access, vk::ImageLayout::UNDEFINED)
    }

    /// 未定义状态（初始状态或不关心内容）
    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// 呈现（swapchain image）
    pub const PRESENT: Self =
        Self::new(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);

    const FRAGMENT_TESTS: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
        vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
    );

    const STORAGE_READ_WRITE: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
    );

    pub const COLOR_ATTACHMENT_READ: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_READ,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    pub const DEPTH_ATTACHMENT_READ: Self = Self::new(
        Self::FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    pub const DEPTH_ATTACHMENT_WRITE: Self = Self::new(
        Self::FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    /// 着色器只读采样（片段着色器）
    pub const SHADER_READ_FRAGMENT: Self = Self::new(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 存储图像读写（计算 + 片段着色器）
    pub const STORAGE_IMAGE: Self = Self::new(
        vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::COMPUTE_SHADER.as_raw() | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw(),
        ),
        Self::STORAGE_READ_WRITE,
        vk::ImageLayout::GENERAL,
    );

    /// Uniform 缓冲区读取（顶点 + 片段着色器）
    pub const UNIFORM_BUFFER: Self = Self::buffer(
        vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::VERTEX_SHADER.as_raw() | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw(),
        ),
        vk::AccessFlags2::UNIFORM_READ,
    );

    /// 存储缓冲区读写（计算 + 顶点 + 片段着色器）
    pub const STORAGE_BUFFER: Self = Self::buffer(
        vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::COMPUTE_SHADER.as_raw()
                | vk::PipelineStageFlags2::VERTEX_SHADER.as_raw()
                | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw(),
        ),
        Self::STORAGE_READ_WRITE,
    );

    /// 间接命令缓冲区
    pub const INDIRECT_BUFFER: Self =
        Self::buffer(vk::PipelineStageFlags2::DRAW_INDIRECT, vk::AccessFlags2::INDIRECT_COMMAND_READ);
}

// 辅助方法
impl FgResourceState {
    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_WRITE.as_raw()
            | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::HOST_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );

    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    /// 用于 barrier src 的 access：只有写操作需要 make available
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.access & Self::WRITE_ACCESS
    }

    /// 同一个 pass 中对同一资源的多种使用方式合并为一个状态
    ///
    /// layout 不一致时使用 GENERAL
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            stage: self.stage | other.stage,
            access: self.access | other.access,
            layout: if self.layout == other.layout { self.layout } else { vk::ImageLayout::GENERAL },
        }
    }

    /// 从 `self` 转换到 `next` 之前是否需要 barrier
    ///
    /// - 状态不同：需要（layout 转换或者执行依赖）
    /// - 状态相同但包含写操作：需要（WAW / RAW）
    /// - 只读到相同的只读：不需要
    #[inline]
    pub fn needs_barrier_to(&self, next: &Self) -> bool {
        self != next || self.is_write()
    }
}

/// pass 对资源的读写方向，决定依赖关系
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FgAccess {
    Read,
    Write,
}

/// pass 对资源的使用方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FgUsage {
    ColorAttachment,
    DepthAttachment,
    Sampled,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    IndirectBuffer,
}

impl FgUsage {
    /// 固定的 使用方式 -> 目标状态 映射
    pub fn required_state(self, access: FgAccess) -> FgResourceState {
        match (self, access) {
            (Self::ColorAttachment, FgAccess::Read) => FgResourceState::COLOR_ATTACHMENT_READ,
            (Self::ColorAttachment, FgAccess::Write) => FgResourceState::COLOR_ATTACHMENT_WRITE,
            (Self::DepthAttachment, FgAccess::Read) => FgResourceState::DEPTH_ATTACHMENT_READ,
            (Self::DepthAttachment, FgAccess::Write) => FgResourceState::DEPTH_ATTACHMENT_WRITE,
            (Self::Sampled, _) => FgResourceState::SHADER_READ_FRAGMENT,
            (Self::StorageImage, _) => FgResourceState::STORAGE_IMAGE,
            (Self::UniformBuffer, _) => FgResourceState::UNIFORM_BUFFER,
            (Self::StorageBuffer, _) => FgResourceState::STORAGE_BUFFER,
            (Self::IndirectBuffer, _) => FgResourceState::INDIRECT_BUFFER,
        }
    }

    pub fn resource_kind(self) -> FgResourceKind {
        match self {
            Self::ColorAttachment | Self::DepthAttachment | Self::Sampled | Self::StorageImage => FgResourceKind::Image,
            Self::UniformBuffer | Self::StorageBuffer | Self::IndirectBuffer => FgResourceKind::Buffer,
        }
    }
}
