//! Pass 定义
//!
//! [`FgPassNode`] 既是 pass 的数据，也是声明资源使用方式的构建器；
//! pass 的执行逻辑通过闭包或者 [`FgPass`] / [`FgPassExecutor`] trait 提供。

use ash::vk;
use kiln_gfx::commands::command_buffer::GfxCommandRecorder;

use crate::frame_graph::error::{FgError, FgResult};
use crate::frame_graph::handle::FgResourceHandle;
use crate::frame_graph::resource_state::{FgAccess, FgResourceState, FgUsage};
use crate::frame_graph::resource_table::FgResourceTable;

/// Pass 执行时的上下文
pub struct FgPassContext<'a> {
    /// 命令录制上下文，pass 的所有 barrier 已经录制完毕
    pub cmd: &'a mut dyn GfxCommandRecorder,

    pub(crate) resources: &'a FgResourceTable,
    pub(crate) pass_name: &'a str,
}

impl FgPassContext<'_> {
    /// 获取图像的物理句柄
    #[inline]
    pub fn image(&self, handle: FgResourceHandle) -> Option<vk::Image> {
        self.resources.get(handle).and_then(|r| r.image())
    }

    /// 获取缓冲区的物理句柄
    #[inline]
    pub fn buffer(&self, handle: FgResourceHandle) -> Option<vk::Buffer> {
        self.resources.get(handle).and_then(|r| r.buffer())
    }

    #[inline]
    pub fn resource_state(&self, handle: FgResourceHandle) -> Option<FgResourceState> {
        self.resources.state(handle)
    }

    #[inline]
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// 构造当前 pass 的执行失败错误
    pub fn fail(&self, reason: impl std::fmt::Display) -> FgError {
        FgError::PassFailed {
            pass: self.pass_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// pass 的执行回调
///
/// 返回错误时 [`crate::frame_graph::FrameGraph::execute`] 会停止执行后续的 pass
pub trait FgPassExecutor {
    fn execute(&mut self, ctx: &mut FgPassContext<'_>) -> FgResult<()>;
}

impl<F> FgPassExecutor for F
where
    F: FnMut(&mut FgPassContext<'_>) -> FgResult<()>,
{
    #[inline]
    fn execute(&mut self, ctx: &mut FgPassContext<'_>) -> FgResult<()> {
        self(ctx)
    }
}

/// 以结构体形式定义的 pass
///
/// # 示例
///
/// ```ignore
/// struct BlurPass {
///     input: FgResourceHandle,
///     output: FgResourceHandle,
/// }
///
/// impl FgPass for BlurPass {
///     fn setup(&mut self, node: &mut FgPassNode<'_>) {
///         node.add_sampled_image(self.input).add_storage_image(self.output);
///     }
///
///     fn execute(&mut self, ctx: &mut FgPassContext<'_>) -> FgResult<()> {
///         ctx.cmd.dispatch(64, 64, 1);
///         Ok(())
///     }
/// }
/// ```
pub trait FgPass {
    /// 声明 pass 的资源使用方式
    fn setup(&mut self, node: &mut FgPassNode<'_>);

    /// 录制 pass 的命令，此时资源已经处于需要的状态
    fn execute(&mut self, ctx: &mut FgPassContext<'_>) -> FgResult<()>;
}

pub(crate) struct FgPassAdapter<P>(pub(crate) P);

impl<P: FgPass> FgPassExecutor for FgPassAdapter<P> {
    #[inline]
    fn execute(&mut self, ctx: &mut FgPassContext<'_>) -> FgResult<()> {
        self.0.execute(ctx)
    }
}

/// pass 对某个资源的一次使用声明
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FgResourceUsage {
    pub handle: FgResourceHandle,
    pub usage: FgUsage,
    pub access: FgAccess,
}

impl FgResourceUsage {
    #[inline]
    pub fn required_state(&self) -> FgResourceState {
        self.usage.required_state(self.access)
    }
}

/// Pass 节点
pub struct FgPassNode<'a> {
    pub(crate) name: String,

    /// 按声明顺序记录的资源使用
    pub(crate) usages: Vec<FgResourceUsage>,

    pub(crate) executor: Option<Box<dyn FgPassExecutor + 'a>>,

    /// build 之后的执行顺序
    pub(crate) execution_order: Option<usize>,

    /// build 之后每个资源合并后的目标状态，按首次出现的顺序
    pub(crate) resolved_states: Vec<(FgResourceHandle, FgResourceState)>,
}

// new & init
impl<'a> FgPassNode<'a> {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            usages: Vec::new(),
            executor: None,
            execution_order: None,
            resolved_states: Vec::new(),
        }
    }

    #[inline]
    fn usage(&mut self, handle: FgResourceHandle, usage: FgUsage, access: FgAccess) -> &mut Self {
        self.usages.push(FgResourceUsage { handle, usage, access });
        self
    }

    /// 设置执行回调
    pub fn set_execute<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&mut FgPassContext<'_>) -> FgResult<()> + 'a,
    {
        self.executor = Some(Box::new(f));
        self
    }

    pub fn set_executor(&mut self, executor: impl FgPassExecutor + 'a) -> &mut Self {
        self.executor = Some(Box::new(executor));
        self
    }
}

// 资源使用声明
impl FgPassNode<'_> {
    /// 作为颜色附件读取（如 blend、input attachment）
    pub fn add_color_input(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::ColorAttachment, FgAccess::Read)
    }

    pub fn add_color_output(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::ColorAttachment, FgAccess::Write)
    }

    /// 只读的深度测试
    pub fn add_depth_input(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::DepthAttachment, FgAccess::Read)
    }

    pub fn add_depth_output(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::DepthAttachment, FgAccess::Write)
    }

    pub fn add_sampled_image(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::Sampled, FgAccess::Read)
    }

    /// 写入 storage image，pass 成为该资源的生产者
    pub fn add_storage_image(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::StorageImage, FgAccess::Write)
    }

    /// 只读取 storage image，状态与 [`Self::add_storage_image`] 相同
    pub fn read_storage_image(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::StorageImage, FgAccess::Read)
    }

    pub fn add_uniform_buffer(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::UniformBuffer, FgAccess::Read)
    }

    /// 写入 storage buffer，pass 成为该资源的生产者
    pub fn add_storage_buffer(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::StorageBuffer, FgAccess::Write)
    }

    /// 只读取 storage buffer，状态与 [`Self::add_storage_buffer`] 相同
    pub fn read_storage_buffer(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::StorageBuffer, FgAccess::Read)
    }

    /// 作为 indirect draw / dispatch 的参数来源
    pub fn add_indirect_buffer(&mut self, handle: FgResourceHandle) -> &mut Self {
        self.usage(handle, FgUsage::IndirectBuffer, FgAccess::Read)
    }
}

// getters
impl FgPassNode<'_> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn usages(&self) -> &[FgResourceUsage] {
        &self.usages
    }

    /// 某种使用方式下的资源，按声明顺序
    pub fn handles_by_usage(&self, usage: FgUsage) -> impl Iterator<Item = FgResourceHandle> + '_ {
        self.usages.iter().filter(move |u| u.usage == usage).map(|u| u.handle)
    }

    pub fn reads(&self) -> impl Iterator<Item = FgResourceHandle> + '_ {
        self.usages.iter().filter(|u| u.access == FgAccess::Read).map(|u| u.handle)
    }

    pub fn writes(&self) -> impl Iterator<Item = FgResourceHandle> + '_ {
        self.usages.iter().filter(|u| u.access == FgAccess::Write).map(|u| u.handle)
    }

    #[inline]
    pub fn execution_order(&self) -> Option<usize> {
        self.execution_order
    }

    #[inline]
    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    /// 合并同一资源的多种使用方式，结果按首次出现的顺序排列
    pub(crate) fn merged_states(&self) -> Vec<(FgResourceHandle, FgResourceState)> {
        let mut states: Vec<(FgResourceHandle, FgResourceState)> = Vec::with_capacity(self.usages.len());
        for usage in &self.usages {
            let required = usage.required_state();
            match states.iter_mut().find(|(handle, _)| *handle == usage.handle) {
                Some((_, state)) => *state = state.merge(required),
                None => states.push((usage.handle, required)),
            }
        }
        states
    }
}
