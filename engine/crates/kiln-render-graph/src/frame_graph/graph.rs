use ash::vk;
use itertools::Itertools;
use kiln_gfx::commands::command_buffer::GfxCommandRecorder;
use kiln_gfx::profile_scope;
use slotmap::SecondaryMap;

use crate::frame_graph::barrier::{FgBufferBarrierDesc, FgImageBarrierDesc, FgPassBarriers};
use crate::frame_graph::dependency_graph::FgDependencyGraph;
use crate::frame_graph::error::{FgError, FgResult};
use crate::frame_graph::handle::FgResourceHandle;
use crate::frame_graph::pass::{FgPass, FgPassAdapter, FgPassContext, FgPassNode};
use crate::frame_graph::resource::{
    FgBufferDesc, FgImageDesc, FgPhysicalResource, FgResourceDesc, FgResourceKind, FgResourceNode,
};
use crate::frame_graph::resource_state::FgResourceState;
use crate::frame_graph::resource_table::FgResourceTable;

/// 一次 [`FrameGraph::execute`] 的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FgExecutionReport {
    pub passes_executed: usize,
    /// `pipeline_barrier` 的调用次数
    pub barrier_batches: usize,
    pub image_barriers: usize,
    pub buffer_barriers: usize,
}

/// 帧图
///
/// `'a` 是 pass 回调借用的外部数据的生命周期
#[derive(Default)]
pub struct FrameGraph<'a> {
    resources: FgResourceTable,
    passes: Vec<FgPassNode<'a>>,

    /// 按执行顺序排列的 pass 声明序号
    execution_order: Vec<usize>,
    dependency_graph: Option<FgDependencyGraph>,
    built: bool,
}

// new & init
impl FrameGraph<'_> {
    pub fn new() -> Self {
        Self::default()
    }
}

// 资源声明
impl FrameGraph<'_> {
    /// 声明一个虚拟资源，需要在 execute 之前通过 `bind_*` 绑定物理句柄
    ///
    /// 同名资源会被原地替换，句柄保持不变
    pub fn add_resource(&mut self, name: impl Into<String>, desc: impl Into<FgResourceDesc>) -> FgResourceHandle {
        self.built = false;
        self.resources.add(name, desc.into(), FgPhysicalResource::Unbound, FgResourceState::UNDEFINED)
    }

    #[inline]
    pub fn add_image(&mut self, name: impl Into<String>, desc: FgImageDesc) -> FgResourceHandle {
        self.add_resource(name, desc)
    }

    #[inline]
    pub fn add_buffer(&mut self, name: impl Into<String>, desc: FgBufferDesc) -> FgResourceHandle {
        self.add_resource(name, desc)
    }

    /// 导入外部创建的 image，例如 swapchain image 或者跨帧保留的历史帧
    pub fn import_image(
        &mut self,
        name: impl Into<String>,
        desc: FgImageDesc,
        image: vk::Image,
        initial_state: FgResourceState,
    ) -> FgResourceHandle {
        self.built = false;
        self.resources.add(name, desc.into(), FgPhysicalResource::Image(image), initial_state)
    }

    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        desc: FgBufferDesc,
        buffer: vk::Buffer,
        initial_state: FgResourceState,
    ) -> FgResourceHandle {
        self.built = false;
        self.resources.add(name, desc.into(), FgPhysicalResource::Buffer(buffer), initial_state)
    }

    #[inline]
    pub fn bind_image(&mut self, handle: FgResourceHandle, image: vk::Image) -> FgResult<()> {
        self.resources.bind_image(handle, image)
    }

    #[inline]
    pub fn bind_buffer(&mut self, handle: FgResourceHandle, buffer: vk::Buffer) -> FgResult<()> {
        self.resources.bind_buffer(handle, buffer)
    }
}

// pass 声明
impl<'a> FrameGraph<'a> {
    /// 添加一个 pass，返回用于声明资源使用方式的构建器
    pub fn add_pass(&mut self, name: impl Into<String>) -> &mut FgPassNode<'a> {
        self.built = false;
        let index = self.passes.len();
        self.passes.push(FgPassNode::new(name.into()));
        &mut self.passes[index]
    }

    /// 添加一个结构体形式的 pass
    pub fn add_pass_with<P: FgPass + 'a>(&mut self, name: impl Into<String>, mut pass: P) -> &mut FgPassNode<'a> {
        let node = self.add_pass(name);
        pass.setup(node);
        node.set_executor(FgPassAdapter(pass))
    }
}

// build & execute
impl FrameGraph<'_> {
    /// 建立依赖关系并排序
    ///
    /// 失败时 graph 保持未 build 状态，不能 execute
    pub fn build(&mut self) -> FgResult<()> {
        profile_scope!("FrameGraph::build");

        self.built = false;
        self.execution_order.clear();
        self.dependency_graph = None;

        self.validate_usages()?;

        for pass in &mut self.passes {
            pass.resolved_states = pass.merged_states();
            pass.execution_order = None;
        }

        let reads = self.passes.iter().map(|p| p.reads().unique().collect_vec()).collect_vec();
        let writes = self.passes.iter().map(|p| p.writes().unique().collect_vec()).collect_vec();
        let dependency_graph = FgDependencyGraph::analyze(&reads, &writes);

        let order = dependency_graph.topological_sort().map_err(|cycle| {
            let passes = cycle.iter().map(|&i| self.passes[i].name.clone()).collect_vec();
            log::error!("FrameGraph: cycle detected between passes: [{}]", passes.join(", "));
            FgError::CycleDetected { passes }
        })?;

        for (position, &pass_index) in order.iter().enumerate() {
            self.passes[pass_index].execution_order = Some(position);
        }
        log::debug!(
            "FrameGraph built: {} passes, {} dependencies, order: [{}]",
            self.passes.len(),
            dependency_graph.edge_count(),
            order.iter().map(|&i| self.passes[i].name.as_str()).join(" -> ")
        );

        self.execution_order = order;
        self.dependency_graph = Some(dependency_graph);
        self.built = true;
        Ok(())
    }

    /// 检查 pass 引用的资源是否存在，以及使用方式是否和资源类型匹配
    fn validate_usages(&self) -> FgResult<()> {
        for pass in &self.passes {
            for usage in &pass.usages {
                let node = self.resources.get(usage.handle).ok_or_else(|| FgError::UnknownResource {
                    pass: pass.name.clone(),
                    handle: usage.handle,
                })?;
                if usage.usage.resource_kind() != node.kind() {
                    return Err(FgError::UsageMismatch {
                        pass: pass.name.clone(),
                        resource: node.name.clone(),
                        kind: node.kind(),
                        usage: usage.usage,
                    });
                }
            }
        }
        Ok(())
    }

    /// 按顺序录制每个 pass：先录制一次批量的 barrier，再执行 pass 的回调
    ///
    /// 录制任何命令之前会先检查所有资源都已绑定物理句柄
    pub fn execute(&mut self, cmd: &mut dyn GfxCommandRecorder) -> FgResult<FgExecutionReport> {
        profile_scope!("FrameGraph::execute");

        let plan = self.plan_barriers()?;
        let mut report = FgExecutionReport::default();

        for (&pass_index, barriers) in self.execution_order.iter().zip(plan.iter()) {
            if barriers.has_barriers() {
                cmd.pipeline_barrier(&barriers.to_dependency_info());
                report.barrier_batches += 1;
                report.image_barriers += barriers.image_barrier_count();
                report.buffer_barriers += barriers.buffer_barrier_count();
            }

            let pass = &mut self.passes[pass_index];
            for &(handle, state) in &pass.resolved_states {
                self.resources.set_state(handle, state);
            }

            cmd.begin_label(&pass.name);
            if let Some(executor) = pass.executor.as_mut() {
                let mut ctx = FgPassContext {
                    cmd: &mut *cmd,
                    resources: &self.resources,
                    pass_name: &pass.name,
                };
                if let Err(err) = executor.execute(&mut ctx) {
                    cmd.end_label();
                    log::error!("FrameGraph: pass `{}` failed, skipping remaining passes: {}", pass.name, err);
                    return Err(err);
                }
            } else {
                log::warn!("FrameGraph: pass `{}` has no executor", pass.name);
            }
            cmd.end_label();

            report.passes_executed += 1;
        }

        Ok(report)
    }

    /// 从资源的当前状态出发，模拟执行顺序，计算每个 pass 需要的 barrier
    ///
    /// 返回值和 [`Self::execution_order`] 一一对应，不修改任何状态
    pub fn plan_barriers(&self) -> FgResult<Vec<FgPassBarriers>> {
        if !self.built {
            return Err(FgError::NotBuilt);
        }

        let mut states: SecondaryMap<FgResourceHandle, FgResourceState> = SecondaryMap::new();
        for (handle, node) in self.resources.iter() {
            states.insert(handle, node.state());
        }

        let mut plan = Vec::with_capacity(self.execution_order.len());
        for &pass_index in &self.execution_order {
            let pass = &self.passes[pass_index];
            let mut barriers = FgPassBarriers::new();

            for &(handle, required) in &pass.resolved_states {
                let node = self.resources.get(handle).ok_or_else(|| FgError::UnknownResource {
                    pass: pass.name.clone(),
                    handle,
                })?;
                let current = states.get(handle).copied().unwrap_or(FgResourceState::UNDEFINED);

                match (node.physical(), node.desc()) {
                    (FgPhysicalResource::Unbound, _) => {
                        return Err(FgError::UnboundResource {
                            pass: pass.name.clone(),
                            resource: node.name.clone(),
                        });
                    }
                    _ if !current.needs_barrier_to(&required) => {}
                    (FgPhysicalResource::Image(image), FgResourceDesc::Image(desc)) => {
                        barriers.image_barriers.push(FgImageBarrierDesc {
                            handle,
                            image,
                            aspect: desc.aspect(),
                            mip_levels: desc.mip_levels,
                            array_layers: desc.array_layers,
                            src_state: current,
                            dst_state: required,
                        });
                    }
                    (FgPhysicalResource::Buffer(buffer), FgResourceDesc::Buffer(_)) => {
                        barriers.buffer_barriers.push(FgBufferBarrierDesc {
                            handle,
                            buffer,
                            src_state: current,
                            dst_state: required,
                        });
                    }
                    (physical, desc) => {
                        let expected = match physical {
                            FgPhysicalResource::Image(_) => FgResourceKind::Image,
                            _ => FgResourceKind::Buffer,
                        };
                        return Err(FgError::BindingMismatch {
                            resource: node.name.clone(),
                            kind: desc.kind(),
                            expected,
                        });
                    }
                }

                states.insert(handle, required);
            }

            plan.push(barriers);
        }

        Ok(plan)
    }

    /// 释放所有资源和 pass，之前的句柄全部失效
    pub fn clear(&mut self) {
        self.resources.clear();
        self.passes.clear();
        self.execution_order.clear();
        self.dependency_graph = None;
        self.built = false;
    }
}

// getters
impl<'a> FrameGraph<'a> {
    #[inline]
    pub fn resource_handle(&self, name: &str) -> Option<FgResourceHandle> {
        self.resources.handle(name)
    }

    #[inline]
    pub fn resource(&self, handle: FgResourceHandle) -> Option<&FgResourceNode> {
        self.resources.get(handle)
    }

    #[inline]
    pub fn resource_state(&self, handle: FgResourceHandle) -> Option<FgResourceState> {
        self.resources.state(handle)
    }

    #[inline]
    pub fn resources(&self) -> &FgResourceTable {
        &self.resources
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn pass(&self, index: usize) -> Option<&FgPassNode<'a>> {
        self.passes.get(index)
    }

    #[inline]
    pub fn passes(&self) -> &[FgPassNode<'a>] {
        &self.passes
    }

    /// 排序后的 pass 声明序号，未 build 时为空
    #[inline]
    pub fn execution_order(&self) -> &[usize] {
        &self.execution_order
    }

    /// 按执行顺序排列的 pass 名称
    pub fn ordered_pass_names(&self) -> Vec<&str> {
        self.execution_order.iter().map(|&i| self.passes[i].name.as_str()).collect()
    }

    #[inline]
    pub fn dependency_graph(&self) -> Option<&FgDependencyGraph> {
        self.dependency_graph.as_ref()
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }
}
