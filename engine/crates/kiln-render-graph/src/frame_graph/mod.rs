//! 帧图 (Frame Graph)
//!
//! 每帧的使用流程：
//! 1. 声明资源（[`FrameGraph::add_resource`] / `import_*`）
//! 2. 声明 pass 及其对资源的使用方式（[`FrameGraph::add_pass`]）
//! 3. [`FrameGraph::build`]：根据读写关系建立依赖，拓扑排序
//! 4. [`FrameGraph::execute`]：按顺序为每个 pass 计算并批量插入 barrier，然后执行 pass 的回调
//!
//! # 使用示例
//! ```ignore
//! let mut graph = FrameGraph::new();
//! let gbuffer = graph.import_image("gbuffer", FgImageDesc::default(), image, FgResourceState::UNDEFINED);
//! let output = graph.import_image("output", FgImageDesc::default(), out_image, FgResourceState::UNDEFINED);
//!
//! graph.add_pass("geometry").add_color_output(gbuffer).set_execute(|ctx| {
//!     // 录制绘制命令
//!     Ok(())
//! });
//! graph.add_pass("lighting").add_sampled_image(gbuffer).add_storage_image(output).set_execute(|ctx| {
//!     ctx.cmd.dispatch(120, 68, 1);
//!     Ok(())
//! });
//!
//! graph.build()?;
//! graph.execute(&mut cmd)?;
//! ```

mod barrier;
mod debug;
mod dependency_graph;
mod error;
mod graph;
mod handle;
mod pass;
mod resource;
mod resource_state;
mod resource_table;

pub use barrier::{FgBufferBarrierDesc, FgImageBarrierDesc, FgPassBarriers};
pub use dependency_graph::FgDependencyGraph;
pub use error::{FgError, FgResult};
pub use graph::{FgExecutionReport, FrameGraph};
pub use handle::FgResourceHandle;
pub use pass::{FgPass, FgPassContext, FgPassExecutor, FgPassNode, FgResourceUsage};
pub use resource::{FgBufferDesc, FgImageDesc, FgPhysicalResource, FgResourceDesc, FgResourceKind, FgResourceNode};
pub use resource_state::{FgAccess, FgResourceState, FgUsage};
pub use resource_table::FgResourceTable;
