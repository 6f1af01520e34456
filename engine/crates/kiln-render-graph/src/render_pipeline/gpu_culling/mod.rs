//! GPU 视锥剔除
//!
//! 每帧把物体的包围盒上传到 GPU，由 compute shader 测试六个视锥平面，
//! 为可见物体生成 `VkDrawIndexedIndirectCommand`，之后的绘制 pass 通过
//! `draw_indexed_indirect_count` 消费。
//!
//! 对应的 shader 位于 `shader/src/gpu_culling/frustum_cull.comp`。

mod cull_object;
mod culling_pass;
mod culling_pipeline;
mod error;
mod frustum;

pub use cull_object::{BoundingBox, CullableObject, GpuCullObject, GpuCullParams, GpuDrawIndexedIndirect};
pub use culling_pass::GpuCullingPass;
pub use culling_pipeline::{CullingOutput, CullingStats, GpuCullingPipeline, GpuCullingState};
pub use error::{CullingError, CullingResult};
pub use frustum::FrustumPlanes;
