use ash::vk;
use glam::Mat4;
use kiln_render_interface::frame_counter::FrameLabel;

use crate::frame_graph::{
    FgBufferDesc, FgPass, FgPassContext, FgPassNode, FgResourceHandle, FgResourceState, FgResult, FrameGraph,
};
use crate::render_pipeline::gpu_culling::cull_object::GpuDrawIndexedIndirect;
use crate::render_pipeline::gpu_culling::culling_pipeline::{CullingOutput, GpuCullingPipeline};

/// 把 [`GpuCullingPipeline`] 接入帧图的 pass
///
/// pass 写入 draw buffer 和 count buffer，之后读取它们的 indirect draw pass
/// 会被自动排在后面
pub struct GpuCullingPass<'p> {
    pipeline: &'p mut GpuCullingPipeline,
    frame_label: FrameLabel,
    view: Mat4,
    proj: Mat4,

    draw_buffer: Option<FgResourceHandle>,
    count_buffer: Option<FgResourceHandle>,
}

impl<'p> GpuCullingPass<'p> {
    pub fn new(pipeline: &'p mut GpuCullingPipeline, frame_label: FrameLabel, view: Mat4, proj: Mat4) -> Self {
        Self {
            pipeline,
            frame_label,
            view,
            proj,
            draw_buffer: None,
            count_buffer: None,
        }
    }

    /// 声明剔除结果在帧图中对应的资源
    pub fn with_outputs(mut self, draw_buffer: FgResourceHandle, count_buffer: FgResourceHandle) -> Self {
        self.draw_buffer = Some(draw_buffer);
        self.count_buffer = Some(count_buffer);
        self
    }

    /// 将剔除结果的两个 buffer 导入帧图，返回 (draw buffer, count buffer)
    pub fn import_outputs(graph: &mut FrameGraph<'_>, output: &CullingOutput) -> (FgResourceHandle, FgResourceHandle) {
        let indirect_usage = vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER;
        let draw_buffer = graph.import_buffer(
            "gpu-culling-draws",
            FgBufferDesc::new(
                output.max_draw_count as vk::DeviceSize * size_of::<GpuDrawIndexedIndirect>() as vk::DeviceSize,
                indirect_usage,
            ),
            output.draw_buffer,
            FgResourceState::UNDEFINED,
        );
        let count_buffer = graph.import_buffer(
            "gpu-culling-count",
            FgBufferDesc::new(
                size_of::<u32>() as vk::DeviceSize,
                indirect_usage | vk::BufferUsageFlags::TRANSFER_DST,
            ),
            output.count_buffer,
            FgResourceState::UNDEFINED,
        );
        (draw_buffer, count_buffer)
    }
}

impl FgPass for GpuCullingPass<'_> {
    fn setup(&mut self, node: &mut FgPassNode<'_>) {
        if let Some(draw_buffer) = self.draw_buffer {
            node.add_storage_buffer(draw_buffer);
        }
        if let Some(count_buffer) = self.count_buffer {
            node.add_storage_buffer(count_buffer);
        }
    }

    /// 剔除失败时返回错误，依赖剔除结果的 pass 不会再执行
    fn execute(&mut self, ctx: &mut FgPassContext<'_>) -> FgResult<()> {
        self.pipeline
            .execute_culling(self.frame_label, &self.view, &self.proj, ctx.cmd)
            .map(|_| ())
            .map_err(|err| ctx.fail(err))
    }
}
