//! 帧图的调试输出
//!
//! - [`FrameGraph::print_execution_plan`]：通过 log 打印执行顺序和每个 pass 的 barrier
//! - [`FrameGraph::to_dot`]：导出 Graphviz 格式的 pass / 资源关系图

use std::fmt::Write as _;
use std::path::Path;

use ash::vk;
use itertools::Itertools;

use crate::frame_graph::barrier::FgPassBarriers;
use crate::frame_graph::graph::FrameGraph;
use crate::frame_graph::resource::FgResourceKind;
use crate::frame_graph::resource_state::FgAccess;

const STAGE_NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
    (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
    (vk::PipelineStageFlags2::DRAW_INDIRECT, "DRAW_INDIRECT"),
    (vk::PipelineStageFlags2::VERTEX_INPUT, "VERTEX_INPUT"),
    (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
    (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
    (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
    (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
    (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
    (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
    (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
    (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
    (vk::PipelineStageFlags2::ALL_GRAPHICS, "ALL_GRAPHICS"),
    (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
];

const ACCESS_NAMES: &[(vk::AccessFlags2, &str)] = &[
    (vk::AccessFlags2::INDIRECT_COMMAND_READ, "INDIRECT_CMD_READ"),
    (vk::AccessFlags2::INDEX_READ, "INDEX_READ"),
    (vk::AccessFlags2::VERTEX_ATTRIBUTE_READ, "VERTEX_ATTR_READ"),
    (vk::AccessFlags2::UNIFORM_READ, "UNIFORM_READ"),
    (vk::AccessFlags2::SHADER_SAMPLED_READ, "SHADER_SAMPLED_READ"),
    (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
    (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
    (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
    (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
    (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
    (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
    (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
    (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
    (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
    (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
];

/// 格式化 PipelineStageFlags2 为可读字符串
pub(crate) fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
    let names = STAGE_NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| name).join(" | ");
    if names.is_empty() { format!("{:?}", stage) } else { names }
}

/// 格式化 AccessFlags2 为可读字符串
pub(crate) fn format_access_flags(access: vk::AccessFlags2) -> String {
    if access == vk::AccessFlags2::NONE {
        return "NONE".to_string();
    }
    let names = ACCESS_NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| name).join(" | ");
    if names.is_empty() { format!("{:?}", access) } else { names }
}

// 调试方法
impl FrameGraph<'_> {
    /// 打印执行计划，不修改任何资源状态
    pub fn print_execution_plan(&self) {
        let plan = match self.plan_barriers() {
            Ok(plan) => plan,
            Err(err) => {
                log::warn!("FrameGraph: cannot print execution plan: {}", err);
                return;
            }
        };

        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              FrameGraph Execution Plan                           ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Passes: {:<4} Resources: {:<4}                                     ║",
            self.pass_count(),
            self.resources().len()
        );
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        let total = self.execution_order().len();
        for (order, (&pass_index, barriers)) in self.execution_order().iter().zip(plan.iter()).enumerate() {
            let Some(pass) = self.pass(pass_index) else {
                continue;
            };

            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ [{}/{}] Pass: \"{}\"", order + 1, total, pass.name());
            log::info!("├─────────────────────────────────────────────────────────────────┤");

            for usage in pass.usages() {
                let direction = match usage.access {
                    FgAccess::Read => "read ",
                    FgAccess::Write => "write",
                };
                log::info!(
                    "│ {} {:?} \"{}\"",
                    direction,
                    usage.usage,
                    self.resources().name(usage.handle)
                );
            }

            self.print_pass_barriers(barriers);
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        log::info!("");
        log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
    }

    fn print_pass_barriers(&self, barriers: &FgPassBarriers) {
        if !barriers.has_barriers() {
            log::info!("│ No barriers required");
            return;
        }

        log::info!("├─────────────────────────────────────────────────────────────────┤");
        log::info!(
            "│ Barriers: {} image, {} buffer",
            barriers.image_barrier_count(),
            barriers.buffer_barrier_count()
        );
        for barrier in &barriers.image_barriers {
            log::info!("│   Image \"{}\":", self.resources().name(barrier.handle));
            log::info!("│       Layout: {:?} -> {:?}", barrier.src_state.layout, barrier.dst_state.layout);
            log::info!(
                "│       Stage:  {} -> {}",
                format_pipeline_stage(barrier.src_state.stage),
                format_pipeline_stage(barrier.dst_state.stage)
            );
            log::info!(
                "│       Access: {} -> {}",
                format_access_flags(barrier.src_state.src_access()),
                format_access_flags(barrier.dst_state.access)
            );
            log::info!("│       Aspect: {:?}", barrier.aspect);
        }
        for barrier in &barriers.buffer_barriers {
            log::info!("│   Buffer \"{}\":", self.resources().name(barrier.handle));
            log::info!(
                "│       Stage:  {} -> {}",
                format_pipeline_stage(barrier.src_state.stage),
                format_pipeline_stage(barrier.dst_state.stage)
            );
            log::info!(
                "│       Access: {} -> {}",
                format_access_flags(barrier.src_state.src_access()),
                format_access_flags(barrier.dst_state.access)
            );
        }
    }

    /// 导出 Graphviz 格式
    ///
    /// pass 为方框，image 为椭圆，buffer 为圆柱；资源 -> pass 表示读取，pass -> 资源 表示写入
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph FrameGraph {{");
        let _ = writeln!(dot, "    rankdir=LR;");

        for (index, pass) in self.passes().iter().enumerate() {
            let label = match pass.execution_order() {
                Some(order) => format!("{} (#{})", pass.name(), order),
                None => pass.name().to_string(),
            };
            let _ = writeln!(dot, "    pass_{} [shape=box, label=\"{}\"];", index, escape(&label));
        }

        // 按名字排序，保证输出稳定
        let resources = self.resources().iter().sorted_by(|a, b| a.1.name().cmp(b.1.name())).collect_vec();
        let resource_ids = resources.iter().enumerate().map(|(id, (handle, _))| (*handle, id)).collect_vec();
        for (id, (_, node)) in resources.iter().enumerate() {
            let shape = match node.kind() {
                FgResourceKind::Image => "ellipse",
                FgResourceKind::Buffer => "cylinder",
            };
            let _ = writeln!(dot, "    res_{} [shape={}, label=\"{}\"];", id, shape, escape(node.name()));
        }

        for (index, pass) in self.passes().iter().enumerate() {
            for usage in pass.usages().iter().unique_by(|u| (u.handle, u.access)) {
                let Some(&(_, id)) = resource_ids.iter().find(|(handle, _)| *handle == usage.handle) else {
                    continue;
                };
                match usage.access {
                    FgAccess::Read => {
                        let _ = writeln!(dot, "    res_{} -> pass_{} [label=\"{:?}\"];", id, index, usage.usage);
                    }
                    FgAccess::Write => {
                        let _ = writeln!(dot, "    pass_{} -> res_{} [label=\"{:?}\"];", index, id, usage.usage);
                    }
                }
            }
        }

        let _ = writeln!(dot, "}}");
        dot
    }

    /// 把 [`Self::to_dot`] 的结果写入文件
    pub fn dump_graph(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_dot())?;
        log::info!("FrameGraph dumped to {}", path.display());
        Ok(())
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;
    use crate::frame_graph::resource::{FgBufferDesc, FgImageDesc};
    use crate::frame_graph::resource_state::FgResourceState;

    #[test]
    fn test_format_flags() {
        assert_eq!(format_access_flags(vk::AccessFlags2::NONE), "NONE");
        assert_eq!(
            format_access_flags(FgResourceState::STORAGE_BUFFER.access),
            "STORAGE_READ | STORAGE_WRITE"
        );
        assert_eq!(
            format_pipeline_stage(FgResourceState::DEPTH_ATTACHMENT_WRITE.stage),
            "EARLY_FRAGMENT_TESTS | LATE_FRAGMENT_TESTS"
        );
    }

    #[test]
    fn test_print_plan_does_not_mutate_state() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut graph = FrameGraph::new();
        let color = graph.import_image(
            "color",
            FgImageDesc::default(),
            vk::Image::from_raw(1),
            FgResourceState::UNDEFINED,
        );
        graph.add_pass("draw").add_color_output(color);

        // 未 build 时只打印警告
        graph.print_execution_plan();

        graph.build().unwrap();
        graph.print_execution_plan();
        assert_eq!(graph.resource_state(color), Some(FgResourceState::UNDEFINED));
    }

    #[test]
    fn test_to_dot() {
        let mut graph = FrameGraph::new();
        let color = graph.add_image("color", FgImageDesc::default());
        let params = graph.add_buffer("params", FgBufferDesc::new(64, vk::BufferUsageFlags::UNIFORM_BUFFER));
        graph.add_pass("draw").add_uniform_buffer(params).add_color_output(color);
        graph.add_pass("present").add_sampled_image(color);
        graph.build().unwrap();

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph FrameGraph {"));
        assert!(dot.contains("pass_0 [shape=box, label=\"draw (#0)\"]"));
        // 资源按名字排序：color 为 res_0，params 为 res_1
        assert!(dot.contains("res_0 [shape=ellipse, label=\"color\"]"));
        assert!(dot.contains("res_1 [shape=cylinder, label=\"params\"]"));
        assert!(dot.contains("res_1 -> pass_0 [label=\"UniformBuffer\"]"));
        assert!(dot.contains("pass_0 -> res_0 [label=\"ColorAttachment\"]"));
        assert!(dot.contains("res_0 -> pass_1 [label=\"Sampled\"]"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
