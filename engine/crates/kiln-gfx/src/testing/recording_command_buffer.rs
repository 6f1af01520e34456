use ash::vk;

use crate::commands::barrier::GfxDependencyInfo;
use crate::commands::command_buffer::GfxCommandRecorder;

/// 录制下来的一条命令
#[derive(Clone, Debug)]
pub enum GfxRecordedCommand {
    PipelineBarrier(GfxDependencyInfo),
    FillBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        data: u32,
    },
    BindPipeline {
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: Vec<vk::DescriptorSet>,
    },
    PushConstants {
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DrawIndexedIndirect {
        buffer: vk::Buffer,
        draw_count: u32,
        stride: u32,
    },
    DrawIndexedIndirectCount {
        buffer: vk::Buffer,
        count_buffer: vk::Buffer,
        max_draw_count: u32,
        stride: u32,
    },
    BeginLabel(String),
    EndLabel,
}

/// 记录所有命令的 [`GfxCommandRecorder`]
#[derive(Default, Debug)]
pub struct GfxRecordingCommandBuffer {
    pub commands: Vec<GfxRecordedCommand>,
}

impl GfxRecordingCommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有 pipeline barrier 调用
    pub fn barriers(&self) -> Vec<&GfxDependencyInfo> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GfxRecordedCommand::PipelineBarrier(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    pub fn dispatches(&self) -> Vec<[u32; 3]> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GfxRecordedCommand::Dispatch { x, y, z } => Some([*x, *y, *z]),
                _ => None,
            })
            .collect()
    }

    /// label 的名字，按录制顺序
    pub fn labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GfxRecordedCommand::BeginLabel(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl GfxCommandRecorder for GfxRecordingCommandBuffer {
    fn pipeline_barrier(&mut self, dependency: &GfxDependencyInfo) {
        self.commands.push(GfxRecordedCommand::PipelineBarrier(dependency.clone()));
    }

    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32) {
        self.commands.push(GfxRecordedCommand::FillBuffer {
            buffer,
            offset,
            size,
            data,
        });
    }

    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.commands.push(GfxRecordedCommand::BindPipeline { bind_point, pipeline });
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        self.commands.push(GfxRecordedCommand::BindDescriptorSets {
            bind_point,
            layout,
            first_set,
            descriptor_sets: descriptor_sets.to_vec(),
        });
    }

    fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        self.commands.push(GfxRecordedCommand::PushConstants {
            layout,
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        self.commands.push(GfxRecordedCommand::Dispatch {
            x: group_count_x,
            y: group_count_y,
            z: group_count_z,
        });
    }

    fn draw_indexed_indirect(&mut self, buffer: vk::Buffer, _offset: vk::DeviceSize, draw_count: u32, stride: u32) {
        self.commands.push(GfxRecordedCommand::DrawIndexedIndirect {
            buffer,
            draw_count,
            stride,
        });
    }

    fn draw_indexed_indirect_count(
        &mut self,
        buffer: vk::Buffer,
        _offset: vk::DeviceSize,
        count_buffer: vk::Buffer,
        _count_offset: vk::DeviceSize,
        max_draw_count: u32,
        stride: u32,
    ) {
        self.commands.push(GfxRecordedCommand::DrawIndexedIndirectCount {
            buffer,
            count_buffer,
            max_draw_count,
            stride,
        });
    }

    fn begin_label(&mut self, label_name: &str) {
        self.commands.push(GfxRecordedCommand::BeginLabel(label_name.to_string()));
    }

    fn end_label(&mut self) {
        self.commands.push(GfxRecordedCommand::EndLabel);
    }
}
