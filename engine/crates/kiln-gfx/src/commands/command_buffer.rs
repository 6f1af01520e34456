use ash::vk;

use crate::commands::barrier::GfxDependencyInfo;

/// 命令录制上下文
///
/// 渲染核心只通过这个 trait 录制命令。真实实现为 [`GfxCommandBuffer`]，
/// 测试使用 `testing::GfxRecordingCommandBuffer` 记录每一条命令。
pub trait GfxCommandRecorder {
    /// 将所有 barrier 合并为一次 pipeline barrier
    ///
    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    fn pipeline_barrier(&mut self, dependency: &GfxDependencyInfo);

    /// - command type: action
    /// - supported queue types: graphics, compute, transfer
    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32);

    /// - command type: state
    /// - supported queue types: graphics, compute
    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);

    /// - command type: state
    /// - supported queue types: graphics, compute
    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    );

    /// - command type: state
    /// - supported queue types: graphics, compute
    fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]);

    /// - command type: action
    /// - supported queue types: compute
    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32);

    /// - command type: action
    /// - supported queue types: graphics
    fn draw_indexed_indirect(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, draw_count: u32, stride: u32);

    /// - command type: action
    /// - supported queue types: graphics
    fn draw_indexed_indirect_count(
        &mut self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        count_buffer: vk::Buffer,
        count_offset: vk::DeviceSize,
        max_draw_count: u32,
        stride: u32,
    );

    /// - command type: state, action
    /// - supported queue type: graphics, compute
    fn begin_label(&mut self, _label_name: &str) {}

    /// - command type: state, action
    /// - supported queue type: graphics, compute
    fn end_label(&mut self) {}
}

/// 命令缓冲封装
///
/// 封装 Vulkan CommandBuffer。command buffer 的分配、begin/end 与提交由外部负责，
/// 这里只负责录制。
///
/// # 使用示例
/// ```ignore
/// let mut cmd = GfxCommandBuffer::new(device.clone(), vk_cmd);
/// frame_graph.execute(&mut cmd)?;
/// ```
#[derive(Clone)]
pub struct GfxCommandBuffer {
    device: ash::Device,
    vk_handle: vk::CommandBuffer,
    debug_utils: Option<ash::ext::debug_utils::Device>,
}

// new & init
impl GfxCommandBuffer {
    pub fn new(device: ash::Device, vk_handle: vk::CommandBuffer) -> Self {
        Self {
            device,
            vk_handle,
            debug_utils: None,
        }
    }

    /// 开启 debug label
    pub fn with_debug_utils(mut self, debug_utils: ash::ext::debug_utils::Device) -> Self {
        self.debug_utils = Some(debug_utils);
        self
    }
}

// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}

impl GfxCommandRecorder for GfxCommandBuffer {
    #[inline]
    fn pipeline_barrier(&mut self, dependency: &GfxDependencyInfo) {
        if dependency.is_empty() {
            return;
        }
        let memory_barriers = dependency.memory_barriers.iter().map(|b| *b.inner()).collect::<Vec<_>>();
        let buffer_barriers = dependency.buffer_barriers.iter().map(|b| *b.inner()).collect::<Vec<_>>();
        let image_barriers = dependency.image_barriers.iter().map(|b| *b.inner()).collect::<Vec<_>>();
        let dependency_info = vk::DependencyInfo::default()
            .memory_barriers(&memory_barriers)
            .buffer_memory_barriers(&buffer_barriers)
            .image_memory_barriers(&image_barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }

    #[inline]
    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32) {
        unsafe {
            self.device.cmd_fill_buffer(self.vk_handle, buffer, offset, size, data);
        }
    }

    #[inline]
    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(self.vk_handle, bind_point, pipeline);
        }
    }

    #[inline]
    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(self.vk_handle, bind_point, layout, first_set, descriptor_sets, &[]);
        }
    }

    #[inline]
    fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        unsafe {
            self.device.cmd_push_constants(self.vk_handle, layout, stages, offset, data);
        }
    }

    #[inline]
    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        unsafe {
            self.device.cmd_dispatch(self.vk_handle, group_count_x, group_count_y, group_count_z);
        }
    }

    #[inline]
    fn draw_indexed_indirect(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, draw_count: u32, stride: u32) {
        unsafe {
            self.device.cmd_draw_indexed_indirect(self.vk_handle, buffer, offset, draw_count, stride);
        }
    }

    #[inline]
    fn draw_indexed_indirect_count(
        &mut self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        count_buffer: vk::Buffer,
        count_offset: vk::DeviceSize,
        max_draw_count: u32,
        stride: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed_indirect_count(
                self.vk_handle,
                buffer,
                offset,
                count_buffer,
                count_offset,
                max_draw_count,
                stride,
            );
        }
    }

    fn begin_label(&mut self, label_name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = std::ffi::CString::new(label_name) else {
            return;
        };
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()),
            );
        }
    }

    fn end_label(&mut self) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(self.vk_handle);
            }
        }
    }
}
