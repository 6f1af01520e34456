use std::path::Path;
use std::rc::Rc;

use ash::vk;
use glam::Mat4;
use itertools::Itertools;
use kiln_gfx::commands::barrier::{GfxBarrierMask, GfxDependencyInfo, GfxMemoryBarrier};
use kiln_gfx::commands::command_buffer::GfxCommandRecorder;
use kiln_gfx::descriptors::descriptor_set::{
    GfxDescriptorBinding, GfxDescriptorPoolDesc, GfxDescriptorSetLayoutDesc, GfxWriteDescriptorSet,
};
use kiln_gfx::foundation::device::GfxDevice;
use kiln_gfx::pipelines::compute_pipeline::{GfxComputePipeline, GfxComputePipelineDesc, GfxSpecializationConstant};
use kiln_gfx::resources::buffer::{GfxBuffer, GfxBufferDesc, GfxMemoryLocation};
use kiln_gfx::{GfxError, profile_scope};
use kiln_render_interface::frame_counter::{FrameCounter, FrameLabel};
use kiln_render_interface::render_settings::CullingSettings;

use crate::render_pipeline::gpu_culling::cull_object::{
    CullableObject, GpuCullObject, GpuCullParams, GpuDrawIndexedIndirect,
};
use crate::render_pipeline::gpu_culling::error::{CullingError, CullingResult};
use crate::render_pipeline::gpu_culling::frustum::FrustumPlanes;

/// shader 中的 binding 编号
mod binding {
    pub const OBJECTS: u32 = 0;
    pub const DRAW_COMMANDS: u32 = 1;
    pub const FRUSTUM: u32 = 2;
    pub const DRAW_COUNT: u32 = 3;
}

/// shader 中 `local_size_x_id` 对应的 specialization constant
const WORKGROUP_SIZE_CONSTANT_ID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuCullingState {
    Uninitialized,
    Ready,
    Shutdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullingStats {
    pub total_objects: u32,
    pub visible_objects: u32,
    pub culled_objects: u32,
}

/// 一次剔除的结果，供后续的 indirect draw 使用
///
/// 实际的 draw 数量由 GPU 写入 `count_buffer`，`max_draw_count` 是上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CullingOutput {
    pub draw_buffer: vk::Buffer,
    pub count_buffer: vk::Buffer,
    pub max_draw_count: u32,
    pub stride: u32,
}
impl CullingOutput {
    /// 录制 `vkCmdDrawIndexedIndirectCount`，需要在剔除之后的 barrier 之后调用
    pub fn record_draw(&self, cmd: &mut dyn GfxCommandRecorder) {
        if self.max_draw_count == 0 {
            return;
        }
        cmd.draw_indexed_indirect_count(self.draw_buffer, 0, self.count_buffer, 0, self.max_draw_count, self.stride);
    }
}

/// 每个 frame in flight 独占的一组资源
struct CullingFrame {
    object_buffer: GfxBuffer,
    draw_buffer: GfxBuffer,
    count_buffer: GfxBuffer,
    frustum_buffer: GfxBuffer,
    descriptor_set: vk::DescriptorSet,
    object_count: u32,
    /// 该帧最近一次 submit / read_stats 的结果
    stats: CullingStats,
}
impl CullingFrame {
    fn output(&self) -> CullingOutput {
        CullingOutput {
            draw_buffer: self.draw_buffer.handle(),
            count_buffer: self.count_buffer.handle(),
            max_draw_count: self.object_count,
            stride: size_of::<GpuDrawIndexedIndirect>() as u32,
        }
    }

    fn destroy(self, device: &dyn GfxDevice) {
        device.destroy_buffer(self.object_buffer);
        device.destroy_buffer(self.draw_buffer);
        device.destroy_buffer(self.count_buffer);
        device.destroy_buffer(self.frustum_buffer);
    }
}

/// 基于 compute shader 的视锥剔除
///
/// CPU 每帧提交物体列表，shader 对每个物体做 AABB-视锥测试，
/// 并把可见物体的 indirect draw 命令紧凑地写入 draw buffer
pub struct GpuCullingPipeline {
    device: Rc<dyn GfxDevice>,
    settings: CullingSettings,
    state: GpuCullingState,

    set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    pipeline: Option<GfxComputePipeline>,
    frames: Vec<CullingFrame>,
}

// new & init
impl GpuCullingPipeline {
    pub fn new(device: Rc<dyn GfxDevice>, settings: CullingSettings) -> Self {
        Self {
            device,
            settings,
            state: GpuCullingState::Uninitialized,
            set_layout: vk::DescriptorSetLayout::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            pipeline: None,
            frames: Vec::with_capacity(FrameCounter::fif_count()),
        }
    }

    /// 创建所有 GPU 资源
    ///
    /// 失败时已创建的资源会保留到 `shutdown` 或者下一次 `initialize` 时释放
    pub fn initialize(&mut self, spirv: &[u32]) -> CullingResult<()> {
        if self.state != GpuCullingState::Uninitialized {
            return Err(self.invalid_state("initialize"));
        }
        log::info!("Initializing GPU culling pipeline...");

        self.release_resources();
        self.create_frames()?;
        self.create_descriptors()?;
        self.create_pipeline(spirv)?;

        self.state = GpuCullingState::Ready;
        log::info!(
            "GPU culling pipeline initialized: max objects {}, workgroup size {}",
            self.settings.max_objects,
            self.settings.workgroup_size
        );
        Ok(())
    }

    /// 从 `.spv` 文件读取 shader 并初始化
    pub fn initialize_from_file(&mut self, path: impl AsRef<Path>) -> CullingResult<()> {
        let path = path.as_ref();
        let shader_load_error = |source| CullingError::ShaderLoad {
            path: path.display().to_string(),
            source,
        };
        let mut file = std::fs::File::open(path).map_err(shader_load_error)?;
        let spirv = ash::util::read_spv(&mut file).map_err(shader_load_error)?;
        self.initialize(&spirv)
    }

    fn create_frames(&mut self) -> CullingResult<()> {
        let max_objects = self.settings.max_objects.max(1) as vk::DeviceSize;
        for frame_label in FrameCounter::frame_labels() {
            let descs = [
                GfxBufferDesc::new(
                    max_objects * size_of::<GpuCullObject>() as vk::DeviceSize,
                    vk::BufferUsageFlags::STORAGE_BUFFER,
                    GfxMemoryLocation::HostVisible,
                    format!("gpu-culling-objects-{frame_label}"),
                ),
                GfxBufferDesc::new(
                    max_objects * size_of::<GpuDrawIndexedIndirect>() as vk::DeviceSize,
                    vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER,
                    GfxMemoryLocation::DeviceLocal,
                    format!("gpu-culling-draws-{frame_label}"),
                ),
                GfxBufferDesc::new(
                    size_of::<u32>() as vk::DeviceSize,
                    vk::BufferUsageFlags::STORAGE_BUFFER
                        | vk::BufferUsageFlags::INDIRECT_BUFFER
                        | vk::BufferUsageFlags::TRANSFER_DST,
                    GfxMemoryLocation::HostVisible,
                    format!("gpu-culling-count-{frame_label}"),
                ),
                GfxBufferDesc::new(
                    size_of::<FrustumPlanes>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    GfxMemoryLocation::HostVisible,
                    format!("gpu-culling-frustum-{frame_label}"),
                ),
            ];

            let mut buffers = Vec::with_capacity(descs.len());
            for desc in &descs {
                match self.device.create_buffer(desc) {
                    Ok(buffer) => buffers.push(buffer),
                    Err(err) => {
                        log::error!("Failed to create buffer {}: {:?}", desc.name, err);
                        buffers.into_iter().for_each(|buffer| self.device.destroy_buffer(buffer));
                        return Err(err.into());
                    }
                }
            }

            let [object_buffer, draw_buffer, count_buffer, frustum_buffer] =
                <[GfxBuffer; 4]>::try_from(buffers).map_err(|_| GfxError::Vulkan {
                    call: "vkCreateBuffer",
                    result: vk::Result::ERROR_UNKNOWN,
                })?;
            self.frames.push(CullingFrame {
                object_buffer,
                draw_buffer,
                count_buffer,
                frustum_buffer,
                descriptor_set: vk::DescriptorSet::null(),
                object_count: 0,
                stats: CullingStats::default(),
            });
        }
        Ok(())
    }

    fn create_descriptors(&mut self) -> CullingResult<()> {
        let stages = vk::ShaderStageFlags::COMPUTE;
        self.set_layout = self.device.create_descriptor_set_layout(&GfxDescriptorSetLayoutDesc {
            name: "gpu-culling".to_string(),
            flags: vk::DescriptorSetLayoutCreateFlags::empty(),
            bindings: vec![
                GfxDescriptorBinding::new(binding::OBJECTS, vk::DescriptorType::STORAGE_BUFFER, 1, stages),
                GfxDescriptorBinding::new(binding::DRAW_COMMANDS, vk::DescriptorType::STORAGE_BUFFER, 1, stages),
                GfxDescriptorBinding::new(binding::FRUSTUM, vk::DescriptorType::UNIFORM_BUFFER, 1, stages),
                GfxDescriptorBinding::new(binding::DRAW_COUNT, vk::DescriptorType::STORAGE_BUFFER, 1, stages),
            ],
        })?;

        let fif_count = FrameCounter::fif_count() as u32;
        self.descriptor_pool = self.device.create_descriptor_pool(&GfxDescriptorPoolDesc {
            name: "gpu-culling".to_string(),
            flags: vk::DescriptorPoolCreateFlags::empty(),
            max_sets: fif_count,
            pool_sizes: vec![
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::STORAGE_BUFFER,
                    descriptor_count: 3 * fif_count,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: fif_count,
                },
            ],
        })?;

        let layouts = vec![self.set_layout; self.frames.len()];
        let sets = self.device.allocate_descriptor_sets(self.descriptor_pool, &layouts)?;

        let mut writes = Vec::with_capacity(4 * self.frames.len());
        for (frame, set) in self.frames.iter_mut().zip_eq(sets) {
            frame.descriptor_set = set;
            writes.extend([
                GfxWriteDescriptorSet::buffers(
                    set,
                    binding::OBJECTS,
                    vk::DescriptorType::STORAGE_BUFFER,
                    vec![frame.object_buffer.descriptor_info()],
                ),
                GfxWriteDescriptorSet::buffers(
                    set,
                    binding::DRAW_COMMANDS,
                    vk::DescriptorType::STORAGE_BUFFER,
                    vec![frame.draw_buffer.descriptor_info()],
                ),
                GfxWriteDescriptorSet::buffers(
                    set,
                    binding::FRUSTUM,
                    vk::DescriptorType::UNIFORM_BUFFER,
                    vec![frame.frustum_buffer.descriptor_info()],
                ),
                GfxWriteDescriptorSet::buffers(
                    set,
                    binding::DRAW_COUNT,
                    vk::DescriptorType::STORAGE_BUFFER,
                    vec![frame.count_buffer.descriptor_info()],
                ),
            ]);
        }
        self.device.write_descriptor_sets(&writes);
        Ok(())
    }

    fn create_pipeline(&mut self, spirv: &[u32]) -> CullingResult<()> {
        let pipeline = self.device.create_compute_pipeline(&GfxComputePipelineDesc {
            name: "gpu-culling".to_string(),
            spirv,
            entry_point: c"main",
            set_layouts: vec![self.set_layout],
            push_constant_ranges: vec![vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::COMPUTE,
                offset: 0,
                size: size_of::<GpuCullParams>() as u32,
            }],
            specialization_constants: vec![GfxSpecializationConstant::new(
                WORKGROUP_SIZE_CONSTANT_ID,
                self.workgroup_size(),
            )],
        })?;
        self.pipeline = Some(pipeline);
        Ok(())
    }
}

// destroy
impl GpuCullingPipeline {
    /// 释放所有资源，之后不能再使用；重复调用没有副作用
    pub fn shutdown(&mut self) {
        if self.state == GpuCullingState::Shutdown {
            return;
        }
        self.release_resources();
        self.state = GpuCullingState::Shutdown;
        log::info!("GPU culling pipeline shut down");
    }

    fn release_resources(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            self.device.destroy_compute_pipeline(pipeline);
        }
        // descriptor set 随 pool 一起释放
        if self.descriptor_pool != vk::DescriptorPool::null() {
            self.device.destroy_descriptor_pool(self.descriptor_pool);
            self.descriptor_pool = vk::DescriptorPool::null();
        }
        if self.set_layout != vk::DescriptorSetLayout::null() {
            self.device.destroy_descriptor_set_layout(self.set_layout);
            self.set_layout = vk::DescriptorSetLayout::null();
        }
        for frame in self.frames.drain(..) {
            frame.destroy(self.device.as_ref());
        }
    }
}
impl Drop for GpuCullingPipeline {
    fn drop(&mut self) {
        log::info!("Dropping GpuCullingPipeline");
        self.shutdown();
    }
}

// tools
impl GpuCullingPipeline {
    /// 上传本帧需要剔除的物体，返回实际提交的数量
    ///
    /// 超过 `max_objects` 的部分会被丢弃
    pub fn submit_objects(&mut self, frame_label: FrameLabel, objects: &[CullableObject]) -> CullingResult<u32> {
        profile_scope!("GpuCullingPipeline::submit_objects");
        self.ensure_ready("submit objects")?;

        let max_objects = self.settings.max_objects as usize;
        if objects.len() > max_objects {
            log::warn!("Too many objects for GPU culling: {}, truncating to {}", objects.len(), max_objects);
        }
        let count = objects.len().min(max_objects);
        let gpu_objects = objects[..count].iter().map(GpuCullObject::from).collect_vec();

        let frame = self.frames.get_mut(*frame_label).ok_or(CullingError::InvalidState {
            operation: "submit objects",
            state: self.state,
        })?;
        if !gpu_objects.is_empty() {
            self.device.write_buffer(&frame.object_buffer, 0, bytemuck::cast_slice(&gpu_objects))?;
        }
        frame.object_count = count as u32;
        frame.stats = CullingStats {
            total_objects: count as u32,
            ..Default::default()
        };
        Ok(count as u32)
    }

    /// 录制剔除命令
    ///
    /// 命令顺序：清零计数 -> barrier -> dispatch -> barrier。
    /// 最后的 barrier 让 indirect draw 和 host 读回都能看到 shader 的写入。
    /// 没有物体时不录制任何命令。
    pub fn execute_culling(
        &mut self,
        frame_label: FrameLabel,
        view: &Mat4,
        proj: &Mat4,
        cmd: &mut dyn GfxCommandRecorder,
    ) -> CullingResult<CullingOutput> {
        profile_scope!("GpuCullingPipeline::execute_culling");
        self.ensure_ready("execute culling")?;
        let pipeline = self.pipeline.ok_or(self.invalid_state("execute culling"))?;
        let frame = self.frames.get(*frame_label).ok_or(self.invalid_state("execute culling"))?;

        let frustum = FrustumPlanes::from_view_proj(*proj * *view, self.settings.depth_zero_to_one);
        self.device.write_buffer(&frame.frustum_buffer, 0, bytemuck::bytes_of(&frustum))?;

        let object_count = frame.object_count;
        if object_count == 0 {
            self.device.write_buffer(&frame.count_buffer, 0, bytemuck::bytes_of(&0u32))?;
            return Ok(frame.output());
        }

        cmd.begin_label("gpu-culling");

        cmd.fill_buffer(frame.count_buffer.handle(), 0, size_of::<u32>() as vk::DeviceSize, 0);
        cmd.pipeline_barrier(&GfxDependencyInfo {
            memory_barriers: vec![GfxMemoryBarrier::new().mask(GfxBarrierMask {
                src_stage: vk::PipelineStageFlags2::TRANSFER,
                dst_stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
                src_access: vk::AccessFlags2::TRANSFER_WRITE,
                dst_access: vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
            })],
            ..Default::default()
        });

        cmd.bind_pipeline(pipeline.bind_point(), pipeline.pipeline);
        cmd.bind_descriptor_sets(pipeline.bind_point(), pipeline.layout, 0, &[frame.descriptor_set]);
        cmd.push_constants(
            pipeline.layout,
            vk::ShaderStageFlags::COMPUTE,
            0,
            bytemuck::bytes_of(&GpuCullParams { object_count }),
        );
        cmd.dispatch(object_count.div_ceil(self.workgroup_size()), 1, 1);

        cmd.pipeline_barrier(&Self::culling_to_draw_barrier());

        cmd.end_label();
        Ok(frame.output())
    }

    /// dispatch 之后必须的 barrier
    fn culling_to_draw_barrier() -> GfxDependencyInfo {
        GfxDependencyInfo {
            memory_barriers: vec![GfxMemoryBarrier::new().mask(GfxBarrierMask {
                src_stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
                dst_stage: vk::PipelineStageFlags2::DRAW_INDIRECT
                    | vk::PipelineStageFlags2::VERTEX_SHADER
                    | vk::PipelineStageFlags2::HOST,
                src_access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
                dst_access: vk::AccessFlags2::INDIRECT_COMMAND_READ
                    | vk::AccessFlags2::SHADER_STORAGE_READ
                    | vk::AccessFlags2::HOST_READ,
            })],
            ..Default::default()
        }
    }

    /// 读回 GPU 写入的可见数量
    ///
    /// 需要在该帧的 fence 完成之后调用
    pub fn read_stats(&mut self, frame_label: FrameLabel) -> CullingResult<CullingStats> {
        self.ensure_ready("read stats")?;
        let invalid_state = self.invalid_state("read stats");
        let frame = self.frames.get_mut(*frame_label).ok_or(invalid_state)?;

        let mut bytes = [0u8; size_of::<u32>()];
        self.device.read_buffer(&frame.count_buffer, 0, &mut bytes)?;
        let total_objects = frame.object_count;
        let visible_objects = u32::from_ne_bytes(bytes).min(total_objects);

        frame.stats = CullingStats {
            total_objects,
            visible_objects,
            culled_objects: total_objects - visible_objects,
        };
        Ok(frame.stats)
    }

    /// 该帧最近一次 `submit_objects` 或 `read_stats` 得到的统计，不会访问 GPU
    ///
    /// 只调用过 `submit_objects` 时，`visible_objects` 和 `culled_objects` 为 0
    pub fn stats(&self, frame_label: FrameLabel) -> CullingResult<CullingStats> {
        self.ensure_ready("query stats")?;
        self.frames.get(*frame_label).map(|frame| frame.stats).ok_or(self.invalid_state("query stats"))
    }

    /// 该帧最近一次提交对应的输出
    pub fn output(&self, frame_label: FrameLabel) -> CullingResult<CullingOutput> {
        self.ensure_ready("query output")?;
        self.frames.get(*frame_label).map(CullingFrame::output).ok_or(self.invalid_state("query output"))
    }

    /// shader 的 workgroup 大小和 dispatch 使用同一个值
    #[inline]
    fn workgroup_size(&self) -> u32 {
        self.settings.workgroup_size.max(1)
    }

    fn ensure_ready(&self, operation: &'static str) -> CullingResult<()> {
        if self.state == GpuCullingState::Ready {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> CullingError {
        CullingError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

// getters
impl GpuCullingPipeline {
    #[inline]
    pub fn state(&self) -> GpuCullingState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == GpuCullingState::Ready
    }

    #[inline]
    pub fn settings(&self) -> &CullingSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use kiln_gfx::testing::{GfxRecordedCommand, GfxRecordingCommandBuffer, GfxRecordingDevice};

    use super::*;
    use crate::render_pipeline::gpu_culling::cull_object::BoundingBox;

    /// SPIR-V magic number
    const TEST_SPIRV: &[u32] = &[0x0723_0203];

    fn small_settings() -> CullingSettings {
        CullingSettings {
            max_objects: 8,
            workgroup_size: 4,
            depth_zero_to_one: true,
        }
    }

    fn create_pipeline(settings: CullingSettings) -> (Rc<GfxRecordingDevice>, GpuCullingPipeline) {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = Rc::new(GfxRecordingDevice::new());
        let mut pipeline = GpuCullingPipeline::new(device.clone(), settings);
        pipeline.initialize(TEST_SPIRV).unwrap();
        (device, pipeline)
    }

    fn objects(count: usize) -> Vec<CullableObject> {
        (0..count)
            .map(|i| CullableObject {
                bounds: BoundingBox::from_center(Vec3::new(i as f32, 0.0, -5.0), Vec3::splat(0.5)),
                mesh_index: i as u32,
                index_count: 36,
                first_index: 36 * i as u32,
                ..Default::default()
            })
            .collect()
    }

    fn camera() -> (Mat4, Mat4) {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        (view, proj)
    }

    #[test]
    fn test_state_errors() {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = Rc::new(GfxRecordingDevice::new());
        let mut pipeline = GpuCullingPipeline::new(device.clone(), small_settings());
        assert_eq!(pipeline.state(), GpuCullingState::Uninitialized);
        assert!(matches!(
            pipeline.submit_objects(FrameLabel::A, &objects(1)),
            Err(CullingError::InvalidState {
                state: GpuCullingState::Uninitialized,
                ..
            })
        ));

        pipeline.initialize(TEST_SPIRV).unwrap();
        assert!(pipeline.is_ready());
        assert!(matches!(pipeline.initialize(TEST_SPIRV), Err(CullingError::InvalidState { .. })));

        pipeline.shutdown();
        pipeline.shutdown();
        assert_eq!(pipeline.state(), GpuCullingState::Shutdown);
        assert_eq!(device.live_object_count(), 0);

        let (view, proj) = camera();
        let mut cmd = GfxRecordingCommandBuffer::new();
        assert!(matches!(
            pipeline.execute_culling(FrameLabel::A, &view, &proj, &mut cmd),
            Err(CullingError::InvalidState {
                state: GpuCullingState::Shutdown,
                ..
            })
        ));
        assert!(matches!(pipeline.initialize(TEST_SPIRV), Err(CullingError::InvalidState { .. })));
        assert!(cmd.commands.is_empty());
    }

    #[test]
    fn test_submit_truncates_to_max_objects() {
        let (device, mut pipeline) = create_pipeline(small_settings());

        assert_eq!(pipeline.submit_objects(FrameLabel::A, &objects(8)).unwrap(), 8);
        assert_eq!(pipeline.stats(FrameLabel::A).unwrap().total_objects, 8);

        assert_eq!(pipeline.submit_objects(FrameLabel::A, &objects(9)).unwrap(), 8);
        assert_eq!(pipeline.stats(FrameLabel::A).unwrap().total_objects, 8);
        assert_eq!(pipeline.output(FrameLabel::A).unwrap().max_draw_count, 8);

        let uploaded = device.host_memory(pipeline.frames[0].object_buffer.handle()).unwrap();
        let uploaded = uploaded
            .chunks_exact(size_of::<GpuCullObject>())
            .map(bytemuck::pod_read_unaligned::<GpuCullObject>)
            .collect_vec();
        assert_eq!(uploaded.len(), 8);
        assert_eq!(uploaded[7].mesh_index, 7);
        assert_eq!(uploaded[7].first_index, 36 * 7);
    }

    #[test]
    fn test_frames_are_independent() {
        let (_device, mut pipeline) = create_pipeline(small_settings());
        pipeline.submit_objects(FrameLabel::A, &objects(3)).unwrap();
        pipeline.submit_objects(FrameLabel::B, &objects(5)).unwrap();

        let output_a = pipeline.output(FrameLabel::A).unwrap();
        let output_b = pipeline.output(FrameLabel::B).unwrap();
        assert_eq!(output_a.max_draw_count, 3);
        assert_eq!(output_b.max_draw_count, 5);
        assert_ne!(output_a.draw_buffer, output_b.draw_buffer);
        assert_ne!(output_a.count_buffer, output_b.count_buffer);
        assert_eq!(output_a.stride, 20);
    }

    #[test]
    fn test_stats_are_kept_per_frame() {
        let (device, mut pipeline) = create_pipeline(small_settings());
        pipeline.submit_objects(FrameLabel::A, &objects(6)).unwrap();
        pipeline.submit_objects(FrameLabel::B, &objects(2)).unwrap();

        let count_buffer = pipeline.frames[0].count_buffer.handle();
        assert!(device.write_host_memory(count_buffer, 0, &4u32.to_ne_bytes()));
        pipeline.read_stats(FrameLabel::A).unwrap();

        // B 的提交不会覆盖 A 的统计
        assert_eq!(
            pipeline.stats(FrameLabel::A).unwrap(),
            CullingStats {
                total_objects: 6,
                visible_objects: 4,
                culled_objects: 2,
            }
        );
        assert_eq!(
            pipeline.stats(FrameLabel::B).unwrap(),
            CullingStats {
                total_objects: 2,
                ..Default::default()
            }
        );

        pipeline.submit_objects(FrameLabel::B, &objects(5)).unwrap();
        assert_eq!(pipeline.stats(FrameLabel::A).unwrap().visible_objects, 4);
        assert_eq!(pipeline.stats(FrameLabel::B).unwrap().total_objects, 5);

        pipeline.shutdown();
        assert!(matches!(pipeline.stats(FrameLabel::A), Err(CullingError::InvalidState { .. })));
    }

    #[test]
    fn test_execute_records_commands_in_order() {
        let (device, mut pipeline) = create_pipeline(small_settings());
        pipeline.submit_objects(FrameLabel::B, &objects(6)).unwrap();

        let (view, proj) = camera();
        let mut cmd = GfxRecordingCommandBuffer::new();
        let output = pipeline.execute_culling(FrameLabel::B, &view, &proj, &mut cmd).unwrap();
        assert_eq!(output.max_draw_count, 6);

        let kinds = cmd
            .commands
            .iter()
            .map(|command| match command {
                GfxRecordedCommand::BeginLabel(_) => "begin",
                GfxRecordedCommand::FillBuffer { .. } => "fill",
                GfxRecordedCommand::PipelineBarrier(_) => "barrier",
                GfxRecordedCommand::BindPipeline { .. } => "pipeline",
                GfxRecordedCommand::BindDescriptorSets { .. } => "sets",
                GfxRecordedCommand::PushConstants { .. } => "push",
                GfxRecordedCommand::Dispatch { .. } => "dispatch",
                GfxRecordedCommand::EndLabel => "end",
                _ => "other",
            })
            .collect_vec();
        assert_eq!(kinds, ["begin", "fill", "barrier", "pipeline", "sets", "push", "dispatch", "barrier", "end"]);

        // ceil(6 / 4)
        assert_eq!(cmd.dispatches(), vec![[2, 1, 1]]);

        let frame = &pipeline.frames[1];
        for command in &cmd.commands {
            match command {
                GfxRecordedCommand::FillBuffer { buffer, size, data, .. } => {
                    assert_eq!(*buffer, frame.count_buffer.handle());
                    assert_eq!((*size, *data), (4, 0));
                }
                GfxRecordedCommand::BindDescriptorSets { descriptor_sets, .. } => {
                    assert_eq!(descriptor_sets, &vec![frame.descriptor_set]);
                }
                GfxRecordedCommand::PushConstants { data, stages, .. } => {
                    assert_eq!(data, &6u32.to_ne_bytes().to_vec());
                    assert_eq!(*stages, vk::ShaderStageFlags::COMPUTE);
                }
                _ => {}
            }
        }

        let barriers = cmd.barriers();
        let post = barriers[1].memory_barriers[0].inner();
        assert_eq!(post.src_stage_mask, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(post.src_access_mask, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert!(post.dst_stage_mask.contains(vk::PipelineStageFlags2::DRAW_INDIRECT));
        assert!(post.dst_access_mask.contains(vk::AccessFlags2::INDIRECT_COMMAND_READ));

        let frustum = device.host_memory(frame.frustum_buffer.handle()).unwrap();
        let expected = FrustumPlanes::from_view_proj(proj * view, true);
        assert_eq!(frustum.as_slice(), bytemuck::bytes_of(&expected));
    }

    #[test]
    fn test_workgroup_size_matches_shader() {
        for workgroup_size in [32, 64, 128] {
            let settings = CullingSettings {
                max_objects: 1000,
                workgroup_size,
                depth_zero_to_one: true,
            };
            let (device, mut pipeline) = create_pipeline(settings);
            assert_eq!(
                device.pipeline_specializations(),
                vec![vec![GfxSpecializationConstant::new(WORKGROUP_SIZE_CONSTANT_ID, workgroup_size)]]
            );

            pipeline.submit_objects(FrameLabel::A, &objects(100)).unwrap();
            let (view, proj) = camera();
            let mut cmd = GfxRecordingCommandBuffer::new();
            pipeline.execute_culling(FrameLabel::A, &view, &proj, &mut cmd).unwrap();

            // 覆盖所有物体，且最多只有一个不满的 workgroup
            let [groups, _, _] = cmd.dispatches()[0];
            assert!(groups * workgroup_size >= 100);
            assert!((groups - 1) * workgroup_size < 100);
        }
    }

    #[test]
    fn test_zero_objects_records_nothing() {
        let (_device, mut pipeline) = create_pipeline(small_settings());
        pipeline.submit_objects(FrameLabel::A, &[]).unwrap();

        let (view, proj) = camera();
        let mut cmd = GfxRecordingCommandBuffer::new();
        let output = pipeline.execute_culling(FrameLabel::A, &view, &proj, &mut cmd).unwrap();
        assert!(cmd.commands.is_empty());
        assert_eq!(output.max_draw_count, 0);

        output.record_draw(&mut cmd);
        assert!(cmd.commands.is_empty());

        let stats = pipeline.read_stats(FrameLabel::A).unwrap();
        assert_eq!(stats, CullingStats::default());
    }

    #[test]
    fn test_read_stats_uses_gpu_count() {
        let (device, mut pipeline) = create_pipeline(small_settings());
        pipeline.submit_objects(FrameLabel::A, &objects(7)).unwrap();

        let (view, proj) = camera();
        let mut cmd = GfxRecordingCommandBuffer::new();
        pipeline.execute_culling(FrameLabel::A, &view, &proj, &mut cmd).unwrap();

        let count_buffer = pipeline.frames[0].count_buffer.handle();
        assert!(device.write_host_memory(count_buffer, 0, &3u32.to_ne_bytes()));
        let stats = pipeline.read_stats(FrameLabel::A).unwrap();
        assert_eq!(
            stats,
            CullingStats {
                total_objects: 7,
                visible_objects: 3,
                culled_objects: 4,
            }
        );
        assert_eq!(pipeline.stats(FrameLabel::A).unwrap(), stats);

        // GPU 报告的数量不会超过提交的数量
        assert!(device.write_host_memory(count_buffer, 0, &100u32.to_ne_bytes()));
        let stats = pipeline.read_stats(FrameLabel::A).unwrap();
        assert_eq!((stats.visible_objects, stats.culled_objects), (7, 0));
    }

    #[test]
    fn test_record_draw_uses_count_buffer() {
        let (_device, mut pipeline) = create_pipeline(small_settings());
        pipeline.submit_objects(FrameLabel::A, &objects(2)).unwrap();
        let output = pipeline.output(FrameLabel::A).unwrap();

        let mut cmd = GfxRecordingCommandBuffer::new();
        output.record_draw(&mut cmd);
        assert!(matches!(
            cmd.commands.as_slice(),
            [GfxRecordedCommand::DrawIndexedIndirectCount {
                max_draw_count: 2,
                stride: 20,
                ..
            }]
        ));
    }

    #[test]
    fn test_partial_initialize_failure() {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = Rc::new(GfxRecordingDevice::new());
        // 第二帧的第二个 buffer
        device.fail_buffer_creation_at(5);

        let mut pipeline = GpuCullingPipeline::new(device.clone(), small_settings());
        assert!(matches!(pipeline.initialize(TEST_SPIRV), Err(CullingError::Gfx(GfxError::Vulkan { .. }))));
        assert_eq!(pipeline.state(), GpuCullingState::Uninitialized);
        assert_eq!(device.live_buffer_count(), 4);

        pipeline.shutdown();
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_retry_after_invalid_shader() {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = Rc::new(GfxRecordingDevice::new());
        let mut pipeline = GpuCullingPipeline::new(device.clone(), small_settings());

        assert!(matches!(pipeline.initialize(&[]), Err(CullingError::Gfx(GfxError::InvalidShader { .. }))));
        assert!(device.live_object_count() > 0);

        pipeline.initialize(TEST_SPIRV).unwrap();
        assert!(pipeline.is_ready());
        // 2 帧 x 4 buffer + layout + pool + pipeline
        assert_eq!(device.live_buffer_count(), 8);
        assert_eq!(device.live_object_count(), 11);

        drop(pipeline);
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_initialize_from_missing_file() {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = Rc::new(GfxRecordingDevice::new());
        let mut pipeline = GpuCullingPipeline::new(device, small_settings());
        let path = std::env::temp_dir().join("kiln-frustum-cull-does-not-exist.spv");
        assert!(matches!(pipeline.initialize_from_file(path), Err(CullingError::ShaderLoad { .. })));
        assert_eq!(pipeline.state(), GpuCullingState::Uninitialized);
    }
}
