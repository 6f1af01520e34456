//! 测试用的录制型实现
//!
//! 不需要 Vulkan 驱动即可驱动渲染核心，所有调用都会被记录下来用于断言。

mod recording_command_buffer;
mod recording_device;

pub use recording_command_buffer::{GfxRecordedCommand, GfxRecordingCommandBuffer};
pub use recording_device::GfxRecordingDevice;
