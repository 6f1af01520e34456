//! Kiln 的 GFX 层
//!
//! 渲染核心只通过这里的抽象和 GPU 交互：
//! - [`foundation::GfxDevice`]：逻辑设备，内存类型查询，资源创建
//! - [`commands::GfxCommandRecorder`]：命令录制上下文
//!
//! 这里没有全局单例，device 需要显式传给每个组件。

pub mod commands;
pub mod descriptors;
pub mod error;
pub mod foundation;
pub mod pipelines;
pub mod profiling;
pub mod resources;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{GfxError, GfxResult};
