//! Kiln 渲染接口层
//!
//! - [`frame_counter`]：frames in flight 的计数与标签
//! - [`render_settings`]：渲染相关的配置，可以从 TOML 加载
//! - [`bindless`]：全局 bindless 描述符表

pub mod bindless;
pub mod frame_counter;
pub mod render_settings;
