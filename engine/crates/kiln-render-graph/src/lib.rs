//! Kiln 渲染图层
//!
//! - [`frame_graph`]：声明资源与 pass，自动排序并插入 barrier
//! - [`render_pipeline`]：基于帧图的渲染管线，目前包含 GPU 剔除

pub mod frame_graph;
pub mod render_pipeline;
