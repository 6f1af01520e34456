//! 基于 Tracy 的 CPU 端性能采样
//!
//! 通过 `profiling` feature 开启；关闭时所有宏展开为空。
//!
//! ```ignore
//! fn build_graph() {
//!     kiln_gfx::profile_scope!("FrameGraph::build");
//!     // ...
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, Span};

/// 为当前作用域创建一个 span，离开作用域时自动结束
///
/// Tracy client 未启动时不做任何事情。
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|client| client.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}
