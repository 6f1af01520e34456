use crate::frame_graph::handle::FgResourceHandle;
use crate::frame_graph::resource::FgResourceKind;
use crate::frame_graph::resource_state::FgUsage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FgError {
    /// pass 之间存在循环依赖，按声明顺序列出环上的 pass
    #[error("frame graph has a dependency cycle between passes: [{}]", .passes.join(", "))]
    CycleDetected { passes: Vec<String> },

    #[error("frame graph must be built successfully before execute")]
    NotBuilt,

    #[error("pass `{pass}` references an unknown or stale resource {handle:?}")]
    UnknownResource { pass: String, handle: FgResourceHandle },

    #[error("pass `{pass}` uses {kind} resource `{resource}` as {usage:?}")]
    UsageMismatch {
        pass: String,
        resource: String,
        kind: FgResourceKind,
        usage: FgUsage,
    },

    #[error("resource `{resource}` used by pass `{pass}` has no physical handle")]
    UnboundResource { pass: String, resource: String },

    /// pass 的回调返回了错误，后续的 pass 不会被执行
    #[error("pass `{pass}` failed: {reason}")]
    PassFailed { pass: String, reason: String },

    #[error("resource handle {handle:?} is unknown or stale")]
    InvalidHandle { handle: FgResourceHandle },

    #[error("cannot bind a {expected} to {kind} resource `{resource}`")]
    BindingMismatch {
        resource: String,
        kind: FgResourceKind,
        expected: FgResourceKind,
    },
}

pub type FgResult<T> = Result<T, FgError>;
