use kiln_gfx::GfxError;

use crate::bindless::handles::BindlessSlotKind;

#[derive(Debug, thiserror::Error)]
pub enum BindlessError {
    /// 没有空闲的 slot，调用者必须处理，否则会出现 slot 别名
    #[error("bindless {kind} slots exhausted (capacity {capacity})")]
    SlotsExhausted { kind: BindlessSlotKind, capacity: u32 },

    /// 句柄已经失效或从未有效
    #[error("invalid or stale bindless {kind} handle: index {index}")]
    InvalidHandle { kind: BindlessSlotKind, index: u32 },

    /// 注册的资源是 null
    #[error("invalid bindless {kind} resource: {reason}")]
    InvalidResource { kind: BindlessSlotKind, reason: &'static str },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

pub type BindlessResult<T> = Result<T, BindlessError>;
