//! 全局 bindless 描述符表
//!
//! 着色器通过整数索引访问资源，不再需要逐 draw 绑定 descriptor。

mod bindless_table;
mod error;
mod handles;
mod slot_arena;

pub use bindless_table::{BindlessBufferEntry, BindlessTable, BindlessTextureEntry};
pub use error::{BindlessError, BindlessResult};
pub use handles::{
    BindlessBufferHandle, BindlessBufferKind, BindlessSlotKind, BindlessTextureHandle, INVALID_BINDLESS_INDEX,
};
