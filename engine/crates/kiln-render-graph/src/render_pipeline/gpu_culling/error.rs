use kiln_gfx::GfxError;

use crate::render_pipeline::gpu_culling::culling_pipeline::GpuCullingState;

#[derive(Debug, thiserror::Error)]
pub enum CullingError {
    /// 在错误的生命周期阶段调用
    #[error("cannot {operation} while gpu culling is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: GpuCullingState,
    },

    #[error("failed to load culling shader {path}: {source}")]
    ShaderLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

pub type CullingResult<T> = Result<T, CullingError>;
