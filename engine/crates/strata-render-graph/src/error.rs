use strata_gfx::error::GfxError;

use crate::resource_handle::RgRawHandle;

/// RenderGraph 的错误
///
/// 任何一个错误都意味着本帧被放弃：已经获取的 transient 资源会直接还给 cache，
/// 不会有半截的命令被提交。
#[derive(Debug, thiserror::Error)]
pub enum RgError {
    /// 解析资源时 device 创建失败（通常是显存耗尽）
    #[error("pass \"{pass}\" failed to create resource \"{resource}\" ({desc}): {source}")]
    ResourceCreationFailure {
        pass: String,
        resource: String,
        desc: String,
        #[source]
        source: GfxError,
    },

    /// 句柄不属于本次构建，或者没有被解析到物理资源
    #[error("invalid handle {handle:?}: {reason}")]
    InvalidHandle { handle: RgRawHandle, reason: &'static str },

    /// pass 的录制回调返回了错误
    #[error("pass \"{pass}\" failed: {source:#}")]
    PassFailed {
        pass: String,
        #[source]
        source: anyhow::Error,
    },
}
impl RgError {
    /// 出错的 pass
    pub fn pass_name(&self) -> Option<&str> {
        match self {
            RgError::ResourceCreationFailure { pass, .. } | RgError::PassFailed { pass, .. } => Some(pass),
            RgError::InvalidHandle { .. } => None,
        }
    }

    /// 失败原因是否只是 pipeline 还在异步编译，下一帧重试即可
    pub fn is_pipeline_not_ready(&self) -> bool {
        match self {
            RgError::PassFailed { source, .. } => {
                matches!(source.downcast_ref::<GfxError>(), Some(GfxError::PipelineNotReady { .. }))
            }
            _ => false,
        }
    }
}

pub type RgResult<T> = Result<T, RgError>;
