use ash::vk;

/// GFX 层的错误
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    /// 设备无法创建资源（通常是显存耗尽）
    #[error("failed to create resource \"{name}\": {reason}")]
    ResourceCreation { name: String, reason: String },

    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("gpu allocation failed: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    /// 初始数据的大小与描述不符
    #[error("initial data of \"{name}\" has {actual} bytes, expected at most {expected}")]
    InitialDataSize { name: String, expected: u64, actual: u64 },

    /// 异步编译中的 pipeline 尚未就绪，调用者下一帧重试
    #[error("pipeline \"{pipeline}\" is not ready yet")]
    PipelineNotReady { pipeline: String },
}

pub type GfxResult<T> = Result<T, GfxError>;
