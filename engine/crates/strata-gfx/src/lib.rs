//! Strata 的 GFX 层
//!
//! RenderGraph 只通过这里的 trait 与 GPU 打交道：
//! - [`device::GfxDevice`]：创建/销毁 image 与 buffer，获取 sampler，执行一次性 setup 命令
//! - [`commands::command_encoder::GfxCommandEncoder`]：录制 barrier 与 debug label
//!
//! 提供两种后端：
//! - [`vulkan`]：基于 ash + gpu-allocator，显式持有 device，不依赖全局单例
//! - [`headless`]：不访问 GPU，只记录命令，用于测试和 CI

pub mod basic;
pub mod commands;
pub mod device;
pub mod error;
pub mod headless;
pub mod resources;
pub mod sampler;
pub mod vulkan;
