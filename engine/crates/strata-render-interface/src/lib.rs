//! 渲染层与 GFX 层之间的边界
//!
//! - [`handles`]：物理资源的轻量句柄
//! - [`gfx_resource_manager::GfxResourceManager`]：持有所有物理资源，支持按帧延迟销毁
//! - [`frame_counter::FrameCounter`]：帧序号与 frames in flight

pub mod frame_counter;
pub mod gfx_resource_manager;
pub mod handles;
