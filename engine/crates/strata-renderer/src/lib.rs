//! Strata 的帧循环
//!
//! [`renderer::Renderer`] 持有 device、资源管理器、transient cache 与 temporal table，
//! 每帧构建一个 RenderGraph 并录制；帧在 `frames_in_flight` 帧之后退休，
//! 它的 transient 资源才回到 cache。

pub mod config;
pub mod image_lut;
pub mod renderer;

pub use config::RendererConfig;
pub use image_lut::{ComputeImageLut, ImageLut};
pub use renderer::Renderer;
