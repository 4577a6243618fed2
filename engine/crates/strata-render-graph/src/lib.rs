//! 帧级 RenderGraph
//!
//! 每帧重新构建：登记逻辑资源，按顺序添加 pass 并声明访问，
//! 执行时自动解析物理资源、插入 barrier，并在帧结束后回收或保留资源。
//!
//! # 使用示例
//!
//! ```ignore
//! let mut rg = RenderGraph::new();
//! let mut hdr = rg.create(GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [w, h]), "hdr");
//!
//! {
//!     let mut pass = rg.add_pass("lighting");
//!     let hdr_ref = pass.write(&mut hdr, RgAccessType::ComputeShaderWrite);
//!     pass.render(move |ctx| {
//!         let image = ctx.image(hdr_ref)?;
//!         // 录制 dispatch
//!         Ok(())
//!     });
//! }
//! {
//!     let mut pass = rg.add_pass("tonemap");
//!     pass.read(&hdr, RgAccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer);
//! }
//!
//! let retired = rg.execute(&mut resource_ctx, &mut encoder)?;
//! // 帧退休之后
//! retired.release_resources(&mut transient_cache, frame_id);
//! ```

pub mod access;
pub mod barrier;
pub mod error;
pub mod executor;
pub mod graph;
pub mod pass;
pub mod ping_pong;
pub mod resource;
pub mod resource_handle;
pub mod resource_state;
pub mod temporal;
pub mod transient_cache;

pub use access::RgAccessType;
pub use error::{RgError, RgResult};
pub use executor::{CompiledRenderGraph, RetiredRenderGraph, RgResourceContext};
pub use graph::RenderGraph;
pub use pass::{RgPassBuilder, RgPassContext};
pub use ping_pong::PingPongTemporalResource;
pub use resource::{RgPhysicalResource, RgResourceDesc};
pub use resource_handle::{RgBufferHandle, RgExportedHandle, RgHandle, RgImageHandle, RgRef};
pub use temporal::{TemporalResourceKey, TemporalResourceTable};
pub use transient_cache::TransientResourceCache;
