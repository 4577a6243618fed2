//! Pass 定义和构建器
//!
//! `RgPassBuilder` 声明 pass 对资源的访问，`render` 提供录制回调。
//! 回调在执行阶段被调用，通过 `RgPassContext` 取得物理资源和 command encoder。

use ash::vk;
use strata_gfx::commands::command_encoder::GfxCommandEncoder;
use strata_gfx::resources::buffer::GfxBuffer;
use strata_gfx::resources::image::GfxImage;
use strata_render_interface::gfx_resource_manager::GfxResourceManager;
use strata_render_interface::handles::{GfxBufferHandle, GfxImageHandle};

use crate::access::RgAccessType;
use crate::error::{RgError, RgResult};
use crate::graph::RenderGraph;
use crate::resource::{RgPhysicalResource, RgResourceDescTrait};
use crate::resource_handle::{
    RgBuffer, RgHandle, RgImage, RgRawHandle, RgRef, RgResourceKind, RgResourceType, RgRt, RgSrv, RgUav,
};

/// pass 的录制回调
pub type RgRenderFn<'a> = Box<dyn FnOnce(&mut RgPassContext<'_>) -> anyhow::Result<()> + 'a>;

/// pass 声明的一次访问
#[derive(Clone, Copy, Debug)]
pub(crate) struct RgPassAccess {
    pub handle: RgRawHandle,
    pub access: RgAccessType,
    /// None 表示按 format 推断
    pub aspect: Option<vk::ImageAspectFlags>,
}

pub(crate) struct RgPassNode<'a> {
    pub name: String,
    /// 按声明顺序
    pub accesses: Vec<RgPassAccess>,
    pub render_fn: Option<RgRenderFn<'a>>,
}

/// Pass 构建器
///
/// drop 时 pass 被登记到图中；没有调用 `render` 的 pass 只参与状态跟踪。
pub struct RgPassBuilder<'g, 'a> {
    graph: &'g mut RenderGraph<'a>,
    pass: Option<RgPassNode<'a>>,
}
impl<'g, 'a> RgPassBuilder<'g, 'a> {
    pub(crate) fn new(graph: &'g mut RenderGraph<'a>, name: String) -> Self {
        Self {
            graph,
            pass: Some(RgPassNode {
                name,
                accesses: Vec::new(),
                render_fn: None,
            }),
        }
    }

    /// 在 pass 内部创建临时资源，等价于 `RenderGraph::create`
    pub fn create<D: RgResourceDescTrait>(&mut self, desc: D, name: impl Into<String>) -> RgHandle<D::Resource> {
        self.graph.create(desc, name)
    }

    /// 声明只读访问，不改变句柄的版本
    pub fn read<R: RgResourceType>(&mut self, handle: &RgHandle<R>, access: RgAccessType) -> RgRef<R, RgSrv> {
        debug_assert!(access.is_read(), "read() with non-read access {:?}", access);
        self.push_access(handle.raw, R::KIND, access, None);
        RgRef::new(handle.raw, access, None)
    }

    /// 只读访问 image 的一部分 aspect，例如只读 depth
    pub fn read_aspect(
        &mut self,
        handle: &RgHandle<RgImage>,
        access: RgAccessType,
        aspect: vk::ImageAspectFlags,
    ) -> RgRef<RgImage, RgSrv> {
        debug_assert!(access.is_read(), "read_aspect() with non-read access {:?}", access);
        self.push_access(handle.raw, RgImage::KIND, access, Some(aspect));
        RgRef::new(handle.raw, access, Some(aspect))
    }

    /// 声明写访问
    ///
    /// `handle` 被就地推进到新版本，之后的 pass 用它读取就能看到这次写入。
    pub fn write<R: RgResourceType>(&mut self, handle: &mut RgHandle<R>, access: RgAccessType) -> RgRef<R, RgUav> {
        debug_assert!(access.is_write(), "write() with non-write access {:?}", access);
        debug_assert!(!access.is_raster(), "attachment access {:?} must be declared with raster()", access);
        self.push_access(handle.raw, R::KIND, access, None);
        let next = self.graph.bump_version(handle.raw);
        *handle = RgHandle::new(next);
        RgRef::new(next, access, None)
    }

    /// 声明 attachment 访问；写 attachment 同样会推进版本
    pub fn raster(&mut self, handle: &mut RgHandle<RgImage>, access: RgAccessType) -> RgRef<RgImage, RgRt> {
        debug_assert!(access.is_raster(), "raster() with non-attachment access {:?}", access);
        self.push_access(handle.raw, RgImage::KIND, access, None);
        if access.is_write() {
            *handle = RgHandle::new(self.graph.bump_version(handle.raw));
        }
        RgRef::new(handle.raw, access, None)
    }

    /// 提供录制回调，结束 pass 的声明
    pub fn render(mut self, render_fn: impl FnOnce(&mut RgPassContext<'_>) -> anyhow::Result<()> + 'a) {
        if let Some(pass) = self.pass.as_mut() {
            pass.render_fn = Some(Box::new(render_fn));
        }
    }

    fn push_access(
        &mut self,
        handle: RgRawHandle,
        kind: RgResourceKind,
        access: RgAccessType,
        aspect: Option<vk::ImageAspectFlags>,
    ) {
        self.graph.validate_handle(handle, kind);
        if let Some(pass) = self.pass.as_mut() {
            pass.accesses.push(RgPassAccess { handle, access, aspect });
        }
    }
}
impl Drop for RgPassBuilder<'_, '_> {
    fn drop(&mut self) {
        if let Some(pass) = self.pass.take() {
            self.graph.passes.push(pass);
        }
    }
}

/// Pass 执行时的上下文
pub struct RgPassContext<'c> {
    pub(crate) encoder: &'c mut dyn GfxCommandEncoder,
    pub(crate) resource_manager: &'c GfxResourceManager,
    /// 资源序号 -> 物理资源
    pub(crate) physical: &'c [Option<RgPhysicalResource>],
    pub(crate) pass_name: &'c str,
}
impl RgPassContext<'_> {
    #[inline]
    pub fn encoder(&mut self) -> &mut dyn GfxCommandEncoder {
        &mut *self.encoder
    }

    #[inline]
    pub fn resource_manager(&self) -> &GfxResourceManager {
        self.resource_manager
    }

    #[inline]
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// 获取图像的物理句柄
    pub fn image_handle<Mode>(&self, image_ref: RgRef<RgImage, Mode>) -> RgResult<GfxImageHandle> {
        self.physical(image_ref.handle)?.image().ok_or(RgError::InvalidHandle {
            handle: image_ref.handle,
            reason: "not an image",
        })
    }

    /// 获取缓冲区的物理句柄
    pub fn buffer_handle<Mode>(&self, buffer_ref: RgRef<RgBuffer, Mode>) -> RgResult<GfxBufferHandle> {
        self.physical(buffer_ref.handle)?.buffer().ok_or(RgError::InvalidHandle {
            handle: buffer_ref.handle,
            reason: "not a buffer",
        })
    }

    pub fn image<Mode>(&self, image_ref: RgRef<RgImage, Mode>) -> RgResult<&GfxImage> {
        let handle = self.image_handle(image_ref)?;
        self.resource_manager.get_image(handle).ok_or(RgError::InvalidHandle {
            handle: image_ref.handle,
            reason: "physical image already destroyed",
        })
    }

    pub fn buffer<Mode>(&self, buffer_ref: RgRef<RgBuffer, Mode>) -> RgResult<&GfxBuffer> {
        let handle = self.buffer_handle(buffer_ref)?;
        self.resource_manager.get_buffer(handle).ok_or(RgError::InvalidHandle {
            handle: buffer_ref.handle,
            reason: "physical buffer already destroyed",
        })
    }

    fn physical(&self, handle: RgRawHandle) -> RgResult<RgPhysicalResource> {
        self.physical.get(handle.index()).copied().flatten().ok_or(RgError::InvalidHandle {
            handle,
            reason: "resource is not resolved in this graph",
        })
    }
}
