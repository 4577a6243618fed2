//! RenderGraph 的构建接口
//!
//! 每帧新建一个 `RenderGraph`，登记资源、添加 pass，然后 `compile` + `execute`。
//! 构建阶段不会分配任何物理资源。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use strata_gfx::resources::buffer::GfxBufferDesc;
use strata_gfx::resources::image::GfxImageDesc;
use strata_render_interface::handles::{GfxBufferHandle, GfxImageHandle};

use crate::access::RgAccessType;
use crate::pass::{RgPassBuilder, RgPassNode};
use crate::resource::{RgPhysicalResource, RgResourceDesc, RgResourceDescTrait, RgResourceEntry, RgResourceSource};
use crate::resource_handle::{
    RgBufferHandle, RgExportedHandle, RgHandle, RgImageHandle, RgRawHandle, RgResourceKind, RgResourceType,
};
use crate::temporal::TemporalResourceKey;

/// 每次构建的唯一编号，用来拒绝其他构建的句柄
static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

/// 一帧的渲染图
///
/// pass 严格按照添加的顺序执行，不做重排。
pub struct RenderGraph<'a> {
    pub(crate) graph_id: u32,
    pub(crate) resources: Vec<RgResourceEntry>,
    pub(crate) passes: Vec<RgPassNode<'a>>,
    /// (资源, 最终访问)
    pub(crate) exports: Vec<(RgRawHandle, RgAccessType)>,

    /// 本次构建中已经请求过的 temporal 资源
    temporal_indices: HashMap<TemporalResourceKey, usize>,

    pub(crate) label_passes: bool,
}
impl Default for RenderGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl<'a> RenderGraph<'a> {
    pub fn new() -> Self {
        Self {
            graph_id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            resources: Vec::new(),
            passes: Vec::new(),
            exports: Vec::new(),
            temporal_indices: HashMap::new(),
            label_passes: true,
        }
    }

    /// 是否用 debug label 包裹每个 pass
    pub fn with_pass_labels(mut self, label_passes: bool) -> Self {
        self.label_passes = label_passes;
        self
    }
}
// getters
impl RenderGraph<'_> {
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// 资源的名字，用于日志
    pub fn resource_name<R: RgResourceType>(&self, handle: &RgHandle<R>) -> &str {
        self.resources.get(handle.raw.index()).map_or("<unknown>", |entry| entry.name.as_str())
    }

    /// 资源的描述
    pub fn resource_desc<R: RgResourceType>(&self, handle: &RgHandle<R>) -> Option<&RgResourceDesc> {
        self.resources.get(handle.raw.index()).map(|entry| &entry.desc)
    }
}
// 资源登记
impl<'a> RenderGraph<'a> {
    /// 登记一个本帧临时资源，执行时才从 transient cache 获取物理资源
    ///
    /// usage 会根据所有 pass 声明的访问自动补全。
    pub fn create<D: RgResourceDescTrait>(&mut self, desc: D, name: impl Into<String>) -> RgHandle<D::Resource> {
        let raw = self.register(RgResourceEntry {
            name: name.into(),
            desc: desc.into(),
            source: RgResourceSource::Created,
            version: 0,
        });
        RgHandle::new(raw)
    }

    /// 导入外部持有的 image，`access` 是它当前所处的访问状态
    pub fn import_image(
        &mut self,
        image: GfxImageHandle,
        desc: GfxImageDesc,
        name: impl Into<String>,
        access: RgAccessType,
    ) -> RgImageHandle {
        RgHandle::new(self.import(RgPhysicalResource::Image(image), desc.into(), name.into(), access))
    }

    /// 导入外部持有的 buffer
    pub fn import_buffer(
        &mut self,
        buffer: GfxBufferHandle,
        desc: GfxBufferDesc,
        name: impl Into<String>,
        access: RgAccessType,
    ) -> RgBufferHandle {
        RgHandle::new(self.import(RgPhysicalResource::Buffer(buffer), desc.into(), name.into(), access))
    }

    /// 要求资源在最后一个 pass 之后处于 `access`
    ///
    /// 执行器会在末尾补一个 barrier。导出的 transient 资源在 `RetiredRenderGraph` 释放之前一直有效。
    pub fn export<R: RgResourceType>(&mut self, handle: RgHandle<R>, access: RgAccessType) -> RgExportedHandle<R> {
        self.validate_handle(handle.raw, R::KIND);
        self.exports.push((handle.raw, access));
        RgExportedHandle::new(handle.raw)
    }

    /// 跨帧资源
    ///
    /// 同一个 key 在一次构建中只会登记一次，再次请求返回当前最新版本的句柄。
    /// 第一次使用或描述变化时内容无意义，状态为 `Nothing`。
    /// 与 `create` 一样，访问隐含的 usage 会在编译时合并进描述。
    pub fn get_or_create_temporal<D: RgResourceDescTrait>(
        &mut self,
        key: impl Into<TemporalResourceKey>,
        desc: D,
    ) -> RgHandle<D::Resource> {
        let key = key.into();
        let desc: RgResourceDesc = desc.into();

        if let Some(&index) = self.temporal_indices.get(&key) {
            let entry = &self.resources[index];
            debug_assert_eq!(entry.desc, desc, "temporal resource {} requested twice with different descs", key);
            return RgHandle::new(RgRawHandle {
                graph_id: self.graph_id,
                index: index as u32,
                version: entry.version,
            });
        }

        let raw = self.register(RgResourceEntry {
            name: key.to_string(),
            desc,
            source: RgResourceSource::Temporal { key: key.clone() },
            version: 0,
        });
        self.temporal_indices.insert(key, raw.index());
        RgHandle::new(raw)
    }

    /// 添加一个 pass，builder 被 drop 时 pass 登记到图中
    pub fn add_pass(&mut self, name: impl Into<String>) -> RgPassBuilder<'_, 'a> {
        RgPassBuilder::new(self, name.into())
    }
}
// tools
impl RenderGraph<'_> {
    fn register(&mut self, entry: RgResourceEntry) -> RgRawHandle {
        let index = self.resources.len() as u32;
        self.resources.push(entry);
        RgRawHandle {
            graph_id: self.graph_id,
            index,
            version: 0,
        }
    }

    fn import(
        &mut self,
        physical: RgPhysicalResource,
        desc: RgResourceDesc,
        name: String,
        access: RgAccessType,
    ) -> RgRawHandle {
        self.register(RgResourceEntry {
            name,
            desc,
            source: RgResourceSource::Imported { physical, access },
            version: 0,
        })
    }

    /// 检查句柄属于本次构建并且是最新版本
    pub(crate) fn validate_handle(&self, raw: RgRawHandle, kind: RgResourceKind) {
        debug_assert_eq!(raw.graph_id, self.graph_id, "handle {:?} belongs to another graph build", raw);
        debug_assert!(raw.index() < self.resources.len(), "handle {:?} out of range", raw);
        if let Some(entry) = self.resources.get(raw.index()) {
            debug_assert_eq!(
                entry.version, raw.version,
                "stale handle {:?} of \"{}\", latest version is {}",
                raw, entry.name, entry.version
            );
            debug_assert_eq!(entry.kind(), kind, "handle {:?} of \"{}\" has the wrong kind", raw, entry.name);
        }
    }

    /// 写入后推进资源的版本，返回新版本的句柄
    pub(crate) fn bump_version(&mut self, raw: RgRawHandle) -> RgRawHandle {
        let next = raw.next_version();
        if let Some(entry) = self.resources.get_mut(raw.index()) {
            entry.version = next.version;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    fn image_desc() -> GfxImageDesc {
        GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, [16, 16])
    }

    #[test]
    fn test_graph_ids_are_unique() {
        let a = RenderGraph::new();
        let b = RenderGraph::new();
        assert_ne!(a.graph_id, b.graph_id);
    }

    #[test]
    fn test_temporal_requested_twice_returns_latest_version() {
        let mut rg = RenderGraph::new();
        let mut history = rg.get_or_create_temporal("history", image_desc());
        {
            let mut pass = rg.add_pass("write");
            pass.write(&mut history, RgAccessType::ComputeShaderWrite);
        }
        let again = rg.get_or_create_temporal("history", image_desc());
        assert_eq!(again, history);
        assert_eq!(again.raw().version(), 1);
        assert_eq!(rg.resource_count(), 1);
        assert_eq!(rg.resource_name(&again), "history");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "another graph build")]
    fn test_foreign_handle_is_rejected() {
        let mut other = RenderGraph::new();
        let foreign = other.create(image_desc(), "foreign");

        let mut rg = RenderGraph::new();
        rg.create(image_desc(), "local");
        let mut pass = rg.add_pass("read");
        pass.read(&foreign, RgAccessType::ComputeShaderReadOther);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "stale handle")]
    fn test_stale_handle_is_rejected() {
        let mut rg = RenderGraph::new();
        let mut image = rg.create(image_desc(), "image");
        let stale = image;
        {
            let mut pass = rg.add_pass("write");
            pass.write(&mut image, RgAccessType::ComputeShaderWrite);
        }
        let mut pass = rg.add_pass("read");
        pass.read(&stale, RgAccessType::ComputeShaderReadOther);
    }
}
