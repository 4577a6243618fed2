//! RenderGraph 中的逻辑资源句柄
//!
//! 句柄只在创建它的那一次 graph 构建中有效：`graph_id` 区分不同的构建，
//! `version` 在每次写入后递增，旧版本的句柄在 debug 下会被拒绝。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use ash::vk;

use crate::access::RgAccessType;

/// 不带类型的句柄
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RgRawHandle {
    pub(crate) graph_id: u32,
    pub(crate) index: u32,
    pub(crate) version: u32,
}
impl RgRawHandle {
    #[inline]
    pub(crate) fn next_version(self) -> Self {
        Self {
            version: self.version + 1,
            ..self
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }
}
impl fmt::Debug for RgRawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rg(g{}:{}.v{})", self.graph_id, self.index, self.version)
    }
}

/// 资源种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgResourceKind {
    Image,
    Buffer,
}

/// 资源种类的类型标记
pub trait RgResourceType: 'static {
    const KIND: RgResourceKind;
}

/// image 的类型标记
pub struct RgImage;
impl RgResourceType for RgImage {
    const KIND: RgResourceKind = RgResourceKind::Image;
}

/// buffer 的类型标记
pub struct RgBuffer;
impl RgResourceType for RgBuffer {
    const KIND: RgResourceKind = RgResourceKind::Buffer;
}

/// 带类型的逻辑句柄
///
/// 写入会就地推进版本（见 `RgPassBuilder::write`），之前复制出去的句柄随之失效。
pub struct RgHandle<R: RgResourceType> {
    pub(crate) raw: RgRawHandle,
    _marker: PhantomData<fn() -> R>,
}
impl<R: RgResourceType> RgHandle<R> {
    #[inline]
    pub(crate) fn new(raw: RgRawHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn raw(&self) -> RgRawHandle {
        self.raw
    }
}
impl<R: RgResourceType> Clone for RgHandle<R> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<R: RgResourceType> Copy for RgHandle<R> {}
impl<R: RgResourceType> PartialEq for RgHandle<R> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<R: RgResourceType> Eq for RgHandle<R> {}
impl<R: RgResourceType> Hash for RgHandle<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}
impl<R: RgResourceType> fmt::Debug for RgHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", R::KIND, self.raw)
    }
}

pub type RgImageHandle = RgHandle<RgImage>;
pub type RgBufferHandle = RgHandle<RgBuffer>;

/// 导出之后的句柄，执行结束后通过 `RetiredRenderGraph` 换成物理资源
pub struct RgExportedHandle<R: RgResourceType> {
    pub(crate) raw: RgRawHandle,
    _marker: PhantomData<fn() -> R>,
}
impl<R: RgResourceType> RgExportedHandle<R> {
    #[inline]
    pub(crate) fn new(raw: RgRawHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }
}
impl<R: RgResourceType> Clone for RgExportedHandle<R> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<R: RgResourceType> Copy for RgExportedHandle<R> {}
impl<R: RgResourceType> fmt::Debug for RgExportedHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exported{:?}{:?}", R::KIND, self.raw)
    }
}

/// 访问模式标记：只读
pub struct RgSrv;
/// 访问模式标记：写
pub struct RgUav;
/// 访问模式标记：attachment
pub struct RgRt;

/// pass 声明访问后得到的引用，在回调中用来取物理资源
pub struct RgRef<R: RgResourceType, Mode> {
    pub(crate) handle: RgRawHandle,
    pub(crate) access: RgAccessType,
    pub(crate) aspect: Option<vk::ImageAspectFlags>,
    _marker: PhantomData<fn() -> (R, Mode)>,
}
impl<R: RgResourceType, Mode> RgRef<R, Mode> {
    pub(crate) fn new(handle: RgRawHandle, access: RgAccessType, aspect: Option<vk::ImageAspectFlags>) -> Self {
        Self {
            handle,
            access,
            aspect,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn access(&self) -> RgAccessType {
        self.access
    }

    #[inline]
    pub fn aspect(&self) -> Option<vk::ImageAspectFlags> {
        self.aspect
    }

    /// 访问的是哪一个版本
    #[inline]
    pub fn handle(&self) -> RgRawHandle {
        self.handle
    }
}
impl<R: RgResourceType, Mode> Clone for RgRef<R, Mode> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<R: RgResourceType, Mode> Copy for RgRef<R, Mode> {}
impl<R: RgResourceType, Mode> fmt::Debug for RgRef<R, Mode> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RgRef({:?}{:?}, {:?})", R::KIND, self.handle, self.access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_version_keeps_identity() {
        let raw = RgRawHandle {
            graph_id: 3,
            index: 7,
            version: 0,
        };
        let next = raw.next_version();
        assert_eq!(next.index(), 7);
        assert_eq!(next.version(), 1);
        assert_eq!(next.graph_id, 3);
        assert_ne!(raw, next);
    }

    #[test]
    fn test_debug_format() {
        let handle = RgImageHandle::new(RgRawHandle {
            graph_id: 1,
            index: 2,
            version: 3,
        });
        assert_eq!(format!("{:?}", handle), "ImageRg(g1:2.v3)");
    }
}
