//! 逻辑资源的描述与来源

use ash::vk;
use strata_gfx::resources::buffer::GfxBufferDesc;
use strata_gfx::resources::image::GfxImageDesc;
use strata_render_interface::handles::{GfxBufferHandle, GfxImageHandle};

use crate::access::RgAccessType;
use crate::resource_handle::{RgBuffer, RgImage, RgResourceKind, RgResourceType};
use crate::temporal::TemporalResourceKey;

/// image 或 buffer 的描述
///
/// 结构相等的两个描述可以互换使用同一个物理资源。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgResourceDesc {
    Image(GfxImageDesc),
    Buffer(GfxBufferDesc),
}
impl RgResourceDesc {
    #[inline]
    pub fn kind(&self) -> RgResourceKind {
        match self {
            RgResourceDesc::Image(_) => RgResourceKind::Image,
            RgResourceDesc::Buffer(_) => RgResourceKind::Buffer,
        }
    }

    /// 把访问隐含的 usage 合并进描述
    pub(crate) fn with_inferred_usage(self, image_usage: vk::ImageUsageFlags, buffer_usage: vk::BufferUsageFlags) -> Self {
        match self {
            RgResourceDesc::Image(desc) => RgResourceDesc::Image(desc.usage(desc.usage | image_usage)),
            RgResourceDesc::Buffer(desc) => RgResourceDesc::Buffer(desc.usage(desc.usage | buffer_usage)),
        }
    }

    /// 除 usage 外完全相同，并且 usage 包含 `required` 的全部 usage
    pub(crate) fn covers(&self, required: &Self) -> bool {
        match (self, required) {
            (RgResourceDesc::Image(desc), RgResourceDesc::Image(required)) => {
                desc.usage.contains(required.usage) && desc.usage(required.usage) == *required
            }
            (RgResourceDesc::Buffer(desc), RgResourceDesc::Buffer(required)) => {
                desc.usage.contains(required.usage) && desc.usage(required.usage) == *required
            }
            _ => false,
        }
    }

    /// `required` 加上 `self` 的 usage；其余部分不同时直接返回 `required`
    pub(crate) fn union_usage(&self, required: &Self) -> Self {
        match (self, required) {
            (RgResourceDesc::Image(desc), RgResourceDesc::Image(required))
                if desc.usage(required.usage) == *required =>
            {
                RgResourceDesc::Image(required.usage(desc.usage | required.usage))
            }
            (RgResourceDesc::Buffer(desc), RgResourceDesc::Buffer(required))
                if desc.usage(required.usage) == *required =>
            {
                RgResourceDesc::Buffer(required.usage(desc.usage | required.usage))
            }
            _ => *required,
        }
    }
}
impl From<GfxImageDesc> for RgResourceDesc {
    fn from(desc: GfxImageDesc) -> Self {
        RgResourceDesc::Image(desc)
    }
}
impl From<GfxBufferDesc> for RgResourceDesc {
    fn from(desc: GfxBufferDesc) -> Self {
        RgResourceDesc::Buffer(desc)
    }
}

/// 描述与句柄类型的对应关系：`GfxImageDesc` 得到 `RgHandle<RgImage>`，`GfxBufferDesc` 得到 `RgHandle<RgBuffer>`
pub trait RgResourceDescTrait: Copy + Into<RgResourceDesc> {
    type Resource: RgResourceType;
}
impl RgResourceDescTrait for GfxImageDesc {
    type Resource = RgImage;
}
impl RgResourceDescTrait for GfxBufferDesc {
    type Resource = RgBuffer;
}

/// 物理资源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgPhysicalResource {
    Image(GfxImageHandle),
    Buffer(GfxBufferHandle),
}
impl RgPhysicalResource {
    #[inline]
    pub fn kind(&self) -> RgResourceKind {
        match self {
            RgPhysicalResource::Image(_) => RgResourceKind::Image,
            RgPhysicalResource::Buffer(_) => RgResourceKind::Buffer,
        }
    }

    #[inline]
    pub fn image(&self) -> Option<GfxImageHandle> {
        match self {
            RgPhysicalResource::Image(handle) => Some(*handle),
            RgPhysicalResource::Buffer(_) => None,
        }
    }

    #[inline]
    pub fn buffer(&self) -> Option<GfxBufferHandle> {
        match self {
            RgPhysicalResource::Buffer(handle) => Some(*handle),
            RgPhysicalResource::Image(_) => None,
        }
    }
}
impl From<GfxImageHandle> for RgPhysicalResource {
    fn from(handle: GfxImageHandle) -> Self {
        RgPhysicalResource::Image(handle)
    }
}
impl From<GfxBufferHandle> for RgPhysicalResource {
    fn from(handle: GfxBufferHandle) -> Self {
        RgPhysicalResource::Buffer(handle)
    }
}

/// 逻辑资源的来源
#[derive(Clone, Debug)]
pub(crate) enum RgResourceSource {
    /// 本帧临时资源，执行时从 `TransientResourceCache` 获取
    Created,
    /// 外部持有的资源，只在本次构建中参与 barrier 跟踪
    Imported {
        physical: RgPhysicalResource,
        access: RgAccessType,
    },
    /// 跨帧资源，执行时从 `TemporalResourceTable` 获取
    Temporal { key: TemporalResourceKey },
}

/// RenderGraph 中登记的一个逻辑资源
#[derive(Clone, Debug)]
pub(crate) struct RgResourceEntry {
    pub name: String,
    pub desc: RgResourceDesc,
    pub source: RgResourceSource,
    /// 当前最新的版本，每次写入加一
    pub version: u32,
}
impl RgResourceEntry {
    #[inline]
    pub fn kind(&self) -> RgResourceKind {
        self.desc.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inferred_usage_is_merged() {
        let desc: RgResourceDesc =
            GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [256, 256]).usage(vk::ImageUsageFlags::SAMPLED).into();
        let augmented = desc.with_inferred_usage(vk::ImageUsageFlags::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER);

        let RgResourceDesc::Image(image_desc) = augmented else {
            panic!("kind changed");
        };
        assert_eq!(image_desc.usage, vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::STORAGE);
        assert_ne!(desc, augmented);
    }

    #[test]
    fn test_covers_ignores_only_extra_usage() {
        let base = GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [64, 64]);
        let storage: RgResourceDesc = base.usage(vk::ImageUsageFlags::STORAGE).into();
        let sampled: RgResourceDesc = base.usage(vk::ImageUsageFlags::SAMPLED).into();
        let both: RgResourceDesc = base.usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED).into();

        assert!(both.covers(&storage));
        assert!(both.covers(&sampled));
        assert!(!storage.covers(&sampled));
        assert_eq!(storage.union_usage(&sampled), both);

        let larger: RgResourceDesc = GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [128, 128])
            .usage(vk::ImageUsageFlags::STORAGE)
            .into();
        assert!(!both.covers(&larger));
        assert_eq!(both.union_usage(&larger), larger);

        let buffer: RgResourceDesc = GfxBufferDesc::new_gpu_only(1024, vk::BufferUsageFlags::STORAGE_BUFFER).into();
        assert!(!both.covers(&buffer));
        assert_eq!(both.union_usage(&buffer), buffer);
    }
}
