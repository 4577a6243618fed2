use ash::vk;

/// Image 的维度与数组形态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxImageKind {
    Tex1d,
    Tex1dArray,
    Tex2d,
    Tex2dArray,
    Tex3d,
    Cube,
    CubeArray,
}
impl GfxImageKind {
    #[inline]
    pub fn image_type(self) -> vk::ImageType {
        match self {
            GfxImageKind::Tex1d | GfxImageKind::Tex1dArray => vk::ImageType::TYPE_1D,
            GfxImageKind::Tex2d | GfxImageKind::Tex2dArray | GfxImageKind::Cube | GfxImageKind::CubeArray => {
                vk::ImageType::TYPE_2D
            }
            GfxImageKind::Tex3d => vk::ImageType::TYPE_3D,
        }
    }

    #[inline]
    pub fn is_cube(self) -> bool {
        matches!(self, GfxImageKind::Cube | GfxImageKind::CubeArray)
    }
}

/// Image 的形状描述
///
/// 两个描述结构相等时，对应的物理资源可以互换（transient cache 以此为 key）。
/// 字段原样传给 `vk::ImageCreateInfo`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageDesc {
    pub kind: GfxImageKind,
    pub usage: vk::ImageUsageFlags,
    pub flags: vk::ImageCreateFlags,
    pub format: vk::Format,
    pub extent: [u32; 3],
    pub tiling: vk::ImageTiling,
    pub mip_levels: u16,
    pub array_elements: u32,
}
// new & init
impl GfxImageDesc {
    pub fn new(format: vk::Format, kind: GfxImageKind, extent: [u32; 3]) -> Self {
        Self {
            kind,
            usage: vk::ImageUsageFlags::empty(),
            flags: vk::ImageCreateFlags::empty(),
            format,
            extent,
            tiling: vk::ImageTiling::OPTIMAL,
            mip_levels: 1,
            array_elements: 1,
        }
    }

    pub fn new_1d(format: vk::Format, width: u32) -> Self {
        Self::new(format, GfxImageKind::Tex1d, [width, 1, 1])
    }

    pub fn new_2d(format: vk::Format, extent: [u32; 2]) -> Self {
        Self::new(format, GfxImageKind::Tex2d, [extent[0], extent[1], 1])
    }

    pub fn new_3d(format: vk::Format, extent: [u32; 3]) -> Self {
        Self::new(format, GfxImageKind::Tex3d, extent)
    }

    pub fn new_cube(format: vk::Format, width: u32) -> Self {
        Self::new(format, GfxImageKind::Cube, [width, width, 1])
    }
}
// builder
impl GfxImageDesc {
    #[inline]
    #[must_use]
    pub fn usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    #[inline]
    #[must_use]
    pub fn flags(mut self, flags: vk::ImageCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    #[must_use]
    pub fn format(mut self, format: vk::Format) -> Self {
        self.format = format;
        self
    }

    #[inline]
    #[must_use]
    pub fn tiling(mut self, tiling: vk::ImageTiling) -> Self {
        self.tiling = tiling;
        self
    }

    #[inline]
    #[must_use]
    pub fn mip_levels(mut self, mip_levels: u16) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// 完整的 mip 链
    #[must_use]
    pub fn all_mip_levels(mut self) -> Self {
        let max_dim = self.extent[0].max(self.extent[1]).max(self.extent[2]).max(1);
        self.mip_levels = (32 - max_dim.leading_zeros()) as u16;
        self
    }

    /// 设置数组层数；会把 `Tex1d`/`Tex2d`/`Cube` 提升为对应的数组类型
    #[must_use]
    pub fn array_elements(mut self, array_elements: u32) -> Self {
        self.array_elements = array_elements;
        if array_elements > 1 {
            self.kind = match self.kind {
                GfxImageKind::Tex1d => GfxImageKind::Tex1dArray,
                GfxImageKind::Tex2d => GfxImageKind::Tex2dArray,
                GfxImageKind::Cube => GfxImageKind::CubeArray,
                kind => kind,
            };
        }
        self
    }

    /// 宽高按 `div` 缩小（向上取整），常用于半分辨率的中间结果
    #[must_use]
    pub fn div_extent(mut self, div: [u32; 3]) -> Self {
        for (dim, div) in self.extent.iter_mut().zip(div) {
            *dim = dim.div_ceil(div.max(1)).max(1);
        }
        self
    }
}
// getters
impl GfxImageDesc {
    #[inline]
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent[0],
            height: self.extent[1],
        }
    }

    #[inline]
    pub fn extent_3d(&self) -> vk::Extent3D {
        vk::Extent3D {
            width: self.extent[0],
            height: self.extent[1],
            depth: self.extent[2],
        }
    }

    /// vulkan 中的 array layer 数量，cube 每个元素占 6 层
    #[inline]
    pub fn layer_count(&self) -> u32 {
        if self.kind.is_cube() { self.array_elements * 6 } else { self.array_elements }
    }

    #[inline]
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        image_aspect_mask_from_format(self.format)
    }

    pub fn to_vk_create_info(&self) -> vk::ImageCreateInfo<'static> {
        let mut flags = self.flags;
        if self.kind.is_cube() {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }

        vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(self.kind.image_type())
            .format(self.format)
            .extent(self.extent_3d())
            .mip_levels(self.mip_levels as u32)
            .array_layers(self.layer_count())
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(self.tiling)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }
}

/// 根据 format 推断 image aspect
pub fn image_aspect_mask_from_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// 设备上的一张 image
///
/// 内存由创建它的 [`crate::device::GfxDevice`] 管理，销毁也必须交还给同一个 device。
#[derive(Debug)]
pub struct GfxImage {
    handle: vk::Image,
    desc: GfxImageDesc,
    name: String,
}
// new & init
impl GfxImage {
    /// 由后端调用，包装已经创建好的 vk::Image
    pub fn new(handle: vk::Image, desc: GfxImageDesc, name: impl Into<String>) -> Self {
        Self {
            handle,
            desc,
            name: name.into(),
        }
    }
}
// getters
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxImageDesc {
        &self.desc
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.desc.extent[0]
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.desc.extent[1]
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structurally_equal_descs_hash_equal() {
        let a = GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [256, 256]).usage(vk::ImageUsageFlags::SAMPLED);
        let b = GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [256, 256]).usage(vk::ImageUsageFlags::SAMPLED);
        let c = a.mip_levels(2);

        let set: HashSet<GfxImageDesc> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_all_mip_levels() {
        let desc = GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, [256, 100]).all_mip_levels();
        assert_eq!(desc.mip_levels, 9);

        let desc = GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, [1, 1]).all_mip_levels();
        assert_eq!(desc.mip_levels, 1);
    }

    #[test]
    fn test_cube_create_info() {
        let desc = GfxImageDesc::new_cube(vk::Format::R16G16B16A16_SFLOAT, 64).array_elements(2);
        assert_eq!(desc.kind, GfxImageKind::CubeArray);

        let info = desc.to_vk_create_info();
        assert_eq!(info.array_layers, 12);
        assert!(info.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
        assert_eq!(info.image_type, vk::ImageType::TYPE_2D);
    }

    #[test]
    fn test_div_extent_rounds_up() {
        let desc = GfxImageDesc::new_2d(vk::Format::R8_UNORM, [1921, 1081]).div_extent([2, 2, 1]);
        assert_eq!(desc.extent, [961, 541, 1]);
    }

    #[test]
    fn test_aspect_from_format() {
        assert_eq!(image_aspect_mask_from_format(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            image_aspect_mask_from_format(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(image_aspect_mask_from_format(vk::Format::S8_UINT), vk::ImageAspectFlags::STENCIL);
        assert_eq!(image_aspect_mask_from_format(vk::Format::R8G8B8A8_SRGB), vk::ImageAspectFlags::COLOR);
    }
}
