use ash::vk;

/// `vk::ImageMemoryBarrier2` 的 builder
///
/// 默认覆盖所有 mip 与 array layer，不做 queue family 转移。
#[derive(Clone, Copy, Debug)]
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier2<'static>,
}
impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl GfxImageBarrier {
    pub fn new() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier2::default()
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: vk::REMAINING_MIP_LEVELS,
                    base_array_layer: 0,
                    layer_count: vk::REMAINING_ARRAY_LAYERS,
                }),
        }
    }
}
// builder
impl GfxImageBarrier {
    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }

    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self
    }

    #[inline]
    pub fn src_mask(mut self, src_stage: vk::PipelineStageFlags2, src_access: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = src_stage;
        self.inner.src_access_mask = src_access;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, dst_stage: vk::PipelineStageFlags2, dst_access: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = dst_stage;
        self.inner.dst_access_mask = dst_access;
        self
    }

    #[inline]
    pub fn image_aspect_flag(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.inner.subresource_range.aspect_mask = aspect;
        self
    }
}
// getters
impl GfxImageBarrier {
    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier2<'static> {
        &self.inner
    }

    #[inline]
    pub fn image_handle(&self) -> vk::Image {
        self.inner.image
    }

    #[inline]
    pub fn old_layout(&self) -> vk::ImageLayout {
        self.inner.old_layout
    }

    #[inline]
    pub fn new_layout(&self) -> vk::ImageLayout {
        self.inner.new_layout
    }

    #[inline]
    pub fn src_stage(&self) -> vk::PipelineStageFlags2 {
        self.inner.src_stage_mask
    }

    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.inner.src_access_mask
    }

    #[inline]
    pub fn dst_stage(&self) -> vk::PipelineStageFlags2 {
        self.inner.dst_stage_mask
    }

    #[inline]
    pub fn dst_access(&self) -> vk::AccessFlags2 {
        self.inner.dst_access_mask
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.inner.subresource_range.aspect_mask
    }
}

/// `vk::BufferMemoryBarrier2` 的 builder
#[derive(Clone, Copy, Debug)]
pub struct GfxBufferBarrier {
    inner: vk::BufferMemoryBarrier2<'static>,
}
impl Default for GfxBufferBarrier {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl GfxBufferBarrier {
    pub fn new() -> Self {
        Self {
            inner: vk::BufferMemoryBarrier2::default()
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .offset(0)
                .size(vk::WHOLE_SIZE),
        }
    }
}
// builder
impl GfxBufferBarrier {
    #[inline]
    pub fn buffer(mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.inner.buffer = buffer;
        self.inner.offset = offset;
        self.inner.size = size;
        self
    }

    #[inline]
    pub fn src_mask(mut self, src_stage: vk::PipelineStageFlags2, src_access: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = src_stage;
        self.inner.src_access_mask = src_access;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, dst_stage: vk::PipelineStageFlags2, dst_access: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = dst_stage;
        self.inner.dst_access_mask = dst_access;
        self
    }
}
// getters
impl GfxBufferBarrier {
    #[inline]
    pub fn inner(&self) -> &vk::BufferMemoryBarrier2<'static> {
        &self.inner
    }

    #[inline]
    pub fn buffer_handle(&self) -> vk::Buffer {
        self.inner.buffer
    }

    #[inline]
    pub fn src_stage(&self) -> vk::PipelineStageFlags2 {
        self.inner.src_stage_mask
    }

    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.inner.src_access_mask
    }

    #[inline]
    pub fn dst_stage(&self) -> vk::PipelineStageFlags2 {
        self.inner.dst_stage_mask
    }

    #[inline]
    pub fn dst_access(&self) -> vk::AccessFlags2 {
        self.inner.dst_access_mask
    }
}
