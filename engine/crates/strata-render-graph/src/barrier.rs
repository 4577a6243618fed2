//! Barrier 描述
//!
//! 编译阶段只记录资源序号与状态转换，执行时再换成带物理句柄的 `GfxImageBarrier` / `GfxBufferBarrier`。

use ash::vk;
use strata_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};

use crate::resource_state::RgTransition;

/// 图像 Barrier 描述
#[derive(Clone, Copy, Debug)]
pub struct RgImageBarrierDesc {
    /// 资源在 RenderGraph 中的序号
    pub resource_index: usize,
    pub transition: RgTransition,
    /// 图像 aspect（COLOR / DEPTH / STENCIL）
    pub aspect: vk::ImageAspectFlags,
}
impl RgImageBarrierDesc {
    pub fn new(resource_index: usize, transition: RgTransition, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            resource_index,
            transition,
            aspect,
        }
    }

    /// 转换为 GfxImageBarrier
    pub fn to_gfx_barrier(&self, image: vk::Image) -> GfxImageBarrier {
        let t = &self.transition;
        GfxImageBarrier::new()
            .image(image)
            .layout_transfer(t.old_layout, t.new_layout)
            .src_mask(t.src_stage, t.src_access)
            .dst_mask(t.dst_stage, t.dst_access)
            .image_aspect_flag(self.aspect)
    }
}

/// 缓冲区 Barrier 描述
#[derive(Clone, Copy, Debug)]
pub struct RgBufferBarrierDesc {
    pub resource_index: usize,
    pub transition: RgTransition,
}
impl RgBufferBarrierDesc {
    pub fn new(resource_index: usize, transition: RgTransition) -> Self {
        Self {
            resource_index,
            transition,
        }
    }

    /// 转换为 GfxBufferBarrier，覆盖整个缓冲区
    pub fn to_gfx_barrier(&self, buffer: vk::Buffer) -> GfxBufferBarrier {
        let t = &self.transition;
        GfxBufferBarrier::new()
            .buffer(buffer, 0, vk::WHOLE_SIZE)
            .src_mask(t.src_stage, t.src_access)
            .dst_mask(t.dst_stage, t.dst_access)
    }
}

/// Pass 执行前需要的 Barrier 集合
#[derive(Clone, Debug, Default)]
pub struct RgPassBarriers {
    pub image_barriers: Vec<RgImageBarrierDesc>,
    pub buffer_barriers: Vec<RgBufferBarrierDesc>,
}
impl RgPassBarriers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image_barrier(&mut self, barrier: RgImageBarrierDesc) {
        self.image_barriers.push(barrier);
    }

    pub fn add_buffer_barrier(&mut self, barrier: RgBufferBarrierDesc) {
        self.buffer_barriers.push(barrier);
    }

    pub fn has_barriers(&self) -> bool {
        !self.image_barriers.is_empty() || !self.buffer_barriers.is_empty()
    }

    pub fn image_barrier_count(&self) -> usize {
        self.image_barriers.len()
    }

    pub fn buffer_barrier_count(&self) -> usize {
        self.buffer_barriers.len()
    }

    /// 把 image barrier 切成若干批，同一批中每个资源最多出现一次
    ///
    /// 同一个 pass 对同一资源声明了多次访问时，它们的 layout 转换必须先后生效，
    /// 不能放进同一个 `vkCmdPipelineBarrier2`。
    pub fn image_barrier_batches(&self) -> Vec<&[RgImageBarrierDesc]> {
        split_batches(&self.image_barriers, |b| b.resource_index)
    }

    pub fn buffer_barrier_batches(&self) -> Vec<&[RgBufferBarrierDesc]> {
        split_batches(&self.buffer_barriers, |b| b.resource_index)
    }
}

fn split_batches<T>(barriers: &[T], resource_index: impl Fn(&T) -> usize) -> Vec<&[T]> {
    let mut batches = Vec::new();
    let mut start = 0;
    for (end, barrier) in barriers.iter().enumerate() {
        let index = resource_index(barrier);
        if barriers[start..end].iter().any(|b| resource_index(b) == index) {
            batches.push(&barriers[start..end]);
            start = end;
        }
    }
    if start < barriers.len() {
        batches.push(&barriers[start..]);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RgAccessType;
    use crate::resource_handle::RgResourceKind;
    use crate::resource_state::RgResourceState;

    fn transition(prev: RgAccessType, next: RgAccessType) -> RgTransition {
        RgResourceState::new(prev).transition(next, RgResourceKind::Image).unwrap()
    }

    #[test]
    fn test_to_gfx_barrier() {
        let desc = RgImageBarrierDesc::new(
            0,
            transition(RgAccessType::ComputeShaderWrite, RgAccessType::TransferRead),
            vk::ImageAspectFlags::COLOR,
        );
        let barrier = desc.to_gfx_barrier(vk::Image::null());
        assert_eq!(barrier.old_layout(), vk::ImageLayout::GENERAL);
        assert_eq!(barrier.new_layout(), vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        assert_eq!(barrier.src_stage(), vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(barrier.dst_access(), vk::AccessFlags2::TRANSFER_READ);
        assert_eq!(barrier.aspect(), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_batches_split_on_repeated_resource() {
        let t = transition(RgAccessType::Nothing, RgAccessType::ComputeShaderWrite);
        let aspect = vk::ImageAspectFlags::COLOR;
        let mut barriers = RgPassBarriers::new();
        barriers.add_image_barrier(RgImageBarrierDesc::new(0, t, aspect));
        barriers.add_image_barrier(RgImageBarrierDesc::new(1, t, aspect));
        barriers.add_image_barrier(RgImageBarrierDesc::new(0, t, aspect));
        barriers.add_image_barrier(RgImageBarrierDesc::new(2, t, aspect));

        let batches = barriers.image_barrier_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 2);
        assert!(barriers.buffer_barrier_batches().is_empty());
    }
}
