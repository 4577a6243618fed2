//! 资源状态跟踪
//!
//! 执行期间每个物理资源记录最近一次生效的访问，新的访问到来时与之比较，
//! 决定是否需要 barrier。

use ash::vk;

use crate::access::RgAccessType;
use crate::resource_handle::RgResourceKind;

/// 一次状态转换需要的 barrier 参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgTransition {
    pub prev_access: RgAccessType,
    pub next_access: RgAccessType,

    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,

    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}
impl RgTransition {
    #[inline]
    pub fn has_layout_change(&self) -> bool {
        self.old_layout != self.new_layout
    }
}

/// 物理资源在执行过程中的状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgResourceState {
    access: RgAccessType,
}
impl Default for RgResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}
impl RgResourceState {
    /// 新分配的资源，内容无意义
    pub const UNDEFINED: Self = Self::new(RgAccessType::Nothing);

    pub const fn new(access: RgAccessType) -> Self {
        Self { access }
    }

    #[inline]
    pub fn access(&self) -> RgAccessType {
        self.access
    }

    /// 判断 `prev -> next` 是否需要 barrier
    ///
    /// 只有完全相同的读可以跳过。不同种类的读之间也要 barrier：
    /// 它以上一次访问为 src，把之前那次写的依赖链到新的 stage 上。
    /// buffer 没有 layout，新分配的 buffer 没有需要等待的内容。
    pub fn needs_barrier(prev: RgAccessType, next: RgAccessType, kind: RgResourceKind) -> bool {
        let differs_or_writes = prev != next || next.is_write();
        match kind {
            RgResourceKind::Image => differs_or_writes,
            RgResourceKind::Buffer => prev != RgAccessType::Nothing && differs_or_writes,
        }
    }

    /// 转移到 `next`，需要 barrier 时返回其参数
    pub fn transition(&mut self, next: RgAccessType, kind: RgResourceKind) -> Option<RgTransition> {
        let prev = self.access;
        self.access = next;

        if !Self::needs_barrier(prev, next, kind) {
            return None;
        }

        let prev_info = prev.info();
        let next_info = next.info();
        let (old_layout, new_layout) = match kind {
            RgResourceKind::Image => (prev_info.image_layout, next_info.image_layout),
            RgResourceKind::Buffer => (vk::ImageLayout::UNDEFINED, vk::ImageLayout::UNDEFINED),
        };

        Some(RgTransition {
            prev_access: prev,
            next_access: next,
            src_stage: prev_info.stage_mask,
            src_access: prev_info.access_mask,
            dst_stage: next_info.stage_mask,
            dst_access: next_info.access_mask,
            old_layout,
            new_layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use RgAccessType as T;
    type S = vk::PipelineStageFlags2;
    type A = vk::AccessFlags2;

    #[test]
    fn test_compute_write_then_fragment_sample() {
        let mut state = RgResourceState::UNDEFINED;
        let first = state.transition(T::ComputeShaderWrite, RgResourceKind::Image).unwrap();
        assert_eq!(first.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(first.new_layout, vk::ImageLayout::GENERAL);

        let barrier = state
            .transition(T::FragmentShaderReadSampledImageOrUniformTexelBuffer, RgResourceKind::Image)
            .unwrap();
        assert_eq!(barrier.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(barrier.src_stage, S::COMPUTE_SHADER);
        assert_eq!(barrier.dst_stage, S::FRAGMENT_SHADER);
        assert_eq!(barrier.src_access, A::SHADER_WRITE);
        assert_eq!(barrier.dst_access, A::SHADER_READ);
    }

    #[test]
    fn test_identical_reads_need_no_barrier() {
        let mut state = RgResourceState::new(T::ComputeShaderReadSampledImageOrUniformTexelBuffer);
        for _ in 0..4 {
            assert!(
                state
                    .transition(T::ComputeShaderReadSampledImageOrUniformTexelBuffer, RgResourceKind::Image)
                    .is_none()
            );
        }
    }

    #[test]
    fn test_different_reads_chain_from_previous_read() {
        let mut state = RgResourceState::new(T::ComputeShaderWrite);
        let first = state
            .transition(T::ComputeShaderReadSampledImageOrUniformTexelBuffer, RgResourceKind::Image)
            .unwrap();
        assert_eq!(first.src_access, A::SHADER_WRITE);

        // 同一 layout 的另一种读，仍然要把 fragment stage 链到 compute 读之后
        let second = state
            .transition(T::FragmentShaderReadSampledImageOrUniformTexelBuffer, RgResourceKind::Image)
            .unwrap();
        assert!(!second.has_layout_change());
        assert_eq!(second.src_stage, S::COMPUTE_SHADER);
        assert_eq!(second.dst_stage, S::FRAGMENT_SHADER);
        assert_eq!(second.dst_access, A::SHADER_READ);

        let third = state.transition(T::ComputeShaderWrite, RgResourceKind::Image).unwrap();
        assert_eq!(third.src_stage, S::FRAGMENT_SHADER);
    }

    #[test]
    fn test_buffer_ignores_layout() {
        let mut state = RgResourceState::new(T::VertexBuffer);
        let read = state.transition(T::ComputeShaderReadOther, RgResourceKind::Buffer).unwrap();
        assert_eq!(read.src_stage, S::VERTEX_INPUT);
        assert_eq!(read.dst_stage, S::COMPUTE_SHADER);

        let barrier = state.transition(T::TransferWrite, RgResourceKind::Buffer).unwrap();
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.src_stage, S::COMPUTE_SHADER);

        assert!(state.transition(T::TransferRead, RgResourceKind::Buffer).is_some());
        assert!(state.transition(T::TransferRead, RgResourceKind::Buffer).is_none());

        let mut fresh = RgResourceState::UNDEFINED;
        assert!(fresh.transition(T::TransferWrite, RgResourceKind::Buffer).is_none());
    }

    #[test]
    fn test_write_after_write() {
        let mut state = RgResourceState::new(T::ComputeShaderWrite);
        let barrier = state.transition(T::ComputeShaderWrite, RgResourceKind::Image).unwrap();
        assert!(!barrier.has_layout_change());
        assert_eq!(barrier.src_access, A::SHADER_WRITE);
        assert_eq!(barrier.dst_access, A::SHADER_WRITE);
    }

    /// 每一对访问的 barrier 参数都直接取自两端的访问表项
    #[test]
    fn test_every_access_pair_matches_table() {
        for prev in RgAccessType::all() {
            for next in RgAccessType::all() {
                let mut image = RgResourceState::new(prev);
                match image.transition(next, RgResourceKind::Image) {
                    Some(barrier) => {
                        assert!(prev != next || next.is_write(), "{:?} -> {:?}", prev, next);
                        assert_eq!(barrier.src_stage, prev.info().stage_mask, "{:?} -> {:?}", prev, next);
                        assert_eq!(barrier.src_access, prev.info().access_mask, "{:?} -> {:?}", prev, next);
                        assert_eq!(barrier.old_layout, prev.info().image_layout, "{:?} -> {:?}", prev, next);
                        assert_eq!(barrier.dst_stage, next.info().stage_mask, "{:?} -> {:?}", prev, next);
                        assert_eq!(barrier.dst_access, next.info().access_mask, "{:?} -> {:?}", prev, next);
                        assert_eq!(barrier.new_layout, next.info().image_layout, "{:?} -> {:?}", prev, next);
                    }
                    None => assert!(prev == next && !next.is_write(), "{:?} -> {:?}", prev, next),
                }
                assert_eq!(image.access(), next);

                let mut buffer = RgResourceState::new(prev);
                match buffer.transition(next, RgResourceKind::Buffer) {
                    Some(barrier) => {
                        assert_eq!(barrier.src_stage, prev.info().stage_mask, "{:?} -> {:?}", prev, next);
                        assert_eq!(barrier.dst_access, next.info().access_mask, "{:?} -> {:?}", prev, next);
                        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
                        assert_eq!(barrier.new_layout, vk::ImageLayout::UNDEFINED);
                    }
                    None => assert!(
                        prev == T::Nothing || (prev == next && !next.is_write()),
                        "{:?} -> {:?}",
                        prev,
                        next
                    ),
                }
            }
        }
    }
}
