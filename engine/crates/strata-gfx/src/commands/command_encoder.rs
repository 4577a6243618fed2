use ash::vk;

use crate::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};

/// 命令录制接口
///
/// RenderGraph 通过它插入 barrier 和 debug label；pass 的回调也只能通过它录制命令。
pub trait GfxCommandEncoder {
    fn image_memory_barrier(&mut self, dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]);

    fn buffer_memory_barrier(&mut self, dependency_flags: vk::DependencyFlags, barriers: &[GfxBufferBarrier]);

    fn begin_label(&mut self, label_name: &str, label_color: [f32; 4]);

    fn end_label(&mut self);

    fn insert_label(&mut self, label_name: &str, label_color: [f32; 4]);

    /// 底层的 command buffer，headless 后端返回 null
    fn raw(&self) -> vk::CommandBuffer;
}
