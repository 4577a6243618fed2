use std::ffi::CString;

use ash::vk;

use crate::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};
use crate::commands::command_encoder::GfxCommandEncoder;

/// 录制到一个已经 begin 的 `vk::CommandBuffer`
pub struct VulkanCommandEncoder<'a> {
    device: &'a ash::Device,
    debug_utils: Option<&'a ash::ext::debug_utils::Device>,
    command_buffer: vk::CommandBuffer,
}
// new & init
impl<'a> VulkanCommandEncoder<'a> {
    pub fn new(
        device: &'a ash::Device,
        debug_utils: Option<&'a ash::ext::debug_utils::Device>,
        command_buffer: vk::CommandBuffer,
    ) -> Self {
        Self {
            device,
            debug_utils,
            command_buffer,
        }
    }
}
impl GfxCommandEncoder for VulkanCommandEncoder<'_> {
    fn image_memory_barrier(&mut self, dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        if barriers.is_empty() {
            return;
        }
        let barriers: Vec<_> = barriers.iter().map(|b| *b.inner()).collect();
        let dependency_info =
            vk::DependencyInfo::default().dependency_flags(dependency_flags).image_memory_barriers(&barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.command_buffer, &dependency_info);
        }
    }

    fn buffer_memory_barrier(&mut self, dependency_flags: vk::DependencyFlags, barriers: &[GfxBufferBarrier]) {
        if barriers.is_empty() {
            return;
        }
        let barriers: Vec<_> = barriers.iter().map(|b| *b.inner()).collect();
        let dependency_info =
            vk::DependencyInfo::default().dependency_flags(dependency_flags).buffer_memory_barriers(&barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.command_buffer, &dependency_info);
        }
    }

    fn begin_label(&mut self, label_name: &str, label_color: [f32; 4]) {
        let Some(debug_utils) = self.debug_utils else {
            return;
        };
        let name = CString::new(label_name).unwrap_or_default();
        let label = vk::DebugUtilsLabelEXT::default().label_name(&name).color(label_color);
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(self.command_buffer, &label);
        }
    }

    fn end_label(&mut self) {
        let Some(debug_utils) = self.debug_utils else {
            return;
        };
        unsafe {
            debug_utils.cmd_end_debug_utils_label(self.command_buffer);
        }
    }

    fn insert_label(&mut self, label_name: &str, label_color: [f32; 4]) {
        let Some(debug_utils) = self.debug_utils else {
            return;
        };
        let name = CString::new(label_name).unwrap_or_default();
        let label = vk::DebugUtilsLabelEXT::default().label_name(&name).color(label_color);
        unsafe {
            debug_utils.cmd_insert_debug_utils_label(self.command_buffer, &label);
        }
    }

    fn raw(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}
