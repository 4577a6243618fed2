//! 不访问 GPU 的后端
//!
//! 资源句柄是单调递增的假值，命令只被记录下来。
//! 用于在没有显卡的环境下验证 barrier 的位置和参数。

use std::collections::HashMap;

use ash::vk;
use ash::vk::Handle;

use crate::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};
use crate::commands::command_encoder::GfxCommandEncoder;
use crate::device::GfxDevice;
use crate::error::{GfxError, GfxResult};
use crate::resources::buffer::{GfxBuffer, GfxBufferDesc};
use crate::resources::image::{GfxImage, GfxImageDesc};
use crate::sampler::GfxSamplerDesc;

/// headless encoder 记录下来的一条命令
#[derive(Clone, Debug)]
pub enum HeadlessCommand {
    ImageBarrier(GfxImageBarrier),
    BufferBarrier(GfxBufferBarrier),
    BeginLabel(String),
    EndLabel,
    InsertLabel(String),
}

#[derive(Default)]
pub struct HeadlessCommandEncoder {
    commands: Vec<HeadlessCommand>,
}
// new & init
impl HeadlessCommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl HeadlessCommandEncoder {
    #[inline]
    pub fn commands(&self) -> &[HeadlessCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<HeadlessCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn image_barriers(&self) -> impl Iterator<Item = &GfxImageBarrier> {
        self.commands.iter().filter_map(|cmd| match cmd {
            HeadlessCommand::ImageBarrier(barrier) => Some(barrier),
            _ => None,
        })
    }

    pub fn buffer_barriers(&self) -> impl Iterator<Item = &GfxBufferBarrier> {
        self.commands.iter().filter_map(|cmd| match cmd {
            HeadlessCommand::BufferBarrier(barrier) => Some(barrier),
            _ => None,
        })
    }

    /// 所有 `insert_label` 的名字，pass 回调在测试中用它标记自己的执行
    pub fn inserted_labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                HeadlessCommand::InsertLabel(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}
impl GfxCommandEncoder for HeadlessCommandEncoder {
    fn image_memory_barrier(&mut self, _dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        self.commands.extend(barriers.iter().copied().map(HeadlessCommand::ImageBarrier));
    }

    fn buffer_memory_barrier(&mut self, _dependency_flags: vk::DependencyFlags, barriers: &[GfxBufferBarrier]) {
        self.commands.extend(barriers.iter().copied().map(HeadlessCommand::BufferBarrier));
    }

    fn begin_label(&mut self, label_name: &str, _label_color: [f32; 4]) {
        self.commands.push(HeadlessCommand::BeginLabel(label_name.to_string()));
    }

    fn end_label(&mut self) {
        self.commands.push(HeadlessCommand::EndLabel);
    }

    fn insert_label(&mut self, label_name: &str, _label_color: [f32; 4]) {
        self.commands.push(HeadlessCommand::InsertLabel(label_name.to_string()));
    }

    fn raw(&self) -> vk::CommandBuffer {
        vk::CommandBuffer::null()
    }
}

/// headless 设备
///
/// 可以通过 [`HeadlessGfxDevice::fail_after`] 模拟显存耗尽。
#[derive(Default)]
pub struct HeadlessGfxDevice {
    next_raw_handle: u64,

    live_images: usize,
    live_buffers: usize,
    created_images: usize,
    created_buffers: usize,
    live_bytes: u64,

    /// 还能成功创建的资源数量，None 表示不限
    remaining_allocations: Option<usize>,

    samplers: HashMap<GfxSamplerDesc, vk::Sampler>,
    setup_submissions: usize,
}
// new & init
impl HeadlessGfxDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后再成功创建 `count` 个资源，然后所有创建都失败
    pub fn fail_after(&mut self, count: usize) {
        self.remaining_allocations = Some(count);
    }

    /// 取消失败注入
    pub fn clear_failure(&mut self) {
        self.remaining_allocations = None;
    }
}
// getters
impl HeadlessGfxDevice {
    #[inline]
    pub fn live_image_count(&self) -> usize {
        self.live_images
    }

    #[inline]
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers
    }

    /// 累计创建过的 image 数量（包含已销毁的）
    #[inline]
    pub fn created_image_count(&self) -> usize {
        self.created_images
    }

    #[inline]
    pub fn created_buffer_count(&self) -> usize {
        self.created_buffers
    }

    #[inline]
    pub fn setup_submission_count(&self) -> usize {
        self.setup_submissions
    }
}
// tools
impl HeadlessGfxDevice {
    fn next_raw(&mut self) -> u64 {
        self.next_raw_handle += 1;
        self.next_raw_handle
    }

    fn check_allocation(&mut self, name: &str) -> GfxResult<()> {
        match &mut self.remaining_allocations {
            Some(0) => Err(GfxError::ResourceCreation {
                name: name.to_string(),
                reason: "headless device out of memory".to_string(),
            }),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn image_size_in_bytes(desc: &GfxImageDesc) -> u64 {
        // 只用于统计，按每像素 4 字节估算
        desc.extent.iter().map(|&dim| dim.max(1) as u64).product::<u64>() * desc.layer_count() as u64 * 4
    }
}
impl GfxDevice for HeadlessGfxDevice {
    fn create_image(&mut self, desc: &GfxImageDesc, name: &str, initial_data: Option<&[u8]>) -> GfxResult<GfxImage> {
        self.check_allocation(name)?;

        let size = Self::image_size_in_bytes(desc);
        if let Some(data) = initial_data {
            if data.len() as u64 > size {
                return Err(GfxError::InitialDataSize {
                    name: name.to_string(),
                    expected: size,
                    actual: data.len() as u64,
                });
            }
            self.setup_submissions += 1;
        }

        let raw = self.next_raw();
        self.live_images += 1;
        self.created_images += 1;
        self.live_bytes += size;
        log::trace!("headless: create image \"{}\" (#{})", name, raw);
        Ok(GfxImage::new(vk::Image::from_raw(raw), *desc, name))
    }

    fn create_buffer(
        &mut self,
        desc: &GfxBufferDesc,
        name: &str,
        initial_data: Option<&[u8]>,
    ) -> GfxResult<GfxBuffer> {
        self.check_allocation(name)?;

        if let Some(data) = initial_data {
            if data.len() as u64 > desc.size {
                return Err(GfxError::InitialDataSize {
                    name: name.to_string(),
                    expected: desc.size,
                    actual: data.len() as u64,
                });
            }
            self.setup_submissions += 1;
        }

        let raw = self.next_raw();
        self.live_buffers += 1;
        self.created_buffers += 1;
        self.live_bytes += desc.size;
        log::trace!("headless: create buffer \"{}\" (#{})", name, raw);
        Ok(GfxBuffer::new(vk::Buffer::from_raw(raw), *desc, name))
    }

    fn destroy_image(&mut self, image: GfxImage) {
        self.live_images -= 1;
        self.live_bytes -= Self::image_size_in_bytes(image.desc());
    }

    fn destroy_buffer(&mut self, buffer: GfxBuffer) {
        self.live_buffers -= 1;
        self.live_bytes -= buffer.size();
    }

    fn get_sampler(&mut self, desc: &GfxSamplerDesc) -> GfxResult<vk::Sampler> {
        if let Some(sampler) = self.samplers.get(desc) {
            return Ok(*sampler);
        }
        let sampler = vk::Sampler::from_raw(self.next_raw());
        self.samplers.insert(*desc, sampler);
        Ok(sampler)
    }

    fn with_setup_command_buffer(&mut self, f: &mut dyn FnMut(&mut dyn GfxCommandEncoder)) -> GfxResult<()> {
        let mut encoder = HeadlessCommandEncoder::new();
        f(&mut encoder);
        self.setup_submissions += 1;
        Ok(())
    }

    fn allocation_report(&self) -> Option<String> {
        Some(format!(
            "headless allocator: {} images, {} buffers alive, {} bytes",
            self.live_images, self.live_buffers, self.live_bytes
        ))
    }
}
