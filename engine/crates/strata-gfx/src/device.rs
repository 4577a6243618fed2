use ash::vk;

use crate::commands::command_encoder::GfxCommandEncoder;
use crate::error::GfxResult;
use crate::resources::buffer::{GfxBuffer, GfxBufferDesc};
use crate::resources::image::{GfxImage, GfxImageDesc};
use crate::sampler::GfxSamplerDesc;

/// 设备抽象
///
/// RenderGraph 只在 transient cache 未命中或 temporal 资源首次使用时调用 `create_*`。
/// 所有方法都在渲染线程上调用，不要求内部加锁。
pub trait GfxDevice {
    /// 创建 image；带初始数据时，返回的 image 处于 `TRANSFER_DST_OPTIMAL`
    fn create_image(&mut self, desc: &GfxImageDesc, name: &str, initial_data: Option<&[u8]>) -> GfxResult<GfxImage>;

    fn create_buffer(&mut self, desc: &GfxBufferDesc, name: &str, initial_data: Option<&[u8]>)
    -> GfxResult<GfxBuffer>;

    /// 立即销毁；调用者保证 GPU 已经不再使用该 image
    fn destroy_image(&mut self, image: GfxImage);

    /// 立即销毁；调用者保证 GPU 已经不再使用该 buffer
    fn destroy_buffer(&mut self, buffer: GfxBuffer);

    /// 相同描述返回同一个 sampler
    fn get_sampler(&mut self, desc: &GfxSamplerDesc) -> GfxResult<vk::Sampler>;

    /// 录制并同步执行一次性的 setup 命令
    fn with_setup_command_buffer(&mut self, f: &mut dyn FnMut(&mut dyn GfxCommandEncoder)) -> GfxResult<()>;

    /// 分配器的统计报告，用于诊断显存耗尽
    fn allocation_report(&self) -> Option<String> {
        None
    }
}
