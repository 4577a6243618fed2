use slotmap::SlotMap;
use strata_gfx::device::GfxDevice;
use strata_gfx::error::GfxResult;
use strata_gfx::resources::buffer::{GfxBuffer, GfxBufferDesc};
use strata_gfx::resources::image::{GfxImage, GfxImageDesc};

use crate::frame_counter::FrameCounter;
use crate::handles::{GfxBufferHandle, GfxImageHandle};

/// 资源管理器
///
/// 持有所有物理 Buffer 与 Image，对外提供轻量级的 Handle。
/// 支持资源的延迟销毁（Frames in Flight）：提交销毁的帧退休之后才真正交还给 device。
pub struct GfxResourceManager {
    buffer_pool: SlotMap<GfxBufferHandle, GfxBuffer>,
    image_pool: SlotMap<GfxImageHandle, GfxImage>,

    // 待销毁队列
    // (handle, frame_id)
    pending_destroy_buffers: Vec<(GfxBufferHandle, u64)>,
    pending_destroy_images: Vec<(GfxImageHandle, u64)>,

    destroyed: bool,
}
impl Default for GfxResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl GfxResourceManager {
    pub fn new() -> Self {
        Self {
            buffer_pool: SlotMap::with_key(),
            image_pool: SlotMap::with_key(),

            pending_destroy_buffers: Vec::new(),
            pending_destroy_images: Vec::new(),

            destroyed: false,
        }
    }
}
// destroy
impl GfxResourceManager {
    /// 销毁所有资源，包括尚在待销毁队列中的；调用前 GPU 必须 idle
    pub fn destroy(mut self, device: &mut dyn GfxDevice) {
        self.destroy_mut(device);
    }

    pub fn destroy_mut(&mut self, device: &mut dyn GfxDevice) {
        let _span = strata_crate_tools::profile_span!("GfxResourceManager::destroy_all");

        for (_, image) in self.image_pool.drain() {
            device.destroy_image(image);
        }
        for (_, buffer) in self.buffer_pool.drain() {
            device.destroy_buffer(buffer);
        }

        self.pending_destroy_buffers.clear();
        self.pending_destroy_images.clear();

        self.destroyed = true;
    }
}
impl Drop for GfxResourceManager {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            if !std::thread::panicking() {
                assert!(self.destroyed, "GfxResourceManager dropped without destroy()");
            }
        }
    }
}
// Subsystem API
impl GfxResourceManager {
    /// 清理已过期的资源
    ///
    /// 销毁那些提交销毁时的帧已经退休（GPU 不再使用）的资源。
    pub fn cleanup(&mut self, device: &mut dyn GfxDevice, frame_counter: &FrameCounter) {
        let _span = strata_crate_tools::profile_span!("GfxResourceManager::cleanup");

        let mut buffers_to_destroy = Vec::new();
        self.pending_destroy_buffers.retain(|(buffer_handle, frame_id)| {
            if frame_counter.is_retired(*frame_id) {
                buffers_to_destroy.push(*buffer_handle);
                false
            } else {
                true
            }
        });
        for buffer_handle in &buffers_to_destroy {
            if let Some(buffer) = self.buffer_pool.remove(*buffer_handle) {
                device.destroy_buffer(buffer);
            }
        }

        let mut images_to_destroy = Vec::new();
        self.pending_destroy_images.retain(|(image_handle, frame_id)| {
            if frame_counter.is_retired(*frame_id) {
                images_to_destroy.push(*image_handle);
                false
            } else {
                true
            }
        });
        for image_handle in &images_to_destroy {
            if let Some(image) = self.image_pool.remove(*image_handle) {
                device.destroy_image(image);
            }
        }

        if !buffers_to_destroy.is_empty() || !images_to_destroy.is_empty() {
            log::debug!(
                "{} destroyed {} retired buffers and {} retired images",
                frame_counter.frame_name(),
                buffers_to_destroy.len(),
                images_to_destroy.len()
            );
        }
    }

    /// 待销毁队列中的资源数量
    pub fn pending_destroy_count(&self) -> usize {
        self.pending_destroy_buffers.len() + self.pending_destroy_images.len()
    }
}
// Buffer API
impl GfxResourceManager {
    pub fn register_buffer(&mut self, buffer: GfxBuffer) -> GfxBufferHandle {
        self.buffer_pool.insert(buffer)
    }

    pub fn create_buffer(
        &mut self,
        device: &mut dyn GfxDevice,
        desc: &GfxBufferDesc,
        name: &str,
        initial_data: Option<&[u8]>,
    ) -> GfxResult<GfxBufferHandle> {
        let buffer = device.create_buffer(desc, name, initial_data)?;
        Ok(self.register_buffer(buffer))
    }

    #[inline]
    pub fn get_buffer(&self, handle: GfxBufferHandle) -> Option<&GfxBuffer> {
        self.buffer_pool.get(handle)
    }

    /// 在 `frame_id` 的 GPU 工作退休后销毁
    pub fn destroy_buffer_deferred(&mut self, handle: GfxBufferHandle, frame_id: u64) {
        self.pending_destroy_buffers.push((handle, frame_id));
    }

    /// 立即销毁；调用者保证 GPU 已经不再使用
    pub fn destroy_buffer_immediate(&mut self, device: &mut dyn GfxDevice, handle: GfxBufferHandle) {
        if let Some(buffer) = self.buffer_pool.remove(handle) {
            device.destroy_buffer(buffer);
        }
    }

    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffer_pool.len()
    }
}
// Image API
impl GfxResourceManager {
    pub fn register_image(&mut self, image: GfxImage) -> GfxImageHandle {
        self.image_pool.insert(image)
    }

    pub fn create_image(
        &mut self,
        device: &mut dyn GfxDevice,
        desc: &GfxImageDesc,
        name: &str,
        initial_data: Option<&[u8]>,
    ) -> GfxResult<GfxImageHandle> {
        let image = device.create_image(desc, name, initial_data)?;
        Ok(self.register_image(image))
    }

    #[inline]
    pub fn get_image(&self, handle: GfxImageHandle) -> Option<&GfxImage> {
        self.image_pool.get(handle)
    }

    /// 在 `frame_id` 的 GPU 工作退休后销毁
    pub fn destroy_image_deferred(&mut self, handle: GfxImageHandle, frame_id: u64) {
        self.pending_destroy_images.push((handle, frame_id));
    }

    /// 立即销毁；调用者保证 GPU 已经不再使用
    pub fn destroy_image_immediate(&mut self, device: &mut dyn GfxDevice, handle: GfxImageHandle) {
        if let Some(image) = self.image_pool.remove(handle) {
            device.destroy_image(image);
        }
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.image_pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use strata_gfx::headless::HeadlessGfxDevice;

    #[test]
    fn test_deferred_destroy_waits_for_retirement() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut frame_counter = FrameCounter::new(0, 2);

        let desc = GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, [8, 8]);
        let image = manager.create_image(&mut device, &desc, "image", None).unwrap();
        manager.destroy_image_deferred(image, frame_counter.frame_id());

        frame_counter.next_frame();
        manager.cleanup(&mut device, &frame_counter);
        assert!(manager.get_image(image).is_some());
        assert_eq!(device.live_image_count(), 1);

        frame_counter.next_frame();
        manager.cleanup(&mut device, &frame_counter);
        assert!(manager.get_image(image).is_none());
        assert_eq!(device.live_image_count(), 0);
        assert_eq!(manager.pending_destroy_count(), 0);

        manager.destroy(&mut device);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();

        let buffer_desc = GfxBufferDesc::new_gpu_only(64, vk::BufferUsageFlags::STORAGE_BUFFER);
        manager.create_buffer(&mut device, &buffer_desc, "buffer", None).unwrap();
        let image_desc = GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, [8, 8]);
        let image = manager.create_image(&mut device, &image_desc, "image", None).unwrap();
        manager.destroy_image_deferred(image, 0);

        manager.destroy(&mut device);
        assert_eq!(device.live_image_count(), 0);
        assert_eq!(device.live_buffer_count(), 0);
    }
}
