//! 跨帧复用的临时资源池
//!
//! 以描述为 key 分桶，每个桶是一个 LIFO 栈。
//! 资源只在其所在帧退休之后才会被还回来，所以池中的资源一定没有 GPU 在使用。

use std::collections::HashMap;
use std::hash::Hash;

use strata_gfx::device::GfxDevice;
use strata_gfx::error::GfxResult;
use strata_gfx::resources::buffer::GfxBufferDesc;
use strata_gfx::resources::image::GfxImageDesc;
use strata_render_interface::gfx_resource_manager::GfxResourceManager;
use strata_render_interface::handles::{GfxBufferHandle, GfxImageHandle};

use crate::resource::{RgPhysicalResource, RgResourceDesc};

struct CachedResource<H> {
    handle: H,
    /// 被还回来时的帧号
    released_frame: u64,
}

struct ResourceBuckets<D, H> {
    buckets: HashMap<D, Vec<CachedResource<H>>>,
}
impl<D: Eq + Hash, H: Copy> ResourceBuckets<D, H> {
    fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    fn pop(&mut self, desc: &D) -> Option<H> {
        self.buckets.get_mut(desc).and_then(|bucket| bucket.pop()).map(|cached| cached.handle)
    }

    fn push(&mut self, desc: D, handle: H, released_frame: u64) {
        self.buckets.entry(desc).or_default().push(CachedResource { handle, released_frame });
    }

    /// 取出所有超期的资源，并删除空桶
    fn drain_expired(&mut self, is_expired: impl Fn(u64) -> bool) -> Vec<H> {
        let mut expired = Vec::new();
        for bucket in self.buckets.values_mut() {
            bucket.retain(|cached| {
                if is_expired(cached.released_frame) {
                    expired.push(cached.handle);
                    false
                } else {
                    true
                }
            });
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        expired
    }

    fn drain_all(&mut self) -> Vec<H> {
        self.buckets.drain().flat_map(|(_, bucket)| bucket.into_iter().map(|cached| cached.handle)).collect()
    }

    fn resident_count(&self, desc: &D) -> usize {
        self.buckets.get(desc).map_or(0, Vec::len)
    }

    fn total_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Transient 资源池
pub struct TransientResourceCache {
    images: ResourceBuckets<GfxImageDesc, GfxImageHandle>,
    buffers: ResourceBuckets<GfxBufferDesc, GfxBufferHandle>,

    /// 连续多少帧没有被取用就销毁
    max_unused_frames: u64,
}
impl Default for TransientResourceCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_UNUSED_FRAMES)
    }
}
// new & init
impl TransientResourceCache {
    pub const DEFAULT_MAX_UNUSED_FRAMES: u64 = 4;

    pub fn new(max_unused_frames: u64) -> Self {
        Self {
            images: ResourceBuckets::new(),
            buffers: ResourceBuckets::new(),
            max_unused_frames,
        }
    }
}
// getters
impl TransientResourceCache {
    #[inline]
    pub fn max_unused_frames(&self) -> u64 {
        self.max_unused_frames
    }

    /// 池中某个描述的空闲资源数量
    pub fn resident_image_count(&self, desc: &GfxImageDesc) -> usize {
        self.images.resident_count(desc)
    }

    pub fn resident_buffer_count(&self, desc: &GfxBufferDesc) -> usize {
        self.buffers.resident_count(desc)
    }

    /// 池中所有空闲资源的数量
    pub fn total_resident_count(&self) -> usize {
        self.images.total_count() + self.buffers.total_count()
    }

    pub fn bucket_count(&self) -> usize {
        self.images.bucket_count() + self.buffers.bucket_count()
    }
}
// acquire & release
impl TransientResourceCache {
    /// 取出一个描述完全相同的空闲 image，没有则创建
    pub fn acquire_image(
        &mut self,
        desc: &GfxImageDesc,
        name: &str,
        device: &mut dyn GfxDevice,
        resource_manager: &mut GfxResourceManager,
    ) -> GfxResult<GfxImageHandle> {
        if let Some(handle) = self.images.pop(desc) {
            return Ok(handle);
        }

        log::debug!("transient cache miss, creating image \"{}\": {:?}", name, desc);
        resource_manager.create_image(device, desc, name, None)
    }

    pub fn acquire_buffer(
        &mut self,
        desc: &GfxBufferDesc,
        name: &str,
        device: &mut dyn GfxDevice,
        resource_manager: &mut GfxResourceManager,
    ) -> GfxResult<GfxBufferHandle> {
        if let Some(handle) = self.buffers.pop(desc) {
            return Ok(handle);
        }

        log::debug!("transient cache miss, creating buffer \"{}\": {:?}", name, desc);
        resource_manager.create_buffer(device, desc, name, None)
    }

    pub fn acquire(
        &mut self,
        desc: &RgResourceDesc,
        name: &str,
        device: &mut dyn GfxDevice,
        resource_manager: &mut GfxResourceManager,
    ) -> GfxResult<RgPhysicalResource> {
        match desc {
            RgResourceDesc::Image(desc) => {
                self.acquire_image(desc, name, device, resource_manager).map(RgPhysicalResource::Image)
            }
            RgResourceDesc::Buffer(desc) => {
                self.acquire_buffer(desc, name, device, resource_manager).map(RgPhysicalResource::Buffer)
            }
        }
    }

    /// 还回一个 image；调用者保证使用它的帧已经退休
    pub fn release_image(&mut self, desc: GfxImageDesc, handle: GfxImageHandle, frame_id: u64) {
        self.images.push(desc, handle, frame_id);
    }

    pub fn release_buffer(&mut self, desc: GfxBufferDesc, handle: GfxBufferHandle, frame_id: u64) {
        self.buffers.push(desc, handle, frame_id);
    }

    /// 还回一个资源，描述与物理资源的种类必须一致
    pub fn release(&mut self, desc: RgResourceDesc, physical: RgPhysicalResource, frame_id: u64) {
        match (desc, physical) {
            (RgResourceDesc::Image(desc), RgPhysicalResource::Image(handle)) => {
                self.release_image(desc, handle, frame_id)
            }
            (RgResourceDesc::Buffer(desc), RgPhysicalResource::Buffer(handle)) => {
                self.release_buffer(desc, handle, frame_id)
            }
            (desc, physical) => {
                debug_assert!(false, "resource kind mismatch on release: {:?} vs {:?}", desc, physical);
                log::error!("resource kind mismatch on release: {:?} vs {:?}", desc, physical);
            }
        }
    }
}
// destroy
impl TransientResourceCache {
    /// 销毁超过 `max_unused_frames` 帧没有被取用的资源，返回销毁的数量
    pub fn evict_unused(
        &mut self,
        current_frame_id: u64,
        device: &mut dyn GfxDevice,
        resource_manager: &mut GfxResourceManager,
    ) -> usize {
        let _span = strata_crate_tools::profile_span!("TransientResourceCache::evict_unused");

        let max_unused_frames = self.max_unused_frames;
        let is_expired = |released_frame: u64| released_frame.saturating_add(max_unused_frames) < current_frame_id;

        let images = self.images.drain_expired(is_expired);
        let buffers = self.buffers.drain_expired(is_expired);
        let evicted = images.len() + buffers.len();

        for handle in images {
            resource_manager.destroy_image_immediate(device, handle);
        }
        for handle in buffers {
            resource_manager.destroy_buffer_immediate(device, handle);
        }

        if evicted > 0 {
            log::debug!("transient cache evicted {} resources at frame {}", evicted, current_frame_id);
        }
        evicted
    }

    /// 销毁池中所有资源；调用前 GPU 必须 idle
    pub fn clear(&mut self, device: &mut dyn GfxDevice, resource_manager: &mut GfxResourceManager) {
        for handle in self.images.drain_all() {
            resource_manager.destroy_image_immediate(device, handle);
        }
        for handle in self.buffers.drain_all() {
            resource_manager.destroy_buffer_immediate(device, handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use strata_gfx::headless::HeadlessGfxDevice;

    fn hdr_desc() -> GfxImageDesc {
        GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [256, 256]).usage(vk::ImageUsageFlags::STORAGE)
    }

    #[test]
    fn test_release_then_acquire_returns_same_resource() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut cache = TransientResourceCache::default();

        let desc = hdr_desc();
        let first = cache.acquire_image(&desc, "hdr", &mut device, &mut manager).unwrap();
        cache.release_image(desc, first, 0);
        let second = cache.acquire_image(&desc, "hdr", &mut device, &mut manager).unwrap();

        assert_eq!(first, second);
        assert_eq!(device.created_image_count(), 1);

        cache.release_image(desc, second, 0);
        cache.clear(&mut device, &mut manager);
        manager.destroy(&mut device);
    }

    #[test]
    fn test_different_desc_never_shares() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut cache = TransientResourceCache::default();

        let desc = hdr_desc();
        let image = cache.acquire_image(&desc, "hdr", &mut device, &mut manager).unwrap();
        cache.release_image(desc, image, 0);

        let other = desc.usage(vk::ImageUsageFlags::SAMPLED);
        let other_image = cache.acquire_image(&other, "other", &mut device, &mut manager).unwrap();
        assert_ne!(image, other_image);
        assert_eq!(cache.resident_image_count(&desc), 1);

        cache.release_image(other, other_image, 0);
        cache.clear(&mut device, &mut manager);
        manager.destroy(&mut device);
    }

    #[test]
    fn test_lifo_order() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut cache = TransientResourceCache::default();

        let desc = GfxBufferDesc::new_gpu_only(1024, vk::BufferUsageFlags::STORAGE_BUFFER);
        let a = cache.acquire_buffer(&desc, "a", &mut device, &mut manager).unwrap();
        let b = cache.acquire_buffer(&desc, "b", &mut device, &mut manager).unwrap();
        cache.release_buffer(desc, a, 0);
        cache.release_buffer(desc, b, 1);

        assert_eq!(cache.acquire_buffer(&desc, "c", &mut device, &mut manager).unwrap(), b);
        assert_eq!(cache.acquire_buffer(&desc, "d", &mut device, &mut manager).unwrap(), a);

        cache.release_buffer(desc, a, 2);
        cache.release_buffer(desc, b, 2);
        cache.clear(&mut device, &mut manager);
        manager.destroy(&mut device);
    }

    #[test]
    fn test_eviction_after_unused_frames() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut cache = TransientResourceCache::new(2);

        let desc = hdr_desc();
        let image = cache.acquire_image(&desc, "hdr", &mut device, &mut manager).unwrap();
        cache.release_image(desc, image, 10);

        assert_eq!(cache.evict_unused(12, &mut device, &mut manager), 0);
        assert_eq!(cache.resident_image_count(&desc), 1);

        assert_eq!(cache.evict_unused(13, &mut device, &mut manager), 1);
        assert_eq!(cache.resident_image_count(&desc), 0);
        assert_eq!(cache.bucket_count(), 0);
        assert_eq!(device.live_image_count(), 0);
        assert!(manager.get_image(image).is_none());

        manager.destroy(&mut device);
    }

    #[test]
    fn test_unbounded_retention_never_evicts() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut cache = TransientResourceCache::new(u64::MAX);

        let desc = hdr_desc();
        let image = cache.acquire_image(&desc, "hdr", &mut device, &mut manager).unwrap();
        cache.release_image(desc, image, 10);

        assert_eq!(cache.evict_unused(u64::MAX, &mut device, &mut manager), 0);
        assert_eq!(cache.resident_image_count(&desc), 1);

        cache.clear(&mut device, &mut manager);
        manager.destroy(&mut device);
    }

    #[test]
    fn test_steady_state_sixty_frames() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut cache = TransientResourceCache::default();

        let desc = hdr_desc();
        let mut first = None;
        for frame_id in 0..60 {
            let image = cache.acquire_image(&desc, "hdr", &mut device, &mut manager).unwrap();
            assert_eq!(*first.get_or_insert(image), image);
            cache.release_image(desc, image, frame_id);
            cache.evict_unused(frame_id, &mut device, &mut manager);
            assert_eq!(cache.resident_image_count(&desc), 1);
        }
        assert_eq!(device.created_image_count(), 1);

        cache.clear(&mut device, &mut manager);
        assert_eq!(device.live_image_count(), 0);
        manager.destroy(&mut device);
    }

    #[test]
    fn test_acquire_failure_is_reported() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut cache = TransientResourceCache::default();

        device.fail_after(0);
        let result = cache.acquire_image(&hdr_desc(), "hdr", &mut device, &mut manager);
        assert!(result.is_err());
        assert_eq!(manager.image_count(), 0);

        manager.destroy(&mut device);
    }
}
