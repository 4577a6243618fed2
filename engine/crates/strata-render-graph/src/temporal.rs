//! 跨帧保留的资源
//!
//! 以名字为 key，记录物理资源以及它在上一次执行结束时的访问状态，
//! 下一帧的 RenderGraph 据此计算第一个 barrier。

use std::collections::HashMap;
use std::fmt;

use strata_gfx::device::GfxDevice;
use strata_gfx::error::GfxResult;
use strata_render_interface::gfx_resource_manager::GfxResourceManager;

use crate::access::RgAccessType;
use crate::resource::{RgPhysicalResource, RgResourceDesc};
use crate::transient_cache::TransientResourceCache;

/// temporal 资源的名字
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TemporalResourceKey(String);
impl TemporalResourceKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for TemporalResourceKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
impl From<String> for TemporalResourceKey {
    fn from(name: String) -> Self {
        Self(name)
    }
}
impl From<&TemporalResourceKey> for TemporalResourceKey {
    fn from(key: &TemporalResourceKey) -> Self {
        key.clone()
    }
}
impl fmt::Debug for TemporalResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
impl fmt::Display for TemporalResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct TemporalResource {
    desc: RgResourceDesc,
    physical: RgPhysicalResource,
    /// 上一次执行结束时的访问
    access: RgAccessType,
}

/// Temporal 资源表
///
/// 资源不会被自动回收，直到调用 `remove` 或者 `clear`。
#[derive(Default)]
pub struct TemporalResourceTable {
    resources: HashMap<TemporalResourceKey, TemporalResource>,
}
// new & init
impl TemporalResourceTable {
    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl TemporalResourceTable {
    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    #[inline]
    pub fn contains(&self, key: &TemporalResourceKey) -> bool {
        self.resources.contains_key(key)
    }

    /// 物理资源与上一次执行结束时的访问
    pub fn get(&self, key: &TemporalResourceKey) -> Option<(RgPhysicalResource, RgAccessType)> {
        self.resources.get(key).map(|resource| (resource.physical, resource.access))
    }

    pub fn desc(&self, key: &TemporalResourceKey) -> Option<&RgResourceDesc> {
        self.resources.get(key).map(|resource| &resource.desc)
    }
}
// Subsystem API
impl TemporalResourceTable {
    /// 取出 key 对应的资源，不存在或者描述变化时重新创建
    ///
    /// 已有资源的 usage 包含 `desc` 的 usage 即可复用。否则重新创建，
    /// 其余部分不变时新资源取新旧 usage 的并集，交替用途的 key 不会每帧重建。
    /// 新创建的资源状态为 `Nothing`，内容无意义；旧资源在 `frame_id` 退休后销毁。
    pub fn get_or_create(
        &mut self,
        key: &TemporalResourceKey,
        desc: &RgResourceDesc,
        transient_cache: &mut TransientResourceCache,
        device: &mut dyn GfxDevice,
        resource_manager: &mut GfxResourceManager,
        frame_id: u64,
    ) -> GfxResult<(RgPhysicalResource, RgAccessType)> {
        let desc = match self.resources.get(key) {
            Some(resource) if resource.desc.covers(desc) => return Ok((resource.physical, resource.access)),
            Some(resource) => {
                let merged = resource.desc.union_usage(desc);
                log::info!("temporal resource {} changed its desc, recreating: {:?} -> {:?}", key, resource.desc, merged);
                merged
            }
            None => *desc,
        };

        let physical = transient_cache.acquire(&desc, key.as_str(), device, resource_manager)?;
        let old = self.resources.insert(
            key.clone(),
            TemporalResource {
                desc,
                physical,
                access: RgAccessType::Nothing,
            },
        );
        if let Some(old) = old {
            Self::destroy_deferred(old.physical, resource_manager, frame_id);
        }
        Ok((physical, RgAccessType::Nothing))
    }

    /// 记录执行结束时的访问
    pub fn set_access(&mut self, key: &TemporalResourceKey, access: RgAccessType) {
        match self.resources.get_mut(key) {
            Some(resource) => resource.access = access,
            None => log::warn!("set_access on unknown temporal resource {}", key),
        }
    }

    /// 移除并在 `frame_id` 退休后销毁
    pub fn remove(&mut self, key: &TemporalResourceKey, resource_manager: &mut GfxResourceManager, frame_id: u64) -> bool {
        match self.resources.remove(key) {
            Some(resource) => {
                Self::destroy_deferred(resource.physical, resource_manager, frame_id);
                true
            }
            None => false,
        }
    }

    /// 立即销毁所有资源；调用前 GPU 必须 idle
    pub fn clear(&mut self, device: &mut dyn GfxDevice, resource_manager: &mut GfxResourceManager) {
        for (_, resource) in self.resources.drain() {
            match resource.physical {
                RgPhysicalResource::Image(handle) => resource_manager.destroy_image_immediate(device, handle),
                RgPhysicalResource::Buffer(handle) => resource_manager.destroy_buffer_immediate(device, handle),
            }
        }
    }
}
// tools
impl TemporalResourceTable {
    fn destroy_deferred(physical: RgPhysicalResource, resource_manager: &mut GfxResourceManager, frame_id: u64) {
        match physical {
            RgPhysicalResource::Image(handle) => resource_manager.destroy_image_deferred(handle, frame_id),
            RgPhysicalResource::Buffer(handle) => resource_manager.destroy_buffer_deferred(handle, frame_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use strata_gfx::headless::HeadlessGfxDevice;
    use strata_gfx::resources::image::GfxImageDesc;

    struct Fixture {
        device: HeadlessGfxDevice,
        manager: GfxResourceManager,
        cache: TransientResourceCache,
        table: TemporalResourceTable,
    }
    impl Fixture {
        fn new() -> Self {
            Self {
                device: HeadlessGfxDevice::new(),
                manager: GfxResourceManager::new(),
                cache: TransientResourceCache::default(),
                table: TemporalResourceTable::new(),
            }
        }

        fn get(&mut self, key: &TemporalResourceKey, desc: &RgResourceDesc, frame_id: u64) -> (RgPhysicalResource, RgAccessType) {
            self.table
                .get_or_create(key, desc, &mut self.cache, &mut self.device, &mut self.manager, frame_id)
                .unwrap()
        }

        fn destroy(mut self) {
            self.table.clear(&mut self.device, &mut self.manager);
            self.cache.clear(&mut self.device, &mut self.manager);
            self.manager.destroy(&mut self.device);
        }
    }

    fn desc(width: u32) -> RgResourceDesc {
        GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [width, width]).into()
    }

    #[test]
    fn test_first_use_is_undefined_and_state_persists() {
        let mut fixture = Fixture::new();
        let key = TemporalResourceKey::from("taa:history");

        let (physical, access) = fixture.get(&key, &desc(64), 0);
        assert_eq!(access, RgAccessType::Nothing);

        fixture.table.set_access(&key, RgAccessType::ComputeShaderWrite);
        let (again, access) = fixture.get(&key, &desc(64), 1);
        assert_eq!(physical, again);
        assert_eq!(access, RgAccessType::ComputeShaderWrite);

        fixture.destroy();
    }

    #[test]
    fn test_desc_change_recreates() {
        let mut fixture = Fixture::new();
        let key = TemporalResourceKey::from("ssgi");

        let (old, _) = fixture.get(&key, &desc(64), 0);
        fixture.table.set_access(&key, RgAccessType::ComputeShaderWrite);

        let (new, access) = fixture.get(&key, &desc(128), 5);
        assert_ne!(old, new);
        assert_eq!(access, RgAccessType::Nothing);
        assert_eq!(fixture.manager.pending_destroy_count(), 1);
        assert_eq!(fixture.table.len(), 1);

        fixture.destroy();
    }

    #[test]
    fn test_remove_defers_destruction() {
        let mut fixture = Fixture::new();
        let key = TemporalResourceKey::from("history");
        fixture.get(&key, &desc(32), 0);

        assert!(fixture.table.remove(&key, &mut fixture.manager, 3));
        assert!(!fixture.table.remove(&key, &mut fixture.manager, 3));
        assert!(fixture.table.is_empty());
        assert_eq!(fixture.manager.pending_destroy_count(), 1);

        fixture.destroy();
    }

    #[test]
    fn test_usage_grows_to_union_then_settles() {
        let mut fixture = Fixture::new();
        let key = TemporalResourceKey::from("taa:0");
        let base = GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [64, 64]);
        let storage: RgResourceDesc = base.usage(vk::ImageUsageFlags::STORAGE).into();
        let sampled: RgResourceDesc = base.usage(vk::ImageUsageFlags::SAMPLED).into();
        let both: RgResourceDesc = base.usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED).into();

        let (first, _) = fixture.get(&key, &storage, 0);
        let (second, _) = fixture.get(&key, &sampled, 1);
        assert_ne!(first, second);
        assert_eq!(fixture.table.desc(&key), Some(&both));

        // 并集之后两种用途都直接复用
        for frame_id in 2..6 {
            let usage = if frame_id % 2 == 0 { &storage } else { &sampled };
            assert_eq!(fixture.get(&key, usage, frame_id).0, second);
        }
        assert_eq!(fixture.device.created_image_count(), 2);
        assert_eq!(fixture.manager.pending_destroy_count(), 1);

        fixture.destroy();
    }
}
