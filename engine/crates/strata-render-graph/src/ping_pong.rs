use crate::graph::RenderGraph;
use crate::resource::RgResourceDescTrait;
use crate::resource_handle::RgHandle;
use crate::temporal::TemporalResourceKey;

/// 成对的 temporal 资源，交替作为本帧输出与上一帧历史
///
/// 每次调用 `get_output_and_history` 之后交换两个 key，
/// 于是本帧的输出在下一帧成为历史，不需要拷贝。
pub struct PingPongTemporalResource {
    output_key: TemporalResourceKey,
    history_key: TemporalResourceKey,
}
impl PingPongTemporalResource {
    pub fn new(name: &str) -> Self {
        Self {
            output_key: TemporalResourceKey::new(format!("{name}:0")),
            history_key: TemporalResourceKey::new(format!("{name}:1")),
        }
    }

    /// 返回 (output, history)
    pub fn get_output_and_history<D: RgResourceDescTrait>(
        &mut self,
        rg: &mut RenderGraph<'_>,
        desc: D,
    ) -> (RgHandle<D::Resource>, RgHandle<D::Resource>) {
        let output = rg.get_or_create_temporal(&self.output_key, desc);
        let history = rg.get_or_create_temporal(&self.history_key, desc);
        std::mem::swap(&mut self.output_key, &mut self.history_key);
        (output, history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use strata_gfx::headless::{HeadlessCommandEncoder, HeadlessGfxDevice};
    use strata_gfx::resources::image::GfxImageDesc;
    use strata_render_interface::gfx_resource_manager::GfxResourceManager;

    use crate::access::RgAccessType;
    use crate::executor::RgResourceContext;
    use crate::temporal::TemporalResourceTable;
    use crate::transient_cache::TransientResourceCache;

    #[test]
    fn test_output_and_history_alternate_with_period_two() {
        let mut device = HeadlessGfxDevice::new();
        let mut manager = GfxResourceManager::new();
        let mut cache = TransientResourceCache::default();
        let mut temporal = TemporalResourceTable::new();

        let desc = GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [64, 64])
            .usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED);
        let mut taa = PingPongTemporalResource::new("taa");

        // (output, history) 的物理资源
        let mut frames = Vec::new();
        for frame_id in 0..6 {
            let mut rg = RenderGraph::new();
            let (mut output, history) = taa.get_output_and_history(&mut rg, desc);
            let (output_ref, history_ref) = {
                let mut pass = rg.add_pass("taa");
                let history_ref = pass.read(&history, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
                let output_ref = pass.write(&mut output, RgAccessType::ComputeShaderWrite);
                (output_ref, history_ref)
            };
            let exported_output = rg.export(output, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
            let exported_history = rg.export(history, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
            assert_ne!(output_ref.handle().index(), history_ref.handle().index());

            let mut encoder = HeadlessCommandEncoder::new();
            let mut ctx = RgResourceContext {
                device: &mut device,
                resource_manager: &mut manager,
                transient_cache: &mut cache,
                temporal_table: &mut temporal,
                frame_id,
            };
            let retired = rg.execute(&mut ctx, &mut encoder).unwrap();
            frames.push((
                retired.exported_image(exported_output).unwrap(),
                retired.exported_image(exported_history).unwrap(),
            ));
            retired.release_resources(&mut cache, frame_id);
        }

        for window in frames.windows(2) {
            let (output, history) = window[0];
            let (next_output, next_history) = window[1];
            assert_ne!(output, history);
            // 本帧输出成为下一帧的历史
            assert_eq!(next_history, output);
            assert_eq!(next_output, history);
        }
        for pair in frames.windows(3) {
            assert_eq!(pair[0], pair[2]);
        }
        assert_eq!(device.created_image_count(), 2);

        temporal.clear(&mut device, &mut manager);
        cache.clear(&mut device, &mut manager);
        manager.destroy(&mut device);
    }
}
