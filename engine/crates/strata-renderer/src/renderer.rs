//! 帧循环
//!
//! 每帧的流程：
//! 1. `begin_frame`：把已经退休的帧持有的 transient 资源还给 cache，淘汰闲置资源，执行延迟销毁
//! 2. `render_frame`：构建 RenderGraph，编译并录制到 command encoder
//! 3. `end_frame`：推进帧号
//!
//! 调用者负责在 `begin_frame` 之前等待 `frame_id - frames_in_flight` 帧的 fence。

use std::collections::VecDeque;

use strata_gfx::commands::command_encoder::GfxCommandEncoder;
use strata_gfx::device::GfxDevice;
use strata_gfx::error::GfxResult;
use strata_gfx::resources::image::GfxImageDesc;
use strata_render_graph::{
    RenderGraph, RetiredRenderGraph, RgError, RgResourceContext, RgResult, TemporalResourceKey, TemporalResourceTable,
    TransientResourceCache,
};
use strata_render_interface::frame_counter::FrameCounter;
use strata_render_interface::gfx_resource_manager::GfxResourceManager;
use strata_render_interface::handles::GfxImageHandle;

use crate::config::RendererConfig;

/// 持有 device 以及所有跨帧的资源仓库
///
/// transient cache 与 temporal table 只在帧边界被修改。
pub struct Renderer<D: GfxDevice> {
    config: RendererConfig,
    device: D,
    resource_manager: GfxResourceManager,
    transient_cache: TransientResourceCache,
    temporal_table: TemporalResourceTable,
    frame_counter: FrameCounter,

    /// 已经录制、GPU 可能仍在使用的帧，按帧号递增
    in_flight: VecDeque<RetiredRenderGraph>,

    plan_printed: bool,
    dropped_frames: u64,
}
// new & init
impl<D: GfxDevice> Renderer<D> {
    pub fn new(device: D, config: RendererConfig) -> Self {
        log::info!(
            "renderer: {} frames in flight, transient resources evicted after {} unused frames",
            config.frames_in_flight,
            config.transient_max_unused_frames
        );
        Self {
            frame_counter: FrameCounter::new(0, config.frames_in_flight),
            transient_cache: TransientResourceCache::new(config.transient_max_unused_frames),
            temporal_table: TemporalResourceTable::new(),
            resource_manager: GfxResourceManager::new(),
            in_flight: VecDeque::with_capacity(config.frames_in_flight + 1),
            plan_printed: false,
            dropped_frames: 0,
            device,
            config,
        }
    }
}
// getters
impl<D: GfxDevice> Renderer<D> {
    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_counter.frame_id()
    }

    #[inline]
    pub fn resource_manager(&self) -> &GfxResourceManager {
        &self.resource_manager
    }

    #[inline]
    pub fn transient_cache(&self) -> &TransientResourceCache {
        &self.transient_cache
    }

    #[inline]
    pub fn temporal_table(&self) -> &TemporalResourceTable {
        &self.temporal_table
    }

    /// 已录制但还没有退休的帧数
    #[inline]
    pub fn in_flight_frame_count(&self) -> usize {
        self.in_flight.len()
    }

    /// 最近一次成功录制的帧，用来查询导出的资源
    #[inline]
    pub fn latest_recorded_frame(&self) -> Option<&RetiredRenderGraph> {
        self.in_flight.back()
    }

    #[inline]
    pub fn dropped_frame_count(&self) -> u64 {
        self.dropped_frames
    }
}
// 持久资源
impl<D: GfxDevice> Renderer<D> {
    /// 创建由调用者持有、每帧导入到 RenderGraph 的 image
    pub fn create_persistent_image(&mut self, desc: &GfxImageDesc, name: &str) -> GfxResult<GfxImageHandle> {
        self.resource_manager.create_image(&mut self.device, desc, name, None)
    }

    /// 在当前帧退休后销毁
    pub fn destroy_persistent_image(&mut self, image: GfxImageHandle) {
        self.resource_manager.destroy_image_deferred(image, self.frame_counter.frame_id());
    }

    /// 不再需要的 temporal 资源，在当前帧退休后销毁
    pub fn remove_temporal(&mut self, key: &TemporalResourceKey) -> bool {
        self.temporal_table.remove(key, &mut self.resource_manager, self.frame_counter.frame_id())
    }
}
// update
impl<D: GfxDevice> Renderer<D> {
    pub fn begin_frame(&mut self) {
        let _span = strata_crate_tools::profile_span!("Renderer::begin_frame");
        let frame_id = self.frame_counter.frame_id();

        self.release_retired_frames();

        let evicted = self.transient_cache.evict_unused(frame_id, &mut self.device, &mut self.resource_manager);
        if evicted > 0 {
            log::debug!("{} evicted {} unused transient resources", self.frame_counter.frame_name(), evicted);
        }

        self.resource_manager.cleanup(&mut self.device, &self.frame_counter);
    }

    /// 构建并录制一帧
    ///
    /// `build` 的返回值原样返回，通常是导出的句柄。
    /// 失败时这一帧没有录制任何命令，transient 资源已经还给 cache，temporal 资源的状态保持不变；
    /// 调用者跳过这一帧的提交，照常调用 `end_frame`。
    pub fn render_frame<'a, T>(
        &mut self,
        encoder: &mut dyn GfxCommandEncoder,
        build: impl FnOnce(&mut RenderGraph<'a>) -> T,
    ) -> RgResult<T> {
        let _span = strata_crate_tools::profile_span!("Renderer::render_frame");
        let frame_id = self.frame_counter.frame_id();

        let mut rg = RenderGraph::new().with_pass_labels(self.config.label_passes);
        let output = build(&mut rg);

        let print_plan = self.config.print_execution_plan && !self.plan_printed;
        let mut ctx = RgResourceContext {
            device: &mut self.device,
            resource_manager: &mut self.resource_manager,
            transient_cache: &mut self.transient_cache,
            temporal_table: &mut self.temporal_table,
            frame_id,
        };
        let result = match rg.compile(&mut ctx) {
            Ok(compiled) => {
                if print_plan {
                    compiled.print_execution_plan();
                    self.plan_printed = true;
                }
                compiled.execute(&mut ctx, encoder)
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(retired) => {
                self.in_flight.push_back(retired);
                Ok(output)
            }
            Err(err) => {
                self.report_dropped_frame(&err);
                Err(err)
            }
        }
    }

    pub fn end_frame(&mut self) {
        self.frame_counter.next_frame();
    }
}
// destroy
impl<D: GfxDevice> Renderer<D> {
    /// 销毁所有资源并交还 device
    ///
    /// 调用者保证 GPU 已经空闲。
    pub fn destroy(mut self) -> D {
        let frame_id = self.frame_counter.frame_id();
        for retired in self.in_flight.drain(..) {
            retired.release_resources(&mut self.transient_cache, frame_id);
        }
        self.temporal_table.clear(&mut self.device, &mut self.resource_manager);
        self.transient_cache.clear(&mut self.device, &mut self.resource_manager);

        let Self {
            mut device,
            resource_manager,
            dropped_frames,
            ..
        } = self;
        resource_manager.destroy(&mut device);
        log::info!("renderer destroyed after {} frames, {} dropped", frame_id, dropped_frames);
        device
    }
}
// tools
impl<D: GfxDevice> Renderer<D> {
    fn release_retired_frames(&mut self) {
        let frame_id = self.frame_counter.frame_id();
        while self.in_flight.front().is_some_and(|retired| self.frame_counter.is_retired(retired.frame_id())) {
            if let Some(retired) = self.in_flight.pop_front() {
                retired.release_resources(&mut self.transient_cache, frame_id);
            }
        }
    }

    fn report_dropped_frame(&mut self, err: &RgError) {
        self.dropped_frames += 1;
        let frame_name = self.frame_counter.frame_name();

        if err.is_pipeline_not_ready() {
            log::warn!("{} skipped, retry next frame: {}", frame_name, err);
            return;
        }

        log::error!("{} dropped: {}", frame_name, err);
        if matches!(err, RgError::ResourceCreationFailure { .. })
            && let Some(report) = self.device.allocation_report()
        {
            log::warn!("{} allocation report:\n{}", frame_name, report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use strata_gfx::error::GfxError;
    use strata_gfx::headless::{HeadlessCommandEncoder, HeadlessGfxDevice};
    use strata_render_graph::{PingPongTemporalResource, RgAccessType};

    fn hdr_desc() -> GfxImageDesc {
        GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, [256, 256])
    }

    fn new_renderer() -> Renderer<HeadlessGfxDevice> {
        Renderer::new(HeadlessGfxDevice::new(), RendererConfig::default())
    }

    /// 一个 compute 写、一个 fragment 读
    fn build_lighting(rg: &mut RenderGraph<'_>) {
        let mut hdr = rg.create(hdr_desc(), "hdr");
        {
            let mut pass = rg.add_pass("lighting");
            pass.write(&mut hdr, RgAccessType::ComputeShaderWrite);
        }
        {
            let mut pass = rg.add_pass("tonemap");
            pass.read(&hdr, RgAccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer);
        }
    }

    fn run_frame(
        renderer: &mut Renderer<HeadlessGfxDevice>,
        build: impl FnOnce(&mut RenderGraph<'_>),
    ) -> (RgResult<()>, HeadlessCommandEncoder) {
        let mut encoder = HeadlessCommandEncoder::new();
        renderer.begin_frame();
        let result = renderer.render_frame(&mut encoder, build);
        renderer.end_frame();
        (result, encoder)
    }

    #[test]
    fn test_transient_released_after_frames_in_flight() {
        let mut renderer = new_renderer();

        run_frame(&mut renderer, build_lighting).0.unwrap();
        assert_eq!(renderer.in_flight_frame_count(), 1);
        assert_eq!(renderer.transient_cache().total_resident_count(), 0);

        // 第 0 帧还在 GPU 上，只能新建
        run_frame(&mut renderer, build_lighting).0.unwrap();
        assert_eq!(renderer.device().created_image_count(), 2);

        // 第 2 帧开始时第 0 帧退休
        renderer.begin_frame();
        assert_eq!(renderer.in_flight_frame_count(), 1);
        assert_eq!(renderer.transient_cache().total_resident_count(), 1);

        renderer.destroy();
    }

    #[test]
    fn test_steady_state_does_not_grow() {
        let mut renderer = new_renderer();
        for _ in 0..60 {
            run_frame(&mut renderer, build_lighting).0.unwrap();
        }
        // 两帧在途，正好两份
        assert_eq!(renderer.device().created_image_count(), 2);
        assert_eq!(renderer.dropped_frame_count(), 0);

        let device = renderer.destroy();
        assert_eq!(device.live_image_count(), 0);
    }

    #[test]
    fn test_creation_failure_drops_frame_and_recovers() {
        let mut renderer = new_renderer();
        run_frame(&mut renderer, build_lighting).0.unwrap();

        renderer.device_mut().fail_after(0);
        let (result, encoder) = run_frame(&mut renderer, build_lighting);
        match result {
            Err(RgError::ResourceCreationFailure { pass, resource, .. }) => {
                assert_eq!(pass, "lighting");
                assert_eq!(resource, "hdr");
            }
            other => panic!("expected creation failure, got {:?}", other.err()),
        }
        assert!(encoder.commands().is_empty());
        assert_eq!(renderer.dropped_frame_count(), 1);
        assert_eq!(renderer.in_flight_frame_count(), 1);

        renderer.device_mut().clear_failure();
        run_frame(&mut renderer, build_lighting).0.unwrap();
        assert_eq!(renderer.dropped_frame_count(), 1);

        renderer.destroy();
    }

    #[test]
    fn test_pipeline_not_ready_skips_frame() {
        let mut renderer = new_renderer();
        let (result, _) = run_frame(&mut renderer, |rg| {
            let mut hdr = rg.create(hdr_desc(), "hdr");
            let mut pass = rg.add_pass("lighting");
            pass.write(&mut hdr, RgAccessType::ComputeShaderWrite);
            pass.render(|_| {
                Err(GfxError::PipelineNotReady {
                    pipeline: "lighting.slang".to_string(),
                }
                .into())
            });
        });
        assert!(result.unwrap_err().is_pipeline_not_ready());
        assert_eq!(renderer.dropped_frame_count(), 1);
        // transient 已经直接还给 cache
        assert_eq!(renderer.transient_cache().total_resident_count(), 1);

        renderer.destroy();
    }

    #[test]
    fn test_build_output_is_returned() {
        let mut renderer = new_renderer();
        let mut encoder = HeadlessCommandEncoder::new();
        renderer.begin_frame();
        let exported = renderer
            .render_frame(&mut encoder, |rg| {
                let mut hdr = rg.create(hdr_desc(), "hdr");
                {
                    let mut pass = rg.add_pass("lighting");
                    pass.write(&mut hdr, RgAccessType::ComputeShaderWrite);
                }
                rg.export(hdr, RgAccessType::TransferRead)
            })
            .unwrap();
        renderer.end_frame();

        let latest = renderer.latest_recorded_frame().unwrap();
        let image = latest.exported_image(exported).unwrap();
        assert!(renderer.resource_manager().get_image(image).is_some());

        renderer.destroy();
    }

    #[test]
    fn test_ping_pong_across_renderer_frames() {
        let mut renderer = new_renderer();
        let mut taa = PingPongTemporalResource::new("taa");
        for _ in 0..10 {
            run_frame(&mut renderer, |rg| {
                let taa_desc = hdr_desc().usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED);
                let (mut output, history) = taa.get_output_and_history(rg, taa_desc);
                let mut pass = rg.add_pass("taa");
                pass.read(&history, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
                pass.write(&mut output, RgAccessType::ComputeShaderWrite);
            })
            .0
            .unwrap();
        }
        assert_eq!(renderer.temporal_table().len(), 2);
        assert_eq!(renderer.device().created_image_count(), 2);

        assert!(renderer.remove_temporal(&TemporalResourceKey::new("taa:0")));
        assert_eq!(renderer.temporal_table().len(), 1);

        let device = renderer.destroy();
        assert_eq!(device.live_image_count(), 0);
    }
}
