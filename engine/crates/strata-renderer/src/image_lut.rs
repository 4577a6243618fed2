//! 只需要计算一次的查找表
//!
//! LUT 的 image 由 [`ImageLut`] 持有，每帧以上一帧结束时的访问状态导入 RenderGraph，
//! 只有第一次成功执行的帧会加入计算 pass，之后的帧直接以可采样状态导出。

use std::rc::Rc;

use strata_gfx::device::GfxDevice;
use strata_gfx::error::GfxResult;
use strata_gfx::resources::image::GfxImageDesc;
use strata_render_graph::resource_handle::{RgImage, RgUav};
use strata_render_graph::{RenderGraph, RgAccessType, RgImageHandle, RgPassContext, RgRef};
use strata_render_interface::handles::GfxImageHandle;

use crate::renderer::Renderer;

/// LUT 的计算方式
pub trait ComputeImageLut {
    fn name(&self) -> &str;

    fn desc(&self) -> GfxImageDesc;

    /// 计算 pass 对 LUT 的写访问
    fn write_access(&self) -> RgAccessType {
        RgAccessType::ComputeShaderWrite
    }

    /// 录制计算命令
    fn compute(&self, ctx: &mut RgPassContext<'_>, output: RgRef<RgImage, RgUav>) -> anyhow::Result<()>;
}

/// 持有 LUT 的 image 以及它的计算状态
pub struct ImageLut {
    computer: Rc<dyn ComputeImageLut>,
    image: GfxImageHandle,
    desc: GfxImageDesc,

    /// 最近一次成功录制的帧结束时 image 所处的状态
    access: RgAccessType,
    computed: bool,
    /// 本帧是否加入了计算 pass，`end_frame` 时按帧是否成功确认
    pending: Option<bool>,
}
// new & init
impl ImageLut {
    /// 计算完成后导出的状态
    pub const READ_ACCESS: RgAccessType = RgAccessType::AnyShaderReadSampledImageOrUniformTexelBuffer;

    pub fn new<D: GfxDevice>(computer: impl ComputeImageLut + 'static, renderer: &mut Renderer<D>) -> GfxResult<Self> {
        let desc = computer.desc();
        let desc = desc.usage(desc.usage | computer.write_access().image_usage() | Self::READ_ACCESS.image_usage());
        let image = renderer.create_persistent_image(&desc, computer.name())?;

        Ok(Self {
            computer: Rc::new(computer),
            image,
            desc,
            access: RgAccessType::Nothing,
            computed: false,
            pending: None,
        })
    }
}
// getters
impl ImageLut {
    #[inline]
    pub fn name(&self) -> &str {
        self.computer.name()
    }

    #[inline]
    pub fn image(&self) -> GfxImageHandle {
        self.image
    }

    #[inline]
    pub fn desc(&self) -> &GfxImageDesc {
        &self.desc
    }

    #[inline]
    pub fn is_computed(&self) -> bool {
        self.computed
    }
}
// update
impl ImageLut {
    /// 导入到本帧的 RenderGraph，必要时加入计算 pass
    ///
    /// 返回的句柄在计算之后，可以直接用于读取；帧末 LUT 会处于 [`Self::READ_ACCESS`]。
    pub fn compute_if_needed(&mut self, rg: &mut RenderGraph<'_>) -> RgImageHandle {
        let mut handle = rg.import_image(self.image, self.desc, self.computer.name(), self.access);

        let needs_compute = !self.computed;
        if needs_compute {
            let mut pass = rg.add_pass(format!("{}-compute", self.computer.name()));
            let output = pass.write(&mut handle, self.computer.write_access());
            let computer = Rc::clone(&self.computer);
            pass.render(move |ctx| computer.compute(ctx, output));
        }
        rg.export(handle, Self::READ_ACCESS);

        self.pending = Some(needs_compute);
        handle
    }

    /// 帧录制结束后调用；失败的帧没有提交任何命令，LUT 的状态保持不变
    pub fn end_frame(&mut self, frame_recorded: bool) {
        if let Some(computed_this_frame) = self.pending.take()
            && frame_recorded
        {
            self.access = Self::READ_ACCESS;
            self.computed |= computed_this_frame;
        }
    }
}
// destroy
impl ImageLut {
    pub fn destroy<D: GfxDevice>(self, renderer: &mut Renderer<D>) {
        renderer.destroy_persistent_image(self.image);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use ash::vk;
    use strata_gfx::basic::color::LabelColor;
    use strata_gfx::headless::{HeadlessCommandEncoder, HeadlessGfxDevice};

    use crate::config::RendererConfig;

    struct CountingLut {
        calls: Rc<Cell<usize>>,
    }
    impl ComputeImageLut for CountingLut {
        fn name(&self) -> &str {
            "brdf-lut"
        }

        fn desc(&self) -> GfxImageDesc {
            GfxImageDesc::new_2d(vk::Format::R16G16_SFLOAT, [64, 64])
        }

        fn compute(&self, ctx: &mut RgPassContext<'_>, output: RgRef<RgImage, RgUav>) -> anyhow::Result<()> {
            ctx.image(output)?;
            ctx.encoder().insert_label("bake brdf", LabelColor::COLOR_CMD);
            self.calls.set(self.calls.get() + 1);
            Ok(())
        }
    }

    fn setup() -> (Renderer<HeadlessGfxDevice>, ImageLut, Rc<Cell<usize>>) {
        let mut renderer = Renderer::new(HeadlessGfxDevice::new(), RendererConfig::default());
        let calls = Rc::new(Cell::new(0));
        let lut = ImageLut::new(CountingLut { calls: calls.clone() }, &mut renderer).unwrap();
        (renderer, lut, calls)
    }

    /// LUT 加上一个 transient 的消费者
    fn run_frame(renderer: &mut Renderer<HeadlessGfxDevice>, lut: &mut ImageLut) -> HeadlessCommandEncoder {
        let mut encoder = HeadlessCommandEncoder::new();
        renderer.begin_frame();
        let result = renderer.render_frame(&mut encoder, |rg| {
            let lut_handle = lut.compute_if_needed(rg);
            let mut color = rg.create(GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, [32, 32]), "color");
            let mut pass = rg.add_pass("shading");
            pass.read(&lut_handle, RgAccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer);
            pass.raster(&mut color, RgAccessType::ColorAttachmentWrite);
        });
        lut.end_frame(result.is_ok());
        renderer.end_frame();
        encoder
    }

    #[test]
    fn test_compute_runs_exactly_once() {
        let (mut renderer, mut lut, calls) = setup();

        let first = run_frame(&mut renderer, &mut lut);
        assert_eq!(calls.get(), 1);
        assert!(lut.is_computed());
        assert_eq!(first.inserted_labels(), vec!["bake brdf"]);

        for _ in 0..3 {
            let encoder = run_frame(&mut renderer, &mut lut);
            assert!(encoder.inserted_labels().is_empty());
        }
        assert_eq!(calls.get(), 1);

        lut.destroy(&mut renderer);
        renderer.destroy();
    }

    #[test]
    fn test_later_frames_keep_lut_layout() {
        let (mut renderer, mut lut, _calls) = setup();
        run_frame(&mut renderer, &mut lut);

        let lut_image = renderer.resource_manager().get_image(lut.image()).unwrap().handle();
        let encoder = run_frame(&mut renderer, &mut lut);
        let lut_barriers: Vec<_> = encoder.image_barriers().filter(|barrier| barrier.image_handle() == lut_image).collect();
        // 只剩读与读之间的执行依赖，不再有 layout 转换或写
        assert!(!lut_barriers.is_empty());
        for barrier in lut_barriers {
            assert_eq!(barrier.old_layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            assert_eq!(barrier.new_layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            assert!(!barrier.src_access().contains(vk::AccessFlags2::SHADER_WRITE));
        }

        lut.destroy(&mut renderer);
        renderer.destroy();
    }

    #[test]
    fn test_dropped_frame_does_not_count_as_computed() {
        let (mut renderer, mut lut, calls) = setup();

        // LUT 已经创建，下一次创建 transient 时失败
        renderer.device_mut().fail_after(0);
        run_frame(&mut renderer, &mut lut);
        assert_eq!(calls.get(), 0);
        assert!(!lut.is_computed());

        renderer.device_mut().clear_failure();
        run_frame(&mut renderer, &mut lut);
        assert_eq!(calls.get(), 1);
        assert!(lut.is_computed());

        lut.destroy(&mut renderer);
        renderer.destroy();
    }
}
