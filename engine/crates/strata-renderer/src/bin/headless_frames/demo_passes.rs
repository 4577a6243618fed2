use ash::vk;
use strata_gfx::basic::color::LabelColor;
use strata_gfx::resources::buffer::GfxBufferDesc;
use strata_gfx::resources::image::GfxImageDesc;
use strata_render_graph::resource_handle::{RgImage, RgUav};
use strata_render_graph::{PingPongTemporalResource, RenderGraph, RgAccessType, RgExportedHandle, RgPassContext, RgRef};
use strata_renderer::{ComputeImageLut, ImageLut};

pub struct BrdfLut;
impl ComputeImageLut for BrdfLut {
    fn name(&self) -> &str {
        "brdf-lut"
    }

    fn desc(&self) -> GfxImageDesc {
        GfxImageDesc::new_2d(vk::Format::R16G16_SFLOAT, [256, 256])
    }

    fn compute(&self, ctx: &mut RgPassContext<'_>, output: RgRef<RgImage, RgUav>) -> anyhow::Result<()> {
        let image = ctx.image(output)?;
        let label = format!("integrate brdf {}x{}", image.desc().extent[0], image.desc().extent[1]);
        ctx.encoder().insert_label(&label, LabelColor::COLOR_CMD);
        Ok(())
    }
}

/// 一个简化的延迟渲染帧：gbuffer -> lighting -> taa -> tonemap，外加一个亮度直方图 buffer
pub struct DemoFrame {
    pub extent: [u32; 2],
    pub taa: PingPongTemporalResource,
}
impl DemoFrame {
    pub fn new(extent: [u32; 2]) -> Self {
        Self {
            extent,
            taa: PingPongTemporalResource::new("taa"),
        }
    }

    pub fn build(&mut self, rg: &mut RenderGraph<'_>, brdf_lut: &mut ImageLut) -> RgExportedHandle<RgImage> {
        let lut = brdf_lut.compute_if_needed(rg);

        let mut depth = rg.create(GfxImageDesc::new_2d(vk::Format::D32_SFLOAT, self.extent), "depth");
        let mut albedo = rg.create(GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, self.extent), "albedo");
        {
            let mut pass = rg.add_pass("gbuffer");
            pass.raster(&mut depth, RgAccessType::DepthStencilAttachmentWrite);
            pass.raster(&mut albedo, RgAccessType::ColorAttachmentWrite);
            pass.render(|ctx| {
                ctx.encoder().insert_label("draw opaque", LabelColor::COLOR_CMD);
                Ok(())
            });
        }

        let mut hdr = rg.create(GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, self.extent), "hdr");
        {
            let mut pass = rg.add_pass("lighting");
            pass.read(&albedo, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
            pass.read_aspect(
                &depth,
                RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer,
                vk::ImageAspectFlags::DEPTH,
            );
            pass.read(&lut, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
            let hdr_ref = pass.write(&mut hdr, RgAccessType::ComputeShaderWrite);
            pass.render(move |ctx| {
                let hdr_image = ctx.image(hdr_ref)?;
                log::trace!("lighting into {}", hdr_image.name());
                ctx.encoder().insert_label("dispatch lighting", LabelColor::COLOR_CMD);
                Ok(())
            });
        }

        let taa_desc = GfxImageDesc::new_2d(vk::Format::R16G16B16A16_SFLOAT, self.extent)
            .usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED);
        let (mut taa_output, taa_history) = self.taa.get_output_and_history(rg, taa_desc);
        {
            let mut pass = rg.add_pass("taa");
            pass.read(&hdr, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
            pass.read(&taa_history, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
            pass.write(&mut taa_output, RgAccessType::ComputeShaderWrite);
        }

        let mut histogram = rg.create(
            GfxBufferDesc::new_gpu_only(256 * 4, vk::BufferUsageFlags::empty()),
            "luminance-histogram",
        );
        {
            let mut pass = rg.add_pass("histogram");
            pass.read(&taa_output, RgAccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer);
            pass.write(&mut histogram, RgAccessType::ComputeShaderWrite);
        }

        let mut ldr = rg.create(GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, self.extent), "ldr");
        {
            let mut pass = rg.add_pass("tonemap");
            pass.read(&taa_output, RgAccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer);
            pass.read(&histogram, RgAccessType::FragmentShaderReadOther);
            pass.raster(&mut ldr, RgAccessType::ColorAttachmentWrite);
        }

        rg.export(ldr, RgAccessType::TransferRead)
    }
}
