//! 不需要 GPU 的帧循环演示
//!
//! 用法：`headless_frames [frame_count] [fail_at_frame]`
//!
//! 配置从 `config/renderer.toml` 读取；`fail_at_frame` 让 headless device 在那一帧的第一次创建时失败，
//! 用来观察丢帧日志。

use anyhow::Context;
use strata_crate_tools::init_log::init_log;
use strata_crate_tools::resource::StrataPath;
use strata_gfx::headless::{HeadlessCommandEncoder, HeadlessGfxDevice};
use strata_renderer::{ImageLut, Renderer, RendererConfig};

mod demo_passes;

use demo_passes::{BrdfLut, DemoFrame};

fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}

fn init_env() {
    std::panic::set_hook(Box::new(panic_handler));

    init_log();

    tracy_client::Client::start();
    tracy_client::set_thread_name!("RenderThread");
}

fn load_config() -> RendererConfig {
    let path = StrataPath::config_path("renderer.toml");
    if !path.exists() {
        log::info!("{:?} not found, using default config", path);
        return RendererConfig::default();
    }
    match RendererConfig::from_file(&path) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("{:#}, using default config", err);
            RendererConfig::default()
        }
    }
}

fn parse_arg(index: usize) -> anyhow::Result<Option<u64>> {
    match std::env::args().nth(index) {
        Some(arg) => Ok(Some(arg.parse::<u64>().with_context(|| format!("invalid argument {:?}", arg))?)),
        None => Ok(None),
    }
}

fn main() -> anyhow::Result<()> {
    init_env();

    let frame_count = parse_arg(1)?.unwrap_or(120);
    let fail_at_frame = parse_arg(2)?;

    let config = load_config();
    log::info!("config: {:?}", config);

    let mut renderer = Renderer::new(HeadlessGfxDevice::new(), config);
    let mut brdf_lut = ImageLut::new(BrdfLut, &mut renderer)?;
    let mut demo = DemoFrame::new([1280, 720]);

    let mut recorded_commands = 0;
    for frame in 0..frame_count {
        if fail_at_frame == Some(frame) {
            renderer.device_mut().fail_after(0);
        }

        let mut encoder = HeadlessCommandEncoder::new();
        renderer.begin_frame();
        let result = renderer.render_frame(&mut encoder, |rg| demo.build(rg, &mut brdf_lut));
        brdf_lut.end_frame(result.is_ok());
        renderer.end_frame();

        renderer.device_mut().clear_failure();
        recorded_commands += encoder.commands().len();
    }

    log::info!(
        "{} frames, {} dropped, {} commands recorded, {} images created, {} transient resources resident",
        frame_count,
        renderer.dropped_frame_count(),
        recorded_commands,
        renderer.device().created_image_count(),
        renderer.transient_cache().total_resident_count()
    );

    brdf_lut.destroy(&mut renderer);
    let device = renderer.destroy();
    log::info!("{} images still alive", device.live_image_count());

    Ok(())
}
