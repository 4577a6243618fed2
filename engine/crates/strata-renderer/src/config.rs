use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strata_render_graph::TransientResourceCache;
use strata_render_interface::frame_counter::FrameCounter;

/// 渲染器配置，从 TOML 文件读取
///
/// 所有字段都有默认值，配置文件中只需要写需要覆盖的部分。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// 同时在 GPU 上执行的帧数
    pub frames_in_flight: usize,
    /// transient 资源闲置多少帧之后被销毁
    pub transient_max_unused_frames: u64,
    /// 第一帧编译完成后打印执行计划
    pub print_execution_plan: bool,
    /// 用 debug label 包裹每个 pass
    pub label_passes: bool,
}
impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: FrameCounter::DEFAULT_FIF_COUNT,
            transient_max_unused_frames: TransientResourceCache::DEFAULT_MAX_UNUSED_FRAMES,
            print_execution_plan: false,
            label_passes: true,
        }
    }
}
impl RendererConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("读取配置文件失败: {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.frames_in_flight > 0, "frames_in_flight must be at least 1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = RendererConfig::from_toml_str("print_execution_plan = true").unwrap();
        assert!(config.print_execution_plan);
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.transient_max_unused_frames, 4);
        assert!(config.label_passes);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(RendererConfig::from_toml_str("").unwrap(), RendererConfig::default());
    }

    #[test]
    fn test_zero_frames_in_flight_is_rejected() {
        let err = RendererConfig::from_toml_str("frames_in_flight = 0").unwrap_err();
        assert!(err.to_string().contains("frames_in_flight"));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        assert!(RendererConfig::from_toml_str("label_passes = \"yes\"").is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = RendererConfig::from_file("/definitely/not/here/renderer.toml").unwrap_err();
        assert!(format!("{err:#}").contains("renderer.toml"));
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = RendererConfig {
            frames_in_flight: 3,
            transient_max_unused_frames: 8,
            print_execution_plan: true,
            label_passes: false,
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(RendererConfig::from_toml_str(&text).unwrap(), config);
    }
}
