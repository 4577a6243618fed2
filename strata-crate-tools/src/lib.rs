//! Strata 工具集
//!
//! 提供日志初始化、性能分析 span、工作区路径管理等通用工具。
//!
//! # StrataPath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # profile_span!
//! 对 tracy 的轻量包装：没有运行中的 tracy client 时什么也不做，测试中无需启动 profiler。

pub mod init_log;
pub mod profile;
pub mod resource;

#[doc(hidden)]
pub use tracy_client as __tracy_client;
