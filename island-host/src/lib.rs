//! # Island Host
//!
//! `island-runtime` 的无界面宿主：读取配置、页面和场景，在单线程运行时中回放，
//! 输出最终标记与激活报告。
//!
//! ## 模块结构
//!
//! - [`config`]：宿主配置（config.json）
//! - [`page`]：页面文件
//! - [`scenario`]：场景文件与回放
//! - [`app`]：运行时组装与报告
//! - [`error`]：错误类型定义

pub mod app;
pub mod config;
pub mod error;
pub mod page;
pub mod scenario;

pub use app::{App, ObservedEvent, RunReport};
pub use config::{ConfigError, HostConfig};
pub use error::{HostError, HostResult, PageError, ScenarioError};
pub use page::Page;
pub use scenario::{Scenario, Step};

/// 安装日志订阅器，输出到 stderr
///
/// 重复调用时保留第一次安装的订阅器。
pub fn init_tracing(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
