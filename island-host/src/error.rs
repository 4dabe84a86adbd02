//! # Error 模块
//!
//! 宿主侧错误：页面加载、场景回放。配置错误见 [`crate::config::ConfigError`]。

use std::path::PathBuf;

use island_runtime::DomError;
use thiserror::Error;

use crate::config::ConfigError;

/// 页面加载错误
#[derive(Error, Debug)]
pub enum PageError {
    /// 文件读取失败
    #[error("页面读取失败 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON 解析失败
    #[error("页面解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    /// 挂载到文档失败
    #[error("页面挂载失败: {0}")]
    Dom(#[from] DomError),
}

/// 场景错误
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// 文件读取失败
    #[error("场景读取失败 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON 解析失败
    #[error("场景解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    /// 找不到 id 对应的元素
    #[error("第 {step} 步: 找不到元素 #{id}")]
    UnknownElement { step: usize, id: String },

    /// 文档操作失败
    #[error("第 {step} 步: {source}")]
    Dom {
        step: usize,
        #[source]
        source: DomError,
    },
}

/// 宿主错误
#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// 宿主结果类型
pub type HostResult<T> = Result<T, HostError>;
