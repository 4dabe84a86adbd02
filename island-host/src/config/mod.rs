//! # Config 模块
//!
//! 宿主配置管理，集中管理页面路径、模块表、动画时长和合成环境的初始状态。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件 (config.json)
//! 3. 默认值（最低）

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use island_runtime::EnvironmentOptions;
use island_runtime::sequencer::SequencerConfig;
use island_runtime::widgets::{BUILTIN_TAGS, ClickCountOptions, module_stem};
use serde::{Deserialize, Serialize};

/// 宿主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// 页面文件路径
    #[serde(default = "default_page_path")]
    pub page_path: PathBuf,

    /// 场景文件路径（未配置时只加载页面并等待动画结束）
    #[serde(default)]
    pub scenario_path: Option<PathBuf>,

    /// island 模块配置
    #[serde(default)]
    pub islands: IslandsConfig,

    /// 动画时长配置
    #[serde(default)]
    pub timing: TimingConfig,

    /// 合成环境初始状态
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// 调试配置
    #[serde(default)]
    pub debug: DebugConfig,
}

/// island 模块配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IslandsConfig {
    /// 可用的模块 ID，遵循 `t`、`t/index`、`t/t` 命名约定
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
}

/// 动画时长配置（毫秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// 非最后一步的滑动时长
    #[serde(default = "default_fast_ms")]
    pub fast_ms: u64,

    /// 最后一步的滑动时长
    #[serde(default = "default_normal_ms")]
    pub normal_ms: u64,

    /// 回到空闲前的延迟
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// 激活时乱码揭示时长
    #[serde(default = "default_scramble_ms")]
    pub scramble_ms: u64,

    /// 不支持空闲检测时的兜底延迟
    #[serde(default = "default_idle_fallback_ms")]
    pub idle_fallback_ms: u64,

    /// 乱码随机种子（固定后输出可复现）
    #[serde(default)]
    pub seed: Option<u64>,
}

/// 合成环境初始状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// 是否支持空闲检测；不支持时 `client:idle` 走兜底延迟
    #[serde(default)]
    pub idle_supported: bool,

    /// 媒体查询的初始匹配状态
    #[serde(default)]
    pub media: BTreeMap<String, bool>,

    /// 加载后即与视口相交的元素 id
    #[serde(default)]
    pub visible: Vec<String>,
}

/// 调试配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugConfig {
    /// 日志级别（trace/debug/info/warn/error）
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 场景结束后等待动画结束的上限
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
}

// 默认值函数

fn default_page_path() -> PathBuf {
    PathBuf::from("pages/index.json")
}

fn default_modules() -> Vec<String> {
    BUILTIN_TAGS.iter().map(|tag| format!("{tag}/index")).collect()
}

fn default_fast_ms() -> u64 {
    60
}

fn default_normal_ms() -> u64 {
    200
}

fn default_settle_ms() -> u64 {
    300
}

fn default_scramble_ms() -> u64 {
    500
}

fn default_idle_fallback_ms() -> u64 {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_settle_timeout_ms() -> u64 {
    10_000
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            page_path: default_page_path(),
            scenario_path: None,
            islands: IslandsConfig::default(),
            timing: TimingConfig::default(),
            environment: EnvironmentConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for IslandsConfig {
    fn default() -> Self {
        Self {
            modules: default_modules(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fast_ms: default_fast_ms(),
            normal_ms: default_normal_ms(),
            settle_ms: default_settle_ms(),
            scramble_ms: default_scramble_ms(),
            idle_fallback_ms: default_idle_fallback_ms(),
            seed: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            settle_timeout_ms: default_settle_timeout_ms(),
        }
    }
}

impl TimingConfig {
    /// 序列器时长
    pub fn sequencer(&self) -> SequencerConfig {
        SequencerConfig {
            fast: Duration::from_millis(self.fast_ms),
            normal: Duration::from_millis(self.normal_ms),
            settle: Duration::from_millis(self.settle_ms),
        }
    }

    /// `click-count` 组件选项
    pub fn click_count_options(&self) -> ClickCountOptions {
        ClickCountOptions {
            sequencer: self.sequencer(),
            scramble_speed: Duration::from_millis(self.scramble_ms),
            seed: self.seed,
        }
    }
}

impl HostConfig {
    /// 加载配置文件
    ///
    /// 如果文件不存在或解析失败，返回默认配置并打印警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            eprintln!("⚠️ 配置文件不存在: {:?}，使用默认配置", path);
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    eprintln!("✅ 配置文件加载成功: {:?}", path);
                    config
                }
                Err(e) => {
                    eprintln!("⚠️ 配置文件解析失败: {}，使用默认配置", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("⚠️ 配置文件读取失败: {}，使用默认配置", e);
                Self::default()
            }
        }
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializationFailed(e.to_string()))?;
        fs::write(path, json).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// 合成环境选项
    pub fn environment_options(&self) -> EnvironmentOptions {
        EnvironmentOptions {
            idle_supported: self.environment.idle_supported,
            idle_fallback: Duration::from_millis(self.timing.idle_fallback_ms),
        }
    }

    /// 场景结束后等待动画结束的上限
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.debug.settle_timeout_ms)
    }

    /// 验证配置有效性
    ///
    /// 只检查配置本身，页面和场景文件在加载时报告错误。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.islands.modules.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "islands.modules 不能为空".to_string(),
            ));
        }

        for id in &self.islands.modules {
            let stem = module_stem(id);
            if !BUILTIN_TAGS.contains(&stem) {
                return Err(ConfigError::ValidationFailed(format!(
                    "未知的模块 ID: {}",
                    id
                )));
            }
            let suffix = &id[stem.len()..];
            if !suffix.is_empty() && suffix != "/index" && suffix != format!("/{stem}") {
                return Err(ConfigError::ValidationFailed(format!(
                    "模块 ID 不符合命名约定: {}",
                    id
                )));
            }
        }

        let timing = &self.timing;
        if timing.fast_ms == 0 || timing.normal_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "滑动时长必须大于 0".to_string(),
            ));
        }
        if timing.fast_ms > timing.normal_ms {
            return Err(ConfigError::ValidationFailed(format!(
                "fast_ms ({}) 不能大于 normal_ms ({})",
                timing.fast_ms, timing.normal_ms
            )));
        }

        if self.debug.log_level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "无效的日志级别: {}",
                self.debug.log_level
            )));
        }

        Ok(())
    }
}

/// 配置错误
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// 序列化失败
    SerializationFailed(String),
    /// IO 错误
    IoError(String),
    /// 验证失败
    ValidationFailed(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::SerializationFailed(e) => write!(f, "配置序列化失败: {}", e),
            ConfigError::IoError(e) => write!(f, "配置 IO 错误: {}", e),
            ConfigError::ValidationFailed(e) => write!(f, "配置验证失败: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.page_path, PathBuf::from("pages/index.json"));
        assert_eq!(
            config.islands.modules,
            vec!["click-count/index", "click-counter/index"]
        );
        assert_eq!(config.timing.fast_ms, 60);
        assert_eq!(config.timing.normal_ms, 200);
        assert_eq!(config.timing.settle_ms, 300);
        assert_eq!(config.debug.log_level, "info");
        assert!(!config.environment.idle_supported);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "page_path": "demo.json",
            "timing": { "fast_ms": 10 },
            "environment": { "visible": ["hero"], "media": { "(min-width: 768px)": true } }
        }"#;
        let config: HostConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.page_path, PathBuf::from("demo.json"));
        assert_eq!(config.timing.fast_ms, 10);
        assert_eq!(config.timing.normal_ms, 200);
        assert_eq!(config.environment.visible, vec!["hero"]);
        assert_eq!(config.environment.media.get("(min-width: 768px)"), Some(&true));
        assert_eq!(config.islands, IslandsConfig::default());
    }

    #[test]
    fn test_timing_conversions() {
        let timing = TimingConfig {
            seed: Some(3),
            ..TimingConfig::default()
        };
        let options = timing.click_count_options();
        assert_eq!(options.sequencer.fast, Duration::from_millis(60));
        assert_eq!(options.sequencer.normal, Duration::from_millis(200));
        assert_eq!(options.scramble_speed, Duration::from_millis(500));
        assert_eq!(options.seed, Some(3));
    }

    #[test]
    fn test_validation() {
        let mut config = HostConfig::default();
        config.islands.modules = vec!["fancy-widget".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));

        let mut config = HostConfig::default();
        config.islands.modules = vec!["click-count/other".to_string()];
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.islands.modules = vec!["click-count/click-count".to_string()];
        assert!(config.validate().is_ok());

        let mut config = HostConfig::default();
        config.timing.fast_ms = 500;
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.debug.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = HostConfig::default();
        config.timing.seed = Some(42);
        config.environment.visible.push("hero".to_string());
        config.save(&path).unwrap();

        assert_eq!(HostConfig::load(&path), config);
    }

    #[test]
    fn test_load_missing_or_broken_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            HostConfig::load(dir.path().join("missing.json")),
            HostConfig::default()
        );

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert_eq!(HostConfig::load(&broken), HostConfig::default());
    }
}
