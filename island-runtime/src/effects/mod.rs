//! # Effects 模块
//!
//! 文字特效：滑动切换与乱码揭示。
//!
//! 两个特效都是作用于单个元素的纯 DOM 操作，不持有全局状态。
//! 目标元素不存在或已断开时静默返回 `Ok(())`。

mod scramble;
mod slide;

pub use scramble::{SCRAMBLE_CHARS, ScrambleOptions, scramble_frame, scramble_text};
pub use slide::{
    SLIDE_CONTAINER_CLASS, SlideDirection, SlideOptions, clear_slide_artifacts, slide_text,
    sweep_exited_layers,
};

use std::time::Duration;

/// 动画帧间隔
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// 滑动特效默认时长
pub const DEFAULT_SLIDE_SPEED: Duration = Duration::from_millis(200);

/// 乱码特效默认时长
pub const DEFAULT_SCRAMBLE_SPEED: Duration = Duration::from_millis(200);

/// 格式化为至少两位的计数显示
pub fn pad_count(count: u64) -> String {
    format!("{count:02}")
}
