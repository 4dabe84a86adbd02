//! # Environment 模块
//!
//! 宿主环境抽象：视口相交、媒体查询、空闲检测。
//!
//! 浏览器中这些信号来自 `IntersectionObserver`、`matchMedia` 和
//! `requestIdleCallback`；这里由宿主（或测试）显式驱动：
//!
//! ```text
//! Host ── set_intersecting / set_media_matches / notify_idle ──► Environment
//!                                                                   │
//!                              加载条件（gate）在此等待 ◄────────────┘
//! ```
//!
//! 三种信号都是状态而不是瞬时事件：条件在信号之后才开始等待也会立即满足。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::watch;

use crate::dom::NodeId;
use crate::error::GateError;

/// 不支持空闲检测时的兜底延迟
pub const DEFAULT_IDLE_FALLBACK: Duration = Duration::from_millis(200);

/// 环境选项
#[derive(Debug, Clone)]
pub struct EnvironmentOptions {
    /// 是否支持空闲检测（`requestIdleCallback`）
    pub idle_supported: bool,
    /// 不支持空闲检测时的兜底延迟
    pub idle_fallback: Duration,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            idle_supported: false,
            idle_fallback: DEFAULT_IDLE_FALLBACK,
        }
    }
}

#[derive(Default)]
struct EnvState {
    intersections: HashMap<NodeId, watch::Sender<bool>>,
    observing: HashMap<NodeId, usize>,
    media: HashMap<String, watch::Sender<bool>>,
}

impl EnvState {
    fn intersection(&mut self, node: NodeId) -> &watch::Sender<bool> {
        self.intersections
            .entry(node)
            .or_insert_with(|| watch::channel(false).0)
    }

    fn media(&mut self, query: &str) -> &watch::Sender<bool> {
        self.media
            .entry(normalize_query(query))
            .or_insert_with(|| watch::channel(false).0)
    }
}

/// 宿主环境
///
/// 克隆得到的句柄共享同一状态。
#[derive(Clone)]
pub struct Environment {
    options: EnvironmentOptions,
    state: Rc<RefCell<EnvState>>,
    idle: Rc<watch::Sender<bool>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(EnvironmentOptions::default())
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Environment")
            .field("options", &self.options)
            .field("observing", &state.observing.len())
            .field("media", &state.media.len())
            .field("idle", &*self.idle.borrow())
            .finish()
    }
}

impl Environment {
    /// 创建环境
    pub fn new(options: EnvironmentOptions) -> Self {
        Self {
            options,
            state: Rc::new(RefCell::new(EnvState::default())),
            idle: Rc::new(watch::channel(false).0),
        }
    }

    /// 环境选项
    pub fn options(&self) -> &EnvironmentOptions {
        &self.options
    }

    // ========== 视口相交 ==========

    /// 设置节点是否与视口相交
    pub fn set_intersecting(&self, node: NodeId, intersecting: bool) {
        self.state
            .borrow_mut()
            .intersection(node)
            .send_replace(intersecting);
    }

    /// 节点当前是否与视口相交
    pub fn is_intersecting(&self, node: NodeId) -> bool {
        self.state
            .borrow()
            .intersections
            .get(&node)
            .is_some_and(|tx| *tx.borrow())
    }

    /// 节点是否正被相交观察
    pub fn is_observing(&self, node: NodeId) -> bool {
        self.state.borrow().observing.contains_key(&node)
    }

    /// 开始观察节点，返回可等待的句柄
    ///
    /// 句柄被消费或丢弃时停止观察。
    pub fn observe_intersection(&self, node: NodeId) -> IntersectionWatch {
        let mut state = self.state.borrow_mut();
        let rx = state.intersection(node).subscribe();
        *state.observing.entry(node).or_insert(0) += 1;
        IntersectionWatch {
            node,
            rx,
            state: self.state.clone(),
        }
    }

    // ========== 媒体查询 ==========

    /// 设置媒体查询是否匹配
    pub fn set_media_matches(&self, query: &str, matches: bool) {
        self.state.borrow_mut().media(query).send_replace(matches);
    }

    /// 媒体查询当前是否匹配（未知查询视为不匹配）
    pub fn media_matches(&self, query: &str) -> bool {
        self.state
            .borrow()
            .media
            .get(&normalize_query(query))
            .is_some_and(|tx| *tx.borrow())
    }

    /// 等待媒体查询匹配（当前已匹配则立即返回）
    pub async fn wait_for_media(&self, query: &str) -> Result<(), GateError> {
        let mut rx = self.state.borrow_mut().media(query).subscribe();
        rx.wait_for(|matches| *matches)
            .await
            .map(|_| ())
            .map_err(|_| GateError::EnvironmentClosed { gate: "media" })
    }

    // ========== 空闲检测 ==========

    /// 宿主通知已进入空闲，此后的空闲等待立即返回
    pub fn notify_idle(&self) {
        self.idle.send_replace(true);
    }

    /// 是否已报告过空闲
    pub fn is_idle(&self) -> bool {
        *self.idle.borrow()
    }

    /// 等待空闲
    ///
    /// 支持空闲检测时等待宿主报告空闲（已报告则立即返回），否则等待兜底延迟。
    pub async fn wait_for_idle(&self) -> Result<(), GateError> {
        if !self.options.idle_supported {
            tokio::time::sleep(self.options.idle_fallback).await;
            return Ok(());
        }
        let mut rx = self.idle.subscribe();
        rx.wait_for(|idle| *idle)
            .await
            .map(|_| ())
            .map_err(|_| GateError::EnvironmentClosed { gate: "idle" })
    }
}

/// 相交观察句柄
pub struct IntersectionWatch {
    node: NodeId,
    rx: watch::Receiver<bool>,
    state: Rc<RefCell<EnvState>>,
}

impl IntersectionWatch {
    /// 被观察的节点
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// 等待节点进入视口，随后停止观察
    pub async fn until_visible(mut self) -> Result<(), GateError> {
        self.rx
            .wait_for(|intersecting| *intersecting)
            .await
            .map(|_| ())
            .map_err(|_| GateError::EnvironmentClosed { gate: "visible" })
    }
}

impl Drop for IntersectionWatch {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(count) = state.observing.get_mut(&self.node) {
            *count -= 1;
            if *count == 0 {
                state.observing.remove(&self.node);
            }
        }
    }
}

/// 规范化媒体查询：去掉多余空白
fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
