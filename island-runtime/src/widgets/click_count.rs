//! # ClickCount 组件
//!
//! 带动画的点击计数器 `<click-count>`。
//!
//! ## 标记约定
//!
//! ```text
//! click-count [data-active] [data-counting]
//!  ├─ button
//!  ├─ [data-activated-text]   激活时乱码揭示 "Activated"
//!  └─ [data-click-count]      计数显示，每次点击滑动切换
//! ```
//!
//! 每次点击立即更新计数并派发 `count-updated`，显示更新交给 [`AnimationQueue`] 串行播放。

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::dom::{Document, Event, ListenerId, NodeId};
use crate::effects::{
    ScrambleOptions, SlideOptions, clear_slide_artifacts, pad_count, scramble_text, slide_text,
    sweep_exited_layers,
};
use crate::elements::{CustomElement, CustomElements};
use crate::error::{EffectError, ModuleError};
use crate::registry::IslandModule;
use crate::sequencer::{AnimationQueue, CountingState, SequencerConfig, StepPlan, StepRunner};

/// 元素名
pub const CLICK_COUNT_TAG: &str = "click-count";

/// 计数更新事件
pub const COUNT_UPDATED_EVENT: &str = "count-updated";

/// 激活后显示的标签文本
pub const ACTIVATED_TEXT: &str = "Activated";

/// 组件选项
#[derive(Debug, Clone, PartialEq)]
pub struct ClickCountOptions {
    /// 计数动画时长
    pub sequencer: SequencerConfig,
    /// 激活时乱码揭示时长
    pub scramble_speed: Duration,
    /// 乱码随机种子
    pub seed: Option<u64>,
}

impl Default for ClickCountOptions {
    fn default() -> Self {
        Self {
            sequencer: SequencerConfig::default(),
            scramble_speed: Duration::from_millis(500),
            seed: None,
        }
    }
}

/// `click-count` 模块：激活时注册元素
#[derive(Debug, Clone, Default)]
pub struct ClickCountModule {
    options: ClickCountOptions,
}

impl ClickCountModule {
    /// 创建模块
    pub fn new(options: ClickCountOptions) -> Self {
        Self { options }
    }
}

impl IslandModule for ClickCountModule {
    fn activate(&self, elements: &CustomElements) -> Result<(), ModuleError> {
        if elements.is_defined(CLICK_COUNT_TAG) {
            return Ok(());
        }
        let options = self.options.clone();
        elements.define(CLICK_COUNT_TAG, move |document, node| {
            Box::new(ClickCount::new(document.clone(), node, options.clone()))
        })?;
        info!(tag = CLICK_COUNT_TAG, "组件已注册");
        Ok(())
    }
}

/// 把步骤落到计数显示元素上
struct DisplayRunner {
    document: Document,
    host: NodeId,
    display: Cell<Option<NodeId>>,
}

impl StepRunner for DisplayRunner {
    async fn run_step(&self, plan: &StepPlan) -> Result<(), EffectError> {
        let Some(display) = self.display.get() else {
            return Err(EffectError::Interrupted {
                reason: "缺少计数显示元素".to_string(),
            });
        };
        slide_text(
            &self.document,
            display,
            &plan.text,
            SlideOptions::with_speed(plan.speed),
        )
        .await?;
        sweep_exited_layers(&self.document, display)?;
        Ok(())
    }

    fn counting_changed(&self, state: CountingState) {
        if let Err(e) = self.document.set_data(self.host, "counting", state.as_attr()) {
            warn!(error = %e, "无法更新 data-counting");
        }
    }
}

struct ClickCountInner {
    document: Document,
    host: NodeId,
    options: ClickCountOptions,
    button: Cell<Option<NodeId>>,
    label: Cell<Option<NodeId>>,
    queue: AnimationQueue<DisplayRunner>,
    listener: Cell<Option<ListenerId>>,
}

/// `<click-count>` 实例
pub struct ClickCount {
    inner: Rc<ClickCountInner>,
}

impl ClickCount {
    /// 创建实例（尚未连接）
    pub fn new(document: Document, host: NodeId, options: ClickCountOptions) -> Self {
        let runner = DisplayRunner {
            document: document.clone(),
            host,
            display: Cell::new(None),
        };
        let queue = AnimationQueue::new(options.sequencer, runner);
        Self {
            inner: Rc::new(ClickCountInner {
                document,
                host,
                options,
                button: Cell::new(None),
                label: Cell::new(None),
                queue,
                listener: Cell::new(None),
            }),
        }
    }

    /// 当前计数
    pub fn count(&self) -> u64 {
        self.inner.queue.count()
    }

    /// 待播动画数
    pub fn pending(&self) -> u64 {
        self.inner.queue.pending()
    }
}

impl CustomElement for ClickCount {
    fn connected(&mut self) {
        let inner = &self.inner;
        let doc = &inner.document;
        inner.button.set(doc.query_selector(inner.host, "button"));
        inner.label.set(doc.query_selector(inner.host, "[data-activated-text]"));
        inner
            .queue
            .runner()
            .display
            .set(doc.query_selector(inner.host, "[data-click-count]"));
        debug!(host = %inner.host, "click-count 已连接");

        let inner = self.inner.clone();
        tokio::task::spawn_local(async move {
            inner.initialize().await;
            if inner.document.is_connected(inner.host) {
                inner.attach_events();
            }
        });
    }

    fn disconnected(&mut self) {
        let inner = &self.inner;
        if let Some(id) = inner.listener.take() {
            inner.document.remove_event_listener(id);
        }
        if let Some(display) = inner.queue.runner().display.get() {
            let text = pad_count(inner.queue.count());
            if let Err(e) = clear_slide_artifacts(&inner.document, display, &text) {
                warn!(error = %e, "清理滑动容器失败");
            }
        }
        debug!(host = %inner.host, "click-count 已断开");
    }
}

impl ClickCountInner {
    /// 并行揭示标签与初始计数，然后标记激活
    async fn initialize(&self) {
        let scramble = |seed_offset: u64| ScrambleOptions {
            speed: self.options.scramble_speed,
            permanent: false,
            seed: self.options.seed.map(|s| s.wrapping_add(seed_offset)),
        };

        let label = async {
            match self.label.get() {
                Some(label) => {
                    scramble_text(&self.document, label, ACTIVATED_TEXT, scramble(0)).await
                }
                None => Ok(()),
            }
        };
        let display = async {
            match self.queue.runner().display.get() {
                Some(display) => scramble_text(&self.document, display, "00", scramble(1)).await,
                None => Ok(()),
            }
        };
        let (label, display) = tokio::join!(label, display);
        for result in [label, display] {
            if let Err(e) = result {
                warn!(host = %self.host, error = %e, "激活特效失败");
            }
        }

        if self.document.is_connected(self.host)
            && let Err(e) = self.document.set_data(self.host, "active", "true")
        {
            warn!(error = %e, "无法设置 data-active");
        }
    }

    fn attach_events(self: &Rc<Self>) {
        if self.listener.get().is_some() {
            return;
        }
        let Some(button) = self.button.get() else {
            return;
        };
        let weak: Weak<Self> = Rc::downgrade(self);
        let id = self.document.add_event_listener(button, "click", move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.on_click();
            }
        });
        self.listener.set(Some(id));
    }

    fn on_click(&self) {
        let count = self.queue.trigger();
        if let Err(e) = self.document.set_data(self.host, "counting", "true") {
            warn!(error = %e, "无法更新 data-counting");
        }
        let event = Event::custom(COUNT_UPDATED_EVENT, json!({ "count": count }))
            .with_bubbles(true)
            .with_composed(true);
        self.document.dispatch_event(self.host, event);
    }
}
