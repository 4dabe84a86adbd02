//! # ClickCounter 组件
//!
//! 无动画的普通计数器 `<click-counter>`：点击加一、同步更新显示、派发 `counter-updated`。

use std::cell::Cell;
use std::rc::{Rc, Weak};

use serde_json::json;
use tracing::{debug, info, warn};

use crate::dom::{Document, Event, ListenerId, NodeId};
use crate::elements::{CustomElement, CustomElements};
use crate::error::ModuleError;
use crate::registry::IslandModule;

/// 元素名
pub const CLICK_COUNTER_TAG: &str = "click-counter";

/// 计数更新事件
pub const COUNTER_UPDATED_EVENT: &str = "counter-updated";

/// `click-counter` 模块
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickCounterModule;

impl IslandModule for ClickCounterModule {
    fn activate(&self, elements: &CustomElements) -> Result<(), ModuleError> {
        if elements.is_defined(CLICK_COUNTER_TAG) {
            return Ok(());
        }
        elements.define(CLICK_COUNTER_TAG, |document, node| {
            Box::new(ClickCounter::new(document.clone(), node))
        })?;
        info!(tag = CLICK_COUNTER_TAG, "组件已注册");
        Ok(())
    }
}

struct CounterInner {
    document: Document,
    host: NodeId,
    display: Cell<Option<NodeId>>,
    count: Cell<u64>,
    listener: Cell<Option<ListenerId>>,
}

impl CounterInner {
    fn render(&self) {
        if let Some(display) = self.display.get()
            && let Err(e) = self
                .document
                .set_text_content(display, &self.count.get().to_string())
        {
            warn!(error = %e, "无法更新计数显示");
        }
    }

    fn on_click(&self) {
        self.count.set(self.count.get() + 1);
        self.render();
        let event = Event::custom(COUNTER_UPDATED_EVENT, json!({ "count": self.count.get() }))
            .with_bubbles(true);
        self.document.dispatch_event(self.host, event);
    }
}

/// `<click-counter>` 实例
pub struct ClickCounter {
    inner: Rc<CounterInner>,
}

impl ClickCounter {
    /// 创建实例（尚未连接）
    pub fn new(document: Document, host: NodeId) -> Self {
        Self {
            inner: Rc::new(CounterInner {
                document,
                host,
                display: Cell::new(None),
                count: Cell::new(0),
                listener: Cell::new(None),
            }),
        }
    }

    /// 当前计数
    pub fn count(&self) -> u64 {
        self.inner.count.get()
    }

    /// 计数归零并刷新显示
    pub fn reset_counter(&self) -> u64 {
        self.inner.count.set(0);
        self.inner.render();
        0
    }
}

impl CustomElement for ClickCounter {
    fn connected(&mut self) {
        let inner = &self.inner;
        let doc = &inner.document;
        inner
            .display
            .set(doc.query_selector(inner.host, "[data-counter]"));
        inner.render();

        if inner.listener.get().is_none()
            && let Some(button) = doc.query_selector(inner.host, "button")
        {
            let weak: Weak<CounterInner> = Rc::downgrade(inner);
            let id = doc.add_event_listener(button, "click", move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_click();
                }
            });
            inner.listener.set(Some(id));
        }
        debug!(host = %inner.host, "click-counter 已连接");
    }

    fn disconnected(&mut self) {
        if let Some(id) = self.inner.listener.take() {
            self.inner.document.remove_event_listener(id);
        }
    }
}
