//! # App 模块
//!
//! 无界面宿主：组装文档、环境、元素注册表、模块注册表和调度器，
//! 加载页面、回放场景、等待动画结束，最后输出报告。
//!
//! ## 设计说明
//!
//! - [`App::run`] 必须在 tokio `LocalSet` 中调用（调度器和组件使用 `spawn_local`）
//! - 组件派发的计数事件都会冒泡到 `body`，在那里统一收集

use std::cell::RefCell;
use std::rc::Rc;

use island_runtime::dom::ListenerId;
use island_runtime::effects::{FRAME_INTERVAL, SLIDE_CONTAINER_CLASS};
use island_runtime::widgets::{COUNT_UPDATED_EVENT, COUNTER_UPDATED_EVENT, builtin_registry};
use island_runtime::{CustomElements, Document, Environment, HydrationEvent, HydrationScheduler};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::error::HostResult;
use crate::page::Page;
use crate::scenario::Scenario;

/// 观察到的计数事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedEvent {
    /// 事件类型
    pub event: String,
    /// 事件数据
    pub detail: Value,
}

/// 运行报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// 页面标题
    pub title: String,
    /// `body` 的最终标记
    pub markup: String,
    /// 已处理的标签
    pub processed: Vec<String>,
    /// 激活结果
    pub hydration: Vec<HydrationEvent>,
    /// 计数事件
    pub events: Vec<ObservedEvent>,
    /// 激活与动画是否在超时前全部结束
    pub settled: bool,
}

/// 宿主应用
pub struct App {
    config: HostConfig,
    document: Document,
    environment: Environment,
    elements: CustomElements,
    scheduler: HydrationScheduler,
    observed: Rc<RefCell<Vec<ObservedEvent>>>,
}

impl App {
    /// 按配置组装运行时
    pub fn new(config: HostConfig) -> Self {
        let document = Document::new();
        let environment = Environment::new(config.environment_options());
        let elements = CustomElements::new(document.clone());
        let registry = builtin_registry(
            &config.islands.modules,
            &config.timing.click_count_options(),
        );
        info!(modules = ?registry.module_ids(), "模块注册表已构建");
        let scheduler = HydrationScheduler::new(
            document.clone(),
            environment.clone(),
            registry,
            elements.clone(),
        );

        Self {
            config,
            document,
            environment,
            elements,
            scheduler,
            observed: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// 配置
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// 文档
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// 合成环境
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// 加载页面、回放场景并等待动画结束
    pub async fn run(&self, page: &Page, scenario: &Scenario) -> HostResult<RunReport> {
        let listeners = self.listen();
        page.mount(&self.document)?;
        self.apply_initial_environment();

        let lifecycle = self.elements.attach();
        let hydration = self.scheduler.revive();
        tokio::task::yield_now().await;

        let played = scenario.play(&self.document, &self.environment).await;
        let settled = played.is_ok() && self.settle().await;

        hydration.disconnect();
        lifecycle.abort();
        for id in listeners {
            self.document.remove_event_listener(id);
        }
        played?;

        let report = RunReport {
            title: page.title.clone(),
            markup: self.document.inner_markup(self.document.body()),
            processed: self.scheduler.processed().tags(),
            hydration: self.scheduler.take_events(),
            events: self.observed.take(),
            settled,
        };
        info!(
            islands = report.hydration.len(),
            events = report.events.len(),
            settled = report.settled,
            "运行结束"
        );
        Ok(report)
    }

    fn listen(&self) -> Vec<ListenerId> {
        [COUNT_UPDATED_EVENT, COUNTER_UPDATED_EVENT]
            .into_iter()
            .map(|kind| {
                let observed = self.observed.clone();
                self.document
                    .add_event_listener(self.document.body(), kind, move |event| {
                        observed.borrow_mut().push(ObservedEvent {
                            event: event.kind.clone(),
                            detail: event.detail.clone().unwrap_or(Value::Null),
                        });
                    })
            })
            .collect()
    }

    fn apply_initial_environment(&self) {
        for (query, matches) in &self.config.environment.media {
            self.environment.set_media_matches(query, *matches);
        }
        for id in &self.config.environment.visible {
            match self
                .document
                .query_selector(self.document.body(), &format!("#{id}"))
            {
                Some(node) => self.environment.set_intersecting(node, true),
                None => warn!(id = %id, "初始可见元素不存在"),
            }
        }
    }

    /// 逐帧检查，直到没有待激活的 island、没有进行中的动画，或超时
    async fn settle(&self) -> bool {
        let deadline = Instant::now() + self.config.settle_timeout();
        loop {
            tokio::time::sleep(FRAME_INTERVAL).await;
            if self.is_quiet() {
                debug!("动画已结束");
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.config.debug.settle_timeout_ms,
                    "等待动画结束超时"
                );
                return false;
            }
        }
    }

    fn is_quiet(&self) -> bool {
        if self.scheduler.in_flight() > 0 {
            return false;
        }
        let doc = &self.document;
        let body = doc.body();
        doc.query_selector(body, &format!(".{SLIDE_CONTAINER_CLASS}"))
            .is_none()
            && doc.query_selector(body, ".not-sr-only").is_none()
            && doc.query_selector(body, "[data-counting=true]").is_none()
    }
}
