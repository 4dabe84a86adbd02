//! # Scheduler 模块
//!
//! 惰性激活（hydration）调度器。
//!
//! ## 执行流程
//!
//! ```text
//! revive()
//!   ├─ 深度优先扫描 body
//!   └─ 安装插入观察者（持续运行）
//!
//! visit(node)
//!   ├─ 标签无连字符 / 已处理 / 无法解析 → 直接访问子节点
//!   └─ 解析成功 → 立即标记已处理 → 任务：等待加载条件 → 激活模块 → 访问子节点
//! ```
//!
//! ## 设计说明
//!
//! - 标记已处理与解析在同一个同步步骤内完成，之后才会等待任何条件，
//!   因此同一批次中出现两次的标签只会激活一次
//! - 激活失败只影响该标签：记录事件后继续遍历，不会重试
//! - 生命周期钩子由自定义元素注册表调用，调度器从不直接调用

mod gate;

pub use gate::{Gate, gates_for};

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dom::{Document, NodeId};
use crate::elements::CustomElements;
use crate::environment::Environment;
use crate::registry::{IslandRegistry, ResolvedModule};

/// 已处理的标签集合
///
/// 只增不减，页面生命周期内有效。克隆得到的句柄共享同一集合。
#[derive(Debug, Clone, Default)]
pub struct ProcessedTags {
    tags: Rc<RefCell<BTreeSet<String>>>,
}

impl ProcessedTags {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记标签，返回是否为首次标记
    pub fn mark(&self, tag: &str) -> bool {
        self.tags.borrow_mut().insert(tag.to_string())
    }

    /// 是否已处理
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.borrow().contains(tag)
    }

    /// 已处理数量
    pub fn len(&self) -> usize {
        self.tags.borrow().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.tags.borrow().is_empty()
    }

    /// 所有已处理标签（字典序）
    pub fn tags(&self) -> Vec<String> {
        self.tags.borrow().iter().cloned().collect()
    }
}

/// 激活结果事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HydrationEvent {
    /// 模块激活成功
    Activated { tag: String, module: String },
    /// 模块激活失败（不会重试）
    Failed {
        tag: String,
        module: String,
        error: String,
    },
    /// 加载条件无法再满足，放弃激活
    Abandoned { tag: String, reason: String },
}

impl HydrationEvent {
    /// 事件对应的标签
    pub fn tag(&self) -> &str {
        match self {
            Self::Activated { tag, .. } | Self::Failed { tag, .. } | Self::Abandoned { tag, .. } => {
                tag
            }
        }
    }
}

struct SchedulerInner {
    document: Document,
    environment: Environment,
    registry: IslandRegistry,
    elements: CustomElements,
    processed: ProcessedTags,
    events: RefCell<Vec<HydrationEvent>>,
    in_flight: Cell<usize>,
}

/// 惰性激活调度器
///
/// 协作者全部通过构造函数注入。必须在 `LocalSet` 中使用。
#[derive(Clone)]
pub struct HydrationScheduler {
    inner: Rc<SchedulerInner>,
}

impl std::fmt::Debug for HydrationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HydrationScheduler")
            .field("processed", &self.inner.processed)
            .field("in_flight", &self.inner.in_flight.get())
            .finish_non_exhaustive()
    }
}

impl HydrationScheduler {
    /// 创建调度器
    pub fn new(
        document: Document,
        environment: Environment,
        registry: IslandRegistry,
        elements: CustomElements,
    ) -> Self {
        Self::with_processed(document, environment, registry, elements, ProcessedTags::new())
    }

    /// 使用外部提供的已处理集合创建调度器
    pub fn with_processed(
        document: Document,
        environment: Environment,
        registry: IslandRegistry,
        elements: CustomElements,
        processed: ProcessedTags,
    ) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                document,
                environment,
                registry,
                elements,
                processed,
                events: RefCell::new(Vec::new()),
                in_flight: Cell::new(0),
            }),
        }
    }

    /// 扫描整个文档并开始观察插入
    pub fn revive(&self) -> HydrationHandle {
        // 先订阅再扫描，扫描期间发生的插入不会丢失
        let mut observer = self.inner.document.observe_mutations();
        let body = self.inner.document.body();
        self.inner.visit(body);

        let inner = self.inner.clone();
        let task = tokio::task::spawn_local(async move {
            while let Some(batch) = observer.next_batch().await {
                debug!(records = batch.len(), "处理插入批次");
                for record in batch {
                    for node in record.added_nodes {
                        if inner.document.is_connected(node) {
                            inner.visit(node);
                        }
                    }
                }
            }
        });
        HydrationHandle { task }
    }

    /// 标签是否已处理
    pub fn is_processed(&self, tag: &str) -> bool {
        self.inner.processed.contains(tag)
    }

    /// 已处理集合
    pub fn processed(&self) -> &ProcessedTags {
        &self.inner.processed
    }

    /// 仍在等待条件或激活中的 island 数量
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.get()
    }

    /// 取出并清空已记录的事件
    pub fn take_events(&self) -> Vec<HydrationEvent> {
        std::mem::take(&mut *self.inner.events.borrow_mut())
    }
}

impl SchedulerInner {
    /// 访问单个节点（同步部分）
    fn visit(self: &Rc<Self>, node: NodeId) {
        let Some(tag) = self.document.tag_name(node) else {
            return;
        };

        if tag.contains('-')
            && !self.processed.contains(&tag)
            && let Some(resolved) = self.registry.resolve(&tag)
        {
            self.processed.mark(&tag);
            let gates = gates_for(&self.document, node);
            self.in_flight.set(self.in_flight.get() + 1);

            let inner = self.clone();
            tokio::task::spawn_local(async move {
                inner.hydrate(node, tag, resolved, gates).await;
                inner.in_flight.set(inner.in_flight.get().saturating_sub(1));
            });
            return;
        }

        for child in self.document.element_children(node) {
            self.visit(child);
        }
    }

    /// 等待条件、激活模块、继续访问子节点
    async fn hydrate(
        self: &Rc<Self>,
        node: NodeId,
        tag: String,
        resolved: ResolvedModule,
        gates: Vec<Gate>,
    ) {
        let mut abandoned = false;
        for gate in &gates {
            if let Err(e) = gate.wait(&self.environment, node).await {
                warn!(tag = %tag, error = %e, "放弃激活 island");
                self.record(HydrationEvent::Abandoned {
                    tag: tag.clone(),
                    reason: e.to_string(),
                });
                abandoned = true;
                break;
            }
        }

        if !abandoned {
            match resolved.module.activate(&self.elements) {
                Ok(()) => {
                    info!(tag = %tag, module = %resolved.id, "Loaded island");
                    self.record(HydrationEvent::Activated {
                        tag: tag.clone(),
                        module: resolved.id,
                    });
                }
                Err(e) => {
                    error!(tag = %tag, module = %resolved.id, error = %e, "加载 island 失败");
                    self.record(HydrationEvent::Failed {
                        tag: tag.clone(),
                        module: resolved.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        for child in self.document.element_children(node) {
            self.visit(child);
        }
    }

    fn record(&self, event: HydrationEvent) {
        self.events.borrow_mut().push(event);
    }
}

/// `revive` 返回的句柄
#[derive(Debug)]
pub struct HydrationHandle {
    task: JoinHandle<()>,
}

impl HydrationHandle {
    /// 观察者是否仍在运行
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// 停止观察插入（已排队的激活不受影响）
    pub fn disconnect(self) {
        self.task.abort();
    }
}
