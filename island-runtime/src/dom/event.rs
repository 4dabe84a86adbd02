//! # Event 模块
//!
//! 事件派发：目标阶段 + 冒泡阶段，没有捕获阶段。

use std::rc::Rc;

use serde_json::Value;

use super::{Document, NodeId};

/// 事件监听器
pub type EventListener = Rc<dyn Fn(&Event)>;

/// 监听器 ID，用于移除监听
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) struct RegisteredListener {
    pub(crate) id: ListenerId,
    pub(crate) node: NodeId,
    pub(crate) kind: String,
    pub(crate) callback: EventListener,
}

/// 事件
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// 事件类型（如 `click`、`count-updated`）
    pub kind: String,
    /// 是否冒泡
    pub bubbles: bool,
    /// 是否穿透 shadow 边界（合成文档中只作为标记保留）
    pub composed: bool,
    /// 自定义事件负载
    pub detail: Option<Value>,
    /// 派发目标（派发时填写）
    pub target: Option<NodeId>,
    /// 当前正在处理的节点（派发时填写）
    pub current_target: Option<NodeId>,
}

impl Event {
    /// 创建不冒泡的普通事件
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            bubbles: false,
            composed: false,
            detail: None,
            target: None,
            current_target: None,
        }
    }

    /// 创建带负载的自定义事件
    pub fn custom(kind: impl Into<String>, detail: Value) -> Self {
        Self {
            detail: Some(detail),
            ..Self::new(kind)
        }
    }

    /// 设置是否冒泡
    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    /// 设置 composed 标记
    pub fn with_composed(mut self, composed: bool) -> Self {
        self.composed = composed;
        self
    }
}

impl Document {
    /// 注册事件监听器
    pub fn add_event_listener(
        &self,
        node: NodeId,
        kind: &str,
        listener: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        let mut tree = self.tree.borrow_mut();
        let id = ListenerId(tree.next_listener);
        tree.next_listener += 1;
        tree.listeners.push(RegisteredListener {
            id,
            node,
            kind: kind.to_string(),
            callback: Rc::new(listener),
        });
        id
    }

    /// 移除事件监听器，返回是否存在
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut tree = self.tree.borrow_mut();
        let before = tree.listeners.len();
        tree.listeners.retain(|l| l.id != id);
        tree.listeners.len() != before
    }

    fn listener_alive(&self, id: ListenerId) -> bool {
        self.tree.borrow().listeners.iter().any(|l| l.id == id)
    }

    /// 派发事件，返回被调用的监听器数量
    ///
    /// 监听器在文档借用释放后调用，可以自由修改文档或继续派发事件。
    pub fn dispatch_event(&self, target: NodeId, mut event: Event) -> usize {
        let path = {
            let tree = self.tree.borrow();
            let mut path = vec![target];
            if event.bubbles {
                let mut current = tree.get(target).and_then(|n| n.parent);
                while let Some(node) = current {
                    path.push(node);
                    current = tree.get(node).and_then(|n| n.parent);
                }
            }
            path
        };

        event.target = Some(target);
        let mut invoked = 0;
        for node in path {
            let listeners: Vec<(ListenerId, EventListener)> = self
                .tree
                .borrow()
                .listeners
                .iter()
                .filter(|l| l.node == node && l.kind == event.kind)
                .map(|l| (l.id, l.callback.clone()))
                .collect();

            event.current_target = Some(node);
            for (id, callback) in listeners {
                // 前一个监听器可能已经移除了它
                if !self.listener_alive(id) {
                    continue;
                }
                callback(&event);
                invoked += 1;
            }
        }
        invoked
    }

    /// 模拟一次点击（冒泡）
    pub fn click(&self, target: NodeId) -> usize {
        self.dispatch_event(target, Event::new("click").with_bubbles(true))
    }
}
