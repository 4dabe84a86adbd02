//! # DOM 模块
//!
//! 轻量的合成文档树，为调度器、特效和组件提供与浏览器 DOM 等价的最小接口。
//!
//! ## 设计说明
//!
//! - 节点存放在 arena 中，通过 [`NodeId`] 引用，节点被移除后 ID 仍然有效（只是不再连接）
//! - [`Document::release`] 回收整棵子树，槽位进入空闲列表；ID 带有代数，
//!   槽位复用后旧 ID 一律视为不存在
//! - [`Document`] 是 `Rc<RefCell<_>>` 句柄，克隆代价低，所有借用都在方法内部完成，
//!   调用方不会持有跨 `await` 的借用
//! - 只有挂在 `body` 之下（已连接）的插入/移除才会产生 [`MutationRecord`]
//! - 单线程使用，不实现 `Send`
//!
//! ```text
//! body
//!  └─ click-count [client:visible]
//!      ├─ button
//!      └─ span [data-click-count] "00"
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tokio::sync::mpsc;

use crate::error::DomError;

mod event;
mod fragment;
mod markup;
mod mutation;
mod selector;

pub use event::{Event, EventListener, ListenerId};
pub use fragment::Fragment;
pub use mutation::{MutationObserver, MutationRecord};
pub use selector::Selector;

/// 根元素标签
pub const ROOT_TAG: &str = "body";

/// 节点标识符
///
/// 由 [`Document`] 分配，在文档生命周期内保持唯一。
/// 槽位索引可能被复用，但 `(index, generation)` 不会重复。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl NodeId {
    /// 获取内部索引
    pub fn index(&self) -> usize {
        self.index
    }

    /// 槽位代数
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            0 => write!(f, "NodeId({})", self.index),
            g => write!(f, "NodeId({}v{g})", self.index),
        }
    }
}

/// 元素数据
#[derive(Debug, Clone, Default)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) styles: Vec<(String, String)>,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

pub(crate) struct Tree {
    slots: Vec<Slot>,
    free: Vec<usize>,
    pub(crate) root: NodeId,
    pub(crate) listeners: Vec<event::RegisteredListener>,
    pub(crate) next_listener: u64,
    pub(crate) observers: Vec<mpsc::UnboundedSender<MutationRecord>>,
}

impl Tree {
    fn new() -> Self {
        let root = NodeData {
            kind: NodeKind::Element(ElementData::new(ROOT_TAG)),
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                data: Some(root),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            listeners: Vec::new(),
            next_listener: 1,
            observers: Vec::new(),
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.data = Some(data);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            data: Some(data),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// 存活节点数
    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_mut())
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.get(id).ok_or(DomError::UnknownNode { node: id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.get_mut(id).ok_or(DomError::UnknownNode { node: id })
    }

    /// 回收 `node` 及其全部后代（调用方负责先摘下）
    fn free_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(id.index)
                .filter(|slot| slot.generation == id.generation)
            else {
                continue;
            };
            let Some(data) = slot.data.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            self.listeners.retain(|l| l.node != id);
            stack.extend(data.children);
        }
    }

    pub(crate) fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match &self.node(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(DomError::NotAnElement { node: id }),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(DomError::NotAnElement { node: id }),
        }
    }

    pub(crate) fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.get(node).and_then(|n| n.parent);
        }
        false
    }

    /// `ancestor` 是否为 `node` 自身或其祖先
    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.get(n).and_then(|d| d.parent);
        }
        false
    }

    /// 从父节点上摘下，返回原父节点
    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.get_mut(node)?.parent.take()?;
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != node);
        }
        Some(parent)
    }

    fn notify(&mut self, record: MutationRecord) {
        if record.is_empty() {
            return;
        }
        self.observers.retain(|tx| tx.send(record.clone()).is_ok());
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// 按文档顺序收集 `scope` 的后代元素（不含自身）
    pub(crate) fn descendants(&self, scope: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.get(scope) else {
            return;
        };
        for child in &node.children {
            if self
                .get(*child)
                .is_some_and(|c| matches!(c.kind, NodeKind::Element(_)))
            {
                out.push(*child);
                self.descendants(*child, out);
            }
        }
    }
}

/// 文档句柄
///
/// 克隆得到的句柄共享同一棵树。
#[derive(Clone)]
pub struct Document {
    pub(crate) tree: Rc<RefCell<Tree>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree.borrow();
        f.debug_struct("Document")
            .field("nodes", &tree.live())
            .field("listeners", &tree.listeners.len())
            .field("observers", &tree.observers.len())
            .finish()
    }
}

impl Document {
    /// 创建只包含 `body` 的空文档
    pub fn new() -> Self {
        Self {
            tree: Rc::new(RefCell::new(Tree::new())),
        }
    }

    /// 根元素
    pub fn body(&self) -> NodeId {
        self.tree.borrow().root
    }

    /// 两个句柄是否指向同一文档
    pub fn same_document(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }

    // ========== 节点创建 ==========

    /// 创建游离的元素节点（标签名统一小写）
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.tree
            .borrow_mut()
            .push(NodeKind::Element(ElementData::new(tag)))
    }

    /// 创建游离的文本节点
    pub fn create_text(&self, text: impl Into<String>) -> NodeId {
        self.tree.borrow_mut().push(NodeKind::Text(text.into()))
    }

    // ========== 树结构 ==========

    /// 追加单个子节点
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.append_children(parent, &[child])
    }

    /// 一次追加多个兄弟节点，只产生一条插入记录
    ///
    /// 已挂在别处的节点会先被摘下（产生对应的移除记录）。
    pub fn append_children(&self, parent: NodeId, children: &[NodeId]) -> Result<(), DomError> {
        let mut tree = self.tree.borrow_mut();
        tree.element(parent)?;
        for &child in children {
            tree.node(child)?;
            if tree.is_inclusive_ancestor(child, parent) {
                return Err(DomError::HierarchyRequest { parent, child });
            }
        }

        for &child in children {
            if let Some(old_parent) = tree.detach(child)
                && tree.is_connected(old_parent)
            {
                tree.notify(MutationRecord::removed(old_parent, vec![child]));
            }
            tree.node_mut(child)?.parent = Some(parent);
            tree.node_mut(parent)?.children.push(child);
        }

        if tree.is_connected(parent) {
            tree.notify(MutationRecord::added(parent, children.to_vec()));
        }
        Ok(())
    }

    /// 将节点从父节点移除；没有父节点时什么也不做
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let mut tree = self.tree.borrow_mut();
        tree.node(node)?;
        if let Some(parent) = tree.detach(node)
            && tree.is_connected(parent)
        {
            tree.notify(MutationRecord::removed(parent, vec![node]));
        }
        Ok(())
    }

    /// 移除节点并回收它的整棵子树，返回是否回收
    ///
    /// 连接状态下会先产生一条移除记录。回收后这些 ID 全部失效，
    /// 挂在上面的事件监听器一并丢弃。`body` 不可回收。
    pub fn release(&self, node: NodeId) -> bool {
        let mut tree = self.tree.borrow_mut();
        if node == tree.root || tree.get(node).is_none() {
            return false;
        }
        if let Some(parent) = tree.detach(node)
            && tree.is_connected(parent)
        {
            tree.notify(MutationRecord::removed(parent, vec![node]));
        }
        tree.free_subtree(node);
        true
    }

    /// 节点是否存在于 arena 中（未被回收）
    pub fn contains(&self, node: NodeId) -> bool {
        self.tree.borrow().get(node).is_some()
    }

    /// 存活节点数（含 `body` 与游离节点）
    pub fn node_count(&self) -> usize {
        self.tree.borrow().live()
    }

    /// 节点是否连接到 `body`
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.tree.borrow().is_connected(node)
    }

    /// 是否为元素节点
    pub fn is_element(&self, node: NodeId) -> bool {
        self.tree.borrow().element(node).is_ok()
    }

    /// 父节点
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.borrow().get(node).and_then(|n| n.parent)
    }

    /// 所有子节点（含文本节点）
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .borrow()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// 元素子节点（按文档顺序，忽略文本节点）
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        let Some(data) = tree.get(node) else {
            return Vec::new();
        };
        data.children
            .iter()
            .copied()
            .filter(|c| tree.element(*c).is_ok())
            .collect()
    }

    /// 小写标签名，文本节点返回 `None`
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.tree.borrow().element(node).ok().map(|e| e.tag.clone())
    }

    // ========== 属性 ==========

    /// 读取属性
    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.tree
            .borrow()
            .element(node)
            .ok()
            .and_then(|e| e.attr(&name).map(str::to_string))
    }

    /// 是否有属性
    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }

    /// 设置属性（属性名统一小写）
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();
        let mut tree = self.tree.borrow_mut();
        let element = tree.element_mut(node)?;
        match element.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => element.attributes.push((name, value.to_string())),
        }
        Ok(())
    }

    /// 移除属性，返回是否存在过
    pub fn remove_attribute(&self, node: NodeId, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let mut tree = self.tree.borrow_mut();
        let Ok(element) = tree.element_mut(node) else {
            return false;
        };
        let before = element.attributes.len();
        element.attributes.retain(|(k, _)| *k != name);
        element.attributes.len() != before
    }

    /// 全部属性（按设置顺序）
    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.tree
            .borrow()
            .element(node)
            .map(|e| e.attributes.clone())
            .unwrap_or_default()
    }

    /// 读取 `data-*` 属性
    pub fn data(&self, node: NodeId, key: &str) -> Option<String> {
        self.get_attribute(node, &format!("data-{key}"))
    }

    /// 设置 `data-*` 属性
    pub fn set_data(&self, node: NodeId, key: &str, value: &str) -> Result<(), DomError> {
        self.set_attribute(node, &format!("data-{key}"), value)
    }

    /// 是否包含 class
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.tree
            .borrow()
            .element(node)
            .is_ok_and(|e| e.has_class(class))
    }

    /// 添加 class
    pub fn add_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let list = match self.get_attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &list)
    }

    // ========== 内联样式 ==========

    /// 读取内联样式
    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.tree.borrow().element(node).ok().and_then(|e| {
            e.styles
                .iter()
                .find(|(k, _)| k == property)
                .map(|(_, v)| v.clone())
        })
    }

    /// 设置内联样式
    pub fn set_style(&self, node: NodeId, property: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.tree.borrow_mut();
        let element = tree.element_mut(node)?;
        match element.styles.iter_mut().find(|(k, _)| k == property) {
            Some((_, v)) => *v = value.to_string(),
            None => element
                .styles
                .push((property.to_string(), value.to_string())),
        }
        Ok(())
    }

    // ========== 文本 ==========

    /// 拼接所有后代文本
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.tree.borrow().collect_text(node, &mut out);
        out
    }

    /// 替换全部内容为单个文本节点（空字符串则清空）
    ///
    /// 唯一的子节点已是文本节点时原地改写，不产生变更记录。
    /// 否则摘下全部子节点：被替换的文本节点随即回收，元素子节点保持游离。
    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let mut tree = self.tree.borrow_mut();
        if let NodeKind::Text(existing) = &mut tree.node_mut(node)?.kind {
            existing.replace_range(.., text);
            return Ok(());
        }

        let single = match tree.node(node)?.children.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        if !text.is_empty()
            && let Some(child) = single
            && let Some(NodeData {
                kind: NodeKind::Text(existing),
                ..
            }) = tree.get_mut(child)
        {
            existing.replace_range(.., text);
            return Ok(());
        }

        let removed = std::mem::take(&mut tree.node_mut(node)?.children);
        for child in &removed {
            tree.node_mut(*child)?.parent = None;
        }
        let stale: Vec<NodeId> = removed
            .iter()
            .copied()
            .filter(|child| {
                tree.get(*child)
                    .is_some_and(|d| matches!(d.kind, NodeKind::Text(_)))
            })
            .collect();
        for child in stale {
            tree.free_subtree(child);
        }

        let mut added = Vec::new();
        if !text.is_empty() {
            let text_node = tree.push(NodeKind::Text(text.to_string()));
            tree.node_mut(text_node)?.parent = Some(node);
            tree.node_mut(node)?.children.push(text_node);
            added.push(text_node);
        }

        if tree.is_connected(node) {
            tree.notify(MutationRecord {
                target: node,
                added_nodes: added,
                removed_nodes: removed,
            });
        }
        Ok(())
    }

    // ========== 查询 ==========

    /// 返回 `scope` 后代中第一个匹配的元素
    ///
    /// 选择器无法解析时返回 `None`。
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.borrow();
        let mut candidates = Vec::new();
        tree.descendants(scope, &mut candidates);
        candidates
            .into_iter()
            .find(|id| tree.element(*id).is_ok_and(|e| selector.matches(e)))
    }

    /// 返回 `scope` 后代中所有匹配的元素（文档顺序）
    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let tree = self.tree.borrow();
        let mut candidates = Vec::new();
        tree.descendants(scope, &mut candidates);
        candidates
            .into_iter()
            .filter(|id| tree.element(*id).is_ok_and(|e| selector.matches(e)))
            .collect()
    }

    /// 节点自身是否匹配选择器
    pub fn matches(&self, node: NodeId, selector: &str) -> bool {
        let Some(selector) = Selector::parse(selector) else {
            return false;
        };
        self.tree
            .borrow()
            .element(node)
            .is_ok_and(|e| selector.matches(e))
    }

    /// 按文档顺序返回 `scope` 的所有后代元素（不含自身）
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.tree.borrow().descendants(scope, &mut out);
        out
    }

    // ========== 变更观察 ==========

    /// 订阅插入/移除记录
    ///
    /// 观察范围是整个 `body` 子树；丢弃返回值即断开。
    pub fn observe_mutations(&self) -> MutationObserver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tree.borrow_mut().observers.push(tx);
        MutationObserver::new(rx)
    }
}
