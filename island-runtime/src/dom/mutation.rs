//! # Mutation 模块
//!
//! 子树插入/移除记录，以及按批次读取记录的观察者。

use tokio::sync::mpsc;

use super::NodeId;

/// 一次子节点变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// 子节点发生变化的父节点
    pub target: NodeId,
    /// 新插入的节点（同一次插入的兄弟节点共享一条记录）
    pub added_nodes: Vec<NodeId>,
    /// 被移除的节点
    pub removed_nodes: Vec<NodeId>,
}

impl MutationRecord {
    pub(crate) fn added(target: NodeId, nodes: Vec<NodeId>) -> Self {
        Self {
            target,
            added_nodes: nodes,
            removed_nodes: Vec::new(),
        }
    }

    pub(crate) fn removed(target: NodeId, nodes: Vec<NodeId>) -> Self {
        Self {
            target,
            added_nodes: Vec::new(),
            removed_nodes: nodes,
        }
    }

    /// 记录是否为空
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty() && self.removed_nodes.is_empty()
    }
}

/// 变更观察者
///
/// 由 [`Document::observe_mutations`](super::Document::observe_mutations) 创建。
/// 记录在产生时入队，读取方在下一次调度时一次性取走整批。
#[derive(Debug)]
pub struct MutationObserver {
    rx: mpsc::UnboundedReceiver<MutationRecord>,
}

impl MutationObserver {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<MutationRecord>) -> Self {
        Self { rx }
    }

    /// 等待下一批记录
    ///
    /// 文档被销毁时返回 `None`。
    pub async fn next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];
        batch.extend(self.take_records());
        Some(batch)
    }

    /// 立即取走已排队的记录（不等待）
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        let mut records = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            records.push(record);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::Document;

    #[test]
    fn test_only_connected_mutations_are_recorded() {
        let doc = Document::new();
        let mut observer = doc.observe_mutations();

        // 在游离子树里搭建，不产生记录
        let widget = doc.create_element("click-count");
        let button = doc.create_element("button");
        doc.append_child(widget, button).unwrap();
        assert!(observer.take_records().is_empty());

        // 整棵子树只产生一条记录
        doc.append_child(doc.body(), widget).unwrap();
        let records = observer.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, doc.body());
        assert_eq!(records[0].added_nodes, vec![widget]);

        doc.remove(widget).unwrap();
        let records = observer.take_records();
        assert_eq!(records[0].removed_nodes, vec![widget]);
    }

    #[test]
    fn test_sibling_insertions_share_a_record() {
        let doc = Document::new();
        let mut observer = doc.observe_mutations();
        let a = doc.create_element("x-a");
        let b = doc.create_element("x-b");
        doc.append_children(doc.body(), &[a, b]).unwrap();

        let records = observer.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].added_nodes, vec![a, b]);
    }

    #[tokio::test]
    async fn test_next_batch_drains_everything_queued() {
        let doc = Document::new();
        let mut observer = doc.observe_mutations();
        for tag in ["x-a", "x-b", "x-c"] {
            let node = doc.create_element(tag);
            doc.append_child(doc.body(), node).unwrap();
        }

        let batch = observer.next_batch().await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(observer.take_records().is_empty());
    }
}
