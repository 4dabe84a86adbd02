//! # Elements 模块
//!
//! 自定义元素注册表与生命周期。
//!
//! 模块激活时调用 [`CustomElements::define`] 注册元素构造器，注册表负责：
//!
//! 1. 立即升级文档中已连接的同名节点（按文档顺序）
//! 2. 通过 [`CustomElements::attach`] 持续观察插入/移除，
//!    为新插入的节点创建实例并调用 `connected`，为被移除的实例调用 `disconnected`
//!
//! 调度器只负责触发模块激活，从不直接调用生命周期钩子。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::error::ElementError;

/// 保留的名字（规范规定不能作为自定义元素名）
const RESERVED_NAMES: [&str; 8] = [
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// 自定义元素实例
///
/// 实例与一个节点绑定，节点每次连接/断开时收到对应回调。
pub trait CustomElement {
    /// 节点连接到文档
    fn connected(&mut self);

    /// 节点从文档断开
    fn disconnected(&mut self) {}
}

/// 元素构造器：根据文档和节点创建实例
pub type ElementConstructor = Rc<dyn Fn(&Document, NodeId) -> Box<dyn CustomElement>>;

struct Instance {
    element: Rc<RefCell<Box<dyn CustomElement>>>,
    connected: bool,
}

struct Registry {
    definitions: HashMap<String, ElementConstructor>,
    instances: HashMap<NodeId, Instance>,
}

/// 自定义元素注册表
///
/// 克隆得到的句柄共享同一注册表。
#[derive(Clone)]
pub struct CustomElements {
    document: Document,
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for CustomElements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.borrow();
        let mut names: Vec<_> = registry.definitions.keys().collect();
        names.sort();
        f.debug_struct("CustomElements")
            .field("definitions", &names)
            .field("instances", &registry.instances.len())
            .finish()
    }
}

impl CustomElements {
    /// 创建绑定到文档的注册表
    pub fn new(document: Document) -> Self {
        Self {
            document,
            registry: Rc::new(RefCell::new(Registry {
                definitions: HashMap::new(),
                instances: HashMap::new(),
            })),
        }
    }

    /// 绑定的文档
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// 校验自定义元素名
    pub fn is_valid_name(name: &str) -> bool {
        name.contains('-')
            && name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
            && !name.chars().any(|c| c.is_ascii_uppercase() || c.is_whitespace())
            && !RESERVED_NAMES.contains(&name)
    }

    /// 注册元素并升级已连接的同名节点
    pub fn define(
        &self,
        name: &str,
        constructor: impl Fn(&Document, NodeId) -> Box<dyn CustomElement> + 'static,
    ) -> Result<(), ElementError> {
        if !Self::is_valid_name(name) {
            return Err(ElementError::InvalidName {
                name: name.to_string(),
            });
        }
        {
            let mut registry = self.registry.borrow_mut();
            if registry.definitions.contains_key(name) {
                return Err(ElementError::AlreadyDefined {
                    name: name.to_string(),
                });
            }
            registry
                .definitions
                .insert(name.to_string(), Rc::new(constructor));
        }
        debug!(name = %name, "自定义元素已注册");

        let body = self.document.body();
        for node in self.document.query_selector_all(body, name) {
            self.upgrade(node);
        }
        Ok(())
    }

    /// 元素是否已注册
    pub fn is_defined(&self, name: &str) -> bool {
        self.registry.borrow().definitions.contains_key(name)
    }

    /// 获取构造器
    pub fn get(&self, name: &str) -> Option<ElementConstructor> {
        self.registry.borrow().definitions.get(name).cloned()
    }

    /// 节点是否已被升级为自定义元素实例
    pub fn is_upgraded(&self, node: NodeId) -> bool {
        self.registry.borrow().instances.contains_key(&node)
    }

    /// 已创建的实例数量
    pub fn instance_count(&self) -> usize {
        self.registry.borrow().instances.len()
    }

    /// 升级子树中所有已定义且已连接的节点（含根）
    pub fn upgrade_subtree(&self, root: NodeId) {
        if !self.document.is_connected(root) {
            return;
        }
        self.upgrade(root);
        for node in self.document.descendants(root) {
            self.upgrade(node);
        }
    }

    /// 对子树中已连接过的实例调用 `disconnected`
    pub fn disconnect_subtree(&self, root: NodeId) {
        let mut nodes = vec![root];
        nodes.extend(self.document.descendants(root));
        for node in nodes {
            let element = {
                let mut registry = self.registry.borrow_mut();
                match registry.instances.get_mut(&node) {
                    Some(instance) if instance.connected && !self.document.is_connected(node) => {
                        instance.connected = false;
                        Some(instance.element.clone())
                    }
                    _ => None,
                }
            };
            if let Some(element) = element {
                element.borrow_mut().disconnected();
            }
        }
    }

    /// 升级单个节点：首次创建实例，已断开的实例重新连接
    fn upgrade(&self, node: NodeId) {
        if !self.document.is_connected(node) {
            return;
        }
        let Some(tag) = self.document.tag_name(node) else {
            return;
        };

        let element = {
            let mut registry = self.registry.borrow_mut();
            match registry.instances.get_mut(&node) {
                Some(instance) if instance.connected => return,
                Some(instance) => {
                    instance.connected = true;
                    instance.element.clone()
                }
                None => {
                    let Some(constructor) = registry.definitions.get(&tag).cloned() else {
                        return;
                    };
                    // 构造器可能访问文档，先释放注册表借用
                    drop(registry);
                    let element = Rc::new(RefCell::new(constructor(&self.document, node)));
                    self.registry.borrow_mut().instances.insert(
                        node,
                        Instance {
                            element: element.clone(),
                            connected: true,
                        },
                    );
                    element
                }
            }
        };
        element.borrow_mut().connected();
    }

    /// 启动生命周期任务，持续处理插入/移除
    ///
    /// 必须在 `LocalSet` 中调用。
    pub fn attach(&self) -> JoinHandle<()> {
        let mut observer = self.document.observe_mutations();
        let elements = self.clone();
        tokio::task::spawn_local(async move {
            while let Some(batch) = observer.next_batch().await {
                for record in batch {
                    for node in record.removed_nodes {
                        elements.disconnect_subtree(node);
                    }
                    for node in record.added_nodes {
                        elements.upgrade_subtree(node);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Fragment;

    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
        node: NodeId,
    }

    impl CustomElement for Recorder {
        fn connected(&mut self) {
            self.log.borrow_mut().push(format!("connected {}", self.node));
        }

        fn disconnected(&mut self) {
            self.log
                .borrow_mut()
                .push(format!("disconnected {}", self.node));
        }
    }

    fn recorder_ctor(
        log: &Rc<RefCell<Vec<String>>>,
    ) -> impl Fn(&Document, NodeId) -> Box<dyn CustomElement> + 'static {
        let log = log.clone();
        move |_: &Document, node: NodeId| -> Box<dyn CustomElement> {
            Box::new(Recorder {
                log: log.clone(),
                node,
            })
        }
    }

    #[test]
    fn test_valid_names() {
        assert!(CustomElements::is_valid_name("click-count"));
        assert!(CustomElements::is_valid_name("x-a"));
        assert!(!CustomElements::is_valid_name("clickcount"));
        assert!(!CustomElements::is_valid_name("Click-Count"));
        assert!(!CustomElements::is_valid_name("1-up"));
        assert!(!CustomElements::is_valid_name("font-face"));
    }

    #[test]
    fn test_define_upgrades_connected_nodes_in_order() {
        let doc = Document::new();
        let a = doc
            .insert_fragment(doc.body(), &Fragment::element("x-recorder"))
            .unwrap();
        let wrapper = doc
            .insert_fragment(
                doc.body(),
                &Fragment::element("div").child(Fragment::element("x-recorder")),
            )
            .unwrap();
        let b = doc.element_children(wrapper)[0];
        // 游离节点不升级
        doc.create_element("x-recorder");

        let log = Rc::new(RefCell::new(Vec::new()));
        let elements = CustomElements::new(doc.clone());
        elements.define("x-recorder", recorder_ctor(&log)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![format!("connected {a}"), format!("connected {b}")]
        );
        assert_eq!(elements.instance_count(), 2);
    }

    #[test]
    fn test_define_twice_fails() {
        let elements = CustomElements::new(Document::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        elements.define("x-recorder", recorder_ctor(&log)).unwrap();
        assert_eq!(
            elements.define("x-recorder", recorder_ctor(&log)),
            Err(ElementError::AlreadyDefined {
                name: "x-recorder".to_string()
            })
        );
        assert!(matches!(
            elements.define("recorder", recorder_ctor(&log)),
            Err(ElementError::InvalidName { .. })
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_follows_insertions_and_removals() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let doc = Document::new();
                let log = Rc::new(RefCell::new(Vec::new()));
                let elements = CustomElements::new(doc.clone());
                elements.define("x-recorder", recorder_ctor(&log)).unwrap();
                let _task = elements.attach();

                let node = doc
                    .insert_fragment(doc.body(), &Fragment::element("x-recorder"))
                    .unwrap();
                tokio::task::yield_now().await;
                assert!(elements.is_upgraded(node));

                doc.remove(node).unwrap();
                tokio::task::yield_now().await;
                doc.append_child(doc.body(), node).unwrap();
                tokio::task::yield_now().await;

                assert_eq!(
                    *log.borrow(),
                    vec![
                        format!("connected {node}"),
                        format!("disconnected {node}"),
                        format!("connected {node}"),
                    ]
                );
            })
            .await;
    }
}
