//! # Fragment 模块
//!
//! 可序列化的子树描述，用于页面文件和测试中构建文档。
//!
//! JSON 形式：字符串是文本节点，对象是元素：
//!
//! ```json
//! { "tag": "click-count", "attrs": { "client:visible": "" }, "children": ["..."] }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Document, NodeId};
use crate::error::DomError;

/// 子树描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
    /// 文本节点
    Text(String),
    /// 元素节点
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<Fragment>,
    },
}

impl Fragment {
    /// 创建元素描述
    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// 创建文本描述
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// 添加属性（文本节点忽略）
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attrs, .. } = &mut self {
            attrs.insert(name.into(), value.into());
        }
        self
    }

    /// 添加子节点（文本节点忽略）
    pub fn child(mut self, child: Fragment) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    /// 遍历所有元素标签（前序）
    pub fn tags(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_tags(&mut out);
        out
    }

    fn collect_tags<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Self::Element { tag, children, .. } = self {
            out.push(tag);
            for child in children {
                child.collect_tags(out);
            }
        }
    }
}

impl Document {
    /// 按描述创建游离子树，返回子树根
    pub fn build_fragment(&self, fragment: &Fragment) -> Result<NodeId, DomError> {
        match fragment {
            Fragment::Text(text) => Ok(self.create_text(text.clone())),
            Fragment::Element {
                tag,
                attrs,
                children,
            } => {
                let node = self.create_element(tag);
                for (name, value) in attrs {
                    self.set_attribute(node, name, value)?;
                }
                let built = children
                    .iter()
                    .map(|child| self.build_fragment(child))
                    .collect::<Result<Vec<_>, _>>()?;
                if !built.is_empty() {
                    self.append_children(node, &built)?;
                }
                Ok(node)
            }
        }
    }

    /// 构建子树并一次性插入到 `parent` 末尾
    pub fn insert_fragment(&self, parent: NodeId, fragment: &Fragment) -> Result<NodeId, DomError> {
        let node = self.build_fragment(fragment)?;
        self.append_child(parent, node)?;
        Ok(node)
    }
}
