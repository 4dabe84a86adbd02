//! # Page 模块
//!
//! 页面文件：标题加一组 [`Fragment`]，加载后挂载到文档 `body`。
//!
//! ```json
//! {
//!   "title": "Demo",
//!   "body": [
//!     { "tag": "click-count", "attrs": { "id": "hero", "client:visible": "" }, "children": [] }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use island_runtime::{Document, Fragment, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PageError;

/// 页面描述
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 页面标题
    #[serde(default)]
    pub title: String,

    /// `body` 下的顶层节点
    #[serde(default)]
    pub body: Vec<Fragment>,
}

impl Page {
    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PageError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, PageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 挂载到文档 `body`，所有顶层节点在同一条变更记录中插入
    pub fn mount(&self, document: &Document) -> Result<Vec<NodeId>, PageError> {
        let nodes = self
            .body
            .iter()
            .map(|fragment| document.build_fragment(fragment))
            .collect::<Result<Vec<_>, _>>()?;
        if !nodes.is_empty() {
            document.append_children(document.body(), &nodes)?;
        }
        debug!(title = %self.title, nodes = nodes.len(), "页面已挂载");
        Ok(nodes)
    }

    /// 页面中出现的自定义元素标签（含连字符）
    pub fn custom_tags(&self) -> BTreeSet<String> {
        self.body
            .iter()
            .flat_map(Fragment::tags)
            .filter(|tag| tag.contains('-'))
            .map(str::to_string)
            .collect()
    }
}
