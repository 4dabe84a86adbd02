//! # Scenario 模块
//!
//! 场景文件：按顺序回放的一组步骤，驱动合成环境和文档。
//!
//! ```json
//! {
//!   "steps": [
//!     { "action": "set_visible", "id": "hero" },
//!     { "action": "wait", "ms": 600 },
//!     { "action": "click", "id": "hero-button" }
//!   ]
//! }
//! ```
//!
//! 元素一律通过 `id` 属性定位，找不到时返回 [`ScenarioError::UnknownElement`]。

use std::fs;
use std::path::Path;
use std::time::Duration;

use island_runtime::{Document, Environment, Fragment, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScenarioError;

/// 场景步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// 等待指定毫秒
    Wait { ms: u64 },
    /// 设置元素是否与视口相交
    SetVisible {
        id: String,
        #[serde(default = "default_true")]
        visible: bool,
    },
    /// 设置媒体查询是否匹配
    SetMedia {
        query: String,
        #[serde(default = "default_true")]
        matches: bool,
    },
    /// 触发一次空闲通知
    Idle,
    /// 点击元素
    Click { id: String },
    /// 从文档中移除元素
    Remove { id: String },
    /// 插入子树（未指定父节点时插入到 `body`）
    Insert {
        #[serde(default)]
        parent_id: Option<String>,
        fragment: Fragment,
    },
}

fn default_true() -> bool {
    true
}

/// 场景描述
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// 步骤列表
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 按顺序回放全部步骤
    ///
    /// 每步之后让出一次，让被唤醒的本地任务先运行。
    pub async fn play(
        &self,
        document: &Document,
        environment: &Environment,
    ) -> Result<(), ScenarioError> {
        for (index, step) in self.steps.iter().enumerate() {
            let stage = Stage {
                document,
                environment,
                step: index + 1,
            };
            debug!(index = stage.step, ?step, "回放场景步骤");
            stage.apply(step).await?;
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

/// 单步执行上下文
struct Stage<'a> {
    document: &'a Document,
    environment: &'a Environment,
    step: usize,
}

impl Stage<'_> {
    async fn apply(&self, step: &Step) -> Result<(), ScenarioError> {
        match step {
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::SetVisible { id, visible } => {
                let node = self.find(id)?;
                self.environment.set_intersecting(node, *visible);
            }
            Step::SetMedia { query, matches } => {
                self.environment.set_media_matches(query, *matches);
            }
            Step::Idle => self.environment.notify_idle(),
            Step::Click { id } => {
                let node = self.find(id)?;
                self.document.click(node);
            }
            Step::Remove { id } => {
                let node = self.find(id)?;
                self.document.remove(node).map_err(|source| self.dom(source))?;
            }
            Step::Insert {
                parent_id,
                fragment,
            } => {
                let parent = match parent_id {
                    Some(id) => self.find(id)?,
                    None => self.document.body(),
                };
                self.document
                    .insert_fragment(parent, fragment)
                    .map_err(|source| self.dom(source))?;
            }
        }
        Ok(())
    }

    fn find(&self, id: &str) -> Result<NodeId, ScenarioError> {
        self.document
            .query_selector(self.document.body(), &format!("#{id}"))
            .ok_or_else(|| ScenarioError::UnknownElement {
                step: self.step,
                id: id.to_string(),
            })
    }

    fn dom(&self, source: island_runtime::DomError) -> ScenarioError {
        ScenarioError::Dom {
            step: self.step,
            source,
        }
    }
}
