//! # Gate 模块
//!
//! 加载条件：元素上的 `client:*` 属性决定模块何时激活。
//!
//! 多个条件按固定顺序串行等待（visible → media → idle），
//! 前一个满足后才开始等待下一个。

use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::environment::Environment;
use crate::error::GateError;

/// 加载条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// 元素进入视口
    Visible,
    /// 媒体查询匹配
    Media(String),
    /// 浏览器空闲
    Idle,
}

impl Gate {
    /// `client:visible`
    pub const VISIBLE: &'static str = "client:visible";
    /// `client:media`
    pub const MEDIA: &'static str = "client:media";
    /// `client:idle`
    pub const IDLE: &'static str = "client:idle";

    /// 对应的属性名
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Visible => Self::VISIBLE,
            Self::Media(_) => Self::MEDIA,
            Self::Idle => Self::IDLE,
        }
    }

    /// 等待条件满足
    pub async fn wait(&self, env: &Environment, node: NodeId) -> Result<(), GateError> {
        debug!(gate = self.attribute(), node = %node, "等待加载条件");
        match self {
            Self::Visible => env.observe_intersection(node).until_visible().await,
            Self::Media(query) => env.wait_for_media(query).await,
            Self::Idle => env.wait_for_idle().await,
        }
    }
}

/// 读取节点上的加载条件（固定顺序）
///
/// `client:media` 的值为空时不构成条件。
pub fn gates_for(document: &Document, node: NodeId) -> Vec<Gate> {
    let mut gates = Vec::new();
    if document.has_attribute(node, Gate::VISIBLE) {
        gates.push(Gate::Visible);
    }
    if let Some(query) = document.get_attribute(node, Gate::MEDIA)
        && !query.trim().is_empty()
    {
        gates.push(Gate::Media(query));
    }
    if document.has_attribute(node, Gate::IDLE) {
        gates.push(Gate::Idle);
    }
    gates
}
