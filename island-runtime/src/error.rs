//! # Error 模块
//!
//! 定义 island-runtime 中使用的错误类型。
//!
//! 每类错误只影响最小的单元（一个模块、一个队列、一次特效），
//! 不会中断调度器本身。

use thiserror::Error;

use crate::dom::NodeId;

/// 文档树操作错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// 节点不存在
    #[error("节点 {node} 不存在")]
    UnknownNode { node: NodeId },

    /// 节点不是元素（例如文本节点）
    #[error("节点 {node} 不是元素节点")]
    NotAnElement { node: NodeId },

    /// 非法的层级关系（插入到文本节点或自身后代）
    #[error("无法将节点 {child} 插入到 {parent} 下")]
    HierarchyRequest { parent: NodeId, child: NodeId },
}

/// 自定义元素注册错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    /// 非法的自定义元素名
    #[error("非法的自定义元素名 '{name}'")]
    InvalidName { name: String },

    /// 重复定义
    #[error("自定义元素 '{name}' 已经定义")]
    AlreadyDefined { name: String },
}

/// Island 模块激活错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// 模块自身报告的激活失败
    #[error("模块 '{module}' 激活失败: {message}")]
    ActivationFailed { module: String, message: String },

    /// 注册自定义元素失败
    #[error("注册自定义元素失败: {0}")]
    Element(#[from] ElementError),
}

impl ModuleError {
    /// 创建激活失败错误
    pub fn activation(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActivationFailed {
            module: module.into(),
            message: message.into(),
        }
    }
}

/// 加载条件等待错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// 环境已关闭，条件永远无法满足
    #[error("加载条件 '{gate}' 无法再满足：环境已关闭")]
    EnvironmentClosed { gate: &'static str },
}

/// 文字特效错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// 文档树操作失败
    #[error("文档操作失败: {0}")]
    Dom(#[from] DomError),

    /// 特效被中断
    #[error("特效被中断: {reason}")]
    Interrupted { reason: String },
}

/// island-runtime 统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IslandError {
    /// 文档错误
    #[error("文档错误: {0}")]
    Dom(#[from] DomError),

    /// 自定义元素错误
    #[error("自定义元素错误: {0}")]
    Element(#[from] ElementError),

    /// 模块错误
    #[error("模块错误: {0}")]
    Module(#[from] ModuleError),

    /// 加载条件错误
    #[error("加载条件错误: {0}")]
    Gate(#[from] GateError),

    /// 特效错误
    #[error("特效错误: {0}")]
    Effect(#[from] EffectError),
}

/// Result 类型别名
pub type IslandResult<T> = Result<T, IslandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_keeps_message() {
        let err: IslandError = ModuleError::activation("click-count/index", "boom").into();
        assert_eq!(
            err.to_string(),
            "模块错误: 模块 'click-count/index' 激活失败: boom"
        );

        let err: ModuleError = ElementError::AlreadyDefined {
            name: "click-count".to_string(),
        }
        .into();
        assert!(matches!(err, ModuleError::Element(_)));
    }
}
