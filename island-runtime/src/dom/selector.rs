//! # Selector 模块
//!
//! 最小选择器：`tag`、`#id`、`.class`、`[attr]`、`[attr=value]`。
//! 不支持组合器。

use super::ElementData;

/// 单一简单选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// 标签名
    Tag(String),
    /// `#id`
    Id(String),
    /// `.class`
    Class(String),
    /// `[name]` 或 `[name=value]`
    Attribute { name: String, value: Option<String> },
}

impl Selector {
    /// 解析选择器，无法识别时返回 `None`
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some(id) = input.strip_prefix('#') {
            return is_ident(id).then(|| Self::Id(id.to_string()));
        }
        if let Some(class) = input.strip_prefix('.') {
            return is_ident(class).then(|| Self::Class(class.to_string()));
        }
        if let Some(inner) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let (name, value) = match inner.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                    (name.trim(), Some(value.to_string()))
                }
                None => (inner.trim(), None),
            };
            return is_ident(name).then(|| Self::Attribute {
                name: name.to_ascii_lowercase(),
                value,
            });
        }
        is_ident(input).then(|| Self::Tag(input.to_ascii_lowercase()))
    }

    pub(crate) fn matches(&self, element: &ElementData) -> bool {
        match self {
            Self::Tag(tag) => element.tag == *tag,
            Self::Id(id) => element.attr("id") == Some(id.as_str()),
            Self::Class(class) => element.has_class(class),
            Self::Attribute { name, value } => match (element.attr(name), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            },
        }
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}
