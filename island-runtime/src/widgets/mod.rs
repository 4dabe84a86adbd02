//! # Widgets 模块
//!
//! 内置 island 组件及其模块表。
//!
//! | 标签 | 模块 |
//! |---|---|
//! | `click-count` | [`ClickCountModule`] |
//! | `click-counter` | [`ClickCounterModule`] |

mod click_count;
mod click_counter;

pub use click_count::{
    ACTIVATED_TEXT, CLICK_COUNT_TAG, COUNT_UPDATED_EVENT, ClickCount, ClickCountModule,
    ClickCountOptions,
};
pub use click_counter::{
    CLICK_COUNTER_TAG, COUNTER_UPDATED_EVENT, ClickCounter, ClickCounterModule,
};

use std::rc::Rc;

use tracing::warn;

use crate::registry::{IslandModule, IslandRegistry};

/// 内置组件名
pub const BUILTIN_TAGS: [&str; 2] = [CLICK_COUNT_TAG, CLICK_COUNTER_TAG];

/// 模块 ID 的组件名部分（`click-count/index` → `click-count`）
pub fn module_stem(id: &str) -> &str {
    id.split('/').next().unwrap_or(id)
}

/// 按组件名查找内置模块
pub fn builtin_module(stem: &str, options: &ClickCountOptions) -> Option<Rc<dyn IslandModule>> {
    match stem {
        CLICK_COUNT_TAG => Some(Rc::new(ClickCountModule::new(options.clone()))),
        CLICK_COUNTER_TAG => Some(Rc::new(ClickCounterModule)),
        _ => None,
    }
}

/// 由模块 ID 列表构建注册表
///
/// 无法对应到内置组件的 ID 会被跳过并记录警告。
pub fn builtin_registry<S: AsRef<str>>(ids: &[S], options: &ClickCountOptions) -> IslandRegistry {
    let mut builder = IslandRegistry::builder();
    for id in ids {
        let id = id.as_ref();
        match builtin_module(module_stem(id), options) {
            Some(module) => builder = builder.shared(id, module),
            None => warn!(module = %id, "未知的模块 ID，已跳过"),
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_stem() {
        assert_eq!(module_stem("click-count/index"), "click-count");
        assert_eq!(module_stem("click-counter"), "click-counter");
    }

    #[test]
    fn test_builtin_registry_follows_convention() {
        let registry = builtin_registry(
            &["click-count/index", "click-counter/click-counter", "fancy-widget"],
            &ClickCountOptions::default(),
        );
        assert_eq!(
            registry.module_ids(),
            vec!["click-count/index", "click-counter/click-counter"]
        );
        assert_eq!(registry.resolve("click-count").unwrap().id, "click-count/index");
        assert_eq!(
            registry.resolve("click-counter").unwrap().id,
            "click-counter/click-counter"
        );
        assert!(registry.resolve("fancy-widget").is_none());
    }
}
