//! # Registry 模块
//!
//! Island 模块注册表：按命名约定把标签名映射到可加载模块。
//!
//! 标签 `t` 依次尝试以下模块 ID，首个命中者胜出：
//!
//! ```text
//! t
//! t/index
//! t/t
//! ```
//!
//! 注册表在构建后只读，可在多个调度器之间共享。

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::elements::CustomElements;
use crate::error::ModuleError;

/// 可激活的 island 模块
///
/// 激活的唯一副作用应当是通过 [`CustomElements::define`] 注册自定义元素。
pub trait IslandModule {
    /// 激活模块
    fn activate(&self, elements: &CustomElements) -> Result<(), ModuleError>;
}

impl<F> IslandModule for F
where
    F: Fn(&CustomElements) -> Result<(), ModuleError>,
{
    fn activate(&self, elements: &CustomElements) -> Result<(), ModuleError> {
        self(elements)
    }
}

/// 解析结果
#[derive(Clone)]
pub struct ResolvedModule {
    /// 命中的模块 ID
    pub id: String,
    /// 模块
    pub module: Rc<dyn IslandModule>,
}

impl fmt::Debug for ResolvedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModule")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Island 模块注册表
#[derive(Clone, Default)]
pub struct IslandRegistry {
    modules: BTreeMap<String, Rc<dyn IslandModule>>,
}

impl fmt::Debug for IslandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IslandRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl IslandRegistry {
    /// 创建构建器
    pub fn builder() -> IslandRegistryBuilder {
        IslandRegistryBuilder::default()
    }

    /// 标签对应的候选模块 ID（按优先级）
    pub fn candidate_paths(tag: &str) -> [String; 3] {
        [tag.to_string(), format!("{tag}/index"), format!("{tag}/{tag}")]
    }

    /// 按命名约定解析标签
    pub fn resolve(&self, tag: &str) -> Option<ResolvedModule> {
        Self::candidate_paths(tag).into_iter().find_map(|id| {
            self.modules.get(&id).map(|module| ResolvedModule {
                module: module.clone(),
                id,
            })
        })
    }

    /// 是否包含模块 ID
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// 所有模块 ID（字典序）
    pub fn module_ids(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// 模块数量
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// 注册表构建器
#[derive(Default)]
pub struct IslandRegistryBuilder {
    modules: BTreeMap<String, Rc<dyn IslandModule>>,
}

impl IslandRegistryBuilder {
    /// 注册模块；相同 ID 后注册者覆盖前者
    pub fn module(mut self, id: impl Into<String>, module: impl IslandModule + 'static) -> Self {
        self.modules.insert(id.into(), Rc::new(module));
        self
    }

    /// 注册已共享的模块
    pub fn shared(mut self, id: impl Into<String>, module: Rc<dyn IslandModule>) -> Self {
        self.modules.insert(id.into(), module);
        self
    }

    /// 完成构建
    pub fn build(self) -> IslandRegistry {
        IslandRegistry {
            modules: self.modules,
        }
    }
}
