//! # Island Runtime
//!
//! 静态页面中交互组件（island）的惰性激活运行时，以及配套的文字特效与计数组件。
//!
//! ## 架构概述
//!
//! `island-runtime` 不依赖浏览器：文档树、视口、媒体查询、空闲检测都由
//! 合成环境提供，宿主（或测试）显式驱动。
//!
//! ```text
//! Document ── 插入 ──► HydrationScheduler ── 条件满足 ──► IslandModule::activate
//!                                                             │
//!                                                             ▼
//!                        CustomElements::define ──► connected / disconnected
//!                                                             │
//!                                                             ▼
//!                                         AnimationQueue + effects（滑动 / 乱码）
//! ```
//!
//! 所有状态都是单线程的 `Rc<RefCell<_>>`，异步部分需要在 tokio `LocalSet` 中运行。
//!
//! ## 使用示例
//!
//! ```ignore
//! use island_runtime::{CustomElements, Document, Environment, HydrationScheduler};
//! use island_runtime::widgets::{ClickCountOptions, builtin_registry};
//!
//! let document = Document::new();
//! let elements = CustomElements::new(document.clone());
//! let registry = builtin_registry(&["click-count/index"], &ClickCountOptions::default());
//! let scheduler = HydrationScheduler::new(document.clone(), Environment::default(), registry, elements.clone());
//!
//! local.run_until(async {
//!     let _lifecycle = elements.attach();
//!     let _handle = scheduler.revive();
//!     // ...
//! }).await;
//! ```
//!
//! ## 模块结构
//!
//! - [`dom`]：合成文档树、事件、变更观察
//! - [`environment`]：视口相交、媒体查询、空闲检测
//! - [`elements`]：自定义元素注册表与生命周期
//! - [`registry`]：island 模块注册表与命名约定
//! - [`scheduler`]：惰性激活调度器
//! - [`effects`]：滑动切换、乱码揭示
//! - [`sequencer`]：计数动画序列器
//! - [`widgets`]：内置组件
//! - [`error`]：错误类型定义

pub mod dom;
pub mod effects;
pub mod elements;
pub mod environment;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod sequencer;
pub mod widgets;

// 重导出核心类型
pub use dom::{Document, Event, Fragment, MutationRecord, NodeId};
pub use effects::{ScrambleOptions, SlideDirection, SlideOptions, scramble_text, slide_text};
pub use elements::{CustomElement, CustomElements};
pub use environment::{Environment, EnvironmentOptions};
pub use error::{
    DomError, EffectError, ElementError, GateError, IslandError, IslandResult, ModuleError,
};
pub use registry::{IslandModule, IslandRegistry, ResolvedModule};
pub use scheduler::{Gate, HydrationEvent, HydrationHandle, HydrationScheduler, ProcessedTags};
pub use sequencer::{AnimationQueue, CountingState, Sequencer, SequencerConfig, StepPlan, StepRunner};
