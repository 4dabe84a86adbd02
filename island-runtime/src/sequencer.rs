//! # Sequencer 模块
//!
//! 计数动画序列器：每个组件一条严格串行的 FIFO 队列。
//!
//! ## 设计说明
//!
//! - [`Sequencer`] 是纯状态机，不涉及计时与 DOM，便于单独测试
//! - [`AnimationQueue`] 用单个 worker 任务驱动状态机，步骤的具体表现由 [`StepRunner`] 决定
//! - 非最后一步使用快速时长，最后一步使用正常时长，连续点击时显示能快速追上
//! - 最后一步完成后等待稳定延迟才回到空闲；期间若有新触发，旧的稳定计划作废（epoch 不匹配）
//! - 步骤失败时清空队列、待播数归零、回到空闲；计数本身保留
//!
//! ```text
//! trigger ─► count+1, pending+1, Counting ─► 入队
//!                                             │
//!   worker: next_step ─► run_step ─► complete_step ─► (pending == 0) settle(epoch) ─► Idle
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error};

use crate::effects::pad_count;
use crate::error::EffectError;

/// 计数状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountingState {
    /// 空闲
    #[default]
    Idle,
    /// 有动画待播或尚未稳定
    Counting,
}

impl CountingState {
    /// 对应的 `data-counting` 属性值
    pub fn as_attr(&self) -> &'static str {
        match self {
            Self::Idle => "false",
            Self::Counting => "true",
        }
    }
}

/// 序列器时长配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    /// 非最后一步的时长
    pub fast: Duration,
    /// 最后一步的时长
    pub normal: Duration,
    /// 最后一步完成后回到空闲前的延迟
    pub settle: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            fast: Duration::from_millis(60),
            normal: Duration::from_millis(200),
            settle: Duration::from_millis(300),
        }
    }
}

/// 一次触发的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    /// 触发后的计数
    pub count: u64,
    /// 是否需要启动 worker
    pub spawn_worker: bool,
}

/// 一个待执行步骤
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    /// 步骤序号（从 1 开始，单调递增）
    pub ticket: u64,
    /// 要显示的文本（两位补零）
    pub text: String,
    /// 过渡时长
    pub speed: Duration,
    /// 是否为当前最后一步
    pub is_last: bool,
}

/// 稳定计划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePlan {
    /// 延迟
    pub delay: Duration,
    /// 计划生成时的触发 epoch
    pub epoch: u64,
}

/// 序列器状态机
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    config: SequencerConfig,
    count: u64,
    pending: u64,
    /// 入队时捕获的计数
    queue: VecDeque<u64>,
    state: CountingState,
    worker_active: bool,
    epoch: u64,
    next_ticket: u64,
}

impl Sequencer {
    /// 创建序列器
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    // ========== 查询 ==========

    /// 当前计数
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 待播动画数
    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// 计数状态
    pub fn state(&self) -> CountingState {
        self.state
    }

    /// worker 是否在运行
    pub fn is_worker_active(&self) -> bool {
        self.worker_active
    }

    /// 时长配置
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    // ========== 状态转换 ==========

    /// 触发一次：计数与待播数加一，进入计数状态，入队一步
    pub fn on_trigger(&mut self) -> Trigger {
        self.count += 1;
        self.pending += 1;
        self.state = CountingState::Counting;
        self.epoch += 1;
        self.queue.push_back(self.count);

        let spawn_worker = !self.worker_active;
        self.worker_active = true;
        Trigger {
            count: self.count,
            spawn_worker,
        }
    }

    /// 取出下一步；队列为空时 worker 结束
    pub fn next_step(&mut self) -> Option<StepPlan> {
        let Some(captured) = self.queue.pop_front() else {
            self.worker_active = false;
            return None;
        };

        let is_last = self.pending == 1;
        self.pending = self.pending.saturating_sub(1);
        self.next_ticket += 1;

        Some(StepPlan {
            ticket: self.next_ticket,
            text: pad_count(captured),
            speed: if is_last {
                self.config.normal
            } else {
                self.config.fast
            },
            is_last,
        })
    }

    /// 步骤完成；待播数归零时返回稳定计划
    pub fn complete_step(&self) -> Option<SettlePlan> {
        (self.pending == 0).then_some(SettlePlan {
            delay: self.config.settle,
            epoch: self.epoch,
        })
    }

    /// 执行稳定计划，返回是否回到空闲
    pub fn settle(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.pending != 0 || self.state == CountingState::Idle {
            return false;
        }
        self.state = CountingState::Idle;
        true
    }

    /// 步骤失败后重置：清空队列，待播数归零，回到空闲（计数保留）
    pub fn reset(&mut self) {
        self.queue.clear();
        self.pending = 0;
        self.state = CountingState::Idle;
        self.worker_active = false;
        self.epoch += 1;
    }
}

/// 步骤执行器
pub trait StepRunner {
    /// 执行一步（通常是滑动切换显示文本）
    fn run_step(&self, plan: &StepPlan) -> impl Future<Output = Result<(), EffectError>>;

    /// 计数状态变化
    fn counting_changed(&self, state: CountingState);
}

struct QueueInner<R> {
    sequencer: RefCell<Sequencer>,
    runner: R,
}

/// 异步动画队列
///
/// 克隆得到的句柄共享同一队列。必须在 `LocalSet` 中使用。
pub struct AnimationQueue<R> {
    inner: Rc<QueueInner<R>>,
}

impl<R> Clone for AnimationQueue<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: StepRunner + 'static> AnimationQueue<R> {
    /// 创建队列
    pub fn new(config: SequencerConfig, runner: R) -> Self {
        Self {
            inner: Rc::new(QueueInner {
                sequencer: RefCell::new(Sequencer::new(config)),
                runner,
            }),
        }
    }

    /// 步骤执行器
    pub fn runner(&self) -> &R {
        &self.inner.runner
    }

    /// 当前计数
    pub fn count(&self) -> u64 {
        self.inner.sequencer.borrow().count()
    }

    /// 待播动画数
    pub fn pending(&self) -> u64 {
        self.inner.sequencer.borrow().pending()
    }

    /// 计数状态
    pub fn state(&self) -> CountingState {
        self.inner.sequencer.borrow().state()
    }

    /// 触发一次，返回新的计数
    pub fn trigger(&self) -> u64 {
        let (trigger, was_idle) = {
            let mut sequencer = self.inner.sequencer.borrow_mut();
            let was_idle = sequencer.state() == CountingState::Idle;
            (sequencer.on_trigger(), was_idle)
        };
        if was_idle {
            self.inner.runner.counting_changed(CountingState::Counting);
        }
        if trigger.spawn_worker {
            let inner = self.inner.clone();
            tokio::task::spawn_local(async move { inner.drain().await });
        }
        trigger.count
    }
}

impl<R: StepRunner + 'static> QueueInner<R> {
    /// worker：逐个执行步骤直到队列为空
    async fn drain(self: Rc<Self>) {
        loop {
            let Some(plan) = self.sequencer.borrow_mut().next_step() else {
                break;
            };
            debug!(ticket = plan.ticket, text = %plan.text, last = plan.is_last, "执行动画步骤");

            if let Err(e) = self.runner.run_step(&plan).await {
                error!(ticket = plan.ticket, error = %e, "动画步骤失败，重置队列");
                self.sequencer.borrow_mut().reset();
                self.runner.counting_changed(CountingState::Idle);
                break;
            }

            let settle = self.sequencer.borrow().complete_step();
            if let Some(settle) = settle {
                let inner = self.clone();
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(settle.delay).await;
                    let settled = inner.sequencer.borrow_mut().settle(settle.epoch);
                    if settled {
                        inner.runner.counting_changed(CountingState::Idle);
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    fn config() -> SequencerConfig {
        SequencerConfig {
            fast: Duration::from_millis(10),
            normal: Duration::from_millis(50),
            settle: Duration::from_millis(100),
        }
    }

    #[derive(Default)]
    struct Recorder {
        steps: RefCell<Vec<StepPlan>>,
        states: RefCell<Vec<CountingState>>,
        fail_on: Option<u64>,
    }

    impl StepRunner for Rc<Recorder> {
        async fn run_step(&self, plan: &StepPlan) -> Result<(), EffectError> {
            self.steps.borrow_mut().push(plan.clone());
            tokio::time::sleep(plan.speed).await;
            if self.fail_on == Some(plan.ticket) {
                return Err(EffectError::Interrupted {
                    reason: "display missing".to_string(),
                });
            }
            Ok(())
        }

        fn counting_changed(&self, state: CountingState) {
            self.states.borrow_mut().push(state);
        }
    }

    fn texts(recorder: &Recorder) -> Vec<String> {
        recorder.steps.borrow().iter().map(|s| s.text.clone()).collect()
    }

    // ========== 纯状态机 ==========

    #[test]
    fn test_pending_tracks_triggers_minus_started_steps() {
        let mut seq = Sequencer::new(config());
        for _ in 0..5 {
            seq.on_trigger();
        }
        assert_eq!(seq.pending(), 5);
        seq.next_step();
        seq.next_step();
        assert_eq!(seq.pending(), 3);
        while seq.next_step().is_some() {}
        assert_eq!(seq.pending(), 0);
        assert!(seq.next_step().is_none());
        assert_eq!(seq.pending(), 0);
        assert!(!seq.is_worker_active());
    }

    #[test]
    fn test_three_rapid_triggers_plan() {
        let mut seq = Sequencer::new(config());
        assert!(seq.on_trigger().spawn_worker);
        assert!(!seq.on_trigger().spawn_worker);
        assert!(!seq.on_trigger().spawn_worker);

        let plans: Vec<_> = std::iter::from_fn(|| seq.next_step())
            .map(|p| (p.text, p.speed, p.is_last))
            .collect();
        assert_eq!(
            plans,
            vec![
                ("01".to_string(), Duration::from_millis(10), false),
                ("02".to_string(), Duration::from_millis(10), false),
                ("03".to_string(), Duration::from_millis(50), true),
            ]
        );
    }

    #[test]
    fn test_stale_settle_is_ignored() {
        let mut seq = Sequencer::new(config());
        seq.on_trigger();
        seq.next_step();
        let settle = seq.complete_step().unwrap();
        seq.on_trigger();
        assert!(!seq.settle(settle.epoch));
        assert_eq!(seq.state(), CountingState::Counting);
    }

    #[test]
    fn test_reset_preserves_count() {
        let mut seq = Sequencer::new(config());
        seq.on_trigger();
        seq.on_trigger();
        seq.reset();
        assert_eq!(seq.count(), 2);
        assert_eq!(seq.pending(), 0);
        assert_eq!(seq.state(), CountingState::Idle);
        assert!(seq.next_step().is_none());
        assert!(seq.on_trigger().spawn_worker);
    }

    // ========== 异步队列 ==========

    #[tokio::test(start_paused = true)]
    async fn test_queue_runs_fifo_and_settles() {
        LocalSet::new()
            .run_until(async {
                let recorder = Rc::new(Recorder::default());
                let queue = AnimationQueue::new(config(), recorder.clone());

                queue.trigger();
                queue.trigger();
                sleep(Duration::from_millis(5)).await;
                // 第一步进行中再触发一次
                queue.trigger();
                assert_eq!(queue.pending(), 2);

                sleep(Duration::from_millis(100)).await;
                assert_eq!(texts(&recorder), vec!["01", "02", "03"]);
                let last: Vec<_> = recorder.steps.borrow().iter().map(|s| s.is_last).collect();
                assert_eq!(last, vec![false, false, true]);
                assert_eq!(queue.state(), CountingState::Counting);

                sleep(Duration::from_millis(100)).await;
                assert_eq!(queue.state(), CountingState::Idle);
                assert_eq!(
                    *recorder.states.borrow(),
                    vec![CountingState::Counting, CountingState::Idle]
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_during_settle_keeps_counting() {
        LocalSet::new()
            .run_until(async {
                let recorder = Rc::new(Recorder::default());
                let queue = AnimationQueue::new(config(), recorder.clone());

                queue.trigger();
                sleep(Duration::from_millis(80)).await;
                // 第一步已完成，稳定延迟进行中
                queue.trigger();
                sleep(Duration::from_millis(80)).await;
                // 旧的稳定计划已过期
                assert_eq!(queue.state(), CountingState::Counting);

                sleep(Duration::from_millis(100)).await;
                assert_eq!(queue.state(), CountingState::Idle);
                assert_eq!(texts(&recorder), vec!["01", "02"]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_resets_queue() {
        LocalSet::new()
            .run_until(async {
                let recorder = Rc::new(Recorder {
                    fail_on: Some(2),
                    ..Recorder::default()
                });
                let queue = AnimationQueue::new(config(), recorder.clone());

                for _ in 0..4 {
                    queue.trigger();
                }
                sleep(Duration::from_millis(100)).await;

                assert_eq!(texts(&recorder), vec!["01", "02"]);
                assert_eq!(queue.pending(), 0);
                assert_eq!(queue.state(), CountingState::Idle);
                assert_eq!(queue.count(), 4);

                queue.trigger();
                sleep(Duration::from_millis(100)).await;
                assert_eq!(texts(&recorder), vec!["01", "02", "05"]);
            })
            .await;
    }
}
