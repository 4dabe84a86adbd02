//! # Scramble 模块
//!
//! 乱码揭示特效。
//!
//! 元素内容被替换为两部分：
//!
//! - `span.sr-only`：立即包含目标文本，供辅助技术读取
//! - `span.not-sr-only[aria-hidden=true]`：逐帧播放乱码动画
//!
//! 非字母数字字符（空格、标点）在每一帧都保持原样。

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Instant, MissedTickBehavior};

use crate::dom::{Document, NodeId};
use crate::error::EffectError;

use super::{DEFAULT_SCRAMBLE_SPEED, FRAME_INTERVAL};

/// 乱码字符表
pub const SCRAMBLE_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*+-{}[]<>?";

/// 乱码选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrambleOptions {
    /// 揭示时长（`permanent` 时忽略）
    pub speed: Duration,
    /// 持续乱码，直到元素断开
    pub permanent: bool,
    /// 随机种子，`None` 时使用系统熵
    pub seed: Option<u64>,
}

impl Default for ScrambleOptions {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SCRAMBLE_SPEED,
            permanent: false,
            seed: None,
        }
    }
}

impl ScrambleOptions {
    /// 指定时长的一次性揭示
    pub fn with_speed(speed: Duration) -> Self {
        Self {
            speed,
            ..Self::default()
        }
    }
}

/// 乱码揭示元素文本
///
/// 非持续模式在 `speed` 之后把元素纯文本设为 `new_text` 并返回；
/// 持续模式在元素断开之前不会返回，调用方不应等待它完成。
pub async fn scramble_text(
    document: &Document,
    element: NodeId,
    new_text: &str,
    options: ScrambleOptions,
) -> Result<(), EffectError> {
    if !document.is_connected(element) || !document.is_element(element) {
        return Ok(());
    }

    let current = document.text_content(element);

    let sr_only = document.create_element("span");
    document.add_class(sr_only, "sr-only")?;
    document.set_text_content(sr_only, new_text)?;

    let visual = document.create_element("span");
    document.add_class(visual, "not-sr-only")?;
    document.set_attribute(visual, "aria-hidden", "true")?;
    document.set_text_content(visual, &current)?;

    document.set_text_content(element, "")?;
    document.append_children(element, &[sr_only, visual])?;

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let start = Instant::now();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        frames.tick().await;
        if !document.is_connected(element) {
            return Ok(());
        }

        if options.permanent {
            document.set_text_content(visual, &scramble_frame(&current, 0.0, &mut rng))?;
            continue;
        }

        let progress = if options.speed.is_zero() {
            1.0
        } else {
            start.elapsed().as_secs_f64() / options.speed.as_secs_f64()
        };
        if progress >= 1.0 {
            document.release(sr_only);
            document.release(visual);
            document.set_text_content(element, new_text)?;
            return Ok(());
        }
        document.set_text_content(visual, &scramble_frame(new_text, progress, &mut rng))?;
    }
}

/// 生成一帧乱码
///
/// 进度超过一半后，每个字符以 `(progress - 0.5) * 2` 的概率显示原字符。
pub fn scramble_frame(target: &str, progress: f64, rng: &mut impl Rng) -> String {
    let alphabet = SCRAMBLE_CHARS.as_bytes();
    let reveal = ((progress - 0.5) * 2.0).clamp(0.0, 1.0);
    target
        .chars()
        .map(|c| {
            if !c.is_ascii_alphanumeric() {
                return c;
            }
            if progress > 0.5 && rng.gen_bool(reveal) {
                c
            } else {
                alphabet[rng.gen_range(0..alphabet.len())] as char
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Fragment;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    fn label(doc: &Document, text: &str) -> NodeId {
        doc.insert_fragment(
            doc.body(),
            &Fragment::element("span")
                .attr("data-activated-text", "")
                .child(Fragment::text(text)),
        )
        .unwrap()
    }

    #[test]
    fn test_frame_preserves_punctuation_and_spaces() {
        let mut rng = StdRng::seed_from_u64(7);
        for progress in [0.0, 0.3, 0.7, 0.99] {
            let frame = scramble_frame("Hi, there!", progress, &mut rng);
            assert_eq!(frame.chars().count(), 10);
            assert_eq!(frame.chars().nth(2), Some(','));
            assert_eq!(frame.chars().nth(3), Some(' '));
            assert_eq!(frame.chars().nth(9), Some('!'));
            assert!(
                frame
                    .chars()
                    .all(|c| SCRAMBLE_CHARS.contains(c) || ", !".contains(c) || c.is_ascii_alphanumeric())
            );
        }
    }

    #[test]
    fn test_frame_fully_revealed_at_end() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(scramble_frame("Activated", 1.0, &mut rng), "Activated");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_sets_exact_text() {
        let doc = Document::new();
        let el = label(&doc, "Get Started");
        let start = Instant::now();
        scramble_text(
            &doc,
            el,
            "Activated",
            ScrambleOptions {
                speed: Duration::from_millis(500),
                permanent: false,
                seed: Some(42),
            },
        )
        .await
        .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(500));
        assert_eq!(doc.text_content(el), "Activated");
        assert_eq!(doc.children(el).len(), 1);
        assert!(doc.query_selector(el, ".sr-only").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_keeps_accessible_text_while_running() {
        LocalSet::new()
            .run_until(async {
                let doc = Document::new();
                let el = label(&doc, "00");
                let task = tokio::task::spawn_local({
                    let doc = doc.clone();
                    async move {
                        scramble_text(&doc, el, "Activated", ScrambleOptions::with_speed(Duration::from_millis(500)))
                            .await
                    }
                });
                sleep(Duration::from_millis(100)).await;

                let sr_only = doc.query_selector(el, ".sr-only").unwrap();
                assert_eq!(doc.text_content(sr_only), "Activated");
                let visual = doc.query_selector(el, ".not-sr-only").unwrap();
                assert_eq!(doc.get_attribute(visual, "aria-hidden").as_deref(), Some("true"));
                assert_eq!(doc.text_content(visual).chars().count(), 9);

                task.await.unwrap().unwrap();
                assert_eq!(doc.text_content(el), "Activated");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_scramble_keeps_node_count_flat() {
        LocalSet::new()
            .run_until(async {
                let doc = Document::new();
                let el = label(&doc, "LOADING");
                tokio::task::spawn_local({
                    let doc = doc.clone();
                    async move {
                        let options = ScrambleOptions {
                            permanent: true,
                            seed: Some(11),
                            ..ScrambleOptions::default()
                        };
                        scramble_text(&doc, el, "LOADING", options).await
                    }
                });
                sleep(FRAME_INTERVAL * 2).await;
                let visual = doc.query_selector(el, ".not-sr-only").unwrap();
                let running = doc.node_count();
                let first = doc.text_content(visual);

                sleep(Duration::from_secs(60)).await;
                assert_eq!(doc.node_count(), running);
                assert_eq!(doc.children(visual).len(), 1);
                assert_ne!(doc.text_content(visual), first);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_reclaims_scramble_spans() {
        let doc = Document::new();
        let el = label(&doc, "00");
        let baseline = doc.node_count();
        for _ in 0..5 {
            scramble_text(&doc, el, "Activated", ScrambleOptions::with_speed(Duration::from_millis(50)))
                .await
                .unwrap();
        }
        assert_eq!(doc.text_content(el), "Activated");
        assert_eq!(doc.node_count(), baseline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_stops_when_detached() {
        LocalSet::new()
            .run_until(async {
                let doc = Document::new();
                let el = label(&doc, "LOADING");
                let task = tokio::task::spawn_local({
                    let doc = doc.clone();
                    async move {
                        let options = ScrambleOptions {
                            permanent: true,
                            seed: Some(3),
                            ..ScrambleOptions::default()
                        };
                        scramble_text(&doc, el, "LOADING", options).await
                    }
                });
                sleep(Duration::from_secs(2)).await;
                assert!(!task.is_finished());

                doc.remove(el).unwrap();
                sleep(FRAME_INTERVAL * 2).await;
                assert!(task.is_finished());
                task.await.unwrap().unwrap();
            })
            .await;
    }
}
