//! # Slide 模块
//!
//! 方向滑动切换，支持同一元素上多次重叠调用。
//!
//! ## 结构
//!
//! ```text
//! element
//!  └─ div.slide-container  (position: relative; overflow: hidden)
//!      ├─ div.slide-layer [data-offset=2]   已滑出
//!      ├─ div.slide-layer [data-offset=1]   已滑出
//!      └─ div.slide-layer [data-offset=0]   当前显示
//! ```
//!
//! 每次调用都会：
//!
//! 1. 把已有图层整体推远一格
//! 2. 从前缘插入新图层并滑入
//! 3. 等待自身时长后移除由它推出的图层
//! 4. 若没有其他调用在途，把元素文本写成最新目标值并移除容器
//!
//! 被移除的图层和容器都由本模块创建，移除时直接回收。

use std::time::Duration;

use crate::dom::{Document, NodeId};
use crate::error::{DomError, EffectError};

use super::DEFAULT_SLIDE_SPEED;

/// 容器 class
pub const SLIDE_CONTAINER_CLASS: &str = "slide-container";

const LAYER_CLASS: &str = "slide-layer";
const OFFSET_KEY: &str = "offset";
const IN_FLIGHT_KEY: &str = "in-flight";
const TARGET_KEY: &str = "target";

/// 滑动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideDirection {
    /// 新文本自下而上进入
    #[default]
    Up,
    /// 新文本自上而下进入
    Down,
}

impl SlideDirection {
    /// 给定偏移的 transform 值（0 为可见位置，负数为前缘，正数为已滑出）
    fn transform(self, offset: i64) -> String {
        let percent = match self {
            Self::Up => -offset * 100,
            Self::Down => offset * 100,
        };
        format!("translateY({percent}%)")
    }
}

/// 滑动选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideOptions {
    /// 过渡时长
    pub speed: Duration,
    /// 方向
    pub direction: SlideDirection,
}

impl Default for SlideOptions {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SLIDE_SPEED,
            direction: SlideDirection::Up,
        }
    }
}

impl SlideOptions {
    /// 指定时长，方向向上
    pub fn with_speed(speed: Duration) -> Self {
        Self {
            speed,
            ..Self::default()
        }
    }
}

/// 滑动切换元素文本
///
/// 在自身时长结束后返回，与其他在途图层无关。
pub async fn slide_text(
    document: &Document,
    element: NodeId,
    new_text: &str,
    options: SlideOptions,
) -> Result<(), EffectError> {
    if !document.is_connected(element) || !document.is_element(element) {
        return Ok(());
    }

    let container = match find_container(document, element) {
        Some(container) => container,
        None => open_container(document, element, options.direction)?,
    };

    let previous = layers(document, container);
    for layer in &previous {
        let offset = layer_offset(document, *layer) + 1;
        set_layer_offset(document, *layer, offset, options.direction)?;
    }

    let layer = document.create_element("div");
    document.add_class(layer, LAYER_CLASS)?;
    document.set_style(layer, "position", "absolute")?;
    document.set_style(layer, "width", "100%")?;
    document.set_style(
        layer,
        "transition",
        &format!("transform {}ms ease-in-out", options.speed.as_millis()),
    )?;
    document.set_text_content(layer, new_text)?;
    set_layer_offset(document, layer, -1, options.direction)?;
    document.append_child(container, layer)?;
    set_layer_offset(document, layer, 0, options.direction)?;

    document.set_data(container, TARGET_KEY, new_text)?;
    let in_flight = counter(document, container, IN_FLIGHT_KEY) + 1;
    document.set_data(container, IN_FLIGHT_KEY, &in_flight.to_string())?;

    tokio::time::sleep(options.speed).await;

    // 容器已被清理或元素已断开
    if !document.is_connected(container) || document.parent(container) != Some(element) {
        return Ok(());
    }

    for layer in previous {
        if document.parent(layer) == Some(container) {
            document.release(layer);
        }
    }

    let remaining = counter(document, container, IN_FLIGHT_KEY).saturating_sub(1);
    if remaining == 0 {
        let target = document
            .data(container, TARGET_KEY)
            .unwrap_or_else(|| new_text.to_string());
        document.release(container);
        document.set_text_content(element, &target)?;
    } else {
        document.set_data(container, IN_FLIGHT_KEY, &remaining.to_string())?;
    }
    Ok(())
}

/// 移除已完全滑出的图层，返回移除数量
pub fn sweep_exited_layers(document: &Document, element: NodeId) -> Result<usize, DomError> {
    let Some(container) = find_container(document, element) else {
        return Ok(0);
    };
    let mut removed = 0;
    for layer in layers(document, container) {
        if layer_offset(document, layer) >= 1 && document.release(layer) {
            removed += 1;
        }
    }
    Ok(removed)
}

/// 移除滑动容器并写入最终文本
pub fn clear_slide_artifacts(
    document: &Document,
    element: NodeId,
    final_text: &str,
) -> Result<(), DomError> {
    while let Some(container) = find_container(document, element) {
        document.release(container);
    }
    document.set_text_content(element, final_text)
}

fn find_container(document: &Document, element: NodeId) -> Option<NodeId> {
    document
        .element_children(element)
        .into_iter()
        .find(|child| document.has_class(*child, SLIDE_CONTAINER_CLASS))
}

/// 创建容器，并把当前文本作为第一个图层
fn open_container(
    document: &Document,
    element: NodeId,
    direction: SlideDirection,
) -> Result<NodeId, DomError> {
    let current = document.text_content(element);

    let container = document.create_element("div");
    document.add_class(container, SLIDE_CONTAINER_CLASS)?;
    document.set_style(container, "position", "relative")?;
    document.set_style(container, "overflow", "hidden")?;

    let layer = document.create_element("div");
    document.add_class(layer, LAYER_CLASS)?;
    document.set_style(layer, "position", "absolute")?;
    document.set_style(layer, "width", "100%")?;
    document.set_text_content(layer, &current)?;
    set_layer_offset(document, layer, 0, direction)?;
    document.append_child(container, layer)?;

    document.set_text_content(element, "")?;
    document.append_child(element, container)?;
    Ok(container)
}

fn layers(document: &Document, container: NodeId) -> Vec<NodeId> {
    document
        .element_children(container)
        .into_iter()
        .filter(|child| document.has_class(*child, LAYER_CLASS))
        .collect()
}

fn layer_offset(document: &Document, layer: NodeId) -> i64 {
    document
        .data(layer, OFFSET_KEY)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn set_layer_offset(
    document: &Document,
    layer: NodeId,
    offset: i64,
    direction: SlideDirection,
) -> Result<(), DomError> {
    document.set_data(layer, OFFSET_KEY, &offset.to_string())?;
    document.set_style(layer, "transform", &direction.transform(offset))
}

fn counter(document: &Document, node: NodeId, key: &str) -> u32 {
    document
        .data(node, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Fragment;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    fn display(doc: &Document) -> NodeId {
        doc.insert_fragment(
            doc.body(),
            &Fragment::element("span")
                .attr("data-click-count", "")
                .child(Fragment::text("00")),
        )
        .unwrap()
    }

    fn layer_texts(doc: &Document, element: NodeId) -> Vec<String> {
        let container = find_container(doc, element).unwrap();
        layers(doc, container)
            .into_iter()
            .map(|layer| doc.text_content(layer))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_slide_settles_on_text() {
        let doc = Document::new();
        let el = display(&doc);
        slide_text(&doc, el, "01", SlideOptions::with_speed(Duration::from_millis(60)))
            .await
            .unwrap();
        assert_eq!(doc.text_content(el), "01");
        assert!(find_container(&doc, el).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_slides_stack_layers() {
        LocalSet::new()
            .run_until(async {
                let doc = Document::new();
                let el = display(&doc);
                let fast = SlideOptions::with_speed(Duration::from_millis(60));

                let first = tokio::task::spawn_local({
                    let doc = doc.clone();
                    async move { slide_text(&doc, el, "01", fast).await }
                });
                sleep(Duration::from_millis(30)).await;
                let second = tokio::task::spawn_local({
                    let doc = doc.clone();
                    async move { slide_text(&doc, el, "02", fast).await }
                });

                sleep(Duration::from_millis(15)).await;
                assert_eq!(layer_texts(&doc, el), vec!["00", "01", "02"]);
                let container = find_container(&doc, el).unwrap();
                let top = layers(&doc, container)[0];
                assert_eq!(doc.style(top, "transform").as_deref(), Some("translateY(-200%)"));

                sleep(Duration::from_millis(30)).await;
                first.await.unwrap().unwrap();
                assert_eq!(layer_texts(&doc, el), vec!["01", "02"]);

                second.await.unwrap().unwrap();
                assert_eq!(doc.text_content(el), "02");
                assert!(find_container(&doc, el).is_none());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_slides_reclaim_nodes() {
        LocalSet::new()
            .run_until(async {
                let doc = Document::new();
                let el = display(&doc);
                let baseline = doc.node_count();
                let fast = SlideOptions::with_speed(Duration::from_millis(20));

                for round in 0..50u64 {
                    let tasks: Vec<_> = (0..3)
                        .map(|i| {
                            let doc = doc.clone();
                            let text = format!("{:02}", round * 3 + i);
                            tokio::task::spawn_local(async move {
                                slide_text(&doc, el, &text, fast).await
                            })
                        })
                        .collect();
                    for task in tasks {
                        task.await.unwrap().unwrap();
                    }
                    assert!(find_container(&doc, el).is_none());
                    assert_eq!(doc.node_count(), baseline);
                }
                assert_eq!(doc.text_content(el), "149");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slide_on_detached_element_is_noop() {
        let doc = Document::new();
        let el = doc.create_element("span");
        slide_text(&doc, el, "01", SlideOptions::default())
            .await
            .unwrap();
        assert_eq!(doc.text_content(el), "");
        assert!(doc.children(el).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_artifacts_mid_slide() {
        LocalSet::new()
            .run_until(async {
                let doc = Document::new();
                let el = display(&doc);
                let task = tokio::task::spawn_local({
                    let doc = doc.clone();
                    async move {
                        slide_text(&doc, el, "01", SlideOptions::with_speed(Duration::from_millis(60)))
                            .await
                    }
                });
                sleep(Duration::from_millis(10)).await;
                clear_slide_artifacts(&doc, el, "05").unwrap();
                task.await.unwrap().unwrap();

                assert_eq!(doc.text_content(el), "05");
                assert!(find_container(&doc, el).is_none());
            })
            .await;
    }

    #[test]
    fn test_sweep_removes_only_exited_layers() {
        let doc = Document::new();
        let el = display(&doc);
        let container = open_container(&doc, el, SlideDirection::Down).unwrap();
        let fresh = doc.create_element("div");
        doc.add_class(fresh, LAYER_CLASS).unwrap();
        doc.append_child(container, fresh).unwrap();
        let old = layers(&doc, container)[0];
        set_layer_offset(&doc, old, 1, SlideDirection::Down).unwrap();
        assert_eq!(doc.style(old, "transform").as_deref(), Some("translateY(100%)"));

        assert_eq!(sweep_exited_layers(&doc, el).unwrap(), 1);
        assert_eq!(layers(&doc, container), vec![fresh]);
    }
}
