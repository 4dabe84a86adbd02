//! # Markup 模块
//!
//! 把子树序列化成 HTML 风格的字符串，用于输出报告和快照测试。

use super::{Document, NodeId, NodeKind, Tree};

impl Document {
    /// 序列化节点（含自身）
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        write_node(&self.tree.borrow(), node, &mut out);
        out
    }

    /// 序列化子节点（不含自身）
    pub fn inner_markup(&self, node: NodeId) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        if let Some(data) = tree.get(node) {
            for child in &data.children {
                write_node(&tree, *child, &mut out);
            }
        }
        out
    }
}

fn write_node(tree: &Tree, node: NodeId, out: &mut String) {
    let Some(data) = tree.get(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Text(text) => escape_into(text, false, out),
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            if !element.styles.is_empty() {
                let style = element
                    .styles
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                out.push_str(" style=\"");
                escape_into(&style, true, out);
                out.push('"');
            }
            out.push('>');
            for child in &data.children {
                write_node(tree, *child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
