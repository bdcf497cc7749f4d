#![forbid(unsafe_code)]

//! Markup serialization.

use super::parse::is_void_element;
use super::{Document, NodeId, NodeKind};

pub(super) fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        Some(NodeKind::Text(text)) => out.push_str(text),
        Some(NodeKind::Element(el)) => {
            out.push('<');
            out.push_str(el.tag());
            for (name, value) in el.attrs() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                push_attr_value(value, out);
                out.push('"');
            }
            out.push('>');
            if is_void_element(el.tag()) {
                return;
            }
            for &child in doc.children(node) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(el.tag());
            out.push('>');
        }
        None => {}
    }
}

fn push_attr_value(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
