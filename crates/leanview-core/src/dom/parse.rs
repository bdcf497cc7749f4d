#![forbid(unsafe_code)]

//! Lenient markup fragment parser.
//!
//! Content arriving here is trusted, pre-rendered markup, so the parser aims
//! for "never fails, never loses text" rather than full HTML conformance:
//!
//! - a `<` that does not start a well-formed tag stays literal text;
//! - stray closing tags are dropped;
//! - elements still open at end of input are closed implicitly;
//! - comments and doctype declarations are skipped;
//! - `script` and `style` bodies are kept as raw text.

use super::{Document, NodeId};

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Elements that never have children.
#[must_use]
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

enum Token {
    Open {
        tag: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close {
        tag: String,
    },
    Skip,
}

pub(super) fn parse_into(doc: &mut Document, markup: &str) -> Vec<NodeId> {
    let bytes = markup.as_bytes();
    let mut roots = Vec::new();
    let mut stack: Vec<(NodeId, String)> = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }
        let Some((token, end)) = scan_token(markup, pos) else {
            pos += 1;
            continue;
        };
        flush_text(doc, &stack, &mut roots, &markup[text_start..pos]);
        pos = end;
        match token {
            Token::Skip => {}
            Token::Close { tag } => {
                if let Some(depth) = stack.iter().rposition(|(_, open)| *open == tag) {
                    stack.truncate(depth);
                } else {
                    tracing::trace!(message = "dom.parse.stray_close", tag = %tag);
                }
            }
            Token::Open {
                tag,
                attrs,
                self_closing,
            } => {
                let node = doc.create_element(&tag);
                for (name, value) in &attrs {
                    if !doc.has_attr(node, name) {
                        let _ = doc.set_attr(node, name, value);
                    }
                }
                attach(doc, &stack, &mut roots, node);
                if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) && !self_closing {
                    let (body, after) = raw_text_body(markup, pos, &tag);
                    if !body.is_empty() {
                        let text = doc.create_text(body);
                        let _ = doc.append_child(node, text);
                    }
                    pos = after;
                } else if !self_closing && !is_void_element(&tag) {
                    stack.push((node, tag));
                }
            }
        }
        text_start = pos;
    }
    flush_text(doc, &stack, &mut roots, &markup[text_start..]);
    roots
}

fn attach(doc: &mut Document, stack: &[(NodeId, String)], roots: &mut Vec<NodeId>, node: NodeId) {
    match stack.last() {
        Some(&(parent, _)) => {
            if let Err(err) = doc.append_child(parent, node) {
                tracing::debug!(message = "dom.parse.attach_failed", error = %err);
            }
        }
        None => roots.push(node),
    }
}

fn flush_text(doc: &mut Document, stack: &[(NodeId, String)], roots: &mut Vec<NodeId>, text: &str) {
    if text.is_empty() {
        return;
    }
    let node = doc.create_text(text);
    attach(doc, stack, roots, node);
}

fn raw_text_body<'a>(src: &'a str, start: usize, tag: &str) -> (&'a str, usize) {
    let closing = format!("</{tag}");
    let lower = src[start..].to_ascii_lowercase();
    match lower.find(&closing) {
        Some(offset) => {
            let body_end = start + offset;
            let after = src[body_end..]
                .find('>')
                .map_or(src.len(), |gt| body_end + gt + 1);
            (&src[start..body_end], after)
        }
        None => (&src[start..], src.len()),
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

fn scan_token(src: &str, pos: usize) -> Option<(Token, usize)> {
    let rest = &src[pos..];
    if rest.starts_with("<!--") {
        let end = rest[4..].find("-->").map_or(src.len(), |i| pos + 4 + i + 3);
        return Some((Token::Skip, end));
    }
    if rest.starts_with("<!") || rest.starts_with("<?") {
        let end = rest.find('>').map(|i| pos + i + 1)?;
        return Some((Token::Skip, end));
    }
    let bytes = src.as_bytes();
    let mut i = pos + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let tag = src[name_start..i].to_ascii_lowercase();

    if closing {
        let end = src[i..].find('>').map(|gt| i + gt + 1)?;
        return Some((Token::Close { tag }, end));
    }

    let mut attrs = Vec::new();
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match *bytes.get(i)? {
            b'>' => {
                return Some((
                    Token::Open {
                        tag,
                        attrs,
                        self_closing: false,
                    },
                    i + 1,
                ));
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some((
                    Token::Open {
                        tag,
                        attrs,
                        self_closing: true,
                    },
                    i + 2,
                ));
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        if i == attr_start {
            i += 1;
            continue;
        }
        let name = src[attr_start..i].to_ascii_lowercase();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            attrs.push((name, String::new()));
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = match *bytes.get(i)? {
            quote @ (b'"' | b'\'') => {
                let close = src[i + 1..].find(quote as char)? + i + 1;
                let value = &src[i + 1..close];
                i = close + 1;
                value
            }
            _ => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                &src[value_start..i]
            }
        };
        attrs.push((name, value.to_owned()));
    }
}
