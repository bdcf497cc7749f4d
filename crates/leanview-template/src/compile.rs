#![forbid(unsafe_code)]

//! Marker compilation and rendering.
//!
//! Markup is compiled once into a segment tree and rendered any number of
//! times against [`TemplateData`].
//!
//! # Grammar
//!
//! | Marker | Meaning |
//! |--------|---------|
//! | `{{name}}` | interpolate `data[name]`, empty if absent |
//! | `{{#if name}}...{{/if}}` | emit body iff `data[name]` is truthy |
//! | `{{#each name}}...{{/each}}` | emit body once per element of the list `data[name]` |
//!
//! Names are word characters; whitespace inside the braces is ignored.
//!
//! # Invariants
//!
//! 1. A block closes at the nearest closing marker that balances it
//!    (non-greedy): same-kind openers in between raise the depth, so
//!    `{{#if a}}{{#if b}}..{{/if}}..{{/if}}` nests as written.
//! 2. `{{#each}}` bodies see only the element's own mapping.
//! 3. Rendering is pure: same template and data, same bytes.
//!
//! # Failure Modes
//!
//! Malformed markers (unknown keyword, missing name, stray closing marker,
//! block with no closing marker, unterminated `{{`) are emitted as literal
//! text and recorded as [`Malformed`] diagnostics. Compilation never fails.

use std::fmt;

use thiserror::Error;

use crate::value::{TemplateData, Value};

/// Block marker kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    If,
    Each,
}

impl BlockKind {
    const fn keyword(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Each => "each",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "if" => Some(Self::If),
            "each" => Some(Self::Each),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A marker that was rendered as literal text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("unterminated marker at byte {offset}")]
    Unterminated { offset: usize },
    #[error("invalid marker `{marker}` at byte {offset}")]
    Invalid { offset: usize, marker: String },
    #[error("#{block} block `{name}` at byte {offset} is never closed")]
    Unclosed {
        offset: usize,
        block: BlockKind,
        name: String,
    },
    #[error("closing /{block} at byte {offset} has no open block")]
    StrayClose { offset: usize, block: BlockKind },
}

impl Malformed {
    /// Byte offset of the marker in the template source.
    #[must_use]
    pub const fn offset(&self) -> usize {
        match self {
            Self::Unterminated { offset }
            | Self::Invalid { offset, .. }
            | Self::Unclosed { offset, .. }
            | Self::StrayClose { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(String),
    If { name: String, body: Vec<Segment> },
    Each { name: String, body: Vec<Segment> },
}

enum Marker<'a> {
    Var(&'a str),
    Open(BlockKind, &'a str),
    Close(BlockKind),
    Invalid,
}

fn is_name(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn classify(inner: &str) -> Marker<'_> {
    let inner = inner.trim();
    if let Some(rest) = inner.strip_prefix('#') {
        let Some((keyword, name)) = rest.split_once(char::is_whitespace) else {
            return Marker::Invalid;
        };
        let name = name.trim();
        match BlockKind::from_keyword(keyword) {
            Some(kind) if is_name(name) => Marker::Open(kind, name),
            _ => Marker::Invalid,
        }
    } else if let Some(rest) = inner.strip_prefix('/') {
        BlockKind::from_keyword(rest.trim()).map_or(Marker::Invalid, Marker::Close)
    } else if is_name(inner) {
        Marker::Var(inner)
    } else {
        Marker::Invalid
    }
}

/// Start and length of the `{{/kind}}` that balances an opener just
/// before `src`.
fn find_close(src: &str, kind: BlockKind) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut from = 0;
    while let Some(rel) = src[from..].find("{{") {
        let start = from + rel;
        let inner_len = src[start + 2..].find("}}")?;
        let inner = &src[start + 2..start + 2 + inner_len];
        match classify(inner) {
            Marker::Open(k, _) if k == kind => {
                depth += 1;
                from = start + inner_len + 4;
            }
            Marker::Close(k) if k == kind => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, inner_len + 4));
                }
                from = start + inner_len + 4;
            }
            _ => from = start + 2,
        }
    }
    None
}

struct Compiler {
    diagnostics: Vec<Malformed>,
}

impl Compiler {
    fn parse(&mut self, src: &str, base: usize) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut pos = 0;

        while let Some(rel) = src[pos..].find("{{") {
            let start = pos + rel;
            literal.push_str(&src[pos..start]);
            let Some(inner_len) = src[start + 2..].find("}}") else {
                self.diagnostics.push(Malformed::Unterminated {
                    offset: base + start,
                });
                literal.push_str(&src[start..]);
                pos = src.len();
                break;
            };
            let end = start + 2 + inner_len + 2;
            let marker = &src[start..end];
            match classify(&src[start + 2..end - 2]) {
                Marker::Var(name) => {
                    flush(&mut literal, &mut segments);
                    segments.push(Segment::Var(name.to_owned()));
                    pos = end;
                }
                Marker::Open(kind, name) => match find_close(&src[end..], kind) {
                    Some((body_len, close_len)) => {
                        let body = self.parse(&src[end..end + body_len], base + end);
                        flush(&mut literal, &mut segments);
                        let name = name.to_owned();
                        segments.push(match kind {
                            BlockKind::If => Segment::If { name, body },
                            BlockKind::Each => Segment::Each { name, body },
                        });
                        pos = end + body_len + close_len;
                    }
                    None => {
                        self.diagnostics.push(Malformed::Unclosed {
                            offset: base + start,
                            block: kind,
                            name: name.to_owned(),
                        });
                        literal.push_str(marker);
                        pos = end;
                    }
                },
                Marker::Close(block) => {
                    self.diagnostics.push(Malformed::StrayClose {
                        offset: base + start,
                        block,
                    });
                    literal.push_str(marker);
                    pos = end;
                }
                Marker::Invalid => {
                    self.diagnostics.push(Malformed::Invalid {
                        offset: base + start,
                        marker: marker.to_owned(),
                    });
                    // Only the braces are consumed: a valid marker may start
                    // inside the invalid one (`{{ {{name}}`).
                    literal.push_str("{{");
                    pos = start + 2;
                }
            }
        }
        literal.push_str(&src[pos..]);
        flush(&mut literal, &mut segments);
        segments
    }
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
    diagnostics: Vec<Malformed>,
}

impl Template {
    /// Compile `markup`. Never fails; see [`diagnostics`](Self::diagnostics).
    #[must_use]
    pub fn compile(markup: &str) -> Self {
        let mut compiler = Compiler {
            diagnostics: Vec::new(),
        };
        let segments = compiler.parse(markup, 0);
        let mut diagnostics = compiler.diagnostics;
        diagnostics.sort_by_key(Malformed::offset);
        if !diagnostics.is_empty() {
            tracing::debug!(
                message = "template.malformed",
                count = diagnostics.len(),
                first = %diagnostics[0],
            );
        }
        Self {
            segments,
            diagnostics,
        }
    }

    /// Markers that were kept as literal text.
    #[must_use]
    pub fn diagnostics(&self) -> &[Malformed] {
        &self.diagnostics
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Render against `data`.
    #[must_use]
    pub fn render(&self, data: &TemplateData) -> String {
        let mut out = String::new();
        render_into(&self.segments, data, &mut out);
        out
    }
}

fn render_into(segments: &[Segment], data: &TemplateData, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Var(name) => {
                if let Some(value) = data.get(name) {
                    value.write_text(out);
                }
            }
            Segment::If { name, body } => {
                if data.get(name).is_some_and(Value::is_truthy) {
                    render_into(body, data, out);
                }
            }
            Segment::Each { name, body } => match data.get(name) {
                Some(Value::List(items)) => {
                    for item in items {
                        render_into(body, item, out);
                    }
                }
                Some(_) => {
                    tracing::trace!(message = "template.each_not_list", name = %name);
                }
                None => {}
            },
        }
    }
}

/// Compile and render in one step.
#[must_use]
pub fn render(markup: &str, data: &TemplateData) -> String {
    Template::compile(markup).render(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn data() -> TemplateData {
        TemplateData::new()
            .with("topic", "Markets")
            .with("count", 3)
            .with("empty", "")
            .with("on", true)
            .with(
                "items",
                vec![
                    TemplateData::new().with("title", "Rates").with("hot", true),
                    TemplateData::new().with("title", "Oil"),
                ],
            )
    }

    #[test]
    fn interpolation_and_missing_names() {
        assert_eq!(render("<h1>{{topic}}</h1>{{nope}}!", &data()), "<h1>Markets</h1>!");
        assert_eq!(render("{{ topic }} x{{count}}", &data()), "Markets x3");
    }

    #[test]
    fn no_escaping_is_applied() {
        let data = TemplateData::new().with("html", "<b>&amp;</b>");
        assert_eq!(render("{{html}}", &data), "<b>&amp;</b>");
    }

    #[test]
    fn conditionals_remove_whole_block() {
        assert_eq!(render("a{{#if on}}[{{topic}}]{{/if}}b", &data()), "a[Markets]b");
        assert_eq!(render("a{{#if empty}}[{{#each items}}x{{/each}}]{{/if}}b", &data()), "ab");
        assert_eq!(render("a{{#if missing}}x{{/if}}b", &data()), "ab");
    }

    #[test]
    fn each_uses_element_scope_only() {
        let out = render(
            "{{#each items}}<li>{{title}}{{topic}}{{#if hot}}*{{/if}}</li>{{/each}}",
            &data(),
        );
        assert_eq!(out, "<li>Rates*</li><li>Oil</li>");
    }

    #[test]
    fn multi_line_bodies() {
        let markup = "{{#each items}}\n  <p>{{title}}</p>\n{{/each}}";
        assert_eq!(render(markup, &data()), "\n  <p>Rates</p>\n\n  <p>Oil</p>\n");
    }

    #[test]
    fn blocks_close_non_greedily() {
        let markup = "{{#if on}}A{{/if}}-{{#if on}}B{{/if}}";
        assert_eq!(render(markup, &data()), "A-B");

        let template = Template::compile("{{#if on}}x{{#if empty}}y{{/if}}z{{/if}}");
        assert_eq!(template.render(&data()), "xz");
        assert!(template.is_well_formed());
    }

    #[test]
    fn same_kind_blocks_nest() {
        let markup = "{{#if on}}<ul>{{#each items}}<li>{{#if hot}}<b>{{title}}</b>{{/if}}{{#if title}}.{{/if}}</li>{{/each}}</ul>{{/if}}";
        let template = Template::compile(markup);
        assert!(template.is_well_formed(), "{:?}", template.diagnostics());
        assert_eq!(template.render(&data()), "<ul><li><b>Rates</b>.</li><li>.</li></ul>");

        let nested_each = TemplateData::new().with(
            "rows",
            vec![TemplateData::new().with("cells", vec![TemplateData::new().with("v", 1), TemplateData::new().with("v", 2)])],
        );
        assert_eq!(render("{{#each rows}}[{{#each cells}}{{v}}{{/each}}]{{/each}}", &nested_each), "[12]");
    }

    #[test]
    fn unbalanced_outer_block_stays_literal() {
        let template = Template::compile("{{#if on}}x{{#if on}}y{{/if}}");
        assert_eq!(template.render(&data()), "{{#if on}}xy");
        assert_eq!(
            template.diagnostics(),
            &[Malformed::Unclosed {
                offset: 0,
                block: BlockKind::If,
                name: "on".into(),
            }]
        );
    }

    #[test]
    fn each_over_non_list_renders_nothing() {
        assert_eq!(render("[{{#each topic}}x{{/each}}]", &data()), "[]");
        assert_eq!(render("[{{items}}]", &data()), "[]");
    }

    #[test]
    fn malformed_markers_stay_literal() {
        let cases = [
            ("{{#if}}x{{/if}}", "{{#if}}x{{/if}}"),
            ("{{#while on}}x", "{{#while on}}x"),
            ("{{/each}}", "{{/each}}"),
            ("{{#each items}}no close", "{{#each items}}no close"),
            ("{{a b}}", "{{a b}}"),
            ("{{}}", "{{}}"),
            ("tail {{topic", "tail {{topic"),
            ("{{ {{topic}}", "{{ Markets"),
        ];
        for (markup, expected) in cases {
            let template = Template::compile(markup);
            assert_eq!(template.render(&data()), expected, "markup: {markup}");
            assert!(!template.is_well_formed(), "markup: {markup}");
        }
    }

    #[test]
    fn diagnostics_report_offsets() {
        let template = Template::compile("ok {{/if}} {{#each xs}}");
        assert_eq!(
            template.diagnostics(),
            &[
                Malformed::StrayClose { offset: 3, block: BlockKind::If },
                Malformed::Unclosed {
                    offset: 11,
                    block: BlockKind::Each,
                    name: "xs".into(),
                },
            ]
        );
    }

    #[test]
    fn nested_body_offsets_are_absolute() {
        let template = Template::compile("{{#if on}}{{/each}}{{/if}}");
        assert_eq!(template.diagnostics()[0].offset(), 10);
    }

    #[test]
    #[traced_test]
    fn malformed_compile_is_logged() {
        let _ = Template::compile("{{#if x}}");
        assert!(logs_contain("template.malformed"));
    }
}
