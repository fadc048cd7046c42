//! Prismic structured text: the block/span model and its text and HTML renderings.
//!
//! Span offsets are expressed in UTF-16 code units, the way the CMS counts them.

use std::fmt::Write as _;

use serde::Deserialize;

/// A single structured-text block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum RichTextNode {
    #[serde(rename = "heading1")]
    Heading1(TextBlock),
    #[serde(rename = "heading2")]
    Heading2(TextBlock),
    #[serde(rename = "heading3")]
    Heading3(TextBlock),
    #[serde(rename = "heading4")]
    Heading4(TextBlock),
    #[serde(rename = "heading5")]
    Heading5(TextBlock),
    #[serde(rename = "heading6")]
    Heading6(TextBlock),
    #[serde(rename = "paragraph")]
    Paragraph(TextBlock),
    #[serde(rename = "preformatted")]
    Preformatted(TextBlock),
    #[serde(rename = "list-item")]
    ListItem(TextBlock),
    #[serde(rename = "o-list-item")]
    OrderedListItem(TextBlock),
    #[serde(rename = "image")]
    Image(ImageBlock),
    #[serde(rename = "embed")]
    Embed(EmbedBlock),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl TextBlock {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageBlock {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbedBlock {
    #[serde(default)]
    pub oembed: Option<Oembed>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Oembed {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
}

/// Inline formatting applied to `[start, end)` of a block's text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SpanData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl RichTextNode {
    fn text_block(&self) -> Option<&TextBlock> {
        match self {
            RichTextNode::Heading1(block)
            | RichTextNode::Heading2(block)
            | RichTextNode::Heading3(block)
            | RichTextNode::Heading4(block)
            | RichTextNode::Heading5(block)
            | RichTextNode::Heading6(block)
            | RichTextNode::Paragraph(block)
            | RichTextNode::Preformatted(block)
            | RichTextNode::ListItem(block)
            | RichTextNode::OrderedListItem(block) => Some(block),
            RichTextNode::Image(_) | RichTextNode::Embed(_) | RichTextNode::Unsupported => None,
        }
    }
}

/// Concatenate the text of every text-bearing block, separated by a single space.
pub fn as_text(nodes: &[RichTextNode]) -> String {
    nodes
        .iter()
        .filter_map(RichTextNode::text_block)
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render blocks to sanitized HTML.
pub fn as_html(nodes: &[RichTextNode]) -> String {
    let mut html = String::new();
    let mut open_list: Option<&'static str> = None;

    for node in nodes {
        let list_tag = match node {
            RichTextNode::ListItem(_) => Some("ul"),
            RichTextNode::OrderedListItem(_) => Some("ol"),
            _ => None,
        };

        if open_list != list_tag {
            if let Some(tag) = open_list {
                let _ = write!(html, "</{tag}>");
            }
            if let Some(tag) = list_tag {
                let _ = write!(html, "<{tag}>");
            }
            open_list = list_tag;
        }

        render_node(node, &mut html);
    }

    if let Some(tag) = open_list {
        let _ = write!(html, "</{tag}>");
    }

    sanitize(&html)
}

fn render_node(node: &RichTextNode, out: &mut String) {
    let tag = match node {
        RichTextNode::Heading1(_) => "h1",
        RichTextNode::Heading2(_) => "h2",
        RichTextNode::Heading3(_) => "h3",
        RichTextNode::Heading4(_) => "h4",
        RichTextNode::Heading5(_) => "h5",
        RichTextNode::Heading6(_) => "h6",
        RichTextNode::Paragraph(_) => "p",
        RichTextNode::Preformatted(_) => "pre",
        RichTextNode::ListItem(_) | RichTextNode::OrderedListItem(_) => "li",
        RichTextNode::Image(image) => {
            let alt = image.alt.as_deref().unwrap_or_default();
            let _ = write!(
                out,
                r#"<p class="block-img"><img src="{}" alt="{}"></p>"#,
                escape_html(&image.url),
                escape_html(alt)
            );
            return;
        }
        RichTextNode::Embed(embed) => {
            let Some(oembed) = embed.oembed.as_ref() else {
                return;
            };
            if let Some(html) = oembed.html.as_deref() {
                let _ = write!(out, r#"<div class="embed">{html}</div>"#);
            } else if let Some(url) = oembed.embed_url.as_deref() {
                let url = escape_html(url);
                let _ = write!(out, r#"<p class="embed"><a href="{url}">{url}</a></p>"#);
            }
            return;
        }
        RichTextNode::Unsupported => return,
    };

    let Some(block) = node.text_block() else {
        return;
    };

    let _ = write!(out, "<{tag}>");
    render_spans(block, out);
    let _ = write!(out, "</{tag}>");
}

struct SpanTree<'a> {
    start: usize,
    end: usize,
    span: Option<&'a Span>,
    children: Vec<SpanTree<'a>>,
}

impl<'a> SpanTree<'a> {
    fn leaf(start: usize, end: usize, span: &'a Span) -> Self {
        Self {
            start,
            end,
            span: Some(span),
            children: Vec::new(),
        }
    }

    /// Insert `[start, end)` below every existing node it overlaps, splitting it at
    /// sibling boundaries so the result always nests.
    fn insert(&mut self, start: usize, end: usize, span: &'a Span) {
        let mut cursor = start;
        let mut gaps = Vec::new();

        for child in self.children.iter_mut() {
            if child.end <= cursor || child.start >= end {
                continue;
            }
            if child.start > cursor {
                gaps.push((cursor, child.start));
            }
            let inner_start = cursor.max(child.start);
            let inner_end = end.min(child.end);
            child.insert(inner_start, inner_end, span);
            cursor = inner_end;
        }

        if cursor < end {
            gaps.push((cursor, end));
        }

        if !gaps.is_empty() {
            self.children.extend(
                gaps.into_iter()
                    .map(|(gap_start, gap_end)| SpanTree::leaf(gap_start, gap_end, span)),
            );
            self.children.sort_by_key(|child| child.start);
        }
    }

    fn render(&self, chars: &[char], out: &mut String) {
        let close = self.span.and_then(|span| open_span(span, out));

        let mut position = self.start;
        for child in &self.children {
            push_text(&chars[position..child.start], out);
            child.render(chars, out);
            position = child.end;
        }
        push_text(&chars[position..self.end], out);

        if let Some(tag) = close {
            let _ = write!(out, "</{tag}>");
        }
    }
}

fn render_spans(block: &TextBlock, out: &mut String) {
    let chars: Vec<char> = block.text.chars().collect();
    let utf16_offsets: Vec<usize> = chars
        .iter()
        .scan(0usize, |offset, ch| {
            let current = *offset;
            *offset += ch.len_utf16();
            Some(current)
        })
        .collect();
    let to_char_index = |offset: usize| utf16_offsets.partition_point(|&value| value < offset);

    let mut spans: Vec<(usize, usize, &Span)> = block
        .spans
        .iter()
        .map(|span| (to_char_index(span.start), to_char_index(span.end), span))
        .filter(|(start, end, _)| start < end)
        .collect();
    spans.sort_by(|left, right| left.0.cmp(&right.0).then(right.1.cmp(&left.1)));

    let mut root = SpanTree {
        start: 0,
        end: chars.len(),
        span: None,
        children: Vec::new(),
    };
    for (start, end, span) in spans {
        root.insert(start, end, span);
    }

    root.render(&chars, out);
}

fn open_span(span: &Span, out: &mut String) -> Option<&'static str> {
    match span.kind.as_str() {
        "strong" => {
            out.push_str("<strong>");
            Some("strong")
        }
        "em" => {
            out.push_str("<em>");
            Some("em")
        }
        "hyperlink" => {
            let data = span.data.clone().unwrap_or_default();
            let url = data.url.unwrap_or_default();
            let _ = write!(out, r#"<a href="{}""#, escape_html(&url));
            if let Some(target) = data.target {
                let _ = write!(out, r#" target="{}""#, escape_html(&target));
            }
            out.push('>');
            Some("a")
        }
        "label" => {
            let label = span
                .data
                .as_ref()
                .and_then(|data| data.label.as_deref())
                .unwrap_or_default();
            let _ = write!(out, r#"<span class="{}">"#, escape_html(label));
            Some("span")
        }
        _ => None,
    }
}

fn push_text(chars: &[char], out: &mut String) {
    for ch in chars {
        if *ch == '\n' {
            out.push_str("<br>");
        } else {
            push_escaped(*ch, out);
        }
    }
}

fn push_escaped(ch: char, out: &mut String) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        other => out.push(other),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        push_escaped(ch, &mut escaped);
    }
    escaped
}

fn sanitize(html: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder
        .add_generic_attributes(&["class"])
        .add_tag_attributes("a", &["target"]);
    builder.clean(html).to_string()
}
