//! Reading-time estimate for post content.

use super::posts::ContentGroup;
use super::rich_text;

pub const WORDS_PER_MINUTE: usize = 200;

/// Whole minutes needed to read every heading and body, rounded up.
pub fn estimate_minutes(content: &[ContentGroup]) -> u32 {
    let heading_words: usize = content
        .iter()
        .map(|group| word_count(&group.heading))
        .sum();
    let body_words: usize = content
        .iter()
        .map(|group| word_count(&rich_text::as_text(&group.body)))
        .sum();

    let minutes = (heading_words + body_words).div_ceil(WORDS_PER_MINUTE);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rich_text::{RichTextNode, TextBlock};

    fn group(heading: &str, paragraphs: &[&str]) -> ContentGroup {
        ContentGroup {
            heading: heading.to_string(),
            body: paragraphs
                .iter()
                .map(|text| RichTextNode::Paragraph(TextBlock::plain(*text)))
                .collect(),
        }
    }

    fn words(count: usize) -> String {
        vec!["palavra"; count].join(" ")
    }

    #[test]
    fn counts_words_across_irregular_whitespace() {
        assert_eq!(word_count("  one\ttwo\n three  "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn rounds_partial_minutes_up() {
        let body = words(199);
        let content = vec![group("Heading", &[body.as_str()])];

        // 1 heading word + 199 body words fills exactly one minute.
        assert_eq!(estimate_minutes(&content), 1);

        let body = words(200);
        let content = vec![group("Heading", &[body.as_str()])];
        assert_eq!(estimate_minutes(&content), 2);
    }

    #[test]
    fn sums_every_group() {
        let body = words(150);
        let content = vec![
            group("Primeira parte", &[body.as_str()]),
            group("Segunda parte", &[body.as_str(), "mais texto"]),
        ];

        // 2 + 150 + 2 + 150 + 2 = 306 words.
        assert_eq!(estimate_minutes(&content), 2);
    }

    #[test]
    fn empty_content_reads_in_zero_minutes() {
        assert_eq!(estimate_minutes(&[]), 0);
        assert_eq!(estimate_minutes(&[group("", &[""])]), 0);
    }
}
