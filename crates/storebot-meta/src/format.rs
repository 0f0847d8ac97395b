// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text cleanup for Messenger-class replies.
//!
//! Messenger renders neither Markdown nor HTML, so formatting marks are
//! stripped and link text is kept.

use std::sync::LazyLock;

use regex::Regex;

static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\*\*(.*?)\*\*", "$1"),
        (r"__(.*?)__", "$1"),
        (r"\*(.*?)\*", "$1"),
        (r"_(.*?)_", "$1"),
        (r"`{1,3}([^`]*)`{1,3}", "$1"),
        (r"~~(.*?)~~", "$1"),
        (r"!\[.*?\]\(.*?\)", ""),
        (r"\[([^\]]+)\]\((.*?)\)", "$1"),
        (r"(^|\n)#+\s+", "$1"),
        (r"(^|\n)>\s+", "$1"),
        (r"(^|\n)[*-]\s+", "$1"),
        (r"(^|\n)\d+\.\s+", "$1"),
        (r"</?[^>]+(?:>|$)", ""),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Strips Markdown and HTML from an assistant reply and trims it.
pub fn format_for_messenger(text: &str) -> String {
    let cleaned = RULES
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        });
    cleaned.trim().to_string()
}
