//! Markdown to Slack mrkdwn conversion.
//!
//! The rules run in a fixed order and later rules see the output of earlier
//! ones. Literal `*` and `_` in prose are not escaped.

use std::sync::LazyLock;

use regex::{Captures, Regex};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("mrkdwn rule pattern must compile")
}

static WHITESPACE_ONLY_LINE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^[ \t]+$"));
static BLANK_LINE_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r"\n{3,}"));
static LEADING_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^[ \t]+"));
static HEADER: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^#{1,3}[ \t]+(.+?)[ \t]*$"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\*(.+?)\*\*"));
static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)```(.*?)```"));
static LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"\[([^\]]+)\]\(([^)\s]+)\)"));
static UNORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^\*[ \t]+(.*)$"));
static ORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^\d+\.[ \t]+(.*)$"));

/// Converts generic markdown into Slack mrkdwn.
///
/// `_italic_` and inline `` `code` `` are already valid mrkdwn and pass through
/// untouched.
pub fn to_mrkdwn(input: &str) -> String {
    let input = input.replace("\r\n", "\n");
    let text = WHITESPACE_ONLY_LINE.replace_all(&input, "");
    let text = BLANK_LINE_RUN.replace_all(&text, "\n\n");
    let text = LEADING_WHITESPACE.replace_all(&text, "");
    let text = HEADER.replace_all(&text, "*${1}*");
    let text = BOLD.replace_all(&text, "*${1}*");
    let text = FENCED_CODE
        .replace_all(&text, |caps: &Captures<'_>| format!("```{}```", caps[1].trim()));
    let text = LINK.replace_all(&text, "<${2}|${1}>");
    let text = UNORDERED_ITEM.replace_all(&text, "• ${1}");
    let text = ORDERED_ITEM.replace_all(&text, "• ${1}");
    text.into_owned()
}
