//! Deterministic clean-up of generated outline text.
//!
//! [`format_outline`] is a pure, idempotent string transform:
//!
//! - trailing whitespace is stripped from every line,
//! - markdown headings get exactly one space after the `#`s and are
//!   surrounded by blank lines,
//! - inline `•`/`●`/`▪` bullet runs are broken onto their own `- ` lines,
//! - runs of blank lines collapse to one, and leading/trailing blank lines
//!   are dropped.

use std::sync::LazyLock;

use regex::Regex;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(#{1,6})[ \t]*([^#\s].*)$").expect("static regex"));

const BULLET_MARKS: [char; 3] = ['•', '●', '▪'];

/// Normalises outline text. `format_outline(format_outline(x)) == format_outline(x)`.
pub fn format_outline(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        for piece in split_inline_bullets(raw.trim_end()) {
            push_line(&mut lines, normalise_heading(piece));
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn split_inline_bullets(line: &str) -> Vec<String> {
    if !line.contains(BULLET_MARKS) {
        return vec![line.to_string()];
    }
    let mut parts = line.split(BULLET_MARKS);
    let mut out = Vec::new();
    if let Some(lead) = parts.next() {
        let lead = lead.trim_end();
        if !lead.trim().is_empty() {
            out.push(lead.to_string());
        }
    }
    out.extend(
        parts
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| format!("- {item}")),
    );
    out
}

fn normalise_heading(line: String) -> String {
    match HEADING.captures(&line) {
        Some(caps) => format!("{} {}", &caps[1], caps[2].trim_end()),
        None => line,
    }
}

fn is_heading(line: &str) -> bool {
    HEADING.is_match(line)
}

fn push_line(lines: &mut Vec<String>, line: String) {
    let blank = line.trim().is_empty();
    let prev_blank = lines.last().map_or(true, |l| l.is_empty());

    if blank {
        if !prev_blank {
            lines.push(String::new());
        }
        return;
    }

    let after_heading = lines.last().is_some_and(|l| is_heading(l));
    if is_heading(&line) {
        if !prev_blank {
            lines.push(String::new());
        }
        lines.push(line);
        return;
    }
    if after_heading {
        lines.push(String::new());
    }
    lines.push(line);
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn headings_get_spacing() {
        let raw = "Intro line\n##Slide 1: Overview\nBody text\n### Details   \nMore";
        assert_eq!(
            format_outline(raw),
            "Intro line\n\n## Slide 1: Overview\n\nBody text\n\n### Details\n\nMore"
        );
    }

    #[test]
    fn inline_bullets_are_split() {
        let raw = "Key points: • Growth • Margin ● Risk";
        assert_eq!(format_outline(raw), "Key points:\n- Growth\n- Margin\n- Risk");
    }

    #[test]
    fn blank_runs_collapse_and_edges_trim() {
        let raw = "\n\n  \nFirst\n\n\n\nSecond\n   \n\n";
        assert_eq!(format_outline(raw), "First\n\nSecond");
    }

    #[test]
    fn consecutive_headings_are_separated_once() {
        let raw = "# Deck\n## Part\n\n\n## Next";
        assert_eq!(format_outline(raw), "# Deck\n\n## Part\n\n## Next");
    }

    #[test]
    fn plain_and_empty_text() {
        assert_eq!(format_outline(""), "");
        assert_eq!(format_outline("just words"), "just words");
        assert_eq!(format_outline("####### too deep"), "####### too deep");
    }

    #[test]
    fn windows_line_endings() {
        assert_eq!(format_outline("#A\r\nb\r\n"), "# A\n\nb");
    }

    proptest! {
        #[test]
        fn formatting_is_idempotent(text in "(#{0,7}[ \\t]?[a-zA-Z•●▪ :*-]{0,12}\r?\n{0,3}){0,12}") {
            let once = format_outline(&text);
            prop_assert_eq!(format_outline(&once), once);
        }

        #[test]
        fn formatting_is_idempotent_for_any_string(text in any::<String>()) {
            let once = format_outline(&text);
            prop_assert_eq!(format_outline(&once), once);
        }
    }
}
