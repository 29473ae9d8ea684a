//! Width-aware text fitting. Escape sequences take no room.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use unicode_width::UnicodeWidthChar;

use crate::models::Align;

pub const TAB_SIZE: usize = 4;

/// What to do with lines wider than their column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextOverflow {
    /// Continue on the following lines
    #[default]
    Wrap,
    /// Cut at a word boundary and append the placeholder
    Shorten,
}

impl FromStr for TextOverflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wrap" => Ok(TextOverflow::Wrap),
            "shorten" => Ok(TextOverflow::Shorten),
            _ => Err(format!("invalid overflow '{}': use wrap or shorten", s)),
        }
    }
}

/// Smallest piece of text: one character, or a whole escape sequence
#[derive(Debug, Clone, Copy)]
struct Atom<'a> {
    text: &'a str,
    width: usize,
}

fn atoms(s: &str) -> Vec<Atom<'_>> {
    let mut out = Vec::new();
    let mut rest = s;

    while let Some(c) = rest.chars().next() {
        let len = if c == '\x1b' {
            escape_len(rest)
        } else {
            c.len_utf8()
        };
        let (text, tail) = rest.split_at(len);
        let width = if c == '\x1b' { 0 } else { c.width().unwrap_or(0) };
        out.push(Atom { text, width });
        rest = tail;
    }

    out
}

/// Byte length of the escape sequence at the start of `s`
fn escape_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    match bytes.get(1) {
        // CSI: parameters then one final byte in @..~
        Some(b'[') => bytes[2..]
            .iter()
            .position(|b| (0x40..=0x7e).contains(b))
            .map_or(bytes.len(), |at| at + 3),
        // OSC: ended by BEL or ESC \
        Some(b']') => {
            let mut at = 2;
            while at < bytes.len() {
                match bytes[at] {
                    0x07 => return at + 1,
                    0x1b if bytes.get(at + 1) == Some(&b'\\') => return at + 2,
                    _ => at += 1,
                }
            }
            bytes.len()
        }
        Some(next) if next.is_ascii() => 2,
        _ => 1,
    }
}

/// Columns `s` takes on screen
pub fn display_width(s: &str) -> usize {
    atoms(s).iter().map(|atom| atom.width).sum()
}

/// Replace tabs with spaces up to the next multiple of `TAB_SIZE`
pub fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;

    for atom in atoms(line) {
        if atom.text == "\t" {
            let spaces = TAB_SIZE - column % TAB_SIZE;
            out.extend(std::iter::repeat_n(' ', spaces));
            column += spaces;
        } else {
            out.push_str(atom.text);
            column += atom.width;
        }
    }

    out
}

/// Runs of whitespace and runs of everything else
fn chunks(line: &str) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = Vec::new();
    let mut last_space = None;

    for atom in atoms(line) {
        let space = if atom.width == 0 {
            last_space.unwrap_or(false)
        } else {
            atom.text.chars().all(char::is_whitespace)
        };

        match out.last_mut() {
            Some((text, width)) if last_space == Some(space) => {
                text.push_str(atom.text);
                *width += atom.width;
            }
            _ => out.push((atom.text.to_string(), atom.width)),
        }
        last_space = Some(space);
    }

    out
}

/// Split `s` after at most `width` columns. With `force`, the head holds
/// at least one visible character.
fn split_at_width(s: &str, width: usize, force: bool) -> (String, String) {
    let mut head = String::new();
    let mut used = 0;
    let mut taken = 0;

    for atom in atoms(s) {
        if atom.width > 0 && used + atom.width > width && (used > 0 || !force) {
            break;
        }
        head.push_str(atom.text);
        used += atom.width;
        taken += atom.text.len();
    }

    (head, s[taken..].to_string())
}

/// Greedy wrap keeping whitespace as written; over-long words are broken
pub fn wrap(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut used = 0;

    for (mut chunk, mut chunk_width) in chunks(line) {
        if used + chunk_width <= width {
            current.push_str(&chunk);
            used += chunk_width;
            continue;
        }

        if chunk_width <= width && used > 0 {
            lines.push(std::mem::take(&mut current));
            current = chunk;
            used = chunk_width;
            continue;
        }

        // Fill the current line with as much of the chunk as fits
        while used + chunk_width > width {
            let (head, tail) = split_at_width(&chunk, width.saturating_sub(used), used == 0);
            if display_width(&head) == 0 {
                lines.push(std::mem::take(&mut current));
                used = 0;
                continue;
            }
            current.push_str(&head);
            lines.push(std::mem::take(&mut current));
            used = 0;
            chunk = tail;
            chunk_width = display_width(&chunk);
        }
        current.push_str(&chunk);
        used = chunk_width;
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Collapse whitespace and cut at a word boundary so the result, with
/// `placeholder` appended, fits in `width`
pub fn shorten(line: &str, width: usize, placeholder: &str) -> String {
    let words: Vec<&str> = line.split_whitespace().collect();
    let collapsed = words.join(" ");
    if display_width(&collapsed) <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(display_width(placeholder));
    let mut out = String::new();
    for word in words {
        let extra = if out.is_empty() { 0 } else { 1 };
        if display_width(&out) + extra + display_width(word) > budget {
            break;
        }
        if extra == 1 {
            out.push(' ');
        }
        out.push_str(word);
    }

    if out.is_empty() {
        return split_at_width(placeholder.trim_start(), width.max(1), true).0;
    }
    out.push_str(placeholder);
    out
}

/// Lines of `text` fitted into a `width` x `height` cell box
pub fn fit_text(
    text: &str,
    width: usize,
    height: usize,
    overflow: TextOverflow,
    placeholder: &str,
) -> Vec<String> {
    text.split('\n')
        .map(|line| expand_tabs(line.trim_end_matches('\r')))
        .flat_map(|line| match overflow {
            TextOverflow::Wrap => wrap(&line, width),
            TextOverflow::Shorten => vec![shorten(&line, width, placeholder)],
        })
        .take(height)
        .collect()
}

/// Pad `text` to sit at `align` in a `width` column line
pub fn align_text(text: &str, width: usize, align: Align) -> String {
    let free = width.saturating_sub(display_width(text));
    let left = match align {
        Align::Left => 0,
        Align::Center => free / 2,
        Align::Right => free,
    };
    format!("{}{}", " ".repeat(left), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_ignores_escapes() {
        assert_eq!(display_width("\x1b[31mred\x1b[0m"), 3);
        assert_eq!(display_width("\x1b]8;;http://x\x1b\\link\x1b]8;;\x1b\\"), 4);
        assert_eq!(display_width("日本"), 4);
    }

    #[test]
    fn test_expand_tabs_to_next_stop() {
        assert_eq!(expand_tabs("a\tb"), "a   b");
        assert_eq!(expand_tabs("abcd\te"), "abcd    e");
        assert_eq!(expand_tabs("\x1b[1m\tx"), "\x1b[1m    x");
    }

    #[test]
    fn test_wrap_at_word_boundaries() {
        assert_eq!(wrap("hello big world", 9), vec!["hello big", " world"]);
        assert_eq!(wrap("short", 10), vec!["short"]);
        assert_eq!(wrap("", 10), vec![""]);
    }

    #[test]
    fn test_wrap_breaks_long_words() {
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("ab cdefghij", 4), vec!["ab c", "defg", "hij"]);
    }

    #[test]
    fn test_wrap_keeps_escapes_attached() {
        let lines = wrap("\x1b[31mabcdef\x1b[0m", 3);
        assert_eq!(lines, vec!["\x1b[31mabc", "def\x1b[0m"]);
        assert!(lines.iter().all(|line| display_width(line) <= 3));
    }

    #[test]
    fn test_wrap_wide_characters() {
        let lines = wrap("日本語", 4);
        assert_eq!(lines, vec!["日本", "語"]);
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("hello   big world", 20, " …"), "hello big world");
        assert_eq!(shorten("hello big world", 12, " …"), "hello big …");
        assert_eq!(shorten("hello", 3, " [...]"), "[..");
    }

    #[test]
    fn test_fit_text_truncates_lines() {
        let lines = fit_text("one two three\nfour", 5, 2, TextOverflow::Wrap, " …");
        assert_eq!(lines, vec!["one ", "two "]);

        let lines = fit_text("one two three\nfour", 9, 5, TextOverflow::Shorten, " …");
        assert_eq!(lines, vec!["one two …", "four"]);
    }

    #[test]
    fn test_align_text() {
        assert_eq!(align_text("ab", 6, Align::Center), "  ab");
        assert_eq!(align_text("ab", 6, Align::Right), "    ab");
        assert_eq!(align_text("too long", 3, Align::Right), "too long");
    }
}
