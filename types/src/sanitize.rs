//! Sanitization of remote log lines before they reach a terminal.
//!
//! Script output is relayed verbatim by the backend, so a line may carry ANSI
//! escape sequences (colors, cursor movement, OSC title/clipboard writes) or
//! stray control bytes. Everything a log line needs survives: printable text
//! and tabs. Line breaks collapse to a single space so one record stays one row.

use std::borrow::Cow;

const ESC: char = '\x1b';
const BEL: char = '\x07';
const C1_CSI: char = '\u{009b}';

/// Strip escape sequences and control characters from a single log line.
///
/// Returns `Cow::Borrowed` when the line is already clean.
///
/// ```
/// use scriptdeck_types::sanitize_log_line;
///
/// assert_eq!(sanitize_log_line("plain"), "plain");
/// assert_eq!(sanitize_log_line("\x1b[31mred\x1b[0m"), "red");
/// assert_eq!(sanitize_log_line("a\r\nb"), "a b");
/// ```
#[must_use]
pub fn sanitize_log_line(input: &str) -> Cow<'_, str> {
    if !input.chars().any(is_unsafe) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut pending_break = false;

    while let Some(c) = chars.next() {
        match c {
            ESC => skip_escape(&mut chars),
            C1_CSI => skip_csi(&mut chars),
            '\n' | '\r' => pending_break = true,
            '\t' => {
                flush_break(&mut out, &mut pending_break);
                out.push('\t');
            }
            c if c.is_control() => {}
            c => {
                flush_break(&mut out, &mut pending_break);
                out.push(c);
            }
        }
    }

    Cow::Owned(out)
}

fn flush_break(out: &mut String, pending: &mut bool) {
    if *pending && !out.is_empty() {
        out.push(' ');
    }
    *pending = false;
}

fn is_unsafe(c: char) -> bool {
    c != '\t' && c.is_control()
}

fn skip_escape<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    match chars.peek().copied() {
        Some('[') => {
            chars.next();
            skip_csi(chars);
        }
        Some(']' | 'P' | '^' | '_') => {
            chars.next();
            skip_string(chars);
        }
        Some('(' | ')' | '*' | '+' | '#') => {
            chars.next();
            chars.next();
        }
        Some(c) if c.is_ascii_alphanumeric() || matches!(c, '=' | '>' | '<') => {
            chars.next();
        }
        _ => {}
    }
}

// Parameter/intermediate bytes (0x20-0x3F) up to a final byte (0x40-0x7E).
fn skip_csi<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    while let Some(&c) = chars.peek() {
        if ('\x40'..='\x7e').contains(&c) {
            chars.next();
            return;
        }
        if !('\x20'..='\x3f').contains(&c) {
            return;
        }
        chars.next();
    }
}

// OSC/DCS/PM/APC payloads end at BEL or ST (ESC \).
fn skip_string<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    while let Some(c) = chars.next() {
        if c == BEL {
            return;
        }
        if c == ESC && chars.peek() == Some(&'\\') {
            chars.next();
            return;
        }
    }
}
