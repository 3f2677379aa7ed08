//! Terminal output styling.
//!
//! Built on the anstyle ecosystem: anstream for auto-detecting color
//! support, anstyle for composable styles, color-print for tagged message
//! formatting.
//!
//! ## stdout vs stderr principle
//!
//! - **stdout**: machine-readable output (paths, JSON, raw git passthrough)
//! - **stderr**: progress, prompts, tables, warnings, status
//!
//! This separation is load-bearing for scripting (`arb status --json | jq`).
//! Use `println!` for primary output, `eprintln!` for everything else.

// Re-exports from anstream (auto-detecting output)
pub use anstream::{eprint, eprintln, print, println, stderr, stdout};

use anstyle::{AnsiColor, Color, Style};
use color_print::cformat;

// ============================================================================
// Programmatic style constants (for table rendering and computed styles)
// ============================================================================

/// Ahead/addition counts (green)
pub const ADDITION: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Behind/deletion counts (red)
pub const DELETION: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Warning highlights (yellow), e.g. the shallow-clone marker in plans
pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Secondary detail (bright black)
pub const DETAIL: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));

// ============================================================================
// Message formatting
// ============================================================================

/// Format an error message with red styling.
///
/// Content can include inner styling like `<bold>`:
/// ```
/// use color_print::cformat;
/// use arborist::styling::error_message;
///
/// let name = "fix-login";
/// eprintln!("{}", error_message(cformat!("Workspace <bold>{name}</> not found")));
/// ```
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("<red>error:</> {}", content.as_ref())
}

/// Format a hint with dim styling.
pub fn hint_message(content: impl AsRef<str>) -> String {
    cformat!("<dim>hint: {}</>", content.as_ref())
}

/// Format a warning with yellow styling.
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("<yellow>warning:</> {}", content.as_ref())
}

/// Format a success message with green styling.
pub fn success_message(content: impl AsRef<str>) -> String {
    cformat!("<green>✓</> {}", content.as_ref())
}

/// Format a progress message with cyan styling.
pub fn progress_message(content: impl AsRef<str>) -> String {
    cformat!("<cyan>→</> {}", content.as_ref())
}

/// Format neutral status (not dimmed; metadata inside may be).
pub fn info_message(content: impl AsRef<str>) -> String {
    content.as_ref().to_string()
}

/// Indent a block of output two spaces, preserving interior newlines.
///
/// Used to quote git output (conflict details, fetch errors) under a
/// per-repo heading.
pub fn format_indented(content: &str) -> String {
    content
        .trim_end()
        .lines()
        .map(|l| format!("  {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Get terminal width of stderr, or `usize::MAX` if detection fails.
///
/// Plans and tables render on stderr, so stderr is what matters here. When
/// detection fails (piped context, no TTY) we return `usize::MAX` rather
/// than an arbitrary default and let the consumer avoid truncation.
pub fn terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) =
        terminal_size::terminal_size_of(std::io::stderr())
    {
        return w as usize;
    }
    if let Ok(cols) = std::env::var("COLUMNS")
        && let Ok(width) = cols.parse::<usize>()
    {
        return width;
    }
    usize::MAX
}

/// Visual width of a string, ignoring ANSI escape codes.
pub fn visual_width(s: &str) -> usize {
    use unicode_width::UnicodeWidthStr;
    strip_ansi(s).width()
}

/// Pad `s` with spaces to visual width `w` (no-op when already wider).
pub fn pad_visual(s: &str, w: usize) -> String {
    let current = visual_width(s);
    if current >= w {
        s.to_string()
    } else {
        format!("{s}{}", " ".repeat(w - current))
    }
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI sequence: ESC [ ... final byte in @..~
            if chars.next() == Some('[') {
                for t in chars.by_ref() {
                    if ('@'..='~').contains(&t) {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visual_width_ignores_ansi() {
        let styled = "\x1b[31mabc\x1b[0m";
        assert_eq!(visual_width(styled), 3);
    }

    #[test]
    fn pad_visual_accounts_for_ansi() {
        let styled = "\x1b[1mab\x1b[0m";
        let padded = pad_visual(styled, 5);
        assert_eq!(visual_width(&padded), 5);
    }

    #[test]
    fn indent_preserves_lines() {
        assert_eq!(format_indented("a\nb\n"), "  a\n  b");
    }
}
