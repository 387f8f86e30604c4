//! Wrapping and cursor placement for the prompt box.
//!
//! Each logical line (split on `\n`) is wrapped on its own with `textwrap`,
//! so an empty logical line still occupies one row and the cursor can sit on
//! it.

use unicode_width::UnicodeWidthChar;

/// Border (2) + one column of padding each side.
pub(super) const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders.
pub(super) const VERTICAL_OVERHEAD: u16 = 2;
/// Rows shown before the box starts scrolling internally.
pub(super) const MAX_VISIBLE_ROWS: u16 = 5;

pub(super) fn inner_width(area_width: u16) -> usize {
    area_width.saturating_sub(HORIZONTAL_OVERHEAD) as usize
}

fn options(width: usize) -> textwrap::Options<'static> {
    textwrap::Options::new(width.max(1))
        .break_words(true)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
}

fn wrap_logical(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    textwrap::wrap(line, options(width))
        .into_iter()
        .map(|row| row.into_owned())
        .collect()
}

/// Display rows for `text` at `width` columns. Never empty.
pub(super) fn rows(text: &str, width: usize) -> Vec<String> {
    text.split('\n').flat_map(|line| wrap_logical(line, width)).collect()
}

pub(super) fn row_count(text: &str, width: usize) -> u16 {
    u16::try_from(rows(text, width).len()).unwrap_or(u16::MAX)
}

/// `(row, column)` of byte offset `pos` within the wrapped layout.
pub(super) fn cursor_position(text: &str, pos: usize, width: usize) -> (u16, u16) {
    let before = &text[..pos];
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let rows_above: usize = text[..line_start]
        .split_terminator('\n')
        .map(|line| wrap_logical(line, width).len())
        .sum();

    // textwrap drops the spaces it breaks on, so walk the raw prefix past
    // each earlier row and measure what is left.
    let prefix = &before[line_start..];
    let wrapped = wrap_logical(prefix, width);
    let mut rest = prefix;
    for (j, row) in wrapped.iter().enumerate().take(wrapped.len().saturating_sub(1)) {
        if j > 0 {
            rest = rest.trim_start_matches(' ');
        }
        rest = rest.get(row.len()..).unwrap_or_default();
    }
    if wrapped.len() > 1 {
        rest = rest.trim_start_matches(' ');
    }
    let column: usize = rest.chars().map(|c| c.width().unwrap_or(0)).sum();

    let row = rows_above + wrapped.len().saturating_sub(1);
    (
        u16::try_from(row).unwrap_or(u16::MAX),
        u16::try_from(column).unwrap_or(u16::MAX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_one_row() {
        assert_eq!(rows("", 10), vec![String::new()]);
        assert_eq!(cursor_position("", 0, 10), (0, 0));
    }

    #[test]
    fn test_explicit_newlines_make_rows() {
        assert_eq!(row_count("a\nb\n", 10), 3);
        assert_eq!(cursor_position("a\nb\n", 4, 10), (2, 0));
        assert_eq!(cursor_position("a\nb\n", 3, 10), (1, 1));
    }

    #[test]
    fn test_long_words_wrap() {
        assert_eq!(rows("relax the unit cell", 9), vec!["relax the", "unit cell"]);
        assert_eq!(cursor_position("relax the unit cell", 19, 9), (1, 9));
    }

    #[test]
    fn test_cursor_on_third_row() {
        assert_eq!(rows("aaa bbb ccc", 3), vec!["aaa", "bbb", "ccc"]);
        assert_eq!(cursor_position("aaa bbb cc", 10, 3), (2, 2));
    }

    #[test]
    fn test_trailing_space_keeps_column() {
        assert_eq!(cursor_position("relax ", 6, 20), (0, 6));
    }

    #[test]
    fn test_wide_characters_count_two_columns() {
        assert_eq!(cursor_position("能量", 6, 20), (0, 4));
    }
}
