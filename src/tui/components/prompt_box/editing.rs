//! Byte-offset motions over the prompt buffer. Offsets always land on char
//! boundaries.

pub(super) fn prev_char(text: &str, pos: usize) -> usize {
    text[..pos].char_indices().next_back().map(|(i, _)| i).unwrap_or(0)
}

pub(super) fn next_char(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map(|c| pos + c.len_utf8())
        .unwrap_or(text.len())
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Start of the word before `pos` (readline `backward-word`).
pub(super) fn prev_word(text: &str, pos: usize) -> usize {
    let mut chars = text[..pos].char_indices().rev().peekable();
    while chars.next_if(|&(_, c)| !is_word(c)).is_some() {}
    let mut start = chars.peek().map(|&(i, _)| i).unwrap_or(0);
    while let Some((i, _)) = chars.next_if(|&(_, c)| is_word(c)) {
        start = i;
    }
    start
}

/// End of the word after `pos` (readline `forward-word`).
pub(super) fn next_word(text: &str, pos: usize) -> usize {
    let mut chars = text[pos..].char_indices().peekable();
    while chars.next_if(|&(_, c)| !is_word(c)).is_some() {}
    while chars.next_if(|&(_, c)| is_word(c)).is_some() {}
    chars.peek().map(|&(i, _)| pos + i).unwrap_or(text.len())
}

pub(super) fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

pub(super) fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map(|i| pos + i).unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_motions_respect_multibyte() {
        let text = "aÅb";
        assert_eq!(next_char(text, 1), 3);
        assert_eq!(prev_char(text, 3), 1);
        assert_eq!(prev_char(text, 0), 0);
        assert_eq!(next_char(text, text.len()), text.len());
    }

    #[test]
    fn test_word_motions() {
        let text = "relax the_cell, now";
        assert_eq!(prev_word(text, text.len()), 16);
        assert_eq!(prev_word(text, 16), 6);
        assert_eq!(prev_word(text, 3), 0);
        assert_eq!(next_word(text, 0), 5);
        assert_eq!(next_word(text, 5), 14);
        assert_eq!(next_word(text, 14), text.len());
    }

    #[test]
    fn test_line_motions() {
        let text = "one\ntwo";
        assert_eq!(line_start(text, 6), 4);
        assert_eq!(line_end(text, 1), 3);
        assert_eq!(line_end(text, 5), 7);
    }
}
