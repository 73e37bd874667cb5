//! Text normalization for case and accent insensitive comparisons

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Normalize text for uniqueness comparisons.
///
/// Lower-cases, decomposes (NFKD), drops combining marks, removes anything
/// that is neither a word character nor whitespace, then collapses
/// whitespace runs to a single space and trims.
pub fn normalize_text(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_accents_and_punctuation() {
        assert_eq!(normalize_text("CAFÉ  de Paris!"), "cafe de paris");
        assert_eq!(normalize_text("cafe de paris"), "cafe de paris");
        assert_eq!(
            normalize_text("CAFÉ  de Paris!"),
            normalize_text("cafe de paris")
        );
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(normalize_text("  Gabriel\t García\n Márquez  "), "gabriel garcia marquez");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_compatibility_decomposition() {
        // Ligature and full-width forms fold under NFKD
        assert_eq!(normalize_text("ﬁction"), "fiction");
        assert_eq!(normalize_text("ＡＢＣ"), "abc");
    }

    #[test]
    fn test_keeps_digits_and_underscore() {
        assert_eq!(normalize_text("Vol. 2 — part_one"), "vol 2 part_one");
    }

    #[test]
    fn test_non_latin_letters_survive() {
        assert_eq!(normalize_text("Достоевский"), "достоевскии");
    }
}
