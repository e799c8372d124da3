use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strip diacritics: decompose, drop the combining marks. Stroked letters
/// have no decomposition and are mapped by hand.
pub fn fold_accents(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'Ø' => 'O',
            'ø' => 'o',
            'Ł' => 'L',
            'ł' => 'l',
            'Đ' => 'D',
            'đ' => 'd',
            other => other,
        })
        .collect()
}

/// Accent-free, uppercase, alphanumeric-only form used for comparisons.
pub fn normalize_for_match(text: &str) -> String {
    fold_accents(text)
        .to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
