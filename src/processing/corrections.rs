// OCR character correction tables for MRZ text.
// The substitutions are tuned for OCR-B and the Latin fonts printed on INE cards
// and Mexican passports; load a different table through the config for other fonts.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Position context for MRZ correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldContext {
    /// Dates, check digits and numeric document numbers.
    Digits,
    /// Names, nationality and country codes.
    Letters,
    /// The single sex position.
    Sex,
    /// Mixed alphanumeric ranges (passport numbers, optional data).
    Free,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionTables {
    /// Characters OCR produces in place of the `<` filler.
    pub filler_symbols: Vec<char>,
    /// Unconditional single-character substitutions.
    pub substitutions: BTreeMap<char, char>,
    /// Letters read in place of digits, applied in digit ranges.
    pub letter_to_digit: BTreeMap<char, char>,
    /// Digits read in place of letters, applied in name and country ranges.
    pub digit_to_letter: BTreeMap<char, char>,
    /// Fixes for the sex position.
    pub sex_position: BTreeMap<char, char>,
    /// Two-character artifacts produced when OCR merges a `<<` separator.
    pub merged_filler_patterns: Vec<String>,
}

impl Default for CorrectionTables {
    fn default() -> Self {
        let filler_symbols = vec![
            '.', '-', '–', '—', '_', '\'', '"', ',', ';', ':', '!', '«', '»', '‹', '›', '~', '*',
            '^', '+', '=', '(', ')', '[', ']', '{', '}', '`', '´', '\\', '/',
        ];

        let substitutions = BTreeMap::from([('$', 'S'), ('|', 'I'), ('€', 'E'), ('£', 'E')]);

        let letter_to_digit = BTreeMap::from([
            ('O', '0'),
            ('D', '0'),
            ('Q', '0'),
            ('I', '1'),
            ('L', '1'),
            ('Z', '2'),
            ('A', '4'),
            ('S', '5'),
            ('G', '6'),
            ('T', '7'),
            ('B', '8'),
        ]);

        let digit_to_letter = BTreeMap::from([
            ('0', 'O'),
            ('1', 'I'),
            ('2', 'Z'),
            ('4', 'A'),
            ('5', 'S'),
            ('6', 'G'),
            ('7', 'T'),
            ('8', 'B'),
        ]);

        let sex_position = BTreeMap::from([('4', 'H'), ('0', '<'), ('O', '<')]);

        let merged_filler_patterns = ["LS", "L5", "K<", "LC", "LZ"]
            .iter()
            .map(|p| p.to_string())
            .collect();

        CorrectionTables {
            filler_symbols,
            substitutions,
            letter_to_digit,
            digit_to_letter,
            sex_position,
            merged_filler_patterns,
        }
    }
}

lazy_static! {
    pub static ref DEFAULT_CORRECTIONS: CorrectionTables = CorrectionTables::default();
}

impl CorrectionTables {
    /// Line-level cleanup applied before candidate filtering: uppercase,
    /// drop whitespace, map symbols to filler and apply the unconditional
    /// substitutions.
    pub fn normalize_line(&self, line: &str) -> String {
        line.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(|c| c.to_uppercase())
            .map(|c| {
                if self.filler_symbols.contains(&c) {
                    '<'
                } else {
                    self.substitutions.get(&c).copied().unwrap_or(c)
                }
            })
            .collect()
    }

    /// Correct a fixed-width MRZ range given what it is supposed to contain.
    pub fn correct_range(&self, text: &str, context: FieldContext) -> String {
        text.chars()
            .map(|c| match context {
                FieldContext::Digits => self.letter_to_digit.get(&c).copied().unwrap_or(c),
                FieldContext::Letters => self.digit_to_letter.get(&c).copied().unwrap_or(c),
                FieldContext::Sex => self.sex_position.get(&c).copied().unwrap_or(c),
                FieldContext::Free => c,
            })
            .collect()
    }

    /// Name ranges: digits become letters and, when OCR swallowed the `<<`
    /// separator, the first merged-filler artifact is restored.
    pub fn correct_name_range(&self, text: &str) -> String {
        let corrected = self.correct_range(text, FieldContext::Letters);
        let trimmed = corrected.trim_end_matches('<');

        if trimmed.contains("<<") {
            return corrected;
        }

        let earliest = self
            .merged_filler_patterns
            .iter()
            .filter_map(|p| trimmed.find(p.as_str()).map(|idx| (idx, p.len())))
            .filter(|(idx, _)| *idx > 0)
            .min_by_key(|(idx, _)| *idx);

        match earliest {
            Some((idx, len)) => {
                let mut restored = String::with_capacity(corrected.len());
                restored.push_str(&corrected[..idx]);
                restored.push_str("<<");
                restored.push_str(&corrected[idx + len..]);
                restored
            }
            None => corrected,
        }
    }
}
