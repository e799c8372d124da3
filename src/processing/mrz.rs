// ICAO Doc 9303 machine readable zone decoding for TD1 (INE) and TD3 (passport).

use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;

use crate::models::{CheckDigitFlags, DocumentFormat, DocumentType, MrzResult, Sex};
use crate::processing::corrections::{CorrectionTables, FieldContext, DEFAULT_CORRECTIONS};
use crate::utils::{CaptureError, Result};

const MIN_LINE_LENGTH: usize = 20;
const MAX_LINE_LENGTH: usize = 50;
const CHECK_WEIGHTS: [u32; 3] = [7, 3, 1];

lazy_static! {
    static ref TD3_FIRST_LINE: Regex = Regex::new(r"^P[<A-Z]").unwrap();
    static ref TD1_FIRST_LINE: Regex = Regex::new(r"^I[D]?MEX").unwrap();
    pub static ref MRZ_CHARSET: Regex = Regex::new(r"^[A-Z0-9<]+$").unwrap();
}

/// A line that survived MRZ candidate filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct MrzCandidate {
    /// Uppercased, whitespace-free OCR text before symbol correction.
    pub raw: String,
    /// Text after symbol correction; only `[A-Z0-9<]`.
    pub corrected: String,
}

/// Candidate lines anchored on a recognised first line.
#[derive(Debug, Clone, PartialEq)]
pub struct MrzGroup {
    pub format: DocumentFormat,
    pub lines: Vec<MrzCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Birth,
    Expiry,
}

/// Numeric value of an MRZ character: digits are themselves, `A`-`Z` are
/// 10-35 and the filler is 0.
pub fn char_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
        '<' => Some(0),
        _ => None,
    }
}

/// ICAO 9303 check digit: weighted sum with the repeating 7-3-1 cycle, mod 10.
/// Characters outside the MRZ set count as filler.
pub fn calculate_check_digit(data: &str) -> u32 {
    data.chars()
        .enumerate()
        .map(|(i, c)| char_value(c).unwrap_or(0) * CHECK_WEIGHTS[i % 3])
        .sum::<u32>()
        % 10
}

/// Compare the computed digit with the declared one. A filler in the check
/// position only validates when `filler_is_zero` is set.
pub fn verify_check_digit(data: &str, declared: char, filler_is_zero: bool) -> bool {
    let declared = match declared {
        '<' if filler_is_zero => 0,
        d => match d.to_digit(10) {
            Some(v) => v,
            None => return false,
        },
    };
    calculate_check_digit(data) == declared
}

/// Convert `YYMMDD` to ISO `YYYY-MM-DD`. Birth years above 50 belong to the
/// 1900s; expiry years are always in the 2000s.
pub fn parse_mrz_date(field: &str, kind: DateKind) -> Option<String> {
    if field.len() != 6 || !field.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let yy: i32 = field[0..2].parse().ok()?;
    let month: u32 = field[2..4].parse().ok()?;
    let day: u32 = field[4..6].parse().ok()?;

    let year = match kind {
        DateKind::Birth if yy > 50 => 1900 + yy,
        _ => 2000 + yy,
    };

    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

fn fit_line(line: &str, width: usize) -> String {
    let mut fitted: String = line.chars().take(width).collect();
    while fitted.len() < width {
        fitted.push('<');
    }
    fitted
}

fn slice(line: &str, start: usize, end: usize) -> &str {
    &line[start.min(line.len())..end.min(line.len())]
}

fn char_at(line: &str, idx: usize) -> char {
    line.as_bytes().get(idx).map(|b| *b as char).unwrap_or('<')
}

fn strip_filler(value: &str) -> Option<String> {
    let trimmed = value.trim_matches('<').replace('<', " ");
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

struct NameParts {
    first_name: Option<String>,
    last_name: Option<String>,
    second_last_name: Option<String>,
    full_name: Option<String>,
}

/// Split a `SURNAME<SECOND<<GIVEN<NAMES` range.
fn split_names(range: &str) -> NameParts {
    let range = range.trim_end_matches('<');
    let (surnames, given) = match range.find("<<") {
        Some(idx) => (&range[..idx], &range[idx + 2..]),
        None => (range, ""),
    };

    let mut surname_parts = surnames.split('<').filter(|p| !p.is_empty());
    let last_name = surname_parts.next().map(|s| s.to_string());
    let rest: Vec<&str> = surname_parts.collect();
    let second_last_name = if rest.is_empty() { None } else { Some(rest.join(" ")) };

    let given_parts: Vec<&str> = given.split('<').filter(|p| !p.is_empty()).collect();
    let first_name = if given_parts.is_empty() { None } else { Some(given_parts.join(" ")) };

    let full: Vec<&str> = [&first_name, &last_name, &second_last_name]
        .iter()
        .filter_map(|p| p.as_deref())
        .collect();
    let full_name = if full.is_empty() { None } else { Some(full.join(" ")) };

    NameParts {
        first_name,
        last_name,
        second_last_name,
        full_name,
    }
}

/// Check digit flags over position-corrected, fixed-width lines.
pub fn evaluate_check_digits(format: DocumentFormat, lines: &[String]) -> CheckDigitFlags {
    if lines.len() != format.mrz_lines() {
        return CheckDigitFlags::default();
    }

    match format {
        DocumentFormat::TD1 => {
            let (l1, l2) = (&lines[0], &lines[1]);
            let composite_data = format!(
                "{}{}{}{}",
                slice(l1, 5, 30),
                slice(l2, 0, 7),
                slice(l2, 8, 15),
                slice(l2, 18, 29)
            );
            CheckDigitFlags {
                document_number: Some(verify_check_digit(slice(l1, 5, 14), char_at(l1, 14), false)),
                birth_date: Some(verify_check_digit(slice(l2, 0, 6), char_at(l2, 6), false)),
                expiry_date: Some(verify_check_digit(slice(l2, 8, 14), char_at(l2, 14), false)),
                personal_number: None,
                composite: Some(verify_check_digit(&composite_data, char_at(l2, 29), false)),
            }
        }
        DocumentFormat::TD3 => {
            let l2 = &lines[1];
            let composite_data = format!(
                "{}{}{}",
                slice(l2, 0, 10),
                slice(l2, 13, 20),
                slice(l2, 21, 43)
            );
            CheckDigitFlags {
                document_number: Some(verify_check_digit(slice(l2, 0, 9), char_at(l2, 9), false)),
                birth_date: Some(verify_check_digit(slice(l2, 13, 19), char_at(l2, 19), false)),
                expiry_date: Some(verify_check_digit(slice(l2, 21, 27), char_at(l2, 27), false)),
                personal_number: Some(verify_check_digit(slice(l2, 28, 42), char_at(l2, 42), true)),
                composite: Some(verify_check_digit(&composite_data, char_at(l2, 43), false)),
            }
        }
    }
}

pub struct MrzDecoder {
    tables: CorrectionTables,
}

impl Default for MrzDecoder {
    fn default() -> Self {
        MrzDecoder::new(DEFAULT_CORRECTIONS.clone())
    }
}

impl MrzDecoder {
    pub fn new(tables: CorrectionTables) -> Self {
        MrzDecoder { tables }
    }

    pub fn tables(&self) -> &CorrectionTables {
        &self.tables
    }

    /// Lines of the OCR text that look like MRZ lines after symbol correction.
    pub fn find_candidates(&self, text: &str) -> Vec<MrzCandidate> {
        text.lines()
            .filter_map(|line| {
                let raw: String = line
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .flat_map(|c| c.to_uppercase())
                    .collect();
                if raw.chars().count() < MIN_LINE_LENGTH {
                    return None;
                }

                let corrected = self.tables.normalize_line(&raw);
                let len = corrected.len();
                if MRZ_CHARSET.is_match(&corrected)
                    && corrected.contains('<')
                    && (MIN_LINE_LENGTH..=MAX_LINE_LENGTH).contains(&len)
                {
                    Some(MrzCandidate { raw, corrected })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Every TD1/TD3 group that can be anchored on a recognised first line.
    pub fn locate_groups(&self, candidates: &[MrzCandidate]) -> Vec<MrzGroup> {
        let mut groups = Vec::new();

        for (idx, candidate) in candidates.iter().enumerate() {
            let line = &candidate.corrected;
            let format = if TD1_FIRST_LINE.is_match(line) {
                DocumentFormat::TD1
            } else if TD3_FIRST_LINE.is_match(line) {
                DocumentFormat::TD3
            } else {
                continue;
            };

            let needed = format.mrz_lines();
            if idx + needed <= candidates.len() {
                groups.push(MrzGroup {
                    format,
                    lines: candidates[idx..idx + needed].to_vec(),
                });
            }
        }

        groups
    }

    /// Pad/truncate to the layout width and apply the position-aware
    /// corrections for each fixed range.
    pub fn normalize_group(&self, group: &MrzGroup) -> Vec<String> {
        let width = group.format.mrz_chars_per_line();
        let t = &self.tables;

        match group.format {
            DocumentFormat::TD1 => {
                let mut first = group.lines[0].corrected.clone();
                if first.starts_with("IMEX") {
                    first.insert(1, 'D');
                }
                let l1 = fit_line(&first, width);
                let l2 = fit_line(&group.lines[1].corrected, width);
                let l3 = fit_line(&group.lines[2].corrected, width);

                let l1 = format!(
                    "{}{}{}",
                    slice(&l1, 0, 5),
                    t.correct_range(slice(&l1, 5, 15), FieldContext::Digits),
                    slice(&l1, 15, 30)
                );
                let l2 = format!(
                    "{}{}{}{}{}{}",
                    t.correct_range(slice(&l2, 0, 7), FieldContext::Digits),
                    t.correct_range(slice(&l2, 7, 8), FieldContext::Sex),
                    t.correct_range(slice(&l2, 8, 15), FieldContext::Digits),
                    t.correct_range(slice(&l2, 15, 18), FieldContext::Letters),
                    slice(&l2, 18, 29),
                    t.correct_range(slice(&l2, 29, 30), FieldContext::Digits)
                );
                let l3 = t.correct_name_range(&l3);
                vec![l1, l2, fit_line(&l3, width)]
            }
            DocumentFormat::TD3 => {
                let l1 = fit_line(&group.lines[0].corrected, width);
                let l2 = fit_line(&group.lines[1].corrected, width);

                let l1 = format!(
                    "{}{}{}",
                    slice(&l1, 0, 2),
                    t.correct_range(slice(&l1, 2, 5), FieldContext::Letters),
                    t.correct_name_range(slice(&l1, 5, 44))
                );
                let l2 = format!(
                    "{}{}{}{}{}{}{}{}{}",
                    slice(&l2, 0, 9),
                    t.correct_range(slice(&l2, 9, 10), FieldContext::Digits),
                    t.correct_range(slice(&l2, 10, 13), FieldContext::Letters),
                    t.correct_range(slice(&l2, 13, 20), FieldContext::Digits),
                    t.correct_range(slice(&l2, 20, 21), FieldContext::Sex),
                    t.correct_range(slice(&l2, 21, 28), FieldContext::Digits),
                    slice(&l2, 28, 42),
                    t.correct_range(slice(&l2, 42, 43), FieldContext::Digits),
                    t.correct_range(slice(&l2, 43, 44), FieldContext::Digits)
                );
                vec![fit_line(&l1, width), l2]
            }
        }
    }

    /// Decode the best MRZ found in the OCR text.
    pub fn decode(&self, text: &str) -> MrzResult {
        let candidates = self.find_candidates(text);
        if candidates.is_empty() {
            debug!("No MRZ candidate lines in {} chars of OCR text", text.len());
            return MrzResult::failure(
                DocumentType::Unknown,
                Vec::new(),
                "No MRZ candidate lines found in OCR text",
            );
        }

        let groups = self.locate_groups(&candidates);
        let raw_lines: Vec<String> = candidates.iter().map(|c| c.corrected.clone()).collect();
        if groups.is_empty() {
            return MrzResult::failure(
                DocumentType::Unknown,
                raw_lines,
                format!(
                    "MRZ candidates do not match TD1 (3x30) or TD3 (2x44) layout: found {} candidate line(s)",
                    candidates.len()
                ),
            );
        }

        // Both OCR passes may contain an MRZ; keep the read with the best
        // score, preferring the later (dedicated MRZ pass) on ties.
        let best = groups
            .iter()
            .map(|group| self.decode_group(group))
            .max_by(|a, b| {
                let score = |r: &MrzResult| r.confidence + r.check_digits.valid_count() as f32 * 0.01;
                score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal)
            });

        match best {
            Some(result) => {
                info!(
                    "Decoded {} MRZ with confidence {:.2}",
                    result.document_type, result.confidence
                );
                result
            }
            None => MrzResult::failure(DocumentType::Unknown, raw_lines, "MRZ decoding failed"),
        }
    }

    /// Like [`MrzDecoder::decode`], but an undecodable MRZ is an error.
    pub fn try_decode(&self, text: &str) -> Result<MrzResult> {
        let result = self.decode(text);
        if result.success {
            Ok(result)
        } else {
            Err(CaptureError::MrzParsingError(
                result.error.unwrap_or_else(|| "MRZ decoding failed".to_string()),
            ))
        }
    }

    pub fn decode_group(&self, group: &MrzGroup) -> MrzResult {
        let lines = self.normalize_group(group);
        let check_digits = evaluate_check_digits(group.format, &lines);

        let mut result = match group.format {
            DocumentFormat::TD1 => Self::decode_td1(&lines),
            DocumentFormat::TD3 => Self::decode_td3(&lines),
        };
        result.check_digits = check_digits;
        result.raw_lines = lines;
        result.confidence = Self::score(&result);
        result
    }

    fn decode_td1(lines: &[String]) -> MrzResult {
        let (l1, l2, l3) = (&lines[0], &lines[1], &lines[2]);
        let names = split_names(l3);

        let document_number: String = slice(l1, 5, 14)
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();

        let sex = match char_at(l2, 7) {
            'H' => Some(Sex::M),
            'M' | 'F' => Some(Sex::F),
            _ => None,
        };

        let nationality = strip_filler(slice(l2, 15, 18));
        if nationality.as_deref() != Some("MEX") {
            debug!("TD1 nationality is {:?}, expected MEX", nationality);
        }

        MrzResult {
            success: true,
            document_type: DocumentType::Ine,
            document_number: if document_number.is_empty() { None } else { Some(document_number) },
            full_name: names.full_name,
            first_name: names.first_name,
            last_name: names.last_name,
            second_last_name: names.second_last_name,
            birth_date: parse_mrz_date(slice(l2, 0, 6), DateKind::Birth),
            sex,
            expiry_date: parse_mrz_date(slice(l2, 8, 14), DateKind::Expiry),
            nationality,
            issuing_country: strip_filler(slice(l1, 2, 5)),
            personal_number: strip_filler(slice(l2, 18, 29)),
            raw_lines: Vec::new(),
            confidence: 0.0,
            check_digits: CheckDigitFlags::default(),
            error: None,
        }
    }

    fn decode_td3(lines: &[String]) -> MrzResult {
        let (l1, l2) = (&lines[0], &lines[1]);
        let names = split_names(slice(l1, 5, 44));

        let sex = match char_at(l2, 20) {
            'M' => Some(Sex::M),
            'F' => Some(Sex::F),
            _ => None,
        };

        MrzResult {
            success: true,
            document_type: DocumentType::Passport,
            document_number: strip_filler(slice(l2, 0, 9)).map(|n| n.replace(' ', "")),
            full_name: names.full_name,
            first_name: names.first_name,
            last_name: names.last_name,
            second_last_name: names.second_last_name,
            birth_date: parse_mrz_date(slice(l2, 13, 19), DateKind::Birth),
            sex,
            expiry_date: parse_mrz_date(slice(l2, 21, 27), DateKind::Expiry),
            nationality: strip_filler(slice(l2, 10, 13)),
            issuing_country: strip_filler(slice(l1, 2, 5)),
            personal_number: strip_filler(slice(l2, 28, 42)).map(|n| n.replace(' ', "")),
            raw_lines: Vec::new(),
            confidence: 0.0,
            check_digits: CheckDigitFlags::default(),
            error: None,
        }
    }

    fn score(result: &MrzResult) -> f32 {
        let signals = [
            result.document_number.is_some(),
            result.birth_date.is_some(),
            result.expiry_date.is_some(),
            result.full_name.is_some(),
            result.check_digits.birth_date == Some(true),
            result.check_digits.expiry_date == Some(true),
        ];
        signals.iter().filter(|s| **s).count() as f32 / signals.len() as f32
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a TD3 line 2 with correct check digits.
    pub(crate) fn td3_line2(doc: &str, nat: &str, birth: &str, sex: char, expiry: &str, personal: &str) -> String {
        let doc = fit_line(doc, 9);
        let personal = fit_line(personal, 14);
        let doc_cd = calculate_check_digit(&doc);
        let birth_cd = calculate_check_digit(birth);
        let exp_cd = calculate_check_digit(expiry);
        let pers_cd = calculate_check_digit(&personal);
        let partial = format!("{}{}{}{}{}{}{}{}{}{}", doc, doc_cd, nat, birth, birth_cd, sex, expiry, exp_cd, personal, pers_cd);
        let composite = calculate_check_digit(&format!("{}{}{}", &partial[0..10], &partial[13..20], &partial[21..43]));
        format!("{}{}", partial, composite)
    }

    /// Build TD1 lines 1 and 2 with correct check digits.
    pub(crate) fn td1_lines(doc: &str, birth: &str, sex: char, expiry: &str) -> (String, String) {
        let doc_cd = calculate_check_digit(doc);
        let l1 = fit_line(&format!("IDMEX{}{}<<", doc, doc_cd), 30);
        let birth_cd = calculate_check_digit(birth);
        let exp_cd = calculate_check_digit(expiry);
        let partial = fit_line(&format!("{}{}{}{}{}MEX", birth, birth_cd, sex, expiry, exp_cd), 29);
        let composite = calculate_check_digit(&format!("{}{}{}{}", &l1[5..30], &partial[0..7], &partial[8..15], &partial[18..29]));
        (l1, format!("{}{}", partial, composite))
    }

    fn passport_text() -> String {
        let l1 = fit_line("P<MEXCHAIREZ<DE<LA<CRUZ<<DULCE<IVONNE", 44);
        let l2 = td3_line2("G39137153", "MEX", "831126", 'F', "290929", "");
        format!("ESTADOS UNIDOS MEXICANOS\nPASAPORTE\n{}\n{}\n", l1, l2)
    }

    #[test]
    fn test_try_decode_reports_parsing_error() {
        let err = MrzDecoder::default()
            .try_decode("CREDENCIAL PARA VOTAR\nGARCIA LOPEZ JUAN CARLOS")
            .unwrap_err();
        match err {
            CaptureError::MrzParsingError(message) => assert!(message.contains("No MRZ candidate")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_char_values() {
        assert_eq!(char_value('0'), Some(0));
        assert_eq!(char_value('9'), Some(9));
        assert_eq!(char_value('A'), Some(10));
        assert_eq!(char_value('Z'), Some(35));
        assert_eq!(char_value('<'), Some(0));
        assert_eq!(char_value('a'), None);
    }

    #[test]
    fn test_icao_reference_check_digits() {
        // ICAO 9303 part 3 specimen values.
        assert_eq!(calculate_check_digit("L898902C3"), 6);
        assert_eq!(calculate_check_digit("740812"), 2);
        assert_eq!(calculate_check_digit("120415"), 9);
        assert_eq!(calculate_check_digit("ZE184226B"), 1);
        assert_eq!(calculate_check_digit("<<<<<<<<<<<<<<"), 0);
    }

    #[test]
    fn test_check_digit_is_deterministic() {
        let data = "G39137153MEX831126";
        assert_eq!(calculate_check_digit(data), calculate_check_digit(data));
    }

    #[test]
    fn test_century_rule() {
        assert_eq!(parse_mrz_date("510101", DateKind::Birth).as_deref(), Some("1951-01-01"));
        assert_eq!(parse_mrz_date("490101", DateKind::Birth).as_deref(), Some("2049-01-01"));
        assert_eq!(parse_mrz_date("500101", DateKind::Birth).as_deref(), Some("2050-01-01"));
        assert_eq!(parse_mrz_date("990101", DateKind::Expiry).as_deref(), Some("2099-01-01"));
    }

    #[test]
    fn test_short_or_impossible_dates_are_absent() {
        assert_eq!(parse_mrz_date("8311", DateKind::Birth), None);
        assert_eq!(parse_mrz_date("8311<<", DateKind::Birth), None);
        assert_eq!(parse_mrz_date("831340", DateKind::Birth), None);
    }

    #[test]
    fn test_decode_td3_passport() {
        let result = MrzDecoder::default().decode(&passport_text());
        assert!(result.success);
        assert_eq!(result.document_type, DocumentType::Passport);
        assert_eq!(result.document_number.as_deref(), Some("G39137153"));
        assert_eq!(result.last_name.as_deref(), Some("CHAIREZ"));
        assert_eq!(result.second_last_name.as_deref(), Some("DE LA CRUZ"));
        assert_eq!(result.first_name.as_deref(), Some("DULCE IVONNE"));
        assert_eq!(result.birth_date.as_deref(), Some("1983-11-26"));
        assert_eq!(result.expiry_date.as_deref(), Some("2029-09-29"));
        assert_eq!(result.sex, Some(Sex::F));
        assert_eq!(result.personal_number, None);
        assert_eq!(result.check_digits.personal_number, Some(true));
        assert!(result.check_digits.all_valid());
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_single_flipped_check_digit_is_isolated() {
        let text = passport_text();
        let mut lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        let line2 = lines[3].clone();
        let mut chars: Vec<char> = line2.chars().collect();
        chars[19] = if chars[19] == '9' { '0' } else { '9' };
        lines[3] = chars.into_iter().collect();

        let result = MrzDecoder::default().decode(&lines.join("\n"));
        assert_eq!(result.check_digits.birth_date, Some(false));
        assert_eq!(result.check_digits.document_number, Some(true));
        assert_eq!(result.check_digits.expiry_date, Some(true));
        assert_eq!(result.check_digits.personal_number, Some(true));
        assert_eq!(result.birth_date.as_deref(), Some("1983-11-26"));
        assert_eq!(result.document_number.as_deref(), Some("G39137153"));
    }

    #[test]
    fn test_decode_td1_ine() {
        let (l1, l2) = td1_lines("123456789", "900115", 'H', "301231");
        let l3 = fit_line("PEREZ<GARCIA<<JUAN<CARLOS", 30);
        let text = format!("INSTITUTO NACIONAL ELECTORAL\n{}\n{}\n{}", l1, l2, l3);

        let result = MrzDecoder::default().decode(&text);
        assert!(result.success);
        assert_eq!(result.document_type, DocumentType::Ine);
        assert_eq!(result.document_number.as_deref(), Some("123456789"));
        assert_eq!(result.birth_date.as_deref(), Some("1990-01-15"));
        assert_eq!(result.expiry_date.as_deref(), Some("2030-12-31"));
        assert_eq!(result.sex, Some(Sex::M));
        assert_eq!(result.nationality.as_deref(), Some("MEX"));
        assert_eq!(result.last_name.as_deref(), Some("PEREZ"));
        assert_eq!(result.second_last_name.as_deref(), Some("GARCIA"));
        assert_eq!(result.first_name.as_deref(), Some("JUAN CARLOS"));
        assert_eq!(result.full_name.as_deref(), Some("JUAN CARLOS PEREZ GARCIA"));
        assert!(result.check_digits.all_valid());
        assert_eq!(result.check_digits.personal_number, None);
    }

    #[test]
    fn test_td1_mujer_maps_to_female_and_ocr_noise_is_corrected() {
        let (l1, l2) = td1_lines("123456789", "851230", 'M', "290101");
        let l3 = fit_line("LOPEZ<<MARIA", 30);
        // OCR read O for 0 in the dates and spaced the line.
        let noisy_l2 = l2.replacen('0', "O", 1);
        let text = format!("{}\n{}\n{}", l1, noisy_l2.replace("MEX", "M E X"), l3);

        let result = MrzDecoder::default().decode(&text);
        assert_eq!(result.sex, Some(Sex::F));
        assert_eq!(result.birth_date.as_deref(), Some("1985-12-30"));
        assert_eq!(result.check_digits.birth_date, Some(true));
    }

    #[test]
    fn test_no_filler_means_no_candidates() {
        let text = "INSTITUTO NACIONAL ELECTORAL CREDENCIAL PARA VOTAR\nNOMBRE JUAN PEREZ GARCIA DOMICILIO";
        let decoder = MrzDecoder::default();
        assert!(decoder.find_candidates(text).is_empty());
        let result = decoder.decode(text);
        assert!(!result.success);
        assert_eq!(result.document_type, DocumentType::Unknown);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_unanchored_candidates_fail_as_unknown() {
        let text = "XX<ABCDEFGHIJKLMNOPQRSTUV\nYY<ABCDEFGHIJKLMNOPQRSTUV";
        let result = MrzDecoder::default().decode(text);
        assert!(!result.success);
        assert_eq!(result.document_type, DocumentType::Unknown);
        assert_eq!(result.raw_lines.len(), 2);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let decoder = MrzDecoder::default();
        let text = passport_text();
        assert_eq!(decoder.decode(&text), decoder.decode(&text));
    }
}
