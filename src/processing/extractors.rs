// Label-driven field extraction from front-of-document OCR text.
// Values are read from the label's own line or the following lines; the MRZ
// decoder is the authoritative source whenever it has the same field.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::models::{DocumentType, ExtractedFields, Sex};
use crate::processing::corrections::{CorrectionTables, FieldContext, DEFAULT_CORRECTIONS};
use crate::utils::text::fold_accents;

const MAX_VALUE_LINES: usize = 3;

lazy_static! {
    static ref NAME_LABEL: Regex = Regex::new(r"\bNOMBRE\b").unwrap();
    static ref ADDRESS_LABEL: Regex = Regex::new(r"\bDOMICILIO\b").unwrap();
    static ref CURP_LABEL: Regex = Regex::new(r"\bCURP\b").unwrap();
    static ref ELECTOR_KEY_LABEL: Regex = Regex::new(r"\bCLAVE\s+DE\s+ELECTOR\b").unwrap();
    static ref BIRTH_DATE_LABEL: Regex =
        Regex::new(r"\bFECHA\s+DE\s+NACIMIENTO\b|\bDATE\s+OF\s+BIRTH\b").unwrap();
    static ref SEX_LABEL: Regex = Regex::new(r"\bSEXO?\b").unwrap();
    static ref VALIDITY_LABEL: Regex = Regex::new(r"\bVIGENCIA\b").unwrap();
    static ref SURNAME_LABEL: Regex = Regex::new(r"\bAPELLIDOS\b|\bSURNAMES?\b").unwrap();
    static ref GIVEN_NAMES_LABEL: Regex = Regex::new(r"\bNOMBRES\b|\bGIVEN\s+NAMES?\b").unwrap();
    static ref PASSPORT_NUMBER_LABEL: Regex =
        Regex::new(r"\bN(?:UMERO|O)\.?\s*DE\s+PASAPORTE\b|\bPASSPORT\s+N(?:O|UMBER)\b").unwrap();
    static ref EXPIRY_DATE_LABEL: Regex =
        Regex::new(r"\bFECHA\s+DE\s+(?:CADUCIDAD|VENCIMIENTO)\b|\bDATE\s+OF\s+EXPIRY\b").unwrap();

    // Every label printed on the documents, including ones whose values are
    // not extracted; a value never continues past one of these.
    static ref ANY_LABEL: Regex = Regex::new(concat!(
        r"\bN(?:UMERO|O)\.?\s*DE\s+PASAPORTE\b|\bPASSPORT\s+N(?:O|UMBER)\b",
        r"|\bFECHA\s+DE\s+(?:NACIMIENTO|CADUCIDAD|VENCIMIENTO|EXPEDICION)\b",
        r"|\bDATE\s+OF\s+(?:BIRTH|EXPIRY|ISSUE)\b|\bLUGAR\s+DE\s+NACIMIENTO\b|\bPLACE\s+OF\s+BIRTH\b",
        r"|\bCLAVE\s+DE\s+ELECTOR\b|\bANO\s+DE\s+REGISTRO\b|\bGIVEN\s+NAMES?\b",
        r"|\bNOMBRES?\b|\bAPELLIDOS\b|\bSURNAMES?\b|\bDOMICILIO\b|\bCURP\b|\bSEXO?\b|\bVIGENCIA\b",
        r"|\bEDAD\b|\bSECCION\b|\bEMISION\b|\bNACIONALIDAD\b|\bNATIONALITY\b|\bAUTORIDAD\b",
        r"|\bPASAPORTE\b|\bPASSPORT\b|\bMEXICANOS\b|\bINSTITUTO\b|\bCREDENCIAL\b"
    ))
    .unwrap();

    static ref INE_KEYWORDS: Regex = Regex::new(
        r"INSTITUTO\s+(?:NACIONAL|FEDERAL)\s+ELECTORAL|CREDENCIAL\s+PARA\s+VOTAR|CLAVE\s+DE\s+ELECTOR"
    )
    .unwrap();
    static ref PASSPORT_KEYWORDS: Regex = Regex::new(r"\bPASAPORTE\b|\bPASSPORT\b").unwrap();

    static ref CURP_STRICT: Regex = Regex::new(r"^[A-Z]{4}\d{6}[HM][A-Z]{5}[A-Z0-9]{2}$").unwrap();
    static ref ELECTOR_KEY_STRICT: Regex = Regex::new(r"^[A-Z]{6}\d{8}[HM]\d{3}$").unwrap();

    static ref ISO_DATE: Regex = Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap();
    static ref NUMERIC_DATE: Regex =
        Regex::new(r"\b(\d{1,2})[\s/.\-]+(\d{1,2})[\s/.\-]+(\d{4})\b").unwrap();
    static ref MONTH_NAME_DATE: Regex =
        Regex::new(r"\b(\d{1,2})[\s/.\-]*([A-Z]{3,4})(?:\s*/\s*[A-Z]{3,4})?[\s/.\-]*(\d{4})\b").unwrap();
    static ref YEAR: Regex = Regex::new(r"\b((?:19|20)\d{2})\b").unwrap();
}

const NAME_NOISE: &[char] = &[
    '.', ',', ';', ':', '|', '\'', '"', '`', '*', '_', '~', '!', '¡', '?', '¿', '(', ')', '[',
    ']', '{', '}', '<', '>', '«', '»', '/', '\\',
];

const SURNAME_PARTICLES: &[&str] = &["DE", "DEL", "LA", "LAS", "LOS", "Y", "SAN"];

/// Classify OCR text by the institutional wording printed on the document.
pub fn detect_document_type(text: &str) -> DocumentType {
    let folded = fold_accents(text).to_uppercase();
    if INE_KEYWORDS.is_match(&folded) {
        DocumentType::Ine
    } else if PASSPORT_KEYWORDS.is_match(&folded) {
        DocumentType::Passport
    } else {
        DocumentType::Unknown
    }
}

/// Whether `value` is a well-formed CURP.
pub fn is_curp(value: &str) -> bool {
    CURP_STRICT.is_match(value)
}

/// Parse a printed date (`DD/MM/YYYY`, `DD MM YYYY`, `DD MMM YYYY` with
/// Spanish or English month abbreviations, or ISO) into ISO form.
pub fn parse_label_date(text: &str) -> Option<String> {
    let text = fold_accents(text).to_uppercase();

    let (year, month, day) = if let Some(caps) = ISO_DATE.captures(&text) {
        (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    } else if let Some(caps) = NUMERIC_DATE.captures(&text) {
        (caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?)
    } else if let Some(caps) = MONTH_NAME_DATE.captures(&text) {
        (caps[3].parse().ok()?, month_number(&caps[2])?, caps[1].parse().ok()?)
    } else {
        return None;
    };

    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "ENE" | "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "ABR" | "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AGO" | "AUG" => 8,
        "SEP" | "SEPT" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DIC" | "DEC" => 12,
        _ => return None,
    };
    Some(month)
}

/// Strip OCR noise from a name line. Tokens that still contain anything but
/// letters (or an inner hyphen) are dropped; the result is uppercase.
pub fn clean_name(raw: &str) -> Option<String> {
    let tokens: Vec<String> = fold_accents(raw)
        .to_uppercase()
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| NAME_NOISE.contains(&c)).trim_matches('-'))
        .filter(|token| {
            !token.is_empty()
                && !token.contains("--")
                && token.chars().all(|c| c.is_alphabetic() || c == '-')
                && (token.chars().count() > 1 || *token == "Y")
        })
        .map(|token| token.to_string())
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Split a surname line into paternal and maternal surnames, keeping
/// particles (`DE LA`, `DEL`, ...) with the surname they introduce.
fn split_surnames(surnames: &str) -> (Option<String>, Option<String>) {
    let mut groups: Vec<String> = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for token in surnames.split_whitespace() {
        pending.push(token);
        if !SURNAME_PARTICLES.contains(&token) {
            groups.push(pending.join(" "));
            pending.clear();
        }
    }
    if !pending.is_empty() {
        match groups.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&pending.join(" "));
            }
            None => groups.push(pending.join(" ")),
        }
    }

    let mut groups = groups.into_iter();
    let paternal = groups.next();
    let rest: Vec<String> = groups.collect();
    (paternal, if rest.is_empty() { None } else { Some(rest.join(" ")) })
}

fn join_name(parts: &[&Option<String>]) -> Option<String> {
    let present: Vec<&str> = parts.iter().filter_map(|p| p.as_deref()).collect();
    if present.is_empty() {
        None
    } else {
        Some(present.join(" "))
    }
}

fn strip_labels(text: &str) -> String {
    ANY_LABEL
        .replace_all(text, " ")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '/' | '-' | '.' | ','))
        .to_string()
}

fn alphanumeric(token: &str) -> String {
    token.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Value candidates for the first line carrying `label`: the rest of that
/// line, then up to three following lines that are not labels themselves.
fn labelled_values(lines: &[String], label: &Regex) -> Vec<String> {
    for (idx, line) in lines.iter().enumerate() {
        if let Some(m) = label.find(line) {
            let mut values = Vec::new();
            let rest = strip_labels(&line[m.end()..]);
            if !rest.is_empty() {
                values.push(rest);
            }
            for next in lines.iter().skip(idx + 1).take(MAX_VALUE_LINES) {
                if ANY_LABEL.is_match(next) {
                    break;
                }
                values.push(next.clone());
            }
            return values;
        }
    }
    Vec::new()
}

fn tokens(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split_whitespace().map(alphanumeric).collect::<Vec<_>>())
        .filter(|t| !t.is_empty())
        .collect()
}

pub struct LabelExtractor {
    tables: CorrectionTables,
}

impl Default for LabelExtractor {
    fn default() -> Self {
        LabelExtractor::new(DEFAULT_CORRECTIONS.clone())
    }
}

impl LabelExtractor {
    pub fn new(tables: CorrectionTables) -> Self {
        LabelExtractor { tables }
    }

    pub fn extract(&self, text: &str, document_type: DocumentType) -> ExtractedFields {
        let lines: Vec<String> = text
            .lines()
            .map(|line| fold_accents(line).to_uppercase().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        let mut fields = ExtractedFields::default();
        self.extract_names(&lines, &mut fields);

        let address = labelled_values(&lines, &ADDRESS_LABEL).join(" ");
        fields.address = if address.trim().is_empty() { None } else { Some(address.trim().to_string()) };

        fields.curp = self.extract_curp(&lines);
        fields.elector_key = tokens(&labelled_values(&lines, &ELECTOR_KEY_LABEL))
            .iter()
            .find_map(|t| self.correct_elector_key(t));

        fields.birth_date = labelled_values(&lines, &BIRTH_DATE_LABEL)
            .iter()
            .find_map(|v| parse_label_date(v));
        fields.expiry_date = labelled_values(&lines, &EXPIRY_DATE_LABEL)
            .iter()
            .find_map(|v| parse_label_date(v))
            .or_else(|| Self::extract_validity(&lines));

        fields.sex = Self::extract_sex(&lines, document_type);
        fields.document_number = tokens(&labelled_values(&lines, &PASSPORT_NUMBER_LABEL))
            .into_iter()
            .find(|t| (6..=12).contains(&t.len()) && t.chars().filter(|c| c.is_ascii_digit()).count() >= 5);

        debug!("Label extraction: {:?}", fields);
        fields
    }

    fn extract_names(&self, lines: &[String], fields: &mut ExtractedFields) {
        // INE: NOMBRE followed by paternal surname, maternal surname, given names.
        let names: Vec<String> = labelled_values(lines, &NAME_LABEL)
            .iter()
            .map_while(|v| clean_name(v))
            .collect();
        match names.len() {
            0 => {}
            1 => fields.full_name = Some(names[0].clone()),
            2 => {
                fields.last_name = Some(names[0].clone());
                fields.first_name = Some(names[1].clone());
            }
            _ => {
                fields.last_name = Some(names[0].clone());
                fields.second_last_name = Some(names[1].clone());
                fields.first_name = Some(names[2..].join(" "));
            }
        }

        // Passport: separate surname and given-name labels.
        let surnames = labelled_values(lines, &SURNAME_LABEL).iter().find_map(|v| clean_name(v));
        let given = labelled_values(lines, &GIVEN_NAMES_LABEL).iter().find_map(|v| clean_name(v));
        if let Some(surnames) = surnames {
            let (paternal, maternal) = split_surnames(&surnames);
            fields.last_name = paternal;
            fields.second_last_name = maternal;
        }
        if given.is_some() {
            fields.first_name = given;
        }

        if fields.first_name.is_some() || fields.last_name.is_some() {
            fields.full_name = join_name(&[&fields.first_name, &fields.last_name, &fields.second_last_name]);
        }
    }

    fn extract_curp(&self, lines: &[String]) -> Option<String> {
        let labelled = tokens(&labelled_values(lines, &CURP_LABEL));
        labelled
            .into_iter()
            .chain(tokens(lines))
            .filter(|t| t.len() == 18)
            .find_map(|t| self.correct_curp(&t))
    }

    /// Position-aware CURP repair: letters at 0-3 and 11-15, digits at 4-9.
    pub fn correct_curp(&self, candidate: &str) -> Option<String> {
        if candidate.len() != 18 || !candidate.is_ascii() {
            return None;
        }
        let t = &self.tables;
        let corrected = format!(
            "{}{}{}{}{}",
            t.correct_range(&candidate[0..4], FieldContext::Letters),
            t.correct_range(&candidate[4..10], FieldContext::Digits),
            &candidate[10..11],
            t.correct_range(&candidate[11..16], FieldContext::Letters),
            &candidate[16..18]
        );
        if CURP_STRICT.is_match(&corrected) {
            Some(corrected)
        } else {
            None
        }
    }

    fn correct_elector_key(&self, candidate: &str) -> Option<String> {
        if candidate.len() != 18 || !candidate.is_ascii() {
            return None;
        }
        let t = &self.tables;
        let corrected = format!(
            "{}{}{}{}",
            t.correct_range(&candidate[0..6], FieldContext::Letters),
            t.correct_range(&candidate[6..14], FieldContext::Digits),
            &candidate[14..15],
            t.correct_range(&candidate[15..18], FieldContext::Digits)
        );
        if ELECTOR_KEY_STRICT.is_match(&corrected) {
            Some(corrected)
        } else {
            None
        }
    }

    /// INE cards print a validity year or a `YYYY-YYYY` range; the card is
    /// valid through December 31 of the final year.
    fn extract_validity(lines: &[String]) -> Option<String> {
        labelled_values(lines, &VALIDITY_LABEL).iter().find_map(|v| {
            YEAR.captures_iter(v)
                .filter_map(|caps| caps[1].parse::<i32>().ok())
                .last()
                .map(|year| format!("{}-12-31", year))
        })
    }

    /// INE prints H (hombre) / M (mujer); passports print M / F.
    fn extract_sex(lines: &[String], document_type: DocumentType) -> Option<Sex> {
        tokens(&labelled_values(lines, &SEX_LABEL))
            .iter()
            .find_map(|t| match (t.as_str(), document_type) {
                ("H", _) => Some(Sex::M),
                ("F", _) => Some(Sex::F),
                ("M", DocumentType::Passport) => Some(Sex::M),
                ("M", _) => Some(Sex::F),
                _ => None,
            })
    }
}
