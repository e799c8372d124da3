// Structural document validation: MRZ shape, character set, page proportions
// and check digits. Uses only the OCR text and the image size, never the
// personal data being verified.

use log::debug;

use crate::config::ValidationConfig;
use crate::models::{
    DocumentFormat, DocumentType, DocumentValidationResult, IssueKind, ValidationChecks, ValidationIssue,
};
use crate::processing::corrections::CorrectionTables;
use crate::processing::mrz::{evaluate_check_digits, MrzCandidate, MrzDecoder, MrzGroup, MRZ_CHARSET};

const WEIGHT_HAS_MRZ: f32 = 0.25;
const WEIGHT_LINE_COUNT: f32 = 0.15;
const WEIGHT_LINE_LENGTH: f32 = 0.10;
const WEIGHT_CHARACTERS: f32 = 0.15;
const WEIGHT_ASPECT_RATIO: f32 = 0.10;
const WEIGHT_CHECK_DIGITS: f32 = 0.25;

/// Average candidate length at or above which an unanchored MRZ is read as TD3.
const TD3_LENGTH_SPLIT: f32 = 37.0;

pub struct StructuralValidator {
    decoder: MrzDecoder,
    config: ValidationConfig,
}

impl StructuralValidator {
    pub fn new(tables: CorrectionTables, config: ValidationConfig) -> Self {
        StructuralValidator {
            decoder: MrzDecoder::new(tables),
            config,
        }
    }

    pub fn validate(&self, text: &str, width: u32, height: u32, hint: Option<DocumentType>) -> DocumentValidationResult {
        let mut checks = ValidationChecks::default();
        let mut issues = Vec::new();

        let candidates = self.decoder.find_candidates(text);
        checks.has_mrz = !candidates.is_empty();
        if !checks.has_mrz {
            issues.push(ValidationIssue::new(IssueKind::Mrz, "No machine readable zone found"));
        }

        let (format, lines) = self.classify(&candidates, hint);

        if let Some(format) = format {
            checks.correct_line_count = lines.len() == format.mrz_lines();
            if !checks.correct_line_count {
                issues.push(ValidationIssue::new(
                    IssueKind::Format,
                    format!("Expected {} MRZ lines, found {}", format.mrz_lines(), lines.len()),
                ));
            }

            let expected = format.mrz_chars_per_line();
            let tolerance = self.config.line_length_tolerance;
            checks.correct_line_length = !lines.is_empty()
                && lines
                    .iter()
                    .all(|l| l.corrected.len().abs_diff(expected) <= tolerance);
            if !checks.correct_line_length {
                let lengths: Vec<usize> = lines.iter().map(|l| l.corrected.len()).collect();
                issues.push(ValidationIssue::new(
                    IssueKind::Format,
                    format!("MRZ line lengths {:?} do not match {} characters", lengths, expected),
                ));
            }
        }

        checks.valid_characters = !lines.is_empty() && lines.iter().all(|l| MRZ_CHARSET.is_match(&l.raw));
        if checks.has_mrz && !checks.valid_characters {
            issues.push(ValidationIssue::new(
                IssueKind::Mrz,
                "MRZ contains characters outside A-Z, 0-9 and <",
            ));
        }

        let document_type = format.map(|f| f.document_type()).or(hint);
        checks.correct_aspect_ratio = self.aspect_ratio_matches(document_type, width, height);
        if !checks.correct_aspect_ratio {
            let nominal = document_type
                .and_then(|t| t.format())
                .map(|f| format!(" (nominal {:.2})", f.aspect_ratio()))
                .unwrap_or_default();
            issues.push(ValidationIssue::new(
                IssueKind::AspectRatio,
                format!("Image proportions {}x{} do not match the document type{}", width, height, nominal),
            ));
        }

        if let Some(format) = format {
            checks.total_check_digits = format.check_digit_count();
            // Fixed positions are meaningless when the line shape is wrong.
            if checks.correct_line_count && checks.correct_line_length {
                let normalized = self.decoder.normalize_group(&MrzGroup {
                    format,
                    lines: lines.clone(),
                });
                checks.valid_check_digit_count = evaluate_check_digits(format, &normalized).valid_count();
            }
            checks.check_digits_valid = checks.total_check_digits > 0
                && checks.valid_check_digit_count * 2 >= checks.total_check_digits;
            if !checks.check_digits_valid {
                issues.push(ValidationIssue::new(
                    IssueKind::CheckDigit,
                    format!(
                        "{} of {} check digits valid",
                        checks.valid_check_digit_count, checks.total_check_digits
                    ),
                ));
            }
        }

        let confidence = Self::score(&checks);
        let is_valid = checks.has_mrz && checks.correct_line_count && checks.check_digits_valid;
        debug!("Structural validation: valid={} confidence={:.2}", is_valid, confidence);

        DocumentValidationResult {
            is_valid,
            confidence,
            format,
            checks,
            issues,
        }
    }

    /// Layout of the MRZ and the lines belonging to it. Anchored groups win;
    /// otherwise the caller's hint, then the average line length decides.
    fn classify(&self, candidates: &[MrzCandidate], hint: Option<DocumentType>) -> (Option<DocumentFormat>, Vec<MrzCandidate>) {
        let groups = self.decoder.locate_groups(candidates);
        let best = groups
            .iter()
            .map(|group| (group, self.decoder.decode_group(group)))
            .max_by(|(_, a), (_, b)| {
                let score = |r: &crate::models::MrzResult| r.confidence + r.check_digits.valid_count() as f32 * 0.01;
                score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal)
            });

        if let Some((group, _)) = best {
            return (Some(group.format), group.lines.clone());
        }
        if candidates.is_empty() {
            return (hint.and_then(|h| h.format()), Vec::new());
        }

        let format = hint.and_then(|h| h.format()).unwrap_or_else(|| {
            let average = candidates.iter().map(|c| c.corrected.len()).sum::<usize>() as f32 / candidates.len() as f32;
            if average >= TD3_LENGTH_SPLIT {
                DocumentFormat::TD3
            } else {
                DocumentFormat::TD1
            }
        });
        (Some(format), candidates.to_vec())
    }

    fn aspect_ratio_matches(&self, document_type: Option<DocumentType>, width: u32, height: u32) -> bool {
        let (long, short) = (width.max(height) as f32, width.min(height) as f32);
        if short <= 0.0 {
            return false;
        }
        let ratio = long / short;
        let band = match document_type {
            Some(DocumentType::Ine) => self.config.ine_aspect_ratio,
            Some(DocumentType::Passport) => self.config.passport_aspect_ratio,
            _ => return false,
        };
        ratio >= band.0 && ratio <= band.1
    }

    fn score(checks: &ValidationChecks) -> f32 {
        let weighted = [
            (checks.has_mrz, WEIGHT_HAS_MRZ),
            (checks.correct_line_count, WEIGHT_LINE_COUNT),
            (checks.correct_line_length, WEIGHT_LINE_LENGTH),
            (checks.valid_characters, WEIGHT_CHARACTERS),
            (checks.correct_aspect_ratio, WEIGHT_ASPECT_RATIO),
            (checks.check_digits_valid, WEIGHT_CHECK_DIGITS),
        ];
        weighted
            .iter()
            .filter(|(passed, _)| *passed)
            .map(|(_, weight)| weight)
            .sum::<f32>()
            .min(1.0)
    }
}

impl Default for StructuralValidator {
    fn default() -> Self {
        StructuralValidator::new(CorrectionTables::default(), ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::mrz::calculate_check_digit;

    fn pad(line: &str, width: usize) -> String {
        format!("{:<<width$}", line, width = width)
    }

    fn td1_text() -> String {
        let doc = "123456789";
        let l1 = pad(&format!("IDMEX{}{}", doc, calculate_check_digit(doc)), 30);
        let partial = pad(
            &format!(
                "900115{}H300101{}MEX",
                calculate_check_digit("900115"),
                calculate_check_digit("300101")
            ),
            29,
        );
        let composite = calculate_check_digit(&format!(
            "{}{}{}{}",
            &l1[5..30],
            &partial[0..7],
            &partial[8..15],
            &partial[18..29]
        ));
        let l2 = format!("{}{}", partial, composite);
        let l3 = pad("GARCIA<LOPEZ<<JUAN<CARLOS", 30);
        format!("INSTITUTO NACIONAL ELECTORAL\n{}\n{}\n{}\n", l1, l2, l3)
    }

    #[test]
    fn test_well_formed_ine_scores_full_marks() {
        let result = StructuralValidator::default().validate(&td1_text(), 1600, 1000, None);
        assert!(result.is_valid, "{:?}", result.issues);
        assert_eq!(result.format, Some(DocumentFormat::TD1));
        assert_eq!(result.checks.valid_check_digit_count, 4);
        assert_eq!(result.checks.total_check_digits, 4);
        assert!((result.confidence - 1.0).abs() < 1e-6);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_wrong_aspect_ratio_only_costs_its_weight() {
        let result = StructuralValidator::default().validate(&td1_text(), 1000, 1000, None);
        assert!(result.is_valid);
        assert!(!result.checks.correct_aspect_ratio);
        assert!((result.confidence - 0.9).abs() < 1e-6);
        assert_eq!(result.issues[0].kind, IssueKind::AspectRatio);
        assert!(result.issues[0].message.contains("nominal 1.59"), "{}", result.issues[0].message);
    }

    #[test]
    fn test_short_td3_lines_fail() {
        let text = "P<MEXGARCIA<<JUAN<<<<<<<<<<<<<\nG391371536MEX8311269F2909299<";
        let result = StructuralValidator::default().validate(text, 1250, 880, None);
        assert_eq!(result.format, Some(DocumentFormat::TD3));
        assert!(result.checks.has_mrz);
        assert!(!result.checks.correct_line_length);
        assert!(!result.checks.check_digits_valid);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_no_filler_means_no_mrz() {
        let text = "INSTITUTO NACIONAL ELECTORAL\nCREDENCIAL PARA VOTAR\nGARCIA LOPEZ JUAN CARLOS";
        let result = StructuralValidator::default().validate(text, 1600, 1000, Some(DocumentType::Ine));
        assert!(!result.checks.has_mrz);
        assert!(!result.is_valid);
        // only the aspect ratio matches the hinted INE
        assert!((result.confidence - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let validator = StructuralValidator::default();
        let text = td1_text();
        assert_eq!(validator.validate(&text, 1600, 1000, None), validator.validate(&text, 1600, 1000, None));
    }
}
