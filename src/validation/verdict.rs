use crate::models::{DocumentRules, Field, FieldComparison, MatchState, ValidationOutcome};
use crate::validation::expiry::ExpiryCheck;
use crate::validation::format::FieldCoverage;

const OCR_WEIGHT: f32 = 0.3;
const MRZ_WEIGHT: f32 = 0.4;
const FIELDS_WEIGHT: f32 = 0.3;

/// Final decision on a read page.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub confidence: f32,
    pub is_valid: bool,
    pub is_expired: bool,
    pub outcome: ValidationOutcome,
    pub message: String,
}

pub fn overall_confidence(ocr_confidence: f32, mrz_confidence: f32, found_ratio: f32) -> f32 {
    (OCR_WEIGHT * ocr_confidence.clamp(0.0, 1.0)
        + MRZ_WEIGHT * mrz_confidence.clamp(0.0, 1.0)
        + FIELDS_WEIGHT * found_ratio.clamp(0.0, 1.0))
    .clamp(0.0, 1.0)
}

/// Valid means confident, readable, consistent with the expected data and
/// not expired. The reported outcome follows that precedence in reverse:
/// expiry first, then readability, data agreement and confidence.
pub fn decide(
    confidence: f32,
    min_confidence: f32,
    coverage: &FieldCoverage,
    rules: &DocumentRules,
    comparisons: &[FieldComparison],
    expiry: &ExpiryCheck,
) -> Verdict {
    let confident = confidence > min_confidence;
    let readable = coverage.is_readable();
    let agrees = crate::validation::compare::comparisons_agree(comparisons);
    let is_valid = confident && readable && agrees && !expiry.is_expired;

    let (outcome, message) = if expiry.is_expired {
        let message = match &expiry.earliest {
            Some(date) => format!("The document expired on {}. Please present a current document.", date),
            None => "The document has expired. Please present a current document.".to_string(),
        };
        (ValidationOutcome::Expired, message)
    } else if !readable {
        (
            ValidationOutcome::Unreadable,
            format!(
                "Could not read {}. Please recapture the document with better lighting.",
                labels(&coverage.missing_critical(rules))
            ),
        )
    } else if !agrees {
        let mismatched: Vec<Field> = comparisons
            .iter()
            .filter(|c| c.matches == MatchState::Mismatch)
            .map(|c| c.field)
            .collect();
        (
            ValidationOutcome::DataMismatch,
            format!(
                "The document does not match the provided data ({}). Please check the information.",
                labels(&mismatched)
            ),
        )
    } else if !confident {
        (
            ValidationOutcome::LowConfidence,
            format!(
                "Reading confidence is too low ({:.0}%). Please recapture the document.",
                confidence * 100.0
            ),
        )
    } else {
        (ValidationOutcome::Valid, "Document validated successfully.".to_string())
    };

    Verdict {
        confidence,
        is_valid,
        is_expired: expiry.is_expired,
        outcome,
        message,
    }
}

fn labels(fields: &[Field]) -> String {
    fields.iter().map(|f| f.label()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;

    fn coverage(critical_found: usize) -> FieldCoverage {
        FieldCoverage {
            found_fields: vec![Field::Curp],
            missing_fields: vec![Field::FullName],
            critical_found,
            critical_total: 2,
            issues: Vec::new(),
        }
    }

    fn not_expired() -> ExpiryCheck {
        ExpiryCheck {
            is_expired: false,
            earliest: Some("2030-12-31".to_string()),
            issues: Vec::new(),
        }
    }

    fn mismatch() -> FieldComparison {
        FieldComparison {
            field: Field::Curp,
            label: "CURP".to_string(),
            extracted_value: Some("A".to_string()),
            expected_value: Some("B".to_string()),
            matches: MatchState::Mismatch,
        }
    }

    #[test]
    fn test_overall_confidence_weights() {
        assert!((overall_confidence(1.0, 1.0, 1.0) - 1.0).abs() < 1e-6);
        assert!((overall_confidence(0.5, 0.0, 0.5) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_must_exceed_threshold() {
        let rules = DocumentRules::for_document(DocumentType::Ine);
        let verdict = decide(0.40, 0.40, &coverage(2), &rules, &[], &not_expired());
        assert!(!verdict.is_valid);
        assert_eq!(verdict.outcome, ValidationOutcome::LowConfidence);
        assert!(verdict.message.contains("40%"));
    }

    #[test]
    fn test_expired_wins_over_everything() {
        let rules = DocumentRules::for_document(DocumentType::Ine);
        let expiry = ExpiryCheck {
            is_expired: true,
            earliest: Some("2020-12-31".to_string()),
            issues: Vec::new(),
        };
        let verdict = decide(0.1, 0.40, &coverage(0), &rules, &[mismatch()], &expiry);
        assert_eq!(verdict.outcome, ValidationOutcome::Expired);
        assert!(verdict.is_expired);
        assert!(verdict.message.contains("2020-12-31"));
    }

    #[test]
    fn test_unreadable_before_mismatch() {
        let rules = DocumentRules::for_document(DocumentType::Ine);
        let unreadable = FieldCoverage {
            found_fields: Vec::new(),
            missing_fields: vec![Field::Curp, Field::FullName],
            critical_found: 0,
            critical_total: 2,
            issues: Vec::new(),
        };
        let verdict = decide(0.9, 0.40, &unreadable, &rules, &[mismatch()], &not_expired());
        assert_eq!(verdict.outcome, ValidationOutcome::Unreadable);
        assert!(verdict.message.contains("CURP"));

        let verdict = decide(0.9, 0.40, &coverage(1), &rules, &[mismatch()], &not_expired());
        assert_eq!(verdict.outcome, ValidationOutcome::DataMismatch);
    }

    #[test]
    fn test_valid_document() {
        let rules = DocumentRules::for_document(DocumentType::Ine);
        let verdict = decide(0.8, 0.40, &coverage(2), &rules, &[], &not_expired());
        assert!(verdict.is_valid);
        assert_eq!(verdict.outcome, ValidationOutcome::Valid);
    }
}
