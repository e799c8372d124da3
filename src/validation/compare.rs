// Cross-validation of extracted fields against the identity the caller expects.

use log::debug;

use crate::models::{DocumentType, ExtractedFields, Field, FieldComparison, MatchState, PersonalData};
use crate::processing::extractors::parse_label_date;
use crate::utils::text::normalize_for_match;

/// Accent, case and punctuation insensitive match. One side containing the
/// other counts, so a single given name matches "JUAN CARLOS".
pub fn values_match(extracted: &str, expected: &str) -> bool {
    let a = normalize_for_match(extracted);
    let b = normalize_for_match(expected);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

fn normalize_date(value: &str) -> String {
    parse_label_date(value).unwrap_or_else(|| value.to_string())
}

fn compare(field: Field, extracted: Option<String>, expected: Option<&String>) -> Option<FieldComparison> {
    let expected = expected.filter(|v| !v.trim().is_empty())?;
    let is_date = matches!(field, Field::BirthDate | Field::ExpiryDate);

    let matches = match &extracted {
        None => MatchState::Unknown,
        Some(value) if is_date => {
            if normalize_date(value) == normalize_date(expected) {
                MatchState::Match
            } else {
                MatchState::Mismatch
            }
        }
        Some(value) if values_match(value, expected) => MatchState::Match,
        Some(_) => MatchState::Mismatch,
    };

    Some(FieldComparison {
        field,
        label: field.label().to_string(),
        extracted_value: extracted,
        expected_value: Some(expected.clone()),
        matches,
    })
}

/// One comparison per expected value the caller supplied.
pub fn compare_fields(fields: &ExtractedFields, expected: &PersonalData, document_type: DocumentType) -> Vec<FieldComparison> {
    let document_number = match document_type {
        DocumentType::Passport => expected.passport_number.as_ref(),
        DocumentType::Ine | DocumentType::Unknown => expected.ine_document_number.as_ref(),
    };

    let pairs = [
        (Field::FirstName, expected.first_name.as_ref()),
        (Field::LastName, expected.last_name.as_ref()),
        (Field::SecondLastName, expected.second_last_name.as_ref()),
        (Field::Curp, expected.curp.as_ref()),
        (Field::BirthDate, expected.birth_date.as_ref()),
        (Field::ExpiryDate, expected.expiry_date.as_ref()),
        (Field::DocumentNumber, document_number),
    ];

    let comparisons: Vec<FieldComparison> = pairs
        .iter()
        .filter_map(|(field, value)| compare(*field, fields.get(*field), *value))
        .collect();

    debug!(
        "Compared {} field(s), {} matched",
        comparisons.len(),
        comparisons.iter().filter(|c| c.matches == MatchState::Match).count()
    );
    comparisons
}

/// Data matches when at least half of the decided comparisons do. Fields
/// that could not be read count for neither side; vacuously true when
/// nothing was decided.
pub fn comparisons_agree(comparisons: &[FieldComparison]) -> bool {
    let matched = comparisons.iter().filter(|c| c.matches == MatchState::Match).count();
    let mismatched = comparisons.iter().filter(|c| c.matches == MatchState::Mismatch).count();
    matched * 2 >= matched + mismatched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> ExtractedFields {
        ExtractedFields {
            first_name: Some("JUAN CARLOS".to_string()),
            last_name: Some("GARCIA".to_string()),
            curp: Some("GALJ900115HDFRPN09".to_string()),
            birth_date: Some("1990-01-15".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_fuzzy_name_and_date_matching() {
        let expected = PersonalData {
            first_name: Some("Juan".to_string()),
            last_name: Some("García".to_string()),
            birth_date: Some("15/01/1990".to_string()),
            ..Default::default()
        };
        let comparisons = compare_fields(&fields(), &expected, DocumentType::Ine);
        assert_eq!(comparisons.len(), 3);
        assert!(comparisons.iter().all(|c| c.matches == MatchState::Match));
        assert!(comparisons_agree(&comparisons));
    }

    #[test]
    fn test_absent_extracted_value_is_unknown() {
        let expected = PersonalData {
            second_last_name: Some("LOPEZ".to_string()),
            ine_document_number: Some("123456789".to_string()),
            passport_number: Some("G39137153".to_string()),
            ..Default::default()
        };
        let comparisons = compare_fields(&fields(), &expected, DocumentType::Ine);
        assert_eq!(comparisons.len(), 2);
        assert!(comparisons.iter().all(|c| c.matches == MatchState::Unknown));
        assert_eq!(comparisons[1].expected_value.as_deref(), Some("123456789"));
        assert!(comparisons_agree(&comparisons));
    }

    #[test]
    fn test_unreadable_fields_do_not_outvote_a_match() {
        let expected = PersonalData {
            first_name: Some("Juan".to_string()),
            second_last_name: Some("De la Cruz".to_string()),
            ine_document_number: Some("123456789".to_string()),
            ..Default::default()
        };
        let comparisons = compare_fields(&fields(), &expected, DocumentType::Ine);
        let states: Vec<MatchState> = comparisons.iter().map(|c| c.matches).collect();
        assert_eq!(states, vec![MatchState::Match, MatchState::Unknown, MatchState::Unknown]);
        assert!(comparisons_agree(&comparisons));
    }

    #[test]
    fn test_mismatch_outweighs_match_once_unknowns_are_ignored() {
        let expected = PersonalData {
            first_name: Some("Juan".to_string()),
            last_name: Some("Sanchez".to_string()),
            curp: Some("PEMA850101MDFRRN02".to_string()),
            second_last_name: Some("LOPEZ".to_string()),
            ..Default::default()
        };
        let comparisons = compare_fields(&fields(), &expected, DocumentType::Ine);
        assert_eq!(comparisons.iter().filter(|c| c.matches == MatchState::Unknown).count(), 1);
        assert!(!comparisons_agree(&comparisons));
    }

    #[test]
    fn test_accents_beyond_spanish_fold_to_their_base_letter() {
        assert!(values_match("JOÃO", "Joao"));
        assert!(values_match("Åsa", "ASA"));
        assert!(!values_match("Åsa", "SA BERG"));
        assert!(values_match("Søren Ýr", "SOREN YR"));
    }

    #[test]
    fn test_different_curp_is_mismatch() {
        let expected = PersonalData {
            curp: Some("PEMA850101MDFRRN02".to_string()),
            ..Default::default()
        };
        let comparisons = compare_fields(&fields(), &expected, DocumentType::Ine);
        assert_eq!(comparisons[0].matches, MatchState::Mismatch);
    }

    #[test]
    fn test_no_expected_data_agrees() {
        let comparisons = compare_fields(&fields(), &PersonalData::default(), DocumentType::Passport);
        assert!(comparisons.is_empty());
        assert!(comparisons_agree(&comparisons));
    }
}
