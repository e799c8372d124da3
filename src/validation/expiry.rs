use chrono::{Local, NaiveDate};
use log::warn;

use crate::models::{IssueKind, ValidationIssue};
use crate::processing::extractors::parse_label_date;

/// Outcome of checking every expiry date a document exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryCheck {
    pub is_expired: bool,
    /// Earliest expiry date that could be parsed, ISO formatted.
    pub earliest: Option<String>,
    pub issues: Vec<ValidationIssue>,
}

pub struct ExpiryValidator;

impl ExpiryValidator {
    pub fn today() -> NaiveDate {
        Local::now().naive_local().date()
    }

    /// A document is expired when any of its expiry dates lies strictly
    /// before `today`. Unparseable dates are reported but never expire it.
    pub fn check(dates: &[Option<&str>], today: NaiveDate) -> ExpiryCheck {
        let mut issues = Vec::new();
        let mut parsed: Vec<NaiveDate> = Vec::new();

        for raw in dates.iter().flatten() {
            match Self::parse_date(raw) {
                Some(date) => parsed.push(date),
                None => {
                    warn!("Unparseable expiry date: {}", raw);
                    issues.push(ValidationIssue::new(
                        IssueKind::Expiry,
                        format!("Invalid expiry date format: {}", raw),
                    ));
                }
            }
        }

        let earliest = parsed.iter().min().copied();
        let is_expired = earliest.map_or(false, |date| date < today);
        if is_expired {
            issues.push(ValidationIssue::new(IssueKind::Expiry, "Document has expired"));
        }

        ExpiryCheck {
            is_expired,
            earliest: earliest.map(|d| d.format("%Y-%m-%d").to_string()),
            issues,
        }
    }

    pub fn is_expired(date: &str, today: NaiveDate) -> bool {
        Self::parse_date(date).map_or(false, |d| d < today)
    }

    // ISO dates from the MRZ, or anything the label parser understands.
    fn parse_date(date_str: &str) -> Option<NaiveDate> {
        let iso = parse_label_date(date_str)?;
        NaiveDate::parse_from_str(&iso, "%Y-%m-%d").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_expiry_is_strictly_before_today() {
        let today = day(2026, 10, 19);
        assert!(ExpiryValidator::is_expired("2026-10-18", today));
        assert!(!ExpiryValidator::is_expired("2026-10-19", today));
        assert!(!ExpiryValidator::is_expired("2030-01-01", today));
    }

    #[test]
    fn test_any_past_source_expires_the_document() {
        let check = ExpiryValidator::check(&[Some("2031-01-01"), Some("2020-12-31")], day(2026, 10, 19));
        assert!(check.is_expired);
        assert_eq!(check.earliest.as_deref(), Some("2020-12-31"));
        assert_eq!(check.issues.len(), 1);
    }

    #[test]
    fn test_missing_and_garbled_dates_do_not_expire() {
        let check = ExpiryValidator::check(&[None, Some("VIGENCIA")], day(2026, 10, 19));
        assert!(!check.is_expired);
        assert_eq!(check.earliest, None);
        assert_eq!(check.issues[0].kind, IssueKind::Expiry);
    }
}
