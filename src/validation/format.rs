use crate::models::{DocumentRules, ExtractedFields, Field, IssueKind, ValidationIssue};

/// Which of a document's expected fields were recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCoverage {
    pub found_fields: Vec<Field>,
    pub missing_fields: Vec<Field>,
    pub critical_found: usize,
    pub critical_total: usize,
    pub issues: Vec<ValidationIssue>,
}

impl FieldCoverage {
    /// At least half of the critical fields were read.
    pub fn is_readable(&self) -> bool {
        self.critical_total == 0 || self.critical_found * 2 >= self.critical_total
    }

    pub fn found_ratio(&self) -> f32 {
        let total = self.found_fields.len() + self.missing_fields.len();
        if total == 0 {
            0.0
        } else {
            self.found_fields.len() as f32 / total as f32
        }
    }

    pub fn missing_critical(&self, rules: &DocumentRules) -> Vec<Field> {
        rules
            .critical_fields
            .iter()
            .filter(|f| self.missing_fields.contains(f))
            .copied()
            .collect()
    }
}

pub struct FormatValidator;

impl FormatValidator {
    pub fn validate(fields: &ExtractedFields, rules: &DocumentRules) -> FieldCoverage {
        let present = |field: &Field| fields.get(*field).map_or(false, |v| !v.trim().is_empty());

        let (found_fields, missing_fields): (Vec<Field>, Vec<Field>) =
            rules.reported_fields.iter().copied().partition(present);

        let critical_found = rules.critical_fields.iter().filter(|f| present(*f)).count();
        let issues = rules
            .critical_fields
            .iter()
            .filter(|f| !present(*f))
            .map(|f| ValidationIssue::new(IssueKind::Format, format!("{} is missing", f.label())))
            .collect();

        FieldCoverage {
            found_fields,
            missing_fields,
            critical_found,
            critical_total: rules.critical_fields.len(),
            issues,
        }
    }
}
