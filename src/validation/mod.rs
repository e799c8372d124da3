pub mod compare;
pub mod expiry;
pub mod format;
pub mod structure;
pub mod verdict;

pub use compare::{compare_fields, comparisons_agree, values_match};
pub use expiry::{ExpiryCheck, ExpiryValidator};
pub use format::{FieldCoverage, FormatValidator};
pub use structure::StructuralValidator;
pub use verdict::{decide, overall_confidence, Verdict};
