use serde::{Deserialize, Serialize};

use crate::models::rules::Field;
use crate::utils::geometry::{self, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    Ine,
    Passport,
    Unknown,
}

impl DocumentType {
    pub fn format(&self) -> Option<DocumentFormat> {
        match self {
            DocumentType::Ine => Some(DocumentFormat::TD1),
            DocumentType::Passport => Some(DocumentFormat::TD3),
            DocumentType::Unknown => None,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DocumentType::Ine => "INE",
            DocumentType::Passport => "PASSPORT",
            DocumentType::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// MRZ layouts handled by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    TD1, // ID Card (85.6mm × 54.0mm)
    TD3, // Passport (125.0mm × 88.0mm)
}

impl DocumentFormat {
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            DocumentFormat::TD1 => (85.6, 54.0), // mm
            DocumentFormat::TD3 => (125.0, 88.0), // mm
        }
    }

    /// Long side over short side of the physical document.
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.dimensions();
        width / height
    }

    pub fn mrz_lines(&self) -> usize {
        match self {
            DocumentFormat::TD1 => 3,
            DocumentFormat::TD3 => 2,
        }
    }

    pub fn mrz_chars_per_line(&self) -> usize {
        match self {
            DocumentFormat::TD1 => 30,
            DocumentFormat::TD3 => 44,
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            DocumentFormat::TD1 => DocumentType::Ine,
            DocumentFormat::TD3 => DocumentType::Passport,
        }
    }

    /// Number of check digits the layout carries (including the composite).
    pub fn check_digit_count(&self) -> usize {
        match self {
            DocumentFormat::TD1 => 4,
            DocumentFormat::TD3 => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerPoints {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl CornerPoints {
    /// Corners covering the whole frame, used when detection is not trusted.
    pub fn full_frame(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        CornerPoints {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(w, 0.0),
            bottom_left: Point::new(0.0, h),
            bottom_right: Point::new(w, h),
        }
    }

    /// Build named corners from four unordered points: top-left has the
    /// smallest x+y, bottom-right the largest, top-right the largest x-y and
    /// bottom-left the smallest x-y.
    pub fn from_unordered(points: [Point; 4]) -> Self {
        let by = |key: fn(&Point) -> f32, max: bool| {
            let mut best = points[0];
            for p in points.iter().skip(1) {
                let better = if max { key(p) > key(&best) } else { key(p) < key(&best) };
                if better {
                    best = *p;
                }
            }
            best
        };

        CornerPoints {
            top_left: by(|p| p.x + p.y, false),
            bottom_right: by(|p| p.x + p.y, true),
            top_right: by(|p| p.x - p.y, true),
            bottom_left: by(|p| p.x - p.y, false),
        }
    }

    /// Corners in traversal order: TL, TR, BR, BL.
    pub fn as_quad(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    pub fn is_simple_quad(&self) -> bool {
        !geometry::quad_self_intersects(self.as_quad())
    }

    pub fn area(&self) -> f32 {
        geometry::polygon_area(&self.as_quad())
    }

    /// Longest of the top and bottom edges.
    pub fn target_width(&self) -> f32 {
        geometry::distance(self.top_left, self.top_right)
            .max(geometry::distance(self.bottom_left, self.bottom_right))
    }

    /// Longest of the left and right edges.
    pub fn target_height(&self) -> f32 {
        geometry::distance(self.top_left, self.bottom_left)
            .max(geometry::distance(self.top_right, self.bottom_right))
    }

    /// Mean of the two horizontal edges divided by the mean of the two vertical ones.
    pub fn average_aspect_ratio(&self) -> f32 {
        let width = (geometry::distance(self.top_left, self.top_right)
            + geometry::distance(self.bottom_left, self.bottom_right))
            / 2.0;
        let height = (geometry::distance(self.top_left, self.bottom_left)
            + geometry::distance(self.top_right, self.bottom_right))
            / 2.0;
        if height <= f32::EPSILON {
            return 0.0;
        }
        width / height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub success: bool,
    pub corners: Option<CornerPoints>,
    pub confidence: f32,
    pub message: String,
}

impl DetectionResult {
    pub fn not_found(message: impl Into<String>) -> Self {
        DetectionResult {
            success: false,
            corners: None,
            confidence: 0.0,
            message: message.into(),
        }
    }
}

/// Per-field check digit outcome. `None` means the layout does not carry the
/// digit or it could not be evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckDigitFlags {
    pub document_number: Option<bool>,
    pub birth_date: Option<bool>,
    pub expiry_date: Option<bool>,
    pub personal_number: Option<bool>,
    pub composite: Option<bool>,
}

impl CheckDigitFlags {
    pub fn evaluated(&self) -> Vec<bool> {
        [
            self.document_number,
            self.birth_date,
            self.expiry_date,
            self.personal_number,
            self.composite,
        ]
        .iter()
        .flatten()
        .copied()
        .collect()
    }

    pub fn valid_count(&self) -> usize {
        self.evaluated().iter().filter(|v| **v).count()
    }

    pub fn all_valid(&self) -> bool {
        let evaluated = self.evaluated();
        !evaluated.is_empty() && evaluated.iter().all(|v| *v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MrzResult {
    pub success: bool,
    pub document_type: DocumentType,
    pub document_number: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub second_last_name: Option<String>,
    pub birth_date: Option<String>,
    pub sex: Option<Sex>,
    pub expiry_date: Option<String>,
    pub nationality: Option<String>,
    pub issuing_country: Option<String>,
    pub personal_number: Option<String>,
    pub raw_lines: Vec<String>,
    pub confidence: f32,
    pub check_digits: CheckDigitFlags,
    pub error: Option<String>,
}

impl MrzResult {
    pub fn failure(document_type: DocumentType, raw_lines: Vec<String>, error: impl Into<String>) -> Self {
        MrzResult {
            success: false,
            document_type,
            document_number: None,
            full_name: None,
            first_name: None,
            last_name: None,
            second_last_name: None,
            birth_date: None,
            sex: None,
            expiry_date: None,
            nationality: None,
            issuing_country: None,
            personal_number: None,
            raw_lines,
            confidence: 0.0,
            check_digits: CheckDigitFlags::default(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    Mrz,
    Format,
    AspectRatio,
    CheckDigit,
    Expiry,
    Comparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        ValidationIssue {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationChecks {
    pub has_mrz: bool,
    pub correct_line_count: bool,
    pub correct_line_length: bool,
    pub valid_characters: bool,
    pub correct_aspect_ratio: bool,
    pub check_digits_valid: bool,
    pub valid_check_digit_count: usize,
    pub total_check_digits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentValidationResult {
    pub is_valid: bool,
    pub confidence: f32,
    pub format: Option<DocumentFormat>,
    pub checks: ValidationChecks,
    pub issues: Vec<ValidationIssue>,
}

/// Identity the caller expects the document to carry. Only used for
/// comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalData {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub second_last_name: Option<String>,
    pub curp: Option<String>,
    pub birth_date: Option<String>,
    pub expiry_date: Option<String>,
    pub ine_document_number: Option<String>,
    pub passport_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Match,
    Mismatch,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: Field,
    pub label: String,
    pub extracted_value: Option<String>,
    pub expected_value: Option<String>,
    pub matches: MatchState,
}

/// Field values after merging label heuristics with the decoded MRZ.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedFields {
    pub document_number: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub second_last_name: Option<String>,
    pub curp: Option<String>,
    pub birth_date: Option<String>,
    pub expiry_date: Option<String>,
    pub sex: Option<Sex>,
    pub nationality: Option<String>,
    pub address: Option<String>,
    pub elector_key: Option<String>,
}

impl ExtractedFields {
    pub fn get(&self, field: Field) -> Option<String> {
        match field {
            Field::DocumentNumber => self.document_number.clone(),
            Field::FullName => self.full_name.clone(),
            Field::FirstName => self.first_name.clone(),
            Field::LastName => self.last_name.clone(),
            Field::SecondLastName => self.second_last_name.clone(),
            Field::Curp => self.curp.clone(),
            Field::BirthDate => self.birth_date.clone(),
            Field::ExpiryDate => self.expiry_date.clone(),
            Field::Sex => self.sex.map(|s| format!("{:?}", s)),
            Field::Nationality => self.nationality.clone(),
            Field::Address => self.address.clone(),
            Field::ElectorKey => self.elector_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationOutcome {
    Valid,
    Expired,
    Unreadable,
    DataMismatch,
    LowConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResult {
    pub document_type: DocumentType,
    pub raw_text: String,
    pub ocr_confidence: f32,
    pub confidence: f32,
    pub mrz: MrzResult,
    pub fields: ExtractedFields,
    pub comparisons: Vec<FieldComparison>,
    pub found_fields: Vec<Field>,
    pub missing_fields: Vec<Field>,
    pub is_valid: bool,
    pub is_expired: bool,
    pub outcome: ValidationOutcome,
    pub message: String,
}
