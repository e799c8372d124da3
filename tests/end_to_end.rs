use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use image::{DynamicImage, GrayImage, ImageBuffer, Rgb};

use idcapture::models::{DocumentFormat, DocumentType, MatchState, PersonalData, ValidationOutcome};
use idcapture::processing::mrz::calculate_check_digit;
use idcapture::processing::{
    Collaborators, Contour, ContourDetector, ImageprocBackend, MrzDecoder, OcrEngine, OcrOptions, OcrText,
};
use idcapture::utils::geometry::Point;
use idcapture::validation::StructuralValidator;
use idcapture::{CaptureError, DocumentScanner, PageSide, Result, ScannerSession, ScannerStage};

fn pad(line: &str, width: usize) -> String {
    format!("{:<<width$}", line, width = width)
}

fn td1_mrz(doc: &str, birth: &str, sex: char, expiry: &str) -> String {
    let l1 = pad(&format!("IDMEX{}{}", doc, calculate_check_digit(doc)), 30);
    let partial = pad(
        &format!(
            "{}{}{}{}{}MEX",
            birth,
            calculate_check_digit(birth),
            sex,
            expiry,
            calculate_check_digit(expiry)
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
    let l3 = pad("GARCIA<LOPEZ<<JUAN<CARLOS", 30);
    format!("{}\n{}{}\n{}", l1, partial, composite, l3)
}

fn ine_labels(validity: &str) -> String {
    format!(
        "INSTITUTO NACIONAL ELECTORAL
CREDENCIAL PARA VOTAR
NOMBRE
GARCIA
LOPEZ
JUAN CARLOS
DOMICILIO
AV. REFORMA 123 COL. CENTRO
CURP GALJ900115HDFRPN09
FECHA DE NACIMIENTO 15/01/1990
VIGENCIA {}
SEXO H",
        validity
    )
}

fn ine_text(validity: &str) -> String {
    format!("{}\n{}\n", ine_labels(validity), td1_mrz("123456789", "900115", 'H', "300101"))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn expected_person() -> PersonalData {
    PersonalData {
        first_name: Some("Juan Carlos".to_string()),
        last_name: Some("García".to_string()),
        second_last_name: Some("López".to_string()),
        curp: Some("GALJ900115HDFRPN09".to_string()),
        birth_date: Some("15/01/1990".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_valid_unexpired_ine() {
    let scanner = DocumentScanner::default();
    let expected = expected_person();
    let result = scanner.analyze_text(&ine_text("2020-2030"), 0.85, None, Some(&expected), today());

    assert_eq!(result.document_type, DocumentType::Ine);
    assert!(result.mrz.success);
    assert!(result.mrz.check_digits.all_valid());
    assert_eq!(result.fields.curp.as_deref(), Some("GALJ900115HDFRPN09"));
    assert_eq!(result.fields.document_number.as_deref(), Some("123456789"));
    assert!(result.comparisons.iter().all(|c| c.matches == MatchState::Match));
    assert!(!result.is_expired);
    assert!(result.is_valid, "{}", result.message);
    assert_eq!(result.outcome, ValidationOutcome::Valid);
}

#[test]
fn test_past_validity_year_expires_ine() {
    let scanner = DocumentScanner::default();
    let valid = scanner.analyze_text(&ine_text("2020-2030"), 0.85, None, None, today());
    let expired = scanner.analyze_text(&ine_text("2015-2020"), 0.85, None, None, today());

    assert!(expired.is_expired);
    assert!(!expired.is_valid);
    assert_eq!(expired.outcome, ValidationOutcome::Expired);
    assert!(expired.message.contains("2020-12-31"));
    assert_ne!(expired.message, valid.message);
}

#[test]
fn test_short_td3_lines_are_structurally_invalid() {
    let text = "PASAPORTE\nP<MEXGARCIA<<JUAN<<<<<<<<<<<<<\nG391371536MEX8311269F2909299<\n";
    let result = StructuralValidator::default().validate(text, 1250, 880, Some(DocumentType::Passport));

    assert_eq!(result.format, Some(DocumentFormat::TD3));
    assert!(!result.checks.correct_line_count || !result.checks.correct_line_length);
    assert!(!result.is_valid);
}

#[test]
fn test_text_without_filler_has_no_mrz() {
    let text = "INSTITUTO NACIONAL ELECTORAL\nCREDENCIAL PARA VOTAR\nGARCIA LOPEZ JUAN CARLOS\nCURP GALJ900115HDFRPN09";
    let decoded = MrzDecoder::default().decode(text);
    assert!(!decoded.success);
    assert_eq!(decoded.document_type, DocumentType::Unknown);
    assert!(decoded.error.is_some());

    let structure = StructuralValidator::default().validate(text, 1600, 1000, None);
    assert!(!structure.checks.has_mrz);
    assert!(!structure.is_valid);
}

#[test]
fn test_decoder_and_validator_are_idempotent() {
    let text = ine_text("2020-2030");
    let decoder = MrzDecoder::default();
    let validator = StructuralValidator::default();

    let first = serde_json::to_string(&decoder.decode(&text)).unwrap();
    let second = serde_json::to_string(&decoder.decode(&text)).unwrap();
    assert_eq!(first, second);

    let first = serde_json::to_string(&validator.validate(&text, 1600, 1000, None)).unwrap();
    let second = serde_json::to_string(&validator.validate(&text, 1600, 1000, None)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_mismatched_identity_is_reported() {
    let scanner = DocumentScanner::default();
    let expected = PersonalData {
        first_name: Some("Maria".to_string()),
        last_name: Some("Hernandez".to_string()),
        curp: Some("HEMM850101MDFRRR03".to_string()),
        ..Default::default()
    };
    let result = scanner.analyze_text(&ine_text("2020-2030"), 0.85, None, Some(&expected), today());
    assert!(!result.is_valid);
    assert!(!result.is_expired);
    assert_eq!(result.outcome, ValidationOutcome::DataMismatch);
}

#[test]
fn test_unread_curp_does_not_count_against_the_identity() {
    let scanner = DocumentScanner::default();
    let text = ine_text("2020-2030").replace("CURP GALJ900115HDFRPN09\n", "");
    let expected = PersonalData {
        first_name: Some("Juan".to_string()),
        curp: Some("GALJ900115HDFRPN09".to_string()),
        ..Default::default()
    };
    let result = scanner.analyze_text(&text, 0.85, None, Some(&expected), today());

    assert!(result.fields.curp.is_none());
    let states: Vec<MatchState> = result.comparisons.iter().map(|c| c.matches).collect();
    assert_eq!(states, vec![MatchState::Match, MatchState::Unknown]);
    assert_ne!(result.outcome, ValidationOutcome::DataMismatch);
    assert!(result.is_valid, "{}", result.message);
}

#[test]
fn test_foreign_accents_match_their_plain_spelling() {
    let scanner = DocumentScanner::default();
    let expected = PersonalData {
        first_name: Some("Jüan Cârlos".to_string()),
        last_name: Some("GÅRCÍA".to_string()),
        second_last_name: Some("Løpez".to_string()),
        ..Default::default()
    };
    let result = scanner.analyze_text(&ine_text("2020-2030"), 0.85, None, Some(&expected), today());
    assert!(result.comparisons.iter().all(|c| c.matches == MatchState::Match));
    assert_eq!(result.outcome, ValidationOutcome::Valid);
}

/// Reports a fixed quadrilateral regardless of the image.
struct FixedContour([Point; 4]);

impl ContourDetector for FixedContour {
    fn name(&self) -> &str {
        "fixed"
    }

    fn find_document_contour(&self, _image: &GrayImage) -> Result<Option<Contour>> {
        Ok(Some(Contour { points: self.0.to_vec() }))
    }

    fn corners_of(&self, contour: &Contour) -> Option<[Point; 4]> {
        Some([contour.points[0], contour.points[1], contour.points[2], contour.points[3]])
    }
}

/// Answers the general pass with the printed labels and the MRZ pass with
/// the machine readable lines.
struct ScriptedOcr;

#[async_trait]
impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(&self, _image: &DynamicImage, options: &OcrOptions) -> Result<OcrText> {
        let text = if options.whitelist.is_some() {
            td1_mrz("123456789", "900115", 'H', "300101")
        } else {
            ine_labels("2020-2030")
        };
        Ok(OcrText { text, confidence: 0.85 })
    }
}

fn card_photo() -> DynamicImage {
    let mut img = ImageBuffer::from_pixel(400, 260, Rgb([30u8, 30, 30]));
    for y in 35..225 {
        for x in 50..350 {
            img.put_pixel(x, y, Rgb([235, 235, 235]));
        }
    }
    DynamicImage::ImageRgb8(img)
}

fn mock_collaborators() -> Collaborators {
    let card = [
        Point::new(50.0, 35.0),
        Point::new(349.0, 35.0),
        Point::new(349.0, 224.0),
        Point::new(50.0, 224.0),
    ];
    Collaborators::with(
        Arc::new(FixedContour(card)),
        Arc::new(ImageprocBackend::new()),
        Arc::new(ScriptedOcr),
    )
}

#[tokio::test]
async fn test_ine_session_front_and_back() {
    let scanner = DocumentScanner::default();
    let collaborators = mock_collaborators();
    let mut session = ScannerSession::new(DocumentType::Ine, Some(expected_person()));

    let front = session.add_page(card_photo(), PageSide::Front).unwrap();
    let corners = session.detect(front, &scanner, &collaborators).unwrap();
    assert!((corners.top_left.x - 50.0).abs() < 1.0);

    let extraction = session.confirm(front, &scanner, &collaborators).unwrap();
    assert!(extraction.success);
    assert!(extraction.encoded_base64().unwrap().starts_with("iVBOR"));

    let result = session.validate_on(front, &scanner, &collaborators, today()).await.unwrap();
    assert!(result.is_valid, "{}", result.message);
    assert_eq!(session.page(front).unwrap().stage(), ScannerStage::WaitingForBack);
    assert!(!session.is_complete());

    let back = session.add_page(card_photo(), PageSide::Back).unwrap();
    session.detect(back, &scanner, &collaborators).unwrap();
    session.confirm(back, &scanner, &collaborators).unwrap();
    session.validate_on(back, &scanner, &collaborators, today()).await.unwrap();

    assert_eq!(session.page(front).unwrap().stage(), ScannerStage::Complete);
    assert_eq!(session.page(back).unwrap().stage(), ScannerStage::Complete);
    assert!(session.is_complete());
    assert_eq!(session.results().len(), 2);
}

#[tokio::test]
async fn test_recrop_discards_result_explicitly() {
    let scanner = DocumentScanner::default();
    let collaborators = mock_collaborators();
    let mut session = ScannerSession::new(DocumentType::Passport, None);

    let page = session.add_page(card_photo(), PageSide::Front).unwrap();
    session.detect(page, &scanner, &collaborators).unwrap();
    session.confirm(page, &scanner, &collaborators).unwrap();
    session.validate_on(page, &scanner, &collaborators, today()).await.unwrap();
    assert_eq!(session.page(page).unwrap().stage(), ScannerStage::Complete);

    // a completed page cannot be validated again without re-cropping
    let err = session.validate_on(page, &scanner, &collaborators, today()).await.unwrap_err();
    assert!(matches!(err, CaptureError::InvalidTransition(_)));
    assert!(session.page(page).unwrap().result().is_some());

    session.recrop(page).unwrap();
    assert_eq!(session.page(page).unwrap().stage(), ScannerStage::Adjusting);
    assert!(session.page(page).unwrap().result().is_none());
    assert!(session.page(page).unwrap().extraction().is_none());
}

#[tokio::test]
async fn test_ocr_not_loaded_fails_fast() {
    let scanner = DocumentScanner::default();
    let collaborators = Collaborators::unloaded();
    let err = scanner
        .scan_page(&card_photo(), Some(DocumentType::Ine), None, &collaborators)
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::CollaboratorUnavailable(_)));
}
