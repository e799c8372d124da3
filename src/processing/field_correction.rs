use log::info;

use crate::models::{ExtractedFields, MrzResult, Sex};
use crate::processing::extractors::is_curp;

/// FieldCorrection reconciles label-extracted fields with the decoded MRZ.
/// The MRZ is structurally checked, so its values always take precedence.
pub struct FieldCorrection;

impl FieldCorrection {
    pub fn merge(labels: &ExtractedFields, mrz: &MrzResult) -> ExtractedFields {
        let mut merged = labels.clone();
        if !mrz.success {
            return merged;
        }

        let mut corrections: Vec<String> = Vec::new();

        Self::prefer(&mut merged.document_number, &mrz.document_number, "document_number", &mut corrections);
        Self::prefer(&mut merged.first_name, &mrz.first_name, "first_name", &mut corrections);
        Self::prefer(&mut merged.last_name, &mrz.last_name, "last_name", &mut corrections);
        Self::prefer(&mut merged.second_last_name, &mrz.second_last_name, "second_last_name", &mut corrections);
        Self::prefer(&mut merged.full_name, &mrz.full_name, "full_name", &mut corrections);
        Self::prefer(&mut merged.birth_date, &mrz.birth_date, "birth_date", &mut corrections);
        Self::prefer(&mut merged.expiry_date, &mrz.expiry_date, "expiry_date", &mut corrections);
        Self::prefer(&mut merged.nationality, &mrz.nationality, "nationality", &mut corrections);

        // Passports may carry the CURP as the MRZ personal number.
        let mrz_curp = mrz.personal_number.clone().filter(|p| is_curp(p));
        Self::prefer(&mut merged.curp, &mrz_curp, "curp", &mut corrections);

        if let Some(sex) = mrz.sex {
            if merged.sex != Some(sex) {
                corrections.push(format!("sex: {} -> MRZ: {:?}", Self::describe_sex(merged.sex), sex));
                merged.sex = Some(sex);
            }
        }

        if !corrections.is_empty() {
            info!("Field corrections applied from MRZ:");
            for correction in &corrections {
                info!("  {}", correction);
            }
        }

        merged
    }

    fn prefer(target: &mut Option<String>, mrz_value: &Option<String>, name: &str, corrections: &mut Vec<String>) {
        let mrz_value = match mrz_value {
            Some(value) => value,
            None => return,
        };
        match target {
            Some(current) if current == mrz_value => {}
            Some(current) => {
                corrections.push(format!("{}: {} -> MRZ: {}", name, current, mrz_value));
                *target = Some(mrz_value.clone());
            }
            None => {
                corrections.push(format!("{}: empty -> MRZ: {}", name, mrz_value));
                *target = Some(mrz_value.clone());
            }
        }
    }

    fn describe_sex(sex: Option<Sex>) -> String {
        match sex {
            Some(s) => format!("{:?}", s),
            None => "empty".to_string(),
        }
    }
}
