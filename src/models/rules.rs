use serde::Serialize;

use crate::models::DocumentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    DocumentNumber,
    FullName,
    FirstName,
    LastName,
    SecondLastName,
    Curp,
    BirthDate,
    ExpiryDate,
    Sex,
    Nationality,
    Address,
    ElectorKey,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::DocumentNumber => "Document number",
            Field::FullName => "Full name",
            Field::FirstName => "First name",
            Field::LastName => "Last name",
            Field::SecondLastName => "Second last name",
            Field::Curp => "CURP",
            Field::BirthDate => "Date of birth",
            Field::ExpiryDate => "Date of expiry",
            Field::Sex => "Sex",
            Field::Nationality => "Nationality",
            Field::Address => "Address",
            Field::ElectorKey => "Elector key",
        }
    }
}

/// Fields each document type is expected to expose.
pub struct DocumentRules {
    pub document_type: DocumentType,
    pub critical_fields: Vec<Field>,
    pub reported_fields: Vec<Field>,
}

impl DocumentRules {
    pub fn for_document(document_type: DocumentType) -> Self {
        match document_type {
            DocumentType::Passport => DocumentRules {
                document_type,
                critical_fields: vec![Field::DocumentNumber, Field::FullName, Field::BirthDate],
                reported_fields: vec![
                    Field::DocumentNumber,
                    Field::FullName,
                    Field::BirthDate,
                    Field::ExpiryDate,
                    Field::Sex,
                    Field::Nationality,
                    Field::Curp,
                ],
            },
            DocumentType::Ine | DocumentType::Unknown => DocumentRules {
                document_type,
                critical_fields: vec![Field::Curp, Field::FullName],
                reported_fields: vec![
                    Field::Curp,
                    Field::FullName,
                    Field::BirthDate,
                    Field::ExpiryDate,
                    Field::Sex,
                    Field::Address,
                    Field::DocumentNumber,
                    Field::ElectorKey,
                ],
            },
        }
    }
}
