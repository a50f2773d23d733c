use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::{AddressField, AddressSnapshot};
use crate::status::StatusSet;

/// Outcome of a single remote verification call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub statuses: StatusSet,
    #[serde(default)]
    pub predictions: Vec<AddressSnapshot>,
}

/// Transport-level failure of the remote verifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("verification service unavailable: {0}")]
    Unavailable(String),
    #[error("verification response malformed: {0}")]
    Malformed(String),
}

/// Remote verification service (driven port).
#[async_trait]
pub trait AddressVerifier: Send + Sync {
    async fn verify(&self, address: &AddressSnapshot)
        -> Result<VerificationResponse, TransportError>;
}

/// Fields sent to the verifier for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub country: String,
    pub locality: String,
    pub postal_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdivision_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_full: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
}

impl VerificationRequest {
    pub fn from_snapshot(snapshot: &AddressSnapshot) -> Self {
        let required = |field: AddressField| {
            snapshot
                .get(field)
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        let optional =
            |field: AddressField| snapshot.get(field).map(|value| value.trim().to_string());

        Self {
            country: required(AddressField::CountryCode),
            locality: required(AddressField::Locality),
            postal_code: required(AddressField::PostalCode),
            subdivision_code: optional(AddressField::SubdivisionCode),
            street_name: optional(AddressField::StreetName),
            building_number: optional(AddressField::BuildingNumber),
            street_full: optional(AddressField::StreetFull),
            additional_info: optional(AddressField::AdditionalInfo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_projection_omits_absent_optional_fields() {
        let snapshot = AddressSnapshot::new()
            .with(AddressField::CountryCode, "DE")
            .with(AddressField::PostalCode, " 10115")
            .with(AddressField::Locality, "Berlin")
            .with(AddressField::StreetFull, "Torstr 1");

        let request = VerificationRequest::from_snapshot(&snapshot);
        assert_eq!(request.postal_code, "10115");
        assert_eq!(request.street_full.as_deref(), Some("Torstr 1"));

        let json = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(json["country"], "DE");
        assert!(json.get("streetName").is_none());
        assert!(json.get("buildingNumber").is_none());
    }

    #[test]
    fn response_defaults_missing_predictions() {
        let response: VerificationResponse =
            serde_json::from_str(r#"{"statuses":["address_not_found"]}"#).expect("parse");
        assert!(response.predictions.is_empty());
        assert_eq!(response.statuses.len(), 1);
    }
}
