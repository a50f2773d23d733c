use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder written into a fingerprint for fields the snapshot does not carry.
pub const ABSENT_FIELD_PLACEHOLDER: &str = "-";

/// Semantic address fields, declared in canonical fingerprint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressField {
    CountryCode,
    SubdivisionCode,
    PostalCode,
    Locality,
    StreetFull,
    StreetName,
    BuildingNumber,
    AdditionalInfo,
}

impl AddressField {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::CountryCode,
            Self::SubdivisionCode,
            Self::PostalCode,
            Self::Locality,
            Self::StreetFull,
            Self::StreetName,
            Self::BuildingNumber,
            Self::AdditionalInfo,
        ]
    }

    /// Fields every verification request carries.
    pub const fn core() -> [Self; 3] {
        [Self::CountryCode, Self::PostalCode, Self::Locality]
    }

    /// Prefix used by the verifier for field-specific status tokens.
    pub const fn status_prefix(self) -> &'static str {
        match self {
            Self::CountryCode => "country_code",
            Self::SubdivisionCode => "subdivision_code",
            Self::PostalCode => "postal_code",
            Self::Locality => "locality",
            Self::StreetFull => "street_full",
            Self::StreetName => "street_name",
            Self::BuildingNumber => "building_number",
            Self::AdditionalInfo => "additional_info",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CountryCode => "Country",
            Self::SubdivisionCode => "Subdivision",
            Self::PostalCode => "Postal code",
            Self::Locality => "City",
            Self::StreetFull => "Street and number",
            Self::StreetName => "Street",
            Self::BuildingNumber => "House number",
            Self::AdditionalInfo => "Additional info",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_prefix())
    }
}

/// Point-in-time values of the fields a form exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressSnapshot {
    fields: BTreeMap<AddressField, String>,
}

impl AddressSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: AddressField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: AddressField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: AddressField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: AddressField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = AddressField> + '_ {
        self.fields.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AddressField, &str)> + '_ {
        self.fields
            .iter()
            .map(|(field, value)| (*field, value.as_str()))
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

impl FromIterator<(AddressField, String)> for AddressSnapshot {
    fn from_iter<I: IntoIterator<Item = (AddressField, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Canonical identity of a verification subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(snapshot: &AddressSnapshot) -> Self {
        let parts: Vec<&str> = AddressField::ordered()
            .iter()
            .map(|field| {
                snapshot
                    .get(*field)
                    .map(str::trim)
                    .unwrap_or(ABSENT_FIELD_PLACEHOLDER)
            })
            .collect();
        Self(parts.join("|"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Queue key scoping this fingerprint to one address entity.
    pub fn queue_key(&self, entity_id: &str) -> String {
        format!("{entity_id}#{}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
