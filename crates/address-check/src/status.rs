use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use crate::address::AddressField;

/// Opaque status token reported by the verifier or appended locally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(Cow<'static, str>);

impl StatusCode {
    pub const ADDRESS_CORRECT: Self = Self::known("address_correct");
    pub const ADDRESS_NEEDS_CORRECTION: Self = Self::known("address_needs_correction");
    pub const ADDRESS_MINOR_CORRECTION: Self = Self::known("address_minor_correction");
    pub const ADDRESS_MULTIPLE_VARIANTS: Self = Self::known("address_multiple_variants");
    pub const ADDRESS_NOT_FOUND: Self = Self::known("address_not_found");
    pub const ADDRESS_OF_NOT_SUPPORTED_TYPE: Self = Self::known("address_of_not_supported_type");
    pub const BUILDING_NUMBER_IS_MISSING: Self = Self::known("building_number_is_missing");
    pub const BUILDING_NUMBER_NOT_FOUND: Self = Self::known("building_number_not_found");
    pub const ADDRESS_SELECTED_AUTOMATICALLY: Self = Self::known("address_selected_automatically");
    pub const ADDRESS_SELECTED_BY_CUSTOMER: Self = Self::known("address_selected_by_customer");

    const fn known(token: &'static str) -> Self {
        Self(Cow::Borrowed(token))
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(Cow::Owned(token.into()))
    }

    /// `<field>_correct`
    pub fn field_correct(field: AddressField) -> Self {
        Self::new(format!("{}_correct", field.status_prefix()))
    }

    /// `<field>_needs_correction`
    pub fn field_needs_correction(field: AddressField) -> Self {
        Self::new(format!("{}_needs_correction", field.status_prefix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::ADDRESS_SELECTED_AUTOMATICALLY || *self == Self::ADDRESS_SELECTED_BY_CUSTOMER
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Order-insensitive set of status tokens produced by one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusSet(BTreeSet<StatusCode>);

impl StatusSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &StatusCode) -> bool {
        self.0.contains(code)
    }

    pub fn contains_any(&self, codes: &[StatusCode]) -> bool {
        codes.iter().any(|code| self.0.contains(code))
    }

    pub fn insert(&mut self, code: StatusCode) -> bool {
        self.0.insert(code)
    }

    /// Copy of this set with `code` appended.
    pub fn with(&self, code: StatusCode) -> Self {
        let mut next = self.clone();
        next.insert(code);
        next
    }

    /// True once the address has been finally decided.
    pub fn is_terminal(&self) -> bool {
        self.0.iter().any(StatusCode::is_terminal)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusCode> + '_ {
        self.0.iter()
    }
}

impl FromIterator<StatusCode> for StatusSet {
    fn from_iter<I: IntoIterator<Item = StatusCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for StatusSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(StatusCode::from).collect())
    }
}
