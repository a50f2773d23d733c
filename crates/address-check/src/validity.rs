//! Pure derivations over a finished pass: per-field validity flags and
//! word-level diffs used to preview a correction before it is committed.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;

use crate::address::{AddressField, AddressSnapshot};
use crate::status::{StatusCode, StatusSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValidity {
    Correct,
    NotCorrect,
    NoOpinion,
}

pub type ValidityMap = BTreeMap<AddressField, FieldValidity>;

fn fault_codes(field: AddressField) -> Vec<StatusCode> {
    let mut codes = vec![StatusCode::field_needs_correction(field)];
    if matches!(
        field,
        AddressField::BuildingNumber | AddressField::StreetFull | AddressField::StreetName
    ) {
        codes.push(StatusCode::BUILDING_NUMBER_IS_MISSING);
        codes.push(StatusCode::BUILDING_NUMBER_NOT_FOUND);
    }
    codes
}

/// Tri-state verdict for one field given the final status set of a pass.
pub fn derive_field_validity(
    field: AddressField,
    value: Option<&str>,
    statuses: &StatusSet,
) -> FieldValidity {
    if statuses.contains_any(&fault_codes(field)) {
        return FieldValidity::NotCorrect;
    }
    if statuses.contains(&StatusCode::field_correct(field)) {
        return FieldValidity::Correct;
    }
    if value.map_or(true, |value| value.trim().is_empty()) {
        return FieldValidity::NoOpinion;
    }
    if statuses.contains(&StatusCode::ADDRESS_CORRECT) {
        FieldValidity::Correct
    } else if statuses.contains(&StatusCode::ADDRESS_NOT_FOUND) {
        FieldValidity::NotCorrect
    } else {
        FieldValidity::NoOpinion
    }
}

/// Validity of every field `is_active` accepts.
pub fn derive_validity_map<F>(
    address: &AddressSnapshot,
    statuses: &StatusSet,
    is_active: F,
) -> ValidityMap
where
    F: Fn(AddressField) -> bool,
{
    AddressField::ordered()
        .into_iter()
        .filter(|field| is_active(*field))
        .map(|field| {
            (
                field,
                derive_field_validity(field, address.get(field), statuses),
            )
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    Unchanged,
    Added,
    Removed,
}

impl DiffTag {
    pub const fn all() -> [Self; 3] {
        [Self::Unchanged, Self::Added, Self::Removed]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unchanged" | "equal" => Some(Self::Unchanged),
            "added" | "insert" => Some(Self::Added),
            "removed" | "delete" => Some(Self::Removed),
            _ => None,
        }
    }
}

impl From<ChangeTag> for DiffTag {
    fn from(tag: ChangeTag) -> Self {
        match tag {
            ChangeTag::Equal => Self::Unchanged,
            ChangeTag::Insert => Self::Added,
            ChangeTag::Delete => Self::Removed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSegment {
    pub tag: DiffTag,
    pub text: String,
}

/// Word-level diff between two renderings of the same text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDiff {
    segments: Vec<DiffSegment>,
}

impl WordDiff {
    pub fn between(old: &str, new: &str) -> Self {
        let diff = TextDiff::from_words(old, new);
        let mut segments: Vec<DiffSegment> = Vec::new();

        for change in diff.iter_all_changes() {
            let tag = DiffTag::from(change.tag());
            match segments.last_mut() {
                Some(last) if last.tag == tag => last.text.push_str(change.value()),
                _ => segments.push(DiffSegment {
                    tag,
                    text: change.value().to_string(),
                }),
            }
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[DiffSegment] {
        &self.segments
    }

    pub fn has_changes(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| segment.tag != DiffTag::Unchanged)
    }

    pub fn filtered<'a>(
        &'a self,
        tags: &'a [DiffTag],
    ) -> impl Iterator<Item = &'a DiffSegment> + 'a {
        self.segments
            .iter()
            .filter(move |segment| tags.contains(&segment.tag))
    }

    /// Concatenated text of the segments whose tag is in `tags`.
    pub fn render(&self, tags: &[DiffTag]) -> String {
        self.filtered(tags)
            .map(|segment| segment.text.as_str())
            .collect()
    }
}

/// Per-field diffs for every field whose value differs between the two snapshots.
pub fn diff_snapshots(
    original: &AddressSnapshot,
    candidate: &AddressSnapshot,
) -> BTreeMap<AddressField, WordDiff> {
    AddressField::ordered()
        .into_iter()
        .filter_map(|field| {
            let old = original.get(field).unwrap_or_default();
            let new = candidate.get(field).unwrap_or_default();
            (old.trim() != new.trim()).then(|| (field, WordDiff::between(old, new)))
        })
        .collect()
}
