use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

pub const CONDITION_REPORT_FIELD: &str = "conditionReport";
pub const PURCHASE_PRICE_FIELD: &str = "purchasePrice";
pub const PURCHASE_DATE_FIELD: &str = "purchaseDate";

/// Every field a share may expose, with its default visibility.
///
/// Identity fields start visible. Specifications, condition documentation and
/// the private financial fields start hidden and must be opted into.
pub const SHAREABLE_FIELDS: &[(&str, bool)] = &[
    ("brand", true),
    ("model", true),
    ("year", true),
    ("color", true),
    ("type", true),
    ("bodyShape", false),
    ("bodyWood", false),
    ("topWood", false),
    ("neckWood", false),
    ("fretboardWood", false),
    ("pickups", false),
    ("electronics", false),
    ("hardware", false),
    ("bridge", false),
    ("tuners", false),
    ("finish", false),
    ("scaleLength", false),
    ("numberOfFrets", false),
    ("nutWidth", false),
    ("neckProfile", false),
    ("weight", false),
    ("tuning", false),
    ("stringGauge", false),
    ("serialNumber", false),
    ("countryOfOrigin", false),
    ("condition", false),
    ("notes", false),
    (CONDITION_REPORT_FIELD, false),
    (PURCHASE_PRICE_FIELD, false),
    (PURCHASE_DATE_FIELD, false),
];

/// Per-field public visibility of a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedFields(BTreeMap<String, bool>);

impl Default for SharedFields {
    fn default() -> Self {
        Self(
            SHAREABLE_FIELDS
                .iter()
                .map(|(name, visible)| (name.to_string(), *visible))
                .collect(),
        )
    }
}

impl SharedFields {
    pub fn is_shared(&self, field: &str) -> bool {
        self.0.get(field).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, visible)| (name.as_str(), *visible))
    }

    /// Overrides win over the current values; unspecified fields are untouched.
    pub fn with_overrides(&self, overrides: &FieldOverrides) -> Self {
        let mut merged = self.0.clone();
        for (name, visible) in &overrides.0 {
            merged.insert(name.clone(), *visible);
        }
        Self(merged)
    }
}

/// A validated partial visibility map supplied by the owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOverrides(BTreeMap<String, bool>);

impl FieldOverrides {
    pub fn parse(value: &Value) -> AppResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| AppError::Validation("sharedFields must be an object".to_string()))?;

        let mut overrides = BTreeMap::new();
        for (name, visible) in object {
            if !SHAREABLE_FIELDS.iter().any(|(known, _)| known == name) {
                return Err(AppError::Validation(format!(
                    "Unknown shared field: {}",
                    name
                )));
            }
            let visible = visible.as_bool().ok_or_else(|| {
                AppError::Validation(format!("sharedFields.{} must be a boolean", name))
            })?;
            overrides.insert(name.clone(), visible);
        }

        Ok(Self(overrides))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_expose_identity_only() {
        let fields = SharedFields::default();
        for name in ["brand", "model", "year", "color", "type"] {
            assert!(fields.is_shared(name), "{} should default visible", name);
        }
        for name in ["serialNumber", "bodyWood", PURCHASE_PRICE_FIELD, CONDITION_REPORT_FIELD] {
            assert!(!fields.is_shared(name), "{} should default hidden", name);
        }
    }

    #[test]
    fn test_overrides_merge_over_defaults() {
        let overrides = FieldOverrides::parse(&json!({"year": false, "pickups": true})).unwrap();
        let fields = SharedFields::default().with_overrides(&overrides);

        assert!(!fields.is_shared("year"));
        assert!(fields.is_shared("pickups"));
        assert!(fields.is_shared("brand"));
        assert_eq!(fields.iter().count(), SHAREABLE_FIELDS.len());
    }

    #[test]
    fn test_overrides_must_be_object() {
        let err = FieldOverrides::parse(&json!(["brand"])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_overrides_reject_unknown_and_non_boolean() {
        assert!(FieldOverrides::parse(&json!({"ownerId": true})).is_err());
        assert!(FieldOverrides::parse(&json!({"brand": "yes"})).is_err());
    }

    #[test]
    fn test_unknown_stored_field_is_hidden() {
        let fields: SharedFields = serde_json::from_value(json!({"brand": true})).unwrap();
        assert!(fields.is_shared("brand"));
        assert!(!fields.is_shared("model"));
    }
}
