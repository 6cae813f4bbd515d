use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::logic::fields::{Entity, FieldTable};
use crate::model::{Activatable, AuditRevision, Dated, FieldError, HasAuditRevision, Id};

pub const LOOKUP_LIST_FIELD: &str = "lookup-list";
pub const DISPLAY_VALUE_FIELD: &str = "display-value";
pub const ACTIVE_FIELD: &str = "active";
pub const EFFECTIVE_FROM_FIELD: &str = "effective-from";
pub const EFFECTIVE_TO_FIELD: &str = "effective-to";

const LIST_NAME_MIN: usize = 3;
const LIST_NAME_MAX: usize = 100;

/// A node of a lookup list hierarchy, e.g. a vehicle make or one of its models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LookupValue {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    #[serde(default, rename = "lookup-list")]
    pub lookup_list_name: Option<String>,
    #[serde(default)]
    pub display_value: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Id>,
    /// Ids of the direct children, maintained by the owning arena.
    #[serde(skip)]
    pub children: Vec<Id>,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub revision: Option<AuditRevision>,
}

impl LookupValue {
    pub fn new(lookup_list_name: &str, display_value: &str) -> Self {
        Self {
            active: Some(true),
            lookup_list_name: Some(lookup_list_name.to_string()),
            display_value: Some(display_value.to_string()),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: Id) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn list_name(&self) -> Option<&str> {
        self.lookup_list_name.as_deref()
    }

    /// Snapshot left behind by a deletion: only the identity survives.
    pub fn tombstone(id: Id) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

fn validate_list_name(name: Option<&str>, errors: &mut Vec<FieldError>) {
    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
        errors.push(FieldError::new(
            LOOKUP_LIST_FIELD,
            "The lookup list name must be specified",
        ));
        return;
    };

    let length = name.chars().count();
    if !(LIST_NAME_MIN..=LIST_NAME_MAX).contains(&length) {
        errors.push(FieldError::new(
            LOOKUP_LIST_FIELD,
            "The lookup list name must be between 3 and 100 characters long",
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        errors.push(FieldError::new(
            LOOKUP_LIST_FIELD,
            "The lookup list name may only contain the characters a-z, A-Z, 0-9 and a hyphen (-)",
        ));
    }
}

impl Entity for LookupValue {
    const ENTITY_NAME: &'static str = "lookup value";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn describe_fields(table: FieldTable<Self>) -> FieldTable<Self> {
        table
            .fixed("id")
            .version("version", |value| value.version)
            .fixed(LOOKUP_LIST_FIELD)
            .updatable(DISPLAY_VALUE_FIELD, |target, source| {
                target.display_value = source.display_value.clone()
            })
            .fixed("parent-id")
            .dated()
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        validate_list_name(self.list_name(), &mut errors);

        if self
            .display_value
            .as_deref()
            .map_or(true, |v| v.trim().is_empty())
        {
            errors.push(FieldError::new(
                DISPLAY_VALUE_FIELD,
                "The display value must be specified",
            ));
        }
        if self.active.is_none() {
            errors.push(FieldError::new(
                ACTIVE_FIELD,
                "The active status must be specified",
            ));
        }
        if !self.effective_dates_valid() {
            errors.push(FieldError::new(
                EFFECTIVE_TO_FIELD,
                "The effective to date must be after the effective from date",
            ));
        }
        errors
    }
}

impl Activatable for LookupValue {
    fn active(&self) -> Option<bool> {
        self.active
    }

    fn set_active(&mut self, active: Option<bool>) {
        self.active = active;
    }
}

impl Dated for LookupValue {
    fn effective_from(&self) -> Option<NaiveDate> {
        self.effective_from
    }

    fn set_effective_from(&mut self, date: Option<NaiveDate>) {
        self.effective_from = date;
    }

    fn effective_to(&self) -> Option<NaiveDate> {
        self.effective_to
    }

    fn set_effective_to(&mut self, date: Option<NaiveDate>) {
        self.effective_to = date;
    }
}

impl HasAuditRevision for LookupValue {
    fn audit_revision(&self) -> Option<&AuditRevision> {
        self.revision.as_ref()
    }

    fn set_audit_revision(&mut self, revision: AuditRevision) {
        self.revision = Some(revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_names(value: &LookupValue) -> Vec<String> {
        value.validate().into_iter().map(|e| e.field).collect()
    }

    #[test]
    fn test_valid_lookup_value() {
        let value = LookupValue::new("vehicle-make", "Ford");
        assert!(value.validate().is_empty());
    }

    #[test]
    fn test_every_violation_is_collected() {
        let mut value = LookupValue::default();
        value.effective_from = NaiveDate::from_ymd_opt(2024, 6, 1);
        value.effective_to = NaiveDate::from_ymd_opt(2024, 1, 1);

        assert_eq!(
            field_names(&value),
            vec![
                LOOKUP_LIST_FIELD,
                DISPLAY_VALUE_FIELD,
                ACTIVE_FIELD,
                EFFECTIVE_TO_FIELD
            ]
        );
    }

    #[test]
    fn test_list_name_rules() {
        let short = LookupValue::new("ab", "x");
        assert_eq!(field_names(&short), vec![LOOKUP_LIST_FIELD]);

        let bad_chars = LookupValue::new("vehicle make", "x");
        let errors = bad_chars.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("hyphen"));

        let long = LookupValue::new(&"a".repeat(101), "x");
        assert_eq!(field_names(&long), vec![LOOKUP_LIST_FIELD]);

        let max = LookupValue::new(&"a".repeat(100), "x");
        assert!(max.validate().is_empty());
    }

    #[test]
    fn test_wire_shape_is_kebab_case() {
        let mut value = LookupValue::new("vehicle-model", "Focus").with_parent(1);
        value.id = Some(2);
        value.version = Some(0);
        value.effective_from = NaiveDate::from_ymd_opt(2024, 1, 31);

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["lookup-list"], "vehicle-model");
        assert_eq!(json["display-value"], "Focus");
        assert_eq!(json["parent-id"], 1);
        assert_eq!(json["effective-from"], "2024-01-31");
        assert!(json["effective-to"].is_null());
        assert!(json.get("revision").is_none());
        assert!(json.get("children").is_none());
    }

    #[test]
    fn test_incoming_revision_is_ignored() {
        let json = r#"{"lookup-list":"vehicle-make","display-value":"Ford","active":true,
            "revision":{"rev":1,"date":"2024-01-01 00:00:00 UTC","user":"x","type":"ADD"}}"#;
        let value: LookupValue = serde_json::from_str(json).unwrap();
        assert!(value.revision.is_none());
        assert_eq!(value.display_value.as_deref(), Some("Ford"));
    }
}
