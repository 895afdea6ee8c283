//! Dynamic form built from a [`ParamSchema`]: one required control per field.

use crate::error::{PredictionFormError, Result};
use crate::schema::{FieldType, ParamSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A value entered into a control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    Required,
}

impl Validator {
    fn check(&self, value: Option<&FieldValue>) -> bool {
        match self {
            // Whitespace-only text counts as present.
            Validator::Required => value.is_some_and(|v| !v.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormControl {
    name: String,
    field_type: FieldType,
    value: Option<FieldValue>,
    validators: Vec<Validator>,
    dirty: bool,
}

impl FormControl {
    fn required(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            value: None,
            validators: vec![Validator::Required],
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.validators.contains(&Validator::Required)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_valid(&self) -> bool {
        self.validators
            .iter()
            .all(|validator| validator.check(self.value.as_ref()))
    }

    /// Invalid and already touched, so the UI should show an error
    pub fn shows_error(&self) -> bool {
        self.dirty && !self.is_valid()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Form state: one control per schema field, in schema order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicForm {
    controls: Vec<FormControl>,
}

impl DynamicForm {
    pub fn from_schema(schema: &ParamSchema) -> Self {
        let controls = schema
            .fields()
            .map(|(name, ty)| FormControl::required(name, ty))
            .collect();
        Self { controls }
    }

    pub fn controls(&self) -> &[FormControl] {
        &self.controls
    }

    pub fn control(&self, name: &str) -> Option<&FormControl> {
        self.controls.iter().find(|c| c.name == name)
    }

    fn control_mut(&mut self, name: &str) -> Result<&mut FormControl> {
        self.controls
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| PredictionFormError::Validation {
                message: format!("form has no field named '{name}'"),
            })
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Set a control's value the way user input does (marks it dirty)
    pub fn set_value(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let control = self.control_mut(name)?;
        control.value = Some(value.into());
        control.dirty = true;
        Ok(())
    }

    /// Positional variant of `set_value`; out-of-range indices are ignored
    pub fn set_value_at(&mut self, index: usize, value: impl Into<FieldValue>) {
        if let Some(control) = self.controls.get_mut(index) {
            control.value = Some(value.into());
            control.dirty = true;
        }
    }

    pub fn clear(&mut self, name: &str) -> Result<()> {
        let control = self.control_mut(name)?;
        control.value = None;
        control.dirty = true;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.controls.iter().all(FormControl::is_valid)
    }

    pub fn invalid_controls(&self) -> Vec<&str> {
        self.controls
            .iter()
            .filter(|c| !c.is_valid())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Mark every invalid control dirty so its error is shown; returns their names
    pub fn mark_invalid_dirty(&mut self) -> Vec<String> {
        self.controls
            .iter_mut()
            .filter(|c| !c.is_valid())
            .map(|c| {
                c.mark_dirty();
                c.name.clone()
            })
            .collect()
    }

    /// Raw values keyed by field name; empty controls are omitted
    pub fn value(&self) -> BTreeMap<String, FieldValue> {
        self.controls
            .iter()
            .filter_map(|c| c.value.clone().map(|v| (c.name.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParamSchema {
        ParamSchema::new([
            ("age".to_string(), FieldType::Int),
            ("city".to_string(), FieldType::Str),
        ])
    }

    #[test]
    fn test_one_required_control_per_field() {
        let form = DynamicForm::from_schema(&schema());
        assert_eq!(form.len(), 2);
        for control in form.controls() {
            assert!(control.is_required());
            assert!(control.value().is_none());
            assert!(!control.is_dirty());
        }
        assert_eq!(form.control("age").unwrap().field_type(), FieldType::Int);
    }

    #[test]
    fn test_empty_form_is_invalid_until_filled() {
        let mut form = DynamicForm::from_schema(&schema());
        assert!(!form.is_valid());
        form.set_value("age", "30").unwrap();
        assert_eq!(form.invalid_controls(), vec!["city"]);
        form.set_value("city", "New York").unwrap();
        assert!(form.is_valid());
    }

    #[test]
    fn test_empty_string_fails_required_but_whitespace_passes() {
        let mut form = DynamicForm::from_schema(&schema());
        form.set_value("age", "").unwrap();
        form.set_value("city", " ").unwrap();
        assert_eq!(form.invalid_controls(), vec!["age"]);
    }

    #[test]
    fn test_mark_invalid_dirty_only_touches_invalid_controls() {
        let mut form = DynamicForm::from_schema(&schema());
        form.set_value("age", 30_i64).unwrap();
        let marked = form.mark_invalid_dirty();
        assert_eq!(marked, vec!["city".to_string()]);
        assert!(form.control("city").unwrap().shows_error());
        assert!(!form.control("age").unwrap().shows_error());
    }

    #[test]
    fn test_set_value_at_targets_schema_position() {
        let mut form = DynamicForm::from_schema(&schema());
        form.set_value_at(1, "Bronx");
        form.set_value_at(7, "ignored");
        assert_eq!(
            form.control("city").unwrap().value().unwrap().to_string(),
            "Bronx"
        );
        assert!(form.control("city").unwrap().is_dirty());
        assert!(form.control("age").unwrap().value().is_none());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut form = DynamicForm::from_schema(&schema());
        assert!(matches!(
            form.set_value("zip", "10001"),
            Err(PredictionFormError::Validation { .. })
        ));
    }

    #[test]
    fn test_clear_makes_control_invalid_again() {
        let mut form = DynamicForm::from_schema(&schema());
        form.set_value("city", "Queens").unwrap();
        form.clear("city").unwrap();
        assert!(form.control("city").unwrap().shows_error());
    }

    #[test]
    fn test_empty_schema_builds_trivially_valid_form() {
        let form = DynamicForm::from_schema(&ParamSchema::default());
        assert!(form.is_empty());
        assert!(form.is_valid());
    }
}
