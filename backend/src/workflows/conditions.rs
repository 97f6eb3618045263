// Trigger Conditions - gate a job's actions on the entity's current data

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::WorkflowError;
use super::template::{lookup, TemplateData};

/// A single field comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Field name to evaluate (supports dot notation for nested fields)
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOperator {
    #[default]
    #[serde(alias = "AND")]
    And,
    #[serde(alias = "OR")]
    Or,
}

/// Group of conditions with AND/OR logic
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub logic: LogicOperator,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Nested condition groups for complex logic
    #[serde(default)]
    pub groups: Vec<ConditionGroup>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    // Equality
    Equals,
    NotEquals,

    // String operations
    Contains,
    NotContains,
    StartsWith,
    EndsWith,

    // Numeric comparisons
    GreaterThan,
    LessThan,

    // Membership
    In,
    NotIn,

    // Presence
    IsEmpty,
    IsNotEmpty,
}

impl Condition {
    pub fn evaluate(&self, data: &TemplateData) -> bool {
        let field_value = lookup(data, &self.field);

        match self.operator {
            ConditionOperator::Equals => field_value.is_some_and(|v| loose_eq(v, &self.value)),
            ConditionOperator::NotEquals => !field_value.is_some_and(|v| loose_eq(v, &self.value)),
            ConditionOperator::Contains => string_test(field_value, &self.value, |s, p| s.contains(p)),
            ConditionOperator::NotContains => {
                !string_test(field_value, &self.value, |s, p| s.contains(p))
            }
            ConditionOperator::StartsWith => {
                string_test(field_value, &self.value, |s, p| s.starts_with(p))
            }
            ConditionOperator::EndsWith => string_test(field_value, &self.value, |s, p| s.ends_with(p)),
            ConditionOperator::GreaterThan => {
                match (field_value.and_then(as_number), as_number(&self.value)) {
                    (Some(v), Some(c)) => v > c,
                    _ => false,
                }
            }
            ConditionOperator::LessThan => {
                match (field_value.and_then(as_number), as_number(&self.value)) {
                    (Some(v), Some(c)) => v < c,
                    _ => false,
                }
            }
            ConditionOperator::In => in_list(field_value, &self.value),
            ConditionOperator::NotIn => !in_list(field_value, &self.value),
            ConditionOperator::IsEmpty => is_empty(field_value),
            ConditionOperator::IsNotEmpty => !is_empty(field_value),
        }
    }
}

impl ConditionGroup {
    /// Parse a trigger's stored conditions. `None` and JSON null mean "always run".
    pub fn decode(raw: Option<&Value>) -> Result<Option<Self>, WorkflowError> {
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| WorkflowError::InvalidConditions(e.to_string())),
        }
    }

    /// An empty group is satisfied
    pub fn evaluate(&self, data: &TemplateData) -> bool {
        let mut results = self
            .conditions
            .iter()
            .map(|c| c.evaluate(data))
            .chain(self.groups.iter().map(|g| g.evaluate(data)));

        match self.logic {
            LogicOperator::And => results.all(|r| r),
            LogicOperator::Or => {
                if self.conditions.is_empty() && self.groups.is_empty() {
                    true
                } else {
                    results.any(|r| r)
                }
            }
        }
    }
}

fn loose_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(actual), as_number(expected)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => actual == expected,
    }
}

fn string_test(field: Option<&Value>, pattern: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    match (field.and_then(Value::as_str), pattern.as_str()) {
        (Some(s), Some(p)) => test(&s.to_lowercase(), &p.to_lowercase()),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn in_list(field: Option<&Value>, list: &Value) -> bool {
    match (field, list.as_array()) {
        (Some(v), Some(items)) => items.iter().any(|item| loose_eq(v, item)),
        _ => false,
    }
}

fn is_empty(field: Option<&Value>) -> bool {
    match field {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}
