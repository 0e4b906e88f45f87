use serde::{Deserialize, Serialize};

use super::error::HookError;

/// Guard on a hook step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    Exists,
    NotExists,
}

/// Condition evaluator for hook steps
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate a list of conditions (all must be true)
    pub fn evaluate_conditions<F>(conditions: &[Condition], lookup: F) -> Result<bool, HookError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for condition in conditions {
            if !Self::evaluate_condition(condition, &lookup)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluate a single condition. `lookup` returns the variable's current
    /// value, already resolved.
    pub fn evaluate_condition<F>(condition: &Condition, lookup: F) -> Result<bool, HookError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let current = lookup(&condition.variable);

        match condition.operator {
            ConditionOperator::Exists => return Ok(current.is_some()),
            ConditionOperator::NotExists => return Ok(current.is_none()),
            _ => {}
        }

        let expected = condition
            .value
            .as_deref()
            .ok_or_else(|| HookError::InvalidCondition {
                variable: condition.variable.clone(),
                reason: format!("{:?} requires a value", condition.operator),
            })?;

        // an undefined variable only satisfies not_equals
        let Some(current) = current else {
            return Ok(condition.operator == ConditionOperator::NotEquals);
        };

        Ok(match condition.operator {
            ConditionOperator::Equals => current == expected,
            ConditionOperator::NotEquals => current != expected,
            ConditionOperator::Contains => current.contains(expected),
            ConditionOperator::StartsWith => current.starts_with(expected),
            ConditionOperator::EndsWith => current.ends_with(expected),
            ConditionOperator::Exists => true,
            ConditionOperator::NotExists => false,
        })
    }
}
