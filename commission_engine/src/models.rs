//! Data models for the Commission Engine.
//!
//! The `models` module defines the serialisable rule, condition and
//! scenario types exchanged with the rule-authoring and rule-testing
//! screens.  Keys are camelCase so that payloads produced by those
//! screens deserialize without translation.  They form the basis of
//! the engine's input and output structures.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::tiered::TieredCommissionResult;

/// How a [`Rate`] is applied to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    /// `rate` is a percentage (0–100) of the transaction amount.
    Percentage,
    /// `rate` is a flat amount paid per unit of quantity.
    Fixed,
    /// The commission comes from a tier ladder.  See
    /// [`CommissionRule::tiered_config_id`].
    Tiered,
}

/// A commission rate value object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    pub rate_type: RateType,
    pub rate: f64,
}

impl Rate {
    pub fn percentage(rate: f64) -> Self {
        Rate {
            rate_type: RateType::Percentage,
            rate,
        }
    }

    pub fn fixed(rate: f64) -> Self {
        Rate {
            rate_type: RateType::Fixed,
            rate,
        }
    }

    pub fn tiered(rate: f64) -> Self {
        Rate {
            rate_type: RateType::Tiered,
            rate,
        }
    }
}

/// The party a commission rule pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Doctor,
    Agent,
    Department,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Doctor => "doctor",
            RuleType::Agent => "agent",
            RuleType::Department => "department",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the conditions of an [`AdvancedConditions`] block are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionLogic {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// The scenario fact a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionField {
    Amount,
    Quantity,
    Category,
    Type,
}

/// Comparison applied by a condition.
///
/// Operators the engine does not know deserialize to `Unsupported`,
/// which never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Between,
    #[serde(other)]
    Unsupported,
}

/// A condition operand.  Forms submit numbers either as JSON numbers
/// or as numeric text, so both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
}

impl ConditionValue {
    /// Numeric view of the operand.  Non-numeric text yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) if n.is_finite() => Some(*n),
            ConditionValue::Number(_) => None,
            ConditionValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ConditionValue::Number(n) => n.to_string(),
            ConditionValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Text(value.to_string())
    }
}

/// A single advanced condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRule {
    pub id: String,
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
    /// Upper bound for `between`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_value: Option<ConditionValue>,
    /// Rate applied when this condition is the first matching one
    /// carrying an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_override: Option<Rate>,
}

/// Additional gate on top of a rule's basic bounds and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedConditions {
    pub logic: ConditionLogic,
    #[serde(default)]
    pub conditions: Vec<ConditionRule>,
}

/// A commission rule as authored by administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRule {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(flatten)]
    pub rate: Rate,
    /// Inclusive lower bound on the transaction amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    /// Inclusive upper bound on the transaction amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    /// Case-insensitive category the rule is limited to.  Empty means
    /// any category.
    #[serde(default)]
    pub category: String,
    /// Free-text description of when the rule applies.  Not evaluated.
    #[serde(default)]
    pub conditions: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_conditions: Option<AdvancedConditions>,
    /// Tier ladder used when the resolved rate is [`RateType::Tiered`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiered_config_id: Option<String>,
}

fn default_active() -> bool {
    true
}

/// The transaction-like facts a rule is evaluated against.
///
/// Missing or malformed numeric fields read as `0` and missing text
/// fields as `""`, so a broken scenario fails most gates instead of
/// producing an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub rule_type: String,
}

/// A scenario entered in the rule-testing screen.
pub type TestScenario = EvaluationContext;

impl EvaluationContext {
    pub fn new(amount: f64, quantity: f64, category: &str, rule_type: RuleType) -> Self {
        EvaluationContext {
            amount,
            quantity,
            category: category.to_string(),
            rule_type: rule_type.as_str().to_string(),
        }
    }

    /// Amount with non-finite values read as `0`.
    pub fn amount(&self) -> f64 {
        finite_or_zero(self.amount)
    }

    /// Quantity with non-finite values read as `0`.
    pub fn quantity(&self) -> f64 {
        finite_or_zero(self.quantity)
    }
}

/// Case-insensitive comparison of free text, ignoring surrounding
/// whitespace.  Folds full Unicode, so accented categories match.
pub(crate) fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// The outcome of evaluating one rule against one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub rule: CommissionRule,
    pub matches: bool,
    pub calculated_rate: Rate,
    pub commission: f64,
    /// Per-tier detail when the commission came from a tier ladder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiered_breakdown: Option<TieredCommissionResult>,
}

/// Aggregate over the results of one scenario run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    /// Number of rules evaluated (after type/active filtering).
    pub evaluated: usize,
    /// Number of rules that matched.
    pub matched: usize,
    /// Sum of commission over matched rules.
    pub total_commission: f64,
}
