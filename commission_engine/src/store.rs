//! Rule storage with an audit trail.
//!
//! Rule lists are owned by a [`RuleStore`]; the evaluation engine only
//! ever sees snapshots.  Every successful mutation returns an
//! [`AuditEntry`] that is also appended to the store's log.  Failed
//! mutations leave the store untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RuleError;
use crate::models::{
    same_text, AdvancedConditions, CommissionRule, ConditionOperator, Rate, RuleType,
};

/// What happened to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Created,
    Updated,
    Toggled,
    Deleted,
}

/// An immutable record of one rule mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub rule_id: String,
    pub rule_name: String,
    pub detail: String,
}

impl AuditEntry {
    fn new(action: AuditAction, rule: &CommissionRule, detail: impl Into<String>) -> Self {
        AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            detail: detail.into(),
        }
    }
}

/// The authored fields of a rule, used for create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(flatten)]
    pub rate: Rate,
    #[serde(default)]
    pub min_amount: Option<f64>,
    #[serde(default)]
    pub max_amount: Option<f64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub conditions: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub advanced_conditions: Option<AdvancedConditions>,
    #[serde(default)]
    pub tiered_config_id: Option<String>,
}

fn default_active() -> bool {
    true
}

impl RuleDraft {
    fn into_rule(self, id: String) -> CommissionRule {
        CommissionRule {
            id,
            name: self.name.trim().to_string(),
            rule_type: self.rule_type,
            rate: self.rate,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            category: self.category.trim().to_string(),
            conditions: self.conditions,
            is_active: self.is_active,
            advanced_conditions: self.advanced_conditions,
            tiered_config_id: self.tiered_config_id,
        }
    }
}

impl From<CommissionRule> for RuleDraft {
    fn from(rule: CommissionRule) -> Self {
        RuleDraft {
            name: rule.name,
            rule_type: rule.rule_type,
            rate: rule.rate,
            min_amount: rule.min_amount,
            max_amount: rule.max_amount,
            category: rule.category,
            conditions: rule.conditions,
            is_active: rule.is_active,
            advanced_conditions: rule.advanced_conditions,
            tiered_config_id: rule.tiered_config_id,
        }
    }
}

/// Checks a draft's own fields.  Name uniqueness is checked by the store.
pub fn validate_draft(draft: &RuleDraft) -> Result<(), RuleError> {
    if draft.name.trim().is_empty() {
        return Err(RuleError::MissingField("name".into()));
    }
    if let Some(caution) = draft.rate.validate()? {
        tracing::warn!(name = %draft.name, %caution, "rule saved with caution");
    }
    for (label, bound) in [("minAmount", draft.min_amount), ("maxAmount", draft.max_amount)] {
        if let Some(value) = bound {
            if !value.is_finite() || value < 0.0 {
                return Err(RuleError::InvalidBounds(format!("{label} must be a non-negative number")));
            }
        }
    }
    if let (Some(min), Some(max)) = (draft.min_amount, draft.max_amount) {
        if min > max {
            return Err(RuleError::InvalidBounds(format!(
                "minAmount {min} exceeds maxAmount {max}"
            )));
        }
    }
    if let Some(advanced) = &draft.advanced_conditions {
        for condition in &advanced.conditions {
            if condition.operator == ConditionOperator::Between && condition.second_value.is_none() {
                return Err(RuleError::MissingField(format!(
                    "secondValue for condition `{}`",
                    condition.id
                )));
            }
            if let Some(rate) = &condition.rate_override {
                rate.validate()?;
            }
        }
    }
    Ok(())
}

/// Mutable home of the rule list.
pub trait RuleStore {
    fn create(&mut self, draft: RuleDraft) -> Result<AuditEntry, RuleError>;
    fn update(&mut self, id: &str, draft: RuleDraft) -> Result<AuditEntry, RuleError>;
    /// Flips the rule's active flag.
    fn toggle(&mut self, id: &str) -> Result<AuditEntry, RuleError>;
    fn delete(&mut self, id: &str) -> Result<AuditEntry, RuleError>;
    fn get(&self, id: &str) -> Option<&CommissionRule>;
    /// A copy of the current rules for evaluation.
    fn snapshot(&self) -> Vec<CommissionRule>;
    fn audit_log(&self) -> &[AuditEntry];
}

/// Process-local rule store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleStore {
    rules: Vec<CommissionRule>,
    log: Vec<AuditEntry>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store from existing rules, recording a creation entry for
    /// each.  Rules with duplicate names or invalid fields are rejected.
    pub fn with_rules(rules: Vec<CommissionRule>) -> Result<Self, RuleError> {
        let mut store = Self::new();
        for rule in rules {
            let draft = RuleDraft::from(rule.clone());
            validate_draft(&draft)?;
            store.ensure_unique(&draft.name, None)?;
            let rule = draft.into_rule(rule.id);
            store.log.push(AuditEntry::new(AuditAction::Created, &rule, "loaded"));
            store.rules.push(rule);
        }
        Ok(store)
    }

    fn ensure_unique(&self, name: &str, except_id: Option<&str>) -> Result<(), RuleError> {
        let name = name.trim();
        let taken = self
            .rules
            .iter()
            .filter(|r| Some(r.id.as_str()) != except_id)
            .any(|r| same_text(&r.name, name));
        if taken {
            return Err(RuleError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize, RuleError> {
        self.rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))
    }

    fn record(&mut self, entry: AuditEntry) -> AuditEntry {
        tracing::info!(
            action = ?entry.action,
            rule_id = %entry.rule_id,
            rule_name = %entry.rule_name,
            "commission rule changed"
        );
        self.log.push(entry.clone());
        entry
    }
}

impl RuleStore for InMemoryRuleStore {
    fn create(&mut self, draft: RuleDraft) -> Result<AuditEntry, RuleError> {
        validate_draft(&draft)?;
        self.ensure_unique(&draft.name, None)?;
        let rule = draft.into_rule(Uuid::new_v4().to_string());
        let entry = AuditEntry::new(AuditAction::Created, &rule, format!("{} rule created", rule.rule_type));
        self.rules.push(rule);
        Ok(self.record(entry))
    }

    fn update(&mut self, id: &str, draft: RuleDraft) -> Result<AuditEntry, RuleError> {
        let index = self.position(id)?;
        validate_draft(&draft)?;
        self.ensure_unique(&draft.name, Some(id))?;
        let rule = draft.into_rule(id.to_string());
        let entry = AuditEntry::new(AuditAction::Updated, &rule, "rule updated");
        self.rules[index] = rule;
        Ok(self.record(entry))
    }

    fn toggle(&mut self, id: &str) -> Result<AuditEntry, RuleError> {
        let index = self.position(id)?;
        let rule = &mut self.rules[index];
        rule.is_active = !rule.is_active;
        let detail = if rule.is_active { "rule activated" } else { "rule deactivated" };
        let entry = AuditEntry::new(AuditAction::Toggled, rule, detail);
        Ok(self.record(entry))
    }

    fn delete(&mut self, id: &str) -> Result<AuditEntry, RuleError> {
        let index = self.position(id)?;
        let rule = self.rules.remove(index);
        let entry = AuditEntry::new(AuditAction::Deleted, &rule, "rule deleted");
        Ok(self.record(entry))
    }

    fn get(&self, id: &str) -> Option<&CommissionRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    fn snapshot(&self) -> Vec<CommissionRule> {
        self.rules.clone()
    }

    fn audit_log(&self) -> &[AuditEntry] {
        &self.log
    }
}
