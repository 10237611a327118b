//! Commission Engine library crate.
//!
//! This crate evaluates commission rules against transaction scenarios:
//! basic amount/category gates, AND/OR advanced conditions with rate
//! overrides, percentage, fixed and tiered commission, and the scenario
//! test runner used by the rule-testing screen.  External applications
//! may depend on the `commission_engine` crate and call
//! `engine::run_scenario` directly or embed the API via
//! `api::build_router`.

pub mod api;
pub mod conditions;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod rate;
pub mod store;
pub mod tiered;

pub use conditions::{calculate_conditional_rate, evaluate_advanced_conditions, evaluate_condition};
pub use engine::{
    match_and_compute, match_and_compute_with, run_scenario, run_scenario_with, run_scenarios,
    summarize,
};
pub use error::RuleError;
pub use models::{
    AdvancedConditions, CommissionRule, ConditionField, ConditionLogic, ConditionOperator,
    ConditionRule, ConditionValue, EvaluationContext, Rate, RateType, RuleType, ScenarioSummary,
    TestResult, TestScenario,
};
pub use store::{AuditAction, AuditEntry, InMemoryRuleStore, RuleDraft, RuleStore};
pub use tiered::{
    calculate_tiered_commission, default_tiered_configurations, find_default_tiered_configuration,
    validate_tiered_config, TierCatalog, TierSource, TieredCommissionConfig, TieredCommissionResult,
    TieredRate,
};
