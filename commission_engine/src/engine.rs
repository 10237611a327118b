//! Commission computation engine.
//!
//! The `engine` module decides whether a [`CommissionRule`] applies to a
//! scenario and, if so, how much commission it pays.  Scenario runs
//! filter the rule list by type and active flag before matching; batch
//! runs use the [`rayon`] crate to evaluate many scenarios across
//! multiple CPU cores.  Tier ladders are resolved through the
//! [`TierSource`] trait.
//!
//! Nothing in this module mutates rules or keeps state between calls.

use rayon::prelude::*;

use crate::conditions::{calculate_conditional_rate, evaluate_advanced_conditions};
use crate::models::{
    same_text, CommissionRule, EvaluationContext, Rate, RateType, ScenarioSummary, TestResult,
    TestScenario,
};
use crate::tiered::{calculate_tiered_commission, TierCatalog, TierSource, TieredCommissionResult};

/// Evaluates one rule against a scenario, resolving tier ladders from
/// the built-in templates.
///
/// Type and active-flag filtering is the caller's job; see
/// [`run_scenario`].
pub fn match_and_compute(rule: &CommissionRule, context: &EvaluationContext) -> TestResult {
    match_and_compute_with(rule, context, &TierCatalog::with_defaults())
}

/// Evaluates one rule against a scenario using `tiers` to resolve the
/// rule's ladder.
pub fn match_and_compute_with(
    rule: &CommissionRule,
    context: &EvaluationContext,
    tiers: &dyn TierSource,
) -> TestResult {
    if !rule_matches(rule, context) {
        return TestResult {
            rule: rule.clone(),
            matches: false,
            calculated_rate: rule.rate,
            commission: 0.0,
            tiered_breakdown: None,
        };
    }

    let calculated_rate = match &rule.advanced_conditions {
        Some(advanced) => calculate_conditional_rate(advanced, context, rule.rate),
        None => rule.rate,
    };
    let (commission, tiered_breakdown) = compute_commission(rule, calculated_rate, context, tiers);

    TestResult {
        rule: rule.clone(),
        matches: true,
        calculated_rate,
        commission,
        tiered_breakdown,
    }
}

fn rule_matches(rule: &CommissionRule, context: &EvaluationContext) -> bool {
    let amount = context.amount();
    if rule.min_amount.is_some_and(|min| amount < min) {
        return false;
    }
    if rule.max_amount.is_some_and(|max| amount > max) {
        return false;
    }
    if !rule.category.trim().is_empty() && !same_text(&rule.category, &context.category) {
        return false;
    }
    match &rule.advanced_conditions {
        Some(advanced) if !advanced.conditions.is_empty() => {
            evaluate_advanced_conditions(advanced, context)
        }
        _ => true,
    }
}

fn compute_commission(
    rule: &CommissionRule,
    rate: Rate,
    context: &EvaluationContext,
    tiers: &dyn TierSource,
) -> (f64, Option<TieredCommissionResult>) {
    match rate.rate_type {
        // Percentage of the transaction amount
        RateType::Percentage => (context.amount() * rate.rate / 100.0, None),
        // Flat amount per unit sold
        RateType::Fixed => (rate.rate * context.quantity(), None),
        RateType::Tiered => {
            // Resolve the rule's ladder; an override can switch a rule to tiered too
            let ladder = rule
                .tiered_config_id
                .as_deref()
                .and_then(|id| tiers.tiered_config(id));
            match ladder {
                Some(config) => {
                    let result = calculate_tiered_commission(context.amount(), config);
                    (result.total_commission, Some(result))
                }
                None => {
                    // No ladder to walk, so treat the rate value as a percentage
                    tracing::warn!(
                        rule_id = %rule.id,
                        tiered_config_id = ?rule.tiered_config_id,
                        "tiered rule has no resolvable ladder; applying rate as a percentage"
                    );
                    (context.amount() * rate.rate / 100.0, None)
                }
            }
        }
    }
}

fn applies_to(rule: &CommissionRule, scenario: &TestScenario) -> bool {
    rule.is_active && same_text(rule.rule_type.as_str(), &scenario.rule_type)
}

/// Runs a scenario against every active rule of the scenario's type,
/// resolving tier ladders from the built-in templates.
///
/// Inactive rules and rules of other types are left out of the result
/// entirely.  Results keep the input order of `rules`.
pub fn run_scenario(rules: &[CommissionRule], scenario: &TestScenario) -> Vec<TestResult> {
    run_scenario_with(rules, scenario, &TierCatalog::with_defaults())
}

/// Like [`run_scenario`], resolving ladders from `tiers`.
pub fn run_scenario_with(
    rules: &[CommissionRule],
    scenario: &TestScenario,
    tiers: &dyn TierSource,
) -> Vec<TestResult> {
    let results: Vec<TestResult> = rules
        .iter()
        .filter(|rule| applies_to(rule, scenario))
        .map(|rule| match_and_compute_with(rule, scenario, tiers))
        .collect();
    tracing::debug!(
        scenario_type = %scenario.rule_type,
        evaluated = results.len(),
        matched = results.iter().filter(|r| r.matches).count(),
        "scenario evaluated"
    );
    results
}

/// Runs many scenarios in parallel.  The outer vector follows the order
/// of `scenarios`.
pub fn run_scenarios(
    rules: &[CommissionRule],
    scenarios: &[TestScenario],
    tiers: &dyn TierSource,
) -> Vec<Vec<TestResult>> {
    scenarios
        .par_iter()
        .map(|scenario| run_scenario_with(rules, scenario, tiers))
        .collect()
}

/// Counts matches and sums the commission of matched results.
pub fn summarize(results: &[TestResult]) -> ScenarioSummary {
    results
        .iter()
        .fold(ScenarioSummary { evaluated: results.len(), ..Default::default() }, |mut acc, r| {
            if r.matches {
                acc.matched += 1;
                acc.total_commission += r.commission;
            }
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AdvancedConditions, ConditionField, ConditionLogic, ConditionOperator, ConditionRule, RuleType,
    };

    fn rule(id: &str, rule_type: RuleType, rate: Rate) -> CommissionRule {
        CommissionRule {
            id: id.into(),
            name: format!("Rule {id}"),
            rule_type,
            rate,
            min_amount: None,
            max_amount: None,
            category: String::new(),
            conditions: String::new(),
            is_active: true,
            advanced_conditions: None,
            tiered_config_id: None,
        }
    }

    fn scenario(amount: f64, quantity: f64, category: &str) -> TestScenario {
        EvaluationContext::new(amount, quantity, category, RuleType::Doctor)
    }

    #[test]
    fn percentage_commission() {
        let r = rule("p", RuleType::Doctor, Rate::percentage(15.0));
        let result = match_and_compute(&r, &scenario(10_000.0, 1.0, "Surgery"));
        assert!(result.matches);
        assert_eq!(result.commission, 1_500.0);
    }

    #[test]
    fn fixed_commission_scales_with_quantity() {
        let r = rule("f", RuleType::Doctor, Rate::fixed(850.0));
        let result = match_and_compute(&r, &scenario(10_000.0, 3.0, "Surgery"));
        assert_eq!(result.commission, 2_550.0);
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        let mut r = rule("b", RuleType::Doctor, Rate::percentage(10.0));
        r.min_amount = Some(5_000.0);
        r.max_amount = Some(8_000.0);
        assert!(!match_and_compute(&r, &scenario(4_999.0, 1.0, "")).matches);
        assert!(match_and_compute(&r, &scenario(5_000.0, 1.0, "")).matches);
        assert!(match_and_compute(&r, &scenario(8_000.0, 1.0, "")).matches);
        assert!(!match_and_compute(&r, &scenario(8_000.01, 1.0, "")).matches);
    }

    #[test]
    fn min_amount_gate_overrides_advanced_conditions() {
        let mut r = rule("g", RuleType::Doctor, Rate::percentage(10.0));
        r.min_amount = Some(5_000.0);
        r.advanced_conditions = Some(AdvancedConditions {
            logic: ConditionLogic::Or,
            conditions: vec![ConditionRule {
                id: "c".into(),
                field: ConditionField::Amount,
                operator: ConditionOperator::Gt,
                value: 0.0.into(),
                second_value: None,
                rate_override: Some(Rate::percentage(50.0)),
            }],
        });
        let result = match_and_compute(&r, &scenario(4_999.0, 1.0, ""));
        assert!(!result.matches);
        assert_eq!(result.commission, 0.0);
        assert_eq!(result.calculated_rate, Rate::percentage(10.0));
    }

    #[test]
    fn category_and_type_match_folds_unicode_case() {
        let mut r = rule("u", RuleType::Doctor, Rate::percentage(10.0));
        r.category = "Cardiología".into();
        assert!(match_and_compute(&r, &scenario(100.0, 1.0, "CARDIOLOGÍA")).matches);
        assert!(!match_and_compute(&r, &scenario(100.0, 1.0, "Cardiologia")).matches);

        let mut ctx = scenario(100.0, 1.0, "cardiología");
        ctx.rule_type = " DOCTOR ".into();
        assert_eq!(run_scenario(&[r], &ctx).len(), 1);
    }

    #[test]
    fn category_match_is_case_insensitive() {
        let mut r = rule("c", RuleType::Doctor, Rate::percentage(10.0));
        r.category = "Surgery".into();
        assert!(match_and_compute(&r, &scenario(100.0, 1.0, "SURGERY")).matches);
        assert!(!match_and_compute(&r, &scenario(100.0, 1.0, "Radiology")).matches);
        assert!(!match_and_compute(&r, &scenario(100.0, 1.0, "")).matches);
    }

    #[test]
    fn override_rate_drives_commission() {
        let mut r = rule("o", RuleType::Doctor, Rate::percentage(10.0));
        r.advanced_conditions = Some(AdvancedConditions {
            logic: ConditionLogic::And,
            conditions: vec![ConditionRule {
                id: "qty".into(),
                field: ConditionField::Quantity,
                operator: ConditionOperator::Gte,
                value: 2.0.into(),
                second_value: None,
                rate_override: Some(Rate::fixed(100.0)),
            }],
        });
        let result = match_and_compute(&r, &scenario(10_000.0, 4.0, ""));
        assert!(result.matches);
        assert_eq!(result.calculated_rate, Rate::fixed(100.0));
        assert_eq!(result.commission, 400.0);

        let result = match_and_compute(&r, &scenario(10_000.0, 1.0, ""));
        assert!(!result.matches);
    }

    #[test]
    fn tiered_rule_uses_linked_ladder() {
        let mut r = rule("t", RuleType::Doctor, Rate::tiered(0.0));
        r.tiered_config_id = Some("standard-percentage".into());
        let result = match_and_compute(&r, &scenario(60_000.0, 1.0, ""));
        assert_eq!(result.commission, 4_500.0);
        let breakdown = result.tiered_breakdown.unwrap();
        assert_eq!(breakdown.tier_breakdown.len(), 3);
    }

    #[test]
    fn tiered_rule_on_a_boundary_stays_in_the_lower_slice() {
        let mut r = rule("t", RuleType::Doctor, Rate::tiered(0.0));
        r.tiered_config_id = Some("standard-percentage".into());
        let result = match_and_compute(&r, &scenario(10_000.0, 1.0, ""));
        assert_eq!(result.commission, 500.0);
        let breakdown = result.tiered_breakdown.unwrap().tier_breakdown;
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].tier_id, "spt-1");

        // Non-cumulative ladder: 5000 opens the second tier's flat bonus.
        r.tiered_config_id = Some("volume-fixed".into());
        assert_eq!(match_and_compute(&r, &scenario(5_000.0, 1.0, "")).commission, 250.0);
    }

    #[test]
    fn tiered_rule_without_ladder_falls_back_to_percentage() {
        let r = rule("t", RuleType::Doctor, Rate::tiered(8.0));
        let result = match_and_compute(&r, &scenario(1_000.0, 1.0, ""));
        assert!(result.matches);
        assert_eq!(result.calculated_rate, Rate::tiered(8.0));
        assert_eq!(result.commission, 80.0);
        assert!(result.tiered_breakdown.is_none());
    }

    #[test]
    fn matching_is_idempotent() {
        let mut r = rule("i", RuleType::Doctor, Rate::tiered(0.0));
        r.tiered_config_id = Some("standard-percentage".into());
        let ctx = scenario(12_345.67, 2.0, "");
        let first = serde_json::to_string(&match_and_compute(&r, &ctx)).unwrap();
        let second = serde_json::to_string(&match_and_compute(&r, &ctx)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn scenario_filters_type_and_inactive_rules() {
        let mut inactive = rule("off", RuleType::Doctor, Rate::percentage(5.0));
        inactive.is_active = false;
        let rules = vec![
            rule("d1", RuleType::Doctor, Rate::percentage(10.0)),
            rule("a1", RuleType::Agent, Rate::percentage(10.0)),
            inactive,
            rule("d2", RuleType::Doctor, Rate::fixed(50.0)),
        ];
        let results = run_scenario(&rules, &scenario(1_000.0, 2.0, ""));
        let ids: Vec<&str> = results.iter().map(|r| r.rule.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2"]);

        let summary = summarize(&results);
        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.total_commission, 200.0);
    }

    #[test]
    fn summary_ignores_unmatched_results() {
        let mut bounded = rule("b", RuleType::Doctor, Rate::percentage(10.0));
        bounded.min_amount = Some(10_000.0);
        let rules = vec![bounded, rule("d", RuleType::Doctor, Rate::percentage(1.0))];
        let summary = summarize(&run_scenario(&rules, &scenario(1_000.0, 1.0, "")));
        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.total_commission, 10.0);
    }

    #[test]
    fn batch_runs_keep_scenario_order() {
        let rules = vec![rule("d", RuleType::Doctor, Rate::percentage(10.0))];
        let scenarios: Vec<TestScenario> = (1..=20).map(|i| scenario(i as f64 * 100.0, 1.0, "")).collect();
        let batches = run_scenarios(&rules, &scenarios, &TierCatalog::with_defaults());
        assert_eq!(batches.len(), 20);
        for (i, results) in batches.iter().enumerate() {
            assert_eq!(results[0].commission, (i as f64 + 1.0) * 10.0);
        }
    }
}
