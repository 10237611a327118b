//! Advanced condition evaluation.
//!
//! Conditions are total over their inputs: an unsupported operator, an
//! operator that makes no sense for the field, or an operand that does
//! not parse as a number all evaluate to `false`.

use crate::models::{
    same_text, AdvancedConditions, ConditionField, ConditionLogic, ConditionOperator,
    ConditionRule, EvaluationContext, Rate,
};

/// Evaluates a single condition against the scenario.
pub fn evaluate_condition(condition: &ConditionRule, context: &EvaluationContext) -> bool {
    match condition.field {
        ConditionField::Amount => compare_numeric(condition, context.amount()),
        ConditionField::Quantity => compare_numeric(condition, context.quantity()),
        ConditionField::Category => compare_text(condition, &context.category),
        ConditionField::Type => compare_text(condition, &context.rule_type),
    }
}

fn compare_numeric(condition: &ConditionRule, actual: f64) -> bool {
    let Some(expected) = condition.value.as_number() else {
        return false;
    };
    match condition.operator {
        ConditionOperator::Gt => actual > expected,
        ConditionOperator::Gte => actual >= expected,
        ConditionOperator::Lt => actual < expected,
        ConditionOperator::Lte => actual <= expected,
        ConditionOperator::Eq => actual == expected,
        ConditionOperator::Between => match condition.second_value.as_ref().and_then(|v| v.as_number()) {
            Some(upper) => expected <= actual && actual <= upper,
            None => false,
        },
        ConditionOperator::Unsupported => false,
    }
}

fn compare_text(condition: &ConditionRule, actual: &str) -> bool {
    match condition.operator {
        ConditionOperator::Eq => same_text(&condition.value.as_text(), actual),
        _ => false,
    }
}

/// Combines the conditions of a block under its AND/OR logic.  An empty
/// block imposes no gate.
pub fn evaluate_advanced_conditions(
    advanced: &AdvancedConditions,
    context: &EvaluationContext,
) -> bool {
    if advanced.conditions.is_empty() {
        return true;
    }
    match advanced.logic {
        ConditionLogic::And => advanced
            .conditions
            .iter()
            .all(|c| evaluate_condition(c, context)),
        ConditionLogic::Or => advanced
            .conditions
            .iter()
            .any(|c| evaluate_condition(c, context)),
    }
}

/// Resolves the rate for a matched rule.
///
/// The first condition in declaration order that both holds and
/// carries a `rateOverride` supplies the rate; otherwise `base_rate` is
/// returned unchanged.
pub fn calculate_conditional_rate(
    advanced: &AdvancedConditions,
    context: &EvaluationContext,
    base_rate: Rate,
) -> Rate {
    advanced
        .conditions
        .iter()
        .filter(|c| c.rate_override.is_some())
        .find(|c| evaluate_condition(c, context))
        .and_then(|c| c.rate_override)
        .unwrap_or(base_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionValue, RuleType};

    fn condition(field: ConditionField, operator: ConditionOperator, value: ConditionValue) -> ConditionRule {
        ConditionRule {
            id: "c".into(),
            field,
            operator,
            value,
            second_value: None,
            rate_override: None,
        }
    }

    fn amount_ctx(amount: f64) -> EvaluationContext {
        EvaluationContext {
            amount,
            ..Default::default()
        }
    }

    #[test]
    fn between_is_inclusive_on_both_ends() {
        let mut c = condition(ConditionField::Amount, ConditionOperator::Between, 10.0.into());
        c.second_value = Some(20.0.into());
        assert!(evaluate_condition(&c, &amount_ctx(10.0)));
        assert!(evaluate_condition(&c, &amount_ctx(20.0)));
        assert!(!evaluate_condition(&c, &amount_ctx(21.0)));
        assert!(!evaluate_condition(&c, &amount_ctx(9.99)));
    }

    #[test]
    fn between_accepts_numeric_text_upper_bound() {
        let mut c = condition(ConditionField::Amount, ConditionOperator::Between, 10.0.into());
        c.second_value = Some(" 20 ".into());
        assert!(evaluate_condition(&c, &amount_ctx(20.0)));
        assert!(!evaluate_condition(&c, &amount_ctx(20.5)));
        c.second_value = Some("twenty".into());
        assert!(!evaluate_condition(&c, &amount_ctx(15.0)));
    }

    #[test]
    fn between_without_upper_bound_fails() {
        let c = condition(ConditionField::Amount, ConditionOperator::Between, 10.0.into());
        assert!(!evaluate_condition(&c, &amount_ctx(15.0)));
    }

    #[test]
    fn text_fields_only_support_case_insensitive_eq() {
        let ctx = EvaluationContext::new(100.0, 1.0, "Surgery", RuleType::Doctor);
        let eq = condition(ConditionField::Category, ConditionOperator::Eq, "surgery".into());
        assert!(evaluate_condition(&eq, &ctx));
        let ty = condition(ConditionField::Type, ConditionOperator::Eq, "DOCTOR".into());
        assert!(evaluate_condition(&ty, &ctx));
        let gt = condition(ConditionField::Category, ConditionOperator::Gt, "a".into());
        assert!(!evaluate_condition(&gt, &ctx));
    }

    #[test]
    fn unparseable_operand_and_unsupported_operator_fail_closed() {
        let ctx = amount_ctx(50.0);
        let text = condition(ConditionField::Amount, ConditionOperator::Gt, "lots".into());
        assert!(!evaluate_condition(&text, &ctx));
        let numeric_text = condition(ConditionField::Amount, ConditionOperator::Gt, "10".into());
        assert!(evaluate_condition(&numeric_text, &ctx));
        let unsupported = condition(ConditionField::Amount, ConditionOperator::Unsupported, 10.0.into());
        assert!(!evaluate_condition(&unsupported, &ctx));
    }

    #[test]
    fn and_or_semantics() {
        let yes = condition(ConditionField::Amount, ConditionOperator::Gte, 100.0.into());
        let no = condition(ConditionField::Quantity, ConditionOperator::Gt, 5.0.into());
        let ctx = EvaluationContext {
            amount: 100.0,
            quantity: 1.0,
            ..Default::default()
        };
        let and = AdvancedConditions {
            logic: ConditionLogic::And,
            conditions: vec![yes.clone(), no.clone()],
        };
        let or = AdvancedConditions {
            logic: ConditionLogic::Or,
            conditions: vec![yes, no],
        };
        assert!(!evaluate_advanced_conditions(&and, &ctx));
        assert!(evaluate_advanced_conditions(&or, &ctx));
    }

    #[test]
    fn empty_block_is_vacuously_true() {
        let empty = AdvancedConditions {
            logic: ConditionLogic::And,
            conditions: vec![],
        };
        assert!(evaluate_advanced_conditions(&empty, &EvaluationContext::default()));
    }

    #[test]
    fn first_matching_override_wins() {
        let mut first = condition(ConditionField::Amount, ConditionOperator::Gt, 1000.0.into());
        first.rate_override = Some(Rate::percentage(12.0));
        let mut second = condition(ConditionField::Amount, ConditionOperator::Gt, 500.0.into());
        second.rate_override = Some(Rate::percentage(20.0));
        let advanced = AdvancedConditions {
            logic: ConditionLogic::Or,
            conditions: vec![first, second],
        };
        let rate = calculate_conditional_rate(&advanced, &amount_ctx(5000.0), Rate::percentage(5.0));
        assert_eq!(rate, Rate::percentage(12.0));
    }

    #[test]
    fn matching_condition_without_override_does_not_shadow_later_override() {
        let plain = condition(ConditionField::Amount, ConditionOperator::Gt, 0.0.into());
        let mut priced = condition(ConditionField::Amount, ConditionOperator::Gt, 100.0.into());
        priced.rate_override = Some(Rate::fixed(300.0));
        let advanced = AdvancedConditions {
            logic: ConditionLogic::Or,
            conditions: vec![plain, priced],
        };
        let rate = calculate_conditional_rate(&advanced, &amount_ctx(200.0), Rate::percentage(5.0));
        assert_eq!(rate, Rate::fixed(300.0));
        let rate = calculate_conditional_rate(&advanced, &amount_ctx(50.0), Rate::percentage(5.0));
        assert_eq!(rate, Rate::percentage(5.0));
    }
}
