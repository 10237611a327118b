//! Tiered commission ladders.
//!
//! The `tiered` module defines tier ladders, the calculator that walks
//! them, the built-in templates offered for quick selection, and helpers
//! for loading additional ladders from JSON files.  Rules refer to a
//! ladder by id, and ladders are resolved through the [`TierSource`]
//! trait so that callers can supply their own catalog.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Rate type allowed inside a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierRateType {
    Percentage,
    Fixed,
}

/// How a fixed-rate tier is charged in cumulative mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FixedTierCharge {
    /// The flat rate is charged once for every tier the amount reaches.
    #[default]
    OncePerTier,
    /// The flat rate is scaled by the share of the tier's range that
    /// the amount covers.  Open-ended tiers charge the full rate.
    Prorated,
}

/// One bracket of a ladder, covering `[min_amount, max_amount)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredRate {
    pub id: String,
    pub min_amount: f64,
    /// `None` means the tier is open-ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    pub rate: f64,
    pub rate_type: TierRateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TieredRate {
    fn upper(&self) -> f64 {
        self.max_amount.unwrap_or(f64::INFINITY)
    }

    fn contains(&self, amount: f64) -> bool {
        self.min_amount <= amount && amount < self.upper()
    }

    /// The tier's own description, or a label such as `0 - 10000 @ 5%`.
    pub fn label(&self) -> String {
        if let Some(desc) = self.description.as_ref().filter(|d| !d.trim().is_empty()) {
            return desc.clone();
        }
        let range = match self.max_amount {
            Some(max) => format!("{} - {}", format_amount(self.min_amount), format_amount(max)),
            None => format!("{}+", format_amount(self.min_amount)),
        };
        match self.rate_type {
            TierRateType::Percentage => format!("{} @ {}%", range, format_amount(self.rate)),
            TierRateType::Fixed => format!("{} @ {} flat", range, format_amount(self.rate)),
        }
    }
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

/// A named tier ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredCommissionConfig {
    pub id: String,
    pub name: String,
    /// When `true` each tier taxes the slice of the amount that falls
    /// inside it; when `false` the single containing tier applies to the
    /// whole amount.
    pub cumulative_calculation: bool,
    /// Portion of the amount exempt from commission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_amount: Option<f64>,
    #[serde(default)]
    pub fixed_tier_charge: FixedTierCharge,
    pub tiers: Vec<TieredRate>,
}

/// Commission earned in one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierBreakdown {
    pub tier_id: String,
    pub tier_description: String,
    pub amount_in_tier: f64,
    pub rate: f64,
    pub rate_type: TierRateType,
    pub commission: f64,
}

/// Result of walking a ladder for one amount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredCommissionResult {
    pub total_commission: f64,
    /// `total_commission` as a percentage of the gross amount.
    pub effective_rate: f64,
    pub tier_breakdown: Vec<TierBreakdown>,
}

/// Computes the commission for `amount` under `config`.
pub fn calculate_tiered_commission(amount: f64, config: &TieredCommissionConfig) -> TieredCommissionResult {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    // Exempt the base amount, never going below zero
    let taxable = (amount - config.base_amount.unwrap_or(0.0)).max(0.0);

    let mut tiers: Vec<&TieredRate> = config.tiers.iter().collect();
    tiers.sort_by(|a, b| a.min_amount.total_cmp(&b.min_amount));

    let mut breakdown = Vec::new();
    if config.cumulative_calculation {
        // Each tier takes the slice of the taxable amount inside its range
        if taxable > 0.0 {
            for tier in tiers {
                let slice = (taxable.min(tier.upper()) - tier.min_amount).max(0.0);
                if slice <= 0.0 {
                    continue;
                }
                let commission = match tier.rate_type {
                    TierRateType::Percentage => slice * tier.rate / 100.0,
                    TierRateType::Fixed => match (config.fixed_tier_charge, tier.max_amount) {
                        (FixedTierCharge::Prorated, Some(max)) if max > tier.min_amount => {
                            tier.rate * slice / (max - tier.min_amount)
                        }
                        _ => tier.rate,
                    },
                };
                push_entry(&mut breakdown, tier, slice, commission);
            }
        }
    } else if let Some(tier) = tiers.into_iter().find(|t| t.contains(taxable)) {
        // The containing tier prices the whole taxable amount, even zero
        let commission = match tier.rate_type {
            TierRateType::Percentage => taxable * tier.rate / 100.0,
            TierRateType::Fixed => tier.rate,
        };
        push_entry(&mut breakdown, tier, taxable, commission);
    }

    // f64 `Sum` starts at -0.0; fold from +0.0 so empty ladders serialize as 0.0
    let total_commission = breakdown.iter().fold(0.0, |acc, b| acc + b.commission);
    let effective_rate = if amount > 0.0 {
        total_commission / amount * 100.0
    } else {
        0.0
    };
    TieredCommissionResult {
        total_commission,
        effective_rate,
        tier_breakdown: breakdown,
    }
}

fn push_entry(breakdown: &mut Vec<TierBreakdown>, tier: &TieredRate, amount_in_tier: f64, commission: f64) {
    if commission == 0.0 {
        return;
    }
    breakdown.push(TierBreakdown {
        tier_id: tier.id.clone(),
        tier_description: tier.label(),
        amount_in_tier,
        rate: tier.rate,
        rate_type: tier.rate_type,
        commission,
    });
}

/// Checks a ladder before it is saved or loaded.
///
/// Gaps between tiers are allowed; overlaps are not.
pub fn validate_tiered_config(config: &TieredCommissionConfig) -> Result<(), RuleError> {
    if config.id.trim().is_empty() {
        return Err(RuleError::MissingField("id".into()));
    }
    if config.tiers.is_empty() {
        return Err(RuleError::tier_config(&config.id, "at least one tier is required"));
    }
    if let Some(base) = config.base_amount {
        if !base.is_finite() || base < 0.0 {
            return Err(RuleError::tier_config(&config.id, "base amount must be non-negative"));
        }
    }

    let mut tiers: Vec<&TieredRate> = config.tiers.iter().collect();
    tiers.sort_by(|a, b| a.min_amount.total_cmp(&b.min_amount));

    for tier in &tiers {
        if !tier.min_amount.is_finite() || tier.min_amount < 0.0 {
            return Err(RuleError::tier_config(
                &config.id,
                format!("tier `{}` has an invalid minimum amount", tier.id),
            ));
        }
        if let Some(max) = tier.max_amount {
            if !max.is_finite() || max <= tier.min_amount {
                return Err(RuleError::tier_config(
                    &config.id,
                    format!("tier `{}` maximum must exceed its minimum", tier.id),
                ));
            }
        }
        if !tier.rate.is_finite() || tier.rate < 0.0 {
            return Err(RuleError::tier_config(
                &config.id,
                format!("tier `{}` has an invalid rate", tier.id),
            ));
        }
    }

    for pair in tiers.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        match lower.max_amount {
            None => {
                return Err(RuleError::tier_config(
                    &config.id,
                    format!("open-ended tier `{}` must be the last tier", lower.id),
                ))
            }
            Some(max) if max > upper.min_amount => {
                return Err(RuleError::tier_config(
                    &config.id,
                    format!("tiers `{}` and `{}` overlap", lower.id, upper.id),
                ))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn tier(id: &str, min: f64, max: Option<f64>, rate: f64, rate_type: TierRateType) -> TieredRate {
    TieredRate {
        id: id.to_string(),
        min_amount: min,
        max_amount: max,
        rate,
        rate_type,
        description: None,
    }
}

/// The built-in ladders offered as templates.
pub fn default_tiered_configurations() -> Vec<TieredCommissionConfig> {
    vec![
        TieredCommissionConfig {
            id: "standard-percentage".into(),
            name: "Standard Percentage Tiers".into(),
            cumulative_calculation: true,
            base_amount: None,
            fixed_tier_charge: FixedTierCharge::OncePerTier,
            tiers: vec![
                tier("spt-1", 0.0, Some(10_000.0), 5.0, TierRateType::Percentage),
                tier("spt-2", 10_000.0, Some(50_000.0), 7.5, TierRateType::Percentage),
                tier("spt-3", 50_000.0, None, 10.0, TierRateType::Percentage),
            ],
        },
        TieredCommissionConfig {
            id: "volume-fixed".into(),
            name: "Volume Fixed Bonus".into(),
            cumulative_calculation: false,
            base_amount: None,
            fixed_tier_charge: FixedTierCharge::OncePerTier,
            tiers: vec![
                tier("vfb-1", 0.0, Some(5_000.0), 100.0, TierRateType::Fixed),
                tier("vfb-2", 5_000.0, Some(20_000.0), 250.0, TierRateType::Fixed),
                tier("vfb-3", 20_000.0, None, 500.0, TierRateType::Fixed),
            ],
        },
        TieredCommissionConfig {
            id: "department-threshold".into(),
            name: "Department Threshold".into(),
            cumulative_calculation: true,
            base_amount: Some(25_000.0),
            fixed_tier_charge: FixedTierCharge::OncePerTier,
            tiers: vec![
                tier("dth-1", 0.0, Some(75_000.0), 2.0, TierRateType::Percentage),
                tier("dth-2", 75_000.0, None, 3.5, TierRateType::Percentage),
            ],
        },
    ]
}

/// Looks up a built-in template by id.
pub fn find_default_tiered_configuration(id: &str) -> Option<TieredCommissionConfig> {
    default_tiered_configurations().into_iter().find(|c| c.id == id)
}

/// Resolves tier ladders by id.
///
/// Implementations must be thread-safe (`Send + Sync`) because batch
/// scenario runs resolve ladders from several threads at once.
pub trait TierSource: Send + Sync {
    fn tiered_config(&self, id: &str) -> Option<&TieredCommissionConfig>;
}

impl TierSource for HashMap<String, TieredCommissionConfig> {
    fn tiered_config(&self, id: &str) -> Option<&TieredCommissionConfig> {
        self.get(id)
    }
}

/// An ordered collection of validated ladders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierCatalog {
    configs: Vec<TieredCommissionConfig>,
}

impl TierCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in templates.
    pub fn with_defaults() -> Self {
        TierCatalog {
            configs: default_tiered_configurations(),
        }
    }

    /// Validates and adds a ladder, replacing any ladder with the same id.
    pub fn insert(&mut self, config: TieredCommissionConfig) -> Result<(), RuleError> {
        validate_tiered_config(&config)?;
        match self.configs.iter_mut().find(|c| c.id == config.id) {
            Some(existing) => *existing = config,
            None => self.configs.push(config),
        }
        Ok(())
    }

    pub fn configs(&self) -> &[TieredCommissionConfig] {
        &self.configs
    }
}

impl TierSource for TierCatalog {
    fn tiered_config(&self, id: &str) -> Option<&TieredCommissionConfig> {
        self.configs.iter().find(|c| c.id == id)
    }
}

/// Load tier ladders from a directory.
///
/// Every `.json` file is parsed as a [`TieredCommissionConfig`] and
/// validated.  Files that fail to parse or validate are logged and
/// skipped.  A missing directory yields an empty list.
pub fn load_tiered_configs_from_dir(path: &Path) -> Result<Vec<TieredCommissionConfig>> {
    let mut configs = Vec::new();
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file = entry.path();
            if !entry.file_type()?.is_file() || file.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let data = std::fs::read_to_string(&file)?;
            match serde_json::from_str::<TieredCommissionConfig>(&data) {
                Ok(config) => match validate_tiered_config(&config) {
                    Ok(()) => configs.push(config),
                    Err(err) => tracing::warn!(file = %file.display(), %err, "skipping invalid tier ladder"),
                },
                Err(err) => tracing::warn!(file = %file.display(), %err, "failed to parse tier ladder"),
            }
        }
    }
    Ok(configs)
}
