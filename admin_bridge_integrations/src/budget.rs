use crate::error::{AdminBridgeError, Result};
use crate::schemas::BudgetStatus;
use crate::window::{Order, Selection, round2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_WARN_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLabel {
    WithinBudget,
    Warning,
    Breached,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Utilization {
    Ratio(f64),
    /// Positive spend against a zero budget.
    Unbounded,
}

impl Utilization {
    pub fn of(actual: f64, budget: f64) -> Self {
        if budget > 0.0 {
            Self::Ratio(actual / budget)
        } else if actual > 0.0 {
            Self::Unbounded
        } else {
            Self::Ratio(0.0)
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            Self::Ratio(r) => Some(*r),
            Self::Unbounded => None,
        }
    }

    fn sort_key(&self) -> f64 {
        self.ratio().unwrap_or(f64::INFINITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarnThreshold(f64);

impl WarnThreshold {
    pub fn new(value: f64) -> Result<Self> {
        if !(value > 0.0 && value <= 1.0) {
            return Err(AdminBridgeError::Validation(
                "warn_threshold must be between 0 and 1".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Default for WarnThreshold {
    fn default() -> Self {
        Self(DEFAULT_WARN_THRESHOLD)
    }
}

pub fn classify(actual: f64, budget: f64, threshold: WarnThreshold) -> (Utilization, BudgetLabel) {
    let utilization = Utilization::of(actual, budget);
    let label = match utilization {
        Utilization::Unbounded => BudgetLabel::Breached,
        Utilization::Ratio(r) if r >= 1.0 => BudgetLabel::Breached,
        Utilization::Ratio(r) if r >= threshold.get() => BudgetLabel::Warning,
        Utilization::Ratio(_) => BudgetLabel::WithinBudget,
    };
    (utilization, label)
}

/// One row of the budget table.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetLine {
    pub dimension_value: String,
    pub budget_amount: f64,
}

/// Pair each budget with its actual spend and classify it. Budgets without spend have actual 0.
/// Output is ordered by utilization, unbounded first.
pub fn evaluate(
    budgets: &[BudgetLine],
    actuals: &HashMap<String, f64>,
    threshold: WarnThreshold,
) -> Vec<BudgetStatus> {
    let evaluated = budgets.iter().map(|line| {
        let actual = actuals.get(&line.dimension_value).copied().unwrap_or(0.0);
        let (utilization, status) = classify(actual, line.budget_amount, threshold);
        log::debug!(
            "budget {}: actual={} budget={} status={:?}",
            line.dimension_value,
            actual,
            line.budget_amount,
            status
        );
        (
            utilization,
            BudgetStatus {
                dimension_value: line.dimension_value.clone(),
                actual_cost: round2(actual),
                budget_amount: line.budget_amount,
                utilization: utilization.ratio(),
                utilization_pct: utilization.ratio().map(|r| round2(r * 100.0)),
                status,
            },
        )
    });

    Selection::from_records(evaluated)
        .rank_by(|(utilization, _)| utilization.sort_key(), Order::Descending)
        .into_vec()
        .into_iter()
        .map(|(_, status)| status)
        .collect()
}
