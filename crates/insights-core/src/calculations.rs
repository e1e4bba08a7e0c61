use serde::{Deserialize, Serialize};

use crate::error::{InsightsError, Result};
use crate::models::UsageCounters;

/// Constants that turn accepted lines into time and money.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Lines a developer writes by hand per minute.
    pub lines_per_minute: f64,
    /// Loaded developer cost in USD per hour.
    pub hourly_rate: f64,
    /// Per-seat monthly subscription price in USD.
    pub subscription_cost: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            lines_per_minute: 10.0,
            hourly_rate: 50.0,
            subscription_cost: 40.0,
        }
    }
}

impl MetricsConfig {
    /// Reject values that would make every derived figure meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.lines_per_minute.is_finite() || self.lines_per_minute <= 0.0 {
            return Err(InsightsError::Config(format!(
                "lines per minute must be a positive number, got {}",
                self.lines_per_minute
            )));
        }
        if !self.hourly_rate.is_finite() || self.hourly_rate < 0.0 {
            return Err(InsightsError::Config(format!(
                "hourly rate must be zero or more, got {}",
                self.hourly_rate
            )));
        }
        if !self.subscription_cost.is_finite() || self.subscription_cost < 0.0 {
            return Err(InsightsError::Config(format!(
                "subscription cost must be zero or more, got {}",
                self.subscription_cost
            )));
        }
        Ok(())
    }

    /// Yearly subscription cost of a single seat.
    pub fn annual_seat_cost(&self) -> f64 {
        self.subscription_cost * 12.0
    }
}

// ── Formulas ──────────────────────────────────────────────────────────────────

/// `accepted / suggested × 100`, or `0.0` when nothing was suggested.
pub fn acceptance_rate(accepted: u64, suggested: u64) -> f64 {
    if suggested == 0 {
        return 0.0;
    }
    accepted as f64 / suggested as f64 * 100.0
}

/// Hours a developer would have spent typing `accepted_lines` by hand.
pub fn hours_saved(accepted_lines: u64, config: &MetricsConfig) -> f64 {
    if config.lines_per_minute <= 0.0 {
        return 0.0;
    }
    accepted_lines as f64 / config.lines_per_minute / 60.0
}

/// USD value of `hours` at the configured hourly rate.
pub fn money_saved(hours: f64, config: &MetricsConfig) -> f64 {
    hours * config.hourly_rate
}

/// `money_saved / cost × 100`, or `0.0` when there is no cost to recover.
pub fn roi(money_saved: f64, cost: f64) -> f64 {
    if cost <= 0.0 {
        return 0.0;
    }
    money_saved / cost * 100.0
}

// ── SavingsCalculator ─────────────────────────────────────────────────────────

/// Everything derived from a set of counters and a seat count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SavingsEstimate {
    pub accepted_lines: u64,
    pub suggested_lines: u64,
    pub acceptance_rate: f64,
    pub hours_saved: f64,
    pub money_saved: f64,
    /// Annualized subscription cost for all seats.
    pub annual_cost: f64,
    pub roi: f64,
}

/// Stateless collection of savings and ROI calculations.
pub struct SavingsCalculator;

impl SavingsCalculator {
    /// Derive the savings figures for `counters` spread over `seats` users.
    ///
    /// Accepted lines are the chat lines the user kept; suggested lines are
    /// the chat lines proposed. The annual cost scales with `seats`.
    pub fn estimate(counters: &UsageCounters, seats: usize, config: &MetricsConfig) -> SavingsEstimate {
        let accepted_lines = counters.chat_accepted_lines_added;
        let suggested_lines = counters.chat_suggested_lines_added;
        let hours = hours_saved(accepted_lines, config);
        let money = money_saved(hours, config);
        let annual_cost = config.annual_seat_cost() * seats as f64;

        SavingsEstimate {
            accepted_lines,
            suggested_lines,
            acceptance_rate: acceptance_rate(accepted_lines, suggested_lines),
            hours_saved: hours,
            money_saved: money,
            annual_cost,
            roi: roi(money, annual_cost),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
