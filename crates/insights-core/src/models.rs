use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use crate::error::InsightsError;
use crate::time_utils;

/// The numeric usage counters carried by every record.
///
/// Every field is a plain sum, so counters from any number of records can be
/// combined with `+` / `+=` without losing information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Lines proposed by chat / agent edits.
    pub chat_suggested_lines_added: u64,
    /// Deletions proposed by chat / agent edits.
    pub chat_suggested_lines_deleted: u64,
    /// Proposed lines the user kept.
    pub chat_accepted_lines_added: u64,
    /// Proposed deletions the user kept.
    pub chat_accepted_lines_deleted: u64,
    /// Times a chat suggestion was applied to a file.
    pub chat_total_applies: u64,
    /// Applied suggestions that were accepted.
    pub chat_total_accepts: u64,
    /// Applied suggestions that were rejected.
    pub chat_total_rejects: u64,
    /// Tab completions shown from chat context.
    pub chat_tabs_shown: u64,
    /// Tab completions accepted.
    pub tabs_accepted: u64,
    pub edit_requests: u64,
    pub ask_requests: u64,
    pub agent_requests: u64,
    pub cmdk_usages: u64,
    pub subscription_included_reqs: u64,
    pub api_key_reqs: u64,
    pub usage_based_reqs: u64,
    pub bugbot_usages: u64,
}

impl UsageCounters {
    /// Sum of every interactive request kind (ask, edit, agent, cmd+k, bugbot).
    pub fn total_requests(&self) -> u64 {
        [
            self.ask_requests,
            self.edit_requests,
            self.agent_requests,
            self.cmdk_usages,
            self.bugbot_usages,
        ]
        .into_iter()
        .fold(0, u64::saturating_add)
    }
}

// Counters saturate at `u64::MAX` instead of overflowing; a single absurd
// cell must not abort the whole aggregation.
fn add(total: &mut u64, value: u64) {
    *total = total.saturating_add(value);
}

impl AddAssign<&UsageCounters> for UsageCounters {
    fn add_assign(&mut self, rhs: &UsageCounters) {
        add(&mut self.chat_suggested_lines_added, rhs.chat_suggested_lines_added);
        add(&mut self.chat_suggested_lines_deleted, rhs.chat_suggested_lines_deleted);
        add(&mut self.chat_accepted_lines_added, rhs.chat_accepted_lines_added);
        add(&mut self.chat_accepted_lines_deleted, rhs.chat_accepted_lines_deleted);
        add(&mut self.chat_total_applies, rhs.chat_total_applies);
        add(&mut self.chat_total_accepts, rhs.chat_total_accepts);
        add(&mut self.chat_total_rejects, rhs.chat_total_rejects);
        add(&mut self.chat_tabs_shown, rhs.chat_tabs_shown);
        add(&mut self.tabs_accepted, rhs.tabs_accepted);
        add(&mut self.edit_requests, rhs.edit_requests);
        add(&mut self.ask_requests, rhs.ask_requests);
        add(&mut self.agent_requests, rhs.agent_requests);
        add(&mut self.cmdk_usages, rhs.cmdk_usages);
        add(&mut self.subscription_included_reqs, rhs.subscription_included_reqs);
        add(&mut self.api_key_reqs, rhs.api_key_reqs);
        add(&mut self.usage_based_reqs, rhs.usage_based_reqs);
        add(&mut self.bugbot_usages, rhs.bugbot_usages);
    }
}

impl AddAssign for UsageCounters {
    fn add_assign(&mut self, rhs: UsageCounters) {
        *self += &rhs;
    }
}

impl Add for UsageCounters {
    type Output = UsageCounters;

    fn add(mut self, rhs: UsageCounters) -> UsageCounters {
        self += &rhs;
        self
    }
}

impl<'a> Sum<&'a UsageCounters> for UsageCounters {
    fn sum<I: Iterator<Item = &'a UsageCounters>>(iter: I) -> Self {
        iter.fold(UsageCounters::default(), |mut acc, c| {
            acc += c;
            acc
        })
    }
}

/// One user's activity on one calendar day, as read from the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Calendar day the activity belongs to.
    pub date: NaiveDate,
    /// Opaque user identifier from the export.
    #[serde(default)]
    pub user_id: String,
    /// User email address.
    #[serde(default)]
    pub email: String,
    /// Whether the user was active on this day.
    #[serde(default)]
    pub is_active: bool,
    /// Numeric usage counters.
    #[serde(default)]
    pub counters: UsageCounters,
    #[serde(default)]
    pub most_used_model: String,
    #[serde(default)]
    pub most_used_apply_extension: String,
    #[serde(default)]
    pub most_used_tab_extension: String,
    #[serde(default)]
    pub client_version: String,
}

impl UsageRecord {
    /// Stable identity for grouping rows by user.
    ///
    /// The lowercased, trimmed email; falls back to the user id when the
    /// email column is empty.
    pub fn user_key(&self) -> String {
        let email = self.email.trim();
        if email.is_empty() {
            self.user_id.trim().to_string()
        } else {
            email.to_lowercase()
        }
    }

    /// A copy of this record moved to `date`.
    pub fn redated(&self, date: NaiveDate) -> Self {
        UsageRecord {
            date,
            ..self.clone()
        }
    }
}

// ── AggregationPeriod ─────────────────────────────────────────────────────────

/// Granularity of time-series buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationPeriod {
    #[default]
    Day,
    /// Monday-start calendar week.
    Week,
    Month,
}

impl AggregationPeriod {
    /// First day of the bucket that contains `date`.
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            AggregationPeriod::Day => date,
            AggregationPeriod::Week => time_utils::week_start(date),
            AggregationPeriod::Month => time_utils::month_start(date),
        }
    }

    /// Display label for the bucket starting at `start`.
    pub fn label(self, start: NaiveDate) -> String {
        match self {
            AggregationPeriod::Day | AggregationPeriod::Week => {
                start.format("%Y-%m-%d").to_string()
            }
            AggregationPeriod::Month => start.format("%Y-%m").to_string(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AggregationPeriod::Day => "day",
            AggregationPeriod::Week => "week",
            AggregationPeriod::Month => "month",
        }
    }
}

impl fmt::Display for AggregationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationPeriod {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(AggregationPeriod::Day),
            "week" | "weekly" => Ok(AggregationPeriod::Week),
            "month" | "monthly" => Ok(AggregationPeriod::Month),
            other => Err(InsightsError::InvalidPeriod(other.to_string())),
        }
    }
}

// ── PerformanceSegment ────────────────────────────────────────────────────────

/// Ordinal contributor tier. Declaration order is highest tier first, so the
/// derived `Ord` sorts champions before starters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PerformanceSegment {
    Champion,
    Producer,
    Explorer,
    Starter,
}

impl PerformanceSegment {
    /// Every tier, highest first.
    pub const ALL: [PerformanceSegment; 4] = [
        PerformanceSegment::Champion,
        PerformanceSegment::Producer,
        PerformanceSegment::Explorer,
        PerformanceSegment::Starter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceSegment::Champion => "Champion",
            PerformanceSegment::Producer => "Producer",
            PerformanceSegment::Explorer => "Explorer",
            PerformanceSegment::Starter => "Starter",
        }
    }
}

impl fmt::Display for PerformanceSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
