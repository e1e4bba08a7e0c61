//! Summary, per-user and per-period metric derivations.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use insights_core::calculations::{MetricsConfig, SavingsCalculator};
use insights_core::error::InsightsError;
use insights_core::models::{PerformanceSegment, UsageCounters, UsageRecord};
use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatedPeriod;
use crate::segmentation;

// ── MetricsSummary ────────────────────────────────────────────────────────────

/// Request totals split by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBreakdown {
    pub ask: u64,
    pub edit: u64,
    pub agent: u64,
    pub cmdk: u64,
    pub bugbot: u64,
    pub subscription_included: u64,
    pub api_key: u64,
    pub usage_based: u64,
}

impl From<&UsageCounters> for RequestBreakdown {
    fn from(c: &UsageCounters) -> Self {
        Self {
            ask: c.ask_requests,
            edit: c.edit_requests,
            agent: c.agent_requests,
            cmdk: c.cmdk_usages,
            bugbot: c.bugbot_usages,
            subscription_included: c.subscription_included_reqs,
            api_key: c.api_key_reqs,
            usage_based: c.usage_based_reqs,
        }
    }
}

impl RequestBreakdown {
    /// Interactive requests (ask + edit + agent + cmd+k + bugbot).
    pub fn total(&self) -> u64 {
        [self.ask, self.edit, self.agent, self.cmdk, self.bugbot]
            .into_iter()
            .fold(0, u64::saturating_add)
    }
}

/// Headline numbers for a filtered dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub record_count: usize,
    pub active_users: usize,
    /// Distinct calendar days with any activity.
    pub active_days: usize,
    pub accepted_lines: u64,
    pub suggested_lines: u64,
    pub acceptance_rate: f64,
    pub hours_saved: f64,
    pub money_saved: f64,
    /// Annualized subscription cost for every active user.
    pub annual_cost: f64,
    pub roi: f64,
    pub requests: RequestBreakdown,
    pub tabs_shown: u64,
    pub tabs_accepted: u64,
    pub total_applies: u64,
    pub total_accepts: u64,
    pub total_rejects: u64,
    pub totals: UsageCounters,
}

/// Derive the summary for `records` (already filtered).
pub fn summarize(records: &[UsageRecord], config: &MetricsConfig) -> MetricsSummary {
    let totals: UsageCounters = records.iter().map(|r| &r.counters).sum();
    let active_users = records
        .iter()
        .map(UsageRecord::user_key)
        .collect::<BTreeSet<_>>()
        .len();
    let active_days = records.iter().map(|r| r.date).collect::<BTreeSet<_>>().len();
    let savings = SavingsCalculator::estimate(&totals, active_users, config);

    MetricsSummary {
        record_count: records.len(),
        active_users,
        active_days,
        accepted_lines: savings.accepted_lines,
        suggested_lines: savings.suggested_lines,
        acceptance_rate: savings.acceptance_rate,
        hours_saved: savings.hours_saved,
        money_saved: savings.money_saved,
        annual_cost: savings.annual_cost,
        roi: savings.roi,
        requests: RequestBreakdown::from(&totals),
        tabs_shown: totals.chat_tabs_shown,
        tabs_accepted: totals.tabs_accepted,
        total_applies: totals.chat_total_applies,
        total_accepts: totals.chat_total_accepts,
        total_rejects: totals.chat_total_rejects,
        totals,
    }
}

// ── UserMetrics ───────────────────────────────────────────────────────────────

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    /// Identity key the row was grouped by.
    pub user: String,
    pub email: String,
    pub user_id: String,
    pub active_days: usize,
    pub counters: UsageCounters,
    pub acceptance_rate: f64,
    pub hours_saved: f64,
    pub money_saved: f64,
    pub roi: f64,
    /// Model reported most often across the user's days.
    pub top_model: Option<String>,
    /// Client version on the user's most recent day.
    pub latest_client_version: Option<String>,
    pub segment: PerformanceSegment,
}

impl UserMetrics {
    pub fn accepted_lines(&self) -> u64 {
        self.counters.chat_accepted_lines_added
    }

    pub fn total_applies(&self) -> u64 {
        self.counters.chat_total_applies
    }

    pub fn total_requests(&self) -> u64 {
        self.counters.total_requests()
    }
}

#[derive(Default)]
struct UserAccumulator<'a> {
    counters: UsageCounters,
    days: BTreeSet<NaiveDate>,
    models: HashMap<&'a str, usize>,
    latest: Option<&'a UsageRecord>,
}

/// Per-user metrics for every user in `records`, sorted by identity key.
pub fn user_metrics(records: &[UsageRecord], config: &MetricsConfig) -> Vec<UserMetrics> {
    let mut by_user: BTreeMap<String, UserAccumulator<'_>> = BTreeMap::new();

    for record in records {
        let acc = by_user.entry(record.user_key()).or_default();
        acc.counters += &record.counters;
        acc.days.insert(record.date);
        let model = record.most_used_model.trim();
        if !model.is_empty() {
            *acc.models.entry(model).or_default() += 1;
        }
        if acc.latest.map_or(true, |l| record.date >= l.date) {
            acc.latest = Some(record);
        }
    }

    by_user
        .into_iter()
        .filter_map(|(user, acc)| {
            let latest = acc.latest?;
            let savings = SavingsCalculator::estimate(&acc.counters, 1, config);
            let segment = segmentation::classify(
                savings.acceptance_rate,
                acc.counters.chat_total_applies,
                savings.roi,
            );
            let client = latest.client_version.trim();
            Some(UserMetrics {
                user,
                email: latest.email.trim().to_string(),
                user_id: latest.user_id.trim().to_string(),
                active_days: acc.days.len(),
                counters: acc.counters,
                acceptance_rate: savings.acceptance_rate,
                hours_saved: savings.hours_saved,
                money_saved: savings.money_saved,
                roi: savings.roi,
                top_model: most_frequent(&acc.models),
                latest_client_version: (!client.is_empty()).then(|| client.to_string()),
                segment,
            })
        })
        .collect()
}

/// Highest count wins; ties go to the alphabetically first name.
fn most_frequent(counts: &HashMap<&str, usize>) -> Option<String> {
    counts
        .iter()
        .max_by(|(a_name, a_n), (b_name, b_n)| a_n.cmp(b_n).then_with(|| b_name.cmp(a_name)))
        .map(|(name, _)| (*name).to_string())
}

// ── Leaderboard ───────────────────────────────────────────────────────────────

/// Leaderboard ordering key; every key sorts descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderboardSort {
    #[default]
    AcceptedLines,
    AcceptanceRate,
    Roi,
    Applies,
    Requests,
}

impl LeaderboardSort {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaderboardSort::AcceptedLines => "accepted-lines",
            LeaderboardSort::AcceptanceRate => "acceptance-rate",
            LeaderboardSort::Roi => "roi",
            LeaderboardSort::Applies => "applies",
            LeaderboardSort::Requests => "requests",
        }
    }

    fn compare(self, a: &UserMetrics, b: &UserMetrics) -> Ordering {
        let primary = match self {
            LeaderboardSort::AcceptedLines => b.accepted_lines().cmp(&a.accepted_lines()),
            LeaderboardSort::AcceptanceRate => b.acceptance_rate.total_cmp(&a.acceptance_rate),
            LeaderboardSort::Roi => b.roi.total_cmp(&a.roi),
            LeaderboardSort::Applies => b.total_applies().cmp(&a.total_applies()),
            LeaderboardSort::Requests => b.total_requests().cmp(&a.total_requests()),
        };
        primary.then_with(|| a.email.cmp(&b.email)).then_with(|| a.user.cmp(&b.user))
    }
}

impl fmt::Display for LeaderboardSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaderboardSort {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "accepted-lines" => Ok(LeaderboardSort::AcceptedLines),
            "acceptance-rate" => Ok(LeaderboardSort::AcceptanceRate),
            "roi" => Ok(LeaderboardSort::Roi),
            "applies" => Ok(LeaderboardSort::Applies),
            "requests" => Ok(LeaderboardSort::Requests),
            other => Err(InsightsError::Config(format!("unknown sort key: {other}"))),
        }
    }
}

/// Per-user rows ordered by `sort`, cut to `limit` when given.
pub fn leaderboard(
    records: &[UsageRecord],
    config: &MetricsConfig,
    sort: LeaderboardSort,
    limit: Option<usize>,
) -> Vec<UserMetrics> {
    rank(user_metrics(records, config), sort, limit)
}

/// Order already-computed rows.
pub fn rank(mut rows: Vec<UserMetrics>, sort: LeaderboardSort, limit: Option<usize>) -> Vec<UserMetrics> {
    rows.sort_by(|a, b| sort.compare(a, b));
    if let Some(n) = limit {
        rows.truncate(n);
    }
    rows
}

// ── Model usage ───────────────────────────────────────────────────────────────

/// How many user-days reported a model as their most used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub user_days: usize,
}

/// Model frequencies, most common first; ties sorted by name.
pub fn model_usage(records: &[UsageRecord]) -> Vec<ModelUsage> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        let model = record.most_used_model.trim();
        if !model.is_empty() {
            *counts.entry(model).or_default() += 1;
        }
    }

    let mut usage: Vec<ModelUsage> = counts
        .into_iter()
        .map(|(model, user_days)| ModelUsage {
            model: model.to_string(),
            user_days,
        })
        .collect();
    usage.sort_by(|a, b| b.user_days.cmp(&a.user_days).then_with(|| a.model.cmp(&b.model)));
    usage
}

// ── PeriodMetrics ─────────────────────────────────────────────────────────────

/// Time-series point derived from one aggregated bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub label: String,
    pub start: NaiveDate,
    pub active_users: usize,
    /// e.g. `"3 active users"`.
    pub users_label: String,
    pub record_count: usize,
    pub accepted_lines: u64,
    pub suggested_lines: u64,
    pub acceptance_rate: f64,
    pub hours_saved: f64,
    pub money_saved: f64,
    pub tabs_accepted: u64,
    pub requests: RequestBreakdown,
    /// User with the most accepted lines in the bucket; ties go to the
    /// alphabetically first identity.
    pub top_contributor: Option<String>,
}

impl PeriodMetrics {
    pub fn from_period(period: &AggregatedPeriod, config: &MetricsConfig) -> Self {
        let savings = SavingsCalculator::estimate(&period.rollup, period.active_users, config);
        Self {
            label: period.label(),
            start: period.start,
            active_users: period.active_users,
            users_label: period.users_label(),
            record_count: period.record_count,
            accepted_lines: savings.accepted_lines,
            suggested_lines: savings.suggested_lines,
            acceptance_rate: savings.acceptance_rate,
            hours_saved: savings.hours_saved,
            money_saved: savings.money_saved,
            tabs_accepted: period.rollup.tabs_accepted,
            requests: RequestBreakdown::from(&period.rollup),
            top_contributor: top_contributor(period),
        }
    }
}

fn top_contributor(period: &AggregatedPeriod) -> Option<String> {
    period
        .per_user()
        .into_iter()
        .filter(|r| r.counters.chat_accepted_lines_added > 0)
        .max_by(|a, b| {
            a.counters
                .chat_accepted_lines_added
                .cmp(&b.counters.chat_accepted_lines_added)
                .then_with(|| b.user_key().cmp(&a.user_key()))
        })
        .map(|r| {
            let email = r.email.trim();
            if email.is_empty() {
                r.user_key()
            } else {
                email.to_string()
            }
        })
}

pub fn period_metrics(periods: &[AggregatedPeriod], config: &MetricsConfig) -> Vec<PeriodMetrics> {
    periods
        .iter()
        .map(|p| PeriodMetrics::from_period(p, config))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
