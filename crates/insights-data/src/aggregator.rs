//! Usage aggregation over day, week and month buckets.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use insights_core::models::{AggregationPeriod, UsageCounters, UsageRecord};
use serde::{Deserialize, Serialize};

// ── AggregatedPeriod ──────────────────────────────────────────────────────────

/// All usage that falls within one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPeriod {
    pub period: AggregationPeriod,
    /// First day of the bucket.
    pub start: NaiveDate,
    /// Distinct users seen in the bucket.
    pub active_users: usize,
    /// Number of original daily records in the bucket.
    pub record_count: usize,
    /// Counter totals across every record in the bucket.
    pub rollup: UsageCounters,
    /// The original records, re-dated to `start`, oldest first.
    pub user_rows: Vec<UsageRecord>,
}

impl AggregatedPeriod {
    fn new(period: AggregationPeriod, start: NaiveDate) -> Self {
        Self {
            period,
            start,
            active_users: 0,
            record_count: 0,
            rollup: UsageCounters::default(),
            user_rows: Vec::new(),
        }
    }

    /// Bucket label, e.g. `"2025-06-02"` (day / week) or `"2025-06"` (month).
    pub fn label(&self) -> String {
        self.period.label(self.start)
    }

    /// Human-readable marker for the rollup row, e.g. `"3 active users"`.
    pub fn users_label(&self) -> String {
        match self.active_users {
            1 => "1 active user".to_string(),
            n => format!("{n} active users"),
        }
    }

    /// One row per user: counters summed, categorical fields taken from
    /// the user's latest original row in the bucket.
    ///
    /// Sorted by user identity key.
    pub fn per_user(&self) -> Vec<UsageRecord> {
        // `user_rows` are ordered by original date, so a later row is newer.
        let mut merged: BTreeMap<String, UsageRecord> = BTreeMap::new();
        for row in &self.user_rows {
            merged
                .entry(row.user_key())
                .and_modify(|acc| {
                    let counters = acc.counters + row.counters;
                    *acc = UsageRecord {
                        counters,
                        ..row.clone()
                    };
                })
                .or_insert_with(|| row.clone());
        }
        merged.into_values().collect()
    }

    fn add_record(&mut self, record: &UsageRecord) {
        self.rollup += &record.counters;
        self.record_count += 1;
        self.user_rows.push(record.redated(self.start));
    }
}

// ── UsageAggregator ───────────────────────────────────────────────────────────

/// Stateless helper that groups usage records by time period.
pub struct UsageAggregator;

impl UsageAggregator {
    /// Group `records` into buckets of `period`.
    ///
    /// Returns periods sorted by bucket start (ascending). Records inside a
    /// bucket are ordered by their original date; same-day records keep
    /// their input order.
    pub fn aggregate(records: &[UsageRecord], period: AggregationPeriod) -> Vec<AggregatedPeriod> {
        let mut ordered: Vec<&UsageRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.date);

        // BTreeMap keeps buckets sorted by start date.
        let mut map: BTreeMap<NaiveDate, AggregatedPeriod> = BTreeMap::new();
        let mut users: HashMap<NaiveDate, BTreeSet<String>> = HashMap::new();

        for record in ordered {
            let start = period.bucket_start(record.date);
            map.entry(start)
                .or_insert_with(|| AggregatedPeriod::new(period, start))
                .add_record(record);
            users.entry(start).or_default().insert(record.user_key());
        }

        map.into_values()
            .map(|mut p| {
                p.active_users = users.get(&p.start).map_or(0, BTreeSet::len);
                p
            })
            .collect()
    }

    /// Sum up the rollups from all periods.
    pub fn calculate_totals(periods: &[AggregatedPeriod]) -> UsageCounters {
        periods.iter().map(|p| &p.rollup).sum()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
