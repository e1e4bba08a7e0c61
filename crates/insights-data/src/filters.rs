//! Date-range and user predicates applied before aggregation.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use insights_core::error::{InsightsError, Result};
use insights_core::models::UsageRecord;
use serde::{Deserialize, Serialize};

// ── DateRange ─────────────────────────────────────────────────────────────────

/// Inclusive date window; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(InsightsError::InvalidFilter(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

// ── UserFilter ────────────────────────────────────────────────────────────────

/// Set of user identity keys (see [`UsageRecord::user_key`]).
///
/// An empty set places no restriction on users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    users: BTreeSet<String>,
}

impl UserFilter {
    /// Build from emails or user ids as typed by a person; case and
    /// surrounding whitespace are ignored, blanks are dropped.
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let users = users
            .into_iter()
            .map(|u| u.as_ref().trim().to_lowercase())
            .filter(|u| !u.is_empty())
            .collect();
        Self { users }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn contains(&self, record: &UsageRecord) -> bool {
        if self.is_empty() {
            return true;
        }
        self.users.contains(&record.user_key())
            || self.users.contains(&record.user_id.trim().to_lowercase())
    }
}

// ── RecordFilter ──────────────────────────────────────────────────────────────

/// Combined predicate over dates and users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub date_range: DateRange,
    pub users: UserFilter,
}

impl RecordFilter {
    pub fn new(date_range: DateRange, users: UserFilter) -> Self {
        Self { date_range, users }
    }

    pub fn validate(&self) -> Result<()> {
        self.date_range.validate()
    }

    pub fn matches(&self, record: &UsageRecord) -> bool {
        self.date_range.contains(record.date) && self.users.contains(record)
    }

    /// Records that pass the filter, in input order.
    pub fn apply(&self, records: &[UsageRecord]) -> Vec<UsageRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

// ── Filter vocabularies ───────────────────────────────────────────────────────

/// Distinct user identity keys present in `records`, sorted.
pub fn available_users(records: &[UsageRecord]) -> Vec<String> {
    records
        .iter()
        .map(UsageRecord::user_key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Earliest and latest dates in `records`, or `None` when empty.
pub fn date_span(records: &[UsageRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let first = records.iter().map(|r| r.date).min()?;
    let last = records.iter().map(|r| r.date).max()?;
    Some((first, last))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use insights_core::models::UsageCounters;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(email: &str, user_id: &str, day: u32) -> UsageRecord {
        UsageRecord {
            date: date(2025, 6, day),
            user_id: user_id.to_string(),
            email: email.to_string(),
            is_active: true,
            counters: UsageCounters {
                chat_accepted_lines_added: u64::from(day),
                ..Default::default()
            },
            most_used_model: String::new(),
            most_used_apply_extension: String::new(),
            most_used_tab_extension: String::new(),
            client_version: String::new(),
        }
    }

    fn dataset() -> Vec<UsageRecord> {
        vec![
            record("alice@x.io", "u1", 1),
            record("bob@x.io", "u2", 2),
            record("alice@x.io", "u1", 5),
            record("carol@x.io", "u3", 9),
            record("bob@x.io", "u2", 12),
        ]
    }

    #[test]
    fn test_date_range_inclusive_bounds() {
        let range = DateRange::new(Some(date(2025, 6, 2)), Some(date(2025, 6, 9))).unwrap();
        assert!(!range.contains(date(2025, 6, 1)));
        assert!(range.contains(date(2025, 6, 2)));
        assert!(range.contains(date(2025, 6, 9)));
        assert!(!range.contains(date(2025, 6, 10)));
    }

    #[test]
    fn test_date_range_open_ends() {
        let since = DateRange::new(Some(date(2025, 6, 5)), None).unwrap();
        assert!(since.contains(date(2030, 1, 1)));
        assert!(!since.contains(date(2025, 6, 4)));
        assert!(DateRange::default().contains(date(1970, 1, 1)));
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let err = DateRange::new(Some(date(2025, 6, 9)), Some(date(2025, 6, 1))).unwrap_err();
        assert!(err.to_string().contains("after end date"));
    }

    #[test]
    fn test_user_filter_case_insensitive() {
        let filter = UserFilter::new(["  ALICE@x.io "]);
        assert!(filter.contains(&record("alice@x.io", "u1", 1)));
        assert!(!filter.contains(&record("bob@x.io", "u2", 1)));
    }

    #[test]
    fn test_user_filter_matches_user_id() {
        let filter = UserFilter::new(["u3"]);
        assert!(filter.contains(&record("carol@x.io", "u3", 1)));
    }

    #[test]
    fn test_empty_user_filter_matches_everyone() {
        let filter = UserFilter::new(Vec::<String>::new());
        assert!(filter.is_empty());
        assert!(filter.contains(&record("anyone@x.io", "u9", 1)));
        // Blanks do not count as a selection.
        assert!(UserFilter::new(["", "  "]).is_empty());
    }

    #[test]
    fn test_apply_preserves_order_and_is_subset() {
        let data = dataset();
        let filter = RecordFilter::new(
            DateRange::new(Some(date(2025, 6, 2)), None).unwrap(),
            UserFilter::new(["bob@x.io", "alice@x.io"]),
        );
        let out = filter.apply(&data);
        let days: Vec<u32> = out
            .iter()
            .map(|r| r.counters.chat_accepted_lines_added as u32)
            .collect();
        assert_eq!(days, vec![2, 5, 12]);
        assert!(out.iter().all(|r| data.contains(r)));
    }

    #[test]
    fn test_date_and_user_filters_commute() {
        let data = dataset();
        let range = DateRange::new(Some(date(2025, 6, 2)), Some(date(2025, 6, 10))).unwrap();
        let users = UserFilter::new(["alice@x.io", "carol@x.io"]);

        let date_only = RecordFilter::new(range, UserFilter::default());
        let user_only = RecordFilter::new(DateRange::default(), users.clone());

        let date_then_user = user_only.apply(&date_only.apply(&data));
        let user_then_date = date_only.apply(&user_only.apply(&data));
        let combined = RecordFilter::new(range, users).apply(&data);

        assert_eq!(date_then_user, user_then_date);
        assert_eq!(date_then_user, combined);
        assert_eq!(combined.len(), 2);
    }

    #[test]
    fn test_default_filter_keeps_everything() {
        let data = dataset();
        assert_eq!(RecordFilter::default().apply(&data), data);
    }

    #[test]
    fn test_available_users_and_span() {
        let data = dataset();
        assert_eq!(
            available_users(&data),
            vec!["alice@x.io", "bob@x.io", "carol@x.io"]
        );
        assert_eq!(date_span(&data), Some((date(2025, 6, 1), date(2025, 6, 12))));
        assert_eq!(date_span(&[]), None);
    }
}
