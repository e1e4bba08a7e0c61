//! Main analysis pipeline.
//!
//! Orchestrates filtering, period aggregation, metric derivation and
//! segmentation, returning an [`AnalysisReport`] ready for output.

use chrono::{NaiveDate, Utc};
use insights_core::calculations::MetricsConfig;
use insights_core::error::Result;
use insights_core::models::{AggregationPeriod, UsageRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::UsageAggregator;
use crate::filters::{self, RecordFilter};
use crate::metrics::{self, LeaderboardSort, MetricsSummary, ModelUsage, PeriodMetrics, UserMetrics};
use crate::segmentation::{self, SegmentBreakdown};

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything the pipeline needs besides the records themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub filter: RecordFilter,
    pub period: AggregationPeriod,
    pub config: MetricsConfig,
    pub sort: LeaderboardSort,
    /// Cut the leaderboard to this many rows.
    pub limit: Option<usize>,
}

/// Metadata produced alongside the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    /// Records handed to the pipeline.
    pub input_records: usize,
    /// Records left after filtering.
    pub filtered_records: usize,
    pub period: AggregationPeriod,
    /// First and last day present after filtering.
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// Every user identity in the input, before filtering.
    pub available_users: Vec<String>,
}

/// The complete output of [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    pub summary: MetricsSummary,
    /// One point per bucket, oldest first.
    pub periods: Vec<PeriodMetrics>,
    pub leaderboard: Vec<UserMetrics>,
    /// Computed over every filtered user, not just the leaderboard cut.
    pub segments: SegmentBreakdown,
    pub model_usage: Vec<ModelUsage>,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full analysis pipeline.
///
/// 1. Validate the metric constants and the filter.
/// 2. Filter the records.
/// 3. Aggregate them into buckets of `request.period`.
/// 4. Derive the summary, time series, leaderboard, segments and model usage.
pub fn analyze(records: &[UsageRecord], request: &AnalysisRequest) -> Result<AnalysisReport> {
    request.config.validate()?;
    request.filter.validate()?;

    // ── Step 1: Filter ────────────────────────────────────────────────────────
    let filtered = request.filter.apply(records);
    debug!(
        "Filter kept {} of {} records",
        filtered.len(),
        records.len()
    );

    // ── Step 2: Aggregate ─────────────────────────────────────────────────────
    let buckets = UsageAggregator::aggregate(&filtered, request.period);

    // ── Step 3: Metrics ───────────────────────────────────────────────────────
    let summary = metrics::summarize(&filtered, &request.config);
    debug_assert_eq!(UsageAggregator::calculate_totals(&buckets), summary.totals);
    let periods = metrics::period_metrics(&buckets, &request.config);
    let users = metrics::user_metrics(&filtered, &request.config);
    let segments = segmentation::segment_users(&users);
    let leaderboard = metrics::rank(users, request.sort, request.limit);
    let model_usage = metrics::model_usage(&filtered);

    // ── Step 4: Build result ──────────────────────────────────────────────────
    let span = filters::date_span(&filtered);
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        input_records: records.len(),
        filtered_records: filtered.len(),
        period: request.period,
        first_date: span.map(|(first, _)| first),
        last_date: span.map(|(_, last)| last),
        available_users: filters::available_users(records),
    };

    info!(
        "Analyzed {} records: {} users, {} {} buckets",
        filtered.len(),
        summary.active_users,
        periods.len(),
        request.period
    );

    Ok(AnalysisReport {
        metadata,
        summary,
        periods,
        leaderboard,
        segments,
        model_usage,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{DateRange, UserFilter};
    use crate::reader::{parse_csv_str, ParseOptions};
    use insights_core::models::PerformanceSegment;

    const EXPORT: &str = "\
Date,User ID,Email,Is Active,Chat Suggested Lines Added,Chat Accepted Lines Added,Chat Total Applies,Tabs Accepted,Ask Requests,Agent Requests,Most Used Model
2025-06-02,u1,alice@x.io,true,30000,14400,80,10,2,5,claude-4-sonnet
2025-06-03,u1,alice@x.io,true,30000,14400,40,10,1,4,claude-4-sonnet
2025-06-03,u2,bob@x.io,true,1000,300,35,4,3,0,gpt-4.1
2025-06-10,u2,bob@x.io,true,500,100,2,1,0,1,gpt-4.1
2025-06-11,u3,carol@x.io,false,0,0,0,0,0,0,
2025-07-01,u3,carol@x.io,true,20,1,0,0,1,0,o3
";

    fn records() -> Vec<UsageRecord> {
        parse_csv_str(EXPORT, &ParseOptions::default())
            .unwrap()
            .records
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_analyze_unfiltered_weekly() {
        let request = AnalysisRequest {
            period: AggregationPeriod::Week,
            ..Default::default()
        };
        let report = analyze(&records(), &request).unwrap();

        assert_eq!(report.metadata.input_records, 5);
        assert_eq!(report.metadata.filtered_records, 5);
        assert_eq!(report.metadata.first_date, Some(date(2025, 6, 2)));
        assert_eq!(report.metadata.last_date, Some(date(2025, 7, 1)));

        let labels: Vec<&str> = report.periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2025-06-02", "2025-06-09", "2025-06-30"]);

        assert_eq!(report.summary.active_users, 3);
        assert_eq!(report.summary.accepted_lines, 29_201);
        assert_eq!(report.leaderboard.len(), 3);
        assert_eq!(report.leaderboard[0].email, "alice@x.io");
        assert_eq!(report.segments.count(PerformanceSegment::Champion), 1);
        assert_eq!(report.segments.count(PerformanceSegment::Producer), 1);
        assert_eq!(report.segments.count(PerformanceSegment::Starter), 1);
        assert_eq!(report.model_usage[0].model, "claude-4-sonnet");
        assert_eq!(report.periods[0].top_contributor.as_deref(), Some("alice@x.io"));
    }

    #[test]
    fn test_analyze_bucket_totals_match_summary_totals() {
        let records = records();
        let request = AnalysisRequest {
            period: AggregationPeriod::Month,
            ..Default::default()
        };
        let report = analyze(&records, &request).unwrap();
        let buckets = UsageAggregator::aggregate(&records, AggregationPeriod::Month);
        assert_eq!(UsageAggregator::calculate_totals(&buckets), report.summary.totals);
    }

    #[test]
    fn test_analyze_period_sums_match_summary() {
        for period in [
            AggregationPeriod::Day,
            AggregationPeriod::Week,
            AggregationPeriod::Month,
        ] {
            let request = AnalysisRequest {
                period,
                ..Default::default()
            };
            let report = analyze(&records(), &request).unwrap();
            let accepted: u64 = report.periods.iter().map(|p| p.accepted_lines).sum();
            let records_in_buckets: usize = report.periods.iter().map(|p| p.record_count).sum();
            assert_eq!(accepted, report.summary.accepted_lines, "{period}");
            assert_eq!(records_in_buckets, report.summary.record_count, "{period}");
        }
    }

    #[test]
    fn test_analyze_with_filters() {
        let request = AnalysisRequest {
            filter: RecordFilter::new(
                DateRange::new(Some(date(2025, 6, 3)), Some(date(2025, 6, 30))).unwrap(),
                UserFilter::new(["bob@x.io"]),
            ),
            period: AggregationPeriod::Month,
            ..Default::default()
        };
        let report = analyze(&records(), &request).unwrap();

        assert_eq!(report.metadata.filtered_records, 2);
        assert_eq!(report.summary.active_users, 1);
        assert_eq!(report.summary.accepted_lines, 400);
        assert_eq!(report.periods.len(), 1);
        assert_eq!(report.periods[0].label, "2025-06");
        assert_eq!(report.leaderboard[0].email, "bob@x.io");
    }

    #[test]
    fn test_analyze_limit_does_not_shrink_segments() {
        let request = AnalysisRequest {
            limit: Some(1),
            ..Default::default()
        };
        let report = analyze(&records(), &request).unwrap();
        assert_eq!(report.leaderboard.len(), 1);
        assert_eq!(report.segments.total_users, 3);
    }

    #[test]
    fn test_analyze_empty_result_is_ok() {
        let request = AnalysisRequest {
            filter: RecordFilter::new(DateRange::default(), UserFilter::new(["nobody@x.io"])),
            ..Default::default()
        };
        let report = analyze(&records(), &request).unwrap();
        assert_eq!(report.metadata.filtered_records, 0);
        assert!(report.metadata.first_date.is_none());
        assert_eq!(
            report.metadata.available_users,
            vec!["alice@x.io", "bob@x.io", "carol@x.io"]
        );
        assert!(report.periods.is_empty());
        assert!(report.leaderboard.is_empty());
        assert_eq!(report.summary.roi, 0.0);
    }

    #[test]
    fn test_analyze_rejects_bad_config() {
        let request = AnalysisRequest {
            config: MetricsConfig {
                lines_per_minute: -1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(analyze(&records(), &request).is_err());
    }

    #[test]
    fn test_analyze_rejects_inverted_range() {
        let request = AnalysisRequest {
            filter: RecordFilter {
                date_range: DateRange {
                    start: Some(date(2025, 7, 1)),
                    end: Some(date(2025, 6, 1)),
                },
                users: UserFilter::default(),
            },
            ..Default::default()
        };
        assert!(analyze(&records(), &request).is_err());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = analyze(&records(), &AnalysisRequest::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["metadata"]["period"], "day");
        assert_eq!(json["leaderboard"][0]["segment"], "Champion");
        assert!(json["summary"]["requests"]["agent"].is_u64());
    }
}
