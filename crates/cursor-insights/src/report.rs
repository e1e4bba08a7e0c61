//! Plain-text and JSON rendering of an [`AnalysisReport`].
//!
//! The text report is a sequence of titled tables: headline summary, one row
//! per period followed by a TOTAL row, the leaderboard, tier counts and model
//! usage.

use insights_core::formatting::{
    format_count, format_currency, format_hours, format_percent, truncate_to_width,
};
use insights_core::models::PerformanceSegment;
use insights_data::analysis::AnalysisReport;
use insights_data::metrics::{MetricsSummary, ModelUsage, PeriodMetrics, UserMetrics};
use insights_data::segmentation::SegmentCount;
use tabled::{Table, Tabled};

/// Widest user or model name shown in the leaderboard.
const NAME_WIDTH: usize = 32;

// ── Rows ──────────────────────────────────────────────────────────────────────

#[derive(Tabled, Debug)]
pub struct SummaryRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl SummaryRow {
    fn new(metric: &str, value: String) -> Self {
        Self {
            metric: metric.to_string(),
            value,
        }
    }
}

/// One bucket of the time series.
#[derive(Tabled, Debug)]
pub struct PeriodRow {
    #[tabled(rename = "Period")]
    pub period: String,
    #[tabled(rename = "Users")]
    pub users: String,
    #[tabled(rename = "Suggested")]
    pub suggested: String,
    #[tabled(rename = "Accepted")]
    pub accepted: String,
    #[tabled(rename = "Rate")]
    pub rate: String,
    #[tabled(rename = "Tabs")]
    pub tabs: String,
    #[tabled(rename = "Requests")]
    pub requests: String,
    #[tabled(rename = "Saved")]
    pub saved: String,
    #[tabled(rename = "Top contributor")]
    pub top_contributor: String,
}

impl PeriodRow {
    pub fn from_period(p: &PeriodMetrics) -> Self {
        Self {
            period: p.label.clone(),
            users: p.users_label.clone(),
            suggested: format_count(p.suggested_lines),
            accepted: format_count(p.accepted_lines),
            rate: format_percent(p.acceptance_rate),
            tabs: format_count(p.tabs_accepted),
            requests: format_count(p.requests.total()),
            saved: format_currency(p.money_saved),
            top_contributor: p
                .top_contributor
                .as_deref()
                .map_or_else(|| "-".to_string(), |u| truncate_to_width(u, NAME_WIDTH)),
        }
    }

    pub fn total(s: &MetricsSummary) -> Self {
        let users = match s.active_users {
            1 => "1 active user".to_string(),
            n => format!("{} active users", format_count(n as u64)),
        };
        Self {
            period: "TOTAL".to_string(),
            users,
            suggested: format_count(s.suggested_lines),
            accepted: format_count(s.accepted_lines),
            rate: format_percent(s.acceptance_rate),
            tabs: format_count(s.tabs_accepted),
            requests: format_count(s.requests.total()),
            saved: format_currency(s.money_saved),
            top_contributor: String::new(),
        }
    }
}

#[derive(Tabled, Debug)]
pub struct LeaderboardRow {
    #[tabled(rename = "#")]
    pub rank: String,
    #[tabled(rename = "User")]
    pub user: String,
    #[tabled(rename = "Days")]
    pub days: String,
    #[tabled(rename = "Accepted")]
    pub accepted: String,
    #[tabled(rename = "Rate")]
    pub rate: String,
    #[tabled(rename = "Applies")]
    pub applies: String,
    #[tabled(rename = "Requests")]
    pub requests: String,
    #[tabled(rename = "ROI")]
    pub roi: String,
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[tabled(rename = "Model")]
    pub model: String,
}

impl LeaderboardRow {
    pub fn from_user(rank: usize, u: &UserMetrics) -> Self {
        let name = if u.email.is_empty() { &u.user } else { &u.email };
        Self {
            rank: rank.to_string(),
            user: truncate_to_width(name, NAME_WIDTH),
            days: format_count(u.active_days as u64),
            accepted: format_count(u.accepted_lines()),
            rate: format_percent(u.acceptance_rate),
            applies: format_count(u.total_applies()),
            requests: format_count(u.total_requests()),
            roi: format_percent(u.roi),
            tier: u.segment.to_string(),
            model: u
                .top_model
                .as_deref()
                .map_or_else(|| "-".to_string(), |m| truncate_to_width(m, NAME_WIDTH)),
        }
    }
}

#[derive(Tabled, Debug)]
pub struct SegmentRow {
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[tabled(rename = "Users")]
    pub users: String,
    #[tabled(rename = "Share")]
    pub share: String,
}

impl SegmentRow {
    pub fn from_segment(s: &SegmentCount) -> Self {
        Self {
            tier: s.segment.to_string(),
            users: format_count(s.users as u64),
            share: format_percent(s.share),
        }
    }
}

#[derive(Tabled, Debug)]
pub struct ModelRow {
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "User-days")]
    pub user_days: String,
}

impl ModelRow {
    pub fn from_model_usage(m: &ModelUsage) -> Self {
        Self {
            model: m.model.clone(),
            user_days: format_count(m.user_days as u64),
        }
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn section(title: &str, table: Table) -> String {
    format!("{title}\n{}\n{table}\n", "=".repeat(title.len()))
}

/// Render the full text report.
pub fn render_text(report: &AnalysisReport) -> String {
    let meta = &report.metadata;
    if meta.filtered_records == 0 {
        let mut notice = format!(
            "No usage records matched ({} loaded, period: {}).\n",
            meta.input_records, meta.period
        );
        if !meta.available_users.is_empty() {
            notice.push_str(&format!(
                "Available users: {}\n",
                meta.available_users.join(", ")
            ));
        }
        return notice;
    }

    let mut out = vec![
        section("Summary", summary_table(report)),
        section(&format!("Usage by {}", meta.period), periods_table(report)),
        section(
            "Leaderboard",
            Table::new(
                report
                    .leaderboard
                    .iter()
                    .enumerate()
                    .map(|(i, u)| LeaderboardRow::from_user(i + 1, u)),
            ),
        ),
        section(
            "Contributor tiers",
            Table::new(report.segments.segments.iter().map(SegmentRow::from_segment)),
        ),
    ];
    if !report.model_usage.is_empty() {
        out.push(section(
            "Most used models",
            Table::new(report.model_usage.iter().map(ModelRow::from_model_usage)),
        ));
    }
    out.join("\n")
}

fn summary_table(report: &AnalysisReport) -> Table {
    let meta = &report.metadata;
    let s = &report.summary;
    let span = match (meta.first_date, meta.last_date) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "-".to_string(),
    };

    let rows = vec![
        SummaryRow::new("Date range", span),
        SummaryRow::new("Records", format_count(s.record_count as u64)),
        SummaryRow::new("Active users", format_count(s.active_users as u64)),
        SummaryRow::new("Active days", format_count(s.active_days as u64)),
        SummaryRow::new("Suggested lines", format_count(s.suggested_lines)),
        SummaryRow::new("Accepted lines", format_count(s.accepted_lines)),
        SummaryRow::new("Acceptance rate", format_percent(s.acceptance_rate)),
        SummaryRow::new("Tabs accepted", format_count(s.tabs_accepted)),
        SummaryRow::new("Requests", format_count(s.requests.total())),
        SummaryRow::new("Hours saved", format_hours(s.hours_saved)),
        SummaryRow::new("Money saved", format_currency(s.money_saved)),
        SummaryRow::new("Annual cost", format_currency(s.annual_cost)),
        SummaryRow::new("ROI", format_percent(s.roi)),
        SummaryRow::new(
            "Champions",
            format_count(report.segments.count(PerformanceSegment::Champion) as u64),
        ),
    ];
    Table::new(rows)
}

fn periods_table(report: &AnalysisReport) -> Table {
    let mut rows: Vec<PeriodRow> = report.periods.iter().map(PeriodRow::from_period).collect();
    rows.push(PeriodRow::total(&report.summary));
    Table::new(rows)
}

/// Render the report as pretty-printed JSON.
pub fn render_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
