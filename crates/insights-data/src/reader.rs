//! CSV discovery and loading.
//!
//! Reads Cursor team-usage exports and converts each row into a
//! [`UsageRecord`] for downstream filtering and aggregation.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use insights_core::error::{InsightsError, Result};
use insights_core::models::{UsageCounters, UsageRecord};
use insights_core::time_utils::TimezoneHandler;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Header names the parser refuses to work without.
pub const REQUIRED_COLUMNS: &[&str] = &["Date", "Email"];

// ── Options / outcome ─────────────────────────────────────────────────────────

/// Knobs for turning CSV rows into records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Keep rows whose `Is Active` flag is false.
    pub include_inactive: bool,
    /// Timezone used to map timestamps onto calendar days.
    pub timezone: TimezoneHandler,
}

/// Parsed records plus counts of what was dropped on the way.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub records: Vec<UsageRecord>,
    /// Rows skipped because the user was inactive that day.
    pub skipped_inactive: usize,
    /// Rows skipped because their date could not be parsed.
    pub skipped_invalid: usize,
    /// Rows dropped as repeats of an earlier (user, date) pair.
    pub duplicates: usize,
}

impl ParseOutcome {
    fn absorb(&mut self, other: ParseOutcome) {
        self.records.extend(other.records);
        self.skipped_inactive += other.skipped_inactive;
        self.skipped_invalid += other.skipped_invalid;
        self.duplicates += other.duplicates;
    }
}

// ── Raw row ───────────────────────────────────────────────────────────────────

/// One CSV row exactly as exported; every cell is still text.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "User ID")]
    user_id: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Is Active")]
    is_active: String,
    #[serde(rename = "Chat Suggested Lines Added")]
    chat_suggested_lines_added: String,
    #[serde(rename = "Chat Suggested Lines Deleted")]
    chat_suggested_lines_deleted: String,
    #[serde(rename = "Chat Accepted Lines Added")]
    chat_accepted_lines_added: String,
    #[serde(rename = "Chat Accepted Lines Deleted")]
    chat_accepted_lines_deleted: String,
    #[serde(rename = "Chat Total Applies")]
    chat_total_applies: String,
    #[serde(rename = "Chat Total Accepts")]
    chat_total_accepts: String,
    #[serde(rename = "Chat Total Rejects")]
    chat_total_rejects: String,
    #[serde(rename = "Chat Tabs Shown")]
    chat_tabs_shown: String,
    #[serde(rename = "Tabs Accepted")]
    tabs_accepted: String,
    #[serde(rename = "Edit Requests")]
    edit_requests: String,
    #[serde(rename = "Ask Requests")]
    ask_requests: String,
    #[serde(rename = "Agent Requests")]
    agent_requests: String,
    #[serde(rename = "Cmd+K Usages")]
    cmdk_usages: String,
    #[serde(rename = "Subscription Included Reqs")]
    subscription_included_reqs: String,
    #[serde(rename = "API Key Reqs")]
    api_key_reqs: String,
    #[serde(rename = "Usage Based Reqs")]
    usage_based_reqs: String,
    #[serde(rename = "Bugbot Usages")]
    bugbot_usages: String,
    #[serde(rename = "Most Used Model")]
    most_used_model: String,
    #[serde(rename = "Most Used Apply Extension")]
    most_used_apply_extension: String,
    #[serde(rename = "Most Used Tab Extension")]
    most_used_tab_extension: String,
    #[serde(rename = "Client Version")]
    client_version: String,
}

impl CsvRow {
    fn counters(&self) -> UsageCounters {
        UsageCounters {
            chat_suggested_lines_added: parse_count(&self.chat_suggested_lines_added),
            chat_suggested_lines_deleted: parse_count(&self.chat_suggested_lines_deleted),
            chat_accepted_lines_added: parse_count(&self.chat_accepted_lines_added),
            chat_accepted_lines_deleted: parse_count(&self.chat_accepted_lines_deleted),
            chat_total_applies: parse_count(&self.chat_total_applies),
            chat_total_accepts: parse_count(&self.chat_total_accepts),
            chat_total_rejects: parse_count(&self.chat_total_rejects),
            chat_tabs_shown: parse_count(&self.chat_tabs_shown),
            tabs_accepted: parse_count(&self.tabs_accepted),
            edit_requests: parse_count(&self.edit_requests),
            ask_requests: parse_count(&self.ask_requests),
            agent_requests: parse_count(&self.agent_requests),
            cmdk_usages: parse_count(&self.cmdk_usages),
            subscription_included_reqs: parse_count(&self.subscription_included_reqs),
            api_key_reqs: parse_count(&self.api_key_reqs),
            usage_based_reqs: parse_count(&self.usage_based_reqs),
            bugbot_usages: parse_count(&self.bugbot_usages),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse CSV text held in memory.
pub fn parse_csv_str(text: &str, options: &ParseOptions) -> Result<ParseOutcome> {
    parse_csv_reader(text.as_bytes(), options)
}

/// Parse CSV from any reader.
///
/// The first row is the header. `Date` and `Email` must be present; every
/// other column is optional and defaults to zero / empty.
pub fn parse_csv_reader<R: Read>(reader: R, options: &ParseOptions) -> Result<ParseOutcome> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *required) {
            return Err(InsightsError::MissingColumn((*required).to_string()));
        }
    }

    let mut outcome = ParseOutcome::default();
    let mut rows_read = 0usize;

    for row in rdr.deserialize::<CsvRow>() {
        let row = row?;
        rows_read += 1;

        let Some(date) = options.timezone.parse_date(&row.date) else {
            warn!("Skipping row {}: unparseable date \"{}\"", rows_read, row.date);
            outcome.skipped_invalid += 1;
            continue;
        };

        let is_active = parse_flag(&row.is_active);
        if !is_active && !options.include_inactive {
            outcome.skipped_inactive += 1;
            continue;
        }

        outcome.records.push(UsageRecord {
            date,
            counters: row.counters(),
            user_id: row.user_id,
            email: row.email,
            is_active,
            most_used_model: row.most_used_model,
            most_used_apply_extension: row.most_used_apply_extension,
            most_used_tab_extension: row.most_used_tab_extension,
            client_version: row.client_version,
        });
    }

    debug!(
        "CSV: {} rows read, {} kept, {} inactive, {} invalid",
        rows_read,
        outcome.records.len(),
        outcome.skipped_inactive,
        outcome.skipped_invalid
    );

    Ok(outcome)
}

/// Find all `.csv` files recursively under `data_path`, sorted by path.
pub fn find_csv_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load a single export or every export under a directory.
///
/// Rows repeating an earlier (user, date) pair are dropped, so overlapping
/// exports can be loaded together. The result is sorted by date, then user.
pub fn load_usage_records(path: &Path, options: &ParseOptions) -> Result<ParseOutcome> {
    if !path.exists() {
        return Err(InsightsError::DataPathNotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        let found = find_csv_files(path);
        if found.is_empty() {
            return Err(InsightsError::NoDataFiles(path.to_path_buf()));
        }
        found
    } else {
        vec![path.to_path_buf()]
    };

    let mut combined = ParseOutcome::default();
    for file_path in &files {
        let file = std::fs::File::open(file_path).map_err(|source| InsightsError::FileRead {
            path: file_path.clone(),
            source,
        })?;
        let outcome = parse_csv_reader(std::io::BufReader::new(file), options)?;
        debug!(
            "Loaded {} records from {}",
            outcome.records.len(),
            file_path.display()
        );
        combined.absorb(outcome);
    }

    dedupe(&mut combined);
    combined
        .records
        .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.user_key().cmp(&b.user_key())));

    info!(
        "Loaded {} usage records from {} file(s)",
        combined.records.len(),
        files.len()
    );

    Ok(combined)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Keep the first record for every (user, date) pair.
fn dedupe(outcome: &mut ParseOutcome) {
    let mut seen: HashSet<(String, chrono::NaiveDate)> = HashSet::new();
    let before = outcome.records.len();
    outcome
        .records
        .retain(|r| seen.insert((r.user_key(), r.date)));
    let dropped = before - outcome.records.len();
    if dropped > 0 {
        debug!("Dropped {} duplicate (user, date) rows", dropped);
    }
    outcome.duplicates += dropped;
}

/// Lenient counter parse: blanks and junk become zero, fractions truncate,
/// negatives clamp to zero, `1,234` is accepted.
fn parse_count(raw: &str) -> u64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0;
    }
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    if let Ok(n) = cleaned.parse::<u64>() {
        return n;
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() && f > 0.0 => f.trunc() as u64,
        _ => 0,
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const HEADER: &str = "Date,User ID,Email,Is Active,Chat Suggested Lines Added,Chat Accepted Lines Added,Chat Total Applies,Tabs Accepted,Agent Requests,Most Used Model,Client Version";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn csv(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    // ── parse_csv_str ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_maps_headers_to_fields() {
        let text = csv(&["2025-06-02,u1,alice@x.io,true,120,60,14,33,5,claude-4-sonnet,1.2.4"]);
        let outcome = parse_csv_str(&text, &ParseOptions::default()).unwrap();

        assert_eq!(outcome.records.len(), 1);
        let r = &outcome.records[0];
        assert_eq!(r.date, date(2025, 6, 2));
        assert_eq!(r.user_id, "u1");
        assert_eq!(r.email, "alice@x.io");
        assert!(r.is_active);
        assert_eq!(r.counters.chat_suggested_lines_added, 120);
        assert_eq!(r.counters.chat_accepted_lines_added, 60);
        assert_eq!(r.counters.chat_total_applies, 14);
        assert_eq!(r.counters.tabs_accepted, 33);
        assert_eq!(r.counters.agent_requests, 5);
        // Columns absent from the header default to zero / empty.
        assert_eq!(r.counters.bugbot_usages, 0);
        assert_eq!(r.most_used_apply_extension, "");
        assert_eq!(r.most_used_model, "claude-4-sonnet");
        assert_eq!(r.client_version, "1.2.4");
    }

    #[test]
    fn test_parse_skips_inactive_rows() {
        let text = csv(&[
            "2025-06-02,u1,alice@x.io,true,10,5,1,0,0,,",
            "2025-06-02,u2,bob@x.io,false,0,0,0,0,0,,",
        ]);
        let outcome = parse_csv_str(&text, &ParseOptions::default()).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped_inactive, 1);
        assert_eq!(outcome.records[0].email, "alice@x.io");
    }

    #[test]
    fn test_parse_include_inactive_keeps_rows() {
        let text = csv(&["2025-06-02,u2,bob@x.io,FALSE,0,0,0,0,0,,"]);
        let options = ParseOptions {
            include_inactive: true,
            ..Default::default()
        };
        let outcome = parse_csv_str(&text, &options).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(!outcome.records[0].is_active);
    }

    #[test]
    fn test_parse_non_numeric_counters_default_to_zero() {
        let text = csv(&["2025-06-02,u1,alice@x.io,true,n/a,,-4,12.9,\"1,024\",,"]);
        let r = &parse_csv_str(&text, &ParseOptions::default()).unwrap().records[0];
        assert_eq!(r.counters.chat_suggested_lines_added, 0);
        assert_eq!(r.counters.chat_accepted_lines_added, 0);
        assert_eq!(r.counters.chat_total_applies, 0);
        assert_eq!(r.counters.tabs_accepted, 12);
        assert_eq!(r.counters.agent_requests, 1_024);
    }

    #[test]
    fn test_parse_short_rows_are_padded() {
        let text = csv(&["2025-06-02,u1,alice@x.io,true,40"]);
        let r = &parse_csv_str(&text, &ParseOptions::default()).unwrap().records[0];
        assert_eq!(r.counters.chat_suggested_lines_added, 40);
        assert_eq!(r.counters.chat_accepted_lines_added, 0);
    }

    #[test]
    fn test_parse_invalid_date_is_counted() {
        let text = csv(&[
            "not-a-date,u1,alice@x.io,true,1,1,1,1,1,,",
            "1748995200000,u1,alice@x.io,true,1,1,1,1,1,,",
        ]);
        let outcome = parse_csv_str(&text, &ParseOptions::default()).unwrap();
        assert_eq!(outcome.skipped_invalid, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].date, date(2025, 6, 4));
    }

    #[test]
    fn test_parse_trims_header_whitespace() {
        let text = " Date , Email ,Is Active, Tabs Accepted \n2025-06-02, a@x.io ,true, 7 ";
        let r = &parse_csv_str(text, &ParseOptions::default()).unwrap().records[0];
        assert_eq!(r.email, "a@x.io");
        assert_eq!(r.counters.tabs_accepted, 7);
    }

    #[test]
    fn test_parse_missing_required_column() {
        let text = "Date,User ID,Is Active\n2025-06-02,u1,true";
        let err = parse_csv_str(text, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, InsightsError::MissingColumn(ref c) if c == "Email"));
    }

    #[test]
    fn test_parse_header_only_is_empty() {
        let outcome = parse_csv_str(HEADER, &ParseOptions::default()).unwrap();
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_parse_flag_variants() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("maybe"));
    }

    // ── load_usage_records ────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_path() {
        let tmp = TempDir::new().expect("tempdir");
        let err = load_usage_records(&tmp.path().join("nope.csv"), &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, InsightsError::DataPathNotFound(_)));
    }

    #[test]
    fn test_load_empty_directory() {
        let tmp = TempDir::new().expect("tempdir");
        let err = load_usage_records(tmp.path(), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, InsightsError::NoDataFiles(_)));
    }

    #[test]
    fn test_load_directory_merges_and_dedupes() {
        let tmp = TempDir::new().expect("tempdir");
        let nested = tmp.path().join("x-june");
        std::fs::create_dir_all(&nested).unwrap();

        std::fs::write(
            tmp.path().join("week1.csv"),
            csv(&[
                "2025-06-03,u2,bob@x.io,true,10,5,1,0,0,,",
                "2025-06-02,u1,alice@x.io,true,10,5,1,0,0,,",
            ]),
        )
        .unwrap();
        // Overlaps week1 on alice's 2025-06-02 row (email differs only in case).
        std::fs::write(
            nested.join("week2.CSV"),
            csv(&[
                "2025-06-02,u1,Alice@X.io,true,99,99,9,0,0,,",
                "2025-06-09,u1,alice@x.io,true,20,10,2,0,0,,",
            ]),
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let outcome = load_usage_records(tmp.path(), &ParseOptions::default()).unwrap();

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.duplicates, 1);
        let dates: Vec<NaiveDate> = outcome.records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2025, 6, 2), date(2025, 6, 3), date(2025, 6, 9)]);
        // week1.csv sorts before x-june/week2.CSV, so its row wins.
        assert_eq!(outcome.records[0].counters.chat_suggested_lines_added, 10);
    }

    #[test]
    fn test_find_csv_files_sorted() {
        let tmp = TempDir::new().expect("tempdir");
        std::fs::write(tmp.path().join("b.csv"), HEADER).unwrap();
        std::fs::write(tmp.path().join("a.csv"), HEADER).unwrap();
        std::fs::write(tmp.path().join("c.json"), "{}").unwrap();

        let files = find_csv_files(tmp.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }
}
