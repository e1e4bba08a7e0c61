mod bootstrap;
mod report;

use anyhow::{Context, Result};
use insights_core::error::InsightsError;
use insights_core::settings::Settings;
use insights_core::time_utils::TimezoneHandler;
use insights_data::analysis::{analyze, AnalysisRequest};
use insights_data::filters::{DateRange, RecordFilter, UserFilter};
use insights_data::metrics::LeaderboardSort;
use insights_data::reader::{load_usage_records, ParseOptions};

fn main() -> Result<()> {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        // Prints usage, or help / version, with clap's own exit code.
        Err(InsightsError::Cli(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("cursor-insights v{} starting", env!("CARGO_PKG_VERSION"));
    let options = ParseOptions {
        include_inactive: settings.include_inactive,
        timezone: TimezoneHandler::new(&settings.timezone),
    };
    tracing::info!(
        "Input: {}, period: {}, timezone: {}",
        settings.input.display(),
        settings.period,
        options.timezone.default_tz()
    );
    let outcome = load_usage_records(&settings.input, &options)
        .with_context(|| format!("failed to load {}", settings.input.display()))?;

    if outcome.skipped_invalid > 0 {
        tracing::warn!("{} rows had an unreadable date", outcome.skipped_invalid);
    }

    let (since, until) = settings.date_bounds()?;
    let request = AnalysisRequest {
        filter: RecordFilter::new(DateRange::new(since, until)?, UserFilter::new(&settings.users)),
        period: settings.aggregation_period()?,
        config: settings.metrics_config()?,
        sort: settings.sort.parse::<LeaderboardSort>()?,
        limit: settings.top,
    };

    let analysis = analyze(&outcome.records, &request)?;

    if settings.wants_json() {
        println!("{}", report::render_json(&analysis)?);
    } else {
        print!("{}", report::render_text(&analysis));
    }

    Ok(())
}
