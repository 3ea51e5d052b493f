pub mod data;
pub mod evaluate;
pub mod interpolate;
pub mod limits;
pub mod naming;
pub mod output;
pub mod plots;
pub mod report;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::cli::AnalyzeArgs;
use crate::config::ThermalConfig;
use crate::model::{RunSummary, StatusCounts};
use crate::util::{folder_timestamp, human_timestamp, rfc3339_timestamp, sha256_file, write_json_pretty};

use self::output::RunOutput;
use self::plots::{PlotContext, PlotStyles};
use self::report::ReportInputs;

const SUMMARY_VERSION: u32 = 1;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let summary = execute(&args, Local::now())?;

    info!(
        output = %summary.output_root,
        components = summary.component_count,
        decks = summary.deck_count,
        pass = summary.counts.pass,
        fail = summary.counts.fail,
        undefined = summary.counts.undefined,
        plots = summary.plots.written,
        warnings = summary.warnings.len(),
        "analysis completed"
    );
    Ok(())
}

pub fn execute(args: &AnalyzeArgs, now: DateTime<Local>) -> Result<RunSummary> {
    let (config, mut warnings) = ThermalConfig::load(&args.config);

    let data_path = config.files.simulation_data.clone();
    let limits_path = config.files.limits.clone();

    let dataset = data::load_dataset(&data_path)?;
    warnings.extend(dataset.warnings());

    let (limits, created) = limits::ensure_limits(&limits_path, &dataset.component_names());
    warnings.extend(limits.warnings.iter().cloned());
    if !created.is_empty() {
        info!(
            path = %limits_path.display(),
            components = %created.join(", "),
            "placeholder limits need real values"
        );
    }

    let window = evaluate::zoom_window(dataset.time_span(), config.settings.zoom_duration_min());
    if window.clamped {
        info!(
            start = window.start_min,
            end = window.end_min,
            "zoom window covers the whole time span"
        );
    }
    let (results, evaluation_warnings) = evaluate::evaluate_all(&dataset, &limits, &window);
    warnings.extend(evaluation_warnings);

    let timestamp = folder_timestamp(now);
    let output = RunOutput::create(&args.output_dir, &config.output.root_prefix, &timestamp)?;

    let styles = PlotStyles::from_config(&config.colors, &mut warnings);
    let ctx = PlotContext {
        dataset: &dataset,
        config: &config,
        window: &window,
        styles: &styles,
    };
    let jobs = plots::plan_plots(&dataset, &config, &output);
    let (plot_counts, plot_warnings) = plots::render_all(&jobs, &ctx);
    warnings.extend(plot_warnings);

    let generated_at = human_timestamp(now);
    let report_path = output.report_path();
    report::write_report(
        &report_path,
        &ReportInputs {
            generated_at: &generated_at,
            data_file: &data_path,
            limits_file: &limits_path,
            window,
            decks: &dataset.decks,
            results: &results,
            created_placeholders: &created,
            warnings: &warnings,
        },
    )?;
    info!(path = %report_path.display(), "wrote report");

    let data_sha256 = sha256_file(&data_path)?;
    let limits_sha256 = if limits_path.is_file() {
        match sha256_file(&limits_path) {
            Ok(digest) => Some(digest),
            Err(err) => {
                warn!("{err:#}");
                warnings.push(format!("{err:#}"));
                None
            }
        }
    } else {
        None
    };

    let summary = RunSummary {
        manifest_version: SUMMARY_VERSION,
        run_id: format!("run-{timestamp}"),
        generated_at: rfc3339_timestamp(now),
        output_root: output.root.display().to_string(),
        data_file: data_path.display().to_string(),
        data_sha256,
        limits_file: limits_path.display().to_string(),
        limits_sha256,
        zoom_window: window,
        component_count: dataset.components.len(),
        deck_count: dataset.decks.len(),
        counts: StatusCounts::tally(&results),
        plots: plot_counts,
        created_placeholders: created,
        warnings,
        results,
    };

    let summary_path = output.summary_path();
    write_json_pretty(&summary_path, &summary)
        .with_context(|| format!("failed to write run summary {}", summary_path.display()))?;
    info!(path = %summary_path.display(), "wrote run summary");

    Ok(summary)
}
