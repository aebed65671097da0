use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use pg_curve::{
    collect_batch, detect_censor_flags, extract_actual_games, extract_play_graphs, process_day,
    select_target_graph, CollectingSink, CumulativePoint, DayDocument, DayKey, DayOutput, Diagnostic,
    DiagnosticSink, Level, Params, PgError,
};
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::EnvFilter;

mod chart;
mod output;

use chart::{render_chart_guard, ChartKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "PlayGraph curve reconstruction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild per-day series and the stitched all-time curve from record pages
    Curve(CurveArgs),
    /// Report the PlayGraph widgets found in record pages
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct CurveArgs {
    /// HTML record pages, or directories containing them
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "out", value_hint = ValueHint::DirPath)]
    out: PathBuf,

    /// JSON parameter file (rescale toggle, special-day table)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Output PNG chart path (defaults to <out>/all_time_curve.png)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Also write an SVG chart
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Keep the widget's game scale even when the page reports the real count
    #[arg(long, action = ArgAction::SetTrue)]
    no_rescale: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Profile major stages with timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// HTML record pages, or directories containing them
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    inputs: Vec<PathBuf>,

    /// Output report path (`-` for stdout)
    #[arg(short, long, default_value = "playgraph_report.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

/// Forwards library diagnostics to the tracing subscriber.
struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level() {
            Level::Debug => debug!("{}", diagnostic),
            Level::Info => info!("{}", diagnostic),
            Level::Warn => warn!("{}", diagnostic),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Curve(args) => args.verbose,
        Command::Inspect(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Curve(args) => handle_curve(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_curve(args: CurveArgs) -> Result<()> {
    let mut params = match args.config.as_ref() {
        Some(path) => load_params(path)?,
        None => Params::default(),
    };
    if args.no_rescale {
        params.rescale_to_actual_games = false;
    }
    let timings = args.profile || args.verbose;

    let t_read = Instant::now();
    let inputs = dated_inputs(discover_inputs(&args.inputs)?);
    if inputs.is_empty() {
        return Err(anyhow!("no dated .html record pages among the inputs"));
    }
    let documents = read_documents(&inputs);
    if timings {
        info!(
            "Read stage: {:.1} ms ({} of {} pages)",
            t_read.elapsed().as_secs_f64() * 1000.0,
            documents.len(),
            inputs.len()
        );
    }

    let t_process = Instant::now();
    let processed: Vec<(DayKey, CollectingSink, Result<DayOutput, PgError>)> = documents
        .par_iter()
        .map(|doc| {
            let mut sink = CollectingSink::default();
            let result = process_day(doc.day, &doc.html, doc.actual_games, &params, &mut sink);
            (doc.day, sink, result)
        })
        .collect();

    let mut log = TracingSink;
    let mut results = Vec::with_capacity(processed.len());
    for (day, sink, result) in processed {
        let _span = info_span!("page", %day).entered();
        sink.replay_into(&mut log);
        results.push((day, result));
    }
    let batch = collect_batch(results, &mut log).context("failed to stitch the all-time curve")?;
    if timings {
        info!(
            "Process stage: {:.1} ms ({} cumulative points)",
            t_process.elapsed().as_secs_f64() * 1000.0,
            batch.cumulative.points.len()
        );
    }
    debug!(
        "Stitching dropped {} duplicate and {} non-finite points",
        batch.cumulative.duplicates_removed, batch.cumulative.non_finite_removed
    );

    let t_csv = Instant::now();
    let days_dir = args.out.join("days");
    for (day, series) in &batch.days {
        output::write_day_csv(series, &days_dir.join(format!("{}.csv", day)))?;
    }
    let summary_path = args.out.join("daily_summary.csv");
    output::write_summary_csv(&batch.summaries, &summary_path)?;
    let curve_path = args.out.join("all_time_curve.csv");
    output::write_cumulative_csv(&batch.cumulative.points, &curve_path)?;
    if timings {
        info!("CSV stage: {:.1} ms", t_csv.elapsed().as_secs_f64() * 1000.0);
    }
    info!("Wrote CSV output under {}", args.out.display());

    if !args.no_plot {
        let t_plot = Instant::now();
        let png_path = args
            .png
            .clone()
            .unwrap_or_else(|| args.out.join("all_time_curve.png"));
        render_logged(&batch.cumulative.points, &png_path, ChartKind::Png);
        if let Some(path) = args.svg.as_ref() {
            render_logged(&batch.cumulative.points, path, ChartKind::Svg);
        }
        if timings {
            info!("Plot stage: {:.1} ms", t_plot.elapsed().as_secs_f64() * 1000.0);
        }
    }

    let special: Vec<String> = batch.special_days().map(|s| s.day.to_string()).collect();
    let censored: Vec<String> = batch.censored_days().map(|s| s.day.to_string()).collect();
    info!(
        "Run summary: {} days ({} skipped), {} cumulative points",
        batch.summaries.len(),
        batch.skipped.len(),
        batch.cumulative.points.len()
    );
    info!(
        "Special-rule days: {}",
        if special.is_empty() { "none".to_string() } else { special.join(", ") }
    );
    info!(
        "Censored days: {}",
        if censored.is_empty() { "none".to_string() } else { censored.join(", ") }
    );
    if let Some(last) = batch.cumulative.points.last() {
        info!(
            "All-time balance {:.1} after {:.0} games",
            last.cum_diff, last.cum_game
        );
    }
    Ok(())
}

fn render_logged(points: &[CumulativePoint], path: &Path, kind: ChartKind) {
    if points.is_empty() {
        warn!("Nothing to plot; skipping {}", path.display());
        return;
    }
    match render_chart_guard(points, path, kind) {
        Ok(()) => info!("Wrote plot: {}", path.display()),
        Err(err) => warn!("Skipping chart render ({}): {}", path.display(), err),
    }
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let mut report = String::new();

    for path in discover_inputs(&args.inputs)? {
        let html = match read_page(&path) {
            Ok(html) => html,
            Err(err) => {
                report.push_str(&format!("FILE: {}\n  error: {:#}\n\n", path.display(), err));
                continue;
            }
        };
        let mut sink = CollectingSink::default();
        let graphs = extract_play_graphs(&html, &mut sink);
        let target = select_target_graph(&graphs);
        let actual_games = extract_actual_games(&html);

        report.push_str(&format!("FILE: {}\n", path.display()));
        report.push_str(&format!(
            "  day: {}\n",
            DayKey::from_path(&path).map_or("n/a".into(), |d| d.to_string())
        ));
        report.push_str(&format!("  candidates: {}\n", graphs.len()));
        for (idx, graph) in graphs.iter().enumerate() {
            let chosen = target.is_some_and(|t| std::ptr::eq(t, graph));
            report.push_str(&format!(
                "    - #{} points={} rect=({}, {}, {}x{}) axis=(total {}, min {}, max {}){}\n",
                idx,
                graph.len(),
                graph.rect.x,
                graph.rect.y,
                graph.rect.w,
                graph.rect.h,
                graph.axis.total_games,
                graph.axis.min_balance,
                graph.axis.max_balance,
                if chosen { " [target]" } else { "" }
            ));
        }
        report.push_str(&format!(
            "  actual_games: {}\n",
            actual_games.map_or("n/a".into(), |g| g.to_string())
        ));
        if let Some(graph) = target {
            let flags = detect_censor_flags(graph, actual_games);
            report.push_str(&format!("  censored_right: {}\n", flags.censored_right));
            report.push_str(&format!("  censored_bottom: {}\n", flags.censored_bottom));
        } else {
            report.push_str("  target: none\n");
        }
        if !sink.events.is_empty() {
            report.push_str("  notes:\n");
            for event in &sink.events {
                report.push_str(&format!("    - {}\n", event));
            }
        }
        report.push('\n');
    }

    if args.output.as_os_str() == "-" {
        print!("{}", report);
    } else {
        fs::write(&args.output, report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Inspection report written: {}", args.output.display());
    }
    Ok(())
}

fn load_params(path: &Path) -> Result<Params> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let params: Params = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid parameter file", path.display()))?;
    for (day, config) in &params.special_days {
        config
            .validate(0.0)
            .map_err(|err| anyhow!("special day {}: {}", day, err))?;
    }
    Ok(params)
}

/// Read one record page. Bytes that are not valid UTF-8 are replaced, not rejected.
fn read_page(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Load all pages in parallel. A page that cannot be read is logged and left
/// out; the other days still go through.
fn read_documents(inputs: &[(DayKey, PathBuf)]) -> Vec<DayDocument> {
    let loaded: Vec<Result<DayDocument>> = inputs
        .par_iter()
        .map(|(day, path)| {
            read_page(path).map(|html| DayDocument {
                day: *day,
                html,
                actual_games: None,
            })
        })
        .collect();
    loaded
        .into_iter()
        .filter_map(|result| match result {
            Ok(doc) => Some(doc),
            Err(err) => {
                warn!("Skipping page: {:#}", err);
                None
            }
        })
        .collect()
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

/// Expand directories into their HTML entries (not recursive).
fn discover_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries = Vec::new();
            let dir = fs::read_dir(input)
                .with_context(|| format!("failed to list {}", input.display()))?;
            for entry in dir {
                let path = entry
                    .with_context(|| format!("failed to list {}", input.display()))?
                    .path();
                if path.is_file() && is_html(&path) {
                    entries.push(path);
                }
            }
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// Attach day keys, dropping files that carry no date. Sorted by day, then
/// path, so a later file for the same day wins in the batch.
fn dated_inputs(files: Vec<PathBuf>) -> Vec<(DayKey, PathBuf)> {
    let mut dated: Vec<(DayKey, PathBuf)> = files
        .into_iter()
        .filter_map(|path| match DayKey::from_path(&path) {
            Some(day) => Some((day, path)),
            None => {
                warn!("No YYYY-MM-DD day in {}; skipping", path.display());
                None
            }
        })
        .collect();
    dated.sort();
    dated
}
