//! CLI binary for co2report.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ReportConfig`, drives a dashboard session, and exports reports.

use anyhow::{Context, Result};
use clap::Parser;
use co2report::pipeline::encode::surface_to_data_uri;
use co2report::{
    capture_surface, export_batch, export_to_file, DashboardSession, EmissionsSource,
    ExportProgressCallback, HttpEmissionsSource, PageFormat, ProgressCallback, ReportConfig,
    ReportSnapshot,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while the surface renders, then a page bar
/// sized once the paginator reports the tile count.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_pages_computed

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Contacting emissions service…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Writing");
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_capture_start(&self) {
        self.bar.set_prefix("Capturing");
        self.bar.set_message("rendering dashboard surface…");
    }

    fn on_capture_complete(&self, width_px: u32, height_px: u32) {
        self.bar.println(format!(
            "  {} surface {}",
            green("✓"),
            dim(&format!("{width_px}×{height_px} px"))
        ));
    }

    fn on_pages_computed(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_appended(&self, page_num: usize, total_pages: usize) {
        self.bar.set_message(format!("page {page_num}/{total_pages}"));
        self.bar.inc(1);
    }

    fn on_export_complete(&self, total_pages: usize, byte_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages  {}",
            green("✔"),
            bold(&total_pages.to_string()),
            dim(&format!("{} KiB", byte_len / 1024)),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Report for one country (writes CO2_Report_Thailand_2025.pdf)
  co2report Thailand

  # Pick the forecast year and output path
  co2report Thailand --year 2035 -o thailand.pdf

  # Letter paper, no page footers, higher supersampling
  co2report Chile --page letter --no-footer --scale 3

  # History only, no model call
  co2report Norway --no-predict

  # Machine-readable snapshot instead of a PDF
  co2report Thailand --json --embed-surface > snapshot.json

  # Batch export
  co2report --countries Thailand,Chile,Norway --out-dir reports/
  co2report --all-countries --out-dir reports/ --concurrency 8

  # Service introspection
  co2report --list-countries
  co2report --performance
  co2report --check

EMISSIONS SERVICE:
  The CLI talks to a forecast service (default http://127.0.0.1:8000)
  exposing:
    GET  /countries            available country names
    GET  /history/{country}    yearly CO₂ observations (MtCO₂)
    POST /predict              model forecast for {country, year}
    GET  /model/performance    RMSE / R² / training rows
    GET  /health               liveness and model state

  A slot whose fetch fails renders as a hatched placeholder; the export
  still completes and the warning is printed.

ENVIRONMENT VARIABLES:
  CO2REPORT_API_BASE     Service base URL
  CO2REPORT_YEAR         Forecast target year
  CO2REPORT_START_YEAR   First year of the history window
  CO2REPORT_OUTPUT       Output file path
  CO2REPORT_PAGE         Page format: a4, letter, or WIDTHxHEIGHT in mm
  CO2REPORT_SCALE        Render supersampling factor (1-4)
"#;

/// Export CO₂ emissions forecast dashboards as paginated PDF reports.
#[derive(Parser, Debug)]
#[command(
    name = "co2report",
    version,
    about = "Export CO₂ emissions forecast dashboards as paginated PDF reports",
    long_about = "Fetch a country's CO₂ emissions history and a model forecast from the \
emissions service, render the dashboard (chart, model output, performance, history table), \
and export it as a multi-page PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Country to report on. Defaults to the service's first listed country.
    country: Option<String>,

    /// Write the PDF to this file instead of the auto-generated name.
    #[arg(short, long, env = "CO2REPORT_OUTPUT")]
    output: Option<PathBuf>,

    /// Forecast target year.
    #[arg(short, long, env = "CO2REPORT_YEAR", default_value_t = 2025)]
    year: i32,

    /// First year of the history window.
    #[arg(long, env = "CO2REPORT_START_YEAR", default_value_t = 2000)]
    start_year: i32,

    /// Emissions service base URL.
    #[arg(long, env = "CO2REPORT_API_BASE", default_value = "http://127.0.0.1:8000")]
    api_base: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "CO2REPORT_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Page format: a4, letter, or WIDTHxHEIGHT in millimetres (e.g. 200x280).
    #[arg(long, env = "CO2REPORT_PAGE", default_value = "a4")]
    page: String,

    /// Render supersampling factor (1-4).
    #[arg(long, env = "CO2REPORT_SCALE", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(1..=4))]
    scale: u32,

    /// Rows in the recent-history table.
    #[arg(long, env = "CO2REPORT_TABLE_ROWS", default_value_t = 10)]
    table_rows: usize,

    /// Skip the "Page N" footer on document pages.
    #[arg(long)]
    no_footer: bool,

    /// Skip the model prediction (history-only report).
    #[arg(long)]
    no_predict: bool,

    /// Print a JSON snapshot (series, performance, errors) instead of
    /// writing a PDF.
    #[arg(long, env = "CO2REPORT_JSON")]
    json: bool,

    /// With --json: inline the rendered surface as a PNG data URI.
    #[arg(long, requires = "json")]
    embed_surface: bool,

    /// Batch mode: export these countries (comma-separated).
    #[arg(long, value_delimiter = ',', conflicts_with = "country")]
    countries: Vec<String>,

    /// Batch mode: export every country the service lists.
    #[arg(long, conflicts_with_all = ["country", "countries"])]
    all_countries: bool,

    /// Output directory for batch mode.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Concurrent exports in batch mode.
    #[arg(short, long, env = "CO2REPORT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// List the service's countries and exit.
    #[arg(long)]
    list_countries: bool,

    /// Print model performance metrics and exit.
    #[arg(long)]
    performance: bool,

    /// Check service health and exit.
    #[arg(long)]
    check: bool,

    /// Disable the progress bar.
    #[arg(long, env = "CO2REPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CO2REPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CO2REPORT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let batch_mode = cli.all_countries || !cli.countries.is_empty();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs duplicate what the progress bar already shows, so
    // they are filtered out whenever the bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !batch_mode;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and service client ──────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let source = Arc::new(
        HttpEmissionsSource::from_config(&config).context("Failed to build the service client")?,
    );

    // ── Introspection modes ──────────────────────────────────────────────
    if cli.check {
        let health = source.health().await.context("Health check failed")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&health)?);
        } else {
            // The service reports flags only; the verdict is ours.
            let status = if health.model_loaded && health.metrics_loaded {
                green("ok")
            } else {
                red("degraded")
            };
            println!("Status:          {status}");
            println!("Model loaded:    {}", health.model_loaded);
            println!("Metrics loaded:  {}", health.metrics_loaded);
            println!("History rows:    {}", health.history_rows);
            if !health.model_loaded {
                eprintln!("{} service is up but the model is not loaded", cyan("⚠"));
            }
        }
        return Ok(());
    }

    if cli.list_countries {
        let countries = source
            .list_countries()
            .await
            .context("Failed to list countries")?;
        for c in countries {
            println!("{c}");
        }
        return Ok(());
    }

    if cli.performance {
        let perf = source
            .fetch_model_performance()
            .await
            .context("Failed to fetch model performance")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&perf)?);
        } else {
            println!("RMSE:           {:.3}", perf.rmse);
            println!("R²:             {:.3}", perf.r2);
            println!("Training rows:  {}", perf.training_rows);
        }
        return Ok(());
    }

    // ── Batch mode ───────────────────────────────────────────────────────
    if batch_mode {
        let countries = if cli.all_countries {
            source
                .list_countries()
                .await
                .context("Failed to list countries")?
        } else {
            cli.countries.clone()
        };

        let results = export_batch(
            Arc::clone(&source) as Arc<dyn EmissionsSource>,
            &countries,
            cli.year,
            &cli.out_dir,
            &config,
        )
        .await
        .context("Batch export failed")?;

        let mut ok = 0usize;
        for (country, result) in &results {
            match result {
                Ok(stats) => {
                    ok += 1;
                    if !cli.quiet {
                        eprintln!(
                            "  {} {country}  {}",
                            green("✓"),
                            dim(&format!("{} pages, {}ms", stats.pages, stats.total_duration_ms))
                        );
                    }
                }
                Err(e) => eprintln!("  {} {country}  {}", red("✗"), red(&e.to_string())),
            }
        }
        if !cli.quiet {
            eprintln!(
                "{} {}/{} reports written to {}",
                if ok == results.len() { green("✔") } else { cyan("⚠") },
                bold(&ok.to_string()),
                results.len(),
                bold(&cli.out_dir.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Single-country mode ──────────────────────────────────────────────
    let country = match cli.country.clone() {
        Some(c) => c,
        None => {
            let first = source
                .list_countries()
                .await
                .context("Failed to list countries")?
                .into_iter()
                .next()
                .context("Emissions service lists no countries")?;
            if !cli.quiet {
                eprintln!("{}", dim(&format!("No country given; using '{first}'")));
            }
            first
        }
    };

    let mut session = DashboardSession::new(
        Arc::clone(&source) as Arc<dyn EmissionsSource>,
        config.start_year,
        cli.year,
    );
    session.select_country(&country).await;
    if !cli.no_predict {
        session.request_prediction().await;
    }
    session.refresh_performance().await;

    // Degraded slots warn but never abort; the report shows placeholders.
    if !cli.quiet {
        if let Some(e) = session.history().error() {
            eprintln!("{} history unavailable: {e}", cyan("⚠"));
        }
        if let Some(e) = session.forecast().error() {
            eprintln!("{} forecast unavailable: {e}", cyan("⚠"));
        }
        if let Some(e) = session.performance().error() {
            eprintln!("{} model performance unavailable: {e}", cyan("⚠"));
        }
    }

    let view = session.view();

    if cli.json {
        let mut snapshot = ReportSnapshot::from_view(&view);
        if cli.embed_surface {
            let surface = capture_surface(&view, &config)
                .await
                .context("Surface capture failed")?;
            snapshot = snapshot.with_surface(
                surface_to_data_uri(&surface).context("Surface encoding failed")?,
            );
        }
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(config.report_file_name(&country, cli.year)));

    let stats = export_to_file(&view, &output_path, &config)
        .await
        .context("Export failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            green("✔"),
            stats.pages,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
    }
    Ok(())
}

/// Map CLI args to `ReportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let page = PageFormat::parse(&cli.page)
        .with_context(|| format!("Invalid --page value '{}'", cli.page))?;

    let mut builder = ReportConfig::builder()
        .api_base_url(cli.api_base.as_str())
        .request_timeout_secs(cli.timeout)
        .start_year(cli.start_year)
        .page(page)
        .render_scale(cli.scale)
        .table_rows(cli.table_rows)
        .page_footer(!cli.no_footer)
        .concurrency(cli.concurrency);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
