mod classify;
mod client;
mod display;
mod export;
mod fetcher;
mod query;
mod record;
mod report;
mod settings;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use classify::reference::ReferenceData;
use classify::Classifiers;
use client::{FetchError, RegistryClient};
use export::TableWriter;
use fetcher::{FetchOptions, FetchState, Pager, ThreadSleep};
use query::SearchQuery;
use settings::Settings;

#[derive(Parser)]
#[command(name = "ctgov", about = "ClinicalTrials.gov search, export and trend reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search studies and print summaries
    Search {
        /// Condition or disease (e.g. "lung cancer")
        #[arg(short, long)]
        condition: Option<String>,
        /// Intervention or treatment
        #[arg(short, long)]
        intervention: Option<String>,
        /// Free-text search term
        #[arg(short, long)]
        term: Option<String>,
        /// Sponsor name
        #[arg(short, long)]
        sponsor: Option<String>,
        /// Location (city, state, country)
        #[arg(short, long)]
        location: Option<String>,
        /// Comma-separated overall statuses (e.g. RECRUITING,COMPLETED)
        #[arg(long)]
        status: Option<String>,
        /// Comma-separated phases (e.g. PHASE2,PHASE3)
        #[arg(long)]
        phase: Option<String>,
        /// Sort order (e.g. "LastUpdatePostDate:desc")
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value = "10")]
        page_size: u32,
        /// Pages to fetch (0 = all)
        #[arg(long, default_value = "1")]
        max_pages: u32,
        /// Print raw JSON instead of summaries
        #[arg(long)]
        json: bool,
    },
    /// Show full details for one study
    Study {
        /// NCT identifier, with or without the NCT prefix
        nct_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Export matching studies to CSV
    Export {
        #[arg(short, long, default_value = "cancer OR oncology")]
        condition: String,
        /// First start date (YYYY-MM-DD)
        #[arg(long, default_value = "2022-01-01")]
        start_from: String,
        /// Last start date (YYYY-MM-DD)
        #[arg(long, default_value = "2025-12-31")]
        start_to: String,
        #[arg(long, default_value = "1000")]
        page_size: u32,
        /// Max pages to fetch (default: all)
        #[arg(long)]
        max_pages: Option<u32>,
        /// Output CSV path
        #[arg(short, long, default_value = "oncology_trials.csv")]
        output: PathBuf,
        /// Also write per-trial countries and facilities to this CSV
        #[arg(long)]
        sites: Option<PathBuf>,
    },
    /// Year, geography, site-type and sponsor-tier breakdowns of an export
    Report {
        /// CSV written by `export`
        input: PathBuf,
        /// Sites CSV written by `export --sites`
        #[arg(long)]
        sites: Option<PathBuf>,
        #[arg(long, default_value = "2022")]
        from_year: i32,
        #[arg(long, default_value = "2025")]
        to_year: i32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Search {
            condition,
            intervention,
            term,
            sponsor,
            location,
            status,
            phase,
            sort,
            page_size,
            max_pages,
            json,
        } => {
            let mut query = SearchQuery {
                condition,
                intervention,
                term,
                sponsor,
                location,
                sort,
                ..SearchQuery::new(page_size)
            };
            if let Some(raw) = status {
                query = query.with_statuses(&raw)?;
            }
            if let Some(raw) = phase {
                query = query.with_phases(&raw)?;
            }
            let max_pages = (max_pages > 0).then_some(max_pages);
            run_search(&settings, &query, max_pages, json)
        }
        Commands::Study { nct_id, json } => {
            let id = query::normalize_nct_id(&nct_id);
            let client = RegistryClient::new(&settings.base_url, settings.timeout())?;
            let study = client.fetch_study(&id).unwrap_or_else(|e| exit_with(&e));
            if json {
                println!("{}", serde_json::to_string_pretty(&study)?);
            } else {
                print!("{}", display::format_detail(&study));
            }
            Ok(())
        }
        Commands::Export {
            condition,
            start_from,
            start_to,
            page_size,
            max_pages,
            output,
            sites,
        } => {
            let query = SearchQuery {
                condition: Some(condition),
                ..SearchQuery::new(page_size)
            }
            .with_start_range(&start_from, &start_to)?;
            run_export(&settings, &query, max_pages.filter(|n| *n > 0), &output, sites.as_deref())
        }
        Commands::Report {
            input,
            sites,
            from_year,
            to_year,
        } => {
            anyhow::ensure!(from_year <= to_year, "--from-year must not be after --to-year");
            let rows = export::read_rows(&input)?;
            let sites: HashMap<String, record::sites::SiteRow> = match &sites {
                Some(path) => export::read_sites(path)?
                    .into_iter()
                    .map(|s| (s.nct_id.clone(), s))
                    .collect(),
                None => HashMap::new(),
            };
            info!(trials = rows.len(), with_sites = sites.len(), "Loaded export");
            let reference = ReferenceData::load(&settings.reference_path)?;
            let classifiers = Classifiers::new(&reference)?;
            let report = report::Report::build(&rows, &sites, &classifiers, from_year..=to_year);
            print!("{}", report.render());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Report a failed first request and quit.
fn exit_with(err: &FetchError) -> ! {
    eprintln!("{}", err);
    if let Some(body) = err.body() {
        eprintln!("{}", body);
    }
    process::exit(1);
}

fn fetch_options(settings: &Settings, max_pages: Option<u32>) -> FetchOptions {
    FetchOptions {
        max_pages,
        page_delay: settings.page_delay(),
        retry_delay: settings.retry_delay(),
    }
}

fn run_search(settings: &Settings, query: &SearchQuery, max_pages: Option<u32>, json: bool) -> Result<()> {
    let client = RegistryClient::new(&settings.base_url, settings.timeout())?;
    let mut pager = Pager::start(client, ThreadSleep, query, fetch_options(settings, max_pages))
        .unwrap_or_else(|e| exit_with(&e));

    if json {
        let studies: Vec<serde_json::Value> = pager.by_ref().collect();
        let doc = serde_json::json!({
            "totalCount": pager.total_count(),
            "studies": studies,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        report_partial(&pager.finish());
        return Ok(());
    }

    if let Some(total) = pager.total_count() {
        println!("Found {} studies\n", total);
    }
    let mut shown = 0u64;
    for (i, study) in pager.by_ref().enumerate() {
        println!("[{}]", i + 1);
        println!("{}", display::format_summary(&study));
        println!();
        shown += 1;
    }
    let truncated = pager.state() == FetchState::Truncated;
    let summary = pager.finish();
    if shown == 0 {
        println!("No studies found.");
    }
    let remaining = summary.remaining();
    if truncated && remaining > 0 {
        println!("... {} more studies (use --max-pages to see more)", remaining);
    }
    report_partial(&summary);
    Ok(())
}

fn run_export(
    settings: &Settings,
    query: &SearchQuery,
    max_pages: Option<u32>,
    output: &std::path::Path,
    sites_path: Option<&std::path::Path>,
) -> Result<()> {
    info!(params = ?query.to_params(), "Starting export");
    let client = RegistryClient::new(&settings.base_url, settings.timeout())?;
    let mut pager = Pager::start(client, ThreadSleep, query, fetch_options(settings, max_pages))
        .unwrap_or_else(|e| exit_with(&e));

    let mut rows = TableWriter::create(output, &record::COLUMNS)?;
    let mut sites = sites_path
        .map(|path| TableWriter::create(path, &record::sites::SITE_COLUMNS))
        .transpose()?;

    let pb = ProgressBar::new(pager.total_count().unwrap_or(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} trials ({per_sec}) {msg}")?
            .progress_chars("=> "),
    );

    let mut last_page = 0;
    while let Some(study) = pager.next() {
        rows.write(&record::flatten(&study))
            .with_context(|| format!("Failed writing {}", output.display()))?;
        if let Some(w) = sites.as_mut() {
            w.write(&record::sites::extract(&study))?;
        }
        pb.inc(1);
        if pager.pages_fetched() != last_page {
            last_page = pager.pages_fetched();
            pb.set_message(format!("page {}", last_page));
        }
    }
    pb.finish_and_clear();

    let summary = pager.finish();
    println!("Wrote {} trials to {}", rows.rows(), output.display());
    rows.into_inner()?;
    if let (Some(w), Some(path)) = (sites, sites_path) {
        println!("Wrote {} site rows to {}", w.rows(), path.display());
        w.into_inner()?;
    }
    if summary.state == FetchState::Truncated {
        info!(
            pages = summary.pages_fetched,
            remaining = summary.remaining(),
            "Stopped at page limit"
        );
    }
    report_partial(&summary);
    Ok(())
}

fn report_partial(summary: &fetcher::FetchSummary) {
    if let Some(err) = &summary.error {
        warn!(
            pages = summary.pages_fetched,
            records = summary.records,
            error = %err,
            "Fetch abandoned after retry, results are partial"
        );
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
