//! Runs one listing-scout session from the command line.
//!
//! Configuration comes from the environment (and `.env`); flags override it.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use listing_scout::normalize::group_thousands;
use listing_scout::{
    filter_and_summarize, validate_subject, AnalysisOutcome, DefaultBackendFactory, ListingFilter,
    ListingRecord, ListingStats, MemoryStore, Pipeline, ScoutConfig, ScoutStore,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Compare two vehicles and find marketplace listings for each")]
struct Cli {
    /// First subject, e.g. "Toyota Aqua"
    subject_a: String,

    /// Second subject, e.g. "Honda Fit"
    subject_b: String,

    /// Skip remote models and use the offline backend
    #[arg(long)]
    force_local: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Candidate listings per subject
    #[arg(long)]
    max_candidates: Option<usize>,

    /// SQLite database for listings and reports (requires the `sqlite` feature)
    #[arg(long)]
    database_url: Option<String>,

    /// Only summarize listings at or above this price (LKR)
    #[arg(long)]
    min_price: Option<u64>,

    /// Only summarize listings at or below this price (LKR)
    #[arg(long)]
    max_price: Option<u64>,

    /// Only summarize listings from this manufacture year
    #[arg(long)]
    year: Option<String>,

    /// Only summarize listings whose location contains this text
    #[arg(long)]
    location: Option<String>,
}

impl Cli {
    fn filter(&self) -> ListingFilter {
        ListingFilter {
            min_price: self.min_price,
            max_price: self.max_price,
            year: self.year.clone(),
            location: self.location.clone(),
        }
    }
}

#[derive(Serialize)]
struct SubjectSummary<'a> {
    subject: &'a str,
    stats: ListingStats,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    outcome: &'a AnalysisOutcome,
    summaries: Vec<SubjectSummary<'a>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,listing_scout=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    validate_subject(&cli.subject_a)?;
    validate_subject(&cli.subject_b)?;

    let mut config = ScoutConfig::from_env().context("Failed to load configuration")?;
    if cli.force_local {
        config = config.with_force_local(true);
    }
    if let Some(max) = cli.max_candidates {
        config = config.with_max_candidates(max);
    }
    if let Some(url) = &cli.database_url {
        config = config.with_database_url(url.clone());
    }

    let store = open_store(config.database_url.as_deref()).await?;
    let factory = DefaultBackendFactory::from_config(config.clone())
        .context("Failed to set up analysis backends")?;
    let pipeline = Pipeline::new(&config, Arc::new(factory), store);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling session");
            on_interrupt.cancel();
        }
    });

    let outcome = pipeline
        .run_with_cancel(&cli.subject_a, &cli.subject_b, cancel)
        .await
        .context("Session failed")?;

    let filter = cli.filter();
    let summaries = vec![
        SubjectSummary {
            subject: &cli.subject_a,
            stats: filter_and_summarize(&outcome.subject_a_records, &filter).1,
        },
        SubjectSummary {
            subject: &cli.subject_b,
            stats: filter_and_summarize(&outcome.subject_b_records, &filter).1,
        },
    ];

    if cli.json {
        let output = JsonOutput {
            outcome: &outcome,
            summaries,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_outcome(&outcome, &cli, &summaries);
    }

    Ok(())
}

async fn open_store(database_url: Option<&str>) -> Result<Arc<dyn ScoutStore>> {
    match database_url {
        None => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "sqlite")]
        Some(url) => {
            let store = listing_scout::SqliteStore::new(url)
                .await
                .with_context(|| format!("Failed to open database {url}"))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        Some(_) => anyhow::bail!(
            "a database URL was given but scout was built without the `sqlite` feature"
        ),
    }
}

fn print_outcome(outcome: &AnalysisOutcome, cli: &Cli, summaries: &[SubjectSummary<'_>]) {
    println!("{}", outcome.report);
    println!();
    println!("Session {} via {}", outcome.session_id, outcome.backend);
    for transition in &outcome.transitions {
        println!("  fell back from {}: {}", transition.from, transition.reason);
    }

    let sections = [
        (&cli.subject_a, &outcome.subject_a_records),
        (&cli.subject_b, &outcome.subject_b_records),
    ];
    for ((subject, records), summary) in sections.iter().zip(summaries) {
        println!();
        println!("== {} ({} listings) ==", subject, records.len());
        for record in records.iter() {
            print_record(record);
        }
        print_stats(&summary.stats);
    }
}

fn print_record(record: &ListingRecord) {
    println!("- {}", record.title);
    println!(
        "  {} | {} | {} | {}",
        record.price, record.mileage, record.year, record.location
    );
    println!("  {}", record.link);
}

fn print_stats(stats: &ListingStats) {
    let fmt = |v: Option<u64>| {
        v.map(|p| format!("LKR {}", group_thousands(p)))
            .unwrap_or_else(|| "-".to_string())
    };
    println!(
        "  priced: {}  min: {}  max: {}  avg: {}",
        stats.count,
        fmt(stats.min_price),
        fmt(stats.max_price),
        fmt(stats.avg_price)
    );
}
