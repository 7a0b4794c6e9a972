use anyhow::Context;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use fairway_core::{
    config::{required_from_env_value, ENV_ANTHROPIC_API_KEY},
    extract,
    schedule::{next_daily_run, report_date_caption, weekday_name},
    BatchCredentials, CoreConfig, Dispatcher, HttpBackend, PredictionFetcher, ReportBuilder,
    ReportMeta, ReportRenderer, ReportSection, RunOrchestrator, RunOutcome, Tour,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fairway")]
#[command(about = "Weekly golf value-pick predictions CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a prediction record from backend text and print it as JSON
    Extract {
        /// Input file (reads stdin when omitted)
        input: Option<PathBuf>,
    },
    /// Render backend text into a single-section HTML report
    Render {
        /// Input file (reads stdin when omitted)
        input: Option<PathBuf>,
        /// Tour the text belongs to (pga or dp)
        #[arg(long, default_value = "pga")]
        tour: Tour,
        /// Write HTML here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the weekly pipeline once using environment configuration
    Run {
        /// Run even if today is not the configured weekday
        #[arg(long)]
        force: bool,
        /// Fetch and render only, ignoring the weekday; print or write the HTML instead of emailing it
        #[arg(long)]
        dry_run: bool,
        /// With --dry-run, write HTML here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show when the daily trigger fires next
    NextRun,
}

fn read_input(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn write_output(html: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, html)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote report to {}", path.display());
        }
        None => println!("{html}"),
    }
    Ok(())
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fairway_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Extract { input }) => {
            let text = read_input(input.as_deref())?;
            let record = extract(&text)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Some(Commands::Render { input, tour, out }) => {
            let text = read_input(input.as_deref())?;
            let record = extract(&text)?;
            let now = Utc::now();
            let report = ReportRenderer::new().render(
                &[ReportSection {
                    record: Some(&record),
                    caption: tour.caption(),
                }],
                &ReportMeta {
                    caption: report_date_caption(now),
                    footer_year: now.year(),
                },
            );
            if report.sections == 0 {
                eprintln!("Record has no value picks; the report has no sections.");
            }
            write_output(&report.html, out.as_deref())?;
        }
        Some(Commands::Run {
            force,
            dry_run,
            out,
        }) => {
            let cfg = CoreConfig::from_lookup(env_lookup)?;
            let now = Utc::now();

            if dry_run {
                // Delivery settings are not needed to build the report.
                let api_key = required_from_env_value(
                    ENV_ANTHROPIC_API_KEY,
                    env_lookup(ENV_ANTHROPIC_API_KEY),
                )?;
                let fetcher = PredictionFetcher::new(
                    Dispatcher::new(Arc::new(HttpBackend::new(cfg.messages_url()))),
                    api_key,
                    cfg.model(),
                    cfg.fetch_timeout(),
                );
                let builder =
                    ReportBuilder::new(fetcher, cfg.tours().to_vec(), cfg.failure_policy());
                let built = builder.build(now).await?;
                for failure in &built.failures {
                    eprintln!("Skipped {}: {}", failure.tour, failure.error);
                }
                write_output(&built.report.html, out.as_deref())?;
                return Ok(());
            }

            let credentials = BatchCredentials::from_lookup(env_lookup)?;
            let orchestrator = RunOrchestrator::from_credentials(&cfg, &credentials);
            match orchestrator.run(now, force).await? {
                RunOutcome::Skipped(skip) => println!("{} (day {})", skip.message, skip.day),
                RunOutcome::Delivered(summary) => {
                    println!(
                        "Predictions email sent for {} ({} sections)",
                        summary.date, summary.sections
                    );
                    for failure in summary.failures {
                        println!("  skipped {}: {}", failure.tour, failure.error);
                    }
                }
            }
        }
        Some(Commands::NextRun) => {
            let cfg = CoreConfig::from_lookup(env_lookup)?;
            let next = next_daily_run(Utc::now(), cfg.run_hour_utc());
            println!(
                "Next trigger: {} (runs only on {} unless forced)",
                next.to_rfc3339(),
                weekday_name(cfg.run_day())
            );
        }
        None => {
            println!("Use 'fairway --help' for commands");
        }
    }

    Ok(())
}
