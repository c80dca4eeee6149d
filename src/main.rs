//! # wpmigrate
//!
//! Command-line front end for the WordPress → Sanity migration.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wpmigrate run [EXPORT]` | Migrate an export into the configured dataset |
//! | `wpmigrate inspect [EXPORT]` | Parse and classify an export, print counts |
//! | `wpmigrate convert <FILE\|->` | Convert an HTML fragment to block JSON |
//!
//! ## Examples
//!
//! ```bash
//! # Check what an export contains
//! wpmigrate inspect ./wordpress-export.xml
//!
//! # Full run against an in-memory store, no images, no credentials needed
//! wpmigrate run --dry-run --skip-images ./wordpress-export.xml
//!
//! # Real run, credentials from .env
//! wpmigrate run ./wordpress-export.xml --report report.json
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wp_sanity_migrate::assets::ImageFetcher;
use wp_sanity_migrate::blocks::KeyGen;
use wp_sanity_migrate::classify::classify;
use wp_sanity_migrate::config::{self, Config, DEFAULT_CONFIG_PATH};
use wp_sanity_migrate::pipeline::{run_migration, MigrationOptions};
use wp_sanity_migrate::progress::{progress_reporter, ProgressMode};
use wp_sanity_migrate::report::is_stdout;
use wp_sanity_migrate::schema::BlockSchema;
use wp_sanity_migrate::store::{ContentStore, InMemoryStore, SanityClient};
use wp_sanity_migrate::transcode::Transcoder;
use wp_sanity_migrate::wxr::read_export;

/// Migrate a WordPress (WXR) export into a Sanity dataset.
///
/// Sanity credentials come from the environment (`SANITY_PROJECT_ID`,
/// `SANITY_DATASET`, `SANITY_API_WRITE_TOKEN`, also read from `.env` and
/// `.env.local`) or from the `[sanity]` section of the config file.
#[derive(Parser)]
#[command(name = "wpmigrate", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./wpmigrate.toml`; a missing default file is not an
    /// error.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate authors, categories, tags and published posts.
    ///
    /// Every document is written with create-or-replace under an ID derived
    /// from its WordPress ID, so re-running converges instead of duplicating.
    Run {
        /// WordPress export file. Falls back to `WP_EXPORT_PATH` or
        /// `migration.export_path`.
        export: Option<PathBuf>,

        /// Write to an in-memory store instead of Sanity. No credentials
        /// needed.
        #[arg(long)]
        dry_run: bool,

        /// Do not download or upload featured images.
        #[arg(long)]
        skip_images: bool,

        /// Abort on the first failing post instead of recording it and
        /// continuing.
        #[arg(long)]
        fail_fast: bool,

        /// Migrate at most N published posts.
        #[arg(long)]
        limit: Option<usize>,

        /// Language key for localized fields (default: `ja`).
        #[arg(long)]
        language: Option<String>,

        /// Link every resolved category instead of only the first.
        #[arg(long)]
        all_categories: bool,

        /// Write the run report as JSON to this path (`-` for stdout).
        #[arg(long)]
        report: Option<PathBuf>,

        /// Progress output on stderr: human, json, or off. Default: human
        /// when stderr is a terminal, off otherwise.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// Parse and classify an export without touching the network.
    Inspect {
        /// WordPress export file. Falls back to `WP_EXPORT_PATH` or
        /// `migration.export_path`.
        export: Option<PathBuf>,
    },

    /// Convert an HTML fragment to block JSON.
    Convert {
        /// HTML file, or `-` for stdin.
        input: PathBuf,

        /// Target schema.
        #[arg(long, value_enum, default_value = "body")]
        schema: SchemaChoice,

        /// Seed for the generated `_key`s.
        #[arg(long, default_value = "convert")]
        seed: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaChoice {
    /// Post body, with the speech-bubble rule.
    Body,
    /// Speech-bubble text.
    Bubble,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "wp_sanity_migrate=debug,wpmigrate=debug"
    } else {
        "wp_sanity_migrate=info,wpmigrate=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli_config: Option<&PathBuf>) -> anyhow::Result<Config> {
    let cfg = match cli_config {
        Some(path) => config::load_config(path, true)?,
        None => config::load_config(&PathBuf::from(DEFAULT_CONFIG_PATH), false)?,
    };
    Ok(cfg)
}

fn export_path(arg: Option<PathBuf>, cfg: &Config) -> anyhow::Result<PathBuf> {
    arg.or_else(|| cfg.migration.export_path.clone()).ok_or_else(|| {
        anyhow!("no export file given: pass a path, set WP_EXPORT_PATH, or set migration.export_path")
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env.local first so it wins; dotenvy never overrides variables already set.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            export,
            dry_run,
            skip_images,
            fail_fast,
            limit,
            language,
            all_categories,
            report,
            progress,
        } => {
            let cfg = load_config(cli.config.as_ref())?;
            let path = export_path(export, &cfg)?;
            let http = cfg.http.client()?;

            let store: Box<dyn ContentStore> = if dry_run {
                Box::new(InMemoryStore::new())
            } else {
                let credentials = cfg.validate_for_write()?;
                Box::new(SanityClient::new(credentials, http.clone()))
            };

            let export = read_export(&path)?;

            let mut options = MigrationOptions::from_config(&cfg.migration);
            options.limit = limit;
            if let Some(language) = language {
                options.language = language;
            }
            if all_categories {
                options.first_category_only = false;
            }
            if fail_fast {
                options.continue_on_error = false;
            }

            let fetcher = if skip_images {
                None
            } else {
                Some(ImageFetcher::new(http))
            };
            let reporter = progress_reporter(progress);

            let result = run_migration(
                &export,
                store.as_ref(),
                fetcher.as_ref(),
                &options,
                reporter.as_ref(),
            )
            .await?;

            // Keep stdout parseable when the JSON report is written there.
            if report.as_deref().is_some_and(is_stdout) {
                result.write_summary(&mut std::io::stderr().lock())?;
            } else {
                result.write_summary(&mut std::io::stdout().lock())?;
            }
            if let Some(report_path) = report {
                result
                    .write_json(&report_path)
                    .with_context(|| format!("failed to write report to {}", report_path.display()))?;
            }
        }

        Commands::Inspect { export } => {
            let cfg = load_config(cli.config.as_ref())?;
            let path = export_path(export, &cfg)?;
            let export = read_export(&path)?;
            let channel = &export.channel;
            let classification = classify(&channel.items);

            println!("export {}", path.display());
            println!("  site:         {}", channel.site_url());
            if let Some(title) = &channel.title {
                println!("  title:        {}", title);
            }
            println!("  authors:      {}", channel.authors.len());
            println!("  categories:   {}", channel.categories.len());
            println!("  tags:         {}", channel.tags.len());
            println!("  items:        {}", channel.items.len());
            println!("  posts:        {} published", classification.posts.len());
            println!(
                "  attachments:  {} mapped, {} skipped",
                classification.attachments.len(),
                classification.attachments_skipped
            );
            if !classification.dropped.is_empty() {
                println!("  not migrated:");
                for (kind, count) in &classification.dropped {
                    println!("    {:<24} {}", kind, count);
                }
            }
        }

        Commands::Convert {
            input,
            schema,
            seed,
        } => {
            let html = if input.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read stdin")?;
                buf
            } else {
                std::fs::read_to_string(&input)
                    .with_context(|| format!("failed to read {}", input.display()))?
            };

            let transcoder = match schema {
                SchemaChoice::Body => Transcoder::post_body(),
                SchemaChoice::Bubble => Transcoder::new(BlockSchema::speech_bubble_text()),
            };
            let nodes = transcoder.convert(&html, &mut KeyGen::new(seed));
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
    }

    Ok(())
}
