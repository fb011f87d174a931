use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logship::collector::{self, CollectorConfig, CollectorState};
use logship::journal::UploadJournal;
use logship::models::{EventAction, EventGroup, LogEvent, ResultCode, UploadSummary};
use logship::settings::UploadSettings;
use logship::store::{EventLogStore, LogQueue};
use logship::upload::Uploader;

#[derive(Parser)]
#[command(name = "logship")]
#[command(about = "Records usage events and ships them to a statistics endpoint")]
struct Cli {
    /// Data directory override (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one usage event into the active log
    Record {
        /// Event group id
        #[arg(short, long)]
        group: String,

        /// Version of the group schema
        #[arg(long, default_value = "1")]
        group_version: String,

        /// Event id within the group
        #[arg(short, long)]
        event: String,

        /// Event payload as a JSON object
        #[arg(short, long)]
        data: Option<String>,

        /// How many times the event occurred
        #[arg(long, default_value = "1")]
        count: u32,
    },
    /// Run one upload pass over the pending queue
    Send {
        /// Rotate the active log first so fresh events ship too
        #[arg(long)]
        flush: bool,
    },
    /// Show queue size, device identity and recent upload attempts
    Status {
        /// How many recent attempts to list
        #[arg(long, default_value = "5")]
        attempts: usize,
    },
    /// Run the local statistics collector
    Collector {
        /// Port for the collector API
        #[arg(short, long, default_value = "17020")]
        port: u16,
    },
    /// Run upload passes periodically until interrupted
    Watch {
        /// Seconds between passes
        #[arg(long, default_value = "600")]
        interval_secs: u64,

        /// Rotate the active log before every pass
        #[arg(long)]
        flush: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "logship=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Record {
            group,
            group_version,
            event,
            data,
            count,
        }) => {
            let settings = UploadSettings::from_env();
            let store = open_store(cli.data_dir.as_deref())?;

            let data = match data {
                Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw)? {
                    serde_json::Value::Object(map) => map,
                    _ => anyhow::bail!("--data must be a JSON object"),
                },
                None => serde_json::Map::new(),
            };

            let event = LogEvent::new(
                store.session(),
                &settings.bucket,
                EventGroup::new(group, group_version),
                EventAction {
                    id: event,
                    data,
                    count: count.max(1),
                },
            );
            store.record(&event)?;
            tracing::info!("Recorded {}:{}", event.group.id, event.event.id);
        }
        Some(Commands::Send { flush }) => {
            let summary = run_send(cli.data_dir.as_deref(), flush).await?;
            report(&summary);
        }
        Some(Commands::Status { attempts }) => {
            let store = open_store(cli.data_dir.as_deref())?;
            let journal = open_journal(cli.data_dir.as_deref())?;
            journal.migrate()?;

            println!("Device id:  {}", journal.device_id()?);
            println!("Pending:    {} file(s)", store.pending()?.len());
            match journal.last_sent()? {
                Some(at) => println!("Last sent:  {}", at.to_rfc3339()),
                None => println!("Last sent:  never"),
            }

            let attempts = journal.recent_attempts(attempts)?;
            if !attempts.is_empty() {
                println!("Recent attempts:");
                for attempt in attempts {
                    println!(
                        "  {}  {:18}  {}",
                        attempt.created_at.to_rfc3339(),
                        attempt.code.as_str(),
                        attempt.message
                    );
                }
            }
        }
        Some(Commands::Collector { port }) => {
            tracing::info!("Starting statistics collector on port {}", port);

            let app = collector::create_router_with_config(
                CollectorState::new(),
                CollectorConfig::from_env(),
            );

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!(
                "Collector listening on http://127.0.0.1:{}/api/v1/events",
                port
            );

            axum::serve(listener, app).await?;
        }
        Some(Commands::Watch {
            interval_secs,
            flush,
        }) => {
            let settings = UploadSettings::from_env();
            let store = open_store(cli.data_dir.as_deref())?;
            let journal = open_journal(cli.data_dir.as_deref())?;
            journal.migrate()?;
            let uploader = Uploader::new(settings, store, journal)?;

            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                if flush {
                    uploader.queue().rotate()?;
                }
                let summary = uploader.send().await?;
                tracing::info!("Upload pass {}: {}", summary.code.as_str(), summary.message);
            }
        }
        None => {
            // Default: one upload pass, same as `send`.
            let summary = run_send(cli.data_dir.as_deref(), false).await?;
            report(&summary);
        }
    }

    Ok(())
}

async fn run_send(data_dir: Option<&Path>, flush: bool) -> anyhow::Result<UploadSummary> {
    let store = open_store(data_dir)?;
    if flush {
        store.rotate()?;
    }
    let journal = open_journal(data_dir)?;
    journal.migrate()?;

    let uploader = Uploader::new(UploadSettings::from_env(), store, journal)?;
    Ok(uploader.send().await?)
}

/// Print the pass result; configuration and server refusals exit non-zero.
fn report(summary: &UploadSummary) {
    println!("{}: {}", summary.code.as_str(), summary.message);
    if !matches!(
        summary.code,
        ResultCode::Send | ResultCode::NothingToSend
    ) {
        std::process::exit(1);
    }
}

fn open_store(data_dir: Option<&Path>) -> anyhow::Result<EventLogStore> {
    let store = match data_dir {
        Some(dir) => EventLogStore::open(dir.join("logs"))?,
        None => EventLogStore::open_default()?,
    };
    Ok(store)
}

fn open_journal(data_dir: Option<&Path>) -> anyhow::Result<UploadJournal> {
    match data_dir {
        Some(dir) => UploadJournal::open(dir.join("journal.db")),
        None => UploadJournal::open_default(),
    }
}
