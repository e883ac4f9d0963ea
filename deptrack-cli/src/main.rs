use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use deptrack_core::{
    deadline_reminders, time::parse_instant, time::parse_timezone, NotificationRequest,
    ProgressSnapshot, ReminderPolicy, TaskSummary,
};
use deptrack_report::{load_branding, render_request, RenderContext};
use deptrack_stream::{ConnectionState, HttpTransport, StreamClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod state;

#[derive(Parser, Debug)]
#[command(
    name = "deptrack",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("DEPTRACK_BUILD_SHA"), ")"),
    about = "Task notifications, progress reports and the realtime stream"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate a JSON list of tasks into progress counters
    Stats {
        #[arg(long)]
        tasks: PathBuf,

        /// Evaluation instant (RFC 3339 or "YYYY-MM-DD HH:MM" in the report timezone)
        #[arg(long)]
        now: Option<String>,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a notification request into a .docx report
    Render {
        #[arg(long)]
        request: PathBuf,

        /// Output path (default: <kind>_<date>.docx in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Branding image; overrides report.branding_image
        #[arg(long)]
        branding: Option<PathBuf>,

        #[arg(long)]
        now: Option<String>,

        /// IANA timezone; overrides report.timezone
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Project deadline and overdue reminders for one owner
    Remind {
        #[arg(long)]
        tasks: PathBuf,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        now: Option<String>,

        /// Look-ahead window in hours (default: 24)
        #[arg(long, default_value_t = 24)]
        lead_hours: i64,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Connect to the notification stream and print notifications until Ctrl-C
    Listen {
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        token: Option<String>,
    },

    /// Manage ~/.deptrack/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config (token masked)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Stats { tasks, now, json } => {
            let now = resolve_now(now.as_deref(), &cfg.report.timezone)?;
            let tasks: Vec<TaskSummary> = state::read_json(&tasks)?;
            let stats = ProgressSnapshot::from_tasks(&tasks).stats(now);

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Total tasks:     {}", stats.total);
                println!("Completed:       {}", stats.completed);
                println!("Pending:         {}", stats.pending);
                println!("Blocked:         {}", stats.blockers);
                println!("Completion rate: {}%", stats.completion_rate);
                println!("Overdue:         {}", stats.overdue_count);
                println!("Carried over:    {}", stats.carried_over_count);
            }
        }

        Command::Render {
            request,
            out,
            branding,
            now,
            timezone,
        } => {
            let tz_name = timezone.unwrap_or_else(|| cfg.report.timezone.clone());
            let tz = parse_timezone(&tz_name)?;
            let now = resolve_now(now.as_deref(), &tz_name)?;
            let req: NotificationRequest = state::read_json(&request)?;
            let kind = req.kind;

            let logo = branding
                .or_else(|| cfg.report.branding_image.clone())
                .and_then(|p| load_branding(&p));

            let doc = render_request(req, logo.as_deref(), &RenderContext::new(now, tz))
                .with_context(|| format!("render {}", request.display()))?;
            let out = out.unwrap_or_else(|| PathBuf::from(&doc.file_name));
            state::write_bytes(&out, &doc.bytes)?;

            info!(%kind, bytes = doc.bytes.len(), "report rendered");
            println!("Wrote {} ({} bytes)", out.display(), doc.bytes.len());
        }

        Command::Remind {
            tasks,
            owner,
            now,
            lead_hours,
            limit,
        } => {
            let now = resolve_now(now.as_deref(), &cfg.report.timezone)?;
            let tasks: Vec<TaskSummary> = state::read_json(&tasks)?;
            let policy = ReminderPolicy {
                lead_hours,
                max_per_run: limit,
            };
            for record in deadline_reminders(&tasks, &owner, now, policy) {
                println!("{}", serde_json::to_string(&record)?);
            }
        }

        Command::Listen { url, token } => {
            let mut section = cfg.stream.clone();
            if let Some(url) = url {
                section.url = url;
            }
            if token.is_some() {
                section.token = token;
            }
            listen(section).await?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}

fn resolve_now(now: Option<&str>, tz: &str) -> Result<DateTime<Utc>> {
    match now {
        Some(s) => parse_instant(s, tz).with_context(|| format!("parse --now {s:?}")),
        None => Ok(Utc::now()),
    }
}

async fn listen(section: config::StreamSection) -> Result<()> {
    if section.token.is_none() {
        warn!("no stream token configured (pass --token or set stream.token); nothing to do");
        return Ok(());
    }

    let transport = Arc::new(HttpTransport::new(Duration::from_secs(10)));
    let client = StreamClient::spawn(section.to_stream_config(), transport);
    let mut inbox = client.subscribe();
    let mut status = client.watch_status();

    client.connect();
    println!("Listening on {} (Ctrl-C to stop)", section.url);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                client.disconnect();
                println!("Disconnected.");
                break;
            }
            received = inbox.recv() => match received {
                Ok(n) => println!(
                    "[{}] {} | {}{}",
                    n.created_at.format("%Y-%m-%d %H:%M:%S"),
                    n.kind.title(),
                    n.message,
                    n.task_id.map(|t| format!(" (task {t})")).unwrap_or_default()
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "listener fell behind; notifications dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let s = status.borrow_and_update().clone();
                if s.state == ConnectionState::Disconnected {
                    if let Some(err) = s.connection_error {
                        anyhow::bail!("{err}");
                    }
                }
            }
        }
    }

    Ok(())
}
