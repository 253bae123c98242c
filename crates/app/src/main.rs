use std::fmt;

use cacao_core::model::{CourseId, DashboardTab};
use services::{AppConfigDraft, AppServices, Dashboard, DashboardEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt as log_fmt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    Invalid(cacao_core::Error),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::Invalid(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cacao snapshot [options]   # load the dashboard once and print it as JSON");
    eprintln!("  cacao watch    [options]   # keep polling and print events until Ctrl-C");
    eprintln!("  cacao certificate --course <id> [--out <file>] [options]");
    eprintln!("  cacao sign-out [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --api <url>         backend base URL (default http://localhost:5000/api)");
    eprintln!("  --token <token>     session token; omitted means stored session or guest");
    eprintln!("  --email <email>     learner e-mail (scopes the local cache)");
    eprintln!("  --name <name>       learner display name");
    eprintln!("  --db <sqlite_url>   local cache (default sqlite://cacao-cache.sqlite3?mode=rwc)");
    eprintln!("  --poll-secs <n>     poll interval for watch (default 30)");
    eprintln!("  --tab <tab>         tab to open after loading");
    eprintln!("  --course <id>       course whose certificate to download");
    eprintln!("  --out <file>        where to write the PDF (default certificate-<id>.pdf)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CACAO_API_BASE_URL, CACAO_API_TOKEN, CACAO_USER_EMAIL, CACAO_USER_NAME,");
    eprintln!("  CACAO_USER_ID, CACAO_CACHE_DB, CACAO_POLL_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Snapshot,
    Watch,
    Certificate,
    SignOut,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "snapshot" => Some(Self::Snapshot),
            "watch" => Some(Self::Watch),
            "certificate" => Some(Self::Certificate),
            "sign-out" => Some(Self::SignOut),
            _ => None,
        }
    }
}

struct Args {
    overrides: AppConfigDraft,
    tab: Option<DashboardTab>,
    course: Option<CourseId>,
    out: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut overrides = AppConfigDraft::default();
        let mut tab = None;
        let mut course = None;
        let mut out = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => overrides.api_base_url = Some(require_value(args, "--api")?),
                "--token" => overrides.token = Some(require_value(args, "--token")?),
                "--email" => overrides.email = Some(require_value(args, "--email")?),
                "--name" => overrides.name = Some(require_value(args, "--name")?),
                "--poll-secs" => overrides.poll_secs = Some(require_value(args, "--poll-secs")?),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    overrides.cache_db = Some(normalize_sqlite_url(value));
                }
                "--tab" => {
                    let value = require_value(args, "--tab")?;
                    tab = Some(
                        value
                            .parse::<DashboardTab>()
                            .map_err(|e| ArgsError::Invalid(e.into()))?,
                    );
                }
                "--course" => {
                    let value = require_value(args, "--course")?;
                    course = Some(
                        value
                            .parse::<CourseId>()
                            .map_err(|e| ArgsError::Invalid(e.into()))?,
                    );
                }
                "--out" => out = Some(require_value(args, "--out")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            overrides,
            tab,
            course,
            out,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}?mode=rwc", absolute.display())
}

fn prepare_sqlite_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url.starts_with("sqlite::memory:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn watch(dashboard: &Dashboard) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = dashboard.subscribe();
    let _polling = dashboard.spawn_polling();
    let stop = tokio::signal::ctrl_c();
    tokio::pin!(stop);
    info!(every = ?dashboard.config().poll_interval, "watching for changes, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = &mut stop => {
                info!("stopping");
                return Ok(());
            }
            received = events.recv() => match received {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if event == DashboardEvent::SessionExpired {
                        return Err("session expired, sign in again".into());
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "events dropped"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Snapshot,
        Some("--help" | "-h" | "help") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Snapshot,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = AppConfigDraft::from_env()
        .overlay(parsed.overrides)
        .validate()?;
    prepare_sqlite_dir(&config.cache_db)?;
    let services = AppServices::new(&config).await?;

    if cmd == Command::SignOut {
        services.sign_out().await?;
        return Ok(());
    }

    let dashboard = services.dashboard();
    if cmd == Command::Certificate {
        let course = parsed.course.ok_or(ArgsError::MissingValue { flag: "--course" })?;
        let pdf = dashboard.download_certificate(&course).await?;
        let out = parsed
            .out
            .unwrap_or_else(|| format!("certificate-{course}.pdf"));
        std::fs::write(&out, &pdf)?;
        info!(%course, bytes = pdf.len(), path = %out, "certificate saved");
        return Ok(());
    }

    let mut snapshot = dashboard.load().await?;
    if let Some(tab) = parsed.tab {
        snapshot = dashboard.activate_tab(tab).await?;
    }

    let result = match cmd {
        Command::Snapshot => print_json(&snapshot),
        Command::Watch => {
            print_json(&snapshot)?;
            watch(&dashboard).await
        }
        Command::Certificate | Command::SignOut => Ok(()),
    };
    dashboard.shutdown();
    result
}

#[tokio::main]
async fn main() {
    log_fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
