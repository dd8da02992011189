//! Digestline CLI
//!
//! Authenticates against Google, runs the weekly digest, and replays the
//! analysis offline over dumped provider records.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use digestline_core::config::Config;
use digestline_core::delivery::{GmailReportSender, ReportSender};
use digestline_core::google::{
    CalendarClient, Fetched, GlobalRateLimiter, GmailClient, GoogleApi, RawEvent, RawMessage,
};
use digestline_core::oauth::{parse_callback, OAuthManager, CALLBACK_PORT};
use digestline_core::pipeline::{self, Collaborators, RunContext, RunOptions};
use digestline_core::summarizer::{GeminiSummarizer, Summarizer};
use digestline_core::token_provider::create_token_provider;

#[derive(Parser)]
#[command(name = "digestline")]
#[command(about = "Digestline - weekly relationship and activity brief from Gmail and Google Calendar")]
#[command(long_about = "Digestline reads a recent window of Gmail and Google Calendar, filters out \
promotional mail, works out who you talk to, how fast you answer, what is waiting on you and what \
is coming up, and mails you an HTML brief.

QUICK START:
  1. Authenticate:     digestline auth
  2. Preview a brief:  digestline run --no-send --out brief.html
  3. Send it:          digestline run

Configuration lives in ~/.config/digestline/config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/digestline/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize Digestline to read mail and calendar and send the brief.
    Auth,
    /// Remove stored tokens for the configured account.
    Logout,
    /// Retrieve, analyze, and deliver the brief.
    Run {
        /// Days of history to analyze (overrides window.days)
        #[arg(long)]
        days: Option<i64>,

        /// Build the report but do not mail it
        #[arg(long)]
        no_send: bool,

        /// Skip the language-model digest
        #[arg(long)]
        no_llm: bool,

        /// Also write the HTML report to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyze dumped Gmail/Calendar API records without network access and print the payload as JSON.
    Analyze {
        /// JSON array of Gmail `messages.get?format=full` responses
        #[arg(long)]
        messages: PathBuf,

        /// JSON array of Calendar event resources
        #[arg(long)]
        events: Option<PathBuf>,

        /// Reference time (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("Warning: could not load config ({}), using defaults", e);
        Config::default()
    })
}

/// stderr plus a daily-rotated file next to `general.log_file`
fn init_logging(config: &Config) -> Result<()> {
    let log_file = &config.general.log_file;
    let log_dir = log_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.general.data_dir.join("logs"));
    std::fs::create_dir_all(&log_dir)?;
    let file_name = log_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "digestline.log".to_string());

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, file_name);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_ansi(false)
        .with_target(false);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level))
    };

    tracing_subscriber::registry()
        .with(file_layer.with_filter(filter()))
        .with(stderr_layer.with_filter(filter()))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    init_logging(&config)?;

    let result = match cli.command {
        Commands::Auth => handle_auth(config, cli.config.as_deref()).await,
        Commands::Logout => handle_logout(&config).await,
        Commands::Run {
            days,
            no_send,
            no_llm,
            out,
        } => handle_run(config, days, no_send, no_llm, out).await,
        Commands::Analyze {
            messages,
            events,
            now,
        } => handle_analyze(&config, &messages, events.as_deref(), now.as_deref()),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
        if let Some(hint) = e
            .downcast_ref::<digestline_core::Error>()
            .and_then(|e| e.action_hint())
        {
            eprintln!("Hint: {}", hint);
        }
    }
    result
}

// ============================================================================
// Auth
// ============================================================================

async fn handle_auth(mut config: Config, config_path: Option<&Path>) -> Result<()> {
    let oauth = OAuthManager::new(create_token_provider(&config));

    let state = format!("digestline_{}", uuid::Uuid::new_v4());
    let auth_url = oauth.authorization_url(&state);

    println!("\nOpening browser for Google authentication...\n");
    println!("If the browser doesn't open, visit this URL manually:");
    println!("{}\n", auth_url);

    if let Err(e) = open::that(&auth_url) {
        warn!("Failed to open browser: {}", e);
    }

    let listener = TcpListener::bind(("127.0.0.1", CALLBACK_PORT))
        .await
        .with_context(|| format!("could not listen on port {}", CALLBACK_PORT))?;
    println!(
        "Waiting for authentication callback on http://localhost:{} ...\n",
        CALLBACK_PORT
    );

    let (mut socket, _) = listener.accept().await?;
    let mut request_line = String::new();
    BufReader::new(&mut socket).read_line(&mut request_line).await?;

    let code = match parse_callback(&request_line, &state) {
        Ok(code) => code,
        Err(e) => {
            let response = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
                            <h1>Authentication failed</h1><p>Return to the terminal for details.</p>";
            socket.write_all(response.as_bytes()).await?;
            return Err(e.into());
        }
    };

    let success = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
                   <!DOCTYPE html><html><head><title>Digestline</title></head>\
                   <body style=\"font-family: sans-serif; padding: 40px; text-align: center;\">\
                   <h1>Authentication successful</h1>\
                   <p>You can close this window and return to the terminal.</p></body></html>";
    socket.write_all(success.as_bytes()).await?;
    drop(socket);

    println!("Received authorization code, exchanging for tokens...\n");
    let (tokens, user_info) = oauth.exchange_code(&code).await?;
    oauth
        .token_provider()
        .store_tokens(&user_info.email, &tokens)
        .await?;
    info!("Stored tokens for {}", user_info.email);

    if config.account.user_address.is_empty() {
        config.account.user_address = user_info.email.clone();
        if config.account.display_name.is_none() {
            config.account.display_name = user_info.name.clone();
        }
        match config_path {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        println!("Saved {} as the account owner in the config", user_info.email);
    } else if !config.account.user_address.eq_ignore_ascii_case(&user_info.email) {
        warn!(
            "Authenticated as {} but the config names {}",
            user_info.email, config.account.user_address
        );
    }

    println!("\nAuthenticated as {}. Run `digestline run` to build a brief.", user_info.email);
    Ok(())
}

async fn handle_logout(config: &Config) -> Result<()> {
    let provider = create_token_provider(config);
    let account = &config.account.user_address;
    if !provider.has_tokens(account).await? {
        println!("No stored tokens for {}", account);
        return Ok(());
    }
    provider.delete_tokens(account).await?;
    println!("Removed stored tokens for {}", account);
    Ok(())
}

// ============================================================================
// Run
// ============================================================================

async fn handle_run(
    mut config: Config,
    days: Option<i64>,
    no_send: bool,
    no_llm: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    if let Some(days) = days {
        config.window.days = days;
    }
    config.validate()?;

    let account = config.account.user_address.clone();
    let oauth = Arc::new(OAuthManager::new(create_token_provider(&config)));
    let rate_limiter = GlobalRateLimiter::new(config.retrieval.rate_limit_per_second);
    let api = GoogleApi::new(&account, oauth, rate_limiter);

    let mail = GmailClient::new(api.clone(), &config.window, &config.retrieval);
    let calendar = CalendarClient::new(api.clone(), &config.retrieval);

    let summarizer = if config.summarizer.enabled && !no_llm {
        match GeminiSummarizer::from_config(&config.summarizer) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Summarizer unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let sender = (config.delivery.enabled && !no_send).then(|| {
        GmailReportSender::new(
            GmailClient::new(api, &config.window, &config.retrieval),
            &config.delivery.sender_name,
            &account,
            config.report_recipient(),
        )
    });

    let ctx = RunContext::from_config(&config, Utc::now())?;
    let options = RunOptions::from_config(&config);
    let extractor = pipeline::extractor_for(&config);

    let outcome = pipeline::run(
        &ctx,
        &options,
        Collaborators {
            mail: &mail,
            calendar: &calendar,
            summarizer: summarizer.as_ref().map(|s| s as &dyn Summarizer),
            sender: sender.as_ref().map(|s| s as &dyn ReportSender),
        },
        &extractor,
    )
    .await?;

    if let Some(path) = out {
        std::fs::write(&path, &outcome.report.html)
            .with_context(|| format!("could not write {}", path.display()))?;
        println!("Wrote report to {}", path.display());
    }
    if let Some(path) = &outcome.archive_path {
        println!("Archived payload to {}", path.display());
    }

    let counts = outcome.analysis.counts;
    println!(
        "Analyzed {} messages ({} marketing filtered, {} skipped) and {} events",
        counts.analyzed_messages,
        counts.marketing_filtered,
        counts.skipped_messages + counts.unparsable_messages,
        counts.analyzed_events
    );
    if outcome.delivered {
        println!("Sent \"{}\" to {}", outcome.report.subject, config.report_recipient());
    }
    Ok(())
}

// ============================================================================
// Offline analysis
// ============================================================================

fn read_records<T: serde::de::DeserializeOwned>(path: &Path, kind: &str) -> Result<Fetched<T>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    pipeline::decode_dump(&contents, kind)
        .with_context(|| format!("could not parse {}", path.display()))
}

fn handle_analyze(
    config: &Config,
    messages: &Path,
    events: Option<&Path>,
    now: Option<&str>,
) -> Result<()> {
    config.validate()?;

    let now = match now {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --now value '{}'", s))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let raw_messages: Fetched<RawMessage> = read_records(messages, "message")?;
    let raw_events: Fetched<RawEvent> = match events {
        Some(path) => read_records(path, "event")?,
        None => Fetched::new(Vec::new()),
    };

    let ctx = RunContext::from_config(config, now)?;
    let analysis =
        pipeline::analyze_dump(&raw_messages, &raw_events, &ctx, &pipeline::extractor_for(config));
    info!(
        "Offline analysis of {} messages and {} events complete ({} unreadable records)",
        analysis.counts.analyzed_messages,
        analysis.counts.analyzed_events,
        analysis.counts.unparsable_messages + analysis.counts.unparsable_events
    );

    println!("{}", serde_json::to_string_pretty(&analysis.payload)?);
    Ok(())
}
