//! One batch run: retrieve, analyze, archive, summarize, render, deliver
//!
//! [`analyze`] is pure and works on already-fetched provider records, so
//! offline dumps go through exactly the same stages as a live run.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::analysis::{
    build_identity_table, gmail_query, important_upcoming, is_marketing, normalize_event,
    normalize_message, Aggregator, EntityExtractor, HeuristicExtractor, ThreadAnalyzer,
    UserIdentity,
};
use crate::archive::write_archive;
use crate::config::Config;
use crate::delivery::{report_subject, Report, ReportSender};
use crate::error::{Error, Result};
use crate::google::{CalendarSource, Fetched, MailSource, RawEvent, RawMessage};
use crate::models::{Event, Message, ThemeRecord};
use crate::report::{
    assemble, highlights, render_html, render_text, DigestPayload, Highlights, ReportLimits,
    ReportView,
};
use crate::summarizer::{digest_or_placeholder, Summarizer};

/// Everything the pure stages need besides the records themselves
#[derive(Debug, Clone)]
pub struct RunContext {
    pub user: UserIdentity,
    pub now: DateTime<Utc>,
    pub window_days: i64,
    pub lookahead_days: i64,
    pub awaiting_grace: Duration,
    pub awaiting_staleness: Duration,
    pub limits: ReportLimits,
    pub theme_keywords: usize,
    window_start: DateTime<Utc>,
    calendar_end: DateTime<Utc>,
}

/// `now` shifted by `days`, or an `InvalidConfig` error naming `field`
fn shift_days(now: DateTime<Utc>, days: i64, field: &str) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| Error::InvalidConfig {
            field: field.to_string(),
            reason: format!("{} days is out of range", days),
        })
}

impl RunContext {
    pub fn from_config(config: &Config, now: DateTime<Utc>) -> Result<Self> {
        let window_days = config.window.days;
        let lookahead_days = config.window.lookahead_days;
        let out_of_range = |field: &str| Error::InvalidConfig {
            field: field.to_string(),
            reason: "out of range".to_string(),
        };
        let awaiting_grace = Duration::try_seconds(config.analysis.awaiting_min_age_secs)
            .ok_or_else(|| out_of_range("analysis.awaiting_min_age_secs"))?;
        let awaiting_staleness = Duration::try_days(config.analysis.awaiting_max_age_days)
            .ok_or_else(|| out_of_range("analysis.awaiting_max_age_days"))?;

        Ok(Self {
            user: UserIdentity::new(
                &config.account.user_address,
                config.account.display_name.as_deref(),
                &config.account.aliases,
            ),
            now,
            window_days,
            lookahead_days,
            awaiting_grace,
            awaiting_staleness,
            limits: ReportLimits::from(&config.analysis),
            theme_keywords: config.analysis.theme_keywords,
            window_start: shift_days(now, window_days.saturating_neg(), "window.days")?,
            calendar_end: shift_days(now, lookahead_days, "window.lookahead_days")?,
        })
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Calendar retrieval also covers the lookahead
    pub fn calendar_end(&self) -> DateTime<Utc> {
        self.calendar_end
    }
}

/// Extractor that ignores the owner's own name and name aliases, so they
/// never rank as themes
pub fn extractor_for(config: &Config) -> HeuristicExtractor {
    let account = &config.account;
    let names: Vec<&str> = account
        .display_name
        .iter()
        .map(String::as_str)
        .chain(
            account
                .aliases
                .iter()
                .map(String::as_str)
                .filter(|a| !a.contains('@')),
        )
        .flat_map(str::split_whitespace)
        .collect();
    HeuristicExtractor::new().with_stop_words(names)
}

/// Record counts for the run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub fetched_messages: usize,
    pub skipped_messages: usize,
    pub fetched_events: usize,
    pub skipped_events: usize,
    pub unparsable_messages: usize,
    pub unparsable_events: usize,
    pub marketing_filtered: usize,
    pub analyzed_messages: usize,
    pub analyzed_events: usize,
}

impl RunCounts {
    fn log(&self) {
        info!(
            "Run summary: {} messages fetched ({} skipped, {} unparsable, {} marketing), {} analyzed; \
             {} events fetched ({} skipped, {} unparsable), {} analyzed",
            self.fetched_messages,
            self.skipped_messages,
            self.unparsable_messages,
            self.marketing_filtered,
            self.analyzed_messages,
            self.fetched_events,
            self.skipped_events,
            self.unparsable_events,
            self.analyzed_events
        );
    }
}

/// Output of the pure stages
#[derive(Debug, Clone)]
pub struct Analysis {
    pub payload: DigestPayload,
    pub themes: Vec<ThemeRecord>,
    pub highlights: Highlights,
    pub counts: RunCounts,
}

fn normalize_all<R, T>(
    raw: &[R],
    kind: &str,
    normalize: impl Fn(&R) -> Result<T>,
) -> (Vec<T>, usize) {
    let mut skipped = 0;
    let records = raw
        .iter()
        .filter_map(|r| match normalize(r) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping {}: {}", kind, e);
                skipped += 1;
                None
            }
        })
        .collect();
    (records, skipped)
}

/// Run every analysis stage over already-retrieved records
pub fn analyze(
    raw_messages: &[RawMessage],
    raw_events: &[RawEvent],
    ctx: &RunContext,
    extractor: &dyn EntityExtractor,
) -> Analysis {
    let mut counts = RunCounts {
        fetched_messages: raw_messages.len(),
        fetched_events: raw_events.len(),
        ..Default::default()
    };

    let (messages, unparsable) = normalize_all(raw_messages, "message", normalize_message);
    counts.unparsable_messages = unparsable;
    let (events, unparsable): (Vec<Event>, usize) =
        normalize_all(raw_events, "event", normalize_event);
    counts.unparsable_events = unparsable;

    let (marketing, messages): (Vec<Message>, Vec<Message>) =
        messages.into_iter().partition(is_marketing);
    counts.marketing_filtered = marketing.len();
    for message in &marketing {
        debug!("Filtered marketing message {} ({})", message.id, message.subject);
    }
    counts.analyzed_messages = messages.len();
    counts.analyzed_events = events.len();

    let identity = build_identity_table(&messages);
    debug!("Identity table has {} names", identity.len());

    let interactions = ThreadAnalyzer::new(ctx.user.primary_address(), ctx.now)
        .with_aliases(ctx.user.addresses().skip(1))
        .with_window(ctx.awaiting_grace, ctx.awaiting_staleness)
        .analyze(&messages);
    debug!(
        "Analyzed {} dated threads, {} awaiting a reply",
        interactions.thread_count(),
        interactions.awaiting_reply().len()
    );

    let aggregates = Aggregator::new(extractor, ctx.user.clone())
        .with_theme_keywords(ctx.theme_keywords)
        .aggregate(&messages, &events, &identity, &interactions);

    let upcoming = important_upcoming(
        &events,
        ctx.user.primary_address(),
        ctx.now,
        ctx.lookahead_days,
    );

    let highlights = highlights(&messages, &aggregates);
    let payload = assemble(
        &messages,
        &events,
        &aggregates,
        &interactions,
        upcoming,
        ctx.limits,
    );

    Analysis {
        payload,
        themes: aggregates.themes,
        highlights,
        counts,
    }
}

/// Decode a JSON array of provider records one item at a time
///
/// Items that do not match the record shape are logged and counted in
/// `skipped`; only a document that is not a JSON array is an error.
pub fn decode_dump<T: DeserializeOwned>(json: &str, kind: &str) -> Result<Fetched<T>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut fetched = Fetched::new(Vec::with_capacity(values.len()));
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(record) => fetched.items.push(record),
            Err(e) => {
                warn!("Skipping malformed {} at index {}: {}", kind, index, e);
                fetched.skipped += 1;
            }
        }
    }
    Ok(fetched)
}

/// [`analyze`] over decoded dumps; undecodable items count as unparsable
pub fn analyze_dump(
    messages: &Fetched<RawMessage>,
    events: &Fetched<RawEvent>,
    ctx: &RunContext,
    extractor: &dyn EntityExtractor,
) -> Analysis {
    let mut analysis = analyze(&messages.items, &events.items, ctx, extractor);
    let counts = &mut analysis.counts;
    counts.fetched_messages += messages.skipped;
    counts.unparsable_messages += messages.skipped;
    counts.fetched_events += events.skipped;
    counts.unparsable_events += events.skipped;
    counts.log();
    analysis
}

/// I/O collaborators for a live run
pub struct Collaborators<'a> {
    pub mail: &'a dyn MailSource,
    pub calendar: &'a dyn CalendarSource,
    pub summarizer: Option<&'a dyn Summarizer>,
    pub sender: Option<&'a dyn ReportSender>,
}

/// Presentation and output settings for a live run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub timezone: Tz,
    pub subject_prefix: String,
    pub archive_dir: Option<PathBuf>,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timezone: config.display_timezone(),
            subject_prefix: config.delivery.subject_prefix.clone(),
            archive_dir: config.archive.enabled.then(|| config.archive_dir()),
        }
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub analysis: Analysis,
    pub report: Report,
    pub archive_path: Option<PathBuf>,
    pub delivered: bool,
}

/// Log why listing stopped the run before handing the error back
fn listing_failed(kind: &str, e: Error) -> Error {
    if e.is_fatal() {
        error!("Could not list {}, aborting run: {}", kind, e);
        if let Some(hint) = e.action_hint() {
            error!("{}", hint);
        }
    } else {
        warn!("Listing {} stopped on a recoverable error: {}", kind, e);
    }
    e
}

/// Full batch run
///
/// Failing to list messages or events aborts before analysis. Summarizer,
/// archive and delivery failures are logged and the run still succeeds.
pub async fn run(
    ctx: &RunContext,
    options: &RunOptions,
    collaborators: Collaborators<'_>,
    extractor: &dyn EntityExtractor,
) -> Result<RunOutcome> {
    let query = gmail_query(ctx.window_start());
    info!(
        "Retrieving {} days of mail and calendar for {}",
        ctx.window_days,
        ctx.user.primary_address()
    );

    let messages = collaborators
        .mail
        .fetch_messages(&query)
        .await
        .map_err(|e| listing_failed("messages", e))?;
    let events = collaborators
        .calendar
        .fetch_events(ctx.window_start(), ctx.calendar_end())
        .await
        .map_err(|e| listing_failed("events", e))?;

    let mut analysis = analyze(&messages.items, &events.items, ctx, extractor);
    analysis.counts.fetched_messages += messages.skipped;
    analysis.counts.skipped_messages = messages.skipped;
    analysis.counts.fetched_events += events.skipped;
    analysis.counts.skipped_events = events.skipped;

    let archive_path = match &options.archive_dir {
        Some(dir) => match write_archive(dir, &analysis.payload, ctx.now) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to archive digest payload: {}", e);
                None
            }
        },
        None => None,
    };

    let digest = digest_or_placeholder(collaborators.summarizer, &analysis.payload).await;

    let html = render_html(&ReportView {
        payload: &analysis.payload,
        themes: &analysis.themes,
        highlights: &analysis.highlights,
        window_start: ctx.window_start(),
        window_end: ctx.now,
        timezone: options.timezone,
        digest: &digest,
    });
    let text = render_text(&html).unwrap_or_else(|e| {
        warn!("{}", e);
        String::new()
    });
    let report = Report {
        subject: report_subject(&options.subject_prefix, ctx.now, options.timezone),
        html,
        text,
    };

    let delivered = match collaborators.sender {
        Some(sender) => match sender.send(&report).await {
            Ok(()) => true,
            Err(e) => {
                error!("Report delivery failed: {}", e);
                false
            }
        },
        None => {
            info!("Delivery disabled, report not sent");
            false
        }
    };

    analysis.counts.log();

    Ok(RunOutcome {
        analysis,
        report,
        archive_path,
        delivered,
    })
}
