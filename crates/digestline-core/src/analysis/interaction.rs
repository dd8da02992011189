//! Thread interaction analysis
//!
//! Rebuilds turn-taking from an unordered bag of messages: who wrote to
//! whom, how long the user took to answer each counterparty, and which
//! threads are still waiting on the user.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::{AwaitingReplyRecord, Message};

use super::identity::normalize_address;
use super::OrderedCounter;

/// Message direction relative to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by the user
    Outbound,
    /// Sent to the user (to or cc) by someone else
    Inbound,
    /// Neither, e.g. a list message or a bcc the user was not named on
    Unrelated,
}

#[derive(Debug, Clone, Copy, Default)]
struct LatencyTotals {
    total_secs: i64,
    samples: i64,
}

/// Per-counterparty results across all threads
#[derive(Debug, Clone, Default)]
pub struct InteractionAnalysis {
    exchanges: OrderedCounter,
    latency_index: HashMap<String, usize>,
    latencies: Vec<(String, LatencyTotals)>,
    samples: Vec<(String, i64)>,
    awaiting: Vec<AwaitingReplyRecord>,
    threads: usize,
}

impl InteractionAnalysis {
    /// (address, messages exchanged) in first-seen order
    pub fn exchanges(&self) -> impl Iterator<Item = (&str, u32)> {
        self.exchanges.iter()
    }

    pub fn exchanged_with(&self, address: &str) -> u32 {
        self.exchanges.get(address)
    }

    /// Every (address, seconds) sample in the order it was recorded
    pub fn response_samples(&self) -> &[(String, i64)] {
        &self.samples
    }

    /// Mean latency of the user's replies to `address`, in whole seconds
    pub fn average_response_secs(&self, address: &str) -> Option<i64> {
        let i = *self.latency_index.get(address)?;
        let totals = self.latencies[i].1;
        (totals.samples > 0).then(|| totals.total_secs / totals.samples)
    }

    /// [`Self::average_response_secs`] as a human-readable magnitude
    pub fn average_response_time(&self, address: &str) -> Option<String> {
        self.average_response_secs(address).map(humanize_duration)
    }

    pub fn awaiting_reply(&self) -> &[AwaitingReplyRecord] {
        &self.awaiting
    }

    /// Threads that had at least one dated message
    pub fn thread_count(&self) -> usize {
        self.threads
    }

    fn record_sample(&mut self, address: &str, secs: i64) {
        let i = match self.latency_index.get(address) {
            Some(&i) => i,
            None => {
                self.latency_index
                    .insert(address.to_string(), self.latencies.len());
                self.latencies
                    .push((address.to_string(), LatencyTotals::default()));
                self.latencies.len() - 1
            }
        };
        self.latencies[i].1.total_secs += secs;
        self.latencies[i].1.samples += 1;
        self.samples.push((address.to_string(), secs));
    }
}

/// The latest inbound message the user has not answered yet
struct PendingInbound<'a> {
    sender: &'a str,
    at: DateTime<Utc>,
    subject: &'a str,
}

/// Walks each thread in time order on behalf of one user
#[derive(Debug, Clone)]
pub struct ThreadAnalyzer {
    user_addresses: Vec<String>,
    now: DateTime<Utc>,
    grace: Duration,
    staleness: Duration,
}

impl ThreadAnalyzer {
    /// Defaults to a 1 hour grace period and a 14 day staleness bound
    pub fn new(user_address: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_addresses: vec![normalize_address(user_address)],
            now,
            grace: Duration::hours(1),
            staleness: Duration::days(14),
        }
    }

    /// Additional addresses that also count as the user
    pub fn with_aliases<'a>(mut self, aliases: impl IntoIterator<Item = &'a str>) -> Self {
        self.user_addresses.extend(
            aliases
                .into_iter()
                .filter(|a| a.contains('@'))
                .map(normalize_address),
        );
        self
    }

    pub fn with_window(mut self, grace: Duration, staleness: Duration) -> Self {
        self.grace = grace;
        self.staleness = staleness;
        self
    }

    fn is_user(&self, address: &str) -> bool {
        self.user_addresses
            .iter()
            .any(|u| u.eq_ignore_ascii_case(address))
    }

    /// Outbound is checked first, so a self-cc'd message is outbound
    pub fn direction(&self, message: &Message) -> Direction {
        if self.is_user(&message.sender.email) {
            Direction::Outbound
        } else if message.recipients().any(|r| self.is_user(&r.email)) {
            Direction::Inbound
        } else {
            Direction::Unrelated
        }
    }

    /// Analyze every thread in `messages`
    ///
    /// Messages without a timestamp take no part in ordering, exchange
    /// counts or latency.
    pub fn analyze(&self, messages: &[Message]) -> InteractionAnalysis {
        let mut order: Vec<&str> = Vec::new();
        let mut threads: HashMap<&str, Vec<&Message>> = HashMap::new();
        for message in messages.iter().filter(|m| m.sent_at.is_some()) {
            threads
                .entry(message.thread_id.as_str())
                .or_insert_with(|| {
                    order.push(message.thread_id.as_str());
                    Vec::new()
                })
                .push(message);
        }

        let mut out = InteractionAnalysis::default();
        for thread_id in order {
            if let Some(mut thread) = threads.remove(thread_id) {
                thread.sort_by_key(|m| m.sent_at);
                self.walk_thread(&thread, &mut out);
                out.threads += 1;
            }
        }

        // Longest-waiting first
        out.awaiting.sort_by_key(|a| a.received_at);
        out
    }

    fn walk_thread<'a>(&self, thread: &[&'a Message], out: &mut InteractionAnalysis) {
        let mut pending: Option<PendingInbound<'a>> = None;

        for &message in thread {
            let Some(at) = message.sent_at else {
                continue;
            };

            match self.direction(message) {
                Direction::Outbound => {
                    let mut counted: Vec<&str> = Vec::new();
                    for recipient in message.recipients() {
                        let address = recipient.email.as_str();
                        if self.is_user(address) || counted.contains(&address) {
                            continue;
                        }
                        counted.push(address);
                        out.exchanges.incr(address);
                    }

                    if let Some(inbound) = pending.take() {
                        if at > inbound.at {
                            out.record_sample(inbound.sender, (at - inbound.at).num_seconds());
                        }
                    }
                }
                Direction::Inbound => {
                    out.exchanges.incr(&message.sender.email);
                    pending = Some(PendingInbound {
                        sender: &message.sender.email,
                        at,
                        subject: &message.subject,
                    });
                }
                Direction::Unrelated => {}
            }
        }

        if let Some(inbound) = pending {
            let age = self.now - inbound.at;
            if age > self.grace && age < self.staleness {
                out.awaiting.push(AwaitingReplyRecord {
                    subject: inbound.subject.to_string(),
                    sender: inbound.sender.to_string(),
                    received_at: inbound.at,
                });
            }
        }
    }
}

/// Render a duration with a unit picked from its magnitude
///
/// Up to a minute is shown in seconds, up to an hour in minutes, up to a
/// day in hours, and anything longer in whole days.
pub fn humanize_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let (value, unit) = if secs <= 60 {
        (secs, "second")
    } else if secs <= 3_600 {
        (secs / 60, "minute")
    } else if secs <= 86_400 {
        (secs / 3_600, "hour")
    } else {
        (secs / 86_400, "day")
    };

    if value == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use chrono::TimeZone;

    const ME: &str = "me@corp.com";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn msg(
        id: &str,
        thread: &str,
        from: &str,
        to: &[&str],
        cc: &[&str],
        at: Option<DateTime<Utc>>,
    ) -> Message {
        Message {
            id: id.to_string(),
            thread_id: thread.to_string(),
            subject: format!("subject {}", thread),
            sender: Address::new(from),
            to: to.iter().map(|a| Address::new(*a)).collect(),
            cc: cc.iter().map(|a| Address::new(*a)).collect(),
            sent_at: at,
            body: String::new(),
            has_attachments: false,
        }
    }

    fn analyzer() -> ThreadAnalyzer {
        ThreadAnalyzer::new(ME, t0() + Duration::days(3))
    }

    #[test]
    fn test_outbound_only_thread_yields_nothing() {
        let messages = vec![
            msg("1", "t", ME, &["a@x.com"], &[], Some(t0())),
            msg("2", "t", ME, &["a@x.com", "b@x.com"], &[], Some(t0() + Duration::hours(1))),
        ];
        let analysis = analyzer().analyze(&messages);
        assert!(analysis.response_samples().is_empty());
        assert!(analysis.awaiting_reply().is_empty());
        assert_eq!(analysis.exchanged_with("a@x.com"), 2);
        assert_eq!(analysis.exchanged_with("b@x.com"), 1);
    }

    #[test]
    fn test_single_reply_records_exact_latency() {
        // Out of order on purpose
        let messages = vec![
            msg("2", "t", ME, &["bob@x.com"], &[], Some(t0() + Duration::seconds(3600))),
            msg("1", "t", "bob@x.com", &[ME], &[], Some(t0())),
        ];
        let analysis = analyzer().analyze(&messages);
        assert_eq!(
            analysis.response_samples(),
            &[("bob@x.com".to_string(), 3600)]
        );
        assert_eq!(analysis.average_response_secs("bob@x.com"), Some(3600));
        assert_eq!(
            analysis.average_response_time("bob@x.com").as_deref(),
            Some("60 minutes")
        );
        assert!(analysis.awaiting_reply().is_empty());
        assert_eq!(analysis.exchanged_with("bob@x.com"), 2);
    }

    #[test]
    fn test_self_cc_is_outbound() {
        let a = analyzer();
        let self_cc = msg("1", "t", ME, &["bob@x.com"], &[ME], Some(t0()));
        assert_eq!(a.direction(&self_cc), Direction::Outbound);

        let analysis = a.analyze(&[self_cc]);
        assert!(analysis.awaiting_reply().is_empty());
        assert_eq!(analysis.exchanged_with(ME), 0);
    }

    #[test]
    fn test_cc_counts_as_inbound() {
        let cc_only = msg("1", "t", "bob@x.com", &["carol@x.com"], &["Me@Corp.com"], Some(t0()));
        assert_eq!(analyzer().direction(&cc_only), Direction::Inbound);
        let list = msg("2", "t", "bob@x.com", &["team@x.com"], &[], Some(t0()));
        assert_eq!(analyzer().direction(&list), Direction::Unrelated);
    }

    #[test]
    fn test_staleness_window() {
        let now = t0();
        let a = ThreadAnalyzer::new(ME, now);
        let messages = vec![
            msg("1", "fresh", "a@x.com", &[ME], &[], Some(now - Duration::minutes(30))),
            msg("2", "due", "b@x.com", &[ME], &[], Some(now - Duration::days(2))),
            msg("3", "stale", "c@x.com", &[ME], &[], Some(now - Duration::days(20))),
        ];
        let awaiting = a.analyze(&messages).awaiting_reply().to_vec();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].sender, "b@x.com");
        assert_eq!(awaiting[0].subject, "subject due");
        assert_eq!(awaiting[0].received_at, now - Duration::days(2));
    }

    #[test]
    fn test_only_latest_unanswered_inbound_is_tracked() {
        let messages = vec![
            msg("1", "t", "a@x.com", &[ME], &[], Some(t0())),
            msg("2", "t", "b@x.com", &[ME], &[], Some(t0() + Duration::minutes(10))),
        ];
        let awaiting = analyzer().analyze(&messages).awaiting_reply().to_vec();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].sender, "b@x.com");

        let mut replied = messages.clone();
        replied.push(msg("3", "t", ME, &["a@x.com", "b@x.com"], &[], Some(t0() + Duration::minutes(15))));
        let analysis = analyzer().analyze(&replied);
        assert_eq!(analysis.response_samples(), &[("b@x.com".to_string(), 300)]);
        assert!(analysis.average_response_secs("a@x.com").is_none());
    }

    #[test]
    fn test_simultaneous_reply_clears_without_sample() {
        let messages = vec![
            msg("1", "t", "a@x.com", &[ME], &[], Some(t0())),
            msg("2", "t", ME, &["a@x.com"], &[], Some(t0())),
        ];
        let analysis = analyzer().analyze(&messages);
        assert!(analysis.response_samples().is_empty());
        assert!(analysis.awaiting_reply().is_empty());
    }

    #[test]
    fn test_undated_messages_are_excluded() {
        let messages = vec![
            msg("1", "t", "a@x.com", &[ME], &[], None),
            msg("2", "u", "b@x.com", &[ME], &[], Some(t0())),
        ];
        let analysis = analyzer().analyze(&messages);
        assert_eq!(analysis.exchanged_with("a@x.com"), 0);
        assert_eq!(analysis.exchanged_with("b@x.com"), 1);
        assert_eq!(analysis.thread_count(), 1);
    }

    #[test]
    fn test_latency_averages_across_threads() {
        let messages = vec![
            msg("1", "t1", "a@x.com", &[ME], &[], Some(t0())),
            msg("2", "t1", ME, &["a@x.com"], &[], Some(t0() + Duration::hours(1))),
            msg("3", "t2", "a@x.com", &[ME], &[], Some(t0())),
            msg("4", "t2", ME, &["a@x.com"], &[], Some(t0() + Duration::hours(3))),
        ];
        let analysis = analyzer().analyze(&messages);
        assert_eq!(analysis.average_response_secs("a@x.com"), Some(7200));
        assert_eq!(analysis.average_response_time("a@x.com").as_deref(), Some("2 hours"));
        assert_eq!(analysis.average_response_secs("b@x.com"), None);
    }

    #[test]
    fn test_aliases_count_as_user() {
        let a = analyzer().with_aliases(["me@personal.com", "Me Myself"]);
        let m = msg("1", "t", "me@personal.com", &["a@x.com"], &[], Some(t0()));
        assert_eq!(a.direction(&m), Direction::Outbound);
    }

    #[test]
    fn test_humanize_duration() {
        assert_eq!(humanize_duration(0), "0 seconds");
        assert_eq!(humanize_duration(1), "1 second");
        assert_eq!(humanize_duration(60), "60 seconds");
        assert_eq!(humanize_duration(61), "1 minute");
        assert_eq!(humanize_duration(3600), "60 minutes");
        assert_eq!(humanize_duration(3601), "1 hour");
        assert_eq!(humanize_duration(86_400), "24 hours");
        assert_eq!(humanize_duration(126_483), "1 day");
        assert_eq!(humanize_duration(3 * 86_400 + 5), "3 days");
    }
}
