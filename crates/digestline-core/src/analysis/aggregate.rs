//! Cross-thread and cross-event rollups
//!
//! Contacts are keyed by address wherever one can be found. Names are
//! resolved through the identity table; names that resolve nowhere keep
//! their own row.

use std::collections::HashMap;

use crate::models::{Event, InteractionRecord, Message, ThemeRecord};

use super::extract::EntityExtractor;
use super::identity::{normalize_address, IdentityTable};
use super::interaction::InteractionAnalysis;
use super::marketing::is_bulk_sender;
use super::OrderedCounter;

/// Everything that identifies the mailbox owner
#[derive(Debug, Clone, Default)]
pub struct UserIdentity {
    addresses: Vec<String>,
    names: Vec<String>,
}

impl UserIdentity {
    /// `aliases` may mix extra addresses and extra display names
    pub fn new(address: &str, display_name: Option<&str>, aliases: &[String]) -> Self {
        let mut identity = Self {
            addresses: vec![normalize_address(address)],
            names: Vec::new(),
        };
        if let Some(name) = display_name {
            identity.names.push(name.trim().to_lowercase());
        }
        for alias in aliases {
            if alias.contains('@') {
                identity.addresses.push(normalize_address(alias));
            } else {
                identity.names.push(alias.trim().to_lowercase());
            }
        }
        identity
    }

    pub fn primary_address(&self) -> &str {
        &self.addresses[0]
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    pub fn is_self_address(&self, address: &str) -> bool {
        let address = normalize_address(address);
        self.addresses.iter().any(|a| *a == address)
    }

    /// True for any of the user's names or addresses
    pub fn is_self(&self, name_or_address: &str) -> bool {
        let needle = name_or_address.trim().to_lowercase();
        self.is_self_address(&needle) || self.names.iter().any(|n| *n == needle)
    }
}

/// Ranked outputs of the aggregation pass; nothing is truncated here
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub contacts: Vec<InteractionRecord>,
    pub organizations: Vec<(String, u32)>,
    pub themes: Vec<ThemeRecord>,
}

/// Insertion-ordered contact rows
#[derive(Default)]
struct ContactTable {
    index: HashMap<String, usize>,
    rows: Vec<InteractionRecord>,
}

impl ContactTable {
    fn entry(&mut self, key: &str) -> &mut InteractionRecord {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.index.insert(key.to_string(), self.rows.len());
                self.rows.push(InteractionRecord {
                    contact: key.to_string(),
                    ..Default::default()
                });
                self.rows.len() - 1
            }
        };
        &mut self.rows[i]
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// (mentions, exchanged) descending; the sort is stable so rows keep
    /// insertion order on ties
    fn into_ranked(self) -> Vec<InteractionRecord> {
        let mut rows = self.rows;
        rows.sort_by(|a, b| {
            (b.mention_count, b.exchanged_count).cmp(&(a.mention_count, a.exchanged_count))
        });
        rows
    }
}

/// Rolls messages, events and interaction results up into ranked tables
pub struct Aggregator<'a> {
    extractor: &'a dyn EntityExtractor,
    user: UserIdentity,
    theme_keywords: usize,
}

impl<'a> Aggregator<'a> {
    pub fn new(extractor: &'a dyn EntityExtractor, user: UserIdentity) -> Self {
        Self {
            extractor,
            user,
            theme_keywords: 20,
        }
    }

    pub fn with_theme_keywords(mut self, n: usize) -> Self {
        self.theme_keywords = n;
        self
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn aggregate(
        &self,
        messages: &[Message],
        events: &[Event],
        identity: &IdentityTable,
        interactions: &InteractionAnalysis,
    ) -> Aggregates {
        // Name mentions resolve through the identity table; calendar
        // participants already carry their address.
        let mut name_mentions = OrderedCounter::new();
        let mut participant_mentions = OrderedCounter::new();
        let mut participant_names: HashMap<String, String> = HashMap::new();
        let mut organizations = OrderedCounter::new();
        let mut theme_text = String::new();

        for message in messages {
            if let Some(name) = &message.sender.name {
                if !is_bulk_sender(&message.sender.email) {
                    name_mentions.incr(name);
                }
            }
            let entities = self.extractor.entities(&message.body);
            entities.people.iter().for_each(|p| name_mentions.incr(p));
            entities.organizations.iter().for_each(|o| organizations.incr(o));

            theme_text.push_str(&message.searchable_text());
            theme_text.push(' ');
        }

        for event in events {
            for person in event.organizer.iter().chain(event.attendees.iter()) {
                participant_mentions.incr(&person.email);
                if let Some(name) = &person.name {
                    participant_names
                        .entry(person.email.clone())
                        .or_insert_with(|| name.clone());
                }
            }

            let text = event.searchable_text();
            let entities = self.extractor.entities(&text);
            entities.people.iter().for_each(|p| name_mentions.incr(p));
            entities.organizations.iter().for_each(|o| organizations.incr(o));

            theme_text.push_str(&text);
            theme_text.push(' ');
        }

        let mut table = ContactTable::default();

        // Direct exchanges first, keyed by address
        for (address, count) in interactions.exchanges() {
            if self.user.is_self_address(address) {
                continue;
            }
            let row = table.entry(address);
            row.exchanged_count = count;
            row.average_response_secs = interactions.average_response_secs(address);
            row.display_name = identity.name_for(address).map(String::from);
        }

        for (name, count) in name_mentions.iter() {
            if self.user.is_self(name) {
                continue;
            }
            let resolved = identity
                .resolve(name)
                .map(String::from)
                .or_else(|| name.contains('@').then(|| normalize_address(name)));

            match resolved {
                Some(address) if self.user.is_self_address(&address) => {}
                Some(address) => {
                    let row = table.entry(&address);
                    row.mention_count += count;
                    if row.display_name.is_none() && !name.contains('@') {
                        row.display_name = Some(name.to_string());
                    }
                }
                None => {
                    // A bare name can only merge with an earlier row of the same name
                    let row = table.entry(name);
                    row.mention_count += count;
                    if row.display_name.is_none() {
                        row.display_name = Some(name.to_string());
                    }
                }
            }
        }

        for (address, count) in participant_mentions.iter() {
            if self.user.is_self_address(address) {
                continue;
            }
            let known = table.contains(address);
            let row = table.entry(address);
            row.mention_count += count;
            if row.display_name.is_none() {
                row.display_name = participant_names
                    .get(address)
                    .cloned()
                    .or_else(|| identity.name_for(address).map(String::from));
            }
            if !known && row.average_response_secs.is_none() {
                row.average_response_secs = interactions.average_response_secs(address);
            }
        }

        let themes = self
            .extractor
            .keywords(&theme_text, self.theme_keywords)
            .into_iter()
            .enumerate()
            .map(|(i, (keyword, frequency))| ThemeRecord {
                keyword,
                frequency,
                rank: i + 1,
            })
            .collect();

        Aggregates {
            contacts: table.into_ranked(),
            organizations: organizations.ranked(),
            themes,
        }
    }
}
