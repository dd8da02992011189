//! Display-name to address resolution
//!
//! A person shows up as `"Alice Smith" <alice@corp.com>` in one header,
//! `alice.smith@corp.com` in another, and as plain "Alice Smith" in body
//! text. The identity table collapses those onto one address per name.

use std::collections::HashMap;

use crate::models::Message;

/// Split a display-address string into `(name, address)`
///
/// Grammar, tried in order:
/// - `"Display Name" <addr>` or `Display Name <addr>`: name with quotes removed
/// - `<addr>`: no name
/// - anything containing `@`: a bare address
/// - anything else: returned trimmed as the address (fallback-to-raw)
///
/// The address is returned as written; see [`normalize_address`].
pub fn parse_display_address(input: &str) -> (Option<String>, String) {
    let s = input.trim();

    if let (Some(open), true) = (s.rfind('<'), s.ends_with('>')) {
        let addr = s[open + 1..s.len() - 1].trim();
        if !addr.is_empty() {
            let name = s[..open]
                .trim()
                .trim_matches('"')
                .replace("\\\"", "\"")
                .trim()
                .to_string();
            let name = (!name.is_empty()).then_some(name);
            return (name, addr.to_string());
        }
    }

    (None, s.to_string())
}

/// Split a header address list on commas that sit outside quotes and `<...>`
pub fn split_address_list(header: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut angle_depth = 0u32;
    let mut escaped = false;

    for c in header.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                escaped = true;
                current.push(c);
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '<' if !in_quotes => {
                angle_depth += 1;
                current.push(c);
            }
            '>' if !in_quotes => {
                angle_depth = angle_depth.saturating_sub(1);
                current.push(c);
            }
            ',' if !in_quotes && angle_depth == 0 => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Canonical comparison form of an address
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

#[derive(Debug, Clone)]
struct NameEntry {
    /// Spelling as first seen
    name: String,
    /// (address, count) in first-seen order
    candidates: Vec<(String, u32)>,
}

impl NameEntry {
    /// Highest count; the earlier address wins a tie
    fn best(&self) -> Option<&str> {
        let mut best: Option<&(String, u32)> = None;
        for candidate in &self.candidates {
            if best.map_or(true, |b| candidate.1 > b.1) {
                best = Some(candidate);
            }
        }
        best.map(|(addr, _)| addr.as_str())
    }
}

/// Mapping from display name to its most frequently co-occurring address
///
/// Names are matched case-insensitively. Two people sharing a display
/// name collapse onto one address; that is a known limitation.
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    entries: Vec<NameEntry>,
    index: HashMap<String, usize>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one co-occurrence of `name` with `address`
    pub fn record(&mut self, name: &str, address: &str) {
        let name = name.trim();
        let address = normalize_address(address);
        if name.is_empty() || address.is_empty() {
            return;
        }

        let key = name.to_lowercase();
        let i = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(NameEntry {
                    name: name.to_string(),
                    candidates: Vec::new(),
                });
                self.entries.len() - 1
            }
        };

        let candidates = &mut self.entries[i].candidates;
        match candidates.iter_mut().find(|(a, _)| *a == address) {
            Some((_, count)) => *count += 1,
            None => candidates.push((address, 1)),
        }
    }

    /// Address a name resolves to
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let i = *self.index.get(&name.trim().to_lowercase())?;
        self.entries[i].best()
    }

    /// First name (in first-seen order) that resolves to `address`,
    /// skipping names that are just the address itself
    pub fn name_for(&self, address: &str) -> Option<&str> {
        let address = normalize_address(address);
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase() != address)
            .find(|e| e.best() == Some(address.as_str()))
            .map(|e| e.name.as_str())
    }

    /// Resolved (name, address) pairs in first-seen name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.best().map(|addr| (e.name.as_str(), addr)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold every sender and recipient of `messages` into an identity table
///
/// A participant without a display name maps its address to itself.
pub fn build_identity_table(messages: &[Message]) -> IdentityTable {
    let mut table = IdentityTable::new();
    for message in messages {
        for address in std::iter::once(&message.sender).chain(message.recipients()) {
            match &address.name {
                Some(name) => table.record(name, &address.email),
                None => table.record(&address.email, &address.email),
            }
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;

    fn message(sender: Address, to: Vec<Address>) -> Message {
        Message {
            id: "m".to_string(),
            thread_id: "t".to_string(),
            subject: String::new(),
            sender,
            to,
            cc: vec![],
            sent_at: None,
            body: String::new(),
            has_attachments: false,
        }
    }

    #[test]
    fn test_parse_display_address_grammar() {
        assert_eq!(
            parse_display_address("\"Smith, Alice\" <alice@x.com>"),
            (Some("Smith, Alice".to_string()), "alice@x.com".to_string())
        );
        assert_eq!(
            parse_display_address("  Bob Jones <Bob@X.com> "),
            (Some("Bob Jones".to_string()), "Bob@X.com".to_string())
        );
        assert_eq!(
            parse_display_address("<carol@x.com>"),
            (None, "carol@x.com".to_string())
        );
        assert_eq!(
            parse_display_address("dave@x.com"),
            (None, "dave@x.com".to_string())
        );
        assert_eq!(
            parse_display_address("undisclosed-recipients:;"),
            (None, "undisclosed-recipients:;".to_string())
        );
        assert_eq!(parse_display_address("Eve <>"), (None, "Eve <>".to_string()));
    }

    #[test]
    fn test_split_address_list_respects_quotes_and_angles() {
        let parts = split_address_list(
            "\"Smith, Alice\" <alice@x.com>, bob@x.com ,<weird,addr@x.com>,,",
        );
        assert_eq!(
            parts,
            vec![
                "\"Smith, Alice\" <alice@x.com>",
                "bob@x.com",
                "<weird,addr@x.com>"
            ]
        );
    }

    #[test]
    fn test_higher_count_wins() {
        let mut messages = Vec::new();
        for _ in 0..5 {
            messages.push(message(
                Address::with_name("Alice", "alice@x.com"),
                vec![Address::new("me@corp.com")],
            ));
        }
        for _ in 0..2 {
            messages.push(message(
                Address::new("me@corp.com"),
                vec![Address::with_name("Alice", "alice@y.com")],
            ));
        }
        let table = build_identity_table(&messages);
        assert_eq!(table.resolve("Alice"), Some("alice@x.com"));
        assert_eq!(table.resolve("alice"), Some("alice@x.com"));
        assert_eq!(table.name_for("ALICE@x.com"), Some("Alice"));
        assert_eq!(table.name_for("alice@y.com"), None);
    }

    #[test]
    fn test_tie_goes_to_first_seen_address() {
        let mut table = IdentityTable::new();
        table.record("Sam", "sam@b.com");
        table.record("Sam", "sam@a.com");
        table.record("Sam", "sam@a.com");
        table.record("Sam", "sam@b.com");
        assert_eq!(table.resolve("Sam"), Some("sam@b.com"));
    }

    #[test]
    fn test_bare_addresses_map_to_themselves() {
        let table = build_identity_table(&[message(
            Address::new("bob@x.com"),
            vec![Address::new("me@corp.com")],
        )]);
        assert_eq!(table.resolve("bob@x.com"), Some("bob@x.com"));
        assert_eq!(table.name_for("bob@x.com"), None);
        let pairs: Vec<_> = table.iter().collect();
        assert_eq!(pairs, vec![("bob@x.com", "bob@x.com"), ("me@corp.com", "me@corp.com")]);
    }
}
