//! Email data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Display name (e.g., "John Doe")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Email address (e.g., "john@example.com"), lowercased
    pub email: String,
}

impl Address {
    /// Create a new address with just an email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new address with name and email
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

/// A normalized email message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Provider message ID
    pub id: String,

    /// Provider conversation ID
    pub thread_id: String,

    /// Subject line (decoded)
    pub subject: String,

    /// From address; `email` is never empty
    pub sender: Address,

    /// To addresses
    #[serde(default)]
    pub to: Vec<Address>,

    /// CC addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Address>,

    /// Date sent, if any date could be parsed
    pub sent_at: Option<DateTime<Utc>>,

    /// Cleaned plain text body
    pub body: String,

    /// Whether any part carries a filename or attachment reference
    #[serde(default)]
    pub has_attachments: bool,
}

impl Message {
    /// All to and cc recipients
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(self.cc.iter())
    }

    /// Subject and body joined for text analysis
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        assert_eq!(
            Address::with_name("Alice", "alice@x.com").to_string(),
            "Alice <alice@x.com>"
        );
        assert_eq!(Address::new("bob@x.com").to_string(), "bob@x.com");
    }

    #[test]
    fn test_recipients_include_cc() {
        let msg = Message {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            subject: "Hi".to_string(),
            sender: Address::new("bob@x.com"),
            to: vec![Address::new("carol@x.com")],
            cc: vec![Address::new("Me@Corp.com")],
            sent_at: None,
            body: String::new(),
            has_attachments: false,
        };
        let recipients: Vec<&str> = msg.recipients().map(|a| a.email.as_str()).collect();
        assert_eq!(recipients, vec!["carol@x.com", "Me@Corp.com"]);
    }
}
