//! Second-stage promotional mail filter and the matching provider query

use chrono::{DateTime, Utc};

use crate::models::Message;

/// Subject/body keywords that mark promotional mail
pub const MARKETING_KEYWORDS: &[&str] = &[
    "promo",
    "newsletter",
    "discount",
    "offer",
    "sale",
    "webinar",
    "event",
    "free trial",
    "coupon",
    "exclusive",
];

/// Sender address fragments of automated or bulk senders
pub const BULK_SENDER_PATTERNS: &[&str] = &[
    "noreply",
    "info@",
    "support@",
    "marketing@",
    "updates@",
    "notifications@",
];

/// Gmail categories excluded at query time
const EXCLUDED_CATEGORIES: &[&str] = &["promotions", "social", "updates", "forums"];

/// Additional sender exclusions only applied at query time
const EXCLUDED_SENDERS: &[&str] = &[
    "noreply@*",
    "info@*",
    "marketing@*",
    "updates@*",
    "notifications@*",
];

/// True if the message looks promotional. Any single rule is enough.
pub fn is_marketing(message: &Message) -> bool {
    let body = message.body.to_lowercase();
    if body.contains("unsubscribe") {
        return true;
    }

    let subject = message.subject.to_lowercase();
    if MARKETING_KEYWORDS
        .iter()
        .any(|k| subject.contains(k) || body.contains(k))
    {
        return true;
    }

    is_bulk_sender(&message.sender.email)
}

/// True for automated sender addresses
pub fn is_bulk_sender(address: &str) -> bool {
    let address = address.to_lowercase();
    BULK_SENDER_PATTERNS.iter().any(|p| address.contains(p))
}

/// Provider-side search query for inbox mail received after `since`
///
/// Provider filtering is best-effort; [`is_marketing`] runs again locally.
pub fn gmail_query(since: DateTime<Utc>) -> String {
    let mut query = format!("after:{} is:inbox", since.timestamp());
    for category in EXCLUDED_CATEGORIES {
        query.push_str(&format!(" -category:{}", category));
    }
    for keyword in std::iter::once(&"unsubscribe").chain(MARKETING_KEYWORDS) {
        query.push_str(&format!(" -\"{}\"", keyword));
    }
    for sender in EXCLUDED_SENDERS {
        query.push_str(&format!(" -from:{}", sender));
    }
    query
}
