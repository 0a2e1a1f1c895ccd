//! Recipient resolution.
//!
//! Candidate addresses can appear in several places of a payload and may
//! disagree. Sources are tried in a configured order and the first valid
//! address wins; names follow the same order but never fail resolution.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::Recipient;
use crate::payload::Payload;

/// Email-shaped token inside free text
static EMAIL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email token regex")
});

/// Whole-string address check applied to every candidate
static EMAIL_STRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$",
    )
    .expect("valid strict email regex")
});

const CUSTOMER_PATHS: &[&[&str]] = &[
    &["message", "customer"],
    &["customer"],
    &["message", "call", "customer"],
    &["call", "customer"],
];

const MESSAGE_LOG_PATHS: &[&[&str]] = &[
    &["message", "artifact", "messages"],
    &["message", "messages"],
    &["artifact", "messages"],
    &["messages"],
];

const TRANSCRIPT_PATHS: &[&[&str]] = &[
    &["message", "transcript"],
    &["message", "artifact", "transcript"],
    &["transcript"],
];

/// Roles whose utterances are the caller's, not the agent's
const CALLER_ROLES: &[&str] = &["user", "customer"];

/// Strict syntax check for a single address
pub fn is_valid_email(candidate: &str) -> bool {
    candidate.len() <= 254 && EMAIL_STRICT.is_match(candidate)
}

/// Trim whitespace and sentence punctuation picked up from speech-to-text
fn clean_candidate(raw: &str) -> &str {
    raw.trim()
        .trim_end_matches(['.', ',', ';', ':', '!', '?', ')'])
        .trim_start_matches(['(', '<', '.'])
        .trim_end_matches('>')
}

fn valid_candidate(raw: &str) -> Option<String> {
    let cleaned = clean_candidate(raw);
    is_valid_email(cleaned).then(|| cleaned.to_string())
}

/// Last valid email-shaped token in `text`
fn last_email_in(text: &str) -> Option<String> {
    let tokens: Vec<&str> = EMAIL_TOKEN.find_iter(text).map(|m| m.as_str()).collect();
    tokens.into_iter().rev().find_map(valid_candidate)
}

/// One place in a payload where a recipient may be found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientSource {
    /// Declared tool parameters: `user_email`, `user_name`
    Explicit,
    /// Nested customer/caller identity objects
    Customer,
    /// Call transcript or message log, most recent mention wins
    Transcript,
    /// Any email-shaped string anywhere in the payload
    Payload,
}

impl RecipientSource {
    pub fn default_order() -> Vec<RecipientSource> {
        vec![
            RecipientSource::Explicit,
            RecipientSource::Customer,
            RecipientSource::Transcript,
        ]
    }

    pub fn email(&self, payload: &Payload) -> Option<String> {
        match self {
            RecipientSource::Explicit => payload.str_at(&["user_email"]).and_then(valid_candidate),
            RecipientSource::Customer => CUSTOMER_PATHS.iter().find_map(|path| {
                let mut customer = path.to_vec();
                customer.push("email");
                payload.str_at(&customer).and_then(valid_candidate)
            }),
            RecipientSource::Transcript => transcript_email(payload),
            RecipientSource::Payload => {
                let serialized = serde_json::to_string(payload.root()).ok()?;
                last_email_in(&serialized)
            }
        }
    }

    pub fn name(&self, payload: &Payload) -> Option<String> {
        match self {
            RecipientSource::Explicit => payload.str_at(&["user_name"]).map(str::to_string),
            RecipientSource::Customer => CUSTOMER_PATHS.iter().find_map(|path| {
                let mut customer = path.to_vec();
                customer.push("name");
                payload.str_at(&customer).map(str::to_string)
            }),
            RecipientSource::Transcript | RecipientSource::Payload => None,
        }
    }
}

fn utterance_text(entry: &Value) -> Option<&str> {
    entry
        .get("message")
        .or_else(|| entry.get("content"))
        .and_then(Value::as_str)
}

fn is_caller_utterance(entry: &Value) -> bool {
    match entry.get("role").and_then(Value::as_str) {
        Some(role) => CALLER_ROLES.contains(&role),
        None => true,
    }
}

fn transcript_email(payload: &Payload) -> Option<String> {
    let log = MESSAGE_LOG_PATHS
        .iter()
        .find_map(|path| payload.value_at(path)?.as_array());

    // The flat transcript mixes in agent lines, so a present log is authoritative
    if let Some(entries) = log {
        return entries
            .iter()
            .rev()
            .filter(|entry| is_caller_utterance(entry))
            .filter_map(utterance_text)
            .find_map(last_email_in);
    }

    let transcript = payload.first_str(TRANSCRIPT_PATHS)?;
    last_email_in(transcript)
}

impl fmt::Display for RecipientSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecipientSource::Explicit => "explicit",
            RecipientSource::Customer => "customer",
            RecipientSource::Transcript => "transcript",
            RecipientSource::Payload => "payload",
        };
        f.write_str(s)
    }
}

impl FromStr for RecipientSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "explicit" => Ok(RecipientSource::Explicit),
            "customer" => Ok(RecipientSource::Customer),
            "transcript" => Ok(RecipientSource::Transcript),
            "payload" => Ok(RecipientSource::Payload),
            other => Err(format!("unknown recipient source: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        recipient: Recipient,
        source: RecipientSource,
    },
    NotFound,
}

/// Ordered chain of recipient sources
#[derive(Debug, Clone)]
pub struct RecipientResolver {
    sources: Vec<RecipientSource>,
}

impl Default for RecipientResolver {
    fn default() -> Self {
        Self::new(RecipientSource::default_order())
    }
}

impl RecipientResolver {
    pub fn new(sources: Vec<RecipientSource>) -> Self {
        Self { sources }
    }

    /// Display name by the same precedence; never fails resolution
    pub fn name(&self, payload: &Payload) -> Option<String> {
        self.sources.iter().find_map(|source| source.name(payload))
    }

    pub fn resolve(&self, payload: &Payload) -> Resolution {
        let Some((email, source)) = self
            .sources
            .iter()
            .find_map(|source| source.email(payload).map(|email| (email, *source)))
        else {
            return Resolution::NotFound;
        };

        let name = self.name(payload);

        tracing::debug!(%source, email = %email, has_name = name.is_some(), "Recipient resolved");

        Resolution::Found {
            recipient: Recipient { email, name },
            source,
        }
    }
}
