use std::collections::BTreeMap;
use std::fmt;

/// Recipient resolved from a trigger payload.
/// `email` has passed strict syntax validation; `name` may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

impl Recipient {
    /// Non-blank display name, if any
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    /// Mid-call "send me the details" email
    Info,
    /// Post-call recap
    Followup,
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateId::Info => f.write_str("info"),
            TemplateId::Followup => f.write_str("followup"),
        }
    }
}

/// Which template to render and with what values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailIntent {
    pub template_id: TemplateId,
    pub variables: BTreeMap<String, String>,
}

impl EmailIntent {
    pub fn new(template_id: TemplateId) -> Self {
        Self {
            template_id,
            variables: BTreeMap::new(),
        }
    }

    /// Set a variable; blank values are treated as absent.
    pub fn with_var(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.variables.insert(key.to_string(), v.to_string());
        }
        self
    }
}

/// Fully rendered message, handed to the delivery client once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}
