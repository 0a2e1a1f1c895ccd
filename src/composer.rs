use std::sync::Arc;

use crate::config::Config;
use crate::models::{ComposedMessage, EmailIntent, Recipient, TemplateId};
use crate::templates::{TemplateError, TemplateStore};

/// Sender branding injected into every template
#[derive(Debug, Clone)]
pub struct Branding {
    pub company_name: String,
    pub agent_name: String,
    pub company_phone: String,
    pub company_address: String,
}

impl Branding {
    pub fn from_config(config: &Config) -> Self {
        Self {
            company_name: config.company_name.clone(),
            agent_name: config.agent_name.clone(),
            company_phone: config.company_phone.clone(),
            company_address: config.company_address.clone(),
        }
    }
}

/// Builds messages from an intent and a recipient. Pure: no I/O.
#[derive(Clone)]
pub struct EmailComposer {
    templates: Arc<TemplateStore>,
    branding: Branding,
}

impl EmailComposer {
    pub fn new(templates: Arc<TemplateStore>, branding: Branding) -> Self {
        Self {
            templates,
            branding,
        }
    }

    pub fn subject(&self, template_id: TemplateId) -> String {
        match template_id {
            TemplateId::Info => format!(
                "Here's the info you requested - {}",
                self.branding.company_name
            ),
            TemplateId::Followup => format!(
                "Thanks for calling - here's a recap from {}",
                self.branding.company_name
            ),
        }
    }

    pub fn compose(
        &self,
        intent: &EmailIntent,
        recipient: &Recipient,
    ) -> Result<ComposedMessage, TemplateError> {
        let mut variables = intent.variables.clone();

        // Payload values never override sender branding
        for (key, value) in [
            ("company_name", &self.branding.company_name),
            ("agent_name", &self.branding.agent_name),
            ("company_phone", &self.branding.company_phone),
            ("company_address", &self.branding.company_address),
        ] {
            variables.insert(key.to_string(), value.clone());
        }
        if let Some(name) = recipient.display_name() {
            variables
                .entry("name".to_string())
                .or_insert_with(|| name.to_string());
        }

        let html_body = self.templates.render(intent.template_id, &variables)?;

        Ok(ComposedMessage {
            to: recipient.email.clone(),
            subject: self.subject(intent.template_id),
            html_body,
        })
    }
}
