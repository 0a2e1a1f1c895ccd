//! Embedded HTML templates and placeholder rendering.
//!
//! Rendering uses minijinja with strict undefined handling, so a placeholder
//! without a value is an error instead of blank output, and `.html` template
//! names turn on HTML auto-escaping for every interpolated value.

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};

use crate::models::TemplateId;

const INFO_HTML: &str = include_str!("../../templates/info.html");
const FOLLOWUP_HTML: &str = include_str!("../../templates/followup.html");

/// Salutation used when no recipient name was found
pub const DEFAULT_NAME: &str = "there";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {template} requires variable '{variable}'")]
    MissingVariable {
        template: TemplateId,
        variable: &'static str,
    },

    #[error("template {template} failed to render: {message}")]
    Render {
        template: TemplateId,
        message: String,
    },
}

impl TemplateId {
    fn file_name(&self) -> &'static str {
        match self {
            TemplateId::Info => "info.html",
            TemplateId::Followup => "followup.html",
        }
    }

    /// Content-bearing variables with no acceptable default
    pub fn required_variables(&self) -> &'static [&'static str] {
        match self {
            TemplateId::Info => &["topic"],
            TemplateId::Followup => &["summary"],
        }
    }
}

pub struct TemplateStore {
    env: Environment<'static>,
}

impl TemplateStore {
    pub fn new() -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        for (id, source) in [(TemplateId::Info, INFO_HTML), (TemplateId::Followup, FOLLOWUP_HTML)] {
            env.add_template(id.file_name(), source)
                .map_err(|e| TemplateError::Render {
                    template: id,
                    message: e.to_string(),
                })?;
        }

        Ok(Self { env })
    }

    /// Render `template_id` with `variables`, HTML-escaping every value.
    pub fn render(
        &self,
        template_id: TemplateId,
        variables: &BTreeMap<String, String>,
    ) -> Result<String, TemplateError> {
        for &variable in template_id.required_variables() {
            let present = variables
                .get(variable)
                .is_some_and(|v| !v.trim().is_empty());
            if !present {
                return Err(TemplateError::MissingVariable {
                    template: template_id,
                    variable,
                });
            }
        }

        let mut context = variables.clone();
        context
            .entry("name".to_string())
            .or_insert_with(|| DEFAULT_NAME.to_string());

        let render_err = |e: minijinja::Error| TemplateError::Render {
            template: template_id,
            message: e.to_string(),
        };

        self.env
            .get_template(template_id.file_name())
            .map_err(render_err)?
            .render(&context)
            .map_err(render_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branding() -> BTreeMap<String, String> {
        [
            ("company_name", "Boca Raton Health Insurers"),
            ("agent_name", "Gail"),
            ("company_phone", "(561) 555-0123"),
            ("company_address", "123 Health Plaza"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn with(mut vars: BTreeMap<String, String>, key: &str, value: &str) -> BTreeMap<String, String> {
        vars.insert(key.to_string(), value.to_string());
        vars
    }

    #[test]
    fn test_render_is_deterministic() {
        let store = TemplateStore::new().unwrap();
        let vars = with(with(branding(), "name", "Sam"), "topic", "quote");

        let first = store.render(TemplateId::Info, &vars).unwrap();
        let second = store.render(TemplateId::Info, &vars).unwrap();

        assert_eq!(first, second);
        assert!(first.contains("Hi Sam,"));
        assert!(first.contains("<strong>quote</strong>"));
    }

    #[test]
    fn test_missing_topic_is_an_error() {
        let store = TemplateStore::new().unwrap();
        let vars = with(branding(), "name", "Sam");

        let err = store.render(TemplateId::Info, &vars).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingVariable { variable: "topic", .. }
        ));
    }

    #[test]
    fn test_missing_summary_is_an_error() {
        let store = TemplateStore::new().unwrap();
        let err = store.render(TemplateId::Followup, &branding()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingVariable { variable: "summary", .. }
        ));
    }

    #[test]
    fn test_missing_name_uses_default_salutation() {
        let store = TemplateStore::new().unwrap();
        let vars = with(branding(), "topic", "dental plans");

        let html = store.render(TemplateId::Info, &vars).unwrap();
        assert!(html.contains("Hi there,"));
    }

    #[test]
    fn test_interpolated_values_are_escaped() {
        let store = TemplateStore::new().unwrap();
        let vars = with(
            with(branding(), "name", "<b>Sam</b>"),
            "summary",
            "Caller said <script>alert(1)</script> & hung up",
        );

        let html = store.render(TemplateId::Followup, &vars).unwrap();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>Sam</b>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp; hung up"));
    }

    #[test]
    fn test_missing_branding_variable_is_a_render_error() {
        let store = TemplateStore::new().unwrap();
        let mut vars = BTreeMap::new();
        vars.insert("topic".to_string(), "quote".to_string());

        let err = store.render(TemplateId::Info, &vars).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }
}
