//! Persona: the assistant's identity, behavioural rules and prompt template.
//!
//! A fixed, versioned struct with explicit fields. Every placeholder the
//! prompt template can reference maps to exactly one field here, so prompt
//! substitution is total.

use serde::{Deserialize, Serialize};

/// Bumped whenever a field is added, removed or changes meaning.
pub const PERSONA_SCHEMA_VERSION: u32 = 1;

/// Placeholders the prompt template may reference.
pub const TEMPLATE_FIELDS: &[&str] = &[
    "persona", "role", "traits", "rules", "context", "history", "message",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default = "default_traits")]
    pub traits: Vec<String>,

    #[serde(default = "default_rules")]
    pub rules: Vec<String>,

    /// Prompt template with `{field}` placeholders from [`TEMPLATE_FIELDS`].
    #[serde(default = "default_template")]
    pub template: String,

    /// Opening line spoken when a voice session becomes active.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    #[serde(default = "default_starters")]
    pub conversation_starters: Vec<String>,

    /// Reply used when retrieval finds nothing relevant.
    #[serde(default = "default_low_confidence_reply")]
    pub low_confidence_reply: String,

    /// Reply spoken when generation fails.
    #[serde(default = "default_error_reply")]
    pub error_reply: String,

    /// Reply for unintelligible input.
    #[serde(default = "default_clarification")]
    pub clarification: String,
}

fn default_version() -> u32 {
    PERSONA_SCHEMA_VERSION
}

fn default_name() -> String {
    "Max".into()
}

fn default_role() -> String {
    "HeyGen AI Wealth Management Operations Assistant".into()
}

fn default_traits() -> Vec<String> {
    [
        "Proactive and detail-oriented",
        "Supportive with friendly but professional tone",
        "Knowledgeable about wealth management operations",
        "Efficient problem-solver",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_rules() -> Vec<String> {
    [
        "Always be proactive and detail-oriented",
        "Maintain a friendly but professional tone",
        "Help track onboarding progress, compliance steps, account servicing, funding, and advisor follow-ups",
        "Provide clear status updates and explain pending steps",
        "Suggest the fastest way to resolve issues",
        "Max 3 sentences per response, <30 words each",
        "Always offer next steps",
        "Avoid jargon unless the user is familiar with it",
        "Refuse off-topic or NSFW requests politely",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_template() -> String {
    concat!(
        "You are {persona}. Your role is to be {role}. ",
        "Your personality traits include: {traits}. ",
        "Rules to follow: {rules}. ",
        "Wealth Management Context: {context}. ",
        "Current conversation context: {history}. ",
        "User: {message}. Assistant:",
    )
    .into()
}

fn default_greeting() -> String {
    "Good morning, Sarah. Several onboarding tasks are close to or past SLA. Want me to go over them and suggest the quickest way to resolve?".into()
}

fn default_starters() -> Vec<String> {
    vec![
        default_greeting(),
        "Hi Sarah, I see three client onboardings have stalled past ID verification SLA. Want me to share details?".into(),
        "Morning, Sarah. Michael Brown's funding hasn't cleared in 72 hours. Want me to follow up?".into(),
    ]
}

fn default_low_confidence_reply() -> String {
    "I don't have specific information about that in my knowledge base. Let me connect you with a human advisor who can help.".into()
}

fn default_error_reply() -> String {
    "I'm sorry, I encountered an error. Let me connect you with a human advisor who can help.".into()
}

fn default_clarification() -> String {
    "Sorry, didn't catch that. Could you repeat?".into()
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            role: default_role(),
            traits: default_traits(),
            rules: default_rules(),
            template: default_template(),
            greeting: default_greeting(),
            conversation_starters: default_starters(),
            low_confidence_reply: default_low_confidence_reply(),
            error_reply: default_error_reply(),
            clarification: default_clarification(),
        }
    }
}

impl Persona {
    /// Placeholders in the template that no persona field can fill.
    ///
    /// These are left verbatim by substitution; callers may want to warn.
    pub fn unknown_placeholders(&self) -> Vec<String> {
        let mut unknown = Vec::new();
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else { break };
            let name = &after[..close];
            let is_identifier = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if is_identifier && !TEMPLATE_FIELDS.contains(&name) {
                unknown.push(name.to_string());
            }
            rest = &after[close + 1..];
        }
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_persona_is_current_version() {
        let persona = Persona::default();
        assert_eq!(persona.version, PERSONA_SCHEMA_VERSION);
        assert_eq!(persona.name, "Max");
        assert!(persona.conversation_starters.contains(&persona.greeting));
    }

    #[test]
    fn default_template_uses_only_known_fields() {
        assert!(Persona::default().unknown_placeholders().is_empty());
    }

    #[test]
    fn unknown_placeholders_are_reported() {
        let persona = Persona {
            template: "Hi {persona}, today is {weekday}. {not a field}".into(),
            ..Persona::default()
        };
        assert_eq!(persona.unknown_placeholders(), vec!["weekday".to_string()]);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let persona: Persona = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
        assert_eq!(persona.name, "Ada");
        assert_eq!(persona.role, default_role());
        assert_eq!(persona.rules.len(), default_rules().len());
    }
}
