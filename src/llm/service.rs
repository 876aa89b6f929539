//! Analysis prompts, model selection and command extraction.

use once_cell::sync::Lazy;
use regex::Regex;

use super::client::{ChatMessage, OllamaClient};

pub const DEFAULT_MODEL: &str = "llama3.2";

static CMD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<cmd>(.*?)</cmd>").unwrap());

const SYSTEM_PROMPT: &str = "\
You are an assistant that troubleshoots local development environments. \
Analyze the reported system state and point out problems and improvements \
concisely. When a serious issue has a concrete fix, propose exactly one \
shell command wrapped as <cmd>command</cmd>. \
Answer with: a short summary, detected problems (if any), and recommended \
actions.";

/// Owns the HTTP client and the currently selected model.
pub struct AiService {
    pub client: OllamaClient,
    model: String,
}

impl AiService {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client,
            model: if model.is_empty() { DEFAULT_MODEL.to_string() } else { model },
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }
}

/// Prompt pair for a user-initiated analysis.
pub fn analysis_messages(context_json: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Current system state (JSON):\n```json\n{}\n```",
            context_json
        )),
    ]
}

/// Prompt pair for a proactive analysis, seeded with the detected failure so
/// the model goes straight to remediation.
pub fn proactive_messages(failure: &str, context_json: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "A failure was just detected: {}\n\nDiagnose the root cause and \
             propose a recovery command as <cmd>command</cmd> if one exists.\n\n\
             Current system state (JSON):\n```json\n{}\n```",
            failure, context_json
        )),
    ]
}

/// Extract the first `<cmd>…</cmd>` payload from a response. The extracted
/// text is exactly the substring strictly between the markers.
pub fn extract_command(text: &str) -> Option<String> {
    CMD_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|cmd| !cmd.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::Role;

    #[test]
    fn extracts_command_between_markers() {
        assert_eq!(
            extract_command("restart it: <cmd>docker start postgres-db</cmd> then verify"),
            Some("docker start postgres-db".to_string())
        );
    }

    #[test]
    fn extracts_first_of_multiple() {
        assert_eq!(
            extract_command("<cmd>ls</cmd> or maybe <cmd>pwd</cmd>"),
            Some("ls".to_string())
        );
    }

    #[test]
    fn spans_newlines() {
        assert_eq!(
            extract_command("<cmd>docker compose \\\n  up -d</cmd>"),
            Some("docker compose \\\n  up -d".to_string())
        );
    }

    #[test]
    fn none_without_markers() {
        assert_eq!(extract_command("all healthy, nothing to do"), None);
        assert_eq!(extract_command("<cmd></cmd>"), None);
        assert_eq!(extract_command("<cmd>unclosed"), None);
    }

    #[test]
    fn analysis_messages_carry_system_then_user() {
        let messages = analysis_messages("{\"cpu\": 1}");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.contains("{\"cpu\": 1}"));
    }

    #[test]
    fn proactive_messages_name_the_failure() {
        let svc = AiService::new(OllamaClient::new(""), "custom");
        assert_eq!(svc.model(), "custom");
        let messages = proactive_messages("PostgreSQL stopped", "{}");
        assert!(messages[1].content.contains("PostgreSQL stopped"));
    }

    #[test]
    fn default_model_fills_empty() {
        let svc = AiService::new(OllamaClient::new(""), "");
        assert_eq!(svc.model(), DEFAULT_MODEL);
    }
}
