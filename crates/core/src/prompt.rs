use crate::conversation::{ChatMessage, Role};

/// System message for the code-writing assistant.
pub const ASSISTANT_SYSTEM_MESSAGE: &str = "\
You are a Salesforce CPQ expert. Generate Python code using the simple_salesforce library.
Ensure the code is executable and handles Salesforce API responses properly.

Rules:
- Put the complete program in a single ```python fenced block.
- Connect with `Salesforce(instance_url=os.environ[\"SF_INSTANCE_URL\"], session_id=os.environ[\"SF_SESSION_ID\"])`.
  SF_USERNAME, SF_PASSWORD, SF_SECURITY_TOKEN and SF_DOMAIN are also available.
- Print every result you want the user to see.
- When the executor reports a failure, fix the code and send the full program again.
- When the task is complete and the output is correct, reply with TERMINATE.";

/// Render a conversation as plain text for single-prompt model backends.
///
/// Each message becomes a `role:` header followed by its content; the result
/// ends with an `assistant:` header so the model continues as the assistant.
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    let mut parts: Vec<String> = messages
        .iter()
        .map(|m| format!("{}:\n{}", m.role, m.content.trim_end()))
        .collect();

    parts.push(format!("{}:", Role::Assistant));

    parts.join("\n\n")
}

/// Wrap extracted code so the executor can run it as a fresh request.
pub fn code_request(code: &str, language: &str) -> String {
    format!("```{language}\n{code}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_python_code;

    #[test]
    fn test_render_empty_transcript() {
        assert_eq!(render_transcript(&[]), "assistant:");
    }

    #[test]
    fn test_render_transcript_roles() {
        let messages = vec![
            ChatMessage::user("Count quote lines"),
            ChatMessage::assistant("```python\nprint(3)\n```\n"),
            ChatMessage::executor("exitcode: 0 (execution succeeded)\nCode output: 3"),
        ];

        let rendered = render_transcript(&messages);
        assert_eq!(
            rendered,
            "user:\nCount quote lines\n\n\
             assistant:\n```python\nprint(3)\n```\n\n\
             executor:\nexitcode: 0 (execution succeeded)\nCode output: 3\n\n\
             assistant:"
        );
    }

    #[test]
    fn test_code_request_round_trips_through_extractor() {
        let code = "print('quote')";
        assert_eq!(
            extract_python_code(&code_request(code, "python")),
            Some(code.to_string())
        );
    }

    #[test]
    fn test_system_message_mentions_terminate() {
        assert!(ASSISTANT_SYSTEM_MESSAGE.contains(crate::conversation::TERMINATE_TOKEN));
    }
}
