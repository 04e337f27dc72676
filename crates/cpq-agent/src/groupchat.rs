use cpq_agent_core::conversation::{ChatMessage, GroupChat, Role, TerminationReason};
use cpq_agent_core::execution::{format_executor_reply, CodeResult};
use cpq_agent_core::extract::CodeExtractor;
use cpq_agent_core::prompt::ASSISTANT_SYSTEM_MESSAGE;
use indicatif::ProgressBar;
use serde::Serialize;

use crate::executor::CodeRunner;
use crate::llm::ChatModel;
use crate::prelude::*;

/// A code block the executor ran during the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub code: String,
    pub result: CodeResult,
}

/// Everything a finished group chat produced.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub messages: Vec<ChatMessage>,
    pub termination: TerminationReason,
    pub executions: Vec<Execution>,
}

impl ChatOutcome {
    pub fn assistant_replies(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .collect()
    }

    /// Result of an earlier run of exactly this code, if any.
    pub fn result_for(&self, code: &str) -> Option<&CodeResult> {
        self.executions
            .iter()
            .rev()
            .find(|e| e.code == code)
            .map(|e| &e.result)
    }
}

/// Drive the assistant / executor round robin until it terminates.
///
/// The assistant answers after the task and after every executor report.
/// The executor runs the first code block of the latest assistant reply; a
/// reply without code ends the chat.
pub async fn run_group_chat<M: ChatModel, R: CodeRunner>(
    model: &M,
    runner: &R,
    extractor: &CodeExtractor,
    max_round: usize,
    task: &str,
    spinner: Option<&ProgressBar>,
) -> Result<ChatOutcome> {
    let mut chat = GroupChat::new(max_round);
    let mut executions = Vec::new();

    chat.push(ChatMessage::user(task));

    while let Some(speaker) = chat.next_speaker() {
        let round = chat.messages().len() + 1;
        log::debug!("Round {}/{}: {}", round, max_round, speaker);

        match speaker {
            Role::Assistant => {
                set_spinner_msg(spinner, format!("Thinking... (round {round}/{max_round})"));
                let reply = model.complete(ASSISTANT_SYSTEM_MESSAGE, chat.messages()).await?;
                chat.push(ChatMessage::assistant(reply));
            }
            Role::Executor => {
                let code = chat
                    .last_assistant_reply()
                    .and_then(|reply| extractor.extract(reply))
                    .filter(|code| !code.is_empty());

                let Some(code) = code else {
                    chat.terminate(TerminationReason::NoCode);
                    break;
                };

                set_spinner_msg(spinner, format!("Executing code... (round {round}/{max_round})"));
                let result = runner.run(&code).await?;
                chat.push(ChatMessage::executor(format_executor_reply(&result)));
                executions.push(Execution { code, result });
            }
            Role::User => break,
        }
    }

    let termination = chat.termination().unwrap_or(TerminationReason::MaxRounds);
    log::info!(
        "Conversation ended after {} message(s): {}",
        chat.messages().len(),
        termination
    );

    Ok(ChatOutcome {
        messages: chat.into_messages(),
        termination,
        executions,
    })
}
