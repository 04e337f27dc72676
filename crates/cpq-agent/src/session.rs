use cpq_agent_core::conversation::{select_code_with, ChatMessage, TerminationReason};
use cpq_agent_core::execution::CodeResult;
use cpq_agent_core::extract::CodeExtractor;
use cpq_agent_core::prompt::code_request;
use indicatif::ProgressBar;
use serde::Serialize;

use crate::executor::CodeRunner;
use crate::groupchat::run_group_chat;
use crate::llm::ChatModel;
use crate::prelude::*;

/// Model, executor and conversation settings for one session.
pub struct Agent<M, R> {
    pub model: M,
    pub runner: R,
    pub extractor: CodeExtractor,
    pub max_round: usize,
}

/// What came out of one user request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Code was selected and run.
    Executed {
        code: String,
        result: CodeResult,
        /// The result was taken from the conversation instead of a new run.
        reused: bool,
    },
    /// No assistant reply contained code; the replies are kept for debugging.
    NoCode { responses: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub task: String,
    pub termination: TerminationReason,
    pub transcript: Vec<ChatMessage>,
    pub outcome: Outcome,
}

/// One user's interactive session. The chat history is its only state and
/// lives until the session is dropped.
#[derive(Debug, Default)]
pub struct Session {
    history: Vec<ChatMessage>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Handle one task: converse, pick the newest code, and run it.
    ///
    /// History is only updated once the turn has succeeded.
    pub async fn handle_prompt<M: ChatModel, R: CodeRunner>(
        &mut self,
        agent: &Agent<M, R>,
        task: &str,
        spinner: Option<&ProgressBar>,
    ) -> Result<Turn> {
        let chat = run_group_chat(
            &agent.model,
            &agent.runner,
            &agent.extractor,
            agent.max_round,
            task,
            spinner,
        )
        .await?;

        let replies = chat.assistant_replies();
        let outcome = match select_code_with(&agent.extractor, &replies) {
            Some(code) => {
                let (result, reused) = match chat.result_for(&code) {
                    Some(result) => (result.clone(), true),
                    None => {
                        set_spinner_msg(spinner, "Executing code...");
                        (agent.runner.run(&code).await?, false)
                    }
                };

                self.history.push(ChatMessage::user(task));

                log::info!(
                    "Selected code ran with exit code {} (reused: {})",
                    result.exit_code,
                    reused
                );

                self.history.push(ChatMessage::assistant(code_request(
                    &code,
                    agent.extractor.language(),
                )));
                self.history.push(ChatMessage::executor(result.output.clone()));

                Outcome::Executed {
                    code,
                    result,
                    reused,
                }
            }
            None => {
                log::warn!("No code found in {} assistant replies", replies.len());
                self.history.push(ChatMessage::user(task));
                self.history
                    .push(ChatMessage::assistant(Error::NoCode.to_string()));

                Outcome::NoCode {
                    responses: replies.iter().map(|r| r.to_string()).collect(),
                }
            }
        };

        Ok(Turn {
            task: task.to_string(),
            termination: chat.termination,
            transcript: chat.messages,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groupchat::testing::{fenced, EchoRunner, ScriptedModel};
    use cpq_agent_core::conversation::Role;
    use cpq_agent_core::extract::python_extractor;

    fn agent(replies: &[&str]) -> Agent<ScriptedModel, EchoRunner> {
        Agent {
            model: ScriptedModel::new(replies),
            runner: EchoRunner::default(),
            extractor: python_extractor().clone(),
            max_round: 6,
        }
    }

    #[tokio::test]
    async fn test_executed_code_is_reused() {
        let agent = agent(&[fenced("print('quotes')").as_str(), "All set."]);
        let mut session = Session::new();

        let turn = session
            .handle_prompt(&agent, "list quotes", None)
            .await
            .unwrap();

        match &turn.outcome {
            Outcome::Executed {
                code,
                result,
                reused,
            } => {
                assert_eq!(code, "print('quotes')");
                assert_eq!(result.output, "ran: print('quotes')\n");
                assert!(reused);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(agent.runner.runs.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_unexecuted_code_is_run() {
        // The chat stops at the round cap right after the assistant's reply,
        // so the selected code has not been run yet.
        let agent = Agent {
            max_round: 2,
            ..agent(&[fenced("late()").as_str()])
        };
        let mut session = Session::new();

        let turn = session.handle_prompt(&agent, "task", None).await.unwrap();

        assert_eq!(turn.termination, TerminationReason::MaxRounds);
        assert!(matches!(turn.outcome, Outcome::Executed { reused: false, .. }));
        assert_eq!(*agent.runner.runs.borrow(), vec!["late()".to_string()]);
    }

    #[tokio::test]
    async fn test_no_code_keeps_responses() {
        let agent = agent(&["I need more details about the quote."]);
        let mut session = Session::new();

        let turn = session.handle_prompt(&agent, "do it", None).await.unwrap();

        match turn.outcome {
            Outcome::NoCode { responses } => {
                assert_eq!(responses, vec!["I need more details about the quote."]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(agent.runner.runs.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_history_accumulates_across_turns() {
        let agent = agent(&[fenced("one()").as_str(), "done", "no code this time"]);
        let mut session = Session::new();

        session.handle_prompt(&agent, "first", None).await.unwrap();
        session.handle_prompt(&agent, "second", None).await.unwrap();

        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::Executor,
                Role::User,
                Role::Assistant,
            ]
        );
        assert_eq!(session.history()[1].content, "```python\none()\n```");
        assert_eq!(session.history()[4].content, "No valid Python code generated");
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_history_untouched() {
        let agent = agent(&[fenced("retry()").as_str(), "done"]);
        let mut session = Session::new();

        agent.model.fail_next.set(true);
        assert!(session.handle_prompt(&agent, "broken", None).await.is_err());
        assert!(session.history().is_empty());

        session.handle_prompt(&agent, "again", None).await.unwrap();

        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Executor]);
        assert_eq!(session.history()[0].content, "again");
    }

    #[tokio::test]
    async fn test_turn_serializes_with_status() {
        let agent = agent(&["nothing"]);
        let mut session = Session::new();

        let turn = session.handle_prompt(&agent, "x", None).await.unwrap();
        let json = serde_json::to_value(&turn).unwrap();

        assert_eq!(json["outcome"]["status"], "no_code");
        assert_eq!(json["termination"], "no_code");
        assert_eq!(json["transcript"][0]["role"], "user");
    }
}
