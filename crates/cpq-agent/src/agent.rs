use std::path::PathBuf;
use std::time::Duration;

use cpq_agent_core::config::Secrets;
use cpq_agent_core::extract::CodeExtractor;

use crate::executor::LocalExecutor;
use crate::llm::{AzureChat, Backend, ChatBackend, OllamaChat, DEFAULT_OLLAMA_MODEL};
use crate::prelude::{eprintln, *};
use crate::session::Agent;

/// Options for running generated code.
#[derive(Debug, Clone, clap::Args)]
pub struct ExecutorOptions {
    /// Execution timeout in seconds (default: 30)
    #[clap(long, env = "CPQ_AGENT_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Directory where generated code is written and run (default: a temporary directory)
    #[clap(long, env = "CPQ_AGENT_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Interpreter command, e.g. "uv run python" (default: python3 on PATH)
    #[clap(long, env = "CPQ_AGENT_PYTHON")]
    pub python: Option<String>,

    /// Do not log in to Salesforce; executed code gets no SF_* variables
    #[clap(long)]
    pub offline: bool,
}

/// Options for the model and the conversation.
#[derive(Debug, Clone, clap::Args)]
pub struct AgentOptions {
    /// Model backend
    #[clap(long, env = "CPQ_AGENT_BACKEND", value_enum, default_value = "azure")]
    pub backend: Backend,

    /// Azure deployment or Ollama model name
    #[clap(long, env = "CPQ_AGENT_MODEL")]
    pub model: Option<String>,

    /// Ollama base URL
    #[clap(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Maximum number of messages in one conversation (default: 6)
    #[clap(long, env = "CPQ_AGENT_MAX_ROUND")]
    pub max_round: Option<usize>,

    #[clap(flatten)]
    pub executor: ExecutorOptions,
}

fn build_model(options: &AgentOptions, secrets: &Secrets) -> Result<ChatBackend> {
    match options.backend {
        Backend::Azure => {
            let mut azure = secrets.azure()?.clone();
            if let Some(model) = &options.model {
                azure.model = model.clone();
            }
            log::debug!("Using Azure deployment {}", azure.model);
            Ok(ChatBackend::Azure(AzureChat::new(azure)?))
        }
        Backend::Ollama => {
            let model = options.model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL);
            log::debug!("Using Ollama model {} at {}", model, options.ollama_url);
            Ok(ChatBackend::Ollama(OllamaChat::new(&options.ollama_url, model)?))
        }
    }
}

/// Build the executor, logging in to Salesforce unless running offline.
pub async fn build_executor(
    options: &ExecutorOptions,
    secrets: &Secrets,
    global: &crate::Global,
) -> Result<LocalExecutor> {
    let timeout = Duration::from_secs(options.timeout.unwrap_or(secrets.agent.timeout_secs));

    let mut executor =
        LocalExecutor::new(options.work_dir.clone(), timeout, &secrets.agent.language)?
            .with_interpreter(options.python.as_deref())?;

    if !options.offline {
        let credentials = secrets.salesforce()?;
        let session = crate::salesforce::login(credentials).await?;
        log::info!("Logged in to Salesforce at {}", session.instance_url);
        executor = executor.with_env(crate::salesforce::session_env(credentials, &session));
    }

    if global.verbose {
        eprintln!("Working directory: {}", executor.work_dir().display());
        eprintln!("Timeout: {}s", executor.timeout().as_secs());
    }

    Ok(executor)
}

/// Load configuration and assemble the model, executor and extractor.
pub async fn build(
    options: &AgentOptions,
    global: &crate::Global,
) -> Result<Agent<ChatBackend, LocalExecutor>> {
    let secrets = crate::config::load(global)?;

    let model = build_model(options, &secrets)?;
    let runner = build_executor(&options.executor, &secrets, global).await?;
    let extractor = CodeExtractor::new(&secrets.agent.language)
        .map_err(|e| eyre!("Invalid language '{}': {}", secrets.agent.language, e))?;

    Ok(Agent {
        model,
        runner,
        extractor,
        max_round: options.max_round.unwrap_or(secrets.agent.max_round),
    })
}
