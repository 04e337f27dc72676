use std::path::PathBuf;

use crate::prelude::*;
use clap::Parser;

mod agent;
mod ask;
mod chat;
mod config;
mod display;
mod error;
mod exec;
mod executor;
mod extract;
mod groupchat;
mod llm;
mod prelude;
mod salesforce;
mod session;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Describe a Salesforce CPQ task in plain language; an LLM assistant writes Python for it and the code is run locally"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Path to the secrets file (default: ./.cpq-agent/secrets.toml, then the user config dir)
    #[clap(long, env = "CPQ_AGENT_SECRETS", global = true)]
    secrets: Option<PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "CPQ_AGENT_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Interactive session: describe tasks, review generated code and its output
    Chat(crate::chat::App),

    /// Run a single task and exit
    Ask(crate::ask::App),

    /// Extract the first code block from a model response
    Extract(crate::extract::App),

    /// Run a code file with the same executor the agent uses
    Exec(crate::exec::App),

    /// Salesforce login and SOQL queries
    #[command(name = "sf")]
    SF(crate::salesforce::App),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Chat(sub_app) => crate::chat::run(sub_app, app.global).await,
        SubCommands::Ask(sub_app) => crate::ask::run(sub_app, app.global).await,
        SubCommands::Extract(sub_app) => crate::extract::run(sub_app, app.global).await,
        SubCommands::Exec(sub_app) => crate::exec::run(sub_app, app.global).await,
        SubCommands::SF(sub_app) => crate::salesforce::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
