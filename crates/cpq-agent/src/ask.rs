use crate::agent::AgentOptions;
use crate::display::print_turn;
use crate::prelude::{println, *};
use crate::session::{Outcome, Session};

#[derive(Debug, clap::Parser)]
#[command(name = "ask")]
#[command(about = "Run a single task and exit")]
pub struct App {
    /// The task to perform, e.g. "List the ten newest CPQ quotes"
    #[clap(env = "CPQ_AGENT_TASK")]
    pub task: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[clap(flatten)]
    pub agent: AgentOptions,
}

/// Module entry point
pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let agent = crate::agent::build(&app.agent, &global).await?;
    let mut session = Session::new();

    let spinner = new_spinner("Thinking...");
    let turn = session.handle_prompt(&agent, &app.task, Some(&spinner)).await;
    spinner.finish_and_clear();
    let turn = turn?;

    if app.json {
        let json_output = serde_json::to_string_pretty(&turn)
            .map_err(|e| eyre!("Failed to serialize output: {}", e))?;
        println!("{}", json_output);
    } else {
        print_turn(&turn, global.verbose)?;
    }

    match turn.outcome {
        Outcome::Executed { .. } => Ok(()),
        Outcome::NoCode { .. } => Err(Error::NoCode.into()),
    }
}
