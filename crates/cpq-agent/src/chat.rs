use std::io::Write;

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::AgentOptions;
use crate::display::{print_banner, print_history, print_turn};
use crate::prelude::{eprintln, *};
use crate::session::Session;

#[derive(Debug, clap::Parser)]
#[command(name = "chat")]
#[command(about = "Start an interactive session")]
pub struct App {
    #[clap(flatten)]
    pub agent: AgentOptions,
}

/// Commands typed at the session prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    History,
    Empty,
    Task(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/exit" | "/quit" => Input::Exit,
        "/history" => Input::History,
        task => Input::Task(task),
    }
}

fn print_prompt() -> Result<()> {
    anstream::print!("{} ", "Describe your Salesforce task:".bold().bright_green());
    std::io::stdout().flush()?;
    Ok(())
}

/// Module entry point
pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let agent = crate::agent::build(&app.agent, &global).await?;
    let mut session = Session::new();

    print_banner();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_prompt()?;

        let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from stdin")?
        else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::History => print_history(session.history()),
            Input::Task(task) => {
                let spinner = new_spinner("Thinking...");
                let turn = session.handle_prompt(&agent, task, Some(&spinner)).await;
                spinner.finish_and_clear();

                match turn {
                    Ok(turn) => print_turn(&turn, global.verbose)?,
                    Err(err) => eprintln!("{} {:#}\n", "Error:".red().bold(), err),
                }
            }
        }
    }

    log::debug!(
        "Session ended with {} message(s)",
        session.history().len()
    );

    Ok(())
}
