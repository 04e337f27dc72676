use colored::Colorize;
use cpq_agent_core::conversation::{ChatMessage, Role};

use crate::prelude::{eprintln, println, *};
use crate::session::{Outcome, Turn};

pub const TITLE: &str = "SFDC Brewery Salesforce Developer Agent 🤖";

pub const WELCOME: &str = "Welcome! Describe your JIRA task below, and I'll generate and execute the corresponding Salesforce code for you.";

fn role_label(role: Role) -> String {
    match role {
        Role::User => "user".bold().bright_green().to_string(),
        Role::Assistant => "assistant".bold().bright_cyan().to_string(),
        Role::Executor => "executor".bold().bright_magenta().to_string(),
    }
}

/// Print one chat message with its role and timestamp.
pub fn print_message(message: &ChatMessage) {
    println!(
        "{} {}",
        role_label(message.role),
        format!("[{}]", message.created_at.format("%H:%M:%S")).bright_black()
    );
    println!("{}\n", message.content.trim_end());
}

pub fn print_banner() {
    println!("\n{}\n", TITLE.bold().bright_white());
    println!("{}", WELCOME);
    println!(
        "{}\n",
        "Type /history to review this session, /exit to quit.".bright_black()
    );
}

pub fn print_history(history: &[ChatMessage]) {
    if history.is_empty() {
        println!("{}", "No messages yet.".bright_black());
        return;
    }

    for message in history {
        print_message(message);
    }
}

/// Render the result of a request the way the session shows it.
pub fn print_turn(turn: &Turn, verbose: bool) -> Result<()> {
    if verbose {
        println!("{}", "Conversation:".bold().cyan());
        for message in &turn.transcript {
            print_message(message);
        }
        println!(
            "{} {}\n",
            "Stopped:".bold().cyan(),
            turn.termination.to_string().bright_black()
        );
    }

    match &turn.outcome {
        Outcome::Executed { code, result, .. } => {
            println!("{}", "Generated code:".bold().cyan());
            println!("{}\n", code.bright_white());

            let status = if result.succeeded() {
                format!("exit code {}", result.exit_code).green()
            } else if result.timed_out() {
                "timed out".yellow()
            } else {
                format!("exit code {}", result.exit_code).red()
            };
            println!("{} ({})", "Execution Result:".bold().cyan(), status);

            if result.output.trim().is_empty() {
                println!(
                    "{}",
                    "No output was returned from the code execution.".yellow()
                );
            } else {
                println!("{}", result.output.trim_end());
            }
        }
        Outcome::NoCode { responses } => {
            eprintln!("{}", Error::NoCode.to_string().red().bold());
            eprintln!("Assistant responses for debugging:");
            eprintln!("{}", serde_json::to_string_pretty(responses)?);
        }
    }

    println!();

    Ok(())
}
