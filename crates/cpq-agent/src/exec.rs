use std::path::PathBuf;

use cpq_agent_core::execution::{format_executor_reply, CodeResult};

use crate::agent::ExecutorOptions;
use crate::prelude::{println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "exec")]
#[command(about = "Run a code file the way generated code is run")]
pub struct App {
    /// File with the code to run
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[clap(flatten)]
    pub executor: ExecutorOptions,
}

/// Module entry point
pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let code = tokio::fs::read_to_string(&app.file)
        .await
        .map_err(|e| eyre!("Failed to read file '{}': {}", app.file.display(), e))?;

    let secrets = crate::config::load(&global)?;
    let executor = crate::agent::build_executor(&app.executor, &secrets, &global).await?;

    let spinner = new_spinner("Executing code...");
    let result = executor.execute(&code).await;
    spinner.finish_and_clear();
    let result = result?;

    if app.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if global.verbose {
        println!("{}", format_executor_reply(&result));
    } else {
        anstream::print!("{}", result.output);
    }

    exit_status(&result)
}

fn exit_status(result: &CodeResult) -> Result<()> {
    if result.succeeded() {
        Ok(())
    } else {
        Err(Error::ExecutionFailed(result.exit_code).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32) -> CodeResult {
        CodeResult {
            exit_code,
            output: String::new(),
            code_file: PathBuf::from("tmp_code.py"),
        }
    }

    #[test]
    fn test_exit_status() {
        assert!(exit_status(&result(0)).is_ok());

        let err = exit_status(&result(124)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ExecutionFailed(124))
        ));
    }
}
