#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No valid Python code generated")]
    NoCode,

    #[error("No code block found")]
    NoCodeBlock,

    #[error("Execution failed with exit code {0}")]
    ExecutionFailed(i32),

    #[error("The model returned an empty response")]
    EmptyResponse,

    #[error("Interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("Secrets file not found: {0}")]
    SecretsNotFound(String),
}
