use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use cpq_agent_core::execution::{script_path, CodeResult, ExecutionError, TIMEOUT_EXIT_CODE};
use tempfile::TempDir;

use crate::prelude::*;

/// Something that can run a code block and report what happened.
#[allow(async_fn_in_trait)]
pub trait CodeRunner {
    async fn run(&self, code: &str) -> Result<CodeResult>;
}

/// Runs code with a local interpreter inside a working directory.
///
/// Each block is written to its own file and executed with a timeout. The
/// child is killed when the timeout fires.
#[derive(Debug)]
pub struct LocalExecutor {
    work_dir: PathBuf,
    // Keeps a temporary working directory alive for the executor's lifetime.
    _temp_dir: Option<TempDir>,
    timeout: Duration,
    language: String,
    command: Vec<String>,
    env: Vec<(String, String)>,
}

impl LocalExecutor {
    /// Create an executor. Without `work_dir` a temporary directory is used.
    pub fn new(work_dir: Option<PathBuf>, timeout: Duration, language: &str) -> Result<Self> {
        let (work_dir, temp_dir) = match work_dir {
            Some(dir) => {
                std::fs::create_dir_all(&dir).with_context(|| {
                    format!("Failed to create working directory '{}'", dir.display())
                })?;
                (dir, None)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("cpq-agent-")
                    .tempdir()
                    .context("Failed to create temporary working directory")?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        Ok(Self {
            work_dir,
            _temp_dir: temp_dir,
            timeout,
            language: language.to_string(),
            command: Vec::new(),
            env: Vec::new(),
        })
    }

    /// Set the interpreter command, e.g. `"uv run python"`.
    ///
    /// Without a command the first of `python3` / `python` found on `PATH`
    /// is used.
    pub fn with_interpreter(mut self, command: Option<&str>) -> Result<Self> {
        self.command = match command {
            Some(command) => {
                let parts = shlex::split(command)
                    .filter(|parts| !parts.is_empty())
                    .ok_or_else(|| eyre!("Invalid interpreter command: {}", command))?;
                parts
            }
            None => {
                let python = which::which("python3")
                    .or_else(|_| which::which("python"))
                    .map_err(|_| Error::InterpreterNotFound("python3".to_string()))?;
                vec![python.display().to_string()]
            }
        };

        Ok(self)
    }

    /// Extra environment variables for every run.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write `code` to disk and run it.
    ///
    /// Problems with the code itself (for example a filename directive that
    /// points outside the working directory) come back as a failed
    /// `CodeResult`; only infrastructure failures are errors.
    pub async fn execute(&self, code: &str) -> Result<CodeResult> {
        let relative = match script_path(code, &self.language) {
            Ok(path) => path,
            Err(err @ (ExecutionError::PathEscapesWorkDir(_) | ExecutionError::NotAFile(_))) => {
                return Ok(CodeResult {
                    exit_code: 1,
                    output: err.to_string(),
                    code_file: PathBuf::new(),
                });
            }
            Err(err) => return Err(eyre!(err)),
        };

        let code_file = self.work_dir.join(&relative);
        if let Some(parent) = code_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create '{}'", parent.display()))?;
        }
        tokio::fs::write(&code_file, code)
            .await
            .with_context(|| format!("Failed to write '{}'", code_file.display()))?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_eyre("No interpreter configured")?;

        log::info!(
            "Executing {} with {} (timeout {}s)",
            code_file.display(),
            program,
            self.timeout.as_secs()
        );

        let child = tokio::process::Command::new(program)
            .args(args)
            .arg(&relative)
            .current_dir(&self.work_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start interpreter '{}'", program))?;

        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.context("Failed to wait for interpreter")?;
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));

                CodeResult {
                    exit_code: output.status.code().unwrap_or(-1),
                    output: text,
                    code_file,
                }
            }
            Err(_) => {
                log::warn!("Execution timed out after {}s", self.timeout.as_secs());
                CodeResult {
                    exit_code: TIMEOUT_EXIT_CODE,
                    output: "Timeout".to_string(),
                    code_file,
                }
            }
        };

        log::debug!("Execution finished with exit code {}", result.exit_code);

        Ok(result)
    }
}

impl CodeRunner for LocalExecutor {
    async fn run(&self, code: &str) -> Result<CodeResult> {
        self.execute(code).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_executor(timeout: Duration) -> LocalExecutor {
        LocalExecutor::new(None, timeout, "sh")
            .unwrap()
            .with_interpreter(Some("sh"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let executor = shell_executor(Duration::from_secs(10));
        let result = executor.execute("echo out\necho err 1>&2").await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("out\n"));
        assert!(result.output.contains("err\n"));
        assert!(result.code_file.starts_with(executor.work_dir()));
    }

    #[tokio::test]
    async fn test_nonzero_exit_code() {
        let executor = shell_executor(Duration::from_secs(10));
        let result = executor.execute("exit 3").await.unwrap();

        assert_eq!(result.exit_code, 3);
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let executor = shell_executor(Duration::from_millis(200));
        let result = executor.execute("sleep 5").await.unwrap();

        assert!(result.timed_out());
        assert_eq!(result.output, "Timeout");
    }

    #[tokio::test]
    async fn test_environment_is_passed() {
        let executor = shell_executor(Duration::from_secs(10)).with_env(vec![(
            "SF_INSTANCE_URL".to_string(),
            "https://brewery.my.salesforce.com".to_string(),
        )]);
        let result = executor.execute("echo $SF_INSTANCE_URL").await.unwrap();

        assert_eq!(result.output.trim(), "https://brewery.my.salesforce.com");
    }

    #[tokio::test]
    async fn test_filename_directive_places_file() {
        let executor = shell_executor(Duration::from_secs(10));
        let code = "# filename: jobs/report.sh\necho done";
        let result = executor.execute(code).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.code_file, executor.work_dir().join("jobs/report.sh"));
        assert_eq!(std::fs::read_to_string(&result.code_file).unwrap(), code);
    }

    #[tokio::test]
    async fn test_escaping_filename_is_reported_not_run() {
        let executor = shell_executor(Duration::from_secs(10));
        let result = executor
            .execute("# filename: ../outside.sh\necho nope")
            .await
            .unwrap();

        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("escapes the working directory"));
    }

    #[tokio::test]
    async fn test_directory_filename_is_reported_not_run() {
        let executor = shell_executor(Duration::from_secs(10));

        for code in ["# filename: .\necho hi", "# filename: sub/\necho hi"] {
            let result = executor.execute(code).await.unwrap();
            assert_eq!(result.exit_code, 1, "code {code:?}");
            assert!(result.output.contains("does not name a file"));
        }
    }

    #[tokio::test]
    async fn test_explicit_work_dir_is_created() {
        let base = TempDir::new().unwrap();
        let dir = base.path().join("runs");
        let executor = LocalExecutor::new(Some(dir.clone()), Duration::from_secs(10), "sh")
            .unwrap()
            .with_interpreter(Some("sh"))
            .unwrap();

        let result = executor.execute("pwd").await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn test_empty_interpreter_rejected() {
        let executor = LocalExecutor::new(None, Duration::from_secs(1), "python").unwrap();
        assert!(executor.with_interpreter(Some("   ")).is_err());
    }
}
