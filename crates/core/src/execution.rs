//! Pure helpers for local code execution.
//!
//! Naming of script files, the executed-code result model, and the text the
//! executor sends back into the conversation.

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Exit code reported when a run is killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Default execution timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Filename directive escapes the working directory: {0}")]
    PathEscapesWorkDir(String),

    #[error("Filename directive does not name a file: {0}")]
    NotAFile(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Outcome of running one code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeResult {
    pub exit_code: i32,
    pub output: String,
    pub code_file: PathBuf,
}

impl CodeResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }
}

/// File extension for a supported language tag.
pub fn file_extension(language: &str) -> Result<&'static str, ExecutionError> {
    match language.to_lowercase().as_str() {
        "python" | "py" | "python3" => Ok("py"),
        "sh" | "bash" | "shell" => Ok("sh"),
        other => Err(ExecutionError::UnsupportedLanguage(other.to_string())),
    }
}

/// Read a `# filename: <name>` directive from the first line of `code`.
pub fn filename_directive(code: &str) -> Option<String> {
    let first_line = code.lines().next()?;
    let re = Regex::new(r"^\s*#\s*filename:\s*(\S.*?)\s*$").ok()?;

    re.captures(first_line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Relative path (inside the working directory) where `code` is written.
///
/// Uses the filename directive when present, otherwise
/// `tmp_code_<md5 of code>.<ext>`.
pub fn script_path(code: &str, language: &str) -> Result<PathBuf, ExecutionError> {
    if let Some(name) = filename_directive(code) {
        let path = Path::new(&name);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if escapes {
            return Err(ExecutionError::PathEscapesWorkDir(name));
        }

        // `sub/` and `sub/.` parse to the same components as `sub`.
        let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
        let has_file = path.components().any(|c| matches!(c, Component::Normal(_)));
        if !has_file || last.is_empty() || last == "." {
            return Err(ExecutionError::NotAFile(name));
        }

        return Ok(path.to_path_buf());
    }

    let extension = file_extension(language)?;
    let digest = md5::compute(code.as_bytes());

    Ok(PathBuf::from(format!("tmp_code_{:x}.{}", digest, extension)))
}

/// Message the executor posts back into the chat after a run.
pub fn format_executor_reply(result: &CodeResult) -> String {
    let status = if result.succeeded() {
        "execution succeeded"
    } else {
        "execution failed"
    };

    format!(
        "exitcode: {} ({})\nCode output: {}",
        result.exit_code, status, result.output
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, output: &str) -> CodeResult {
        CodeResult {
            exit_code,
            output: output.to_string(),
            code_file: PathBuf::from("tmp_code_x.py"),
        }
    }

    // ============================================================================
    // script_path tests
    // ============================================================================

    #[test]
    fn test_script_path_uses_md5() {
        let code = "print('hello')";
        let expected = format!("tmp_code_{:x}.py", md5::compute(code.as_bytes()));
        assert_eq!(script_path(code, "python").unwrap(), PathBuf::from(expected));
    }

    #[test]
    fn test_script_path_is_deterministic() {
        let a = script_path("x = 1", "python").unwrap();
        let b = script_path("x = 1", "python").unwrap();
        let c = script_path("x = 2", "python").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_script_path_shell_extension() {
        let path = script_path("echo hi", "bash").unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("sh"));
    }

    #[test]
    fn test_script_path_unsupported_language() {
        assert_eq!(
            script_path("fn main() {}", "rust"),
            Err(ExecutionError::UnsupportedLanguage("rust".to_string()))
        );
    }

    #[test]
    fn test_script_path_from_directive() {
        let code = "# filename: quotes/report.py\nprint(1)";
        assert_eq!(
            script_path(code, "python").unwrap(),
            PathBuf::from("quotes/report.py")
        );
    }

    #[test]
    fn test_script_path_directive_parent_dir_rejected() {
        let code = "# filename: ../evil.py\nprint(1)";
        assert!(matches!(
            script_path(code, "python"),
            Err(ExecutionError::PathEscapesWorkDir(_))
        ));
    }

    #[test]
    fn test_script_path_directive_absolute_rejected() {
        let code = "# filename: /etc/evil.py\nprint(1)";
        assert!(matches!(
            script_path(code, "python"),
            Err(ExecutionError::PathEscapesWorkDir(_))
        ));
    }

    #[test]
    fn test_script_path_directive_must_name_a_file() {
        for name in [".", "./", "sub/", "sub/.", "sub\\"] {
            let code = format!("# filename: {name}\nprint(1)");
            assert_eq!(
                script_path(&code, "python"),
                Err(ExecutionError::NotAFile(name.to_string())),
                "directive {name:?}"
            );
        }
    }

    #[test]
    fn test_script_path_directive_current_dir_prefix_allowed() {
        let code = "# filename: ./jobs/run.py\nprint(1)";
        assert_eq!(
            script_path(code, "python").unwrap(),
            PathBuf::from("./jobs/run.py")
        );
    }

    // ============================================================================
    // filename_directive tests
    // ============================================================================

    #[test]
    fn test_filename_directive_only_first_line() {
        assert_eq!(filename_directive("print(1)\n# filename: late.py"), None);
    }

    #[test]
    fn test_filename_directive_spacing() {
        assert_eq!(
            filename_directive("#filename:   job.py  \nprint(1)"),
            Some("job.py".to_string())
        );
    }

    #[test]
    fn test_filename_directive_empty_code() {
        assert_eq!(filename_directive(""), None);
    }

    // ============================================================================
    // format_executor_reply tests
    // ============================================================================

    #[test]
    fn test_reply_success() {
        assert_eq!(
            format_executor_reply(&result(0, "42\n")),
            "exitcode: 0 (execution succeeded)\nCode output: 42\n"
        );
    }

    #[test]
    fn test_reply_failure() {
        let reply = format_executor_reply(&result(1, "Traceback (most recent call last):"));
        assert!(reply.starts_with("exitcode: 1 (execution failed)\n"));
    }

    #[test]
    fn test_timeout_flags() {
        let r = result(TIMEOUT_EXIT_CODE, "Timeout");
        assert!(r.timed_out());
        assert!(!r.succeeded());
    }
}
