use std::fs;
use std::path::{Path, PathBuf};

use cpq_agent_core::config::{parse_secrets, SecretOverrides, Secrets};

use crate::prelude::{eprintln, *};

/// Secrets file name looked up in the default locations.
const SECRETS_FILE: &str = "secrets.toml";

/// Project-local directory holding the secrets file.
const LOCAL_DIR: &str = ".cpq-agent";

/// Candidate secrets locations, in lookup order.
fn candidate_paths(cwd: &Path, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = vec![cwd.join(LOCAL_DIR).join(SECRETS_FILE)];

    if let Some(dir) = config_dir {
        candidates.push(dir.join("cpq-agent").join(SECRETS_FILE));
    }

    candidates
}

/// Resolve which secrets file to read.
///
/// An explicit path must exist. Otherwise the first existing default location
/// wins, and `None` means configuration comes from the environment only.
fn find_secrets_file(
    explicit: Option<&Path>,
    cwd: &Path,
    config_dir: Option<&Path>,
) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::SecretsNotFound(path.display().to_string()).into());
        }
        return Ok(Some(path.to_path_buf()));
    }

    Ok(candidate_paths(cwd, config_dir)
        .into_iter()
        .find(|path| path.is_file()))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Overrides read from the environment.
fn env_overrides() -> SecretOverrides {
    SecretOverrides {
        salesforce_username: env_var("SALESFORCE_USERNAME"),
        salesforce_password: env_var("SALESFORCE_PASSWORD"),
        salesforce_security_token: env_var("SALESFORCE_SECURITY_TOKEN"),
        salesforce_domain: env_var("SALESFORCE_DOMAIN"),
        azure_api_key: env_var("AZURE_OPENAI_API_KEY"),
        azure_base_url: env_var("AZURE_OPENAI_ENDPOINT"),
        azure_api_version: env_var("AZURE_OPENAI_API_VERSION"),
        azure_model: env_var("AZURE_OPENAI_MODEL"),
    }
}

fn read_secrets(path: Option<&Path>) -> Result<Secrets> {
    let Some(path) = path else {
        return Ok(Secrets::default());
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read secrets file '{}'", path.display()))?;

    parse_secrets(&contents)
        .with_context(|| format!("Failed to parse secrets file '{}'", path.display()))
}

/// Load secrets from disk and apply environment overrides.
pub fn load(global: &crate::Global) -> Result<Secrets> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config_dir = dirs_next::config_dir();

    let path = find_secrets_file(global.secrets.as_deref(), &cwd, config_dir.as_deref())?;

    match &path {
        Some(path) => log::debug!("Loading secrets from {}", path.display()),
        None => log::debug!("No secrets file found; using environment only"),
    }

    if global.verbose {
        match &path {
            Some(path) => eprintln!("Secrets: {}", path.display()),
            None => eprintln!("Secrets: environment only"),
        }
    }

    Ok(read_secrets(path.as_deref())?.with_overrides(env_overrides()))
}
