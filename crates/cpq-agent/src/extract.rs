use std::path::PathBuf;

use cpq_agent_core::extract::{CodeExtractor, TagStripping, DEFAULT_LANGUAGE};
use serde::Serialize;

use crate::prelude::{println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "extract")]
#[command(about = "Extract the first code block from a model response")]
pub struct App {
    /// File containing the response (default: stdin)
    pub file: Option<PathBuf>,

    /// Language tag of the fenced block to prefer
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// Only strip a leading language tag when it is a whole word
    #[arg(long)]
    pub word_boundary: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ExtractOutput {
    language: String,
    found: bool,
    code: Option<String>,
}

async fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read file '{}': {}", path.display(), e)),
        None => {
            use tokio::io::AsyncReadExt;

            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read from stdin")?;
            Ok(input)
        }
    }
}

/// Module entry point
pub async fn run(app: App, _global: crate::Global) -> Result<()> {
    let response = read_input(app.file.as_ref()).await?;

    let stripping = if app.word_boundary {
        TagStripping::WordBoundary
    } else {
        TagStripping::Naive
    };
    let extractor = CodeExtractor::new(&app.language)
        .map_err(|e| eyre!("Invalid language '{}': {}", app.language, e))?
        .with_stripping(stripping);

    let code = extractor.extract(&response);
    log::debug!("Extraction over {} chars found code: {}", response.len(), code.is_some());

    if app.json {
        let output = ExtractOutput {
            language: app.language,
            found: code.is_some(),
            code: code.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(code) = &code {
        println!("{}", code);
    }

    match code {
        Some(_) => Ok(()),
        None => Err(Error::NoCodeBlock.into()),
    }
}
