use cpq_agent_core::config::AzureConfig;
use cpq_agent_core::conversation::ChatMessage;
use cpq_agent_core::llm::{
    completion_url, first_choice_content, to_wire_messages, ChatCompletionRequest,
    ChatCompletionResponse,
};
use cpq_agent_core::prompt::render_transcript;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::ollama;

use crate::prelude::*;

/// Ollama model used when `--model` is not given.
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5-coder";

/// A model that continues a conversation as the assistant.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// Which model backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Azure OpenAI deployment configured in the secrets file
    Azure,
    /// Local Ollama server
    Ollama,
}

pub enum ChatBackend {
    Azure(AzureChat),
    Ollama(OllamaChat),
}

impl ChatModel for ChatBackend {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        match self {
            ChatBackend::Azure(chat) => chat.complete(system, messages).await,
            ChatBackend::Ollama(chat) => chat.complete(system, messages).await,
        }
    }
}

// ============================================================================
// Azure OpenAI
// ============================================================================

pub struct AzureChat {
    client: reqwest::Client,
    config: AzureConfig,
}

/// Create an HTTP client that sends the Azure `api-key` header.
fn create_azure_client(config: &AzureConfig) -> Result<reqwest::Client> {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("api-key"),
        HeaderValue::from_str(&config.api_key)
            .map_err(|e| eyre!("Invalid header value: {}", e))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| eyre!("Failed to build HTTP client: {}", e))
}

impl AzureChat {
    pub fn new(config: AzureConfig) -> Result<Self> {
        let client = create_azure_client(&config)?;
        Ok(Self { client, config })
    }

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = completion_url(
            &self.config.base_url,
            &self.config.model,
            &self.config.api_version,
        );
        let request = ChatCompletionRequest {
            messages: to_wire_messages(system, messages),
            temperature: None,
        };

        log::debug!(
            "Azure chat completion: deployment={} messages={}",
            self.config.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| eyre!("Failed to send request to Azure OpenAI: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(eyre!("Azure OpenAI request failed [{}]: {}", status, body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse Azure OpenAI response: {}", e))?;

        if let Some(usage) = &completion.usage {
            log::debug!(
                "Token usage: prompt={} completion={} total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        first_choice_content(&completion).ok_or_else(|| Error::EmptyResponse.into())
    }
}

// ============================================================================
// Ollama
// ============================================================================

pub struct OllamaChat {
    client: ollama::Client,
    model: String,
}

fn create_ollama_client(ollama_url: &str) -> Result<ollama::Client> {
    use rig::client::Nothing;

    ollama::Client::builder()
        .api_key(Nothing)
        .base_url(ollama_url)
        .build()
        .map_err(|e| eyre!("Failed to create Ollama client: {}", e))
}

impl OllamaChat {
    pub fn new(ollama_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: create_ollama_client(ollama_url)?,
            model: model.to_string(),
        })
    }

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let prompt = render_transcript(messages);

        log::debug!(
            "Ollama prompt: model={} chars={}",
            self.model,
            prompt.len()
        );

        let agent = self.client.agent(&self.model).preamble(system).build();

        let response = agent
            .prompt(&prompt)
            .await
            .map_err(|e| eyre!("Model generation failed: {}", e))?;

        if response.trim().is_empty() {
            return Err(Error::EmptyResponse.into());
        }

        Ok(response)
    }
}
