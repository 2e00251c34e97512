//! HTTP enhancement services: prompt enhancement, titles, chat search,
//! podcast generation, and file processing triggers.
//!
//! Every call has an `*_or_fallback` variant. These services improve the
//! experience but are never required, so a failure is logged and the
//! caller gets something usable back.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ClientConfig;

/// Titles longer than this are cut when generated locally.
pub const FALLBACK_TITLE_CHARS: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Input must not be empty")]
    EmptyInput,
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("{endpoint} returned an unusable response: {reason}")]
    InvalidResponse {
        endpoint: &'static str,
        reason: String,
    },
}

/// One match from `search-chats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSearchResult {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Serialize)]
struct EnhanceRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnhanceResponse {
    enhanced_prompt: String,
}

#[derive(Serialize)]
struct TitleRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct TitleResponse {
    title: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ChatSearchResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PodcastRequest<'a> {
    report_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodcastResponse {
    audio_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileRequest<'a> {
    file_id: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

/// Title made from the first message when the service is unavailable.
pub fn fallback_title(message: &str) -> String {
    let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if message.chars().count() <= FALLBACK_TITLE_CHARS {
        return message;
    }
    let cut: String = message.chars().take(FALLBACK_TITLE_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Client for the enhancement HTTP endpoints.
#[derive(Clone)]
pub struct EnhancementClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl EnhancementClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let client = Self::new(config.api_base.clone());
        match &config.api_token {
            Some(token) => client.with_token(token.clone()),
            None => client,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base, endpoint)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<R, ServiceError> {
        let mut request = self
            .http
            .post(self.endpoint_url(endpoint))
            .header("User-Agent", concat!("ideaprobe/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(endpoint, "POST");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse {
                endpoint,
                reason: e.to_string(),
            })
    }

    /// Rewrite a rough idea into a sharper research prompt.
    pub async fn enhance_prompt(&self, prompt: &str) -> Result<String, ServiceError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ServiceError::EmptyInput);
        }
        let response: EnhanceResponse = self
            .post("enhance-prompt", &EnhanceRequest { prompt })
            .await?;
        non_empty("enhance-prompt", response.enhanced_prompt)
    }

    pub async fn enhance_prompt_or_fallback(&self, prompt: &str) -> String {
        match self.enhance_prompt(prompt).await {
            Ok(enhanced) => enhanced,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt enhancement failed; keeping original");
                prompt.to_string()
            }
        }
    }

    /// Short conversation title for a first message.
    pub async fn generate_title(&self, message: &str) -> Result<String, ServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::EmptyInput);
        }
        let response: TitleResponse = self
            .post("generate-title", &TitleRequest { message })
            .await?;
        non_empty("generate-title", response.title)
    }

    pub async fn generate_title_or_fallback(&self, message: &str) -> String {
        match self.generate_title(message).await {
            Ok(title) => title,
            Err(e) => {
                tracing::warn!(error = %e, "Title generation failed; using first message");
                fallback_title(message)
            }
        }
    }

    pub async fn search_chats(&self, query: &str) -> Result<Vec<ChatSearchResult>, ServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let response: SearchResponse = self.post("search-chats", &SearchRequest { query }).await?;
        Ok(response.results)
    }

    pub async fn search_chats_or_fallback(&self, query: &str) -> Vec<ChatSearchResult> {
        match self.search_chats(query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "Remote chat search failed");
                Vec::new()
            }
        }
    }

    /// Request an audio summary of a research report. Returns its URL.
    pub async fn generate_podcast(&self, report_id: &str) -> Result<String, ServiceError> {
        let report_id = report_id.trim();
        if report_id.is_empty() {
            return Err(ServiceError::EmptyInput);
        }
        let response: PodcastResponse = self
            .post("generate-podcast", &PodcastRequest { report_id })
            .await?;
        non_empty("generate-podcast", response.audio_url)
    }

    pub async fn generate_podcast_or_fallback(&self, report_id: &str) -> Option<String> {
        match self.generate_podcast(report_id).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(error = %e, "Podcast generation failed");
                None
            }
        }
    }

    /// Start text extraction. Returns the status the server reports.
    pub async fn extract_content(&self, file_id: &str) -> Result<String, ServiceError> {
        self.file_trigger("extract-content", file_id).await
    }

    /// Start embedding. Returns the status the server reports.
    pub async fn process_embeddings(&self, file_id: &str) -> Result<String, ServiceError> {
        self.file_trigger("process-embeddings", file_id).await
    }

    async fn file_trigger(&self, endpoint: &'static str, file_id: &str) -> Result<String, ServiceError> {
        let file_id = file_id.trim();
        if file_id.is_empty() {
            return Err(ServiceError::EmptyInput);
        }
        let response: StatusResponse = self.post(endpoint, &FileRequest { file_id }).await?;
        Ok(response.status)
    }
}

fn non_empty(endpoint: &'static str, value: String) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidResponse {
            endpoint,
            reason: "empty value".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
