//! Runs one research query end to end in the terminal.

use std::time::Duration;

use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Select};

use crate::chat::{Conversation, FeedbackHandler, TranscriptCache, TranscriptStore, TurnOutcome};
use crate::config::{ClientConfig, Settings, XdgDirs};
use crate::db::{ChatRepository, Database};
use crate::messaging::{EventBus, TerminalRenderer};
use crate::services::EnhancementClient;
use crate::stream::{ResearchClient, WsConnector};

/// Options for `probe ask`.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Resume this conversation instead of starting a new one.
    pub conversation: Option<String>,
    /// Resume the most recent conversation.
    pub continue_last: bool,
    /// Rewrite the query with the enhancement service first.
    pub enhance: bool,
    /// Answer every feedback request with this choice instead of prompting.
    pub feedback: Option<String>,
    pub hide_thoughts: bool,
}

/// Prompts on the terminal for a feedback choice.
pub struct PromptFeedback;

#[async_trait]
impl FeedbackHandler for PromptFeedback {
    async fn decide(&mut self, prompt: Option<&str>, options: &[String]) -> Option<String> {
        // Let the renderer finish drawing the request first.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let question = prompt.unwrap_or("Continue the research?").to_string();
        let mut items = options.to_vec();
        items.push("cancel".to_string());

        let picked = tokio::task::spawn_blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(question)
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await;

        match picked {
            Ok(Ok(Some(i))) if i < options.len() => Some(options[i].clone()),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Feedback prompt failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Feedback prompt task panicked");
                None
            }
        }
    }
}

/// Answers every request with a fixed choice, for scripted use.
pub struct FixedFeedback {
    pub choice: String,
}

#[async_trait]
impl FeedbackHandler for FixedFeedback {
    async fn decide(&mut self, _prompt: Option<&str>, options: &[String]) -> Option<String> {
        if options.iter().any(|o| o == &self.choice) {
            Some(self.choice.clone())
        } else {
            tracing::warn!(choice = %self.choice, ?options, "Preset feedback is not an offered option");
            None
        }
    }
}

/// Pick the conversation id for this run.
fn resolve_conversation(repo: &ChatRepository<'_>, opts: &AskOptions) -> anyhow::Result<String> {
    if let Some(id) = &opts.conversation {
        return Ok(id.clone());
    }
    if opts.continue_last {
        if let Some(id) = repo.latest_conversation()? {
            return Ok(id);
        }
        tracing::info!("No earlier conversation; starting a new one");
    }
    Ok(uuid::Uuid::new_v4().to_string())
}

/// Run `probe ask`.
pub async fn run_ask(db: &Database, query: &str, opts: AskOptions) -> anyhow::Result<TurnOutcome> {
    let settings = Settings::new(db);
    let config = ClientConfig::load(&settings)?;
    let dirs = XdgDirs::new();
    let services = EnhancementClient::from_config(&config);

    let query = if opts.enhance {
        services.enhance_prompt_or_fallback(query).await
    } else {
        query.to_string()
    };

    let titles = ChatRepository::new(db);
    let conversation_id = resolve_conversation(&titles, &opts)?;

    let store = TranscriptStore::new(conversation_id.clone())
        .with_backend(ChatRepository::new(db))
        .with_backend(TranscriptCache::new(dirs.transcripts()));

    let connector = WsConnector::new(config.research_url.clone())
        .with_connect_timeout(config.connect_timeout);

    let bus = EventBus::new();
    let renderer = TerminalRenderer::new()
        .show_thoughts(settings.show_thoughts() && !opts.hide_thoughts);
    let render_task = tokio::spawn(renderer.run_loop(bus.subscribe()));

    let mut conversation = Conversation::new(ResearchClient::new(connector), store)
        .with_events(bus.sender())
        .with_feedback_timeout(config.feedback_timeout);

    let restored = conversation.restore().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not restore earlier messages");
        0
    });
    if restored > 0 {
        bus.sender()
            .info(format!("Continuing conversation {} ({} messages)", conversation_id, restored));
    }

    let mut handler: Box<dyn FeedbackHandler> = match opts.feedback {
        Some(choice) => Box::new(FixedFeedback { choice }),
        None => Box::new(PromptFeedback),
    };

    let finished = tokio::select! {
        result = conversation.ask(&query, handler.as_mut()) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let outcome = match finished {
        Some(result) => result?,
        None => conversation
            .cancel()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Interrupted before the query was sent"))?,
    };

    if restored == 0 && titles.title(&conversation_id)?.is_none() {
        let title = services.generate_title_or_fallback(&query).await;
        titles.set_title(&conversation_id, &title)?;
        tracing::debug!(%title, "Titled conversation");
    }

    if matches!(outcome, TurnOutcome::Completed { .. }) {
        bus.sender().info(format!(
            "\nConversation: {} (resume with `probe ask --conversation {}`)",
            conversation_id, conversation_id
        ));
    }

    // Dropping every sender closes the bus and ends the render loop.
    drop(conversation);
    drop(bus);
    if let Err(e) = render_task.await {
        tracing::debug!(error = %e, "Renderer task ended abnormally");
    }

    Ok(outcome)
}
