//! Slack messaging adapter using slack-morphism.
//!
//! Inbound messages arrive over Socket Mode. Only plain `message` events are
//! forwarded: edits, deletes and bot messages carry a subtype and are dropped,
//! as are messages the bot posted itself.
//!
//! Replies are posted with `chat.postMessage`, or `chat.postEphemeral` when the
//! response targets a single user. Styled replies are wrapped in one coloured
//! attachment; raw replies are plain message text.

use crate::error::MessagingError;
use crate::messaging::traits::{InboundStream, Messaging};
use crate::{ChatUser, InboundMessage, OutboundResponse};

use anyhow::Context as _;
use slack_morphism::prelude::*;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

/// State shared with socket mode callbacks via `SlackClientEventsUserState`.
struct SlackAdapterState {
    inbound_tx: mpsc::Sender<InboundMessage>,
    bot_user_id: String,
}

/// Slack adapter.
pub struct SlackAdapter {
    app_token: String,
    /// Shared HTTP client for REST calls. The socket mode listener owns its own.
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

impl SlackAdapter {
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> anyhow::Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("failed to create slack HTTP connector")?,
        ));
        let token = SlackApiToken::new(SlackApiTokenValue(bot_token.into()));
        Ok(Self {
            app_token: app_token.into(),
            client,
            token,
            shutdown_tx: Arc::new(RwLock::new(None)),
        })
    }

    fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.token)
    }
}

// ---------------------------------------------------------------------------
// Inbound event handlers (fn pointers, as slack-morphism requires)
// ---------------------------------------------------------------------------

async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    match event.event {
        SlackEventCallbackBody::Message(msg) => handle_message_event(msg, states).await,
        _ => Ok(()),
    }
}

async fn handle_message_event(
    msg_event: SlackMessageEvent,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    // Skip message edits / deletes / bot_message subtypes
    if msg_event.subtype.is_some() {
        return Ok(());
    }

    let state_guard = states.read().await;
    let Some(adapter_state) = state_guard.get_user_state::<Arc<SlackAdapterState>>() else {
        tracing::error!("slack adapter state missing from listener environment");
        return Ok(());
    };

    let Some(user_id) = msg_event.sender.user.as_ref().map(|u| u.0.clone()) else {
        return Ok(()); // system message
    };
    if user_id == adapter_state.bot_user_id {
        return Ok(());
    }

    let Some(channel_id) = msg_event.origin.channel.as_ref().map(|c| c.0.clone()) else {
        return Ok(());
    };

    let text = msg_event
        .content
        .as_ref()
        .and_then(|content| content.text.clone())
        .unwrap_or_default();

    let inbound = InboundMessage {
        id: msg_event.origin.ts.0.clone(),
        channel_id,
        thread_ts: msg_event.origin.thread_ts.as_ref().map(|ts| ts.0.clone()),
        user_id,
        text,
        timestamp: chrono::Utc::now(),
    };

    if let Err(error) = adapter_state.inbound_tx.send(inbound).await {
        tracing::warn!(%error, "failed to send inbound message from Slack");
    }

    Ok(())
}

fn slack_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::warn!(error = %err, "slack socket mode error");
    HttpStatusCode::OK
}

// ---------------------------------------------------------------------------
// Messaging trait impl
// ---------------------------------------------------------------------------

impl Messaging for SlackAdapter {
    fn name(&self) -> &str {
        "slack"
    }

    async fn start(&self) -> crate::Result<InboundStream> {
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let auth_response = self
            .session()
            .auth_test()
            .await
            .context("failed to call auth.test for bot user ID")?;
        let bot_user_id = auth_response.user_id.0.clone();
        tracing::info!(bot_user_id = %bot_user_id, "slack bot user ID resolved");

        let adapter_state = Arc::new(SlackAdapterState {
            inbound_tx,
            bot_user_id,
        });

        let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

        // The listener keeps a persistent WebSocket open, so it gets its own client.
        let listener_client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new()
                .context("failed to create slack socket mode connector")?,
        ));

        let listener_environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(listener_client)
                .with_error_handler(slack_error_handler)
                .with_user_state(adapter_state),
        );

        let listener = SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment,
            callbacks,
        );

        let app_token = SlackApiToken::new(SlackApiTokenValue(self.app_token.clone()));

        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                tracing::error!(%error, "failed to start slack socket mode listener");
                return;
            }

            tracing::info!("slack socket mode connected");

            tokio::select! {
                exit_code = listener.serve() => {
                    tracing::info!(exit_code, "slack socket mode listener stopped");
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("slack socket mode shutting down");
                    listener.shutdown().await;
                }
            }
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(
            inbound_rx,
        )))
    }

    async fn respond(
        &self,
        message: &InboundMessage,
        response: OutboundResponse,
    ) -> crate::Result<()> {
        let session = self.session();
        let channel_id = SlackChannelId(message.channel_id.clone());
        let thread_ts = response.thread_ts.clone().map(SlackTs);
        let content = build_content(&response);

        match response.ephemeral_user {
            Some(user_id) => {
                let req = SlackApiChatPostEphemeralRequest::new(
                    channel_id,
                    SlackUserId(user_id),
                    content,
                )
                .opt_thread_ts(thread_ts);
                session
                    .chat_post_ephemeral(&req)
                    .await
                    .context("failed to send slack ephemeral message")?;
            }
            None => {
                let req = SlackApiChatPostMessageRequest::new(channel_id, content)
                    .opt_thread_ts(thread_ts);
                session
                    .chat_post_message(&req)
                    .await
                    .context("failed to send slack message")?;
            }
        }

        Ok(())
    }

    async fn user_info(&self, user_id: &str) -> crate::Result<ChatUser> {
        let response = self
            .session()
            .users_info(&SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_string())))
            .await
            .map_err(|error| MessagingError::UserLookup {
                user_id: user_id.to_string(),
                reason: error.to_string(),
            })?;

        Ok(chat_user_from_slack(&response.user, user_id))
    }

    async fn health_check(&self) -> crate::Result<()> {
        self.session()
            .api_test(&SlackApiTestRequest::new())
            .await
            .context("slack health check failed")?;
        Ok(())
    }

    async fn shutdown(&self) -> crate::Result<()> {
        signal_shutdown(&self.shutdown_tx).await;
        tracing::info!("slack adapter shut down");
        Ok(())
    }
}

/// Take the listener's shutdown sender and fire it. Returns whether a running
/// listener received the signal.
async fn signal_shutdown(slot: &RwLock<Option<mpsc::Sender<()>>>) -> bool {
    let Some(tx) = slot.write().await.take() else {
        return false;
    };
    match tx.send(()).await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(%error, "slack listener was already gone at shutdown");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Slack attachment JSON for a styled reply, or `None` for raw text.
fn attachment_json(response: &OutboundResponse) -> Option<serde_json::Value> {
    let color = response.style.color()?;
    let mut attachment = serde_json::json!({
        "text": response.text,
        "fallback": response.text,
        "color": color,
    });
    if response.markdown {
        attachment["mrkdwn_in"] = serde_json::json!(["text"]);
    }
    Some(attachment)
}

fn build_content(response: &OutboundResponse) -> SlackMessageContent {
    let Some(attachment) = attachment_json(response) else {
        return SlackMessageContent::new().with_text(response.text.clone());
    };

    match serde_json::from_value::<SlackMessageAttachment>(attachment) {
        Ok(attachment) => SlackMessageContent::new()
            .with_text(" ".to_string())
            .with_attachments(vec![attachment]),
        Err(error) => {
            tracing::warn!(%error, "failed to build slack attachment, sending plain text");
            SlackMessageContent::new().with_text(response.text.clone())
        }
    }
}

fn chat_user_from_slack(user: &SlackUser, user_id: &str) -> ChatUser {
    let email = user
        .profile
        .as_ref()
        .and_then(|profile| serde_json::to_value(profile).ok())
        .and_then(|profile| {
            profile
                .get("email")
                .and_then(|email| email.as_str())
                .map(str::to_string)
        });

    let name = user
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| user_id.to_string());

    ChatUser {
        id: user_id.to_string(),
        name,
        email,
    }
}
