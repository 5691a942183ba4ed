//! Duo push authentication.
//!
//! Each `DUO_*` secret maps an email domain to a Duo Auth API account. Users
//! are challenged on the account matching their Slack profile's email domain.

use super::Authenticator;
use crate::OutboundResponse;
use crate::command::CommandContext;
use crate::config::DuoSecret;
use crate::error::{AuthError, Result};

use anyhow::Context as _;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use std::collections::HashMap;
use std::time::Duration;

const AUTH_PATH: &str = "/auth/v2/auth";

/// A push waits for the user to act on their device, so allow well over a minute.
const PUSH_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Deserialize)]
struct DuoEnvelope {
    stat: String,
    response: Option<DuoAuthResponse>,
}

#[derive(Debug, Deserialize)]
struct DuoAuthResponse {
    result: String,
}

/// Client for one Duo Auth API account.
#[derive(Debug, Clone)]
pub struct DuoClient {
    host: String,
    ikey: String,
    skey: String,
    base_url: String,
    http: reqwest::Client,
}

impl DuoClient {
    pub fn new(secret: &DuoSecret) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PUSH_TIMEOUT)
            .build()
            .context("failed to create duo http client")?;
        Ok(Self {
            host: secret.host.to_lowercase(),
            ikey: secret.ikey.clone(),
            skey: secret.skey.clone(),
            base_url: format!("https://{}", secret.host),
            http,
        })
    }

    /// Point the client at a different server while still signing for `host`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `Authorization` header for a v2-signed request.
    fn authorization(
        &self,
        method: &str,
        path: &str,
        body: &str,
        date: &str,
    ) -> anyhow::Result<String> {
        let canonical = [date, &method.to_uppercase(), &self.host, path, body].join("\n");
        let mut mac = Hmac::<Sha512>::new_from_slice(self.skey.as_bytes())
            .context("failed to initialize duo request signer")?;
        mac.update(canonical.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        let credentials = format!("{}:{signature}", self.ikey);
        Ok(format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        ))
    }

    /// Send a push to `username`'s default device and wait for the verdict.
    ///
    /// Returns `Ok(true)` when the user approved.
    pub async fn push(&self, username: &str) -> std::result::Result<bool, AuthError> {
        let body = canonical_params(&[
            ("username", username),
            ("factor", "push"),
            ("device", "auto"),
        ]);
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S -0000")
            .to_string();
        let authorization = self.authorization("POST", AUTH_PATH, &body, &date)?;

        let response = self
            .http
            .post(format!("{}{AUTH_PATH}", self.base_url))
            .header(reqwest::header::DATE, date)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(AuthError::InvalidResponse(status));
        }

        let envelope: DuoEnvelope = response
            .json()
            .await
            .context("failed to decode duo response")?;
        if envelope.stat != "OK" {
            return Err(AuthError::CannotAuthenticate);
        }

        Ok(envelope
            .response
            .is_some_and(|response| response.result == "allow"))
    }
}

/// Sorted `key=value` pairs, percent-encoded the way Duo canonicalizes them.
fn canonical_params(params: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| {
            (
                urlencoding::encode(key).into_owned(),
                urlencoding::encode(value).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Authenticator that sends a Duo push to the invoking user.
pub struct DuoAuthenticator {
    /// Keyed by lowercase email domain.
    clients: HashMap<String, DuoClient>,
}

impl DuoAuthenticator {
    pub fn new(secrets: &[DuoSecret]) -> Result<Self> {
        if secrets.is_empty() {
            return Err(AuthError::NoSecretsProvided.into());
        }
        let clients = secrets
            .iter()
            .map(|secret| Ok((secret.domain.to_lowercase(), DuoClient::new(secret)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { clients })
    }

    /// Route every domain's requests to `base_url`.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.clients = self
            .clients
            .into_iter()
            .map(|(domain, client)| (domain, client.with_base_url(base_url)))
            .collect();
        self
    }
}

#[async_trait::async_trait]
impl Authenticator for DuoAuthenticator {
    fn name(&self) -> &str {
        "duo"
    }

    async fn authenticate(
        &self,
        ctx: &CommandContext,
        _token: Option<&str>,
        _options: &toml::Table,
    ) -> bool {
        let user = &ctx.user;
        let domain = user.email_domain().unwrap_or_default().to_lowercase();

        let Some(client) = self.clients.get(&domain) else {
            ctx.send_threaded(
                OutboundResponse::error(format!(
                    "💀 @{}: Duo in this bot is not configured for the domain: `{domain}`. \
                     It needs to be configured for you to run this command.",
                    user.name
                ))
                .with_markdown(),
            )
            .await;
            return false;
        };

        ctx.send(
            OutboundResponse::info(format!(
                "🎟 @{}: Sending a Duo notification to your device. You must approve!",
                user.name
            ))
            .with_markdown()
            .ephemeral_to(&user.id),
        )
        .await;

        let email = user.email.clone().unwrap_or_default();
        let failure = match client.push(&email).await {
            Ok(true) => None,
            Ok(false) => Some(format!(
                "💀 @{}: Your Duo request was rejected. Aborting...",
                user.name
            )),
            Err(AuthError::InvalidResponse(status)) => Some(format!(
                "💀 @{}: There was a problem communicating with Duo. Got this status: {status}. \
                 Aborting...",
                user.name
            )),
            Err(AuthError::CannotAuthenticate) => Some(format!(
                "💀 @{}: I can't Duo authenticate you. Please consult with your identity team. \
                 Aborting...",
                user.name
            )),
            Err(error) => Some(format!(
                "💀 @{}: I encountered some issue with Duo... Here are the details: ```{error}```",
                user.name
            )),
        };

        if let Some(text) = failure {
            tracing::warn!(user_id = %user.id, %domain, "duo authentication failed");
            ctx.send_threaded(OutboundResponse::error(text).with_markdown())
                .await;
            return false;
        }

        tracing::info!(user_id = %user.id, %domain, "duo authentication approved");
        ctx.send(
            OutboundResponse::success(format!(
                "🎸 @{}: Duo approved! Completing request...",
                user.name
            ))
            .with_markdown()
            .ephemeral_to(&user.id),
        )
        .await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatUser;
    use crate::messaging::memory::{MemoryMessaging, inbound};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn secret() -> DuoSecret {
        DuoSecret {
            domain: "example.com".into(),
            host: "api-xxxxxxxx.duosecurity.com".into(),
            ikey: "DIWJ8X6AEYOR5OMC6TQ1".into(),
            skey: "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef".into(),
        }
    }

    fn context(messaging: Arc<MemoryMessaging>, email: &str) -> CommandContext {
        CommandContext {
            message: inbound("C1", "U1", "!DeleteRepo netflix hubcommander"),
            user: ChatUser {
                id: "U1".into(),
                name: "alice".into(),
                email: Some(email.into()),
            },
            messaging,
        }
    }

    #[test]
    fn signs_canonical_request() {
        let client = DuoClient::new(&secret()).unwrap();
        let body = canonical_params(&[
            ("username", "alice@example.com"),
            ("factor", "push"),
            ("device", "auto"),
        ]);
        assert_eq!(
            body,
            "device=auto&factor=push&username=alice%40example.com"
        );

        let header = client
            .authorization("POST", AUTH_PATH, &body, "Tue, 21 Aug 2012 17:29:18 -0000")
            .unwrap();
        assert_eq!(
            header,
            "Basic RElXSjhYNkFFWU9SNU9NQzZUUTE6ODc0NzRmMzRlNTJkOThhN2Y1OThmODc3MWU1MzZkMDBkMDMzYjYyZTJkM2FjMzQ1ZmY2M2YwMDM5YzQ0MDkyZGRmOWMyNTEyMGZkZDFhM2RlOTNhZDE2NTQ5OWY2YmY4ZGY0NWNlNWI1YzIxYjRjODQ0MzczNDk2MTZiNjg4NzA="
        );
    }

    #[test]
    fn requires_secrets() {
        assert!(matches!(
            DuoAuthenticator::new(&[]),
            Err(crate::Error::Auth(AuthError::NoSecretsProvided))
        ));
    }

    #[tokio::test]
    async fn approved_push_passes() {
        let server = MockServer::start_async().await;
        let push = server.mock(|when, then| {
            when.method(POST)
                .path("/auth/v2/auth")
                .body_includes("factor=push")
                .body_includes("username=alice%40example.com");
            then.status(200)
                .json_body(json!({"stat": "OK", "response": {"result": "allow"}}));
        });

        let duo = DuoAuthenticator::new(&[secret()])
            .unwrap()
            .with_base_url(&server.base_url());
        let messaging = Arc::new(MemoryMessaging::new());
        let ctx = context(messaging.clone(), "alice@example.com");

        assert!(duo.authenticate(&ctx, None, &toml::Table::new()).await);
        push.assert_calls(1);

        let sent = messaging.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].text.starts_with("🎟 @alice"));
        assert_eq!(sent[0].ephemeral_user.as_deref(), Some("U1"));
        assert!(sent[1].text.contains("Duo approved!"));
    }

    #[tokio::test]
    async fn denied_and_failed_pushes_block() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/auth/v2/auth");
            then.status(200)
                .json_body(json!({"stat": "OK", "response": {"result": "deny"}}));
        });

        let duo = DuoAuthenticator::new(&[secret()])
            .unwrap()
            .with_base_url(&server.base_url());
        let messaging = Arc::new(MemoryMessaging::new());
        let ctx = context(messaging.clone(), "alice@example.com");

        assert!(!duo.authenticate(&ctx, None, &toml::Table::new()).await);
        let last = messaging.last().unwrap();
        assert!(last.text.contains("Your Duo request was rejected"));
        assert_eq!(last.thread_ts.as_deref(), Some("1700000000.000100"));
    }

    #[tokio::test]
    async fn non_ok_stat_cannot_authenticate() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/auth/v2/auth");
            then.status(200)
                .json_body(json!({"stat": "FAIL", "code": 40002, "message": "Invalid request parameters"}));
        });

        let duo = DuoAuthenticator::new(&[secret()])
            .unwrap()
            .with_base_url(&server.base_url());
        let messaging = Arc::new(MemoryMessaging::new());
        let ctx = context(messaging.clone(), "alice@example.com");

        assert!(!duo.authenticate(&ctx, None, &toml::Table::new()).await);
        assert!(messaging.last().unwrap().text.contains("I can't Duo authenticate you"));
    }

    #[tokio::test]
    async fn http_errors_report_status() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/auth/v2/auth");
            then.status(401);
        });

        let duo = DuoAuthenticator::new(&[secret()])
            .unwrap()
            .with_base_url(&server.base_url());
        let messaging = Arc::new(MemoryMessaging::new());
        let ctx = context(messaging.clone(), "alice@example.com");

        assert!(!duo.authenticate(&ctx, None, &toml::Table::new()).await);
        assert!(messaging.last().unwrap().text.contains("Got this status: 401"));
    }

    #[tokio::test]
    async fn unknown_domain_is_rejected_without_calling_duo() {
        let server = MockServer::start_async().await;
        let push = server.mock(|when, then| {
            when.method(POST).path("/auth/v2/auth");
            then.status(200);
        });

        let duo = DuoAuthenticator::new(&[secret()])
            .unwrap()
            .with_base_url(&server.base_url());
        let messaging = Arc::new(MemoryMessaging::new());
        let ctx = context(messaging.clone(), "mallory@elsewhere.org");

        assert!(!duo.authenticate(&ctx, None, &toml::Table::new()).await);
        push.assert_calls(0);
        assert_eq!(
            messaging.texts(),
            vec![
                "💀 @alice: Duo in this bot is not configured for the domain: `elsewhere.org`. \
                 It needs to be configured for you to run this command."
                    .to_string()
            ]
        );
    }
}
