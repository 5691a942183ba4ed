//! Travis CI commands: listing enabled orgs and activating builds on a repo.

use crate::command::validate::repo_name;
use crate::command::{
    ArgSpec, CommandContext, CommandDefinition, CommandPlugin, CommandSpec, ParsedArgs,
};
use crate::config::{TravisConfig, TravisCredential};
use crate::error::{Result, TravisError};
use crate::github::{GithubClient, OrgLookup};
use crate::{OutboundResponse, table};

use anyhow::Context as _;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const ORG_HINT: &str = "Either that org doesn't exist, or Travis CI is not enabled for it. \
                        Run `!ListTravisOrgs` to see which orgs this bot manages.";

/// Which Travis CI deployment a repository builds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// travis-ci.com, for private repositories.
    Pro,
    /// travis-ci.org, for open source.
    Public,
}

impl Endpoint {
    fn as_str(self) -> &'static str {
        match self {
            Endpoint::Pro => "pro",
            Endpoint::Public => "public",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TravisRepo {
    #[serde(default)]
    pub active: bool,
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TravisUser {
    #[serde(default)]
    is_syncing: bool,
}

/// Client for one Travis CI deployment, acting as one user.
pub struct TravisClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    user_id: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl TravisClient {
    pub fn new(base_url: &str, credential: &TravisCredential, config: &TravisConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid travis user agent")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("token {}", credential.token))
                .context("invalid travis token")?,
        );
        headers.insert("Travis-API-Version", HeaderValue::from_static("3"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to create travis api client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: credential.user.clone(),
            user_id: credential.id.clone(),
            poll_interval: Duration::from_secs(config.sync_poll_secs),
            max_polls: config.sync_max_polls,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Travis addresses repositories by their slug with the `/` encoded.
    fn repo_path(full_name: &str) -> String {
        format!("repo/{}", urlencoding::encode(full_name))
    }

    fn user_path(&self) -> String {
        format!("user/{}", urlencoding::encode(&self.user_id))
    }

    /// Ask Travis to resync with GitHub and wait until it is done.
    pub async fn sync(&self) -> std::result::Result<(), TravisError> {
        tracing::info!(user = %self.user, user_id = %self.user_id, "syncing travis ci with github");
        let response = self
            .http
            .post(self.url(&format!("{}/sync", self.user_path())))
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(TravisError::UnexpectedStatus {
                operation: "Travis CI",
                status: response.status().as_u16(),
            });
        }

        for _ in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .http
                .get(self.url(&self.user_path()))
                .send()
                .await?;
            if response.status() != StatusCode::OK {
                return Err(TravisError::UnexpectedStatus {
                    operation: "Sync",
                    status: response.status().as_u16(),
                });
            }

            let user: TravisUser = response.json().await?;
            if !user.is_syncing {
                return Ok(());
            }
            tracing::debug!(user = %self.user, "travis still syncing");
        }

        Err(TravisError::SyncTimedOut {
            user: self.user.clone(),
            polls: self.max_polls,
        })
    }

    /// `None` when Travis does not know the repository.
    pub async fn find_repo(&self, full_name: &str) -> std::result::Result<Option<TravisRepo>, TravisError> {
        let response = self.http.get(self.url(&Self::repo_path(full_name))).send().await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(TravisError::UnexpectedStatus {
                operation: "Repo Lookup",
                status: status.as_u16(),
            }),
        }
    }

    pub async fn activate(&self, full_name: &str) -> std::result::Result<(), TravisError> {
        let response = self
            .http
            .post(self.url(&format!("{}/activate", Self::repo_path(full_name))))
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(TravisError::UnexpectedStatus {
                operation: "Enable Repo",
                status: status.as_u16(),
            }),
        }
    }
}

pub struct TravisPlugin {
    github: Arc<GithubClient>,
    orgs: Arc<OrgLookup>,
    pro: Option<TravisClient>,
    public: Option<TravisClient>,
}

impl TravisPlugin {
    pub fn new(
        github: Arc<GithubClient>,
        config: &TravisConfig,
        pro: Option<&TravisCredential>,
        public: Option<&TravisCredential>,
    ) -> Result<Self> {
        Ok(Self {
            github,
            orgs: Arc::new(OrgLookup::new(config.orgs.clone())),
            pro: pro
                .map(|credential| TravisClient::new(&config.pro_url, credential, config))
                .transpose()?,
            public: public
                .map(|credential| TravisClient::new(&config.public_url, credential, config))
                .transpose()?,
        })
    }

    fn client(&self, endpoint: Endpoint) -> std::result::Result<&TravisClient, TravisError> {
        let client = match endpoint {
            Endpoint::Pro => self.pro.as_ref(),
            Endpoint::Public => self.public.as_ref(),
        };
        client.ok_or(TravisError::MissingCredentials(endpoint.as_str()))
    }

    async fn list_orgs(&self, ctx: &CommandContext) -> Result<()> {
        let table = table::simple(&["Alias", "Organization"], &self.orgs.rows());
        ctx.send_threaded(
            OutboundResponse::info(format!(
                "Travis CI is enabled on the following orgs:\n```{table}```"
            ))
            .with_markdown(),
        )
        .await;
        Ok(())
    }

    async fn enable(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let endpoint = match args.opt_string("public").as_deref() {
            Some("true") => Endpoint::Public,
            _ => Endpoint::Pro,
        };
        let name = &ctx.user.name;

        ctx.send_threaded(OutboundResponse::info(format!(
            "@{name}: Working, Please wait..."
        )))
        .await;

        let github_repo = match self.github.get_repo(&org, &repo).await {
            Ok(Some(github_repo)) => github_repo,
            Ok(None) => {
                ctx.send_threaded(OutboundResponse::error(format!(
                    "@{name}: This repository does not exist in {org}!"
                )))
                .await;
                return Ok(());
            }
            Err(error) => {
                ctx.send_threaded(OutboundResponse::error(format!(
                    "@{name}: I encountered a problem:\n\n{error}"
                )))
                .await;
                return Ok(());
            }
        };

        match self.activate(ctx, endpoint, &github_repo.full_name).await {
            Ok(Activation::Enabled) => {
                tracing::info!(%org, %repo, endpoint = endpoint.as_str(), "enabled travis ci");
                ctx.send_threaded(OutboundResponse::success(format!(
                    "@{name}: Travis CI has been enabled on {org}/{repo}.\n\n"
                )))
                .await;
            }
            Ok(Activation::AlreadyActive) => {
                ctx.send_threaded(OutboundResponse::success(format!(
                    "@{name}: Travis CI is already enabled on {org}/{repo}.\n\n"
                )))
                .await;
            }
            Ok(Activation::NotFound) => {
                ctx.send_threaded(OutboundResponse::error(format!(
                    "@{name}: Couldn't find the repo in Travis for some reason...\n\n"
                )))
                .await;
            }
            Err(error) => {
                ctx.send_threaded(OutboundResponse::error(format!(
                    "@{name}: I encountered a problem communicating with Travis CI:\n\n{error}"
                )))
                .await;
            }
        }
        Ok(())
    }

    async fn activate(
        &self,
        ctx: &CommandContext,
        endpoint: Endpoint,
        full_name: &str,
    ) -> std::result::Result<Activation, TravisError> {
        let client = self.client(endpoint)?;

        ctx.send_threaded(OutboundResponse::info(
            ":skull: Need to sync Travis CI with GitHub. Please wait...",
        ))
        .await;
        client.sync().await?;

        ctx.send_threaded(OutboundResponse::info(
            ":guitar: Synced! Going to enable Travis CI on the repo now...",
        ))
        .await;

        match client.find_repo(full_name).await? {
            None => Ok(Activation::NotFound),
            Some(travis_repo) if travis_repo.active => Ok(Activation::AlreadyActive),
            Some(_) => {
                client.activate(full_name).await?;
                Ok(Activation::Enabled)
            }
        }
    }
}

enum Activation {
    Enabled,
    AlreadyActive,
    NotFound,
}

#[async_trait::async_trait]
impl CommandPlugin for TravisPlugin {
    fn name(&self) -> &str {
        "travis_ci"
    }

    fn commands(&self) -> Vec<CommandDefinition> {
        vec![
            CommandDefinition::new(
                "!ListTravisOrgs",
                "Lists the GitHub organizations that have Travis CI enabled.",
            ),
            CommandDefinition::new("!EnableTravis", "Enables Travis CI on a GitHub Repo.").with_spec(
                CommandSpec::new(
                    "!EnableTravis",
                    "!EnableTravis <OrgWithRepo> <Repo> [--public=true]",
                    "This will enable Travis CI on a GitHub repository.",
                )
                .required(
                    ArgSpec::positional("org", "The organization that contains the repo.")
                        .validate(self.orgs.validator(ORG_HINT)),
                )
                .required(
                    ArgSpec::positional("repo", "The repository to enable Travis CI on.")
                        .validate(repo_name()),
                )
                .optional(ArgSpec::flag(
                    &["--public"],
                    "When set to true - attempts to enable Travis CI using the public travis-ci.org",
                )),
            ),
        ]
    }

    async fn execute(&self, ctx: &CommandContext, command: &str, args: ParsedArgs) -> Result<()> {
        match command {
            "!ListTravisOrgs" => self.list_orgs(ctx).await,
            "!EnableTravis" => self.enable(ctx, &args).await,
            other => Err(anyhow::anyhow!("travis plugin has no command {other}").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatUser;
    use crate::command::ArgValue;
    use crate::config::OrgConfig;
    use crate::messaging::memory::{MemoryMessaging, inbound};
    use httpmock::prelude::*;
    use serde_json::json;

    fn config(server: &MockServer) -> TravisConfig {
        TravisConfig {
            user_agent: "HubCommander".into(),
            pro_url: server.url("/pro"),
            public_url: server.url("/public"),
            sync_poll_secs: 0,
            sync_max_polls: 3,
            request_timeout_secs: 1,
            orgs: vec![OrgConfig {
                name: "Netflix".into(),
                aliases: vec!["nflx".into()],
                public_only: false,
                new_repo_teams: Vec::new(),
            }],
        }
    }

    fn credential() -> TravisCredential {
        TravisCredential {
            user: "hubcommander".into(),
            id: "42".into(),
            token: "travis-token".into(),
        }
    }

    fn plugin(server: &MockServer) -> TravisPlugin {
        let github =
            GithubClient::new(&server.url("/github"), "gh", Duration::from_secs(5)).unwrap();
        TravisPlugin::new(Arc::new(github), &config(server), Some(&credential()), None).unwrap()
    }

    fn context(messaging: Arc<MemoryMessaging>) -> CommandContext {
        CommandContext {
            message: inbound("C1", "U1", "!EnableTravis nflx hubcommander"),
            user: ChatUser {
                id: "U1".into(),
                name: "alice".into(),
                email: None,
            },
            messaging,
        }
    }

    fn enable_args(public: Option<&str>) -> ParsedArgs {
        let mut args = ParsedArgs::default();
        args.insert("org", ArgValue::Str("Netflix".into()));
        args.insert("repo", ArgValue::Str("hubcommander".into()));
        args.insert(
            "public",
            public.map_or(ArgValue::Absent, |value| ArgValue::Str(value.into())),
        );
        args
    }

    fn github_repo(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/github/repos/Netflix/hubcommander");
            then.status(200).json_body(json!({
                "name": "hubcommander",
                "full_name": "Netflix/hubcommander"
            }));
        });
    }

    #[tokio::test]
    async fn enables_inactive_repo_after_sync() {
        let server = MockServer::start_async().await;
        github_repo(&server);
        let sync = server.mock(|when, then| {
            when.method(POST)
                .path("/pro/user/42/sync")
                .header("authorization", "token travis-token")
                .header("travis-api-version", "3");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/pro/user/42");
            then.status(200).json_body(json!({ "is_syncing": false }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/pro/repo/Netflix%2Fhubcommander");
            then.status(200)
                .json_body(json!({ "active": false, "slug": "Netflix/hubcommander" }));
        });
        let activate = server.mock(|when, then| {
            when.method(POST)
                .path("/pro/repo/Netflix%2Fhubcommander/activate");
            then.status(200).json_body(json!({ "active": true }));
        });

        let messaging = Arc::new(MemoryMessaging::new());
        plugin(&server)
            .execute(&context(messaging.clone()), "!EnableTravis", enable_args(None))
            .await
            .unwrap();

        sync.assert_calls(1);
        activate.assert_calls(1);
        assert_eq!(
            messaging.texts(),
            vec![
                "@alice: Working, Please wait...",
                ":skull: Need to sync Travis CI with GitHub. Please wait...",
                ":guitar: Synced! Going to enable Travis CI on the repo now...",
                "@alice: Travis CI has been enabled on Netflix/hubcommander.\n\n",
            ]
        );
        assert!(
            messaging
                .sent()
                .iter()
                .all(|reply| reply.thread_ts.as_deref() == Some("1700000000.000100"))
        );
    }

    #[tokio::test]
    async fn reports_already_active_repo() {
        let server = MockServer::start_async().await;
        github_repo(&server);
        server.mock(|when, then| {
            when.method(POST).path("/pro/user/42/sync");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/pro/user/42");
            then.status(200).json_body(json!({ "is_syncing": false }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/pro/repo/Netflix%2Fhubcommander");
            then.status(200).json_body(json!({ "active": true }));
        });

        let messaging = Arc::new(MemoryMessaging::new());
        plugin(&server)
            .execute(&context(messaging.clone()), "!EnableTravis", enable_args(None))
            .await
            .unwrap();

        assert_eq!(
            messaging.last().unwrap().text,
            "@alice: Travis CI is already enabled on Netflix/hubcommander.\n\n"
        );
    }

    #[tokio::test]
    async fn sync_gives_up_after_max_polls() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/pro/user/42/sync");
            then.status(200).json_body(json!({}));
        });
        let poll = server.mock(|when, then| {
            when.method(GET).path("/pro/user/42");
            then.status(200).json_body(json!({ "is_syncing": true }));
        });

        let client = TravisClient::new(&server.url("/pro"), &credential(), &config(&server)).unwrap();
        let error = client.sync().await.unwrap_err();
        assert!(matches!(error, TravisError::SyncTimedOut { polls: 3, .. }));
        assert_eq!(
            error.to_string(),
            "Travis CI was still syncing the hubcommander account after 3 checks"
        );
        poll.assert_calls(3);
    }

    #[tokio::test]
    async fn slow_travis_requests_time_out() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/pro/repo/Netflix%2Fhubcommander");
            then.status(200)
                .delay(Duration::from_secs(5))
                .json_body(json!({ "active": true }));
        });

        let client = TravisClient::new(&server.url("/pro"), &credential(), &config(&server)).unwrap();
        let started = std::time::Instant::now();
        match client.find_repo("Netflix/hubcommander").await {
            Err(TravisError::Request(error)) => assert!(error.is_timeout(), "{error}"),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn public_endpoint_without_credentials_is_reported() {
        let server = MockServer::start_async().await;
        github_repo(&server);

        let messaging = Arc::new(MemoryMessaging::new());
        plugin(&server)
            .execute(
                &context(messaging.clone()),
                "!EnableTravis",
                enable_args(Some("true")),
            )
            .await
            .unwrap();

        assert_eq!(
            messaging.last().unwrap().text,
            "@alice: I encountered a problem communicating with Travis CI:\n\n\
             no Travis CI credentials are configured for the public endpoint"
        );
    }

    #[tokio::test]
    async fn lists_travis_orgs_in_thread() {
        let server = MockServer::start_async().await;
        let messaging = Arc::new(MemoryMessaging::new());
        plugin(&server)
            .execute(&context(messaging.clone()), "!ListTravisOrgs", ParsedArgs::default())
            .await
            .unwrap();

        let reply = messaging.last().unwrap();
        assert!(reply.text.starts_with("Travis CI is enabled on the following orgs:\n```"));
        assert!(reply.text.contains("nflx     Netflix"));
        assert_eq!(reply.thread_ts.as_deref(), Some("1700000000.000100"));
    }
}
