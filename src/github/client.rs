//! Thin GitHub REST v3 client.
//!
//! Each call checks the status codes GitHub documents for it; anything else
//! becomes [`GithubError::UnexpectedStatus`] naming the operation.

use crate::error::{GithubError, Result};

use anyhow::Context as _;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const TOPICS_ACCEPT: &str = "application/vnd.github.mercy-preview+json";
const BRANCH_PROTECTION_ACCEPT: &str = "application/vnd.github.loki-preview+json";

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
    #[serde(default)]
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub user: GithubUser,
    pub assignee: Option<GithubUser>,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployKey {
    pub id: u64,
    pub title: String,
    pub key: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
struct Team {
    id: u64,
    slug: String,
}

/// Fields changed by [`GithubClient::modify_repo`]. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(api_base: &str, token: &str, request_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("hubcommander"));
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        let auth_header = format!("token {}", token.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_header).map_err(|_| GithubError::InvalidToken)?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .context("failed to create github api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Join percent-encoded segments onto the API base.
    ///
    /// `.` and `..` are refused: URL parsing collapses them even when encoded.
    fn url(&self, segments: &[&str]) -> Result<String> {
        let mut url = self.api_base.clone();
        for segment in segments {
            if segment.is_empty() || *segment == "." || *segment == ".." {
                return Err(GithubError::InvalidPathSegment((*segment).to_string()).into());
            }
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        Ok(url)
    }

    fn unexpected(operation: &'static str, status: StatusCode) -> crate::Error {
        GithubError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
        }
        .into()
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        Ok(request.send().await.map_err(GithubError::from)?)
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        Ok(response.json::<T>().await.map_err(GithubError::from)?)
    }

    /// `None` when the repository does not exist.
    pub async fn get_repo(&self, org: &str, repo: &str) -> Result<Option<Repository>> {
        let response = self
            .send(self.http.get(self.url(&["repos", org, repo])?))
            .await?;
        match response.status() {
            StatusCode::OK => Ok(Some(Self::decode(response).await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Self::unexpected("looking up repository", status)),
        }
    }

    /// `None` when no such user exists.
    pub async fn get_user(&self, login: &str) -> Result<Option<GithubUser>> {
        let response = self
            .send(self.http.get(self.url(&["users", login])?))
            .await?;
        match response.status() {
            StatusCode::OK => Ok(Some(Self::decode(response).await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Self::unexpected("checking if the user exists", status)),
        }
    }

    pub async fn modify_repo(&self, org: &str, repo: &str, edit: &RepoEdit) -> Result<()> {
        let mut body = serde_json::to_value(edit).context("failed to encode repo edit")?;
        body["name"] = json!(repo);

        let response = self
            .send(
                self.http
                    .patch(self.url(&["repos", org, repo])?)
                    .json(&body),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(Self::unexpected("modifying repository", status)),
        }
    }

    pub async fn list_pull_requests(
        &self,
        org: &str,
        repo: &str,
        state: &str,
    ) -> Result<Vec<PullRequest>> {
        let response = self
            .send(
                self.http
                    .get(self.url(&["repos", org, repo, "pulls"])?)
                    .query(&[("state", state)]),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Self::decode(response).await,
            status => Err(Self::unexpected("listing pull requests", status)),
        }
    }

    /// Replace all topics on a repository.
    pub async fn set_topics(&self, org: &str, repo: &str, topics: &[String]) -> Result<()> {
        let response = self
            .send(
                self.http
                    .put(self.url(&["repos", org, repo, "topics"])?)
                    .header(ACCEPT, TOPICS_ACCEPT)
                    .json(&json!({ "names": topics })),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(Self::unexpected("setting topics", status)),
        }
    }

    pub async fn add_collaborator(
        &self,
        org: &str,
        repo: &str,
        login: &str,
        permission: &str,
    ) -> Result<()> {
        let response = self
            .send(
                self.http
                    .put(self.url(&["repos", org, repo, "collaborators", login])?)
                    .json(&json!({ "permission": permission })),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(Self::unexpected("adding collaborator", status)),
        }
    }

    pub async fn create_repo(&self, org: &str, repo: &str, private: bool) -> Result<()> {
        let response = self
            .send(
                self.http
                    .post(self.url(&["orgs", org, "repos"])?)
                    .json(&json!({
                        "name": repo,
                        "private": private,
                        "has_wiki": true,
                    })),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(Self::unexpected("creating repository", status)),
        }
    }

    pub async fn delete_repo(&self, org: &str, repo: &str) -> Result<()> {
        let response = self
            .send(self.http.delete(self.url(&["repos", org, repo])?))
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(Self::unexpected("deleting repository", status)),
        }
    }

    pub async fn set_team_repo_permission(
        &self,
        team_id: u64,
        org: &str,
        repo: &str,
        permission: &str,
    ) -> Result<()> {
        let response = self
            .send(
                self.http
                    .put(self.url(&["teams", &team_id.to_string(), "repos", org, repo])?)
                    .json(&json!({ "permission": permission })),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(Self::unexpected("setting repo perms", status)),
        }
    }

    pub async fn branch_exists(&self, org: &str, repo: &str, branch: &str) -> Result<bool> {
        let response = self
            .send(
                self.http
                    .get(self.url(&["repos", org, repo, "branches", branch])?),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Self::unexpected("looking up branch", status)),
        }
    }

    pub async fn set_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
        enabled: bool,
    ) -> Result<()> {
        let response = self
            .send(
                self.http
                    .patch(self.url(&["repos", org, repo, "branches", branch])?)
                    .header(ACCEPT, BRANCH_PROTECTION_ACCEPT)
                    .json(&json!({ "protection": { "enabled": enabled } })),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(Self::unexpected("setting branch protection", status)),
        }
    }

    pub async fn add_team_membership(&self, team_id: u64, login: &str, role: &str) -> Result<()> {
        let response = self
            .send(
                self.http
                    .put(self.url(&["teams", &team_id.to_string(), "memberships", login])?)
                    .json(&json!({ "role": role })),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(Self::unexpected("adding to team", status)),
        }
    }

    /// Find a team by slug, walking every page of the org's team list.
    pub async fn find_team_id(&self, org: &str, slug: &str) -> Result<Option<u64>> {
        let mut url = self.url(&["orgs", org, "teams"])?;
        loop {
            let response = self.send(self.http.get(&url)).await?;
            if response.status() != StatusCode::OK {
                return Err(Self::unexpected("listing teams", response.status()));
            }

            let next = next_page_url(response.headers());
            let teams: Vec<Team> = Self::decode(response).await?;
            if let Some(team) = teams.into_iter().find(|team| team.slug == slug) {
                return Ok(Some(team.id));
            }

            match next {
                Some(next) => url = next,
                None => return Ok(None),
            }
        }
    }

    pub async fn list_deploy_keys(&self, org: &str, repo: &str) -> Result<Vec<DeployKey>> {
        let response = self
            .send(self.http.get(self.url(&["repos", org, repo, "keys"])?))
            .await?;
        match response.status() {
            StatusCode::OK => Self::decode(response).await,
            status => Err(Self::unexpected("listing deploy keys", status)),
        }
    }

    /// `None` when the key does not exist.
    pub async fn get_deploy_key(&self, org: &str, repo: &str, id: i64) -> Result<Option<DeployKey>> {
        let response = self
            .send(
                self.http
                    .get(self.url(&["repos", org, repo, "keys", &id.to_string()])?),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(Some(Self::decode(response).await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Self::unexpected("fetching deploy key", status)),
        }
    }

    /// `None` when GitHub rejects the key as invalid or already present.
    pub async fn add_deploy_key(
        &self,
        org: &str,
        repo: &str,
        title: &str,
        key: &str,
        read_only: bool,
    ) -> Result<Option<DeployKey>> {
        let response = self
            .send(
                self.http
                    .post(self.url(&["repos", org, repo, "keys"])?)
                    .json(&json!({
                        "title": title,
                        "key": key,
                        "read_only": read_only,
                    })),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED => Ok(Some(Self::decode(response).await?)),
            StatusCode::UNPROCESSABLE_ENTITY => Ok(None),
            status => Err(Self::unexpected("adding deploy key", status)),
        }
    }

    pub async fn delete_deploy_key(&self, org: &str, repo: &str, id: i64) -> Result<()> {
        let response = self
            .send(
                self.http
                    .delete(self.url(&["repos", org, repo, "keys", &id.to_string()])?),
            )
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(Self::unexpected("deleting deploy key", status)),
        }
    }
}

/// URL of the `rel="next"` entry in a `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim().replace(' ', "") == "rel=\"next\"");
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}
