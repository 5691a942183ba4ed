//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable that points at the config file.
pub const CONFIG_PATH_ENV: &str = "HUBCOMMANDER_CONFIG";

/// HubCommander configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Room filtering for inbound chat messages.
    pub slack: SlackConfig,

    /// Which command plugins are switched on.
    pub plugins: PluginsConfig,

    /// GitHub organizations and API settings.
    pub github: GithubConfig,

    /// Travis CI settings. The plugin is only enabled when this section exists.
    pub travis: Option<TravisConfig>,

    /// Per-command overrides keyed by lowercased command name (e.g.
    /// `"!deleterepo"`). Keys are folded when the config is parsed.
    pub commands: HashMap<String, CommandOverride>,
}

/// Room filtering for inbound messages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Channel IDs the bot never answers in.
    pub ignore_rooms: Vec<String>,

    /// When non-empty, the only channel IDs the bot answers in.
    pub only_listen: Vec<String>,
}

impl SlackConfig {
    /// Whether a message from `channel_id` should be processed.
    pub fn accepts(&self, channel_id: &str) -> bool {
        if self.ignore_rooms.iter().any(|room| room == channel_id) {
            return false;
        }
        self.only_listen.is_empty() || self.only_listen.iter().any(|room| room == channel_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub repeat: bool,
    pub github: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            repeat: true,
            github: true,
        }
    }
}

/// GitHub API settings and managed organizations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Base URL of the REST API, with trailing slash.
    pub api_url: String,

    /// Per-request timeout.
    pub request_timeout_secs: u64,

    /// Delay between creating a repository and granting team access to it.
    pub repo_settle_secs: u64,

    /// Organizations this bot manages.
    pub orgs: Vec<OrgConfig>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com/".into(),
            request_timeout_secs: 10,
            repo_settle_secs: 2,
            orgs: Vec::new(),
        }
    }
}

/// A managed organization.
#[derive(Debug, Clone, Deserialize)]
pub struct OrgConfig {
    /// The real (case-sensitive) organization name.
    pub name: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    /// True when the organization cannot hold private repositories.
    #[serde(default)]
    pub public_only: bool,

    /// Teams granted access to every repository created through the bot.
    #[serde(default)]
    pub new_repo_teams: Vec<NewRepoTeam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRepoTeam {
    pub id: u64,
    /// One of `pull`, `push` or `admin`.
    pub perm: String,
    pub name: String,
}

/// Travis CI settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TravisConfig {
    pub user_agent: String,

    #[serde(default = "default_travis_pro_url")]
    pub pro_url: String,

    #[serde(default = "default_travis_public_url")]
    pub public_url: String,

    /// Seconds between polls while waiting for a Travis sync to finish.
    #[serde(default = "default_travis_poll_secs")]
    pub sync_poll_secs: u64,

    /// Polls before giving up on a Travis sync.
    #[serde(default = "default_travis_max_polls")]
    pub sync_max_polls: u32,

    /// Per-request timeout.
    #[serde(default = "default_travis_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub orgs: Vec<OrgConfig>,
}

fn default_travis_pro_url() -> String {
    "https://api.travis-ci.com".into()
}

fn default_travis_public_url() -> String {
    "https://api.travis-ci.org".into()
}

fn default_travis_poll_secs() -> u64 {
    2
}

fn default_travis_max_polls() -> u32 {
    60
}

fn default_travis_request_timeout_secs() -> u64 {
    10
}

/// User overrides merged into a command's definition at registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandOverride {
    pub enabled: Option<bool>,

    pub help: Option<String>,

    /// Authentication challenge to run before the command executes.
    pub auth: Option<AuthBinding>,

    /// Named value lists, e.g. `permitted_permissions = ["push", "pull", "admin"]`.
    #[serde(flatten)]
    pub values: BTreeMap<String, Vec<String>>,
}

/// Binds a command to an authentication plugin.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthBinding {
    pub plugin: String,

    #[serde(default)]
    pub options: toml::Table,
}

impl Config {
    /// Load configuration from an explicit path, `$HUBCOMMANDER_CONFIG`, or the
    /// default location. A missing default file yields the default config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load_from_path(Path::new(&path));
        }

        let default_path = Self::default_path();
        if default_path.exists() {
            Self::load_from_path(&default_path)
        } else {
            tracing::warn!(
                path = %default_path.display(),
                "no config file found, using defaults"
            );
            Ok(Self::default())
        }
    }

    /// Load from a specific config file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source: Arc::new(source),
        })?;
        let config = Self::from_toml(&content).map_err(|error| match error {
            crate::Error::Config(ConfigError::Parse { message, .. }) => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            }
            .into(),
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).map_err(|error| ConfigError::Parse {
            path: "<inline>".into(),
            message: error.to_string(),
        })?;
        config.commands = fold_command_names(std::mem::take(&mut config.commands))?;
        config.validate()?;
        Ok(config)
    }

    /// `<config_dir>/hubcommander/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("hubcommander"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        validate_orgs("github", &self.github.orgs)?;
        if let Some(travis) = &self.travis {
            validate_orgs("travis", &travis.orgs)?;
        }
        for name in self.commands.keys() {
            if !name.starts_with('!') {
                return Err(ConfigError::Invalid(format!(
                    "command override `{name}` must start with `!`"
                ))
                .into());
            }
        }
        Ok(())
    }
}

/// Lowercase override keys; two keys differing only in case are an error.
fn fold_command_names(
    commands: HashMap<String, CommandOverride>,
) -> Result<HashMap<String, CommandOverride>> {
    let mut folded = HashMap::with_capacity(commands.len());
    for (name, command_override) in commands {
        let key = name.to_lowercase();
        if folded.insert(key, command_override).is_some() {
            return Err(ConfigError::Invalid(format!(
                "command override `{name}` is configured more than once"
            ))
            .into());
        }
    }
    Ok(folded)
}

fn validate_orgs(section: &str, orgs: &[OrgConfig]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for org in orgs {
        let names = std::iter::once(&org.name).chain(org.aliases.iter());
        for name in names {
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "{section}: org name or alias `{name}` is defined more than once"
                ))
                .into());
            }
        }
        for team in &org.new_repo_teams {
            if !matches!(team.perm.as_str(), "pull" | "push" | "admin") {
                return Err(ConfigError::Invalid(format!(
                    "{section}: team `{}` in org `{}` has invalid perm `{}`",
                    team.name, org.name, team.perm
                ))
                .into());
            }
        }
    }
    Ok(())
}

/// Secrets read from the process environment.
#[derive(Clone)]
pub struct Credentials {
    /// Slack bot token (`xoxb-…`).
    pub slack_bot_token: String,
    /// Slack app-level token for socket mode (`xapp-…`).
    pub slack_app_token: String,
    pub github_token: Option<String>,
    pub duo: Vec<DuoSecret>,
    pub travis_pro: Option<TravisCredential>,
    pub travis_public: Option<TravisCredential>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("github_token", &self.github_token.as_ref().map(|_| "***"))
            .field(
                "duo_domains",
                &self.duo.iter().map(|d| d.domain.as_str()).collect::<Vec<_>>(),
            )
            .field("travis_pro", &self.travis_pro.is_some())
            .field("travis_public", &self.travis_public.is_some())
            .finish_non_exhaustive()
    }
}

/// One `DUO_*` secret: `domain,host,ikey,skey`.
#[derive(Clone, PartialEq, Eq)]
pub struct DuoSecret {
    /// Email domain whose users are challenged with this Duo account.
    pub domain: String,
    pub host: String,
    pub ikey: String,
    pub skey: String,
}

impl std::fmt::Debug for DuoSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuoSecret")
            .field("domain", &self.domain)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl DuoSecret {
    pub fn parse(variable: &str, value: &str) -> std::result::Result<Self, ConfigError> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        let [domain, host, ikey, skey] = parts.as_slice() else {
            return Err(ConfigError::Invalid(format!(
                "{variable} must be `domain,host,ikey,skey`"
            )));
        };
        Ok(Self {
            domain: domain.to_lowercase(),
            host: host.to_string(),
            ikey: ikey.to_string(),
            skey: skey.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TravisCredential {
    pub user: String,
    pub id: String,
    pub token: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build credentials from `(name, value)` pairs.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .collect();

        let required = |key: &str| {
            vars.get(key)
                .cloned()
                .ok_or_else(|| ConfigError::MissingCredential(key.into()))
        };

        let duo = vars
            .iter()
            .filter(|(name, _)| name.contains("DUO_"))
            .map(|(name, value)| DuoSecret::parse(name, value))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let travis = |prefix: &str| {
            Some(TravisCredential {
                user: vars.get(&format!("TRAVIS_{prefix}_USER"))?.clone(),
                id: vars.get(&format!("TRAVIS_{prefix}_ID"))?.clone(),
                token: vars.get(&format!("TRAVIS_{prefix}_TOKEN"))?.clone(),
            })
        };

        Ok(Self {
            slack_bot_token: required("SLACK_TOKEN")?,
            slack_app_token: required("SLACK_APP_TOKEN")?,
            github_token: vars.get("GITHUB_TOKEN").cloned(),
            duo,
            travis_pro: travis("PRO"),
            travis_public: travis("PUBLIC"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_full_config() {
        let config = Config::from_toml(indoc! {r#"
            [slack]
            ignore_rooms = ["C0IGNORE"]

            [github]
            repo_settle_secs = 0

            [[github.orgs]]
            name = "Netflix"
            aliases = ["nflx"]
            new_repo_teams = [{ id = 1234, perm = "push", name = "Engineers" }]

            [commands."!DeleteRepo"]
            enabled = false

            [commands."!AddCollab"]
            permitted_permissions = ["push", "pull", "admin"]
            auth = { plugin = "duo" }
        "#})
        .expect("config should parse");

        assert_eq!(config.github.api_url, "https://api.github.com/");
        assert_eq!(config.github.repo_settle_secs, 0);
        assert_eq!(config.github.orgs[0].aliases, vec!["nflx"]);
        assert_eq!(config.github.orgs[0].new_repo_teams[0].id, 1234);
        assert!(config.travis.is_none());
        assert!(config.plugins.github);

        let delete = &config.commands["!deleterepo"];
        assert_eq!(delete.enabled, Some(false));

        let collab = &config.commands["!addcollab"];
        assert_eq!(collab.auth.as_ref().map(|a| a.plugin.as_str()), Some("duo"));
        assert_eq!(
            collab.values["permitted_permissions"],
            vec!["push", "pull", "admin"]
        );
    }

    #[test]
    fn command_overrides_are_case_insensitive() {
        let config = Config::from_toml(indoc! {r#"
            [commands."!SetTopics"]
            enabled = false
        "#})
        .unwrap();
        assert_eq!(config.commands.keys().collect::<Vec<_>>(), vec!["!settopics"]);

        let result = Config::from_toml(indoc! {r#"
            [commands."!SetTopics"]
            enabled = false

            [commands."!settopics"]
            enabled = true
        "#});
        assert!(matches!(
            result,
            Err(crate::Error::Config(ConfigError::Invalid(message))) if message.contains("more than once")
        ));
    }

    #[test]
    fn rejects_duplicate_aliases() {
        let result = Config::from_toml(indoc! {r#"
            [[github.orgs]]
            name = "Netflix"
            aliases = ["oss"]

            [[github.orgs]]
            name = "NetflixOSS"
            aliases = ["OSS"]
        "#});
        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_team_permission() {
        let result = Config::from_toml(indoc! {r#"
            [[github.orgs]]
            name = "Netflix"
            new_repo_teams = [{ id = 1, perm = "owner", name = "Admins" }]
        "#});
        assert!(result.is_err());
    }

    #[test]
    fn room_filters() {
        let slack = SlackConfig {
            ignore_rooms: vec!["C1".into()],
            only_listen: vec![],
        };
        assert!(!slack.accepts("C1"));
        assert!(slack.accepts("C2"));

        let slack = SlackConfig {
            ignore_rooms: vec![],
            only_listen: vec!["C3".into()],
        };
        assert!(slack.accepts("C3"));
        assert!(!slack.accepts("C2"));
    }

    #[test]
    fn credentials_from_vars() {
        let credentials = Credentials::from_vars(vars(&[
            ("SLACK_TOKEN", "xoxb-1"),
            ("SLACK_APP_TOKEN", "xapp-1"),
            ("GITHUB_TOKEN", "ghp"),
            ("DUO_CORP", "Example.com,api-1.duosecurity.com,IKEY,SKEY"),
            ("TRAVIS_PRO_USER", "bot"),
            ("TRAVIS_PRO_ID", "42"),
            ("TRAVIS_PRO_TOKEN", "tok"),
        ]))
        .expect("credentials should load");

        assert_eq!(credentials.github_token.as_deref(), Some("ghp"));
        assert_eq!(credentials.duo.len(), 1);
        assert_eq!(credentials.duo[0].domain, "example.com");
        assert_eq!(credentials.duo[0].host, "api-1.duosecurity.com");
        assert!(credentials.travis_pro.is_some());
        assert!(credentials.travis_public.is_none());
    }

    #[test]
    fn slack_token_is_required() {
        let result = Credentials::from_vars(vars(&[("SLACK_APP_TOKEN", "xapp-1")]));
        assert!(matches!(
            result,
            Err(crate::Error::Config(ConfigError::MissingCredential(_)))
        ));
    }

    #[test]
    fn malformed_duo_secret_is_rejected() {
        let result = Credentials::from_vars(vars(&[
            ("SLACK_TOKEN", "xoxb-1"),
            ("SLACK_APP_TOKEN", "xapp-1"),
            ("DUO_CORP", "example.com,host-only"),
        ]));
        assert!(result.is_err());
    }
}
