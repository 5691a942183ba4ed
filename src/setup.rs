//! Startup wiring: auth plugins, command plugins and the command table.

use crate::auth::{AuthRegistry, DuoAuthenticator};
use crate::command::{CommandPlugin, CommandRegistry};
use crate::config::{Config, Credentials};
use crate::error::{ConfigError, Result};
use crate::github::{GithubClient, GithubPlugin};
use crate::repeat::RepeatPlugin;
use crate::travis::TravisPlugin;

use std::sync::Arc;
use std::time::Duration;

/// Enable the auth plugins whose secrets are present.
pub fn build_auth_plugins(credentials: &Credentials) -> Result<AuthRegistry> {
    let mut auth = AuthRegistry::new();
    if credentials.duo.is_empty() {
        tracing::info!("no DUO_* secrets found, duo auth plugin disabled");
    } else {
        auth.register(Arc::new(DuoAuthenticator::new(&credentials.duo)?));
    }
    Ok(auth)
}

/// Instantiate the enabled command plugins, in registration order.
pub fn build_command_plugins(
    config: &Config,
    credentials: &Credentials,
) -> Result<Vec<Arc<dyn CommandPlugin>>> {
    let mut plugins: Vec<Arc<dyn CommandPlugin>> = Vec::new();

    if config.plugins.repeat {
        plugins.push(Arc::new(RepeatPlugin));
    }

    let mut github_client = None;
    if config.plugins.github {
        let token = credentials
            .github_token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential("GITHUB_TOKEN".into()))?;
        let client = Arc::new(GithubClient::new(
            &config.github.api_url,
            token,
            Duration::from_secs(config.github.request_timeout_secs),
        )?);
        plugins.push(Arc::new(GithubPlugin::new(client.clone(), &config.github)));
        github_client = Some(client);
    }

    if let Some(travis) = &config.travis {
        match github_client {
            None => tracing::warn!(
                "travis plugin is not enabling any commands because the github plugin is not enabled"
            ),
            Some(client) => {
                if credentials.travis_pro.is_none() && credentials.travis_public.is_none() {
                    return Err(ConfigError::MissingCredential(
                        "TRAVIS_PRO_* or TRAVIS_PUBLIC_*".into(),
                    )
                    .into());
                }
                plugins.push(Arc::new(TravisPlugin::new(
                    client,
                    travis,
                    credentials.travis_pro.as_ref(),
                    credentials.travis_public.as_ref(),
                )?));
            }
        }
    }

    Ok(plugins)
}

/// Build the full command table from config and secrets.
pub fn build_registry(config: &Config, credentials: &Credentials) -> Result<CommandRegistry> {
    let auth = build_auth_plugins(credentials)?;
    let plugins = build_command_plugins(config, credentials)?;
    register_plugins(plugins, config, &auth)
}

/// Register `plugins` with the `[commands]` overrides from `config`.
pub fn register_plugins(
    plugins: Vec<Arc<dyn CommandPlugin>>,
    config: &Config,
    auth: &AuthRegistry,
) -> Result<CommandRegistry> {
    let declared: Vec<String> = plugins
        .iter()
        .flat_map(|plugin| plugin.commands())
        .map(|definition| definition.name.to_lowercase())
        .collect();
    for name in config.commands.keys() {
        if !declared.contains(&name.to_lowercase()) {
            tracing::warn!(command = %name, "config override does not match any command");
        }
    }

    let mut registry = CommandRegistry::new();
    for plugin in plugins {
        registry.register_plugin(plugin, &config.commands, auth)?;
    }
    tracing::info!(commands = registry.len(), "command registry ready");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn credentials(extra: &[(&str, &str)]) -> Credentials {
        let mut vars = vec![
            ("SLACK_TOKEN".to_string(), "xoxb-1".to_string()),
            ("SLACK_APP_TOKEN".to_string(), "xapp-1".to_string()),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Credentials::from_vars(vars).unwrap()
    }

    #[test]
    fn github_plugin_requires_token() {
        let result = build_registry(&Config::default(), &credentials(&[]));
        assert!(matches!(
            result,
            Err(crate::Error::Config(ConfigError::MissingCredential(name))) if name == "GITHUB_TOKEN"
        ));
    }

    #[test]
    fn default_config_registers_repeat_and_github() {
        let registry =
            build_registry(&Config::default(), &credentials(&[("GITHUB_TOKEN", "ghp")])).unwrap();
        assert_eq!(registry.len(), 16);
        assert!(registry.contains("!repeat"));
        assert!(registry.contains("!CreateRepo"));
        assert!(!registry.contains("!EnableTravis"));
    }

    #[test]
    fn travis_is_skipped_without_github() {
        let config = Config::from_toml(indoc! {r#"
            [plugins]
            github = false

            [travis]
            user_agent = "HubCommander"
        "#})
        .unwrap();
        let registry = build_registry(&config, &credentials(&[])).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("!ListTravisOrgs"));
    }

    #[test]
    fn travis_commands_register_with_credentials() {
        let config = Config::from_toml(indoc! {r#"
            [travis]
            user_agent = "HubCommander"
        "#})
        .unwrap();
        let registry = build_registry(
            &config,
            &credentials(&[
                ("GITHUB_TOKEN", "ghp"),
                ("TRAVIS_PRO_USER", "bot"),
                ("TRAVIS_PRO_ID", "1"),
                ("TRAVIS_PRO_TOKEN", "t"),
            ]),
        )
        .unwrap();
        assert!(registry.contains("!EnableTravis"));
        assert!(registry.contains("!ListTravisOrgs"));
    }

    #[test]
    fn auth_binding_requires_enabled_plugin() {
        let config = Config::from_toml(indoc! {r#"
            [commands."!DeleteRepo"]
            auth = { plugin = "duo" }
        "#})
        .unwrap();

        let without_duo = build_registry(&config, &credentials(&[("GITHUB_TOKEN", "ghp")]));
        assert!(matches!(
            without_duo,
            Err(crate::Error::Config(ConfigError::UnknownAuthPlugin { .. }))
        ));

        let with_duo = build_registry(
            &config,
            &credentials(&[
                ("GITHUB_TOKEN", "ghp"),
                ("DUO_EXAMPLE", "example.com,api-xxxx.duosecurity.com,DIWJ8X6AEYOR5OMC6TQ1,secret"),
            ]),
        )
        .unwrap();
        assert!(with_duo.get("!deleterepo").unwrap().auth.is_some());
    }
}
