//! Command table: name lookup, config overrides and help listing.

use super::CommandPlugin;
use super::spec::{CommandSettings, CommandSpec};
use crate::auth::{AuthRegistry, Authenticator};
use crate::config::CommandOverride;
use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A command as declared by its plugin.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    /// Display name, e.g. `!CreateRepo`. Lookup is case-insensitive.
    pub name: String,
    /// One-line summary for `!Help`. Empty hides the command from the listing.
    pub help: String,
    pub enabled: bool,
    /// `None` means the command does its own parsing of the raw text.
    pub spec: Option<CommandSpec>,
    pub settings: CommandSettings,
}

impl CommandDefinition {
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            enabled: true,
            spec: None,
            settings: CommandSettings::new(),
        }
    }

    pub fn with_spec(mut self, spec: CommandSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn with_setting(mut self, key: &str, values: &[&str]) -> Self {
        self.settings.insert(
            key.to_string(),
            values.iter().map(|value| value.to_string()).collect(),
        );
        self
    }

    fn apply_override(&mut self, command_override: &CommandOverride) {
        if let Some(enabled) = command_override.enabled {
            self.enabled = enabled;
        }
        if let Some(help) = &command_override.help {
            self.help = help.clone();
        }
        for (key, values) in &command_override.values {
            self.settings.insert(key.clone(), values.clone());
        }
    }
}

/// Authenticator bound to a command, with its per-command options.
#[derive(Clone)]
pub struct AuthGate {
    pub authenticator: Arc<dyn Authenticator>,
    pub options: toml::Table,
}

/// A registered, enabled command.
#[derive(Clone)]
pub struct RegisteredCommand {
    pub definition: CommandDefinition,
    pub plugin: Arc<dyn CommandPlugin>,
    pub auth: Option<AuthGate>,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, RegisteredCommand>,
    help_lines: Vec<String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every command of `plugin`, merging `[commands.*]` overrides.
    ///
    /// `overrides` is keyed by lowercased command name, as loaded by
    /// [`Config::from_toml`](crate::config::Config::from_toml).
    pub fn register_plugin(
        &mut self,
        plugin: Arc<dyn CommandPlugin>,
        overrides: &HashMap<String, CommandOverride>,
        auth_plugins: &AuthRegistry,
    ) -> Result<()> {
        tracing::info!(plugin = plugin.name(), "enabling command plugin");

        for mut definition in plugin.commands() {
            let command_override = overrides.get(&definition.name.to_lowercase());

            let mut auth = None;
            if let Some(command_override) = command_override {
                definition.apply_override(command_override);
                if let Some(binding) = &command_override.auth {
                    let authenticator = auth_plugins.get(&binding.plugin).ok_or_else(|| {
                        ConfigError::UnknownAuthPlugin {
                            command: definition.name.clone(),
                            plugin: binding.plugin.clone(),
                        }
                    })?;
                    auth = Some(AuthGate {
                        authenticator,
                        options: binding.options.clone(),
                    });
                }
            }

            if !definition.enabled {
                tracing::info!(command = %definition.name, "skipping disabled command");
                continue;
            }

            tracing::info!(
                command = %definition.name,
                auth = auth.as_ref().map(|gate| gate.authenticator.name()),
                "adding command"
            );

            if definition.help.is_empty() {
                tracing::info!(command = %definition.name, "not adding help text for hidden command");
            } else {
                self.help_lines
                    .push(format!("`{}` - {}\n", definition.name, definition.help));
            }

            self.commands.insert(
                definition.name.to_lowercase(),
                RegisteredCommand {
                    definition,
                    plugin: plugin.clone(),
                    auth,
                },
            );
        }

        Ok(())
    }

    /// Look up a command by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Text of the built-in `!Help` command.
    pub fn help_text(&self) -> String {
        let mut text = String::from("I support the following commands:\n");
        for line in &self.help_lines {
            text.push_str(line);
        }
        text.push_str("`!Help` - This command.");
        text
    }
}
