//! Pluggable authentication run before a command executes.

pub mod duo;

pub use duo::DuoAuthenticator;

use crate::command::CommandContext;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A challenge the invoking user must pass before a guarded command runs.
///
/// Implementations report their own progress and failures to chat; the
/// dispatcher only sees the final verdict.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    fn name(&self) -> &str;

    /// `token` is the invocation's `--auth_token` value, if any. `options` come
    /// from the command's `auth.options` config table.
    async fn authenticate(
        &self,
        ctx: &CommandContext,
        token: Option<&str>,
        options: &toml::Table,
    ) -> bool;
}

/// Authenticators available to commands, by name.
#[derive(Default, Clone)]
pub struct AuthRegistry {
    plugins: BTreeMap<String, Arc<dyn Authenticator>>,
}

impl AuthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, authenticator: Arc<dyn Authenticator>) {
        tracing::info!(plugin = authenticator.name(), "enabled auth plugin");
        self.plugins
            .insert(authenticator.name().to_string(), authenticator);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Authenticator>> {
        self.plugins.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }
}
