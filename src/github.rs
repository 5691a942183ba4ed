//! GitHub organization management commands.

pub mod client;
pub mod plugin;

pub use client::GithubClient;
pub use plugin::GithubPlugin;

use crate::command::{ArgValue, Validator};
use crate::config::OrgConfig;
use crate::error::{UsageError, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;

/// Managed organizations, addressable by lowercased name or alias.
#[derive(Debug, Clone, Default)]
pub struct OrgLookup {
    orgs: Vec<OrgConfig>,
    index: HashMap<String, usize>,
}

impl OrgLookup {
    pub fn new(orgs: Vec<OrgConfig>) -> Self {
        let mut index = HashMap::new();
        for (position, org) in orgs.iter().enumerate() {
            index.insert(org.name.to_lowercase(), position);
            for alias in &org.aliases {
                index.insert(alias.to_lowercase(), position);
            }
        }
        Self { orgs, index }
    }

    pub fn resolve(&self, name: &str) -> Option<&OrgConfig> {
        self.index
            .get(&name.to_lowercase())
            .and_then(|&position| self.orgs.get(position))
    }

    /// `[alias, real name]` rows: each org's lowercased name, then its aliases.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        for org in &self.orgs {
            rows.push(vec![org.name.to_lowercase(), org.name.clone()]);
            for alias in &org.aliases {
                rows.push(vec![alias.clone(), org.name.clone()]);
            }
        }
        rows
    }

    /// Validator replacing an org name or alias with the real org name.
    /// Unknown names fail with `proper_values` as the usage hint.
    pub fn validator(self: &Arc<Self>, proper_values: &'static str) -> Validator {
        let lookup = Arc::clone(self);
        Arc::new(move |value: ArgValue| match value {
            ArgValue::Str(name) => lookup
                .resolve(&name)
                .map(|org| ArgValue::Str(org.name.clone()))
                .ok_or_else(|| ValidationError::from(UsageError::new("org", proper_values))),
            other => Ok(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> Arc<OrgLookup> {
        Arc::new(OrgLookup::new(vec![OrgConfig {
            name: "Netflix".into(),
            aliases: vec!["nflx".into()],
            public_only: false,
            new_repo_teams: Vec::new(),
        }]))
    }

    #[test]
    fn resolves_names_and_aliases() {
        let lookup = lookup();
        assert_eq!(lookup.resolve("netflix").unwrap().name, "Netflix");
        assert_eq!(lookup.resolve("NFLX").unwrap().name, "Netflix");
        assert!(lookup.resolve("skunkworks").is_none());
        assert_eq!(
            lookup.rows(),
            vec![
                vec!["netflix".to_string(), "Netflix".to_string()],
                vec!["nflx".to_string(), "Netflix".to_string()],
            ]
        );
    }

    #[test]
    fn validator_rewrites_to_real_name() {
        let validate = lookup().validator("Run `!ListOrgs` to see the valid orgs.");
        assert_eq!(
            validate(ArgValue::Str("nflx".into())).unwrap(),
            ArgValue::Str("Netflix".into())
        );
        match validate(ArgValue::Str("nope".into())) {
            Err(ValidationError::Usage(error)) => assert_eq!(error.arg_type, "org"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
