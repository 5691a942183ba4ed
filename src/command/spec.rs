//! Declarative argument schemas and parsed values.

use crate::error::{Error, Result, ValidationError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Custom check run on an argument after normalization. May rewrite the value.
pub type Validator =
    Arc<dyn Fn(ArgValue) -> std::result::Result<ArgValue, ValidationError> + Send + Sync>;

/// Named value lists a command can be configured with (e.g. `permitted_roles`).
pub type CommandSettings = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Str,
    Int,
}

/// Case folding applied to string values before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseFold {
    #[default]
    Lower,
    Upper,
    Preserve,
}

/// One argument of a command.
#[derive(Clone)]
pub struct ArgSpec {
    /// `["org"]` for a positional, `["-p", "--public"]` for a flag.
    pub names: Vec<String>,
    pub help: String,
    pub kind: ArgKind,
    /// Settings key naming the list of accepted values.
    pub choices: Option<String>,
    pub case: CaseFold,
    /// Strip `< > { } [ ]` and `&lt; &gt;` from string values.
    pub cleanup: bool,
    /// Value used when an optional positional is omitted.
    pub default: Option<String>,
    pub validator: Option<Validator>,
}

impl std::fmt::Debug for ArgSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgSpec")
            .field("names", &self.names)
            .field("kind", &self.kind)
            .field("choices", &self.choices)
            .field("case", &self.case)
            .field("cleanup", &self.cleanup)
            .field("default", &self.default)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl ArgSpec {
    fn new(names: Vec<String>, help: impl Into<String>) -> Self {
        Self {
            names,
            help: help.into(),
            kind: ArgKind::Str,
            choices: None,
            case: CaseFold::Lower,
            cleanup: true,
            default: None,
            validator: None,
        }
    }

    pub fn positional(name: &str, help: impl Into<String>) -> Self {
        Self::new(vec![name.to_string()], help)
    }

    /// An option taking a value, e.g. `--public true` or `--public=true`.
    pub fn flag(names: &[&str], help: impl Into<String>) -> Self {
        Self::new(names.iter().map(|n| n.to_string()).collect(), help)
    }

    pub fn int(mut self) -> Self {
        self.kind = ArgKind::Int;
        self
    }

    pub fn preserve_case(mut self) -> Self {
        self.case = CaseFold::Preserve;
        self
    }

    pub fn uppercase(mut self) -> Self {
        self.case = CaseFold::Upper;
        self
    }

    pub fn no_cleanup(mut self) -> Self {
        self.cleanup = false;
        self
    }

    pub fn choices(mut self, settings_key: &str) -> Self {
        self.choices = Some(settings_key.to_string());
        self
    }

    /// Make a positional optional with the given fallback value.
    pub fn default(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn is_flag(&self) -> bool {
        self.names.first().is_some_and(|name| name.starts_with('-'))
    }

    /// Key the parsed value is stored under: the first long option without
    /// its dashes, or the positional name.
    pub fn key(&self) -> String {
        if !self.is_flag() {
            return self.names.first().cloned().unwrap_or_default();
        }
        let long = self
            .names
            .iter()
            .find(|name| name.starts_with("--"))
            .or_else(|| self.names.first());
        long.map(|name| name.trim_start_matches('-').replace('-', "_"))
            .unwrap_or_default()
    }

    pub fn matches_flag(&self, token: &str) -> bool {
        self.is_flag() && self.names.iter().any(|name| name == token)
    }
}

/// Argument schema of one command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: String,
    pub usage: String,
    pub description: String,
    pub required: Vec<ArgSpec>,
    pub optional: Vec<ArgSpec>,
}

impl CommandSpec {
    pub fn new(name: &str, usage: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            usage: usage.to_string(),
            description: description.to_string(),
            required: Vec::new(),
            optional: Vec::new(),
        }
    }

    pub fn required(mut self, arg: ArgSpec) -> Self {
        self.required.push(arg);
        self
    }

    pub fn optional(mut self, arg: ArgSpec) -> Self {
        self.optional.push(arg);
        self
    }

    /// All arguments, required first.
    pub fn args(&self) -> impl Iterator<Item = &ArgSpec> {
        self.required.iter().chain(self.optional.iter())
    }
}

/// A parsed argument value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArgValue {
    #[default]
    Absent,
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl ArgValue {
    /// Whether the value counts as "given": non-empty strings and lists,
    /// non-zero integers and `true`.
    pub fn is_truthy(&self) -> bool {
        match self {
            ArgValue::Absent => false,
            ArgValue::Str(value) => !value.is_empty(),
            ArgValue::Int(value) => *value != 0,
            ArgValue::Bool(value) => *value,
            ArgValue::List(values) => !values.is_empty(),
        }
    }
}

/// Arguments of one invocation, keyed by [`ArgSpec::key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    values: BTreeMap<String, ArgValue>,
    auth_token: Option<String>,
}

static ABSENT: ArgValue = ArgValue::Absent;

impl ParsedArgs {
    pub fn insert(&mut self, key: impl Into<String>, value: ArgValue) {
        self.values.insert(key.into(), value);
    }

    pub fn take(&mut self, key: &str) -> ArgValue {
        self.values.remove(key).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> &ArgValue {
        self.values.get(key).unwrap_or(&ABSENT)
    }

    pub fn set_auth_token(&mut self, token: Option<String>) {
        self.auth_token = token;
    }

    /// Value of the built-in `--auth_token` option.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn string(&self, key: &str) -> Result<String> {
        match self.get(key) {
            ArgValue::Str(value) => Ok(value.clone()),
            _ => Err(Error::MissingArgument(key.to_string())),
        }
    }

    pub fn opt_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            ArgValue::Str(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            ArgValue::Bool(value) => Ok(*value),
            _ => Err(Error::MissingArgument(key.to_string())),
        }
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        match self.get(key) {
            ArgValue::Int(value) => Ok(*value),
            _ => Err(Error::MissingArgument(key.to_string())),
        }
    }

    pub fn list(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key) {
            ArgValue::List(values) => Ok(values.clone()),
            _ => Err(Error::MissingArgument(key.to_string())),
        }
    }
}
