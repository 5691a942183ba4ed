//! Post-parse normalization and the stock argument validators.

use super::spec::{ArgSpec, ArgValue, CaseFold, CommandSpec, ParsedArgs, Validator};
use crate::error::{UsageError, ValidationError};
use std::sync::Arc;

pub const TOGGLE_ON_VALUES: [&str; 4] = ["on", "true", "enable", "enabled"];
pub const TOGGLE_OFF_VALUES: [&str; 4] = ["off", "false", "disable", "disabled"];

const CLEANUP_PATTERNS: [&str; 8] = ["&lt;", "&gt;", "<", ">", "{", "}", "[", "]"];

/// Case-fold, clean up and validate every argument that was given a value.
///
/// Empty strings, zero and absent values are passed through untouched.
pub fn normalize_and_validate(
    spec: &CommandSpec,
    mut args: ParsedArgs,
) -> Result<ParsedArgs, ValidationError> {
    for arg in spec.args() {
        let key = arg.key();
        let value = args.take(&key);
        let value = if value.is_truthy() {
            normalize_one(arg, value)?
        } else {
            value
        };
        args.insert(key, value);
    }
    Ok(args)
}

fn normalize_one(arg: &ArgSpec, value: ArgValue) -> Result<ArgValue, ValidationError> {
    let value = match value {
        ArgValue::Str(text) => {
            let text = match arg.case {
                CaseFold::Upper => text.to_uppercase(),
                CaseFold::Lower => text.to_lowercase(),
                CaseFold::Preserve => text,
            };
            ArgValue::Str(if arg.cleanup { cleanup(&text) } else { text })
        }
        other => other,
    };

    match &arg.validator {
        Some(validator) => validator(value),
        None => Ok(value),
    }
}

/// Strip the bracket characters Slack wraps around links and mentions.
pub fn cleanup(text: &str) -> String {
    CLEANUP_PATTERNS
        .iter()
        .fold(text.to_string(), |text, pattern| text.replace(pattern, ""))
}

/// `<http://github.com/foo|foo>` → `foo`; anything without a `|` is unchanged.
///
/// The result ends up as a URL path segment, so names containing `/`, `\` or
/// `..` are rejected.
pub fn extract_repo_name(value: &str) -> Result<String, UsageError> {
    let name = match value.split('|').nth(1) {
        Some(label) => label.replace('>', ""),
        None => value.to_string(),
    };
    if name.contains(['/', '\\']) || name.contains("..") || name == "." {
        return Err(UsageError::new(
            "repo",
            "Repository names cannot contain `/`, `\\` or `..`.",
        ));
    }
    Ok(name)
}

pub fn extract_multiple_repo_names(value: &str) -> Result<Vec<String>, UsageError> {
    value.split(',').map(extract_repo_name).collect()
}

/// Map `on`/`off`-style words to a boolean.
pub fn parse_toggle(value: &str, toggle_type: &str) -> Result<bool, UsageError> {
    let value = value.to_lowercase();
    if TOGGLE_ON_VALUES.contains(&value.as_str()) {
        return Ok(true);
    }
    if TOGGLE_OFF_VALUES.contains(&value.as_str()) {
        return Ok(false);
    }
    Err(UsageError::new(
        toggle_type,
        format!(
            "Acceptable values are: `{}, {}`",
            TOGGLE_ON_VALUES.join(", "),
            TOGGLE_OFF_VALUES.join(", ")
        ),
    ))
}

/// `<http://foo.com|foo.com>` → `http://foo.com`.
pub fn extract_url(value: &str) -> String {
    let url = value.split('|').next().unwrap_or_default();
    url.replace(['<', '>'], "")
}

/// Extract the URL and require it to be a well-formed http(s) URL. An empty
/// value passes and means "clear the homepage".
pub fn validate_homepage(value: &str) -> Result<String, UsageError> {
    let url = extract_url(value);
    if url.is_empty() {
        return Ok(url);
    }

    let well_formed = reqwest::Url::parse(&url)
        .map(|parsed| {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|host| host.contains('.'))
        })
        .unwrap_or(false);

    if well_formed {
        Ok(url)
    } else {
        Err(UsageError::new(
            "homepage",
            "Invalid homepage URL was sent in. It must be a well formed URL.",
        ))
    }
}

fn map_str(
    f: impl Fn(String) -> Result<ArgValue, ValidationError> + Send + Sync + 'static,
) -> Validator {
    Arc::new(move |value| match value {
        ArgValue::Str(text) => f(text),
        other => Ok(other),
    })
}

/// Validator wrapping [`extract_repo_name`].
pub fn repo_name() -> Validator {
    map_str(|text| Ok(ArgValue::Str(extract_repo_name(&text)?)))
}

/// Validator wrapping [`parse_toggle`]; yields [`ArgValue::Bool`].
pub fn toggle(toggle_type: &'static str) -> Validator {
    map_str(move |text| Ok(ArgValue::Bool(parse_toggle(&text, toggle_type)?)))
}

/// Validator wrapping [`validate_homepage`].
pub fn homepage() -> Validator {
    map_str(|text| Ok(ArgValue::Str(validate_homepage(&text)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_names_from_slack_links() {
        assert_eq!(
            extract_repo_name("<http://www.foo.com|www.foo.com>").unwrap(),
            "www.foo.com"
        );
        assert_eq!(extract_repo_name("hubcommander").unwrap(), "hubcommander");
        assert_eq!(extract_repo_name(".github").unwrap(), ".github");
        assert_eq!(
            extract_multiple_repo_names("<http://a.io|a.io>,b,c").unwrap(),
            vec!["a.io", "b", "c"]
        );
    }

    #[test]
    fn repo_names_cannot_leave_their_path_segment() {
        let cases = [
            "../../repos/otherorg/victim",
            "netflix/hubcommander",
            "..",
            ".",
            "a..b",
            "<http://x.io|../x>",
            "back\\slash",
        ];
        for value in cases {
            let error = extract_repo_name(value).unwrap_err();
            assert_eq!(error.arg_type, "repo", "{value}");
        }
        assert!(extract_multiple_repo_names("ok,../nope").is_err());
    }

    #[test]
    fn toggles() {
        for on in TOGGLE_ON_VALUES {
            assert!(parse_toggle(&on.to_uppercase(), "toggle").unwrap());
        }
        for off in TOGGLE_OFF_VALUES {
            assert!(!parse_toggle(off, "toggle").unwrap());
        }

        let error = parse_toggle("maybe", "readonly").unwrap_err();
        assert_eq!(error.arg_type, "readonly");
        assert_eq!(
            error.proper_values,
            "Acceptable values are: `on, true, enable, enabled, off, false, disable, disabled`"
        );
    }

    #[test]
    fn homepages() {
        assert_eq!(
            validate_homepage("<https://netflix.github.io|netflix.github.io>").unwrap(),
            "https://netflix.github.io"
        );
        assert_eq!(validate_homepage("").unwrap(), "");
        assert_eq!(validate_homepage("<>").unwrap(), "");
        assert_eq!(validate_homepage("not a url").unwrap_err().arg_type, "homepage");
        assert!(validate_homepage("ftp://files.example.com").is_err());
    }

    #[test]
    fn normalization_order() {
        let spec = CommandSpec::new("!Test", "", "")
            .required(ArgSpec::positional("repo", "").validate(repo_name()))
            .required(ArgSpec::positional("branch", "").preserve_case())
            .required(ArgSpec::positional("code", "").uppercase().no_cleanup())
            .required(ArgSpec::positional("empty", "").validate(toggle("toggle")));

        let mut args = ParsedArgs::default();
        args.insert("repo", ArgValue::Str("<http://x.io/Repo|Repo>".into()));
        args.insert("branch", ArgValue::Str("[Feature]".into()));
        args.insert("code", ArgValue::Str("<abc>".into()));
        args.insert("empty", ArgValue::Str(String::new()));

        let args = normalize_and_validate(&spec, args).unwrap();
        assert_eq!(args.string("repo").unwrap(), "repo");
        assert_eq!(args.string("branch").unwrap(), "Feature");
        assert_eq!(args.string("code").unwrap(), "<ABC>");
        // Validators never see empty values.
        assert_eq!(args.string("empty").unwrap(), "");
    }

    #[test]
    fn slack_escapes_are_stripped_unless_cleanup_is_off() {
        let spec = CommandSpec::new("!Test", "", "")
            .required(ArgSpec::positional("cleaned", ""))
            .required(ArgSpec::positional("raw", "").preserve_case().no_cleanup());

        // (input, cleaned, raw)
        let cases = [
            ("&lt;Repo&gt;", "repo", "&lt;Repo&gt;"),
            ("{[<Repo>]}", "repo", "{[<Repo>]}"),
            ("plain", "plain", "plain"),
        ];
        for (input, cleaned, raw) in cases {
            let mut args = ParsedArgs::default();
            args.insert("cleaned", ArgValue::Str(input.into()));
            args.insert("raw", ArgValue::Str(input.into()));

            let args = normalize_and_validate(&spec, args).unwrap();
            assert_eq!(args.string("cleaned").unwrap(), cleaned, "{input}");
            assert_eq!(args.string("raw").unwrap(), raw, "{input}");
        }
    }

    #[test]
    fn validator_usage_errors_propagate() {
        let spec = CommandSpec::new("!Test", "", "")
            .required(ArgSpec::positional("toggle", "").validate(toggle("toggle")));
        let mut args = ParsedArgs::default();
        args.insert("toggle", ArgValue::Str("sideways".into()));

        match normalize_and_validate(&spec, args) {
            Err(ValidationError::Usage(error)) => assert_eq!(error.arg_type, "toggle"),
            other => panic!("expected usage error, got {other:?}"),
        }
    }
}
