//! Turns raw chat text into [`ParsedArgs`] according to a [`CommandSpec`].
//!
//! The grammar is a small subset of POSIX-style CLI parsing: positionals in
//! declaration order, options as `--name value` or `--name=value`, `-h` or
//! `--help` anywhere, and `--` to end option parsing. Any mismatch with the
//! schema yields [`ParseOutcome::Help`] so the caller can show usage.

use super::spec::{ArgKind, ArgSpec, ArgValue, CommandSettings, CommandSpec, ParsedArgs};

/// Option every command accepts, carrying a one-time token for authenticators.
pub const AUTH_TOKEN_FLAG: &str = "--auth_token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(ParsedArgs),
    /// The input did not fit the schema, or help was requested.
    Help,
}

/// Replace typographic quotes with ASCII ones.
pub fn replace_smart_quotes(text: &str) -> String {
    text.replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Shell-split a command line and drop the command word.
///
/// Returns `None` when the quoting is unbalanced.
pub fn split_command_text(text: &str) -> Option<Vec<String>> {
    let mut words = shell_words::split(&replace_smart_quotes(text)).ok()?;
    if !words.is_empty() {
        words.remove(0);
    }
    Some(words)
}

fn looks_like_negative_number(token: &str) -> bool {
    let Some(rest) = token.strip_prefix('-') else {
        return false;
    };
    rest.chars().any(|c| c.is_ascii_digit())
        && rest.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn is_option_token(token: &str) -> bool {
    token.starts_with('-') && token.len() > 1 && !looks_like_negative_number(token)
}

/// Parse `text` (including the leading command word) against `spec`.
pub fn parse(spec: &CommandSpec, settings: &CommandSettings, text: &str) -> ParseOutcome {
    let Some(tokens) = split_command_text(text) else {
        return ParseOutcome::Help;
    };

    let flags: Vec<&ArgSpec> = spec.args().filter(|arg| arg.is_flag()).collect();
    let required_positionals: Vec<&ArgSpec> =
        spec.required.iter().filter(|arg| !arg.is_flag()).collect();
    let optional_positionals: Vec<&ArgSpec> =
        spec.optional.iter().filter(|arg| !arg.is_flag()).collect();

    let mut args = ParsedArgs::default();
    let mut auth_token = None;
    let mut flag_values: Vec<(&ArgSpec, String)> = Vec::new();
    let mut positionals: Vec<String> = Vec::new();

    let mut iter = tokens.into_iter();
    let mut options_done = false;
    while let Some(token) = iter.next() {
        if options_done || !is_option_token(&token) {
            positionals.push(token);
            continue;
        }
        if token == "--" {
            options_done = true;
            continue;
        }
        if token == "-h" || token == "--help" {
            return ParseOutcome::Help;
        }

        let (name, inline_value) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => {
                (name.to_string(), Some(value.to_string()))
            }
            _ => (token.clone(), None),
        };

        let value = match inline_value {
            Some(value) => value,
            None => match iter.next() {
                Some(next) if !is_option_token(&next) => next,
                _ => return ParseOutcome::Help,
            },
        };

        if name == AUTH_TOKEN_FLAG {
            auth_token = Some(value);
            continue;
        }

        match flags.iter().find(|arg| arg.matches_flag(&name)) {
            Some(arg) => flag_values.push((*arg, value)),
            None => return ParseOutcome::Help,
        }
    }

    let max_positionals = required_positionals.len() + optional_positionals.len();
    if positionals.len() < required_positionals.len() || positionals.len() > max_positionals {
        return ParseOutcome::Help;
    }

    let mut given = positionals.into_iter();
    for arg in required_positionals.iter().chain(optional_positionals.iter()) {
        let raw = match given.next() {
            Some(raw) => raw,
            None => {
                args.insert(
                    arg.key(),
                    arg.default
                        .clone()
                        .map(ArgValue::Str)
                        .unwrap_or(ArgValue::Absent),
                );
                continue;
            }
        };
        match convert(arg, settings, raw) {
            Some(value) => args.insert(arg.key(), value),
            None => return ParseOutcome::Help,
        }
    }

    for arg in &flags {
        args.insert(arg.key(), ArgValue::Absent);
    }
    for (arg, raw) in flag_values {
        match convert(arg, settings, raw) {
            Some(value) => args.insert(arg.key(), value),
            None => return ParseOutcome::Help,
        }
    }

    args.set_auth_token(auth_token);
    ParseOutcome::Parsed(args)
}

/// Apply the argument's type and choice constraints to a raw token.
fn convert(arg: &ArgSpec, settings: &CommandSettings, raw: String) -> Option<ArgValue> {
    if let Some(key) = &arg.choices {
        let lowered = raw.to_lowercase();
        let allowed = settings.get(key)?;
        return allowed
            .iter()
            .any(|choice| choice.to_lowercase() == lowered)
            .then_some(ArgValue::Str(lowered));
    }

    match arg.kind {
        ArgKind::Str => Some(ArgValue::Str(raw)),
        ArgKind::Int => raw.trim().parse::<i64>().ok().map(ArgValue::Int),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CommandSettings {
        let mut settings = CommandSettings::new();
        settings.insert(
            "permitted_permissions".into(),
            vec!["push".into(), "pull".into()],
        );
        settings
    }

    fn collab_spec() -> CommandSpec {
        CommandSpec::new("!AddCollab", "!AddCollab <Collab> <Org> <Repo> <Permission>", "")
            .required(ArgSpec::positional("collab", "The collaborator."))
            .required(ArgSpec::positional("org", "The org."))
            .required(ArgSpec::positional("repo", "The repo."))
            .required(
                ArgSpec::positional("permission", "One of: `{values}`")
                    .choices("permitted_permissions"),
            )
    }

    fn parsed(outcome: ParseOutcome) -> ParsedArgs {
        match outcome {
            ParseOutcome::Parsed(args) => args,
            ParseOutcome::Help => panic!("expected parsed arguments"),
        }
    }

    #[test]
    fn splits_quotes_and_drops_command_word() {
        let words = split_command_text("!SetDescription Netflix hubcommander \u{201C}A bot\u{201D}")
            .unwrap();
        assert_eq!(words, vec!["Netflix", "hubcommander", "A bot"]);
        assert_eq!(split_command_text("!SetDescription \"open").map(|w| w.len()), None);
    }

    #[test]
    fn parses_positionals_in_order() {
        let args = parsed(parse(
            &collab_spec(),
            &settings(),
            "!AddCollab octocat Netflix hubcommander PUSH",
        ));
        assert_eq!(args.string("collab").unwrap(), "octocat");
        assert_eq!(args.string("org").unwrap(), "Netflix");
        // Choices are compared and stored lowercase.
        assert_eq!(args.string("permission").unwrap(), "push");
        assert_eq!(args.auth_token(), None);
    }

    #[test]
    fn invalid_choice_and_arity_show_help() {
        let spec = collab_spec();
        assert_eq!(
            parse(&spec, &settings(), "!AddCollab octocat Netflix hc admin"),
            ParseOutcome::Help
        );
        assert_eq!(
            parse(&spec, &settings(), "!AddCollab octocat Netflix"),
            ParseOutcome::Help
        );
        assert_eq!(
            parse(&spec, &settings(), "!AddCollab a b c push extra"),
            ParseOutcome::Help
        );
        assert_eq!(
            parse(&spec, &settings(), "!AddCollab a b c push --unknown x"),
            ParseOutcome::Help
        );
        assert_eq!(
            parse(&spec, &settings(), "!AddCollab -h"),
            ParseOutcome::Help
        );
    }

    #[test]
    fn flags_and_auth_token() {
        let spec = CommandSpec::new("!EnableTravis", "", "")
            .required(ArgSpec::positional("org", ""))
            .optional(ArgSpec::flag(&["--public"], ""));

        let args = parsed(parse(&spec, &settings(), "!EnableTravis netflix"));
        assert_eq!(args.get("public"), &ArgValue::Absent);

        let args = parsed(parse(
            &spec,
            &settings(),
            "!EnableTravis --public=true netflix --auth_token 123456",
        ));
        assert_eq!(args.string("public").unwrap(), "true");
        assert_eq!(args.auth_token(), Some("123456"));

        assert_eq!(
            parse(&spec, &settings(), "!EnableTravis netflix --public"),
            ParseOutcome::Help
        );
    }

    #[test]
    fn integers_and_optional_positionals() {
        let spec = CommandSpec::new("!GetKey", "", "")
            .required(ArgSpec::positional("id", "").int())
            .optional(ArgSpec::positional("topics", "").default(""));

        let args = parsed(parse(&spec, &settings(), "!GetKey 42"));
        assert_eq!(args.int("id").unwrap(), 42);
        assert_eq!(args.string("topics").unwrap(), "");

        let args = parsed(parse(&spec, &settings(), "!GetKey -3 a,b"));
        assert_eq!(args.int("id").unwrap(), -3);
        assert_eq!(args.string("topics").unwrap(), "a,b");

        assert_eq!(
            parse(&spec, &settings(), "!GetKey forty-two"),
            ParseOutcome::Help
        );
    }

    #[test]
    fn option_terminator_and_auth_token_placement() {
        // (text, expected collaborator and auth token; None means help)
        let cases: [(&str, Option<(&str, Option<&str>)>); 7] = [
            ("!AddCollab -- -octocat Netflix hc push", Some(("-octocat", None))),
            ("!AddCollab -- -h Netflix hc push", Some(("-h", None))),
            ("!AddCollab -octocat Netflix hc push", None),
            (
                "!AddCollab --auth_token=123456 octocat Netflix hc push",
                Some(("octocat", Some("123456"))),
            ),
            (
                "!AddCollab --auth_token 123456 octocat Netflix hc push",
                Some(("octocat", Some("123456"))),
            ),
            (
                "!AddCollab octocat -- Netflix hc push",
                Some(("octocat", None)),
            ),
            ("!AddCollab octocat Netflix hc push -- --auth_token", None),
        ];

        let spec = collab_spec();
        for (text, expected) in cases {
            match (parse(&spec, &settings(), text), expected) {
                (ParseOutcome::Parsed(args), Some((collab, token))) => {
                    assert_eq!(args.string("collab").unwrap(), collab, "{text}");
                    assert_eq!(args.auth_token(), token, "{text}");
                }
                (ParseOutcome::Help, None) => {}
                (outcome, expected) => panic!("{text}: got {outcome:?}, expected {expected:?}"),
            }
        }
    }
}
