use super::spec::{ArgSpec, CommandSettings, CommandSpec};

/// Render an argument's help, substituting `{values}` with its choice list.
fn arg_help(arg: &ArgSpec, settings: &CommandSettings) -> String {
    match arg.choices.as_ref().and_then(|key| settings.get(key)) {
        Some(values) => arg.help.replace("{values}", &values.join(", ")),
        None => arg.help.clone(),
    }
}

fn arg_line(arg: &ArgSpec, settings: &CommandSettings) -> String {
    format!("\t`{}`\t{}", arg.names.join(", "), arg_help(arg, settings))
}

/// Usage text shown when a command is invoked incorrectly or with `-h`.
pub fn format_help_text(user: &str, spec: &CommandSpec, settings: &CommandSettings) -> String {
    let required = if spec.required.is_empty() {
        String::new()
    } else {
        let mut lines = vec!["Required Arguments:".to_string()];
        lines.extend(spec.required.iter().map(|arg| arg_line(arg, settings)));
        lines.join("\n") + "\n\n"
    };

    let mut optional = vec![
        "Optional Arguments:".to_string(),
        "\t`-h, --help`\tShow this help text.".to_string(),
    ];
    optional.extend(spec.optional.iter().map(|arg| arg_line(arg, settings)));

    format!(
        "@{user}: `{}`: {}\n\n```{}```\n\n{required}{}",
        spec.name,
        spec.description,
        spec.usage,
        optional.join("\n")
    )
}
