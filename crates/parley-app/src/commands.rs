//! Parsing of terminal input lines into view commands.

use parley_common::InferenceParameters;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Any line that is not a command.
    Prompt(String),
    Load(String),
    Cancel,
    Clear,
    Set { field: String, value: String },
    Params,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  /load <path>          load a model file
  /cancel               stop the running generation
  /clear                start a new conversation
  /set <field> <value>  change an inference parameter
  /params               show inference parameters
  /status               show session status and recent notifications
  /quit                 exit
anything else is sent as a prompt";

/// Parse one input line. Returns `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Prompt(line.trim_end().to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name.to_lowercase().as_str() {
        "load" if arg.is_empty() => return Err("usage: /load <path>".into()),
        "load" => Command::Load(arg.to_string()),
        "cancel" | "stop" => Command::Cancel,
        "clear" | "new" => Command::Clear,
        "set" => {
            let (field, value) = arg
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: /set <field> <value>".to_string())?;
            Command::Set {
                field: field.to_string(),
                value: value.trim().to_string(),
            }
        }
        "params" => Command::Params,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command: /{other} (try /help)")),
    };
    Ok(Some(command))
}

/// Apply `/set <field> <value>` to a copy of `params`.
///
/// Only parses the value; range checks happen when the session applies it.
pub fn apply_setting(
    params: &InferenceParameters,
    field: &str,
    value: &str,
) -> Result<InferenceParameters, String> {
    fn parse<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, String> {
        value
            .parse()
            .map_err(|_| format!("invalid value for {field}: {value}"))
    }

    let mut params = params.clone();
    match field.to_lowercase().replace('-', "_").as_str() {
        "temperature" | "temp" => params.temperature = parse(field, value)?,
        "top_p" => params.top_p = parse(field, value)?,
        "top_k" => params.top_k = parse(field, value)?,
        "repeat_penalty" => params.repeat_penalty = parse(field, value)?,
        "repeat_last_n" => params.repeat_last_n = parse(field, value)?,
        "batch_size" => params.batch_size = parse(field, value)?,
        "max_token_count" | "max_tokens" => {
            params.max_token_count = match value {
                "none" | "unlimited" => None,
                _ => Some(parse(field, value)?),
            }
        }
        _ => return Err(format!("unknown parameter: {field}")),
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_is_prompt() {
        assert_eq!(
            parse_line("Tell me a joke\n").unwrap(),
            Some(Command::Prompt("Tell me a joke".into()))
        );
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn load_takes_path_with_spaces() {
        assert_eq!(
            parse_line("/load  /models/my model.bin ").unwrap(),
            Some(Command::Load("/models/my model.bin".into()))
        );
        assert!(parse_line("/load").is_err());
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse_line("/cancel").unwrap(), Some(Command::Cancel));
        assert_eq!(parse_line("/CLEAR").unwrap(), Some(Command::Clear));
        assert_eq!(parse_line("/params").unwrap(), Some(Command::Params));
        assert_eq!(parse_line("/quit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn set_splits_field_and_value() {
        assert_eq!(
            parse_line("/set temp 0.5").unwrap(),
            Some(Command::Set {
                field: "temp".into(),
                value: "0.5".into()
            })
        );
        assert!(parse_line("/set temp").is_err());
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = parse_line("/frobnicate").unwrap_err();
        assert!(err.contains("/frobnicate"));
    }

    #[test]
    fn apply_setting_updates_one_field() {
        let base = InferenceParameters::default();
        let updated = apply_setting(&base, "top-k", "20").unwrap();
        assert_eq!(updated.top_k, 20);
        assert_eq!(updated.top_p, base.top_p);

        let updated = apply_setting(&base, "temp", "0.2").unwrap();
        assert_eq!(updated.temperature, 0.2);
    }

    #[test]
    fn max_tokens_accepts_unlimited() {
        let base = InferenceParameters {
            max_token_count: Some(128),
            ..InferenceParameters::default()
        };
        let updated = apply_setting(&base, "max_tokens", "unlimited").unwrap();
        assert_eq!(updated.max_token_count, None);
        let updated = apply_setting(&base, "max_tokens", "0").unwrap();
        assert_eq!(updated.max_token_count, Some(0));
    }

    #[test]
    fn apply_setting_rejects_bad_input() {
        let base = InferenceParameters::default();
        assert!(apply_setting(&base, "top_k", "many").is_err());
        assert!(apply_setting(&base, "seed", "1").is_err());
    }
}
