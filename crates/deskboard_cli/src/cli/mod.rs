use clap::{Parser, Subcommand};
use deskboard_core::config::{ConfigOverrides, canonical_key};
use deskboard_core::error::AppError;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Track project tasks
    Task {
        #[command(subcommand)]
        task: TaskCommand,
    },
    /// Classify support tickets with a local model
    Ticket {
        #[command(subcommand)]
        ticket: TicketCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a new task
    ///
    /// Example: deskboard task add --project Website --description "Fix nav" --due 2024-01-10
    Add {
        #[arg(long, default_value = "")]
        project: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Due date (YYYY-MM-DD), defaults to today
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
        /// Not Started, In Progress or Completed
        #[arg(long, default_value = "Not Started")]
        status: String,
    },
    /// Change the status of a listed task
    ///
    /// Example: deskboard task status 1 "In Progress"
    Status { position: usize, status: String },
    /// Show all tasks
    ///
    /// Example: deskboard task list
    List,
}

#[derive(Subcommand, Debug)]
pub enum TicketCommand {
    /// Summarize and categorize a ticket
    ///
    /// Example: deskboard ticket classify "App crashes on login"
    Classify {
        text: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List models available on the model server
    Models,
    /// Use a model for the rest of the session
    ///
    /// Example: deskboard ticket use mistral
    Use { model: String },
    /// Show or hide the ticket history
    History,
    /// Clear the ticket history
    Reset,
    /// Export the ticket history as JSON
    ///
    /// Example: deskboard ticket export --dir ./exports
    Export {
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
    /// Show how many tickets were processed
    Stats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Theme,
    Alias(String),
    OllamaUrl,
    Model,
    FallbackModel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let (field, remainder) = key_raw
        .split_once('.')
        .map(|(field, rest)| (field.trim(), Some(rest.trim())))
        .unwrap_or((key_raw.trim(), None));

    let canonical_field = canonical_key(field);
    if canonical_field.is_empty() {
        return Err("override key cannot be empty".to_string());
    }

    let target = match canonical_field.as_str() {
        "aliases" | "alias" => {
            let alias_name = remainder
                .filter(|segment| !segment.is_empty())
                .ok_or_else(|| "aliases override requires an alias name".to_string())?;
            return Ok(ParsedConfigOverride {
                target: ConfigOverrideTarget::Alias(alias_name.to_string()),
                value,
            });
        }
        "theme" => ConfigOverrideTarget::Theme,
        "ollama_url" | "url" => ConfigOverrideTarget::OllamaUrl,
        "model" => ConfigOverrideTarget::Model,
        "fallback_model" => ConfigOverrideTarget::FallbackModel,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if remainder.is_some() {
        return Err(format!("{canonical_field} override cannot have subfields"));
    }

    Ok(ParsedConfigOverride { target, value })
}

pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry).map_err(AppError::invalid_input)?;
        match parsed.target {
            ConfigOverrideTarget::Theme => overrides.theme = Some(parsed.value),
            ConfigOverrideTarget::Alias(name) => {
                overrides.aliases.insert(name, parsed.value);
            }
            ConfigOverrideTarget::OllamaUrl => overrides.ollama_url = Some(parsed.value),
            ConfigOverrideTarget::Model => overrides.model = Some(parsed.value),
            ConfigOverrideTarget::FallbackModel => overrides.fallback_model = Some(parsed.value),
        }
    }
    Ok(overrides)
}

/// Reject per-line flags that an interactive session cannot honour.
///
/// Logging is set up once when the session starts, and aliases are expanded
/// before a line is parsed.
pub fn check_interactive_flags(cli: &Cli) -> Result<(), AppError> {
    if cli.verbose {
        return Err(AppError::invalid_input(
            "--verbose is not available in interactive mode, set DESKBOARD_LOG=debug instead",
        ));
    }

    let overrides_alias = cli.config_override.iter().any(|raw| {
        matches!(
            parse_config_override(raw),
            Ok(ParsedConfigOverride {
                target: ConfigOverrideTarget::Alias(_),
                ..
            })
        )
    });
    if overrides_alias {
        return Err(AppError::invalid_input(
            "aliases cannot be overridden in interactive mode, set them in the config file",
        ));
    }

    Ok(())
}

/// Split an interactive line into arguments, honouring double quotes.
pub fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            quoted = true;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() || quoted {
                args.push(std::mem::take(&mut current));
                quoted = false;
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    Ok(args)
}

/// Replace a leading alias with the words it stands for.
pub fn expand_alias(
    args: Vec<String>,
    aliases: &HashMap<String, String>,
) -> Result<Vec<String>, AppError> {
    let Some(expansion) = args.first().and_then(|first| aliases.get(first)) else {
        return Ok(args);
    };

    let mut expanded = split_command_line(expansion)?;
    expanded.extend(args.into_iter().skip(1));
    Ok(expanded)
}
