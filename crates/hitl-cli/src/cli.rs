//! Command line definition

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use std::path::PathBuf;

/// Parse `key=value`; the value is read as JSON and kept as a string otherwise
pub(crate) fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn ids_arg() -> Arg {
    Arg::new("ids")
        .required(true)
        .num_args(1..)
        .help("Proposal ids, as printed by `list`")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

/// Build the `hitl` command
pub(crate) fn build() -> Command {
    Command::new("hitl")
        .version(hitl_core::VERSION)
        .about("Review, approve and reject AI-generated proposals")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .env("HITL_CONFIG")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("backend-url")
                .long("backend-url")
                .global(true)
                .env("HITL_BACKEND_URL")
                .help("Decision backend base URL"),
        )
        .arg(
            Arg::new("thread-id")
                .long("thread-id")
                .global(true)
                .env("HITL_THREAD_ID")
                .help("Run thread whose interrupts are reviewed"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .env("HITL_TOKEN")
                .hide_env_values(true)
                .help("Bearer token"),
        )
        .arg(
            Arg::new("org")
                .long("org")
                .global(true)
                .env("HITL_ORG_ID")
                .help("Default organization id of the signed-in identity"),
        )
        .arg(
            Arg::new("project")
                .long("project")
                .global(true)
                .env("HITL_PROJECT_ID")
                .help("Default project id of the signed-in identity"),
        )
        .arg(
            Arg::new("route")
                .long("route")
                .global(true)
                .env("HITL_ROUTE")
                .help("Route path to take the scope from, e.g. /org/acme/o1/project/atlas/p1"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("list")
                .about("List proposals awaiting review in the active scope")
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Render a proposal preview")
                .arg(Arg::new("id").required(true).help("Proposal id"))
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("approve")
                .about("Approve proposals")
                .arg(ids_arg())
                .arg(
                    Arg::new("set")
                        .long("set")
                        .action(ArgAction::Append)
                        .value_parser(parse_assignment)
                        .help("Override an argument before approving (key=value, repeatable)"),
                ),
        )
        .subcommand(
            Command::new("reject")
                .about("Reject proposals")
                .arg(ids_arg())
                .arg(
                    Arg::new("reason")
                        .long("reason")
                        .help("Reason passed back to the run"),
                ),
        )
        .subcommand(
            Command::new("edit")
                .about("Print a proposal's editable arguments")
                .arg(Arg::new("id").required(true).help("Proposal id")),
        )
        .subcommand(
            Command::new("scope")
                .about("Inspect or change the active organization/project")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print the resolved scope"))
                .subcommand(
                    Command::new("set").about("Persist --org/--project as the fallback scope"),
                )
                .subcommand(Command::new("clear").about("Forget the persisted fallback scope")),
        )
}

/// Argument overrides collected from `--set`
pub(crate) fn assignments(matches: &ArgMatches) -> Vec<(String, Value)> {
    matches
        .get_many::<(String, Value)>("set")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}
