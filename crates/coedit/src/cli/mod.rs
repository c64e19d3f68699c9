//! CLI command definitions using `clap`

pub mod handlers;

use clap::{value_parser, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("coedit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Track which devices are editing a record and gate conflicting saves")
        .subcommand_required(true)
        .arg(
            Arg::new("database")
                .long("database")
                .global(true)
                .value_name("PATH")
                .help("SQLite database file (overrides config and COEDIT_DATABASE)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .subcommand(cmd_open())
        .subcommand(cmd_sessions())
        .subcommand(cmd_check())
        .subcommand(cmd_save())
        .subcommand(cmd_end())
        .subcommand(cmd_prune())
        .subcommand(cmd_config())
}

pub fn after_help_text(examples: &[&str]) -> String {
    let mut text = String::from("EXAMPLES:\n");
    for example in examples {
        text.push_str("  ");
        text.push_str(example);
        text.push('\n');
    }
    text
}

fn record_arg() -> Arg {
    Arg::new("record")
        .required(true)
        .help("Record (period) identifier")
}

fn device_arg() -> Arg {
    Arg::new("device")
        .long("device")
        .value_name("FINGERPRINT")
        .help("Device fingerprint (default: derived from host, pid and start time)")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn cmd_open() -> Command {
    Command::new("open")
        .about("Hold an edit session on a record until interrupted")
        .long_about(
            "Registers an edit session, heartbeats it and polls for other devices. \
             Prints a warning when another device starts editing. The session is \
             ended on Ctrl-C or when --for elapses.",
        )
        .arg(record_arg())
        .arg(device_arg())
        .arg(
            Arg::new("user-agent")
                .long("user-agent")
                .value_name("UA")
                .help("User agent recorded for this session"),
        )
        .arg(
            Arg::new("for")
                .long("for")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("Exit after this many seconds"),
        )
        .after_help(after_help_text(&[
            "coedit open P1                       Edit P1 until Ctrl-C",
            "coedit open P1 --device laptop       Use a fixed fingerprint",
            "coedit open P1 --for 600             Edit for ten minutes",
        ]))
}

fn cmd_sessions() -> Command {
    Command::new("sessions")
        .about("List active edit sessions on a record")
        .arg(record_arg())
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .value_name("FINGERPRINT")
                .help("Leave out this device's sessions"),
        )
        .arg(json_arg())
}

fn cmd_check() -> Command {
    Command::new("check")
        .about("Check once whether other devices are editing a record")
        .arg(record_arg())
        .arg(device_arg().required(true))
        .arg(json_arg())
        .after_help(after_help_text(&[
            "coedit check P1 --device laptop          Human-readable result",
            "coedit check P1 --device laptop --json   ConflictInfo as JSON",
        ]))
}

fn cmd_save() -> Command {
    Command::new("save")
        .about("Save a record, stopping if other devices are editing it")
        .arg(record_arg())
        .arg(device_arg().required(true))
        .arg(
            Arg::new("payload")
                .long("payload")
                .required(true)
                .value_name("JSON")
                .help("New record contents as JSON"),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Save anyway, overwriting other devices' changes"),
        )
        .after_help(after_help_text(&[
            "coedit save P1 --device laptop --payload '{\"sales\": 3}'",
            "coedit save P1 --device laptop --payload '{}' --force",
        ]))
}

fn cmd_end() -> Command {
    Command::new("end")
        .about("Mark an edit session ended")
        .arg(
            Arg::new("session_id")
                .required(true)
                .help("Session id as printed by 'open' or 'sessions'"),
        )
}

fn cmd_prune() -> Command {
    Command::new("prune")
        .about("Delete ended and stale sessions")
        .arg(
            Arg::new("older-than")
                .long("older-than")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("Age cutoff in seconds (default: stale threshold)"),
        )
}

fn cmd_config() -> Command {
    Command::new("config").about("Print the effective configuration as TOML")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["coedit", "config", "--database", "x.db", "-v"])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("database").map(String::as_str),
            Some("x.db")
        );
        assert!(matches.get_flag("verbose"));
    }

    #[test]
    fn test_check_requires_device() {
        let result = build_cli().try_get_matches_from(["coedit", "check", "P1"]);
        assert!(result.is_err());
    }
}
