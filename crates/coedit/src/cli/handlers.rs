//! CLI command handlers that bridge between `clap` and internal logic

use anyhow::Result;
use clap::ArgMatches;
use coedit_core::CoeditConfig;

use crate::commands::{self, check, end, open, prune, save, sessions};

fn required<'a>(sub_m: &'a ArgMatches, name: &str) -> Result<&'a String> {
    sub_m
        .get_one::<String>(name)
        .ok_or_else(|| anyhow::anyhow!("{name} is required"))
}

pub async fn handle_open(config: &CoeditConfig, sub_m: &ArgMatches) -> Result<()> {
    let options = open::OpenOptions {
        record: required(sub_m, "record")?.clone(),
        device: sub_m.get_one::<String>("device").cloned(),
        user_agent: sub_m.get_one::<String>("user-agent").cloned(),
        for_secs: sub_m.get_one::<u64>("for").copied(),
    };
    open::run(config, options).await
}

pub async fn handle_sessions(config: &CoeditConfig, sub_m: &ArgMatches) -> Result<()> {
    let options = sessions::SessionsOptions {
        record: required(sub_m, "record")?.clone(),
        exclude: sub_m.get_one::<String>("exclude").cloned(),
        json: sub_m.get_flag("json"),
    };
    sessions::run(config, options).await
}

pub async fn handle_check(config: &CoeditConfig, sub_m: &ArgMatches) -> Result<()> {
    let options = check::CheckOptions {
        record: required(sub_m, "record")?.clone(),
        device: required(sub_m, "device")?.clone(),
        json: sub_m.get_flag("json"),
    };
    check::run(config, options).await
}

pub async fn handle_save(config: &CoeditConfig, sub_m: &ArgMatches) -> Result<()> {
    let options = save::SaveOptions {
        record: required(sub_m, "record")?.clone(),
        device: required(sub_m, "device")?.clone(),
        payload: required(sub_m, "payload")?.clone(),
        force: sub_m.get_flag("force"),
    };
    save::run(config, options).await
}

pub async fn handle_end(config: &CoeditConfig, sub_m: &ArgMatches) -> Result<()> {
    end::run(config, required(sub_m, "session_id")?).await
}

pub async fn handle_prune(config: &CoeditConfig, sub_m: &ArgMatches) -> Result<()> {
    prune::run(config, sub_m.get_one::<u64>("older-than").copied()).await
}

/// Load configuration and run the selected subcommand.
pub async fn dispatch(matches: &ArgMatches) -> Result<()> {
    let config = commands::load_config(matches.get_one::<String>("database").map(String::as_str))?;

    match matches.subcommand() {
        Some(("open", sub_m)) => handle_open(&config, sub_m).await,
        Some(("sessions", sub_m)) => handle_sessions(&config, sub_m).await,
        Some(("check", sub_m)) => handle_check(&config, sub_m).await,
        Some(("save", sub_m)) => handle_save(&config, sub_m).await,
        Some(("end", sub_m)) => handle_end(&config, sub_m).await,
        Some(("prune", sub_m)) => handle_prune(&config, sub_m).await,
        Some(("config", _)) => commands::config::run(&config),
        _ => anyhow::bail!("Unknown command. Run 'coedit --help' for usage."),
    }
}
