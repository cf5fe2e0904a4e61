use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use log::debug;

use crate::config::Config;
use crate::connection::Connection;
use crate::page::{self, PageSpec};
use crate::pages;
use crate::picker::TerminalPicker;

/// Top-level command: global options plus one subcommand per registered
/// mode, each derived from its page schema.
fn build_command(registry: &BTreeMap<&'static str, PageSpec>) -> Command {
    let mut cmd = Command::new("qn")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Add quick entries to your Notion databases")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .env("QN_CONFIG")
                .global(true)
                .help("Path to the config file (default: ~/.notion/config.yaml)"),
        );
    for spec in registry.values() {
        cmd = cmd.subcommand(spec.command());
    }
    cmd
}

pub async fn run() -> Result<()> {
    let registry = pages::registry();
    let matches = build_command(&registry).get_matches();

    let (mode, sub) = matches.subcommand().context("missing mode")?;
    let spec = registry.get(mode).context("unknown mode")?;
    debug!("Running mode: {mode}");

    let config_path = match matches.get_one::<String>("config") {
        Some(path) => PathBuf::from(path),
        None => Config::default_path()?,
    };
    let config = Config::open(&config_path)?;
    let conn = Connection::new(config)?;

    let draft = page::build_draft(spec, sub, &conn, &TerminalPicker, conn.dropbox()).await?;
    page::create_page(&conn, &registry, spec, &draft).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mode_is_a_subcommand() {
        let registry = pages::registry();
        let cmd = build_command(&registry);
        for mode in registry.keys() {
            assert!(cmd.find_subcommand(mode).is_some(), "missing mode {mode}");
        }
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let registry = pages::registry();
        let res = build_command(&registry).try_get_matches_from(["qn", "nonsense", "title"]);
        assert!(res.is_err());
    }

    #[test]
    fn full_command_line_parses() {
        let registry = pages::registry();
        let matches = build_command(&registry)
            .try_get_matches_from([
                "qn",
                "--config",
                "/tmp/config.yaml",
                "task",
                "Write report",
                "--priority",
                "High",
            ])
            .unwrap();

        assert_eq!(
            matches.get_one::<String>("config").map(String::as_str),
            Some("/tmp/config.yaml")
        );
        let (mode, sub) = matches.subcommand().unwrap();
        assert_eq!(mode, "task");
        assert_eq!(
            sub.get_one::<String>("title").map(String::as_str),
            Some("Write report")
        );
    }
}
