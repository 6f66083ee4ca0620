use std::path::PathBuf;

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::{CommandFactory, Parser};

#[test]
fn cli_parse_check() {
    match parse(&["apphub", "check"]) {
        CliCommand::Check { json } => assert!(!json),
        _ => panic!("expected Check"),
    }
    match parse(&["apphub", "check", "--json"]) {
        CliCommand::Check { json } => assert!(json),
        _ => panic!("expected Check"),
    }
}

#[test]
fn cli_parse_update_only_is_repeatable() {
    match parse(&["apphub", "update", "--only", "notepad", "--only", "7zip"]) {
        CliCommand::Update { only, json } => {
            assert_eq!(only, vec!["notepad", "7zip"]);
            assert!(!json);
        }
        _ => panic!("expected Update"),
    }
    match parse(&["apphub", "update"]) {
        CliCommand::Update { only, .. } => assert!(only.is_empty()),
        _ => panic!("expected Update"),
    }
}

#[test]
fn cli_parse_status_and_checksum() {
    assert!(matches!(parse(&["apphub", "status"]), CliCommand::Status));
    match parse(&["apphub", "checksum", "/tmp/x.zip"]) {
        CliCommand::Checksum { path } => assert_eq!(path, PathBuf::from("/tmp/x.zip")),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_completions_and_manpage() {
    match parse(&["apphub", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
    assert!(matches!(parse(&["apphub", "manpage"]), CliCommand::Manpage));
    assert!(Cli::try_parse_from(["apphub", "completions", "cmd.exe"]).is_err());
}

#[test]
fn config_flag_is_global() {
    let cli = Cli::try_parse_from(["apphub", "update", "--config", "/etc/apphub.toml"]).unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("/etc/apphub.toml")));
    let cli = Cli::try_parse_from(["apphub", "--config", "c.toml", "status"]).unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
}

#[test]
fn cli_rejects_unknown_and_missing_args() {
    assert!(Cli::try_parse_from(["apphub"]).is_err());
    assert!(Cli::try_parse_from(["apphub", "checksum"]).is_err());
    assert!(Cli::try_parse_from(["apphub", "add", "https://example.com"]).is_err());
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}
