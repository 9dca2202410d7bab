//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_serve_defaults() {
    match parse(&["tdm", "serve"]) {
        CliCommand::Serve { bind, dir } => {
            assert!(bind.is_none());
            assert!(dir.is_none());
        }
        _ => panic!("expected Serve"),
    }
}

#[test]
fn cli_parse_serve_overrides() {
    match parse(&["tdm", "serve", "--bind", "0.0.0.0:8080", "--dir", "/srv/tdm"]) {
        CliCommand::Serve { bind, dir } => {
            assert_eq!(bind.as_deref(), Some("0.0.0.0:8080"));
            assert_eq!(dir.as_deref(), Some(Path::new("/srv/tdm")));
        }
        _ => panic!("expected Serve with overrides"),
    }
}

#[test]
fn cli_parse_sweep() {
    match parse(&["tdm", "sweep", "--dir", "/tmp/artifacts"]) {
        CliCommand::Sweep { dir } => {
            assert_eq!(dir.as_deref(), Some(Path::new("/tmp/artifacts")));
        }
        _ => panic!("expected Sweep"),
    }
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["tdm", "config"]), CliCommand::Config));
}

#[test]
fn cli_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["tdm", "add", "magnet:?xt=urn:btih:AAA"]).is_err());
    assert!(Cli::try_parse_from(["tdm"]).is_err());
}
