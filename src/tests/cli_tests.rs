//! Command-line parsing.

use crate::{Cli, MAX_DAYS};
use clap::Parser;
use std::path::PathBuf;
use tide_calendar::config::CONFIG_FILE;

#[test]
fn defaults_target_dummy_calendar() {
    let cli = Cli::try_parse_from(["tide-calendar"]).unwrap();

    assert_eq!(cli.provider, "dummy");
    assert_eq!(cli.days, 7);
    assert!(!cli.nuke);
    assert_eq!(cli.config, PathBuf::from(CONFIG_FILE));
    assert_eq!(cli.out_path(), PathBuf::from("dummy.ics"));
}

#[test]
fn out_defaults_to_provider_name() {
    let cli = Cli::try_parse_from(["tide-calendar", "--provider", "tides"]).unwrap();
    assert_eq!(cli.out_path(), PathBuf::from("tides.ics"));
}

#[test]
fn short_flags_and_explicit_out() {
    let cli = Cli::try_parse_from([
        "tide-calendar",
        "-p",
        "stormglass",
        "-d",
        "30",
        "-o",
        "/tmp/jersey.ics",
        "--nuke",
        "-c",
        "station.toml",
    ])
    .unwrap();

    assert_eq!(cli.provider, "stormglass");
    assert_eq!(cli.days, 30);
    assert!(cli.nuke);
    assert_eq!(cli.out_path(), PathBuf::from("/tmp/jersey.ics"));
    assert_eq!(cli.config, PathBuf::from("station.toml"));
}

#[test]
fn rejects_bad_day_counts() {
    assert!(Cli::try_parse_from(["tide-calendar", "--days", "-3"]).is_err());
    assert!(Cli::try_parse_from(["tide-calendar", "--days", "soon"]).is_err());
    assert!(Cli::try_parse_from(["tide-calendar", "--days", "200000000"]).is_err());

    let max = MAX_DAYS.to_string();
    let cli = Cli::try_parse_from(["tide-calendar", "--days", max.as_str()]).unwrap();
    assert_eq!(cli.days, MAX_DAYS);
}
