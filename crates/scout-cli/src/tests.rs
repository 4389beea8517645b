use scout_core::SourceTag;

use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["scout-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_full_scan_with_category() {
    let cli = Cli::try_parse_from(["scout-cli", "scan", "full", "--category", "kitchen"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Scan {
            command: ScanCommands::Full {
                category: Some(ref c),
                account: None
            }
        }) if c == "kitchen"
    ));
}

#[test]
fn parses_source_scan_tag_leniently() {
    let cli = Cli::try_parse_from(["scout-cli", "scan", "source", "Meta-Ads", "--account", "acct-1"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Scan {
            command: ScanCommands::Source {
                source: SourceTag::MetaAds,
                account: Some(_),
                ..
            }
        })
    ));
}

#[test]
fn rejects_unknown_source() {
    assert!(Cli::try_parse_from(["scout-cli", "scan", "source", "myspace"]).is_err());
}

#[test]
fn parses_analyze_name() {
    let cli = Cli::try_parse_from(["scout-cli", "analyze", "Portable Neck Fan"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Analyze { ref name }) if name == "Portable Neck Fan"
    ));
}

#[test]
fn store_diff_requires_account() {
    assert!(Cli::try_parse_from(["scout-cli", "store", "diff", "https://shop.example.com"]).is_err());
    let cli = Cli::try_parse_from([
        "scout-cli",
        "store",
        "diff",
        "https://shop.example.com",
        "--account",
        "acct-1",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Store {
            command: StoreCommands::Diff { .. }
        })
    ));
}

#[test]
fn store_alerts_defaults_to_unread() {
    let cli = Cli::try_parse_from(["scout-cli", "store", "alerts", "--account", "acct-1"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Store {
            command: StoreCommands::Alerts {
                all: false,
                limit: 20,
                ..
            }
        })
    ));
}

#[test]
fn account_upsert_collects_repeated_filters() {
    let cli = Cli::try_parse_from([
        "scout-cli",
        "account",
        "upsert",
        "acct-1",
        "--tier",
        "elite",
        "--exclude",
        "vape",
        "--exclude",
        "knife",
        "--min-margin",
        "40",
    ])
    .unwrap();
    let Some(Commands::Account {
        command:
            AccountCommands::Upsert {
                tier,
                excluded_terms,
                min_margin,
                ..
            },
    }) = cli.command
    else {
        panic!("expected account upsert");
    };
    assert_eq!(tier, "elite");
    assert_eq!(excluded_terms, vec!["vape", "knife"]);
    assert_eq!(min_margin, Some(40.0));
}

#[test]
fn status_parses_date() {
    let cli = Cli::try_parse_from(["scout-cli", "status", "--account", "acct-1", "--date", "2026-10-19"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Status {
            date: Some(d),
            limit: 10,
            ..
        }) if d.to_string() == "2026-10-19"
    ));
}

#[test]
fn status_rejects_bad_date() {
    assert!(Cli::try_parse_from(["scout-cli", "status", "--account", "a", "--date", "19/10/2026"]).is_err());
}
