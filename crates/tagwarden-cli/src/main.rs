use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tagwarden_core::report::DEFAULT_REPORT_PATH;
use tagwarden_core::{DefaultTagMapping, GovernanceConfig, InMemoryGateway, Inventory};

mod commands;

/// Every requested phase ran to completion
const EXIT_OK: u8 = 0;
/// A phase aborted because a top-level listing failed
const EXIT_ABORTED: u8 = 1;
/// Configuration or inventory could not be loaded
const EXIT_SETUP: u8 = 2;
/// A report or inventory file could not be written
const EXIT_OUTPUT: u8 = 3;

fn cli() -> Command {
    Command::new("tagwarden")
        .version(tagwarden_core::VERSION)
        .about("Tag compliance reconciliation and volume snapshot lifecycle")
        .subcommand_required(true)
        .arg(
            Arg::new("inventory")
                .long("inventory")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Inventory document (JSON, or YAML by extension)"),
        )
        .arg(
            Arg::new("save-inventory")
                .long("save-inventory")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Write the post-run inventory to this file"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("pretty")
                .value_parser(["pretty", "json"])
                .help("Log output format"),
        )
        .subcommand(
            Command::new("audit")
                .about("Audit required tags on instances and buckets")
                .arg(dry_run_arg())
                .arg(
                    Arg::new("auto-tag")
                        .long("auto-tag")
                        .num_args(1..)
                        .action(ArgAction::Append)
                        .value_name("KEY=VALUE")
                        .help("Default tags applied to fill missing keys"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_parser(value_parser!(PathBuf))
                        .help("Also write a CSV tag report of the post-audit state"),
                ),
        )
        .subcommand(
            Command::new("backup")
                .about("Snapshot volumes of running instances and prune old snapshots")
                .arg(dry_run_arg())
                .arg(
                    Arg::new("retention")
                        .long("retention")
                        .value_parser(value_parser!(u32))
                        .help("Days to keep automation snapshots [default: 7]"),
                )
                .arg(
                    Arg::new("prune")
                        .long("prune")
                        .action(ArgAction::SetTrue)
                        .help("Delete automation snapshots older than the retention"),
                )
                .arg(
                    Arg::new("skip-create")
                        .long("skip-create")
                        .action(ArgAction::SetTrue)
                        .help("Do not create new snapshots"),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Export instance and bucket tags as CSV")
                .arg(
                    Arg::new("output")
                        .long("output")
                        .default_value(DEFAULT_REPORT_PATH)
                        .value_parser(value_parser!(PathBuf))
                        .help("CSV output path"),
                ),
        )
        .subcommand(
            Command::new("iam")
                .about("Audit identity users for stale logins, missing MFA and old keys")
                .arg(
                    Arg::new("stale-days")
                        .long("stale-days")
                        .value_parser(value_parser!(u32))
                        .help("Days after which logins and keys are stale [default: 90]"),
                ),
        )
}

fn dry_run_arg() -> Arg {
    Arg::new("dry-run")
        .long("dry-run")
        .action(ArgAction::SetTrue)
        .help("Report what would change without writing")
}

fn init_logging(format: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

/// Defaults, then the config file, then flags of the chosen subcommand
fn build_config(matches: &ArgMatches) -> anyhow::Result<GovernanceConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => GovernanceConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GovernanceConfig::default(),
    };

    let Some((_, args)) = matches.subcommand() else {
        return Ok(config);
    };

    if has_arg(args, "dry-run") && args.get_flag("dry-run") {
        config = config.with_dry_run(true);
    }
    if has_arg(args, "auto-tag") {
        if let Some(pairs) = args.get_many::<String>("auto-tag") {
            let defaults = DefaultTagMapping::parse_pairs(pairs).context("parsing --auto-tag")?;
            config = config.with_default_tags(&defaults);
        }
    }
    if has_arg(args, "retention") {
        if let Some(days) = args.get_one::<u32>("retention") {
            config = config.with_retention_days(*days);
        }
    }
    if has_arg(args, "stale-days") {
        if let Some(days) = args.get_one::<u32>("stale-days") {
            config = config.with_stale_after_days(*days);
        }
    }

    config.validate()?;
    Ok(config)
}

fn has_arg(args: &ArgMatches, id: &str) -> bool {
    matches!(args.try_contains_id(id), Ok(true))
}

fn load_inventory(matches: &ArgMatches) -> anyhow::Result<Inventory> {
    let path = matches
        .get_one::<PathBuf>("inventory")
        .context("--inventory <file> is required")?;
    Inventory::load(path).with_context(|| format!("loading inventory {}", path.display()))
}

fn save_inventory(gateway: &InMemoryGateway, path: &Path) -> anyhow::Result<()> {
    gateway
        .inventory()
        .save(path)
        .with_context(|| format!("saving inventory {}", path.display()))?;
    tracing::info!(path = %path.display(), "inventory saved");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    let format = matches
        .get_one::<String>("log-format")
        .map_or("pretty", String::as_str);
    init_logging(format);

    let setup = build_config(&matches).and_then(|config| Ok((config, load_inventory(&matches)?)));
    let (config, inventory) = match setup {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_SETUP);
        }
    };
    let gateway = InMemoryGateway::new(inventory);

    let completed = match matches.subcommand() {
        Some(("audit", args)) => commands::audit(&gateway, &config, args).await,
        Some(("backup", args)) => commands::backup(&gateway, &config, args).await,
        Some(("report", args)) => commands::report(&gateway, &config, args).await,
        Some(("iam", _)) => commands::iam(&gateway, &config).await,
        _ => Ok(true),
    };

    let saved = match matches.get_one::<PathBuf>("save-inventory") {
        Some(path) => save_inventory(&gateway, path),
        None => Ok(()),
    };

    for e in [completed.as_ref().err(), saved.as_ref().err()].into_iter().flatten() {
        eprintln!("error: {e:#}");
    }
    ExitCode::from(exit_code(&completed, &saved))
}

/// Output failures outrank aborted phases
fn exit_code(completed: &anyhow::Result<bool>, saved: &anyhow::Result<()>) -> u8 {
    match (completed, saved) {
        (Err(_), _) | (_, Err(_)) => EXIT_OUTPUT,
        (Ok(false), Ok(())) => EXIT_ABORTED,
        (Ok(true), Ok(())) => EXIT_OK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        cli().try_get_matches_from(args).unwrap()
    }

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn audit_flags_override_defaults() {
        let matches = parse(&[
            "tagwarden",
            "--inventory",
            "inv.json",
            "audit",
            "--dry-run",
            "--auto-tag",
            "Owner=ops",
            "Environment=dev",
        ]);
        let config = build_config(&matches).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.default_tags.get("Owner"), Some("ops"));
        assert_eq!(config.default_tags.get("Environment"), Some("dev"));
    }

    #[test]
    fn malformed_auto_tag_fails_setup() {
        let matches = parse(&["tagwarden", "audit", "--auto-tag", "Owner"]);
        assert!(build_config(&matches).is_err());
    }

    #[test]
    fn backup_retention_and_file_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagwarden.toml");
        std::fs::write(&path, "retention_days = 30\nproject_label = \"Nightly\"\n").unwrap();
        let path = path.to_string_lossy().to_string();

        let from_file = build_config(&parse(&["tagwarden", "--config", &path, "backup"])).unwrap();
        assert_eq!(from_file.retention_days, 30);
        assert_eq!(from_file.project_label, "Nightly");

        let overridden = build_config(&parse(&[
            "tagwarden",
            "backup",
            "--config",
            &path,
            "--retention",
            "3",
        ]))
        .unwrap();
        assert_eq!(overridden.retention_days, 3);
    }

    #[test]
    fn iam_stale_days() {
        let config = build_config(&parse(&["tagwarden", "iam", "--stale-days", "30"])).unwrap();
        assert_eq!(config.stale_after_days, 30);
    }

    #[test]
    fn write_failures_have_their_own_exit_code() {
        let ok = || Ok(());
        assert_eq!(exit_code(&Ok(true), &ok()), EXIT_OK);
        assert_eq!(exit_code(&Ok(false), &ok()), EXIT_ABORTED);
        assert_eq!(exit_code(&Err(anyhow::anyhow!("disk full")), &ok()), EXIT_OUTPUT);
        assert_eq!(exit_code(&Ok(false), &Err(anyhow::anyhow!("disk full"))), EXIT_OUTPUT);
        assert_ne!(EXIT_OUTPUT, EXIT_ABORTED);
    }

    #[test]
    fn missing_inventory_is_setup_error() {
        assert!(load_inventory(&parse(&["tagwarden", "report"])).is_err());
    }
}
