use std::ffi::OsStr;

use anyhow::{Context, Result};
use clap::Parser;
use gitdash_config::{ensure_workspace_config, store_path, validate_config};
use gitdash_store::SqliteStore;
use gitdashd::cli::Cli;
use gitdashd::commands::{CommandStatus, run_command};
use gitdashd::logging::init_tracing;

fn main() -> Result<()> {
    let cli = parse_cli();
    let status = run(cli)?;
    if status != CommandStatus::Success {
        std::process::exit(status.exit_code());
    }
    Ok(())
}

fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn run(cli: Cli) -> Result<CommandStatus> {
    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;

    let config = ensure_workspace_config(&workspace).with_context(|| {
        format!(
            "failed to load or create workspace config at {}",
            workspace.join(".gitdash/config.toml").display()
        )
    })?;
    init_tracing(
        cli.log_format.unwrap_or(config.logging.format),
        &config.logging.level,
    );
    for warning in validate_config(&config) {
        eprintln!(
            "gitdash config warning [{}]: {}",
            warning.code, warning.message
        );
    }

    let path = store_path(&workspace, &config);
    let store = SqliteStore::open(&path)
        .with_context(|| format!("failed to open fact store at {}", path.display()))?;
    run_command(cli.command, store, config.engine, &mut std::io::stdout().lock())
}
