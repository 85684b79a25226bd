//! rdpfwd — forward external ports to RDP hosts through firewalld
//!
//! Flag mode handles `--view`, `--deladdr`, `--delport` and `--addport` in
//! that order; `--interactive` then drops into the menu shell.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use rdpfwd::cli::{self, Cli, RunError};
use rdpfwd::config::{self, RdpfwdConfig};
use rdpfwd::{FirewallCmd, ForwardController, Session};

fn main() {
    if let Err(e) = run() {
        // Validation failures carry the operator-facing message as-is.
        match e.downcast_ref::<RunError>() {
            Some(RunError::Validation(v)) => eprintln!("{v}"),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Cli::parse();

    let config = config::load_config(args.config.as_deref())?;
    init_logging(&config)?;
    if config.source.is_none() {
        warn!(
            "Config file not found at {}, using defaults",
            config::config_path(args.config.as_deref()).display()
        );
    }
    debug!(
        "rdpfwd v{}: zone={} command={} permanent={}",
        env!("CARGO_PKG_VERSION"),
        config.firewall.zone,
        config.firewall.command,
        config.firewall.permanent
    );

    if args.mutates() {
        warn_if_unprivileged();
    }

    let backend = FirewallCmd::from_config(&config.firewall);
    let controller = ForwardController::from_config(backend, &config.firewall);
    let mut session = Session::open(controller).with_context(|| {
        format!("Failed to list forwards in zone {}", config.firewall.zone)
    })?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    cli::execute(&args, &mut session, stdin.lock(), stdout.lock())?;
    Ok(())
}

fn init_logging(config: &RdpfwdConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .with_context(|| format!("Invalid log level {:?}", config.log.level))?;

    // stdout carries the rule listing, so logs go to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn warn_if_unprivileged() {
    let euid = nix::unistd::geteuid();
    if !euid.is_root() {
        warn!("Running as uid {euid}; firewalld may refuse changes without root");
    }
}
