mod cmd;
mod output;
mod root;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use rollout_core::config::{Config, WarnLevel};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "rollout",
    about = "Apply the platform stack in dependency waves, report its status, or tear it down",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root holding rollout.yaml and the manifest directory
    /// (default: auto-detect from rollout.yaml or k8s/)
    #[arg(long, global = true, env = "ROLLOUT_ROOT")]
    root: Option<PathBuf>,

    /// Target namespace (overrides rollout.yaml)
    #[arg(long, global = true, env = "ROLLOUT_NAMESPACE")]
    namespace: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check prerequisites, then apply every wave in order (default)
    Deploy {
        /// Print the wave plan without contacting the cluster
        #[arg(long)]
        dry_run: bool,

        /// Seconds to wait for each gated workload (overrides rollout.yaml)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show pods, services, mesh routes, autoscalers, and GitOps sync state
    Status,

    /// Delete the stack in reverse wave order, namespace last
    Cleanup {
        /// Exit non-zero when a delete fails for a reason other than absence
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                // Unknown mode or bad flag: usage plus failure, never clap's exit 2
                let _ = e.print();
                std::process::exit(1);
            }
        },
    };

    let command = cli.command.unwrap_or(Commands::Deploy {
        dry_run: false,
        timeout: None,
    });

    let default_level = match &command {
        Commands::Deploy { .. } | Commands::Cleanup { .. } => tracing::Level::INFO,
        Commands::Status => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match command {
        Commands::Deploy { dry_run, timeout } => load_config(&root, cli.namespace, timeout, true)
            .and_then(|config| cmd::deploy::run(&root, &config, dry_run, cli.json)),
        Commands::Status => match load_config(&root, cli.namespace.clone(), None, false) {
            Ok(config) => cmd::status::run(&root, &config, cli.json),
            Err(e) => {
                // status never fails on configuration; report what it can
                let fallback = match cli.namespace {
                    Some(ns) => Config::default().with_namespace(ns),
                    None => Config::default(),
                };
                cmd::status::run_unconfigured(&fallback, &format!("{e:#}"), cli.json)
            }
        },
        Commands::Cleanup { strict } => load_config(&root, cli.namespace, None, false)
            .and_then(|config| cmd::cleanup::run(&root, &config, strict, cli.json)),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

/// Load `rollout.yaml`, apply command-line overrides, then validate.
/// Readiness settings only matter to deploy, so only deploy checks them.
fn load_config(
    root: &Path,
    namespace: Option<String>,
    timeout: Option<u64>,
    check_readiness: bool,
) -> anyhow::Result<Config> {
    let mut config = Config::load(root).context("failed to load rollout.yaml")?;
    if let Some(ns) = namespace {
        config = config.with_namespace(ns);
    }
    if let Some(secs) = timeout {
        config = config.with_timeout_seconds(secs);
    }

    let mut warnings = config.validate();
    if check_readiness {
        warnings.extend(config.readiness.validate());
    }
    for w in &warnings {
        let label = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        eprintln!("{label}: {}", w.message);
    }
    if Config::has_errors(&warnings) {
        anyhow::bail!("invalid configuration");
    }
    Ok(config)
}
