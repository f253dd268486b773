use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use mod_director::{
    ConsoleProgressReporter, DirectorConfig, DirectorOutcome, IntoProgressCallback, ModpackDirector, PresetSelection,
    Side, StandalonePlatform,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mod-director", about = "Install the mods a modpack directory declares")]
struct Cli {
    /// Installation root; descriptors may not write outside of it
    #[arg(long, value_name = "PATH", default_value = ".")]
    root: PathBuf,

    /// Descriptor directory, defaults to <root>/config/mod-director
    #[arg(long, value_name = "PATH")]
    config_dir: Option<PathBuf>,

    /// Mods directory, defaults to <root>/mods
    #[arg(long, value_name = "PATH")]
    mods_dir: Option<PathBuf>,

    /// Side being installed: client, server or unknown
    #[arg(long, default_value = "unknown")]
    side: Side,

    /// Worker count, defaults to the available parallelism clamped to 4..=8
    #[arg(long)]
    threads: Option<usize>,

    /// Skip the repost blocklist
    #[arg(long)]
    no_blocklist: bool,

    /// Answer a discretionary option, repeatable: --select shaders=false
    #[arg(long = "select", value_name = "KEY=BOOL", value_parser = parse_selection)]
    selections: Vec<(String, bool)>,

    /// Print per-task progress and debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn parse_selection(raw: &str) -> Result<(String, bool), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=true|false, got '{}'", raw))?;
    let value = value
        .parse::<bool>()
        .map_err(|_| format!("expected true or false for '{}', got '{}'", key, value))?;
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "mod director failed");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let root = std::path::absolute(&cli.root).context("Failed to resolve installation root")?;
    if !root.is_dir() {
        bail!("Installation root {} is not a directory", root.display());
    }

    let mut platform = StandalonePlatform::new(&root).with_side(cli.side);
    if let Some(dir) = cli.config_dir {
        platform = platform.with_configuration_directory(dir);
    }
    if let Some(dir) = cli.mods_dir {
        platform = platform.with_mods_directory(dir);
    }

    let mut config = DirectorConfig::builder();
    if let Some(threads) = cli.threads {
        config = config.worker_threads(threads);
    }
    if cli.no_blocklist {
        config = config.without_blocklist();
    }

    let choices: HashMap<String, bool> = cli.selections.into_iter().collect();
    let director = ModpackDirector::new(Arc::new(platform), config.build())
        .context("Failed to set up the director")?
        .with_progress(ConsoleProgressReporter::new(cli.verbose).into_callback())
        .with_selection(PresetSelection::new(choices));

    let outcome = director.run().await;
    report(&outcome);

    Ok(if outcome.refuse_launch {
        2
    } else if outcome.success {
        0
    } else {
        1
    })
}

fn report(outcome: &DirectorOutcome) {
    println!("{}", outcome.pack_name);

    if !outcome.errors.is_empty() {
        println!("Errors:");
        for record in &outcome.errors {
            match &record.cause {
                Some(cause) => println!("  [{}] {}: {}", record.level, record.message, cause),
                None => println!("  [{}] {}", record.level, record.message),
            }
        }
    }

    if outcome.installed.is_empty() {
        println!("Nothing was installed");
    } else {
        println!("Installed mods summary:");
        for installed in &outcome.installed {
            let injected = if installed.inject { "injected" } else { "not injected" };
            println!("  {} ({})", installed.path.display(), injected);
            let mut options: Vec<_> = installed.options.iter().collect();
            options.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in options {
                println!("    - {}: {}", key, value);
            }
        }
    }

    if outcome.refuse_launch {
        println!("The modpack is outdated and refuses to launch, please update it");
    } else if outcome.restart_required {
        println!("Installation complete, restart to finish initialization");
    }
}
