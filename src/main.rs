use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use compulsive::{
    config::Config,
    index::{Index, IndexBuilder},
    model::Package,
    output::{
        print_details, print_json, print_packages, print_providers, OutputFormat, PackageReport,
        ProviderRow,
    },
    provider::Registry,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "compulsive")]
#[command(author, version, about = "List outdated packages across package managers")]
struct Cli {
    /// Show up-to-date packages and unavailable providers too
    #[arg(short, long, global = true)]
    all: bool,

    /// Only query this provider (cargo, go, homebrew, pip, pip2, pip3)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Refresh package manager metadata before listing
    #[arg(short, long, global = true)]
    sync: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List outdated packages (the default)
    Packages,

    /// List package providers and whether they are usable
    Providers,

    /// Show details of packages given as provider/package
    Info {
        #[arg(required = true, value_name = "PROVIDER/PACKAGE")]
        packages: Vec<String>,
    },

    /// Print the commands that would upgrade outdated packages
    Upgrade,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Flags shared by every command after merging with the config file.
struct Options {
    all: bool,
    provider: Option<String>,
    sync: bool,
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("COMPULSIVE_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Config { init, path }) = cli.command {
        return handle_config(init, path);
    }

    let config = Config::load().unwrap_or_else(|e| {
        warn!("ignoring config file: {:#}", e);
        Config::default()
    });
    let opts = Options {
        all: cli.all,
        provider: cli.provider,
        sync: cli.sync || config.sync,
        format: OutputFormat::from_str(&cli.format).map_err(|e| anyhow::anyhow!(e))?,
    };
    let registry = Registry::new(&config);

    match cli.command.unwrap_or(Commands::Packages) {
        Commands::Packages => list_packages(&registry, &config, &opts).await,
        Commands::Providers => list_providers(&registry, &opts).await,
        Commands::Info { packages } => show_info(&registry, &opts, &packages).await,
        Commands::Upgrade => print_upgrades(&registry, &config, &opts).await,
        Commands::Config { .. } => unreachable!("handled above"),
    }
}

fn spinner(opts: &Options, message: &str) -> Option<ProgressBar> {
    if opts.format != OutputFormat::Text || !std::io::stderr().is_terminal() {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Some(pb)
}

async fn build_index(registry: &Registry, config: &Config, opts: &Options) -> Result<Index> {
    let builder = IndexBuilder::new(registry).sync(opts.sync);
    let progress = spinner(opts, "Collecting packages...");

    let index = match &opts.provider {
        Some(name) => builder.build_single(name).await,
        None if config.providers.is_empty() => Ok(builder.build_all().await),
        None => Ok(builder.build_for(&config.providers).await),
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let index = index?;
    if opts.format == OutputFormat::Text {
        for (provider, err) in index.failures() {
            eprintln!("warning: {}: {}", provider, err);
        }
    }
    Ok(index)
}

/// Outdated packages minus the ones the config says to ignore.
fn reportable<'a>(index: &'a Index, config: &Config) -> Vec<&'a Package> {
    index
        .outdated()
        .filter(|p| !config.ignore.should_ignore_outdated(&p.reference()))
        .collect()
}

async fn list_packages(registry: &Registry, config: &Config, opts: &Options) -> Result<()> {
    let index = build_index(registry, config, opts).await?;
    let packages = if opts.all {
        index.packages().collect()
    } else {
        reportable(&index, config)
    };

    match opts.format {
        OutputFormat::Text => print_packages(&packages, opts.all),
        OutputFormat::Json => print_json(&PackageReport::new(&index, packages))?,
    }
    Ok(())
}

async fn list_providers(registry: &Registry, opts: &Options) -> Result<()> {
    let entries = if opts.all {
        registry.list_all(false).await
    } else {
        registry.list_available(false).await
    };
    let rows: Vec<ProviderRow> = entries.iter().map(ProviderRow::from).collect();

    match opts.format {
        OutputFormat::Text => print_providers(&rows),
        OutputFormat::Json => print_json(&rows)?,
    }
    Ok(())
}

async fn show_info(registry: &Registry, opts: &Options, references: &[String]) -> Result<()> {
    let builder = IndexBuilder::new(registry).sync(opts.sync);
    let progress = spinner(opts, "Looking up packages...");
    let found = builder.lookup_all(references).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let found = found?;

    match opts.format {
        OutputFormat::Text => print_details(&found),
        OutputFormat::Json => print_json(&found)?,
    }
    Ok(())
}

async fn print_upgrades(registry: &Registry, config: &Config, opts: &Options) -> Result<()> {
    let index = build_index(registry, config, opts).await?;
    let outdated = reportable(&index, config);
    let commands = index.upgrade_commands(&outdated);

    match opts.format {
        OutputFormat::Text if commands.is_empty() => println!("Everything is up to date."),
        OutputFormat::Text => {
            for command in commands.values() {
                println!("{}", command);
            }
        }
        OutputFormat::Json => print_json(&commands)?,
    }
    Ok(())
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'compulsive config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
