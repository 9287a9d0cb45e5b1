#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::fn_params_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use nodepm_core::config::{PACKAGE_MANAGER_ENV, REGISTRY_ENV, TEMP_DIR_ENV};
use nodepm_core::pkg::{install_exit_guard, SaveStrategy};
use nodepm_core::{Config, ConfiguredPackageManager};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nodepm")]
#[command(author, version, about = "Drive npm, yarn and pnpm through one interface", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Log commands that would change the project instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Package manager to use (`name` or `name@version`), skipping discovery
    #[arg(long, global = true, env = PACKAGE_MANAGER_ENV, value_name = "NAME")]
    package_manager: Option<ConfiguredPackageManager>,

    /// Registry URL passed to every package manager command
    #[arg(long, global = true, env = REGISTRY_ENV, value_name = "URL")]
    registry: Option<String>,

    /// Base directory for temp packages
    #[arg(long, global = true, env = TEMP_DIR_ENV, value_name = "PATH")]
    temp_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Show which package manager governs the project and why
    Detect,

    /// Add a dependency to the project
    Add {
        /// Package specifier (e.g. "react@^18", "file:../lib", "user/repo")
        package: String,

        /// Save an exact version
        #[arg(long, conflicts_with = "tilde")]
        exact: bool,

        /// Save a tilde range
        #[arg(long)]
        tilde: bool,

        /// Save as a dev dependency
        #[arg(short = 'D', long)]
        dev: bool,

        /// Do not read or write the lockfile
        #[arg(long)]
        no_lockfile: bool,

        /// Do not run lifecycle scripts
        #[arg(long)]
        ignore_scripts: bool,
    },

    /// Install the project's dependencies
    Install {
        /// Refetch packages even if they are cached
        #[arg(long)]
        force: bool,

        /// Do not run lifecycle scripts
        #[arg(long)]
        ignore_scripts: bool,

        /// Do not fail on unmet peer dependencies
        #[arg(long)]
        ignore_peer_dependencies: bool,

        /// Kill the install after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Show registry metadata for a package
    Info {
        /// Package name
        name: String,

        /// Query the registry even if the result is cached
        #[arg(long)]
        bypass_cache: bool,
    },

    /// Resolve the manifest of any package specifier
    Manifest {
        /// Package specifier (registry, alias, file, directory, git or URL)
        specifier: String,

        /// Query the registry even if the result is cached
        #[arg(long)]
        bypass_cache: bool,
    },

    /// Show installed packages (every project dependency when no name is given)
    Installed {
        /// Package name
        name: Option<String>,
    },

    /// Install a specifier into a throwaway temp package
    Acquire {
        /// Package specifier
        specifier: String,

        /// Do not run lifecycle scripts
        #[arg(long)]
        ignore_scripts: bool,

        /// Leave the temp directory in place and print its path
        #[arg(long)]
        keep: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The factory expects an absolute working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let cwd = dunce::canonicalize(&cwd).unwrap_or(cwd);

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_dry_run(cli.dry_run)
        .with_package_manager(cli.package_manager)
        .with_registry(cli.registry)
        .with_temp_directory(cli.temp_dir);
    let json = cli.json;

    let command = match cli.command {
        Some(Commands::Version) | None => return commands::version::run(),
        Some(command) => command,
    };

    logging::init(config.verbosity, config.json_logs);

    // Temp packages a command leaves behind are removed when main returns
    let _exit_guard = install_exit_guard();

    match command {
        Commands::Version => commands::version::run(),
        Commands::Detect => commands::detect::run(&config, json),
        Commands::Add {
            package,
            exact,
            tilde,
            dev,
            no_lockfile,
            ignore_scripts,
        } => {
            let save = if exact {
                SaveStrategy::Exact
            } else if tilde {
                SaveStrategy::Tilde
            } else {
                SaveStrategy::None
            };
            let action = commands::add::AddAction {
                package,
                save,
                dev,
                no_lockfile,
                ignore_scripts,
            };
            commands::add::run(&config, action, json)
        }
        Commands::Install {
            force,
            ignore_scripts,
            ignore_peer_dependencies,
            timeout,
        } => {
            let action = commands::install::InstallAction {
                force,
                ignore_scripts,
                ignore_peer_dependencies,
                timeout_secs: timeout,
            };
            commands::install::run(&config, action, json)
        }
        Commands::Info { name, bypass_cache } => {
            commands::info::run(&config, &name, bypass_cache, json)
        }
        Commands::Manifest {
            specifier,
            bypass_cache,
        } => commands::manifest::run(&config, &specifier, bypass_cache, json),
        Commands::Installed { name } => commands::installed::run(&config, name.as_deref(), json),
        Commands::Acquire {
            specifier,
            ignore_scripts,
            keep,
        } => commands::acquire::run(&config, &specifier, ignore_scripts, keep, json),
    }
}
