//! `nodepm detect` command implementation.

use super::{error_field, fail, package_manager, print_json};
use miette::Result;
use nodepm_core::pkg::{find_package_manager, PackageManagerName, PackageManagerSource};
use nodepm_core::{Config, Error, NodeHost};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct DetectResult {
    ok: bool,
    manager: PackageManagerName,
    source: PackageManagerSource,
    /// Lockfile that decided a discovered manager.
    lockfile: Option<&'static str>,
    directory: Option<PathBuf>,
    version: Option<String>,
    /// Deferred initialization error, if the binary is unusable.
    error: Option<String>,
}

pub fn run(config: &Config, json: bool) -> Result<()> {
    let result = super::block_on(detect(config))?;
    match result {
        Ok(result) => {
            if json {
                print_json(&result)?;
            } else {
                print_human(&result);
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}

async fn detect(config: &Config) -> Result<DetectResult, Error> {
    let pm = package_manager(config).await?;

    let (lockfile, directory) = if pm.source() == PackageManagerSource::Discovered {
        match find_package_manager(&NodeHost::new(), pm.cwd()).await {
            Some(found) => (Some(found.lockfile), Some(found.directory)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    // A dry run never spawns the binary
    let version = match pm.initialization_error() {
        None if !pm.is_dry_run() => pm.get_version().await.ok(),
        _ => None,
    };

    Ok(DetectResult {
        ok: pm.initialization_error().is_none(),
        manager: pm.name(),
        source: pm.source(),
        lockfile,
        directory,
        version,
        error: pm
            .initialization_error()
            .map(|e| error_field(&Error::Initialization(e.clone()))),
    })
}

fn print_human(result: &DetectResult) {
    println!("manager: {} ({})", result.manager, result.source);
    if let (Some(lockfile), Some(directory)) = (result.lockfile, &result.directory) {
        println!("lockfile: {}", directory.join(lockfile).display());
    }
    if let Some(version) = &result.version {
        println!("version: {version}");
    }
    if let Some(error) = &result.error {
        eprintln!("warning: {error}");
    }
}
