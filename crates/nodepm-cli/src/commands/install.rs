//! `nodepm install` command implementation.

use super::{fail, package_manager, print_json};
use miette::Result;
use nodepm_core::pkg::{InstallOptions, PackageManagerName};
use nodepm_core::{Config, Error};
use serde::Serialize;
use std::time::Duration;

/// Arguments of `nodepm install`.
#[derive(Debug, Clone, Default)]
pub struct InstallAction {
    pub force: bool,
    pub ignore_scripts: bool,
    pub ignore_peer_dependencies: bool,
    pub timeout_secs: Option<u64>,
}

#[derive(Serialize)]
struct InstallResult {
    ok: bool,
    manager: PackageManagerName,
    dry_run: bool,
}

pub fn run(config: &Config, action: InstallAction, json: bool) -> Result<()> {
    let options = InstallOptions {
        timeout: action.timeout_secs.map(Duration::from_secs),
        force: action.force,
        registry: None,
        ignore_scripts: action.ignore_scripts,
        ignore_peer_dependencies: action.ignore_peer_dependencies,
    };

    let result = super::block_on(async {
        let pm = package_manager(config).await?;
        pm.install(&options).await?;
        Ok::<_, Error>(pm.name())
    })?;

    match result {
        Ok(manager) => {
            if json {
                print_json(&InstallResult {
                    ok: true,
                    manager,
                    dry_run: config.dry_run,
                })?;
            } else if !config.dry_run {
                println!("Installed dependencies with {manager}");
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}
