//! `nodepm add` command implementation.

use super::{fail, package_manager, print_json};
use miette::Result;
use nodepm_core::pkg::{AddOptions, PackageManagerName, SaveStrategy};
use nodepm_core::{Config, Error};
use serde::Serialize;

/// Arguments of `nodepm add`.
#[derive(Debug, Clone)]
pub struct AddAction {
    pub package: String,
    pub save: SaveStrategy,
    pub dev: bool,
    pub no_lockfile: bool,
    pub ignore_scripts: bool,
}

#[derive(Serialize)]
struct AddResult {
    ok: bool,
    manager: PackageManagerName,
    package: String,
    dry_run: bool,
}

pub fn run(config: &Config, action: AddAction, json: bool) -> Result<()> {
    let options = AddOptions {
        save: action.save,
        dev: action.dev,
        no_lockfile: action.no_lockfile,
        ignore_scripts: action.ignore_scripts,
        registry: None,
    };

    let result = super::block_on(async {
        let pm = package_manager(config).await?;
        pm.add(&action.package, &options).await?;
        Ok::<_, Error>(pm.name())
    })?;

    match result {
        Ok(manager) => {
            if json {
                print_json(&AddResult {
                    ok: true,
                    manager,
                    package: action.package,
                    dry_run: config.dry_run,
                })?;
            } else if !config.dry_run {
                println!("Added {} with {manager}", action.package);
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}
