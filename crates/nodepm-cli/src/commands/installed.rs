//! `nodepm installed` command implementation.

use super::{fail, package_manager, print_json};
use miette::Result;
use nodepm_core::pkg::InstalledPackage;
use nodepm_core::{Config, Error};
use serde::Serialize;

#[derive(Serialize)]
struct InstalledResult {
    ok: bool,
    packages: Vec<InstalledPackage>,
}

pub fn run(config: &Config, name: Option<&str>, json: bool) -> Result<()> {
    let result = super::block_on(async {
        let pm = package_manager(config).await?;
        match name {
            Some(name) => {
                let package = pm.get_installed_package(name).await?;
                Ok::<_, Error>(package.into_iter().collect::<Vec<_>>())
            }
            None => Ok(pm.get_project_dependencies().await?.into_values().collect()),
        }
    })?;

    let packages: Vec<InstalledPackage> = match result {
        Ok(packages) => packages,
        Err(e) => return fail(&e, json),
    };

    if json {
        return print_json(&InstalledResult { ok: true, packages });
    }

    if packages.is_empty() {
        match name {
            Some(name) => println!("{name} is not installed"),
            None => println!("No dependencies installed"),
        }
    }
    for package in &packages {
        println!("{}@{} {}", package.name, package.version, package.path.display());
    }
    Ok(())
}
