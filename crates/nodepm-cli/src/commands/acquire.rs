//! `nodepm acquire` command implementation.
//!
//! Installs a specifier into a temp package and reports where it landed.
//! The directory is removed before exiting unless `--keep` is given.

use super::{fail, package_manager, print_json};
use miette::Result;
use nodepm_core::pkg::{cleanup, TempPackageOptions};
use nodepm_core::{Config, Error};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Serialize)]
struct AcquireResult {
    ok: bool,
    specifier: String,
    working_directory: PathBuf,
    kept: bool,
}

pub fn run(
    config: &Config,
    specifier: &str,
    ignore_scripts: bool,
    keep: bool,
    json: bool,
) -> Result<()> {
    let options = TempPackageOptions {
        ignore_scripts,
        ..TempPackageOptions::default()
    };

    let result = super::block_on(async {
        let pm = package_manager(config).await?;
        let temp = pm.acquire_temp_package(specifier, &options).await?;
        if keep {
            // Hand the directory to the caller; the exit guard must not touch it
            cleanup::deregister(&temp.working_directory);
        } else {
            temp.cleanup.run().await?;
        }
        debug!(dir = %temp.working_directory.display(), keep, "temp package done");
        Ok::<_, Error>(temp.working_directory)
    })?;

    match result {
        Ok(working_directory) => {
            if json {
                print_json(&AcquireResult {
                    ok: true,
                    specifier: specifier.to_string(),
                    working_directory,
                    kept: keep,
                })?;
            } else if keep {
                println!("{}", working_directory.display());
            } else {
                println!("Acquired {specifier}");
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}
