//! `nodepm manifest` command implementation.

use super::{fail, package_manager, print_json};
use miette::Result;
use nodepm_core::pkg::{PackageManifest, RegistryOptions};
use nodepm_core::Config;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct ManifestResult {
    ok: bool,
    specifier: String,
    manifest: Option<Arc<PackageManifest>>,
}

pub fn run(config: &Config, specifier: &str, bypass_cache: bool, json: bool) -> Result<()> {
    let options = RegistryOptions {
        bypass_cache,
        ..RegistryOptions::default()
    };

    let result = super::block_on(async {
        let pm = package_manager(config).await?;
        pm.get_manifest(specifier, &options).await
    })?;

    let manifest = match result {
        Ok(manifest) => manifest,
        Err(e) => return fail(&e, json),
    };

    if json {
        return print_json(&ManifestResult {
            ok: true,
            specifier: specifier.to_string(),
            manifest,
        });
    }

    let Some(manifest) = manifest else {
        println!("no manifest matches {specifier}");
        return Ok(());
    };
    println!("{}@{}", manifest.name, manifest.version);
    if let Some(deprecated) = &manifest.deprecated {
        println!("deprecated: {deprecated}");
    }
    if !manifest.dependencies.is_empty() {
        println!("dependencies:");
        for (name, range) in &manifest.dependencies {
            println!("  {name} {range}");
        }
    }
    if !manifest.peer_dependencies.is_empty() {
        println!("peerDependencies:");
        for (name, range) in &manifest.peer_dependencies {
            println!("  {name} {range}");
        }
    }
    Ok(())
}
