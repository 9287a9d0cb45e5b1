//! `nodepm info` command implementation.

use super::{fail, package_manager, print_json};
use miette::Result;
use nodepm_core::pkg::{PackageMetadata, RegistryOptions};
use nodepm_core::Config;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct InfoResult {
    ok: bool,
    name: String,
    /// `None` when the registry has no such package.
    metadata: Option<Arc<PackageMetadata>>,
}

pub fn run(config: &Config, name: &str, bypass_cache: bool, json: bool) -> Result<()> {
    let options = RegistryOptions {
        bypass_cache,
        ..RegistryOptions::default()
    };

    let result = super::block_on(async {
        let pm = package_manager(config).await?;
        pm.get_registry_metadata(name, &options).await
    })?;

    let metadata = match result {
        Ok(metadata) => metadata,
        Err(e) => return fail(&e, json),
    };

    if json {
        return print_json(&InfoResult {
            ok: true,
            name: name.to_string(),
            metadata,
        });
    }

    match metadata {
        Some(metadata) => {
            println!("{}", metadata.name);
            if let Some(latest) = metadata.latest() {
                println!("latest: {latest}");
            }
            for (tag, version) in metadata.dist_tags.iter().filter(|(tag, _)| *tag != "latest") {
                println!("{tag}: {version}");
            }
            println!("versions: {}", metadata.versions.len());
        }
        None => println!("{name} is not in the registry"),
    }
    Ok(())
}
