pub mod acquire;
pub mod add;
pub mod detect;
pub mod info;
pub mod install;
pub mod installed;
pub mod manifest;
pub mod version;

use miette::{IntoDiagnostic, Result};
use nodepm_core::pkg::{cleanup, create_package_manager, FactoryOptions, PackageManager};
use nodepm_core::{Config, Error, Host, NodeHost};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Exit code after Ctrl-C, matching shells.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Run `future` on a fresh runtime.
///
/// Ctrl-C removes pending temp packages before exiting, since
/// `std::process::exit` skips the exit guard.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    Ok(runtime.block_on(async {
        tokio::select! {
            output = future => output,
            _ = tokio::signal::ctrl_c() => {
                let removed = cleanup::remove_pending();
                warn!(removed, "interrupted");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        }
    }))
}

/// Bind a package manager to the configured project using the real host.
pub(crate) async fn package_manager(config: &Config) -> Result<PackageManager, Error> {
    let host: Arc<dyn Host> = Arc::new(NodeHost::new());
    let config = config.clone().resolve_package_manager(host.as_ref()).await?;
    let options = FactoryOptions::from_config(&config);
    Ok(create_package_manager(host, config.cwd, options).await)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

/// `"CODE: message"`, the error shape of every JSON result.
pub(crate) fn error_field(err: &Error) -> String {
    format!("{}: {err}", err.code())
}

#[derive(Serialize)]
struct FailureResult {
    ok: bool,
    error: String,
}

/// Report a failed command and exit with status 1.
///
/// JSON mode prints `{"ok": false, "error": ...}` to stdout.
pub(crate) fn fail(err: &Error, json: bool) -> Result<()> {
    if json {
        print_json(&FailureResult {
            ok: false,
            error: error_field(err),
        })?;
        cleanup::remove_pending();
        std::process::exit(1);
    }
    Err(miette::miette!(code = err.code(), "{err}"))
}
