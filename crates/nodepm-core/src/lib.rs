#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Package manager discovery and a uniform interface over npm, yarn and pnpm.

pub mod config;
pub mod error;
pub mod host;
pub mod pkg;
pub mod version;

pub use config::{Config, ConfiguredPackageManager};
pub use error::{Error, InitializationError, InitializationErrorKind};
pub use host::{Host, MemoryHost, NodeHost};
pub use pkg::{create_package_manager, FactoryOptions, PackageManager, PackageManagerName};
pub use version::VERSION;
