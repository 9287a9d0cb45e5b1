//! Package manager abstraction.
//!
//! - Descriptor table normalizing npm, yarn (classic and modern) and pnpm
//! - Lockfile discovery with precedence and a `.git` boundary
//! - The factory choosing a manager and deferring initialization errors
//! - [`PackageManager`]: add/install, versions, installed packages, registry
//!   lookups with a per-instance cache, and scoped temp packages

pub mod cache;
pub mod cleanup;
pub mod descriptor;
pub mod discovery;
pub mod factory;
pub mod installed;
pub mod manager;
pub mod registry;
pub mod spec;
pub mod temp;
pub mod version;

pub use cache::{CacheKey, RegistryCache};
pub use cleanup::{install_exit_guard, ExitCleanupGuard};
pub use descriptor::{
    PackageManagerDescriptor, PackageManagerName, SaveStrategy, DEFAULT_PACKAGE_MANAGER,
    PRECEDENCE,
};
pub use discovery::{discover, find_package_manager, DiscoveredPackageManager};
pub use factory::{create_package_manager, FactoryOptions, PackageManagerSource};
pub use installed::InstalledPackage;
pub use manager::{AddOptions, InstallOptions, ManagerOptions, PackageManager, RegistryOptions};
pub use registry::{PackageManifest, PackageMetadata, MANIFEST_FIELDS};
pub use spec::{PackageSpec, PackageSpecifier};
pub use temp::{TempCleanup, TempPackage, TempPackageOptions};
pub use version::parse_major;
