//! External handler bundles described by YAML manifests.

mod command;
mod manifest;

pub use command::{CommandHandler, CommandSpec};
pub use manifest::{BundleManifest, ManifestBundleLoader, MANIFEST_FILE};
