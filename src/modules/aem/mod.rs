//! AEM administration modules
//!
//! Each module is an idempotent wrapper over one of AEM's administrative
//! HTTP surfaces: the OSGi Config Manager, the Granite security servlets,
//! the Felix bundle console and the CRX Package Manager. The shape is
//! always the same: fetch current state, compare to the desired state,
//! POST a change only when needed.

pub mod bundle;
pub mod group;
pub mod osgi;
pub mod package;
pub mod password;
pub mod password_hash;
pub mod user;
pub mod utils;

pub use bundle::BundleModule;
pub use group::GroupModule;
pub use osgi::OsgiModule;
pub use package::PackageModule;
pub use password::PasswordModule;
pub use password_hash::PasswordHashModule;
pub use user::UserModule;
