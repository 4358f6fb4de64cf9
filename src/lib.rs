//! aem-console - Idempotent administration modules for Adobe Experience Manager
//!
//! Each module wraps one of AEM's administrative HTTP surfaces (OSGi Config
//! Manager, Granite security servlets, Felix bundle console, CRX Package
//! Manager) behind a common execution interface: fetch current state,
//! compare to the desired state, POST a change only when needed, report
//! changed/unchanged.

pub mod cli;
pub mod modules;
