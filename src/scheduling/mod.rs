//! Package session simulation for appointment authoring.
//!
//! A draft holds a flat list of planned sessions. Every edit re-runs
//! compensation and renumbering, and the final list is turned into a
//! [`SessionOperations`] diff for the store to apply.

pub mod compensation;
pub mod context;
pub mod draft;
pub mod entry;
pub mod error;
pub mod grouping;
pub mod numbering;
pub mod operations;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{PackageContext, PatientOrder, PersistedSession, ServiceInfo};
pub use draft::{PackageTarget, SessionDraft};
pub use entry::GroupKey;
pub use error::SessionError;
pub use operations::SessionOperations;
