//! Warden Capabilities - the permission vocabulary of the runtime supervisor.
//!
//! This crate provides:
//! - The closed [`Capability`] ID space (stable indices and policy names)
//! - [`PermissionLevel`], the escalation ladder a capability moves along
//! - [`PermissionVector`], the per-suite `maximum[]`/`current[]`/`asked[]` state
//! - The trust-domain policy parser and the lazily built [`DomainPolicyStore`]
//!
//! # Security Model
//!
//! Every installed suite is bound to one trust domain. The domain fixes, per
//! capability, the highest level the user may ever grant (the ceiling) and the
//! level a fresh install starts at (the default). Anything a domain does not
//! mention is `Never`. Unknown domains resolve to the fallback domain
//! (`untrusted`), and a policy that cannot be parsed resolves nothing at all:
//! the engine never runs without a deny-by-default floor.
//!
//! # Example
//!
//! ```
//! use warden_capabilities::{Capability, DomainPolicyStore, PermissionLevel, PermissionVector};
//!
//! let store = DomainPolicyStore::from_text(
//!     "domain: untrusted\nsession(oneshot): net.http\n",
//! );
//!
//! let domain = store.for_domain("some-unknown-domain").unwrap();
//! assert_eq!(domain.name(), "untrusted");
//!
//! let vector = PermissionVector::from_domain(&domain);
//! assert_eq!(vector.maximum(Capability::NetHttp), PermissionLevel::Session);
//! assert_eq!(vector.current(Capability::NetHttp), PermissionLevel::OneShot);
//! assert_eq!(vector.current(Capability::NetHttps), PermissionLevel::Never);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod capability;
mod error;
mod level;
pub mod policy;
mod vector;

pub use capability::{Capability, CapabilityGroup};
pub use error::{CapabilityError, CapabilityResult};
pub use level::PermissionLevel;
pub use policy::{
    DomainPermissions, DomainPolicyStore, FALLBACK_DOMAIN, INTERNAL_DOMAIN, PolicySource,
    PolicyTable,
};
pub use vector::PermissionVector;
