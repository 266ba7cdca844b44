//! TTL renewal and garbage collection for tracker objects.
//!
//! Renewers keep live objects from expiring by extending their TTLs from a
//! background task; the garbage collector reclaims objects that are expired
//! or tombstoned and unreferenced. Both are scoped tasks with explicit
//! start and close, never module-global state.

pub mod gc;
pub mod pin;
pub mod renew;
pub mod stringset;

pub use gc::{BoxError, Deleter, DeleterMux, GarbageCollector, NopDeleter};
pub use pin::ObjectRenewer;
pub use renew::{Lifetime, Renewer};
pub use stringset::{StringSet, with_string_set};
