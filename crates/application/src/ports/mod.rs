//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the session core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod clock;
mod identity_client;
mod token_store;

pub use clock::Clock;
pub use identity_client::IdentityClient;
pub use token_store::{StoreError, TokenStore};
