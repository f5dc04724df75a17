//! Identity provider adapters.

mod identity_client;

pub use identity_client::ReqwestIdentityClient;
