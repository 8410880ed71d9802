//! Control-plane identity: where credentials come from and how the process
//! shares them between concurrent requests.

pub mod cache;
pub mod resolver;

pub use cache::CredentialCache;
pub use resolver::InClusterResolver;
