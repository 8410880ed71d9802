pub mod cluster;
#[cfg(test)]
pub mod mock;

pub use cluster::{ControlPlane, KubeControlPlane};
