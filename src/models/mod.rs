pub mod credential;
pub mod deployment;
pub mod pod;
pub mod workload_spec;
