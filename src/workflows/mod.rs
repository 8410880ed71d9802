pub mod gateway;
pub mod spec_builder;
