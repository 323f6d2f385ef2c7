pub mod builder;
pub mod config;
