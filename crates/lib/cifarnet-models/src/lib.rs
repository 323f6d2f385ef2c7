#![forbid(unsafe_code)]

pub mod ai;
pub mod data;
