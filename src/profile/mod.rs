// src/profile/mod.rs
pub mod builder;
pub mod service;

pub use builder::{exponential_smoothing, ProfileBuilder};
pub use service::ProfileService;
