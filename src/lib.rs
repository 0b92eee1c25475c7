// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod categorize;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod profile;
pub mod recommend;
pub mod similarity;
pub mod store;
pub mod vectorize;

pub use crate::api::{router, AppState};
pub use crate::model::{ComponentVectorSet, Event, OnboardingAnswers, UserProfile};
