// src/config/mod.rs
pub mod app;
pub mod settings;

pub use app::AppConfig;
pub use settings::{
    AlphabetSettings, Catalog, FusionSettings, ProfileSettings, RankingSettings, Settings,
    OTHER_LABEL,
};
