pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod grid;
pub mod hotspots;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod rarity;
pub mod render;
pub mod richness;
pub mod stats;
