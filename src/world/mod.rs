//! Deterministic terrain synthesis.

pub mod biome;
pub mod generator;
pub mod noise;

pub use biome::{Biome, DesertBiome, StandardBiome};
pub use generator::MapGenerator;
pub use noise::PerlinNoise;
