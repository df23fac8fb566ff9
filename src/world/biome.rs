//! Height-shaping strategies per biome family.
//!
//! The generator resolves a desert score per tile and blends the two
//! strategies, so both are evaluated with the same shared noise fields
//! to keep mountain ranges connected across the blend.

use crate::world::noise::PerlinNoise;

/// A biome's contribution to terrain height.
pub trait Biome: Send + Sync {
    /// Final height for a land tile, built on the continental base height
    /// and gated by the mountain mask.
    fn height(
        &self,
        world_x: i32,
        world_y: i32,
        base_land: f64,
        mountain_mask: f64,
        hill_noise: &PerlinNoise,
        mountain_noise: &PerlinNoise,
    ) -> f64;

    /// Whether rivers may carve through this biome.
    fn allows_rivers(&self) -> bool;
}

/// Rolling hills plus ridged mountain ranges. Forests, grasslands, tundra.
pub struct StandardBiome;

impl Biome for StandardBiome {
    fn height(
        &self,
        world_x: i32,
        world_y: i32,
        base_land: f64,
        mountain_mask: f64,
        hill_noise: &PerlinNoise,
        mountain_noise: &PerlinNoise,
    ) -> f64 {
        let x = world_x as f64;
        let y = world_y as f64;

        let hills = (hill_noise.octave(x, y, 4, 0.5, 0.01) - 0.5) * 2.0;

        // Ridged noise: fold around 0.5 so the midline becomes the crest,
        // then cube to sharpen.
        let raw = mountain_noise.octave(x, y, 5, 0.5, 0.002);
        let mountains = (1.0 - (raw - 0.5).abs() * 2.0).powi(3);

        base_land + hills * 0.05 + mountains * 0.48 * mountain_mask
    }

    fn allows_rivers(&self) -> bool {
        true
    }
}

/// Flat plateaus with subtle dunes; shares the mountain field with the
/// standard biome so ranges continue across desert borders.
pub struct DesertBiome;

impl Biome for DesertBiome {
    fn height(
        &self,
        world_x: i32,
        world_y: i32,
        base_land: f64,
        mountain_mask: f64,
        hill_noise: &PerlinNoise,
        mountain_noise: &PerlinNoise,
    ) -> f64 {
        let x = world_x as f64;
        let y = world_y as f64;

        let dunes = (hill_noise.octave(x, y, 2, 0.5, 0.02) - 0.5) * 0.02;

        let raw = mountain_noise.octave(x, y, 5, 0.5, 0.002);
        let mountains = (1.0 - (raw - 0.5).abs() * 2.0).powi(3);

        base_land + dunes + mountains * 0.48 * mountain_mask
    }

    fn allows_rivers(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desert_is_flatter_than_standard_without_mountains() {
        let hill = PerlinNoise::new(10);
        let mountain = PerlinNoise::new(11);

        let mut standard_spread: f64 = 0.0;
        let mut desert_spread: f64 = 0.0;
        for i in 0..500 {
            let x = i * 13;
            let y = i * 7;
            let hs = StandardBiome.height(x, y, 0.5, 0.0, &hill, &mountain);
            let hd = DesertBiome.height(x, y, 0.5, 0.0, &hill, &mountain);
            standard_spread = standard_spread.max((hs - 0.5).abs());
            desert_spread = desert_spread.max((hd - 0.5).abs());
        }

        assert!(desert_spread < standard_spread);
        assert!(desert_spread <= 0.01 + 1e-9);
    }

    #[test]
    fn river_permissions() {
        assert!(StandardBiome.allows_rivers());
        assert!(!DesertBiome.allows_rivers());
    }

    #[test]
    fn mountain_mask_gates_uplift() {
        let hill = PerlinNoise::new(3);
        let mountain = PerlinNoise::new(4);

        // With a full mask the ridged term may add up to 0.48; with a zero
        // mask only the hill term remains.
        let flat = StandardBiome.height(100, 100, 0.5, 0.0, &hill, &mountain);
        assert!((flat - 0.5).abs() <= 0.05 + 1e-9);

        let lifted = StandardBiome.height(100, 100, 0.5, 1.0, &hill, &mountain);
        assert!(lifted >= flat - 1e-9);
    }
}
