//! The terrain pipeline: macro-first continental generation.
//!
//! Continents carry a global climate that dictates local features, so a
//! desert continent stays a desert even where local noise would have put
//! a forest. Every tile is a pure function of (seed, x, y); no
//! cross-chunk state is ever consulted, which keeps chunk generation
//! order-independent.

use crate::constants::{CHUNK_SIZE, SCALE_CONTINENT, SCALE_MACRO, SCALE_RIVER, SEA_LEVEL};
use crate::core::chunk::Chunk;
use crate::core::terrain::TerrainType;
use crate::core::tile::Tile;
use crate::world::biome::{Biome, DesertBiome, StandardBiome};
use crate::world::noise::PerlinNoise;

/// Deterministic world generator.
pub struct MapGenerator {
    seed: i64,

    // Low frequency: macro shapes and climate zones.
    noise_continental: PerlinNoise,
    noise_macro_temp: PerlinNoise,
    noise_macro_moist: PerlinNoise,

    // Medium/high frequency: local shape.
    noise_mountain: PerlinNoise,
    noise_local_height: PerlinNoise,
    noise_local_temp: PerlinNoise,
    noise_local_moist: PerlinNoise,

    noise_river: PerlinNoise,
    noise_mountain_control: PerlinNoise,

    standard_biome: StandardBiome,
    desert_biome: DesertBiome,
}

impl MapGenerator {
    pub fn new(seed: i64) -> Self {
        Self {
            seed,
            noise_continental: PerlinNoise::new(seed),
            noise_macro_temp: PerlinNoise::new(seed.wrapping_add(10)),
            noise_macro_moist: PerlinNoise::new(seed.wrapping_add(20)),
            noise_mountain: PerlinNoise::new(seed.wrapping_add(1)),
            noise_local_height: PerlinNoise::new(seed.wrapping_add(2)),
            noise_local_temp: PerlinNoise::new(seed.wrapping_add(40)),
            noise_local_moist: PerlinNoise::new(seed.wrapping_add(50)),
            noise_river: PerlinNoise::new(seed.wrapping_add(5)),
            noise_mountain_control: PerlinNoise::new(seed.wrapping_add(7)),
            standard_biome: StandardBiome,
            desert_biome: DesertBiome,
        }
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// Fill every cell of a chunk. No-op if the chunk is already
    /// populated; leaves the `modified` flag untouched.
    pub fn generate_into(&self, chunk: &mut Chunk) {
        if chunk.generated {
            return;
        }

        for local_x in 0..CHUNK_SIZE {
            for local_y in 0..CHUNK_SIZE {
                let world_x = chunk.world_x(local_x);
                let world_y = chunk.world_y(local_y);
                chunk.set_tile(local_x, local_y, self.tile_at(world_x, world_y));
            }
        }
        chunk.generated = true;
    }

    /// Convenience wrapper producing a fresh, fully generated chunk.
    pub fn generate_chunk(&self, chunk_x: i32, chunk_y: i32) -> Chunk {
        let mut chunk = Chunk::new(chunk_x, chunk_y);
        self.generate_into(&mut chunk);
        chunk
    }

    /// The per-tile pipeline.
    pub fn tile_at(&self, world_x: i32, world_y: i32) -> Tile {
        let continent = self.continental_value(world_x, world_y);
        let macro_temp = self.macro_temperature(world_x, world_y);
        let macro_moist = self.macro_moisture(world_x, world_y);

        let is_land = continent > SEA_LEVEL;

        let mut height = if is_land {
            // 0.0 at the coast, 1.0 deep inland.
            let land_factor = (continent - SEA_LEVEL) / (1.0 - SEA_LEVEL);
            self.land_height(world_x, world_y, land_factor, macro_temp, macro_moist)
        } else {
            self.ocean_height(continent, world_x, world_y)
        };

        let temperature = self.resolve_temperature(world_x, world_y, macro_temp, height);
        let moisture = self.resolve_moisture(world_x, world_y, macro_moist);

        let river_factor = self.river_factor(world_x, world_y, height, macro_moist);
        let is_river = river_factor > 0.0;
        if is_river {
            // Carve the channel but never below shallow-ocean depth.
            height = (height - 0.06 * river_factor).max(0.2);
        }

        let terrain = TerrainType::from_environment(height, temperature, moisture, is_river);
        Tile::new(terrain, height.clamp(0.0, 1.0), temperature, moisture)
    }

    fn continental_value(&self, x: i32, y: i32) -> f64 {
        let xf = x as f64;
        let yf = y as f64;

        // Domain warp: displace the sample point by the same field to break
        // up blobby continent outlines.
        let wx = xf + self.noise_continental.noise(xf * 0.0001, yf * 0.0001) * 200.0;
        let wy = yf + self.noise_continental.noise(yf * 0.0001, xf * 0.0001) * 200.0;

        self.noise_continental.octave(wx, wy, 4, 0.5, SCALE_CONTINENT)
    }

    // 0.0 = polar, 1.0 = equatorial. Very smooth, sweeping changes.
    fn macro_temperature(&self, x: i32, y: i32) -> f64 {
        self.noise_macro_temp
            .octave(x as f64, y as f64, 2, 0.5, SCALE_MACRO)
    }

    fn macro_moisture(&self, x: i32, y: i32) -> f64 {
        self.noise_macro_moist
            .octave(x as f64, y as f64, 2, 0.5, SCALE_MACRO)
    }

    fn ocean_height(&self, continent: f64, x: i32, y: i32) -> f64 {
        // Normalize 0.0..SEA_LEVEL to 0.0..1.0, then map onto deep ocean
        // (0.1) up to shallow coast (0.38).
        let factor = continent / SEA_LEVEL;
        let base = 0.1 + factor * 0.28;

        // Sand ripples.
        let ripple = self
            .noise_local_height
            .octave(x as f64, y as f64, 2, 0.5, 0.02)
            * 0.02;

        (base + ripple).min(0.39)
    }

    fn land_height(
        &self,
        x: i32,
        y: i32,
        land_factor: f64,
        macro_temp: f64,
        macro_moist: f64,
    ) -> f64 {
        // How deep into desert territory this climate sits, 0.0 outside.
        let mut desert_score = 0.0;
        if macro_temp > 0.55 && macro_moist < 0.45 {
            let dry_factor = (0.45 - macro_moist) / 0.45;
            let hot_factor = (macro_temp - 0.55) / 0.45;
            desert_score = ((dry_factor + hot_factor) / 2.0 * 1.5).min(1.0);
        }

        // Low-frequency control field carves the world into mountain
        // ranges separated by flat gaps.
        let range_control =
            self.noise_mountain_control
                .octave(x as f64, y as f64, 2, 0.5, 0.0003);
        let mut mountain_mask = ((range_control - 0.20) / 0.80).max(0.0);
        // No peaks on the beach.
        mountain_mask = mountain_mask.min(land_factor * 5.0);

        let base_land = SEA_LEVEL + 0.02 + land_factor * 0.1;

        let h_desert = self.desert_biome.height(
            x,
            y,
            base_land,
            mountain_mask,
            &self.noise_local_height,
            &self.noise_mountain,
        );
        let h_standard = self.standard_biome.height(
            x,
            y,
            base_land,
            mountain_mask,
            &self.noise_local_height,
            &self.noise_mountain,
        );

        h_standard * (1.0 - desert_score) + h_desert * desert_score
    }

    fn resolve_temperature(&self, x: i32, y: i32, macro_temp: f64, height: f64) -> f64 {
        let local_var = self
            .noise_local_temp
            .noise(x as f64 * 0.01, y as f64 * 0.01)
            * 0.05;

        // Altitude cooling above the midline.
        let height_cooling = (height - 0.5).max(0.0) * 0.4;

        (macro_temp + local_var - height_cooling).clamp(0.0, 1.0)
    }

    fn resolve_moisture(&self, x: i32, y: i32, macro_moist: f64) -> f64 {
        let local_var = self
            .noise_local_moist
            .noise(x as f64 * 0.01, y as f64 * 0.01)
            * 0.05;

        // Inside a dry macro-zone the local variation must never push a
        // tile over the desert classification threshold.
        if macro_moist < 0.3 {
            return (macro_moist + local_var).min(0.42).max(0.0);
        }

        (macro_moist + local_var).clamp(0.0, 1.0)
    }

    /// River strength in [0, 1]; 0 means no river at this tile.
    fn river_factor(&self, x: i32, y: i32, height: f64, macro_moist: f64) -> f64 {
        if height < SEA_LEVEL - 0.02 {
            return 0.0;
        }

        // Dry continents spawn rivers rarely or not at all.
        let mut threshold = 0.985;
        if macro_moist < 0.35 {
            let dryness = (0.35 - macro_moist) / 0.15;
            threshold += dryness * 0.1;
        }
        if threshold >= 1.0 {
            return 0.0;
        }

        let val = self
            .noise_river
            .octave(x as f64, y as f64, 4, 0.5, SCALE_RIVER);
        let ridge = 1.0 - (val - 0.5).abs() * 2.0;

        if ridge < threshold {
            return 0.0;
        }
        (ridge - threshold) / (1.0 - threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let a = MapGenerator::new(123456);
        let b = MapGenerator::new(123456);

        let chunk_a = a.generate_chunk(3, -2);
        let chunk_b = b.generate_chunk(3, -2);

        assert_eq!(
            chunk_a.serialize().unwrap(),
            chunk_b.serialize().unwrap(),
            "same seed must produce byte-identical chunks"
        );
    }

    #[test]
    fn tiles_are_bit_identical_across_runs() {
        let a = MapGenerator::new(987);
        let b = MapGenerator::new(987);

        for (x, y) in [(0, 0), (1000, -1000), (-37, 411), (123456, 654321)] {
            let ta = a.tile_at(x, y);
            let tb = b.tile_at(x, y);
            assert_eq!(ta.height.to_bits(), tb.height.to_bits());
            assert_eq!(ta.temperature.to_bits(), tb.temperature.to_bits());
            assert_eq!(ta.moisture.to_bits(), tb.moisture.to_bits());
            assert_eq!(ta.terrain, tb.terrain);
        }
    }

    #[test]
    fn different_seeds_make_different_worlds() {
        let a = MapGenerator::new(1);
        let b = MapGenerator::new(2);

        let mut differs = false;
        for i in 0..64 {
            if a.tile_at(i * 100, 0).height != b.tile_at(i * 100, 0).height {
                differs = true;
                break;
            }
        }
        assert!(differs);
    }

    #[test]
    fn chunk_generation_is_order_independent() {
        let gen = MapGenerator::new(555);

        // Generate the target chunk cold, then again after its neighbors.
        let cold = gen.generate_chunk(4, 4);

        for cx in 3..=5 {
            for cy in 3..=5 {
                let _ = gen.generate_chunk(cx, cy);
            }
        }
        let warm = gen.generate_chunk(4, 4);

        assert_eq!(cold.serialize().unwrap(), warm.serialize().unwrap());
    }

    #[test]
    fn generated_chunk_is_fully_populated() {
        let gen = MapGenerator::new(42);
        let chunk = gen.generate_chunk(-7, 9);

        assert!(chunk.generated);
        assert!(!chunk.modified);
        for lx in 0..CHUNK_SIZE {
            for ly in 0..CHUNK_SIZE {
                assert!(chunk.tile(lx, ly).is_some(), "hole at ({lx}, {ly})");
            }
        }
    }

    #[test]
    fn scalar_fields_stay_in_range() {
        let gen = MapGenerator::new(2024);
        for cx in -3..3 {
            for cy in -3..3 {
                let chunk = gen.generate_chunk(cx * 50, cy * 50);
                for lx in 0..CHUNK_SIZE {
                    for ly in 0..CHUNK_SIZE {
                        let tile = chunk.tile(lx, ly).unwrap();
                        assert!((0.0..=1.0).contains(&tile.height));
                        assert!((0.0..=1.0).contains(&tile.temperature));
                        assert!((0.0..=1.0).contains(&tile.moisture));
                        assert_eq!(tile.owner_id, -1);
                        assert_eq!(tile.structure_id, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn generate_into_skips_populated_chunks() {
        let gen = MapGenerator::new(9);
        let mut chunk = gen.generate_chunk(0, 0);
        let before = chunk.serialize().unwrap();

        chunk.modified = true;
        gen.generate_into(&mut chunk);

        assert!(chunk.modified, "regeneration must not touch an edited chunk");
        let mut after = Chunk::deserialize(&chunk.serialize().unwrap()).unwrap();
        after.modified = false;
        assert_eq!(before, after.serialize().unwrap());
    }

    #[test]
    fn dry_zones_cap_moisture() {
        // Scan for tiles sitting in a dry macro-zone and check the clamp.
        let gen = MapGenerator::new(31415);
        let mut checked = 0;
        for i in 0..4000 {
            let x = i * 137;
            let y = -i * 89;
            if gen.macro_moisture(x, y) < 0.3 {
                let tile = gen.tile_at(x, y);
                assert!(tile.moisture <= 0.42 + 1e-12);
                checked += 1;
            }
        }
        assert!(checked > 0, "sweep never hit a dry macro-zone");
    }
}
