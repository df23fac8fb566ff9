//! Terrain kinds and the environment classification rules.

/// Closed set of terrain kinds. The discriminant is the wire/disk ordinal,
/// so variants must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TerrainType {
    DeepOcean = 0,
    Ocean = 1,
    ShallowWater = 2,
    Beach = 3,
    Tundra = 4,
    Taiga = 5,
    Grassland = 6,
    Desert = 7,
    Savanna = 8,
    TropicalForest = 9,
    TemperateForest = 10,
    Shrubland = 11,
    Woodland = 12,
    Hills = 13,
    Mountain = 14,
    SnowMountain = 15,
    River = 16,
    Lake = 17,
    Swamp = 18,
    Steppe = 19,
    Rainforest = 20,
}

impl TerrainType {
    pub const ALL: [TerrainType; 21] = [
        TerrainType::DeepOcean,
        TerrainType::Ocean,
        TerrainType::ShallowWater,
        TerrainType::Beach,
        TerrainType::Tundra,
        TerrainType::Taiga,
        TerrainType::Grassland,
        TerrainType::Desert,
        TerrainType::Savanna,
        TerrainType::TropicalForest,
        TerrainType::TemperateForest,
        TerrainType::Shrubland,
        TerrainType::Woodland,
        TerrainType::Hills,
        TerrainType::Mountain,
        TerrainType::SnowMountain,
        TerrainType::River,
        TerrainType::Lake,
        TerrainType::Swamp,
        TerrainType::Steppe,
        TerrainType::Rainforest,
    ];

    /// Decode a persisted ordinal. Unknown values fall back to `Ocean`
    /// rather than poisoning the whole chunk.
    pub fn from_u8(ordinal: u8) -> TerrainType {
        Self::ALL
            .get(ordinal as usize)
            .copied()
            .unwrap_or(TerrainType::Ocean)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TerrainType::DeepOcean => "Deep Ocean",
            TerrainType::Ocean => "Ocean",
            TerrainType::ShallowWater => "Shallow Water",
            TerrainType::Beach => "Beach",
            TerrainType::Tundra => "Tundra",
            TerrainType::Taiga => "Taiga",
            TerrainType::Grassland => "Grassland",
            TerrainType::Desert => "Desert",
            TerrainType::Savanna => "Savanna",
            TerrainType::TropicalForest => "Tropical Forest",
            TerrainType::TemperateForest => "Temperate Forest",
            TerrainType::Shrubland => "Shrubland",
            TerrainType::Woodland => "Woodland",
            TerrainType::Hills => "Hills",
            TerrainType::Mountain => "Mountain",
            TerrainType::SnowMountain => "Snow Mountain",
            TerrainType::River => "River",
            TerrainType::Lake => "Lake",
            TerrainType::Swamp => "Swamp",
            TerrainType::Steppe => "Steppe",
            TerrainType::Rainforest => "Rainforest",
        }
    }

    /// Classify a tile from its environment.
    ///
    /// Rules are checked in priority order and the first match wins; the
    /// order is part of the world's identity and must not be rearranged.
    pub fn from_environment(
        height: f64,
        temperature: f64,
        moisture: f64,
        is_river: bool,
    ) -> TerrainType {
        // Rivers override land terrain up to the snow line.
        if is_river && height > 0.4 && height < 0.92 {
            return TerrainType::River;
        }

        // Ocean depth bands.
        if height < 0.3 {
            return TerrainType::DeepOcean;
        }
        if height < 0.38 {
            return TerrainType::Ocean;
        }
        if height < 0.42 {
            return TerrainType::ShallowWater;
        }

        // Peaks.
        if height > 0.92 {
            return TerrainType::SnowMountain;
        }
        if height > 0.85 {
            if temperature < 0.25 {
                return TerrainType::SnowMountain;
            }
            return TerrainType::Mountain;
        }

        if height > 0.75 {
            if temperature < 0.3 {
                return TerrainType::Mountain;
            }
            return if moisture < 0.3 {
                TerrainType::Shrubland
            } else {
                TerrainType::Woodland
            };
        }

        if height > 0.65 {
            return TerrainType::Hills;
        }

        if height > 0.55 {
            if moisture < 0.35 {
                return TerrainType::Shrubland;
            }
            return TerrainType::Woodland;
        }

        // Low elevation: biome family by temperature and moisture.
        if temperature < 0.15 && height > 0.5 {
            return TerrainType::Tundra;
        }

        if temperature < 0.3 {
            return if moisture > 0.4 {
                TerrainType::Taiga
            } else {
                TerrainType::Grassland
            };
        }

        if temperature < 0.6 {
            if moisture < 0.3 {
                return TerrainType::Grassland;
            }
            return TerrainType::TemperateForest;
        }

        if moisture < 0.45 {
            return TerrainType::Desert;
        }
        if moisture < 0.65 {
            return TerrainType::Savanna;
        }

        if height > 0.4 && height < 0.5 && moisture > 0.7 {
            return TerrainType::Swamp;
        }

        if height > 0.5 && height < 0.6 && moisture < 0.3 && temperature > 0.4 {
            return TerrainType::Steppe;
        }

        if temperature > 0.7 && moisture > 0.7 {
            return TerrainType::Rainforest;
        }

        if height > 0.92 {
            return TerrainType::SnowMountain;
        }

        if temperature < 0.2 && moisture < 0.4 {
            return TerrainType::Tundra;
        }

        TerrainType::Grassland
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_total() {
        // Sweep the whole environment cube; every combination must map to
        // some terrain kind without panicking.
        let mut seen = std::collections::HashSet::new();
        for hi in 0..=20 {
            for ti in 0..=20 {
                for mi in 0..=20 {
                    for river in [false, true] {
                        let h = hi as f64 / 20.0;
                        let t = ti as f64 / 20.0;
                        let m = mi as f64 / 20.0;
                        let terrain = TerrainType::from_environment(h, t, m, river);
                        seen.insert(terrain);
                    }
                }
            }
        }
        // The sweep should visit a healthy spread of the enumeration.
        assert!(seen.len() > 10, "only {} kinds reached", seen.len());
    }

    #[test]
    fn ordinal_round_trip() {
        for terrain in TerrainType::ALL {
            assert_eq!(TerrainType::from_u8(terrain as u8), terrain);
        }
    }

    #[test]
    fn unknown_ordinal_falls_back_to_ocean() {
        assert_eq!(TerrainType::from_u8(21), TerrainType::Ocean);
        assert_eq!(TerrainType::from_u8(255), TerrainType::Ocean);
    }

    #[test]
    fn ocean_bands() {
        assert_eq!(
            TerrainType::from_environment(0.1, 0.5, 0.5, false),
            TerrainType::DeepOcean
        );
        assert_eq!(
            TerrainType::from_environment(0.35, 0.5, 0.5, false),
            TerrainType::Ocean
        );
        assert_eq!(
            TerrainType::from_environment(0.40, 0.5, 0.5, false),
            TerrainType::ShallowWater
        );
    }

    #[test]
    fn rivers_override_land_but_not_peaks() {
        assert_eq!(
            TerrainType::from_environment(0.5, 0.5, 0.5, true),
            TerrainType::River
        );
        assert_eq!(
            TerrainType::from_environment(0.95, 0.5, 0.5, true),
            TerrainType::SnowMountain
        );
        // Below the waterline the river flag is meaningless.
        assert_eq!(
            TerrainType::from_environment(0.2, 0.5, 0.5, true),
            TerrainType::DeepOcean
        );
    }

    #[test]
    fn hot_dry_lowland_is_desert() {
        assert_eq!(
            TerrainType::from_environment(0.5, 0.8, 0.2, false),
            TerrainType::Desert
        );
    }

    #[test]
    fn cold_highland_is_tundra() {
        assert_eq!(
            TerrainType::from_environment(0.52, 0.1, 0.5, false),
            TerrainType::Tundra
        );
    }
}
