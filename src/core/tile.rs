//! A single cell of the world grid.

use crate::core::terrain::TerrainType;

/// One tile. Environment fields are produced by generation; ownership and
/// structure fields only change through edits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub terrain: TerrainType,
    /// 0.0 (abyss) to 1.0 (peak).
    pub height: f64,
    pub temperature: f64,
    pub moisture: f64,
    /// -1 = unclaimed.
    pub owner_id: i64,
    /// 0 = none; otherwise an index into a structure registry.
    pub structure_id: i32,
    /// Resource count / storage contents.
    pub content_amount: i32,
    pub rotation: i8,
}

impl Tile {
    pub fn new(terrain: TerrainType, height: f64, temperature: f64, moisture: f64) -> Self {
        Self {
            terrain,
            height,
            temperature,
            moisture,
            owner_id: -1,
            structure_id: 0,
            content_amount: 0,
            rotation: 0,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.owner_id != -1
    }

    pub fn has_structure(&self) -> bool {
        self.structure_id != 0
    }
}
