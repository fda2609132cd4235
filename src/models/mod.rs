//! Resource primitives linked into container documents
//!
//! A decoded container owns a set of these: a color palette, a tileset of
//! fixed-size indexed tiles, and zero or more tile maps describing how tiles
//! compose into a background. They carry only normalized state; all
//! format-specific layout lives in the codecs.

mod palette;
mod tilemap;
mod tileset;

pub use palette::Palette;
pub use tilemap::{MapEntry, TileMap};
pub use tileset::{MappingMode, Tileset, TILE_PIXELS};

use serde::{Deserialize, Serialize};

/// The kind of a linked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Palette,
    Tileset,
    TileMap,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Palette => write!(f, "palette"),
            ResourceKind::Tileset => write!(f, "tileset"),
            ResourceKind::TileMap => write!(f, "tile map"),
        }
    }
}
