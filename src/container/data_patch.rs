//! In-place patching of assets embedded in a larger host file
//!
//! Some assets live at fixed offsets inside files that are otherwise opaque.
//! This variant preserves the whole host buffer and records where the
//! palette, char and screen regions sit; encoding clones the base and
//! overwrites only those regions, leaving every other byte untouched.
//!
//! There is no sniffer for this format: the host that located the embedded
//! asset builds the layout explicitly and calls [`decode`].

use crate::bytes::Writer;
use crate::container::{
    Container, ContainerError, ContainerFormat, ExtraMetadata, LinkedResource, Warning,
};
use crate::models::{MappingMode, Palette, ResourceKind, TileMap, Tileset};

/// One patchable byte region inside the host buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRegion {
    pub offset: usize,
    pub size: usize,
}

impl PatchRegion {
    fn end(self) -> usize {
        self.offset + self.size
    }
}

/// The set of regions an embedded asset occupies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchRegions {
    pub palette: Option<PatchRegion>,
    pub tileset: Option<PatchRegion>,
    pub tile_map: Option<PatchRegion>,
}

impl PatchRegions {
    /// Resource kinds this region table describes.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds = Vec::new();
        if self.palette.is_some() {
            kinds.push(ResourceKind::Palette);
        }
        if self.tileset.is_some() {
            kinds.push(ResourceKind::Tileset);
        }
        if self.tile_map.is_some() {
            kinds.push(ResourceKind::TileMap);
        }
        kinds
    }

    fn region_for(&self, kind: ResourceKind) -> Option<PatchRegion> {
        match kind {
            ResourceKind::Palette => self.palette,
            ResourceKind::Tileset => self.tileset,
            ResourceKind::TileMap => self.tile_map,
        }
    }
}

/// Everything a host must supply to lift an embedded asset out of its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchLayout {
    pub regions: PatchRegions,
    /// Bit depth of the embedded char data (4 or 8).
    pub bit_depth: u8,
    pub mapping: MappingMode,
    /// Pixel dimensions of the embedded screen; required when a tile-map
    /// region is present.
    pub map_size: Option<(u32, u32)>,
}

/// Extra metadata kept by a data-file-patch container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPatchInfo {
    /// The preserved host buffer.
    pub base: Vec<u8>,
    pub regions: PatchRegions,
}

pub(crate) fn decode(base: &[u8], layout: &PatchLayout) -> Result<Container, ContainerError> {
    for region in [
        layout.regions.palette,
        layout.regions.tileset,
        layout.regions.tile_map,
    ]
    .into_iter()
    .flatten()
    {
        if region.end() > base.len() {
            return Err(ContainerError::Structural(format!(
                "region {}..{} outside host buffer of {} bytes",
                region.offset,
                region.end(),
                base.len()
            )));
        }
    }

    let mut container = Container::with_extra(
        ContainerFormat::DataFilePatch,
        ExtraMetadata::DataPatch(DataPatchInfo {
            base: base.to_vec(),
            regions: layout.regions,
        }),
    );

    if let Some(region) = layout.regions.palette {
        let colors = base[region.offset..region.end()]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        container.link(LinkedResource::Palette(Palette::from_colors(
            colors,
            layout.bit_depth,
        )));
    }
    if let Some(region) = layout.regions.tileset {
        let per_tile = 8 * layout.bit_depth as usize;
        let tileset = Tileset::from_bytes(
            &base[region.offset..region.end()],
            region.size / per_tile,
            layout.bit_depth,
            layout.mapping,
        )
        .expect("tile count derived from region size");
        container.link(LinkedResource::Tileset(tileset));
    }
    if let Some(region) = layout.regions.tile_map {
        let (width, height) = layout.map_size.ok_or_else(|| {
            ContainerError::Structural("tile-map region requires map dimensions".into())
        })?;
        let cells = (width / 8) as usize * (height / 8) as usize;
        if region.size < cells * 2 {
            return Err(ContainerError::Structural(
                "tile-map region smaller than its dimensions".into(),
            ));
        }
        let entries = base[region.offset..region.offset + cells * 2]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let map = TileMap::from_entries(width, height, entries)
            .expect("entry count derived from dimensions");
        container.link(LinkedResource::TileMap(map));
    }
    Ok(container)
}

pub(crate) fn encode(container: &Container) -> Result<(Vec<u8>, Vec<Warning>), ContainerError> {
    let ExtraMetadata::DataPatch(info) = container.extra() else {
        return Err(ContainerError::MissingMetadata("data patch"));
    };

    let mut out = info.base.clone();
    let mut warnings = Vec::new();

    for resource in container.resources() {
        let Some(region) = info.regions.region_for(resource.kind()) else {
            continue;
        };
        let bytes = match resource {
            LinkedResource::Palette(palette) => {
                let mut writer = Writer::new();
                writer.write_u16_array(palette.colors());
                writer.into_bytes()
            }
            LinkedResource::Tileset(tileset) => tileset.to_bytes(),
            LinkedResource::TileMap(map) => {
                let mut writer = Writer::new();
                writer.write_u16_array(map.entries());
                writer.into_bytes()
            }
        };
        let len = bytes.len().min(region.size);
        if bytes.len() > region.size {
            // Growth past the original region is unsupported by design;
            // the overflow is dropped and reported.
            warnings.push(Warning::new(format!(
                "{} data ({} bytes) exceeds its {}-byte region, truncating",
                resource.kind(),
                bytes.len(),
                region.size
            )));
        }
        out[region.offset..region.offset + len].copy_from_slice(&bytes[..len]);
    }

    Ok((out, warnings))
}
