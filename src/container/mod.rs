//! Container documents and format dispatch
//!
//! A container is an ordered list of linked resources (palette, tileset,
//! tile maps) plus format-specific extra metadata. Containers are produced
//! by [`decode`] after [`classify`] picks a format, and serialized back by
//! [`Container::encode`].
//!
//! None of the supported formats carries a magic number, so classification
//! is structural. The predicates are not mutually exclusive by design;
//! [`CLASSIFY_ORDER`] fixes the precedence and is itself under test.

mod banner;
mod data_patch;
mod five_bg;
mod mbb;
mod time_ace;

pub use banner::{BannerInfo, WideTitle};
pub use data_patch::{DataPatchInfo, PatchLayout, PatchRegion, PatchRegions};
pub use mbb::MbbInfo;

use crate::bytes::ByteError;
use crate::models::{Palette, ResourceKind, TileMap, Tileset};
use serde::Serialize;
use thiserror::Error;

/// Error type for container decode/encode failures
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No format predicate matched the buffer
    #[error("buffer does not match any known container format")]
    UnknownFormat,
    /// Offsets or sizes inconsistent after classification passed
    #[error("structural violation: {0}")]
    Structural(String),
    /// Ran off the end of the buffer while decoding
    #[error("structural violation: {0}")]
    Truncated(#[from] ByteError),
    /// Encode attempted without all resources the format mandates
    #[error("container is missing a {0} required by its format")]
    Incomplete(ResourceKind),
    /// The format's slot metadata names more tile maps than are linked
    #[error("screen bitmap names {expected} tile maps but {actual} are linked")]
    SlotMismatch { expected: usize, actual: usize },
    /// Operation requires extra metadata the container does not carry
    #[error("container has no {0} metadata")]
    MissingMetadata(&'static str),
}

/// A non-fatal condition reported by an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identified container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerFormat {
    TimeAce,
    Banner,
    MultiBgBank,
    FiveBg,
    DataFilePatch,
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContainerFormat::TimeAce => "time-ace",
            ContainerFormat::Banner => "banner",
            ContainerFormat::MultiBgBank => "multi-bg-bank",
            ContainerFormat::FiveBg => "five-bg",
            ContainerFormat::DataFilePatch => "data-file-patch",
        };
        write!(f, "{name}")
    }
}

/// Sniffing precedence. First match wins; order is policy, not accident.
pub const CLASSIFY_ORDER: [ContainerFormat; 4] = [
    ContainerFormat::FiveBg,
    ContainerFormat::TimeAce,
    ContainerFormat::Banner,
    ContainerFormat::MultiBgBank,
];

/// Classifies a raw buffer, or `None` when nothing matches.
///
/// `DataFilePatch` is never sniffed: that variant is built explicitly by a
/// host that already located an embedded asset (see [`data_patch`]).
pub fn classify(bytes: &[u8]) -> Option<ContainerFormat> {
    CLASSIFY_ORDER.into_iter().find(|format| match format {
        ContainerFormat::FiveBg => five_bg::matches(bytes),
        ContainerFormat::TimeAce => time_ace::matches(bytes),
        ContainerFormat::Banner => banner::matches(bytes),
        ContainerFormat::MultiBgBank => mbb::matches(bytes),
        ContainerFormat::DataFilePatch => false,
    })
}

/// Classifies and decodes a buffer in one step.
pub fn decode(bytes: &[u8]) -> Result<Container, ContainerError> {
    match classify(bytes).ok_or(ContainerError::UnknownFormat)? {
        ContainerFormat::TimeAce => time_ace::decode(bytes),
        ContainerFormat::Banner => banner::decode(bytes),
        ContainerFormat::MultiBgBank => mbb::decode(bytes),
        ContainerFormat::FiveBg => five_bg::decode(bytes),
        ContainerFormat::DataFilePatch => unreachable!("data patch is not sniffed"),
    }
}

/// Builds a data-file-patch container from a preserved host buffer.
pub fn decode_data_patch(base: &[u8], layout: &PatchLayout) -> Result<Container, ContainerError> {
    data_patch::decode(base, layout)
}

/// A resource owned by a container.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkedResource {
    Palette(Palette),
    Tileset(Tileset),
    TileMap(TileMap),
}

impl LinkedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            LinkedResource::Palette(_) => ResourceKind::Palette,
            LinkedResource::Tileset(_) => ResourceKind::Tileset,
            LinkedResource::TileMap(_) => ResourceKind::TileMap,
        }
    }
}

/// Format-dependent extra metadata carried alongside the resources.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraMetadata {
    None,
    Banner(BannerInfo),
    Mbb(MbbInfo),
    DataPatch(DataPatchInfo),
}

/// An in-memory container document.
///
/// The container exclusively owns its resources; outside references should
/// be `(ResourceKind, index)` lookups, never a second owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    format: ContainerFormat,
    resources: Vec<LinkedResource>,
    extra: ExtraMetadata,
}

impl Container {
    /// Creates an empty container for a new asset.
    pub fn new(format: ContainerFormat) -> Self {
        Self {
            format,
            resources: Vec::new(),
            extra: ExtraMetadata::None,
        }
    }

    pub(crate) fn with_extra(format: ContainerFormat, extra: ExtraMetadata) -> Self {
        Self {
            format,
            resources: Vec::new(),
            extra,
        }
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn resources(&self) -> &[LinkedResource] {
        &self.resources
    }

    pub fn extra(&self) -> &ExtraMetadata {
        &self.extra
    }

    pub fn extra_mut(&mut self) -> &mut ExtraMetadata {
        &mut self.extra
    }

    pub fn set_extra(&mut self, extra: ExtraMetadata) {
        self.extra = extra;
    }

    /// Appends a resource; the container takes ownership.
    pub fn link(&mut self, resource: LinkedResource) {
        self.resources.push(resource);
    }

    /// Removes and returns the `index`-th resource of `kind`, if present.
    pub fn unlink(&mut self, kind: ResourceKind, index: usize) -> Option<LinkedResource> {
        let position = self
            .resources
            .iter()
            .enumerate()
            .filter(|(_, r)| r.kind() == kind)
            .nth(index)
            .map(|(i, _)| i)?;
        Some(self.resources.remove(position))
    }

    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.resources.iter().filter(|r| r.kind() == kind).count()
    }

    /// The `index`-th resource of `kind`, in link order.
    pub fn get(&self, kind: ResourceKind, index: usize) -> Option<&LinkedResource> {
        self.resources
            .iter()
            .filter(|r| r.kind() == kind)
            .nth(index)
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.resources.iter().find_map(|r| match r {
            LinkedResource::Palette(p) => Some(p),
            _ => None,
        })
    }

    pub fn tileset(&self) -> Option<&Tileset> {
        self.resources.iter().find_map(|r| match r {
            LinkedResource::Tileset(t) => Some(t),
            _ => None,
        })
    }

    pub fn tile_maps(&self) -> impl Iterator<Item = &TileMap> {
        self.resources.iter().filter_map(|r| match r {
            LinkedResource::TileMap(m) => Some(m),
            _ => None,
        })
    }

    /// Resource kinds the container's format mandates before it can be
    /// encoded. Every format needs a palette and a tileset; the multi-map
    /// formats also need at least one tile map. A data-file patch mandates
    /// exactly the kinds its region table describes.
    pub fn required_kinds(&self) -> Vec<ResourceKind> {
        match (&self.format, &self.extra) {
            (ContainerFormat::DataFilePatch, ExtraMetadata::DataPatch(info)) => {
                info.regions.kinds()
            }
            (ContainerFormat::FiveBg | ContainerFormat::MultiBgBank, _) => vec![
                ResourceKind::Palette,
                ResourceKind::Tileset,
                ResourceKind::TileMap,
            ],
            _ => vec![ResourceKind::Palette, ResourceKind::Tileset],
        }
    }

    /// `true` when the container holds every resource kind its format
    /// mandates and can therefore be encoded.
    pub fn is_savable(&self) -> bool {
        self.required_kinds()
            .into_iter()
            .all(|kind| self.count_of(kind) > 0)
    }

    /// Serializes the container back to its on-disk format.
    ///
    /// Warnings report lossy conditions (currently only data-file-patch
    /// region truncation); the encode still succeeds when they are present.
    pub fn encode(&self) -> Result<(Vec<u8>, Vec<Warning>), ContainerError> {
        for kind in self.required_kinds() {
            if self.count_of(kind) == 0 {
                return Err(ContainerError::Incomplete(kind));
            }
        }
        match self.format {
            ContainerFormat::TimeAce => Ok((time_ace::encode(self)?, Vec::new())),
            ContainerFormat::Banner => Ok((banner::encode(self)?, Vec::new())),
            ContainerFormat::MultiBgBank => Ok((mbb::encode(self)?, Vec::new())),
            ContainerFormat::FiveBg => Ok((five_bg::encode(self)?, Vec::new())),
            ContainerFormat::DataFilePatch => data_patch::encode(self),
        }
    }

    pub(crate) fn require_palette(&self) -> Result<&Palette, ContainerError> {
        self.palette()
            .ok_or(ContainerError::Incomplete(ResourceKind::Palette))
    }

    pub(crate) fn require_tileset(&self) -> Result<&Tileset, ContainerError> {
        self.tileset()
            .ok_or(ContainerError::Incomplete(ResourceKind::Tileset))
    }
}
