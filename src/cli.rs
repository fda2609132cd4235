//! Command-line interface implementation

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cell::{self, CellBank, CellFormat};
use crate::compositor::{self, OutlineTarget, RenderOptions};
use crate::container::{self, Container, ContainerFormat, ExtraMetadata, LinkedResource};
use crate::oam::ObjectDescriptor;
use crate::output::{save_png, scale_image};

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// tbk - inspect and render legacy tile-graphics containers and cell banks
#[derive(Parser)]
#[command(name = "tbk")]
#[command(about = "Inspect and render legacy tile-graphics containers and cell banks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report which container or cell-bank format a file matches
    Identify {
        /// File to classify
        input: PathBuf,
    },
    /// Decode a file and describe its contents
    Info {
        /// File to decode
        input: PathBuf,

        /// Emit a machine-readable JSON description
        #[arg(long)]
        json: bool,
    },
    /// Composite one cell of a cell bank to a PNG
    RenderCell {
        /// Cell bank file
        input: PathBuf,

        /// Container file providing the palette and tileset
        #[arg(short, long)]
        graphics: PathBuf,

        /// Cell index to render
        #[arg(short, long, default_value = "0")]
        cell: usize,

        /// Output PNG path. Default: {input}_cell{N}.png
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fill transparent pixels with a checkerboard
        #[arg(long)]
        checker: bool,

        /// Draw a highlight outline around one object
        #[arg(long)]
        outline: Option<usize>,

        /// Draw highlight outlines around every object
        #[arg(long)]
        outline_all: bool,

        /// Scale output by integer factor (1-16, default: 1)
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=16))]
        scale: u8,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Identify { input } => run_identify(&input),
        Commands::Info { input, json } => run_info(&input, json),
        Commands::RenderCell {
            input,
            graphics,
            cell,
            output,
            checker,
            outline,
            outline_all,
            scale,
        } => {
            let outline = if outline_all {
                Some(OutlineTarget::All)
            } else {
                outline.map(OutlineTarget::Object)
            };
            run_render_cell(
                &input,
                &graphics,
                cell,
                output.as_deref(),
                checker,
                outline,
                scale,
            )
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ExitCode> {
    fs::read(path).map_err(|e| {
        eprintln!("Error: Cannot read '{}': {}", path.display(), e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })
}

fn run_identify(input: &Path) -> ExitCode {
    let bytes = match read_file(input) {
        Ok(bytes) => bytes,
        Err(code) => return code,
    };

    if let Some(format) = container::classify(&bytes) {
        println!("container: {format}");
        return ExitCode::from(EXIT_SUCCESS);
    }
    if let Some(format) = cell::classify(&bytes) {
        println!("cell bank: {format}");
        return ExitCode::from(EXIT_SUCCESS);
    }
    println!("unknown");
    ExitCode::from(EXIT_ERROR)
}

#[derive(Serialize)]
struct ResourceSummary {
    kind: crate::models::ResourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    colors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tiles: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bit_depth: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<(u32, u32)>,
}

#[derive(Serialize)]
struct ContainerSummary {
    format: ContainerFormat,
    resources: Vec<ResourceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    banner: Option<crate::container::BannerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    screen_bitmap: Option<u8>,
}

#[derive(Serialize)]
struct CellSummary {
    attributes: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<crate::cell::Bounds>,
    objects: Vec<ObjectDescriptor>,
}

#[derive(Serialize)]
struct CellBankSummary {
    format: CellFormat,
    mapping: crate::models::MappingMode,
    cells: Vec<CellSummary>,
    has_label: bool,
    has_extension: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    transfers: Option<Vec<crate::cell::VramTransfer>>,
}

fn summarize_container(container: &Container) -> ContainerSummary {
    let resources = container
        .resources()
        .iter()
        .map(|resource| match resource {
            LinkedResource::Palette(p) => ResourceSummary {
                kind: resource.kind(),
                colors: Some(p.color_count()),
                tiles: None,
                bit_depth: Some(p.bit_depth()),
                size: None,
            },
            LinkedResource::Tileset(t) => ResourceSummary {
                kind: resource.kind(),
                colors: None,
                tiles: Some(t.tile_count()),
                bit_depth: Some(t.bit_depth()),
                size: None,
            },
            LinkedResource::TileMap(m) => ResourceSummary {
                kind: resource.kind(),
                colors: None,
                tiles: None,
                bit_depth: None,
                size: Some((m.width(), m.height())),
            },
        })
        .collect();
    let (banner, screen_bitmap) = match container.extra() {
        ExtraMetadata::Banner(info) => (Some(info.clone()), None),
        ExtraMetadata::Mbb(info) => (None, Some(info.screen_bitmap)),
        _ => (None, None),
    };
    ContainerSummary {
        format: container.format(),
        resources,
        banner,
        screen_bitmap,
    }
}

fn summarize_cell_bank(bank: &CellBank) -> CellBankSummary {
    CellBankSummary {
        format: bank.format(),
        mapping: bank.mapping(),
        cells: bank
            .cells()
            .iter()
            .map(|cell| CellSummary {
                attributes: cell.attributes,
                bounds: cell.bounds,
                objects: (0..cell.objects.len())
                    .filter_map(|i| cell.object(i))
                    .collect(),
            })
            .collect(),
        has_label: bank.label().is_some(),
        has_extension: bank.extension().is_some(),
        transfers: bank.transfers().map(|t| t.to_vec()),
    }
}

fn print_container(summary: &ContainerSummary) {
    println!("container: {}", summary.format);
    for resource in &summary.resources {
        match resource.kind {
            crate::models::ResourceKind::Palette => println!(
                "  palette: {} colors, {}bpp",
                resource.colors.unwrap_or(0),
                resource.bit_depth.unwrap_or(0)
            ),
            crate::models::ResourceKind::Tileset => println!(
                "  tileset: {} tiles, {}bpp",
                resource.tiles.unwrap_or(0),
                resource.bit_depth.unwrap_or(0)
            ),
            crate::models::ResourceKind::TileMap => {
                let (w, h) = resource.size.unwrap_or((0, 0));
                println!("  tile map: {w}x{h}");
            }
        }
    }
    if let Some(info) = &summary.banner {
        println!("  version: {}", info.version);
        println!("  title: {}", info.title_english.to_string_lossy());
    }
    if let Some(bitmap) = summary.screen_bitmap {
        println!("  screen slots: {bitmap:04b}");
    }
}

fn print_cell_bank(summary: &CellBankSummary) {
    println!("cell bank: {}", summary.format);
    let objects: usize = summary.cells.iter().map(|c| c.objects.len()).sum();
    println!("  cells: {} ({} objects)", summary.cells.len(), objects);
    println!("  mapping: {:?}", summary.mapping);
    if summary.has_label {
        println!("  label data present");
    }
    if summary.has_extension {
        println!("  user extension present");
    }
    if let Some(transfers) = &summary.transfers {
        println!("  vram transfers: {}", transfers.len());
    }
}

fn run_info(input: &Path, json: bool) -> ExitCode {
    let bytes = match read_file(input) {
        Ok(bytes) => bytes,
        Err(code) => return code,
    };

    if container::classify(&bytes).is_some() {
        let container = match container::decode(&bytes) {
            Ok(container) => container,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::from(EXIT_ERROR);
            }
        };
        let summary = summarize_container(&container);
        if json {
            println!("{}", serde_json::to_string_pretty(&summary).unwrap());
        } else {
            print_container(&summary);
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    if cell::classify(&bytes).is_some() {
        let bank = match cell::decode(&bytes) {
            Ok(bank) => bank,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::from(EXIT_ERROR);
            }
        };
        let summary = summarize_cell_bank(&bank);
        if json {
            println!("{}", serde_json::to_string_pretty(&summary).unwrap());
        } else {
            print_cell_bank(&summary);
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    eprintln!(
        "Error: '{}' does not match any known format",
        input.display()
    );
    ExitCode::from(EXIT_ERROR)
}

#[allow(clippy::too_many_arguments)]
fn run_render_cell(
    input: &Path,
    graphics: &Path,
    cell_index: usize,
    output: Option<&Path>,
    checker: bool,
    outline: Option<OutlineTarget>,
    scale: u8,
) -> ExitCode {
    let cell_bytes = match read_file(input) {
        Ok(bytes) => bytes,
        Err(code) => return code,
    };
    let graphics_bytes = match read_file(graphics) {
        Ok(bytes) => bytes,
        Err(code) => return code,
    };

    let bank = match cell::decode(&cell_bytes) {
        Ok(bank) => bank,
        Err(e) => {
            eprintln!("Error: '{}': {}", input.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let container = match container::decode(&graphics_bytes) {
        Ok(container) => container,
        Err(e) => {
            eprintln!("Error: '{}': {}", graphics.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let Some(cell) = bank.cells().get(cell_index) else {
        eprintln!(
            "Error: cell {} out of range ({} cells)",
            cell_index,
            bank.cells().len()
        );
        return ExitCode::from(EXIT_INVALID_ARGS);
    };
    let (Some(palette), Some(mut tileset)) =
        (container.palette().cloned(), container.tileset().cloned())
    else {
        eprintln!(
            "Error: '{}' holds no palette and tileset to render with",
            graphics.display()
        );
        return ExitCode::from(EXIT_ERROR);
    };
    // Objects address tiles through the bank's mapping, not the source
    // container's.
    tileset.set_mapping(bank.mapping());

    let mut canvas = compositor::blank_canvas();
    let options = RenderOptions {
        checker,
        outline,
        ..RenderOptions::default()
    };
    compositor::render_cell(
        &mut canvas,
        cell,
        &tileset,
        &palette,
        bank.transfer_for(cell_index),
        &options,
    );

    let out_path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            input.with_file_name(format!("{stem}_cell{cell_index}.png"))
        }
    };
    let image = scale_image(canvas, scale);
    if let Err(e) = save_png(&image, &out_path) {
        eprintln!("Error: cannot write '{}': {}", out_path.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }
    println!("Wrote {}", out_path.display());
    ExitCode::from(EXIT_SUCCESS)
}
