//! I/O modules for raster containers, tile discovery and run artifacts

pub mod hdf_reader;
pub mod tile_catalog;
pub mod artifacts;
pub mod render;

pub use hdf_reader::HdfContainer;
pub use tile_catalog::{discover_tiles, parse_tile_name, tile_from_path};
pub use artifacts::{read_summary_csv, write_summary_csv, write_timeseries_json};
pub use render::{ColormapRenderer, FrameRenderer};
