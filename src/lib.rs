//! pcd2bin - Convert PCD point clouds into flat binary record files
//!
//! Each `.pcd` file (ASCII or binary data section) becomes a `.bin` file made
//! of 16-byte records, one per point, in input order:
//!
//! | offset | value                |
//! |--------|----------------------|
//! | 0      | `x` as f32 LE        |
//! | 4      | `y` as f32 LE        |
//! | 8      | `z` as f32 LE        |
//! | 12     | `intensity / 256.0`  |
//!
//! A `meta.csv` manifest lists every converted input next to its output.
//!
//! # Features
//!
//! - **Reader**: PCD v0.7 headers, `ascii`, `binary` and `binary_compressed`
//!   data, any field order,
//!   extra fields ignored, `I`/`U`/`F` fields of any size narrowed to f32
//! - **Encoder**: fixed record layout, atomic temp-file-then-rename writes
//! - **Batch conversion**: recursive discovery, sorted deterministic manifest,
//!   parallel workers, skip-and-continue or fail-fast
//!
//! # Example
//!
//! ```rust,no_run
//! use pcd2bin::{encoder, pcd};
//! use std::path::Path;
//!
//! let cloud = pcd::load_requiring("scan.pcd", &encoder::RECORD_FIELDS)?;
//! let buf = encoder::encode(&cloud)?;
//! encoder::write(&buf, Path::new("scan.bin"))?;
//! # Ok::<(), pcd2bin::Error>(())
//! ```

mod atomic;
pub mod cli;
pub mod convert;
pub mod encoder;
pub mod error;
pub mod inspect;
pub mod manifest;
pub mod pcd;
pub mod schema;
pub mod validate;

// Re-export main types for convenience
pub use convert::{ConvertOptions, ConvertSummary, convert_dir};
pub use error::{Error, Result};
pub use manifest::{ManifestRow, ManifestSink};
pub use pcd::{FieldAccess, PointCloud};
