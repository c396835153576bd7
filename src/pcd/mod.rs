//! PCD (Point Cloud Data) reader
//!
//! Supports the `ascii`, `binary` and `binary_compressed` data encodings of
//! PCD v0.5-v0.7. Fields
//! are looked up by name, so producers are free to order them differently or
//! to add fields beyond `x y z intensity`.

pub mod header;
pub mod reader;

pub use header::{DataEncoding, FieldDef, FieldKind, PcdHeader, parse_header};
pub use reader::{FieldAccess, PointCloud, PointRef, load, load_requiring, parse};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

/// Read only the header of a PCD file.
pub fn read_header(path: impl AsRef<Path>) -> Result<PcdHeader> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);

    // Collect lines up to and including DATA so large data sections are not read.
    let mut buf = Vec::new();
    loop {
        let before = buf.len();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        if buf[before..].trim_ascii_start().starts_with(b"DATA") {
            break;
        }
    }
    parse_header(&buf, path).map(|(header, _)| header)
}
