use byteorder::{LittleEndian, ReadBytesExt};
use std::fs;
use std::path::{Path, PathBuf};

use super::header::{DataEncoding, FieldDef, FieldKind, PcdHeader, parse_header};
use crate::error::{Error, Result};

/// Named access to the scalar fields of one point.
pub trait FieldAccess {
    /// Value of `name` narrowed to f32, or `None` when the point has no such field.
    fn field(&self, name: &str) -> Option<f32>;
}

impl<K> FieldAccess for std::collections::BTreeMap<K, f32>
where
    K: std::borrow::Borrow<str> + Ord,
{
    fn field(&self, name: &str) -> Option<f32> {
        self.get(name).copied()
    }
}

/// A parsed PCD file. Scalar field values are stored row-major as f32.
#[derive(Debug, Clone)]
pub struct PointCloud {
    path: PathBuf,
    header: PcdHeader,
    names: Vec<String>,
    values: Vec<f32>,
    len: usize,
}

/// Borrowed view of one point in a [`PointCloud`].
#[derive(Debug, Clone, Copy)]
pub struct PointRef<'a> {
    names: &'a [String],
    values: &'a [f32],
}

impl FieldAccess for PointRef<'_> {
    fn field(&self, name: &str) -> Option<f32> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

impl PointCloud {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &PcdHeader {
        &self.header
    }

    /// Names of the fields exposed per point, in header order.
    pub fn field_names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn point(&self, index: usize) -> Option<PointRef<'_>> {
        if index >= self.len {
            return None;
        }
        let stride = self.names.len();
        Some(PointRef {
            names: &self.names,
            values: &self.values[index * stride..(index + 1) * stride],
        })
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = PointRef<'_>> + '_ {
        (0..self.len).map(move |i| {
            let stride = self.names.len();
            PointRef {
                names: &self.names,
                values: &self.values[i * stride..(i + 1) * stride],
            }
        })
    }
}

/// Load a PCD file, exposing every scalar field it declares.
pub fn load(path: impl AsRef<Path>) -> Result<PointCloud> {
    load_requiring(path, &[])
}

/// Load a PCD file and fail with `MalformedInput` when any of `required` is
/// not a scalar field of the file.
pub fn load_requiring(path: impl AsRef<Path>, required: &[&str]) -> Result<PointCloud> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| Error::io(path, e))?;
    parse_requiring(&raw, path, required)
}

/// Parse an in-memory PCD file. `path` is only used in error messages.
pub fn parse(raw: &[u8], path: impl AsRef<Path>) -> Result<PointCloud> {
    parse_requiring(raw, path.as_ref(), &[])
}

fn parse_requiring(raw: &[u8], path: &Path, required: &[&str]) -> Result<PointCloud> {
    let (header, data_offset) = parse_header(raw, path)?;

    for name in required {
        match header.field(name) {
            Some(field) if field.is_scalar() => {}
            Some(field) => {
                return Err(Error::malformed(
                    path,
                    format!("field '{name}' has COUNT {} but a scalar is required", field.count),
                ));
            }
            None => return Err(Error::malformed(path, format!("missing required field '{name}'"))),
        }
    }

    let data = &raw[data_offset..];
    let values = match header.data {
        DataEncoding::Ascii => decode_ascii(&header, data, path)?,
        DataEncoding::Binary => decode_binary(&header, data, path)?,
        DataEncoding::BinaryCompressed => decode_binary_compressed(&header, data, path)?,
    };

    let names = header
        .fields
        .iter()
        .filter(|f| f.is_scalar())
        .map(|f| f.name.clone())
        .collect();

    tracing::debug!(
        file = %path.display(),
        points = header.points,
        encoding = ?header.data,
        "loaded point cloud"
    );

    Ok(PointCloud {
        path: path.to_path_buf(),
        len: header.points,
        header,
        names,
        values,
    })
}

fn decode_ascii(header: &PcdHeader, data: &[u8], path: &Path) -> Result<Vec<f32>> {
    let text = std::str::from_utf8(data)
        .map_err(|e| Error::malformed(path, format!("ASCII data section is not valid UTF-8: {e}")))?;

    let per_record = header.tokens_per_record();
    let stride = header.fields.iter().filter(|f| f.is_scalar()).count();
    // every record takes at least two bytes, so this bounds a bogus POINTS value
    let mut values = Vec::with_capacity(header.points.min(data.len() / 2) * stride);
    let mut records = 0usize;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if records == header.points {
            return Err(Error::malformed(
                path,
                format!("header declares {} points but the data section holds more records", header.points),
            ));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != per_record {
            return Err(Error::malformed(
                path,
                format!(
                    "record {records} has {} values, expected {per_record}",
                    tokens.len()
                ),
            ));
        }

        let mut rest = tokens.as_slice();
        for field in &header.fields {
            let (own, tail) = rest.split_at(field.count);
            rest = tail;
            if field.is_scalar() {
                let value = parse_token(own[0], field).ok_or_else(|| {
                    Error::malformed(
                        path,
                        format!("record {records}: invalid value '{}' for field '{}'", own[0], field.name),
                    )
                })?;
                values.push(value);
            }
        }
        records += 1;
    }

    if records != header.points {
        return Err(Error::malformed(
            path,
            format!("header declares {} points but the data section holds {records} records", header.points),
        ));
    }
    Ok(values)
}

fn parse_token(token: &str, field: &FieldDef) -> Option<f32> {
    match field.kind {
        FieldKind::Float if field.size == 4 => token.parse::<f32>().ok(),
        FieldKind::Float => token.parse::<f64>().ok().map(|v| v as f32),
        // some writers print integral fields with a fractional part
        FieldKind::Signed => token
            .parse::<i64>()
            .map(|v| v as f32)
            .or_else(|_| token.parse::<f64>().map(|v| v as f32))
            .ok(),
        FieldKind::Unsigned => token
            .parse::<u64>()
            .map(|v| v as f32)
            .or_else(|_| token.parse::<f64>().map(|v| v as f32))
            .ok(),
    }
}

fn decode_binary(header: &PcdHeader, data: &[u8], path: &Path) -> Result<Vec<f32>> {
    let record_size = header.record_size();
    let expected = header
        .points
        .checked_mul(record_size)
        .ok_or_else(|| Error::malformed(path, "declared data size overflows"))?;

    if data.len() < expected {
        return Err(Error::malformed(
            path,
            format!(
                "header declares {} points ({expected} bytes) but the data section holds {} bytes",
                header.points,
                data.len()
            ),
        ));
    }
    if data.len() > expected {
        tracing::warn!(
            file = %path.display(),
            trailing = data.len() - expected,
            "ignoring trailing bytes after the last record"
        );
    }

    let stride = header.fields.iter().filter(|f| f.is_scalar()).count();
    let mut values = Vec::with_capacity(header.points * stride);

    if record_size == 0 {
        return Ok(values);
    }
    for record in data[..expected].chunks_exact(record_size) {
        let mut cursor = record;
        for field in &header.fields {
            if field.is_scalar() {
                let value = read_value(&mut cursor, field)
                    .map_err(|e| Error::malformed(path, format!("field '{}': {e}", field.name)))?;
                values.push(value);
            } else {
                cursor = &cursor[field.byte_len()..];
            }
        }
    }
    Ok(values)
}

/// `binary_compressed`: two little-endian u32 (compressed size, uncompressed
/// size) then an LZF block. Unpacked, the data holds one column per field:
/// every point's value of the first field, then every point's value of the
/// second, and so on.
fn decode_binary_compressed(header: &PcdHeader, data: &[u8], path: &Path) -> Result<Vec<f32>> {
    let mut cursor = data;
    let mut read_size = |what: &str| {
        cursor
            .read_u32::<LittleEndian>()
            .map(|v| v as usize)
            .map_err(|_| Error::malformed(path, format!("compressed data section is missing its {what} size")))
    };
    let packed_len = read_size("compressed")?;
    let unpacked_len = read_size("uncompressed")?;
    let payload = &data[8..];

    let expected = header
        .points
        .checked_mul(header.record_size())
        .ok_or_else(|| Error::malformed(path, "declared data size overflows"))?;
    if unpacked_len != expected {
        return Err(Error::malformed(
            path,
            format!(
                "uncompressed size is {unpacked_len} bytes but the header declares {} points ({expected} bytes)",
                header.points
            ),
        ));
    }
    if payload.len() < packed_len {
        return Err(Error::malformed(
            path,
            format!(
                "compressed size is {packed_len} bytes but the data section holds {}",
                payload.len()
            ),
        ));
    }
    if payload.len() > packed_len {
        tracing::warn!(
            file = %path.display(),
            trailing = payload.len() - packed_len,
            "ignoring trailing bytes after the compressed block"
        );
    }

    let unpacked = if unpacked_len == 0 {
        Vec::new()
    } else {
        lzf::decompress(&payload[..packed_len], unpacked_len)
            .map_err(|e| Error::malformed(path, format!("cannot decompress data section: {e:?}")))?
    };
    if unpacked.len() != unpacked_len {
        return Err(Error::malformed(
            path,
            format!(
                "data section decompressed to {} bytes, expected {unpacked_len}",
                unpacked.len()
            ),
        ));
    }

    let stride = header.fields.iter().filter(|f| f.is_scalar()).count();
    let mut values = vec![0.0f32; header.points * stride];
    let mut column_start = 0;
    let mut slot = 0;
    for field in &header.fields {
        let column_len = field.byte_len() * header.points;
        if field.is_scalar() {
            let mut column = &unpacked[column_start..column_start + column_len];
            for point in 0..header.points {
                values[point * stride + slot] = read_value(&mut column, field)
                    .map_err(|e| Error::malformed(path, format!("field '{}': {e}", field.name)))?;
            }
            slot += 1;
        }
        column_start += column_len;
    }
    Ok(values)
}

fn read_value(cursor: &mut &[u8], field: &FieldDef) -> std::io::Result<f32> {
    Ok(match (field.kind, field.size) {
        (FieldKind::Float, 4) => cursor.read_f32::<LittleEndian>()?,
        (FieldKind::Float, _) => cursor.read_f64::<LittleEndian>()? as f32,
        (FieldKind::Signed, 1) => cursor.read_i8()? as f32,
        (FieldKind::Signed, 2) => cursor.read_i16::<LittleEndian>()? as f32,
        (FieldKind::Signed, 4) => cursor.read_i32::<LittleEndian>()? as f32,
        (FieldKind::Signed, _) => cursor.read_i64::<LittleEndian>()? as f32,
        (FieldKind::Unsigned, 1) => cursor.read_u8()? as f32,
        (FieldKind::Unsigned, 2) => cursor.read_u16::<LittleEndian>()? as f32,
        (FieldKind::Unsigned, 4) => cursor.read_u32::<LittleEndian>()? as f32,
        (FieldKind::Unsigned, _) => cursor.read_u64::<LittleEndian>()? as f32,
    })
}
