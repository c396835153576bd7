//! PCD header parsing (`VERSION` .. `DATA`)

use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Storage encoding of the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataEncoding {
    Ascii,
    Binary,
    /// LZF-compressed, one column per field.
    BinaryCompressed,
}

/// Numeric interpretation of a field (`TYPE` entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    #[serde(rename = "I")]
    Signed,
    #[serde(rename = "U")]
    Unsigned,
    #[serde(rename = "F")]
    Float,
}

impl FieldKind {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "I" => Some(FieldKind::Signed),
            "U" => Some(FieldKind::Unsigned),
            "F" => Some(FieldKind::Float),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            FieldKind::Signed => 'I',
            FieldKind::Unsigned => 'U',
            FieldKind::Float => 'F',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub count: usize,
}

impl FieldDef {
    /// Bytes one record spends on this field in a binary data section.
    pub fn byte_len(&self) -> usize {
        self.size * self.count
    }

    /// Whether the field is exposed as a named scalar. Array fields and PCL
    /// padding (`_`) are read past but not kept.
    pub fn is_scalar(&self) -> bool {
        self.count == 1 && self.name != "_"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PcdHeader {
    pub version: Option<String>,
    pub fields: Vec<FieldDef>,
    pub width: usize,
    pub height: usize,
    pub viewpoint: [f64; 7],
    pub points: usize,
    pub data: DataEncoding,
}

impl PcdHeader {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Size in bytes of one packed binary record.
    pub fn record_size(&self) -> usize {
        self.fields.iter().map(FieldDef::byte_len).sum()
    }

    /// Number of whitespace-separated tokens on one ASCII data line.
    pub fn tokens_per_record(&self) -> usize {
        self.fields.iter().map(|f| f.count).sum()
    }
}

const DEFAULT_VIEWPOINT: [f64; 7] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

#[derive(Default)]
struct HeaderBuilder {
    version: Option<String>,
    names: Option<Vec<String>>,
    sizes: Option<Vec<usize>>,
    kinds: Option<Vec<FieldKind>>,
    counts: Option<Vec<usize>>,
    width: Option<usize>,
    height: Option<usize>,
    viewpoint: Option<[f64; 7]>,
    points: Option<usize>,
}

/// Parse the header at the start of `raw`.
///
/// Returns the header and the byte offset where the data section starts
/// (just past the newline that ends the `DATA` line).
pub fn parse_header(raw: &[u8], path: &Path) -> Result<(PcdHeader, usize)> {
    let mut builder = HeaderBuilder::default();
    let mut offset = 0;

    while offset < raw.len() {
        let end = raw[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| offset + p + 1)
            .unwrap_or(raw.len());
        let line = std::str::from_utf8(&raw[offset..end]).map_err(|_| {
            Error::malformed(path, format!("header line at byte {offset} is not valid UTF-8"))
        })?;
        offset = end;

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        let values: Vec<&str> = tokens.collect();

        match keyword {
            "VERSION" => builder.version = values.first().map(|v| v.to_string()),
            "FIELDS" | "COLUMNS" => {
                if values.is_empty() {
                    return Err(Error::malformed(path, "FIELDS line declares no fields"));
                }
                for (i, name) in values.iter().enumerate() {
                    if *name != "_" && values[..i].contains(name) {
                        return Err(Error::malformed(path, format!("duplicate field '{name}'")));
                    }
                }
                builder.names = Some(values.iter().map(|s| s.to_string()).collect());
            }
            "SIZE" => {
                let sizes = parse_list::<usize>(path, keyword, &values)?;
                if let Some(bad) = sizes.iter().find(|s| !matches!(s, 1 | 2 | 4 | 8)) {
                    return Err(Error::malformed(path, format!("unsupported field size {bad}")));
                }
                builder.sizes = Some(sizes);
            }
            "TYPE" => {
                let kinds = values
                    .iter()
                    .map(|t| {
                        FieldKind::from_token(t).ok_or_else(|| {
                            Error::malformed(path, format!("unknown field type '{t}'"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                builder.kinds = Some(kinds);
            }
            "COUNT" => {
                let counts = parse_list::<usize>(path, keyword, &values)?;
                if counts.contains(&0) {
                    return Err(Error::malformed(path, "field COUNT must be at least 1"));
                }
                builder.counts = Some(counts);
            }
            "WIDTH" => builder.width = Some(parse_single(path, keyword, &values)?),
            "HEIGHT" => builder.height = Some(parse_single(path, keyword, &values)?),
            "POINTS" => builder.points = Some(parse_single(path, keyword, &values)?),
            "VIEWPOINT" => {
                let vp = parse_list::<f64>(path, keyword, &values)?;
                let vp: [f64; 7] = vp.try_into().map_err(|v: Vec<f64>| {
                    Error::malformed(path, format!("VIEWPOINT needs 7 values, got {}", v.len()))
                })?;
                builder.viewpoint = Some(vp);
            }
            "DATA" => {
                let data = match values.first().copied() {
                    Some("ascii") => DataEncoding::Ascii,
                    Some("binary") => DataEncoding::Binary,
                    Some("binary_compressed") => DataEncoding::BinaryCompressed,
                    Some(other) => {
                        return Err(Error::malformed(
                            path,
                            format!("unsupported DATA encoding '{other}'"),
                        ));
                    }
                    None => return Err(Error::malformed(path, "DATA line has no encoding")),
                };
                let header = builder.finish(path, data)?;
                return Ok((header, offset));
            }
            other => {
                tracing::warn!(file = %path.display(), keyword = other, "ignoring unknown PCD header line");
            }
        }
    }

    Err(Error::malformed(path, "missing DATA line"))
}

impl HeaderBuilder {
    fn finish(self, path: &Path, data: DataEncoding) -> Result<PcdHeader> {
        let names = self
            .names
            .ok_or_else(|| Error::malformed(path, "missing FIELDS line"))?;
        let sizes = self
            .sizes
            .ok_or_else(|| Error::malformed(path, "missing SIZE line"))?;
        let kinds = self
            .kinds
            .ok_or_else(|| Error::malformed(path, "missing TYPE line"))?;
        let counts = self.counts.unwrap_or_else(|| vec![1; names.len()]);

        for (keyword, len) in [("SIZE", sizes.len()), ("TYPE", kinds.len()), ("COUNT", counts.len())] {
            if len != names.len() {
                return Err(Error::malformed(
                    path,
                    format!("{keyword} has {len} entries but FIELDS declares {}", names.len()),
                ));
            }
        }

        let mut fields = Vec::with_capacity(names.len());
        for (((name, size), kind), count) in names.into_iter().zip(sizes).zip(kinds).zip(counts) {
            if kind == FieldKind::Float && !matches!(size, 4 | 8) {
                return Err(Error::malformed(
                    path,
                    format!("field '{name}' is a float of unsupported size {size}"),
                ));
            }
            fields.push(FieldDef { name, size, kind, count });
        }

        let width = self
            .width
            .ok_or_else(|| Error::malformed(path, "missing WIDTH line"))?;
        let height = self.height.unwrap_or(1);
        let cells = width
            .checked_mul(height)
            .ok_or_else(|| Error::malformed(path, "WIDTH * HEIGHT overflows"))?;
        let points = match self.points {
            Some(points) if points != cells => {
                return Err(Error::malformed(
                    path,
                    format!("POINTS {points} disagrees with WIDTH {width} * HEIGHT {height}"),
                ));
            }
            Some(points) => points,
            None => cells,
        };

        Ok(PcdHeader {
            version: self.version,
            fields,
            width,
            height,
            viewpoint: self.viewpoint.unwrap_or(DEFAULT_VIEWPOINT),
            points,
            data,
        })
    }
}

fn parse_list<T: std::str::FromStr>(path: &Path, keyword: &str, values: &[&str]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| Error::malformed(path, format!("invalid {keyword} value '{v}'")))
        })
        .collect()
}

fn parse_single<T: std::str::FromStr>(path: &Path, keyword: &str, values: &[&str]) -> Result<T> {
    match values {
        [v] => v
            .parse::<T>()
            .map_err(|_| Error::malformed(path, format!("invalid {keyword} value '{v}'"))),
        _ => Err(Error::malformed(
            path,
            format!("{keyword} expects one value, got {}", values.len()),
        )),
    }
}
