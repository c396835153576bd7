//! Flat binary record encoding
//!
//! Every point becomes one 16-byte record of four little-endian f32 values:
//! `x, y, z, intensity / 256.0`. The file has no header; the record count is
//! `file_len / 16`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::atomic;
use crate::error::{Error, Result};
use crate::pcd::{FieldAccess, PointCloud};

/// Fields every record is built from, in output order.
pub const RECORD_FIELDS: [&str; 4] = ["x", "y", "z", "intensity"];

/// Size in bytes of one encoded record.
pub const RECORD_SIZE: usize = 16;

/// Raw intensity is divided by this before encoding (sensor range to 0..1-ish).
pub const INTENSITY_SCALE: f32 = 256.0;

/// One encoded point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Already divided by [`INTENSITY_SCALE`].
    pub intensity: f32,
}

impl Record {
    /// Build the record for the point at `index`.
    pub fn from_point<P: FieldAccess + ?Sized>(point: &P, index: usize) -> Result<Self> {
        let get = |name: &str| {
            point.field(name).ok_or_else(|| Error::Encoding {
                index,
                field: name.to_string(),
            })
        };
        Ok(Record {
            x: get(RECORD_FIELDS[0])?,
            y: get(RECORD_FIELDS[1])?,
            z: get(RECORD_FIELDS[2])?,
            intensity: get(RECORD_FIELDS[3])? / INTENSITY_SCALE,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_f32::<LittleEndian>(self.x)?;
        w.write_f32::<LittleEndian>(self.y)?;
        w.write_f32::<LittleEndian>(self.z)?;
        w.write_f32::<LittleEndian>(self.intensity)
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Record {
            x: r.read_f32::<LittleEndian>()?,
            y: r.read_f32::<LittleEndian>()?,
            z: r.read_f32::<LittleEndian>()?,
            intensity: r.read_f32::<LittleEndian>()?,
        })
    }

    /// Intensity as it was before scaling.
    pub fn raw_intensity(&self) -> f32 {
        self.intensity * INTENSITY_SCALE
    }
}

/// Encode a loaded cloud into `16 * cloud.len()` bytes.
pub fn encode(cloud: &PointCloud) -> Result<Vec<u8>> {
    encode_points(cloud.points())
}

/// Encode any sequence of points, preserving their order.
pub fn encode_points<P, I>(points: I) -> Result<Vec<u8>>
where
    P: FieldAccess,
    I: IntoIterator<Item = P>,
{
    let points = points.into_iter();
    let mut buf = Vec::with_capacity(points.size_hint().0 * RECORD_SIZE);
    for (index, point) in points.enumerate() {
        let record = Record::from_point(&point, index)?;
        // writing into a Vec cannot fail
        record
            .write_to(&mut buf)
            .map_err(|e| Error::io("<memory>", e))?;
    }
    Ok(buf)
}

/// Decode a buffer produced by [`encode`]. Trailing bytes that do not form a
/// whole record are an error.
pub fn decode(mut bytes: &[u8]) -> io::Result<Vec<Record>> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{} bytes is not a whole number of {RECORD_SIZE}-byte records",
                bytes.len()
            ),
        ));
    }
    let mut records = Vec::with_capacity(bytes.len() / RECORD_SIZE);
    while !bytes.is_empty() {
        records.push(Record::read_from(&mut bytes)?);
    }
    Ok(records)
}

/// Persist `buf` at `dest`, replacing any existing file.
///
/// The bytes go to a temporary file next to `dest` which is renamed into place
/// once fully written, so readers never see a truncated output. On failure the
/// temporary file is removed and `dest` is left as it was.
pub fn write(buf: &[u8], dest: &Path) -> Result<()> {
    let mut tmp = atomic::temp_beside(dest, ".pcd2bin-").map_err(|e| Error::io(dest, e))?;
    tmp.write_all(buf).map_err(|e| Error::io(dest, e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(dest, e))?;
    atomic::persist(tmp, dest).map_err(|e| Error::io(dest, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcd;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn point(x: f32, y: f32, z: f32, intensity: f32) -> BTreeMap<&'static str, f32> {
        [("x", x), ("y", y), ("z", z), ("intensity", intensity)].into()
    }

    #[test]
    fn test_intensity_is_scaled() {
        let buf = encode_points([point(1.0, 2.0, 3.0, 256.0)]).unwrap();
        let mut expected = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 1.0] {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_record_order_preserved() {
        let pts = vec![point(3.0, 0.0, 0.0, 0.0), point(1.0, 0.0, 0.0, 0.0), point(3.0, 0.0, 0.0, 0.0)];
        let records = decode(&encode_points(pts).unwrap()).unwrap();
        let xs: Vec<f32> = records.iter().map(|r| r.x).collect();
        assert_eq!(xs, [3.0, 1.0, 3.0]);
    }

    #[test]
    fn test_missing_field_is_encoding_error() {
        let mut p = point(1.0, 2.0, 3.0, 4.0);
        p.remove("intensity");
        let err = encode_points([point(0.0, 0.0, 0.0, 0.0), p]).unwrap_err();
        match err {
            Error::Encoding { index, field } => {
                assert_eq!(index, 1);
                assert_eq!(field, "intensity");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cloud_without_intensity() {
        let cloud = pcd::parse(b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 1\nDATA ascii\n1 2 3\n", "xyz.pcd").unwrap();
        assert!(matches!(encode(&cloud), Err(Error::Encoding { .. })));
    }

    #[test]
    fn test_ascii_and_binary_encode_identically() {
        let ascii = pcd::parse(
            b"FIELDS x y z intensity\nSIZE 4 4 4 4\nTYPE F F F F\nWIDTH 2\nDATA ascii\n0.5 -1 2 100\n4 5 6 255\n",
            "a.pcd",
        )
        .unwrap();
        let mut raw = b"FIELDS intensity x y z\nSIZE 1 4 4 4\nTYPE U F F F\nWIDTH 2\nDATA binary\n".to_vec();
        for (i, x, y, z) in [(100u8, 0.5f32, -1.0f32, 2.0f32), (255, 4.0, 5.0, 6.0)] {
            raw.push(i);
            raw.extend_from_slice(&x.to_le_bytes());
            raw.extend_from_slice(&y.to_le_bytes());
            raw.extend_from_slice(&z.to_le_bytes());
        }
        let binary = pcd::parse(&raw, "b.pcd").unwrap();
        assert_eq!(encode(&ascii).unwrap(), encode(&binary).unwrap());
    }

    #[test]
    fn test_empty_cloud_encodes_to_nothing() {
        let cloud = pcd::parse(b"FIELDS x y z intensity\nSIZE 4 4 4 4\nTYPE F F F F\nWIDTH 0\nDATA ascii\n", "e.pcd").unwrap();
        assert!(encode(&cloud).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        assert!(decode(&[0u8; 17]).is_err());
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        std::fs::write(&dest, b"stale contents that are longer").unwrap();

        write(&[1, 2, 3, 4], &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), [1, 2, 3, 4]);
        // no temporary files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keeps_mode_of_replaced_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        std::fs::write(&dest, b"old").unwrap();
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o644)).unwrap();

        write(&[0; 16], &dest).unwrap();
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_write_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing-subdir").join("out.bin");
        let err = write(&[0; 16], &dest).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!dest.exists());
    }

    proptest! {
        #[test]
        fn encoded_records_round_trip(
            pts in prop::collection::vec(
                (-1.0e4f32..1.0e4, -1.0e4f32..1.0e4, -1.0e4f32..1.0e4, 0.0f32..65535.0),
                0..200
            )
        ) {
            let buf = encode_points(pts.iter().map(|&(x, y, z, i)| point(x, y, z, i))).unwrap();
            prop_assert_eq!(buf.len(), RECORD_SIZE * pts.len());

            let records = decode(&buf).unwrap();
            for (r, &(x, y, z, i)) in records.iter().zip(&pts) {
                prop_assert_eq!((r.x, r.y, r.z), (x, y, z));
                // dividing by a power of two is exact in f32
                prop_assert_eq!(r.raw_intensity(), i);
            }
        }
    }
}
