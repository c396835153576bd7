#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Write an ASCII PCD with fields `x y z intensity` and one line per point.
pub fn write_ascii_xyzi(path: &Path, points: &[[f32; 4]]) -> PathBuf {
    let mut text = format!(
        "# .PCD v0.7 - Point Cloud Data file format\nVERSION 0.7\nFIELDS x y z intensity\nSIZE 4 4 4 4\nTYPE F F F F\nCOUNT 1 1 1 1\nWIDTH {n}\nHEIGHT 1\nVIEWPOINT 0 0 0 1 0 0 0\nPOINTS {n}\nDATA ascii\n",
        n = points.len()
    );
    for p in points {
        text.push_str(&format!("{} {} {} {}\n", p[0], p[1], p[2], p[3]));
    }
    write(path, text.as_bytes())
}

/// Write a binary PCD laid out like a Velodyne/Ouster export:
/// `x y z intensity ring time` with a u16 ring and f64 time.
pub fn write_binary_lidar(path: &Path, points: &[[f32; 4]]) -> PathBuf {
    let n = points.len();
    let mut raw = format!(
        "VERSION 0.7\nFIELDS x y z intensity ring time\nSIZE 4 4 4 4 2 8\nTYPE F F F F U F\nCOUNT 1 1 1 1 1 1\nWIDTH {n}\nHEIGHT 1\nPOINTS {n}\nDATA binary\n"
    )
    .into_bytes();
    for (i, p) in points.iter().enumerate() {
        for v in p {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        raw.extend_from_slice(&((i % 32) as u16).to_le_bytes());
        raw.extend_from_slice(&(i as f64 * 1e-5).to_le_bytes());
    }
    write(path, &raw)
}

pub fn write(path: &Path, bytes: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
    path.to_path_buf()
}

/// Decode a .bin file into `[x, y, z, scaled_intensity]` records.
pub fn read_records(path: &Path) -> Vec<[f32; 4]> {
    let bytes = fs::read(path).unwrap();
    assert_eq!(bytes.len() % 16, 0, "{} is not a whole number of records", path.display());
    bytes
        .chunks_exact(16)
        .map(|rec| {
            let f = |i: usize| f32::from_le_bytes(rec[i * 4..i * 4 + 4].try_into().unwrap());
            [f(0), f(1), f(2), f(3)]
        })
        .collect()
}

pub fn sample_points(n: usize) -> Vec<[f32; 4]> {
    (0..n)
        .map(|i| {
            let t = i as f32;
            [t * 0.25 - 10.0, 3.5 - t * 0.125, t.sin(), (i * 7 % 256) as f32]
        })
        .collect()
}
