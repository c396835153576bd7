//! `meta.csv` manifest mapping each input file to its output file

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::atomic;
use crate::error::{Error, Result};

pub const DEFAULT_MANIFEST_NAME: &str = "meta.csv";

pub const HEADER: [&str; 2] = ["pcd file name", "bin file name"];

/// Quote character used when a name contains the delimiter or a newline.
const QUOTE: u8 = b'|';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    #[serde(rename = "pcd file name")]
    pub pcd_file_name: String,
    #[serde(rename = "bin file name")]
    pub bin_file_name: String,
}

/// Receives one row per successfully converted file, in input order.
pub trait ManifestSink {
    fn push(&mut self, row: &ManifestRow) -> Result<()>;
}

impl ManifestSink for Vec<ManifestRow> {
    fn push(&mut self, row: &ManifestRow) -> Result<()> {
        Vec::push(self, row.clone());
        Ok(())
    }
}

/// CSV manifest written through a temporary file and moved into place by
/// [`CsvManifest::finish`]. Dropping it without finishing leaves no file.
pub struct CsvManifest {
    path: PathBuf,
    writer: csv::Writer<NamedTempFile>,
    rows: usize,
}

impl CsvManifest {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tmp = atomic::temp_beside(&path, ".meta-").map_err(|e| Error::io(&path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .quote(QUOTE)
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(tmp);
        writer
            .write_record(HEADER)
            .map_err(|e| Error::io(&path, io::Error::from(e)))?;

        Ok(CsvManifest { path, writer, rows: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and atomically move the manifest to its final path.
    pub fn finish(self) -> Result<PathBuf> {
        let CsvManifest { path, writer, .. } = self;
        let tmp = writer
            .into_inner()
            .map_err(|e| Error::io(&path, e.into_error()))?;
        atomic::persist(tmp, &path).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }
}

impl ManifestSink for CsvManifest {
    fn push(&mut self, row: &ManifestRow) -> Result<()> {
        self.writer
            .serialize(row)
            .map_err(|e| Error::io(&self.path, io::Error::from(e)))?;
        self.rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pcd: &str, bin: &str) -> ManifestRow {
        ManifestRow {
            pcd_file_name: pcd.to_string(),
            bin_file_name: bin.to_string(),
        }
    }

    #[test]
    fn test_csv_manifest_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_MANIFEST_NAME);

        let mut manifest = CsvManifest::create(&path).unwrap();
        manifest.push(&row("a.pcd", "a.bin")).unwrap();
        manifest.push(&row("odd,name.pcd", "odd,name.bin")).unwrap();
        assert_eq!(manifest.rows(), 2);
        assert!(!path.exists(), "manifest must not appear before finish");
        manifest.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "pcd file name,bin file name\na.pcd,a.bin\n|odd,name.pcd|,|odd,name.bin|\n"
        );
    }

    #[test]
    fn test_empty_manifest_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.csv");
        CsvManifest::create(&path).unwrap().finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "pcd file name,bin file name\n");
    }

    #[test]
    fn test_rows_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.csv");
        let mut manifest = CsvManifest::create(&path).unwrap();
        manifest.push(&row("b.pcd", "b.bin")).unwrap();
        manifest.finish().unwrap();

        let mut reader = csv::ReaderBuilder::new().quote(QUOTE).from_path(&path).unwrap();
        let rows: Vec<ManifestRow> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows, [row("b.pcd", "b.bin")]);
    }

    #[test]
    fn test_vec_sink() {
        let mut rows: Vec<ManifestRow> = Vec::new();
        ManifestSink::push(&mut rows, &row("a.pcd", "a.bin")).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
