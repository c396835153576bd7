//! Temp-file-then-rename persistence shared by the `.bin` outputs and the manifest

use std::fs;
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

/// Create a temporary file in the directory of `dest`.
///
/// On unix the file is opened with mode `0o666`, so the process umask applies
/// as it would for a plain `File::create`.
pub(crate) fn temp_beside(dest: &Path, prefix: &str) -> io::Result<NamedTempFile> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix).suffix(".part");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

/// Move `tmp` over `dest`. An existing `dest` keeps its permissions.
pub(crate) fn persist(tmp: NamedTempFile, dest: &Path) -> io::Result<()> {
    match fs::metadata(dest) {
        Ok(meta) => fs::set_permissions(tmp.path(), meta.permissions())?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
