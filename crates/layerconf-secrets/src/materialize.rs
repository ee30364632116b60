//! Writes decrypted material to temporary files for `encryptedFile:` references.

use crate::error::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

const FILE_NAME_PREFIX: &str = "layerconf-secret-";

/// Write `contents` to a fresh file in the system temp directory and return
/// its path. The file is created exclusively and, on unix, readable only by
/// the current user. Callers own cleanup.
pub fn write_temp_file(contents: &[u8]) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("{}{}", FILE_NAME_PREFIX, Uuid::new_v4()));

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&path)?;
    file.write_all(contents)?;
    file.sync_all()?;

    debug!(path = %path.display(), bytes = contents.len(), "Materialized secret to temporary file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_temp_file_roundtrip() {
        let path = write_temp_file(b"-----BEGIN CERTIFICATE-----").unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with(FILE_NAME_PREFIX));
        assert_eq!(std::fs::read(&path).unwrap(), b"-----BEGIN CERTIFICATE-----");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_each_call_gets_a_new_file() {
        let a = write_temp_file(b"a").unwrap();
        let b = write_temp_file(b"a").unwrap();
        assert_ne!(a, b);
        std::fs::remove_file(a).unwrap();
        std::fs::remove_file(b).unwrap();
    }
}
