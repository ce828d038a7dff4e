//! Writing downloaded certificates to disk.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name OpenSSH looks for next to an `id_ed25519` key.
pub const CERTIFICATE_FILE_NAME: &str = "id_ed25519-cert.pub";

pub struct CertificateFile;

impl CertificateFile {
    /// Write `certificate` to `<dir>/id_ed25519-cert.pub`.
    pub fn write(dir: &Path, certificate: &str) -> io::Result<PathBuf> {
        let path = dir.join(CERTIFICATE_FILE_NAME);
        Self::write_to(&path, certificate)?;
        Ok(path)
    }

    /// Write `certificate` to `path`, replacing any existing file. The file
    /// is created with mode 0600 on Unix.
    pub fn write_to(path: &Path, certificate: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(certificate.as_bytes())?;
        if !certificate.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.sync_all()?;

        info!(path = %path.display(), "Certificate written");
        Ok(())
    }
}
