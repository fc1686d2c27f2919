//! Archive extraction

use crate::runner;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

pub trait Extractor {
    /// Unpack `archive` into `dest`, without preserving archived owners
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Archive formats recognized by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
    /// Anything else is handed to the system `tar` (e.g. `.tar.bz2`)
    Other,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Other
        }
    }
}

/// Extractor using flate2/tar/zip in-process, and `tar` for other formats
pub struct HostExtractor;

impl Extractor for HostExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        match ArchiveKind::from_path(archive) {
            ArchiveKind::TarGz => extract_targz(archive, dest),
            ArchiveKind::Zip => extract_zip(archive, dest),
            ArchiveKind::Other => {
                let archive = archive.to_string_lossy();
                runner::run_in(dest, "tar", &["xf", &archive, "--no-same-owner"])
                    .with_context(|| format!("Failed to extract {archive}"))?;
                Ok(())
            }
        }
    }
}

fn extract_targz(archive: &Path, dest: &Path) -> Result<()> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let file = File::open(archive)
        .with_context(|| format!("Failed to open {}", archive.display()))?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_ownerships(false);
    tar.unpack(dest)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;
    Ok(())
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("Invalid zip archive: {}", archive.display()))?;
    zip.extract(dest)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    #[test]
    fn test_archive_kind() {
        assert_eq!(ArchiveKind::from_path(Path::new("oc.tar.gz")), ArchiveKind::TarGz);
        assert_eq!(ArchiveKind::from_path(Path::new("oc.TGZ")), ArchiveKind::TarGz);
        assert_eq!(ArchiveKind::from_path(Path::new("oc.zip")), ArchiveKind::Zip);
        assert_eq!(
            ArchiveKind::from_path(Path::new("owncloud-latest.tar.bz2")),
            ArchiveKind::Other
        );
    }

    #[test]
    fn test_extract_targz() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("owncloud.tar.gz");

        {
            let file = File::create(&archive_path).unwrap();
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            let content = b"<?php echo 'hi';";
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "owncloud/index.php", &content[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("www");
        HostExtractor.extract(&archive_path, &dest).unwrap();

        let extracted = std::fs::read_to_string(dest.join("owncloud/index.php")).unwrap();
        assert_eq!(extracted, "<?php echo 'hi';");
    }
}
