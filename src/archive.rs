use crate::error::FetchError;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::Path;
use tar::Archive;
use xz2::read::XzDecoder;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

impl ArchiveKind {
    /// Archive kind from the suffix of a download URL (query string ignored).
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if path.ends_with("gz") {
            Some(ArchiveKind::TarGz)
        } else if path.ends_with("bz2") {
            Some(ArchiveKind::TarBz2)
        } else if path.ends_with("xz") {
            Some(ArchiveKind::TarXz)
        } else if path.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }

    pub fn is_tar(self) -> bool {
        !matches!(self, ArchiveKind::Zip)
    }
}

/// Stream a (possibly compressed) tarball and copy every entry named exactly
/// `entry` to `dest`. Later matches overwrite earlier ones.
pub fn extract_from_tar<'a, R: Read + 'a>(
    reader: R,
    kind: ArchiveKind,
    entry: &str,
    dest: &Path,
) -> Result<(), FetchError> {
    let decoder: Box<dyn Read + 'a> = match kind {
        ArchiveKind::Tar => Box::new(reader),
        ArchiveKind::TarGz => Box::new(GzDecoder::new(reader)),
        ArchiveKind::TarBz2 => Box::new(BzDecoder::new(reader)),
        ArchiveKind::TarXz => Box::new(XzDecoder::new(reader)),
        ArchiveKind::Zip => return Err(FetchError::UnsupportedArchive("zip as tar".to_string())),
    };

    let mut archive = Archive::new(decoder);
    let mut found = false;

    for item in archive.entries()? {
        let mut item = item?;
        if item.path_bytes().as_ref() != entry.as_bytes() {
            continue;
        }

        tracing::debug!("Extracting {} to {}", entry, dest.display());
        let mut out = File::create(dest)?;
        io::copy(&mut item, &mut out)?;
        found = true;
    }

    if found {
        Ok(())
    } else {
        Err(FetchError::EntryNotFound {
            entry: entry.to_string(),
        })
    }
}

/// Copy the zip entry named exactly `entry` to `dest`, creating the file with
/// the mode recorded in the archive.
pub fn extract_from_zip(bytes: &[u8], entry: &str, dest: &Path) -> Result<(), FetchError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut file = match archive.by_name(entry) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => {
            return Err(FetchError::EntryNotFound {
                entry: entry.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    if let Some(mode) = file.unix_mode() {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode & 0o7777);
    }

    tracing::debug!("Extracting {} to {}", entry, dest.display());
    let mut out = options.open(dest)?;
    io::copy(&mut file, &mut out)?;
    Ok(())
}
