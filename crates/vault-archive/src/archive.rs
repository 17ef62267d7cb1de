use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use vault_core::ArchiveFormat;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to create archive at {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to finalize archive at {path}: {source}")]
    Finish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What one build produced. `warnings` carries the per-file skips so the
/// caller can surface them to observers; they never fail the build.
#[derive(Debug)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub added: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Streams `files` into `{dest_dir}/{base_name}.{ext}`, appending a numeric
/// suffix when that path is taken. Entries are named relative to `root`.
///
/// Per-file failures (the tree is live under us) are skipped with a warning;
/// only creating or finalizing the archive itself can fail the build. The
/// progress callback runs after every attempted file, successful or not, and
/// has no influence on the archive contents.
pub fn write_archive(
    dest_dir: &Path,
    base_name: &str,
    format: ArchiveFormat,
    root: &Path,
    files: &[PathBuf],
    mut progress: Option<&mut dyn FnMut(usize, usize)>,
) -> Result<ArchiveSummary, ArchiveError> {
    std::fs::create_dir_all(dest_dir).map_err(|source| ArchiveError::Create {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let path = disambiguate(dest_dir, base_name, format.extension());
    let mut writer = Writer::open(&path, format)?;

    let total = files.len();
    let mut added = 0;
    let mut skipped = 0;
    let mut warnings = Vec::new();

    for (index, file) in files.iter().enumerate() {
        let name = entry_name(root, file);
        match writer.add_file(file, &name) {
            Ok(()) => added += 1,
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                let message = format!("no permission to read {}, skipped", file.display());
                warn!("{message}");
                warnings.push(message);
                skipped += 1;
            }
            Err(err) => {
                let message = format!("could not archive {}: {err}", file.display());
                warn!("{message}");
                warnings.push(message);
                skipped += 1;
            }
        }

        if let Some(callback) = progress.as_mut() {
            callback(total, index + 1);
        }
    }

    writer.finish().map_err(|source| ArchiveError::Finish {
        path: path.clone(),
        source,
    })?;

    let bytes = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
    Ok(ArchiveSummary {
        path,
        bytes,
        added,
        skipped,
        warnings,
    })
}

/// First free destination: `base.ext`, then `base.2.ext`, `base.3.ext`, ...
fn disambiguate(dir: &Path, base: &str, ext: &str) -> PathBuf {
    let mut path = dir.join(format!("{base}.{ext}"));
    let mut index = 1;
    while path.exists() {
        index += 1;
        path = dir.join(format!("{base}.{index}.{ext}"));
    }
    path
}

fn entry_name(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let name = relative.to_string_lossy().replace('\\', "/");
    if name.is_empty() {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string())
    } else {
        name
    }
}

enum Writer {
    Zip(ZipWriter<File>),
    Tar(tar::Builder<File>),
    TarGz(tar::Builder<GzEncoder<File>>),
}

impl Writer {
    fn open(path: &Path, format: ArchiveFormat) -> Result<Self, ArchiveError> {
        let file = File::create(path).map_err(|source| ArchiveError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(match format {
            ArchiveFormat::Zip => Writer::Zip(ZipWriter::new(file)),
            ArchiveFormat::Tar => Writer::Tar(tar::Builder::new(file)),
            ArchiveFormat::TarGz => Writer::TarGz(tar::Builder::new(GzEncoder::new(
                file,
                Compression::default(),
            ))),
        })
    }

    // Opens the source before touching the archive so permission failures
    // surface without leaving a half-written entry behind.
    fn add_file(&mut self, source: &Path, name: &str) -> io::Result<()> {
        let mut file = File::open(source)?;
        match self {
            Writer::Zip(writer) => {
                let options =
                    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
                writer.start_file(name, options).map_err(zip_io)?;
                if let Err(err) = io::copy(&mut file, writer) {
                    let _ = writer.abort_file();
                    return Err(err);
                }
                Ok(())
            }
            Writer::Tar(builder) => builder.append_file(name, &mut file),
            Writer::TarGz(builder) => builder.append_file(name, &mut file),
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Writer::Zip(writer) => {
                writer.finish().map_err(zip_io)?;
            }
            Writer::Tar(builder) => {
                builder.into_inner()?;
            }
            Writer::TarGz(builder) => {
                builder.into_inner()?.finish()?;
            }
        }
        Ok(())
    }
}

fn zip_io(err: zip::result::ZipError) -> io::Error {
    match err {
        zip::result::ZipError::Io(inner) => inner,
        other => io::Error::other(other),
    }
}
