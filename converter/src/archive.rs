use std::io::{Cursor, Write};

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

pub const ARCHIVE_MEDIA_TYPE: &str = "application/zip";

/// Wraps one file's bytes into a new zip under its original name.
pub fn package_single(name: &str, bytes: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(name, options)?;
    writer.write_all(bytes)?;
    let archive = writer.finish()?.into_inner();

    debug!(
        "Packaged {} ({} bytes) into {} byte archive",
        name,
        bytes.len(),
        archive.len()
    );
    Ok(archive)
}

/// `package_single` on a blocking thread.
pub async fn package_single_async(name: String, bytes: Vec<u8>) -> Result<Vec<u8>, ArchiveError> {
    tokio::task::spawn_blocking(move || package_single(&name, &bytes)).await?
}
