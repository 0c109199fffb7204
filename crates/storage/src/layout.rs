//! On-disk layout of the data directory
//!
//! ```text
//! <data_dir>/
//!   <id>/
//!     data.json   canonical JSON body
//!     meta.json   {"id": "<id>", "access": "public"|"protected"|"private"}
//! ```
//!
//! Files are replaced by writing a `.tmp` sibling and renaming it into place,
//! so a crash mid-write never leaves a truncated body behind.

use jstore_core::{DocId, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Document body file name
pub const DATA_FILE: &str = "data.json";

/// Document metadata file name
pub const META_FILE: &str = "meta.json";

/// Directory holding one document's files
pub fn doc_dir(data_dir: &Path, id: &DocId) -> PathBuf {
    data_dir.join(id.as_str())
}

/// Path of a document's body file
pub fn data_path(data_dir: &Path, id: &DocId) -> PathBuf {
    doc_dir(data_dir, id).join(DATA_FILE)
}

/// Path of a document's metadata file
pub fn meta_path(data_dir: &Path, id: &DocId) -> PathBuf {
    doc_dir(data_dir, id).join(META_FILE)
}

/// Replace `path` with `bytes` (full overwrite)
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
