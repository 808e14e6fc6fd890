//! Content digests for change detection
//!
//! MD5 matches the entity tag S3 reports for single-part uploads, which is
//! what the inventory is compared against. Strength is irrelevant here.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::Result;

const CHUNK_SIZE: usize = 64 * 1024;

/// Lowercase hex MD5 of a file's full content
pub fn hash_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, File::open(path)?);
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex MD5 of an in-memory buffer
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
