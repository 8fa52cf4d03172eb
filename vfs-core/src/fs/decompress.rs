//! `src/fs/decompress.rs`
//!
//! Unwraps gzip layers. Some servers compress already-compressed files, so a
//! single body can carry several layers.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;
use tracing::trace;

use crate::error::{VfsError, VfsResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Maximum number of layers unwrapped before giving up.
pub const MAX_GZIP_LAYERS: usize = 16;

#[must_use]
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Inflate while the data starts with the gzip magic bytes. Data without the
/// magic comes back untouched.
pub fn gunzip_all(mut data: Bytes) -> VfsResult<Bytes> {
    let mut layers = 0;

    while is_gzip(&data) {
        if layers == MAX_GZIP_LAYERS {
            return Err(VfsError::Decompression(format!(
                "more than {MAX_GZIP_LAYERS} gzip layers"
            )));
        }

        let mut out = Vec::with_capacity(data.len() * 4);
        GzDecoder::new(&data[..])
            .read_to_end(&mut out)
            .map_err(|e| VfsError::Decompression(format!("layer {}: {e}", layers + 1)))?;

        layers += 1;
        trace!(layer = layers, inflated = out.len(), "Unwrapped gzip layer");
        data = Bytes::from(out);
    }

    Ok(data)
}
