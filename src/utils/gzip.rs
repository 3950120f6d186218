//! Gzip helpers for dist artifacts and on-the-fly static compression.

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use std::io::{self, Read, Write};

/// Compression level used for every artifact.
pub const LEVEL: u32 = 6;

pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(LEVEL));
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 3);
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Whether an `Accept-Encoding` header value admits gzip.
///
/// `gzip` or `*` must be listed without `q=0`.
pub fn accepts_gzip(header: &str) -> bool {
    header.split(',').any(|entry| {
        let mut parts = entry.split(';').map(str::trim);
        let coding = parts.next().unwrap_or_default();
        if !coding.eq_ignore_ascii_case("gzip") && coding != "*" {
            return false;
        }
        parts
            .filter_map(|p| p.strip_prefix("q="))
            .all(|q| q.parse::<f32>().map_or(true, |q| q > 0.0))
    })
}
