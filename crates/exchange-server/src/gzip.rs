//! Gzip helpers for the `/ad` wire format: inbound requests arrive
//! gzip-compressed; outbound requests to each DSP are compressed fresh per
//! DSP since the compressed bytes are owned by that DSP's request body.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

pub fn gzip_decompress(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

pub fn gzip_compress(plain: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // A Vec<u8> writer never fails.
    encoder.write_all(plain).expect("gzip encode");
    encoder.finish().expect("gzip encode")
}
