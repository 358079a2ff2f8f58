use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 digest of a file, hex encoded.
pub fn hash_file(file: &Path) -> io::Result<String> {
    let f = File::open(file)?;
    hash_reader(BufReader::with_capacity(READ_BUFFER_SIZE, f))
}

pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn hash_data(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
