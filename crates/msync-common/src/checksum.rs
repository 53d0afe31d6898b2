//! Checksum utilities for file fingerprinting
//!
//! Manifests are fingerprinted by the MD5 digest of their full byte content,
//! rendered as uppercase hex. The digest is only used to tell new content
//! from re-uploaded content, never for integrity against an adversary.

use crate::error::Result;
use std::io::Read;
use std::path::Path;

/// Read buffer size for streaming digests
const BUFFER_SIZE: usize = 8192;

/// Compute the uppercase hex MD5 of an in-memory buffer
pub fn compute_md5_upper(data: &[u8]) -> String {
    format!("{:X}", md5::compute(data))
}

/// Compute the uppercase hex MD5 of any readable source
pub fn compute_md5_upper_from<R: Read>(reader: &mut R) -> Result<String> {
    let mut context = md5::Context::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }

    Ok(format!("{:X}", context.compute()))
}

/// Compute the uppercase hex MD5 of a file without loading it whole
pub fn compute_file_md5_upper(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_md5_upper_from(&mut file)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_compute_md5_upper() {
        // MD5 of "Hello, world!"
        assert_eq!(compute_md5_upper(b"Hello, world!"), "6CD3556DEB0DA54BCA060B4C39479839");
    }

    #[test]
    fn test_streaming_matches_in_memory() {
        let data = vec![b'x'; BUFFER_SIZE * 3 + 17];
        let mut cursor = Cursor::new(data.clone());
        let streamed = compute_md5_upper_from(&mut cursor).unwrap();
        assert_eq!(streamed, compute_md5_upper(&data));
    }

    #[test]
    fn test_empty_input() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert_eq!(
            compute_md5_upper_from(&mut cursor).unwrap(),
            "D41D8CD98F00B204E9800998ECF8427E"
        );
    }

    #[test]
    fn test_file_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"test").unwrap();
        file.flush().unwrap();

        let digest = compute_file_md5_upper(file.path()).unwrap();
        assert_eq!(digest, "098F6BCD4621D373CADE4E832627B4F6");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = compute_file_md5_upper("/definitely/not/here.csv").unwrap_err();
        assert!(err.is_not_found());
    }
}
