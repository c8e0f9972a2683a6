//! Leading-byte signatures and bounded header reads.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// DOS stub header that every PE image starts with.
pub const PE_MAGIC: [u8; 2] = [b'M', b'Z'];

pub const MACHO_MAGICS: [[u8; 4]; 4] = [
    [0xfe, 0xed, 0xfa, 0xce], // MH_MAGIC
    [0xce, 0xfa, 0xed, 0xfe], // MH_CIGAM
    [0xfe, 0xed, 0xfa, 0xcf], // MH_MAGIC_64
    [0xcf, 0xfa, 0xed, 0xfe], // MH_CIGAM_64
];

/// Longest prefix any signature needs.
pub const HEADER_LEN: usize = 4;

/// Read up to `length` leading bytes.
///
/// `None` means the file could not be read at all, which is different from
/// `Some(empty)` for a zero-byte file.
pub fn read_magic_bytes(path: &Path, length: usize) -> Option<Vec<u8>> {
    match read_prefix(path, length) {
        Ok(bytes) => {
            log::debug!("Magic bytes of {}: {bytes:02x?}", path.display());
            Some(bytes)
        }
        Err(e) => {
            log::debug!("Unable to read {}: {e}", path.display());
            None
        }
    }
}

fn read_prefix(path: &Path, length: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut bytes = Vec::with_capacity(length);
    file.take(length as u64).read_to_end(&mut bytes)?;
    Ok(bytes)
}

pub fn is_elf_header(header: &[u8]) -> bool {
    header.starts_with(&ELF_MAGIC)
}

pub fn is_pe_header(header: &[u8]) -> bool {
    header.starts_with(&PE_MAGIC)
}

pub fn is_macho_header(header: &[u8]) -> bool {
    header.len() >= HEADER_LEN && MACHO_MAGICS.iter().any(|magic| header[..HEADER_LEN] == *magic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_magic_bytes_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blob");
        fs::write(&path, b"0123456789").unwrap();

        assert_eq!(read_magic_bytes(&path, 4), Some(b"0123".to_vec()));
        assert_eq!(read_magic_bytes(&path, 2), Some(b"01".to_vec()));
    }

    #[test]
    fn test_read_magic_bytes_short_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty");
        fs::write(&empty, b"").unwrap();

        assert_eq!(read_magic_bytes(&empty, 4), Some(Vec::new()));
        assert_eq!(read_magic_bytes(&temp_dir.path().join("missing"), 4), None);
    }

    #[test]
    fn test_header_matchers() {
        assert!(is_elf_header(b"\x7fELF\x02\x01"));
        assert!(!is_elf_header(b"\x7fEL"));
        assert!(is_pe_header(b"MZ\x90\x00"));
        assert!(!is_pe_header(b"M"));
        for magic in MACHO_MAGICS {
            assert!(is_macho_header(&magic));
        }
        assert!(!is_macho_header(&[0xca, 0xfe, 0xba, 0xbe]));
        assert!(!is_macho_header(&[0xfe, 0xed, 0xfa]));
    }
}
