//! Infinite-loop patching for assembled GIF containers.
//!
//! The encoder does not write the Netscape application extension, so it is
//! spliced into the byte stream right after the header and the optional
//! global color table.

use crate::PatchError;

/// `0x21 0xFF 0x0B "NETSCAPE2.0" 0x03 0x01 <loop count: 0 = forever>`.
pub const NETSCAPE_LOOP_EXTENSION: [u8; 19] = [
    0x21, 0xFF, 0x0B, b'N', b'E', b'T', b'S', b'C', b'A', b'P', b'E', b'2', b'.', b'0', 0x03,
    0x01, 0x00, 0x00, 0x00,
];

/// Header (6 bytes) plus logical screen descriptor (7 bytes).
pub const HEADER_LEN: usize = 13;

const PACKED_FIELD_OFFSET: usize = 10;
const GLOBAL_COLOR_TABLE_FLAG: u8 = 0x80;
const GLOBAL_COLOR_TABLE_SIZE_MASK: u8 = 0x07;

/// Returns true if the loop extension appears anywhere in `bytes`.
pub fn has_loop_extension(bytes: &[u8]) -> bool {
    bytes
        .windows(NETSCAPE_LOOP_EXTENSION.len())
        .any(|window| window == NETSCAPE_LOOP_EXTENSION)
}

/// Byte offset at which the loop extension has to be inserted.
pub fn insertion_offset(bytes: &[u8]) -> Result<usize, PatchError> {
    if !bytes.starts_with(b"GIF") {
        return Err(PatchError::NotGif);
    }
    if bytes.len() < HEADER_LEN {
        return Err(PatchError::Truncated {
            offset: HEADER_LEN,
            len: bytes.len(),
        });
    }

    let packed = bytes[PACKED_FIELD_OFFSET];
    let mut offset = HEADER_LEN;
    if packed & GLOBAL_COLOR_TABLE_FLAG != 0 {
        offset += 3 * (1usize << ((packed & GLOBAL_COLOR_TABLE_SIZE_MASK) + 1));
    }

    if offset > bytes.len() {
        return Err(PatchError::Truncated {
            offset,
            len: bytes.len(),
        });
    }
    Ok(offset)
}

/// Returns `bytes` with the infinite-loop extension inserted.
///
/// Buffers that already loop are returned unchanged. Nothing is overwritten:
/// everything from the insertion point on shifts back by 19 bytes.
pub fn patch_infinite_loop(bytes: &[u8]) -> Result<Vec<u8>, PatchError> {
    if has_loop_extension(bytes) {
        tracing::debug!("gif already carries a loop extension");
        return Ok(bytes.to_vec());
    }

    let offset = insertion_offset(bytes)?;
    let mut patched = Vec::with_capacity(bytes.len() + NETSCAPE_LOOP_EXTENSION.len());
    patched.extend_from_slice(&bytes[..offset]);
    patched.extend_from_slice(&NETSCAPE_LOOP_EXTENSION);
    patched.extend_from_slice(&bytes[offset..]);
    tracing::debug!(offset, "inserted gif loop extension");
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 1x1 GIF89a. `color_bits` selects a global color table of
    /// `2^(color_bits + 1)` entries; `None` omits it.
    fn tiny_gif(color_bits: Option<u8>) -> Vec<u8> {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&[1, 0, 1, 0]);
        match color_bits {
            Some(bits) => {
                bytes.extend_from_slice(&[0x80 | bits, 0, 0]);
                bytes.extend(std::iter::repeat(0xAA).take(3 * (1 << (bits + 1))));
            }
            None => bytes.extend_from_slice(&[0x00, 0, 0]),
        }
        // Image descriptor, local color table, one LZW block, trailer.
        bytes.extend_from_slice(&[0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0x80]);
        bytes.extend_from_slice(&[0, 0, 0, 0xFF, 0xFF, 0xFF]);
        bytes.extend_from_slice(&[0x02, 0x02, 0x44, 0x01, 0x00, 0x3B]);
        bytes
    }

    #[test]
    fn inserts_after_header_without_color_table() {
        let original = tiny_gif(None);
        let patched = patch_infinite_loop(&original).unwrap();

        assert_eq!(patched.len(), original.len() + 19);
        assert_eq!(&patched[..13], &original[..13]);
        assert_eq!(&patched[13..32], &NETSCAPE_LOOP_EXTENSION);
        assert_eq!(&patched[32..], &original[13..]);
    }

    #[test]
    fn skips_global_color_table() {
        let original = tiny_gif(Some(1));
        assert_eq!(insertion_offset(&original).unwrap(), 13 + 12);

        let patched = patch_infinite_loop(&original).unwrap();
        assert_eq!(&patched[25..44], &NETSCAPE_LOOP_EXTENSION);
        assert_eq!(&patched[..25], &original[..25]);
        assert_eq!(&patched[44..], &original[25..]);
    }

    #[test]
    fn largest_color_table() {
        let original = tiny_gif(Some(7));
        assert_eq!(insertion_offset(&original).unwrap(), 13 + 768);
    }

    #[test]
    fn patching_is_idempotent() {
        for bits in [None, Some(0), Some(3)] {
            let once = patch_infinite_loop(&tiny_gif(bits)).unwrap();
            let twice = patch_infinite_loop(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn leaves_existing_extension_anywhere() {
        let mut bytes = tiny_gif(None);
        let trailer = bytes.split_off(bytes.len() - 1);
        bytes.extend_from_slice(&NETSCAPE_LOOP_EXTENSION);
        bytes.extend(trailer);

        assert!(has_loop_extension(&bytes));
        assert_eq!(patch_infinite_loop(&bytes).unwrap(), bytes);
    }

    #[test]
    fn reports_truncated_color_table() {
        let mut bytes = tiny_gif(None);
        bytes[10] = 0x87;
        bytes.truncate(20);
        assert_eq!(
            patch_infinite_loop(&bytes),
            Err(PatchError::Truncated {
                offset: 13 + 768,
                len: 20
            })
        );
    }

    #[test]
    fn rejects_non_gif_input() {
        assert_eq!(patch_infinite_loop(b"\x89PNG\r\n"), Err(PatchError::NotGif));
        assert_eq!(
            patch_infinite_loop(b"GIF89a"),
            Err(PatchError::Truncated { offset: 13, len: 6 })
        );
    }
}
