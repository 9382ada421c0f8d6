//! Minimal EXIF (TIFF) blocks carrying an ImageDescription.
//!
//! The block written here is a big-endian TIFF header followed by IFD0 with
//! a single ASCII entry. Parsing accepts either byte order so descriptions
//! written by other tools can be read back too.

const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
const TYPE_ASCII: u16 = 2;

/// TIFF header (8) + entry count (2) + one entry (12) + next IFD offset (4).
const VALUE_OFFSET: u32 = 26;

/// Build a TIFF block whose IFD0 holds only `description`.
pub fn build_description(description: &str) -> Vec<u8> {
    let mut value = description.as_bytes().to_vec();
    value.push(0);
    let count = value.len() as u32;

    let mut tiff = Vec::with_capacity(VALUE_OFFSET as usize + value.len());
    tiff.extend_from_slice(b"MM");
    tiff.extend_from_slice(&42u16.to_be_bytes());
    tiff.extend_from_slice(&8u32.to_be_bytes()); // IFD0 offset

    tiff.extend_from_slice(&1u16.to_be_bytes()); // entry count
    tiff.extend_from_slice(&TAG_IMAGE_DESCRIPTION.to_be_bytes());
    tiff.extend_from_slice(&TYPE_ASCII.to_be_bytes());
    tiff.extend_from_slice(&count.to_be_bytes());
    if count <= 4 {
        // Values of four bytes or less live in the offset field itself
        let mut inline = [0u8; 4];
        inline[..value.len()].copy_from_slice(&value);
        tiff.extend_from_slice(&inline);
        tiff.extend_from_slice(&0u32.to_be_bytes()); // no next IFD
    } else {
        tiff.extend_from_slice(&VALUE_OFFSET.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes()); // no next IFD
        tiff.extend_from_slice(&value);
    }

    tiff
}

#[derive(Clone, Copy)]
enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    fn u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Big => u16::from_be_bytes(bytes),
            ByteOrder::Little => u16::from_le_bytes(bytes),
        })
    }

    fn u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Big => u32::from_be_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
        })
    }
}

/// Read ImageDescription from IFD0 of a TIFF block.
pub fn parse_description(tiff: &[u8]) -> Option<String> {
    let order = match tiff.get(0..2)? {
        b"MM" => ByteOrder::Big,
        b"II" => ByteOrder::Little,
        _ => return None,
    };
    if order.u16(tiff, 2)? != 42 {
        return None;
    }

    let ifd = order.u32(tiff, 4)? as usize;
    let entries = order.u16(tiff, ifd)? as usize;

    for i in 0..entries {
        let entry = ifd + 2 + i * 12;
        if order.u16(tiff, entry)? != TAG_IMAGE_DESCRIPTION {
            continue;
        }
        if order.u16(tiff, entry + 2)? != TYPE_ASCII {
            return None;
        }

        let count = order.u32(tiff, entry + 4)? as usize;
        let start = if count <= 4 {
            entry + 8
        } else {
            order.u32(tiff, entry + 8)? as usize
        };
        let raw = tiff.get(start..start + count)?;
        let text = raw.split(|&b| b == 0).next().unwrap_or(raw);
        return Some(String::from_utf8_lossy(text).into_owned());
    }

    None
}
