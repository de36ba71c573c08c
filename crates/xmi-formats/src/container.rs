//! IFF container walking.
//!
//! An XMI file is a `FORM` of type `XMID`, optionally bundled inside a
//! `CAT ` catalog when a file carries several sub-songs. Each chunk is a
//! 4-byte ASCII id, a 4-byte big-endian size (excluding the header) and
//! the payload, padded to even length. The event stream lives in the
//! `EVNT` sub-chunk; the walker returns the byte range of the first one
//! it finds.

use crate::reader::ByteReader;
use crate::LoadError;

const FORM: [u8; 4] = *b"FORM";
const CAT: [u8; 4] = *b"CAT ";
const XMID: [u8; 4] = *b"XMID";
const EVNT: [u8; 4] = *b"EVNT";
/// "FORM" with its bytes reversed: a byte-swapped header.
const MROF: [u8; 4] = *b"MROF";

/// "FORM" read as a big-endian integer. A chunk id of `XMID` with this
/// as its size means the header words are swapped: the id was really a
/// form type, the size is the "FORM" tag, and the real size follows.
const FORM_AS_INT: u32 = 0x464F_524D;

/// Catalog offsets are absolute and can point anywhere in the file, so
/// a malformed offset list could loop. Nesting is capped instead of
/// tracking visited positions.
const MAX_DEPTH: u32 = 16;

/// Byte range of an `EVNT` chunk payload within the file image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvntChunk {
    pub start: usize,
    pub end: usize,
}

/// Locate the first `EVNT` chunk in an XMI container.
pub fn find_evnt(data: &[u8]) -> Result<EvntChunk, LoadError> {
    let mut r = ByteReader::new(data);
    match walk(&mut r, data.len(), 0)? {
        Some(evnt) => Ok(evnt),
        None => Err(LoadError::NoEvntChunk),
    }
}

fn checked_end(pos: usize, size: usize, end: usize) -> Result<usize, LoadError> {
    let chunk_end = pos.checked_add(size).ok_or(LoadError::TruncatedContainer)?;
    if chunk_end > end {
        return Err(LoadError::TruncatedContainer);
    }
    Ok(chunk_end)
}

/// Read a chunk header, normalising the two swapped-header variants
/// (`XMID` + "FORM"-as-integer, and byte-reversed `MROF`) to `FORM`.
fn read_header(r: &mut ByteReader) -> Result<([u8; 4], usize), LoadError> {
    let id = r.read_tag()?;
    let size = r.read_u32_be()? as usize;
    if id == XMID && size == FORM_AS_INT as usize {
        let size = r.read_u32_be()? as usize;
        Ok((FORM, size))
    } else if id == MROF {
        Ok((FORM, (size as u32).swap_bytes() as usize))
    } else {
        Ok((id, size))
    }
}

/// Walk chunks in `[r.pos(), end)`, descending into containers.
fn walk(r: &mut ByteReader, end: usize, depth: u32) -> Result<Option<EvntChunk>, LoadError> {
    if depth > MAX_DEPTH {
        return Ok(None);
    }
    while r.pos() + 8 <= end {
        let (id, size) = read_header(r)?;
        let chunk_end = checked_end(r.pos(), size, end)?;

        if id == EVNT {
            return Ok(Some(EvntChunk { start: r.pos(), end: chunk_end }));
        } else if id == FORM {
            if size < 4 {
                return Err(LoadError::TruncatedContainer);
            }
            r.read_tag()?; // form type, unused
            if let Some(evnt) = walk(r, chunk_end, depth + 1)? {
                return Ok(Some(evnt));
            }
            r.seek(chunk_end);
        } else if id == CAT {
            if let Some(evnt) = catalog(r, chunk_end, depth + 1)? {
                return Ok(Some(evnt));
            }
            r.seek(chunk_end);
        } else {
            r.seek(chunk_end);
            if size % 2 == 1 && r.pos() < end {
                r.skip(1)?;
            }
        }
    }
    Ok(None)
}

/// Interpret a `CAT ` payload.
///
/// Catalogs normally open with a nested form. A typed catalog yields
/// the byte sequence `XMID` then `FORM`, which the swapped-header rule
/// in `read_header` resolves. Some files store an offset list instead:
/// a little-endian 16-bit entry count, two reserved bytes, then
/// absolute file offsets.
fn catalog(r: &mut ByteReader, end: usize, depth: u32) -> Result<Option<EvntChunk>, LoadError> {
    if depth > MAX_DEPTH {
        return Ok(None);
    }
    let next = r.peek_tag()?;
    if next == FORM || next == XMID || next == MROF {
        return walk(r, end, depth);
    }

    let count = r.read_u16_le()? as usize;
    r.skip(2)?;
    for _ in 0..count {
        if r.pos() + 4 > end {
            break;
        }
        let offset = r.read_u32_le()? as usize;
        if offset == 0 {
            continue;
        }
        let resume = r.pos();
        let found = probe_at(r, offset, depth);
        r.seek(resume);
        if let Ok(Some(evnt)) = found {
            return Ok(Some(evnt));
        }
        // failed branch; try the next entry
    }
    Ok(None)
}

/// Expect a `FORM`/`XMID` header at an absolute offset and walk the
/// form's own bounds.
fn probe_at(r: &mut ByteReader, offset: usize, depth: u32) -> Result<Option<EvntChunk>, LoadError> {
    if offset + 8 > r.len() {
        return Err(LoadError::TruncatedContainer);
    }
    r.seek(offset);
    let (id, size) = read_header(r)?;
    if id != FORM || size < 4 {
        return Ok(None);
    }
    let chunk_end = checked_end(r.pos(), size, r.len())?;
    r.read_tag()?; // form type
    walk(r, chunk_end, depth + 1)
}
