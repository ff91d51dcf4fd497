//! On-disk file format (§6): header magic, row-group body alignment,
//! footer, and the column/row-group descriptor tables. This module only
//! encodes/decodes the byte layout into and out of in-memory buffers —
//! opening files, memory-mapping, and the read/write harness that drives
//! them are the external collaborator spec.md §1 calls out of scope.
//!
//! The encode/decode style mirrors [`crate::column`]'s own manual
//! `to_le_bytes`/`from_le_bytes` slicing (e.g. `Column::put_bit`'s word
//! packing) rather than reaching for a schema/IDL layer: every integer in
//! this format is fixed-width little-endian by construction (§6), so a
//! generated-code serializer would add a dependency without removing any
//! complexity here.

use crate::error::{out_of_spec, Result};
use crate::index::ColumnIndex;
use crate::value::{ColumnType, Compression, Encoding};

/// `0x65726F7473637A1D`, little-endian, at both the file header and the
/// footer's trailing magic (§6).
pub const MAGIC: u64 = 0x65726F7473637A1D;

fn take<'a>(bytes: &'a [u8], n: usize, what: &str) -> Result<(&'a [u8], &'a [u8])> {
    if bytes.len() < n {
        return Err(out_of_spec!("truncated {}: need {} bytes, have {}", what, n, bytes.len()));
    }
    Ok(bytes.split_at(n))
}

fn read_u32(bytes: &[u8], what: &str) -> Result<(u32, &[u8])> {
    let (head, rest) = take(bytes, 4, what)?;
    Ok((u32::from_le_bytes(head.try_into().unwrap()), rest))
}

fn read_i32(bytes: &[u8], what: &str) -> Result<(i32, &[u8])> {
    let (head, rest) = take(bytes, 4, what)?;
    Ok((i32::from_le_bytes(head.try_into().unwrap()), rest))
}

fn read_u64(bytes: &[u8], what: &str) -> Result<(u64, &[u8])> {
    let (head, rest) = take(bytes, 8, what)?;
    Ok((u64::from_le_bytes(head.try_into().unwrap()), rest))
}

/// Pads `buf` with zero bytes until its length is a multiple of 8 (§6:
/// "Each blob begins aligned to an 8-byte boundary; padding bytes are
/// zero").
pub fn pad_to_8(buf: &mut Vec<u8>) {
    while buf.len() % 8 != 0 {
        buf.push(0);
    }
}

/// Appends the 8-byte file header.
pub fn write_header(out: &mut Vec<u8>) {
    out.extend_from_slice(&MAGIC.to_le_bytes());
}

/// Validates the 8-byte file header, returning the bytes past it.
pub fn read_header(bytes: &[u8]) -> Result<&[u8]> {
    let (magic, rest) = read_u64(bytes, "file header")?;
    if magic != MAGIC {
        return Err(out_of_spec!("bad file magic {:#x}", magic));
    }
    Ok(rest)
}

/// Per-row-group header (§6): `size`, `offset` (absolute file offset of
/// the row-group body).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowGroupHeader {
    pub size: u64,
    pub offset: u64,
}

impl RowGroupHeader {
    pub const ENCODED_SIZE: usize = 16;

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let (size, rest) = read_u64(bytes, "row group header")?;
        let (offset, rest) = read_u64(rest, "row group header")?;
        Ok((RowGroupHeader { size, offset }, rest))
    }
}

/// Per-column descriptor (§6), stored in the footer's descriptor table:
/// `name` is an offset into the string table, not an inline string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: u32,
    pub ty: ColumnType,
    pub encoding: Encoding,
    pub compression: Compression,
    pub level: i32,
}

impl ColumnDescriptor {
    pub const ENCODED_SIZE: usize = 24;

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name.to_le_bytes());
        out.extend_from_slice(&column_type_to_u32(self.ty).to_le_bytes());
        out.extend_from_slice(&encoding_to_u32(self.encoding).to_le_bytes());
        out.extend_from_slice(&self.compression.to_u32().to_le_bytes());
        out.extend_from_slice(&self.level.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // _pad
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let (name, rest) = read_u32(bytes, "column descriptor")?;
        let (ty, rest) = read_u32(rest, "column descriptor")?;
        let (encoding, rest) = read_u32(rest, "column descriptor")?;
        let (compression, rest) = read_u32(rest, "column descriptor")?;
        let (level, rest) = read_i32(rest, "column descriptor")?;
        let (_pad, rest) = read_u32(rest, "column descriptor")?;
        Ok((
            ColumnDescriptor {
                name,
                ty: column_type_from_u32(ty)?,
                encoding: encoding_from_u32(encoding)?,
                compression: Compression::from_u32(compression)?,
                level,
            },
            rest,
        ))
    }
}

fn column_type_to_u32(ty: ColumnType) -> u32 {
    match ty {
        ColumnType::Bit => 0,
        ColumnType::I32 => 1,
        ColumnType::I64 => 2,
        ColumnType::F32 => 3,
        ColumnType::F64 => 4,
        ColumnType::Str => 5,
    }
}

fn column_type_from_u32(v: u32) -> Result<ColumnType> {
    Ok(match v {
        0 => ColumnType::Bit,
        1 => ColumnType::I32,
        2 => ColumnType::I64,
        3 => ColumnType::F32,
        4 => ColumnType::F64,
        5 => ColumnType::Str,
        other => return Err(out_of_spec!("unknown column type discriminant {}", other)),
    })
}

fn encoding_to_u32(encoding: Encoding) -> u32 {
    match encoding {
        Encoding::None => 0,
    }
}

fn encoding_from_u32(v: u32) -> Result<Encoding> {
    match v {
        0 => Ok(Encoding::None),
        other => Err(out_of_spec!("unknown encoding discriminant {}", other)),
    }
}

/// Per-column header within a row group (§6): blob location/size plus
/// the embedded index whose layout mirrors §3's per-type index fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    pub offset: u64,
    pub size: u64,
    pub decompressed_size: u64,
    pub compression: Compression,
    pub index: ColumnIndex,
}

impl ColumnHeader {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.decompressed_size.to_le_bytes());
        out.extend_from_slice(&self.compression.to_u32().to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // _pad
        encode_column_index(&self.index, out);
    }

    /// Decodes a header for a column of type `ty` (the descriptor table
    /// entry tells the caller which type to expect before it reads this).
    pub fn decode(ty: ColumnType, bytes: &[u8]) -> Result<(Self, &[u8])> {
        let (offset, rest) = read_u64(bytes, "column header")?;
        let (size, rest) = read_u64(rest, "column header")?;
        let (decompressed_size, rest) = read_u64(rest, "column header")?;
        let (compression, rest) = read_u32(rest, "column header")?;
        let (_pad, rest) = read_u32(rest, "column header")?;
        let (index, rest) = decode_column_index(ty, rest)?;
        Ok((
            ColumnHeader {
                offset,
                size,
                decompressed_size,
                compression: Compression::from_u32(compression)?,
                index,
            },
            rest,
        ))
    }
}

/// Encodes a [`ColumnIndex`] in a layout fixed per variant: numeric types
/// as `min, max, count`; `Bit` as `true_count, false_count`; `Str` as
/// `min_len: u32, max_len: u32, count: u64` followed by the raw min/max
/// bytes (an Open Question in spec.md §9 left this layout
/// implementation-defined; length-prefixing the two byte strings is the
/// one choice that keeps every index a fixed-plus-trailer shape).
pub fn encode_column_index(index: &ColumnIndex, out: &mut Vec<u8>) {
    match index {
        ColumnIndex::Bit { true_count, false_count } => {
            out.extend_from_slice(&true_count.to_le_bytes());
            out.extend_from_slice(&false_count.to_le_bytes());
        }
        ColumnIndex::I32 { min, max, count } => {
            out.extend_from_slice(&min.to_le_bytes());
            out.extend_from_slice(&max.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
        }
        ColumnIndex::I64 { min, max, count } => {
            out.extend_from_slice(&min.to_le_bytes());
            out.extend_from_slice(&max.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
        }
        ColumnIndex::F32 { min, max, count } => {
            out.extend_from_slice(&min.to_le_bytes());
            out.extend_from_slice(&max.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
        }
        ColumnIndex::F64 { min, max, count } => {
            out.extend_from_slice(&min.to_le_bytes());
            out.extend_from_slice(&max.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
        }
        ColumnIndex::Str { min, max, count } => {
            out.extend_from_slice(&(min.len() as u32).to_le_bytes());
            out.extend_from_slice(&(max.len() as u32).to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(min);
            out.extend_from_slice(max);
        }
    }
}

fn decode_column_index(ty: ColumnType, bytes: &[u8]) -> Result<(ColumnIndex, &[u8])> {
    match ty {
        ColumnType::Bit => {
            let (true_count, rest) = read_u64(bytes, "bit index")?;
            let (false_count, rest) = read_u64(rest, "bit index")?;
            Ok((ColumnIndex::Bit { true_count, false_count }, rest))
        }
        ColumnType::I32 => {
            let (min, rest) = read_i32(bytes, "i32 index")?;
            let (max, rest) = read_i32(rest, "i32 index")?;
            let (count, rest) = read_u64(rest, "i32 index")?;
            Ok((ColumnIndex::I32 { min, max, count }, rest))
        }
        ColumnType::I64 => {
            let (min, rest) = read_u64(bytes, "i64 index")?;
            let (max, rest) = read_u64(rest, "i64 index")?;
            let (count, rest) = read_u64(rest, "i64 index")?;
            Ok((
                ColumnIndex::I64 { min: min as i64, max: max as i64, count },
                rest,
            ))
        }
        ColumnType::F32 => {
            let (min, rest) = take(bytes, 4, "f32 index")?;
            let (max, rest) = take(rest, 4, "f32 index")?;
            let (count, rest) = read_u64(rest, "f32 index")?;
            Ok((
                ColumnIndex::F32 {
                    min: f32::from_le_bytes(min.try_into().unwrap()),
                    max: f32::from_le_bytes(max.try_into().unwrap()),
                    count,
                },
                rest,
            ))
        }
        ColumnType::F64 => {
            let (min, rest) = take(bytes, 8, "f64 index")?;
            let (max, rest) = take(rest, 8, "f64 index")?;
            let (count, rest) = read_u64(rest, "f64 index")?;
            Ok((
                ColumnIndex::F64 {
                    min: f64::from_le_bytes(min.try_into().unwrap()),
                    max: f64::from_le_bytes(max.try_into().unwrap()),
                    count,
                },
                rest,
            ))
        }
        ColumnType::Str => {
            let (min_len, rest) = read_u32(bytes, "str index")?;
            let (max_len, rest) = read_u32(rest, "str index")?;
            let (count, rest) = read_u64(rest, "str index")?;
            let (min, rest) = take(rest, min_len as usize, "str index min")?;
            let (max, rest) = take(rest, max_len as usize, "str index max")?;
            Ok((
                ColumnIndex::Str { min: min.to_vec(), max: max.to_vec(), count },
                rest,
            ))
        }
    }
}

/// Footer (§6): string table location, counts, and the trailing magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub strings_offset: u64,
    pub strings_size: u64,
    pub row_group_count: u32,
    pub column_count: u32,
    pub row_count: u64,
}

impl Footer {
    pub const ENCODED_SIZE: usize = 8 + 8 + 4 + 4 + 8 + 8;

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.strings_offset.to_le_bytes());
        out.extend_from_slice(&self.strings_size.to_le_bytes());
        out.extend_from_slice(&self.row_group_count.to_le_bytes());
        out.extend_from_slice(&self.column_count.to_le_bytes());
        out.extend_from_slice(&self.row_count.to_le_bytes());
        out.extend_from_slice(&MAGIC.to_le_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (strings_offset, rest) = read_u64(bytes, "footer")?;
        let (strings_size, rest) = read_u64(rest, "footer")?;
        let (row_group_count, rest) = read_u32(rest, "footer")?;
        let (column_count, rest) = read_u32(rest, "footer")?;
        let (row_count, rest) = read_u64(rest, "footer")?;
        let (magic, _rest) = read_u64(rest, "footer")?;
        if magic != MAGIC {
            return Err(out_of_spec!("bad footer magic {:#x}", magic));
        }
        Ok(Footer {
            strings_offset,
            strings_size,
            row_group_count,
            column_count,
            row_count,
        })
    }
}

/// Interned, NUL-terminated string table used for column names (§6:
/// "each string length-prefixed or NUL-terminated per implementation
/// choice, documented once" — this crate chooses NUL-terminated, the
/// same encoding §3 already uses for `STR` column values).
#[derive(Debug, Default)]
pub struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    pub fn new() -> Self {
        StringTable { bytes: Vec::new() }
    }

    /// Interns `name`, returning its byte offset for a [`ColumnDescriptor`].
    pub fn intern(&mut self, name: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        offset
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Reads the NUL-terminated string starting at `offset` within
    /// `table_bytes` (the footer's `strings_offset..+strings_size` slice).
    pub fn read_at(table_bytes: &[u8], offset: u32) -> Result<&str> {
        let start = offset as usize;
        if start > table_bytes.len() {
            return Err(out_of_spec!("string table offset {} out of range", offset));
        }
        let end = table_bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| start + p)
            .ok_or_else(|| out_of_spec!("unterminated string table entry at offset {}", offset))?;
        std::str::from_utf8(&table_bytes[start..end])
            .map_err(|_| out_of_spec!("string table entry at offset {} is not UTF-8", offset))
    }
}
