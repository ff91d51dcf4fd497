//! End-to-end round-trip through the on-disk layout in `format` (§6):
//! serialize a row group's columns with their per-column headers and a
//! footer, then decode back into externally-backed columns and confirm a
//! cursor yields the original sequence (spec.md §8 "Round-trip").

use columnix::column::{Column, ColumnCursor};
use columnix::format::{
    pad_to_8, read_header, write_header, ColumnDescriptor, ColumnHeader, Footer, RowGroupHeader,
    StringTable,
};
use columnix::value::{ColumnType, Compression, Encoding};

struct Encoded {
    header: ColumnHeader,
    descriptor: ColumnDescriptor,
}

fn encode_columns(
    columns: &[Column<'static>],
    names: &[&str],
    body: &mut Vec<u8>,
) -> (Vec<Encoded>, StringTable) {
    let mut table = StringTable::new();
    let mut encoded = Vec::new();
    for (column, &name) in columns.iter().zip(names) {
        pad_to_8(body);
        let offset = body.len() as u64;
        let (bytes, size) = column.export();
        body.extend_from_slice(bytes);
        let descriptor = ColumnDescriptor {
            name: table.intern(name),
            ty: column.column_type(),
            encoding: column.encoding(),
            compression: Compression::None,
            level: 0,
        };
        let header = ColumnHeader {
            offset,
            size: size as u64,
            decompressed_size: size as u64,
            compression: Compression::None,
            index: column.index().clone(),
        };
        encoded.push(Encoded { header, descriptor });
    }
    (encoded, table)
}

#[test]
fn header_then_row_group_body_then_footer_round_trips() {
    let mut i32_col = Column::new(ColumnType::I32, Encoding::None);
    let mut str_col = Column::new(ColumnType::Str, Encoding::None);
    let mut bit_col = Column::new(ColumnType::Bit, Encoding::None);
    for i in 0..37i32 {
        i32_col.put_i32(i).unwrap();
        str_col.put_str(format!("row-{i}").as_bytes()).unwrap();
        bit_col.put_bit(i % 2 == 0).unwrap();
    }
    let columns = vec![i32_col, str_col, bit_col];
    let names = ["numbers", "labels", "flags"];

    // --- write ---
    let mut file = Vec::new();
    write_header(&mut file);

    let mut body = Vec::new();
    let (encoded, table) = encode_columns(&columns, &names, &mut body);

    let row_group_header = RowGroupHeader {
        size: body.len() as u64,
        offset: file.len() as u64,
    };
    file.extend_from_slice(&body);

    let strings_offset = file.len() as u64;
    file.extend_from_slice(table.as_bytes());
    let strings_size = file.len() as u64 - strings_offset;

    let mut row_group_header_bytes = Vec::new();
    row_group_header.encode(&mut row_group_header_bytes);

    let mut descriptor_bytes = Vec::new();
    let mut column_header_bytes = Vec::new();
    for e in &encoded {
        e.descriptor.encode(&mut descriptor_bytes);
        e.header.encode(&mut column_header_bytes);
    }

    let footer = Footer {
        strings_offset,
        strings_size,
        row_group_count: 1,
        column_count: columns.len() as u32,
        row_count: 37,
    };
    let mut footer_bytes = Vec::new();
    footer.encode(&mut footer_bytes);

    // --- read back ---
    let rest = read_header(&file).unwrap();
    assert_eq!(rest.len(), file.len() - 8);

    let (decoded_rg_header, rest) = RowGroupHeader::decode(&row_group_header_bytes).unwrap();
    assert!(rest.is_empty());
    assert_eq!(decoded_rg_header, row_group_header);

    let mut decoded_descriptors = Vec::new();
    let mut remaining = descriptor_bytes.as_slice();
    for _ in 0..columns.len() {
        let (d, rest) = ColumnDescriptor::decode(remaining).unwrap();
        decoded_descriptors.push(d);
        remaining = rest;
    }
    assert!(remaining.is_empty());

    let mut decoded_headers = Vec::new();
    let mut remaining = column_header_bytes.as_slice();
    for d in &decoded_descriptors {
        let (h, rest) = ColumnHeader::decode(d.ty, remaining).unwrap();
        decoded_headers.push(h);
        remaining = rest;
    }
    assert!(remaining.is_empty());

    let decoded_footer = Footer::decode(&footer_bytes).unwrap();
    assert_eq!(decoded_footer, footer);

    let names_read: Vec<&str> = decoded_descriptors
        .iter()
        .map(|d| StringTable::read_at(table.as_bytes(), d.name).unwrap())
        .collect();
    assert_eq!(names_read, names.to_vec());

    let body_start = row_group_header.offset as usize;
    let row_group_body = &file[body_start..body_start + row_group_header.size as usize];

    let reconstructed: Vec<Column<'_>> = decoded_headers
        .iter()
        .zip(&decoded_descriptors)
        .map(|(h, d)| {
            let blob = &row_group_body[h.offset as usize..(h.offset + h.size) as usize];
            Column::new_external(d.ty, d.encoding, blob, h.index.count() as usize, h.index.clone())
                .unwrap()
        })
        .collect();

    let mut cursor = ColumnCursor::new(&reconstructed[0]);
    let (batch, count) = cursor.next_batch_i32().unwrap();
    assert_eq!(count, 37);
    assert_eq!(batch, &(0..37).collect::<Vec<i32>>()[..]);

    let mut str_cursor = ColumnCursor::new(&reconstructed[1]);
    let batch = str_cursor.next_batch_str().unwrap();
    let strs: Vec<String> = batch
        .iter()
        .map(|b| String::from_utf8(b.to_vec()).unwrap())
        .collect();
    let expected: Vec<String> = (0..37).map(|i| format!("row-{i}")).collect();
    assert_eq!(strs, expected);

    let mut bit_cursor = ColumnCursor::new(&reconstructed[2]);
    let mut seen = Vec::new();
    while bit_cursor.valid() {
        let (word, take) = bit_cursor.next_batch_bit().unwrap();
        for i in 0..take {
            seen.push(word & (1 << i) != 0);
        }
    }
    let expected_bits: Vec<bool> = (0..37).map(|i| i % 2 == 0).collect();
    assert_eq!(seen, expected_bits);
}
