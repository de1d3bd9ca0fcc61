use rustc_hash::FxHashMap;

use super::{augmented_data, descriptors, Cell, CellError, HashBytes, MAX_DEPTH, MAX_REF_COUNT};

const BOC_GENERIC_TAG: u32 = 0xb5ee9c72;

const FLAG_HAS_INDEX: u8 = 0x80;
const FLAG_HAS_CRC: u8 = 0x40;
const FLAG_HAS_CACHE_BITS: u8 = 0x20;
const FLAGS_RESERVED: u8 = 0x18;
const SIZE_MASK: u8 = 0x07;

/// Serializes a single-root bag of cells with a CRC32-C trailer and without an index.
///
/// Cells are deduplicated by hash and ordered so that every cell precedes its children.
pub fn serialize_boc(root: &Cell) -> Vec<u8> {
    fn visit<'a>(
        cell: &'a Cell,
        indices: &mut FxHashMap<HashBytes, usize>,
        order: &mut Vec<&'a Cell>,
    ) {
        if indices.contains_key(cell.hash()) {
            return;
        }
        // Mark as visited, the real index is assigned later
        indices.insert(*cell.hash(), usize::MAX);
        for child in cell.references() {
            visit(child, indices, order);
        }
        order.push(cell);
    }

    let mut indices = FxHashMap::default();
    let mut order = Vec::new();
    visit(root, &mut indices, &mut order);
    order.reverse();

    for (index, cell) in order.iter().enumerate() {
        indices.insert(*cell.hash(), index);
    }

    let cell_count = order.len();
    let ref_size = byte_len_for(cell_count as u64);

    let total_cells_size = order
        .iter()
        .map(|cell| 2 + (cell.bit_len() as usize + 7) / 8 + cell.references().len() * ref_size)
        .sum::<usize>();
    let offset_size = byte_len_for(total_cells_size as u64);

    let mut result = Vec::with_capacity(
        4 + 2 + 3 * ref_size + offset_size + ref_size + total_cells_size + 4,
    );
    result.extend_from_slice(&BOC_GENERIC_TAG.to_be_bytes());
    result.push(FLAG_HAS_CRC | ref_size as u8);
    result.push(offset_size as u8);
    write_be(&mut result, cell_count as u64, ref_size);
    write_be(&mut result, 1, ref_size);
    write_be(&mut result, 0, ref_size);
    write_be(&mut result, total_cells_size as u64, offset_size);
    write_be(&mut result, 0, ref_size);

    for cell in &order {
        result.extend_from_slice(&descriptors(cell.bit_len(), cell.references().len()));
        result.extend_from_slice(&augmented_data(cell.data(), cell.bit_len()));
        for child in cell.references() {
            write_be(&mut result, indices[child.hash()] as u64, ref_size);
        }
    }

    let crc = crc32c(&result);
    result.extend_from_slice(&crc.to_le_bytes());
    result
}

pub fn serialize_boc_base64(root: &Cell) -> String {
    base64::encode(serialize_boc(root))
}

/// Parses a single-root bag of cells with ordinary cells only.
///
/// Trees deeper than [`MAX_DEPTH`] are rejected.
pub fn deserialize_boc(data: &[u8]) -> Result<Cell, CellError> {
    let mut reader = Reader::new(data);

    if reader.read_be(4)? as u32 != BOC_GENERIC_TAG {
        return Err(CellError::InvalidBoc("unknown boc tag"));
    }

    let flags = reader.read_u8()?;
    if flags & FLAGS_RESERVED != 0 {
        return Err(CellError::InvalidBoc("unknown flags"));
    }
    let has_index = flags & FLAG_HAS_INDEX != 0;
    let has_crc = flags & FLAG_HAS_CRC != 0;
    let has_cache_bits = flags & FLAG_HAS_CACHE_BITS != 0;
    if has_cache_bits && !has_index {
        return Err(CellError::InvalidBoc("cache bits without index"));
    }

    let ref_size = (flags & SIZE_MASK) as usize;
    if !(1..=4).contains(&ref_size) {
        return Err(CellError::InvalidBoc("invalid ref size"));
    }
    let offset_size = reader.read_u8()? as usize;
    if !(1..=8).contains(&offset_size) {
        return Err(CellError::InvalidBoc("invalid offset size"));
    }

    if has_crc {
        if data.len() < 4 {
            return Err(CellError::InvalidBoc("unexpected end of data"));
        }
        let (payload, crc) = data.split_at(data.len() - 4);
        if crc32c(payload).to_le_bytes() != crc {
            return Err(CellError::InvalidBoc("crc mismatch"));
        }
        reader.truncate(payload.len());
    }

    let cell_count = reader.read_be(ref_size)? as usize;
    let root_count = reader.read_be(ref_size)?;
    let absent_count = reader.read_be(ref_size)?;
    let total_cells_size = reader.read_be(offset_size)? as usize;

    if root_count != 1 {
        return Err(CellError::InvalidBoc("expected a single root"));
    }
    if absent_count != 0 {
        return Err(CellError::InvalidBoc("absent cells are not supported"));
    }
    if cell_count == 0 {
        return Err(CellError::InvalidBoc("empty bag of cells"));
    }
    // Each cell takes at least two descriptor bytes
    if cell_count > total_cells_size / 2 {
        return Err(CellError::InvalidBoc("too many cells"));
    }

    let root_index = reader.read_be(ref_size)? as usize;
    if root_index >= cell_count {
        return Err(CellError::InvalidBoc("root index out of range"));
    }

    if has_index {
        let index_size = cell_count
            .checked_mul(offset_size)
            .ok_or(CellError::InvalidBoc("unexpected end of data"))?;
        reader.skip(index_size)?;
    }

    if reader.remaining() != total_cells_size {
        return Err(CellError::InvalidBoc("cells size mismatch"));
    }

    let mut raw_cells = Vec::with_capacity(cell_count);
    for index in 0..cell_count {
        raw_cells.push(read_raw_cell(&mut reader, index, cell_count, ref_size)?);
    }

    // Children always have greater indices, so cells are built from the end
    let mut cells: Vec<Option<Cell>> = vec![None; cell_count];
    for (index, raw) in raw_cells.into_iter().enumerate().rev() {
        let mut references = Vec::with_capacity(raw.references.len());
        for child in raw.references {
            let child = cells[child]
                .clone()
                .ok_or(CellError::InvalidBoc("invalid reference"))?;
            if child.depth() >= MAX_DEPTH {
                return Err(CellError::InvalidBoc("cell depth overflow"));
            }
            references.push(child);
        }
        cells[index] = Some(Cell::from_parts(&raw.data, raw.bit_len, references));
    }

    cells[root_index]
        .take()
        .ok_or(CellError::InvalidBoc("invalid root"))
}

pub fn deserialize_boc_base64(data: &str) -> Result<Cell, CellError> {
    let data = base64::decode(data.trim()).map_err(|_| CellError::InvalidBoc("invalid base64"))?;
    deserialize_boc(&data)
}

struct RawCell {
    data: Vec<u8>,
    bit_len: u16,
    references: Vec<usize>,
}

fn read_raw_cell(
    reader: &mut Reader<'_>,
    index: usize,
    cell_count: usize,
    ref_size: usize,
) -> Result<RawCell, CellError> {
    let d1 = reader.read_u8()?;
    let d2 = reader.read_u8()?;

    let ref_count = (d1 & 0b111) as usize;
    let is_exotic = d1 & 0b1000 != 0;
    let with_hashes = d1 & 0b1_0000 != 0;
    let level_mask = d1 >> 5;
    if is_exotic || with_hashes || level_mask != 0 {
        return Err(CellError::InvalidBoc("only ordinary cells are supported"));
    }
    if ref_count > MAX_REF_COUNT {
        return Err(CellError::InvalidBoc("too many references"));
    }

    let byte_len = (d2 as usize + 1) / 2;
    let mut data = reader.read_bytes(byte_len)?.to_vec();

    let bit_len = if d2 & 1 != 0 {
        let last = data.last_mut().ok_or(CellError::InvalidBoc("invalid data"))?;
        if *last == 0 {
            return Err(CellError::InvalidBoc("missing completion tag"));
        }
        let tag_offset = last.trailing_zeros() as usize;
        *last &= !(1u8 << tag_offset);
        byte_len * 8 - tag_offset - 1
    } else {
        byte_len * 8
    };
    if bit_len > super::MAX_BIT_LEN as usize {
        return Err(CellError::InvalidBoc("cell data overflow"));
    }

    let mut references = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        let child = reader.read_be(ref_size)? as usize;
        if child <= index || child >= cell_count {
            return Err(CellError::InvalidBoc("invalid reference"));
        }
        references.push(child);
    }

    Ok(RawCell {
        data,
        bit_len: bit_len as u16,
        references,
    })
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn truncate(&mut self, len: usize) {
        self.data = &self.data[..len.max(self.offset)];
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CellError> {
        if len > self.remaining() {
            return Err(CellError::InvalidBoc("unexpected end of data"));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn skip(&mut self, len: usize) -> Result<(), CellError> {
        self.read_bytes(len).map(|_| ())
    }

    fn read_u8(&mut self) -> Result<u8, CellError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_be(&mut self, len: usize) -> Result<u64, CellError> {
        Ok(self
            .read_bytes(len)?
            .iter()
            .fold(0u64, |value, &byte| (value << 8) | byte as u64))
    }
}

fn write_be(target: &mut Vec<u8>, value: u64, len: usize) {
    target.extend_from_slice(&value.to_be_bytes()[8 - len..]);
}

fn byte_len_for(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    ((bits + 7) / 8).max(1)
}

fn crc32c(data: &[u8]) -> u32 {
    const POLY: u32 = 0x82f6_3b78;

    let mut crc = !0u32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellBuilder;

    #[test]
    fn crc32c_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xe3069283);
    }

    #[test]
    fn empty_cell_boc() {
        let boc = serialize_boc_base64(&Cell::empty());
        assert_eq!(boc, "te6cckEBAQEAAgAAAEysuc0=");

        let cell = deserialize_boc_base64(&boc).unwrap();
        assert_eq!(cell, Cell::empty());
    }

    #[test]
    fn tree_survives_serialization() {
        let leaf = CellBuilder::new()
            .store_uint(0x1f, 5)
            .unwrap()
            .finalize()
            .unwrap();
        let middle = CellBuilder::new()
            .store_bytes(b"middle")
            .unwrap()
            .store_reference(leaf.clone())
            .unwrap()
            .finalize()
            .unwrap();
        let root = CellBuilder::new()
            .store_uint(0xf8a7ea5, 32)
            .unwrap()
            .store_reference(middle)
            .unwrap()
            .store_reference(leaf)
            .unwrap()
            .finalize()
            .unwrap();

        let boc = serialize_boc(&root);
        // Shared leaf is stored once
        assert_eq!(boc[6], 3);

        let parsed = deserialize_boc(&boc).unwrap();
        assert_eq!(parsed.hash(), root.hash());
        assert_eq!(parsed.reference(1).unwrap().bit_len(), 5);
    }

    #[test]
    fn corrupted_boc_rejected() {
        let mut boc = serialize_boc(&Cell::empty());
        let last = boc.len() - 1;
        boc[last] ^= 1;
        assert_eq!(
            deserialize_boc(&boc).unwrap_err(),
            CellError::InvalidBoc("crc mismatch")
        );

        assert!(deserialize_boc(&[0xb5, 0xee]).is_err());
        assert!(deserialize_boc_base64("not base64!").is_err());
    }

    /// Single root at index 0, no crc, 1-byte refs and offsets.
    fn raw_boc(flags: u8, cell_count: u8, cells: &[u8]) -> Vec<u8> {
        let mut boc = BOC_GENERIC_TAG.to_be_bytes().to_vec();
        boc.extend_from_slice(&[flags | 1, 1, cell_count, 1, 0, cells.len() as u8, 0]);
        boc.extend_from_slice(cells);
        boc
    }

    #[test]
    fn huge_cell_count_rejected() {
        let mut boc = BOC_GENERIC_TAG.to_be_bytes().to_vec();
        boc.extend_from_slice(&[0x04, 0x01]);
        boc.extend_from_slice(&u32::MAX.to_be_bytes()); // cells
        boc.extend_from_slice(&1u32.to_be_bytes()); // roots
        boc.extend_from_slice(&0u32.to_be_bytes()); // absent
        boc.push(2); // total cells size
        boc.extend_from_slice(&0u32.to_be_bytes()); // root index
        boc.extend_from_slice(&[0, 0]);

        assert_eq!(
            deserialize_boc(&boc).unwrap_err(),
            CellError::InvalidBoc("too many cells")
        );

        boc[4] |= FLAG_HAS_CRC;
        let crc = crc32c(&boc);
        boc.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(
            deserialize_boc(&boc).unwrap_err(),
            CellError::InvalidBoc("too many cells")
        );
    }

    #[test]
    fn index_is_accepted() {
        let cells = [0x01, 0x00, 0x01, 0x00, 0x00];
        let mut boc = BOC_GENERIC_TAG.to_be_bytes().to_vec();
        boc.extend_from_slice(&[FLAG_HAS_INDEX | FLAG_HAS_CRC | 1, 1, 2, 1, 0, 5, 0]);
        // End offsets of each cell
        boc.extend_from_slice(&[3, 5]);
        boc.extend_from_slice(&cells);
        let crc = crc32c(&boc);
        boc.extend_from_slice(&crc.to_le_bytes());

        let root = deserialize_boc(&boc).unwrap();
        let expected = CellBuilder::new()
            .store_reference(Cell::empty())
            .unwrap()
            .finalize()
            .unwrap();
        assert_eq!(root, expected);
        assert_eq!(deserialize_boc(&raw_boc(0, 2, &cells)).unwrap(), expected);
    }

    #[test]
    fn malformed_cells_rejected() {
        let cases: [(u8, &[u8], &str); 6] = [
            (1, &[0x01, 0x00, 0x00], "invalid reference"),
            (2, &[0x01, 0x00, 0x02, 0x00, 0x00], "invalid reference"),
            (1, &[0x08, 0x00], "only ordinary cells are supported"),
            (1, &[0x20, 0x00], "only ordinary cells are supported"),
            (1, &[0x00, 0x01, 0x00], "missing completion tag"),
            (1, &[0x05, 0x00], "too many references"),
        ];

        for (cell_count, cells, error) in cases {
            assert_eq!(
                deserialize_boc(&raw_boc(0, cell_count, cells)).unwrap_err(),
                CellError::InvalidBoc(error),
                "{cells:02x?}"
            );
        }

        // Forward reference from a child to its parent
        let cells = [0x01, 0x00, 0x01, 0x01, 0x00, 0x00];
        assert_eq!(
            deserialize_boc(&raw_boc(0, 2, &cells)).unwrap_err(),
            CellError::InvalidBoc("invalid reference")
        );
    }

    #[test]
    fn deep_chain_rejected() {
        fn chain_boc(cell_count: usize) -> Vec<u8> {
            let mut cells = Vec::new();
            for index in 1..cell_count {
                cells.extend_from_slice(&[0x01, 0x00]);
                cells.extend_from_slice(&(index as u16).to_be_bytes());
            }
            cells.extend_from_slice(&[0x00, 0x00]);

            let mut boc = BOC_GENERIC_TAG.to_be_bytes().to_vec();
            boc.extend_from_slice(&[0x02, 0x02]);
            for value in [cell_count, 1, 0, cells.len(), 0] {
                boc.extend_from_slice(&(value as u16).to_be_bytes());
            }
            boc.extend_from_slice(&cells);
            boc
        }

        let root = deserialize_boc(&chain_boc(MAX_DEPTH as usize + 1)).unwrap();
        assert_eq!(root.depth(), MAX_DEPTH);
        assert_eq!(deserialize_boc(&serialize_boc(&root)).unwrap(), root);

        assert_eq!(
            deserialize_boc(&chain_boc(MAX_DEPTH as usize + 2)).unwrap_err(),
            CellError::InvalidBoc("cell depth overflow")
        );
    }
}
