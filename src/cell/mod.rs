use std::str::FromStr;
use std::sync::Arc;

use sha2::Digest;

pub use self::address::{AddressParseError, MsgAddress, StdAddr};
pub use self::boc::{deserialize_boc, deserialize_boc_base64, serialize_boc, serialize_boc_base64};
pub use self::slice::CellSlice;

mod address;
mod boc;
mod slice;

/// Max number of data bits in a single cell
pub const MAX_BIT_LEN: u16 = 1023;
/// Max number of references in a single cell
pub const MAX_REF_COUNT: usize = 4;
/// Max depth of a cell tree
pub const MAX_DEPTH: u16 = 1024;
/// Upper bound for `VarUInteger 16`
pub const MAX_COINS: u128 = (1 << 120) - 1;

const MAX_DATA_BYTES: usize = 128;

#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HashBytes(pub [u8; 32]);

impl HashBytes {
    pub const ZERO: Self = Self([0; 32]);

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<[u8; 32]> for HashBytes {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for HashBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::fmt::Debug for HashBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl FromStr for HashBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Immutable tree node with up to 1023 data bits and up to 4 references.
///
/// Cells are content-addressed: equality and hashing use the representation hash,
/// which is computed once when the cell is finalized.
#[derive(Clone)]
pub struct Cell(Arc<CellInner>);

struct CellInner {
    data: Box<[u8]>,
    bit_len: u16,
    references: Vec<Cell>,
    depth: u16,
    hash: HashBytes,
}

impl Cell {
    pub fn empty() -> Self {
        Self::from_parts(&[], 0, Vec::new())
    }

    /// `data` must contain at least `bit_len` bits, all bits after it are cleared.
    fn from_parts(data: &[u8], bit_len: u16, references: Vec<Cell>) -> Self {
        debug_assert!(bit_len <= MAX_BIT_LEN && references.len() <= MAX_REF_COUNT);
        debug_assert!(references.iter().all(|cell| cell.depth() < MAX_DEPTH));

        let byte_len = (bit_len as usize + 7) / 8;
        let mut data = data[..byte_len].to_vec().into_boxed_slice();
        if bit_len % 8 != 0 {
            data[byte_len - 1] &= 0xff << (8 - bit_len % 8);
        }

        let depth = references
            .iter()
            .map(|cell| cell.depth() + 1)
            .max()
            .unwrap_or_default();

        let mut hasher = sha2::Sha256::new();
        hasher.update(descriptors(bit_len, references.len()));
        hasher.update(augmented_data(&data, bit_len));
        for child in &references {
            hasher.update(child.depth().to_be_bytes());
        }
        for child in &references {
            hasher.update(child.hash().as_slice());
        }

        let mut hash = HashBytes::ZERO;
        hash.0.copy_from_slice(&hasher.finalize());

        Self(Arc::new(CellInner {
            data,
            bit_len,
            references,
            depth,
            hash,
        }))
    }

    /// Data bytes, the last byte is zero-padded.
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    pub fn bit_len(&self) -> u16 {
        self.0.bit_len
    }

    pub fn references(&self) -> &[Cell] {
        &self.0.references
    }

    pub fn reference(&self, index: usize) -> Option<&Cell> {
        self.0.references.get(index)
    }

    pub fn depth(&self) -> u16 {
        self.0.depth
    }

    pub fn hash(&self) -> &HashBytes {
        &self.0.hash
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len() == 0 && self.references().is_empty()
    }

    pub fn as_slice(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }

    /// Returns the bit at the specified position.
    pub fn bit(&self, index: u16) -> Option<bool> {
        (index < self.bit_len()).then(|| get_bit(self.data(), index as usize))
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

impl Eq for Cell {}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len())
            .field("data", &hex::encode(self.data()))
            .field("references", &self.references())
            .finish()
    }
}

/// Ordered bit writer which produces a single [`Cell`].
///
/// Every write either succeeds completely or leaves the builder untouched.
/// After [`CellBuilder::finalize`] all writes fail with [`CellError::AlreadyFinalized`].
#[derive(Debug)]
pub struct CellBuilder {
    data: [u8; MAX_DATA_BYTES],
    bit_len: u16,
    references: Vec<Cell>,
    finalized: bool,
}

impl Default for CellBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CellBuilder {
    pub fn new() -> Self {
        Self {
            data: [0; MAX_DATA_BYTES],
            bit_len: 0,
            references: Vec::with_capacity(MAX_REF_COUNT),
            finalized: false,
        }
    }

    pub fn bit_len(&self) -> u16 {
        self.bit_len
    }

    pub fn remaining_bits(&self) -> u16 {
        MAX_BIT_LEN - self.bit_len
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.ensure_capacity(1)?;
        self.fill_unchecked(bit, 1);
        Ok(self)
    }

    /// Writes `value` as `bits` bits, most significant bit first.
    pub fn store_uint(&mut self, value: u128, bits: u16) -> Result<&mut Self, CellError> {
        self.ensure_not_finalized()?;
        if bits < 128 && value >> bits != 0 {
            return Err(CellError::ValueOutOfRange { bits });
        }
        self.ensure_capacity(bits as usize)?;

        if bits > 128 {
            self.fill_unchecked(false, bits - 128);
        }
        self.store_u128_unchecked(value, bits.min(128));
        Ok(self)
    }

    /// Writes `value` in two's complement form as `bits` bits.
    pub fn store_int(&mut self, value: i128, bits: u16) -> Result<&mut Self, CellError> {
        self.ensure_not_finalized()?;
        let fits = match bits {
            0 => value == 0,
            1..=127 => {
                let bound = 1i128 << (bits - 1);
                (-bound..bound).contains(&value)
            }
            _ => true,
        };
        if !fits {
            return Err(CellError::ValueOutOfRange { bits });
        }
        self.ensure_capacity(bits as usize)?;

        if bits > 128 {
            self.fill_unchecked(value < 0, bits - 128);
        }
        let width = bits.min(128);
        let mask = match width {
            128 => u128::MAX,
            width => (1u128 << width) - 1,
        };
        self.store_u128_unchecked(value as u128 & mask, width);
        Ok(self)
    }

    /// Writes a `VarUInteger 16`: 4-bit byte length followed by the minimal
    /// big-endian representation. Zero is stored as a single zero length.
    pub fn store_coins(&mut self, value: u128) -> Result<&mut Self, CellError> {
        self.ensure_not_finalized()?;
        if value > MAX_COINS {
            return Err(CellError::CoinsOutOfRange);
        }

        let byte_len = (128 - value.leading_zeros() as u16 + 7) / 8;
        self.ensure_capacity(4 + byte_len as usize * 8)?;

        self.store_u128_unchecked(byte_len as u128, 4);
        self.store_u128_unchecked(value, byte_len * 8);
        Ok(self)
    }

    pub fn store_address(&mut self, address: &MsgAddress) -> Result<&mut Self, CellError> {
        match address {
            MsgAddress::None => self.store_uint(0b00, 2),
            MsgAddress::Std(addr) => {
                self.ensure_capacity(StdAddr::BIT_LEN as usize)?;
                // addr_std$10 anycast:(Maybe Anycast)
                self.store_u128_unchecked(0b100, 3);
                self.store_u128_unchecked(addr.workchain as u8 as u128, 8);
                self.store_raw_unchecked(addr.account.as_slice(), 256);
                Ok(self)
            }
        }
    }

    /// Writes bytes verbatim, 8 bits per byte.
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        self.ensure_capacity(bytes.len() * 8)?;
        self.store_raw(bytes, bytes.len() as u16 * 8)
    }

    /// Writes the first `bits` bits of `data`.
    pub fn store_raw(&mut self, data: &[u8], bits: u16) -> Result<&mut Self, CellError> {
        if data.len() * 8 < bits as usize {
            return Err(CellError::Underflow);
        }
        self.ensure_capacity(bits as usize)?;
        self.store_raw_unchecked(data, bits);
        Ok(self)
    }

    pub fn store_reference(&mut self, cell: Cell) -> Result<&mut Self, CellError> {
        self.ensure_not_finalized()?;
        self.ensure_reference(&cell)?;
        self.references.push(cell);
        Ok(self)
    }

    /// Writes `Maybe ^Cell`: a presence bit and an optional reference.
    pub fn store_maybe_reference(&mut self, cell: Option<Cell>) -> Result<&mut Self, CellError> {
        match cell {
            Some(cell) => {
                self.ensure_capacity(1)?;
                self.ensure_reference(&cell)?;
                self.fill_unchecked(true, 1);
                self.references.push(cell);
                Ok(self)
            }
            None => self.store_bit(false),
        }
    }

    /// Produces an immutable cell. The builder is unusable afterwards.
    pub fn finalize(&mut self) -> Result<Cell, CellError> {
        self.ensure_not_finalized()?;
        self.finalized = true;

        let references = std::mem::take(&mut self.references);
        let cell = Cell::from_parts(&self.data, self.bit_len, references);

        self.data = [0; MAX_DATA_BYTES];
        self.bit_len = 0;
        Ok(cell)
    }

    pub fn build(mut self) -> Result<Cell, CellError> {
        self.finalize()
    }

    fn ensure_not_finalized(&self) -> Result<(), CellError> {
        if self.finalized {
            Err(CellError::AlreadyFinalized)
        } else {
            Ok(())
        }
    }

    fn ensure_reference(&self, cell: &Cell) -> Result<(), CellError> {
        if self.references.len() >= MAX_REF_COUNT {
            return Err(CellError::ReferencesOverflow);
        }
        if cell.depth() >= MAX_DEPTH {
            return Err(CellError::DepthOverflow);
        }
        Ok(())
    }

    fn ensure_capacity(&self, bits: usize) -> Result<(), CellError> {
        self.ensure_not_finalized()?;
        let remaining = self.remaining_bits() as usize;
        if bits > remaining {
            return Err(CellError::DataOverflow {
                requested: bits,
                remaining,
            });
        }
        Ok(())
    }

    fn store_u128_unchecked(&mut self, value: u128, bits: u16) {
        if bits == 0 {
            return;
        }
        let bytes = (value << (128 - bits)).to_be_bytes();
        self.store_raw_unchecked(&bytes, bits);
    }

    fn fill_unchecked(&mut self, bit: bool, bits: u16) {
        if bit {
            for offset in 0..bits as usize {
                set_bit(&mut self.data, self.bit_len as usize + offset);
            }
        }
        self.bit_len += bits;
    }

    fn store_raw_unchecked(&mut self, data: &[u8], bits: u16) {
        for offset in 0..bits as usize {
            if get_bit(data, offset) {
                set_bit(&mut self.data, self.bit_len as usize + offset);
            }
        }
        self.bit_len += bits;
    }
}

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum CellError {
    #[error("value does not fit into {bits} bits")]
    ValueOutOfRange { bits: u16 },
    #[error("coins amount exceeds 2^120 - 1")]
    CoinsOutOfRange,
    #[error("cell data overflow ({requested} bits requested, {remaining} remaining)")]
    DataOverflow { requested: usize, remaining: usize },
    #[error("cell references overflow")]
    ReferencesOverflow,
    #[error("cell depth exceeds {}", MAX_DEPTH)]
    DepthOverflow,
    #[error("cell builder already finalized")]
    AlreadyFinalized,
    #[error("cell underflow")]
    Underflow,
    #[error("unsupported address")]
    InvalidAddress,
    #[error("non-minimal coins encoding")]
    NonMinimalCoins,
    #[error("invalid bag of cells: {0}")]
    InvalidBoc(&'static str),
}

fn descriptors(bit_len: u16, ref_count: usize) -> [u8; 2] {
    let d1 = ref_count as u8;
    let d2 = (bit_len / 8 + (bit_len + 7) / 8) as u8;
    [d1, d2]
}

/// Data bytes with the completion tag for incomplete bytes.
fn augmented_data(data: &[u8], bit_len: u16) -> Vec<u8> {
    let byte_len = (bit_len as usize + 7) / 8;
    let mut result = data[..byte_len].to_vec();
    if bit_len % 8 != 0 {
        result[byte_len - 1] |= 0x80 >> (bit_len % 8);
    }
    result
}

#[inline]
fn get_bit(data: &[u8], index: usize) -> bool {
    data[index / 8] & (0x80 >> (index % 8)) != 0
}

#[inline]
fn set_bit(data: &mut [u8], index: usize) {
    data[index / 8] |= 0x80 >> (index % 8);
}
