use super::{get_bit, Cell, CellError, HashBytes, MsgAddress, StdAddr};

/// Read cursor over the data bits and references of a [`Cell`].
#[derive(Clone, Copy)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_offset: u16,
    ref_offset: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_offset: 0,
            ref_offset: 0,
        }
    }

    pub fn remaining_bits(&self) -> u16 {
        self.cell.bit_len() - self.bit_offset
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.references().len() - self.ref_offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        self.ensure_bits(1)?;
        let bit = get_bit(self.cell.data(), self.bit_offset as usize);
        self.bit_offset += 1;
        Ok(bit)
    }

    /// Reads up to 128 bits as an unsigned big-endian integer.
    pub fn load_uint(&mut self, bits: u16) -> Result<u128, CellError> {
        if bits > 128 {
            return Err(CellError::ValueOutOfRange { bits });
        }
        self.ensure_bits(bits)?;

        let data = self.cell.data();
        let start = self.bit_offset as usize;
        let value = (start..start + bits as usize).fold(0u128, |value, index| {
            (value << 1) | get_bit(data, index) as u128
        });

        self.bit_offset += bits;
        Ok(value)
    }

    pub fn load_int(&mut self, bits: u16) -> Result<i128, CellError> {
        let value = self.load_uint(bits)?;
        if bits == 0 {
            return Ok(0);
        }
        let shift = 128 - bits;
        Ok(((value << shift) as i128) >> shift)
    }

    pub fn load_coins(&mut self) -> Result<u128, CellError> {
        let mut peek = *self;
        let byte_len = peek.load_uint(4)? as u16;
        let value = peek.load_uint(byte_len * 8)?;
        if byte_len > 0 && value >> ((byte_len - 1) * 8) == 0 {
            return Err(CellError::NonMinimalCoins);
        }
        *self = peek;
        Ok(value)
    }

    pub fn load_address(&mut self) -> Result<MsgAddress, CellError> {
        let mut peek = *self;
        let address = match peek.load_uint(2)? {
            0b00 => MsgAddress::None,
            0b10 => {
                if peek.load_bit()? {
                    return Err(CellError::InvalidAddress);
                }
                let workchain = peek.load_int(8)? as i8;
                let account = HashBytes(peek.load_array::<32>()?);
                MsgAddress::Std(StdAddr::new(workchain, account))
            }
            _ => return Err(CellError::InvalidAddress),
        };
        *self = peek;
        Ok(address)
    }

    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>, CellError> {
        if len * 8 > self.remaining_bits() as usize {
            return Err(CellError::Underflow);
        }
        (0..len).map(|_| self.load_uint(8).map(|b| b as u8)).collect()
    }

    pub fn load_array<const N: usize>(&mut self) -> Result<[u8; N], CellError> {
        let bytes = self.load_bytes(N)?;
        let mut array = [0; N];
        array.copy_from_slice(&bytes);
        Ok(array)
    }

    pub fn load_reference(&mut self) -> Result<&'a Cell, CellError> {
        let cell = self
            .cell
            .reference(self.ref_offset)
            .ok_or(CellError::Underflow)?;
        self.ref_offset += 1;
        Ok(cell)
    }

    /// Reads `Maybe ^Cell`.
    pub fn load_maybe_reference(&mut self) -> Result<Option<&'a Cell>, CellError> {
        let mut peek = *self;
        let cell = match peek.load_bit()? {
            true => Some(peek.load_reference()?),
            false => None,
        };
        *self = peek;
        Ok(cell)
    }

    fn ensure_bits(&self, bits: u16) -> Result<(), CellError> {
        if bits > self.remaining_bits() {
            Err(CellError::Underflow)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellBuilder, MAX_COINS};

    #[test]
    fn reads_back_written_fields() {
        let addr = StdAddr::new(-1, HashBytes([0xab; 32]));
        let child = CellBuilder::new()
            .store_bytes(b"payload")
            .unwrap()
            .finalize()
            .unwrap();

        let cell = CellBuilder::new()
            .store_uint(0xf8a7ea5, 32)
            .unwrap()
            .store_int(-5, 8)
            .unwrap()
            .store_coins(1_000_000_000)
            .unwrap()
            .store_address(&MsgAddress::None)
            .unwrap()
            .store_address(&addr.into())
            .unwrap()
            .store_maybe_reference(None)
            .unwrap()
            .store_maybe_reference(Some(child.clone()))
            .unwrap()
            .finalize()
            .unwrap();

        let mut slice = cell.as_slice();
        assert_eq!(slice.load_uint(32).unwrap(), 0xf8a7ea5);
        assert_eq!(slice.load_int(8).unwrap(), -5);
        assert_eq!(slice.load_coins().unwrap(), 1_000_000_000);
        assert_eq!(slice.load_address().unwrap(), MsgAddress::None);
        assert_eq!(slice.load_address().unwrap(), MsgAddress::Std(addr));
        assert_eq!(slice.load_maybe_reference().unwrap(), None);
        assert_eq!(slice.load_maybe_reference().unwrap(), Some(&child));
        assert!(slice.is_empty());

        assert_eq!(slice.load_bit(), Err(CellError::Underflow));
        assert_eq!(slice.load_reference(), Err(CellError::Underflow));
    }

    #[test]
    fn coins_encoding_is_injective() {
        let values = [0, 1, 127, 128, 255, 256, 65_535, 65_536, MAX_COINS];
        let mut encodings = Vec::new();
        for value in values {
            let cell = CellBuilder::new()
                .store_coins(value)
                .unwrap()
                .finalize()
                .unwrap();
            assert_eq!(cell.as_slice().load_coins().unwrap(), value);
            encodings.push(cell);
        }

        for (i, a) in encodings.iter().enumerate() {
            for b in &encodings[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn non_minimal_coins_rejected() {
        let cell = CellBuilder::new()
            .store_uint(2, 4)
            .unwrap()
            .store_uint(0x00ff, 16)
            .unwrap()
            .finalize()
            .unwrap();

        let mut slice = cell.as_slice();
        assert_eq!(slice.load_coins(), Err(CellError::NonMinimalCoins));
        assert_eq!(slice.remaining_bits(), 20);
    }

    #[test]
    fn unsupported_address_tags() {
        for tag in [0b01, 0b11] {
            let cell = CellBuilder::new()
                .store_uint(tag, 2)
                .unwrap()
                .finalize()
                .unwrap();
            assert_eq!(
                cell.as_slice().load_address(),
                Err(CellError::InvalidAddress)
            );
        }
    }
}
