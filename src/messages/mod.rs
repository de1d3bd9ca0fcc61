//! Message bodies accepted by the jetton wallet contract.
//!
//! Every body starts with a 32-bit opcode and a 64-bit query id followed by
//! the operation fields in a fixed order. The only exception is the deploy
//! message, which has an empty body.

use crate::cell::{Cell, CellBuilder, CellError, CellSlice, MsgAddress};
use crate::crypto::KeyError;

pub use self::amount::{parse_amount, Tokens, DECIMALS, ONE};
pub use self::permit::{verify_permit, Permit, PermitRequest, PERMIT_FORWARD_FEE};

mod amount;
mod permit;

pub mod opcodes {
    pub const TRANSFER: u32 = 0x0f8a7ea5;
    pub const BURN: u32 = 0x595f07bc;
    pub const WITHDRAW_TONS: u32 = 0x6d8e5e3c;
    pub const WITHDRAW_JETTONS: u32 = 0x768a50b2;
    pub const PERMIT: u32 = 0xf0fd50bb;
    /// Forwarded by permit wraps
    pub const INTERNAL_TRANSFER: u32 = 0x178d4519;
}

/// Body with a fixed opcode, a query id and an ordered set of fields.
pub trait MessageBody: Sized {
    const OPCODE: u32;

    fn query_id(&self) -> u64;

    fn store_fields(&self, builder: &mut CellBuilder) -> Result<(), MessageError>;

    fn load_fields(query_id: u64, slice: &mut CellSlice<'_>) -> Result<Self, MessageError>;

    fn build(&self) -> Result<Cell, MessageError> {
        let mut builder = CellBuilder::new();
        store_header(&mut builder, Self::OPCODE, self.query_id())?;
        self.store_fields(&mut builder)?;
        builder.finalize().field("body")
    }

    fn parse(cell: &Cell) -> Result<Self, MessageError> {
        let mut slice = cell.as_slice();
        let (opcode, query_id) = load_header(&mut slice)?;
        if opcode != Self::OPCODE {
            return Err(MessageError::UnknownOpcode(opcode));
        }
        let body = Self::load_fields(query_id, &mut slice)?;
        ensure_consumed(&slice)?;
        Ok(body)
    }
}

/// ```raw
/// transfer#0f8a7ea5 query_id:uint64 amount:(VarUInteger 16) destination:MsgAddress
///     response_destination:MsgAddress custom_payload:(Maybe ^Cell)
///     forward_ton_amount:(VarUInteger 16) forward_payload:(Maybe ^Cell)
///     = InternalMsgBody;
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Transfer {
    pub query_id: u64,
    pub amount: u128,
    pub destination: MsgAddress,
    pub response_destination: MsgAddress,
    pub custom_payload: Option<Cell>,
    pub forward_ton_amount: u128,
    pub forward_payload: Option<Cell>,
}

impl MessageBody for Transfer {
    const OPCODE: u32 = opcodes::TRANSFER;

    fn query_id(&self) -> u64 {
        self.query_id
    }

    fn store_fields(&self, builder: &mut CellBuilder) -> Result<(), MessageError> {
        builder.store_coins(self.amount).field("amount")?;
        builder.store_address(&self.destination).field("destination")?;
        builder
            .store_address(&self.response_destination)
            .field("response_destination")?;
        builder
            .store_maybe_reference(self.custom_payload.clone())
            .field("custom_payload")?;
        builder
            .store_coins(self.forward_ton_amount)
            .field("forward_ton_amount")?;
        builder
            .store_maybe_reference(self.forward_payload.clone())
            .field("forward_payload")?;
        Ok(())
    }

    fn load_fields(query_id: u64, slice: &mut CellSlice<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            query_id,
            amount: slice.load_coins().field("amount")?,
            destination: slice.load_address().field("destination")?,
            response_destination: slice.load_address().field("response_destination")?,
            custom_payload: slice
                .load_maybe_reference()
                .field("custom_payload")?
                .cloned(),
            forward_ton_amount: slice.load_coins().field("forward_ton_amount")?,
            forward_payload: slice
                .load_maybe_reference()
                .field("forward_payload")?
                .cloned(),
        })
    }
}

/// ```raw
/// burn#595f07bc query_id:uint64 amount:(VarUInteger 16)
///     response_destination:MsgAddress custom_payload:(Maybe ^Cell)
///     = InternalMsgBody;
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Burn {
    pub query_id: u64,
    pub amount: u128,
    pub response_destination: MsgAddress,
    pub custom_payload: Option<Cell>,
}

impl MessageBody for Burn {
    const OPCODE: u32 = opcodes::BURN;

    fn query_id(&self) -> u64 {
        self.query_id
    }

    fn store_fields(&self, builder: &mut CellBuilder) -> Result<(), MessageError> {
        builder.store_coins(self.amount).field("amount")?;
        builder
            .store_address(&self.response_destination)
            .field("response_destination")?;
        builder
            .store_maybe_reference(self.custom_payload.clone())
            .field("custom_payload")?;
        Ok(())
    }

    fn load_fields(query_id: u64, slice: &mut CellSlice<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            query_id,
            amount: slice.load_coins().field("amount")?,
            response_destination: slice.load_address().field("response_destination")?,
            custom_payload: slice
                .load_maybe_reference()
                .field("custom_payload")?
                .cloned(),
        })
    }
}

/// ```raw
/// withdraw_tons#6d8e5e3c query_id:uint64 = InternalMsgBody;
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WithdrawTons {
    pub query_id: u64,
}

impl MessageBody for WithdrawTons {
    const OPCODE: u32 = opcodes::WITHDRAW_TONS;

    fn query_id(&self) -> u64 {
        self.query_id
    }

    fn store_fields(&self, _: &mut CellBuilder) -> Result<(), MessageError> {
        Ok(())
    }

    fn load_fields(query_id: u64, _: &mut CellSlice<'_>) -> Result<Self, MessageError> {
        Ok(Self { query_id })
    }
}

/// ```raw
/// withdraw_jettons#768a50b2 query_id:uint64 wallet:MsgAddress amount:(VarUInteger 16)
///     custom_payload:(Maybe ^Cell) = InternalMsgBody;
/// ```
///
/// The payload is always absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WithdrawJettons {
    pub query_id: u64,
    pub from: MsgAddress,
    pub amount: u128,
}

impl MessageBody for WithdrawJettons {
    const OPCODE: u32 = opcodes::WITHDRAW_JETTONS;

    fn query_id(&self) -> u64 {
        self.query_id
    }

    fn store_fields(&self, builder: &mut CellBuilder) -> Result<(), MessageError> {
        builder.store_address(&self.from).field("from")?;
        builder.store_coins(self.amount).field("amount")?;
        builder.store_maybe_reference(None).field("custom_payload")?;
        Ok(())
    }

    fn load_fields(query_id: u64, slice: &mut CellSlice<'_>) -> Result<Self, MessageError> {
        let from = slice.load_address().field("from")?;
        let amount = slice.load_coins().field("amount")?;
        if slice.load_maybe_reference().field("custom_payload")?.is_some() {
            return Err(MessageError::UnexpectedPayload);
        }
        Ok(Self {
            query_id,
            from,
            amount,
        })
    }
}

/// Any message accepted by the jetton wallet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JettonMessage {
    Deploy,
    Transfer(Transfer),
    Burn(Burn),
    WithdrawTons(WithdrawTons),
    WithdrawJettons(WithdrawJettons),
    Permit(Permit),
}

impl JettonMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Transfer(_) => "transfer",
            Self::Burn(_) => "burn",
            Self::WithdrawTons(_) => "withdraw_tons",
            Self::WithdrawJettons(_) => "withdraw_jettons",
            Self::Permit(_) => "permit",
        }
    }

    /// Deploy message has no opcode.
    pub fn opcode(&self) -> Option<u32> {
        Some(match self {
            Self::Deploy => return None,
            Self::Transfer(_) => Transfer::OPCODE,
            Self::Burn(_) => Burn::OPCODE,
            Self::WithdrawTons(_) => WithdrawTons::OPCODE,
            Self::WithdrawJettons(_) => WithdrawJettons::OPCODE,
            Self::Permit(_) => Permit::OPCODE,
        })
    }

    pub fn build(&self) -> Result<Cell, MessageError> {
        let cell = match self {
            Self::Deploy => Cell::empty(),
            Self::Transfer(body) => body.build()?,
            Self::Burn(body) => body.build()?,
            Self::WithdrawTons(body) => body.build()?,
            Self::WithdrawJettons(body) => body.build()?,
            Self::Permit(body) => body.build()?,
        };

        tracing::debug!(
            message = self.name(),
            hash = %cell.hash(),
            bits = cell.bit_len(),
            "built message body"
        );
        Ok(cell)
    }

    pub fn parse(cell: &Cell) -> Result<Self, MessageError> {
        if cell.is_empty() {
            return Ok(Self::Deploy);
        }

        let mut slice = cell.as_slice();
        let (opcode, query_id) = load_header(&mut slice)?;
        let message = match opcode {
            Transfer::OPCODE => Self::Transfer(Transfer::load_fields(query_id, &mut slice)?),
            Burn::OPCODE => Self::Burn(Burn::load_fields(query_id, &mut slice)?),
            WithdrawTons::OPCODE => {
                Self::WithdrawTons(WithdrawTons::load_fields(query_id, &mut slice)?)
            }
            WithdrawJettons::OPCODE => {
                Self::WithdrawJettons(WithdrawJettons::load_fields(query_id, &mut slice)?)
            }
            Permit::OPCODE => Self::Permit(Permit::load_fields(query_id, &mut slice)?),
            opcode => return Err(MessageError::UnknownOpcode(opcode)),
        };
        ensure_consumed(&slice)?;
        Ok(message)
    }
}

macro_rules! impl_from_body {
    ($($ty:ident),*$(,)?) => {
        $(impl From<$ty> for JettonMessage {
            fn from(body: $ty) -> Self {
                Self::$ty(body)
            }
        })*
    };
}

impl_from_body![Transfer, Burn, WithdrawTons, WithdrawJettons, Permit];

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum MessageError {
    #[error("invalid field `{field}`")]
    Field {
        field: &'static str,
        #[source]
        source: CellError,
    },
    #[error("invalid amount {0}")]
    InvalidAmount(String),
    #[error("permit nonce {0} does not fit into 16 bits")]
    NonceOutOfRange(u64),
    #[error("invalid key material")]
    InvalidKey(#[from] KeyError),
    #[error("unknown opcode {0:#010x}")]
    UnknownOpcode(u32),
    #[error("unexpected data after message fields")]
    TrailingData,
    #[error("unexpected payload")]
    UnexpectedPayload,
    #[error("permit forward messages are not canonical")]
    NonCanonicalPermit,
    #[error("invalid permit signature")]
    InvalidSignature,
}

pub(crate) trait FieldContext<T> {
    fn field(self, field: &'static str) -> Result<T, MessageError>;
}

impl<T> FieldContext<T> for Result<T, CellError> {
    fn field(self, field: &'static str) -> Result<T, MessageError> {
        self.map_err(|source| MessageError::Field { field, source })
    }
}

fn store_header(builder: &mut CellBuilder, opcode: u32, query_id: u64) -> Result<(), MessageError> {
    builder.store_uint(opcode as u128, 32).field("op")?;
    builder.store_uint(query_id as u128, 64).field("query_id")?;
    Ok(())
}

fn load_header(slice: &mut CellSlice<'_>) -> Result<(u32, u64), MessageError> {
    let opcode = slice.load_uint(32).field("op")? as u32;
    let query_id = slice.load_uint(64).field("query_id")? as u64;
    Ok((opcode, query_id))
}

fn ensure_consumed(slice: &CellSlice<'_>) -> Result<(), MessageError> {
    if slice.is_empty() {
        Ok(())
    } else {
        Err(MessageError::TrailingData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{HashBytes, StdAddr, MAX_COINS};

    fn addr(byte: u8) -> StdAddr {
        StdAddr::new(0, HashBytes([byte; 32]))
    }

    fn bits_of(cell: &Cell) -> String {
        (0..cell.bit_len())
            .map(|i| if cell.bit(i).unwrap() { '1' } else { '0' })
            .collect()
    }

    fn address_bits(addr: &StdAddr) -> String {
        let cell = CellBuilder::new()
            .store_address(&(*addr).into())
            .unwrap()
            .finalize()
            .unwrap();
        bits_of(&cell)
    }

    fn payload(data: &[u8]) -> Cell {
        CellBuilder::new()
            .store_bytes(data)
            .unwrap()
            .finalize()
            .unwrap()
    }

    #[test]
    fn transfer_layout() {
        let a = addr(0x11);
        let cell = JettonMessage::from(Transfer {
            query_id: 0,
            amount: 10_000_000_000,
            destination: a.into(),
            response_destination: a.into(),
            custom_payload: None,
            forward_ton_amount: 0,
            forward_payload: None,
        })
        .build()
        .unwrap();

        let expected = [
            format!("{:032b}", 0x0f8a7ea5u32),
            "0".repeat(64),
            // 10_000_000_000 = 0x02540be400, 5 bytes
            format!("0101{:040b}", 10_000_000_000u64),
            address_bits(&a),
            address_bits(&a),
            "0".to_owned(),
            "0000".to_owned(),
            "0".to_owned(),
        ]
        .concat();

        assert_eq!(bits_of(&cell), expected);
        assert!(cell.references().is_empty());
        assert_eq!(cell.bit_len(), 32 + 64 + 44 + 2 * 267 + 1 + 4 + 1);
    }

    #[test]
    fn transfer_matches_reference_boc() {
        const BOC: &str = "te6cckEBAgEAYAABrA+KfqUAAAAAAAAAAFAlQL5ACAAiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIwAIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIIDAQAKaGVsbG9dbeeI";
        const HASH: &str = "4149800f0e633388486d2077dba2c51a40b61ab1b27e3fcc6619deff2546286b";

        let cell = JettonMessage::from(Transfer {
            query_id: 0,
            amount: 10_000_000_000,
            destination: addr(0x11).into(),
            response_destination: addr(0x22).into(),
            custom_payload: None,
            forward_ton_amount: 1,
            forward_payload: Some(payload(b"hello")),
        })
        .build()
        .unwrap();

        assert_eq!(cell.hash().to_string(), HASH);
        assert_eq!(crate::cell::serialize_boc_base64(&cell), BOC);

        let parsed = crate::cell::deserialize_boc_base64(BOC).unwrap();
        assert_eq!(parsed.hash().to_string(), HASH);
        assert!(matches!(
            JettonMessage::parse(&parsed).unwrap(),
            JettonMessage::Transfer(Transfer {
                forward_ton_amount: 1,
                ..
            })
        ));
    }

    #[test]
    fn withdraw_tons_is_header_only() {
        let cell = WithdrawTons::default().build().unwrap();
        assert_eq!(cell.bit_len(), 96);
        assert!(cell.references().is_empty());
        assert_eq!(&cell.data()[..4], &0x6d8e5e3cu32.to_be_bytes());
        assert!(cell.data()[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn deploy_is_empty() {
        let cell = JettonMessage::Deploy.build().unwrap();
        assert_eq!(cell, Cell::empty());
        assert_eq!(JettonMessage::parse(&cell).unwrap(), JettonMessage::Deploy);
        assert_eq!(JettonMessage::Deploy.opcode(), None);
    }

    #[test]
    fn messages_round_trip() {
        let messages: Vec<JettonMessage> = vec![
            Transfer {
                query_id: 123,
                amount: 500_000 * ONE,
                destination: addr(1).into(),
                response_destination: MsgAddress::None,
                custom_payload: Some(Cell::empty()),
                forward_ton_amount: 20_000_000,
                forward_payload: Some(payload(b"comment")),
            }
            .into(),
            Burn {
                query_id: u64::MAX,
                amount: MAX_COINS,
                response_destination: StdAddr::new(-1, HashBytes([2; 32])).into(),
                custom_payload: None,
            }
            .into(),
            WithdrawTons { query_id: 7 }.into(),
            WithdrawJettons {
                query_id: 0,
                from: addr(3).into(),
                amount: 1,
            }
            .into(),
        ];

        for message in messages {
            let cell = message.build().unwrap();
            let parsed = JettonMessage::parse(&cell).unwrap();
            assert_eq!(parsed, message);
            assert_eq!(parsed.build().unwrap().hash(), cell.hash());
        }
    }

    #[test]
    fn field_errors_are_named() {
        let err = Transfer {
            amount: MAX_COINS + 1,
            ..Default::default()
        }
        .build()
        .unwrap_err();
        assert_eq!(
            err,
            MessageError::Field {
                field: "amount",
                source: CellError::CoinsOutOfRange
            }
        );

        let err = Transfer {
            forward_ton_amount: u128::MAX,
            ..Default::default()
        }
        .build()
        .unwrap_err();
        assert!(matches!(
            err,
            MessageError::Field {
                field: "forward_ton_amount",
                ..
            }
        ));
    }

    #[test]
    fn parse_rejects_garbage() {
        let unknown = CellBuilder::new()
            .store_uint(0xdeadbeef, 32)
            .unwrap()
            .store_uint(0, 64)
            .unwrap()
            .finalize()
            .unwrap();
        assert_eq!(
            JettonMessage::parse(&unknown),
            Err(MessageError::UnknownOpcode(0xdeadbeef))
        );

        let trailing = CellBuilder::new()
            .store_uint(opcodes::WITHDRAW_TONS as u128, 32)
            .unwrap()
            .store_uint(0, 64)
            .unwrap()
            .store_bit(true)
            .unwrap()
            .finalize()
            .unwrap();
        assert_eq!(
            JettonMessage::parse(&trailing),
            Err(MessageError::TrailingData)
        );

        let truncated = payload(&[0x0f, 0x8a]);
        assert!(matches!(
            JettonMessage::parse(&truncated),
            Err(MessageError::Field { field: "op", .. })
        ));

        let burn = Burn::default().build().unwrap();
        assert_eq!(
            Transfer::parse(&burn),
            Err(MessageError::UnknownOpcode(opcodes::BURN))
        );
    }
}
