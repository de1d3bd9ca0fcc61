use ed25519_dalek::{Keypair, PublicKey};

use super::{
    ensure_consumed, load_header, opcodes, store_header, FieldContext, MessageBody, MessageError,
};
use crate::cell::{Cell, CellBuilder, CellError, CellSlice, MsgAddress, StdAddr};
use crate::crypto;

/// Forward amount attached to both permit sub-messages (0.1 of the native currency).
pub const PERMIT_FORWARD_FEE: u128 = 100_000_000;

/// Unsigned permit parameters.
///
/// The permit forwards two internal transfers: `amount` to `to` and
/// `to_burn` to `treasury`. The signature commits to both of them and to the nonce.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermitRequest {
    pub query_id: u64,
    pub amount: u128,
    pub to: StdAddr,
    pub to_burn: u128,
    pub treasury: StdAddr,
    pub nonce: u64,
}

impl PermitRequest {
    pub fn nonce(&self) -> Result<u16, MessageError> {
        u16::try_from(self.nonce).map_err(|_| MessageError::NonceOutOfRange(self.nonce))
    }

    /// Cell whose hash is signed. It is never sent.
    pub fn commitment(&self) -> Result<Cell, MessageError> {
        let nonce = self.nonce()?;
        build_commitment(self.amount, &self.to, self.to_burn, &self.treasury, nonce)
    }

    /// Signs the request with raw key material (see [`crypto::keypair_from_bytes`]).
    pub fn sign(&self, key: &[u8]) -> Result<Permit, MessageError> {
        self.nonce()?;
        let keypair = crypto::keypair_from_bytes(key)?;
        self.sign_with(&keypair)
    }

    pub fn sign_with(&self, keypair: &Keypair) -> Result<Permit, MessageError> {
        let nonce = self.nonce()?;
        let commitment = self.commitment()?;
        let signature = crypto::sign_hash(commitment.hash(), keypair);

        tracing::debug!(
            commitment = %commitment.hash(),
            nonce,
            "signed permit commitment"
        );

        Ok(Permit {
            query_id: self.query_id,
            amount: self.amount,
            to: self.to,
            to_burn: self.to_burn,
            treasury: self.treasury,
            nonce,
            signature,
        })
    }
}

/// ```raw
/// permit#f0fd50bb query_id:uint64 signature:bits512
///     to:^ForwardMsg treasury:^ForwardMsg nonce:uint16 = InternalMsgBody;
/// forward_msg$_ destination:MsgAddress forward_amount:(VarUInteger 16)
///     body:^InternalTransfer = ForwardMsg;
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Permit {
    pub query_id: u64,
    pub amount: u128,
    pub to: StdAddr,
    pub to_burn: u128,
    pub treasury: StdAddr,
    pub nonce: u16,
    pub signature: [u8; 64],
}

impl Permit {
    pub fn commitment(&self) -> Result<Cell, MessageError> {
        build_commitment(
            self.amount,
            &self.to,
            self.to_burn,
            &self.treasury,
            self.nonce,
        )
    }

    pub fn verify(&self, public: &PublicKey) -> Result<(), MessageError> {
        let commitment = self.commitment()?;
        match crypto::verify_hash(commitment.hash(), &self.signature, public) {
            true => Ok(()),
            false => Err(MessageError::InvalidSignature),
        }
    }
}

impl MessageBody for Permit {
    const OPCODE: u32 = opcodes::PERMIT;

    fn query_id(&self) -> u64 {
        self.query_id
    }

    fn store_fields(&self, builder: &mut CellBuilder) -> Result<(), MessageError> {
        // Rebuilt from the same inputs as the signed commitment
        let [to_msg, treasury_msg] =
            forward_messages(self.amount, &self.to, self.to_burn, &self.treasury)?;

        builder.store_bytes(&self.signature).field("signature")?;
        builder.store_reference(to_msg).field("to")?;
        builder.store_reference(treasury_msg).field("treasury")?;
        builder.store_uint(self.nonce as u128, 16).field("nonce")?;
        Ok(())
    }

    fn load_fields(query_id: u64, slice: &mut CellSlice<'_>) -> Result<Self, MessageError> {
        let signature = slice.load_array::<64>().field("signature")?;
        let to_msg = slice.load_reference().field("to")?;
        let treasury_msg = slice.load_reference().field("treasury")?;
        let nonce = slice.load_uint(16).field("nonce")? as u16;

        let (to, amount) = parse_forward_message(to_msg, "to")?;
        let (treasury, to_burn) = parse_forward_message(treasury_msg, "treasury")?;

        let [expected_to_msg, expected_treasury_msg] =
            forward_messages(amount, &to, to_burn, &treasury)?;
        if &expected_to_msg != to_msg || &expected_treasury_msg != treasury_msg {
            return Err(MessageError::NonCanonicalPermit);
        }

        Ok(Self {
            query_id,
            amount,
            to,
            to_burn,
            treasury,
            nonce,
            signature,
        })
    }
}

/// Verifies a permit body as the wallet contract does: the commitment is
/// rebuilt from the transmitted forward messages and nonce.
pub fn verify_permit(body: &Cell, public: &PublicKey) -> Result<(), MessageError> {
    let mut slice = body.as_slice();
    let (opcode, _) = load_header(&mut slice)?;
    if opcode != opcodes::PERMIT {
        return Err(MessageError::UnknownOpcode(opcode));
    }

    let signature = slice.load_array::<64>().field("signature")?;
    let to_msg = slice.load_reference().field("to")?.clone();
    let treasury_msg = slice.load_reference().field("treasury")?.clone();
    let nonce = slice.load_uint(16).field("nonce")? as u16;
    ensure_consumed(&slice)?;

    let commitment = commitment_cell(to_msg, treasury_msg, nonce)?;
    match crypto::verify_hash(commitment.hash(), &signature, public) {
        true => Ok(()),
        false => Err(MessageError::InvalidSignature),
    }
}

fn build_commitment(
    amount: u128,
    to: &StdAddr,
    to_burn: u128,
    treasury: &StdAddr,
    nonce: u16,
) -> Result<Cell, MessageError> {
    let [to_msg, treasury_msg] = forward_messages(amount, to, to_burn, treasury)?;
    commitment_cell(to_msg, treasury_msg, nonce)
}

fn commitment_cell(to_msg: Cell, treasury_msg: Cell, nonce: u16) -> Result<Cell, MessageError> {
    let mut builder = CellBuilder::new();
    builder.store_reference(to_msg).field("to")?;
    builder.store_reference(treasury_msg).field("treasury")?;
    builder.store_uint(nonce as u128, 16).field("nonce")?;
    builder.finalize().field("commitment")
}

fn forward_messages(
    amount: u128,
    to: &StdAddr,
    to_burn: u128,
    treasury: &StdAddr,
) -> Result<[Cell; 2], MessageError> {
    let to_msg = forward_message(to, internal_transfer(amount, to, "amount")?)?;
    let treasury_msg = forward_message(treasury, internal_transfer(to_burn, treasury, "to_burn")?)?;
    Ok([to_msg, treasury_msg])
}

fn forward_message(destination: &StdAddr, body: Cell) -> Result<Cell, MessageError> {
    let mut builder = CellBuilder::new();
    builder
        .store_address(&MsgAddress::Std(*destination))
        .field("destination")?;
    builder
        .store_coins(PERMIT_FORWARD_FEE)
        .field("forward_amount")?;
    builder.store_reference(body).field("forward_body")?;
    builder.finalize().field("forward_message")
}

fn internal_transfer(
    amount: u128,
    response: &StdAddr,
    amount_field: &'static str,
) -> Result<Cell, MessageError> {
    let mut builder = CellBuilder::new();
    store_header(&mut builder, opcodes::INTERNAL_TRANSFER, 0)?;
    builder.store_coins(amount).field(amount_field)?;
    builder.store_address(&MsgAddress::None).field("from")?;
    builder
        .store_address(&MsgAddress::Std(*response))
        .field("response_destination")?;
    builder
        .store_coins(PERMIT_FORWARD_FEE)
        .field("forward_ton_amount")?;
    builder
        .store_maybe_reference(None)
        .field("forward_payload")?;
    builder.finalize().field("internal_transfer")
}

/// Reads the destination and the transferred amount, the rest is checked
/// by comparing with a rebuilt message.
fn parse_forward_message(
    cell: &Cell,
    field: &'static str,
) -> Result<(StdAddr, u128), MessageError> {
    let mut slice = cell.as_slice();
    let destination = slice
        .load_address()
        .and_then(|addr| addr.as_std().copied().ok_or(CellError::InvalidAddress))
        .field(field)?;

    let body = slice.load_coins().and_then(|_| slice.load_reference()).field(field)?;

    let mut slice = body.as_slice();
    let (opcode, _) = load_header(&mut slice)?;
    if opcode != opcodes::INTERNAL_TRANSFER {
        return Err(MessageError::NonCanonicalPermit);
    }
    let amount = slice.load_coins().field(field)?;

    Ok((destination, amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::HashBytes;
    use crate::crypto::KeyError;
    use crate::messages::JettonMessage;

    const SECRET: [u8; 32] = [0x5a; 32];

    fn request() -> PermitRequest {
        PermitRequest {
            query_id: 0,
            amount: 1_000_000_000,
            to: StdAddr::new(0, HashBytes([0x11; 32])),
            to_burn: 250_000_000,
            treasury: StdAddr::new(0, HashBytes([0x22; 32])),
            nonce: 3,
        }
    }

    fn keypair() -> Keypair {
        crypto::keypair_from_bytes(&SECRET).unwrap()
    }

    fn rebuild(cell: &Cell, flip: Option<u16>, replace: Option<(usize, Cell)>) -> Cell {
        let mut builder = CellBuilder::new();
        for i in 0..cell.bit_len() {
            let bit = cell.bit(i).unwrap();
            builder.store_bit(bit ^ (flip == Some(i))).unwrap();
        }
        for (i, child) in cell.references().iter().enumerate() {
            let child = match &replace {
                Some((index, new)) if *index == i => new.clone(),
                _ => child.clone(),
            };
            builder.store_reference(child).unwrap();
        }
        builder.finalize().unwrap()
    }

    #[test]
    fn permit_layout() {
        let request = request();
        let permit = request.sign(&SECRET).unwrap();
        let body = permit.build().unwrap();

        assert_eq!(body.bit_len(), 32 + 64 + 512 + 16);
        assert_eq!(body.references().len(), 2);

        let mut slice = body.as_slice();
        assert_eq!(slice.load_uint(32).unwrap(), 0xf0fd50bb);
        assert_eq!(slice.load_uint(64).unwrap(), 0);
        assert_eq!(slice.load_array::<64>().unwrap(), permit.signature);
        assert_eq!(slice.load_uint(16).unwrap(), 3);

        // The embedded forward messages are exactly the signed ones
        let commitment = request.commitment().unwrap();
        assert_eq!(commitment.references(), body.references());
        assert_eq!(commitment.bit_len(), 16);

        let wrap = &body.references()[0];
        let mut slice = wrap.as_slice();
        assert_eq!(slice.load_address().unwrap(), MsgAddress::Std(request.to));
        assert_eq!(slice.load_coins().unwrap(), PERMIT_FORWARD_FEE);
        let mint = slice.load_reference().unwrap();
        assert!(slice.is_empty());

        let mut slice = mint.as_slice();
        assert_eq!(slice.load_uint(32).unwrap(), 0x178d4519);
        assert_eq!(slice.load_uint(64).unwrap(), 0);
        assert_eq!(slice.load_coins().unwrap(), request.amount);
        assert_eq!(slice.load_address().unwrap(), MsgAddress::None);
        assert_eq!(slice.load_address().unwrap(), MsgAddress::Std(request.to));
        assert_eq!(slice.load_coins().unwrap(), PERMIT_FORWARD_FEE);
        assert_eq!(slice.load_maybe_reference().unwrap(), None);
        assert!(slice.is_empty());
    }

    #[test]
    fn signature_is_deterministic() {
        let a = request().sign(&SECRET).unwrap();
        let b = request().sign_with(&keypair()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.build().unwrap(), b.build().unwrap());

        let other = PermitRequest {
            nonce: 4,
            ..request()
        }
        .sign(&SECRET)
        .unwrap();
        assert_ne!(a.signature, other.signature);
    }

    #[test]
    fn signature_verifies() {
        let permit = request().sign(&SECRET).unwrap();
        let body = permit.build().unwrap();
        let public = keypair().public;

        verify_permit(&body, &public).unwrap();
        permit.verify(&public).unwrap();

        let stranger = crypto::keypair_from_bytes(&[0x01; 32]).unwrap().public;
        assert_eq!(
            verify_permit(&body, &stranger),
            Err(MessageError::InvalidSignature)
        );
    }

    #[test]
    fn tampered_forward_messages_fail_verification() {
        let body = request().sign(&SECRET).unwrap().build().unwrap();
        let public = keypair().public;

        for ref_index in 0..2 {
            let wrap = &body.references()[ref_index];
            let mint = &wrap.references()[0];

            for bit in 0..mint.bit_len() {
                let mint = rebuild(mint, Some(bit), None);
                let wrap = rebuild(wrap, None, Some((0, mint)));
                let tampered = rebuild(&body, None, Some((ref_index, wrap)));
                assert_eq!(
                    verify_permit(&tampered, &public),
                    Err(MessageError::InvalidSignature),
                    "ref {ref_index}, mint bit {bit}"
                );
            }

            for bit in 0..wrap.bit_len() {
                let wrap = rebuild(wrap, Some(bit), None);
                let tampered = rebuild(&body, None, Some((ref_index, wrap)));
                assert_eq!(
                    verify_permit(&tampered, &public),
                    Err(MessageError::InvalidSignature),
                    "ref {ref_index}, wrap bit {bit}"
                );
            }
        }

        // Nonce is the last 16 bits
        let tampered = rebuild(&body, Some(body.bit_len() - 1), None);
        assert_eq!(
            verify_permit(&tampered, &public),
            Err(MessageError::InvalidSignature)
        );
    }

    #[test]
    fn permit_round_trip() {
        let permit = request().sign(&SECRET).unwrap();
        let body = permit.build().unwrap();

        match JettonMessage::parse(&body).unwrap() {
            JettonMessage::Permit(parsed) => {
                assert_eq!(parsed, permit);
                assert_eq!(parsed.build().unwrap().hash(), body.hash());
            }
            message => panic!("unexpected message: {message:?}"),
        }
    }

    #[test]
    fn non_canonical_forward_rejected() {
        let body = request().sign(&SECRET).unwrap().build().unwrap();

        // Same destination and amount but a different forward fee
        let original = &body.references()[0];
        let mint = original.references()[0].clone();
        let wrap = CellBuilder::new()
            .store_address(&MsgAddress::Std(request().to))
            .unwrap()
            .store_coins(PERMIT_FORWARD_FEE + 1)
            .unwrap()
            .store_reference(mint)
            .unwrap()
            .finalize()
            .unwrap();
        let tampered = rebuild(&body, None, Some((0, wrap)));

        assert_eq!(
            JettonMessage::parse(&tampered),
            Err(MessageError::NonCanonicalPermit)
        );
    }

    #[test]
    fn invalid_arguments() {
        let request = PermitRequest {
            nonce: 65_536,
            ..request()
        };
        assert_eq!(
            request.sign(&SECRET),
            Err(MessageError::NonceOutOfRange(65_536))
        );
        assert_eq!(
            request.commitment(),
            Err(MessageError::NonceOutOfRange(65_536))
        );

        let max_nonce = PermitRequest {
            nonce: u16::MAX as u64,
            ..request.clone()
        };
        assert_eq!(max_nonce.sign(&SECRET).unwrap().nonce, u16::MAX);

        assert_eq!(
            self::request().sign(&[0; 10]),
            Err(MessageError::InvalidKey(KeyError::InvalidLength(10)))
        );
    }
}
