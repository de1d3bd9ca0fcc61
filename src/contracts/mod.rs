use crate::cell::{Cell, CellBuilder, CellError, StdAddr};

pub use self::jetton_wallet::{CodeCheck, JettonWallet, JettonWalletConfig};
pub use self::transport::{AccountState, StackEntry, TransactionHandle, Transport};

pub mod jetton_wallet;
pub mod transport;

pub const ONE_TON: u128 = 1_000_000_000;

/// Sender pays forward fees separately from the message value
pub const SEND_MODE_PAY_GAS_SEPARATELY: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalMessage {
    pub dst: StdAddr,
    pub amount: u128,
    pub payload: Cell,
    pub state_init: Option<StateInit>,
    pub send_mode: u8,
}

impl InternalMessage {
    pub fn new(dst: StdAddr, amount: u128, payload: Cell) -> Self {
        Self {
            dst,
            amount,
            payload,
            state_init: None,
            send_mode: SEND_MODE_PAY_GAS_SEPARATELY,
        }
    }

    pub fn empty(dst: StdAddr, amount: u128) -> Self {
        Self::new(dst, amount, Cell::empty())
    }

    pub fn with_state_init(mut self, state_init: StateInit) -> Self {
        self.state_init = Some(state_init);
        self
    }
}

/// ```raw
/// _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
///   code:(Maybe ^Cell) data:(Maybe ^Cell)
///   library:(Maybe ^Cell) = StateInit;
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateInit {
    pub code: Cell,
    pub data: Cell,
}

impl StateInit {
    pub fn build(&self) -> Result<Cell, CellError> {
        let mut builder = CellBuilder::new();
        builder
            .store_bit(false)? // split_depth
            .store_bit(false)? // special
            .store_maybe_reference(Some(self.code.clone()))?
            .store_maybe_reference(Some(self.data.clone()))?
            .store_bit(false)?; // library
        builder.finalize()
    }

    /// Address of the account deployed with this state init
    pub fn compute_address(&self, workchain: i8) -> Result<StdAddr, CellError> {
        let cell = self.build()?;
        Ok(StdAddr::new(workchain, *cell.hash()))
    }
}
