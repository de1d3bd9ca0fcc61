use anyhow::Result;

use super::InternalMessage;
use crate::cell::{Cell, HashBytes, MsgAddress, StdAddr};

/// Network access used by contract wrappers.
///
/// Implementations own timeouts, retries and the sending wallet.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get_account_state(&self, address: &StdAddr) -> Result<AccountState>;

    async fn run_get_method(&self, address: &StdAddr, method: &str) -> Result<Vec<StackEntry>>;

    async fn send_message(&self, message: InternalMessage) -> Result<TransactionHandle>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountState {
    Inactive,
    Active { code: Cell, data: Cell },
}

impl AccountState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Get-method result entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackEntry {
    Null,
    Int(i128),
    Cell(Cell),
    Slice(Cell),
}

impl StackEntry {
    pub fn as_int(&self) -> Result<i128> {
        match self {
            Self::Int(value) => Ok(*value),
            entry => anyhow::bail!("expected an integer, got {entry:?}"),
        }
    }

    pub fn as_address(&self) -> Result<MsgAddress> {
        match self {
            Self::Cell(cell) | Self::Slice(cell) => Ok(cell.as_slice().load_address()?),
            Self::Null => Ok(MsgAddress::None),
            entry => anyhow::bail!("expected an address slice, got {entry:?}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransactionHandle {
    pub message_hash: HashBytes,
}
