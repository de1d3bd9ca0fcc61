use std::sync::Arc;

use anyhow::{Context, Result};
use ed25519_dalek::Keypair;

use super::{
    AccountState, InternalMessage, StackEntry, StateInit, TransactionHandle, Transport, ONE_TON,
};
use crate::cell::{Cell, CellBuilder, CellError, HashBytes, MsgAddress, StdAddr};
use crate::messages::{
    Burn, JettonMessage, PermitRequest, Transfer, WithdrawJettons, WithdrawTons,
};

/// Initial wallet data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JettonWalletConfig {
    pub owner: StdAddr,
    pub minter: StdAddr,
    pub wallet_code: Cell,
}

impl JettonWalletConfig {
    /// `balance:Coins owner:MsgAddress minter:MsgAddress wallet_code:^Cell`
    pub fn build_data(&self) -> Result<Cell, CellError> {
        let mut builder = CellBuilder::new();
        builder
            .store_coins(0)?
            .store_address(&self.owner.into())?
            .store_address(&self.minter.into())?
            .store_reference(self.wallet_code.clone())?;
        builder.finalize()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CodeCheck {
    NotDeployed,
    Matches,
    Differs { actual: HashBytes },
}

pub struct JettonWallet {
    address: StdAddr,
    state_init: Option<StateInit>,
    transport: Arc<dyn Transport>,
}

impl JettonWallet {
    /// Value attached to withdraw requests
    pub const WITHDRAW_VALUE: u128 = ONE_TON / 10;

    pub fn from_address(address: StdAddr, transport: Arc<dyn Transport>) -> Self {
        Self {
            address,
            state_init: None,
            transport,
        }
    }

    pub fn from_config(
        config: &JettonWalletConfig,
        code: Cell,
        workchain: i8,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let data = config
            .build_data()
            .context("failed to build wallet data")?;
        let state_init = StateInit { code, data };
        let address = state_init
            .compute_address(workchain)
            .context("failed to compute wallet address")?;

        Ok(Self {
            address,
            state_init: Some(state_init),
            transport,
        })
    }

    pub fn address(&self) -> &StdAddr {
        &self.address
    }

    pub fn state_init(&self) -> Option<&StateInit> {
        self.state_init.as_ref()
    }

    pub async fn send_deploy(&self, value: u128) -> Result<TransactionHandle> {
        let state_init = self
            .state_init
            .clone()
            .context("wallet state init is unknown")?;
        self.send(JettonMessage::Deploy, value, Some(state_init))
            .await
    }

    pub async fn send_transfer(&self, value: u128, transfer: Transfer) -> Result<TransactionHandle> {
        self.send(transfer.into(), value, None).await
    }

    pub async fn send_permit(
        &self,
        value: u128,
        request: &PermitRequest,
        keypair: &Keypair,
    ) -> Result<TransactionHandle> {
        let permit = request
            .sign_with(keypair)
            .context("failed to sign permit")?;
        self.send(permit.into(), value, None).await
    }

    pub async fn send_burn(&self, value: u128, burn: Burn) -> Result<TransactionHandle> {
        self.send(burn.into(), value, None).await
    }

    pub async fn send_withdraw_tons(&self) -> Result<TransactionHandle> {
        self.send(
            WithdrawTons::default().into(),
            Self::WITHDRAW_VALUE,
            None,
        )
        .await
    }

    pub async fn send_withdraw_jettons(
        &self,
        from: MsgAddress,
        amount: u128,
    ) -> Result<TransactionHandle> {
        let body = WithdrawJettons {
            query_id: 0,
            from,
            amount,
        };
        self.send(body.into(), Self::WITHDRAW_VALUE, None).await
    }

    /// Returns 0 for an undeployed wallet
    pub async fn get_nonce(&self) -> Result<u64> {
        if !self.is_active().await? {
            return Ok(0);
        }

        let stack = self.run_get_method("get_nonce").await?;
        let nonce = first_entry(&stack)?.as_int()?;
        u64::try_from(nonce).context("invalid nonce")
    }

    /// Returns 0 for an undeployed wallet
    pub async fn get_jetton_balance(&self) -> Result<u128> {
        if !self.is_active().await? {
            return Ok(0);
        }

        let stack = self.run_get_method("get_wallet_data").await?;
        let balance = first_entry(&stack)?.as_int()?;
        u128::try_from(balance).context("invalid balance")
    }

    /// Returns `None` for an undeployed wallet
    pub async fn get_jetton_owner(&self) -> Result<Option<MsgAddress>> {
        if !self.is_active().await? {
            return Ok(None);
        }

        let stack = self.run_get_method("get_wallet_data").await?;
        let owner = stack
            .get(1)
            .context("owner not found in wallet data")?
            .as_address()
            .context("invalid owner address")?;
        Ok(Some(owner))
    }

    /// Compares the deployed code with the expected one
    pub async fn check_code(&self, expected: &Cell) -> Result<CodeCheck> {
        match self.transport.get_account_state(&self.address).await? {
            AccountState::Inactive => Ok(CodeCheck::NotDeployed),
            AccountState::Active { code, .. } if &code == expected => Ok(CodeCheck::Matches),
            AccountState::Active { code, .. } => {
                tracing::warn!(
                    wallet = %self.address,
                    actual = %code.hash(),
                    expected = %expected.hash(),
                    "contract code differs from the current version"
                );
                Ok(CodeCheck::Differs {
                    actual: *code.hash(),
                })
            }
        }
    }

    async fn send(
        &self,
        message: JettonMessage,
        value: u128,
        state_init: Option<StateInit>,
    ) -> Result<TransactionHandle> {
        let payload = message
            .build()
            .with_context(|| format!("failed to build {} message", message.name()))?;

        let mut internal = InternalMessage::new(self.address, value, payload);
        if let Some(state_init) = state_init {
            internal = internal.with_state_init(state_init);
        }

        let handle = self.transport.send_message(internal).await?;
        tracing::debug!(
            op = message.name(),
            wallet = %self.address,
            message_hash = %handle.message_hash,
            "message sent"
        );
        Ok(handle)
    }

    async fn is_active(&self) -> Result<bool> {
        let state = self
            .transport
            .get_account_state(&self.address)
            .await
            .context("failed to get wallet state")?;
        Ok(state.is_active())
    }

    async fn run_get_method(&self, method: &str) -> Result<Vec<StackEntry>> {
        self.transport
            .run_get_method(&self.address, method)
            .await
            .with_context(|| format!("failed to run `{method}`"))
    }
}

fn first_entry(stack: &[StackEntry]) -> Result<&StackEntry> {
    stack.first().context("empty stack")
}
