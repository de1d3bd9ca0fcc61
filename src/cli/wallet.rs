use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use jetton_wallet::cell::{self, StdAddr};
use jetton_wallet::config::AppConfig;
use jetton_wallet::contracts::{JettonWalletConfig, StateInit};

use super::{cell_output, CliContext};
use crate::util::*;

#[derive(FromArgs)]
/// Jetton wallet state
#[argh(subcommand, name = "wallet")]
pub struct Cmd {
    #[argh(subcommand)]
    subcommand: SubCmd,
}

impl Cmd {
    pub fn run(self, ctx: CliContext) -> Result<()> {
        let config = ctx.load_config()?;
        match self.subcommand {
            SubCmd::Address(cmd) => cmd.run(config),
            SubCmd::Data(cmd) => cmd.run(config),
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCmd {
    Address(CmdAddress),
    Data(CmdData),
}

#[derive(FromArgs)]
/// Computes the wallet address and state init
#[argh(subcommand, name = "address")]
struct CmdAddress {
    /// wallet owner
    #[argh(option)]
    owner: Option<StdAddr>,

    /// jetton minter
    #[argh(option)]
    minter: Option<StdAddr>,

    /// path to the wallet code BOC
    #[argh(option)]
    code: Option<PathBuf>,

    /// workchain
    #[argh(option, short = 'w')]
    workchain: Option<i8>,
}

impl CmdAddress {
    fn run(self, config: AppConfig) -> Result<()> {
        let workchain = self.workchain.unwrap_or(config.workchain);
        let wallet = make_wallet_config(config, self.owner, self.minter, self.code)?;

        let state_init = StateInit {
            code: wallet.wallet_code.clone(),
            data: wallet.build_data().context("failed to build wallet data")?,
        };
        let address = state_init
            .compute_address(workchain)
            .context("failed to compute wallet address")?;
        let state_init = state_init.build()?;

        tracing::debug!(%address, "computed wallet address");

        print_output(serde_json::json!({
            "address": address.to_string(),
            "owner": wallet.owner.to_string(),
            "minter": wallet.minter.to_string(),
            "state_init": cell::serialize_boc_base64(&state_init),
        }));
        Ok(())
    }
}

#[derive(FromArgs)]
/// Builds the initial wallet data cell
#[argh(subcommand, name = "data")]
struct CmdData {
    /// wallet owner
    #[argh(option)]
    owner: Option<StdAddr>,

    /// jetton minter
    #[argh(option)]
    minter: Option<StdAddr>,

    /// path to the wallet code BOC
    #[argh(option)]
    code: Option<PathBuf>,
}

impl CmdData {
    fn run(self, config: AppConfig) -> Result<()> {
        let wallet = make_wallet_config(config, self.owner, self.minter, self.code)?;
        let data = wallet.build_data().context("failed to build wallet data")?;
        print_output(cell_output(&data));
        Ok(())
    }
}

fn make_wallet_config(
    mut config: AppConfig,
    owner: Option<StdAddr>,
    minter: Option<StdAddr>,
    code: Option<PathBuf>,
) -> Result<JettonWalletConfig> {
    config.owner = owner.or(config.owner);
    config.minter = minter.or(config.minter);
    config.wallet_code = code.or(config.wallet_code);
    config.wallet_config()
}
