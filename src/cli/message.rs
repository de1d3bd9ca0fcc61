use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use jetton_wallet::cell::{MsgAddress, StdAddr};
use jetton_wallet::messages::{
    self, Burn, JettonMessage, PermitRequest, Tokens, Transfer, WithdrawJettons, WithdrawTons,
};

use super::{cell_output, CliContext};
use crate::util::*;

#[derive(FromArgs)]
/// Builds and decodes jetton wallet message bodies
#[argh(subcommand, name = "message")]
pub struct Cmd {
    #[argh(subcommand)]
    subcommand: SubCmd,
}

impl Cmd {
    pub fn run(self, ctx: CliContext) -> Result<()> {
        let message = match self.subcommand {
            SubCmd::Deploy(_) => JettonMessage::Deploy,
            SubCmd::Transfer(cmd) => cmd.build()?,
            SubCmd::Burn(cmd) => cmd.build()?,
            SubCmd::WithdrawTons(cmd) => WithdrawTons {
                query_id: cmd.query_id,
            }
            .into(),
            SubCmd::WithdrawJettons(cmd) => WithdrawJettons {
                query_id: cmd.query_id,
                from: cmd.from,
                amount: cmd.amount.0,
            }
            .into(),
            SubCmd::Permit(cmd) => cmd.build(&ctx)?,
            SubCmd::Decode(cmd) => return cmd.run(),
        };

        let cell = message
            .build()
            .with_context(|| format!("failed to build {} message", message.name()))?;

        let mut output = cell_output(&cell);
        output["message"] = message_to_json(&message);
        print_output(output);
        Ok(())
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCmd {
    Deploy(CmdDeploy),
    Transfer(CmdTransfer),
    Burn(CmdBurn),
    WithdrawTons(CmdWithdrawTons),
    WithdrawJettons(CmdWithdrawJettons),
    Permit(CmdPermit),
    Decode(CmdDecode),
}

#[derive(Debug, PartialEq, FromArgs)]
/// Empty deploy body
#[argh(subcommand, name = "deploy")]
struct CmdDeploy {}

#[derive(FromArgs)]
/// Jetton transfer
#[argh(subcommand, name = "transfer")]
struct CmdTransfer {
    /// amount of jettons
    #[argh(option, short = 'a')]
    amount: Tokens,

    /// destination owner address
    #[argh(option)]
    to: StdAddr,

    /// address for the excess, none by default
    #[argh(option, default = "MsgAddress::None")]
    response: MsgAddress,

    /// custom payload BOC in base64 or hex
    #[argh(option)]
    custom_payload: Option<String>,

    /// amount forwarded to the destination owner
    #[argh(option, default = "Tokens(0)")]
    forward_ton_amount: Tokens,

    /// forward payload BOC in base64 or hex
    #[argh(option)]
    forward_payload: Option<String>,

    /// query id
    #[argh(option, default = "0")]
    query_id: u64,
}

impl CmdTransfer {
    fn build(self) -> Result<JettonMessage> {
        Ok(Transfer {
            query_id: self.query_id,
            amount: self.amount.0,
            destination: self.to.into(),
            response_destination: self.response,
            custom_payload: parse_optional_boc(self.custom_payload)
                .context("invalid custom payload")?,
            forward_ton_amount: self.forward_ton_amount.0,
            forward_payload: parse_optional_boc(self.forward_payload)
                .context("invalid forward payload")?,
        }
        .into())
    }
}

#[derive(FromArgs)]
/// Jetton burn
#[argh(subcommand, name = "burn")]
struct CmdBurn {
    /// amount of jettons
    #[argh(option, short = 'a')]
    amount: Tokens,

    /// address for the excess, none by default
    #[argh(option, default = "MsgAddress::None")]
    response: MsgAddress,

    /// custom payload BOC in base64 or hex
    #[argh(option)]
    custom_payload: Option<String>,

    /// query id
    #[argh(option, default = "0")]
    query_id: u64,
}

impl CmdBurn {
    fn build(self) -> Result<JettonMessage> {
        Ok(Burn {
            query_id: self.query_id,
            amount: self.amount.0,
            response_destination: self.response,
            custom_payload: parse_optional_boc(self.custom_payload)
                .context("invalid custom payload")?,
        }
        .into())
    }
}

#[derive(FromArgs)]
/// Withdraw native currency from the wallet
#[argh(subcommand, name = "withdraw-tons")]
struct CmdWithdrawTons {
    /// query id
    #[argh(option, default = "0")]
    query_id: u64,
}

#[derive(FromArgs)]
/// Withdraw jettons stuck on another wallet
#[argh(subcommand, name = "withdraw-jettons")]
struct CmdWithdrawJettons {
    /// jetton wallet to withdraw from
    #[argh(option)]
    from: MsgAddress,

    /// amount of jettons
    #[argh(option, short = 'a')]
    amount: Tokens,

    /// query id
    #[argh(option, default = "0")]
    query_id: u64,
}

#[derive(FromArgs)]
/// Signed permit
#[argh(subcommand, name = "permit")]
struct CmdPermit {
    /// amount minted to the recipient
    #[argh(option, short = 'a')]
    amount: Tokens,

    /// recipient address
    #[argh(option)]
    to: StdAddr,

    /// amount minted to the treasury
    #[argh(option)]
    to_burn: Tokens,

    /// treasury address, taken from the config by default
    #[argh(option)]
    treasury: Option<StdAddr>,

    /// permit nonce
    #[argh(option)]
    nonce: u64,

    /// path to the signer keys file
    #[argh(option)]
    keys: Option<PathBuf>,

    /// raw secret key (32 or 64 bytes) in hex or base64, read from stdin with `-`
    #[argh(option)]
    secret: Option<String>,

    /// query id
    #[argh(option, default = "0")]
    query_id: u64,
}

impl CmdPermit {
    fn build(self, ctx: &CliContext) -> Result<JettonMessage> {
        let treasury = match self.treasury {
            Some(treasury) => treasury,
            None => ctx
                .load_config()?
                .treasury
                .context("treasury address is not specified")?,
        };

        let request = PermitRequest {
            query_id: self.query_id,
            amount: self.amount.0,
            to: self.to,
            to_burn: self.to_burn.0,
            treasury,
            nonce: self.nonce,
        };

        let permit = match self.secret {
            Some(secret) => {
                let secret = parse_secret(secret)?;
                request.sign(&secret)?
            }
            None => {
                let keypair = ctx.load_keys(self.keys.as_deref())?;
                request.sign_with(&keypair)?
            }
        };

        Ok(permit.into())
    }
}

#[derive(FromArgs)]
/// Decodes a message body
#[argh(subcommand, name = "decode")]
struct CmdDecode {
    /// message body BOC in base64 or hex, or empty for input from stdin
    #[argh(positional)]
    boc: Option<String>,

    /// verify the permit signature with this public key
    #[argh(option)]
    pubkey: Option<String>,
}

impl CmdDecode {
    fn run(self) -> Result<()> {
        let boc = parse_optional_input(self.boc, true)?;
        let cell = parse_boc(std::str::from_utf8(&boc)?)?;
        let message = JettonMessage::parse(&cell).context("failed to decode message")?;

        let mut output = cell_output(&cell);
        output["message"] = message_to_json(&message);

        if let Some(pubkey) = self.pubkey {
            let pubkey = parse_hex_or_base64(&pubkey)?;
            let pubkey =
                ed25519_dalek::PublicKey::from_bytes(&pubkey).context("invalid public key")?;
            messages::verify_permit(&cell, &pubkey).context("permit verification failed")?;
            output["signature_valid"] = serde_json::Value::Bool(true);
        }

        print_output(output);
        Ok(())
    }
}

fn message_to_json(message: &JettonMessage) -> serde_json::Value {
    let payload = |cell: &Option<jetton_wallet::cell::Cell>| {
        cell.as_ref()
            .map(jetton_wallet::cell::serialize_boc_base64)
    };

    let fields = match message {
        JettonMessage::Deploy => serde_json::json!({}),
        JettonMessage::Transfer(body) => serde_json::json!({
            "query_id": body.query_id,
            "amount": Tokens(body.amount).to_string(),
            "destination": body.destination.to_string(),
            "response_destination": body.response_destination.to_string(),
            "custom_payload": payload(&body.custom_payload),
            "forward_ton_amount": Tokens(body.forward_ton_amount).to_string(),
            "forward_payload": payload(&body.forward_payload),
        }),
        JettonMessage::Burn(body) => serde_json::json!({
            "query_id": body.query_id,
            "amount": Tokens(body.amount).to_string(),
            "response_destination": body.response_destination.to_string(),
            "custom_payload": payload(&body.custom_payload),
        }),
        JettonMessage::WithdrawTons(body) => serde_json::json!({
            "query_id": body.query_id,
        }),
        JettonMessage::WithdrawJettons(body) => serde_json::json!({
            "query_id": body.query_id,
            "from": body.from.to_string(),
            "amount": Tokens(body.amount).to_string(),
        }),
        JettonMessage::Permit(body) => serde_json::json!({
            "query_id": body.query_id,
            "amount": Tokens(body.amount).to_string(),
            "to": body.to.to_string(),
            "to_burn": Tokens(body.to_burn).to_string(),
            "treasury": body.treasury.to_string(),
            "nonce": body.nonce,
            "signature": hex::encode(body.signature),
        }),
    };

    serde_json::json!({
        "op": message.name(),
        "opcode": message.opcode().map(|opcode| format!("{opcode:#010x}")),
        "fields": fields,
    })
}
