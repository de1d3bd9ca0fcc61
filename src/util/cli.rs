use std::io::{Read, Write};

use anyhow::{Context, Result};
use jetton_wallet::cell::{self, Cell};
use zeroize::Zeroizing;

pub fn parse_optional_input(data: Option<String>, raw: bool) -> Result<Vec<u8>> {
    match data {
        Some(data) if raw => Ok(data.into()),
        Some(data) => parse_hex_or_base64(&data),
        None => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .context("failed to read from stdin")?;
            Ok(data)
        }
    }
}

pub fn parse_hex_or_base64(data: &str) -> Result<Vec<u8>> {
    let data = data.trim();
    if let Some(hash) = data.strip_prefix("0x") {
        hex::decode(hash).map_err(From::from)
    } else {
        match hex::decode(data) {
            Ok(bytes) => Ok(bytes),
            Err(e) => match base64::decode(data) {
                Ok(bytes) => Ok(bytes),
                _ => Err(e.into()),
            },
        }
    }
}

/// Reads secret key material in hex or base64, `-` for stdin
pub fn parse_secret(data: String) -> Result<Zeroizing<Vec<u8>>> {
    let data = if data == "-" {
        let mut data = Zeroizing::new(String::new());
        std::io::stdin()
            .read_to_string(&mut data)
            .context("failed to read from stdin")?;
        data
    } else {
        Zeroizing::new(data)
    };
    parse_hex_or_base64(&data).map(Zeroizing::new)
}

/// Parses a bag of cells encoded as base64 or hex
pub fn parse_boc(data: &str) -> Result<Cell> {
    let bytes = parse_hex_or_base64(data).context("invalid BOC encoding")?;
    cell::deserialize_boc(&bytes).context("invalid BOC")
}

pub fn parse_optional_boc(data: Option<String>) -> Result<Option<Cell>> {
    data.as_deref().map(parse_boc).transpose()
}

pub fn print_output<T: std::fmt::Display>(arg: T) {
    let _ = if is_terminal() {
        writeln!(std::io::stdout(), "{arg:#}")
    } else {
        write!(std::io::stdout(), "{arg}")
    };
}

pub fn print_error(text: impl std::fmt::Display) {
    if is_terminal() {
        eprintln!("{}", console::style(format!("✘ {text}")).red().bold());
    } else {
        eprintln!("Error: {text}");
    }
}

pub fn is_terminal() -> bool {
    use once_cell::race::OnceBox;

    static IS_TERMINAL: OnceBox<bool> = OnceBox::new();
    *IS_TERMINAL.get_or_init(|| Box::new(console::user_attended()))
}
