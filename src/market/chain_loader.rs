// Options-chain JSON loader

use std::fs;
use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::error::EngineError;
use crate::market::{OptionChain, OptionContract};

#[derive(Debug, Deserialize)]
struct ChainFile {
    underlying: String,
    #[serde(default)]
    spot: f64,
    options: Vec<OptionContract>,
}

/// Load a chain dump: `{"underlying": "...", "spot": 123.4, "options": [...]}`.
/// Malformed contracts (negative strike, inverted quote) are dropped with a
/// warning rather than failing the load.
pub fn load_chain<P: AsRef<Path>>(path: P) -> Result<(String, f64, OptionChain), EngineError> {
    let raw = fs::read_to_string(path.as_ref())?;
    let parsed: ChainFile = serde_json::from_str(&raw)?;

    let mut chain = OptionChain::new();
    for contract in parsed.options {
        if !contract.is_well_formed() {
            warn!(
                "dropping malformed contract {} {:?} strike {}",
                contract.underlying, contract.right, contract.strike
            );
            continue;
        }
        chain.insert(contract);
    }

    Ok((parsed.underlying, parsed.spot, chain))
}
