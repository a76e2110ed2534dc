//! Static token table and symbol/address resolution.

use std::collections::HashMap;
use std::str::FromStr;

use ethers_core::types::Address;
use lazy_static::lazy_static;
use serde::Serialize;

use crate::error::ToolError;

/// Canonical description of an ERC-20 token on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

/// Decimals of the chain's native currency (ETH and its testnet variants).
pub const NATIVE_DECIMALS: u8 = 18;

// (chain id, symbol, address, decimals)
const KNOWN_TOKENS: &[(&str, &str, &str, u8)] = &[
    ("1", "WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18),
    ("1", "USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
    ("1", "USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
    ("1", "DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F", 18),
    ("1", "WBTC", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", 8),
    ("1", "LINK", "0x514910771AF9Ca656af840dff83E8264EcF986CA", 18),
    ("1", "UNI", "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984", 18),
    ("1", "STRK", "0xCa14007Eff0dB1f8135f4C25B34De49AB0d42766", 18),
    ("11155111", "WETH", "0xfFf9976782d46CC05630D1f6eBAb18b2324d6B14", 18),
    ("11155111", "USDC", "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238", 6),
];

lazy_static! {
    static ref TOKENS: HashMap<String, Vec<TokenInfo>> = {
        let mut map: HashMap<String, Vec<TokenInfo>> = HashMap::new();
        for (chain_id, symbol, address, decimals) in KNOWN_TOKENS {
            // Entries are compile-time constants; a malformed one is skipped
            // rather than taking the process down.
            if let Ok(address) = Address::from_str(address) {
                map.entry(chain_id.to_string()).or_default().push(TokenInfo {
                    address,
                    decimals: *decimals,
                    symbol: symbol.to_string(),
                });
            }
        }
        map
    };
}

/// All known tokens for a chain, in table order.
pub fn tokens_for_chain(chain_id: &str) -> &'static [TokenInfo] {
    TOKENS.get(chain_id).map(Vec::as_slice).unwrap_or(&[])
}

pub fn find_by_symbol(chain_id: &str, symbol: &str) -> Option<&'static TokenInfo> {
    let symbol = symbol.trim();
    tokens_for_chain(chain_id)
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

pub fn find_by_address(chain_id: &str, address: Address) -> Option<&'static TokenInfo> {
    tokens_for_chain(chain_id).iter().find(|t| t.address == address)
}

/// Resolves a symbol and/or address against the static table.
///
/// The address wins when both are given: a symbol never stands in for an
/// address missing from the table, and a symbol that disagrees with the
/// token at the address is a validation error. An address that does not
/// parse is a validation error, while a well-formed but unknown one is
/// `NotFound`.
pub fn resolve(
    chain_id: &str,
    symbol: Option<&str>,
    address: Option<&str>,
) -> Result<TokenInfo, ToolError> {
    let symbol = symbol.filter(|s| !s.trim().is_empty());
    if let Some(raw) = address.filter(|a| !a.trim().is_empty()) {
        let parsed = crate::utils::parse_address(raw)?;
        let token = find_by_address(chain_id, parsed).ok_or_else(|| {
            ToolError::NotFound(format!("token at address {} on chain {}", raw, chain_id))
        })?;
        check_symbol(token, symbol)?;
        return Ok(token.clone());
    }

    match symbol {
        Some(symbol) => find_by_symbol(chain_id, symbol).cloned().ok_or_else(|| {
            ToolError::NotFound(format!("token symbol '{}' on chain {}", symbol, chain_id))
        }),
        None => Err(ToolError::Validation(
            "either a token symbol or a token address is required".to_string(),
        )),
    }
}

/// Fails when a requested symbol does not name the token actually found.
pub fn check_symbol(token: &TokenInfo, symbol: Option<&str>) -> Result<(), ToolError> {
    match symbol.map(str::trim).filter(|s| !s.is_empty()) {
        Some(requested) if !token.symbol.eq_ignore_ascii_case(requested) => Err(ToolError::Validation(format!(
            "symbol '{}' does not match token {} at {}",
            requested,
            token.symbol,
            crate::utils::checksum(&token.address)
        ))),
        _ => Ok(()),
    }
}
