//! Small helpers shared by configuration and tool actions.

use std::str::FromStr;

use ethers_core::types::{Address, U256};
use ethers_core::utils::to_checksum;

use crate::error::ToolError;

/// Normalize common chain_id aliases users might pass in configuration or
/// tool arguments.
pub fn normalize_chain_id(input: &str) -> String {
    // Normalize case and separators first
    let mut s = input.trim().to_lowercase();
    s = s.replace([' ', '_'], "-");
    while s.contains("--") {
        s = s.replace("--", "-");
    }

    match s.as_str() {
        "mainnet" | "main" | "eth" | "ethereum" => "1".to_string(),
        "sepolia" | "testnet" | "test" | "eth-sepolia" => "11155111".to_string(),
        _ => s,
    }
}

/// Parses a 0x-prefixed hex address; checksum case is not enforced.
pub fn parse_address(input: &str) -> Result<Address, ToolError> {
    let trimmed = input.trim();
    let invalid = || ToolError::Validation(format!("'{}' is not a valid EVM address", input));
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    Address::from_str(hex).map_err(|_| invalid())
}

/// Parses a base-10 integer string (token ids, raw amounts).
pub fn parse_u256(input: &str) -> Result<U256, ToolError> {
    U256::from_dec_str(input.trim())
        .map_err(|_| ToolError::Validation(format!("'{}' is not a base-10 integer", input)))
}

/// EIP-55 checksummed rendering used in every tool response.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

/// `validator` hook for address fields.
pub fn validate_address(input: &str) -> Result<(), validator::ValidationError> {
    parse_address(input).map(|_| ()).map_err(|_| {
        let mut err = validator::ValidationError::new("address");
        err.message = Some("must be a 0x-prefixed 20-byte hex address".into());
        err
    })
}
