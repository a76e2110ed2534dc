//! ABI auto-detection for deployed contracts.
//!
//! Candidates are probed one at a time in [`PROBE_ORDER`]; the first one
//! whose probe succeeds wins. A probe that errors (revert, decode failure,
//! transport error) counts as "no match" and the next candidate is tried.
//! Running out of candidates is a definitive [`ToolError::UnknownAbi`].

use std::fmt;

use ethers_core::abi::Token;
use ethers_core::types::Address;
use serde::Serialize;
use tracing::debug;

use super::abi::{decode_address, decode_bool, encode_call};
use super::client::ChainRpc;
use super::erc20::Erc20;
use crate::error::ToolError;
use crate::utils::checksum;

const SUPPORTS_INTERFACE: &str = "supportsInterface(bytes4)";
const OWNER: &str = "owner()";
const ERC1155_INTERFACE_ID: [u8; 4] = [0xd9, 0xb6, 0x7a, 0x26];
const ERC721_INTERFACE_ID: [u8; 4] = [0x80, 0xac, 0x58, 0xcd];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContractAbi {
    #[serde(rename = "ERC1155")]
    Erc1155,
    #[serde(rename = "ERC721")]
    Erc721,
    #[serde(rename = "ERC20")]
    Erc20,
}

impl fmt::Display for ContractAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractAbi::Erc1155 => "ERC1155",
            ContractAbi::Erc721 => "ERC721",
            ContractAbi::Erc20 => "ERC20",
        };
        f.write_str(name)
    }
}

/// Most specific first: ERC-1155 and ERC-721 contracts may also answer
/// `totalSupply()`.
pub const PROBE_ORDER: [ContractAbi; 3] = [ContractAbi::Erc1155, ContractAbi::Erc721, ContractAbi::Erc20];

async fn supports_interface(rpc: &dyn ChainRpc, address: Address, id: [u8; 4]) -> Result<bool, ToolError> {
    let data = encode_call(SUPPORTS_INTERFACE, &[Token::FixedBytes(id.to_vec())]);
    let out = rpc.call(address, data).await?;
    decode_bool(SUPPORTS_INTERFACE, &out)
}

async fn probe(rpc: &dyn ChainRpc, address: Address, candidate: ContractAbi) -> Result<bool, ToolError> {
    match candidate {
        ContractAbi::Erc1155 => supports_interface(rpc, address, ERC1155_INTERFACE_ID).await,
        ContractAbi::Erc721 => supports_interface(rpc, address, ERC721_INTERFACE_ID).await,
        ContractAbi::Erc20 => {
            let token = Erc20::new(rpc, address);
            token.total_supply().await?;
            token.decimals().await?;
            Ok(true)
        }
    }
}

pub async fn detect_abi(rpc: &dyn ChainRpc, address: Address) -> Result<ContractAbi, ToolError> {
    for candidate in PROBE_ORDER {
        match probe(rpc, address, candidate).await {
            Ok(true) => {
                debug!("{:?} matched {}", address, candidate);
                return Ok(candidate);
            }
            Ok(false) => debug!("{:?} is not {}", address, candidate),
            Err(e) => debug!("{} probe on {:?} failed: {}", candidate, address, e),
        }
    }
    Err(ToolError::UnknownAbi(checksum(&address)))
}

/// The `Ownable` owner, or `None` when the contract has no `owner()` view.
pub async fn contract_owner(rpc: &dyn ChainRpc, address: Address) -> Option<Address> {
    let out = rpc.call(address, encode_call(OWNER, &[])).await.ok()?;
    match decode_address(OWNER, &out) {
        Ok(owner) => Some(owner),
        Err(e) => {
            debug!("{:?} has no usable owner(): {}", address, e);
            None
        }
    }
}
