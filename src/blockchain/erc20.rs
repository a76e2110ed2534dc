//! Typed ERC-20 reads and transaction builders.

use ethers_core::abi::Token;
use ethers_core::types::{Address, TransactionRequest, U256};

use super::abi::{decode_text, decode_u8, decode_uint, encode_call};
use super::client::ChainRpc;
use crate::error::ToolError;

pub const NAME: &str = "name()";
pub const SYMBOL: &str = "symbol()";
pub const DECIMALS: &str = "decimals()";
pub const TOTAL_SUPPLY: &str = "totalSupply()";
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const ALLOWANCE: &str = "allowance(address,address)";
pub const TRANSFER: &str = "transfer(address,uint256)";
pub const APPROVE: &str = "approve(address,uint256)";

/// Read-only view of one ERC-20 contract.
pub struct Erc20<'a> {
    rpc: &'a dyn ChainRpc,
    address: Address,
}

impl<'a> Erc20<'a> {
    pub fn new(rpc: &'a dyn ChainRpc, address: Address) -> Self {
        Self { rpc, address }
    }

    async fn call(&self, signature: &str, args: &[Token]) -> Result<Vec<u8>, ToolError> {
        let data = encode_call(signature, args);
        let out = self.rpc.call(self.address, data).await?;
        Ok(out.to_vec())
    }

    pub async fn name(&self) -> Result<String, ToolError> {
        decode_text(NAME, &self.call(NAME, &[]).await?)
    }

    pub async fn symbol(&self) -> Result<String, ToolError> {
        decode_text(SYMBOL, &self.call(SYMBOL, &[]).await?)
    }

    pub async fn decimals(&self) -> Result<u8, ToolError> {
        decode_u8(DECIMALS, &self.call(DECIMALS, &[]).await?)
    }

    pub async fn total_supply(&self) -> Result<U256, ToolError> {
        decode_uint(TOTAL_SUPPLY, &self.call(TOTAL_SUPPLY, &[]).await?)
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256, ToolError> {
        let out = self.call(BALANCE_OF, &[Token::Address(owner)]).await?;
        decode_uint(BALANCE_OF, &out)
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ToolError> {
        let out = self
            .call(ALLOWANCE, &[Token::Address(owner), Token::Address(spender)])
            .await?;
        decode_uint(ALLOWANCE, &out)
    }
}

pub fn transfer_tx(token: Address, to: Address, amount: U256) -> TransactionRequest {
    TransactionRequest::new()
        .to(token)
        .data(encode_call(TRANSFER, &[Token::Address(to), Token::Uint(amount)]))
}

pub fn approve_tx(token: Address, spender: Address, amount: U256) -> TransactionRequest {
    TransactionRequest::new()
        .to(token)
        .data(encode_call(APPROVE, &[Token::Address(spender), Token::Uint(amount)]))
}
