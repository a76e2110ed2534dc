//! Wallet server: account creation and the signing actions.
//!
//! Every action except `create_account` needs the read-write environment and
//! checks for it before touching the chain.

use std::sync::Arc;

use async_trait::async_trait;
use bip39::{Language, Mnemonic};
use ethers_core::types::{TransactionRequest, U256};
use ethers_signers::coins_bip39::English;
use ethers_signers::{MnemonicBuilder, Signer};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use super::token::{resolve_onchain, TokenRef};
use super::{to_value, ServerContext};
use crate::blockchain::erc20::{approve_tx, transfer_tx};
use crate::blockchain::tokens::NATIVE_DECIMALS;
use crate::blockchain::units::{to_base_units, to_human_units, validate_decimal};
use crate::error::ToolError;
use crate::tools::{empty_schema, Action, ActionTool, NoParams, Tool};
use crate::utils::{checksum, parse_address, validate_address};

pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

pub fn tools(ctx: &ServerContext) -> Vec<Arc<dyn Tool>> {
    vec![
        ActionTool::shared(CreateAccount),
        ActionTool::shared(GetAccount { ctx: ctx.clone() }),
        ActionTool::shared(TransferNative { ctx: ctx.clone() }),
        ActionTool::shared(TransferToken { ctx: ctx.clone() }),
        ActionTool::shared(ApproveToken { ctx: ctx.clone() }),
    ]
}

fn positive_amount(amount: &str, decimals: u8) -> Result<U256, ToolError> {
    let units = to_base_units(amount, decimals)?;
    if units.is_zero() {
        return Err(ToolError::Validation(format!(
            "amount {} is zero at {} decimals",
            amount, decimals
        )));
    }
    Ok(units)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub address: String,
    pub private_key: String,
    pub mnemonic: String,
    pub derivation_path: String,
}

/// Generates a 12-word BIP-39 mnemonic and derives the first account.
pub fn generate_account() -> Result<NewAccount, ToolError> {
    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| ToolError::External(format!("mnemonic generation failed: {}", e)))?;
    let phrase = mnemonic.to_string();

    let wallet = MnemonicBuilder::<English>::default()
        .phrase(phrase.as_str())
        .derivation_path(DERIVATION_PATH)
        .and_then(|builder| builder.build())
        .map_err(|e| ToolError::External(format!("key derivation failed: {}", e)))?;

    Ok(NewAccount {
        address: checksum(&wallet.address()),
        private_key: format!("0x{}", hex::encode(wallet.signer().to_bytes())),
        mnemonic: phrase,
        derivation_path: DERIVATION_PATH.to_string(),
    })
}

pub struct CreateAccount;

#[async_trait]
impl Action for CreateAccount {
    type Params = NoParams;
    const NAME: &'static str = "create_account";
    const DESCRIPTION: &'static str =
        "Generate a new account: BIP-39 mnemonic, private key and address. Nothing is stored.";

    fn input_schema() -> Value {
        empty_schema()
    }

    async fn run(&self, _params: NoParams) -> Result<Value, ToolError> {
        let account = generate_account()?;
        info!("Generated account {}", account.address);
        to_value(&account)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub address: String,
    pub chain_id: String,
    pub balance: String,
    pub balance_raw: String,
}

pub struct GetAccount {
    ctx: ServerContext,
}

#[async_trait]
impl Action for GetAccount {
    type Params = NoParams;
    const NAME: &'static str = "get_account";
    const DESCRIPTION: &'static str = "Show the configured signing account and its native balance.";

    fn input_schema() -> Value {
        empty_schema()
    }

    async fn run(&self, _params: NoParams) -> Result<Value, ToolError> {
        let writer = self.ctx.env.writer()?;
        let raw = writer.native_balance().await?;
        to_value(&AccountInfo {
            address: checksum(&writer.address()),
            chain_id: writer.reader().chain_id().to_string(),
            balance: to_human_units(raw, NATIVE_DECIMALS),
            balance_raw: raw.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitted {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub amount_raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferNativeParams {
    #[validate(custom = "validate_address")]
    pub to: String,
    #[validate(custom = "validate_decimal")]
    pub amount: String,
}

pub struct TransferNative {
    ctx: ServerContext,
}

#[async_trait]
impl Action for TransferNative {
    type Params = TransferNativeParams;
    const NAME: &'static str = "transfer_native";
    const DESCRIPTION: &'static str = "Send native currency (ETH) from the signing account.";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": { "type": "string", "description": "Recipient address (0x...)" },
                "amount": { "type": "string", "description": "Amount in ETH, e.g. \"0.01\"" }
            },
            "required": ["to", "amount"]
        })
    }

    async fn run(&self, params: TransferNativeParams) -> Result<Value, ToolError> {
        let writer = self.ctx.env.writer()?;
        let to = parse_address(&params.to)?;
        let value = positive_amount(&params.amount, NATIVE_DECIMALS)?;

        let hash = writer.send(TransactionRequest::new().to(to).value(value)).await?;
        to_value(&Submitted {
            tx_hash: format!("{:?}", hash),
            from: checksum(&writer.address()),
            to: checksum(&to),
            amount: params.amount,
            amount_raw: value.to_string(),
            symbol: None,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferTokenParams {
    #[validate(custom = "validate_address")]
    pub to: String,
    #[validate(custom = "validate_decimal")]
    pub amount: String,
    #[serde(flatten)]
    #[validate]
    pub token: TokenRef,
}

pub struct TransferToken {
    ctx: ServerContext,
}

#[async_trait]
impl Action for TransferToken {
    type Params = TransferTokenParams;
    const NAME: &'static str = "transfer_token";
    const DESCRIPTION: &'static str = "Send an ERC-20 token from the signing account.";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": { "type": "string", "description": "Recipient address (0x...)" },
                "amount": { "type": "string", "description": "Amount in token units, e.g. \"12.5\"" },
                "symbol": { "type": "string", "description": "Token symbol" },
                "address": { "type": "string", "description": "Token contract address" }
            },
            "required": ["to", "amount"]
        })
    }

    async fn run(&self, params: TransferTokenParams) -> Result<Value, ToolError> {
        let writer = self.ctx.env.writer()?;
        let to = parse_address(&params.to)?;
        let info = resolve_onchain(writer.reader().rpc(), &params.token).await?;
        let amount = positive_amount(&params.amount, info.decimals)?;

        let hash = writer.send(transfer_tx(info.address, to, amount)).await?;
        to_value(&Submitted {
            tx_hash: format!("{:?}", hash),
            from: checksum(&writer.address()),
            to: checksum(&to),
            amount: params.amount,
            amount_raw: amount.to_string(),
            symbol: Some(info.symbol),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproveParams {
    #[validate(custom = "validate_address")]
    pub spender: String,
    #[validate(custom = "validate_decimal")]
    pub amount: String,
    #[serde(flatten)]
    #[validate]
    pub token: TokenRef,
}

pub struct ApproveToken {
    ctx: ServerContext,
}

#[async_trait]
impl Action for ApproveToken {
    type Params = ApproveParams;
    const NAME: &'static str = "approve_token";
    const DESCRIPTION: &'static str =
        "Approve a spender to move up to `amount` of a token from the signing account. 0 revokes.";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "spender": { "type": "string", "description": "Spender address (0x...)" },
                "amount": { "type": "string", "description": "Allowance in token units" },
                "symbol": { "type": "string", "description": "Token symbol" },
                "address": { "type": "string", "description": "Token contract address" }
            },
            "required": ["spender", "amount"]
        })
    }

    async fn run(&self, params: ApproveParams) -> Result<Value, ToolError> {
        let writer = self.ctx.env.writer()?;
        let spender = parse_address(&params.spender)?;
        let info = resolve_onchain(writer.reader().rpc(), &params.token).await?;
        let amount = to_base_units(&params.amount, info.decimals)?;

        let hash = writer.send(approve_tx(info.address, spender, amount)).await?;
        to_value(&Submitted {
            tx_hash: format!("{:?}", hash),
            from: checksum(&writer.address()),
            to: checksum(&spender),
            amount: params.amount,
            amount_raw: amount.to_string(),
            symbol: Some(info.symbol),
        })
    }
}
