//! Token server: table lookups, ERC-20 reads and amount conversion.

use std::sync::Arc;

use async_trait::async_trait;
use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::{to_value, ServerContext};
use crate::blockchain::erc20::Erc20;
use crate::blockchain::tokens::{self, TokenInfo, NATIVE_DECIMALS};
use crate::blockchain::units::{to_base_units, to_human_units, validate_decimal};
use crate::blockchain::ChainRpc;
use crate::error::ToolError;
use crate::tools::{Action, ActionTool, Tool};
use crate::utils::{checksum, parse_address, parse_u256, validate_address};

pub fn tools(ctx: &ServerContext) -> Vec<Arc<dyn Tool>> {
    vec![
        ActionTool::shared(ResolveToken { ctx: ctx.clone() }),
        ActionTool::shared(GetTotalSupply { ctx: ctx.clone() }),
        ActionTool::shared(GetTokenMetadata { ctx: ctx.clone() }),
        ActionTool::shared(GetTokenBalance { ctx: ctx.clone() }),
        ActionTool::shared(GetNativeBalance { ctx: ctx.clone() }),
        ActionTool::shared(GetTokenAllowance { ctx: ctx.clone() }),
        ActionTool::shared(ConvertAmount { ctx: ctx.clone() }),
    ]
}

/// `symbol` / `address` pair accepted by every token-addressed tool.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct TokenRef {
    #[validate(length(min = 1, max = 32))]
    pub symbol: Option<String>,
    #[validate(custom = "validate_address")]
    pub address: Option<String>,
}

impl TokenRef {
    fn schema_properties() -> Value {
        json!({
            "symbol": { "type": "string", "description": "Token symbol, e.g. USDC (case-insensitive)" },
            "address": { "type": "string", "description": "Token contract address (0x...)" }
        })
    }
}

/// Table lookup first; an address missing from the table is read on chain.
pub async fn resolve_onchain(rpc: &dyn ChainRpc, token: &TokenRef) -> Result<TokenInfo, ToolError> {
    let chain_id = rpc.chain_id();
    match tokens::resolve(chain_id, token.symbol.as_deref(), token.address.as_deref()) {
        Ok(info) => Ok(info),
        Err(ToolError::NotFound(reason)) => {
            let Some(raw) = token.address.as_deref() else {
                return Err(ToolError::NotFound(reason));
            };
            let address = parse_address(raw)?;
            let erc20 = Erc20::new(rpc, address);
            let decimals = erc20.decimals().await?;
            let symbol = erc20.symbol().await?;
            let info = TokenInfo { address, decimals, symbol };
            tokens::check_symbol(&info, token.symbol.as_deref())?;
            Ok(info)
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenView {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
    pub chain_id: String,
}

impl TokenView {
    fn new(info: &TokenInfo, chain_id: &str) -> Self {
        Self {
            symbol: info.symbol.clone(),
            address: checksum(&info.address),
            decimals: info.decimals,
            chain_id: chain_id.to_string(),
        }
    }
}

pub struct ResolveToken {
    ctx: ServerContext,
}

#[async_trait]
impl Action for ResolveToken {
    type Params = TokenRef;
    const NAME: &'static str = "resolve_token";
    const DESCRIPTION: &'static str =
        "Look up a known token by symbol or address and return its address, symbol and decimals.";

    fn input_schema() -> Value {
        json!({ "type": "object", "properties": TokenRef::schema_properties() })
    }

    async fn run(&self, params: TokenRef) -> Result<Value, ToolError> {
        let chain_id = self.ctx.env.reader().chain_id();
        let info = tokens::resolve(chain_id, params.symbol.as_deref(), params.address.as_deref())?;
        to_value(&TokenView::new(&info, chain_id))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalSupply {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
    pub total_supply: String,
    pub total_supply_raw: String,
}

pub struct GetTotalSupply {
    ctx: ServerContext,
}

#[async_trait]
impl Action for GetTotalSupply {
    type Params = TokenRef;
    const NAME: &'static str = "get_total_supply";
    const DESCRIPTION: &'static str = "Get the total supply of an ERC-20 token in human units.";

    fn input_schema() -> Value {
        json!({ "type": "object", "properties": TokenRef::schema_properties() })
    }

    async fn run(&self, params: TokenRef) -> Result<Value, ToolError> {
        let rpc = self.ctx.env.reader().rpc();
        let info = resolve_onchain(rpc, &params).await?;
        let raw = Erc20::new(rpc, info.address).total_supply().await?;
        to_value(&TotalSupply {
            symbol: info.symbol,
            address: checksum(&info.address),
            decimals: info.decimals,
            total_supply: to_human_units(raw, info.decimals),
            total_supply_raw: raw.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: String,
    pub address: String,
}

pub struct GetTokenMetadata {
    ctx: ServerContext,
}

#[async_trait]
impl Action for GetTokenMetadata {
    type Params = TokenRef;
    const NAME: &'static str = "get_token_metadata";
    const DESCRIPTION: &'static str = "Read name, symbol, decimals and total supply from an ERC-20 contract.";

    fn input_schema() -> Value {
        json!({ "type": "object", "properties": TokenRef::schema_properties() })
    }

    async fn run(&self, params: TokenRef) -> Result<Value, ToolError> {
        let rpc = self.ctx.env.reader().rpc();
        let address = resolve_onchain(rpc, &params).await?.address;
        let erc20 = Erc20::new(rpc, address);

        let name = erc20.name().await?;
        let symbol = erc20.symbol().await?;
        let decimals = erc20.decimals().await?;
        let supply = erc20.total_supply().await?;
        to_value(&TokenMetadata {
            name,
            symbol,
            decimals,
            total_supply: to_human_units(supply, decimals),
            address: checksum(&address),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub owner: String,
    pub symbol: String,
    pub balance: String,
    pub balance_raw: String,
    pub decimals: u8,
}

/// The explicit owner, or the signer's account when none is given.
fn owner_or_signer(ctx: &ServerContext, owner: Option<&str>) -> Result<Address, ToolError> {
    match owner {
        Some(raw) => parse_address(raw),
        None => ctx.env.writer().map(|w| w.address()).map_err(|_| {
            ToolError::Validation("owner is required when no signing account is configured".to_string())
        }),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenBalanceParams {
    #[validate(custom = "validate_address")]
    pub owner: Option<String>,
    #[serde(flatten)]
    #[validate]
    pub token: TokenRef,
}

pub struct GetTokenBalance {
    ctx: ServerContext,
}

#[async_trait]
impl Action for GetTokenBalance {
    type Params = TokenBalanceParams;
    const NAME: &'static str = "get_token_balance";
    const DESCRIPTION: &'static str =
        "Get an account's ERC-20 balance. Defaults to the configured signer's account.";

    fn input_schema() -> Value {
        let mut props = TokenRef::schema_properties();
        props["owner"] = json!({ "type": "string", "description": "Account to query (0x...)" });
        json!({ "type": "object", "properties": props })
    }

    async fn run(&self, params: TokenBalanceParams) -> Result<Value, ToolError> {
        let owner = owner_or_signer(&self.ctx, params.owner.as_deref())?;
        let rpc = self.ctx.env.reader().rpc();
        let info = resolve_onchain(rpc, &params.token).await?;
        let raw = Erc20::new(rpc, info.address).balance_of(owner).await?;
        to_value(&Balance {
            owner: checksum(&owner),
            symbol: info.symbol,
            balance: to_human_units(raw, info.decimals),
            balance_raw: raw.to_string(),
            decimals: info.decimals,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NativeBalanceParams {
    #[validate(custom = "validate_address")]
    pub address: Option<String>,
}

pub struct GetNativeBalance {
    ctx: ServerContext,
}

#[async_trait]
impl Action for GetNativeBalance {
    type Params = NativeBalanceParams;
    const NAME: &'static str = "get_native_balance";
    const DESCRIPTION: &'static str =
        "Get an account's native currency balance. Defaults to the configured signer's account.";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "address": { "type": "string", "description": "Account to query (0x...)" }
            }
        })
    }

    async fn run(&self, params: NativeBalanceParams) -> Result<Value, ToolError> {
        let owner = owner_or_signer(&self.ctx, params.address.as_deref())?;
        let raw = self.ctx.env.reader().rpc().balance(owner).await?;
        to_value(&Balance {
            owner: checksum(&owner),
            symbol: "ETH".to_string(),
            balance: to_human_units(raw, NATIVE_DECIMALS),
            balance_raw: raw.to_string(),
            decimals: NATIVE_DECIMALS,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AllowanceParams {
    #[validate(custom = "validate_address")]
    pub owner: Option<String>,
    #[validate(custom = "validate_address")]
    pub spender: String,
    #[serde(flatten)]
    #[validate]
    pub token: TokenRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allowance {
    pub owner: String,
    pub spender: String,
    pub symbol: String,
    pub allowance: String,
    pub allowance_raw: String,
}

pub struct GetTokenAllowance {
    ctx: ServerContext,
}

#[async_trait]
impl Action for GetTokenAllowance {
    type Params = AllowanceParams;
    const NAME: &'static str = "get_token_allowance";
    const DESCRIPTION: &'static str = "Get how much of a token a spender may move on behalf of an owner.";

    fn input_schema() -> Value {
        let mut props = TokenRef::schema_properties();
        props["owner"] = json!({ "type": "string", "description": "Token owner (defaults to the signer)" });
        props["spender"] = json!({ "type": "string", "description": "Approved spender (0x...)" });
        json!({ "type": "object", "properties": props, "required": ["spender"] })
    }

    async fn run(&self, params: AllowanceParams) -> Result<Value, ToolError> {
        let owner = owner_or_signer(&self.ctx, params.owner.as_deref())?;
        let spender = parse_address(&params.spender)?;
        let rpc = self.ctx.env.reader().rpc();
        let info = resolve_onchain(rpc, &params.token).await?;
        let raw = Erc20::new(rpc, info.address).allowance(owner, spender).await?;
        to_value(&Allowance {
            owner: checksum(&owner),
            spender: checksum(&spender),
            symbol: info.symbol,
            allowance: to_human_units(raw, info.decimals),
            allowance_raw: raw.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    ToBase,
    ToHuman,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConvertParams {
    #[validate(custom = "validate_decimal")]
    pub amount: String,
    pub direction: Direction,
    /// Overrides the token's decimals; required when no token is given.
    pub decimals: Option<u8>,
    #[serde(flatten)]
    #[validate]
    pub token: TokenRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub input: String,
    pub output: String,
    pub decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

pub struct ConvertAmount {
    ctx: ServerContext,
}

#[async_trait]
impl Action for ConvertAmount {
    type Params = ConvertParams;
    const NAME: &'static str = "convert_amount";
    const DESCRIPTION: &'static str =
        "Convert an amount between base units (integer on chain) and human units (decimal string).";

    fn input_schema() -> Value {
        let mut props = TokenRef::schema_properties();
        props["amount"] = json!({ "type": "string", "description": "Amount to convert" });
        props["direction"] = json!({ "type": "string", "enum": ["toBase", "toHuman"] });
        props["decimals"] = json!({ "type": "integer", "minimum": 0, "maximum": 255 });
        json!({ "type": "object", "properties": props, "required": ["amount", "direction"] })
    }

    async fn run(&self, params: ConvertParams) -> Result<Value, ToolError> {
        let (decimals, symbol) = match params.decimals {
            Some(d) => (d, None),
            None => {
                if params.token.symbol.is_none() && params.token.address.is_none() {
                    return Err(ToolError::Validation(
                        "decimals or a token symbol/address is required".to_string(),
                    ));
                }
                let info = resolve_onchain(self.ctx.env.reader().rpc(), &params.token).await?;
                (info.decimals, Some(info.symbol))
            }
        };

        let output = match params.direction {
            Direction::ToBase => to_base_units(&params.amount, decimals)?.to_string(),
            Direction::ToHuman => to_human_units(parse_u256(&params.amount)?, decimals),
        };
        to_value(&Conversion {
            input: params.amount,
            output,
            decimals,
            symbol,
        })
    }
}
