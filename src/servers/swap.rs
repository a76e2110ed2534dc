//! Swap server: DEX aggregator quotes, quote-then-send swaps and bridge quotes.
//!
//! Quotes come from an 0x-compatible swap API and a LI.FI-compatible bridge
//! API. Amounts are validated against [`MIN_AMOUNT`] before any HTTP call.

use std::sync::Arc;

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, TransactionRequest, U256};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use validator::Validate;

use super::token::{resolve_onchain, TokenRef};
use super::{to_value, ServerContext};
use crate::blockchain::tokens::{TokenInfo, NATIVE_DECIMALS};
use crate::blockchain::units::{to_base_units, to_human_units, validate_min_amount, MIN_AMOUNT};
use crate::blockchain::ChainRpc;
use crate::error::ToolError;
use crate::tools::{Action, ActionTool, Tool};
use crate::utils::{checksum, normalize_chain_id, parse_address, parse_u256, validate_address};

/// Placeholder address aggregators use for the native currency.
pub const NATIVE_TOKEN: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

pub fn tools(ctx: &ServerContext) -> Vec<Arc<dyn Tool>> {
    vec![
        ActionTool::shared(GetSwapQuote { ctx: ctx.clone() }),
        ActionTool::shared(ExecuteSwap { ctx: ctx.clone() }),
        ActionTool::shared(GetBridgeQuote { ctx: ctx.clone() }),
    ]
}

fn is_native(token: &str) -> bool {
    let token = token.trim();
    token.eq_ignore_ascii_case("ETH") || token.eq_ignore_ascii_case(NATIVE_TOKEN)
}

/// Resolves `ETH`, a known symbol, or any ERC-20 address.
async fn resolve_asset(rpc: &dyn ChainRpc, token: &str) -> Result<TokenInfo, ToolError> {
    if is_native(token) {
        return Ok(TokenInfo {
            address: parse_address(NATIVE_TOKEN)?,
            decimals: NATIVE_DECIMALS,
            symbol: "ETH".to_string(),
        });
    }
    let token_ref = if token.trim().starts_with("0x") {
        TokenRef { symbol: None, address: Some(token.to_string()) }
    } else {
        TokenRef { symbol: Some(token.to_string()), address: None }
    };
    resolve_onchain(rpc, &token_ref).await
}

/// Sends a GET and decodes the body; non-2xx responses become errors that
/// carry the API's own message.
async fn get_json<T: DeserializeOwned>(api: &str, request: RequestBuilder) -> Result<T, ToolError> {
    let resp = request
        .send()
        .await
        .map_err(|e| ToolError::External(format!("{} request failed: {}", api, e)))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| ToolError::External(format!("{} response unreadable: {}", api, e)))?;
    debug!("{} responded {}: {}", api, status, body);

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                ["message", "reason", "error"]
                    .iter()
                    .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or(body);
        return Err(ToolError::External(format!("{} returned HTTP {}: {}", api, status.as_u16(), message)));
    }
    serde_json::from_str(&body).map_err(|e| ToolError::External(format!("{} returned an unexpected body: {}", api, e)))
}

fn with_key(request: RequestBuilder, header: &str, key: Option<&String>) -> RequestBuilder {
    match key {
        Some(key) => request.header(header, key),
        None => request,
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SwapParams {
    #[validate(length(min = 1))]
    pub sell_token: String,
    #[validate(length(min = 1))]
    pub buy_token: String,
    /// Human units of the sell token.
    #[validate(custom = "validate_min_amount")]
    pub sell_amount: String,
    #[validate(range(min = 1, max = 5000))]
    pub slippage_bps: Option<u32>,
}

fn swap_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sellToken": { "type": "string", "description": "Symbol, address, or ETH" },
            "buyToken": { "type": "string", "description": "Symbol, address, or ETH" },
            "sellAmount": {
                "type": "string",
                "description": format!("Amount of sellToken in human units (minimum {})", MIN_AMOUNT)
            },
            "slippageBps": { "type": "integer", "minimum": 1, "maximum": 5000 }
        },
        "required": ["sellToken", "buyToken", "sellAmount"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTransaction {
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    gas: Option<String>,
    #[serde(default)]
    gas_price: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAllowanceIssue {
    spender: Address,
}

#[derive(Debug, Default, Deserialize)]
struct ApiIssues {
    #[serde(default)]
    allowance: Option<ApiAllowanceIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiQuote {
    buy_amount: String,
    #[serde(default)]
    min_buy_amount: Option<String>,
    #[serde(default)]
    transaction: Option<ApiTransaction>,
    #[serde(default)]
    issues: ApiIssues,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub chain_id: String,
    pub sell_token: String,
    pub buy_token: String,
    pub sell_amount: String,
    pub sell_amount_raw: String,
    pub buy_amount: String,
    pub buy_amount_raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_buy_amount: Option<String>,
}

struct QuoteRequest {
    sell: TokenInfo,
    buy: TokenInfo,
    sell_amount: U256,
}

impl QuoteRequest {
    async fn resolve(ctx: &ServerContext, params: &SwapParams) -> Result<Self, ToolError> {
        let rpc = ctx.env.reader().rpc();
        let sell = resolve_asset(rpc, &params.sell_token).await?;
        let buy = resolve_asset(rpc, &params.buy_token).await?;
        if sell.address == buy.address {
            return Err(ToolError::Validation("sellToken and buyToken are the same token".to_string()));
        }
        let sell_amount = to_base_units(&params.sell_amount, sell.decimals)?;
        if sell_amount.is_zero() {
            return Err(ToolError::Validation(format!(
                "sellAmount {} rounds to zero at {} decimals",
                params.sell_amount, sell.decimals
            )));
        }
        Ok(Self { sell, buy, sell_amount })
    }

    /// `price` quotes are indicative; `quote` returns a signed-ready transaction.
    async fn fetch(
        &self,
        ctx: &ServerContext,
        endpoint: &str,
        taker: Option<Address>,
        slippage_bps: Option<u32>,
    ) -> Result<ApiQuote, ToolError> {
        let url = format!("{}/swap/allowance-holder/{}", ctx.config.swap_api_url, endpoint);
        let mut query = vec![
            ("chainId", ctx.env.reader().chain_id().to_string()),
            ("sellToken", checksum(&self.sell.address)),
            ("buyToken", checksum(&self.buy.address)),
            ("sellAmount", self.sell_amount.to_string()),
        ];
        if let Some(taker) = taker {
            query.push(("taker", checksum(&taker)));
        }
        if let Some(bps) = slippage_bps {
            query.push(("slippageBps", bps.to_string()));
        }

        let request = ctx.http.get(url).query(&query).header("0x-version", "v2");
        let request = with_key(request, "0x-api-key", ctx.config.swap_api_key.as_ref());
        get_json("swap API", request).await
    }

    fn summarize(&self, chain_id: &str, quote: &ApiQuote) -> Result<SwapQuote, ToolError> {
        let buy_raw = parse_u256(&quote.buy_amount)?;
        let min_buy = match &quote.min_buy_amount {
            Some(raw) => Some(to_human_units(parse_u256(raw)?, self.buy.decimals)),
            None => None,
        };
        Ok(SwapQuote {
            chain_id: chain_id.to_string(),
            sell_token: self.sell.symbol.clone(),
            buy_token: self.buy.symbol.clone(),
            sell_amount: to_human_units(self.sell_amount, self.sell.decimals),
            sell_amount_raw: self.sell_amount.to_string(),
            buy_amount: to_human_units(buy_raw, self.buy.decimals),
            buy_amount_raw: buy_raw.to_string(),
            min_buy_amount: min_buy,
        })
    }
}

pub struct GetSwapQuote {
    ctx: ServerContext,
}

#[async_trait]
impl Action for GetSwapQuote {
    type Params = SwapParams;
    const NAME: &'static str = "get_swap_quote";
    const DESCRIPTION: &'static str = "Get an indicative DEX aggregator price for selling one token for another.";

    fn input_schema() -> Value {
        swap_schema()
    }

    async fn run(&self, params: SwapParams) -> Result<Value, ToolError> {
        let request = QuoteRequest::resolve(&self.ctx, &params).await?;
        let taker = self.ctx.env.writer().ok().map(|w| w.address());
        let quote = request.fetch(&self.ctx, "price", taker, params.slippage_bps).await?;
        to_value(&request.summarize(self.ctx.env.reader().chain_id(), &quote)?)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapExecution {
    pub tx_hash: String,
    #[serde(flatten)]
    pub quote: SwapQuote,
}

fn optional_u256(field: &str, raw: Option<&String>) -> Result<Option<U256>, ToolError> {
    raw.map(|s| {
        parse_u256(s).map_err(|_| ToolError::External(format!("swap API returned an invalid {}: '{}'", field, s)))
    })
    .transpose()
}

pub struct ExecuteSwap {
    ctx: ServerContext,
}

#[async_trait]
impl Action for ExecuteSwap {
    type Params = SwapParams;
    const NAME: &'static str = "execute_swap";
    const DESCRIPTION: &'static str =
        "Quote a swap and submit it from the signing account. ERC-20 sells need a prior approval.";

    fn input_schema() -> Value {
        swap_schema()
    }

    async fn run(&self, params: SwapParams) -> Result<Value, ToolError> {
        let writer = self.ctx.env.writer()?;
        let request = QuoteRequest::resolve(&self.ctx, &params).await?;
        let quote = request
            .fetch(&self.ctx, "quote", Some(writer.address()), params.slippage_bps)
            .await?;

        if let Some(issue) = &quote.issues.allowance {
            return Err(ToolError::Precondition(format!(
                "{} allowance for spender {} is too low; run approve_token first",
                request.sell.symbol,
                checksum(&issue.spender)
            )));
        }
        let tx = quote
            .transaction
            .as_ref()
            .ok_or_else(|| ToolError::External("swap API quote has no transaction".to_string()))?;

        let mut request_tx = TransactionRequest::new().to(tx.to).data(tx.data.clone());
        if let Some(value) = optional_u256("value", tx.value.as_ref())? {
            request_tx = request_tx.value(value);
        }
        if let Some(gas) = optional_u256("gas", tx.gas.as_ref())? {
            request_tx = request_tx.gas(gas);
        }
        if let Some(price) = optional_u256("gasPrice", tx.gas_price.as_ref())? {
            request_tx = request_tx.gas_price(price);
        }

        let summary = request.summarize(writer.reader().chain_id(), &quote)?;
        let hash = writer.send(request_tx).await?;
        info!("Swap {} {} -> {} submitted: {:?}", summary.sell_amount, summary.sell_token, summary.buy_token, hash);
        to_value(&SwapExecution {
            tx_hash: format!("{:?}", hash),
            quote: summary,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BridgeParams {
    /// Destination chain id or alias.
    #[validate(length(min = 1))]
    pub to_chain: String,
    #[validate(length(min = 1))]
    pub from_token: String,
    /// Destination token symbol or address, passed through to the bridge API.
    #[validate(length(min = 1))]
    pub to_token: String,
    #[validate(custom = "validate_min_amount")]
    pub amount: String,
    /// Sender; defaults to the signing account.
    #[validate(custom = "validate_address")]
    pub from_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBridgeToken {
    symbol: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBridgeAction {
    to_token: ApiBridgeToken,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBridgeEstimate {
    to_amount: String,
    #[serde(default)]
    to_amount_min: Option<String>,
    #[serde(default)]
    execution_duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBridgeQuote {
    tool: String,
    action: ApiBridgeAction,
    estimate: ApiBridgeEstimate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeQuote {
    pub from_chain: String,
    pub to_chain: String,
    pub from_token: String,
    pub to_token: String,
    pub from_amount: String,
    pub to_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_amount_min: Option<String>,
    pub bridge: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
}

pub struct GetBridgeQuote {
    ctx: ServerContext,
}

#[async_trait]
impl Action for GetBridgeQuote {
    type Params = BridgeParams;
    const NAME: &'static str = "get_bridge_quote";
    const DESCRIPTION: &'static str = "Quote moving a token from the current chain to another chain.";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "toChain": { "type": "string", "description": "Destination chain id or alias" },
                "fromToken": { "type": "string", "description": "Symbol, address, or ETH on this chain" },
                "toToken": { "type": "string", "description": "Symbol or address on the destination chain" },
                "amount": { "type": "string", "description": format!("Human units (minimum {})", MIN_AMOUNT) },
                "fromAddress": { "type": "string", "description": "Sender (defaults to the signer)" }
            },
            "required": ["toChain", "fromToken", "toToken", "amount"]
        })
    }

    async fn run(&self, params: BridgeParams) -> Result<Value, ToolError> {
        let from_address = match params.from_address.as_deref() {
            Some(raw) => parse_address(raw)?,
            None => self.ctx.env.writer().map(|w| w.address()).map_err(|_| {
                ToolError::Validation("fromAddress is required when no signing account is configured".to_string())
            })?,
        };
        let from_chain = self.ctx.env.reader().chain_id().to_string();
        let to_chain = normalize_chain_id(&params.to_chain);

        let from = resolve_asset(self.ctx.env.reader().rpc(), &params.from_token).await?;
        let amount = to_base_units(&params.amount, from.decimals)?;

        let url = format!("{}/quote", self.ctx.config.bridge_api_url);
        let query = [
            ("fromChain", from_chain.clone()),
            ("toChain", to_chain.clone()),
            ("fromToken", checksum(&from.address)),
            ("toToken", params.to_token.clone()),
            ("fromAmount", amount.to_string()),
            ("fromAddress", checksum(&from_address)),
        ];
        let request = bridge_request(&self.ctx.http, &url, &query, self.ctx.config.bridge_api_key.as_ref());
        let quote: ApiBridgeQuote = get_json("bridge API", request).await?;

        let to_decimals = quote.action.to_token.decimals;
        let to_amount = parse_u256(&quote.estimate.to_amount)?;
        let to_amount_min = match &quote.estimate.to_amount_min {
            Some(raw) => Some(to_human_units(parse_u256(raw)?, to_decimals)),
            None => None,
        };
        to_value(&BridgeQuote {
            from_chain,
            to_chain,
            from_token: from.symbol,
            to_token: quote.action.to_token.symbol,
            from_amount: to_human_units(amount, from.decimals),
            to_amount: to_human_units(to_amount, to_decimals),
            to_amount_min,
            bridge: quote.tool,
            estimated_duration_secs: quote.estimate.execution_duration.map(|d| d.max(0.0).round() as u64),
        })
    }
}

fn bridge_request(http: &Client, url: &str, query: &[(&str, String)], key: Option<&String>) -> RequestBuilder {
    with_key(http.get(url).query(query), "x-lifi-api-key", key)
}
