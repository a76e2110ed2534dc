//! Chain collaborator module for EVM-compatible networks.
//!
//! [`ChainRpc`] is the seam every tool action talks through; [`JsonRpcChain`]
//! implements it with plain JSON-RPC over `reqwest`. Tests substitute stubs.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, TransactionRequest, H256, U256, U64};
use ethers_signers::{LocalWallet, Signer};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Query and submit operations against one chain.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Chain id this collaborator is bound to (e.g. `"1"`).
    fn chain_id(&self) -> &str;

    /// `eth_call` at the latest block; returns the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Native balance in wei.
    async fn balance(&self, address: Address) -> Result<U256>;

    /// Deployed bytecode; empty for externally owned accounts.
    async fn code(&self, address: Address) -> Result<Bytes>;

    /// Signs and broadcasts `tx` from `wallet`, returning the transaction hash.
    async fn send_transaction(&self, wallet: &LocalWallet, tx: TransactionRequest) -> Result<H256>;
}

/// [`ChainRpc`] over an HTTP JSON-RPC endpoint.
#[derive(Clone)]
pub struct JsonRpcChain {
    client: Client,
    rpc_url: String,
    chain_id: String,
}

impl JsonRpcChain {
    pub fn new(client: Client, rpc_url: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            client,
            rpc_url: rpc_url.into(),
            chain_id: chain_id.into(),
        }
    }

    /// Sends one JSON-RPC request and returns its `result`.
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        debug!("RPC {} -> {}", method, self.rpc_url);

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("{} returned a non-JSON body (HTTP {})", method, status))?;

        if let Some(err) = body.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(anyhow!("{} error: {}", method, message));
        }
        if !status.is_success() {
            return Err(anyhow!("{} failed with HTTP {}", method, status));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| anyhow!("{} response missing 'result' field", method))
    }

    async fn request_quantity(&self, method: &str, params: Value) -> Result<U256> {
        let result = self.request(method, params).await?;
        parse_quantity(&result).with_context(|| format!("{} returned an invalid quantity", method))
    }

    async fn request_bytes(&self, method: &str, params: Value) -> Result<Bytes> {
        let result = self.request(method, params).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| anyhow!("{} result is not a hex string", method))?;
        let raw = hex::decode(hex_str.trim_start_matches("0x"))
            .with_context(|| format!("{} returned invalid hex", method))?;
        Ok(Bytes::from(raw))
    }
}

/// Parses a JSON-RPC hex quantity (`"0x1b"`).
pub fn parse_quantity(value: &Value) -> Result<U256> {
    let s = value
        .as_str()
        .ok_or_else(|| anyhow!("expected hex string, got {}", value))?;
    let digits = s.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16).map_err(|e| anyhow!("invalid hex quantity '{}': {}", s, e))
}

#[async_trait]
impl ChainRpc for JsonRpcChain {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let params = json!([{ "to": to, "data": data }, "latest"]);
        self.request_bytes("eth_call", params).await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.request_quantity("eth_getBalance", json!([address, "latest"])).await
    }

    async fn code(&self, address: Address) -> Result<Bytes> {
        self.request_bytes("eth_getCode", json!([address, "latest"])).await
    }

    /// Steps run strictly in order: chain id, nonce, gas, gas price, sign,
    /// broadcast. The nonce is read from the node's pending state on every
    /// call; concurrent sends from one wallet are not coordinated here.
    async fn send_transaction(&self, wallet: &LocalWallet, tx: TransactionRequest) -> Result<H256> {
        let from_address = wallet.address();

        let chain_id = self.request("eth_chainId", json!([])).await?;
        let chain_id = parse_quantity(&chain_id).context("Failed to get chain_id from RPC")?;
        if chain_id.bits() > 64 {
            return Err(anyhow!("chain id {} does not fit in 64 bits", chain_id));
        }
        let chain_id = U64::from(chain_id.low_u64());

        let nonce = self
            .request_quantity("eth_getTransactionCount", json!([from_address, "pending"]))
            .await?;

        let mut tx = tx.from(from_address).nonce(nonce).chain_id(chain_id);

        // If gas is not provided, estimate it via eth_estimateGas
        if tx.gas.is_none() {
            let call_obj = serde_json::to_value(&tx)?;
            let gas = self.request_quantity("eth_estimateGas", json!([call_obj])).await?;
            tx = tx.gas(gas);
        }

        // If gas price not provided, fetch eth_gasPrice and use legacy gas_price
        if tx.gas_price.is_none() {
            let gas_price = self.request_quantity("eth_gasPrice", json!([])).await?;
            tx = tx.gas_price(gas_price);
        }

        let signature = wallet
            .clone()
            .with_chain_id(chain_id.as_u64())
            .sign_transaction(&tx.clone().into())
            .await
            .map_err(|e| anyhow!("Failed to sign transaction: {}", e))?;
        let raw_tx = tx.rlp_signed(&signature);

        let result = self
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(&raw_tx))]),
            )
            .await?;
        let tx_hash = result
            .as_str()
            .ok_or_else(|| anyhow!("Failed to extract transaction hash from response"))?;
        info!("Broadcast transaction {} from {:?}", tx_hash, from_address);
        tx_hash
            .parse::<H256>()
            .map_err(|e| anyhow!("Invalid transaction hash '{}': {}", tx_hash, e))
    }
}

/// Shared HTTP client used for the node and third-party APIs. The timeout is
/// the transport's concern, not the actions'.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("chain-mcp-tools/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_parse_from_hex() {
        assert_eq!(parse_quantity(&json!("0x1b")).unwrap(), U256::from(27u64));
        assert_eq!(parse_quantity(&json!("0x")).unwrap(), U256::zero());
        assert!(parse_quantity(&json!(27)).is_err());
        assert!(parse_quantity(&json!("0xzz")).is_err());
    }
}
