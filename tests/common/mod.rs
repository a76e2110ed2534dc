//! Shared fixtures: an in-memory chain and prebuilt server contexts.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chain_mcp_tools::{
    blockchain::{abi::selector, ChainRpc, Environment, ReadEnv, WriteEnv},
    build_registry,
    config::Config,
    servers::{ServerContext, ServerKind},
    AppState,
};
use ethers_core::abi::{encode, Token};
use ethers_core::types::{Address, Bytes, TransactionRequest, H256, U256};
use ethers_signers::LocalWallet;
use secrecy::SecretString;

/// Hardhat's first development key; never holds real funds.
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

pub const STRK: &str = "0xCa14007Eff0dB1f8135f4C25B34De49AB0d42766";

/// Chain stub that answers `eth_call` from canned responses keyed by full
/// calldata or by 4-byte selector, and records every request it sees.
#[derive(Default)]
pub struct StubChain {
    chain_id: String,
    by_calldata: HashMap<Vec<u8>, Bytes>,
    by_selector: HashMap<[u8; 4], Bytes>,
    balance: U256,
    code: Bytes,
    calls: Mutex<Vec<String>>,
    sent: Mutex<Vec<TransactionRequest>>,
}

impl StubChain {
    pub fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            ..Default::default()
        }
    }

    pub fn answer(mut self, signature: &str, data: Vec<u8>) -> Self {
        self.by_selector.insert(selector(signature), Bytes::from(data));
        self
    }

    pub fn answer_calldata(mut self, calldata: Vec<u8>, data: Vec<u8>) -> Self {
        self.by_calldata.insert(calldata, Bytes::from(data));
        self
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_code(mut self, code: Vec<u8>) -> Self {
        self.code = Bytes::from(code);
        self
    }

    /// Hex selectors of every `eth_call`, then `balance`/`code`/`send` markers.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ChainRpc for StubChain {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes> {
        let head: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| anyhow!("calldata shorter than a selector"))?;
        self.record(hex::encode(head));
        if let Some(answer) = self.by_calldata.get(data.as_ref()) {
            return Ok(answer.clone());
        }
        self.by_selector
            .get(&head)
            .cloned()
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn balance(&self, _address: Address) -> Result<U256> {
        self.record("balance".to_string());
        Ok(self.balance)
    }

    async fn code(&self, _address: Address) -> Result<Bytes> {
        self.record("code".to_string());
        Ok(self.code.clone())
    }

    async fn send_transaction(&self, _wallet: &LocalWallet, tx: TransactionRequest) -> Result<H256> {
        self.record("send".to_string());
        self.sent.lock().unwrap().push(tx);
        Ok(H256::repeat_byte(0xab))
    }
}

pub fn hex_selector(signature: &str) -> String {
    hex::encode(selector(signature))
}

pub fn uint(value: impl Into<U256>) -> Vec<u8> {
    encode(&[Token::Uint(value.into())])
}

pub fn string(value: &str) -> Vec<u8> {
    encode(&[Token::String(value.to_string())])
}

pub fn boolean(value: bool) -> Vec<u8> {
    encode(&[Token::Bool(value)])
}

pub fn read_only(chain: Arc<StubChain>) -> Environment {
    Environment::ReadOnly(ReadEnv::new(chain))
}

pub fn read_write(chain: Arc<StubChain>) -> Environment {
    let read = ReadEnv::new(chain);
    let key = SecretString::new(DEV_KEY.to_string());
    Environment::ReadWrite(WriteEnv::from_private_key(read, &key).unwrap())
}

pub fn context(env: Environment, config: Config) -> ServerContext {
    ServerContext::new(env, reqwest::Client::new(), Arc::new(config))
}

pub fn app_state(ctx: &ServerContext, kinds: &[ServerKind]) -> AppState {
    let (registry, _catalog) = build_registry(kinds, ctx).unwrap();
    AppState {
        config: ctx.config.clone(),
        registry: Arc::new(registry),
        router: None,
        environment: ctx.env.summary(),
    }
}
