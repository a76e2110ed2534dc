//! Environment handles passed into tool actions.
//!
//! A [`ReadEnv`] can only query; a [`WriteEnv`] can also sign. Write paths take
//! `&WriteEnv`, so the only way to reach one from a shared [`Environment`] is
//! [`Environment::writer`], which refuses read-only handles up front.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use ethers_core::types::{Address, TransactionRequest, H256, U256};
use ethers_signers::{LocalWallet, Signer};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::client::ChainRpc;
use crate::error::ToolError;

/// Query-only capability.
#[derive(Clone)]
pub struct ReadEnv {
    rpc: Arc<dyn ChainRpc>,
}

impl ReadEnv {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    pub fn rpc(&self) -> &dyn ChainRpc {
        self.rpc.as_ref()
    }

    pub fn chain_id(&self) -> &str {
        self.rpc.chain_id()
    }
}

/// Query and sign capability for a single account.
#[derive(Clone)]
pub struct WriteEnv {
    read: ReadEnv,
    wallet: LocalWallet,
}

impl WriteEnv {
    pub fn new(read: ReadEnv, wallet: LocalWallet) -> Self {
        Self { read, wallet }
    }

    /// Builds a signer from a hex private key (with or without `0x`).
    pub fn from_private_key(read: ReadEnv, private_key: &SecretString) -> Result<Self> {
        let key = private_key.expose_secret();
        let wallet = LocalWallet::from_str(key.trim().trim_start_matches("0x"))
            .map_err(|e| anyhow!("TX_PRIVATE_KEY is not a valid secp256k1 key: {}", e))?;
        let wallet = match read.chain_id().parse::<u64>() {
            Ok(id) => wallet.with_chain_id(id),
            Err(_) => wallet,
        };
        Ok(Self::new(read, wallet))
    }

    pub fn reader(&self) -> &ReadEnv {
        &self.read
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Signs and broadcasts through the chain collaborator.
    pub async fn send(&self, tx: TransactionRequest) -> Result<H256, ToolError> {
        Ok(self.read.rpc().send_transaction(&self.wallet, tx).await?)
    }

    pub async fn native_balance(&self) -> Result<U256, ToolError> {
        Ok(self.read.rpc().balance(self.address()).await?)
    }
}

/// The handle a tool server is built with.
#[derive(Clone)]
pub enum Environment {
    ReadOnly(ReadEnv),
    ReadWrite(WriteEnv),
}

impl Environment {
    pub fn reader(&self) -> &ReadEnv {
        match self {
            Environment::ReadOnly(read) => read,
            Environment::ReadWrite(write) => write.reader(),
        }
    }

    /// The signing handle, or a precondition failure for read-only setups.
    pub fn writer(&self) -> Result<&WriteEnv, ToolError> {
        match self {
            Environment::ReadWrite(write) => Ok(write),
            Environment::ReadOnly(_) => Err(ToolError::Precondition(
                "this action signs transactions; configure TX_PRIVATE_KEY to enable it".to_string(),
            )),
        }
    }

    pub fn can_sign(&self) -> bool {
        matches!(self, Environment::ReadWrite(_))
    }

    pub fn summary(&self) -> EnvironmentSummary {
        EnvironmentSummary {
            chain_id: self.reader().chain_id().to_string(),
            can_sign: self.can_sign(),
            account: match self {
                Environment::ReadWrite(write) => Some(crate::utils::checksum(&write.address())),
                Environment::ReadOnly(_) => None,
            },
        }
    }
}

/// Serializable description of an environment, carried in routing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSummary {
    pub chain_id: String,
    pub can_sign: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub account: Option<String>,
}
