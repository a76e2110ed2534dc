// src/blockchain/mod.rs

pub mod abi;
pub mod client;
pub mod environment;
pub mod erc20;
pub mod probe;
pub mod tokens;
pub mod units;

pub use client::{ChainRpc, JsonRpcChain};
pub use environment::{Environment, ReadEnv, WriteEnv};
