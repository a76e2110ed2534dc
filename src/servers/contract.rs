//! Contract server: code inspection, ABI detection and generic reads.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::{to_value, ServerContext};
use crate::blockchain::abi::{call_signature, coerce_tokens, decode_outputs, find_function, parse_abi};
use crate::blockchain::probe::{contract_owner, detect_abi, ContractAbi};
use crate::error::ToolError;
use crate::tools::{Action, ActionTool, Tool};
use crate::utils::{checksum, parse_address, validate_address};

pub fn tools(ctx: &ServerContext) -> Vec<Arc<dyn Tool>> {
    vec![
        ActionTool::shared(IsContract { ctx: ctx.clone() }),
        ActionTool::shared(DetectContractAbi { ctx: ctx.clone() }),
        ActionTool::shared(ReadContract { ctx: ctx.clone() }),
    ]
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressParams {
    #[validate(custom = "validate_address")]
    pub address: String,
}

fn address_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "address": { "type": "string", "description": "Contract address (0x...)" }
        },
        "required": ["address"]
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeInfo {
    pub address: String,
    pub is_contract: bool,
    pub code_size: usize,
}

pub struct IsContract {
    ctx: ServerContext,
}

#[async_trait]
impl Action for IsContract {
    type Params = AddressParams;
    const NAME: &'static str = "is_contract";
    const DESCRIPTION: &'static str = "Check whether an address holds deployed contract code.";

    fn input_schema() -> Value {
        address_schema()
    }

    async fn run(&self, params: AddressParams) -> Result<Value, ToolError> {
        let address = parse_address(&params.address)?;
        let code = self.ctx.env.reader().rpc().code(address).await?;
        to_value(&CodeInfo {
            address: checksum(&address),
            is_contract: !code.is_empty(),
            code_size: code.len(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedAbi {
    pub address: String,
    pub abi: ContractAbi,
    pub owner: Option<String>,
}

pub struct DetectContractAbi {
    ctx: ServerContext,
}

#[async_trait]
impl Action for DetectContractAbi {
    type Params = AddressParams;
    const NAME: &'static str = "detect_contract_abi";
    const DESCRIPTION: &'static str =
        "Identify which standard interface (ERC1155, ERC721, ERC20) a contract implements, and its owner() when it has one.";

    fn input_schema() -> Value {
        address_schema()
    }

    async fn run(&self, params: AddressParams) -> Result<Value, ToolError> {
        let address = parse_address(&params.address)?;
        let rpc = self.ctx.env.reader().rpc();
        let abi = detect_abi(rpc, address).await?;
        let owner = contract_owner(rpc, address).await;
        to_value(&DetectedAbi {
            address: checksum(&address),
            abi,
            owner: owner.as_ref().map(checksum),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReadContractParams {
    #[validate(custom = "validate_address")]
    pub address: String,
    /// JSON ABI, either as an array or as a string containing one.
    pub abi: Value,
    #[validate(length(min = 1))]
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

pub struct ReadContract {
    ctx: ServerContext,
}

#[async_trait]
impl Action for ReadContract {
    type Params = ReadContractParams;
    const NAME: &'static str = "read_contract";
    const DESCRIPTION: &'static str =
        "Call a view function using a caller-supplied ABI and return the decoded outputs.";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "address": { "type": "string", "description": "Contract address (0x...)" },
                "abi": { "description": "Contract ABI (JSON array or string)" },
                "function": { "type": "string", "description": "Function name" },
                "args": { "type": "array", "description": "Arguments in declaration order" }
            },
            "required": ["address", "abi", "function"]
        })
    }

    async fn run(&self, params: ReadContractParams) -> Result<Value, ToolError> {
        let address = parse_address(&params.address)?;
        let abi = match &params.abi {
            Value::String(raw) => parse_abi(raw)?,
            other => parse_abi(&other.to_string())?,
        };
        let func = find_function(&abi, &params.function, params.args.len())?;
        let tokens = coerce_tokens(func, &params.args)?;
        let data = func
            .encode_input(&tokens)
            .map_err(|e| ToolError::Validation(format!("failed to encode {}: {}", call_signature(func), e)))?;

        let out = self.ctx.env.reader().rpc().call(address, data.into()).await?;
        let result = decode_outputs(func, &out)?;
        Ok(json!({
            "address": checksum(&address),
            "function": call_signature(func),
            "result": result,
        }))
    }
}
