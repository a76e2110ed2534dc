// src/blockchain/abi.rs

//! Call encoding and typed result decoding.
//!
//! Each decoder accepts exactly one ABI return shape and yields a Rust value
//! or [`ToolError::Decode`]; callers pick the decoder that matches the method
//! they invoked instead of inspecting what came back.

use ethers_core::abi::{decode, encode, Abi, Function, ParamType, Token};
use ethers_core::types::{Address, Bytes, I256, U256};
use ethers_core::utils::keccak256;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::utils::{checksum, parse_address, parse_u256};

pub fn selector(signature: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(signature.as_bytes())[0..4]);
    sel
}

/// `selector(signature) ++ abi_encode(args)`.
pub fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut out = selector(signature).to_vec();
    out.extend(encode(args));
    Bytes::from(out)
}

fn decode_one(method: &str, kind: ParamType, data: &[u8]) -> Result<Token, ToolError> {
    if data.is_empty() {
        return Err(ToolError::decode(method, "empty return data"));
    }
    decode(&[kind], data)
        .map_err(|e| ToolError::decode(method, e))?
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::decode(method, "no value returned"))
}

pub fn decode_uint(method: &str, data: &[u8]) -> Result<U256, ToolError> {
    match decode_one(method, ParamType::Uint(256), data)? {
        Token::Uint(n) => Ok(n),
        other => Err(ToolError::decode(method, format!("expected uint256, got {:?}", other))),
    }
}

/// `uint8` results such as `decimals()`.
pub fn decode_u8(method: &str, data: &[u8]) -> Result<u8, ToolError> {
    let n = decode_uint(method, data)?;
    if n > U256::from(u8::MAX) {
        return Err(ToolError::decode(method, format!("{} does not fit in uint8", n)));
    }
    Ok(n.low_u32() as u8)
}

pub fn decode_bool(method: &str, data: &[u8]) -> Result<bool, ToolError> {
    match decode_one(method, ParamType::Bool, data)? {
        Token::Bool(b) => Ok(b),
        other => Err(ToolError::decode(method, format!("expected bool, got {:?}", other))),
    }
}

pub fn decode_address(method: &str, data: &[u8]) -> Result<Address, ToolError> {
    match decode_one(method, ParamType::Address, data)? {
        Token::Address(a) => Ok(a),
        other => Err(ToolError::decode(method, format!("expected address, got {:?}", other))),
    }
}

/// Text results (`name()`, `symbol()`, `tokenURI(uint256)`).
///
/// Two ABI variants exist in the wild: the standard dynamic `string`, and the
/// older `bytes32` form (zero-padded UTF-8). They are tried in that order.
pub fn decode_text(method: &str, data: &[u8]) -> Result<String, ToolError> {
    if let Ok(Token::String(s)) = decode_one(method, ParamType::String, data) {
        return Ok(s);
    }
    match decode_one(method, ParamType::FixedBytes(32), data)? {
        Token::FixedBytes(raw) => {
            let trimmed: Vec<u8> = raw.into_iter().take_while(|b| *b != 0).collect();
            String::from_utf8(trimmed).map_err(|e| ToolError::decode(method, e))
        }
        other => Err(ToolError::decode(method, format!("expected string, got {:?}", other))),
    }
}

/// Looks up `function_name` in a JSON ABI. Overloads resolve by argument count.
pub fn find_function<'a>(abi: &'a Abi, function_name: &str, arg_count: usize) -> Result<&'a Function, ToolError> {
    let overloads = abi
        .functions
        .get(function_name)
        .ok_or_else(|| ToolError::NotFound(format!("function '{}' in ABI", function_name)))?;
    overloads
        .iter()
        .find(|f| f.inputs.len() == arg_count)
        .ok_or_else(|| {
            ToolError::Validation(format!(
                "function '{}' takes {} argument(s), got {}",
                function_name,
                overloads[0].inputs.len(),
                arg_count
            ))
        })
}

/// `name(type,...)` without the output list `Function::signature` appends.
pub fn call_signature(func: &Function) -> String {
    let inputs: Vec<String> = func.inputs.iter().map(|p| p.kind.to_string()).collect();
    format!("{}({})", func.name, inputs.join(","))
}

pub fn parse_abi(abi_json: &str) -> Result<Abi, ToolError> {
    serde_json::from_str(abi_json).map_err(|e| ToolError::Validation(format!("invalid ABI JSON: {}", e)))
}

/// Coerces JSON arguments into ABI tokens following the function's inputs.
pub fn coerce_tokens(func: &Function, args: &[Value]) -> Result<Vec<Token>, ToolError> {
    if func.inputs.len() != args.len() {
        return Err(ToolError::Validation(format!(
            "arg count mismatch: expected {}, got {}",
            func.inputs.len(),
            args.len()
        )));
    }
    func.inputs
        .iter()
        .zip(args)
        .map(|(param, value)| coerce_token(&param.kind, value))
        .collect()
}

fn coerce_token(kind: &ParamType, value: &Value) -> Result<Token, ToolError> {
    let invalid = |expected: &str| {
        ToolError::Validation(format!("expected {} argument, got {}", expected, value))
    };
    let token = match kind {
        ParamType::Address => {
            let s = value.as_str().ok_or_else(|| invalid("address string"))?;
            Token::Address(parse_address(s)?)
        }
        ParamType::Uint(_) => Token::Uint(match value {
            Value::String(s) => parse_u256(s)?,
            Value::Number(n) => U256::from(n.as_u64().ok_or_else(|| invalid("unsigned integer"))?),
            _ => return Err(invalid("unsigned integer")),
        }),
        ParamType::Int(_) => {
            let s = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err(invalid("integer")),
            };
            let n = I256::from_dec_str(s.trim()).map_err(|_| invalid("integer"))?;
            Token::Int(n.into_raw())
        }
        ParamType::Bool => Token::Bool(value.as_bool().ok_or_else(|| invalid("boolean"))?),
        ParamType::String => Token::String(value.as_str().ok_or_else(|| invalid("string"))?.to_string()),
        ParamType::Bytes => Token::Bytes(hex_arg(value).ok_or_else(|| invalid("0x hex bytes"))?),
        ParamType::FixedBytes(size) => {
            let raw = hex_arg(value).ok_or_else(|| invalid("0x hex bytes"))?;
            if raw.len() != *size {
                return Err(invalid(&format!("bytes{}", size)));
            }
            Token::FixedBytes(raw)
        }
        ParamType::Array(inner) => {
            let items = value.as_array().ok_or_else(|| invalid("array"))?;
            Token::Array(items.iter().map(|v| coerce_token(inner, v)).collect::<Result<_, _>>()?)
        }
        ParamType::FixedArray(inner, len) => {
            let items = value.as_array().ok_or_else(|| invalid("array"))?;
            if items.len() != *len {
                return Err(invalid(&format!("array of length {}", len)));
            }
            Token::FixedArray(items.iter().map(|v| coerce_token(inner, v)).collect::<Result<_, _>>()?)
        }
        ParamType::Tuple(components) => {
            let items = value.as_array().ok_or_else(|| invalid("tuple array"))?;
            if items.len() != components.len() {
                return Err(invalid(&format!("tuple of {} elements", components.len())));
            }
            Token::Tuple(
                components
                    .iter()
                    .zip(items)
                    .map(|(k, v)| coerce_token(k, v))
                    .collect::<Result<_, _>>()?,
            )
        }
    };
    Ok(token)
}

fn hex_arg(value: &Value) -> Option<Vec<u8>> {
    let s = value.as_str()?;
    hex::decode(s.strip_prefix("0x")?).ok()
}

/// JSON rendering of decoded outputs: integers as decimal strings, addresses
/// checksummed, byte strings as 0x-hex.
pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(a) => json!(checksum(a)),
        Token::Uint(n) => json!(n.to_string()),
        Token::Int(n) => json!(I256::from_raw(*n).to_string()),
        Token::Bool(b) => json!(b),
        Token::String(s) => json!(s),
        Token::Bytes(b) | Token::FixedBytes(b) => json!(format!("0x{}", hex::encode(b))),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

/// Decodes raw return data through the function's declared outputs.
pub fn decode_outputs(func: &Function, data: &[u8]) -> Result<Value, ToolError> {
    if func.outputs.is_empty() {
        return Ok(Value::Array(vec![]));
    }
    let tokens = func
        .decode_output(data)
        .map_err(|e| ToolError::decode(&call_signature(func), e))?;
    let named = func.outputs.iter().all(|p| !p.name.is_empty());
    if named {
        let mut map = serde_json::Map::new();
        for (param, token) in func.outputs.iter().zip(&tokens) {
            map.insert(param.name.clone(), token_to_json(token));
        }
        Ok(Value::Object(map))
    } else if tokens.len() == 1 {
        Ok(token_to_json(&tokens[0]))
    } else {
        Ok(Value::Array(tokens.iter().map(token_to_json).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_known_values() {
        assert_eq!(hex::encode(selector("totalSupply()")), "18160ddd");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn text_decodes_string_and_bytes32_variants() {
        let as_string = encode(&[Token::String("Maker".into())]);
        assert_eq!(decode_text("name()", &as_string).unwrap(), "Maker");

        let mut word = b"MKR".to_vec();
        word.resize(32, 0);
        let as_bytes32 = encode(&[Token::FixedBytes(word)]);
        assert_eq!(decode_text("symbol()", &as_bytes32).unwrap(), "MKR");
    }

    #[test]
    fn address_results_decode() {
        let owner = Address::repeat_byte(0x42);
        let data = encode(&[Token::Address(owner)]);
        assert_eq!(decode_address("owner()", &data).unwrap(), owner);
        assert!(decode_address("owner()", &[]).is_err());
    }

    #[test]
    fn empty_return_data_is_a_decode_error() {
        assert!(matches!(decode_uint("totalSupply()", &[]), Err(ToolError::Decode { .. })));
    }

    #[test]
    fn oversized_decimals_are_rejected() {
        let data = encode(&[Token::Uint(U256::from(300u64))]);
        assert!(decode_u8("decimals()", &data).is_err());
        let data = encode(&[Token::Uint(U256::from(6u64))]);
        assert_eq!(decode_u8("decimals()", &data).unwrap(), 6);
    }
}
