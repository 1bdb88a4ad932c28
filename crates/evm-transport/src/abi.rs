//! Solidity ABI encoding for constructor arguments and function calls.
//!
//! Values are typed ([`AbiValue`]) and checked against the parameter list of
//! the interface entry before encoding, so a shape mismatch fails before any
//! transaction is built.

use std::fmt;

use alloy_primitives::{keccak256, Address, U256};
use evm_deployer_types::{AbiParam, InterfaceDescriptor};

/// A typed ABI argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn uint(value: u64) -> Self {
        AbiValue::Uint(U256::from(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        AbiValue::String(value.into())
    }

    fn kind_name(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Uint(_) => "uint",
            AbiValue::Bool(_) => "bool",
            AbiValue::String(_) => "string",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::Array(_) => "array",
            AbiValue::Tuple(_) => "tuple",
        }
    }
}

/// Encoding failure, attributed to the argument path (`arg[2].1[0]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    UnknownMethod(String),
    ArityMismatch {
        field: String,
        expected: usize,
        got: usize,
    },
    TypeMismatch {
        field: String,
        expected: String,
        got: &'static str,
    },
    Unsupported {
        field: String,
        kind: String,
    },
}

impl fmt::Display for AbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiError::UnknownMethod(method) => {
                write!(f, "interface has no function '{}'", method)
            }
            AbiError::ArityMismatch {
                field,
                expected,
                got,
            } => write!(
                f,
                "{}: arity mismatch, expected {} values, got {}",
                field, expected, got
            ),
            AbiError::TypeMismatch {
                field,
                expected,
                got,
            } => write!(f, "{}: expected {}, got {}", field, expected, got),
            AbiError::Unsupported { field, kind } => {
                write!(f, "{}: unsupported abi type '{}'", field, kind)
            }
        }
    }
}

impl std::error::Error for AbiError {}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector followed by the encoded arguments for `method` on `interface`.
///
/// `method` is either a bare name or a full signature such as
/// `poolAddresses(uint256)`.
pub fn encode_call(
    interface: &InterfaceDescriptor,
    method: &str,
    args: &[AbiValue],
) -> Result<Vec<u8>, AbiError> {
    let entry = interface
        .function(method)
        .ok_or_else(|| AbiError::UnknownMethod(method.to_string()))?;
    let signature = entry
        .signature()
        .ok_or_else(|| AbiError::UnknownMethod(method.to_string()))?;

    let mut out = selector(&signature).to_vec();
    out.extend(encode_params(&entry.inputs, args)?);
    Ok(out)
}

/// Encoded constructor arguments. A descriptor without a constructor entry
/// accepts only an empty argument list.
pub fn encode_constructor(
    interface: &InterfaceDescriptor,
    args: &[AbiValue],
) -> Result<Vec<u8>, AbiError> {
    match interface.constructor() {
        Some(entry) => encode_params(&entry.inputs, args),
        None if args.is_empty() => Ok(Vec::new()),
        None => Err(AbiError::ArityMismatch {
            field: "constructor".to_string(),
            expected: 0,
            got: args.len(),
        }),
    }
}

/// Head/tail encoding of a parameter list.
pub fn encode_params(params: &[AbiParam], values: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
    encode_sequence(params, values, "arg")
}

fn encode_sequence(
    params: &[AbiParam],
    values: &[AbiValue],
    field: &str,
) -> Result<Vec<u8>, AbiError> {
    if params.len() != values.len() {
        return Err(AbiError::ArityMismatch {
            field: field.to_string(),
            expected: params.len(),
            got: values.len(),
        });
    }

    let mut head_size = 0usize;
    for (index, param) in params.iter().enumerate() {
        let path = format!("{field}[{index}]");
        head_size += if is_dynamic(param, &path)? {
            32
        } else {
            static_size(param, &path)?
        };
    }

    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();
    for (index, (param, value)) in params.iter().zip(values).enumerate() {
        let path = format!("{field}[{index}]");
        if is_dynamic(param, &path)? {
            head.extend(u256_word(U256::from(head_size + tail.len())));
            tail.extend(encode_dynamic(param, value, &path)?);
        } else {
            head.extend(encode_static(param, value, &path)?);
        }
    }

    head.extend(tail);
    Ok(head)
}

/// Splits `T[]` / `T[N]` into the element parameter and optional length.
fn split_array(param: &AbiParam, field: &str) -> Result<Option<(AbiParam, Option<usize>)>, AbiError> {
    let kind = param.kind.trim();
    let Some(open) = kind.rfind('[') else {
        return Ok(None);
    };
    if !kind.ends_with(']') {
        return Err(AbiError::Unsupported {
            field: field.to_string(),
            kind: kind.to_string(),
        });
    }
    let inner = &kind[open + 1..kind.len() - 1];
    let len = if inner.is_empty() {
        None
    } else {
        Some(inner.parse::<usize>().map_err(|_| AbiError::Unsupported {
            field: field.to_string(),
            kind: kind.to_string(),
        })?)
    };
    let element = AbiParam {
        name: String::new(),
        kind: kind[..open].to_string(),
        components: param.components.clone(),
    };
    Ok(Some((element, len)))
}

fn is_dynamic(param: &AbiParam, field: &str) -> Result<bool, AbiError> {
    if let Some((element, len)) = split_array(param, field)? {
        return match len {
            None => Ok(true),
            Some(_) => is_dynamic(&element, field),
        };
    }
    match param.kind.trim() {
        "string" | "bytes" => Ok(true),
        "tuple" => {
            for component in &param.components {
                if is_dynamic(component, field)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Ok(false),
    }
}

fn static_size(param: &AbiParam, field: &str) -> Result<usize, AbiError> {
    if let Some((element, Some(len))) = split_array(param, field)? {
        return Ok(len * static_size(&element, field)?);
    }
    if param.kind.trim() == "tuple" {
        let mut total = 0;
        for component in &param.components {
            total += static_size(component, field)?;
        }
        return Ok(total);
    }
    Ok(32)
}

fn mismatch(field: &str, expected: &str, value: &AbiValue) -> AbiError {
    AbiError::TypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        got: value.kind_name(),
    }
}

fn encode_static(param: &AbiParam, value: &AbiValue, field: &str) -> Result<Vec<u8>, AbiError> {
    if let Some((element, Some(len))) = split_array(param, field)? {
        let AbiValue::Array(items) = value else {
            return Err(mismatch(field, &param.kind, value));
        };
        if items.len() != len {
            return Err(AbiError::ArityMismatch {
                field: field.to_string(),
                expected: len,
                got: items.len(),
            });
        }
        let mut out = Vec::new();
        for (index, item) in items.iter().enumerate() {
            out.extend(encode_static(&element, item, &format!("{field}[{index}]"))?);
        }
        return Ok(out);
    }

    let kind = param.kind.trim();
    match (kind, value) {
        ("tuple", AbiValue::Tuple(items)) => {
            if items.len() != param.components.len() {
                return Err(AbiError::ArityMismatch {
                    field: field.to_string(),
                    expected: param.components.len(),
                    got: items.len(),
                });
            }
            let mut out = Vec::new();
            for (index, (component, item)) in param.components.iter().zip(items).enumerate() {
                out.extend(encode_static(component, item, &format!("{field}.{index}"))?);
            }
            Ok(out)
        }
        ("address", AbiValue::Address(address)) => {
            let mut word = vec![0u8; 32];
            word[12..].copy_from_slice(address.as_slice());
            Ok(word)
        }
        ("bool", AbiValue::Bool(flag)) => Ok(u256_word(U256::from(u8::from(*flag)))),
        (k, AbiValue::Uint(number)) if k.starts_with("uint") || k.starts_with("int") => {
            Ok(u256_word(*number))
        }
        (k, AbiValue::Bytes(bytes)) if k.starts_with("bytes") => {
            let width = k
                .trim_start_matches("bytes")
                .parse::<usize>()
                .ok()
                .filter(|w| (1..=32).contains(w))
                .ok_or_else(|| AbiError::Unsupported {
                    field: field.to_string(),
                    kind: k.to_string(),
                })?;
            if bytes.len() > width {
                return Err(mismatch(field, k, value));
            }
            let mut word = vec![0u8; 32];
            word[..bytes.len()].copy_from_slice(bytes);
            Ok(word)
        }
        ("address" | "bool" | "tuple", _) => Err(mismatch(field, kind, value)),
        (k, _) if k.starts_with("uint") || k.starts_with("int") || k.starts_with("bytes") => {
            Err(mismatch(field, k, value))
        }
        _ => Err(AbiError::Unsupported {
            field: field.to_string(),
            kind: kind.to_string(),
        }),
    }
}

fn encode_dynamic(param: &AbiParam, value: &AbiValue, field: &str) -> Result<Vec<u8>, AbiError> {
    if let Some((element, len)) = split_array(param, field)? {
        let AbiValue::Array(items) = value else {
            return Err(mismatch(field, &param.kind, value));
        };
        if let Some(expected) = len {
            if items.len() != expected {
                return Err(AbiError::ArityMismatch {
                    field: field.to_string(),
                    expected,
                    got: items.len(),
                });
            }
        }
        let repeated = vec![element; items.len()];
        let mut out = Vec::new();
        if len.is_none() {
            out.extend(u256_word(U256::from(items.len())));
        }
        out.extend(encode_sequence(&repeated, items, field)?);
        return Ok(out);
    }

    match (param.kind.trim(), value) {
        ("tuple", AbiValue::Tuple(items)) => encode_sequence(&param.components, items, field),
        ("string", AbiValue::String(text)) => Ok(dynamic_bytes(text.as_bytes())),
        ("bytes", AbiValue::Bytes(bytes)) => Ok(dynamic_bytes(bytes)),
        (kind, _) => Err(mismatch(field, kind, value)),
    }
}

/// Length word followed by the payload zero-padded to a 32-byte boundary.
fn dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = u256_word(U256::from(bytes.len()));
    out.extend_from_slice(bytes);
    let padding = (32 - bytes.len() % 32) % 32;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

fn u256_word(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}

/// Reads the first return word as an address.
///
/// The 12 high bytes must be zero.
pub fn decode_address_word(data: &[u8]) -> Option<Address> {
    let word = data.get(..32)?;
    if word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_slice(&word[12..]))
}

/// Reads the first return word as an unsigned integer.
pub fn decode_uint_word(data: &[u8]) -> Option<U256> {
    let word = data.get(..32)?;
    Some(U256::from_be_slice(word))
}

/// Encodes a single address as a return word. Used by the local chain.
pub fn address_word(address: Address) -> Vec<u8> {
    let mut word = vec![0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}
