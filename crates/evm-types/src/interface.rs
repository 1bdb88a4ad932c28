//! ABI interface descriptors.
//!
//! Parses the `abi` array of a compiler artifact and derives canonical
//! function signatures (`initialize((address,string,...))`) used for selector
//! computation. Human-readable fragments such as
//! `function mint(address,uint256)` are accepted for small ad-hoc interfaces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One parameter of an ABI function, event or constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    pub fn new(kind: &str) -> Self {
        Self {
            name: String::new(),
            kind: kind.to_string(),
            components: Vec::new(),
        }
    }

    /// Canonical type string, expanding tuples into their component list.
    pub fn canonical_type(&self) -> String {
        let kind: String = self.kind.chars().filter(|c| !c.is_whitespace()).collect();
        if let Some(suffix) = kind.strip_prefix("tuple") {
            let inner = self
                .components
                .iter()
                .map(AbiParam::canonical_type)
                .collect::<Vec<_>>()
                .join(",");
            return format!("({inner}){suffix}");
        }
        match kind.as_str() {
            "uint" => "uint256".to_string(),
            "int" => "int256".to_string(),
            _ => kind,
        }
    }
}

/// A single entry of an ABI descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<AbiParam>,
    #[serde(
        rename = "stateMutability",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_mutability: Option<String>,
}

impl AbiEntry {
    pub fn is_function(&self) -> bool {
        self.entry_type == "function"
    }

    /// Canonical signature `name(type,...)`. `None` for unnamed entries.
    pub fn signature(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        let args = self
            .inputs
            .iter()
            .map(AbiParam::canonical_type)
            .collect::<Vec<_>>()
            .join(",");
        Some(format!("{name}({args})"))
    }

    /// Parse a flat human-readable fragment like `function mint(address,uint256)`.
    ///
    /// Tuple parameters are not supported in this form.
    pub fn parse_fragment(fragment: &str) -> Result<Self, String> {
        let trimmed = fragment.trim();
        let body = trimmed.strip_prefix("function ").unwrap_or(trimmed).trim();
        let open = body
            .find('(')
            .ok_or_else(|| format!("fragment `{fragment}` is missing `(`"))?;
        let close = body[open..]
            .find(')')
            .map(|idx| idx + open)
            .ok_or_else(|| format!("fragment `{fragment}` is missing `)`"))?;
        let name = body[..open].trim();
        if name.is_empty() {
            return Err(format!("fragment `{fragment}` has no function name"));
        }
        let params = &body[open + 1..close];
        if params.contains('(') {
            return Err(format!("fragment `{fragment}` uses tuple parameters"));
        }
        let inputs = params
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            // `address owner` -> type is the first word
            .map(|p| AbiParam::new(p.split_whitespace().next().unwrap_or(p)))
            .collect();
        let state_mutability = if body[close..].contains(" view") {
            Some("view".to_string())
        } else {
            None
        };
        Ok(Self {
            entry_type: "function".to_string(),
            name: Some(name.to_string()),
            inputs,
            outputs: Vec::new(),
            state_mutability,
        })
    }
}

/// The interface (ABI) of a compiled unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceDescriptor {
    entries: Vec<AbiEntry>,
}

impl InterfaceDescriptor {
    pub fn new(entries: Vec<AbiEntry>) -> Self {
        Self { entries }
    }

    /// Accept either a bare ABI array or an artifact object with an `abi` field.
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        let entries = match value.get("abi") {
            Some(abi) => abi.clone(),
            None => value.clone(),
        };
        Ok(Self {
            entries: serde_json::from_value(entries)?,
        })
    }

    /// Build a descriptor from human-readable function fragments.
    pub fn from_fragments(fragments: &[&str]) -> Result<Self, String> {
        let entries = fragments
            .iter()
            .map(|f| AbiEntry::parse_fragment(f))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[AbiEntry] {
        &self.entries
    }

    pub fn constructor(&self) -> Option<&AbiEntry> {
        self.entries.iter().find(|e| e.entry_type == "constructor")
    }

    /// Look up a function by name, or by full signature when `method` contains `(`.
    ///
    /// Overloaded names resolve to the first declaration; pass the signature to
    /// pick a specific overload.
    pub fn function(&self, method: &str) -> Option<&AbiEntry> {
        let by_signature = method.contains('(');
        self.entries.iter().filter(|e| e.is_function()).find(|e| {
            if by_signature {
                e.signature().as_deref() == Some(method)
            } else {
                e.name.as_deref() == Some(method)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pool_abi() -> Value {
        json!({
            "contractName": "LendingPool",
            "abi": [
                {"type": "constructor", "inputs": []},
                {
                    "type": "function",
                    "name": "initialize",
                    "stateMutability": "nonpayable",
                    "inputs": [{
                        "name": "param",
                        "type": "tuple",
                        "components": [
                            {"name": "principal", "type": "address"},
                            {"name": "collaterals", "type": "tuple[]", "components": [
                                {"name": "token", "type": "address"},
                                {"name": "key", "type": "string"}
                            ]},
                            {"name": "cap", "type": "uint"}
                        ]
                    }]
                },
                {"type": "event", "name": "Initialized", "inputs": []}
            ]
        })
    }

    #[test]
    fn test_signature_expands_nested_tuples() {
        let abi = InterfaceDescriptor::from_json(&pool_abi()).unwrap();
        let init = abi.function("initialize").unwrap();
        assert_eq!(
            init.signature().unwrap(),
            "initialize((address,(address,string)[],uint256))"
        );
        assert!(abi.constructor().is_some());
        assert!(abi.function("Initialized").is_none());
    }

    #[test]
    fn test_lookup_by_signature() {
        let abi = InterfaceDescriptor::from_json(&pool_abi()).unwrap();
        assert!(abi
            .function("initialize((address,(address,string)[],uint256))")
            .is_some());
        assert!(abi.function("initialize(address)").is_none());
    }

    #[test]
    fn test_parse_fragments() {
        let abi = InterfaceDescriptor::from_fragments(&[
            "function mint(address,uint256)",
            "function balanceOf(address owner) view returns (uint256)",
            "setMultipleValues(string[],uint256[])",
        ])
        .unwrap();
        assert_eq!(
            abi.function("mint").unwrap().signature().unwrap(),
            "mint(address,uint256)"
        );
        let balance = abi.function("balanceOf").unwrap();
        assert_eq!(balance.signature().unwrap(), "balanceOf(address)");
        assert_eq!(balance.state_mutability.as_deref(), Some("view"));
        assert_eq!(
            abi.function("setMultipleValues").unwrap().signature().unwrap(),
            "setMultipleValues(string[],uint256[])"
        );
    }

    #[test]
    fn test_parse_fragment_rejects_tuples() {
        assert!(AbiEntry::parse_fragment("function f((address,uint256))").is_err());
        assert!(AbiEntry::parse_fragment("function (address)").is_err());
    }
}
