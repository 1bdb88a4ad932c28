//! Deployment error types.
//!
//! Every variant names the unit, library, symbol or entry it is attributable
//! to, so a failed run can be diagnosed from the error alone.

use evm_deployer_types::UnitId;
use evm_linker::{LinkConflict, PlaceholderToken};
use evm_transport::{AbiError, SubmissionFailure};

/// Structured errors raised while linking, sequencing, encoding or submitting.
#[derive(Debug, Clone)]
pub enum DeployError {
    /// Bytecode still references libraries with no recorded address.
    UnresolvedReference {
        /// The unit being linked
        unit: UnitId,
        /// Placeholders left in its bytecode
        placeholders: Vec<PlaceholderToken>,
    },

    /// Units reference each other in a cycle; the path starts and ends on the same unit.
    CyclicDependency { cycle: Vec<UnitId> },

    /// A token symbol is not in the registry.
    UnknownSymbol { symbol: String },

    /// A value does not fit its packed field.
    EncodingOverflow {
        /// Which field overflowed (e.g. "mantissa", "timestamp")
        field: String,
        /// The offending value in decimal
        value: String,
    },

    /// The network rejected or failed a deployment or call.
    SubmissionFailure(SubmissionFailure),

    /// A library was recorded twice with different addresses.
    LinkConflict(LinkConflict),

    /// Call arguments do not match the interface.
    Abi { target: String, error: AbiError },

    /// A compiled artifact could not be loaded or parsed.
    Artifact { unit: String, message: String },

    /// A unit or labelled instance that must already exist does not.
    UnknownUnit { unit: String },

    /// A malformed numeric or textual input.
    InvalidValue { field: String, message: String },
}

impl DeployError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        DeployError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unknown_symbol(symbol: &str) -> Self {
        DeployError::UnknownSymbol {
            symbol: symbol.to_string(),
        }
    }

    /// Structural errors abort the run; batch entries are isolated instead.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DeployError::UnresolvedReference { .. }
                | DeployError::CyclicDependency { .. }
                | DeployError::LinkConflict(_)
        )
    }
}

impl std::fmt::Display for DeployError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployError::UnresolvedReference { unit, placeholders } => {
                let tokens: Vec<&str> = placeholders.iter().map(|p| p.as_str()).collect();
                write!(
                    f,
                    "unresolved library reference in {}: {}",
                    unit,
                    tokens.join(", ")
                )
            }
            DeployError::CyclicDependency { cycle } => {
                let path: Vec<&str> = cycle.iter().map(|u| u.as_str()).collect();
                write!(f, "cyclic library dependency: {}", path.join(" -> "))
            }
            DeployError::UnknownSymbol { symbol } => {
                write!(f, "unknown token symbol '{}'", symbol)
            }
            DeployError::EncodingOverflow { field, value } => {
                write!(f, "{} {} does not fit in 128 bits", field, value)
            }
            DeployError::SubmissionFailure(failure) => write!(f, "{}", failure),
            DeployError::LinkConflict(conflict) => write!(f, "{}", conflict),
            DeployError::Abi { target, error } => {
                write!(f, "cannot encode arguments for {}: {}", target, error)
            }
            DeployError::Artifact { unit, message } => {
                write!(f, "artifact {}: {}", unit, message)
            }
            DeployError::UnknownUnit { unit } => write!(f, "unknown unit or instance '{}'", unit),
            DeployError::InvalidValue { field, message } => {
                write!(f, "invalid {}: {}", field, message)
            }
        }
    }
}

impl std::error::Error for DeployError {}

impl From<SubmissionFailure> for DeployError {
    fn from(failure: SubmissionFailure) -> Self {
        DeployError::SubmissionFailure(failure)
    }
}

impl From<LinkConflict> for DeployError {
    fn from(conflict: LinkConflict) -> Self {
        DeployError::LinkConflict(conflict)
    }
}
