//! Local private-key signing of EIP-1559 transactions.
//!
//! Used by [`RpcSubmitter`](crate::RpcSubmitter) when the endpoint does not
//! manage the sender account (public RPC providers). The signed envelope is
//! `0x02 || rlp([chain_id, nonce, max_priority_fee, max_fee, gas, to, value,
//! data, access_list, y_parity, r, s])`.

use std::fmt;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{length_of_length, BufMut, Encodable, Header, EMPTY_STRING_CODE};
use anyhow::{anyhow, Result};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;

/// An RLP empty list, the access list of every transaction built here.
const EMPTY_ACCESS_LIST_RLP_LEN: usize = 1;
const EIP1559_TX_TYPE: u8 = 0x02;

/// Unsigned EIP-1559 transaction; `to: None` creates a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl Eip1559Transaction {
    fn to_length(&self) -> usize {
        self.to.as_ref().map_or(1, |to| to.length())
    }

    fn fields_length(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.max_priority_fee_per_gas.length()
            + self.max_fee_per_gas.length()
            + self.gas_limit.length()
            + self.to_length()
            + self.value.length()
            + self.data.length()
            + EMPTY_ACCESS_LIST_RLP_LEN
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        match &self.to {
            Some(to) => to.encode(out),
            None => out.put_u8(EMPTY_STRING_CODE),
        }
        self.value.encode(out);
        self.data.encode(out);
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(out);
    }

    /// Typed envelope without a signature; its hash is what gets signed.
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let payload_length = self.fields_length();
        let mut out = Vec::with_capacity(1 + payload_length + length_of_length(payload_length));
        out.push(EIP1559_TX_TYPE);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        out
    }

    pub fn signing_hash(&self) -> B256 {
        keccak256(self.encode_unsigned())
    }

    fn encode_signed(&self, y_parity: u8, r: U256, s: U256) -> Vec<u8> {
        let payload_length = self.fields_length() + y_parity.length() + r.length() + s.length();
        let mut out = Vec::with_capacity(1 + payload_length + length_of_length(payload_length));
        out.push(EIP1559_TX_TYPE);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        y_parity.encode(&mut out);
        r.encode(&mut out);
        s.encode(&mut out);
        out
    }
}

/// A secp256k1 key held in memory.
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Parse a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(raw: &str) -> Result<Self> {
        let body = raw.trim().trim_start_matches("0x");
        let bytes = hex::decode(body).map_err(|_| anyhow!("private key is not valid hex"))?;
        if bytes.len() != 32 {
            return Err(anyhow!("private key must be 32 bytes, got {}", bytes.len()));
        }
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| anyhow!("private key is not a valid secp256k1 scalar"))?;
        Ok(Self::from_key(key))
    }

    fn from_key(key: SigningKey) -> Self {
        let point = key.verifying_key().to_encoded_point(false);
        // Skip the 0x04 uncompressed-point tag
        let digest = keccak256(&point.as_bytes()[1..]);
        let address = Address::from_slice(&digest[12..]);
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign `tx` and return the raw bytes for `eth_sendRawTransaction`.
    pub fn sign_transaction(&self, tx: &Eip1559Transaction) -> Result<Vec<u8>> {
        let hash = tx.signing_hash();
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| anyhow!("signing failed: {}", e))?;
        let bytes = signature.to_bytes();
        let r = U256::from_be_slice(&bytes[..32]);
        let s = U256::from_be_slice(&bytes[32..]);
        Ok(tx.encode_signed(recovery_id.to_byte(), r, s))
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
