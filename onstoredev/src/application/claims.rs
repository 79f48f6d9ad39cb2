use std::collections::BTreeMap;

use onstore_core::Word;
use onstore_core::error::{Result, UploadError};
use serde::Serialize;
use serde_json::Value;
use sha3::{Digest, Keccak256};

#[derive(Clone, Debug, Serialize)]
pub struct Claim {
    pub index: u64,
    pub amount: String,
    pub proof: Vec<Word>,
}

/// Distributor input: a root plus one proof per checksummed address.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimList {
    pub merkle_root: Word,
    pub token_total: String,
    pub claims: BTreeMap<String, Claim>,
}

fn bad(msg: String) -> UploadError {
    UploadError::Format(msg)
}

fn keccak(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Keccak256::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().into()
}

/// EIP-55 mixed-case form of 20 address bytes.
pub fn checksum_address(addr: &[u8; 20]) -> String {
    let lower = hex::encode(addr);
    let hash = keccak(&[lower.as_bytes()]);
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Accepts all-lowercase, all-uppercase or a correctly checksummed address.
pub fn parse_address(text: &str) -> Result<[u8; 20]> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.len() != 40 {
        return Err(bad(format!("invalid address {text:?}: expected 40 hex digits")));
    }
    let mut addr = [0u8; 20];
    hex::decode_to_slice(digits, &mut addr)
        .map_err(|e| bad(format!("invalid address {text:?}: {e}")))?;
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && checksum_address(&addr)[2..] != *digits {
        return Err(bad(format!("bad address checksum {text:?}")));
    }
    Ok(addr)
}

fn parse_balance(addr: &str, v: &Value) -> Result<u128> {
    let amount = match v {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(h) => u128::from_str_radix(h, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
    .ok_or_else(|| bad(format!("invalid amount for account {addr}: {v}")))?;
    if amount == 0 {
        return Err(bad(format!("invalid amount for account {addr}: must be positive")));
    }
    Ok(amount)
}

/// Shortest `0x` form with an even digit count: 10 is `0x0a`.
pub fn to_hex_quantity(v: u128) -> String {
    let digits = format!("{v:x}");
    if digits.len() % 2 == 1 {
        format!("0x0{digits}")
    } else {
        format!("0x{digits}")
    }
}

fn leaf(index: u64, addr: &[u8; 20], amount: u128) -> [u8; 32] {
    keccak(&[
        Word::from_u128(u128::from(index)).as_bytes().as_slice(),
        addr.as_slice(),
        Word::from_u128(amount).as_bytes().as_slice(),
    ])
}

fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    keccak(&[lo.as_slice(), hi.as_slice()])
}

/// Layers from sorted unique leaves up to the root. An unpaired node moves
/// up unchanged.
pub struct MerkleTree {
    layers: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    pub fn new(mut leaves: Vec<[u8; 32]>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(bad("merkle tree needs at least one leaf".into()));
        }
        leaves.sort_unstable();
        leaves.dedup();
        let mut layers = vec![leaves];
        while let Some(last) = layers.last().filter(|l| l.len() > 1) {
            let next = last
                .chunks(2)
                .map(|pair| match pair {
                    [a, b] => hash_pair(a, b),
                    _ => pair[0],
                })
                .collect();
            layers.push(next);
        }
        Ok(Self { layers })
    }

    pub fn root(&self) -> [u8; 32] {
        self.layers[self.layers.len() - 1][0]
    }

    pub fn proof(&self, leaf: &[u8; 32]) -> Result<Vec<[u8; 32]>> {
        let mut idx = self.layers[0]
            .binary_search(leaf)
            .map_err(|_| bad("leaf is not in the tree".into()))?;
        let mut proof = Vec::new();
        for layer in &self.layers {
            let pair = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            if let Some(p) = layer.get(pair) {
                proof.push(*p);
            }
            idx /= 2;
        }
        Ok(proof)
    }
}

/// Builds the claim list for an `{ address: balance }` JSON object.
pub fn build_claim_list(balances: &Value) -> Result<ClaimList> {
    let map = balances
        .as_object()
        .ok_or_else(|| bad("claims input must be a JSON object".into()))?;

    let mut accounts: BTreeMap<String, ([u8; 20], u128)> = BTreeMap::new();
    for (key, value) in map {
        let addr = parse_address(key)?;
        let checksummed = checksum_address(&addr);
        if accounts.contains_key(&checksummed) {
            return Err(bad(format!("duplicate address: {checksummed}")));
        }
        let amount = parse_balance(key, value)?;
        accounts.insert(checksummed, (addr, amount));
    }

    let leaves: Vec<_> = accounts
        .values()
        .enumerate()
        .map(|(i, (addr, amount))| leaf(i as u64, addr, *amount))
        .collect();
    let tree = MerkleTree::new(leaves.clone())?;

    let mut total: u128 = 0;
    let mut claims = BTreeMap::new();
    for (i, ((address, (_, amount)), hash)) in accounts.into_iter().zip(&leaves).enumerate() {
        total = total
            .checked_add(amount)
            .ok_or_else(|| bad("token total overflows 128 bits".into()))?;
        claims.insert(
            address,
            Claim {
                index: i as u64,
                amount: to_hex_quantity(amount),
                proof: tree.proof(hash)?.into_iter().map(Word).collect(),
            },
        );
    }

    Ok(ClaimList {
        merkle_root: Word(tree.root()),
        token_total: to_hex_quantity(total),
        claims,
    })
}
