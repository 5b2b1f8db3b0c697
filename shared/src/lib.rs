//! Questline Shared Library
//!
//! Types common to the questline contracts and the signed-payload
//! authorization protocol that gates every untrusted entry point on the
//! gateway. An off-chain service signs the keccak-256 digest of a canonical
//! payload; the gateway rebuilds the payload from the call arguments, recovers
//! the signing key, and compares it to the trusted signer it has configured.
//!
//! ## Payload Layout
//! Every payload starts with the protocol prefix and ends with the two
//! replay-binding addresses:
//!
//! ```text
//! DOMAIN ("questline.auth") | 0x00 | VERSION | OP | fields... | gateway | caller
//! ```
//!
//! Field encodings: `u32` big-endian (4 bytes); `u64` big-endian (8 bytes);
//! addresses and strings as a `u32` byte length followed by the bytes
//! (addresses encode their strkey text); vectors as a `u32` element count
//! followed by the elements; optional vectors as one presence byte (`0`/`1`)
//! followed by the vector when present.
//!
//! Binding the gateway address and the caller address into the payload is the
//! system's only anti-replay mechanism: a signature produced for one caller or
//! one deployed gateway recovers correctly but compares unequal anywhere else.
//! Reordering fields or changing an encoding is a breaking protocol change and
//! requires a `VERSION` bump.
#![no_std]

use soroban_sdk::{contracterror, contracttype, Address, Bytes, BytesN, Env, String, Vec};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Domain prefix separating questline signatures from any other protocol
/// a signer key might be used with.
pub const AUTH_DOMAIN: [u8; 14] = *b"questline.auth";

/// Canonicalization version. Bump on any layout change.
pub const AUTH_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum AuthError {
    InvalidSigner = 1,
}

// ---------------------------------------------------------------------------
// Operation tags
// ---------------------------------------------------------------------------

/// One tag per signed operation. Distinct tags keep signatures for different
/// operations mutually unusable even when their remaining fields coincide
/// (a claim signature is not an update-score signature).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Op {
    CreateQuest = 1,
    ModifyQuest = 2,
    Claim = 3,
    UpdateScore = 4,
    SetBadgeUri = 5,
    Airdrop = 6,
}

// ---------------------------------------------------------------------------
// Shared contract types
// ---------------------------------------------------------------------------

/// A quest definition as stored by the quest registry.
///
/// `supply` caps how many badges the quest can issue; `0` and `u64::MAX` both
/// mean uncapped. The `[start_ts, end_ts]` window is inclusive, in ledger
/// seconds. `uri` is the artwork pointer every badge of the quest derives its
/// own uri from.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Quest {
    pub creator: Address,
    pub start_ts: u64,
    pub end_ts: u64,
    pub supply: u64,
    pub title: String,
    pub uri: String,
}

/// The caller-supplied quest fields: everything in [`Quest`] except the
/// creator, which is always the authenticated caller of the create call.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuestSpec {
    pub start_ts: u64,
    pub end_ts: u64,
    pub supply: u64,
    pub title: String,
    pub uri: String,
}

/// An issued credential as stored by the credential ledger.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Badge {
    pub owner: Address,
    pub quest_id: u64,
    pub score: Option<u64>,
}

// ---------------------------------------------------------------------------
// Payload building
// ---------------------------------------------------------------------------

/// Canonical payload accumulator. Starts with the protocol prefix for one
/// operation; `finish` appends the two replay-binding addresses and yields
/// the bytes to digest.
pub struct PayloadBuf<'a> {
    env: &'a Env,
    buf: Bytes,
}

impl<'a> PayloadBuf<'a> {
    pub fn new(env: &'a Env, op: Op) -> Self {
        let mut buf = Bytes::from_array(env, &AUTH_DOMAIN);
        buf.append(&Bytes::from_array(env, &[0u8, AUTH_VERSION, op as u8]));
        Self { env, buf }
    }

    pub fn push_u32(&mut self, v: u32) {
        self.buf.append(&Bytes::from_array(self.env, &v.to_be_bytes()));
    }

    pub fn push_u64(&mut self, v: u64) {
        self.buf.append(&Bytes::from_array(self.env, &v.to_be_bytes()));
    }

    /// Length-delimited UTF-8 bytes. The length prefix keeps adjacent
    /// variable-length fields from sliding into each other.
    pub fn push_string(&mut self, s: &String) {
        let bytes = s.to_bytes();
        self.push_u32(bytes.len());
        self.buf.append(&bytes);
    }

    /// Addresses encode as their strkey text, length-delimited like strings.
    pub fn push_address(&mut self, a: &Address) {
        self.push_string(&a.to_string());
    }

    pub fn push_u64_vec(&mut self, v: &Vec<u64>) {
        self.push_u32(v.len());
        for item in v.iter() {
            self.push_u64(item);
        }
    }

    pub fn push_address_vec(&mut self, v: &Vec<Address>) {
        self.push_u32(v.len());
        for item in v.iter() {
            self.push_address(&item);
        }
    }

    pub fn push_opt_u64_vec(&mut self, v: &Option<Vec<u64>>) {
        match v {
            Some(items) => {
                self.buf.append(&Bytes::from_array(self.env, &[1u8]));
                self.push_u64_vec(items);
            }
            None => {
                self.buf.append(&Bytes::from_array(self.env, &[0u8]));
            }
        }
    }

    pub fn finish(mut self, gateway: &Address, caller: &Address) -> Bytes {
        self.push_address(gateway);
        self.push_address(caller);
        self.buf
    }
}

pub fn create_quest_payload(
    env: &Env,
    spec: &QuestSpec,
    gateway: &Address,
    caller: &Address,
) -> Bytes {
    let mut p = PayloadBuf::new(env, Op::CreateQuest);
    push_spec(&mut p, spec);
    p.finish(gateway, caller)
}

pub fn modify_quest_payload(
    env: &Env,
    quest_id: u64,
    spec: &QuestSpec,
    gateway: &Address,
    caller: &Address,
) -> Bytes {
    let mut p = PayloadBuf::new(env, Op::ModifyQuest);
    p.push_u64(quest_id);
    push_spec(&mut p, spec);
    p.finish(gateway, caller)
}

pub fn claim_payload(
    env: &Env,
    quest_id: u64,
    score: u64,
    gateway: &Address,
    caller: &Address,
) -> Bytes {
    let mut p = PayloadBuf::new(env, Op::Claim);
    p.push_u64(quest_id);
    p.push_u64(score);
    p.finish(gateway, caller)
}

pub fn update_score_payload(
    env: &Env,
    quest_id: u64,
    score: u64,
    gateway: &Address,
    caller: &Address,
) -> Bytes {
    let mut p = PayloadBuf::new(env, Op::UpdateScore);
    p.push_u64(quest_id);
    p.push_u64(score);
    p.finish(gateway, caller)
}

pub fn badge_uri_payload(
    env: &Env,
    quest_id: u64,
    uri: &String,
    gateway: &Address,
    caller: &Address,
) -> Bytes {
    let mut p = PayloadBuf::new(env, Op::SetBadgeUri);
    p.push_u64(quest_id);
    p.push_string(uri);
    p.finish(gateway, caller)
}

pub fn airdrop_payload(
    env: &Env,
    quest_ids: &Vec<u64>,
    receivers: &Vec<Address>,
    scores: &Option<Vec<u64>>,
    gateway: &Address,
    caller: &Address,
) -> Bytes {
    let mut p = PayloadBuf::new(env, Op::Airdrop);
    p.push_u64_vec(quest_ids);
    p.push_address_vec(receivers);
    p.push_opt_u64_vec(scores);
    p.finish(gateway, caller)
}

fn push_spec(p: &mut PayloadBuf, spec: &QuestSpec) {
    p.push_u64(spec.start_ts);
    p.push_u64(spec.end_ts);
    p.push_u64(spec.supply);
    p.push_string(&spec.title);
    p.push_string(&spec.uri);
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Keccak-256 digest of a canonical payload. This is the exact value the
/// trusted signer signs.
pub fn payload_digest(env: &Env, payload: &Bytes) -> BytesN<32> {
    env.crypto().keccak256(payload).to_bytes()
}

/// Recover the secp256k1 key that signed `payload` and compare it to the
/// trusted signer. A signature that recovers to any other key fails with
/// `InvalidSigner`; a malformed signature or recovery id traps in the host
/// before the comparison is reached.
pub fn verify_payload(
    env: &Env,
    payload: &Bytes,
    signature: &BytesN<64>,
    recovery_id: u32,
    signer: &BytesN<65>,
) -> Result<(), AuthError> {
    let digest = env.crypto().keccak256(payload);
    let recovered = env.crypto().secp256k1_recover(&digest, signature, recovery_id);
    if &recovered != signer {
        return Err(AuthError::InvalidSigner);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
