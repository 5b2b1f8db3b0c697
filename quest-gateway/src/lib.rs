//! Questline Quest Gateway Contract
//!
//! Entry point for untrusted callers. Every state-changing operation is gated
//! by a secp256k1 signature from the trusted signer key over the canonical
//! payload of the call, and each call runs the same fixed sequence:
//! authenticate the caller, verify the signature, validate quest state
//! (existence, creator, window, cap, claim state, array shape), mutate the
//! ledgers, then forward any attached donation. Donations move strictly after
//! all ledger writes so a reentrant call sees post-mutation state and dies on
//! the already-claimed check.
//!
//! ## Authorization
//! The signed payload binds the operation tag, its arguments, this contract's
//! own address, and the caller's address. A signature minted for one caller
//! or for another deployed gateway recovers to the right key but over the
//! wrong payload, so verification fails. One digest accessor per operation
//! lets the off-chain signer and the tests hash through the same code path
//! that verification uses.
//!
//! ## Storage Strategy
//! - `instance()`: all state. Config (admin, ledger addresses, payment token,
//!   signer key) plus the next quest id counter. The durable quest and badge
//!   records live in the registry and ledger contracts, not here.
//!
//! ## Invariants
//! - Quest ids are handed out sequentially from the configured offset.
//! - The registry's badge count is synced after every successful mint.
//! - A donation is forwarded at most once per call, in full, to the creator
//!   of the quest that was minted against (for airdrops: the first minted
//!   element), and never when nothing was minted.
#![no_std]
#![allow(unexpected_cfgs)]

use questline_shared::{
    airdrop_payload, badge_uri_payload, claim_payload, create_quest_payload, modify_quest_payload,
    payload_digest, update_score_payload, verify_payload, Badge, Quest, QuestSpec,
};
use soroban_sdk::{
    contract, contractclient, contracterror, contractevent, contractimpl, contracttype, token,
    Address, Bytes, BytesN, Env, String, Vec,
};

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized  = 1,
    NotInitialized      = 2,
    NotAuthorized       = 3,
    InvalidSigner       = 4,
    NotCreator          = 5,
    ClaimedCannotModify = 6,
    NotInTime           = 7,
    OverLimit           = 8,
    AlreadyClaimed      = 9,
    NotClaimedYet       = 10,
    QuestNotFound       = 11,
    InvalidArray        = 12,
    NothingIssued       = 13,
    InvalidAmount       = 14,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

/// Discriminants for all storage keys. Everything the gateway keeps is small
/// fixed config, so it all lives in `instance()`.
#[contracttype]
pub enum DataKey {
    Admin,
    Signer,
    QuestRegistry,
    CredentialLedger,
    PaymentToken,
    NextQuestId,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct Claimed {
    #[topic]
    pub quest_id: u64,
    #[topic]
    pub claimer: Address,
    pub badge_id: u64,
    pub score: u64,
}

#[contractevent]
pub struct Airdropped {
    #[topic]
    pub quest_id: u64,
    #[topic]
    pub receiver: Address,
    pub badge_id: u64,
    pub score: Option<u64>,
}

#[contractevent]
pub struct Donation {
    #[topic]
    pub from: Address,
    #[topic]
    pub to: Address,
    pub amount: i128,
}

#[contractevent]
pub struct SignerChanged {
    pub signer: BytesN<65>,
}

// ---------------------------------------------------------------------------
// Ledger interfaces
// ---------------------------------------------------------------------------

/// Quest registry entry points the gateway drives. The gateway authenticates
/// as a minter through invoker-contract auth: it passes its own address,
/// which the host attests automatically on cross-contract calls.
#[contractclient(name = "RegistryClient")]
pub trait RegistryIface {
    fn mint_quest(env: Env, minter: Address, creator: Address, quest_id: u64, spec: QuestSpec);
    fn update_quest(env: Env, minter: Address, quest_id: u64, spec: QuestSpec);
    fn update_uri(env: Env, minter: Address, quest_id: u64, uri: String);
    fn set_badge_count(env: Env, minter: Address, quest_id: u64, count: u64);
    fn get_quest(env: Env, quest_id: u64) -> Option<Quest>;
}

/// Credential ledger entry points the gateway drives.
#[contractclient(name = "LedgerClient")]
pub trait LedgerIface {
    fn mint(env: Env, minter: Address, to: Address, quest_id: u64, score: Option<u64>) -> u64;
    fn update_score(env: Env, minter: Address, quest_id: u64, owner: Address, score: u64);
    fn quest_supply(env: Env, quest_id: u64) -> u64;
    fn has_claimed(env: Env, quest_id: u64, account: Address) -> bool;
    fn badge(env: Env, badge_id: u64) -> Option<Badge>;
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct QuestGateway;

#[contractimpl]
impl QuestGateway {
    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    /// Initialize the gateway. May only be called once.
    ///
    /// `signer` is the uncompressed secp256k1 public key whose signatures
    /// authorize untrusted calls. `payment_token` denominates donations.
    /// `quest_id_offset` is the first quest id this gateway will assign.
    /// The gateway must also be enrolled as a minter on both ledgers before
    /// it can serve calls.
    pub fn init(
        env: Env,
        admin: Address,
        quest_registry: Address,
        credential_ledger: Address,
        payment_token: Address,
        signer: BytesN<65>,
        quest_id_offset: u64,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::QuestRegistry, &quest_registry);
        env.storage()
            .instance()
            .set(&DataKey::CredentialLedger, &credential_ledger);
        env.storage().instance().set(&DataKey::PaymentToken, &payment_token);
        env.storage().instance().set(&DataKey::Signer, &signer);
        env.storage().instance().set(&DataKey::NextQuestId, &quest_id_offset);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // set_signer
    // -----------------------------------------------------------------------

    /// Rotate the trusted signer key. Admin only, unsigned.
    ///
    /// Takes effect immediately: signatures from the old key fail from the
    /// next verification on, with no grace window.
    pub fn set_signer(env: Env, admin: Address, signer: BytesN<65>) -> Result<(), Error> {
        require_admin(&env, &admin)?;

        env.storage().instance().set(&DataKey::Signer, &signer);

        SignerChanged { signer }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // create_quest
    // -----------------------------------------------------------------------

    /// Create a quest from a signed spec. The caller becomes its creator.
    ///
    /// Returns the assigned quest id.
    pub fn create_quest(
        env: Env,
        caller: Address,
        spec: QuestSpec,
        signature: BytesN<64>,
        recovery_id: u32,
    ) -> Result<u64, Error> {
        caller.require_auth();

        let this = env.current_contract_address();
        let payload = create_quest_payload(&env, &spec, &this, &caller);
        verify_signed(&env, &payload, &signature, recovery_id)?;

        let registry = registry_client(&env)?;
        let quest_id = take_next_quest_id(&env)?;
        registry.mint_quest(&this, &caller, &quest_id, &spec);

        Ok(quest_id)
    }

    // -----------------------------------------------------------------------
    // modify_quest
    // -----------------------------------------------------------------------

    /// Overwrite a quest's fields from a signed spec. Creator only, and only
    /// while no badge has been claimed against the quest.
    pub fn modify_quest(
        env: Env,
        caller: Address,
        quest_id: u64,
        spec: QuestSpec,
        signature: BytesN<64>,
        recovery_id: u32,
    ) -> Result<(), Error> {
        caller.require_auth();

        let this = env.current_contract_address();
        let payload = modify_quest_payload(&env, quest_id, &spec, &this, &caller);
        verify_signed(&env, &payload, &signature, recovery_id)?;

        let registry = registry_client(&env)?;
        let ledger = ledger_client(&env)?;

        let quest = registry.get_quest(&quest_id).ok_or(Error::QuestNotFound)?;
        if quest.creator != caller {
            return Err(Error::NotCreator);
        }
        if ledger.quest_supply(&quest_id) > 0 {
            return Err(Error::ClaimedCannotModify);
        }

        registry.update_quest(&this, &quest_id, &spec);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // claim
    // -----------------------------------------------------------------------

    /// Claim the badge for `quest_id` with a signed (quest, score) grant.
    /// Value-bearing: `donation` of the payment token, if nonzero, is
    /// forwarded in full to the quest creator after the mint.
    ///
    /// Returns the minted badge id.
    pub fn claim(
        env: Env,
        caller: Address,
        quest_id: u64,
        score: u64,
        signature: BytesN<64>,
        recovery_id: u32,
        donation: i128,
    ) -> Result<u64, Error> {
        caller.require_auth();

        if donation < 0 {
            return Err(Error::InvalidAmount);
        }

        let this = env.current_contract_address();
        let payload = claim_payload(&env, quest_id, score, &this, &caller);
        verify_signed(&env, &payload, &signature, recovery_id)?;

        let registry = registry_client(&env)?;
        let ledger = ledger_client(&env)?;

        let quest = registry.get_quest(&quest_id).ok_or(Error::QuestNotFound)?;
        if !in_window(&quest, env.ledger().timestamp()) {
            return Err(Error::NotInTime);
        }
        // Already-claimed outranks the cap so a holder retrying at a full
        // quest learns the real reason.
        if ledger.has_claimed(&quest_id, &caller) {
            return Err(Error::AlreadyClaimed);
        }
        let minted = ledger.quest_supply(&quest_id);
        if cap_reached(quest.supply, minted) {
            return Err(Error::OverLimit);
        }

        let badge_id = ledger.mint(&this, &caller, &quest_id, &Some(score));
        registry.set_badge_count(&this, &quest_id, &(minted + 1));

        Claimed {
            quest_id,
            claimer: caller.clone(),
            badge_id,
            score,
        }
        .publish(&env);

        forward_donation(&env, &caller, &quest.creator, donation)?;

        Ok(badge_id)
    }

    // -----------------------------------------------------------------------
    // update_score
    // -----------------------------------------------------------------------

    /// Overwrite the caller's score on an already-claimed quest, inside the
    /// quest window, with a signed (quest, score) grant.
    pub fn update_score(
        env: Env,
        caller: Address,
        quest_id: u64,
        score: u64,
        signature: BytesN<64>,
        recovery_id: u32,
    ) -> Result<(), Error> {
        caller.require_auth();

        let this = env.current_contract_address();
        let payload = update_score_payload(&env, quest_id, score, &this, &caller);
        verify_signed(&env, &payload, &signature, recovery_id)?;

        let registry = registry_client(&env)?;
        let ledger = ledger_client(&env)?;

        let quest = registry.get_quest(&quest_id).ok_or(Error::QuestNotFound)?;
        if !in_window(&quest, env.ledger().timestamp()) {
            return Err(Error::NotInTime);
        }
        if !ledger.has_claimed(&quest_id, &caller) {
            return Err(Error::NotClaimedYet);
        }

        ledger.update_score(&this, &quest_id, &caller, &score);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // set_badge_uri
    // -----------------------------------------------------------------------

    /// Re-point the quest's artwork uri with a signed grant. Creator only.
    /// Every badge of the quest derives its uri from the quest record, so
    /// one call re-points all of them, minted and future.
    pub fn set_badge_uri(
        env: Env,
        caller: Address,
        quest_id: u64,
        uri: String,
        signature: BytesN<64>,
        recovery_id: u32,
    ) -> Result<(), Error> {
        caller.require_auth();

        let this = env.current_contract_address();
        let payload = badge_uri_payload(&env, quest_id, &uri, &this, &caller);
        verify_signed(&env, &payload, &signature, recovery_id)?;

        let registry = registry_client(&env)?;

        let quest = registry.get_quest(&quest_id).ok_or(Error::QuestNotFound)?;
        if quest.creator != caller {
            return Err(Error::NotCreator);
        }

        registry.update_uri(&this, &quest_id, &uri);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // airdrop_badges
    // -----------------------------------------------------------------------

    /// Issue badges to a batch of receivers with one signed grant.
    /// Value-bearing like `claim`.
    ///
    /// `quest_ids` and `receivers` must be the same nonzero length, and
    /// `scores`, when present, the same length again. Elements that fail a
    /// per-quest check (unknown id, closed window, reached cap, pair already
    /// claimed) are skipped; the rest are minted. Returns the number minted.
    ///
    /// A nonzero donation goes in full to the creator of the first minted
    /// element's quest, after all mutation; if every element was skipped the
    /// call fails rather than forward value for an empty issuance.
    pub fn airdrop_badges(
        env: Env,
        caller: Address,
        quest_ids: Vec<u64>,
        receivers: Vec<Address>,
        scores: Option<Vec<u64>>,
        signature: BytesN<64>,
        recovery_id: u32,
        donation: i128,
    ) -> Result<u32, Error> {
        caller.require_auth();

        if donation < 0 {
            return Err(Error::InvalidAmount);
        }
        if quest_ids.is_empty() || quest_ids.len() != receivers.len() {
            return Err(Error::InvalidArray);
        }
        if let Some(ref s) = scores {
            if s.len() != quest_ids.len() {
                return Err(Error::InvalidArray);
            }
        }

        let this = env.current_contract_address();
        let payload = airdrop_payload(&env, &quest_ids, &receivers, &scores, &this, &caller);
        verify_signed(&env, &payload, &signature, recovery_id)?;

        let registry = registry_client(&env)?;
        let ledger = ledger_client(&env)?;
        let now = env.ledger().timestamp();

        let mut minted_count: u32 = 0;
        let mut donation_target: Option<Address> = None;

        for i in 0..quest_ids.len() {
            let quest_id = quest_ids.get_unchecked(i);
            let receiver = receivers.get_unchecked(i);

            let quest = match registry.get_quest(&quest_id) {
                Some(q) => q,
                None => continue,
            };
            if !in_window(&quest, now) {
                continue;
            }
            if ledger.has_claimed(&quest_id, &receiver) {
                continue;
            }
            let supply_now = ledger.quest_supply(&quest_id);
            if cap_reached(quest.supply, supply_now) {
                continue;
            }

            let score = match &scores {
                Some(s) => Some(s.get_unchecked(i)),
                None => None,
            };

            let badge_id = ledger.mint(&this, &receiver, &quest_id, &score);
            registry.set_badge_count(&this, &quest_id, &(supply_now + 1));

            if donation_target.is_none() {
                donation_target = Some(quest.creator.clone());
            }
            minted_count += 1;

            Airdropped {
                quest_id,
                receiver,
                badge_id,
                score,
            }
            .publish(&env);
        }

        if donation > 0 {
            match donation_target {
                Some(creator) => forward_donation(&env, &caller, &creator, donation)?,
                None => return Err(Error::NothingIssued),
            }
        }

        Ok(minted_count)
    }

    // -----------------------------------------------------------------------
    // Digest accessors
    // -----------------------------------------------------------------------

    /// The digest the trusted signer must sign to authorize `create_quest`
    /// for `caller` on this gateway. One accessor per operation below.
    pub fn create_quest_digest(env: Env, spec: QuestSpec, caller: Address) -> BytesN<32> {
        let this = env.current_contract_address();
        payload_digest(&env, &create_quest_payload(&env, &spec, &this, &caller))
    }

    pub fn modify_quest_digest(
        env: Env,
        quest_id: u64,
        spec: QuestSpec,
        caller: Address,
    ) -> BytesN<32> {
        let this = env.current_contract_address();
        payload_digest(&env, &modify_quest_payload(&env, quest_id, &spec, &this, &caller))
    }

    pub fn claim_digest(env: Env, quest_id: u64, score: u64, caller: Address) -> BytesN<32> {
        let this = env.current_contract_address();
        payload_digest(&env, &claim_payload(&env, quest_id, score, &this, &caller))
    }

    pub fn update_score_digest(env: Env, quest_id: u64, score: u64, caller: Address) -> BytesN<32> {
        let this = env.current_contract_address();
        payload_digest(&env, &update_score_payload(&env, quest_id, score, &this, &caller))
    }

    pub fn badge_uri_digest(env: Env, quest_id: u64, uri: String, caller: Address) -> BytesN<32> {
        let this = env.current_contract_address();
        payload_digest(&env, &badge_uri_payload(&env, quest_id, &uri, &this, &caller))
    }

    pub fn airdrop_digest(
        env: Env,
        quest_ids: Vec<u64>,
        receivers: Vec<Address>,
        scores: Option<Vec<u64>>,
        caller: Address,
    ) -> BytesN<32> {
        let this = env.current_contract_address();
        payload_digest(
            &env,
            &airdrop_payload(&env, &quest_ids, &receivers, &scores, &this, &caller),
        )
    }

    // -----------------------------------------------------------------------
    // Getters
    // -----------------------------------------------------------------------

    pub fn signer(env: Env) -> Result<BytesN<65>, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Signer)
            .ok_or(Error::NotInitialized)
    }

    pub fn quest_registry(env: Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&DataKey::QuestRegistry)
            .ok_or(Error::NotInitialized)
    }

    pub fn credential_ledger(env: Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&DataKey::CredentialLedger)
            .ok_or(Error::NotInitialized)
    }

    pub fn payment_token(env: Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&DataKey::PaymentToken)
            .ok_or(Error::NotInitialized)
    }

    /// The quest id the next `create_quest` will assign.
    pub fn next_quest_id(env: Env) -> Result<u64, Error> {
        env.storage()
            .instance()
            .get(&DataKey::NextQuestId)
            .ok_or(Error::NotInitialized)
    }

    /// Resolve a badge's uri through its quest record. `None` when the badge
    /// or its quest does not exist.
    pub fn badge_uri(env: Env, badge_id: u64) -> Option<String> {
        let ledger = ledger_client(&env).ok()?;
        let registry = registry_client(&env).ok()?;
        let badge = ledger.badge(&badge_id)?;
        let quest = registry.get_quest(&badge.quest_id)?;
        Some(quest.uri)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Verify that `caller` is the stored admin and has signed the invocation.
fn require_admin(env: &Env, caller: &Address) -> Result<(), Error> {
    let admin: Address = env
        .storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &admin {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

/// Check `signature` over the canonical `payload` against the signer key
/// active right now.
fn verify_signed(
    env: &Env,
    payload: &Bytes,
    signature: &BytesN<64>,
    recovery_id: u32,
) -> Result<(), Error> {
    let signer: BytesN<65> = env
        .storage()
        .instance()
        .get(&DataKey::Signer)
        .ok_or(Error::NotInitialized)?;
    verify_payload(env, payload, signature, recovery_id, &signer)
        .map_err(|_| Error::InvalidSigner)
}

fn registry_client(env: &Env) -> Result<RegistryClient<'_>, Error> {
    let addr: Address = env
        .storage()
        .instance()
        .get(&DataKey::QuestRegistry)
        .ok_or(Error::NotInitialized)?;
    Ok(RegistryClient::new(env, &addr))
}

fn ledger_client(env: &Env) -> Result<LedgerClient<'_>, Error> {
    let addr: Address = env
        .storage()
        .instance()
        .get(&DataKey::CredentialLedger)
        .ok_or(Error::NotInitialized)?;
    Ok(LedgerClient::new(env, &addr))
}

/// Hand out the next sequential quest id.
fn take_next_quest_id(env: &Env) -> Result<u64, Error> {
    let id: u64 = env
        .storage()
        .instance()
        .get(&DataKey::NextQuestId)
        .ok_or(Error::NotInitialized)?;
    env.storage().instance().set(&DataKey::NextQuestId, &(id + 1));
    Ok(id)
}

/// Move `amount` of the payment token from `from` to `to` and publish the
/// `Donation` event. A zero amount is a no-op. Runs after all ledger
/// mutation; a transfer failure rolls the whole call back.
fn forward_donation(env: &Env, from: &Address, to: &Address, amount: i128) -> Result<(), Error> {
    if amount == 0 {
        return Ok(());
    }

    let token_addr: Address = env
        .storage()
        .instance()
        .get(&DataKey::PaymentToken)
        .ok_or(Error::NotInitialized)?;
    token::Client::new(env, &token_addr).transfer(from, to, &amount);

    Donation {
        from: from.clone(),
        to: to.clone(),
        amount,
    }
    .publish(env);

    Ok(())
}

/// Inclusive window check.
fn in_window(quest: &Quest, now: u64) -> bool {
    now >= quest.start_ts && now <= quest.end_ts
}

/// Zero and max both mean uncapped.
fn cap_reached(supply: u64, minted: u64) -> bool {
    supply != 0 && supply != u64::MAX && minted >= supply
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
