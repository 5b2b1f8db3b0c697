//! Questline Credential Ledger Contract
//!
//! Authoritative record of issued badges: ownership, the (quest, account)
//! claim map, scores, and supply counters. Badges are soulbound credentials,
//! so every transfer and approval entry point fails unconditionally while the
//! matching query entry points return the empty value. Minting and score
//! updates are restricted to enrolled minters (normally the gateway
//! contract); the admin manages the minter set.
//!
//! ## Storage Strategy
//! - `instance()`: Admin, next badge id, total supply. Small, fixed config
//!   and counters in one ledger entry with a single TTL.
//! - `persistent()`: one entry per badge, per (quest, account) claim, per
//!   quest supply, per owner balance, per minter flag. Each with its own TTL,
//!   bumped on every write.
//!
//! ## Invariants
//! - At most one badge per (quest_id, owner) pair, enforced at mint with no
//!   TOCTOU gap.
//! - Badge ids are sequential from 1 and never reused; badges are never
//!   burned.
//! - No entry point moves or approves a badge. The guard is stateless and
//!   sits in front of any other check, so it cannot be bypassed.
#![no_std]
#![allow(unexpected_cfgs)]

use questline_shared::Badge;
use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Env,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
/// Bumped on every write so badge and claim data never expire.
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

/// Badge ids start here; 0 is never a valid badge id.
const FIRST_BADGE_ID: u64 = 1;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized     = 2,
    NotAuthorized      = 3,
    OnlyMinter         = 4,
    AlreadyHoldsBadge  = 5,
    BadgeNotFound      = 6,
    NotClaimedYet      = 7,
    NonTransferable    = 8,
    NonApprovable      = 9,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

/// Discriminants for all storage keys.
#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Admin,
    NextBadgeId,
    TotalSupply,
    // --- persistent() ---
    /// Enrollment flag for an address allowed to mint and update scores.
    Minter(Address),
    /// Badge record keyed by badge id.
    Badge(u64),
    /// Badge id claimed by (quest_id, account); presence is the claim flag.
    Claimed(u64, Address),
    /// Number of badges issued against a quest.
    QuestSupply(u64),
    /// Number of badges held by an account.
    Balance(Address),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct BadgeMinted {
    #[topic]
    pub badge_id: u64,
    #[topic]
    pub owner: Address,
    pub quest_id: u64,
    pub score: Option<u64>,
}

#[contractevent]
pub struct ScoreUpdated {
    #[topic]
    pub quest_id: u64,
    #[topic]
    pub owner: Address,
    pub score: u64,
}

#[contractevent]
pub struct MinterSet {
    #[topic]
    pub minter: Address,
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct CredentialLedger;

#[contractimpl]
impl CredentialLedger {
    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    /// Initialize the ledger. May only be called once.
    pub fn init(env: Env, admin: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::NextBadgeId, &FIRST_BADGE_ID);
        env.storage().instance().set(&DataKey::TotalSupply, &0u64);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // set_minter
    // -----------------------------------------------------------------------

    /// Enroll or remove a minter. Admin only.
    pub fn set_minter(env: Env, admin: Address, minter: Address, enabled: bool) -> Result<(), Error> {
        require_admin(&env, &admin)?;

        let key = DataKey::Minter(minter.clone());
        if enabled {
            env.storage().persistent().set(&key, &true);
            env.storage()
                .persistent()
                .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
        } else {
            env.storage().persistent().remove(&key);
        }

        MinterSet { minter, enabled }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // mint
    // -----------------------------------------------------------------------

    /// Issue a badge for `quest_id` to `to`, with an optional score.
    /// Minter only. Each (quest, account) pair can hold at most one badge;
    /// a second mint for the same pair returns `AlreadyHoldsBadge`.
    ///
    /// Returns the new badge id.
    pub fn mint(
        env: Env,
        minter: Address,
        to: Address,
        quest_id: u64,
        score: Option<u64>,
    ) -> Result<u64, Error> {
        require_minter(&env, &minter)?;

        let claim_key = DataKey::Claimed(quest_id, to.clone());
        if env.storage().persistent().has(&claim_key) {
            return Err(Error::AlreadyHoldsBadge);
        }

        let badge_id: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextBadgeId)
            .ok_or(Error::NotInitialized)?;
        env.storage().instance().set(&DataKey::NextBadgeId, &(badge_id + 1));

        let badge = Badge {
            owner: to.clone(),
            quest_id,
            score,
        };
        let badge_key = DataKey::Badge(badge_id);
        env.storage().persistent().set(&badge_key, &badge);
        env.storage()
            .persistent()
            .extend_ttl(&badge_key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        env.storage().persistent().set(&claim_key, &badge_id);
        env.storage()
            .persistent()
            .extend_ttl(&claim_key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        let supply_key = DataKey::QuestSupply(quest_id);
        let supply: u64 = env.storage().persistent().get(&supply_key).unwrap_or(0);
        env.storage().persistent().set(&supply_key, &(supply + 1));
        env.storage()
            .persistent()
            .extend_ttl(&supply_key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        let balance_key = DataKey::Balance(to.clone());
        let balance: u64 = env.storage().persistent().get(&balance_key).unwrap_or(0);
        env.storage().persistent().set(&balance_key, &(balance + 1));
        env.storage()
            .persistent()
            .extend_ttl(&balance_key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        let total: u64 = env
            .storage()
            .instance()
            .get(&DataKey::TotalSupply)
            .unwrap_or(0);
        env.storage().instance().set(&DataKey::TotalSupply, &(total + 1));

        BadgeMinted {
            badge_id,
            owner: to,
            quest_id,
            score,
        }
        .publish(&env);

        Ok(badge_id)
    }

    // -----------------------------------------------------------------------
    // update_score
    // -----------------------------------------------------------------------

    /// Overwrite the score on the badge held by `owner` for `quest_id`.
    /// Minter only. The pair must already be claimed.
    pub fn update_score(
        env: Env,
        minter: Address,
        quest_id: u64,
        owner: Address,
        score: u64,
    ) -> Result<(), Error> {
        require_minter(&env, &minter)?;

        let badge_id: u64 = env
            .storage()
            .persistent()
            .get(&DataKey::Claimed(quest_id, owner.clone()))
            .ok_or(Error::NotClaimedYet)?;

        let badge_key = DataKey::Badge(badge_id);
        let mut badge: Badge = env
            .storage()
            .persistent()
            .get(&badge_key)
            .ok_or(Error::BadgeNotFound)?;

        badge.score = Some(score);
        env.storage().persistent().set(&badge_key, &badge);
        env.storage()
            .persistent()
            .extend_ttl(&badge_key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        ScoreUpdated { quest_id, owner, score }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transfer guard
    // -----------------------------------------------------------------------

    /// Badges are soulbound. Always fails.
    pub fn transfer(_env: Env, _from: Address, _to: Address, _badge_id: u64) -> Result<(), Error> {
        Err(Error::NonTransferable)
    }

    /// Badges are soulbound. Always fails.
    pub fn transfer_from(
        _env: Env,
        _spender: Address,
        _from: Address,
        _to: Address,
        _badge_id: u64,
    ) -> Result<(), Error> {
        Err(Error::NonTransferable)
    }

    /// Badges cannot be approved for transfer. Always fails.
    pub fn approve(
        _env: Env,
        _owner: Address,
        _approved: Address,
        _badge_id: u64,
    ) -> Result<(), Error> {
        Err(Error::NonApprovable)
    }

    /// Badges cannot be approved for transfer. Always fails.
    pub fn set_approval_for_all(
        _env: Env,
        _owner: Address,
        _operator: Address,
        _approved: bool,
    ) -> Result<(), Error> {
        Err(Error::NonApprovable)
    }

    /// Approval queries answer with the empty value rather than failing.
    pub fn get_approved(_env: Env, _badge_id: u64) -> Option<Address> {
        None
    }

    pub fn is_approved_for_all(_env: Env, _owner: Address, _operator: Address) -> bool {
        false
    }

    // -----------------------------------------------------------------------
    // Getters
    // -----------------------------------------------------------------------

    pub fn badge(env: Env, badge_id: u64) -> Option<Badge> {
        env.storage().persistent().get(&DataKey::Badge(badge_id))
    }

    pub fn owner_of(env: Env, badge_id: u64) -> Option<Address> {
        let badge: Option<Badge> = env.storage().persistent().get(&DataKey::Badge(badge_id));
        badge.map(|b| b.owner)
    }

    pub fn balance_of(env: Env, owner: Address) -> u64 {
        env.storage()
            .persistent()
            .get(&DataKey::Balance(owner))
            .unwrap_or(0)
    }

    pub fn quest_supply(env: Env, quest_id: u64) -> u64 {
        env.storage()
            .persistent()
            .get(&DataKey::QuestSupply(quest_id))
            .unwrap_or(0)
    }

    pub fn total_supply(env: Env) -> u64 {
        env.storage()
            .instance()
            .get(&DataKey::TotalSupply)
            .unwrap_or(0)
    }

    pub fn has_claimed(env: Env, quest_id: u64, account: Address) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Claimed(quest_id, account))
    }

    pub fn claimed_badge(env: Env, quest_id: u64, account: Address) -> Option<u64> {
        env.storage()
            .persistent()
            .get(&DataKey::Claimed(quest_id, account))
    }

    pub fn score_of(env: Env, quest_id: u64, account: Address) -> Option<u64> {
        let badge_id: u64 = env
            .storage()
            .persistent()
            .get(&DataKey::Claimed(quest_id, account))?;
        let badge: Badge = env.storage().persistent().get(&DataKey::Badge(badge_id))?;
        badge.score
    }

    pub fn is_minter(env: Env, account: Address) -> bool {
        env.storage().persistent().has(&DataKey::Minter(account))
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

/// Verify that `caller` is an enrolled minter and has signed the invocation.
/// Contract callers (the gateway) pass their own address, which the host
/// authenticates as the invoker.
fn require_minter(env: &Env, caller: &Address) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Admin) {
        return Err(Error::NotInitialized);
    }
    caller.require_auth();
    if !env.storage().persistent().has(&DataKey::Minter(caller.clone())) {
        return Err(Error::OnlyMinter);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
