//! Questline Quest Registry Contract
//!
//! Authoritative record of quest definitions: creator, validity window,
//! completion cap, title and artwork uri, plus a denormalized per-quest badge
//! count kept in sync by the gateway for indexers. Quests are written only by
//! enrolled minters (normally the gateway contract, which enrolls at
//! deployment); the admin manages the minter set.
//!
//! ## Storage Strategy
//! - `instance()`: Admin and the total quest counter. Small, fixed config in
//!   one ledger entry with a single TTL.
//! - `persistent()`: one entry per quest, per badge count, per minter flag,
//!   each with its own TTL, bumped on every write.
//!
//! ## Invariants
//! - A quest id is created exactly once; re-minting an existing id is
//!   rejected.
//! - `creator` is fixed at mint; updates overwrite every other field.
//! - Quests are never deleted.
#![no_std]
#![allow(unexpected_cfgs)]

use questline_shared::{Quest, QuestSpec};
use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Env, String,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
/// Bumped on every write so quest records never expire.
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

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
    QuestAlreadyExists = 5,
    QuestNotFound      = 6,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

/// Discriminants for all storage keys.
#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Admin,
    TotalQuests,
    // --- persistent() ---
    /// Enrollment flag for an address allowed to mutate quests.
    Minter(Address),
    /// Quest record keyed by quest id.
    Quest(u64),
    /// Denormalized issued-badge count keyed by quest id.
    BadgeCount(u64),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct QuestCreated {
    #[topic]
    pub quest_id: u64,
    #[topic]
    pub creator: Address,
    pub start_ts: u64,
    pub end_ts: u64,
    pub supply: u64,
    pub title: String,
    pub uri: String,
}

#[contractevent]
pub struct QuestUpdated {
    #[topic]
    pub quest_id: u64,
}

#[contractevent]
pub struct BadgeCountSet {
    #[topic]
    pub quest_id: u64,
    pub count: u64,
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
pub struct QuestRegistry;

#[contractimpl]
impl QuestRegistry {
    /// Initialize the registry. May only be called once.
    pub fn init(env: Env, admin: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::TotalQuests, &0u64);

        Ok(())
    }

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

    /// Record a new quest under `quest_id` with `creator` as its owner.
    /// Minter only. Re-minting an existing id is rejected.
    pub fn mint_quest(
        env: Env,
        minter: Address,
        creator: Address,
        quest_id: u64,
        spec: QuestSpec,
    ) -> Result<(), Error> {
        require_minter(&env, &minter)?;

        let key = DataKey::Quest(quest_id);
        if env.storage().persistent().has(&key) {
            return Err(Error::QuestAlreadyExists);
        }

        let quest = Quest {
            creator: creator.clone(),
            start_ts: spec.start_ts,
            end_ts: spec.end_ts,
            supply: spec.supply,
            title: spec.title.clone(),
            uri: spec.uri.clone(),
        };
        env.storage().persistent().set(&key, &quest);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        let total: u64 = env
            .storage()
            .instance()
            .get(&DataKey::TotalQuests)
            .unwrap_or(0);
        env.storage().instance().set(&DataKey::TotalQuests, &(total + 1));

        QuestCreated {
            quest_id,
            creator,
            start_ts: spec.start_ts,
            end_ts: spec.end_ts,
            supply: spec.supply,
            title: spec.title,
            uri: spec.uri,
        }
        .publish(&env);

        Ok(())
    }

    /// Overwrite the mutable fields of an existing quest. Minter only.
    /// The creator is preserved; callers gate modification rights upstream.
    pub fn update_quest(
        env: Env,
        minter: Address,
        quest_id: u64,
        spec: QuestSpec,
    ) -> Result<(), Error> {
        require_minter(&env, &minter)?;

        let key = DataKey::Quest(quest_id);
        let mut quest: Quest = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(Error::QuestNotFound)?;

        quest.start_ts = spec.start_ts;
        quest.end_ts = spec.end_ts;
        quest.supply = spec.supply;
        quest.title = spec.title;
        quest.uri = spec.uri;

        env.storage().persistent().set(&key, &quest);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        QuestUpdated { quest_id }.publish(&env);

        Ok(())
    }

    /// Replace only the artwork uri of an existing quest. Minter only.
    /// Every badge of the quest derives its uri from this field, so one
    /// update re-points all of them.
    pub fn update_uri(env: Env, minter: Address, quest_id: u64, uri: String) -> Result<(), Error> {
        require_minter(&env, &minter)?;

        let key = DataKey::Quest(quest_id);
        let mut quest: Quest = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(Error::QuestNotFound)?;

        quest.uri = uri;

        env.storage().persistent().set(&key, &quest);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        QuestUpdated { quest_id }.publish(&env);

        Ok(())
    }

    /// Sync the denormalized badge count for a quest. Minter only.
    /// Authorized independently of any modification rule: counts keep moving
    /// after a quest has become otherwise immutable.
    pub fn set_badge_count(
        env: Env,
        minter: Address,
        quest_id: u64,
        count: u64,
    ) -> Result<(), Error> {
        require_minter(&env, &minter)?;

        if !env.storage().persistent().has(&DataKey::Quest(quest_id)) {
            return Err(Error::QuestNotFound);
        }

        let key = DataKey::BadgeCount(quest_id);
        env.storage().persistent().set(&key, &count);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        BadgeCountSet { quest_id, count }.publish(&env);

        Ok(())
    }

    // --- Getters ---

    pub fn get_quest(env: Env, quest_id: u64) -> Option<Quest> {
        env.storage().persistent().get(&DataKey::Quest(quest_id))
    }

    pub fn quest_exists(env: Env, quest_id: u64) -> bool {
        env.storage().persistent().has(&DataKey::Quest(quest_id))
    }

    pub fn creator_of(env: Env, quest_id: u64) -> Option<Address> {
        let quest: Option<Quest> = env.storage().persistent().get(&DataKey::Quest(quest_id));
        quest.map(|q| q.creator)
    }

    pub fn badge_count(env: Env, quest_id: u64) -> u64 {
        env.storage()
            .persistent()
            .get(&DataKey::BadgeCount(quest_id))
            .unwrap_or(0)
    }

    pub fn total_quests(env: Env) -> u64 {
        env.storage()
            .instance()
            .get(&DataKey::TotalQuests)
            .unwrap_or(0)
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
