#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token::TokenClient,
    Address, Env, Map, Symbol, Vec,
};

pub mod dispatch;
pub mod economics;
pub mod index;
pub mod request;
pub mod validation;

use index::ScheduleIndex;

pub use dispatch::DispatchResult;
pub use index::IndexEntry;
pub use request::{
    CallMeta, CallSchedule, CallState, ClaimData, PaymentData, RequestParams, ScheduledCall,
    TxData,
};
pub use validation::ValidationReport;

// Storage TTL constants for active data
const INSTANCE_LIFETIME_THRESHOLD: u32 = 17280; // ~1 day
const INSTANCE_BUMP_AMOUNT: u32 = 518400; // ~30 days

// Event topic shared by every request lifecycle event
const SCHEDULE: Symbol = symbol_short!("schedule");

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    ValidationFailed = 3,
    RequestNotFound = 4,
    AlreadyClaimed = 5,
    InsufficientCollateral = 6,
    OutsideClaimWindow = 7,
    AlreadyCalled = 8,
    OutsideExecutionWindow = 9,
    ReservedWindow = 10,
    Unauthorized = 11,
    AlreadyCancelled = 12,
}

/// Deployment-time wiring: who operates the scheduler, which token carries
/// endowments and collateral, and which contract performs the calls.
#[contracttype]
#[derive(Clone)]
pub struct SchedulerConfig {
    pub admin: Address,
    pub fee_recipient: Address,
    pub payment_token: Address,
    pub dispatcher: Address,
    pub base_gas_price: i128,
    pub gas_ceiling: u64,
}

/// Events emitted by the contract for off-chain indexers
#[contracttype]
#[derive(Clone)]
pub enum RequestEvent {
    Created,
    Rejected,
    Claimed,
    Executed,
    Cancelled,
}

#[contracttype]
#[derive(Clone)]
pub struct RequestCreatedEvent {
    pub request_id: u32,
    pub owner: Address,
    pub bucket: u64,
    /// Fixed 12-entry parameter vector: fee, bounty, claim window size,
    /// freeze period, reserved window size, temporal unit, execution window
    /// size, window start, call gas, call value, endowment, payload length.
    pub params: Vec<i128>,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone)]
pub struct RequestRejectedEvent {
    pub requester: Address,
    /// Bit i set means validation check i failed.
    pub reason_flags: u32,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone)]
pub struct RequestClaimedEvent {
    pub request_id: u32,
    pub claimant: Address,
    pub payment_modifier: u32,
    pub collateral: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone)]
pub struct RequestExecutedEvent {
    pub request_id: u32,
    pub executor: Address,
    pub success: bool,
    pub gas_used: u64,
    pub fee_owed: i128,
    pub bounty_owed: i128,
    pub gas_reimbursed: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone)]
pub struct RequestCancelledEvent {
    pub request_id: u32,
    pub owner: Address,
    pub refund: i128,
    pub timestamp: u64,
}

/// Audit log entry. One appended per lifecycle operation; the log for a
/// request replays its full history.
#[contracttype]
#[derive(Clone)]
pub struct LifecycleEntry {
    pub action: Symbol,
    pub actor: Address,
    pub at: u64,
    pub success: bool,
}

#[contract]
pub struct CallScheduler;

#[contractimpl]
impl CallScheduler {
    /// One-time deployment wiring.
    ///
    /// # Errors
    /// * `AlreadyInitialized` - if called twice
    pub fn init(
        env: Env,
        admin: Address,
        fee_recipient: Address,
        payment_token: Address,
        dispatcher: Address,
        base_gas_price: i128,
        gas_ceiling: u64,
    ) -> Result<(), Error> {
        admin.require_auth();

        if env.storage().instance().has(&symbol_short!("CONFIG")) {
            return Err(Error::AlreadyInitialized);
        }

        Self::extend_instance_ttl(&env);
        let cfg = SchedulerConfig {
            admin,
            fee_recipient,
            payment_token,
            dispatcher,
            base_gas_price,
            gas_ceiling,
        };
        env.storage().instance().set(&symbol_short!("CONFIG"), &cfg);
        Ok(())
    }

    /// Schedule a future call.
    ///
    /// Runs the full six-check validation battery first. A request failing
    /// any check is rejected with an event carrying the failure bitmask and
    /// no state is created; the endowment is only escrowed after the
    /// battery passes, so a rejected requester keeps their funds. On
    /// success the request starts `Unclaimed`, is filed in the discovery
    /// index under its quantized window start, and its id (never 0) is
    /// returned.
    ///
    /// # Errors
    /// * `NotInitialized` - before `init`
    /// * `ValidationFailed` - one or more checks failed; query
    ///   `validate_request` for the per-check diagnosis
    pub fn create_request(env: Env, owner: Address, params: RequestParams) -> Result<u32, Error> {
        // Access control: require owner authorization
        owner.require_auth();

        let cfg = Self::config(&env)?;
        Self::extend_instance_ttl(&env);

        let report = validation::validate_schedule(&env, &cfg, &params);
        if !report.all_passed() {
            env.events().publish(
                (SCHEDULE, RequestEvent::Rejected),
                RequestRejectedEvent {
                    requester: owner,
                    reason_flags: report.reason_flags(),
                    timestamp: env.ledger().timestamp(),
                },
            );
            return Err(Error::ValidationFailed);
        }
        let target = params.target.clone().ok_or(Error::ValidationFailed)?;

        // Escrow the endowment before any state is written
        TokenClient::new(&env, &cfg.payment_token).transfer(
            &owner,
            &env.current_contract_address(),
            &params.endowment,
        );

        let mut requests = Self::requests(&env);
        let request_id = env
            .storage()
            .instance()
            .get(&symbol_short!("NEXT_ID"))
            .unwrap_or(0u32)
            + 1;

        let call = ScheduledCall {
            id: request_id,
            meta: CallMeta {
                owner: owner.clone(),
                creator: owner.clone(),
                cancelled: false,
                was_called: false,
                was_successful: false,
            },
            claim: ClaimData {
                claimant: None,
                collateral: 0,
                payment_modifier: 0,
            },
            payment: PaymentData {
                fee_amount: params.fee_amount,
                fee_recipient: cfg.fee_recipient.clone(),
                fee_owed: 0,
                bounty_amount: params.bounty_amount,
                bounty_benefactor: None,
                bounty_owed: 0,
            },
            schedule: CallSchedule {
                claim_window_size: params.claim_window_size,
                freeze_period: params.freeze_period,
                reserved_window_size: params.reserved_window_size,
                temporal_unit: params.temporal_unit,
                window_start: params.window_start,
                execution_window_size: params.execution_window_size,
                endowment: params.endowment,
            },
            tx_data: TxData {
                target,
                call_data: params.call_data.clone(),
                call_value: params.call_value,
                call_gas: params.call_gas,
            },
        };

        requests.set(request_id, call);
        Self::store_requests(&env, &requests);
        env.storage()
            .instance()
            .set(&symbol_short!("NEXT_ID"), &request_id);

        let bucket = economics::discovery_bucket(params.window_start);
        let mut idx = Self::load_index(&env);
        idx.insert(bucket, request_id);
        Self::store_index(&env, &idx);

        Self::append_history(&env, request_id, symbol_short!("create"), &owner, true);
        env.events().publish(
            (SCHEDULE, RequestEvent::Created),
            RequestCreatedEvent {
                request_id,
                owner,
                bucket,
                params: Self::params_vector(&env, &params),
                timestamp: env.ledger().timestamp(),
            },
        );

        Ok(request_id)
    }

    /// Claim exclusive first-right to execute a request by posting
    /// collateral inside the claim window. The bounty percentage is locked
    /// at claim time from how far into the window the claim lands; claiming
    /// later pays more, claiming earlier buys more of the window.
    ///
    /// # Errors
    /// * `RequestNotFound` - unknown id
    /// * `AlreadyClaimed` - request is not `Unclaimed`
    /// * `InsufficientCollateral` - below `required_collateral`
    /// * `OutsideClaimWindow` - before the window opens or inside the freeze period
    pub fn claim(
        env: Env,
        claimant: Address,
        request_id: u32,
        collateral: i128,
    ) -> Result<(), Error> {
        // Access control: require claimant authorization
        claimant.require_auth();

        let cfg = Self::config(&env)?;
        Self::extend_instance_ttl(&env);

        let mut requests = Self::requests(&env);
        let mut call = requests.get(request_id).ok_or(Error::RequestNotFound)?;

        if call.state() != CallState::Unclaimed {
            return Err(Error::AlreadyClaimed);
        }

        let required = economics::minimum_collateral(
            call.payment.fee_amount,
            call.payment.bounty_amount,
            cfg.base_gas_price,
        );
        if collateral < required {
            return Err(Error::InsufficientCollateral);
        }

        let now = call.now(&env).unwrap_or(0);
        if !call.in_claim_window(now) {
            return Err(Error::OutsideClaimWindow);
        }

        let elapsed = now - call.claim_window_open();
        let modifier = economics::payment_modifier(elapsed, call.schedule.claim_window_size);

        TokenClient::new(&env, &cfg.payment_token).transfer(
            &claimant,
            &env.current_contract_address(),
            &collateral,
        );

        call.claim = ClaimData {
            claimant: Some(claimant.clone()),
            collateral,
            payment_modifier: modifier,
        };
        call.payment.bounty_benefactor = Some(claimant.clone());
        requests.set(request_id, call);
        Self::store_requests(&env, &requests);

        Self::append_history(&env, request_id, symbol_short!("claim"), &claimant, true);
        env.events().publish(
            (SCHEDULE, RequestEvent::Claimed),
            RequestClaimedEvent {
                request_id,
                claimant,
                payment_modifier: modifier,
                collateral,
                timestamp: env.ledger().timestamp(),
            },
        );

        Ok(())
    }

    /// Perform a scheduled call inside its execution window and settle
    /// payments. During the reserved slice only the claimant may call this;
    /// an unclaimed request has no reservation. The dispatch outcome is
    /// recorded, never propagated: a failing target still consumes the
    /// request and settles.
    ///
    /// Returns whether the dispatched call itself succeeded.
    ///
    /// # Errors
    /// * `RequestNotFound` - unknown id
    /// * `AlreadyCalled` - already executed
    /// * `AlreadyCancelled` - cancelled by its owner
    /// * `OutsideExecutionWindow` - before the window or after it closed
    /// * `ReservedWindow` - reserved for the claimant at this point
    pub fn execute(env: Env, caller: Address, request_id: u32) -> Result<bool, Error> {
        // Access control: require executor authorization
        caller.require_auth();

        let cfg = Self::config(&env)?;
        Self::extend_instance_ttl(&env);

        let mut requests = Self::requests(&env);
        let mut call = requests.get(request_id).ok_or(Error::RequestNotFound)?;

        if call.meta.was_called {
            return Err(Error::AlreadyCalled);
        }
        if call.meta.cancelled {
            return Err(Error::AlreadyCancelled);
        }

        let now = call.now(&env).unwrap_or(0);
        if !call.in_execution_window(now) {
            return Err(Error::OutsideExecutionWindow);
        }
        if call.in_reserved_window(now) {
            if let Some(claimant) = &call.claim.claimant {
                if *claimant != caller {
                    return Err(Error::ReservedWindow);
                }
            }
        }

        let outcome = dispatch::dispatch(&env, &cfg.dispatcher, &call.tx_data);
        call.meta.was_called = true;
        call.meta.was_successful = outcome.success;

        // Settlement. The fee pays the operator in full; the bounty pays
        // the benefactor scaled by the locked modifier (100 when nobody
        // claimed); the executor is reimbursed for gas up to what the
        // escrow still covers; whatever remains returns to the owner.
        let fee_owed = call.payment.fee_amount;
        let modifier = if call.claim.claimant.is_some() {
            call.claim.payment_modifier
        } else {
            100
        };
        let bounty_owed = call.payment.bounty_amount * modifier as i128 / 100;
        let benefactor = match &call.claim.claimant {
            Some(claimant) => claimant.clone(),
            None => caller.clone(),
        };
        let gas_cost = outcome.gas_used.min(call.tx_data.call_gas) as i128 * cfg.base_gas_price;
        let available = call.schedule.endowment - fee_owed - bounty_owed;
        let gas_reimbursed = if gas_cost < available { gas_cost } else { available };
        let refund = call.schedule.endowment - fee_owed - bounty_owed - gas_reimbursed;

        call.payment.fee_owed = fee_owed;
        call.payment.bounty_owed = bounty_owed;
        call.payment.bounty_benefactor = Some(benefactor.clone());

        let token = TokenClient::new(&env, &cfg.payment_token);
        let this = env.current_contract_address();
        if fee_owed > 0 {
            token.transfer(&this, &call.payment.fee_recipient, &fee_owed);
        }
        if bounty_owed > 0 {
            token.transfer(&this, &benefactor, &bounty_owed);
        }
        if gas_reimbursed > 0 {
            token.transfer(&this, &caller, &gas_reimbursed);
        }
        if call.claim.collateral > 0 {
            if let Some(claimant) = &call.claim.claimant {
                token.transfer(&this, claimant, &call.claim.collateral);
            }
        }
        if refund > 0 {
            token.transfer(&this, &call.meta.owner, &refund);
        }

        let success = outcome.success;
        requests.set(request_id, call.clone());
        Self::store_requests(&env, &requests);

        let bucket = economics::discovery_bucket(call.schedule.window_start);
        let mut idx = Self::load_index(&env);
        idx.remove(bucket, request_id);
        Self::store_index(&env, &idx);

        Self::append_history(&env, request_id, symbol_short!("execute"), &caller, success);
        env.events().publish(
            (SCHEDULE, RequestEvent::Executed),
            RequestExecutedEvent {
                request_id,
                executor: caller,
                success,
                gas_used: outcome.gas_used,
                fee_owed,
                bounty_owed,
                gas_reimbursed,
                timestamp: env.ledger().timestamp(),
            },
        );

        Ok(success)
    }

    /// Cancel an unclaimed request and refund its endowment. Once a
    /// claimant has committed collateral the request can no longer be
    /// pulled out from under them.
    ///
    /// # Errors
    /// * `RequestNotFound` - unknown id
    /// * `Unauthorized` - caller is not the owner
    /// * `AlreadyClaimed` - a claimant holds the request
    /// * `AlreadyCalled` - already executed
    /// * `AlreadyCancelled` - already cancelled
    pub fn cancel(env: Env, caller: Address, request_id: u32) -> Result<(), Error> {
        // Access control: require caller authorization
        caller.require_auth();

        let cfg = Self::config(&env)?;
        Self::extend_instance_ttl(&env);

        let mut requests = Self::requests(&env);
        let mut call = requests.get(request_id).ok_or(Error::RequestNotFound)?;

        if call.meta.owner != caller {
            return Err(Error::Unauthorized);
        }
        match call.state() {
            CallState::Claimed => return Err(Error::AlreadyClaimed),
            CallState::Executed => return Err(Error::AlreadyCalled),
            CallState::Cancelled => return Err(Error::AlreadyCancelled),
            CallState::Unclaimed => {}
        }

        call.meta.cancelled = true;
        let refund = call.schedule.endowment;
        if refund > 0 {
            TokenClient::new(&env, &cfg.payment_token).transfer(
                &env.current_contract_address(),
                &caller,
                &refund,
            );
        }

        requests.set(request_id, call.clone());
        Self::store_requests(&env, &requests);

        let bucket = economics::discovery_bucket(call.schedule.window_start);
        let mut idx = Self::load_index(&env);
        idx.remove(bucket, request_id);
        Self::store_index(&env, &idx);

        Self::append_history(&env, request_id, symbol_short!("cancel"), &caller, true);
        env.events().publish(
            (SCHEDULE, RequestEvent::Cancelled),
            RequestCancelledEvent {
                request_id,
                owner: caller,
                refund,
                timestamp: env.ledger().timestamp(),
            },
        );

        Ok(())
    }

    /// Dry-run the six scheduling checks. Returns the full per-check
    /// report so automated schedulers can diagnose every problem at once.
    pub fn validate_request(env: Env, params: RequestParams) -> Result<ValidationReport, Error> {
        let cfg = Self::config(&env)?;
        Ok(validation::validate_schedule(&env, &cfg, &params))
    }

    /// Get a request by ID
    pub fn get_request(env: Env, request_id: u32) -> Option<ScheduledCall> {
        Self::requests(&env).get(request_id)
    }

    pub fn get_state(env: Env, request_id: u32) -> Option<CallState> {
        Self::requests(&env).get(request_id).map(|call| call.state())
    }

    /// True iff the id was returned by a successful `create_request`.
    /// Ids are issued from 1, so 0 is never known.
    pub fn is_known_request(env: Env, request_id: u32) -> bool {
        Self::requests(&env).contains_key(request_id)
    }

    /// Minimum collateral a claim must post for a request with the given
    /// fee and bounty at the current base gas price. The same amount is the
    /// minimum endowment such a request must escrow.
    pub fn required_collateral(
        env: Env,
        fee_amount: i128,
        bounty_amount: i128,
    ) -> Result<i128, Error> {
        let cfg = Self::config(&env)?;
        Ok(economics::minimum_collateral(
            fee_amount,
            bounty_amount,
            cfg.base_gas_price,
        ))
    }

    pub fn minimum_grace_period() -> u64 {
        economics::minimum_grace_period()
    }

    pub fn discovery_bucket_of(window_start: u64) -> u64 {
        economics::discovery_bucket(window_start)
    }

    /// First indexed entry strictly after `key`. Walking this from "now"
    /// discovers upcoming calls without scanning the registry.
    pub fn next_scheduled_after(env: Env, key: u64) -> Option<IndexEntry> {
        Self::load_index(&env).next_after(key)
    }

    pub fn previous_scheduled_before(env: Env, key: u64) -> Option<IndexEntry> {
        Self::load_index(&env).previous_before(key)
    }

    /// Request ids filed under a discovery bucket, in creation order.
    pub fn requests_in_bucket(env: Env, bucket: u64) -> Vec<u32> {
        Self::load_index(&env).ids_at(&env, bucket)
    }

    /// Number of requests still waiting in the discovery index.
    pub fn scheduled_count(env: Env) -> u32 {
        Self::load_index(&env).len()
    }

    /// Append-only lifecycle log for a request.
    pub fn get_history(env: Env, request_id: u32) -> Vec<LifecycleEntry> {
        Self::histories(&env)
            .get(request_id)
            .unwrap_or_else(|| Vec::new(&env))
    }

    pub fn get_config(env: Env) -> Result<SchedulerConfig, Error> {
        Self::config(&env)
    }

    /// # Errors
    /// * `Unauthorized` - caller is not the configured admin
    pub fn set_base_gas_price(env: Env, caller: Address, price: i128) -> Result<(), Error> {
        caller.require_auth();
        let mut cfg = Self::config(&env)?;
        if cfg.admin != caller {
            return Err(Error::Unauthorized);
        }
        Self::extend_instance_ttl(&env);
        cfg.base_gas_price = price;
        env.storage().instance().set(&symbol_short!("CONFIG"), &cfg);
        Ok(())
    }

    /// # Errors
    /// * `Unauthorized` - caller is not the configured admin
    pub fn set_gas_ceiling(env: Env, caller: Address, ceiling: u64) -> Result<(), Error> {
        caller.require_auth();
        let mut cfg = Self::config(&env)?;
        if cfg.admin != caller {
            return Err(Error::Unauthorized);
        }
        Self::extend_instance_ttl(&env);
        cfg.gas_ceiling = ceiling;
        env.storage().instance().set(&symbol_short!("CONFIG"), &cfg);
        Ok(())
    }

    fn config(env: &Env) -> Result<SchedulerConfig, Error> {
        env.storage()
            .instance()
            .get(&symbol_short!("CONFIG"))
            .ok_or(Error::NotInitialized)
    }

    fn requests(env: &Env) -> Map<u32, ScheduledCall> {
        env.storage()
            .instance()
            .get(&symbol_short!("REQS"))
            .unwrap_or_else(|| Map::new(env))
    }

    fn store_requests(env: &Env, requests: &Map<u32, ScheduledCall>) {
        env.storage().instance().set(&symbol_short!("REQS"), requests);
    }

    fn load_index(env: &Env) -> ScheduleIndex {
        env.storage()
            .instance()
            .get(&symbol_short!("INDEX"))
            .unwrap_or_else(|| ScheduleIndex::new(env))
    }

    fn store_index(env: &Env, idx: &ScheduleIndex) {
        env.storage().instance().set(&symbol_short!("INDEX"), idx);
    }

    fn histories(env: &Env) -> Map<u32, Vec<LifecycleEntry>> {
        env.storage()
            .instance()
            .get(&symbol_short!("HISTORY"))
            .unwrap_or_else(|| Map::new(env))
    }

    fn append_history(env: &Env, request_id: u32, action: Symbol, actor: &Address, success: bool) {
        let mut histories = Self::histories(env);
        let mut log = histories.get(request_id).unwrap_or_else(|| Vec::new(env));
        log.push_back(LifecycleEntry {
            action,
            actor: actor.clone(),
            at: env.ledger().timestamp(),
            success,
        });
        histories.set(request_id, log);
        env.storage()
            .instance()
            .set(&symbol_short!("HISTORY"), &histories);
    }

    fn params_vector(env: &Env, params: &RequestParams) -> Vec<i128> {
        let mut out = Vec::new(env);
        out.push_back(params.fee_amount);
        out.push_back(params.bounty_amount);
        out.push_back(params.claim_window_size as i128);
        out.push_back(params.freeze_period as i128);
        out.push_back(params.reserved_window_size as i128);
        out.push_back(params.temporal_unit as i128);
        out.push_back(params.execution_window_size as i128);
        out.push_back(params.window_start as i128);
        out.push_back(params.call_gas as i128);
        out.push_back(params.call_value);
        out.push_back(params.endowment);
        out.push_back(params.call_data.len() as i128);
        out
    }

    fn extend_instance_ttl(env: &Env) {
        env.storage()
            .instance()
            .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
    }
}
