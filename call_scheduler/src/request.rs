use soroban_sdk::{contracttype, Address, Bytes, Env};

use crate::economics::{TEMPORAL_UNIT_BLOCKS, TEMPORAL_UNIT_TIMESTAMP};

/// Caller-supplied scheduling payload. Everything in here is validated
/// before a request is created; the `target` stays optional so that the
/// validator can report a missing target instead of rejecting the call
/// shape outright.
#[contracttype]
#[derive(Clone)]
pub struct RequestParams {
    pub target: Option<Address>,
    pub call_data: Bytes,
    pub call_value: i128,
    pub call_gas: u64,
    pub fee_amount: i128,
    pub bounty_amount: i128,
    pub claim_window_size: u64,
    pub freeze_period: u64,
    pub reserved_window_size: u64,
    pub temporal_unit: u32,
    pub window_start: u64,
    pub execution_window_size: u64,
    pub endowment: i128,
}

#[contracttype]
#[derive(Clone)]
pub struct CallMeta {
    pub owner: Address,
    pub creator: Address,
    pub cancelled: bool,
    pub was_called: bool,
    pub was_successful: bool,
}

/// Claim auction outcome. The payment modifier is locked at claim time and
/// never recomputed.
#[contracttype]
#[derive(Clone)]
pub struct ClaimData {
    pub claimant: Option<Address>,
    pub collateral: i128,
    pub payment_modifier: u32,
}

#[contracttype]
#[derive(Clone)]
pub struct PaymentData {
    pub fee_amount: i128,
    pub fee_recipient: Address,
    pub fee_owed: i128,
    pub bounty_amount: i128,
    pub bounty_benefactor: Option<Address>,
    pub bounty_owed: i128,
}

/// Validated temporal parameters plus the escrowed endowment.
#[contracttype]
#[derive(Clone)]
pub struct CallSchedule {
    pub claim_window_size: u64,
    pub freeze_period: u64,
    pub reserved_window_size: u64,
    pub temporal_unit: u32,
    pub window_start: u64,
    pub execution_window_size: u64,
    pub endowment: i128,
}

/// The call to dispatch once the window opens.
#[contracttype]
#[derive(Clone)]
pub struct TxData {
    pub target: Address,
    pub call_data: Bytes,
    pub call_value: i128,
    pub call_gas: u64,
}

/// Durable record for one scheduled call. Lives in the request registry for
/// the lifetime of the contract; terminal states are kept, not deleted.
#[contracttype]
#[derive(Clone)]
pub struct ScheduledCall {
    pub id: u32,
    pub meta: CallMeta,
    pub claim: ClaimData,
    pub payment: PaymentData,
    pub schedule: CallSchedule,
    pub tx_data: TxData,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum CallState {
    Unclaimed = 1,
    Claimed = 2,
    Executed = 3,
    Cancelled = 4,
}

/// Current reading of the clock a request was scheduled against. `None` for
/// an unknown unit, which the validator treats as its own failure.
pub fn unit_now(env: &Env, temporal_unit: u32) -> Option<u64> {
    match temporal_unit {
        TEMPORAL_UNIT_BLOCKS => Some(env.ledger().sequence() as u64),
        TEMPORAL_UNIT_TIMESTAMP => Some(env.ledger().timestamp()),
        _ => None,
    }
}

impl ScheduledCall {
    /// State is derived from the lifecycle flags. A claimed request whose
    /// execution window has passed still reads `Claimed`; abandonment is a
    /// sink, not a transition.
    pub fn state(&self) -> CallState {
        if self.meta.cancelled {
            CallState::Cancelled
        } else if self.meta.was_called {
            CallState::Executed
        } else if self.claim.claimant.is_some() {
            CallState::Claimed
        } else {
            CallState::Unclaimed
        }
    }

    pub fn claim_window_open(&self) -> u64 {
        self.schedule
            .window_start
            .saturating_sub(self.schedule.claim_window_size)
    }

    /// Claiming stops once the freeze period before the window start begins.
    pub fn claim_window_close(&self) -> u64 {
        self.schedule
            .window_start
            .saturating_sub(self.schedule.freeze_period)
    }

    pub fn in_claim_window(&self, now: u64) -> bool {
        now >= self.claim_window_open() && now < self.claim_window_close()
    }

    pub fn execution_window_close(&self) -> u64 {
        self.schedule
            .window_start
            .saturating_add(self.schedule.execution_window_size)
    }

    pub fn in_execution_window(&self, now: u64) -> bool {
        now >= self.schedule.window_start && now < self.execution_window_close()
    }

    /// First slice of the execution window, reserved for the claimant.
    pub fn in_reserved_window(&self, now: u64) -> bool {
        now >= self.schedule.window_start
            && now
                < self
                    .schedule
                    .window_start
                    .saturating_add(self.schedule.reserved_window_size)
    }

    pub fn now(&self, env: &Env) -> Option<u64> {
        unit_now(env, self.schedule.temporal_unit)
    }
}
