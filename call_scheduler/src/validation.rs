use soroban_sdk::{contracttype, vec, Env, Vec};

use crate::economics::{
    minimum_collateral, TEMPORAL_UNIT_BLOCKS, TEMPORAL_UNIT_TIMESTAMP,
};
use crate::request::{unit_now, RequestParams};
use crate::SchedulerConfig;

/// Outcome of the six scheduling checks. Every flag is computed on every
/// run; automated schedulers get the complete diagnosis in one call instead
/// of a stop-at-first-error signal.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationReport {
    /// Check 0: endowment covers twice the fee and bounty plus the gas floor.
    pub sufficient_endowment: bool,
    /// Check 1: reserved slice fits inside the execution window.
    pub reserve_fits_window: bool,
    /// Check 2: temporal unit is ledger sequence or timestamp.
    pub known_temporal_unit: bool,
    /// Check 3: window start clears the freeze period from now.
    pub start_after_freeze: bool,
    /// Check 4: requested call gas is under the network ceiling.
    pub gas_within_ceiling: bool,
    /// Check 5: a dispatch target was supplied.
    pub target_is_set: bool,
}

impl ValidationReport {
    pub fn all_passed(&self) -> bool {
        self.sufficient_endowment
            && self.reserve_fits_window
            && self.known_temporal_unit
            && self.start_after_freeze
            && self.gas_within_ceiling
            && self.target_is_set
    }

    /// Bitmask for the rejection event: bit i set means check i failed.
    pub fn reason_flags(&self) -> u32 {
        let mut flags = 0u32;
        for (i, passed) in self.checks().iter().copied().enumerate() {
            if !passed {
                flags |= 1 << i;
            }
        }
        flags
    }

    /// The six flags in check order.
    pub fn to_flag_vec(&self, env: &Env) -> Vec<bool> {
        let checks = self.checks();
        vec![
            env, checks[0], checks[1], checks[2], checks[3], checks[4], checks[5],
        ]
    }

    fn checks(&self) -> [bool; 6] {
        [
            self.sufficient_endowment,
            self.reserve_fits_window,
            self.known_temporal_unit,
            self.start_after_freeze,
            self.gas_within_ceiling,
            self.target_is_set,
        ]
    }
}

/// Runs all six checks against a proposed request. No short-circuit: a
/// request failing several checks reports every one of them.
pub fn validate_schedule(
    env: &Env,
    cfg: &SchedulerConfig,
    params: &RequestParams,
) -> ValidationReport {
    let required = minimum_collateral(
        params.fee_amount,
        params.bounty_amount,
        cfg.base_gas_price,
    );

    // An unknown unit has no clock reading, so the freeze check fails with it.
    let start_after_freeze = match unit_now(env, params.temporal_unit) {
        Some(now) => params.window_start >= now.saturating_add(params.freeze_period),
        None => false,
    };

    ValidationReport {
        sufficient_endowment: params.endowment >= required,
        reserve_fits_window: params.reserved_window_size <= params.execution_window_size,
        known_temporal_unit: params.temporal_unit == TEMPORAL_UNIT_BLOCKS
            || params.temporal_unit == TEMPORAL_UNIT_TIMESTAMP,
        start_after_freeze,
        gas_within_ceiling: params.call_gas <= cfg.gas_ceiling,
        target_is_set: params.target.is_some(),
    }
}
