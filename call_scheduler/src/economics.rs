//! Pricing for the claim auction and the discovery index granularity.
//!
//! Everything here is pure arithmetic over validated inputs; none of these
//! functions touch storage.

/// Gas floor priced into every endowment and claim collateral, whether or
/// not the scheduled call asks for less.
pub const MINIMUM_CALL_GAS: u64 = 200_000;

/// Discovery-bucket granularity. Window starts are quantized down to a
/// multiple of this before they become index keys.
pub const CALL_WINDOW_SIZE: u64 = 16;

/// Payment modifier at the moment the claim window opens. Grows linearly to
/// 100 at window close.
pub const PAYMENT_MODIFIER_FLOOR: u32 = 50;

/// Temporal unit: windows measured in ledger sequence numbers.
pub const TEMPORAL_UNIT_BLOCKS: u32 = 1;

/// Temporal unit: windows measured in ledger timestamps (seconds).
pub const TEMPORAL_UNIT_TIMESTAMP: u32 = 2;

/// Minimum collateral a claimant must post, and equally the minimum
/// endowment a request must escrow: twice the combined fee and bounty plus
/// the gas floor at the current base price.
pub fn minimum_collateral(fee_amount: i128, bounty_amount: i128, base_gas_price: i128) -> i128 {
    2 * (fee_amount + bounty_amount) + MINIMUM_CALL_GAS as i128 * base_gas_price
}

/// Bounty percentage locked in at claim time. Claiming at window open pays
/// the floor; the percentage rises linearly and reaches 100 once `elapsed`
/// covers the whole claim window. Monotonic non-decreasing in `elapsed`.
pub fn payment_modifier(elapsed: u64, claim_window_size: u64) -> u32 {
    if claim_window_size == 0 {
        return 100;
    }
    let span = (100 - PAYMENT_MODIFIER_FLOOR) as u128;
    let progress = elapsed.min(claim_window_size) as u128;
    PAYMENT_MODIFIER_FLOOR + (span * progress / claim_window_size as u128) as u32
}

/// Floor on execution-window sizing. Anything shorter risks a request whose
/// whole window falls inside a single index bucket being discovered too
/// late to act on.
pub fn minimum_grace_period() -> u64 {
    2 * CALL_WINDOW_SIZE
}

/// Index key for a request: its window start rounded down to the bucket
/// granularity.
pub fn discovery_bucket(window_start: u64) -> u64 {
    window_start - (window_start % CALL_WINDOW_SIZE)
}
