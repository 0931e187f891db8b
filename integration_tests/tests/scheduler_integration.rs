#![cfg(test)]

use soroban_sdk::testutils::{Address as _, Ledger, LedgerInfo};
use soroban_sdk::token::{StellarAssetClient, TokenClient};
use soroban_sdk::{contract, contractimpl, symbol_short, Address, Bytes, Env, Val, Vec};

use call_scheduler::{
    CallScheduler, CallSchedulerClient, CallState, DispatchResult, Error, RequestParams,
};

/// Target contract whose invocations we can count.
#[contract]
pub struct Counter;

#[contractimpl]
impl Counter {
    pub fn poke(env: Env) -> u32 {
        let count: u32 = env
            .storage()
            .instance()
            .get(&symbol_short!("COUNT"))
            .unwrap_or(0)
            + 1;
        env.storage().instance().set(&symbol_short!("COUNT"), &count);
        count
    }

    pub fn count(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&symbol_short!("COUNT"))
            .unwrap_or(0)
    }
}

/// Reference dispatcher: performs a real cross-contract call on the target
/// and reports a flat gas figure.
#[contract]
pub struct PokeDispatcher;

#[contractimpl]
impl PokeDispatcher {
    pub fn invoke(
        env: Env,
        target: Address,
        payload: Bytes,
        value: i128,
        gas_limit: u64,
    ) -> DispatchResult {
        let _ = (payload, value);
        let _: u32 = env.invoke_contract(
            &target,
            &symbol_short!("poke"),
            Vec::<Val>::new(&env),
        );
        DispatchResult {
            success: true,
            gas_used: gas_limit.min(30_000),
        }
    }
}

/// Dispatcher that always reverts, standing in for a target whose call
/// blows up. The scheduler must absorb this.
///
/// Wrapped in its own module so the `#[contractimpl]`-generated `__invoke`
/// shim does not collide with `PokeDispatcher`'s (both contracts expose a
/// method named `invoke`, and the macro keys the generated items on the
/// method name alone).
mod reverting {
    use super::*;

    #[contract]
    pub struct RevertingDispatcher;

    #[contractimpl]
    impl RevertingDispatcher {
        pub fn invoke(
            env: Env,
            target: Address,
            payload: Bytes,
            value: i128,
            gas_limit: u64,
        ) -> DispatchResult {
            let _ = (env, target, payload, value, gas_limit);
            panic!("target reverted");
        }
    }
}
use reverting::RevertingDispatcher;

fn set_ledger(env: &Env, sequence: u32, timestamp: u64) {
    let proto = env.ledger().protocol_version();

    env.ledger().set(LedgerInfo {
        protocol_version: proto,
        sequence_number: sequence,
        timestamp,
        network_id: [0; 32],
        base_reserve: 10,
        min_temp_entry_ttl: 1,
        min_persistent_entry_ttl: 1,
        max_entry_ttl: 100000,
    });
}

struct Deployment {
    token: Address,
    scheduler: Address,
    target: Address,
    fee_recipient: Address,
}

fn deploy(env: &Env, dispatcher: &Address) -> Deployment {
    let admin = Address::generate(env);
    let fee_recipient = Address::generate(env);
    let token_admin = Address::generate(env);
    let token = env
        .register_stellar_asset_contract_v2(token_admin)
        .address();
    let target = env.register_contract(None, Counter);
    let scheduler = env.register_contract(None, CallScheduler);
    let client = CallSchedulerClient::new(env, &scheduler);
    client.init(&admin, &fee_recipient, &token, dispatcher, &1, &10_000_000);
    Deployment {
        token,
        scheduler,
        target,
        fee_recipient,
    }
}

fn request_params(target: &Address, env: &Env) -> RequestParams {
    RequestParams {
        target: Some(target.clone()),
        call_data: Bytes::from_slice(env, &[0x42]),
        call_value: 0,
        call_gas: 60_000,
        fee_amount: 500,
        bounty_amount: 1_500,
        claim_window_size: 200,
        freeze_period: 10,
        reserved_window_size: 32,
        temporal_unit: 1,
        window_start: 1050,
        execution_window_size: 400,
        endowment: 250_000,
    }
}

/// Complete user flow: deploy, validate, schedule, discover through the
/// index, claim, execute inside the reserved slice, verify the target ran
/// and every party settled.
#[test]
fn test_full_scheduler_lifecycle() {
    let env = Env::default();
    env.mock_all_auths();
    set_ledger(&env, 1000, 1000);

    let dispatcher = env.register_contract(None, PokeDispatcher);
    let deployment = deploy(&env, &dispatcher);
    let client = CallSchedulerClient::new(&env, &deployment.scheduler);

    let owner = Address::generate(&env);
    let agent = Address::generate(&env);
    StellarAssetClient::new(&env, &deployment.token).mint(&owner, &1_000_000);
    StellarAssetClient::new(&env, &deployment.token).mint(&agent, &500_000);

    let params = request_params(&deployment.target, &env);

    // Dry-run the checks first, the way a scheduling agent would
    let report = client.validate_request(&params);
    assert!(report.all_passed());

    let request_id = client.create_request(&owner, &params);
    assert_eq!(request_id, 1);
    assert!(client.is_known_request(&request_id));
    assert!(!client.is_known_request(&0));
    assert_eq!(client.get_state(&request_id), Some(CallState::Unclaimed));

    // Discovery: the request shows up under its quantized window start
    let entry = client.next_scheduled_after(&1000).unwrap();
    assert_eq!(entry.id, request_id);
    assert_eq!(entry.key, client.discovery_bucket_of(&1050));

    // Claim window is [850, 1040); claim at 1020
    set_ledger(&env, 1020, 1020);
    let required = client.required_collateral(&500, &1_500);
    client.claim(&agent, &request_id, &required);
    assert_eq!(client.get_state(&request_id), Some(CallState::Claimed));

    // Execute inside the reserved slice as the claimant
    set_ledger(&env, 1060, 1060);
    let success = client.execute(&agent, &request_id);
    assert!(success);

    // The scheduled call really ran
    let counter = CounterClient::new(&env, &deployment.target);
    assert_eq!(counter.count(), 1);

    // Modifier locked at claim time: 170 of 200 elapsed
    let call = client.get_request(&request_id).unwrap();
    assert_eq!(call.claim.payment_modifier, 92);
    assert_eq!(call.payment.fee_owed, 500);
    assert_eq!(call.payment.bounty_owed, 1_380);

    let token_client = TokenClient::new(&env, &deployment.token);
    assert_eq!(token_client.balance(&deployment.fee_recipient), 500);
    // Collateral back, plus the scaled bounty and 30_000 gas at price 1
    assert_eq!(token_client.balance(&agent), 500_000 + 1_380 + 30_000);
    // Owner paid the fee, the bounty and the gas; the rest came back
    assert_eq!(token_client.balance(&owner), 1_000_000 - 500 - 1_380 - 30_000);
    assert_eq!(token_client.balance(&deployment.scheduler), 0);

    assert_eq!(client.get_state(&request_id), Some(CallState::Executed));
    assert_eq!(client.scheduled_count(), 0);
    assert_eq!(client.next_scheduled_after(&1000), None);
    assert_eq!(client.get_history(&request_id).len(), 3);
}

/// A rejected request creates nothing and moves nothing; the same caller
/// can diagnose the failures and resubmit corrected parameters.
#[test]
fn test_rejection_then_corrected_request() {
    let env = Env::default();
    env.mock_all_auths();
    set_ledger(&env, 1000, 1000);

    let dispatcher = env.register_contract(None, PokeDispatcher);
    let deployment = deploy(&env, &dispatcher);
    let client = CallSchedulerClient::new(&env, &deployment.scheduler);

    let owner = Address::generate(&env);
    StellarAssetClient::new(&env, &deployment.token).mint(&owner, &1_000_000);

    let mut params = request_params(&deployment.target, &env);
    params.target = None;
    params.window_start = 1005; // inside the 10-unit freeze period

    let result = client.try_create_request(&owner, &params);
    assert_eq!(result, Err(Ok(Error::ValidationFailed)));

    // Both failures visible at once through the dry-run query
    let report = client.validate_request(&params);
    assert!(!report.start_after_freeze);
    assert!(!report.target_is_set);
    assert_eq!(report.reason_flags(), (1 << 3) | (1 << 5));

    assert!(!client.is_known_request(&1));
    assert_eq!(client.scheduled_count(), 0);
    let token_client = TokenClient::new(&env, &deployment.token);
    assert_eq!(token_client.balance(&owner), 1_000_000);

    params.target = Some(deployment.target.clone());
    params.window_start = 1050;
    let request_id = client.create_request(&owner, &params);
    assert_eq!(request_id, 1);
}

/// A reverting dispatch is absorbed: the transition completes, the failure
/// is recorded as data and settlement still runs.
#[test]
fn test_reverting_dispatch_is_absorbed() {
    let env = Env::default();
    env.mock_all_auths();
    set_ledger(&env, 1000, 1000);

    let dispatcher = env.register_contract(None, RevertingDispatcher);
    let deployment = deploy(&env, &dispatcher);
    let client = CallSchedulerClient::new(&env, &deployment.scheduler);

    let owner = Address::generate(&env);
    let executor = Address::generate(&env);
    StellarAssetClient::new(&env, &deployment.token).mint(&owner, &1_000_000);

    let request_id = client.create_request(&owner, &request_params(&deployment.target, &env));

    set_ledger(&env, 1060, 1060);
    let success = client.execute(&executor, &request_id);
    assert!(!success);

    let call = client.get_request(&request_id).unwrap();
    assert_eq!(call.state(), CallState::Executed);
    assert!(call.meta.was_called);
    assert!(!call.meta.was_successful);

    // Nothing ran on the target
    let counter = CounterClient::new(&env, &deployment.target);
    assert_eq!(counter.count(), 0);

    // Unclaimed execution: full bounty to the executor, no gas reported
    let token_client = TokenClient::new(&env, &deployment.token);
    assert_eq!(token_client.balance(&deployment.fee_recipient), 500);
    assert_eq!(token_client.balance(&executor), 1_500);
    assert_eq!(token_client.balance(&owner), 1_000_000 - 500 - 1_500);
}

/// Several pending requests stay discoverable in window order; cancelling
/// one removes it from the walk but not from the registry.
#[test]
fn test_discovery_across_many_requests() {
    let env = Env::default();
    env.mock_all_auths();
    set_ledger(&env, 1000, 1000);

    let dispatcher = env.register_contract(None, PokeDispatcher);
    let deployment = deploy(&env, &dispatcher);
    let client = CallSchedulerClient::new(&env, &deployment.scheduler);

    let owner = Address::generate(&env);
    StellarAssetClient::new(&env, &deployment.token).mint(&owner, &10_000_000);

    // Buckets: 1100 -> 1088, 1120 -> 1120, 1200 -> 1200, 1210 -> 1200,
    // 1300 -> 1296
    for start in [1100u64, 1120, 1200, 1210, 1300] {
        let mut params = request_params(&deployment.target, &env);
        params.window_start = start;
        client.create_request(&owner, &params);
    }
    assert_eq!(client.scheduled_count(), 5);
    assert_eq!(
        client.requests_in_bucket(&1200),
        soroban_sdk::vec![&env, 3, 4]
    );

    client.cancel(&owner, &1);
    assert_eq!(client.scheduled_count(), 4);
    assert!(client.is_known_request(&1));
    assert_eq!(client.get_state(&1), Some(CallState::Cancelled));

    let mut walk = soroban_sdk::Vec::new(&env);
    let mut cursor = 1000u64;
    while let Some(entry) = client.next_scheduled_after(&cursor) {
        for id in client.requests_in_bucket(&entry.key).iter() {
            walk.push_back(id);
        }
        cursor = entry.key;
    }
    assert_eq!(walk, soroban_sdk::vec![&env, 2, 3, 4, 5]);

    let last = client.previous_scheduled_before(&u64::MAX).unwrap();
    assert_eq!((last.key, last.id), (1296, 5));
}

/// The same machinery works against wall-clock time when a request is
/// scheduled in the timestamp unit.
#[test]
fn test_timestamp_unit_lifecycle() {
    let env = Env::default();
    env.mock_all_auths();
    // Sequence frozen; only the timestamp advances
    set_ledger(&env, 77, 100_000);

    let dispatcher = env.register_contract(None, PokeDispatcher);
    let deployment = deploy(&env, &dispatcher);
    let client = CallSchedulerClient::new(&env, &deployment.scheduler);

    let owner = Address::generate(&env);
    let agent = Address::generate(&env);
    StellarAssetClient::new(&env, &deployment.token).mint(&owner, &1_000_000);
    StellarAssetClient::new(&env, &deployment.token).mint(&agent, &500_000);

    let mut params = request_params(&deployment.target, &env);
    params.temporal_unit = 2;
    params.window_start = 100_300;
    params.claim_window_size = 250;
    params.freeze_period = 20;
    params.reserved_window_size = 60;
    params.execution_window_size = 120;
    let request_id = client.create_request(&owner, &params);

    // Claim window [100_050, 100_280)
    set_ledger(&env, 77, 100_100);
    let required = client.required_collateral(&500, &1_500);
    client.claim(&agent, &request_id, &required);

    // Still claimed, not executable before the window opens
    let result = client.try_execute(&agent, &request_id);
    assert_eq!(result, Err(Ok(Error::OutsideExecutionWindow)));

    set_ledger(&env, 77, 100_310);
    let success = client.execute(&agent, &request_id);
    assert!(success);

    let counter = CounterClient::new(&env, &deployment.target);
    assert_eq!(counter.count(), 1);
    assert_eq!(client.get_state(&request_id), Some(CallState::Executed));
}
