use soroban_sdk::{contractclient, contracttype, Address, Bytes, Env};

use crate::request::TxData;

/// What the dispatcher observed when it performed the call. Gas used feeds
/// the executor's reimbursement at settlement.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DispatchResult {
    pub success: bool,
    pub gas_used: u64,
}

/// External collaborator that performs the scheduled call. Implementations
/// must absorb a revert of the target and report it as `success = false`
/// rather than failing the invocation.
#[contractclient(name = "CallDispatcherClient")]
pub trait CallDispatcher {
    fn invoke(
        env: Env,
        target: Address,
        payload: Bytes,
        value: i128,
        gas_limit: u64,
    ) -> DispatchResult;
}

/// Invokes the configured dispatcher. Any failure on the dispatcher side,
/// including a malformed result, is folded into a failed dispatch so the
/// scheduler's own transition still completes.
pub fn dispatch(env: &Env, dispatcher: &Address, tx: &TxData) -> DispatchResult {
    let client = CallDispatcherClient::new(env, dispatcher);
    match client.try_invoke(&tx.target, &tx.call_data, &tx.call_value, &tx.call_gas) {
        Ok(Ok(result)) => result,
        _ => DispatchResult {
            success: false,
            gas_used: 0,
        },
    }
}
