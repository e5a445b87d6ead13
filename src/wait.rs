use std::time::Duration;

use chrono::Utc;

use crate::api::{Dashboard, Transaction};
use crate::error::OnappError;
use crate::prompt::{Prompt, declined};

/// Seconds between polling passes, and the step the elapsed counter grows by.
const POLL_INTERVAL_SECS: u64 = 5;
/// Give up once the elapsed counter exceeds this many seconds.
const WAIT_BUDGET_SECS: u64 = 30;
/// Only the newest entries of each page are worth inspecting; anything
/// deeper predates the action we queued.
const SCAN_DEPTH: usize = 5;

/// Poll the machine's transaction list until a transaction with the given
/// action, created after the wait began, shows up.
///
/// The reference instant is padded 5 seconds into the past to absorb clock
/// skew between us and the dashboard. Entries are newest-first, so the scan
/// of a page stops at the first entry older than the reference instant.
/// Transport errors propagate immediately; only the empty-handed case is
/// retried, every `POLL_INTERVAL_SECS`, up to `WAIT_BUDGET_SECS`.
pub async fn await_transaction<A>(
    api: &A,
    vm_id: i64,
    action: &str,
) -> Result<Transaction, OnappError>
where
    A: Dashboard,
{
    let reference = Utc::now() - chrono::Duration::seconds(POLL_INTERVAL_SECS as i64);
    let mut elapsed = 0u64;
    loop {
        if elapsed > WAIT_BUDGET_SECS {
            return Err(OnappError::TimedOut {
                action: action.to_string(),
            });
        }
        let txns = api.transactions(vm_id).await?;
        for tx in txns.iter().take(SCAN_DEPTH) {
            // Unparseable creation time: skip the entry.
            let Some(created) = tx.created_at_time() else {
                continue;
            };
            // Older than our job: everything after it is older still.
            if created < reference {
                break;
            }
            // Wrong type of job.
            if tx.action != action {
                continue;
            }
            return Ok(tx.clone());
        }
        tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
        elapsed += POLL_INTERVAL_SECS;
    }
}

/// Confirmation gate invoked before queuing any mutating action.
///
/// If the machine already has a transaction with status "running", the
/// operator is warned and asked whether to queue anyway. Note the decline
/// check: only an explicit leading `n` aborts here, anything else proceeds.
pub async fn check_busy<A, P>(api: &A, prompt: &mut P, vm_id: i64) -> Result<(), OnappError>
where
    A: Dashboard,
    P: Prompt,
{
    let Some(busy) = api.running_transaction(vm_id).await? else {
        return Ok(());
    };
    tracing::warn!("this VM is currently running a transaction: {}", busy.action);
    let response = prompt.ask("Do you want to queue another action anyway? [y/n]: ")?;
    if declined(&response) {
        return Err(OnappError::Cancelled);
    }
    Ok(())
}
