use crate::api::{Dashboard, VirtualMachine};
use crate::cache::VmCache;
use crate::error::OnappError;
use crate::prompt::{Prompt, affirmed};
use crate::util::levenshtein;

/// Turn a free-text operator query into exactly one virtual machine.
///
/// A numeric query is treated as an authoritative id and fetched directly.
/// Otherwise the candidate list comes from the local cache when
/// `allow_cache` is set (falling back to a remote fetch, which refreshes
/// the cache as a side effect), and the query is matched case-insensitively
/// against labels and hostnames. Without an exact match the closest
/// candidate by edit distance is proposed for confirmation.
///
/// Any match influenced by the cache is re-resolved by id with the cache
/// off before being returned, so callers never act on stale records.
pub async fn resolve<A, P>(
    api: &A,
    cache: &VmCache,
    prompt: &mut P,
    query: &str,
    allow_cache: bool,
) -> Result<VirtualMachine, OnappError>
where
    A: Dashboard,
    P: Prompt,
{
    let query = query.trim().to_lowercase();

    // Easiest case: the operator passed an id directly.
    if let Ok(id) = query.parse::<i64>() {
        return api.virtual_machine(id).await;
    }

    let mut was_cached = false;
    let mut vms: Option<Vec<VirtualMachine>> = None;
    if allow_cache {
        match cache.load() {
            Ok(list) => {
                was_cached = true;
                vms = Some(list);
            }
            // An absent cache is the normal first-run state, not worth a warning.
            Err(OnappError::CacheMissing) => {}
            Err(e) => tracing::warn!("skipping cache: {e}"),
        }
    }
    let vms = match vms {
        Some(list) => list,
        None => {
            let list = api.virtual_machines().await?;
            // Best effort: a cache that can't be written never blocks resolution.
            if let Err(e) = cache.store(&list) {
                tracing::warn!("unable to save the cache: {e}");
            }
            list
        }
    };

    let mut candidate: Option<(&VirtualMachine, usize)> = None;
    for vm in &vms {
        // Don't bother ranking closeness when we have an exact match.
        if vm.label.to_lowercase() == query || vm.hostname.to_lowercase() == query {
            if was_cached {
                // Re-resolve by id with the cache off so the caller gets a
                // fresh record, not whatever state the snapshot remembers.
                return Box::pin(resolve(api, cache, prompt, &vm.id.to_string(), false)).await;
            }
            return Ok(vm.clone());
        }
        let dist = levenshtein(&vm.label.to_lowercase(), &query)
            .min(levenshtein(&vm.hostname.to_lowercase(), &query));
        // Strict improvement only: ties keep the first-seen candidate.
        match candidate {
            Some((_, best)) if dist >= best => {}
            _ => candidate = Some((vm, dist)),
        }
    }

    let Some((best, dist)) = candidate else {
        if was_cached {
            tracing::warn!("missed everything, retrying without cache");
            return Box::pin(resolve(api, cache, prompt, &query, false)).await;
        }
        return Err(OnappError::NoMatch { query });
    };

    tracing::debug!(id = best.id, dist, "closest inexact candidate");
    let response = prompt.ask(&format!(
        "Inexact match found for '{query}': (#{}, {}) - do you want to continue? [y/n]: ",
        best.id, best.label
    ))?;
    if !affirmed(&response) {
        return Err(OnappError::Cancelled);
    }
    if allow_cache || was_cached {
        return Box::pin(resolve(api, cache, prompt, &best.id.to_string(), false)).await;
    }
    Ok(best.clone())
}
