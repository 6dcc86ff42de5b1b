//! Concurrent delivery of one value to every output.

use super::io::{deliver_guarded, SharedOutput};
use crate::context::Context;
use crate::error::{panic_message, FaucetError};
use std::thread;

/// Deliver `value` to all `outputs` and join them.
///
/// Each output runs on its own scoped thread behind a panic boundary, so a
/// failing output never prevents its siblings from completing. Returns every
/// failure, ordered by output index.
pub(crate) fn fan_out<T>(outputs: &[SharedOutput<T>], ctx: &Context, value: &T) -> Vec<FaucetError>
where
    T: Sync,
{
    match outputs {
        [] => Vec::new(),
        [only] => deliver_guarded(0, only, ctx, value).err().into_iter().collect(),
        _ => thread::scope(|scope| {
            let handles: Vec<_> = outputs
                .iter()
                .enumerate()
                .map(|(index, output)| {
                    let spawned = thread::Builder::new()
                        .name(format!("faucet-output-{index}"))
                        .spawn_scoped(scope, move || deliver_guarded(index, output, ctx, value));
                    (index, spawned)
                })
                .collect();

            let mut errors = Vec::new();
            for (index, spawned) in handles {
                let result = match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|payload| {
                        Err(FaucetError::OutputPanic {
                            index,
                            message: panic_message(payload.as_ref()),
                        })
                    }),
                    Err(source) => Err(FaucetError::Spawn {
                        thread: format!("faucet-output-{index}"),
                        source,
                    }),
                };
                if let Err(e) = result {
                    errors.push(e);
                }
            }
            errors
        }),
    }
}
