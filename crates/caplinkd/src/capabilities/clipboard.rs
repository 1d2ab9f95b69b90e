//! Daemon-held clipboard.
//!
//! `--ez set true` stores whatever the caller streams over the input
//! socket; the default invocation returns the current content as plain
//! text. The stored string is the one piece of handler state that
//! legitimately outlives a single call.

use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};

use crate::dispatch::{CapabilityContext, CapabilityError, CapabilityHandler};
use crate::grammar::Request;
use crate::result::{ResultPayload, RunMode};

/// Clipboard get/set capability.
#[derive(Debug, Default)]
pub struct ClipboardHandler {
    content: Arc<RwLock<String>>,
}

impl CapabilityHandler for ClipboardHandler {
    fn handle(&self, ctx: &CapabilityContext, request: &Request) -> Result<(), CapabilityError> {
        if request.bool_param("set", false) {
            let store = Arc::clone(&self.content);
            ctx.returner().return_result(
                request,
                RunMode::Background,
                ResultPayload::with_input(false, move |input, _out| {
                    let mut content = store.write().unwrap_or_else(PoisonError::into_inner);
                    input.clone_into(&mut content);
                    Ok(())
                }),
            );
        } else {
            let snapshot = self
                .content
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            ctx.returner().return_result(
                request,
                RunMode::Background,
                ResultPayload::text(move |out| out.write_all(snapshot.as_bytes())),
            );
        }
        Ok(())
    }
}
