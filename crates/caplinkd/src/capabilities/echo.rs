//! Diagnostic parameter echo.
//!
//! Streams the parsed parameter set back as text, one `kind name=value`
//! line per parameter. Handy for exercising the grammar and the result
//! channel end to end without touching any host state.

use std::io::Write;

use crate::dispatch::{CapabilityContext, CapabilityError, CapabilityHandler};
use crate::grammar::{API_METHOD_PARAM, Request, SOCKET_INPUT_PARAM, SOCKET_OUTPUT_PARAM};
use crate::result::{ResultPayload, RunMode};

/// Echoes the typed parameter set of the request.
#[derive(Debug, Default)]
pub struct EchoHandler;

impl CapabilityHandler for EchoHandler {
    fn handle(&self, ctx: &CapabilityContext, request: &Request) -> Result<(), CapabilityError> {
        let report = render(request);
        ctx.returner().return_result(
            request,
            RunMode::Background,
            ResultPayload::text(move |out| out.write_all(report.as_bytes())),
        );
        Ok(())
    }
}

/// Plumbing parameters present on every request; not worth echoing.
const PLUMBING: [&str; 3] = [API_METHOD_PARAM, SOCKET_OUTPUT_PARAM, SOCKET_INPUT_PARAM];

fn render(request: &Request) -> String {
    let mut lines = Vec::new();
    if let Some(action) = request.action() {
        lines.push(format!("action {action}"));
    }
    for (name, value) in request.string_params() {
        if PLUMBING.contains(&name.as_str()) {
            continue;
        }
        lines.push(format!("string {name}={value}"));
    }
    for (name, values) in request.string_array_params() {
        lines.push(format!("string[] {name}={}", values.join("|")));
    }
    for (name, value) in request.bool_params() {
        lines.push(format!("bool {name}={value}"));
    }
    for (name, value) in request.int_params() {
        lines.push(format!("int {name}={value}"));
    }
    for (name, value) in request.float_params() {
        lines.push(format!("float {name}={value}"));
    }
    for (name, values) in request.int_array_params() {
        lines.push(format!("int[] {name}={values:?}"));
    }
    for (name, values) in request.long_array_params() {
        lines.push(format!("long[] {name}={values:?}"));
    }
    lines.sort_unstable();
    let mut report = lines.join("\n");
    if !report.is_empty() {
        report.push('\n');
    }
    report
}
