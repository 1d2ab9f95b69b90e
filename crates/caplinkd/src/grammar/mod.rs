//! Argument grammar for request command lines.
//!
//! A request arrives as a single command-line-shaped string such as:
//!
//! ```text
//! --es api_method "Clipboard" -e title "Hi" --ez ongoing true -a get
//! ```
//!
//! Parsing turns that string into a typed [`Request`]. Recognised tokens are
//! extracted by an ordered table of scanner passes (strings first, then
//! booleans, integers, floats, arrays, the action flag, and finally the
//! unsupported-type catch-all); each pass removes its matches from the
//! residual text before the next pass runs, and anything left over after
//! every pass fails the request as a whole. The first malformed token aborts
//! the scan; a partially-extracted parameter set never escapes.

mod errors;
mod request;
mod scanner;

pub use errors::GrammarError;
pub use request::{
    API_METHOD_PARAM, Request, SOCKET_INPUT_PARAM, SOCKET_OUTPUT_PARAM,
};

/// Parses one request command line into a typed [`Request`].
///
/// # Errors
///
/// Returns a [`GrammarError`] describing the first offending token; the
/// error's display form is the single line reported back to the caller.
pub fn parse(cmdline: &str) -> Result<Request, GrammarError> {
    scanner::parse(cmdline)
}
