//! Typed representation of one parsed invocation.

use std::collections::HashMap;

/// String parameter carrying the capability name.
pub const API_METHOD_PARAM: &str = "api_method";
/// String parameter naming the socket the handler writes its result to.
pub const SOCKET_OUTPUT_PARAM: &str = "socket_output";
/// String parameter naming the socket the handler reads caller input from.
pub const SOCKET_INPUT_PARAM: &str = "socket_input";

/// Parsed, typed representation of one request.
///
/// Produced exclusively by [`crate::grammar::parse`]; the maps hold every
/// recognised token of the command line, keyed by parameter name. Key
/// insertion order is irrelevant.
#[derive(Debug, Default, Clone)]
pub struct Request {
    pub(crate) string_params: HashMap<String, String>,
    pub(crate) string_array_params: HashMap<String, Vec<String>>,
    pub(crate) bool_params: HashMap<String, bool>,
    pub(crate) int_params: HashMap<String, i32>,
    pub(crate) float_params: HashMap<String, f32>,
    pub(crate) int_array_params: HashMap<String, Vec<i32>>,
    pub(crate) long_array_params: HashMap<String, Vec<i64>>,
    pub(crate) action: Option<String>,
}

impl Request {
    /// Capability name from the fixed `api_method` parameter.
    ///
    /// A missing method is a dispatch-time condition, not a parse error.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.string_param(API_METHOD_PARAM)
    }

    /// Address of the caller's result-listening socket.
    #[must_use]
    pub fn output_address(&self) -> Option<&str> {
        self.string_param(SOCKET_OUTPUT_PARAM)
    }

    /// Address of the caller's input-providing socket.
    #[must_use]
    pub fn input_address(&self) -> Option<&str> {
        self.string_param(SOCKET_INPUT_PARAM)
    }

    /// Action override from the `-a` flag; the last occurrence wins.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    #[must_use]
    pub fn string_param(&self, name: &str) -> Option<&str> {
        self.string_params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn string_array_param(&self, name: &str) -> Option<&[String]> {
        self.string_array_params.get(name).map(Vec::as_slice)
    }

    /// Boolean parameter with a default for absent keys, mirroring how
    /// handlers read optional flags.
    #[must_use]
    pub fn bool_param(&self, name: &str, default: bool) -> bool {
        self.bool_params.get(name).copied().unwrap_or(default)
    }

    #[must_use]
    pub fn int_param(&self, name: &str) -> Option<i32> {
        self.int_params.get(name).copied()
    }

    #[must_use]
    pub fn float_param(&self, name: &str) -> Option<f32> {
        self.float_params.get(name).copied()
    }

    #[must_use]
    pub fn int_array_param(&self, name: &str) -> Option<&[i32]> {
        self.int_array_params.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn long_array_param(&self, name: &str) -> Option<&[i64]> {
        self.long_array_params.get(name).map(Vec::as_slice)
    }

    /// All string parameters, for diagnostic handlers.
    #[must_use]
    pub fn string_params(&self) -> &HashMap<String, String> {
        &self.string_params
    }

    /// All boolean parameters, for diagnostic handlers.
    #[must_use]
    pub fn bool_params(&self) -> &HashMap<String, bool> {
        &self.bool_params
    }

    /// All integer parameters, for diagnostic handlers.
    #[must_use]
    pub fn int_params(&self) -> &HashMap<String, i32> {
        &self.int_params
    }

    /// All float parameters, for diagnostic handlers.
    #[must_use]
    pub fn float_params(&self) -> &HashMap<String, f32> {
        &self.float_params
    }

    /// All string-array parameters, for diagnostic handlers.
    #[must_use]
    pub fn string_array_params(&self) -> &HashMap<String, Vec<String>> {
        &self.string_array_params
    }

    /// All integer-array parameters, for diagnostic handlers.
    #[must_use]
    pub fn int_array_params(&self) -> &HashMap<String, Vec<i32>> {
        &self.int_array_params
    }

    /// All long-array parameters, for diagnostic handlers.
    #[must_use]
    pub fn long_array_params(&self) -> &HashMap<String, Vec<i64>> {
        &self.long_array_params
    }
}
