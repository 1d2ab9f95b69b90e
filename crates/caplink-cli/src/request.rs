//! Request line serialization.
//!
//! Builds the command-line-shaped request string the daemon's grammar
//! parses back into a typed request: quoted string values with `\"`
//! escapes, comma-separated arrays with `\,` escapes, and bare value
//! tokens for the numeric and boolean kinds. Serializing then parsing
//! reproduces the original values.

use std::fmt::Write as _;

/// Builder for one request line.
#[derive(Debug)]
pub struct RequestLine {
    tokens: Vec<String>,
}

impl RequestLine {
    /// Starts a request for the given capability method.
    #[must_use]
    pub fn new(method: &str) -> Self {
        let mut line = Self { tokens: Vec::new() };
        line.string("api_method", method);
        line
    }

    /// Adds a string parameter.
    pub fn string(&mut self, name: &str, value: &str) {
        self.tokens.push(format!("--es {name} {}", quoted(value)));
    }

    /// Adds a string-array parameter.
    ///
    /// Commas inside elements are escaped so they survive the round trip;
    /// double quotes inside elements do not round-trip (the grammar keeps
    /// the escape backslash in array elements).
    pub fn string_array(&mut self, name: &str, values: &[String]) {
        let joined = values
            .iter()
            .map(|value| value.replace(',', "\\,"))
            .collect::<Vec<_>>()
            .join(",");
        self.tokens.push(format!("--esa {name} {}", quoted(&joined)));
    }

    /// Adds a boolean parameter.
    pub fn boolean(&mut self, name: &str, value: bool) {
        self.tokens.push(format!("--ez {name} {value}"));
    }

    /// Adds a 32-bit integer parameter.
    pub fn integer(&mut self, name: &str, value: i32) {
        self.tokens.push(format!("--ei {name} {value}"));
    }

    /// Adds a float parameter; the wire form always carries the
    /// fractional part the grammar requires.
    pub fn float(&mut self, name: &str, value: f32) {
        let mut text = String::new();
        let _ = write!(text, "{value}");
        if !text.contains('.') {
            text.clear();
            let _ = write!(text, "{value:.1}");
        }
        self.tokens.push(format!("--ef {name} {text}"));
    }

    /// Adds a 32-bit integer array parameter.
    pub fn int_array(&mut self, name: &str, values: &[i32]) {
        self.tokens
            .push(format!("--eia {name} {}", join_numbers(values)));
    }

    /// Adds a 64-bit integer array parameter.
    pub fn long_array(&mut self, name: &str, values: &[i64]) {
        self.tokens
            .push(format!("--ela {name} {}", join_numbers(values)));
    }

    /// Sets the action override.
    pub fn action(&mut self, name: &str) {
        self.tokens.push(format!("-a {name}"));
    }

    /// Names the socket the caller listens on for the result.
    pub fn output_socket(&mut self, address: &str) {
        self.string("socket_output", address);
    }

    /// Names the socket the caller serves handler input on.
    pub fn input_socket(&mut self, address: &str) {
        self.string("socket_input", address);
    }

    /// The finished request line.
    #[must_use]
    pub fn build(&self) -> String {
        self.tokens.join(" ")
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

fn join_numbers<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_method_as_api_method_parameter() {
        let line = RequestLine::new("SystemInfo").build();
        assert_eq!(line, r#"--es api_method "SystemInfo""#);
    }

    #[test]
    fn escapes_quotes_in_string_values() {
        let mut line = RequestLine::new("Echo");
        line.string("title", r#"say "hi""#);
        assert!(line.build().contains(r#"--es title "say \"hi\"""#));
    }

    #[test]
    fn escapes_commas_in_array_elements() {
        let mut line = RequestLine::new("Echo");
        line.string_array("list", &["a".to_string(), "b,c".to_string()]);
        assert!(line.build().contains(r#"--esa list "a,b\,c""#));
    }

    #[test]
    fn floats_always_carry_a_fraction() {
        let mut line = RequestLine::new("Echo");
        line.float("ratio", 1.0);
        line.float("half", 0.5);
        let built = line.build();
        assert!(built.contains("--ef ratio 1.0"));
        assert!(built.contains("--ef half 0.5"));
    }

    #[test]
    fn serializes_numeric_arrays() {
        let mut line = RequestLine::new("Echo");
        line.int_array("ids", &[1, -2, 3]);
        line.long_array("stamps", &[7, 8]);
        let built = line.build();
        assert!(built.contains("--eia ids 1,-2,3"));
        assert!(built.contains("--ela stamps 7,8"));
    }

    #[test]
    fn builds_complete_invocation_line() {
        let mut line = RequestLine::new("Clipboard");
        line.boolean("set", true);
        line.output_socket("/run/user/1000/caplink/out.sock");
        line.input_socket("/run/user/1000/caplink/in.sock");
        line.action("store");
        assert_eq!(
            line.build(),
            "--es api_method \"Clipboard\" --ez set true \
             --es socket_output \"/run/user/1000/caplink/out.sock\" \
             --es socket_input \"/run/user/1000/caplink/in.sock\" -a store"
        );
    }
}
