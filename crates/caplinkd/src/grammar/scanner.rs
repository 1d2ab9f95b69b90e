//! Ordered extraction passes over the request command line.
//!
//! Each pass scans the residual text left by its predecessors, extracts
//! every match of its own token shape, and removes the matched ranges
//! before the next pass runs. Pass order is load-bearing: quoted string
//! values are consumed first so that flag-shaped text inside them can
//! never be re-matched by a later pass.

use super::errors::GrammarError;
use super::request::Request;

pub(super) fn parse(cmdline: &str) -> Result<Request, GrammarError> {
    let mut request = Request::default();
    let residual = extract_strings(cmdline, &mut request);
    let residual = extract_booleans(&residual, &mut request)?;
    let residual = extract_integers(&residual, &mut request)?;
    let residual = extract_floats(&residual, &mut request)?;
    let residual = extract_int_arrays(&residual, &mut request)?;
    let residual = extract_long_arrays(&residual, &mut request)?;
    let residual = extract_actions(&residual, &mut request);
    reject_unsupported_types(&residual)?;
    reject_leftovers(&residual)?;
    Ok(request)
}

/// Byte range of a matched token within the current residual.
struct Span {
    start: usize,
    end: usize,
}

// ---------------------------------------------------------------------------
// Pass 1: -e / --es / --esa quoted strings
// ---------------------------------------------------------------------------

enum StringKind {
    Single,
    Array,
}

struct StringToken {
    end: usize,
    kind: StringKind,
    name: String,
    value: String,
}

fn extract_strings(input: &str, request: &mut Request) -> String {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < input.len() {
        if let Some(token) = match_string_token(input, i) {
            spans.push(Span {
                start: i,
                end: token.end,
            });
            i = token.end;
            match token.kind {
                StringKind::Single => {
                    request
                        .string_params
                        .insert(token.name, token.value.replace("\\\"", "\""));
                }
                StringKind::Array => {
                    request
                        .string_array_params
                        .insert(token.name, split_escaped_list(&token.value));
                }
            }
        } else {
            i += char_width(input, i);
        }
    }
    remove_spans(input, &spans)
}

fn match_string_token(input: &str, at: usize) -> Option<StringToken> {
    ["-e", "--es", "--esa"]
        .into_iter()
        .find_map(|flag| match_string_flag(input, at, flag))
}

fn match_string_flag(input: &str, at: usize, flag: &str) -> Option<StringToken> {
    if !input[at..].starts_with(flag) {
        return None;
    }
    let bytes = input.as_bytes();
    let name_start = skip_spaces(bytes, at + flag.len())?;
    let name_end = take_nonspace(bytes, name_start)?;
    let quote = skip_spaces(bytes, name_end)?;
    if bytes.get(quote) != Some(&b'"') {
        return None;
    }
    let close = close_quote(bytes, quote + 1)?;
    Some(StringToken {
        end: close + 1,
        kind: if flag == "--esa" {
            StringKind::Array
        } else {
            StringKind::Single
        },
        name: input[name_start..name_end].to_string(),
        value: input[quote + 1..close].to_string(),
    })
}

/// Index of the first `"` not immediately preceded by a backslash.
fn close_quote(bytes: &[u8], from: usize) -> Option<usize> {
    (from..bytes.len()).find(|&i| bytes[i] == b'"' && bytes[i - 1] != b'\\')
}

/// Splits an `--esa` value on unescaped commas and unescapes each element
/// once (the first `\,` of a fragment becomes a literal comma).
fn split_escaped_list(value: &str) -> Vec<String> {
    let bytes = value.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 0..bytes.len() {
        if bytes[i] == b',' && (i == 0 || bytes[i - 1] != b'\\') {
            parts.push(value[start..i].replacen("\\,", ",", 1));
            start = i + 1;
        }
    }
    parts.push(value[start..].replacen("\\,", ",", 1));
    parts
}

// ---------------------------------------------------------------------------
// Passes 2-6: flag + name + constrained value
// ---------------------------------------------------------------------------

struct SimpleToken {
    end: usize,
    name: String,
    value: String,
}

type ValueRule = fn(&[u8], usize) -> Option<usize>;

fn match_simple_token(
    input: &str,
    at: usize,
    flag: &str,
    value_rule: ValueRule,
) -> Option<SimpleToken> {
    if !input[at..].starts_with(flag) {
        return None;
    }
    let bytes = input.as_bytes();
    let name_start = skip_spaces(bytes, at + flag.len())?;
    let name_end = take_nonspace(bytes, name_start)?;
    let value_start = skip_spaces(bytes, name_end)?;
    let value_end = value_rule(bytes, value_start)?;
    Some(SimpleToken {
        end: value_end,
        name: input[name_start..name_end].to_string(),
        value: input[value_start..value_end].to_string(),
    })
}

/// Shared driver for the fallible single-value passes.
fn extract_simple<F>(
    input: &str,
    flag: &str,
    value_rule: ValueRule,
    mut apply: F,
) -> Result<String, GrammarError>
where
    F: FnMut(SimpleToken, &str) -> Result<(), GrammarError>,
{
    let mut spans = Vec::new();
    let mut i = 0;
    while i < input.len() {
        if let Some(token) = match_simple_token(input, i, flag, value_rule) {
            let matched = &input[i..token.end];
            spans.push(Span {
                start: i,
                end: token.end,
            });
            i = token.end;
            apply(token, matched)?;
        } else {
            i += char_width(input, i);
        }
    }
    Ok(remove_spans(input, &spans))
}

fn extract_booleans(input: &str, request: &mut Request) -> Result<String, GrammarError> {
    extract_simple(input, "--ez", take_nonspace, |token, matched| {
        let value = coerce_boolean(&token.value)
            .ok_or_else(|| GrammarError::invalid_boolean(matched))?;
        request.bool_params.insert(token.name, value);
        Ok(())
    })
}

fn extract_integers(input: &str, request: &mut Request) -> Result<String, GrammarError> {
    extract_simple(input, "--ei", take_signed_digits, |token, matched| {
        let value = token
            .value
            .parse::<i32>()
            .map_err(|_| GrammarError::invalid_integer(matched))?;
        request.int_params.insert(token.name, value);
        Ok(())
    })
}

fn extract_floats(input: &str, request: &mut Request) -> Result<String, GrammarError> {
    extract_simple(input, "--ef", take_float, |token, matched| {
        let value = token
            .value
            .parse::<f32>()
            .map_err(|_| GrammarError::invalid_float(matched))?;
        request.float_params.insert(token.name, value);
        Ok(())
    })
}

fn extract_int_arrays(input: &str, request: &mut Request) -> Result<String, GrammarError> {
    extract_simple(input, "--eia", take_number_list, |token, matched| {
        let values = token
            .value
            .split(',')
            .map(str::parse::<i32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| GrammarError::invalid_int_array(matched))?;
        request.int_array_params.insert(token.name, values);
        Ok(())
    })
}

fn extract_long_arrays(input: &str, request: &mut Request) -> Result<String, GrammarError> {
    extract_simple(input, "--ela", take_number_list, |token, matched| {
        let values = token
            .value
            .split(',')
            .map(str::parse::<i64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| GrammarError::invalid_long_array(matched))?;
        request.long_array_params.insert(token.name, values);
        Ok(())
    })
}

/// Boolean coercion: literal `true`/`t`/`false`/`f`, else an integer
/// (decimal or `0x`-prefixed) where non-zero means true.
fn coerce_boolean(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" => Some(true),
        "false" | "f" => Some(false),
        other => decode_integer(other).map(|value| value != 0),
    }
}

fn decode_integer(raw: &str) -> Option<i64> {
    let (negative, rest) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let magnitude = match rest.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => {
            if !rest.as_bytes().first().is_some_and(u8::is_ascii_digit) {
                return None;
            }
            rest.parse::<i64>().ok()?
        }
    };
    Some(if negative { -magnitude } else { magnitude })
}

// ---------------------------------------------------------------------------
// Pass 7: -a action override
// ---------------------------------------------------------------------------

fn extract_actions(input: &str, request: &mut Request) -> String {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < input.len() {
        if let Some((end, name)) = match_action(input, i) {
            spans.push(Span { start: i, end });
            i = end;
            // Matches are found left to right; the last one wins.
            request.action = Some(name);
        } else {
            i += char_width(input, i);
        }
    }
    remove_spans(input, &spans)
}

fn match_action(input: &str, at: usize) -> Option<(usize, String)> {
    if !input[at..].starts_with("-a") {
        return None;
    }
    let bytes = input.as_bytes();
    let name_start = skip_optional_spaces(bytes, at + 2);
    let name_end = take_nonspace(bytes, name_start)?;
    Some((name_end, input[name_start..name_end].to_string()))
}

// ---------------------------------------------------------------------------
// Passes 8-9: catch-alls
// ---------------------------------------------------------------------------

fn reject_unsupported_types(input: &str) -> Result<(), GrammarError> {
    let mut i = 0;
    while i < input.len() {
        if let Some(end) = match_unsupported(input, i) {
            return Err(GrammarError::unsupported_type(&input[i..end]));
        }
        i += char_width(input, i);
    }
    Ok(())
}

fn match_unsupported(input: &str, at: usize) -> Option<usize> {
    if !input[at..].starts_with("--e") {
        return None;
    }
    let type_char = input[at + 3..].chars().next()?;
    if matches!(type_char, 'i' | 'z' | 's' | ' ') {
        return None;
    }
    let bytes = input.as_bytes();
    let first = skip_spaces(bytes, at + 3 + type_char.len_utf8())?;
    let first_end = take_nonspace(bytes, first)?;
    let second = skip_spaces(bytes, first_end)?;
    take_nonspace(bytes, second)
}

fn reject_leftovers(input: &str) -> Result<(), GrammarError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !is_grammar_whitespace(*c))
        .collect();
    if cleaned.is_empty() {
        Ok(())
    } else {
        Err(GrammarError::unsupported_options(cleaned))
    }
}

const fn is_grammar_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\u{B}' | '\u{C}' | '\r')
}

// ---------------------------------------------------------------------------
// Low-level scanning helpers
// ---------------------------------------------------------------------------

/// Requires at least one space at `from`; returns the index after the run.
fn skip_spaces(bytes: &[u8], from: usize) -> Option<usize> {
    let end = skip_optional_spaces(bytes, from);
    (end > from).then_some(end)
}

fn skip_optional_spaces(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while bytes.get(i) == Some(&b' ') {
        i += 1;
    }
    i
}

/// Requires at least one non-space byte at `from`; returns the run's end.
fn take_nonspace(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() && bytes[i] != b' ' {
        i += 1;
    }
    (i > from).then_some(i)
}

fn take_digits(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    (i > from).then_some(i)
}

fn take_signed_digits(bytes: &[u8], from: usize) -> Option<usize> {
    let digits = if bytes.get(from) == Some(&b'-') {
        from + 1
    } else {
        from
    };
    take_digits(bytes, digits)
}

/// Decimal with a mandatory fractional part.
fn take_float(bytes: &[u8], from: usize) -> Option<usize> {
    let integral_end = take_signed_digits(bytes, from)?;
    if bytes.get(integral_end) != Some(&b'.') {
        return None;
    }
    take_digits(bytes, integral_end + 1)
}

/// Comma-separated signed decimals; stops before a trailing comma that is
/// not followed by another number.
fn take_number_list(bytes: &[u8], from: usize) -> Option<usize> {
    let mut end = take_signed_digits(bytes, from)?;
    while bytes.get(end) == Some(&b',') {
        match take_signed_digits(bytes, end + 1) {
            Some(next) => end = next,
            None => break,
        }
    }
    Some(end)
}

fn char_width(input: &str, at: usize) -> usize {
    input[at..].chars().next().map_or(1, char::len_utf8)
}

fn remove_spans(input: &str, spans: &[Span]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&input[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&input[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_empty_command_line() {
        let request = parse("").expect("empty input is a valid empty request");
        assert!(request.method().is_none());
        assert!(request.action().is_none());
    }

    #[test]
    fn parses_mixed_tokens_in_arbitrary_order() {
        let request = parse(
            "--ez ongoing true -e title \"Hi\" --ei count 3 --ef ratio 0.5 \
             --eia ids 1,2,3 --ela stamps 4,5 -a show --es api_method \"Demo\"",
        )
        .expect("parse");
        assert_eq!(request.method(), Some("Demo"));
        assert_eq!(request.string_param("title"), Some("Hi"));
        assert_eq!(request.bool_param("ongoing", false), true);
        assert_eq!(request.int_param("count"), Some(3));
        assert_eq!(request.float_param("ratio"), Some(0.5));
        assert_eq!(request.int_array_param("ids"), Some(&[1, 2, 3][..]));
        assert_eq!(request.long_array_param("stamps"), Some(&[4, 5][..]));
        assert_eq!(request.action(), Some("show"));
    }

    #[test]
    fn unescapes_quotes_in_string_values() {
        let request = parse(r#"-e msg "say \"hi\"""#).expect("parse");
        assert_eq!(request.string_param("msg"), Some(r#"say "hi""#));
    }

    #[test]
    fn string_values_may_span_lines() {
        let request = parse("-e body \"line one\nline two\"").expect("parse");
        assert_eq!(request.string_param("body"), Some("line one\nline two"));
    }

    #[test]
    fn flag_shaped_text_inside_a_string_is_not_rematched() {
        let request = parse(r#"-e cmd "--ez inner true --ei n 7""#).expect("parse");
        assert_eq!(
            request.string_param("cmd"),
            Some("--ez inner true --ei n 7")
        );
        assert!(request.bool_params().is_empty());
        assert!(request.int_params().is_empty());
    }

    #[test]
    fn splits_string_array_on_unescaped_commas() {
        let request = parse(r#"--esa list "a,b\,c""#).expect("parse");
        assert_eq!(
            request.string_array_param("list"),
            Some(&["a".to_string(), "b,c".to_string()][..])
        );
    }

    #[test]
    fn keeps_empty_string_array_elements() {
        let request = parse(r#"--esa list "a,,""#).expect("parse");
        assert_eq!(
            request.string_array_param("list"),
            Some(&["a".to_string(), String::new(), String::new()][..])
        );
    }

    #[rstest]
    #[case("true", true)]
    #[case("t", true)]
    #[case("TRUE", true)]
    #[case("false", false)]
    #[case("f", false)]
    #[case("0x5", true)]
    #[case("0", false)]
    #[case("-1", true)]
    fn coerces_boolean_values(#[case] raw: &str, #[case] expected: bool) {
        let request = parse(&format!("--ez flag {raw}")).expect("parse");
        assert_eq!(request.bool_param("flag", !expected), expected);
    }

    #[test]
    fn rejects_unparseable_boolean() {
        let error = parse("--ez flag maybe").expect_err("fatal boolean");
        assert_eq!(
            error,
            GrammarError::InvalidBoolean {
                token: "--ez flag maybe".to_string()
            }
        );
    }

    #[test]
    fn rejects_integer_overflow() {
        let error = parse("--ei n 99999999999").expect_err("fatal integer");
        assert!(matches!(error, GrammarError::InvalidInteger { .. }));
    }

    #[test]
    fn parses_negative_integers() {
        let request = parse("--ei n -42").expect("parse");
        assert_eq!(request.int_param("n"), Some(-42));
    }

    #[test]
    fn integer_with_trailing_garbage_fails_the_residual_check() {
        // The digits are consumed as the value; "ab" survives to the final
        // leftover check rather than producing an integer error.
        let error = parse("--ei n 12ab").expect_err("leftovers");
        assert_eq!(
            error,
            GrammarError::UnsupportedOptions {
                residual: "ab".to_string()
            }
        );
    }

    #[test]
    fn float_without_fraction_is_an_unsupported_type() {
        let error = parse("--ef ratio 1").expect_err("fatal type");
        assert_eq!(
            error,
            GrammarError::UnsupportedType {
                token: "--ef ratio 1".to_string()
            }
        );
    }

    #[test]
    fn rejects_long_array_overflow() {
        let error = parse("--ela stamps 1,99999999999999999999").expect_err("fatal long array");
        assert!(matches!(error, GrammarError::InvalidLongArray { .. }));
    }

    #[test]
    fn last_action_wins() {
        let request = parse("-a foo -a bar").expect("parse");
        assert_eq!(request.action(), Some("bar"));
    }

    #[test]
    fn action_accepts_missing_separator() {
        let request = parse("-ashow").expect("parse");
        assert_eq!(request.action(), Some("show"));
    }

    #[test]
    fn unknown_type_letter_is_fatal() {
        let error = parse("--ex name value").expect_err("fatal type");
        assert_eq!(
            error,
            GrammarError::UnsupportedType {
                token: "--ex name value".to_string()
            }
        );
    }

    #[test]
    fn leftover_text_is_fatal_with_whitespace_stripped() {
        let error = parse("-e k \"v\"  bogus  trailing").expect_err("leftovers");
        assert_eq!(
            error,
            GrammarError::UnsupportedOptions {
                residual: "bogustrailing".to_string()
            }
        );
    }

    #[test]
    fn whitespace_only_residual_is_accepted() {
        let request = parse("   -e k \"v\"   ").expect("parse");
        assert_eq!(request.string_param("k"), Some("v"));
    }

    #[test]
    fn round_trips_extracted_values() {
        let line = r#"--es api_method "X" -e title "a \"quoted\" word" --esa parts "x,y\,z" --ez on t --ei n -7"#;
        let request = parse(line).expect("parse");
        assert_eq!(request.method(), Some("X"));
        assert_eq!(request.string_param("title"), Some(r#"a "quoted" word"#));
        assert_eq!(
            request.string_array_param("parts"),
            Some(&["x".to_string(), "y,z".to_string()][..])
        );
        assert_eq!(request.bool_param("on", false), true);
        assert_eq!(request.int_param("n"), Some(-7));
    }

    #[test]
    fn socket_address_accessors_read_fixed_parameters() {
        let request = parse(
            r#"--es socket_output "/run/user/0/caplink/out" --es socket_input "caplink-in""#,
        )
        .expect("parse");
        assert_eq!(
            request.output_address(),
            Some("/run/user/0/caplink/out")
        );
        assert_eq!(request.input_address(), Some("caplink-in"));
    }

    #[test]
    fn decode_integer_handles_hex_and_sign() {
        assert_eq!(decode_integer("0x10"), Some(16));
        assert_eq!(decode_integer("-3"), Some(-3));
        assert_eq!(decode_integer("+4"), Some(4));
        assert_eq!(decode_integer("0xzz"), None);
        assert_eq!(decode_integer("maybe"), None);
    }
}
