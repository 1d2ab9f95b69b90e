//! Command-line client for the caplink daemon.
//!
//! `caplink <method> [parameters...]` serializes a typed parameter set
//! into the daemon's request grammar, frames it over the listen endpoint,
//! and prints whatever the capability handler delivers: plain text,
//! structured output, raw bytes, or the contents of a passed file
//! descriptor. The client listens for the result on sockets it creates
//! itself under the daemon's trusted directory; the request ack and the
//! result arrive on separate connections.

mod errors;
mod request;
mod transport;

use std::fs::File;
use std::io::{self, Write};
use std::thread;

use clap::Parser;

use caplink_config::Config;

pub use errors::ClientError;
pub use request::RequestLine;
pub use transport::{
    CONNECTION_TIMEOUT, FD_SENTINEL, MAX_REQUEST_BYTES, ReceivedResult, ResultListener,
    await_ack, connect, read_result, send_request,
};

/// Invoke a capability of the caplink daemon.
#[derive(Debug, Parser)]
#[command(name = "caplink", version, about)]
pub struct Cli {
    /// Capability method name (e.g. SystemInfo).
    method: String,
    /// String parameter as NAME=VALUE; repeatable.
    #[arg(short = 'e', long = "es", value_name = "NAME=VALUE")]
    strings: Vec<String>,
    /// String array parameter as NAME=V1,V2,...; repeatable.
    #[arg(long = "esa", value_name = "NAME=V1,V2,...")]
    string_arrays: Vec<String>,
    /// Boolean parameter as NAME=true|false; repeatable.
    #[arg(long = "ez", value_name = "NAME=VALUE")]
    booleans: Vec<String>,
    /// Integer parameter as NAME=VALUE; repeatable.
    #[arg(long = "ei", value_name = "NAME=VALUE")]
    integers: Vec<String>,
    /// Float parameter as NAME=VALUE; repeatable.
    #[arg(long = "ef", value_name = "NAME=VALUE")]
    floats: Vec<String>,
    /// Integer array as NAME=V1,V2,...; repeatable.
    #[arg(long = "eia", value_name = "NAME=V1,V2,...")]
    int_arrays: Vec<String>,
    /// Long array as NAME=V1,V2,...; repeatable.
    #[arg(long = "ela", value_name = "NAME=V1,V2,...")]
    long_arrays: Vec<String>,
    /// Action override.
    #[arg(short = 'a', long)]
    action: Option<String>,
    /// Stream stdin to the handler over the input socket.
    #[arg(long)]
    stdin: bool,
}

/// Parses the process arguments and runs one invocation.
///
/// # Errors
///
/// Returns a [`ClientError`] describing what went wrong.
pub fn run() -> Result<(), ClientError> {
    let cli = Cli::parse();
    let config = Config::load().map_err(|source| ClientError::Config { source })?;
    let stdout = io::stdout();
    invoke(&cli, &config, &mut stdout.lock())
}

/// Runs one invocation against the configured daemon, writing the result
/// payload to `out`.
///
/// # Errors
///
/// Returns a [`ClientError`] describing what went wrong.
pub fn invoke(cli: &Cli, config: &Config, out: &mut dyn Write) -> Result<(), ClientError> {
    let mut line = build_request_line(cli)?;

    let trusted = config.trusted();
    let result_dir = trusted
        .primary()
        .ok_or(ClientError::NoResultDirectory)?
        .to_path_buf();
    let output = ResultListener::bind(&result_dir, "output")?;
    line.output_socket(output.address());
    let input = if cli.stdin {
        let listener = ResultListener::bind(&result_dir, "input")?;
        line.input_socket(listener.address());
        Some(listener)
    } else {
        None
    };

    let mut stream = connect(&config.listen)?;
    send_request(&mut stream, &line.build())?;
    await_ack(&mut stream)?;

    // The handler drains the input socket fully before producing output,
    // so stdin is served from its own thread.
    let feeder = input.map(|listener| {
        thread::spawn(move || -> io::Result<()> {
            let mut connection = listener.accept()?;
            let stdin = io::stdin();
            io::copy(&mut stdin.lock(), &mut connection)?;
            Ok(())
        })
    });

    let connection = output.accept()?;
    let result = read_result(&connection)?;
    write_received(&result, out)?;

    if let Some(handle) = feeder {
        match handle.join() {
            Ok(outcome) => outcome?,
            Err(_) => return Err(ClientError::Io(io::Error::other("stdin feeder panicked"))),
        }
    }
    Ok(())
}

/// Writes a received result: plain payload bytes, or the contents of a
/// passed descriptor when the `@` sentinel announced one.
fn write_received(result: &ReceivedResult, out: &mut dyn Write) -> io::Result<()> {
    if let Some(descriptor) = result.descriptor.as_ref() {
        let leading = result
            .data
            .strip_prefix(&[FD_SENTINEL])
            .unwrap_or(&result.data);
        out.write_all(leading)?;
        let mut file = File::from(descriptor.try_clone()?);
        io::copy(&mut file, out)?;
    } else {
        out.write_all(&result.data)?;
    }
    out.flush()
}

fn build_request_line(cli: &Cli) -> Result<RequestLine, ClientError> {
    let mut line = RequestLine::new(&cli.method);
    for pair in &cli.strings {
        let (name, value) = split_pair(pair, "--es")?;
        line.string(name, value);
    }
    for pair in &cli.string_arrays {
        let (name, value) = split_pair(pair, "--esa")?;
        let values: Vec<String> = value.split(',').map(str::to_string).collect();
        line.string_array(name, &values);
    }
    for pair in &cli.booleans {
        let (name, value) = split_pair(pair, "--ez")?;
        line.boolean(name, parse_value("--ez", value)?);
    }
    for pair in &cli.integers {
        let (name, value) = split_pair(pair, "--ei")?;
        line.integer(name, parse_value("--ei", value)?);
    }
    for pair in &cli.floats {
        let (name, value) = split_pair(pair, "--ef")?;
        line.float(name, parse_value("--ef", value)?);
    }
    for pair in &cli.int_arrays {
        let (name, value) = split_pair(pair, "--eia")?;
        line.int_array(name, &parse_list("--eia", value)?);
    }
    for pair in &cli.long_arrays {
        let (name, value) = split_pair(pair, "--ela")?;
        line.long_array(name, &parse_list("--ela", value)?);
    }
    if let Some(action) = &cli.action {
        line.action(action);
    }
    Ok(line)
}

fn split_pair<'a>(pair: &'a str, option: &'static str) -> Result<(&'a str, &'a str), ClientError> {
    pair.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| ClientError::InvalidParameter {
            option,
            value: pair.to_string(),
            message: "expected NAME=VALUE".to_string(),
        })
}

fn parse_value<T>(option: &'static str, value: &str) -> Result<T, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|error: T::Err| ClientError::InvalidParameter {
        option,
        value: value.to_string(),
        message: error.to_string(),
    })
}

fn parse_list<T>(option: &'static str, value: &str) -> Result<Vec<T>, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .split(',')
        .map(|element| parse_value(option, element))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse cli args")
    }

    #[test]
    fn builds_line_from_typed_options() {
        let cli = cli(&[
            "caplink",
            "Echo",
            "-e",
            "title=Hi",
            "--ez",
            "on=true",
            "--ei",
            "n=4",
            "--eia",
            "ids=1,2",
            "-a",
            "show",
        ]);
        let line = build_request_line(&cli).expect("build line").build();
        assert!(line.starts_with(r#"--es api_method "Echo""#));
        assert!(line.contains(r#"--es title "Hi""#));
        assert!(line.contains("--ez on true"));
        assert!(line.contains("--ei n 4"));
        assert!(line.contains("--eia ids 1,2"));
        assert!(line.ends_with("-a show"));
    }

    #[test]
    fn rejects_malformed_pairs() {
        let cli = cli(&["caplink", "Echo", "--ei", "count"]);
        let error = build_request_line(&cli).expect_err("missing equals");
        assert!(matches!(error, ClientError::InvalidParameter { .. }));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let cli = cli(&["caplink", "Echo", "--ei", "count=many"]);
        let error = build_request_line(&cli).expect_err("bad integer");
        assert!(matches!(
            error,
            ClientError::InvalidParameter { option: "--ei", .. }
        ));
    }
}
