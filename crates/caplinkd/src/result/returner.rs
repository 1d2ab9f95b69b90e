//! Shared result delivery used by every capability handler.

use std::io::{self, BufWriter, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;

use tracing::{debug, error};

use caplink_config::TrustedDirectories;

use crate::grammar::Request;
use crate::notify::FailureNotifier;

use super::RESULT_TARGET;
use super::address;
use super::errors::ResultError;
use super::fd::{AncillaryTransport, FdChannel, ScmRightsTransport};
use super::json::JsonWriter;

/// Where result delivery runs relative to the invoking thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Spawn a dedicated thread for this delivery. The default for
    /// handlers invoked on the listener thread, which must never block on
    /// socket I/O.
    Background,
    /// Run synchronously. For handlers already executing on their own
    /// worker thread.
    CurrentThread,
}

/// One result payload, in one of the four delivery modes (or none).
pub enum ResultPayload {
    /// Connect and close without writing; tells the caller the request is
    /// done when there is no data to return.
    None,
    /// Plain text written through a buffered writer.
    Text(Box<dyn FnOnce(&mut dyn Write) -> io::Result<()> + Send>),
    /// Structured output through the streaming [`JsonWriter`]; a trailing
    /// newline is appended after the structure closes.
    Structured(Box<dyn FnOnce(&mut JsonWriter<'_>) -> Result<(), ResultError> + Send>),
    /// Raw bytes on the unbuffered stream.
    Binary(Box<dyn FnOnce(&mut dyn Write) -> io::Result<()> + Send>),
    /// Caller input drained from `socket_input` first, then text output.
    TextWithInput {
        /// Trim surrounding whitespace from the drained input.
        trim: bool,
        write: Box<dyn FnOnce(&str, &mut dyn Write) -> io::Result<()> + Send>,
    },
    /// At most one file descriptor passed as ancillary data.
    Descriptor(Box<dyn FnOnce(&mut FdChannel<'_>) -> Result<(), ResultError> + Send>),
}

impl ResultPayload {
    /// Plain-text payload.
    pub fn text<F>(write: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        Self::Text(Box::new(write))
    }

    /// Structured payload.
    pub fn structured<F>(write: F) -> Self
    where
        F: FnOnce(&mut JsonWriter<'_>) -> Result<(), ResultError> + Send + 'static,
    {
        Self::Structured(Box::new(write))
    }

    /// Raw binary payload.
    pub fn binary<F>(write: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        Self::Binary(Box::new(write))
    }

    /// Input-consuming text payload.
    pub fn with_input<F>(trim: bool, write: F) -> Self
    where
        F: FnOnce(&str, &mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        Self::TextWithInput {
            trim,
            write: Box::new(write),
        }
    }

    /// Descriptor-handoff payload.
    pub fn descriptor<F>(write: F) -> Self
    where
        F: FnOnce(&mut FdChannel<'_>) -> Result<(), ResultError> + Send + 'static,
    {
        Self::Descriptor(Box::new(write))
    }
}

/// Shared helper that opens result connections and runs payload writers.
pub struct ResultReturner {
    trusted: TrustedDirectories,
    notifier: Arc<dyn FailureNotifier>,
    transport: Arc<dyn AncillaryTransport>,
}

impl ResultReturner {
    /// Creates a returner with the production SCM_RIGHTS transport.
    pub fn new(trusted: TrustedDirectories, notifier: Arc<dyn FailureNotifier>) -> Self {
        Self::with_transport(trusted, notifier, Arc::new(ScmRightsTransport))
    }

    /// Creates a returner with an injected ancillary transport.
    pub fn with_transport(
        trusted: TrustedDirectories,
        notifier: Arc<dyn FailureNotifier>,
        transport: Arc<dyn AncillaryTransport>,
    ) -> Self {
        Self {
            trusted,
            notifier,
            transport,
        }
    }

    /// Delivers `payload` for `request`.
    ///
    /// Any failure along the way is logged and raised through the failure
    /// notifier; the output connection is always closed so the caller does
    /// not block waiting for data. Nothing propagates to the caller of
    /// this method.
    pub fn return_result(&self, request: &Request, mode: RunMode, payload: ResultPayload) {
        let delivery = Delivery {
            capability: request.method().unwrap_or("unknown").to_string(),
            output_address: request.output_address().map(str::to_string),
            input_address: request.input_address().map(str::to_string),
            trusted: self.trusted.clone(),
            transport: Arc::clone(&self.transport),
        };
        let notifier = Arc::clone(&self.notifier);
        let job = move || {
            if let Err(failure) = run_delivery(&delivery, payload) {
                error!(
                    target: RESULT_TARGET,
                    capability = delivery.capability.as_str(),
                    error = %failure,
                    "result delivery failed"
                );
                notifier.notify(&delivery.capability, &failure.to_string());
            }
        };
        match mode {
            RunMode::CurrentThread => job(),
            RunMode::Background => {
                let spawned = thread::Builder::new()
                    .name("caplink-result".to_string())
                    .spawn(job);
                if let Err(failure) = spawned {
                    error!(
                        target: RESULT_TARGET,
                        error = %failure,
                        "failed to spawn result delivery thread"
                    );
                }
            }
        }
    }

    /// Tells the caller the request is done without returning data.
    pub fn note_done(&self, request: &Request, mode: RunMode) {
        self.return_result(request, mode, ResultPayload::None);
    }

    /// Raises a best-effort failure notification.
    pub fn notify_failure(&self, capability: &str, summary: &str) {
        self.notifier.notify(capability, summary);
    }
}

struct Delivery {
    capability: String,
    output_address: Option<String>,
    input_address: Option<String>,
    trusted: TrustedDirectories,
    transport: Arc<dyn AncillaryTransport>,
}

fn run_delivery(delivery: &Delivery, payload: ResultPayload) -> Result<(), ResultError> {
    let output_address = delivery
        .output_address
        .as_deref()
        .ok_or(ResultError::MissingOutputAddress)?;
    debug!(
        target: RESULT_TARGET,
        address = output_address,
        "connecting to output socket"
    );
    let stream = address::connect_result_socket("output", output_address, &delivery.trusted)?;
    let outcome = write_payload(&stream, delivery, payload);
    // Closed on success and failure alike so the caller never blocks
    // waiting for data that will not come.
    let _ = stream.shutdown(Shutdown::Both);
    outcome
}

fn write_payload(
    stream: &UnixStream,
    delivery: &Delivery,
    payload: ResultPayload,
) -> Result<(), ResultError> {
    match payload {
        ResultPayload::None => Ok(()),
        ResultPayload::Text(write) => {
            let mut out = BufWriter::new(stream);
            write(&mut out)?;
            out.flush()?;
            Ok(())
        }
        ResultPayload::Structured(write) => {
            let mut out = BufWriter::new(stream);
            let mut json = JsonWriter::new(&mut out);
            write(&mut json)?;
            json.finish()?;
            out.write_all(b"\n")?;
            out.flush()?;
            Ok(())
        }
        ResultPayload::Binary(write) => {
            let mut raw = stream;
            write(&mut raw)?;
            Ok(())
        }
        ResultPayload::TextWithInput { trim, write } => {
            let input = drain_input(delivery, trim)?;
            let mut out = BufWriter::new(stream);
            write(&input, &mut out)?;
            out.flush()?;
            Ok(())
        }
        ResultPayload::Descriptor(write) => {
            let mut channel = FdChannel::new(stream, Arc::clone(&delivery.transport));
            write(&mut channel)?;
            Ok(())
        }
    }
}

/// Connects the inbound socket and drains it fully before the handler's
/// output runs.
fn drain_input(delivery: &Delivery, trim: bool) -> Result<String, ResultError> {
    let input_address = delivery
        .input_address
        .as_deref()
        .ok_or(ResultError::MissingInputAddress)?;
    debug!(
        target: RESULT_TARGET,
        address = input_address,
        "connecting to input socket"
    );
    let input = address::connect_result_socket("input", input_address, &delivery.trusted)?;
    let mut text = String::new();
    Read::read_to_string(&mut &input, &mut text)?;
    let _ = input.shutdown(Shutdown::Both);
    if trim {
        Ok(text.trim().to_string())
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixListener;
    use std::sync::Mutex;
    use std::thread::JoinHandle;

    use camino::Utf8PathBuf;

    use crate::grammar;

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier {
        summaries: Mutex<Vec<String>>,
    }

    impl FailureNotifier for RecordingNotifier {
        fn notify(&self, capability: &str, summary: &str) {
            self.summaries
                .lock()
                .expect("summaries lock")
                .push(format!("{capability}: {summary}"));
        }
    }

    struct Caller {
        dir: tempfile::TempDir,
        output: UnixListener,
    }

    impl Caller {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("temp dir");
            let output = UnixListener::bind(dir.path().join("out.sock")).expect("bind output");
            Self { dir, output }
        }

        fn trusted(&self) -> TrustedDirectories {
            let root =
                Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf()).expect("utf8 dir");
            TrustedDirectories::single(root)
        }

        fn request(&self) -> grammar::Request {
            let output = self.dir.path().join("out.sock");
            grammar::parse(&format!(
                "--es api_method \"Test\" --es socket_output \"{}\"",
                output.display()
            ))
            .expect("test request")
        }

        fn read_result(&self) -> Vec<u8> {
            let (mut connection, _) = self.output.accept().expect("accept result connection");
            let mut data = Vec::new();
            connection.read_to_end(&mut data).expect("read result");
            data
        }
    }

    fn returner_for(caller: &Caller, notifier: Arc<dyn FailureNotifier>) -> ResultReturner {
        ResultReturner::new(caller.trusted(), notifier)
    }

    fn deliver_in_background(
        returner: ResultReturner,
        request: grammar::Request,
        payload: ResultPayload,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            returner.return_result(&request, RunMode::CurrentThread, payload);
        })
    }

    #[test]
    fn note_done_opens_and_closes_the_output_connection() {
        let caller = Caller::new();
        let returner = returner_for(&caller, Arc::new(RecordingNotifier::default()));
        let request = caller.request();

        let worker = deliver_in_background(returner, request, ResultPayload::None);
        assert!(caller.read_result().is_empty());
        worker.join().expect("worker join");
    }

    #[test]
    fn delivers_text_payload() {
        let caller = Caller::new();
        let returner = returner_for(&caller, Arc::new(RecordingNotifier::default()));
        let request = caller.request();

        let worker = deliver_in_background(
            returner,
            request,
            ResultPayload::text(|out| writeln!(out, "hello caller")),
        );
        assert_eq!(caller.read_result(), b"hello caller\n");
        worker.join().expect("worker join");
    }

    #[test]
    fn structured_payload_ends_with_newline_after_closing_bracket() {
        let caller = Caller::new();
        let returner = returner_for(&caller, Arc::new(RecordingNotifier::default()));
        let request = caller.request();

        let worker = deliver_in_background(
            returner,
            request,
            ResultPayload::structured(|json| {
                json.begin_object()?;
                json.name("status")?;
                json.value_string("ok")?;
                json.end_object()
            }),
        );
        let text = String::from_utf8(caller.read_result()).expect("utf8 result");
        assert!(text.ends_with("}\n"), "unexpected tail: {text:?}");
        let parsed: serde_json::Value =
            serde_json::from_str(&text).expect("structured result parses");
        assert_eq!(parsed["status"], "ok");
        worker.join().expect("worker join");
    }

    #[test]
    fn delivers_binary_payload_verbatim() {
        let caller = Caller::new();
        let returner = returner_for(&caller, Arc::new(RecordingNotifier::default()));
        let request = caller.request();

        let payload = ResultPayload::binary(|out| out.write_all(&[0x00, 0xFF, 0x7F, 0x0A]));
        let worker = deliver_in_background(returner, request, payload);
        assert_eq!(caller.read_result(), vec![0x00, 0xFF, 0x7F, 0x0A]);
        worker.join().expect("worker join");
    }

    #[test]
    fn drains_caller_input_before_writing_output() {
        let caller = Caller::new();
        let input_path = caller.dir.path().join("in.sock");
        let input_listener = UnixListener::bind(&input_path).expect("bind input");
        let request = grammar::parse(&format!(
            "--es api_method \"Test\" --es socket_output \"{}\" --es socket_input \"{}\"",
            caller.dir.path().join("out.sock").display(),
            input_path.display()
        ))
        .expect("test request");
        let returner = returner_for(&caller, Arc::new(RecordingNotifier::default()));

        let worker = deliver_in_background(
            returner,
            request,
            ResultPayload::with_input(true, |input, out| {
                writeln!(out, "received: {input}")
            }),
        );

        let (mut input_connection, _) = input_listener.accept().expect("accept input");
        input_connection
            .write_all(b"  caller text  ")
            .expect("write input");
        input_connection
            .shutdown(Shutdown::Write)
            .expect("close input for writing");

        assert_eq!(caller.read_result(), b"received: caller text\n");
        worker.join().expect("worker join");
    }

    #[test]
    fn missing_output_address_is_notified() {
        let caller = Caller::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let returner = returner_for(&caller, notifier.clone());
        let request = grammar::parse("--es api_method \"Test\"").expect("request");

        returner.return_result(
            &request,
            RunMode::CurrentThread,
            ResultPayload::text(|out| writeln!(out, "never sent")),
        );

        let summaries = notifier.summaries.lock().expect("summaries lock");
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].contains("socket_output"));
    }

    #[test]
    fn untrusted_output_address_is_refused_and_notified() {
        let caller = Caller::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let returner = returner_for(&caller, notifier.clone());
        let request = grammar::parse(
            "--es api_method \"Test\" --es socket_output \"/etc/caplink/out.sock\"",
        )
        .expect("request");

        returner.return_result(
            &request,
            RunMode::CurrentThread,
            ResultPayload::text(|out| writeln!(out, "never sent")),
        );

        let summaries = notifier.summaries.lock().expect("summaries lock");
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].contains("refused"));
    }

    #[test]
    fn handler_error_mid_write_still_closes_the_connection() {
        let caller = Caller::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let returner = ResultReturner::new(caller.trusted(), notifier.clone());
        let request = caller.request();

        let worker = deliver_in_background(
            returner,
            request,
            ResultPayload::text(|out| {
                out.write_all(b"partial")?;
                Err(io::Error::other("handler exploded"))
            }),
        );

        // The caller still observes EOF rather than hanging.
        let data = caller.read_result();
        assert!(data.is_empty() || data == b"partial");
        worker.join().expect("worker join");

        let summaries = notifier.summaries.lock().expect("summaries lock");
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].contains("handler exploded"));
    }
}
