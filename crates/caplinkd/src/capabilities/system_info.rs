//! Host information reporter.

use crate::dispatch::{CapabilityContext, CapabilityError, CapabilityHandler};
use crate::grammar::Request;
use crate::result::{ResultPayload, RunMode};

/// Reports hostname, platform, and daemon details as a structured result.
#[derive(Debug, Default)]
pub struct SystemInfoHandler;

impl CapabilityHandler for SystemInfoHandler {
    fn handle(&self, ctx: &CapabilityContext, request: &Request) -> Result<(), CapabilityError> {
        let hostname = nix::unistd::gethostname()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        let pid = i64::from(std::process::id());

        ctx.returner().return_result(
            request,
            RunMode::Background,
            ResultPayload::structured(move |json| {
                json.begin_object()?;
                json.name("hostname")?;
                json.value_string(&hostname)?;
                json.name("os")?;
                json.value_string(std::env::consts::OS)?;
                json.name("arch")?;
                json.value_string(std::env::consts::ARCH)?;
                json.name("daemon_version")?;
                json.value_string(env!("CARGO_PKG_VERSION"))?;
                json.name("pid")?;
                json.value_i64(pid)?;
                json.end_object()
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixListener;
    use std::sync::Arc;

    use camino::Utf8PathBuf;

    use caplink_config::TrustedDirectories;

    use crate::grammar;
    use crate::notify::LogNotifier;
    use crate::result::ResultReturner;

    use super::*;

    #[test]
    fn reports_structured_host_details() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output_path = dir.path().join("out.sock");
        let listener = UnixListener::bind(&output_path).expect("bind output");
        let trusted = TrustedDirectories::single(
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 dir"),
        );
        let ctx = CapabilityContext::new(
            Arc::new(ResultReturner::new(trusted.clone(), Arc::new(LogNotifier))),
            trusted,
        );
        let request = grammar::parse(&format!(
            "--es api_method \"SystemInfo\" --es socket_output \"{}\"",
            output_path.display()
        ))
        .expect("request");

        SystemInfoHandler.handle(&ctx, &request).expect("handle");

        let (mut connection, _) = listener.accept().expect("accept result");
        let mut text = String::new();
        connection.read_to_string(&mut text).expect("read result");
        assert!(text.ends_with("}\n"), "unexpected tail: {text:?}");
        let parsed: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(parsed["os"], std::env::consts::OS);
        assert_eq!(parsed["daemon_version"], env!("CARGO_PKG_VERSION"));
        assert!(parsed["pid"].as_i64().expect("pid") > 0);
    }
}
