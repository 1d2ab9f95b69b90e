//! Trusted-directory file access.
//!
//! `StorageRead` streams a file's bytes over the binary result mode;
//! `StorageOpen` opens the file read-only and passes the descriptor
//! itself, letting the caller inherit a live handle. Both refuse paths
//! outside the trusted directories, reusing the same allow-list that
//! vets result socket addresses.

use std::fs::File;
use std::io;
use std::os::fd::OwnedFd;

use camino::Utf8Path;

use crate::dispatch::{CapabilityContext, CapabilityError, CapabilityHandler};
use crate::grammar::Request;
use crate::result::{ResultPayload, RunMode};

fn open_requested_file(
    ctx: &CapabilityContext,
    request: &Request,
) -> Result<File, CapabilityError> {
    let path = request
        .string_param("path")
        .ok_or_else(|| CapabilityError::invalid_arguments("missing 'path' parameter"))?;
    let path = Utf8Path::new(path);
    ctx.trusted().permit(path)?;
    Ok(File::open(path)?)
}

/// Streams a trusted file's bytes as a binary result.
#[derive(Debug, Default)]
pub struct StorageReadHandler;

impl CapabilityHandler for StorageReadHandler {
    fn handle(&self, ctx: &CapabilityContext, request: &Request) -> Result<(), CapabilityError> {
        let mut file = open_requested_file(ctx, request)?;
        ctx.returner().return_result(
            request,
            RunMode::Background,
            ResultPayload::binary(move |out| io::copy(&mut file, out).map(|_| ())),
        );
        Ok(())
    }
}

/// Passes a read-only descriptor for a trusted file to the caller.
#[derive(Debug, Default)]
pub struct StorageOpenHandler;

impl CapabilityHandler for StorageOpenHandler {
    fn handle(&self, ctx: &CapabilityContext, request: &Request) -> Result<(), CapabilityError> {
        let file = open_requested_file(ctx, request)?;
        ctx.returner().return_result(
            request,
            RunMode::Background,
            ResultPayload::descriptor(move |channel| channel.send_descriptor(OwnedFd::from(file))),
        );
        Ok(())
    }
}
