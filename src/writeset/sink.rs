//! Destinations for drained write-set bytes
//!
//! Two destinations share one draining loop:
//! - [`BufferSink`]: append into a growable buffer, used to assemble a
//!   fragment before one provider call (multi-statement and XA paths).
//!   Cleanup discards everything written so far.
//! - [`ProviderSink`]: append straight into the provider's transaction
//!   context. Appends cannot be taken back, so cleanup does nothing.

use super::errors::{WriteSetError, WriteSetResult};
use crate::observability::{log_event_with_fields, Event};
use crate::provider::Provider;
use crate::trx::TrxId;

/// Destination for drained chunks
pub trait ChunkSink {
    /// Hand one chunk to the destination.
    fn write_chunk(&mut self, data: &[u8]) -> WriteSetResult<()>;

    /// Undo partial output after a failed drain, where possible.
    fn cleanup_after_error(&mut self) {}
}

/// Appends chunks to a caller-owned buffer
#[derive(Debug)]
pub struct BufferSink<'a> {
    buffer: &'a mut Vec<u8>,
}

impl<'a> BufferSink<'a> {
    pub fn new(buffer: &'a mut Vec<u8>) -> Self {
        Self { buffer }
    }
}

impl ChunkSink for BufferSink<'_> {
    fn write_chunk(&mut self, data: &[u8]) -> WriteSetResult<()> {
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    fn cleanup_after_error(&mut self) {
        self.buffer.clear();
    }
}

/// Appends chunks to the provider's write-set for one transaction
pub struct ProviderSink<'a, P: Provider + ?Sized> {
    provider: &'a P,
    trx: TrxId,
}

impl<'a, P: Provider + ?Sized> ProviderSink<'a, P> {
    pub fn new(provider: &'a P, trx: TrxId) -> Self {
        Self { provider, trx }
    }
}

impl<P: Provider + ?Sized> ChunkSink for ProviderSink<'_, P> {
    fn write_chunk(&mut self, data: &[u8]) -> WriteSetResult<()> {
        let status = self.provider.append_data(self.trx, data);
        if status.is_success() {
            return Ok(());
        }
        log_event_with_fields(
            Event::WritesetAppendFailed,
            &[
                ("length", &data.len().to_string()),
                ("status", &status.to_string()),
                ("trx", &self.trx.to_string()),
            ],
        );
        Err(WriteSetError::ProviderAppend { status })
    }
}
