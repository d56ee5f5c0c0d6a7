use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::EnumStringTrait;
use crate::opc_da::config::DEFAULT_ENUM_BATCH_SIZE;
use crate::opc_da::errors::{OpcResult, Status};
use crate::opc_da::events::{EventSink, OpcEvent};
use crate::opc_da::iid::IID_IENUM_STRING;
use crate::transport::RemoteRef;

/// Paged reader over a remote `IEnumString`.
///
/// Used for every open-ended name list: group names, browse results and
/// access paths. The caller owns the enumerator and ends it when done;
/// [`StringEnumerator::into_vec`] does both in one step.
pub struct StringEnumerator {
    remote: RemoteInterface,
    events: EventSink,
    batch_size: u32,
}

impl Default for StringEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl StringEnumerator {
    pub fn new() -> Self {
        Self::with_events(EventSink::detached())
    }

    pub(crate) fn with_events(events: EventSink) -> Self {
        Self {
            remote: RemoteInterface::new(IID_IENUM_STRING),
            events,
            batch_size: DEFAULT_ENUM_BATCH_SIZE,
        }
    }

    /// Wraps an `IEnumString` reference returned by another call.
    pub(crate) fn from_remote(remote: RemoteRef, events: EventSink) -> OpcResult<Self> {
        let mut enumerator = Self::with_events(events);
        enumerator.remote.adopt(remote)?;
        Ok(enumerator)
    }

    /// Number of names requested per call by [`StringEnumerator::as_vec`].
    /// Values below 1 are raised to 1.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    /// Fetches up to `count` names. Getting fewer than requested raises
    /// [`OpcEvent::EnumerationExhausted`].
    pub async fn next(&mut self, count: u32) -> OpcResult<Vec<String>> {
        let (names, status) = EnumStringTrait::next(self, count).await?;
        if status == Status::FALSE {
            self.events.emit(OpcEvent::EnumerationExhausted {
                requested: count,
                fetched: u32::try_from(names.len())?,
            });
        }
        Ok(names)
    }

    /// Rewinds, then reads every remaining name in batches until a batch
    /// comes back short.
    pub async fn as_vec(&mut self) -> OpcResult<Vec<String>> {
        self.reset().await?;

        let batch = self.batch_size;
        let mut names = Vec::new();
        loop {
            // a short batch is the normal end here, not worth an event
            let (chunk, _) = EnumStringTrait::next(self, batch).await?;
            let fetched = chunk.len();
            names.extend(chunk);
            if fetched < batch as usize {
                break;
            }
        }

        tracing::debug!(count = names.len(), "Enumeration drained");
        Ok(names)
    }

    /// Drains the enumerator and ends it, even when draining fails.
    pub async fn into_vec(mut self) -> OpcResult<Vec<String>> {
        let names = self.as_vec().await;
        let ended = self.end().await;
        let names = names?;
        ended?;
        Ok(names)
    }

    /// Releases the remote enumerator. Ending twice is a no-op.
    pub async fn end(&mut self) -> OpcResult<()> {
        self.remote.release().await
    }
}

impl EnumStringTrait for StringEnumerator {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}
