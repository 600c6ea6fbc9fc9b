//! # HTTP Request/Response Registry
//!
//! A fixed pool of request slots paired one-to-one with response slots,
//! addressed by small integer handles. The controller builds a request a
//! field at a time, fires it, then polls and reads the paired response as
//! network events arrive.
//!
//! The registry owns every buffer in both pools. The network-operations
//! provider never holds a reference into them: it reports lifecycle progress
//! through [`HttpEvent`]s which the single cooperative task applies via
//! [`HttpRegistry::on_event`].

use heapless::Vec;

/// Ceiling for each outbound request field (URL, parameters, body, headers).
pub const TX_CONTENT_MAX: usize = 256;

/// Ceiling for the buffered response body and response header block.
pub const RX_CONTENT_MAX: usize = 512;

/// Stored request headers may double in size when bare line feeds are
/// rewritten to `\r\n`.
const TX_HEADERS_MAX: usize = TX_CONTENT_MAX * 2;

/// Lifecycle state of a response slot.
///
/// Transitions are monotonic: `Nonexistent` → `InProgress` → `Success` or
/// `Failed`. Once terminal, no further event changes the state; only a purge
/// returns the slot to `Nonexistent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// No request has produced a response here.
    Nonexistent,
    /// The network operation is underway.
    InProgress,
    /// The operation closed with a 2xx status.
    Success,
    /// The operation closed with any other status.
    Failed,
}

impl Progress {
    /// Single-character wire code for this state.
    pub fn code(self) -> u8 {
        match self {
            Progress::Nonexistent => b'N',
            Progress::InProgress => b'P',
            Progress::Success => b'S',
            Progress::Failed => b'U',
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Progress::Success | Progress::Failed)
    }
}

/// The optional request fields a controller can populate after `ihr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestField {
    /// Request parameters, usually appended to the URL.
    Parameter,
    /// Request body for POST-style methods.
    Content,
    /// Request header block, replayed verbatim onto the wire.
    Header,
}

/// Network lifecycle events for one handle, delivered in order:
/// `Connected`, zero or more `Chunk`s, `HeadersComplete`, `Closed`.
#[derive(Debug)]
pub enum HttpEvent<'a> {
    /// Connection established; `status` is the connect result (0 on success).
    Connected { status: i32 },
    /// A piece of the response body arrived.
    Chunk { data: &'a [u8] },
    /// The response header section is complete; `status` is the final HTTP
    /// status code.
    HeadersComplete { status: i32, headers: &'a [u8] },
    /// The connection is fully closed; the response is final.
    Closed,
}

/// Why a registry operation was refused. All variants surface to the
/// controller as a one-line rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotError {
    /// The handle is out of range or its slot is free.
    UnknownHandle,
    /// The value does not fit the slot's fixed capacity.
    Oversize,
}

/// One outbound request under construction.
///
/// The slot is in use iff `method != 0`; a free slot holds no data.
pub struct RequestSlot {
    method: u8,
    url: Vec<u8, TX_CONTENT_MAX>,
    params: Vec<u8, TX_CONTENT_MAX>,
    content: Vec<u8, TX_CONTENT_MAX>,
    headers: Vec<u8, TX_HEADERS_MAX>,
}

impl RequestSlot {
    const fn new() -> Self {
        Self {
            method: 0,
            url: Vec::new(),
            params: Vec::new(),
            content: Vec::new(),
            headers: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.method = 0;
        self.url.clear();
        self.params.clear();
        self.content.clear();
        self.headers.clear();
    }

    fn in_use(&self) -> bool {
        self.method != 0
    }
}

/// Borrowed view of a populated request, handed to the network provider for
/// the duration of one `begin` call.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    /// Single-character method code (`G` for GET, `P` for POST, ...).
    pub method: u8,
    /// Full request URL.
    pub url: &'a [u8],
    /// Request parameters; empty when unset.
    pub params: &'a [u8],
    /// Request body; empty when unset.
    pub content: &'a [u8],
    /// Canonicalized header block; empty when unset.
    pub headers: &'a [u8],
}

/// The response side of one handle.
pub struct ResponseSlot {
    progress: Progress,
    status: i32,
    written: u64,
    headers: Vec<u8, RX_CONTENT_MAX>,
    body: Vec<u8, RX_CONTENT_MAX>,
    content: Vec<u8, RX_CONTENT_MAX>,
}

impl ResponseSlot {
    const fn new() -> Self {
        Self {
            progress: Progress::Nonexistent,
            status: 0,
            written: 0,
            headers: Vec::new(),
            body: Vec::new(),
            content: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.progress = Progress::Nonexistent;
        self.status = 0;
        self.written = 0;
        self.headers.clear();
        self.body.clear();
        self.content.clear();
    }

    /// Current lifecycle state.
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Status code observed so far; 0 until the first network event carries one.
    pub fn status(&self) -> i32 {
        self.status
    }

    /// Body bytes accepted so far; stops increasing at the content ceiling.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Captured response header block.
    pub fn headers(&self) -> &[u8] {
        &self.headers
    }

    /// Final response body; empty until the connection closes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Fixed pools of request and response slots, paired by handle index.
pub struct HttpRegistry<const HANDLES: usize> {
    requests: [RequestSlot; HANDLES],
    responses: [ResponseSlot; HANDLES],
}

impl<const HANDLES: usize> Default for HttpRegistry<HANDLES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const HANDLES: usize> HttpRegistry<HANDLES> {
    /// Creates a registry with all slots free.
    pub fn new() -> Self {
        Self {
            requests: [const { RequestSlot::new() }; HANDLES],
            responses: [const { ResponseSlot::new() }; HANDLES],
        }
    }

    /// Returns the lowest-indexed free handle without reserving it, or `None`
    /// when every slot is occupied.
    pub fn allocate(&self) -> Option<usize> {
        self.requests.iter().position(|slot| !slot.in_use())
    }

    /// Sets method and URL on a slot, marking it in use.
    ///
    /// On failure the slot is rolled back to free; a partially populated slot
    /// is never observable.
    pub fn populate(&mut self, handle: usize, method: u8, url: &[u8]) -> Result<(), SlotError> {
        if method == 0 {
            return Err(SlotError::UnknownHandle);
        }
        let slot = self
            .requests
            .get_mut(handle)
            .ok_or(SlotError::UnknownHandle)?;

        slot.url.clear();
        if slot.url.extend_from_slice(url).is_err() {
            slot.reset();
            return Err(SlotError::Oversize);
        }
        slot.method = method;
        Ok(())
    }

    /// Replaces one optional field of an in-use request.
    ///
    /// Header values have bare line feeds rewritten to `\r\n` before storage,
    /// because the header block is later replayed verbatim onto the wire.
    pub fn append_field(
        &mut self,
        kind: RequestField,
        handle: usize,
        value: &[u8],
    ) -> Result<(), SlotError> {
        let slot = self
            .requests
            .get_mut(handle)
            .filter(|slot| slot.in_use())
            .ok_or(SlotError::UnknownHandle)?;

        match kind {
            RequestField::Parameter => {
                slot.params.clear();
                slot.params
                    .extend_from_slice(value)
                    .map_err(|_| SlotError::Oversize)?;
                debug!("handle {}: stored {} param bytes", handle, value.len());
            }
            RequestField::Content => {
                slot.content.clear();
                slot.content
                    .extend_from_slice(value)
                    .map_err(|_| SlotError::Oversize)?;
                debug!("handle {}: stored {} content bytes", handle, value.len());
            }
            RequestField::Header => {
                slot.headers.clear();
                canonicalize_line_endings(value, &mut slot.headers)
                    .map_err(|_| SlotError::Oversize)?;
                debug!("handle {}: stored {} header bytes", handle, slot.headers.len());
            }
        }
        Ok(())
    }

    /// Borrows the populated request for a `begin` call, or `None` when the
    /// slot is free.
    pub fn request_parts(&self, handle: usize) -> Option<RequestParts<'_>> {
        let slot = self.requests.get(handle).filter(|slot| slot.in_use())?;
        Some(RequestParts {
            method: slot.method,
            url: &slot.url,
            params: &slot.params,
            content: &slot.content,
            headers: &slot.headers,
        })
    }

    /// Discards any stale response on this handle ahead of a fresh fire.
    pub fn reset_response(&mut self, handle: usize) {
        if let Some(response) = self.responses.get_mut(handle) {
            response.reset();
        }
    }

    /// Current response progress; `Nonexistent` for out-of-range handles.
    pub fn poll(&self, handle: usize) -> Progress {
        self.responses
            .get(handle)
            .map(|r| r.progress)
            .unwrap_or(Progress::Nonexistent)
    }

    /// Read access to a handle's response slot.
    pub fn response(&self, handle: usize) -> Option<&ResponseSlot> {
        self.responses.get(handle)
    }

    /// Whether a request occupies this handle.
    pub fn is_in_use(&self, handle: usize) -> bool {
        self.requests.get(handle).is_some_and(|slot| slot.in_use())
    }

    /// Whether the response has observed at least one status-bearing network
    /// event. Distinct from [`is_in_use`]: a purged request leaves its
    /// response readable until the next fire.
    ///
    /// [`is_in_use`]: HttpRegistry::is_in_use
    pub fn is_readable(&self, handle: usize) -> bool {
        self.responses.get(handle).is_some_and(|r| r.status != 0)
    }

    /// Resets both slots of a handle to their free state.
    pub fn purge(&mut self, handle: usize) {
        if let Some(slot) = self.requests.get_mut(handle) {
            slot.reset();
        }
        if let Some(response) = self.responses.get_mut(handle) {
            response.reset();
        }
    }

    /// Applies one network lifecycle event to a handle's response slot.
    ///
    /// Events arriving after a terminal state are ignored, keeping progress
    /// monotonic. Body chunks that would push the running total past
    /// [`RX_CONTENT_MAX`] are dropped whole; the request itself is unaffected.
    pub fn on_event(&mut self, handle: usize, event: HttpEvent<'_>) {
        let Some(response) = self.responses.get_mut(handle) else {
            warn!("http event for out-of-range handle {}", handle);
            return;
        };
        if response.progress.is_terminal() {
            debug!("handle {}: event after terminal state ignored", handle);
            return;
        }

        match event {
            HttpEvent::Connected { status } => {
                response.progress = Progress::InProgress;
                response.status = status;
                response.body.clear();
            }
            HttpEvent::Chunk { data } => {
                response.progress = Progress::InProgress;
                let total = response.written + data.len() as u64;
                if total < RX_CONTENT_MAX as u64 {
                    response.written = total;
                    // Cannot fail: written mirrors body.len() and stays
                    // under the ceiling.
                    let _ = response.body.extend_from_slice(data);
                } else {
                    warn!(
                        "handle {}: response body ceiling reached, dropping {} bytes",
                        handle,
                        data.len()
                    );
                }
            }
            HttpEvent::HeadersComplete { status, headers } => {
                response.status = status;
                response.headers.clear();
                let take = headers.len().min(RX_CONTENT_MAX);
                let _ = response.headers.extend_from_slice(&headers[..take]);
            }
            HttpEvent::Closed => {
                response.content = core::mem::take(&mut response.body);
                if (200..300).contains(&response.status) {
                    response.progress = Progress::Success;
                    info!(
                        "handle {}: closed, status {} bytes {}",
                        handle, response.status, response.written
                    );
                } else {
                    response.progress = Progress::Failed;
                    error!("handle {}: closed with status {}", handle, response.status);
                }
            }
        }
    }
}

/// Parses an ASCII-digit handle, bounds-checked against the pool size.
///
/// At most three digits are accepted, matching the wire format.
pub fn parse_handle(field: &[u8], handles: usize) -> Option<usize> {
    if field.is_empty() || field.len() > 3 || !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value = field
        .iter()
        .fold(0usize, |acc, &b| acc * 10 + (b - b'0') as usize);
    (value < handles).then_some(value)
}

fn canonicalize_line_endings<const CAP: usize>(
    value: &[u8],
    out: &mut Vec<u8, CAP>,
) -> Result<(), ()> {
    let mut prev = 0u8;
    for &b in value {
        if b == b'\n' && prev != b'\r' {
            out.extend_from_slice(b"\r\n").map_err(|_| ())?;
        } else {
            out.push(b).map_err(|_| ())?;
        }
        prev = b;
    }
    Ok(())
}
