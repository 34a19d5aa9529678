//! Simulation collaborators for unit testing diagnostic servers
//!
//! Everything here is an in-memory stand-in for the traits in
//! [crate::channel]: a scriptable ISO-TP link, a CAN bus backed by queues,
//! and a manually advanced clock. All three hand out cloneable handles to
//! shared state, so a test can keep one handle while the server owns the
//! boxed other.

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use crate::channel::{CanBus, CanFrame, ChannelError, ChannelResult, Clock, IsoTpLink, SendStatus};

/// ISO-TP link double. Requests are injected as complete PDUs (the
/// segmentation layer is presumed correct); sent PDUs are recorded for
/// inspection. Send completion can be held back to exercise behavior that
/// keys off the send-idle edge, like response-pending re-entry.
#[derive(Debug, Clone, Default)]
pub struct SimIsoTpLink {
    inner: Arc<RwLock<LinkInner>>,
}

#[derive(Debug, Default)]
struct LinkInner {
    ids: Option<(u32, u32)>,
    rx_queue: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    hold_send_completion: bool,
    send_status: SendStatus,
    can_frames_fed: usize,
}

impl SimIsoTpLink {
    /// Creates an idle link
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one reassembled request PDU as if it had arrived from the bus
    pub fn inject_request(&self, pdu: &[u8]) {
        self.inner.write().unwrap().rx_queue.push_back(pdu.to_vec());
    }

    /// Drains and returns every PDU the server has sent so far
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        mem::take(&mut self.inner.write().unwrap().sent)
    }

    /// When held, a sent PDU stays [SendStatus::InProgress] until
    /// [SimIsoTpLink::complete_send] is called; otherwise sends complete
    /// instantly.
    pub fn hold_send_completion(&self, hold: bool) {
        self.inner.write().unwrap().hold_send_completion = hold;
    }

    /// Marks the in-flight PDU as fully transmitted
    pub fn complete_send(&self) {
        self.inner.write().unwrap().send_status = SendStatus::Idle;
    }

    /// Number of raw CAN frames the server routed into this link
    pub fn can_frames_fed(&self) -> usize {
        self.inner.read().unwrap().can_frames_fed
    }

    /// The `(send, recv)` arbitration IDs the server configured, if any
    pub fn configured_ids(&self) -> Option<(u32, u32)> {
        self.inner.read().unwrap().ids
    }
}

impl IsoTpLink for SimIsoTpLink {
    fn init(&mut self, send_id: u32, recv_id: u32) -> ChannelResult<()> {
        self.inner.write().unwrap().ids = Some((send_id, recv_id));
        Ok(())
    }

    fn on_can_frame(&mut self, _frame: &CanFrame) {
        self.inner.write().unwrap().can_frames_fed += 1;
    }

    fn poll(&mut self) {}

    fn send(&mut self, pdu: &[u8]) -> ChannelResult<()> {
        let mut inner = self.inner.write().unwrap();
        inner.sent.push(pdu.to_vec());
        inner.send_status = if inner.hold_send_completion {
            SendStatus::InProgress
        } else {
            SendStatus::Idle
        };
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        let mut inner = self.inner.write().unwrap();
        match inner.rx_queue.front() {
            None => Err(ChannelError::BufferEmpty),
            Some(pdu) if pdu.len() > buf.len() => Err(ChannelError::PduTooLarge {
                size: pdu.len(),
                limit: buf.len(),
            }),
            Some(_) => {
                let pdu = inner.rx_queue.pop_front().unwrap_or_default();
                buf[..pdu.len()].copy_from_slice(&pdu);
                Ok(pdu.len())
            }
        }
    }

    fn send_status(&self) -> SendStatus {
        self.inner.read().unwrap().send_status
    }
}

/// CAN driver double backed by frame queues
#[derive(Debug, Clone, Default)]
pub struct SimCanBus {
    inner: Arc<RwLock<BusInner>>,
}

#[derive(Debug, Default)]
struct BusInner {
    rx_queue: VecDeque<CanFrame>,
    sent: Vec<CanFrame>,
}

impl SimCanBus {
    /// Creates an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one frame for the server to drain on its next poll
    pub fn push_frame(&self, frame: CanFrame) {
        self.inner.write().unwrap().rx_queue.push_back(frame);
    }

    /// Drains and returns every frame transmitted so far
    pub fn take_sent(&self) -> Vec<CanFrame> {
        mem::take(&mut self.inner.write().unwrap().sent)
    }
}

impl CanBus for SimCanBus {
    fn rx_poll(&mut self) -> Option<CanFrame> {
        self.inner.write().unwrap().rx_queue.pop_front()
    }

    fn tx(&mut self, frame: &CanFrame) -> ChannelResult<()> {
        self.inner.write().unwrap().sent.push(*frame);
        Ok(())
    }
}

/// Manually advanced millisecond clock
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Arc<AtomicU32>,
}

impl SimClock {
    /// Creates a clock starting at 0 ms
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `ms` milliseconds
    pub fn advance(&self, ms: u32) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    /// Jumps to an absolute time
    pub fn set(&self, ms: u32) {
        self.now.store(ms, Ordering::Relaxed);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }
}
