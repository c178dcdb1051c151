//! Connection handle: one player's outbound side of a bidirectional message
//! channel.
//!
//! The transport itself stays behind the `MessageChannel` trait. A
//! `Connection` adds the exclusive per-connection write lock, so frames from
//! concurrent senders never interleave, and turns every transport failure
//! into `LobbyError::ConnectionClosed`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use scribble_session_common::messages_common::ServerEvent;
use thiserror::Error;

use crate::error::LobbyError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("message channel closed")]
pub struct ChannelClosed;

/// Outbound half of a transport.
///
/// `send` hands over exactly one frame and may only block for a bounded
/// attempt; a transport that can't accept the frame in time reports
/// `ChannelClosed`.
pub trait MessageChannel: Send {
    fn send(&mut self, frame: String) -> Result<(), ChannelClosed>;
    fn close(&mut self);
}

pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub struct Connection {
    id: ConnectionId,
    channel: Mutex<Box<dyn MessageChannel>>,
}

impl Connection {
    pub fn new<C: MessageChannel + 'static>(channel: C) -> Arc<Connection> {
        Arc::new(Connection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            channel: Mutex::new(Box::new(channel)),
        })
    }

    /// Unique per connection, a reconnecting player gets a new one.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, event: &ServerEvent) -> Result<(), LobbyError> {
        let frame = event
            .to_frame()
            .map_err(|err| LobbyError::InvalidEvent(err.to_string()))?;
        self.send_frame(frame)
    }

    /// Writes an already serialized event. The write lock is held for this
    /// single frame only.
    pub fn send_frame(&self, frame: String) -> Result<(), LobbyError> {
        self.channel
            .lock()
            .send(frame)
            .map_err(|_| LobbyError::ConnectionClosed)
    }

    pub fn close(&self) {
        self.channel.lock().close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

struct MemoryQueue {
    frames: VecDeque<String>,
    closed: bool,
}

/// In-process transport with a bounded queue, used to embed clients such as
/// bots or test drivers into the same process as the lobby.
pub struct MemoryChannel {
    queue: Arc<Mutex<MemoryQueue>>,
    capacity: usize,
}

/// Receiving end of a `MemoryChannel`.
#[derive(Clone)]
pub struct MemoryReceiver {
    queue: Arc<Mutex<MemoryQueue>>,
}

impl MemoryChannel {
    pub fn bounded(capacity: usize) -> (MemoryChannel, MemoryReceiver) {
        let queue = Arc::new(Mutex::new(MemoryQueue {
            frames: VecDeque::new(),
            closed: false,
        }));
        (
            MemoryChannel {
                queue: queue.clone(),
                capacity,
            },
            MemoryReceiver { queue },
        )
    }
}

impl MessageChannel for MemoryChannel {
    fn send(&mut self, frame: String) -> Result<(), ChannelClosed> {
        let mut queue = self.queue.lock();
        if queue.closed {
            return Err(ChannelClosed);
        }
        // a receiver that stopped draining is treated like a dead peer
        if queue.frames.len() >= self.capacity {
            queue.closed = true;
            return Err(ChannelClosed);
        }
        queue.frames.push_back(frame);
        Ok(())
    }

    fn close(&mut self) {
        self.queue.lock().closed = true;
    }
}

impl MemoryReceiver {
    pub fn drain(&self) -> Vec<String> {
        self.queue.lock().frames.drain(..).collect()
    }

    /// Drains and decodes all pending frames. Frames that aren't valid
    /// events are skipped.
    pub fn events(&self) -> Vec<ServerEvent> {
        self.drain()
            .iter()
            .filter_map(|frame| ServerEvent::from_frame(frame).ok())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }

    /// Simulates the peer going away: every further send fails.
    pub fn hang_up(&self) {
        self.queue.lock().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Writes frames byte by byte into a shared buffer, so interleaving
    /// would be visible.
    struct ByteChannel {
        bytes: Arc<std::sync::Mutex<Vec<u8>>>,
    }

    impl MessageChannel for ByteChannel {
        fn send(&mut self, frame: String) -> Result<(), ChannelClosed> {
            for byte in frame.bytes().chain(std::iter::once(b'\n')) {
                self.bytes.lock().unwrap().push(byte);
                thread::yield_now();
            }
            Ok(())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn concurrent_sends_do_not_interleave() {
        let bytes = Arc::new(std::sync::Mutex::new(Vec::new()));
        let connection = Connection::new(ByteChannel {
            bytes: bytes.clone(),
        });

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let connection = connection.clone();
                thread::spawn(move || {
                    for j in 0..20 {
                        let event = ServerEvent::SystemMessage(format!("{}-{}", i, j));
                        connection.send(&event).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let bytes = bytes.lock().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        let frames: Vec<&str> = text.lines().collect();
        assert_eq!(frames.len(), 80);
        for frame in frames {
            assert!(matches!(
                ServerEvent::from_frame(frame).unwrap(),
                ServerEvent::SystemMessage(_)
            ));
        }
    }

    #[test]
    fn send_on_closed_channel_fails_without_panicking() {
        let (channel, receiver) = MemoryChannel::bounded(8);
        let connection = Connection::new(channel);
        receiver.hang_up();
        assert_eq!(
            connection.send(&ServerEvent::Shutdown),
            Err(LobbyError::ConnectionClosed)
        );
    }

    #[test]
    fn full_queue_counts_as_failed_send() {
        let (channel, receiver) = MemoryChannel::bounded(1);
        let connection = Connection::new(channel);
        assert!(connection.send(&ServerEvent::Shutdown).is_ok());
        assert_eq!(
            connection.send(&ServerEvent::Shutdown),
            Err(LobbyError::ConnectionClosed)
        );
        assert!(receiver.is_closed());
        assert_eq!(receiver.events(), vec![ServerEvent::Shutdown]);
    }

    #[test]
    fn connection_ids_are_unique() {
        let (a, _) = MemoryChannel::bounded(1);
        let (b, _) = MemoryChannel::bounded(1);
        assert_ne!(Connection::new(a).id(), Connection::new(b).id());
    }
}
