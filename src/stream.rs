//! Byte transport underneath the record layer.
//!
//! A [`Channel`] moves opaque bytes and knows nothing about records or
//! messages. The in-memory pair drives two engine connections against each
//! other in tests; the TCP channel talks to a real implementation under
//! test. Silence within the timeout is reported as zero bytes, never as an
//! error: a quiet peer is an observation the trace layer records.

use std::cell::{Cell, RefCell};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::rc::Rc;
use std::time::Duration;

use log::trace;

use crate::error::Error;

pub trait Channel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Appends whatever arrives within `timeout` to `out` and returns the
    /// number of bytes added. `Ok(0)` means the peer stayed silent; an error
    /// means the transport itself failed.
    fn recv(&mut self, out: &mut Vec<u8>, timeout: Duration) -> Result<usize, Error>;
}

/// One end of an in-process byte pipe. Sent bytes land in the peer's inbox
/// immediately, so the receive timeout is irrelevant and ignored.
pub struct MemoryChannel {
    inbox: Rc<RefCell<Vec<u8>>>,
    outbox: Rc<RefCell<Vec<u8>>>,
    closed: Rc<Cell<bool>>,
}

impl MemoryChannel {
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let a_to_b = Rc::new(RefCell::new(Vec::new()));
        let b_to_a = Rc::new(RefCell::new(Vec::new()));
        let closed = Rc::new(Cell::new(false));

        (
            MemoryChannel {
                inbox: b_to_a.clone(),
                outbox: a_to_b.clone(),
                closed: closed.clone(),
            },
            MemoryChannel {
                inbox: a_to_b,
                outbox: b_to_a,
                closed,
            },
        )
    }

    /// Closes both directions. Further sends from either end fail hard.
    pub fn close(&mut self) {
        self.closed.set(true);
    }
}

impl Channel for MemoryChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.closed.get() {
            return Err(Error::Io("memory channel is closed".to_string()));
        }
        self.outbox.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }

    fn recv(&mut self, out: &mut Vec<u8>, _timeout: Duration) -> Result<usize, Error> {
        let pending = std::mem::take(&mut *self.inbox.borrow_mut());
        if pending.is_empty() && self.closed.get() {
            return Err(Error::Io("memory channel is closed".to_string()));
        }
        out.extend_from_slice(&pending);
        Ok(pending.len())
    }
}

/// Blocking TCP transport with a per-receive deadline.
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self, Error> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Configuration("address resolved to nothing".to_string()))?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Wraps an accepted connection, for server-side runs where the
    /// listener belongs to the harness.
    pub fn from_stream(stream: TcpStream) -> Result<Self, Error> {
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }
}

impl Channel for TcpChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    fn recv(&mut self, out: &mut Vec<u8>, timeout: Duration) -> Result<usize, Error> {
        // A zero timeout would disable the deadline entirely.
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream.set_read_timeout(Some(timeout))?;

        let mut buf = [0u8; 4096];
        let mut total = 0;
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    if total == 0 {
                        return Err(Error::Io("connection closed by peer".to_string()));
                    }
                    break;
                }
                Ok(n) => {
                    out.extend_from_slice(&buf[..n]);
                    total += n;
                    // Drain whatever follows closely, then stop waiting.
                    self.stream.set_read_timeout(Some(Duration::from_millis(10)))?;
                }
                Err(e)
                    if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        trace!("tcp recv: {} bytes", total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pair_delivers_both_directions() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.send(&[1, 2, 3]).unwrap();
        b.send(&[4]).unwrap();

        let mut got = Vec::new();
        assert_eq!(b.recv(&mut got, Duration::from_millis(1)).unwrap(), 3);
        assert_eq!(got, vec![1, 2, 3]);

        got.clear();
        assert_eq!(a.recv(&mut got, Duration::from_millis(1)).unwrap(), 1);
        assert_eq!(got, vec![4]);
    }

    #[test]
    fn silence_is_zero_bytes_not_an_error() {
        let (mut a, _b) = MemoryChannel::pair();
        let mut got = Vec::new();
        assert_eq!(a.recv(&mut got, Duration::from_millis(1)).unwrap(), 0);
    }

    #[test]
    fn closed_channel_fails_hard() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.close();
        assert!(matches!(b.send(&[0]), Err(Error::Io(_))));
        let mut got = Vec::new();
        assert!(matches!(
            b.recv(&mut got, Duration::from_millis(1)),
            Err(Error::Io(_))
        ));
    }
}
