//! Tools for testing code that sends metrics, without a daemon on the other end.
use std::{
    io,
    sync::{Arc, Mutex},
};

use crate::transport::{Channel, Endpoint, Transport};

#[derive(Default)]
struct Inner {
    opens: Vec<Endpoint>,
    closes: usize,
    writes: usize,
    datagrams: Vec<Vec<u8>>,
    fail_open: bool,
    fail_close: bool,
    failing_writes: Vec<usize>,
}

/// An in-memory transport that can be used for debugging or testing.
///
/// Every opened channel, attempted write, and released channel is recorded. Clones share the same recording, so a
/// test can hold onto one clone while a client owns another.
///
/// Failures can be injected to exercise the error paths of the client: opening channels, individual writes (by their
/// zero-based index across the lifetime of the transport), and closing channels.
#[derive(Clone, Default)]
pub struct DebuggingTransport {
    inner: Arc<Mutex<Inner>>,
}

impl DebuggingTransport {
    /// Creates a new `DebuggingTransport`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every attempt to open a channel fail.
    #[must_use]
    pub fn with_open_failure(self) -> Self {
        self.inner.lock().expect("transport lock poisoned").fail_open = true;
        self
    }

    /// Makes every attempt to close a channel fail.
    #[must_use]
    pub fn with_close_failure(self) -> Self {
        self.inner.lock().expect("transport lock poisoned").fail_close = true;
        self
    }

    /// Makes the write with the given zero-based index fail.
    #[must_use]
    pub fn with_write_failure(self, index: usize) -> Self {
        self.inner.lock().expect("transport lock poisoned").failing_writes.push(index);
        self
    }

    /// Returns the endpoints of every channel opened so far, including failed attempts.
    pub fn opens(&self) -> Vec<Endpoint> {
        self.inner.lock().expect("transport lock poisoned").opens.clone()
    }

    /// Returns the number of channels released so far.
    pub fn closes(&self) -> usize {
        self.inner.lock().expect("transport lock poisoned").closes
    }

    /// Returns every successfully written datagram, in order.
    pub fn datagrams(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("transport lock poisoned")
            .datagrams
            .iter()
            .map(|datagram| String::from_utf8_lossy(datagram).into_owned())
            .collect()
    }

    /// Clears all recorded activity, leaving injected failures in place.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("transport lock poisoned");
        inner.opens.clear();
        inner.closes = 0;
        inner.writes = 0;
        inner.datagrams.clear();
    }
}

impl Transport for DebuggingTransport {
    type Channel = DebuggingChannel;

    fn open(&self, endpoint: &Endpoint) -> io::Result<DebuggingChannel> {
        let mut inner = self.inner.lock().expect("transport lock poisoned");
        inner.opens.push(endpoint.clone());
        if inner.fail_open {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "injected open failure"));
        }

        Ok(DebuggingChannel { inner: Arc::clone(&self.inner), released: false })
    }
}

/// Channel handed out by [`DebuggingTransport`].
pub struct DebuggingChannel {
    inner: Arc<Mutex<Inner>>,
    released: bool,
}

impl DebuggingChannel {
    fn release(&mut self) -> bool {
        if self.released {
            return false;
        }

        self.released = true;
        let mut inner = self.inner.lock().expect("transport lock poisoned");
        inner.closes += 1;
        inner.fail_close
    }
}

impl Channel for DebuggingChannel {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().expect("transport lock poisoned");
        let index = inner.writes;
        inner.writes += 1;

        if inner.failing_writes.contains(&index) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }

        inner.datagrams.push(payload.to_vec());
        Ok(payload.len())
    }

    fn close(mut self) -> io::Result<()> {
        if self.release() {
            Err(io::Error::new(io::ErrorKind::Other, "injected close failure"))
        } else {
            Ok(())
        }
    }
}

impl Drop for DebuggingChannel {
    fn drop(&mut self) {
        self.release();
    }
}
