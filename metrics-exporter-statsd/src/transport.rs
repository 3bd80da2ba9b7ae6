use std::{
    fmt, io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
    time::Duration,
};

/// Destination of metric datagrams.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates a new `Endpoint`.
    pub fn new<H>(host: H, port: u16) -> Self
    where
        H: Into<String>,
    {
        Self { host: host.into(), port }
    }

    /// Returns the host, which may be either an IP address or a hostname.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// A connectionless, unreliable way of reaching an [`Endpoint`].
///
/// Transports hand out a fresh [`Channel`] for every batch of metrics. Channels are scoped: they are dropped (and so
/// released) as soon as the batch has been written, whether or not the writes succeeded.
pub trait Transport: Send + Sync {
    /// Channel type produced by this transport.
    type Channel: Channel;

    /// Opens a channel to `endpoint`.
    ///
    /// # Errors
    ///
    /// If the endpoint cannot be resolved, or the channel cannot be created, an error is returned.
    fn open(&self, endpoint: &Endpoint) -> io::Result<Self::Channel>;
}

/// An open channel, writing one datagram per call.
///
/// Dropping a channel releases it. [`Channel::close`] does the same, but surfaces any release error.
pub trait Channel {
    /// Sends a single datagram.
    ///
    /// # Errors
    ///
    /// If the datagram cannot be sent, an error is returned. The channel remains usable for further sends.
    fn send(&mut self, payload: &[u8]) -> io::Result<usize>;

    /// Releases the channel.
    ///
    /// # Errors
    ///
    /// If releasing the underlying resource fails, an error is returned. The channel is released regardless.
    fn close(self) -> io::Result<()>;
}

/// UDP transport.
///
/// Each channel binds an ephemeral local socket of the endpoint's address family and connects it to the endpoint.
/// Hostnames are resolved every time a channel is opened.
#[derive(Clone, Debug)]
pub struct UdpTransport {
    write_timeout: Duration,
}

impl UdpTransport {
    /// Creates a new `UdpTransport` with the given write timeout.
    ///
    /// A zero timeout disables the timeout entirely.
    pub fn new(write_timeout: Duration) -> Self {
        Self { write_timeout }
    }
}

impl Transport for UdpTransport {
    type Channel = UdpChannel;

    fn open(&self, endpoint: &Endpoint) -> io::Result<UdpChannel> {
        let addrs = (endpoint.host(), endpoint.port()).to_socket_addrs()?.collect::<Vec<_>>();
        let first = addrs.first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "endpoint resolved to no addresses")
        })?;

        // Only keep addresses we can actually reach from the socket we're about to bind.
        let (bind_addr, addrs) = if first.is_ipv4() {
            let same_family = addrs.iter().copied().filter(SocketAddr::is_ipv4).collect::<Vec<_>>();
            (SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)), same_family)
        } else {
            let same_family = addrs.iter().copied().filter(SocketAddr::is_ipv6).collect::<Vec<_>>();
            (SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)), same_family)
        };

        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(&addrs[..])?;
        if !self.write_timeout.is_zero() {
            socket.set_write_timeout(Some(self.write_timeout))?;
        }

        Ok(UdpChannel { socket })
    }
}

/// A connected UDP socket, released on drop.
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
}

impl Channel for UdpChannel {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send(payload)
    }

    fn close(self) -> io::Result<()> {
        // Closing a UDP socket cannot report failure.
        drop(self.socket);
        Ok(())
    }
}
