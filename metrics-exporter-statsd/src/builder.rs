use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    client::StatsdClient,
    config::{parse_address, ConfigOverrides, Configuration, DEFAULT_WRITE_TIMEOUT},
    recorder::StatsdRecorder,
    transport::{Transport, UdpTransport},
};

/// Errors that could occur while building or installing a StatsD client/recorder.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvironment {
        /// Name of the offending variable.
        var: &'static str,

        /// Details about the parsing failure.
        reason: String,
    },

    /// Failed to install the recorder due to an existing global recorder already being installed.
    #[error("failed to install recorder as global recorder")]
    FailedToInstall,
}

/// Builder for a StatsD client.
///
/// Settings are layered: anything set explicitly on the builder takes precedence over values read from the
/// environment with [`StatsdBuilder::from_env`], which in turn take precedence over the defaults, regardless of the
/// order in which the builder methods are called.
pub struct StatsdBuilder {
    explicit: ConfigOverrides,
    environment: ConfigOverrides,
    write_timeout: Duration,
    max_payload_len: Option<usize>,
}

impl StatsdBuilder {
    /// Creates a builder seeded with the `STATSD_ENABLED`, `STATSD_PREFIX`, and `STATSD_ADDR` environment variables.
    ///
    /// See [`ConfigOverrides::from_env_vars`] for how each variable is interpreted.
    ///
    /// # Errors
    ///
    /// If `STATSD_ADDR` is set but cannot be parsed, an error will be returned indicating the reason.
    pub fn from_env() -> Result<Self, BuildError> {
        Ok(Self::default().with_environment(ConfigOverrides::from_env()?))
    }

    /// Sets the environment-level overrides directly.
    ///
    /// This is the layer [`StatsdBuilder::from_env`] populates, and is sitting underneath any explicitly configured
    /// values.
    #[must_use]
    pub fn with_environment(mut self, environment: ConfigOverrides) -> Self {
        self.environment = environment;
        self
    }

    /// Sets whether or not metrics are sent at all.
    ///
    /// When disabled, every metric operation returns immediately without sampling or touching the network.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.explicit.enabled = Some(enabled);
        self
    }

    /// Sets the prefix applied to every metric name, in the format of `<prefix>.<name>`.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn with_prefix<P>(mut self, prefix: P) -> Self
    where
        P: Into<String>,
    {
        self.explicit.prefix = Some(prefix.into());
        self
    }

    /// Sets the host of the daemon.
    ///
    /// Defaults to `127.0.0.1`.
    #[must_use]
    pub fn with_host<H>(mut self, host: H) -> Self
    where
        H: Into<String>,
    {
        self.explicit.host = Some(host.into());
        self
    }

    /// Sets the port of the daemon.
    ///
    /// Defaults to `8125`.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.explicit.port = Some(port);
        self
    }

    /// Sets the remote address to send metrics to, in the format of `<host>:<port>`.
    ///
    /// Either piece may be empty to leave it unchanged. IPv6 hosts must be bracketed, as in `[::1]:8125`.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        let (host, port) =
            parse_address(addr.as_ref()).map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        if host.is_some() {
            self.explicit.host = host;
        }
        if port.is_some() {
            self.explicit.port = port;
        }
        Ok(self)
    }

    /// Sets the write timeout for sending metrics.
    ///
    /// When the write timeout is reached, the write is abandoned and the datagram being sent at the time is dropped
    /// without retrying. A zero timeout disables the timeout.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the maximum payload length, enabling packing of multiple lines into one datagram.
    ///
    /// By default, every metric line is sent as its own datagram. When a maximum payload length is set, the lines of a
    /// single call are newline-delimited and packed into as few datagrams as possible without exceeding the limit.
    /// A line that exceeds the limit on its own is still sent by itself.
    ///
    /// This should generally be set to the same value (or lower) as the receive buffer size of the daemon.
    #[must_use]
    pub fn with_maximum_payload_length(mut self, max_payload_len: usize) -> Self {
        self.max_payload_len = Some(max_payload_len);
        self
    }

    /// Resolves the configuration this builder would build with.
    pub fn configuration(&self) -> Configuration {
        let mut config = Configuration::resolve(self.explicit.clone().merge(self.environment.clone()));
        config.write_timeout = self.write_timeout;
        config.max_payload_len = self.max_payload_len;
        config
    }

    /// Builds a client sending over UDP.
    pub fn build(self) -> StatsdClient {
        let transport = UdpTransport::new(self.write_timeout);
        self.build_with_transport(transport)
    }

    /// Builds a client sending over the given transport.
    pub fn build_with_transport<T>(self, transport: T) -> StatsdClient<T>
    where
        T: Transport,
    {
        StatsdClient::new(self.configuration(), transport)
    }

    /// Builds a recorder sending over UDP.
    ///
    /// The recorder must be manually installed by the caller.
    pub fn build_recorder(self) -> StatsdRecorder {
        StatsdRecorder::new(Arc::new(self.build()))
    }

    /// Builds and installs a recorder sending over UDP as the global recorder.
    ///
    /// # Errors
    ///
    /// If a global recorder is already installed, an error will be returned.
    pub fn install(self) -> Result<(), BuildError> {
        let recorder = self.build_recorder();

        metrics::set_global_recorder(recorder).map_err(|_| BuildError::FailedToInstall)
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder {
            explicit: ConfigOverrides::default(),
            environment: ConfigOverrides::default(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_payload_len: None,
        }
    }
}
