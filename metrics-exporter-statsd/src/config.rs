use std::time::Duration;

use crate::{builder::BuildError, transport::Endpoint};

/// Environment variable controlling whether sending is enabled.
pub const ENV_ENABLED: &str = "STATSD_ENABLED";

/// Environment variable holding the metric name prefix.
pub const ENV_PREFIX: &str = "STATSD_PREFIX";

/// Environment variable holding the daemon address, as `<host>:<port>`.
pub const ENV_ADDR: &str = "STATSD_ADDR";

pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 8125;
pub(crate) const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A partial configuration, where every field is optional.
///
/// Overrides are layered with [`ConfigOverrides::merge`]: explicitly configured values sit on top of values read from
/// the environment, which sit on top of the built-in defaults applied by [`Configuration::resolve`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Whether or not sending is enabled.
    pub enabled: Option<bool>,

    /// Prefix applied to every metric name.
    pub prefix: Option<String>,

    /// Host of the daemon.
    pub host: Option<String>,

    /// Port of the daemon.
    pub port: Option<u16>,
}

impl ConfigOverrides {
    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// If `STATSD_ADDR` carries a port that is not a valid port number, an error is returned.
    pub fn from_env() -> Result<Self, BuildError> {
        Self::from_env_vars(std::env::vars())
    }

    /// Reads overrides from the given environment variables.
    ///
    /// * `STATSD_ENABLED`: the literal string `false` disables sending, and any other non-empty string enables it.
    /// * `STATSD_PREFIX`: used as the prefix when non-empty.
    /// * `STATSD_ADDR`: `<host>:<port>`, where either piece may be left empty to keep its default. IPv6 hosts must be
    ///   bracketed, as in `[::1]:8125`.
    ///
    /// Unrelated variables are ignored.
    ///
    /// # Errors
    ///
    /// If `STATSD_ADDR` carries a port that is not a valid port number, an error is returned.
    pub fn from_env_vars<I, K, V>(vars: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut overrides = ConfigOverrides::default();

        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                ENV_ENABLED => overrides.enabled = parse_enabled(value),
                ENV_PREFIX => overrides.prefix = non_empty(value),
                ENV_ADDR => {
                    let (host, port) = parse_address(value)
                        .map_err(|reason| BuildError::InvalidEnvironment { var: ENV_ADDR, reason })?;
                    overrides.host = host;
                    overrides.port = port;
                }
                _ => {}
            }
        }

        Ok(overrides)
    }

    /// Merges `self` on top of `lower`.
    ///
    /// Every field set in `self` wins. Fields left unset in `self` fall through to `lower`. An empty prefix or host
    /// counts as unset.
    #[must_use]
    pub fn merge(self, lower: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            enabled: self.enabled.or(lower.enabled),
            prefix: self.prefix.filter(|prefix| !prefix.is_empty()).or(lower.prefix),
            host: self.host.filter(|host| !host.is_empty()).or(lower.host),
            port: self.port.or(lower.port),
        }
    }
}

/// Fully resolved client configuration.
///
/// Once resolved, a configuration never changes: building a client with different settings means building a new
/// client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub(crate) enabled: bool,
    pub(crate) prefix: Option<String>,
    pub(crate) endpoint: Endpoint,
    pub(crate) write_timeout: Duration,
    pub(crate) max_payload_len: Option<usize>,
}

impl Configuration {
    /// Resolves a configuration, filling any unset field with its default.
    ///
    /// Defaults to sending enabled, no prefix, and a daemon at `127.0.0.1:8125`.
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        Configuration {
            enabled: overrides.enabled.unwrap_or(true),
            prefix: overrides.prefix.filter(|prefix| !prefix.is_empty()),
            endpoint: Endpoint::new(
                overrides.host.filter(|host| !host.is_empty()).unwrap_or_else(|| DEFAULT_HOST.to_string()),
                overrides.port.unwrap_or(DEFAULT_PORT),
            ),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_payload_len: None,
        }
    }

    /// Returns `true` if sending is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the metric name prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns the daemon endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the write timeout applied to each datagram.
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Returns the maximum payload length, if packing multiple lines per datagram is enabled.
    pub fn max_payload_len(&self) -> Option<usize> {
        self.max_payload_len
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration::resolve(ConfigOverrides::default())
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_enabled(value: &str) -> Option<bool> {
    match value {
        "" => None,
        "false" => Some(false),
        _ => Some(true),
    }
}

/// Splits `<host>:<port>` into its pieces, leaving empty pieces unset.
///
/// A value without a colon is taken as a bare host.
pub(crate) fn parse_address(addr: &str) -> Result<(Option<String>, Option<u16>), String> {
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) =
            rest.split_once(']').ok_or_else(|| format!("unterminated IPv6 host in '{addr}'"))?;
        match rest {
            "" => (host, ""),
            _ => {
                let port = rest
                    .strip_prefix(':')
                    .ok_or_else(|| format!("unexpected characters after IPv6 host in '{addr}'"))?;
                (host, port)
            }
        }
    } else {
        addr.rsplit_once(':').unwrap_or((addr, ""))
    };

    let port = if port.is_empty() {
        None
    } else {
        let port = port.parse::<u16>().map_err(|e| format!("invalid port '{port}': {e}"))?;
        Some(port)
    };

    Ok((non_empty(host), port))
}

#[cfg(test)]
mod tests {
    use super::{parse_address, ConfigOverrides, Configuration, ENV_ADDR, ENV_ENABLED, ENV_PREFIX};
    use crate::{builder::BuildError, transport::Endpoint};

    #[test]
    fn defaults() {
        let config = Configuration::default();
        assert!(config.enabled());
        assert_eq!(config.prefix(), None);
        assert_eq!(config.endpoint(), &Endpoint::new("127.0.0.1", 8125));
        assert_eq!(config.max_payload_len(), None);
    }

    #[test]
    fn enabled_parsing() {
        // Cases are defined as: raw value, expected override.
        let cases = [
            ("false", Some(false)),
            ("true", Some(true)),
            ("1", Some(true)),
            ("0", Some(true)),
            ("False", Some(true)),
            ("", None),
        ];

        for (raw, expected) in cases {
            let overrides = ConfigOverrides::from_env_vars([(ENV_ENABLED, raw)]).unwrap();
            assert_eq!(overrides.enabled, expected, "STATSD_ENABLED={raw:?}");
        }
    }

    #[test]
    fn address_parsing() {
        // Cases are defined as: raw value, expected host, expected port.
        let cases = [
            ("10.0.0.5:9125", Some("10.0.0.5"), Some(9125)),
            ("statsd.internal", Some("statsd.internal"), None),
            ("statsd.internal:", Some("statsd.internal"), None),
            (":9125", None, Some(9125)),
            ("[::1]:8126", Some("::1"), Some(8126)),
            ("[::1]", Some("::1"), None),
            ("", None, None),
        ];

        for (raw, host, port) in cases {
            let (actual_host, actual_port) = parse_address(raw).unwrap();
            assert_eq!(actual_host.as_deref(), host, "address {raw:?}");
            assert_eq!(actual_port, port, "address {raw:?}");
        }
    }

    #[test]
    fn invalid_addresses() {
        for raw in ["host:port", "host:99999", "[::1", "[::1]8125"] {
            assert!(parse_address(raw).is_err(), "address {raw:?} should be rejected");
        }

        let err = ConfigOverrides::from_env_vars([(ENV_ADDR, "host:nope")]).unwrap_err();
        assert!(matches!(err, BuildError::InvalidEnvironment { var: "STATSD_ADDR", .. }));
    }

    #[test]
    fn env_vars() {
        let overrides = ConfigOverrides::from_env_vars([
            ("PATH", "/usr/bin"),
            (ENV_ENABLED, "false"),
            (ENV_PREFIX, "myapp"),
            (ENV_ADDR, "metrics.local:9125"),
        ])
        .unwrap();

        assert_eq!(
            overrides,
            ConfigOverrides {
                enabled: Some(false),
                prefix: Some("myapp".to_string()),
                host: Some("metrics.local".to_string()),
                port: Some(9125),
            }
        );
    }

    #[test]
    fn empty_prefix_is_unset() {
        let overrides = ConfigOverrides::from_env_vars([(ENV_PREFIX, "")]).unwrap();
        assert_eq!(overrides.prefix, None);
    }

    #[test]
    fn explicit_values_win() {
        let env = ConfigOverrides::from_env_vars([(ENV_ADDR, "10.0.0.5:9125"), (ENV_PREFIX, "env")]).unwrap();
        let explicit = ConfigOverrides { host: Some("10.1.1.1".to_string()), ..Default::default() };

        let config = Configuration::resolve(explicit.merge(env));
        assert_eq!(config.endpoint(), &Endpoint::new("10.1.1.1", 9125));
        assert_eq!(config.prefix(), Some("env"));
        assert!(config.enabled());
    }

    #[test]
    fn empty_explicit_host_falls_through() {
        let env = ConfigOverrides::from_env_vars([(ENV_ADDR, "10.0.0.5:9125")]).unwrap();
        let explicit = ConfigOverrides { host: Some(String::new()), ..Default::default() };

        let config = Configuration::resolve(explicit.merge(env));
        assert_eq!(config.endpoint(), &Endpoint::new("10.0.0.5", 9125));
    }

    #[test]
    fn empty_host_falls_back_to_default() {
        let explicit = ConfigOverrides { host: Some(String::new()), ..Default::default() };
        let config = Configuration::resolve(explicit);
        assert_eq!(config.endpoint().host(), "127.0.0.1");
    }
}
