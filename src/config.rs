//! Server configuration.
//!
//! Read once at startup from the environment (optionally seeded from a
//! `.env` file by the binary). Every variable has a default; a variable that
//! is present but malformed is an [`Error::Config`].
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `3000` |
//! | `STATIC_ROOT` | `./dist` |
//! | `COMPRESSION_THRESHOLD` | `1024` |
//! | `CSRF_PROTECTION` | `false` |
//! | `CSRF_PATH_PREFIX` | `/api` |
//! | `CSRF_IGNORE_METHODS` | `HEAD,OPTIONS` |
//! | `CSRF_SECRET` | random per process |
//! | `CSRF_REJECTION_MESSAGE` | the built-in guidance text |

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;
use crate::method::Method;
use crate::middleware::{CSRF_REJECTION_MESSAGE, DEFAULT_THRESHOLD};

/// Immutable process configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Directory the front-end build is served from.
    pub static_root: PathBuf,
    /// Minimum body size, in bytes, before compression is attempted.
    pub compression_threshold: usize,
    pub csrf: CsrfConfig,
}

/// CSRF settings.
#[derive(Clone)]
pub struct CsrfConfig {
    /// Whether the validation stage is mounted at all.
    pub protection: bool,
    /// Only paths starting with this prefix are validated.
    pub path_prefix: String,
    pub ignore_methods: Vec<Method>,
    /// Key material for token signing. `None` generates a key per process,
    /// so issued tokens do not survive a restart.
    pub secret: Option<String>,
    pub rejection_message: String,
}

impl fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("protection", &self.protection)
            .field("path_prefix", &self.path_prefix)
            .field("ignore_methods", &self.ignore_methods)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("rejection_message", &self.rejection_message)
            .finish()
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            protection: false,
            path_prefix: "/api".to_owned(),
            ignore_methods: vec![Method::Head, Method::Options],
            secret: None,
            rejection_message: CSRF_REJECTION_MESSAGE.to_owned(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            static_root: PathBuf::from("./dist"),
            compression_threshold: DEFAULT_THRESHOLD,
            csrf: CsrfConfig::default(),
        }
    }
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let csrf = CsrfConfig {
            protection: match var("CSRF_PROTECTION") {
                Some(v) => parse_bool("CSRF_PROTECTION", &v)?,
                None => defaults.csrf.protection,
            },
            path_prefix: var("CSRF_PATH_PREFIX").unwrap_or(defaults.csrf.path_prefix),
            ignore_methods: match var("CSRF_IGNORE_METHODS") {
                Some(v) => parse_methods("CSRF_IGNORE_METHODS", &v)?,
                None => defaults.csrf.ignore_methods,
            },
            secret: var("CSRF_SECRET"),
            rejection_message: var("CSRF_REJECTION_MESSAGE")
                .unwrap_or(defaults.csrf.rejection_message),
        };

        if !csrf.path_prefix.starts_with('/') {
            return Err(Error::Config {
                key: "CSRF_PATH_PREFIX",
                reason: format!("`{}` must start with `/`", csrf.path_prefix),
            });
        }

        Ok(Self {
            host: parse_or("HOST", var("HOST"), defaults.host)?,
            port: parse_or("PORT", var("PORT"), defaults.port)?,
            static_root: var("STATIC_ROOT").map(PathBuf::from).unwrap_or(defaults.static_root),
            compression_threshold: parse_or(
                "COMPRESSION_THRESHOLD",
                var("COMPRESSION_THRESHOLD"),
                defaults.compression_threshold,
            )?,
            csrf,
        })
    }

    /// The socket address to listen on.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(v) => v.trim().parse().map_err(|e: T::Err| Error::Config {
            key,
            reason: format!("`{v}`: {e}"),
        }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config { key, reason: format!("`{other}` is not a boolean") }),
    }
}

fn parse_methods(key: &'static str, value: &str) -> Result<Vec<Method>, Error> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| {
            m.to_ascii_uppercase()
                .parse::<Method>()
                .map_err(|e| Error::Config { key, reason: e.to_string() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr(), SocketAddr::from(([0, 0, 0, 0], 3000)));
        assert_eq!(config.static_root, PathBuf::from("./dist"));
        assert_eq!(config.compression_threshold, 1024);
        assert!(!config.csrf.protection);
        assert_eq!(config.csrf.path_prefix, "/api");
        assert_eq!(config.csrf.ignore_methods, [Method::Head, Method::Options]);
        assert!(config.csrf.secret.is_none());
        assert_eq!(config.csrf.rejection_message, CSRF_REJECTION_MESSAGE);
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("STATIC_ROOT", "/srv/catmusic"),
            ("COMPRESSION_THRESHOLD", "0"),
            ("CSRF_PROTECTION", "TRUE"),
            ("CSRF_PATH_PREFIX", "/v2"),
            ("CSRF_IGNORE_METHODS", "head, options ,get"),
            ("CSRF_SECRET", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(config.addr(), SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.static_root, PathBuf::from("/srv/catmusic"));
        assert_eq!(config.compression_threshold, 0);
        assert!(config.csrf.protection);
        assert_eq!(config.csrf.path_prefix, "/v2");
        assert_eq!(config.csrf.ignore_methods, [Method::Head, Method::Options, Method::Get]);
        assert_eq!(config.csrf.secret.as_deref(), Some("hunter2"));
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("PORT", ""), ("CSRF_SECRET", "  ")])).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.csrf.secret.is_none());
    }

    #[test]
    fn malformed_values_are_rejected() {
        let cases = [
            ("PORT", "eighty"),
            ("PORT", "70000"),
            ("HOST", "localhost:3000"),
            ("COMPRESSION_THRESHOLD", "-1"),
            ("CSRF_PROTECTION", "maybe"),
            ("CSRF_IGNORE_METHODS", "HEAD,BREW"),
            ("CSRF_PATH_PREFIX", "api"),
        ];
        for (key, value) in cases {
            match Config::from_lookup(lookup(&[(key, value)])) {
                Err(Error::Config { key: reported, .. }) => assert_eq!(reported, key),
                other => panic!("{key}={value}: expected config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn debug_redacts_the_secret() {
        let config = Config::from_lookup(lookup(&[("CSRF_SECRET", "hunter2")])).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
