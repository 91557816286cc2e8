use crate::error::Error;

/// A configuration for a connection pool
///
/// ```rs
/// let mut opts1 = Opts::default();
/// opts1.poolsize = 10;
///
/// let mut opts2 = Opts::try_from("redis://:password@localhost:6379/2")?;
/// opts2.tcp_nodelay = false;
/// ```
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address
    pub host: String,

    /// Port number for the Redis server
    pub port: u16,

    /// Number of parallel connections in the pool
    pub poolsize: usize,

    /// If set, AUTH is the first command sent on every connection
    pub password: Option<String>,

    /// Database index; if non-zero, SELECT follows AUTH
    pub db: u32,

    /// Text encoding used to decode string values. Redis keeps all values in
    /// binary; only UTF-8 is accepted here.
    pub encoding: String,

    /// Enable TCP_NODELAY to disable Nagle's algorithm
    pub tcp_nodelay: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 6379,
            poolsize: 1,
            password: None,
            db: 0,
            encoding: "utf-8".to_owned(),
            tcp_nodelay: true,
        }
    }
}

impl Opts {
    /// Check the options before any connection is dialed.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.poolsize == 0 {
            return Err(Error::BadConfig("poolsize must be at least 1".to_owned()));
        }
        if !matches!(self.encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
            return Err(Error::BadConfig(format!(
                "unsupported encoding '{}', only utf-8 is available",
                self.encoding
            )));
        }
        Ok(())
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        // Parse URL
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::BadConfig(format!("Failed to parse Redis URL: {}", e)))?;

        // Verify scheme
        if parsed.scheme() != "redis" {
            return Err(Error::BadConfig(format!(
                "Invalid URL scheme '{}', expected 'redis'",
                parsed.scheme()
            )));
        }

        // Extract host (default localhost)
        let host = parsed
            .host_str()
            .map(ToString::to_string)
            .unwrap_or_else(|| "localhost".to_owned());
        let port = parsed.port().unwrap_or(6379);

        // Extract password (default None)
        let password = parsed.password().map(ToString::to_string);

        // Extract database index from path
        let db = match parsed.path().strip_prefix('/').filter(|db| !db.is_empty()) {
            Some(db) => db
                .parse::<u32>()
                .map_err(|_| Error::BadConfig(format!("Invalid database index '{}'", db)))?,
            None => 0,
        };

        Ok(Self {
            host,
            port,
            password,
            db,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = Opts::default();
        assert_eq!(opts.host, "localhost");
        assert_eq!(opts.port, 6379);
        assert_eq!(opts.poolsize, 1);
        assert_eq!(opts.db, 0);
        assert!(opts.password.is_none());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn url_with_everything() {
        let opts = Opts::try_from("redis://:sesame@redis.example.com:6380/3").unwrap();
        assert_eq!(opts.host, "redis.example.com");
        assert_eq!(opts.port, 6380);
        assert_eq!(opts.password.as_deref(), Some("sesame"));
        assert_eq!(opts.db, 3);
    }

    #[test]
    fn url_minimal() {
        let opts = Opts::try_from("redis://localhost").unwrap();
        assert_eq!(opts.port, 6379);
        assert_eq!(opts.db, 0);
        assert!(opts.password.is_none());
    }

    #[test]
    fn url_bad_scheme() {
        assert!(matches!(
            Opts::try_from("mysql://localhost"),
            Err(Error::BadConfig(_))
        ));
    }

    #[test]
    fn url_bad_db() {
        assert!(matches!(
            Opts::try_from("redis://localhost/none"),
            Err(Error::BadConfig(_))
        ));
    }

    #[test]
    fn rejects_unknown_encoding() {
        let opts = Opts {
            encoding: "latin-1".to_owned(),
            ..Opts::default()
        };
        assert!(matches!(opts.validate(), Err(Error::BadConfig(_))));
    }

    #[test]
    fn rejects_zero_poolsize() {
        let opts = Opts {
            poolsize: 0,
            ..Opts::default()
        };
        assert!(matches!(opts.validate(), Err(Error::BadConfig(_))));
    }
}
