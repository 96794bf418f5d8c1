use std::str::FromStr;

use anyhow::{bail, Context, Result};

// ---------------------------------------------------------------------------
// SourceFallback
// ---------------------------------------------------------------------------

/// What to store as `source` when an incoming reading does not name one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFallback {
    /// Store this fixed label.
    Literal(String),
    /// Store the IP address the request came from.
    PeerAddress,
}

impl Default for SourceFallback {
    fn default() -> Self {
        Self::Literal("unknown".to_owned())
    }
}

impl FromStr for SourceFallback {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => bail!("SOURCE_FALLBACK must not be empty"),
            "peer" => Ok(Self::PeerAddress),
            label => Ok(Self::Literal(label.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    /// Rows shown by the view when no `limit` is given.
    pub view_limit: u32,
    /// Upper bound on the `limit` query parameter.
    pub max_view_limit: u32,
    pub source_fallback: SourceFallback,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let view_limit: u32 = optional("VIEW_LIMIT", "100")
            .parse()
            .context("VIEW_LIMIT must be a positive integer")?;
        let max_view_limit: u32 = optional("MAX_VIEW_LIMIT", "10000")
            .parse()
            .context("MAX_VIEW_LIMIT must be a positive integer")?;
        if view_limit == 0 || max_view_limit == 0 {
            bail!("VIEW_LIMIT and MAX_VIEW_LIMIT must be greater than zero");
        }
        if view_limit > max_view_limit {
            bail!("VIEW_LIMIT ({view_limit}) must not exceed MAX_VIEW_LIMIT ({max_view_limit})");
        }

        Ok(Self {
            database_url: database_url(|key| std::env::var(key).ok())?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            view_limit,
            max_view_limit,
            source_fallback: optional("SOURCE_FALLBACK", "unknown").parse()?,
        })
    }
}

/// Resolve the connection string: `DATABASE_URL` wins, otherwise it is
/// composed from `DB_USER`, `DB_PASS`, `DB_HOST`, `DB_PORT` and `DB_NAME`.
///
/// `lookup` is injected so the composition rules can be tested without
/// touching the process environment.
fn database_url(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("DATABASE_URL") {
        return Ok(url);
    }

    let (Some(user), Some(name)) = (get("DB_USER"), get("DB_NAME")) else {
        bail!("missing required env var: DATABASE_URL (or DB_USER and DB_NAME)");
    };
    let host = get("DB_HOST").unwrap_or_else(|| "localhost".to_owned());
    let port = get("DB_PORT").unwrap_or_else(|| "5432".to_owned());
    port.parse::<u16>()
        .with_context(|| format!("DB_PORT must be a valid port number, got: {port:?}"))?;

    let credentials = match get("DB_PASS") {
        Some(pass) => format!("{user}:{pass}"),
        None => user,
    };
    Ok(format!("postgres://{credentials}@{host}:{port}/{name}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn database_url_prefers_explicit_url() {
        let url = database_url(env(&[
            ("DATABASE_URL", "postgres://a@b/c"),
            ("DB_USER", "ignored"),
            ("DB_NAME", "ignored"),
        ]))
        .unwrap();
        assert_eq!(url, "postgres://a@b/c");
    }

    #[test]
    fn database_url_composed_from_parts() {
        let url = database_url(env(&[
            ("DB_USER", "sensor"),
            ("DB_PASS", "secret"),
            ("DB_HOST", "db"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "telemetry"),
        ]))
        .unwrap();
        assert_eq!(url, "postgres://sensor:secret@db:6543/telemetry");
    }

    #[test]
    fn database_url_parts_use_defaults() {
        let url = database_url(env(&[("DB_USER", "sensor"), ("DB_NAME", "telemetry")])).unwrap();
        assert_eq!(url, "postgres://sensor@localhost:5432/telemetry");
    }

    #[test]
    fn database_url_missing_errors() {
        let err = database_url(env(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn database_url_blank_is_missing() {
        let err = database_url(env(&[("DATABASE_URL", "  ")])).unwrap_err();
        assert!(err.to_string().contains("missing required env var"));
    }

    #[test]
    fn database_url_bad_port_errors() {
        let err = database_url(env(&[
            ("DB_USER", "sensor"),
            ("DB_NAME", "telemetry"),
            ("DB_PORT", "http"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn source_fallback_from_str() {
        assert_eq!(
            "peer".parse::<SourceFallback>().unwrap(),
            SourceFallback::PeerAddress
        );
        assert_eq!(
            "unknown".parse::<SourceFallback>().unwrap(),
            SourceFallback::default()
        );
        assert_eq!(
            " greenhouse ".parse::<SourceFallback>().unwrap(),
            SourceFallback::Literal("greenhouse".to_owned())
        );
        assert!("".parse::<SourceFallback>().is_err());
    }
}
