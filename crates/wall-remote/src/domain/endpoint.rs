//! WebSocket endpoint derivation.
//!
//! The control panel is served from the wall itself, so the socket lives on
//! the page origin's host: `https://wall:1337` becomes
//! `wss://wall:1337/blinkenwall`.  A secure origin always yields a secure
//! socket.

use url::Url;

use crate::domain::config::ConfigError;

/// Builds the WebSocket URL for `origin`.
///
/// `port` overrides the origin's port; otherwise the origin's explicit port
/// or its scheme default is used.  `path` gets a leading `/` if it lacks one.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOrigin`] for unparsable input,
/// [`ConfigError::UnsupportedScheme`] for anything other than
/// `http`/`https`/`ws`/`wss`, and [`ConfigError::MissingHost`] when the
/// origin has no host.
pub fn endpoint_from_origin(
    origin: &str,
    port: Option<u16>,
    path: &str,
) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidOrigin {
        origin: origin.to_string(),
        reason,
    };

    let parsed = Url::parse(origin).map_err(|e| invalid(e.to_string()))?;
    let scheme = match parsed.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    };
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ConfigError::MissingHost(origin.to_string()))?;

    let mut text = format!("{scheme}://{host}");
    if let Some(port) = port.or_else(|| parsed.port_or_known_default()) {
        text.push_str(&format!(":{port}"));
    }
    if !path.starts_with('/') {
        text.push('/');
    }
    text.push_str(path);

    Url::parse(&text).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_origin_becomes_ws() {
        // Arrange / Act
        let url = endpoint_from_origin("http://wall.local:1337", None, "/blinkenwall").unwrap();

        // Assert
        assert_eq!(url.as_str(), "ws://wall.local:1337/blinkenwall");
    }

    #[test]
    fn test_https_origin_becomes_wss() {
        let url = endpoint_from_origin("https://wall.example.org", None, "/blinkenwall").unwrap();

        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.port_or_known_default(), Some(443));
        assert_eq!(url.path(), "/blinkenwall");
    }

    #[test]
    fn test_port_override_wins() {
        let url = endpoint_from_origin("http://wall.local:8080", Some(1337), "/blinkenwall").unwrap();
        assert_eq!(url.port(), Some(1337));
    }

    #[test]
    fn test_path_without_slash_is_fixed() {
        let url = endpoint_from_origin("http://wall.local", None, "socket").unwrap();
        assert_eq!(url.path(), "/socket");
    }

    #[test]
    fn test_page_path_is_discarded() {
        let url = endpoint_from_origin("http://wall.local:1337/shaders/42", None, "/blinkenwall")
            .unwrap();
        assert_eq!(url.as_str(), "ws://wall.local:1337/blinkenwall");
    }

    #[test]
    fn test_ipv6_host() {
        let url = endpoint_from_origin("http://[::1]:1337", None, "/blinkenwall").unwrap();
        assert_eq!(url.as_str(), "ws://[::1]:1337/blinkenwall");
    }

    #[test]
    fn test_unsupported_scheme() {
        let result = endpoint_from_origin("ftp://wall.local", None, "/blinkenwall");
        assert!(matches!(result, Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"));
    }

    #[test]
    fn test_garbage_origin() {
        let result = endpoint_from_origin("not a url", None, "/blinkenwall");
        assert!(matches!(result, Err(ConfigError::InvalidOrigin { .. })));
    }
}
