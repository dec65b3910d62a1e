//! The transport invariant: no plaintext HTTP to non-local hosts.

const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "0.0.0.0"];

/// Does `endpoint` satisfy the transport invariant (HTTPS, or plaintext HTTP
/// only to a loopback/any-interface host)?
#[must_use]
pub fn is_transport_secure(endpoint: &str) -> bool {
    let Some(rest) = endpoint.strip_prefix("http://") else {
        // https:// or a non-HTTP scheme (e.g. an MCP stdio command) passes.
        return true;
    };

    let host = rest
        .split(['/', ':', '?', '#'])
        .next()
        .unwrap_or_default();
    LOCAL_HOSTS.contains(&host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_is_always_secure() {
        assert!(is_transport_secure("https://example.com/api"));
    }

    #[test]
    fn plaintext_to_remote_host_is_insecure() {
        assert!(!is_transport_secure("http://example.com/api"));
    }

    #[test]
    fn plaintext_to_localhost_is_allowed() {
        assert!(is_transport_secure("http://localhost:8080/health"));
        assert!(is_transport_secure("http://127.0.0.1/health"));
        assert!(is_transport_secure("http://0.0.0.0:9000/health"));
    }

    #[test]
    fn non_http_scheme_passes_through() {
        assert!(is_transport_secure("mcp-stdio://some-tool"));
    }
}
