//! URL validation utilities
//!
//! Provides security-focused validation for links sent by users:
//! - Only HTTP/HTTPS schemes are accepted
//! - Loopback, private, link-local and otherwise local hosts are refused,
//!   so the downloader cannot be pointed at the machine it runs on
//! - Overlong links are refused before any parsing work

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

use crate::core::config::validation::MAX_URL_LENGTH;

/// Validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Not a parseable absolute URL
    #[error("That doesn't look like a link")]
    Malformed,

    /// Scheme other than http/https
    #[error("Only http:// and https:// links are supported (got {0}://)")]
    UnsupportedScheme(String),

    /// Loopback, private or otherwise local address
    #[error("Links to local or private addresses are not allowed")]
    LocalHost,

    /// Longer than [`MAX_URL_LENGTH`]
    #[error("The link is too long ({0} characters, max {MAX_URL_LENGTH})")]
    TooLong(usize),
}

/// Finds the first http(s) link in free-form message text.
///
/// # Examples
/// ```
/// use mediarelay::core::validation::extract_first_url;
///
/// assert_eq!(
///     extract_first_url("look at this https://example.com/v/1 please"),
///     Some("https://example.com/v/1")
/// );
/// assert_eq!(extract_first_url("no links here"), None);
/// ```
pub fn extract_first_url(text: &str) -> Option<&str> {
    lazy_regex::regex_find!(r#"(?i)https?://[^\s<>"']+"#, text)
}

/// Validates a user-supplied media link.
///
/// # Arguments
/// * `url` - The URL string to validate
///
/// # Returns
/// * `Ok(Url)` - parsed URL, safe to hand to the downloader
/// * `Err(ValidationError)` - if the link must be refused
///
/// # Examples
/// ```
/// use mediarelay::core::validation::validate_media_url;
///
/// assert!(validate_media_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
/// assert!(validate_media_url("ftp://example.com/video").is_err());
/// assert!(validate_media_url("http://127.0.0.1:8080/admin").is_err());
/// ```
pub fn validate_media_url(url: &str) -> Result<Url, ValidationError> {
    let url = url.trim();
    let length = url.chars().count();
    if length > MAX_URL_LENGTH {
        return Err(ValidationError::TooLong(length));
    }

    let parsed = Url::parse(url).map_err(|_| ValidationError::Malformed)?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    match parsed.host() {
        None => return Err(ValidationError::Malformed),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if is_local_domain(&domain) {
                return Err(ValidationError::LocalHost);
            }
        }
        Some(Host::Ipv4(ip)) => {
            if is_local_ip(IpAddr::V4(ip)) {
                return Err(ValidationError::LocalHost);
            }
        }
        Some(Host::Ipv6(ip)) => {
            if is_local_ip(IpAddr::V6(ip)) {
                return Err(ValidationError::LocalHost);
            }
        }
    }

    Ok(parsed)
}

fn is_local_domain(domain: &str) -> bool {
    domain == "localhost"
        || domain.ends_with(".localhost")
        || domain.ends_with(".local")
        || domain.ends_with(".internal")
        || !domain.contains('.')
}

fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_local_ipv4(ip),
        IpAddr::V6(ip) => {
            if let Some(mapped) = ip.to_ipv4_mapped() {
                return is_local_ipv4(mapped);
            }
            is_local_ipv6(ip)
        }
    }
}

fn is_local_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (64..128).contains(&b))
}

fn is_local_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}
