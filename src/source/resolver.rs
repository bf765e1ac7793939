//! Base64 transcoding and remote document fetch

use crate::error::{Error, Result};
use base64::Engine;
use futures_util::StreamExt;
use std::net::IpAddr;

/// Decode base64 document data; surrounding whitespace is ignored
pub fn decode_base64(base64_data: &str) -> Result<Vec<u8>> {
    let engine = base64::engine::general_purpose::STANDARD;
    Ok(engine.decode(base64_data.trim())?)
}

/// Encode document bytes as standard base64
pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Check if an IP address is private/reserved (loopback, link-local, private ranges, etc.)
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()                           // 127.0.0.0/8
                || v4.is_private()                     // 10/8, 172.16/12, 192.168/16
                || v4.is_link_local()                  // 169.254/16 (cloud metadata!)
                || v4.is_broadcast()                   // 255.255.255.255
                || v4.is_unspecified()                 // 0.0.0.0
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64  // CGNAT 100.64/10
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()                           // ::1
                || v6.is_unspecified()                 // ::
                || {
                    let segments = v6.segments();
                    // fc00::/7 (unique local)
                    (segments[0] & 0xFE00) == 0xFC00
                    // fe80::/10 (link-local)
                    || (segments[0] & 0xFFC0) == 0xFE80
                }
        }
    }
}

/// Check URL for SSRF by resolving DNS and verifying IPs are public
async fn check_ssrf(url_str: &str) -> Result<()> {
    let parsed = url::Url::parse(url_str).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid URL: {}", e),
    })?;

    let host = parsed.host_str().ok_or_else(|| Error::SourceResolution {
        reason: "URL has no host".to_string(),
    })?;

    let port = parsed.port_or_known_default().unwrap_or(443);
    let addr_str = format!("{}:{}", host, port);

    let addrs = tokio::net::lookup_host(&addr_str).await.map_err(|e| {
        Error::SourceResolution {
            reason: format!("DNS resolution failed for {}: {}", host, e),
        }
    })?;

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(Error::SsrfBlocked {
                url: url_str.to_string(),
            });
        }
    }

    Ok(())
}

/// Options for fetching a remote document
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Allow URLs that resolve to private/reserved IPs
    pub allow_private_urls: bool,
    /// Maximum body size in bytes
    pub max_download_bytes: u64,
}

/// Download a PDF, sending `auth_token` verbatim as the `Authorization` header.
///
/// The URL is checked for SSRF first, the body is streamed with an
/// incremental size limit, and the result must start with `%PDF`.
pub async fn resolve_url(url: &str, auth_token: Option<&str>, options: &FetchOptions) -> Result<Vec<u8>> {
    // SSRF check
    if !options.allow_private_urls {
        check_ssrf(url).await?;
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(Error::HttpRequest)?;

    let mut request = client.get(url);
    if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
        request = request.header(reqwest::header::AUTHORIZATION, token);
    }
    let response = request.send().await?;

    if !response.status().is_success() {
        return Err(Error::SourceResolution {
            reason: format!("HTTP request failed with status: {}", response.status()),
        });
    }

    // Check Content-Length header for early rejection
    if let Some(content_length) = response.content_length() {
        if content_length > options.max_download_bytes {
            return Err(Error::DownloadTooLarge {
                size: content_length,
                max_size: options.max_download_bytes,
            });
        }
    }

    // Stream the response body with incremental size checking to prevent OOM
    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Error::HttpRequest)?;
        data.extend_from_slice(&chunk);
        if data.len() as u64 > options.max_download_bytes {
            return Err(Error::DownloadTooLarge {
                size: data.len() as u64,
                max_size: options.max_download_bytes,
            });
        }
    }

    // Validate PDF header
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Downloaded data is not a valid PDF file".to_string(),
        });
    }

    tracing::info!(bytes = data.len(), "document downloaded");
    Ok(data)
}
