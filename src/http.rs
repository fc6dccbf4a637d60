//! Minimal HTTP/1.0 client over the embassy-net stack.
//!
//! Both the weather fetch and the image fetch go through [`http_get`]. The
//! protocol is deliberately HTTP/1.0: the server closes the connection at
//! the end of the body, so reads run until EOF or the caller's size cap.

use core::fmt::Write as _;
use embassy_net::{dns::DnsQueryType, tcp::TcpSocket};
use embassy_time::{Duration, Instant, with_deadline};
use heapless::String;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::error::AppError;

use alloc::vec::Vec;

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(20);

const QUERY_ENCODE_SET: &AsciiSet = &CONTROLS
    // common separators / punctuation / reserved characters:
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'~');

pub fn url_encode_component<const N: usize>(component: &str) -> Result<String<N>, AppError> {
    let mut buf = String::new();
    write!(buf, "{}", utf8_percent_encode(component, QUERY_ENCODE_SET))
        .map_err(|_| AppError::HttpRequest)?;
    Ok(buf)
}

/// Split a plain `http://host[:port]/path` URL into its parts.
pub fn split_url(url: &str) -> Result<(&str, u16, &str), AppError> {
    let rest = url.strip_prefix("http://").ok_or(AppError::BadUrl)?;
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().map_err(|_| AppError::BadUrl)?),
        None => (authority, 80),
    };
    if host.is_empty() {
        return Err(AppError::BadUrl);
    }
    Ok((host, port, path))
}

/// Returns a heapless string containing the full HTTP/1.0 GET request.
pub fn build_get_request<const N: usize>(
    target: &str,
    host: &str,
    headers: Option<&str>,
) -> Result<String<N>, AppError> {
    let mut req: String<N> = String::new();
    write!(req, "GET {} HTTP/1.0\r\nHost: {}\r\n", target, host)
        .map_err(|_| AppError::HttpRequest)?;

    if let Some(h) = headers {
        write!(req, "{}\r\n", h).map_err(|_| AppError::HttpRequest)?;
    }

    write!(req, "\r\n").map_err(|_| AppError::HttpRequest)?;

    Ok(req)
}

/// Status code from the response status line.
pub fn status_code(response: &[u8]) -> Option<u16> {
    let line_end = response.windows(2).position(|w| w == b"\r\n")?;
    let line = core::str::from_utf8(&response[..line_end]).ok()?;
    let mut parts = line.split(' ');
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Body bytes of a response: everything after the header terminator, or the
/// whole buffer if a header-less server never sent one.
pub fn response_body(response: &[u8]) -> &[u8] {
    response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| &response[pos + 4..])
        .unwrap_or(response)
}

/// Body of a response that must have status 200.
pub fn checked_body(response: &[u8]) -> Result<&[u8], AppError> {
    let status = status_code(response).ok_or(AppError::HttpRequest)?;
    if status != 200 {
        log::error!("Server returned HTTP {}", status);
        return Err(AppError::HttpStatus(status));
    }
    Ok(response_body(response))
}

/// Perform an HTTP GET request against `host:port`.
///
/// This is a low-level HTTP client function that handles DNS resolution, TCP
/// connection, sending the request, and reading the response until EOF or
/// `max_response` bytes.
///
/// Returns a buffer containing the raw HTTP response (headers + body).
pub async fn http_get(
    stack: embassy_net::Stack<'static>,
    host: &str,
    port: u16,
    target: &str,
    headers: Option<&str>,
    max_response: usize,
) -> Result<Vec<u8>, AppError> {
    let mut rx_buffer = [0u8; 4096];
    let mut tx_buffer = [0u8; 512];

    let request: String<512> = build_get_request(target, host, headers)?;

    // hosts given as IP literals skip the resolver
    let address = match host.parse::<embassy_net::IpAddress>() {
        Ok(ip) => ip,
        Err(_) => {
            log::debug!("resolving IP for {}...", host);
            let ip_addrs = match with_deadline(Instant::now() + RESOLVE_TIMEOUT, async {
                stack.dns_query(host, DnsQueryType::A).await
            })
            .await
            {
                Ok(Ok(addrs)) => addrs,
                Ok(Err(e)) => {
                    log::error!("DNS query failed: {:?}", e);
                    log::error!("Cannot resolve {}", host);
                    return Err(AppError::DnsQuery);
                }
                Err(_) => {
                    log::error!("DNS query timed out");
                    return Err(AppError::RequestTimeout);
                }
            };
            log::debug!("resolved IP(s) for {:?}...", ip_addrs);
            ip_addrs.first().copied().ok_or(AppError::DnsQuery)?
        }
    };

    let mut socket = TcpSocket::new(stack, &mut rx_buffer[..], &mut tx_buffer[..]);
    socket.set_timeout(Some(Duration::from_secs(10)));

    let remote_endpoint = (address, port);
    log::info!("Connecting to {}...", remote_endpoint.0);
    match with_deadline(Instant::now() + CONNECT_TIMEOUT, async {
        socket.connect(remote_endpoint).await
    })
    .await
    {
        Ok(Ok(())) => {
            // connected
        }
        Ok(Err(e)) => {
            log::error!("Failed to connect: {:?}", e);
            return Err(AppError::Connection);
        }
        Err(_) => {
            log::error!("Connection attempt timed out");
            return Err(AppError::RequestTimeout);
        }
    }

    log::info!("Connected!");

    use embedded_io_async::Write as _;

    log::debug!("Sending HTTP request: {}", request);

    // Send request with a deadline
    match with_deadline(Instant::now() + REQUEST_TIMEOUT, async {
        socket.write_all(request.as_bytes()).await
    })
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            log::error!("Failed to send HTTP request: {:?}", e);
            return Err(AppError::HttpRequest);
        }
        Err(_) => {
            log::error!("Timed out while sending HTTP request");
            return Err(AppError::RequestTimeout);
        }
    }

    log::debug!("HTTP request sent");
    log::debug!("Attempting to read response");

    // Read the response with a deadline for the whole receive operation.
    // Accumulate into a Vec, bounded by the caller's cap.
    let mut resp: Vec<u8> = Vec::with_capacity(1536);

    match with_deadline(Instant::now() + RESPONSE_TIMEOUT, async {
        let mut tmp = [0u8; 512];
        loop {
            match socket.read(&mut tmp).await {
                Ok(0) => {
                    log::debug!("Received complete HTTP response");
                    break Ok(());
                }
                Ok(n) => {
                    if resp.len() + n > max_response {
                        log::error!("Response exceeds {} bytes, giving up", max_response);
                        break Err(AppError::ResponseTooLarge(max_response));
                    }
                    resp.extend_from_slice(&tmp[..n]);
                }
                Err(e) => {
                    log::error!("Socket read error: {:?}", e);
                    break Err(AppError::SocketRead);
                }
            };
        }
    })
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            log::error!("Timed out while reading HTTP response");
            return Err(AppError::RequestTimeout);
        }
    }

    log::info!("Read {} response bytes", resp.len());

    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_minimal_get_request() {
        let req: String<128> = build_get_request("/frame.bmp", "www.example.com", None).unwrap();
        assert_eq!(
            req.as_str(),
            "GET /frame.bmp HTTP/1.0\r\nHost: www.example.com\r\n\r\n"
        );
    }

    #[test]
    fn builds_request_with_headers() {
        let req: String<128> =
            build_get_request("/v1", "api.example.com", Some("Accept: application/json")).unwrap();
        assert_eq!(
            req.as_str(),
            "GET /v1 HTTP/1.0\r\nHost: api.example.com\r\nAccept: application/json\r\n\r\n"
        );
    }

    #[test]
    fn request_too_long_for_buffer_errors() {
        let result: Result<String<16>, _> = build_get_request("/frame.bmp", "www.example.com", None);
        assert_eq!(result, Err(AppError::HttpRequest));
    }

    #[test]
    fn splits_urls() {
        assert_eq!(
            split_url("http://www.example.com/img.bmp"),
            Ok(("www.example.com", 80, "/img.bmp"))
        );
        assert_eq!(
            split_url("http://frames.local:8080/a/b.bmp"),
            Ok(("frames.local", 8080, "/a/b.bmp"))
        );
        assert_eq!(split_url("http://example.com"), Ok(("example.com", 80, "/")));
    }

    #[test]
    fn rejects_bad_urls() {
        assert_eq!(split_url("https://example.com/a.bmp"), Err(AppError::BadUrl));
        assert_eq!(split_url("example.com/a.bmp"), Err(AppError::BadUrl));
        assert_eq!(split_url("http:///a.bmp"), Err(AppError::BadUrl));
        assert_eq!(split_url("http://example.com:notaport/"), Err(AppError::BadUrl));
    }

    #[test]
    fn parses_status_lines() {
        assert_eq!(status_code(b"HTTP/1.0 200 OK\r\n\r\n"), Some(200));
        assert_eq!(status_code(b"HTTP/1.1 404 Not Found\r\nX: y\r\n\r\n"), Some(404));
        assert_eq!(status_code(b"garbage\r\n"), None);
        assert_eq!(status_code(b"no line ending at all"), None);
    }

    #[test]
    fn extracts_response_body() {
        let response = b"HTTP/1.0 200 OK\r\nContent-Type: image/bmp\r\n\r\nBMdata";
        assert_eq!(response_body(response), b"BMdata");
        assert_eq!(response_body(b"raw bytes"), b"raw bytes");
    }

    #[test]
    fn checked_body_enforces_status() {
        assert_eq!(
            checked_body(b"HTTP/1.0 200 OK\r\n\r\npayload"),
            Ok(&b"payload"[..])
        );
        assert_eq!(
            checked_body(b"HTTP/1.0 401 Unauthorized\r\n\r\nnope"),
            Err(AppError::HttpStatus(401))
        );
    }

    #[test]
    fn percent_encodes_query_components() {
        let encoded: String<64> = url_encode_component("Europe/Rome").unwrap();
        assert_eq!(encoded.as_str(), "Europe%2FRome");
        let encoded: String<64> = url_encode_component("45.0703").unwrap();
        assert_eq!(encoded.as_str(), "45.0703");
    }
}
