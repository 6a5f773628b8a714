//! HTTP(S) transport adapter.
//!
//! Issues one outbound request, assembles the response body (gunzip/inflate
//! plus charset decoding when the downstream compressed it), and stamps the
//! response-end time. Redirects are never followed here: the response
//! adapter decides what a `location` header means for the client.

use crate::options::{HttpOptions, InboundRequest};
use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use flate2::read::{GzDecoder, ZlibDecoder};
use hie_router_core::{Clock, Headers, Response, RouterError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::io::Read;

static CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)charset=([^;,\r\n]+)").expect("charset pattern compiles"));

/// Issue one outbound HTTP(S) request for a route.
///
/// The inbound body is written verbatim for `POST` and `PUT`. The configured
/// timeout covers connection, send, and body collection; when it fires the
/// request is aborted and the attempt fails with
/// [`RouterError::Timeout`].
///
/// # Errors
///
/// Network errors, TLS errors, and timeouts each produce exactly one failed
/// attempt; no partial response is returned.
pub async fn send(
    opts: &HttpOptions,
    inbound: &InboundRequest,
    clock: &dyn Clock,
) -> Result<Response, RouterError> {
    let timeout_ms = u64::try_from(opts.timeout.as_millis()).unwrap_or(u64::MAX);
    match tokio::time::timeout(opts.timeout, issue(opts, inbound, clock)).await {
        Ok(result) => result,
        Err(_) => Err(RouterError::Timeout(timeout_ms)),
    }
}

async fn issue(
    opts: &HttpOptions,
    inbound: &InboundRequest,
    clock: &dyn Clock,
) -> Result<Response, RouterError> {
    let scheme = if opts.secured { "https" } else { "http" };
    let url = format!("{scheme}://{}:{}{}", opts.hostname, opts.port, opts.path);

    let client = build_client(opts)?;
    let method = reqwest::Method::from_bytes(opts.method.as_bytes())
        .map_err(|_| RouterError::transport(format!("invalid request method {}", opts.method)))?;

    let mut request = client
        .request(method, &url)
        .headers(outbound_headers(&opts.headers));
    if let Some(auth) = &opts.auth {
        request = request.basic_auth(&auth.username, Some(&auth.password));
    }
    if opts.method.eq_ignore_ascii_case("POST") || opts.method.eq_ignore_ascii_case("PUT") {
        request = request.body(inbound.body.clone());
    }

    let response = request
        .send()
        .await
        .map_err(|err| RouterError::transport(err.to_string()))?;
    let status = response.status().as_u16();
    let headers = inbound_headers(response.headers());
    let raw = response
        .bytes()
        .await
        .map_err(|err| RouterError::transport(err.to_string()))?;

    let body = assemble_body(&headers, raw)?;
    tracing::debug!(url = %url, status, "Downstream response collected");

    Ok(Response {
        status,
        headers,
        body,
        timestamp: clock.now(),
    })
}

fn build_client(opts: &HttpOptions) -> Result<reqwest::Client, RouterError> {
    // One client per request: each route carries its own identity and CA.
    let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());

    if opts.secured {
        let identity_pem = format!("{}\n{}", opts.key, opts.cert);
        let identity = reqwest::Identity::from_pem(identity_pem.as_bytes())
            .map_err(|err| RouterError::transport(format!("client identity rejected: {err}")))?;
        builder = builder.identity(identity);

        if let Some(ca) = &opts.ca {
            let certificate = reqwest::Certificate::from_pem(ca.as_bytes())
                .map_err(|err| RouterError::transport(format!("CA certificate rejected: {err}")))?;
            builder = builder.add_root_certificate(certificate);
        }
    }

    builder
        .build()
        .map_err(|err| RouterError::transport(err.to_string()))
}

fn outbound_headers(headers: &Headers) -> reqwest::header::HeaderMap {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::warn!(header = name, "Skipping invalid outbound header name");
            continue;
        };
        for v in value.all() {
            match HeaderValue::from_str(v) {
                Ok(header_value) => {
                    map.append(header_name.clone(), header_value);
                }
                Err(_) => {
                    tracing::warn!(header = name, "Skipping invalid outbound header value");
                }
            }
        }
    }
    map
}

fn inbound_headers(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        headers.append(
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    headers
}

/// Decompress the body when the downstream declared `gzip` or `deflate`
/// content encoding, then render the decoded bytes with the response
/// charset. Bodies with any other encoding pass through as raw bytes.
fn assemble_body(headers: &Headers, raw: Bytes) -> Result<Bytes, RouterError> {
    let encoding = headers
        .get("content-encoding")
        .map(|e| e.trim().to_ascii_lowercase());

    let decompressed = match encoding.as_deref() {
        Some("gzip") => Some(decompress(GzDecoder::new(raw.as_ref()))?),
        Some("deflate") => Some(decompress(ZlibDecoder::new(raw.as_ref()))?),
        _ => None,
    };

    match decompressed {
        Some(bytes) => {
            let text = decode_charset(headers, &bytes);
            Ok(Bytes::from(text.into_owned()))
        }
        None => Ok(raw),
    }
}

fn decompress<R: Read>(mut reader: R) -> Result<Vec<u8>, RouterError> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|err| RouterError::transport(format!("failed to decode response body: {err}")))?;
    Ok(out)
}

fn decode_charset<'a>(headers: &Headers, bytes: &'a [u8]) -> Cow<'a, str> {
    let encoding = headers
        .get("content-type")
        .and_then(|content_type| CHARSET.captures(content_type))
        .and_then(|captures| captures.get(1))
        .and_then(|label| Encoding::for_label(label.as_str().trim().trim_matches('"').as_bytes()))
        .unwrap_or(UTF_8);

    let (text, _, _) = encoding.decode(bytes);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn headers(entries: &[(&str, &str)]) -> Headers {
        entries.iter().copied().collect()
    }

    fn gzip(data: &[u8]) -> Bytes {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    #[test]
    fn uncompressed_bodies_pass_through_as_raw_bytes() {
        let raw = Bytes::from_static(&[0xff, 0xfe, 0x00]);
        let body = assemble_body(&Headers::new(), raw.clone()).unwrap();
        assert_eq!(body, raw);
    }

    #[test]
    fn gzip_bodies_are_decompressed() {
        let body = assemble_body(
            &headers(&[("content-encoding", "gzip")]),
            gzip(b"hello there"),
        )
        .unwrap();
        assert_eq!(body, Bytes::from_static(b"hello there"));
    }

    #[test]
    fn deflate_bodies_are_inflated() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"inflate me").unwrap();
        let compressed = Bytes::from(encoder.finish().unwrap());

        let body = assemble_body(&headers(&[("content-encoding", "deflate")]), compressed).unwrap();
        assert_eq!(body, Bytes::from_static(b"inflate me"));
    }

    #[test]
    fn corrupt_compressed_bodies_fail_the_attempt() {
        let result = assemble_body(
            &headers(&[("content-encoding", "gzip")]),
            Bytes::from_static(b"not gzip at all"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn charset_from_content_type_is_applied_to_decoded_bodies() {
        // "café" in latin-1
        let latin1 = &[0x63, 0x61, 0x66, 0xe9];
        let body = assemble_body(
            &headers(&[
                ("content-encoding", "gzip"),
                ("content-type", "text/plain; charset=ISO-8859-1"),
            ]),
            gzip(latin1),
        )
        .unwrap();
        assert_eq!(body, Bytes::from("café"));
    }

    #[test]
    fn charset_defaults_to_utf8() {
        let body = assemble_body(
            &headers(&[("content-encoding", "gzip"), ("content-type", "text/plain")]),
            gzip("héllo".as_bytes()),
        )
        .unwrap();
        assert_eq!(body, Bytes::from("héllo"));
    }

    #[test]
    fn charset_regex_tolerates_trailing_parameters() {
        let decoded = decode_charset(
            &headers(&[("content-type", "text/plain; charset=iso-8859-1; boundary=x")]),
            &[0xe9],
        );
        assert_eq!(decoded, "é");
    }
}
