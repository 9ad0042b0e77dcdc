//! Error taxonomy and plain-text HTTP responses

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use thiserror::Error;

/// Errors from the Wake-on-LAN send path
#[derive(Debug, Error)]
pub enum WolError {
    /// The MAC address did not normalize to 12 hexadecimal characters.
    /// Carries the original input for diagnostics.
    #[error("invalid MAC address: {mac}")]
    InvalidMac { mac: String },

    /// The UDP broadcast itself failed (e.g. network unreachable).
    /// Retries belong to the caller, not to the sender.
    #[error("failed to transmit magic packet: {0}")]
    TransmitFailure(#[from] std::io::Error),
}

/// Build a plain-text response with the given status
pub fn text_response(
    status: StatusCode,
    body: impl Into<String>,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "text/plain")
        .body(
            Full::new(Bytes::from(body.into()))
                .map_err(|never| match never {})
                .boxed(),
        )
        .expect("valid response with StatusCode enum and static headers")
}
