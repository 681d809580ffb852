use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// JSON body extractor that never rejects.
///
/// Webhook senders are sloppy about content types and empty bodies, so a body
/// that cannot be read or parsed becomes `T::default()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientJson<T>(pub T);

impl<S, T> FromRequest<S> for LenientJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = match Bytes::from_request(req, state).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "unreadable request body");
                return Ok(Self(T::default()));
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Self(value)),
            Err(e) => {
                warn!(error = %e, "ignoring request body that does not match the expected shape");
                Ok(Self(T::default()))
            }
        }
    }
}
