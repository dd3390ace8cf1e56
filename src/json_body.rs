//! A JSON body extractor that rejects bad requests with the app's [Error].

use axum::extract::FromRequest;

use crate::Error;

/// Deserializes a JSON request body like [axum::Json].
///
/// A malformed body, a missing field or a wrong content type is answered
/// with 400 and an `{"error": ..}` body instead of axum's plain text 422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct JsonBody<T>(pub T);
