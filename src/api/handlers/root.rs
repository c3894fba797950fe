use axum::response::IntoResponse;

/// Root responder so probes against `/` get something friendly.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " - ", env!("CARGO_PKG_DESCRIPTION"))
}
