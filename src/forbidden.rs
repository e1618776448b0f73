use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

const FORBIDDEN_PAGE: &str = "forbidden.html";

/// The opaque 403 page returned for every rejected request.
pub fn forbidden_response() -> Response {
    match Assets::get(FORBIDDEN_PAGE) {
        Some(content) => {
            let mime = mime_guess::from_path(FORBIDDEN_PAGE).first_or_octet_stream();
            (
                StatusCode::FORBIDDEN,
                [(header::CONTENT_TYPE, mime.to_string())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
    }
}
