//! The upload page.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Serve the single-page upload form.
///
/// Pure function of static content: the document is compiled into the
/// binary. Drag-and-drop preview, the theme toggle, and the streamed result
/// display are all client-side behaviors inside the page itself.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
