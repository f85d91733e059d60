use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

/// Home page with the shorten form
pub async fn serve_index() -> Response {
    serve_embedded("index.html")
}

pub async fn serve_favicon() -> Response {
    serve_embedded("favicon.svg")
}

/// Serve a file from the embedded assets
pub fn serve_embedded(path: &str) -> Response {
    match Assets::get(path) {
        Some(content) => {
            let mime = from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// The not-found page for an unknown short code
pub fn render_not_found(short_code: &str) -> Response {
    let body = Assets::get("404.html")
        .map(|content| String::from_utf8_lossy(&content.data).into_owned())
        .unwrap_or_else(|| "Short link not found: {{short_code}}".to_string())
        .replace("{{short_code}}", &escape_html(short_code));

    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert_eq!(escape_html("abc123"), "abc123");
    }

    #[tokio::test]
    async fn test_not_found_page_escapes_code() {
        let response = render_not_found("<b>x</b>");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(!html.contains("<b>x</b>"));
    }

    #[test]
    fn test_embedded_assets_present() {
        for name in ["index.html", "404.html", "favicon.svg"] {
            assert!(Assets::get(name).is_some(), "missing asset {name}");
        }
    }
}
