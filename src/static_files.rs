use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::DevProxyError;
use crate::proxy::handler::{error_response, status_response};

const INDEX_FILE: &str = "index.html";

/// Serves requests that no proxy rule claims.
///
/// With a static directory configured, files are read from it; otherwise every
/// request is answered with `404 Not Found`.
#[derive(Debug, Clone)]
pub struct LocalHandler {
    root: Option<PathBuf>,
}

impl LocalHandler {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub async fn serve(&self, req: Request<Body>) -> Response<Body> {
        let Some(root) = &self.root else {
            return status_response(StatusCode::NOT_FOUND);
        };

        let method = req.method();
        if *method != Method::GET && *method != Method::HEAD {
            let mut response = status_response(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let file = match resolve(root, req.uri().path()) {
            Ok(file) => file,
            Err(status) => return status_response(status),
        };

        let file = match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_dir() => file.join(INDEX_FILE),
            _ => file,
        };

        match tokio::fs::read(&file).await {
            Ok(contents) => {
                debug!(file = %file.display(), bytes = contents.len(), "Serving static file");
                file_response(&file, contents, *method == Method::HEAD)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => status_response(StatusCode::NOT_FOUND),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Failed to read static file");
                error_response(&DevProxyError::io(e.to_string()))
            }
        }
    }
}

/// Map a request path onto the static root. Traversal outside it is refused.
fn resolve(root: &Path, request_path: &str) -> Result<PathBuf, StatusCode> {
    let decoded = urlencoding::decode(request_path).map_err(|_| StatusCode::BAD_REQUEST)?;

    let mut file = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(StatusCode::FORBIDDEN),
            s if s.contains('\\') || s.contains('\0') => return Err(StatusCode::FORBIDDEN),
            s => file.push(s),
        }
    }
    Ok(file)
}

fn file_response(file: &Path, contents: Vec<u8>, head_only: bool) -> Response<Body> {
    let mime = mime_guess::from_path(file).first_or_octet_stream();
    let length = contents.len();
    let body = if head_only {
        Body::empty()
    } else {
        Body::from(contents)
    };

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::create_dir(dir.path().join("static")).unwrap();
        std::fs::write(dir.path().join("static/app.js"), "console.log(1)").unwrap();
        std::fs::write(dir.path().join("static/my file.css"), "body{}").unwrap();
        dir
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_string(res: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_file_with_content_type() {
        let dir = site();
        let handler = LocalHandler::new(Some(dir.path().to_path_buf()));

        let res = handler.serve(get("/static/app.js")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .contains("javascript"));
        assert_eq!(body_string(res).await, "console.log(1)");
    }

    #[tokio::test]
    async fn test_directory_serves_index() {
        let dir = site();
        let handler = LocalHandler::new(Some(dir.path().to_path_buf()));

        let res = handler.serve(get("/")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/html");
        assert_eq!(body_string(res).await, "<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_percent_encoded_path() {
        let dir = site();
        let handler = LocalHandler::new(Some(dir.path().to_path_buf()));

        let res = handler.serve(get("/static/my%20file.css")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_file_and_traversal() {
        let dir = site();
        let handler = LocalHandler::new(Some(dir.path().to_path_buf()));

        let res = handler.serve(get("/nope.js")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = handler.serve(get("/static/../../etc/passwd")).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = handler.serve(get("/%2e%2e/secret")).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_head_and_method_handling() {
        let dir = site();
        let handler = LocalHandler::new(Some(dir.path().to_path_buf()));

        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/static/app.js")
            .body(Body::empty())
            .unwrap();
        let res = handler.serve(req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_LENGTH], "14");
        assert_eq!(body_string(res).await, "");

        let req = Request::builder()
            .method(Method::POST)
            .uri("/static/app.js")
            .body(Body::empty())
            .unwrap();
        let res = handler.serve(req).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_without_root_everything_is_not_found() {
        let handler = LocalHandler::new(None);
        let res = handler.serve(get("/index.html")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
