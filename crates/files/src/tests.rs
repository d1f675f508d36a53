//! Tests for the HTTP content store against a one-shot local server.

#[cfg(test)]
mod integration_tests {
    use crate::http::HttpContentStore;
    use crate::store::{ContentStore, StoreError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one request, record it, and answer with `status` and `body`.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            let header_end = loop {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    break request.len();
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = find(&request, b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&request[..header_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            while request.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.expect("read body");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{addr}"), handle)
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }

    #[tokio::test]
    async fn add_returns_hash_field() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"Name":"upload","Hash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","Size":"14"}"#,
        )
        .await;

        let store = HttpContentStore::new(url);
        let address = store.put(b"Hello, HashVault").await.expect("put succeeds");
        assert_eq!(
            address.as_str(),
            "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"
        );
        assert!(address.is_cid_v0());

        let request = server.await.expect("server task");
        assert!(request.starts_with("POST /api/v0/add?pin=true"));
        assert!(request.contains("name=\"file\""));
        assert!(request.contains("Hello, HashVault"));
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"Message":"repo locked"}"#).await;

        let store = HttpContentStore::new(url);
        let err = store.put(b"bytes").await.unwrap_err();
        match err {
            StoreError::Server { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("repo locked"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn missing_hash_is_malformed() {
        let (url, server) = serve_once("200 OK", r#"{"Name":"upload"}"#).await;

        let store = HttpContentStore::new(url);
        let err = store.put(b"bytes").await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse(_)));
        server.await.expect("server task");
    }
}
