use std::convert::Infallible;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use servez::{Error, PartialConfig, Request, Response, Router, StatusCode, header};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn connect(addr: SocketAddr) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {addr} never came up");
}

/// One request on a fresh connection; reads until the server closes it.
async fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
    let mut stream = connect(addr).await;
    let req = format!(
        "{method} {path} HTTP/1.1\r\nhost: test\r\nconnection: close\r\ncontent-length: {}\r\n\r\n{body}",
        body.len(),
    );
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    // A connection torn down mid-response reads as whatever arrived.
    let _ = stream.read_to_end(&mut raw).await;
    String::from_utf8_lossy(&raw).into_owned()
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    server: JoinHandle<Result<Infallible, Error>>,
}

impl Running {
    async fn stop(self) -> Result<Infallible, Error> {
        self.stop.send(()).unwrap();
        timeout(Duration::from_secs(5), self.server)
            .await
            .expect("server still running after shutdown")
            .unwrap()
    }
}

fn spawn(config: PartialConfig, routes: impl FnOnce(Router) -> Router) -> Running {
    let addr = free_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let router = routes(Router::new(Some(config.addr(addr.to_string()))));
    let server = tokio::spawn(router.start_with_shutdown(async {
        let _ = stopped.await;
    }));
    Running { addr, stop, server }
}

fn items(router: Router) -> Router {
    router
        .get("/items", |_req: Request| async { "all items" })
        .post("/items", |req: Request| async move {
            Response::builder().status(StatusCode::CREATED).text(String::from_utf8_lossy(req.body()))
        })
}

fn stamp(_req: &Request, res: &mut Response) {
    res.headers_mut().insert("x-served-by", header::HeaderValue::from_static("servez"));
}

fn seal(_req: &Request, res: &mut Response) {
    res.headers_mut().insert("x-sealed", header::HeaderValue::from_static("yes"));
}

async fn boom(_req: Request) -> Response {
    panic!("handler failed");
}

#[tokio::test]
async fn serves_registered_routes_until_shutdown() {
    let running = spawn(PartialConfig::new().pre(stamp), items);
    let addr = running.addr;

    let got = send(addr, "GET", "/items", "").await;
    assert!(got.starts_with("HTTP/1.1 200 OK"), "{got}");
    assert!(got.contains("x-served-by: servez"), "{got}");
    assert!(got.ends_with("all items"), "{got}");

    let got = send(addr, "POST", "/items", "widget").await;
    assert!(got.starts_with("HTTP/1.1 201 Created"), "{got}");
    assert!(got.ends_with("widget"), "{got}");

    let got = send(addr, "DELETE", "/items", "").await;
    assert!(got.starts_with("HTTP/1.1 405 Method Not Allowed"), "{got}");
    assert!(got.contains("allow: GET, HEAD, POST"), "{got}");

    let got = send(addr, "GET", "/missing", "").await;
    assert!(got.starts_with("HTTP/1.1 404 Not Found"), "{got}");

    assert!(matches!(running.stop().await, Err(Error::ServerClosed)));
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let running = spawn(PartialConfig::new(), items);

    let mut stream = connect(running.addr).await;
    stream.write_all(b"GET /items HTTP/1.1\r\nhost: test\r\n\r\n").await.unwrap();

    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while !raw.ends_with(b"all items") {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before the response was complete");
        raw.extend_from_slice(&buf[..n]);
    }

    assert!(matches!(running.stop().await, Err(Error::ServerClosed)));

    // The server hung up on the idle client.
    let n = timeout(Duration::from_secs(5), stream.read(&mut buf)).await.unwrap().unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn unknown_method_is_405_with_allow_on_a_known_path() {
    let running = spawn(PartialConfig::new(), items);

    let got = send(running.addr, "PURGE", "/items", "").await;
    assert!(got.starts_with("HTTP/1.1 405 Method Not Allowed"), "{got}");
    assert!(got.contains("allow: GET, HEAD, POST"), "{got}");

    running.stop().await.unwrap_err();
}

#[tokio::test]
async fn unknown_method_is_404_on_an_unknown_path() {
    let running = spawn(PartialConfig::new(), items);

    let got = send(running.addr, "PURGE", "/nowhere", "").await;
    assert!(got.starts_with("HTTP/1.1 404 Not Found"), "{got}");
    assert!(!got.contains("allow:"), "{got}");

    running.stop().await.unwrap_err();
}

#[tokio::test]
async fn head_is_served_by_the_get_route_without_a_body() {
    let running = spawn(PartialConfig::new().pre(stamp), items);

    let got = send(running.addr, "HEAD", "/items", "").await;
    assert!(got.starts_with("HTTP/1.1 200 OK"), "{got}");
    assert!(got.contains("content-type: text/plain; charset=utf-8"), "{got}");
    assert!(got.contains("x-served-by: servez"), "{got}");
    assert!(got.ends_with("\r\n\r\n"), "{got}");

    running.stop().await.unwrap_err();
}

#[tokio::test]
async fn post_middleware_headers_reach_the_wire() {
    let running = spawn(PartialConfig::new().post(seal), items);

    let got = send(running.addr, "POST", "/items", "widget").await;
    assert!(got.starts_with("HTTP/1.1 201 Created"), "{got}");
    assert!(got.contains("x-sealed: yes"), "{got}");

    running.stop().await.unwrap_err();
}

#[tokio::test]
async fn a_panicking_handler_only_takes_down_its_own_connection() {
    let running = spawn(PartialConfig::new(), |router| items(router).get("/boom", boom));

    let got = send(running.addr, "GET", "/boom", "").await;
    assert!(!got.starts_with("HTTP/1.1 200"), "{got}");

    let got = send(running.addr, "GET", "/items", "").await;
    assert!(got.starts_with("HTTP/1.1 200 OK"), "{got}");
    assert!(got.ends_with("all items"), "{got}");

    assert!(matches!(running.stop().await, Err(Error::ServerClosed)));
}

#[tokio::test]
async fn start_reports_an_address_in_use() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap();

    let result = Router::new(Some(PartialConfig::new().addr(addr.to_string()))).start().await;
    match result {
        Err(Error::Io(e)) => assert_eq!(e.kind(), ErrorKind::AddrInUse),
        other => panic!("expected bind failure, got {other:?}"),
    }
}

#[tokio::test]
async fn start_reports_a_malformed_address() {
    let result = Router::new(Some(PartialConfig::new().addr("not an address"))).start().await;
    assert!(matches!(result, Err(Error::Io(_))));
}
