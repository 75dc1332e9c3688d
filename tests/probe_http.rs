use std::net::TcpListener as StdTcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use arena_kiosk::config::{Endpoint, EndpointKind};
use arena_kiosk::probe::{BlockingProbeHttp, EndpointProber, ProbeHttp};
use arena_kiosk::resolve::{DisplayIdSource, Resolver, ThreadPacer};
use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::get;

fn spawn_server(app: Router) -> String {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("tokio runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind test server");
            tx.send(listener.local_addr().expect("local addr"))
                .expect("send addr");
            let _ = axum::serve(listener, app).await;
        });
    });
    let addr = rx.recv().expect("server address");
    format!("http://{}:{}", addr.ip(), addr.port())
}

fn arena_server() -> String {
    let app = Router::new()
        .route(
            "/display",
            get(|| async {
                (
                    StatusCode::FOUND,
                    [(header::LOCATION, "/landing?displayId=5&nickname=")],
                )
            }),
        )
        .route("/landing", get(|| async { "display page" }))
        .route(
            "/moved",
            get(|| async {
                (
                    StatusCode::MOVED_PERMANENTLY,
                    [(header::LOCATION, "/landing?displayId=6")],
                )
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                (
                    StatusCode::FOUND,
                    [(header::LOCATION, "/landing?displayId=8")],
                )
            }),
        );
    spawn_server(app)
}

fn unused_port_url() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}:{}/display?displayId=", addr.ip(), addr.port())
}

#[test]
fn redirect_is_not_followed() {
    let base = arena_server();
    let http = BlockingProbeHttp::new(Duration::from_secs(5)).expect("client");

    let response = http
        .get(&format!("{base}/display?displayId="))
        .expect("probe response");
    assert_eq!(response.status, 302);
    assert_eq!(
        response.location.as_deref(),
        Some("/landing?displayId=5&nickname=")
    );

    let prober = EndpointProber::new(http);
    assert_eq!(
        prober
            .try_get_display_id(&format!("{base}/display?displayId="))
            .as_deref(),
        Some("5")
    );
}

#[test]
fn other_statuses_and_timeouts_yield_nothing() {
    let base = arena_server();
    let prober =
        EndpointProber::new(BlockingProbeHttp::new(Duration::from_millis(500)).expect("client"));

    assert_eq!(prober.try_get_display_id(&format!("{base}/landing")), None);
    assert_eq!(prober.try_get_display_id(&format!("{base}/moved")), None);
    assert_eq!(prober.try_get_display_id(&format!("{base}/slow")), None);
    assert_eq!(prober.try_get_display_id(&unused_port_url()), None);
}

#[test]
fn resolver_falls_back_to_remote_server() {
    let base = arena_server();
    let dir = tempfile::tempdir().expect("tempdir");
    let endpoints = [
        Endpoint::new(EndpointKind::Local, unused_port_url()),
        Endpoint::new(EndpointKind::Remote, format!("{base}/display?displayId=")),
    ];
    let resolver = Resolver::new(
        EndpointProber::new(BlockingProbeHttp::new(Duration::from_secs(2)).expect("client")),
        ThreadPacer,
        endpoints,
        Duration::from_millis(10),
        dir.path().join("display_id"),
    );

    let resolution = resolver.resolve();
    assert_eq!(resolution.endpoint.kind, EndpointKind::Remote);
    assert_eq!(resolution.display_id, "5");
    assert_eq!(resolution.source, DisplayIdSource::Suggested);
    assert_eq!(
        resolution.display_url(),
        format!("{base}/display?displayId=5")
    );
}
