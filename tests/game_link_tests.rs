//! Game link integration tests
//!
//! Drives the sync loop over real loopback TCP against a stub game.

use std::time::Duration;

use am2r_connector::link::{Fault, Status, TcpTransport};
use am2r_connector::sync::{SampleItems, SyncConfig, SyncEvent, SyncLoop};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

const EXPECTED_REQUEST: &str = "{\"items\":[800,500,300]}";

async fn stub_game() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn sync_config(port: u16) -> SyncConfig {
    SyncConfig {
        port,
        dial_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        retry_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

/// Answer one request per reply on a single connection, then drop it.
/// Stops early when the connector hangs up.
async fn serve(stream: TcpStream, replies: impl IntoIterator<Item = &'static str>) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    for reply in replies {
        let Ok(Some(request)) = lines.next_line().await else {
            return;
        };
        assert_eq!(request, EXPECTED_REQUEST);
        if write.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
            return;
        }
    }
}

#[tokio::test]
async fn test_full_cycle_over_tcp() {
    let (listener, port) = stub_game().await;
    let game = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve(stream, vec![r#"{"Name":"Samus","Health":99}"#; 2]).await;
    });

    let mut sync = SyncLoop::new(sync_config(port), TcpTransport, SampleItems::default());
    let mut events = sync.subscribe();

    sync.run_iteration().await.unwrap();
    assert_eq!(sync.current_status(), Status::TentativelyConnected);

    sync.run_iteration().await.unwrap();
    assert_eq!(sync.current_status(), Status::Connected);

    sync.run_iteration().await.unwrap();
    assert_eq!(sync.current_status(), Status::Connected);
    game.await.unwrap();

    let mut responses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::Response(response) = event {
            responses.push(response);
        }
    }
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].name, "Samus");
    assert_eq!(responses[0].fields["Health"], 99);
}

#[tokio::test]
async fn test_malformed_first_response() {
    let (listener, port) = stub_game().await;
    let game = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve(stream, vec!["this is not json"]).await;
    });

    let mut sync = SyncLoop::new(sync_config(port), TcpTransport, SampleItems::default());
    sync.run_iteration().await.unwrap();

    assert_eq!(sync.run_iteration().await, Err(Fault::MalformedFrame));
    assert_eq!(
        sync.current_status(),
        Status::ReconnectingAfterTentativeFailure(Fault::MalformedFrame)
    );
    game.await.unwrap();
}

#[tokio::test]
async fn test_game_restart_heals_link() {
    let (listener, port) = stub_game().await;
    let game = tokio::spawn(async move {
        // First game instance answers once and exits
        let (stream, _) = listener.accept().await.unwrap();
        serve(stream, vec![r#"{"Name":"Samus"}"#]).await;

        // Restarted game answers normally
        let (stream, _) = listener.accept().await.unwrap();
        serve(stream, vec![r#"{"Name":"Samus"}"#; 2]).await;
    });

    let mut sync = SyncLoop::new(sync_config(port), TcpTransport, SampleItems::default());
    sync.run_iteration().await.unwrap();
    sync.run_iteration().await.unwrap();
    assert_eq!(sync.current_status(), Status::Connected);

    assert_eq!(sync.run_iteration().await, Err(Fault::ConnectionReset));
    assert_eq!(sync.current_status(), Status::ConnectionReset);

    sync.run_iteration().await.unwrap();
    assert_eq!(sync.current_status(), Status::TentativelyConnected);
    sync.run_iteration().await.unwrap();
    assert_eq!(sync.current_status(), Status::Connected);

    // Hang up so the restarted game sees EOF
    drop(sync);
    tokio::time::timeout(Duration::from_secs(5), game)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_refused_until_game_starts() {
    let (listener, port) = stub_game().await;
    drop(listener);

    let mut sync = SyncLoop::new(sync_config(port), TcpTransport, SampleItems::default());
    assert_eq!(sync.run_iteration().await, Err(Fault::DialRefused));
    assert_eq!(sync.current_status(), Status::DialRefused);

    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let game = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve(stream, vec![r#"{"Name":"Samus"}"#]).await;
    });

    sync.run_iteration().await.unwrap();
    sync.run_iteration().await.unwrap();
    assert_eq!(sync.current_status(), Status::Connected);
    game.await.unwrap();
}

#[tokio::test]
async fn test_run_until_cancelled() {
    let (listener, port) = stub_game().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve(stream, std::iter::repeat(r#"{"Name":"Samus"}"#)).await;
    });

    let sync = SyncLoop::new(sync_config(port), TcpTransport, SampleItems::default());
    let status = sync.status_handle();
    let token = CancellationToken::new();
    let task = tokio::spawn(sync.run(token.clone()));

    tokio::time::timeout(Duration::from_secs(5), async {
        while status.get() != Status::Connected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    token.cancel();
    let final_status = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(final_status, Status::Connected | Status::ConnectionReset));
}
