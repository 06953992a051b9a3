//! End-to-end daemon tests: a real listener, real sockets, and an
//! instrumented backend.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use rigkit::{Phase, Rig, Vfo};
use rigkit_test_harness::{StubBackend, StubStats};
use rigkitd::server::{Server, SharedRig};
use rigkitd::settings::Settings;

struct Daemon {
    addr: SocketAddr,
    shared: Arc<SharedRig>,
    stats: Arc<StubStats>,
    _cancel: CancellationToken,
}

async fn spawn_daemon(settings: Settings) -> Daemon {
    spawn_daemon_with(settings, Duration::ZERO, |_| {}).await
}

async fn spawn_daemon_with(
    settings: Settings,
    dispatch_delay: Duration,
    tune: impl FnOnce(&mut Rig),
) -> Daemon {
    let (backend, stats) = StubBackend::with_dispatch_delay(dispatch_delay);
    let mut rig = Rig::new(StubBackend::caps(), Box::new(backend));
    rig.init().await.unwrap();
    rig.open().await.unwrap();
    tune(&mut rig);

    let shared = SharedRig::new(rig, settings);
    let server = Server::bind(&["127.0.0.1:0".to_string()], shared.clone())
        .await
        .unwrap();
    let addr = server.local_addrs()[0];
    let cancel = CancellationToken::new();
    tokio::spawn(server.run(cancel.clone()));

    Daemon {
        addr,
        shared,
        stats,
        _cancel: cancel,
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Client {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, cmd: &str) {
        self.writer
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.unwrap();
        assert!(n > 0, "server closed the connection unexpectedly");
        line.trim_end().to_string()
    }

    async fn recv_eof(&mut self) -> bool {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap() == 0
    }

    async fn roundtrip(&mut self, cmd: &str) -> String {
        self.send(cmd).await;
        self.recv().await
    }
}

#[tokio::test]
async fn set_freq_is_acknowledged_and_write_through() {
    let daemon = spawn_daemon(Settings::default()).await;
    let mut client = Client::connect(daemon.addr).await;

    assert_eq!(client.roundtrip("F 14074000").await, "RPRT 0");
    assert_eq!(client.roundtrip("f").await, "14074000");

    // The read was served from the write-through cache.
    assert_eq!(daemon.stats.get_freq_calls.load(Ordering::SeqCst), 0);
    assert_eq!(daemon.stats.set_freq_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_cache_dispatches_exactly_once() {
    // Caching disabled: every f goes to the backend.
    let daemon = spawn_daemon_with(Settings::default(), Duration::ZERO, |rig| {
        rig.set_cache_timeout_all(0);
    })
    .await;
    let mut client = Client::connect(daemon.addr).await;

    assert_eq!(client.roundtrip("f").await, "14074000");
    assert_eq!(client.roundtrip("f").await, "14074000");
    assert_eq!(daemon.stats.get_freq_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn malformed_command_is_soft() {
    let daemon = spawn_daemon(Settings::default()).await;
    let mut client = Client::connect(daemon.addr).await;

    assert_eq!(client.roundtrip("F notanumber").await, "RPRT -1");
    assert_eq!(client.roundtrip("\\warp_ten").await, "RPRT -1");
    // Connection stays open and usable.
    assert_eq!(client.roundtrip("f").await, "14074000");
    // Soft errors never touch the device.
    assert_eq!(daemon.stats.set_freq_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsupported_operation_reports_not_implemented() {
    let daemon = spawn_daemon(Settings::default()).await;
    let mut client = Client::connect(daemon.addr).await;

    // The stub capability table has no RIT.
    assert_eq!(client.roundtrip("J 100").await, "RPRT -4");
}

#[tokio::test]
async fn multi_line_queries() {
    let daemon = spawn_daemon(Settings::default()).await;
    let mut client = Client::connect(daemon.addr).await;

    assert_eq!(client.roundtrip("M CW 500").await, "RPRT 0");
    client.send("m").await;
    assert_eq!(client.recv().await, "CW");
    assert_eq!(client.recv().await, "500");

    assert_eq!(client.roundtrip("S 1 VFOB").await, "RPRT 0");
    client.send("s").await;
    assert_eq!(client.recv().await, "1");
    assert_eq!(client.recv().await, "VFOB");
}

#[tokio::test]
async fn quit_closes_the_session() {
    let daemon = spawn_daemon(Settings::default()).await;
    let mut client = Client::connect(daemon.addr).await;

    assert_eq!(client.roundtrip("q").await, "RPRT 0");
    assert!(client.recv_eof().await);
}

#[tokio::test]
async fn chk_vfo_and_dump_state_handshake() {
    let daemon = spawn_daemon(Settings {
        vfo_mode: true,
        ..Settings::default()
    })
    .await;
    let mut client = Client::connect(daemon.addr).await;

    assert_eq!(client.roundtrip("\\chk_vfo").await, "CHKVFO 1");

    client.send("\\dump_state").await;
    let first = client.recv().await;
    assert_eq!(first, "1", "protocol version line");
    // Consume through the extension terminator.
    let mut saw_timeout_key = false;
    loop {
        let line = client.recv().await;
        if line.starts_with("timeout=") {
            saw_timeout_key = true;
        }
        if line == "done" {
            break;
        }
    }
    assert!(saw_timeout_key);

    // VFO-qualified commands now work.
    assert_eq!(client.roundtrip("F VFOB 7040000").await, "RPRT 0");
    assert_eq!(client.roundtrip("f VFOB").await, "7040000");
}

#[tokio::test]
async fn overlapping_clients_never_interleave_dispatches() {
    let daemon =
        spawn_daemon_with(Settings::default(), Duration::from_millis(30), |_| {}).await;

    let addr = daemon.addr;
    let a = tokio::spawn(async move {
        let mut client = Client::connect(addr).await;
        for i in 0..5u64 {
            let reply = client.roundtrip(&format!("F {}", 14_000_000 + i)).await;
            assert_eq!(reply, "RPRT 0");
        }
    });
    let b = tokio::spawn(async move {
        let mut client = Client::connect(addr).await;
        for i in 0..5u64 {
            let reply = client.roundtrip(&format!("F {}", 7_000_000 + i)).await;
            assert_eq!(reply, "RPRT 0");
        }
    });
    a.await.unwrap();
    b.await.unwrap();

    assert!(
        !daemon.stats.overlap_detected.load(Ordering::SeqCst),
        "two dispatch transactions overlapped"
    );
    assert_eq!(daemon.stats.set_freq_calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn hard_error_triggers_reopen_and_single_retry() {
    let daemon = spawn_daemon(Settings {
        reopen_retries: 3,
        reopen_backoff: Duration::from_millis(10),
        ..Settings::default()
    })
    .await;
    let mut client = Client::connect(daemon.addr).await;

    daemon.stats.fail_dispatches(1);
    assert_eq!(client.roundtrip("F 7000000").await, "RPRT 0");

    // One reopen on top of the initial open, and the original command
    // retried exactly once.
    assert_eq!(daemon.stats.open_calls.load(Ordering::SeqCst), 2);
    assert_eq!(daemon.stats.set_freq_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn reopen_exhaustion_surfaces_the_original_error() {
    let daemon = spawn_daemon(Settings {
        reopen_retries: 3,
        reopen_backoff: Duration::from_millis(10),
        ..Settings::default()
    })
    .await;
    let mut client = Client::connect(daemon.addr).await;

    daemon.stats.fail_dispatches(1);
    daemon.stats.fail_opens(3);
    assert_eq!(client.roundtrip("F 7000000").await, "RPRT -6");

    // Exactly N reopen attempts on top of the initial open.
    assert_eq!(daemon.stats.open_calls.load(Ordering::SeqCst), 4);
    // The command itself ran only once.
    assert_eq!(daemon.stats.set_freq_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn password_gates_everything_but_auth() {
    let daemon = spawn_daemon(Settings {
        password: Some("tango".into()),
        ..Settings::default()
    })
    .await;
    let mut client = Client::connect(daemon.addr).await;

    assert_eq!(client.roundtrip("f").await, "RPRT -9");
    // Even the handshake is gated.
    assert_eq!(client.roundtrip("\\chk_vfo").await, "RPRT -9");
    assert_eq!(client.roundtrip("\\password wrong").await, "RPRT -9");
    assert_eq!(client.roundtrip("f").await, "RPRT -9");
    assert_eq!(client.roundtrip("\\password tango").await, "RPRT 0");
    assert_eq!(client.roundtrip("\\chk_vfo").await, "CHKVFO 0");
    assert_eq!(client.roundtrip("f").await, "14074000");
}

#[tokio::test]
async fn netrig_client_authenticates_through_the_gate() {
    let daemon = spawn_daemon(Settings {
        password: Some("tango".into()),
        ..Settings::default()
    })
    .await;

    let netrig = rigkit::netrig::NetRig::new(&daemon.addr.to_string()).password("tango");
    let mut rig = Rig::new(rigkit::netrig::netrig_caps(), Box::new(netrig));
    rig.init().await.unwrap();
    rig.open().await.unwrap();
    assert_eq!(rig.get_freq(Vfo::A).await.unwrap(), 14_074_000);
}

#[tokio::test]
async fn idle_close_and_transparent_reopen() {
    let daemon = spawn_daemon(Settings {
        close_on_idle: true,
        ..Settings::default()
    })
    .await;

    {
        let mut client = Client::connect(daemon.addr).await;
        assert_eq!(client.roundtrip("f").await, "14074000");
        assert_eq!(client.roundtrip("q").await, "RPRT 0");
    }

    // Wait for the session task to run the idle-close path.
    let mut closed = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if daemon.shared.lock_rig().await.phase() == Phase::Closed {
            closed = true;
            break;
        }
    }
    assert!(closed, "device was not closed when idle");
    assert_eq!(daemon.stats.close_calls.load(Ordering::SeqCst), 1);

    // The next connection's first command reopens transparently.
    let mut client = Client::connect(daemon.addr).await;
    assert_eq!(client.roundtrip("f").await, "14074000");
    assert_eq!(daemon.stats.open_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn netrig_client_full_loop() {
    // A complete stack: Rig -> NetRig -> TCP -> daemon -> Rig -> stub.
    let daemon = spawn_daemon(Settings {
        vfo_mode: true,
        ..Settings::default()
    })
    .await;

    let netrig = rigkit::netrig::NetRig::new(&daemon.addr.to_string())
        .timeout(Duration::from_millis(2_000));
    let mut rig = Rig::new(rigkit::netrig::netrig_caps(), Box::new(netrig));
    rig.init().await.unwrap();
    rig.open().await.unwrap();

    rig.set_freq(Vfo::A, 14_074_000).await.unwrap();
    assert_eq!(rig.get_freq(Vfo::A).await.unwrap(), 14_074_000);

    rig.set_mode(Vfo::A, rigkit::Mode::CW, Some(500)).await.unwrap();
    assert_eq!(
        rig.get_mode(Vfo::A).await.unwrap(),
        (rigkit::Mode::CW, 500)
    );

    rig.close().await.unwrap();
    rig.cleanup().await.unwrap();

    // The daemon really dispatched the set to its backend.
    assert_eq!(daemon.stats.set_freq_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn telemetry_publisher_emits_snapshots_and_events() {
    use rigkitd::publisher::{self, PublisherConfig};

    let daemon = spawn_daemon(Settings::default()).await;

    // A plain UDP receiver stands in for a multicast group member.
    let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = receiver.local_addr().unwrap();

    let events = daemon.shared.lock_rig().await.subscribe();
    let cancel = CancellationToken::new();
    tokio::spawn(publisher::run(
        daemon.shared.clone(),
        events,
        PublisherConfig {
            target,
            interval: Duration::from_millis(50),
            ttl: 1,
        },
        cancel.clone(),
    ));

    // Drive a change through the wire so a transceive packet fires too.
    let mut client = Client::connect(daemon.addr).await;
    assert_eq!(client.roundtrip("F 14074000").await, "RPRT 0");

    let mut saw_snapshot = false;
    let mut saw_transceive = false;
    let mut buf = [0u8; 2048];
    for _ in 0..40 {
        let Ok(Ok((n, _))) = tokio::time::timeout(
            Duration::from_millis(200),
            receiver.recv_from(&mut buf),
        )
        .await
        else {
            continue;
        };
        let text = String::from_utf8_lossy(&buf[..n]);
        if text.contains("\"type\":\"snapshot\"") {
            saw_snapshot = true;
        }
        if text.contains("\"type\":\"transceive\"") {
            saw_transceive = true;
        }
        if saw_snapshot && saw_transceive {
            break;
        }
    }
    cancel.cancel();

    assert!(saw_snapshot, "no snapshot packet observed");
    assert!(saw_transceive, "no transceive packet observed");
}
