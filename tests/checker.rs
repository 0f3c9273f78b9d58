#![cfg(unix)]

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use synprobe::{CheckError, Checker, Network, Options};

const ADDR_DEAD: &str = "127.0.0.1:1";

/// Candidate non-routable addresses. Environments differ, so the tests that
/// need a SYN black hole pick whichever candidate actually behaves like one
/// and bail out when none does.
const TIMEOUT_CANDIDATES: [&str; 2] = ["10.255.255.1:80", "10.0.0.0:1"];

fn timeout_addr() -> Option<&'static str> {
    for addr in TIMEOUT_CANDIDATES {
        let parsed = addr.parse().unwrap();
        match std::net::TcpStream::connect_timeout(&parsed, Duration::from_millis(50)) {
            Ok(_) => continue,
            Err(err) if err.kind() == ErrorKind::TimedOut => return Some(addr),
            Err(_) => continue,
        }
    }
    None
}

async fn start(checker: &Arc<Checker>) -> (watch::Sender<()>, JoinHandle<Result<(), CheckError>>) {
    let (stop, stop_rx) = watch::channel(());
    let looper = checker.clone();
    let handle = tokio::spawn(async move { looper.run(stop_rx).await });
    checker.wait_ready().await;
    (stop, handle)
}

#[tokio::test(flavor = "multi_thread")]
async fn loop_starts_stops_and_restarts() {
    let checker = Arc::new(Checker::new());
    assert!(!checker.is_ready());

    let (stop, handle) = start(&checker).await;
    assert!(checker.is_ready());

    stop.send(()).unwrap();
    assert_eq!(handle.await.unwrap(), Ok(()));
    assert!(!checker.is_ready());

    // A stopped checker starts again cleanly; a dropped sender also stops it.
    let (stop, handle) = start(&checker).await;
    assert!(checker.is_ready());
    drop(stop);
    assert_eq!(handle.await.unwrap(), Ok(()));
    assert!(!checker.is_ready());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_loop_fails_already_started() {
    let checker = Arc::new(Checker::new());
    let (stop, handle) = start(&checker).await;

    let (_unused_stop, second_rx) = watch::channel(());
    let err = checker.run(second_rx).await.unwrap_err();
    assert_eq!(err, CheckError::AlreadyStarted);

    // The live loop is untouched by the failed start.
    assert!(checker.is_ready());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    assert_eq!(checker.check(&addr, Duration::from_secs(2)).await, Ok(()));

    drop(stop);
    let _ = handle.await;
}

#[tokio::test(flavor = "multi_thread")]
async fn listening_port_checks_ok() {
    let checker = Arc::new(Checker::new());
    let (_stop, _handle) = start(&checker).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    assert_eq!(checker.check(&addr, Duration::from_secs(2)).await, Ok(()));
}

#[tokio::test(flavor = "multi_thread")]
async fn dead_port_is_connection_refused() {
    let checker = Arc::new(Checker::new());
    let (_stop, _handle) = start(&checker).await;

    let err = checker
        .check(ADDR_DEAD, Duration::from_secs(2))
        .await
        .unwrap_err();
    assert_eq!(err.connect_errno(), Some(libc::ECONNREFUSED));
}

#[tokio::test(flavor = "multi_thread")]
async fn unroutable_address_times_out() {
    let Some(addr) = timeout_addr() else {
        return;
    };
    let checker = Arc::new(Checker::new());
    let (_stop, _handle) = start(&checker).await;

    let started = Instant::now();
    let err = checker
        .check(addr, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    // Deadline honored with only bounded slack.
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_timeout_returns_timeout_immediately() {
    let Some(addr) = timeout_addr() else {
        return;
    };
    let checker = Arc::new(Checker::new());
    let (_stop, _handle) = start(&checker).await;

    let started = Instant::now();
    let err = checker.check(addr, Duration::ZERO).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test(flavor = "multi_thread")]
async fn v6_only_address_with_tcp4_is_invalid() {
    let checker = Arc::new(Checker::new());
    let (_stop, _handle) = start(&checker).await;

    let opts = Options::default()
        .with_timeout(Duration::from_secs(2))
        .with_network(Network::Tcp4);
    let err = checker
        .check_with_options("[::1]:9001", &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::InvalidAddress(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_probes_all_time_out() {
    let Some(addr) = timeout_addr() else {
        return;
    };
    let checker = Arc::new(Checker::new());
    let (_stop, _handle) = start(&checker).await;

    let started = Instant::now();
    let mut probes = Vec::new();
    for _ in 0..256 {
        let checker = checker.clone();
        probes.push(tokio::spawn(async move {
            checker.check(addr, Duration::from_millis(100)).await
        }));
    }
    for probe in probes {
        let result = probe.await.unwrap();
        assert!(result.unwrap_err().is_timeout());
    }
    // All probes shared one deadline, so the whole batch settles together.
    assert!(started.elapsed() < Duration::from_secs(5));
}

