// Lives in its own test binary: counting /proc/self/fd is only meaningful
// when no sibling test is opening sockets in parallel.
#![cfg(target_os = "linux")]

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;

use synprobe::Checker;

fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

#[tokio::test(flavor = "multi_thread")]
async fn probes_leak_no_file_descriptors() {
    let checker = Arc::new(Checker::new());
    let (_stop, stop_rx) = watch::channel(());
    let looper = checker.clone();
    let _handle = tokio::spawn(async move { looper.run(stop_rx).await });
    checker.wait_ready().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let alive = listener.local_addr().unwrap().to_string();

    // Warm up lazily-created runtime descriptors before the baseline.
    let _ = checker.check(&alive, Duration::from_secs(1)).await;
    let _ = checker.check("127.0.0.1:1", Duration::from_secs(1)).await;
    let baseline = open_fds();

    for _ in 0..25 {
        assert_eq!(checker.check(&alive, Duration::from_secs(1)).await, Ok(()));
        assert!(checker
            .check("127.0.0.1:1", Duration::from_secs(1))
            .await
            .is_err());
    }

    assert_eq!(open_fds(), baseline);
}
