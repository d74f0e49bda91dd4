use super::broadcast::{listener, Listener};
use crate::transport::{SimulatedConfig, SimulatedFailure, SimulatedTransport};
use bit_link_shared::ConnectionSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub(crate) type Updates = UnboundedReceiver<(String, ConnectionSnapshot)>;

/// Simulated transport with a short selection delay
pub(crate) fn fast_transport(failure: Option<SimulatedFailure>) -> Arc<SimulatedTransport> {
    Arc::new(SimulatedTransport::new(SimulatedConfig {
        delay: Duration::from_millis(10),
        available: true,
        failure,
    }))
}

/// Listener that forwards every broadcast into a channel
pub(crate) fn recorder() -> (Listener, Updates) {
    let (tx, rx) = mpsc::unbounded_channel();
    let l = listener(move |label, snapshot| {
        let _ = tx.send((label.to_owned(), snapshot.clone()));
    });
    (l, rx)
}

/// Collect snapshots until one satisfies `done`
pub(crate) async fn wait_for(
    rx: &mut Updates,
    done: impl Fn(&ConnectionSnapshot) -> bool,
) -> Vec<ConnectionSnapshot> {
    let mut seen = Vec::new();
    let collect = async {
        while let Some((_, snapshot)) = rx.recv().await {
            let finished = done(&snapshot);
            seen.push(snapshot);
            if finished {
                return;
            }
        }
        panic!("broadcast channel closed");
    };

    tokio::time::timeout(Duration::from_secs(5), collect)
        .await
        .expect("timed out waiting for connection update");
    seen
}

/// Everything broadcast so far without waiting
pub(crate) fn drain(rx: &mut Updates) -> Vec<ConnectionSnapshot> {
    let mut seen = Vec::new();
    while let Ok((_, snapshot)) = rx.try_recv() {
        seen.push(snapshot);
    }
    seen
}
