use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use ibz_core::{BoundedStageQueue, FanOutSplitter, IbzError, StageQueue, TryEnqueueError};

fn gated_splitter(
    width: usize,
    capacity: usize,
) -> Result<(FanOutSplitter<u32>, crossbeam_channel::Sender<()>), IbzError> {
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<()>();
    let splitter = FanOutSplitter::spawn(
        "gated",
        width,
        capacity,
        |_| {
            let gate = gate_rx.clone();
            move |_: u32| {
                let _ = gate.recv();
                Ok(None)
            }
        },
        None,
        None,
    )?;
    Ok((splitter, gate_tx))
}

#[test]
fn empty_splitter_is_rejected() {
    let splitter = FanOutSplitter::<u32>::new(Vec::new());
    assert!(matches!(splitter, Err(IbzError::InvalidArgument(_))));
}

#[test]
fn admits_width_times_capacity_items() -> Result<(), Box<dyn std::error::Error>> {
    let (splitter, gate_tx) = gated_splitter(3, 2)?;

    for item in 0..6 {
        assert!(splitter.try_enqueue(item).is_ok(), "item {item} rejected");
    }
    assert!(!splitter.ready_to_enqueue());
    assert!(matches!(splitter.try_enqueue(6), Err(TryEnqueueError::Full(6))));

    drop(gate_tx);
    splitter.shutdown();

    let completed: usize = splitter
        .runtime_snapshot()
        .iter()
        .map(|stage| stage.items_completed)
        .sum();
    assert_eq!(completed, 6);
    Ok(())
}

#[test]
fn distributes_round_robin() -> Result<(), Box<dyn std::error::Error>> {
    let splitter = FanOutSplitter::spawn("even", 4, 16, |_| |_: u32| Ok(None), None, None)?;

    for item in 0..8 {
        assert!(splitter.try_enqueue(item).is_ok());
    }
    splitter.shutdown();

    let snapshots = splitter.runtime_snapshot();
    assert_eq!(snapshots.len(), 4);
    for snapshot in &snapshots {
        assert_eq!(snapshot.items_completed, 2, "{}", snapshot.name);
    }
    assert_eq!(snapshots[0].name, "even-0");
    Ok(())
}

#[test]
fn cancelled_sub_queue_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executed);
    let splitter = FanOutSplitter::spawn(
        "partial",
        3,
        2,
        move |_| {
            let counter = Arc::clone(&counter);
            move |_: u32| {
                counter.fetch_add(1, Ordering::AcqRel);
                Ok(None)
            }
        },
        None,
        None,
    )?;

    splitter.queues()[0].cancel();
    assert!(splitter.is_running());

    for item in 0..30 {
        splitter.enqueue(item)?;
    }
    splitter.shutdown();

    assert_eq!(executed.load(Ordering::Acquire), 30);
    let snapshots = splitter.runtime_snapshot();
    assert_eq!(snapshots[0].items_completed, 0);
    Ok(())
}

#[test]
fn cancelling_every_sub_queue_stops_admission() -> Result<(), Box<dyn std::error::Error>> {
    let (splitter, gate_tx) = gated_splitter(2, 1)?;
    splitter.try_enqueue(1).map_err(|_| "first admission rejected")?;
    splitter.try_enqueue(2).map_err(|_| "second admission rejected")?;

    splitter.cancel();
    assert!(!splitter.is_running());
    assert!(matches!(splitter.enqueue(3), Err(IbzError::Cancelled)));
    assert!(matches!(splitter.wait_for_ready(), Err(IbzError::Cancelled)));

    drop(gate_tx);
    splitter.shutdown();
    Ok(())
}

#[test]
fn splitter_forwards_to_shared_downstream() -> Result<(), Box<dyn std::error::Error>> {
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    let sink = Arc::new(BoundedStageQueue::spawn(
        "sink",
        4,
        move |_: u32| {
            counter.fetch_add(1, Ordering::AcqRel);
            Ok(None)
        },
        None,
        None,
    )?);

    let downstream: Arc<dyn StageQueue<u32>> = sink.clone();
    let splitter = FanOutSplitter::spawn(
        "square",
        4,
        2,
        |_| |item: u32| Ok(Some(item * item)),
        Some(downstream),
        None,
    )?;

    for item in 0..100 {
        splitter.enqueue(item)?;
    }
    splitter.shutdown();
    sink.shutdown();

    assert_eq!(received.load(Ordering::Acquire), 100);
    Ok(())
}

#[test]
fn cancel_wakes_splitter_readiness_wait() -> Result<(), Box<dyn std::error::Error>> {
    let (splitter, gate_tx) = gated_splitter(2, 1)?;
    splitter.try_enqueue(1).map_err(|_| "first admission rejected")?;
    splitter.try_enqueue(2).map_err(|_| "second admission rejected")?;
    assert!(!splitter.ready_to_enqueue());

    let splitter = Arc::new(splitter);
    let waiter_splitter = Arc::clone(&splitter);
    let waiter = thread::spawn(move || waiter_splitter.wait_for_ready());
    thread::sleep(Duration::from_millis(20));
    assert!(!waiter.is_finished());

    splitter.cancel();
    let woken = waiter.join().map_err(|_| "waiter panicked")?;
    assert!(matches!(woken, Err(IbzError::Cancelled)));

    drop(gate_tx);
    splitter.shutdown();
    Ok(())
}
