//! The six end-to-end scenarios this runtime is built to satisfy, each
//! run against the public API the way a real embedder would use it.
//!
//! Shapes grounded in `examples/original_source/test/cases/*.cpp`: exact
//! byte counts for the pipe round trip, wall-clock tolerance windows for
//! the timer-based scenarios.

use std::cell::Cell;
use std::time::{Duration, Instant as StdInstant};

use signalcoro::io::PipePair;
use signalcoro::prelude::*;

#[test]
fn pure_computation() {
    let mut buf = vec![0u8; 4096];
    let reactor = Reactor::new(&mut buf);

    let task: Fut<'_, i32, Void> = reactor
        .spawn(|_cx: Cx<'_>| async move { Ok(20) })
        .expect("spawn should succeed");

    assert_eq!(task.block_on().unwrap(), 20);
    assert!(!reactor.has_active_tasks());
}

#[test]
fn yield_then_return() {
    let mut buf = vec![0u8; 4096];
    let reactor = Reactor::new(&mut buf);

    let task: Fut<'_, i32, Void> = reactor
        .spawn(|cx: Cx<'_>| async move {
            Yield::new(cx).await;
            Ok(20)
        })
        .expect("spawn should succeed");

    assert_eq!(task.block_on().unwrap(), 20);
}

#[test]
fn allocation_failure_on_a_too_small_arena() {
    // The frame for a coroutine returning a 512-byte value cannot fit in a
    // 64-byte arena. This runtime allocates a coroutine's frame eagerly at
    // `spawn` time (see DESIGN.md), so the failure surfaces there rather
    // than later from `block_on`.
    let mut buf = vec![0u8; 64];
    let reactor = Reactor::new(&mut buf);

    let result: Result<Fut<'_, [u8; 512], Void>, AllocError> =
        reactor.spawn(|_cx: Cx<'_>| async move { Ok([0u8; 512]) });

    assert!(matches!(result, Err(AllocError)));
}

#[test]
fn pipe_round_trip() {
    let mut buf = vec![0u8; 8192];
    let reactor = Reactor::new(&mut buf);

    let task: Fut<'_, (usize, [u8; 12]), IoError> = reactor
        .spawn(|cx: Cx<'_>| async move {
            let pair = PipePair::make()?;
            let message = b"hello world!";
            assert_eq!(message.len(), 12);

            let written = pair.write.write(cx, message).await?;

            let mut received = [0u8; 12];
            pair.read.read(cx, &mut received).await?;

            Ok((written, received))
        })
        .expect("spawn should succeed");

    let (written, received) = task.block_on().unwrap();
    assert_eq!(written, 12);
    assert_eq!(&received, b"hello world!");
}

#[test]
fn sleep_blocks_for_at_least_the_requested_duration() {
    let mut buf = vec![0u8; 4096];
    let reactor = Reactor::new(&mut buf);

    let task: Fut<'_, i32, Void> = reactor
        .spawn(|cx: Cx<'_>| async move {
            Sleep::new(cx, Duration::from_millis(10)).await;
            Ok(20)
        })
        .expect("spawn should succeed");

    let start = StdInstant::now();
    assert_eq!(task.block_on().unwrap(), 20);
    assert!(start.elapsed() >= Duration::from_millis(10));
}

#[test]
fn bounded_parallelism_serializes_past_max_units() {
    let mut buf = vec![0u8; 16384];
    let reactor = Reactor::new(&mut buf);
    let sem = Semaphore::new(2);
    let in_flight = Cell::new(0usize);
    let peak = Cell::new(0usize);

    let task: Fut<'_, (), Void> = reactor
        .spawn(|cx: Cx<'_>| async move {
            let mut children = Vec::with_capacity(4);
            for _ in 0..4 {
                let child: Fut<'_, (), Void> = cx
                    .reactor()
                    .spawn(|inner_cx: Cx<'_>| async move {
                        let holder = sem.hold(inner_cx, 1).await;
                        in_flight.set(in_flight.get() + 1);
                        peak.set(peak.get().max(in_flight.get()));
                        Sleep::new(inner_cx, Duration::from_millis(10)).await;
                        in_flight.set(in_flight.get() - 1);
                        drop(holder);
                        Ok(())
                    })
                    .expect("arena has room for a worker frame");
                children.push(child);
            }
            for child in children {
                cx.join(child).await.unwrap();
            }
            Ok(())
        })
        .expect("spawn should succeed");

    let start = StdInstant::now();
    task.block_on_draining().unwrap();
    let elapsed = start.elapsed();

    assert!(peak.get() <= 2, "never more than 2 holders at once");
    assert!(elapsed >= Duration::from_millis(20));
    assert!(elapsed < Duration::from_millis(40));
}
