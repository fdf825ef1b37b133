//! Spawns a few hundred coroutines under a `Semaphore`, each sleeping
//! briefly, to exercise the reactor's ready/timer/poll queues at once.

use std::cell::Cell;
use std::time::Duration;

use signalcoro::prelude::*;

const COROUTINES: usize = 500;
const MAX_PARALLEL: usize = 16;

fn main() {
    let mut buf = vec![0u8; 1 << 20];
    let reactor = Reactor::new(&mut buf);
    let sem = Semaphore::new(MAX_PARALLEL);
    let completed = Cell::new(0usize);

    let task: Fut<'_, (), Void> = reactor
        .spawn(|cx: Cx<'_>| async move {
            let mut children = Vec::with_capacity(COROUTINES);
            for n in 0..COROUTINES {
                let child: Fut<'_, (), Void> = cx
                    .reactor()
                    .spawn(|inner_cx: Cx<'_>| async move {
                        let _holder = sem.hold(inner_cx, 1).await;
                        Sleep::new(inner_cx, Duration::from_millis(1)).await;
                        completed.set(completed.get() + 1);
                        if n % 100 == 0 {
                            println!("coroutine {n} done ({} total)", completed.get());
                        }
                        Ok(())
                    })
                    .expect("arena has room for another worker frame");
                children.push(child);
            }
            for child in children {
                cx.join(child).await.unwrap();
            }
            Ok(())
        })
        .expect("arena has room for the supervisor frame");

    task.block_on().unwrap();
    println!("all {COROUTINES} coroutines completed");
}
