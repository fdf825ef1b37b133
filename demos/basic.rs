//! The smallest possible program: spawn one coroutine that yields a few
//! times, then block the current thread until it returns.

use std::time::Duration;

use signalcoro::prelude::*;

fn main() {
    let mut buf = vec![0u8; 4096];
    let reactor = Reactor::new(&mut buf);

    let task: Fut<'_, i32, Void> = reactor
        .spawn(|cx: Cx<'_>| async move {
            println!("starting up");
            for i in 0..3 {
                Sleep::new(cx, Duration::from_millis(100)).await;
                println!("tick {i}");
            }
            Ok(42)
        })
        .expect("arena has room for one small frame");

    match task.block_on() {
        Ok(value) => println!("coroutine finished with {value}"),
        Err(err) => eprintln!("coroutine failed: {err}"),
    }
}
