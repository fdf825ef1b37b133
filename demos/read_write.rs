//! Round-trips a short message through an anonymous pipe, driven entirely
//! by `poll(2)` through the reactor — no thread ever blocks in the kernel
//! waiting on the other end.

use signalcoro::io::PipePair;
use signalcoro::prelude::*;

fn main() {
    let mut buf = vec![0u8; 8192];
    let reactor = Reactor::new(&mut buf);

    let task: Fut<'_, String, IoError> = reactor
        .spawn(|cx: Cx<'_>| async move {
            let pair = PipePair::make()?;
            let message = b"hello world!";
            pair.write.write(cx, message).await?;
            drop(pair.write);

            let mut received = vec![0u8; message.len()];
            pair.read.read(cx, &mut received).await?;

            Ok(String::from_utf8_lossy(&received).into_owned())
        })
        .expect("arena has room for this frame");

    match task.block_on() {
        Ok(text) => println!("round-tripped: {text}"),
        Err(err) => eprintln!("pipe round trip failed: {err}"),
    }
}
