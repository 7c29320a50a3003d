use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use evmux::{Interest, Reactor};

fn main() -> std::io::Result<()> {
    let reactor = Arc::new(Reactor::new()?);
    assert!(reactor.start(4));

    for i in 0..10u64 {
        reactor.schedule_in(Duration::from_millis(100 * i), move || {
            println!("timer {} fired on {:?}", i, thread::current().id());
        });
    }

    let (mut tx, rx) = UnixStream::pair()?;
    rx.set_nonblocking(true)?;
    let fd = rx.as_raw_fd();
    let rx = parking_lot::Mutex::new(rx);
    reactor.watch(fd, Interest::READABLE, move |_| {
        let mut buf = [0u8; 64];
        while let Ok(n) = rx.lock().read(&mut buf) {
            if n == 0 {
                break;
            }
            println!("read {n} bytes on {:?}", thread::current().id());
        }
    });
    tx.write_all(b"hello reactor")?;

    thread::sleep(Duration::from_millis(1200));
    reactor.unwatch(fd, Interest::READABLE);
    reactor.stop();
    Ok(())
}
