use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use evmux::{Interest, Reactor};
use parking_lot::Mutex;

fn reactor() -> Arc<Reactor> {
    Arc::new(Reactor::new().expect("reactor setup"))
}

#[test]
fn timers_fire_in_schedule_order() {
    let reactor = reactor();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    let base = Reactor::now() + Duration::from_millis(50);
    for offset in [30u64, 10, 50, 20, 40] {
        let order = Arc::clone(&order);
        let tx = tx.clone();
        reactor.schedule_at(base + Duration::from_millis(offset), move || {
            order.lock().push(offset);
            tx.send(()).unwrap();
        });
    }

    // One worker, so callbacks cannot overlap and the order is exact.
    assert!(reactor.start(1));
    for _ in 0..5 {
        rx.recv_timeout(Duration::from_secs(5)).expect("timer fired");
    }
    assert_eq!(*order.lock(), vec![10, 20, 30, 40, 50]);
    assert!(reactor.stop());
}

#[test]
fn timely_firing_beats_the_idle_wait() {
    let reactor = reactor();
    assert!(reactor.start(1));

    // Let the worker park on its long idle timeout first; the schedule
    // below must wake it rather than ride out that timeout.
    std::thread::sleep(Duration::from_millis(50));

    let (tx, rx) = mpsc::channel();
    let delay = Duration::from_millis(50);
    let scheduled = Instant::now();
    reactor.schedule_in(delay, move || {
        tx.send(Instant::now()).unwrap();
    });

    let fired = rx.recv_timeout(Duration::from_secs(5)).expect("timer fired");
    assert!(fired.duration_since(scheduled) >= delay);
    assert!(fired.duration_since(scheduled) < Duration::from_secs(2));
    assert!(reactor.stop());
}

#[test]
fn past_fire_time_runs_promptly() {
    let reactor = reactor();
    assert!(reactor.start(1));

    let (tx, rx) = mpsc::channel();
    reactor.schedule_at(Reactor::now() - Duration::from_secs(1), move || {
        tx.send(()).unwrap();
    });
    rx.recv_timeout(Duration::from_secs(5)).expect("overdue timer fired");
    assert!(reactor.stop());
}

#[test]
fn duplicate_watch_is_refused() {
    let reactor = reactor();
    let (_tx, rx) = UnixStream::pair().unwrap();
    let fd = rx.as_raw_fd();

    assert!(reactor.watch(fd, Interest::READABLE, |_| {}));
    assert!(!reactor.watch(fd, Interest::READABLE, |_| {}));
    // A different interest on the same fd is a distinct key.
    assert!(reactor.watch(fd, Interest::WRITABLE, |_| {}));

    assert!(reactor.unwatch(fd, Interest::READABLE));
    assert!(!reactor.unwatch(fd, Interest::READABLE));
    assert!(reactor.unwatch(fd, Interest::WRITABLE));
    assert!(reactor.stop());
}

#[test]
fn readiness_dispatches_to_a_worker() {
    let reactor = reactor();
    assert!(reactor.start(2));

    let (mut tx, rx) = UnixStream::pair().unwrap();
    rx.set_nonblocking(true).unwrap();
    let fd = rx.as_raw_fd();

    let (done, observed) = mpsc::channel();
    let rx = Mutex::new(rx);
    assert!(reactor.watch(fd, Interest::READABLE, move |ready| {
        assert!(ready.is_readable());
        let mut buf = [0u8; 64];
        let mut total = 0;
        while let Ok(n) = rx.lock().read(&mut buf) {
            if n == 0 {
                break;
            }
            total += n;
        }
        done.send(total).unwrap();
    }));

    tx.write_all(b"ping").unwrap();
    let total = observed
        .recv_timeout(Duration::from_secs(5))
        .expect("readiness callback ran");
    assert_eq!(total, 4);

    assert!(reactor.unwatch(fd, Interest::READABLE));
    assert!(reactor.stop());
}

#[test]
fn callbacks_can_reenter_the_reactor() {
    let reactor = reactor();
    assert!(reactor.start(2));

    let (tx, rx) = mpsc::channel();
    let inner = Arc::clone(&reactor);
    reactor.schedule_in(Duration::from_millis(10), move || {
        inner.schedule_in(Duration::from_millis(10), move || {
            tx.send(()).unwrap();
        });
    });

    rx.recv_timeout(Duration::from_secs(5)).expect("chained timer fired");
    assert!(reactor.stop());
}

#[test]
fn start_and_stop_are_refused_on_a_worker() {
    let reactor = reactor();
    assert!(reactor.start(1));

    let (tx, rx) = mpsc::channel();
    let this = Arc::clone(&reactor);
    reactor.schedule_in(Duration::from_millis(10), move || {
        tx.send((this.stop(), this.start(1))).unwrap();
    });

    let (stopped, started) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(!stopped);
    assert!(!started);

    // The refusal left the pool intact and stoppable from outside.
    assert_eq!(reactor.worker_count(), 1);
    assert!(reactor.stop());
}

#[test]
fn stop_discards_pending_work() {
    let reactor = reactor();
    assert!(reactor.start(1));

    let (timer_tx, timer_rx) = mpsc::channel();
    reactor.schedule_in(Duration::from_millis(300), move || {
        timer_tx.send(()).unwrap();
    });

    let (mut io_tx, io_rx) = UnixStream::pair().unwrap();
    io_rx.set_nonblocking(true).unwrap();
    let (fd_tx, fd_rx) = mpsc::channel();
    assert!(reactor.watch(io_rx.as_raw_fd(), Interest::READABLE, move |_| {
        fd_tx.send(()).unwrap();
    }));

    assert!(reactor.stop());
    assert_eq!(reactor.worker_count(), 0);

    io_tx.write_all(b"late").unwrap();
    std::thread::sleep(Duration::from_millis(500));
    assert!(timer_rx.try_recv().is_err());
    assert!(fd_rx.try_recv().is_err());
}

#[test]
fn stop_is_idempotent_and_restart_works() {
    let reactor = reactor();
    assert!(reactor.start(2));
    assert_eq!(reactor.worker_count(), 2);

    assert!(reactor.stop());
    assert_eq!(reactor.worker_count(), 0);
    assert!(reactor.stop());

    assert!(reactor.start(3));
    assert_eq!(reactor.worker_count(), 3);

    let (tx, rx) = mpsc::channel();
    reactor.schedule_in(Duration::from_millis(10), move || {
        tx.send(()).unwrap();
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("restarted pool runs timers");
    assert!(reactor.stop());
}

#[test]
fn start_grows_a_running_pool() {
    let reactor = reactor();
    assert!(reactor.start(1));
    assert!(reactor.start(2));
    assert_eq!(reactor.worker_count(), 3);
    assert!(reactor.stop());
    assert_eq!(reactor.worker_count(), 0);
}
