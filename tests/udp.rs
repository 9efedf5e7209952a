//! End-to-end tests for the UDP listener core.
//!
//! Every test talks to a real listener on the loopback interface through
//! a plain blocking socket. Each test uses its own port so they can run
//! concurrently.

extern crate netmanager;

use std::net::{SocketAddr, UdpSocket};
use std::str::FromStr;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use netmanager::{Config, Error, Handle, Manager, RecvHandler};
use netmanager::udp;


//------------ Helpers -------------------------------------------------------

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from_str(&format!("127.0.0.1:{}", port)).unwrap()
}

fn wait_until<F: Fn() -> bool>(cond: F, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timeout waiting for {}", what);
        thread::sleep(Duration::from_millis(10));
    }
}

fn client() -> UdpSocket {
    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    sock.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    sock
}

/// Echoes every datagram back to its peer.
struct Echo;

impl RecvHandler for Echo {
    fn on_recv(&self, handle: &Handle, data: &[u8]) {
        let _ = handle.send(data, Box::new(|_: &Handle, _: Result<(), Error>| ()));
    }
}

/// Records the length of every datagram it sees.
struct Recorder {
    lens: Mutex<Vec<usize>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Recorder { lens: Mutex::new(Vec::new()) })
    }

    fn lens(&self) -> Vec<usize> {
        self.lens.lock().unwrap().clone()
    }
}

impl RecvHandler for Recorder {
    fn on_recv(&self, _handle: &Handle, data: &[u8]) {
        self.lens.lock().unwrap().push(data.len());
    }
}

/// Keeps the handle of the last datagram around.
struct Keeper {
    slot: Mutex<Option<Handle>>,
}

impl Keeper {
    fn new() -> Arc<Self> {
        Arc::new(Keeper { slot: Mutex::new(None) })
    }

    fn handle(&self) -> Option<Handle> {
        self.slot.lock().unwrap().clone()
    }
}

impl RecvHandler for Keeper {
    fn on_recv(&self, handle: &Handle, _data: &[u8]) {
        let mut slot = self.slot.lock().unwrap();
        *slot = Some(handle.clone());
    }
}


//------------ Tests ---------------------------------------------------------

#[test]
fn echo() {
    let mgr = Manager::start(Config::new().workers(4)).unwrap();
    let lsnr = mgr.listen_udp(&addr(47311), Arc::new(Echo), 0).unwrap();
    wait_until(|| lsnr.stats().open() == 4, "children to bind");

    // Batched so the client’s receive buffer can keep up.
    let sock = client();
    let payload = [0x5au8; 64];
    let mut buf = [0u8; 128];
    let mut echoed = 0;
    for _ in 0..10 {
        for _ in 0..100 {
            sock.send_to(&payload, &addr(47311)).unwrap();
        }
        let mut got = 0;
        let deadline = Instant::now() + Duration::from_secs(2);
        while got < 100 && Instant::now() < deadline {
            if let Ok((len, _)) = sock.recv_from(&mut buf) {
                assert_eq!(len, 64);
                assert_eq!(&buf[..len], &payload[..]);
                got += 1;
            }
        }
        echoed += got;
    }
    assert_eq!(echoed, 1000);

    udp::stop_listening(&lsnr);
    mgr.shutdown();
}

#[test]
fn oversize_datagrams_are_dropped() {
    let mgr = Manager::start(Config::new().workers(2)).unwrap();
    mgr.set_maxudp(512);
    let recorder = Recorder::new();
    let lsnr = mgr.listen_udp(&addr(47312), recorder.clone(), 0).unwrap();
    wait_until(|| lsnr.stats().open() == 2, "children to bind");

    let sock = client();
    sock.send_to(&[0u8; 513], &addr(47312)).unwrap();
    sock.send_to(&[0u8; 512], &addr(47312)).unwrap();

    wait_until(|| !recorder.lens().is_empty(), "the small datagram");
    thread::sleep(Duration::from_millis(200));
    assert_eq!(recorder.lens(), vec![512]);

    udp::stop_listening(&lsnr);
    mgr.shutdown();
}

#[test]
fn oversize_sends_complete_without_io() {
    let mgr = Manager::start(Config::new().workers(2)).unwrap();
    let keeper = Keeper::new();
    let lsnr = mgr.listen_udp(&addr(47313), keeper.clone(), 0).unwrap();
    wait_until(|| lsnr.stats().open() == 2, "children to bind");

    let sock = client();
    sock.send_to(b"hello", &addr(47313)).unwrap();
    wait_until(|| keeper.handle().is_some(), "a handle");
    let handle = keeper.handle().unwrap();

    mgr.set_maxudp(16);
    let (tx, rx) = mpsc::channel();
    udp::send(&handle, &[0u8; 64], Some(Box::new(
        move |_: &Handle, result: Result<(), Error>| {
            tx.send(result).unwrap();
        }))).unwrap();

    // The completion still fires, but nothing hits the wire.
    match rx.recv_timeout(Duration::from_secs(2)) {
        Ok(Ok(())) => { }
        other => panic!("unexpected completion: {:?}", other)
    }
    let mut buf = [0u8; 128];
    assert!(sock.recv_from(&mut buf).is_err());

    udp::stop_listening(&lsnr);
    mgr.shutdown();
}

#[test]
fn cross_thread_sends_are_delivered() {
    let mgr = Manager::start(Config::new().workers(4)).unwrap();
    let keeper = Keeper::new();
    let lsnr = mgr.listen_udp(&addr(47314), keeper.clone(), 0).unwrap();
    wait_until(|| lsnr.stats().open() == 4, "children to bind");

    let sock = client();
    sock.send_to(b"hello", &addr(47314)).unwrap();
    wait_until(|| keeper.handle().is_some(), "a handle");
    let handle = keeper.handle().unwrap();

    // This is not a network thread, so every send picks a child at
    // random and crosses over to its worker. Batched so the client’s
    // receive buffer can keep up.
    let mut buf = [0u8; 128];
    let mut received = 0;
    for _ in 0..20 {
        for _ in 0..100 {
            udp::send(&handle, b"crossing", None).unwrap();
        }
        let mut got = 0;
        let deadline = Instant::now() + Duration::from_secs(2);
        while got < 100 && Instant::now() < deadline {
            if let Ok((len, _)) = sock.recv_from(&mut buf) {
                assert_eq!(&buf[..len], b"crossing");
                got += 1;
            }
        }
        received += got;
    }
    assert_eq!(received, 2000);

    udp::stop_listening(&lsnr);
    mgr.shutdown();
}

#[test]
fn graceful_stop() {
    let mgr = Manager::start(Config::new().workers(8)).unwrap();
    let recorder = Recorder::new();
    let lsnr = mgr.listen_udp(&addr(47315), recorder.clone(), 0).unwrap();
    wait_until(|| lsnr.stats().open() == 8, "children to bind");

    udp::stop_listening(&lsnr);
    assert!(lsnr.closed());
    assert_eq!(lsnr.rchildren(), 0);
    assert_eq!(lsnr.stats().close(), 8);

    // Stopping an already-stopped listener is a no-op.
    udp::stop_listening(&lsnr);

    // No further receive callbacks fire.
    let sock = client();
    let _ = sock.send_to(b"anyone there?", &addr(47315));
    thread::sleep(Duration::from_millis(200));
    assert!(recorder.lens().is_empty());

    mgr.shutdown();
}

#[test]
fn canceled_send_completes_exactly_once() {
    let mgr = Manager::start(Config::new().workers(2)).unwrap();
    let keeper = Keeper::new();
    let lsnr = mgr.listen_udp(&addr(47316), keeper.clone(), 0).unwrap();
    wait_until(|| lsnr.stats().open() == 2, "children to bind");

    let sock = client();
    sock.send_to(b"hello", &addr(47316)).unwrap();
    wait_until(|| keeper.handle().is_some(), "a handle");
    let handle = keeper.handle().unwrap();

    // Flip every child inactive before the send event can dispatch.
    for tid in 0..lsnr.nchildren() {
        lsnr.child(tid).deactivate();
    }

    let refs_before = handle.refs();
    let (tx, rx) = mpsc::channel();
    udp::send(&handle, b"doomed", Some(Box::new(
        move |_: &Handle, result: Result<(), Error>| {
            tx.send(result).unwrap();
        }))).unwrap();

    match rx.recv_timeout(Duration::from_secs(2)) {
        Ok(Err(Error::Canceled)) => { }
        other => panic!("unexpected completion: {:?}", other)
    }
    // Exactly once: nothing else arrives.
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    // The send reference has been released again.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(handle.refs(), refs_before);

    udp::stop_listening(&lsnr);
    mgr.shutdown();
}

#[test]
fn handles_carry_addresses_and_extra_space() {
    let mgr = Manager::start(Config::new().workers(1)).unwrap();
    let keeper = Keeper::new();
    let lsnr = mgr.listen_udp(&addr(47317), keeper.clone(), 32).unwrap();
    wait_until(|| lsnr.stats().open() == 1, "the child to bind");

    let sock = client();
    sock.send_to(b"hello", &addr(47317)).unwrap();
    wait_until(|| keeper.handle().is_some(), "a handle");
    let handle = keeper.handle().unwrap();

    assert_eq!(handle.peer(), sock.local_addr().unwrap());
    assert_eq!(handle.local(), addr(47317));
    assert_eq!(handle.extra().len(), 32);
    handle.extra()[0] = 0xff;
    assert_eq!(handle.extra()[0], 0xff);

    // A detached handle keeps its addresses but can no longer send.
    handle.detach_sock();
    assert!(handle.sock().is_none());
    match udp::send(&handle, b"nope", None) {
        Err(Error::Unexpected) => { }
        other => panic!("unexpected result: {:?}", other.is_ok())
    }

    udp::stop_listening(&lsnr);
    mgr.shutdown();
}
