//! The UDP listener.
//!
//! One logical listener is a family of kernel sockets: the parent
//! [Listener] the caller holds on to, and one [ChildSock] per worker, all
//! bound to the same endpoint through port-reuse so the kernel spreads
//! inbound datagrams across the workers. Each child is pinned to its
//! worker: the socket is registered with that worker’s loop and a
//! [Child] machine drives it, so the loop handle is only ever touched
//! from the owning thread.
//!
//! Sends are routed by thread identity. A send from a network thread goes
//! out inline through the current worker’s own child; a send from
//! anywhere else picks a child at random and crosses over on its command
//! queue. Either way the completion callback fires exactly once.
//!
//! Stopping a listener is a rendezvous: every child is told to close on
//! its own worker, the caller waits until the live-child count drains to
//! zero. Stops serialize with other administrative work on the manager
//! interlock; if the interlock is busy the stop is re-enqueued to a
//! worker and retried there.
//!
//! [Listener]: struct.Listener.html
//! [ChildSock]: struct.ChildSock.html
//! [Child]: struct.Child.html

use std::collections::VecDeque;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use rand::{self, Rng};
use rotor::{EventSet, Machine, PollOpt, Response, Scope, Void};
use rotor::mio::udp::UdpSocket;
use socket2::{Domain, Socket, Type};
use ::error::{Error, Result};
use ::handle::{Handle, SendComplete, SendRequest};
use ::manager::Shared;
use ::sync::{Closed, Queue};
use ::worker::{self, Context, Ievent, Pump};


/// Room for the largest possible datagram.
const RECV_BUF_SIZE: usize = 65535;

/// Kernel send and receive buffer size for each child socket.
const KERNEL_BUF_SIZE: usize = 16 * 1024 * 1024;


//------------ RecvHandler --------------------------------------------------

/// The receive callback of a listener.
pub trait RecvHandler: Send + Sync {
    /// Called on the owning worker thread for every accepted datagram.
    ///
    /// Both the handle and the data region are released when the callback
    /// returns. A callback that wants to keep the peer around clones the
    /// handle; it must not block.
    fn on_recv(&self, handle: &Handle, data: &[u8]);
}


//------------ ListenStats --------------------------------------------------

/// Per-listener counters.
pub struct ListenStats {
    open: AtomicUsize,
    openfail: AtomicUsize,
    bindfail: AtomicUsize,
    close: AtomicUsize,
    sendfail: AtomicUsize,
}

impl ListenStats {
    fn new() -> Self {
        ListenStats {
            open: AtomicUsize::new(0),
            openfail: AtomicUsize::new(0),
            bindfail: AtomicUsize::new(0),
            close: AtomicUsize::new(0),
            sendfail: AtomicUsize::new(0),
        }
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::Relaxed)
    }

    pub fn openfail(&self) -> usize {
        self.openfail.load(Ordering::Relaxed)
    }

    pub fn bindfail(&self) -> usize {
        self.bindfail.load(Ordering::Relaxed)
    }

    pub fn close(&self) -> usize {
        self.close.load(Ordering::Relaxed)
    }

    pub fn sendfail(&self) -> usize {
        self.sendfail.load(Ordering::Relaxed)
    }

    fn inc_open(&self) { self.open.fetch_add(1, Ordering::Relaxed); }
    fn inc_openfail(&self) { self.openfail.fetch_add(1, Ordering::Relaxed); }
    fn inc_bindfail(&self) { self.bindfail.fetch_add(1, Ordering::Relaxed); }
    fn inc_close(&self) { self.close.fetch_add(1, Ordering::Relaxed); }
    fn inc_sendfail(&self) { self.sendfail.fetch_add(1, Ordering::Relaxed); }
}


//------------ Listener -----------------------------------------------------

/// The user-visible logical UDP endpoint.
pub struct Listener {
    mgr: Arc<Shared>,
    addr: SocketAddr,
    nchildren: usize,
    tid: usize,
    children: Mutex<Vec<Arc<ChildSock>>>,
    rchildren: AtomicUsize,
    lock: Mutex<()>,
    cond: Condvar,
    closing: AtomicBool,
    closed: AtomicBool,
    stats: Arc<ListenStats>,
}

impl Listener {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn nchildren(&self) -> usize {
        self.nchildren
    }

    /// The number of children that haven’t finished closing.
    pub fn rchildren(&self) -> usize {
        self.rchildren.load(Ordering::SeqCst)
    }

    pub fn closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &ListenStats {
        &self.stats
    }

    /// The child socket pinned to worker `tid`.
    pub fn child(&self, tid: usize) -> Arc<ChildSock> {
        self.children.lock().unwrap()[tid].clone()
    }

    /// One child has finished closing.
    fn child_gone(&self) {
        let guard = self.lock.lock().unwrap();
        if self.rchildren.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.closed.store(true, Ordering::SeqCst);
        }
        drop(guard);
        self.cond.notify_all();
    }
}


//------------ ChildSock ----------------------------------------------------

/// One kernel socket of a listener, pinned to a worker.
pub struct ChildSock {
    tid: usize,
    addr: SocketAddr,
    parent: Weak<Listener>,
    mgr: Arc<Shared>,
    recv: Arc<RecvHandler>,
    extrahandlesize: usize,
    stats: Arc<ListenStats>,
    io: Mutex<IoSlot>,
    pending: Mutex<VecDeque<(SocketAddr, SendRequest)>>,
    cmd: Mutex<Option<Arc<Queue<Cmd>>>>,
    active: AtomicBool,
    closed: AtomicBool,
    accounted: AtomicBool,
}

enum IoSlot {
    /// Created and configured, waiting for the worker to bind it.
    Pending(Socket),

    /// Bound and receiving.
    Bound(UdpSocket),

    Closed,
}

enum Cmd {
    /// A cross-thread send.
    Send(SocketAddr, SendRequest),

    /// Wake the machine so it reconsiders its write interest.
    Kick,

    /// Close the socket.
    Stop,
}

impl ChildSock {
    pub fn tid(&self) -> usize {
        self.tid
    }

    pub fn active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting work; queued sends complete as canceled.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst)
    }

    fn enqueue(&self, cmd: Cmd) -> ::std::result::Result<(), Closed<Cmd>> {
        let queue = self.cmd.lock().unwrap().clone();
        match queue {
            Some(queue) => queue.push(cmd),
            None => Err(Closed(cmd))
        }
    }

    /// Attempts the send right away on the owning thread.
    ///
    /// If the kernel isn’t ready the request is parked behind any earlier
    /// ones and goes out when the socket turns writable.
    fn send_direct(&self, peer: SocketAddr, req: SendRequest) {
        if !self.active() {
            return req.complete(Err(Error::Canceled))
        }
        {
            let mut pending = self.pending.lock().unwrap();
            if !pending.is_empty() {
                pending.push_back((peer, req));
                drop(pending);
                self.kick();
                return
            }
        }
        let outcome = {
            let slot = self.io.lock().unwrap();
            match *slot {
                IoSlot::Bound(ref io) => {
                    match io.send_to(req.data(), &peer) {
                        Ok(Some(_)) => Some(Ok(())),
                        Ok(None) => None,
                        Err(err) => {
                            self.stats.inc_sendfail();
                            Some(Err(Error::Io(err)))
                        }
                    }
                }
                _ => Some(Err(Error::Canceled))
            }
        };
        match outcome {
            Some(result) => req.complete(result),
            None => {
                self.pending.lock().unwrap().push_back((peer, req));
                self.kick();
            }
        }
    }

    fn kick(&self) {
        let _ = self.enqueue(Cmd::Kick);
    }

    /// Completes the socket setup on the owning worker.
    fn bind(&self) -> io::Result<()> {
        let mut slot = self.io.lock().unwrap();
        let sock = match mem::replace(&mut *slot, IoSlot::Closed) {
            IoSlot::Pending(sock) => sock,
            _ => {
                return Err(io::Error::new(io::ErrorKind::Other,
                                          "socket is not pending"))
            }
        };
        // Every child binds the exact same endpoint, so dual-stack
        // listening must stay off on v6 sockets.
        if let SocketAddr::V6(_) = self.addr {
            try!(sock.set_only_v6(true));
        }
        try!(sock.bind(&self.addr.into()));
        try!(sock.set_recv_buffer_size(KERNEL_BUF_SIZE));
        try!(sock.set_send_buffer_size(KERNEL_BUF_SIZE));
        let sock = sock.into_udp_socket();
        try!(sock.set_nonblocking(true));
        *slot = IoSlot::Bound(try!(into_mio(sock)));
        Ok(())
    }

    /// Tears the socket down and reports to the parent’s rendezvous.
    ///
    /// Parked and still-queued sends complete as canceled. Handles may
    /// outlive the socket; they only keep the address data alive, the
    /// descriptor goes now.
    fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
        let parked = {
            let mut pending = self.pending.lock().unwrap();
            mem::replace(&mut *pending, VecDeque::new())
        };
        for (_, req) in parked {
            req.complete(Err(Error::Canceled));
        }
        let queue = self.cmd.lock().unwrap().take();
        if let Some(queue) = queue {
            for cmd in queue.close() {
                if let Cmd::Send(_, req) = cmd {
                    req.complete(Err(Error::Canceled));
                }
            }
        }
        {
            let mut slot = self.io.lock().unwrap();
            *slot = IoSlot::Closed;
        }
        self.closed.store(true, Ordering::SeqCst);
        if !self.accounted.swap(true, Ordering::SeqCst) {
            if let Some(parent) = self.parent.upgrade() {
                parent.child_gone();
            }
        }
    }
}


//------------ Freestanding Functions ---------------------------------------

/// Creates a listener on `addr` with one child per worker.
///
/// Returns as soon as the children are routed to their workers; binding
/// completes asynchronously over there and individual failures only show
/// up in the listener’s [stats](struct.Listener.html#method.stats).
pub fn listen(mgr: &Arc<Shared>, addr: &SocketAddr, recv: Arc<RecvHandler>,
              extrahandlesize: usize) -> Result<Arc<Listener>> {
    let nchildren = mgr.nworkers();
    let stats = Arc::new(ListenStats::new());
    let lsnr = Arc::new(Listener {
        mgr: mgr.clone(),
        addr: *addr,
        nchildren: nchildren,
        tid: 0,
        children: Mutex::new(Vec::new()),
        rchildren: AtomicUsize::new(nchildren),
        lock: Mutex::new(()),
        cond: Condvar::new(),
        closing: AtomicBool::new(false),
        closed: AtomicBool::new(false),
        stats: stats.clone(),
    });

    let mut children = Vec::with_capacity(nchildren);
    for tid in 0..nchildren {
        let sock = try!(open_child_socket(addr));
        children.push(Arc::new(ChildSock {
            tid: tid,
            addr: *addr,
            parent: Arc::downgrade(&lsnr),
            mgr: mgr.clone(),
            recv: recv.clone(),
            extrahandlesize: extrahandlesize,
            stats: stats.clone(),
            io: Mutex::new(IoSlot::Pending(sock)),
            pending: Mutex::new(VecDeque::new()),
            cmd: Mutex::new(None),
            active: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            accounted: AtomicBool::new(false),
        }));
    }
    *lsnr.children.lock().unwrap() = children.clone();

    info!("UDP listener on {} with {} children", addr, nchildren);
    for csock in children {
        let tid = csock.tid();
        if mgr.worker(tid).enqueue(Ievent::UdpListen(csock)).is_err() {
            return Err(Error::Unexpected)
        }
    }
    Ok(lsnr)
}

/// Sends a datagram to the handle’s peer.
///
/// Best effort: the completion callback fires exactly once with success,
/// `Canceled` if the socket went away first, or the OS error. When the
/// manager’s `maxudp` is set, oversized datagrams are swallowed as if a
/// firewall had eaten them: no network IO happens, but the callback still
/// completes with success.
///
/// Fails with `Unexpected` if the handle has been detached from its
/// socket.
pub fn send(handle: &Handle, data: &[u8], cb: Option<Box<SendComplete>>)
            -> Result<()> {
    let sock = match handle.sock() {
        Some(sock) => sock,
        None => return Err(Error::Unexpected)
    };

    let maxudp = sock.mgr.maxudp();
    if maxudp != 0 && data.len() > maxudp {
        if let Some(cb) = cb {
            cb.on_sent(handle, Ok(()));
        }
        return Ok(())
    }

    let parent = match sock.parent.upgrade() {
        Some(parent) => parent,
        None => return Err(Error::Unexpected)
    };

    // Prefer the caller’s own child socket; from outside the workers,
    // spread the load at random.
    let ntid = match worker::tid() {
        Some(tid) => tid,
        None => rand::thread_rng().gen_range(0, parent.nchildren)
    };
    let rsock = parent.child(ntid);
    let req = SendRequest::new(handle.clone(), data, cb);

    if worker::tid() == Some(rsock.tid) {
        rsock.send_direct(handle.peer(), req);
        Ok(())
    }
    else {
        match rsock.enqueue(Cmd::Send(handle.peer(), req)) {
            Ok(()) => Ok(()),
            Err(Closed(Cmd::Send(_, req))) => {
                req.complete(Err(Error::Canceled));
                Ok(())
            }
            Err(_) => Ok(())
        }
    }
}

/// Synchronously closes a listener.
///
/// Returns once every child has shut down and no further receive
/// callbacks will fire. If the manager interlock is busy the stop is
/// handed to a worker instead and completes asynchronously.
///
/// # Panics
///
/// Calling this from a network thread would deadlock the rendezvous and
/// panics instead.
pub fn stop_listening(lsnr: &Arc<Listener>) {
    assert!(!worker::in_net_thread(),
            "stop_listening may not be called from a network thread");

    match lsnr.mgr.try_interlock() {
        Some(guard) => {
            stoplistening(lsnr);
            drop(guard);
        }
        None => {
            let tid = lsnr.tid;
            let _ = lsnr.mgr.worker(tid)
                            .enqueue(Ievent::UdpStop(lsnr.clone()));
            return
        }
    }

    let mut guard = lsnr.lock.lock().unwrap();
    while lsnr.rchildren.load(Ordering::SeqCst) > 0 {
        guard = lsnr.cond.wait(guard).unwrap();
    }
    drop(guard);
    lsnr.closed.store(true, Ordering::SeqCst);
}

/// Retries a deferred stop; runs on the parent’s worker.
///
/// Doesn’t wait for the rendezvous since a worker must never block; the
/// parent is marked closed by the last child instead.
pub fn deferred_stop(lsnr: Arc<Listener>) {
    let got_lock = if let Some(guard) = lsnr.mgr.try_interlock() {
        stoplistening(&lsnr);
        drop(guard);
        true
    } else {
        false
    };
    if !got_lock {
        let tid = lsnr.tid;
        let mgr = lsnr.mgr.clone();
        let worker = mgr.worker(tid);
        let _ = worker.enqueue(Ievent::UdpStop(lsnr));
    }
}

/// Tells every child to close. Idempotent.
fn stoplistening(lsnr: &Arc<Listener>) {
    if lsnr.closing.swap(true, Ordering::SeqCst) {
        return
    }
    info!("stopping UDP listener on {}", lsnr.addr);
    let children = lsnr.children.lock().unwrap().clone();
    for csock in children {
        csock.deactivate();
        // A child that never made it to its worker self-closes on
        // arrival; one that is already gone has been accounted for.
        let _ = csock.enqueue(Cmd::Stop);
    }
}

fn open_child_socket(addr: &SocketAddr) -> Result<Socket> {
    let domain = if addr.is_ipv4() { Domain::ipv4() }
                 else { Domain::ipv6() };
    let sock = try!(Socket::new(domain, Type::dgram(), None));
    try!(set_port_reuse(&sock));
    Ok(sock)
}

// Port-reuse hell: on Linux and friends SO_REUSEPORT lets multiple
// sockets bind the same host:port pair; on Windows SO_REUSEADDR does.

#[cfg(unix)]
fn set_port_reuse(sock: &Socket) -> io::Result<()> {
    sock.set_reuse_port(true)
}

#[cfg(windows)]
fn set_port_reuse(sock: &Socket) -> io::Result<()> {
    sock.set_reuse_address(true)
}

#[cfg(unix)]
fn into_mio(sock: ::std::net::UdpSocket) -> io::Result<UdpSocket> {
    use std::os::unix::io::{FromRawFd, IntoRawFd};
    Ok(unsafe { UdpSocket::from_raw_fd(sock.into_raw_fd()) })
}

#[cfg(windows)]
fn into_mio(sock: ::std::net::UdpSocket) -> io::Result<UdpSocket> {
    use std::os::windows::io::{FromRawSocket, IntoRawSocket};
    Ok(unsafe { UdpSocket::from_raw_socket(sock.into_raw_socket()) })
}


//------------ Child --------------------------------------------------------

/// The machine driving one child socket on its worker.
pub struct Child {
    sock: Arc<ChildSock>,
    queue: Arc<Queue<Cmd>>,
    writable: bool,
}

impl Child {
    fn create(sock: Arc<ChildSock>, scope: &mut Scope<Context>)
              -> Response<UdpMachine, Void> {
        let queue = Queue::new(scope.notifier());
        {
            let mut cmd = sock.cmd.lock().unwrap();
            *cmd = Some(queue.clone());
        }

        // The listener may already be on its way out.
        let closing = match sock.parent.upgrade() {
            Some(parent) => parent.closing(),
            None => true
        };
        if closing {
            sock.close();
            return Response::done()
        }

        if let Err(err) = sock.bind() {
            sock.stats.inc_bindfail();
            warn!("worker {}: binding UDP child to {} failed: {}",
                  scope.tid, sock.addr, err);
            sock.close();
            return Response::done()
        }

        let registered = {
            let slot = sock.io.lock().unwrap();
            match *slot {
                IoSlot::Bound(ref io) => {
                    scope.register(io, EventSet::readable(), PollOpt::level())
                }
                _ => {
                    Err(io::Error::new(io::ErrorKind::Other,
                                       "socket went away"))
                }
            }
        };
        if let Err(err) = registered {
            sock.stats.inc_openfail();
            warn!("worker {}: registering UDP child on {} failed: {}",
                  scope.tid, sock.addr, err);
            sock.close();
            return Response::done()
        }

        sock.stats.inc_open();
        sock.active.store(true, Ordering::SeqCst);
        debug!("worker {}: UDP child listening on {}", scope.tid, sock.addr);
        Response::ok(UdpMachine::Child(Child {
            sock: sock,
            queue: queue,
            writable: false,
        }))
    }

    fn ready(self, events: EventSet, scope: &mut Scope<Context>)
             -> Response<UdpMachine, Arc<ChildSock>> {
        if events.is_readable() {
            self.receive();
        }
        if events.is_writable() {
            self.flush();
        }
        self.next(scope)
    }

    fn wakeup(self, scope: &mut Scope<Context>)
              -> Response<UdpMachine, Arc<ChildSock>> {
        loop {
            match self.queue.pop() {
                Some(Cmd::Send(peer, req)) => {
                    if self.sock.active() {
                        self.sock.send_direct(peer, req);
                    }
                    else {
                        req.complete(Err(Error::Canceled));
                    }
                }
                Some(Cmd::Kick) => { }
                Some(Cmd::Stop) => return self.stop(scope),
                None => break
            }
        }
        self.next(scope)
    }

    /// Drains the socket, handing each datagram to the user callback.
    fn receive(&self) {
        let mut buf = [0u8; RECV_BUF_SIZE];
        loop {
            let (len, peer, local) = {
                let slot = self.sock.io.lock().unwrap();
                let io = match *slot {
                    IoSlot::Bound(ref io) => io,
                    _ => return
                };
                match io.recv_from(&mut buf) {
                    Ok(Some((len, peer))) => {
                        let local = match io.local_addr() {
                            Ok(local) => local,
                            Err(_) => self.sock.addr
                        };
                        (len, peer, local)
                    }
                    Ok(None) => return,
                    Err(err) => {
                        debug!("UDP receive on {} failed: {}",
                               self.sock.addr, err);
                        return
                    }
                }
            };

            // Firewall simulation: oversized datagrams disappear.
            let maxudp = self.sock.mgr.maxudp();
            if maxudp != 0 && len > maxudp {
                continue
            }

            let handle = Handle::new(self.sock.clone(), peer, local,
                                     self.sock.extrahandlesize);
            self.sock.recv.on_recv(&handle, &buf[..len]);
        }
    }

    /// Pushes parked sends out while the kernel takes them.
    fn flush(&self) {
        loop {
            let item = self.sock.pending.lock().unwrap().pop_front();
            let (peer, req) = match item {
                Some(item) => item,
                None => return
            };
            let outcome = {
                let slot = self.sock.io.lock().unwrap();
                match *slot {
                    IoSlot::Bound(ref io) => {
                        match io.send_to(req.data(), &peer) {
                            Ok(Some(_)) => Some(Ok(())),
                            Ok(None) => None,
                            Err(err) => {
                                self.sock.stats.inc_sendfail();
                                Some(Err(Error::Io(err)))
                            }
                        }
                    }
                    _ => Some(Err(Error::Canceled))
                }
            };
            match outcome {
                Some(result) => req.complete(result),
                None => {
                    // Still blocked; retry on the next writable event.
                    self.sock.pending.lock().unwrap()
                        .push_front((peer, req));
                    return
                }
            }
        }
    }

    fn stop(self, scope: &mut Scope<Context>)
            -> Response<UdpMachine, Arc<ChildSock>> {
        debug!("worker {}: closing UDP child on {}",
               scope.tid, self.sock.addr);
        self.sock.stats.inc_close();
        self.sock.close();
        Response::done()
    }

    fn next(mut self, scope: &mut Scope<Context>)
            -> Response<UdpMachine, Arc<ChildSock>> {
        let want_write = !self.sock.pending.lock().unwrap().is_empty();
        if want_write != self.writable {
            let events = if want_write {
                EventSet::readable() | EventSet::writable()
            }
            else {
                EventSet::readable()
            };
            let res = {
                let slot = self.sock.io.lock().unwrap();
                match *slot {
                    IoSlot::Bound(ref io) => {
                        scope.reregister(io, events, PollOpt::level())
                    }
                    _ => Ok(())
                }
            };
            if let Err(err) = res {
                warn!("worker {}: reregistering UDP child on {} failed: {}",
                      scope.tid, self.sock.addr, err);
                self.sock.close();
                return Response::done()
            }
            self.writable = want_write;
        }
        Response::ok(UdpMachine::Child(self))
    }
}


//------------ UdpMachine ---------------------------------------------------

/// The machine type of a worker loop.
///
/// Exactly one pump per worker, plus one child per listener.
pub enum UdpMachine {
    Pump(Pump),
    Child(Child),
}

impl UdpMachine {
    pub fn pump(queue: Arc<Queue<Ievent>>) -> Self {
        UdpMachine::Pump(Pump::new(queue))
    }
}

impl Machine for UdpMachine {
    type Context = Context;
    type Seed = Arc<ChildSock>;

    fn create(seed: Self::Seed, scope: &mut Scope<Context>)
              -> Response<Self, Void> {
        Child::create(seed, scope)
    }

    fn ready(self, events: EventSet, scope: &mut Scope<Context>)
             -> Response<Self, Self::Seed> {
        match self {
            UdpMachine::Pump(..) => unreachable!("the pump can’t be ready"),
            UdpMachine::Child(child) => child.ready(events, scope)
        }
    }

    fn spawned(self, scope: &mut Scope<Context>)
               -> Response<Self, Self::Seed> {
        match self {
            UdpMachine::Pump(pump) => pump.drain(scope),
            UdpMachine::Child(child) => {
                Response::ok(UdpMachine::Child(child))
            }
        }
    }

    fn timeout(self, _scope: &mut Scope<Context>)
               -> Response<Self, Self::Seed> {
        unreachable!("no timeouts are ever requested")
    }

    fn wakeup(self, scope: &mut Scope<Context>)
              -> Response<Self, Self::Seed> {
        match self {
            UdpMachine::Pump(pump) => pump.drain(scope),
            UdpMachine::Child(child) => child.wakeup(scope)
        }
    }
}
