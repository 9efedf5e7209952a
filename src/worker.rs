//! Event-loop workers.
//!
//! The manager runs a fixed set of worker threads, each owning one rotor
//! loop. Everything registered with a loop (most importantly the child
//! sockets of the UDP listeners) may only be touched from its thread, so
//! each worker also owns a command queue drained by a resident [Pump]
//! machine: `udplisten` spawns a child machine, a deferred `udpstop`
//! retries a listener shutdown, `shutdown` ends the loop.
//!
//! Worker threads are identified by a thread-local id. Code anywhere in
//! the crate can ask [tid()](fn.tid.html) whether it is running inside a
//! network thread and, if so, which one; the send path uses this to avoid
//! a thread hop whenever the target socket lives on the current thread.
//!
//! [Pump]: struct.Pump.html

use std::cell::Cell;
use std::sync::Arc;
use std::thread;
use rotor::{self, GenericScope, Response, Scope};
use ::error::{Error, Result};
use ::sync::{Closed, Queue};
use ::udp::{self, ChildSock, Listener, UdpMachine};


//------------ Thread identity ----------------------------------------------

thread_local!(static TID: Cell<Option<usize>> = Cell::new(None));

/// Returns whether the calling thread is a network worker.
pub fn in_net_thread() -> bool {
    TID.with(|tid| tid.get().is_some())
}

/// Returns the calling worker’s id, if this is a network thread.
pub fn tid() -> Option<usize> {
    TID.with(|tid| tid.get())
}


//------------ Context ------------------------------------------------------

/// The loop context of a worker.
pub struct Context {
    pub tid: usize,
}


//------------ Ievent -------------------------------------------------------

/// A command on a worker’s queue.
pub enum Ievent {
    /// Bind a child socket and start receiving on it.
    UdpListen(Arc<ChildSock>),

    /// Retry stopping a listener under the interlock.
    UdpStop(Arc<Listener>),

    /// End this worker’s loop.
    Shutdown,
}


//------------ WorkerHandle -------------------------------------------------

/// The manager’s end of a worker.
pub struct WorkerHandle {
    tid: usize,
    queue: Arc<Queue<Ievent>>,
}

impl WorkerHandle {
    pub fn tid(&self) -> usize {
        self.tid
    }

    /// Queues a command; the worker executes commands in queue order.
    pub fn enqueue(&self, event: Ievent)
                   -> ::std::result::Result<(), Closed<Ievent>> {
        self.queue.push(event)
    }
}


//------------ Freestanding Functions ---------------------------------------

/// Starts worker `tid`: a loop with its pump, running on a fresh thread.
pub fn spawn(tid: usize)
             -> Result<(WorkerHandle, thread::JoinHandle<()>)> {
    let mut lc: rotor::Loop<UdpMachine> =
        try!(rotor::Loop::new(&rotor::Config::new()));
    let mut queue_slot = None;
    let res = lc.add_machine_with(|scope| {
        let queue = Queue::new(scope.notifier());
        queue_slot = Some(queue.clone());
        Response::ok(UdpMachine::pump(queue))
    });
    if res.is_err() {
        return Err(Error::NoSlabSpace)
    }
    let queue = match queue_slot {
        Some(queue) => queue,
        None => return Err(Error::Unexpected)
    };

    let thread = try!(thread::Builder::new()
            .name(format!("netmgr/{}", tid))
            .spawn(move || {
                TID.with(|cell| cell.set(Some(tid)));
                debug!("worker {} running", tid);
                if let Err(err) = lc.run(Context { tid: tid }) {
                    error!("worker {}: event loop died: {}", tid, err);
                }
            }));

    Ok((WorkerHandle { tid: tid, queue: queue }, thread))
}


//------------ Pump ---------------------------------------------------------

/// The resident machine draining a worker’s command queue.
pub struct Pump {
    queue: Arc<Queue<Ievent>>,
}

impl Pump {
    pub fn new(queue: Arc<Queue<Ievent>>) -> Self {
        Pump { queue: queue }
    }

    /// Runs queued commands until the queue is empty.
    ///
    /// Spawning a child machine returns control to the loop; the remaining
    /// commands are handled when the loop comes back through `spawned()`.
    pub fn drain(self, scope: &mut Scope<Context>)
                 -> Response<UdpMachine, Arc<ChildSock>> {
        loop {
            match self.queue.pop() {
                Some(Ievent::UdpListen(csock)) => {
                    return Response::spawn(UdpMachine::Pump(self), csock)
                }
                Some(Ievent::UdpStop(lsnr)) => {
                    udp::deferred_stop(lsnr)
                }
                Some(Ievent::Shutdown) => {
                    debug!("worker {} shutting down", scope.tid);
                    self.queue.close();
                    scope.shutdown_loop();
                    return Response::done()
                }
                None => return Response::ok(UdpMachine::Pump(self))
            }
        }
    }
}
