//! The network manager.
//!
//! A [Manager] owns the worker threads and the few pieces of state that
//! are genuinely process-wide: the *interlock*, a try-lock serializing
//! administrative operations such as bulk listener shutdown, and the
//! `maxudp` tunable that simulates a firewall eating large datagrams in
//! tests. Everything else lives with the sockets on their workers.
//!
//! The manager is immutable after [start()](struct.Manager.html#method.start)
//! apart from those two, so the listeners hold a shared view of it,
//! [Shared], without further locking.
//!
//! [Manager]: struct.Manager.html
//! [Shared]: struct.Shared.html

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use ::error::Result;
use ::udp::{self, Listener, RecvHandler};
use ::worker::{self, Ievent, WorkerHandle};


//------------ Config -------------------------------------------------------

/// Configuration for a manager.
#[derive(Clone, Debug)]
pub struct Config {
    nworkers: usize,
    maxudp: usize,
}

impl Config {
    pub fn new() -> Self {
        Config { nworkers: 4, maxudp: 0 }
    }

    /// Sets the number of worker threads. Must be at least one.
    pub fn workers(mut self, nworkers: usize) -> Self {
        assert!(nworkers > 0, "a manager needs at least one worker");
        self.nworkers = nworkers;
        self
    }

    /// Sets the initial datagram size limit; zero means no limit.
    pub fn maxudp(mut self, limit: usize) -> Self {
        self.maxudp = limit;
        self
    }
}


//------------ Manager ------------------------------------------------------

/// The process-wide network manager.
pub struct Manager {
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl Manager {
    /// Starts the manager and its worker threads.
    pub fn start(config: Config) -> Result<Manager> {
        let mut workers = Vec::with_capacity(config.nworkers);
        let mut threads = Vec::with_capacity(config.nworkers);
        for tid in 0..config.nworkers {
            let (handle, thread) = try!(worker::spawn(tid));
            workers.push(handle);
            threads.push(thread);
        }
        info!("network manager running with {} workers", config.nworkers);
        Ok(Manager {
            shared: Arc::new(Shared {
                workers: workers,
                interlock: Mutex::new(()),
                maxudp: AtomicUsize::new(config.maxudp),
            }),
            threads: threads,
        })
    }

    pub fn nworkers(&self) -> usize {
        self.shared.nworkers()
    }

    /// Changes the datagram size limit; zero removes it.
    ///
    /// Datagrams longer than the limit are silently dropped in both
    /// directions, as if a firewall sat in front of every listener.
    pub fn set_maxudp(&self, limit: usize) {
        self.shared.maxudp.store(limit, Ordering::Relaxed)
    }

    pub fn maxudp(&self) -> usize {
        self.shared.maxudp()
    }

    /// Creates a UDP listener on `addr`.
    ///
    /// The listener binds one child socket per worker; binding happens
    /// asynchronously on the workers and individual failures only show in
    /// the listener’s stats.
    pub fn listen_udp(&self, addr: &SocketAddr, recv: Arc<RecvHandler>,
                      extrahandlesize: usize) -> Result<Arc<Listener>> {
        udp::listen(&self.shared, addr, recv, extrahandlesize)
    }

    /// Synchronously closes a listener. See [udp::stop_listening].
    ///
    /// [udp::stop_listening]: ../udp/fn.stop_listening.html
    pub fn stop_listening(&self, lsnr: &Arc<Listener>) {
        udp::stop_listening(lsnr)
    }

    /// Stops all workers and joins their threads.
    pub fn shutdown(mut self) {
        self.teardown()
    }

    fn teardown(&mut self) {
        if self.threads.is_empty() {
            return
        }
        for worker in self.shared.workers.iter() {
            let _ = worker.enqueue(Ievent::Shutdown);
        }
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
        info!("network manager stopped");
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.teardown()
    }
}


//------------ Shared -------------------------------------------------------

/// The manager state shared with listeners and sockets.
pub struct Shared {
    workers: Vec<WorkerHandle>,
    interlock: Mutex<()>,
    maxudp: AtomicUsize,
}

impl Shared {
    pub fn nworkers(&self) -> usize {
        self.workers.len()
    }

    pub fn worker(&self, tid: usize) -> &WorkerHandle {
        &self.workers[tid]
    }

    pub fn maxudp(&self) -> usize {
        self.maxudp.load(Ordering::Relaxed)
    }

    /// Attempts to take the interlock without blocking.
    ///
    /// Callers that fail must re-enqueue their work as a worker command
    /// instead of spinning. Interlocked regions are short and never
    /// suspend on a loop.
    pub fn try_interlock(&self) -> Option<MutexGuard<()>> {
        match self.interlock.try_lock() {
            Ok(guard) => Some(guard),
            Err(_) => None
        }
    }
}
