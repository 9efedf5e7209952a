//! Per-peer handles and send requests.
//!
//! A [Handle] names one peer interaction on a listener: the child socket
//! the datagram arrived on, the peer and local addresses, and an opaque
//! per-handle region the application can scribble into. Handles are
//! created for each inbound datagram and passed to the receive callback;
//! the callback’s reference is dropped when it returns, so a callback that
//! wants to keep the peer around clones the handle.
//!
//! A [SendRequest] is the one-shot bundle behind an asynchronous send: the
//! payload, a handle clone held from submission to completion, and the
//! completion callback, which fires exactly once on every path including
//! cancellation.
//!
//! [Handle]: struct.Handle.html
//! [SendRequest]: struct.SendRequest.html

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use ::error::Result;
use ::udp::ChildSock;


//------------ Handle -------------------------------------------------------

/// A reference-counted peer context.
///
/// Every clone holds the underlying socket alive; dropping the last clone
/// releases it.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<Inner>,
}

struct Inner {
    sock: Mutex<Option<Arc<ChildSock>>>,
    peer: SocketAddr,
    local: SocketAddr,
    extra: Mutex<Vec<u8>>,
}

impl Handle {
    /// Creates a handle for a datagram from `peer` received on `sock`.
    ///
    /// This is done by the listener’s receive path; applications only ever
    /// see finished handles.
    pub fn new(sock: Arc<ChildSock>, peer: SocketAddr, local: SocketAddr,
               extrasize: usize) -> Handle {
        Handle {
            inner: Arc::new(Inner {
                sock: Mutex::new(Some(sock)),
                peer: peer,
                local: local,
                extra: Mutex::new(vec![0; extrasize]),
            })
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.inner.peer
    }

    pub fn local(&self) -> SocketAddr {
        self.inner.local
    }

    /// The socket this handle arrived on, unless it was detached.
    pub fn sock(&self) -> Option<Arc<ChildSock>> {
        self.inner.sock.lock().unwrap().clone()
    }

    /// Gives up the socket reference early.
    ///
    /// Useful when a handle outlives its listener; sending through a
    /// detached handle fails with `Unexpected`.
    pub fn detach_sock(&self) {
        let mut sock = self.inner.sock.lock().unwrap();
        *sock = None;
    }

    /// The opaque per-handle region requested at listen time.
    pub fn extra(&self) -> MutexGuard<Vec<u8>> {
        self.inner.extra.lock().unwrap()
    }

    /// Sends a datagram back to this handle’s peer.
    ///
    /// See [udp::send](../udp/fn.send.html) for the completion contract.
    pub fn send(&self, data: &[u8], cb: Box<SendComplete>) -> Result<()> {
        ::udp::send(self, data, Some(cb))
    }

    /// The current number of references to this handle.
    pub fn refs(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}


//------------ SendComplete -------------------------------------------------

/// The completion callback of a send request.
///
/// Implemented for any suitable `FnOnce` closure.
pub trait SendComplete: Send {
    fn on_sent(self: Box<Self>, handle: &Handle, result: Result<()>);
}

impl<F: FnOnce(&Handle, Result<()>) + Send> SendComplete for F {
    fn on_sent(self: Box<Self>, handle: &Handle, result: Result<()>) {
        (*self)(handle, result)
    }
}


//------------ SendRequest --------------------------------------------------

/// One asynchronous send.
///
/// Owns its copy of the payload and a handle reference from submission
/// until [complete()](#method.complete) consumes it.
pub struct SendRequest {
    data: Vec<u8>,
    handle: Handle,
    cb: Option<Box<SendComplete>>,
}

impl SendRequest {
    pub fn new(handle: Handle, data: &[u8], cb: Option<Box<SendComplete>>)
               -> Self {
        SendRequest { data: data.into(), handle: handle, cb: cb }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Fires the completion callback and releases the handle reference.
    pub fn complete(mut self, result: Result<()>) {
        if let Some(cb) = self.cb.take() {
            cb.on_sent(&self.handle, result);
        }
    }
}
