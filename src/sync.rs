//! Command queues into worker loops.
//!
//! A worker loop only acts when its reactor wakes it, so handing work to
//! a machine on another thread takes two parts: somewhere to leave the
//! command and a way to ring the machine’s notifier. A [Queue] bundles
//! both behind one shared object. Producers [push()](struct.Queue.html#method.push)
//! from any thread; the owning machine drains with
//! [pop()](struct.Queue.html#method.pop) from its `wakeup()` handler.
//!
//! Wakeups are coalesced: the notifier only rings when the machine isn’t
//! already scheduled to drain, so a burst of commands costs one wakeup.
//! Commands pushed from one thread are popped in push order; pushes from
//! different threads interleave arbitrarily.
//!
//! Queues close when their machine goes away. Closing hands back every
//! command that never ran, so the owner can complete the work they
//! represent as canceled instead of dropping it on the floor, and later
//! pushes bounce with the command returned to the caller for the same
//! treatment.
//!
//! [Queue]: struct.Queue.html

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use rotor::Notifier;


//------------ Queue --------------------------------------------------------

/// A command queue owned by one machine and pushed to from anywhere.
pub struct Queue<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    commands: VecDeque<T>,
    notify: Notifier,
    awake: bool,
    closed: bool,
}

impl<T: Send> Queue<T> {
    /// Creates a queue that rings `notify` when work arrives.
    pub fn new(notify: Notifier) -> Arc<Queue<T>> {
        Arc::new(Queue {
            inner: Mutex::new(Inner {
                commands: VecDeque::new(),
                notify: notify,
                awake: false,
                closed: false,
            })
        })
    }

    /// Appends a command, waking the owning machine if necessary.
    ///
    /// A closed queue, or one whose loop has gone away, hands the command
    /// back so the caller can fail whatever it stands for.
    pub fn push(&self, command: T) -> Result<(), Closed<T>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(Closed(command))
        }
        if !inner.awake {
            if inner.notify.wakeup().is_err() {
                inner.closed = true;
                return Err(Closed(command))
            }
            inner.awake = true;
        }
        inner.commands.push_back(command);
        Ok(())
    }

    /// Takes the oldest queued command.
    ///
    /// Only the owning machine calls this. Seeing the queue empty is what
    /// re-arms the wakeup, so a drain loop must keep popping until `None`.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        let command = inner.commands.pop_front();
        if command.is_none() {
            inner.awake = false;
        }
        command
    }

    /// Closes the queue and returns every command that never ran.
    pub fn close(&self) -> Vec<T> {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.commands.drain(..).collect()
    }
}


//------------ Closed -------------------------------------------------------

/// A command bounced off a closed queue.
pub struct Closed<T>(pub T);

impl<T> fmt::Debug for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Closed(..)")
    }
}
