//! The management channel of a network daemon: a multi-threaded UDP
//! listener core and the object management protocol engine that runs on
//! top of the daemon’s control connections.
//!
//! The [udp] module and its helpers realize one logical listener socket
//! as a family of per-worker kernel sockets sharing an endpoint through
//! port-reuse; the [omp] module implements the request/response protocol
//! manipulating a registry of typed objects.
//!
//! [udp]: udp/index.html
//! [omp]: omp/index.html

#[macro_use] extern crate log;
extern crate rand;
extern crate rotor;
extern crate socket2;

pub use error::{Error, Result};
pub use handle::{Handle, SendComplete, SendRequest};
pub use manager::{Config, Manager};
pub use udp::{Listener, RecvHandler, stop_listening};

pub mod error;
pub mod handle;
pub mod manager;
pub mod omp;
pub mod sync;
pub mod udp;
pub mod worker;
