//! The object management protocol engine.
//!
//! This half of the crate speaks the request/response protocol that lets a
//! management client inspect and manipulate a server’s typed objects over
//! a framed connection. The pieces, bottom up: [data] has the named typed
//! values everything is made of, [object] the server-side registry of
//! layered objects and their handles, [message] the message entity and the
//! processor that runs the OPEN/REFRESH/UPDATE/NOTIFY/STATUS/DELETE state
//! machine, and [proto] the glue that writes STATUS and UPDATE replies
//! back onto a connection.
//!
//! [data]: data/index.html
//! [object]: object/index.html
//! [message]: message/index.html
//! [proto]: proto/index.html

pub use self::data::{DataString, Generic, TypedData, Value};
pub use self::message::{Engine, Message, MessageList, Op};
pub use self::object::{GenericObject, Object, ObjectClass, ObjectRef,
                       Registry, SignalArgs};
pub use self::proto::{Connection, QueueConnection};

pub mod data;
pub mod message;
pub mod object;
pub mod proto;
