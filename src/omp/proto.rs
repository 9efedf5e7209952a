//! Writing replies onto a connection.
//!
//! Framing and the transport underneath it live outside this crate; all
//! the message engine needs is somewhere to put an outbound message and a
//! source of fresh transaction ids. That is the [Connection] trait. The
//! [QueueConnection] keeps replies as decoded messages in memory, which is
//! all the demo daemon and the tests ever need.
//!
//! [Connection]: trait.Connection.html
//! [QueueConnection]: struct.QueueConnection.html

use std::collections::VecDeque;
use std::sync::Arc;
use super::data::{DataString, Generic, TypedData};
use super::message::{Message, Op};
use super::object::{GenericObject, Object, ObjectRef, Registry};
use ::error::Result;


//------------ Connection ---------------------------------------------------

/// The output side of a protocol connection.
pub trait Connection {
    /// Picks the transaction id for the next outbound message.
    fn next_id(&mut self) -> u32;

    /// Enqueues a message onto the connection’s output frame buffer.
    fn send(&mut self, msg: Arc<Message>) -> Result<()>;
}


//------------ Freestanding Functions ---------------------------------------

/// Sends a STATUS reply.
///
/// `rid` is the id of the request being answered, `result` its wire code
/// with zero meaning success, and `text` an optional human-readable
/// explanation.
pub fn send_status<C: Connection>(conn: &mut C, result: u32, rid: u32,
                                  text: Option<&str>) -> Result<()> {
    let msg = Message::new();
    msg.set_op(Op::Status);
    msg.set_id(conn.next_id());
    msg.set_rid(rid);
    try!(msg.set_value(&DataString::from("result"),
                       TypedData::Int(result as u64)));
    if let Some(text) = text {
        try!(msg.set_value(&DataString::from("message"),
                           TypedData::String(text.into())));
    }
    conn.send(msg)
}

/// Sends an UPDATE reply carrying an object’s published values.
///
/// The object is given a handle if it doesn’t have one yet, so the peer
/// can refer back to it.
pub fn send_update<C: Connection>(conn: &mut C, registry: &mut Registry,
                                  rid: u32, obj: &ObjectRef) -> Result<()> {
    let msg = Message::new();
    msg.set_op(Op::Update);
    msg.set_id(conn.next_id());
    msg.set_rid(rid);
    msg.set_handle(try!(registry.handle_for(obj)));

    let mut bag = Generic::new();
    try!(obj.stuff_values(&mut bag));
    msg.set_object(GenericObject::from_bag(bag) as ObjectRef);

    conn.send(msg)
}


//------------ QueueConnection ----------------------------------------------

/// A connection whose frame buffer is an in-memory message queue.
pub struct QueueConnection {
    next: u32,
    queue: VecDeque<Arc<Message>>,
}

impl QueueConnection {
    pub fn new() -> Self {
        QueueConnection { next: 0, queue: VecDeque::new() }
    }

    /// Takes the oldest queued message, if any.
    pub fn take(&mut self) -> Option<Arc<Message>> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl Connection for QueueConnection {
    fn next_id(&mut self) -> u32 {
        self.next = self.next.wrapping_add(1);
        if self.next == 0 {
            self.next = 1;
        }
        self.next
    }

    fn send(&mut self, msg: Arc<Message>) -> Result<()> {
        self.queue.push_back(msg);
        Ok(())
    }
}


//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use super::super::message::Op;
    use super::super::object::{GenericObject, Object, ObjectRef, Registry};
    use super::super::data::{DataString, TypedData};

    #[test]
    fn status_carries_result_and_text() {
        let mut conn = QueueConnection::new();
        send_status(&mut conn, 2, 17, Some("gone")).unwrap();
        let msg = conn.take().unwrap();
        assert_eq!(msg.op(), Some(Op::Status));
        assert_eq!(msg.rid(), 17);
        assert!(msg.id() != 0);
        assert_eq!(msg.get_value(&DataString::from("result")).unwrap()
                      .int_value().unwrap(), 2);
        assert!(msg.get_value(&DataString::from("message")).unwrap()
                   .matches("gone"));
    }

    #[test]
    fn update_stuffs_values_and_mints_a_handle() {
        let mut registry = Registry::new();
        let obj = GenericObject::new();
        obj.set_value(&DataString::from("name"),
                      TypedData::String("h1".into())).unwrap();
        let obj = obj as ObjectRef;

        let mut conn = QueueConnection::new();
        send_update(&mut conn, &mut registry, 4, &obj).unwrap();

        let msg = conn.take().unwrap();
        assert_eq!(msg.op(), Some(Op::Update));
        assert_eq!(msg.rid(), 4);
        assert!(msg.handle() != 0);
        assert_eq!(msg.handle(), registry.handle_for(&obj).unwrap());

        let bag = msg.object().unwrap();
        assert!(bag.get_value(&DataString::from("name")).unwrap()
                   .matches("h1"));
    }
}
