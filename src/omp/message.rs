//! Message objects and the request processor.
//!
//! A message is the protocol’s unit of work: an operation code, a
//! transaction id, an optional response id linking it to an outstanding
//! request, and a bag of named values. The message itself is an object
//! stack: the typed fields live in the message layer and everything else
//! falls through to an inner generic bag, so a wire decoder can stuff
//! values into a message without knowing which ones are structural.
//!
//! Outstanding requests are *registered*: they sit in a live set until the
//! reply arrives so that a response’s `rid` can be matched back to the
//! message that is waiting for it.
//!
//! [Engine::process](struct.Engine.html#method.process) runs one inbound
//! message against the object registry and writes whatever reply is called
//! for to the connection. Protocol-level failures never escape as errors;
//! they are turned into STATUS replies. `process` only fails when no reply
//! can be constructed at all, such as a response quoting an id nobody is
//! waiting on.

use std::sync::{Arc, Mutex};
use super::data::{DataString, TypedData};
use super::object::{self, GenericObject, Object, ObjectRef, SignalArgs};
use super::object::Registry;
use super::proto::{self, Connection};
use ::error::{Error, Result, SUCCESS};


//------------ Op -----------------------------------------------------------

/// The protocol operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Op {
    Open = 1,
    Refresh = 2,
    Update = 3,
    Notify = 4,
    Status = 5,
    Delete = 6,
}

impl Op {
    pub fn from_u32(value: u32) -> Option<Op> {
        match value {
            1 => Some(Op::Open),
            2 => Some(Op::Refresh),
            3 => Some(Op::Update),
            4 => Some(Op::Notify),
            5 => Some(Op::Status),
            6 => Some(Op::Delete),
            _ => None
        }
    }
}


//------------ Message ------------------------------------------------------

/// A protocol message.
///
/// All field access goes through accessors since a message is shared: the
/// wire decoder fills it in, the processor reads it, and a registered
/// message may be signalled from another request’s processing.
pub struct Message {
    core: Mutex<Core>,
    inner: Arc<GenericObject>,
    slot: Mutex<Option<usize>>,
}

#[derive(Default)]
struct Core {
    authlen: u32,
    authenticator: Option<TypedData>,
    authid: u32,
    op: u32,
    handle: u32,
    id: u32,
    rid: u32,
    object: Option<ObjectRef>,
    notify_object: Option<ObjectRef>,
    id_object: Option<ObjectRef>,
}

impl Message {
    /// Creates a fresh message stack: a message over a generic bag.
    pub fn new() -> Arc<Self> {
        let inner = GenericObject::new();
        let res = Arc::new(Message {
            core: Mutex::new(Core::default()),
            inner: inner.clone(),
            slot: Mutex::new(None),
        });
        let as_object = res.clone() as ObjectRef;
        inner.set_outer(&as_object);
        res
    }

    pub fn op_code(&self) -> u32 {
        self.core.lock().unwrap().op
    }

    pub fn op(&self) -> Option<Op> {
        Op::from_u32(self.op_code())
    }

    pub fn id(&self) -> u32 {
        self.core.lock().unwrap().id
    }

    pub fn rid(&self) -> u32 {
        self.core.lock().unwrap().rid
    }

    pub fn handle(&self) -> u32 {
        self.core.lock().unwrap().handle
    }

    pub fn authid(&self) -> u32 {
        self.core.lock().unwrap().authid
    }

    pub fn authlen(&self) -> u32 {
        self.core.lock().unwrap().authlen
    }

    pub fn authenticator(&self) -> Option<TypedData> {
        self.core.lock().unwrap().authenticator.clone()
    }

    pub fn object(&self) -> Option<ObjectRef> {
        self.core.lock().unwrap().object.clone()
    }

    pub fn notify_object(&self) -> Option<ObjectRef> {
        self.core.lock().unwrap().notify_object.clone()
    }

    /// The object that authenticated this message, if any.
    pub fn id_object(&self) -> Option<ObjectRef> {
        self.core.lock().unwrap().id_object.clone()
    }

    pub fn set_op(&self, op: Op) {
        self.core.lock().unwrap().op = op as u32
    }

    pub fn set_id(&self, id: u32) {
        self.core.lock().unwrap().id = id
    }

    pub fn set_rid(&self, rid: u32) {
        self.core.lock().unwrap().rid = rid
    }

    pub fn set_handle(&self, handle: u32) {
        self.core.lock().unwrap().handle = handle
    }

    pub fn set_object(&self, obj: ObjectRef) {
        self.core.lock().unwrap().object = Some(obj)
    }

    pub fn set_notify_object(&self, obj: ObjectRef) {
        self.core.lock().unwrap().notify_object = Some(obj)
    }

    pub fn set_id_object(&self, obj: ObjectRef) {
        self.core.lock().unwrap().id_object = Some(obj)
    }

    /// Whether the message sits in a registered-messages list.
    pub fn is_registered(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }
}


//--- Object

impl Object for Message {
    fn type_name(&self) -> &str {
        "message"
    }

    fn inner(&self) -> Option<ObjectRef> {
        Some(self.inner.clone() as ObjectRef)
    }

    fn set_value(&self, name: &DataString, value: TypedData) -> Result<()> {
        // authlen is deliberately not settable; it falls through to the
        // bag and stays shadowed by the real field on reads.
        if name.matches("authenticator") {
            self.core.lock().unwrap().authenticator = Some(value);
            Ok(())
        }
        else if name.matches("object") {
            let obj = try!(value.object());
            self.core.lock().unwrap().object = Some(obj);
            Ok(())
        }
        else if name.matches("notify-object") {
            let obj = try!(value.object());
            self.core.lock().unwrap().notify_object = Some(obj);
            Ok(())
        }
        else if name.matches("authid") {
            self.core.lock().unwrap().authid = try!(value.int_value()) as u32;
            Ok(())
        }
        else if name.matches("op") {
            self.core.lock().unwrap().op = try!(value.int_value()) as u32;
            Ok(())
        }
        else if name.matches("handle") {
            self.core.lock().unwrap().handle = try!(value.int_value()) as u32;
            Ok(())
        }
        else if name.matches("id") {
            self.core.lock().unwrap().id = try!(value.int_value()) as u32;
            Ok(())
        }
        else if name.matches("rid") {
            self.core.lock().unwrap().rid = try!(value.int_value()) as u32;
            Ok(())
        }
        else {
            self.inner.set_value(name, value)
        }
    }

    fn get_value(&self, name: &DataString) -> Result<TypedData> {
        let core = self.core.lock().unwrap();
        if name.matches("authlen") {
            Ok(TypedData::Int(core.authlen as u64))
        }
        else if name.matches("authenticator") {
            match core.authenticator {
                Some(ref value) => Ok(value.clone()),
                None => Err(Error::NotFound)
            }
        }
        else if name.matches("authid") {
            Ok(TypedData::Int(core.authid as u64))
        }
        else if name.matches("op") {
            Ok(TypedData::Int(core.op as u64))
        }
        else if name.matches("handle") {
            Ok(TypedData::Int(core.handle as u64))
        }
        else if name.matches("id") {
            Ok(TypedData::Int(core.id as u64))
        }
        else if name.matches("rid") {
            Ok(TypedData::Int(core.rid as u64))
        }
        else {
            self.inner.get_value(name)
        }
    }

    fn signal(&self, name: &str, args: &SignalArgs) -> Result<()> {
        let (object, notify) = {
            let core = self.core.lock().unwrap();
            (core.object.clone(), core.notify_object.clone())
        };
        if name == "status" {
            if let Some(obj) = object {
                return obj.signal(name, args)
            }
            if let Some(obj) = notify {
                return obj.signal(name, args)
            }
        }
        self.inner.signal(name, args)
    }

    fn stuff_values(&self, out: &mut ::omp::data::Generic) -> Result<()> {
        self.inner.stuff_values(out)
    }
}


//------------ MessageList --------------------------------------------------

/// The live set of outstanding requests.
///
/// Registration is a slot in the list; a message knows its own slot so the
/// registered-state invariant is simply “the slot is present”.
pub struct MessageList {
    slots: Vec<Option<Arc<Message>>>,
}

impl MessageList {
    pub fn new() -> Self {
        MessageList { slots: Vec::new() }
    }

    /// Adds a message to the live set.
    ///
    /// # Panics
    ///
    /// Registering a message twice is a contract violation and panics.
    pub fn register(&mut self, msg: &Arc<Message>) {
        let mut slot = msg.slot.lock().unwrap();
        assert!(slot.is_none(), "message is already registered");
        let index = match self.slots.iter().position(|item| item.is_none()) {
            Some(index) => index,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[index] = Some(msg.clone());
        *slot = Some(index);
    }

    /// Splices a message out of the live set.
    ///
    /// # Panics
    ///
    /// Unregistering a message that isn’t registered panics.
    pub fn unregister(&mut self, msg: &Arc<Message>) {
        let mut slot = msg.slot.lock().unwrap();
        match slot.take() {
            Some(index) => self.slots[index] = None,
            None => panic!("message is not registered")
        }
    }

    pub fn find_by_id(&self, id: u32) -> Option<Arc<Message>> {
        for entry in self.slots.iter() {
            if let Some(ref msg) = *entry {
                if msg.id() == id {
                    return Some(msg.clone())
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|item| item.is_some()).count()
    }
}


//------------ Engine -------------------------------------------------------

/// The message engine: object registry plus outstanding requests.
pub struct Engine {
    registry: Registry,
    messages: MessageList,
}

impl Engine {
    pub fn new() -> Self {
        Engine { registry: Registry::new(), messages: MessageList::new() }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn register_message(&mut self, msg: &Arc<Message>) {
        self.messages.register(msg)
    }

    pub fn unregister_message(&mut self, msg: &Arc<Message>) {
        self.messages.unregister(msg)
    }

    pub fn outstanding(&self) -> usize {
        self.messages.len()
    }

    /// Processes one fully parsed inbound message.
    pub fn process<C: Connection>(&mut self, msg: &Arc<Message>,
                                  conn: &mut C) -> Result<()> {
        let rid = msg.rid();
        let m = if rid != 0 {
            match self.messages.find_by_id(rid) {
                Some(m) => Some(m),
                // A response to a message nobody is waiting on.
                None => return Err(Error::NotFound)
            }
        }
        else {
            None
        };

        match msg.op() {
            Some(Op::Open) => self.process_open(msg, m, conn),
            Some(Op::Refresh) => {
                self.send_refresh(msg.handle(), msg.id(), conn)
            }
            Some(Op::Update) => self.process_update(msg, m, conn),
            Some(Op::Notify) => {
                proto::send_status(conn, Error::NotImplemented.code(),
                                   msg.id(),
                                   Some("notify not implemented yet"))
            }
            Some(Op::Status) => self.process_status(msg, m),
            Some(Op::Delete) => self.process_delete(msg, conn),
            None => Err(Error::NotImplemented)
        }
    }

    fn process_open<C: Connection>(&mut self, msg: &Arc<Message>,
                                   m: Option<Arc<Message>>, conn: &mut C)
                                   -> Result<()> {
        let id = msg.id();

        if m.is_some() {
            return proto::send_status(conn, Error::InvalidArg.code(), id,
                                      Some("OPEN can't be a response"))
        }

        let class = match msg.get_value(&DataString::from("type")) {
            Ok(ref value) => {
                self.registry.find_class_by_value(value)
                             .map(|class| class.clone())
            }
            Err(_) => None
        };

        let create = match flag(msg, "create") {
            Ok(value) => value,
            Err(err) => {
                return proto::send_status(conn, err.code(), id,
                                          Some("invalid create flag value"))
            }
        };
        let update = match flag(msg, "update") {
            Ok(value) => value,
            Err(err) => {
                return proto::send_status(conn, err.code(), id,
                                          Some("invalid update flag value"))
            }
        };
        let exclusive = match flag(msg, "exclusive") {
            Ok(value) => value,
            Err(err) => {
                return proto::send_status(conn, err.code(), id,
                                          Some("invalid exclusive flag value"))
            }
        };

        // Without a type this is just a refresh by handle.
        let class = match class {
            Some(class) => class,
            None => {
                if create != 0 {
                    return proto::send_status(conn, Error::InvalidArg.code(),
                                              id,
                                              Some("type required on create"))
                }
                return self.send_refresh(msg.handle(), id, conn)
            }
        };

        if !class.has_lookup() {
            return proto::send_status(conn, Error::NotImplemented.code(),
                                      id, Some("unsearchable object type"))
        }

        let key = match msg.object() {
            Some(key) => key,
            None => {
                return proto::send_status(conn, Error::NotFound.code(), id,
                                          Some("no lookup key specified"))
            }
        };

        let found = match class.lookup(&key) {
            Ok(obj) => Some(obj),
            Err(Error::NotFound) => {
                if create == 0 {
                    return proto::send_status(
                        conn, Error::NotFound.code(), id,
                        Some("no object matches specification"))
                }
                None
            }
            Err(Error::NoKeys) => None,
            Err(err) => {
                return proto::send_status(conn, err.code(), id,
                                          Some("object lookup failed"))
            }
        };

        if found.is_some() && create != 0 && exclusive != 0 {
            return proto::send_status(conn, Error::Exists.code(), id,
                                      Some("specified object already exists"))
        }

        let object = match found {
            Some(obj) => obj,
            None => {
                match class.create() {
                    Ok(obj) => obj,
                    Err(err) => {
                        return proto::send_status(
                            conn, err.code(), id,
                            Some("can't create new object"))
                    }
                }
            }
        };

        if create != 0 || update != 0 {
            if let Err(err) = object::update(&object, &key, msg.handle()) {
                return proto::send_status(conn, err.code(), id,
                                          Some("can't update object"))
            }
        }

        proto::send_update(conn, &mut self.registry, id, &object)
    }

    fn send_refresh<C: Connection>(&mut self, handle: u32, id: u32,
                                   conn: &mut C) -> Result<()> {
        let object = match self.registry.handle_lookup(handle) {
            Ok(obj) => obj,
            Err(err) => {
                return proto::send_status(conn, err.code(), id,
                                          Some("no matching handle"))
            }
        };
        proto::send_update(conn, &mut self.registry, id, &object)
    }

    fn process_update<C: Connection>(&mut self, msg: &Arc<Message>,
                                     m: Option<Arc<Message>>, conn: &mut C)
                                     -> Result<()> {
        let id = msg.id();
        let rid = msg.rid();

        // The matched message may carry the target; anything else goes
        // through the handle table.
        let target = match m.as_ref().and_then(|m| m.object()) {
            Some(obj) => obj,
            None => {
                match self.registry.handle_lookup(msg.handle()) {
                    Ok(obj) => obj,
                    Err(err) => {
                        return proto::send_status(conn, err.code(), id,
                                                  Some("no matching handle"))
                    }
                }
            }
        };

        let result = match msg.object() {
            Some(ref src) => object::update(&target, src, msg.handle()),
            None => Ok(())
        };

        match result {
            Err(err) => {
                if rid == 0 {
                    return proto::send_status(conn, err.code(), id,
                                              Some("can't update object"))
                }
                if let Some(ref m) = m {
                    let _ = m.signal("status",
                                     &SignalArgs::status(err.code(), None));
                }
                Ok(())
            }
            Ok(()) => {
                let mut res = Ok(());
                if rid == 0 {
                    res = proto::send_status(conn, SUCCESS, id, None);
                }
                if let Some(ref m) = m {
                    let _ = m.signal("status",
                                     &SignalArgs::status(SUCCESS, None));
                }
                res
            }
        }
    }

    fn process_status(&mut self, msg: &Arc<Message>,
                      m: Option<Arc<Message>>) -> Result<()> {
        let m = match m {
            Some(m) => m,
            None => return Err(Error::Unexpected)
        };

        let result = match msg.get_value(&DataString::from("result")) {
            Ok(value) => {
                match value.int_value() {
                    Ok(code) => code as u32,
                    Err(_) => Error::Unexpected.code()
                }
            }
            Err(_) => Error::Unexpected.code()
        };
        let text = msg.get_value(&DataString::from("message")).ok()
                      .and_then(|value| value.text().ok());

        let _ = m.signal("status", &SignalArgs::status(result, text));
        Ok(())
    }

    fn process_delete<C: Connection>(&mut self, msg: &Arc<Message>,
                                     conn: &mut C) -> Result<()> {
        let id = msg.id();
        let object = match self.registry.handle_lookup(msg.handle()) {
            Ok(obj) => obj,
            Err(err) => {
                return proto::send_status(conn, err.code(), id,
                                          Some("no matching handle"))
            }
        };

        let class = match self.registry.find_class(object.type_name()) {
            Some(class) => class.clone(),
            None => {
                return proto::send_status(conn, Error::NotImplemented.code(),
                                          id,
                                          Some("no remove method for object"))
            }
        };

        match class.remove(&object) {
            Ok(()) => {
                self.registry.release_object(&object);
                proto::send_status(conn, SUCCESS, id, None)
            }
            Err(Error::NotImplemented) => {
                proto::send_status(conn, Error::NotImplemented.code(), id,
                                   Some("no remove method for object"))
            }
            Err(err) => proto::send_status(conn, err.code(), id, None)
        }
    }
}


//------------ Freestanding Functions ---------------------------------------

/// Reads a boolean flag value off a message, defaulting to zero.
///
/// An absent flag is zero; a present flag that isn’t an integer is the
/// peer’s mistake and is reported as such.
fn flag(msg: &Arc<Message>, name: &str) -> Result<u64> {
    match msg.get_value(&DataString::from(name)) {
        Ok(value) => value.int_value(),
        Err(_) => Ok(0)
    }
}


//============ Test ==========================================================
