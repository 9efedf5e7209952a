//! End-to-end tests for the object management protocol engine.
//!
//! These run the full OPEN/REFRESH/UPDATE/DELETE flows against a `host`
//! object type looked up by its `name` value, the way a daemon’s
//! management channel would use the engine.

extern crate netmanager;

use std::sync::{Arc, Mutex};
use netmanager::Error;
use netmanager::omp::{DataString, Engine, Generic, GenericObject, Message,
                      Object, ObjectClass, ObjectRef, Op, QueueConnection,
                      TypedData};


//------------ Host ----------------------------------------------------------

/// A host: a thin layer over a generic bag.
struct Host {
    inner: Arc<GenericObject>,
}

impl Host {
    fn create() -> Arc<Self> {
        let inner = GenericObject::new();
        let res = Arc::new(Host { inner: inner.clone() });
        let as_object = res.clone() as ObjectRef;
        inner.set_outer(&as_object);
        res
    }
}

impl Object for Host {
    fn type_name(&self) -> &str {
        "host"
    }

    fn inner(&self) -> Option<ObjectRef> {
        Some(self.inner.clone() as ObjectRef)
    }
}


//------------ HostClass -----------------------------------------------------

/// The host type: lookup by `name`, create, remove.
struct HostClass {
    hosts: Mutex<Vec<ObjectRef>>,
}

impl HostClass {
    fn new() -> Arc<Self> {
        Arc::new(HostClass { hosts: Mutex::new(Vec::new()) })
    }
}

impl ObjectClass for HostClass {
    fn name(&self) -> &str {
        "host"
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn lookup(&self, key: &ObjectRef) -> Result<ObjectRef, Error> {
        let wanted = match key.get_value(&DataString::from("name")) {
            Ok(value) => value,
            Err(_) => return Err(Error::NoKeys)
        };
        let wanted = try!(wanted.text());
        let hosts = self.hosts.lock().unwrap();
        for host in hosts.iter() {
            if let Ok(name) = host.get_value(&DataString::from("name")) {
                if name.matches(&wanted) {
                    return Ok(host.clone())
                }
            }
        }
        Err(Error::NotFound)
    }

    fn create(&self) -> Result<ObjectRef, Error> {
        let host = Host::create() as ObjectRef;
        self.hosts.lock().unwrap().push(host.clone());
        Ok(host)
    }

    fn remove(&self, obj: &ObjectRef) -> Result<(), Error> {
        let mut hosts = self.hosts.lock().unwrap();
        let before = hosts.len();
        hosts.retain(|host| !Arc::ptr_eq(host, obj));
        if hosts.len() == before {
            return Err(Error::NotFound)
        }
        Ok(())
    }
}


//------------ Helpers -------------------------------------------------------

fn engine_with_host() -> Engine {
    let mut engine = Engine::new();
    engine.registry_mut().register_class(HostClass::new()).unwrap();
    engine
}

fn key_bag(name: &str) -> ObjectRef {
    let mut bag = Generic::new();
    bag.set("name", TypedData::String(name.into()));
    GenericObject::from_bag(bag) as ObjectRef
}

fn open_msg(id: u32, name: &str, create: bool, update: bool,
            exclusive: bool) -> Arc<Message> {
    let msg = Message::new();
    msg.set_op(Op::Open);
    msg.set_id(id);
    msg.set_value(&DataString::from("type"),
                  TypedData::String("host".into())).unwrap();
    if create {
        msg.set_value(&DataString::from("create"),
                      TypedData::Int(1)).unwrap();
    }
    if update {
        msg.set_value(&DataString::from("update"),
                      TypedData::Int(1)).unwrap();
    }
    if exclusive {
        msg.set_value(&DataString::from("exclusive"),
                      TypedData::Int(1)).unwrap();
    }
    msg.set_object(key_bag(name));
    msg
}

fn refresh_msg(id: u32, handle: u32) -> Arc<Message> {
    let msg = Message::new();
    msg.set_op(Op::Refresh);
    msg.set_id(id);
    msg.set_handle(handle);
    msg
}

fn status_code(msg: &Arc<Message>) -> u32 {
    msg.get_value(&DataString::from("result")).unwrap()
       .int_value().unwrap() as u32
}


//------------ Tests ---------------------------------------------------------

#[test]
fn open_create_then_refresh_round_trips() {
    let mut engine = engine_with_host();
    let mut conn = QueueConnection::new();

    engine.process(&open_msg(1, "h1", true, true, false),
                   &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(reply.op(), Some(Op::Update));
    assert_eq!(reply.rid(), 1);
    let handle = reply.handle();
    assert!(handle != 0);
    assert!(reply.object().unwrap()
                 .get_value(&DataString::from("name")).unwrap()
                 .matches("h1"));

    // REFRESH on the returned handle yields the installed values.
    engine.process(&refresh_msg(2, handle), &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(reply.op(), Some(Op::Update));
    assert_eq!(reply.rid(), 2);
    assert_eq!(reply.handle(), handle);
    assert!(reply.object().unwrap()
                 .get_value(&DataString::from("name")).unwrap()
                 .matches("h1"));
}

#[test]
fn exclusive_create_collides() {
    let mut engine = engine_with_host();
    let mut conn = QueueConnection::new();

    engine.process(&open_msg(1, "h1", true, false, true),
                   &mut conn).unwrap();
    assert_eq!(conn.take().unwrap().op(), Some(Op::Update));

    // The identical OPEN must bounce off the existing object.
    engine.process(&open_msg(2, "h1", true, false, true),
                   &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(reply.op(), Some(Op::Status));
    assert_eq!(reply.rid(), 2);
    assert_eq!(status_code(&reply), Error::Exists.code());
}

#[test]
fn open_without_create_needs_a_match() {
    let mut engine = engine_with_host();
    let mut conn = QueueConnection::new();

    engine.process(&open_msg(1, "nosuch", false, false, false),
                   &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(reply.op(), Some(Op::Status));
    assert_eq!(status_code(&reply), Error::NotFound.code());
    assert!(reply.get_value(&DataString::from("message")).unwrap()
                 .matches("no object matches specification"));
}

#[test]
fn open_without_key_is_rejected() {
    let mut engine = engine_with_host();
    let mut conn = QueueConnection::new();

    let msg = Message::new();
    msg.set_op(Op::Open);
    msg.set_id(1);
    msg.set_value(&DataString::from("type"),
                  TypedData::String("host".into())).unwrap();
    engine.process(&msg, &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(status_code(&reply), Error::NotFound.code());
    assert!(reply.get_value(&DataString::from("message")).unwrap()
                 .matches("no lookup key specified"));
}

#[test]
fn open_with_create_needs_a_type() {
    let mut engine = engine_with_host();
    let mut conn = QueueConnection::new();

    let msg = Message::new();
    msg.set_op(Op::Open);
    msg.set_id(1);
    msg.set_value(&DataString::from("create"), TypedData::Int(1)).unwrap();
    msg.set_object(key_bag("h1"));
    engine.process(&msg, &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(status_code(&reply), Error::InvalidArg.code());
    assert!(reply.get_value(&DataString::from("message")).unwrap()
                 .matches("type required on create"));
}

#[test]
fn malformed_flag_is_reported() {
    let mut engine = engine_with_host();
    let mut conn = QueueConnection::new();

    let msg = open_msg(1, "h1", false, false, false);
    msg.set_value(&DataString::from("create"),
                  TypedData::String("yes please".into())).unwrap();
    engine.process(&msg, &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(status_code(&reply), Error::WrongType.code());
    assert!(reply.get_value(&DataString::from("message")).unwrap()
                 .matches("invalid create flag value"));
}

#[test]
fn unsearchable_type_is_reported() {
    struct Opaque;
    impl ObjectClass for Opaque {
        fn name(&self) -> &str { "opaque" }
    }

    let mut engine = Engine::new();
    engine.registry_mut().register_class(Arc::new(Opaque)).unwrap();
    let mut conn = QueueConnection::new();

    let msg = Message::new();
    msg.set_op(Op::Open);
    msg.set_id(1);
    msg.set_value(&DataString::from("type"),
                  TypedData::String("opaque".into())).unwrap();
    msg.set_object(key_bag("x"));
    engine.process(&msg, &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(status_code(&reply), Error::NotImplemented.code());
    assert!(reply.get_value(&DataString::from("message")).unwrap()
                 .matches("unsearchable object type"));

    // The missing hook wins over a missing key.
    let msg = Message::new();
    msg.set_op(Op::Open);
    msg.set_id(2);
    msg.set_value(&DataString::from("type"),
                  TypedData::String("opaque".into())).unwrap();
    engine.process(&msg, &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(status_code(&reply), Error::NotImplemented.code());
    assert!(reply.get_value(&DataString::from("message")).unwrap()
                 .matches("unsearchable object type"));
}

#[test]
fn update_then_refresh_returns_updated_bag() {
    let mut engine = engine_with_host();
    let mut conn = QueueConnection::new();

    engine.process(&open_msg(1, "h1", true, true, false),
                   &mut conn).unwrap();
    let handle = conn.take().unwrap().handle();

    let mut bag = Generic::new();
    bag.set("location", TypedData::String("rack1".into()));
    let msg = Message::new();
    msg.set_op(Op::Update);
    msg.set_id(2);
    msg.set_handle(handle);
    msg.set_object(GenericObject::from_bag(bag) as ObjectRef);
    engine.process(&msg, &mut conn).unwrap();

    let reply = conn.take().unwrap();
    assert_eq!(reply.op(), Some(Op::Status));
    assert_eq!(status_code(&reply), 0);

    engine.process(&refresh_msg(3, handle), &mut conn).unwrap();
    let reply = conn.take().unwrap();
    let bag = reply.object().unwrap();
    assert!(bag.get_value(&DataString::from("name")).unwrap()
               .matches("h1"));
    assert!(bag.get_value(&DataString::from("location")).unwrap()
               .matches("rack1"));
}

#[test]
fn delete_then_refresh_is_not_found() {
    let mut engine = engine_with_host();
    let mut conn = QueueConnection::new();

    engine.process(&open_msg(1, "h1", true, true, false),
                   &mut conn).unwrap();
    let handle = conn.take().unwrap().handle();

    let msg = Message::new();
    msg.set_op(Op::Delete);
    msg.set_id(2);
    msg.set_handle(handle);
    engine.process(&msg, &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(reply.op(), Some(Op::Status));
    assert_eq!(status_code(&reply), 0);

    engine.process(&refresh_msg(3, handle), &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(reply.op(), Some(Op::Status));
    assert_eq!(status_code(&reply), Error::NotFound.code());

    // The object is gone from the class as well.
    engine.process(&open_msg(4, "h1", false, false, false),
                   &mut conn).unwrap();
    assert_eq!(status_code(&conn.take().unwrap()),
               Error::NotFound.code());
}

#[test]
fn delete_without_remove_hook_is_not_implemented() {
    struct FixedObject {
        inner: Arc<GenericObject>,
    }
    impl Object for FixedObject {
        fn type_name(&self) -> &str { "fixed" }
        fn inner(&self) -> Option<ObjectRef> {
            Some(self.inner.clone() as ObjectRef)
        }
    }

    struct Fixed {
        only: Mutex<Option<ObjectRef>>,
    }
    impl ObjectClass for Fixed {
        fn name(&self) -> &str { "fixed" }
        fn has_lookup(&self) -> bool { true }
        fn lookup(&self, _key: &ObjectRef) -> Result<ObjectRef, Error> {
            match *self.only.lock().unwrap() {
                Some(ref obj) => Ok(obj.clone()),
                None => Err(Error::NotFound)
            }
        }
        fn create(&self) -> Result<ObjectRef, Error> {
            let obj = Arc::new(FixedObject {
                inner: GenericObject::new(),
            }) as ObjectRef;
            *self.only.lock().unwrap() = Some(obj.clone());
            Ok(obj)
        }
    }

    let mut engine = Engine::new();
    engine.registry_mut().register_class(
        Arc::new(Fixed { only: Mutex::new(None) })).unwrap();
    let mut conn = QueueConnection::new();

    let msg = Message::new();
    msg.set_op(Op::Open);
    msg.set_id(1);
    msg.set_value(&DataString::from("type"),
                  TypedData::String("fixed".into())).unwrap();
    msg.set_value(&DataString::from("create"), TypedData::Int(1)).unwrap();
    msg.set_object(key_bag("x"));
    engine.process(&msg, &mut conn).unwrap();
    let handle = conn.take().unwrap().handle();

    let msg = Message::new();
    msg.set_op(Op::Delete);
    msg.set_id(2);
    msg.set_handle(handle);
    engine.process(&msg, &mut conn).unwrap();
    let reply = conn.take().unwrap();
    assert_eq!(status_code(&reply), Error::NotImplemented.code());
    assert!(reply.get_value(&DataString::from("message")).unwrap()
                 .matches("no remove method for object"));
}
