//! A tiny object management daemon.
//!
//! This daemon is an example for the netmanager crate. It keeps a registry
//! of `host` objects and lets you poke at it over UDP with a one-line text
//! command per datagram:
//!
//! ```text
//! open <name>      creates (or finds) the host and prints its handle
//! get <handle>     prints the host’s current values
//! del <handle>     deletes the host
//! ```
//!
//! Every command is translated into a real protocol message (OPEN,
//! REFRESH or DELETE) and run through the message engine, so the daemon
//! exercises the same code paths a framed management connection would.
//!
//! # Server Architecture
//!
//! There are two kinds of threads: the network workers owned by the
//! manager, and one query thread owning the message engine. The receive
//! callback parses the command on the worker and hands it to the query
//! thread together with a clone of the peer’s handle; the reply crosses
//! back into the workers through the ordinary send path.

#[macro_use] extern crate log;
extern crate argparse;
extern crate netmanager;
extern crate simplelog;

use std::net::SocketAddr;
use std::str::{self, FromStr};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use netmanager::{Handle, Manager, RecvHandler};
use netmanager::error::Error;
use netmanager::omp::{DataString, Engine, Generic, GenericObject, Message,
                      Object, ObjectClass, ObjectRef, Op, QueueConnection,
                      TypedData};
use simplelog::{TermLogger, LogLevelFilter};


//============ Main: Start Here ==============================================

fn main() {
    TermLogger::new(LogLevelFilter::Info);

    let config = Config::from_args();
    let addr = SocketAddr::from_str(&config.addr).unwrap();

    let manager = Manager::start(
        netmanager::Config::new().workers(config.workers)).unwrap();

    let (processor, tx) = Processor::new();
    let join = thread::spawn(move || processor.run());

    let _lsnr = manager.listen_udp(&addr, Arc::new(DgramHandler::new(tx)),
                                   0).unwrap();
    println!("ompd listening on {}", addr);

    join.join().unwrap();
}


//============ Network Handler ===============================================

//------------ DgramHandler --------------------------------------------------

struct DgramHandler {
    tx: Mutex<RequestSender>,
}

impl DgramHandler {
    fn new(tx: RequestSender) -> Self {
        DgramHandler { tx: Mutex::new(tx) }
    }
}

impl RecvHandler for DgramHandler {
    fn on_recv(&self, handle: &Handle, data: &[u8]) {
        let request = match Request::parse(data) {
            Ok(request) => request,
            Err(err) => {
                reply(handle, format!("error: {}\n", err));
                return
            }
        };
        let tx = self.tx.lock().unwrap().clone();
        if tx.send((request, handle.clone())).is_err() {
            reply(handle, "error: server shutting down\n".into());
        }
    }
}

fn reply(handle: &Handle, text: String) {
    let res = handle.send(text.as_bytes(),
                          Box::new(|_: &Handle, res: Result<(), Error>| {
        if let Err(err) = res {
            warn!("sending reply failed: {}", err);
        }
    }));
    if let Err(err) = res {
        warn!("submitting reply failed: {}", err);
    }
}


//============ Processing ====================================================

//------------ Request -------------------------------------------------------

enum Request {
    Open(String),
    Get(u32),
    Del(u32),
}

impl Request {
    fn parse(data: &[u8]) -> Result<Self, &'static str> {
        let line = match str::from_utf8(data) {
            Ok(line) => line.trim(),
            Err(_) => return Err("commands are plain text")
        };
        let mut words = line.split_whitespace();
        let verb = match words.next() {
            Some(verb) => verb,
            None => return Err("empty command")
        };
        let arg = match words.next() {
            Some(arg) => arg,
            None => return Err("missing argument")
        };
        if words.next().is_some() {
            return Err("too many arguments")
        }
        match verb {
            "open" => Ok(Request::Open(arg.into())),
            "get" => {
                match u32::from_str(arg) {
                    Ok(handle) => Ok(Request::Get(handle)),
                    Err(_) => Err("handle must be a number")
                }
            }
            "del" => {
                match u32::from_str(arg) {
                    Ok(handle) => Ok(Request::Del(handle)),
                    Err(_) => Err("handle must be a number")
                }
            }
            _ => Err("unknown command")
        }
    }
}


//------------ RequestSender -------------------------------------------------

type RequestSender = mpsc::Sender<(Request, Handle)>;


//------------ Processor -----------------------------------------------------

struct Processor {
    engine: Engine,
    tasks: mpsc::Receiver<(Request, Handle)>,
}

impl Processor {
    fn new() -> (Self, RequestSender) {
        let mut engine = Engine::new();
        engine.registry_mut().register_class(HostClass::new()).unwrap();
        let (tx, rx) = mpsc::channel();
        (Processor { engine: engine, tasks: rx }, tx)
    }

    fn run(mut self) {
        while let Ok((request, handle)) = self.tasks.recv() {
            let text = self.execute(request);
            reply(&handle, text);
        }
    }

    fn execute(&mut self, request: Request) -> String {
        let msg = match request {
            Request::Open(name) => {
                let msg = Message::new();
                msg.set_op(Op::Open);
                msg.set_value(&DataString::from("type"),
                              TypedData::String("host".into())).unwrap();
                msg.set_value(&DataString::from("create"),
                              TypedData::Int(1)).unwrap();
                msg.set_value(&DataString::from("update"),
                              TypedData::Int(1)).unwrap();
                let mut bag = Generic::new();
                bag.set("name", TypedData::String((&name as &str).into()));
                msg.set_object(GenericObject::from_bag(bag) as ObjectRef);
                msg
            }
            Request::Get(handle) => {
                let msg = Message::new();
                msg.set_op(Op::Refresh);
                msg.set_handle(handle);
                msg
            }
            Request::Del(handle) => {
                let msg = Message::new();
                msg.set_op(Op::Delete);
                msg.set_handle(handle);
                msg
            }
        };
        msg.set_id(1);

        let mut conn = QueueConnection::new();
        if let Err(err) = self.engine.process(&msg, &mut conn) {
            return format!("error: {}\n", err)
        }
        match conn.take() {
            Some(outcome) => render(&outcome),
            None => "error: no reply\n".into()
        }
    }
}

fn render(msg: &Arc<Message>) -> String {
    match msg.op() {
        Some(Op::Update) => {
            let mut res = format!("handle={}", msg.handle());
            if let Some(obj) = msg.object() {
                let mut bag = Generic::new();
                if obj.stuff_values(&mut bag).is_ok() {
                    for item in bag.iter() {
                        res.push_str(&format!(" {}={}", item.name,
                                              render_value(&item.value)));
                    }
                }
            }
            res.push('\n');
            res
        }
        Some(Op::Status) => {
            let code = msg.get_value(&DataString::from("result")).ok()
                          .and_then(|value| value.int_value().ok())
                          .unwrap_or(0);
            let text = msg.get_value(&DataString::from("message")).ok()
                          .and_then(|value| value.text().ok());
            match text {
                Some(text) => format!("status {}: {}\n", code, text),
                None => format!("status {}\n", code)
            }
        }
        _ => "error: unexpected reply\n".into()
    }
}

fn render_value(value: &TypedData) -> String {
    match *value {
        TypedData::Int(v) => format!("{}", v),
        TypedData::String(ref s) => format!("{}", s),
        TypedData::Data(ref d) => format!("{:?}", d),
        TypedData::Object(_) => "<object>".into(),
        TypedData::List(_) => "<list>".into(),
    }
}


//============ The Host Type =================================================

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


//============ Configuration =================================================

//------------ Config --------------------------------------------------------

/// The configuration.
struct Config {
    addr: String,
    workers: usize,
}

impl Config {
    /// Creates a new default configuration.
    fn new() -> Self {
        Config {
            addr: "127.0.0.1:7911".into(),
            workers: 4,
        }
    }

    /// Creates a config from the command line arguments.
    fn from_args() -> Self {
        let mut res = Config::new();
        res.parse_args();
        res
    }

    fn parse_args(&mut self) {
        use argparse::{ArgumentParser, Store};

        let mut parser = ArgumentParser::new();

        parser.refer(&mut self.addr)
              .add_option(&["-a", "--addr"], Store,
                          "address to listen on");
        parser.refer(&mut self.workers)
              .add_option(&["-w", "--workers"], Store,
                          "number of worker threads");

        parser.parse_args_or_exit();
    }
}
