//! The server-side object registry.
//!
//! Everything the protocol can manipulate is an object: a typed bundle of
//! named values living in a layered stack. The `inner` direction of a stack
//! points at the more concrete representation and owns it; `outer` is a
//! weak back-reference only used for upward notification, so a stack never
//! keeps itself alive.
//!
//! Operations that an object doesn’t recognize are handed down the stack
//! toward `inner`. The innermost layer of most stacks is a [GenericObject],
//! a plain value bag that accepts anything.
//!
//! Object types are described by an [ObjectClass], the protocol’s version
//! of a vtable: it knows how to look instances up by a key specification,
//! how to create them and how to remove them. Classes are registered with
//! a [Registry] under their case-sensitive name. The registry also hands
//! out integer handles for objects: a handle encodes a table slot and a
//! generation so that a stale handle can never reach an object that reused
//! the slot.
//!
//! [GenericObject]: struct.GenericObject.html
//! [ObjectClass]: trait.ObjectClass.html
//! [Registry]: struct.Registry.html

use std::sync::{Arc, Mutex, Weak};
use super::data::{DataString, Generic, TypedData};
use ::error::{Error, Result};


//------------ ObjectRef ----------------------------------------------------

/// A shared reference to an object.
pub type ObjectRef = Arc<Object>;


//------------ Object -------------------------------------------------------

/// A node in a layered object stack.
///
/// The default method implementations defer everything to the `inner`
/// layer, so a concrete type only implements the operations it actually
/// recognizes and lets the rest fall through.
pub trait Object: Send + Sync {
    /// The name of this object’s type.
    fn type_name(&self) -> &str;

    /// The next, more concrete layer of the stack.
    fn inner(&self) -> Option<ObjectRef> {
        None
    }

    /// The wrapping layer of the stack, if it is still alive.
    fn outer(&self) -> Option<ObjectRef> {
        None
    }

    /// Stores a named value if this layer recognizes the name.
    fn set_value(&self, name: &DataString, value: TypedData) -> Result<()> {
        match self.inner() {
            Some(inner) => inner.set_value(name, value),
            None => Err(Error::NotFound)
        }
    }

    /// Retrieves a named value.
    fn get_value(&self, name: &DataString) -> Result<TypedData> {
        match self.inner() {
            Some(inner) => inner.get_value(name),
            None => Err(Error::NotFound)
        }
    }

    /// Delivers a named event.
    fn signal(&self, name: &str, args: &SignalArgs) -> Result<()> {
        match self.inner() {
            Some(inner) => inner.signal(name, args),
            None => Err(Error::NotFound)
        }
    }

    /// Writes all published values of this object into `out`.
    fn stuff_values(&self, out: &mut Generic) -> Result<()> {
        match self.inner() {
            Some(inner) => inner.stuff_values(out),
            None => Ok(())
        }
    }
}


//------------ SignalArgs ---------------------------------------------------

/// The payload of a signal.
///
/// The only signal the message engine emits is `"status"`, carrying the
/// wire code of a completed request and an optional human-readable text.
#[derive(Clone, Debug)]
pub struct SignalArgs {
    pub result: u32,
    pub message: Option<String>,
}

impl SignalArgs {
    pub fn status(result: u32, message: Option<String>) -> Self {
        SignalArgs { result: result, message: message }
    }
}


//------------ GenericObject ------------------------------------------------

/// The innermost layer of most stacks: a bag that takes any value.
pub struct GenericObject {
    values: Mutex<Generic>,
    outer: Mutex<Option<Weak<Object>>>,
}

impl GenericObject {
    pub fn new() -> Arc<Self> {
        Arc::new(GenericObject {
            values: Mutex::new(Generic::new()),
            outer: Mutex::new(None),
        })
    }

    pub fn from_bag(bag: Generic) -> Arc<Self> {
        Arc::new(GenericObject {
            values: Mutex::new(bag),
            outer: Mutex::new(None),
        })
    }

    /// Installs the weak back-reference to the wrapping layer.
    pub fn set_outer(&self, outer: &ObjectRef) {
        let mut slot = self.outer.lock().unwrap();
        *slot = Some(Arc::downgrade(outer));
    }
}

impl Object for GenericObject {
    fn type_name(&self) -> &str {
        "generic"
    }

    fn outer(&self) -> Option<ObjectRef> {
        let slot = self.outer.lock().unwrap();
        slot.as_ref().and_then(|weak| weak.upgrade())
    }

    fn set_value(&self, name: &DataString, value: TypedData) -> Result<()> {
        let mut values = self.values.lock().unwrap();
        values.set(name.clone(), value);
        Ok(())
    }

    fn get_value(&self, name: &DataString) -> Result<TypedData> {
        let values = self.values.lock().unwrap();
        match values.get(name) {
            Some(value) => Ok(value.clone()),
            None => Err(Error::NotFound)
        }
    }

    fn stuff_values(&self, out: &mut Generic) -> Result<()> {
        let values = self.values.lock().unwrap();
        for item in values.iter() {
            out.set(item.name.clone(), item.value.clone());
        }
        Ok(())
    }
}


//------------ Freestanding Functions ---------------------------------------

/// Applies a specification to an object.
///
/// Every value of `src` is stored into `target`. If the peer supplied its
/// own handle for the object, it is recorded under `remote-handle` for
/// types that care; types that don’t simply won’t recognize the name.
pub fn update(target: &ObjectRef, src: &ObjectRef, handle: u32)
              -> Result<()> {
    let mut bag = Generic::new();
    try!(src.stuff_values(&mut bag));
    for item in bag.iter() {
        try!(target.set_value(&item.name, item.value.clone()));
    }
    if handle != 0 {
        let name = DataString::from("remote-handle");
        match target.set_value(&name, TypedData::Int(handle as u64)) {
            Ok(()) | Err(Error::NotFound) => { }
            Err(err) => return Err(err)
        }
    }
    Ok(())
}


//------------ ObjectClass --------------------------------------------------

/// The type descriptor for a kind of object.
///
/// All hooks default to `NotImplemented`, which the message engine treats
/// the same as the hook being absent.
pub trait ObjectClass: Send + Sync {
    /// The case-sensitive type name used on the wire.
    fn name(&self) -> &str;

    /// Whether this type can be searched at all.
    ///
    /// Types that override [lookup()](#method.lookup) override this too;
    /// the message engine checks it before it even looks for a key.
    fn has_lookup(&self) -> bool {
        false
    }

    /// Finds an object by a key specification.
    ///
    /// `NotFound` and `NoKeys` are ordinary outcomes; anything else aborts
    /// the operation that asked.
    fn lookup(&self, _key: &ObjectRef) -> Result<ObjectRef> {
        Err(Error::NotImplemented)
    }

    /// Constructs a fresh instance.
    fn create(&self) -> Result<ObjectRef> {
        Err(Error::NotImplemented)
    }

    /// Deletes an instance from server-side state.
    fn remove(&self, _obj: &ObjectRef) -> Result<()> {
        Err(Error::NotImplemented)
    }
}


//------------ Registry -----------------------------------------------------

/// The typed-object registry: classes by name, objects by handle.
pub struct Registry {
    classes: Vec<Arc<ObjectClass>>,
    handles: HandleTable,
}

impl Registry {
    pub fn new() -> Self {
        Registry { classes: Vec::new(), handles: HandleTable::new() }
    }

    /// Registers an object class under its name.
    pub fn register_class(&mut self, class: Arc<ObjectClass>) -> Result<()> {
        if self.find_class(class.name()).is_some() {
            return Err(Error::Exists)
        }
        self.classes.push(class);
        Ok(())
    }

    pub fn find_class(&self, name: &str) -> Option<&Arc<ObjectClass>> {
        self.classes.iter().find(|class| class.name() == name)
    }

    /// Finds a class whose name matches a wire `type` value.
    pub fn find_class_by_value(&self, value: &TypedData)
                               -> Option<&Arc<ObjectClass>> {
        self.classes.iter().find(|class| value.matches(class.name()))
    }

    /// Mints a handle for an object.
    pub fn register_object(&mut self, obj: ObjectRef) -> Result<u32> {
        self.handles.register(obj)
    }

    /// Resolves a handle, fencing stale generations.
    pub fn handle_lookup(&self, handle: u32) -> Result<ObjectRef> {
        self.handles.lookup(handle)
    }

    /// Returns the handle for an object, minting one if necessary.
    pub fn handle_for(&mut self, obj: &ObjectRef) -> Result<u32> {
        match self.handles.find(obj) {
            Some(handle) => Ok(handle),
            None => self.handles.register(obj.clone())
        }
    }

    /// Drops the handle binding of an object, if it has one.
    pub fn release_object(&mut self, obj: &ObjectRef) {
        if let Some(handle) = self.handles.find(obj) {
            self.handles.release(handle);
        }
    }
}


//------------ HandleTable --------------------------------------------------

/// Generational handle table.
///
/// A handle packs a slot index into the low half and the slot’s generation
/// into the high half. Zero is reserved for “no handle”. Releasing a slot
/// bumps its generation, so handles minted for an earlier occupant stop
/// resolving.
struct HandleTable {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

struct Slot {
    generation: u16,
    obj: Option<ObjectRef>,
}

const MAX_SLOTS: usize = 0xffff;

impl HandleTable {
    fn new() -> Self {
        HandleTable { slots: Vec::new(), free: Vec::new() }
    }

    fn compose(index: usize, generation: u16) -> u32 {
        ((generation as u32) << 16) | (index as u32 + 1)
    }

    fn decompose(handle: u32) -> Option<(usize, u16)> {
        let low = handle & 0xffff;
        if low == 0 {
            return None
        }
        Some((low as usize - 1, (handle >> 16) as u16))
    }

    fn register(&mut self, obj: ObjectRef) -> Result<u32> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.obj = Some(obj);
            return Ok(HandleTable::compose(index, slot.generation))
        }
        if self.slots.len() == MAX_SLOTS {
            return Err(Error::NoMemory)
        }
        self.slots.push(Slot { generation: 0, obj: Some(obj) });
        Ok(HandleTable::compose(self.slots.len() - 1, 0))
    }

    fn lookup(&self, handle: u32) -> Result<ObjectRef> {
        let (index, generation) = match HandleTable::decompose(handle) {
            Some(parts) => parts,
            None => return Err(Error::NotFound)
        };
        match self.slots.get(index) {
            Some(slot) if slot.generation == generation => {
                match slot.obj {
                    Some(ref obj) => Ok(obj.clone()),
                    None => Err(Error::NotFound)
                }
            }
            _ => Err(Error::NotFound)
        }
    }

    fn find(&self, obj: &ObjectRef) -> Option<u32> {
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(ref live) = slot.obj {
                if Arc::ptr_eq(live, obj) {
                    return Some(HandleTable::compose(index, slot.generation))
                }
            }
        }
        None
    }

    fn release(&mut self, handle: u32) {
        let (index, generation) = match HandleTable::decompose(handle) {
            Some(parts) => parts,
            None => return
        };
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.generation == generation && slot.obj.is_some() {
                slot.obj = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
    }
}


//============ Test ==========================================================
