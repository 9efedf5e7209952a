//! Typed values and value bags.
//!
//! Everything the management protocol moves around is a named, typed value:
//! message fields, object attributes, lookup keys. Names are plain byte
//! strings carried with an explicit length, so a NUL byte is data like any
//! other. Values are a tagged variant over the handful of datatypes the
//! protocol knows about.

use std::fmt;
use std::str;
use super::object::ObjectRef;
use ::error::{Error, Result};


//------------ DataString ---------------------------------------------------

/// A length-prefixed byte string used for names and text values.
#[derive(Clone, Eq, PartialEq)]
pub struct DataString(Vec<u8>);

impl DataString {
    pub fn new<T: Into<Vec<u8>>>(t: T) -> Self {
        DataString(t.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Compares against a static name, byte for byte.
    pub fn matches(&self, literal: &str) -> bool {
        self.0 == literal.as_bytes()
    }
}


//--- From

impl<'a> From<&'a str> for DataString {
    fn from(s: &'a str) -> Self {
        DataString(s.as_bytes().into())
    }
}


//--- Debug, Display

impl fmt::Debug for DataString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DataString({})", self)
    }
}

impl fmt::Display for DataString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:?}", self.0)
        }
    }
}


//------------ TypedData ----------------------------------------------------

/// A tagged protocol value.
#[derive(Clone)]
pub enum TypedData {
    Int(u64),
    String(DataString),
    Data(Vec<u8>),
    Object(ObjectRef),
    List(Vec<TypedData>),
}

impl fmt::Debug for TypedData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TypedData::Int(v) => write!(f, "Int({:?})", v),
            TypedData::String(ref v) => write!(f, "String({:?})", v),
            TypedData::Data(ref v) => write!(f, "Data({:?})", v),
            TypedData::Object(_) => write!(f, "Object(..)"),
            TypedData::List(ref v) => write!(f, "List({:?})", v),
        }
    }
}

impl TypedData {
    /// Returns the numeric value or `WrongType`.
    pub fn int_value(&self) -> Result<u64> {
        match *self {
            TypedData::Int(v) => Ok(v),
            _ => Err(Error::WrongType)
        }
    }

    /// Compares a string or data value against a static name.
    ///
    /// Any other variant never matches.
    pub fn matches(&self, literal: &str) -> bool {
        match *self {
            TypedData::String(ref s) => s.matches(literal),
            TypedData::Data(ref d) => *d == literal.as_bytes(),
            _ => false
        }
    }

    /// Returns the textual content of a string or data value.
    pub fn text(&self) -> Result<String> {
        let bytes = match *self {
            TypedData::String(ref s) => s.as_bytes(),
            TypedData::Data(ref d) => d,
            _ => return Err(Error::WrongType)
        };
        match str::from_utf8(bytes) {
            Ok(s) => Ok(s.into()),
            Err(_) => Err(Error::WrongType)
        }
    }

    /// Returns the object carried by an object value.
    pub fn object(&self) -> Result<ObjectRef> {
        match *self {
            TypedData::Object(ref obj) => Ok(obj.clone()),
            _ => Err(Error::WrongType)
        }
    }
}


//------------ Value --------------------------------------------------------

/// A named typed value.
#[derive(Clone, Debug)]
pub struct Value {
    pub name: DataString,
    pub value: TypedData,
}

impl Value {
    pub fn new<N: Into<DataString>>(name: N, value: TypedData) -> Self {
        Value { name: name.into(), value: value }
    }

    pub fn int<N: Into<DataString>>(name: N, value: u64) -> Self {
        Value::new(name, TypedData::Int(value))
    }

    pub fn string<N: Into<DataString>>(name: N, value: &str) -> Self {
        Value::new(name, TypedData::String(value.into()))
    }
}


//------------ Generic ------------------------------------------------------

/// An ordered bag of named values.
///
/// Lookup is a linear scan; bags stay small. No two values in a bag share
/// a name.
#[derive(Clone, Debug)]
pub struct Generic {
    values: Vec<Value>,
}

impl Generic {
    pub fn new() -> Self {
        Generic { values: Vec::new() }
    }

    /// Stores a value, replacing an earlier one of the same name.
    pub fn set<N: Into<DataString>>(&mut self, name: N, value: TypedData) {
        let name = name.into();
        for item in self.values.iter_mut() {
            if item.name == name {
                item.value = value;
                return;
            }
        }
        self.values.push(Value::new(name, value));
    }

    /// Stores a value that must not be present yet.
    pub fn insert<N: Into<DataString>>(&mut self, name: N, value: TypedData)
                                       -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(Error::Exists)
        }
        self.values.push(Value::new(name, value));
        Ok(())
    }

    pub fn get(&self, name: &DataString) -> Option<&TypedData> {
        self.values.iter().find(|item| item.name == *name)
                          .map(|item| &item.value)
    }

    pub fn get_str(&self, name: &str) -> Option<&TypedData> {
        self.get(&DataString::from(name))
    }

    pub fn iter(&self) -> ::std::slice::Iter<Value> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}


//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use ::error::Error;

    #[test]
    fn names_are_length_prefixed() {
        // A NUL byte is not a terminator.
        let name = DataString::new(&b"na\0me"[..]);
        assert!(!name.matches("na"));
        assert!(name.matches("na\0me"));
        assert!(!DataString::from("name").matches("nam"));
    }

    #[test]
    fn int_accessor() {
        assert_eq!(TypedData::Int(12).int_value().unwrap(), 12);
        match TypedData::String("12".into()).int_value() {
            Err(Error::WrongType) => { }
            other => panic!("unexpected result: {:?}", other)
        }
    }

    #[test]
    fn typed_matches() {
        assert!(TypedData::String("host".into()).matches("host"));
        assert!(TypedData::Data(b"host".to_vec()).matches("host"));
        assert!(!TypedData::Int(4).matches("4"));
    }

    #[test]
    fn bag_rejects_duplicates() {
        let mut bag = Generic::new();
        bag.insert("name", TypedData::Int(1)).unwrap();
        match bag.insert("name", TypedData::Int(2)) {
            Err(Error::Exists) => { }
            other => panic!("unexpected result: {:?}", other)
        }
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn bag_set_replaces() {
        let mut bag = Generic::new();
        bag.set("name", TypedData::Int(1));
        bag.set("name", TypedData::Int(2));
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.get_str("name").unwrap().int_value().unwrap(), 2);
    }
}
