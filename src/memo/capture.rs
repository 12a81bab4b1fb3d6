//! Argument Capture Module
//!
//! Records serialized arguments as an owned tree without losing structure.

use std::fmt::Display;

use serde::ser::{
    self, Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
};

// == Arg Value ==
/// Structural snapshot of one serialized argument.
///
/// `None` and `Some(_)` stay apart, tuples stay apart from sequences, and
/// floats are kept by bit pattern so NaN compares equal to itself. Integers
/// of any width compare by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArgValue {
    Unit,
    None,
    Some(Box<ArgValue>),
    Bool(bool),
    /// Negative integers
    Signed(i128),
    /// Zero and positive integers
    Unsigned(u128),
    /// IEEE-754 bits of the value widened to f64
    Float(u64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<ArgValue>),
    /// Tuples, tuple structs and fixed-size arrays
    Tuple(Vec<ArgValue>),
    /// Entries sorted by key
    Map(Vec<(ArgValue, ArgValue)>),
    Struct {
        name: &'static str,
        fields: Vec<(&'static str, ArgValue)>,
    },
    Variant {
        name: &'static str,
        variant: &'static str,
        payload: Box<ArgValue>,
    },
}

impl ArgValue {
    fn int(v: i128) -> Self {
        if v < 0 {
            Self::Signed(v)
        } else {
            Self::Unsigned(v as u128)
        }
    }

    fn float(v: f64) -> Self {
        Self::Float(v.to_bits())
    }
}

/// Error raised when a value refuses to serialize.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CaptureError(String);

impl ser::Error for CaptureError {
    fn custom<T: Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

/// Captures `value` through its `Serialize` impl.
pub fn capture<T: Serialize + ?Sized>(value: &T) -> Result<ArgValue, CaptureError> {
    value.serialize(ArgSerializer)
}

// == Serializer ==
struct ArgSerializer;

impl Serializer for ArgSerializer {
    type Ok = ArgValue;
    type Error = CaptureError;

    type SerializeSeq = SeqCapture;
    type SerializeTuple = SeqCapture;
    type SerializeTupleStruct = SeqCapture;
    type SerializeTupleVariant = SeqCapture;
    type SerializeMap = MapCapture;
    type SerializeStruct = StructCapture;
    type SerializeStructVariant = StructCapture;

    fn serialize_bool(self, v: bool) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::int(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Unsigned(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Unsigned(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Unsigned(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Unsigned(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Unsigned(v))
    }

    fn serialize_f32(self, v: f32) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::float(v))
    }

    fn serialize_char(self, v: char) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Char(v))
    }

    fn serialize_str(self, v: &str) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Str(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::None)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Some(Box::new(capture(value)?)))
    }

    fn serialize_unit(self) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Unit)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Struct {
            name,
            fields: Vec::new(),
        })
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Variant {
            name,
            variant,
            payload: Box::new(ArgValue::Unit),
        })
    }

    // Newtypes are transparent, as in serde_json
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<ArgValue, CaptureError> {
        capture(value)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<ArgValue, CaptureError> {
        Ok(ArgValue::Variant {
            name,
            variant,
            payload: Box::new(capture(value)?),
        })
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCapture, CaptureError> {
        Ok(SeqCapture::new(SeqKind::Seq, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCapture, CaptureError> {
        Ok(SeqCapture::new(SeqKind::Tuple, len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqCapture, CaptureError> {
        Ok(SeqCapture::new(SeqKind::Tuple, len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqCapture, CaptureError> {
        Ok(SeqCapture::new(SeqKind::Variant { name, variant }, len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapCapture, CaptureError> {
        Ok(MapCapture {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<StructCapture, CaptureError> {
        Ok(StructCapture {
            name,
            variant: None,
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<StructCapture, CaptureError> {
        Ok(StructCapture {
            name,
            variant: Some(variant),
            fields: Vec::with_capacity(len),
        })
    }
}

// == Compound Captures ==
enum SeqKind {
    Seq,
    Tuple,
    Variant {
        name: &'static str,
        variant: &'static str,
    },
}

struct SeqCapture {
    kind: SeqKind,
    items: Vec<ArgValue>,
}

impl SeqCapture {
    fn new(kind: SeqKind, len: usize) -> Self {
        Self {
            kind,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.items.push(capture(value)?);
        Ok(())
    }

    fn finish(self) -> ArgValue {
        match self.kind {
            SeqKind::Seq => ArgValue::Seq(self.items),
            SeqKind::Tuple => ArgValue::Tuple(self.items),
            SeqKind::Variant { name, variant } => ArgValue::Variant {
                name,
                variant,
                payload: Box::new(ArgValue::Tuple(self.items)),
            },
        }
    }
}

impl SerializeSeq for SeqCapture {
    type Ok = ArgValue;
    type Error = CaptureError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.push(value)
    }

    fn end(self) -> Result<ArgValue, CaptureError> {
        Ok(self.finish())
    }
}

impl SerializeTuple for SeqCapture {
    type Ok = ArgValue;
    type Error = CaptureError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.push(value)
    }

    fn end(self) -> Result<ArgValue, CaptureError> {
        Ok(self.finish())
    }
}

impl SerializeTupleStruct for SeqCapture {
    type Ok = ArgValue;
    type Error = CaptureError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.push(value)
    }

    fn end(self) -> Result<ArgValue, CaptureError> {
        Ok(self.finish())
    }
}

impl SerializeTupleVariant for SeqCapture {
    type Ok = ArgValue;
    type Error = CaptureError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.push(value)
    }

    fn end(self) -> Result<ArgValue, CaptureError> {
        Ok(self.finish())
    }
}

struct MapCapture {
    entries: Vec<(ArgValue, ArgValue)>,
    pending_key: Option<ArgValue>,
}

impl SerializeMap for MapCapture {
    type Ok = ArgValue;
    type Error = CaptureError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), CaptureError> {
        self.pending_key = Some(capture(key)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CaptureError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| CaptureError("map value without a key".to_string()))?;
        self.entries.push((key, capture(value)?));
        Ok(())
    }

    fn end(mut self) -> Result<ArgValue, CaptureError> {
        // Hash maps iterate in arbitrary order
        self.entries.sort();
        Ok(ArgValue::Map(self.entries))
    }
}

struct StructCapture {
    name: &'static str,
    variant: Option<&'static str>,
    fields: Vec<(&'static str, ArgValue)>,
}

impl StructCapture {
    fn finish(self) -> ArgValue {
        match self.variant {
            None => ArgValue::Struct {
                name: self.name,
                fields: self.fields,
            },
            Some(variant) => ArgValue::Variant {
                name: self.name,
                variant,
                payload: Box::new(ArgValue::Struct {
                    name: variant,
                    fields: self.fields,
                }),
            },
        }
    }
}

impl SerializeStruct for StructCapture {
    type Ok = ArgValue;
    type Error = CaptureError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CaptureError> {
        self.fields.push((key, capture(value)?));
        Ok(())
    }

    fn end(self) -> Result<ArgValue, CaptureError> {
        Ok(self.finish())
    }
}

impl SerializeStructVariant for StructCapture {
    type Ok = ArgValue;
    type Error = CaptureError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CaptureError> {
        self.fields.push((key, capture(value)?));
        Ok(())
    }

    fn end(self) -> Result<ArgValue, CaptureError> {
        Ok(self.finish())
    }
}

// == Serialize ==
/// Writes a captured value back out, for decoding it into a concrete type.
impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unit => serializer.serialize_unit(),
            Self::None => serializer.serialize_none(),
            Self::Some(inner) => serializer.serialize_some(inner),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Signed(v) => match i64::try_from(*v) {
                Ok(v) => serializer.serialize_i64(v),
                Err(_) => serializer.serialize_i128(*v),
            },
            Self::Unsigned(v) => match u64::try_from(*v) {
                Ok(v) => serializer.serialize_u64(v),
                Err(_) => serializer.serialize_u128(*v),
            },
            Self::Float(bits) => serializer.serialize_f64(f64::from_bits(*bits)),
            Self::Char(v) => serializer.serialize_char(*v),
            Self::Str(v) => serializer.serialize_str(v),
            Self::Bytes(v) => serializer.serialize_bytes(v),
            Self::Seq(items) | Self::Tuple(items) => serializer.collect_seq(items),
            Self::Map(entries) => serializer.collect_map(entries.iter().map(|(k, v)| (k, v))),
            Self::Struct { fields, .. } => {
                serializer.collect_map(fields.iter().map(|(name, v)| (*name, v)))
            }
            Self::Variant {
                variant, payload, ..
            } => match payload.as_ref() {
                Self::Unit => serializer.serialize_str(variant),
                payload => {
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry(variant, payload)?;
                    map.end()
                }
            },
        }
    }
}
