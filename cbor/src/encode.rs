/*!
CBOR encoding, limited to the shapes bundles are built from: unsigned and
negative integers, booleans, `undefined`, byte and text strings, arrays, and
pre-encoded items.

Everything is emitted in shortest form, and every array is either
definite-length, with the count checked as items are added, or
indefinite-length.
*/

use alloc::{boxed::Box, string::String, vec::Vec};

pub trait ToCbor {
    fn to_cbor(&self, encoder: &mut Encoder);
}

/// Pre-encoded CBOR, written verbatim.
#[derive(Debug, Clone, Copy)]
pub struct Raw<'a>(pub &'a [u8]);

const UINT: u8 = 0;
const NEGINT: u8 = 1;
const BYTES: u8 = 2;
const TEXT: u8 = 3;
const ARRAY: u8 = 4;
const SIMPLE: u8 = 7;

const FALSE: u8 = 20;
const TRUE: u8 = 21;
const UNDEFINED: u8 = 23;
const INDEFINITE: u8 = 31;
const BREAK: u8 = 0xFF;

#[derive(Default)]
pub struct Encoder {
    data: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    pub fn offset(&self) -> usize {
        self.data.len()
    }

    /// Writes an item head: the major type, and `arg` in as few bytes as it
    /// fits.
    fn head(&mut self, major: u8, arg: u64) {
        let major = major << 5;
        match arg {
            0..24 => self.data.push(major | arg as u8),
            24..0x100 => self.data.extend([major | 24, arg as u8]),
            0x100..0x1_0000 => {
                self.data.push(major | 25);
                self.data.extend((arg as u16).to_be_bytes());
            }
            0x1_0000..0x1_0000_0000 => {
                self.data.push(major | 26);
                self.data.extend((arg as u32).to_be_bytes());
            }
            _ => {
                self.data.push(major | 27);
                self.data.extend(arg.to_be_bytes());
            }
        }
    }

    fn string(&mut self, major: u8, bytes: &[u8]) {
        self.head(major, bytes.len() as u64);
        self.data.extend_from_slice(bytes);
    }

    pub fn emit_raw_slice(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data)
    }

    pub fn emit<T>(&mut self, value: &T)
    where
        T: ToCbor + ?Sized,
    {
        value.to_cbor(self)
    }

    /// Emits an array of `count` items, or an indefinite-length array if
    /// `count` is `None`.
    ///
    /// # Panics
    ///
    /// If `f` does not add exactly `count` items.
    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        let start = self.offset();
        match count {
            Some(count) => self.head(ARRAY, count as u64),
            None => self.data.push((ARRAY << 5) | INDEFINITE),
        }
        let mut a = Array {
            encoder: self,
            start,
            remaining: count,
        };
        f(&mut a);
        match a.remaining {
            None => a.encoder.data.push(BREAK),
            Some(0) => {}
            Some(n) => panic!("Definite length array is short of {n} items"),
        }
    }
}

/// An array being emitted.
pub struct Array<'a> {
    encoder: &'a mut Encoder,
    start: usize,
    remaining: Option<usize>,
}

impl Array<'_> {
    /// The number of bytes written since the start of the array header.
    pub fn offset(&self) -> usize {
        self.encoder.offset() - self.start
    }

    fn next_item(&mut self) -> &mut Encoder {
        if let Some(remaining) = &mut self.remaining {
            assert!(*remaining > 0, "Too many items added to definite length array");
            *remaining -= 1;
        }
        self.encoder
    }

    /// Counts an item that the caller will append after the array is built.
    pub fn skip_value(&mut self) {
        self.next_item();
    }

    pub fn emit_raw_slice(&mut self, data: &[u8]) {
        self.next_item().emit_raw_slice(data)
    }

    pub fn emit<T>(&mut self, value: &T)
    where
        T: ToCbor + ?Sized,
    {
        self.next_item().emit(value)
    }

    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        self.next_item().emit_array(count, f)
    }
}

macro_rules! impl_uint_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.head(UINT, *self as u64);
                }
            }
        )*
    };
}

impl_uint_to_cbor!(u8, u16, u32, u64, usize);

macro_rules! impl_int_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    let v = *self as i64;
                    match u64::try_from(v) {
                        Ok(v) => encoder.head(UINT, v),
                        // -1 - v, without overflowing on i64::MIN
                        Err(_) => encoder.head(NEGINT, !(v as u64)),
                    }
                }
            }
        )*
    };
}

impl_int_to_cbor!(i8, i16, i32, i64, isize);

impl ToCbor for bool {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.head(SIMPLE, u64::from(if *self { TRUE } else { FALSE }))
    }
}

impl ToCbor for str {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.string(TEXT, self.as_bytes())
    }
}

impl ToCbor for String {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.string(TEXT, self.as_bytes())
    }
}

impl ToCbor for Box<str> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.string(TEXT, self.as_bytes())
    }
}

impl ToCbor for [u8] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.string(BYTES, self)
    }
}

impl ToCbor for Vec<u8> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.string(BYTES, self)
    }
}

impl ToCbor for Box<[u8]> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.string(BYTES, self)
    }
}

impl<const N: usize> ToCbor for [u8; N] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.string(BYTES, self)
    }
}

impl ToCbor for Raw<'_> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_raw_slice(self.0)
    }
}

/// `None` is emitted as `undefined`.
impl<T> ToCbor for Option<T>
where
    T: ToCbor,
{
    fn to_cbor(&self, encoder: &mut Encoder) {
        match self {
            Some(value) => encoder.emit(value),
            None => encoder.head(SIMPLE, u64::from(UNDEFINED)),
        }
    }
}

impl<T> ToCbor for &T
where
    T: ToCbor + ?Sized,
{
    fn to_cbor(&self, encoder: &mut Encoder) {
        (**self).to_cbor(encoder)
    }
}

impl<A, B> ToCbor for (A, B)
where
    A: ToCbor,
    B: ToCbor,
{
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.0);
            a.emit(&self.1);
        })
    }
}

pub fn emit<T>(value: &T) -> Vec<u8>
where
    T: ToCbor + ?Sized,
{
    let mut e = Encoder::new();
    e.emit(value);
    e.build()
}

pub fn emit_array<F>(count: Option<usize>, f: F) -> Vec<u8>
where
    F: FnOnce(&mut Array),
{
    let mut e = Encoder::new();
    e.emit_array(count, f);
    e.build()
}
