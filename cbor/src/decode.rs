use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::ops::Range;
use thiserror::Error;

pub use super::decode_seq::Sequence;

pub type Array<'a> = Sequence<'a, 1>;
pub type Map<'a> = Sequence<'a, 2>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Need at least {0} more bytes of data")]
    NeedMoreData(usize),

    #[error("Invalid minor-type value {0}")]
    InvalidMinorValue(u8),

    #[error("Tags with no following value")]
    JustTags,

    #[error("Incorrect type, expecting {0}, found {1}")]
    IncorrectType(String, String),

    #[error("Chunked string contains an invalid chunk")]
    InvalidChunk,

    #[error("Invalid simple value {0}")]
    InvalidSimpleValue(u8),

    #[error("Map has key but no value")]
    PartialMap,

    #[error("Sequence has no more items")]
    NoMoreItems,

    #[error("Additional items found in sequence")]
    AdditionalItems,

    #[error("Maximum recursion depth reached")]
    MaxRecursion,

    #[error("Loss of precision when converting value")]
    PrecisionLoss,

    #[error(transparent)]
    InvalidUtf8(#[from] core::str::Utf8Error),

    #[error(transparent)]
    IntegerOverflow(#[from] core::num::TryFromIntError),
}

/// Types that can be decoded from the start of a CBOR buffer.
///
/// On success the implementation returns the value, whether every item that
/// made up the value was encoded in its shortest (canonical) form, and the
/// number of bytes consumed. `Ok(None)` means `data` was empty.
pub trait FromCbor: Sized {
    type Error: From<Error>;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error>;
}

#[derive(Debug)]
pub enum Value<'a, 'b> {
    UnsignedInteger(u64),
    NegativeInteger(u64),
    Bytes(&'a [u8]),
    ByteStream(Vec<&'a [u8]>),
    Text(&'a str),
    TextStream(Vec<&'a str>),
    Array(&'b mut Array<'a>),
    Map(&'b mut Map<'a>),
    False,
    True,
    Null,
    Undefined,
    Simple(u8),
    Float(f64),
}

impl Value<'_, '_> {
    pub fn type_name(&self, tagged: bool) -> String {
        let name = match self {
            Value::UnsignedInteger(_) => "Unsigned Integer",
            Value::NegativeInteger(_) => "Negative Integer",
            Value::Bytes(_) => "Definite-length Byte String",
            Value::ByteStream(_) => "Indefinite-length Byte String",
            Value::Text(_) => "Definite-length Text String",
            Value::TextStream(_) => "Indefinite-length Text String",
            Value::Array(a) if a.is_definite() => "Definite-length Array",
            Value::Array(_) => "Indefinite-length Array",
            Value::Map(m) if m.is_definite() => "Definite-length Map",
            Value::Map(_) => "Indefinite-length Map",
            Value::False | Value::True => "Boolean",
            Value::Null => "Null",
            Value::Undefined => "Undefined",
            Value::Simple(_) => "Simple Value",
            Value::Float(_) => "Float",
        };
        if tagged {
            format!("Tagged {name}")
        } else {
            name.to_string()
        }
    }

    /// Consume any nested items, returning `true` if they were all in shortest form.
    pub fn skip(&mut self, max_recursion: usize) -> Result<bool, Error> {
        match self {
            Value::Array(a) => {
                if max_recursion == 0 {
                    return Err(Error::MaxRecursion);
                }
                a.skip_to_end(max_recursion - 1)
            }
            Value::Map(m) => {
                if max_recursion == 0 {
                    return Err(Error::MaxRecursion);
                }
                m.skip_to_end(max_recursion - 1)
            }
            Value::ByteStream(_) | Value::TextStream(_) => Ok(false),
            _ => Ok(true),
        }
    }
}

fn take<const N: usize>(data: &[u8]) -> Result<[u8; N], Error> {
    let Some(bytes) = data.get(..N) else {
        return Err(Error::NeedMoreData(N - data.len()));
    };
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

fn parse_uint_minor(minor: u8, data: &[u8]) -> Result<(u64, usize, bool), Error> {
    match minor {
        0..=23 => Ok((minor as u64, 0, true)),
        24 => {
            let v = u8::from_be_bytes(take(data)?) as u64;
            Ok((v, 1, v >= 24))
        }
        25 => {
            let v = u16::from_be_bytes(take(data)?) as u64;
            Ok((v, 2, v > u8::MAX as u64))
        }
        26 => {
            let v = u32::from_be_bytes(take(data)?) as u64;
            Ok((v, 4, v > u16::MAX as u64))
        }
        27 => {
            let v = u64::from_be_bytes(take(data)?);
            Ok((v, 8, v > u32::MAX as u64))
        }
        _ => Err(Error::InvalidMinorValue(minor)),
    }
}

fn parse_data_minor(minor: u8, data: &[u8]) -> Result<(Range<usize>, usize, bool), Error> {
    let (data_len, offset, shortest) = parse_uint_minor(minor, data)?;
    let end = usize::try_from(data_len)?
        .checked_add(offset)
        .ok_or(Error::NeedMoreData(usize::MAX))?;
    if end > data.len() {
        Err(Error::NeedMoreData(end - data.len()))
    } else {
        Ok((offset..end, end, shortest))
    }
}

fn parse_data_chunked(major: u8, data: &[u8]) -> Result<(Vec<Range<usize>>, usize), Error> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    loop {
        let Some(&b) = data.get(offset) else {
            return Err(Error::NeedMoreData(1));
        };
        offset += 1;

        if b == 0xFF {
            return Ok((chunks, offset));
        }

        // Chunks must be definite-length strings of the same major type
        if b >> 5 != major || b & 0x1F == 31 {
            return Err(Error::InvalidChunk);
        }

        let (chunk, len, _) = parse_data_minor(b & 0x1F, &data[offset..])?;
        chunks.push(offset + chunk.start..offset + chunk.end);
        offset += len;
    }
}

fn parse_tags(data: &[u8]) -> Result<(Vec<u64>, usize, bool), Error> {
    let mut tags = Vec::new();
    let mut offset = 0;
    let mut shortest = true;
    while let Some(&b) = data.get(offset) {
        if b >> 5 != 6 {
            break;
        }
        offset += 1;
        let (tag, len, s) = parse_uint_minor(b & 0x1F, &data[offset..])?;
        tags.push(tag);
        offset += len;
        shortest = shortest && s;
    }
    Ok((tags, offset, shortest))
}

fn lossless_float<T>(value: f64) -> bool
where
    T: num_traits::FromPrimitive + Into<f64> + Copy,
{
    matches!(T::from_f64(value), Some(f) if f.into() == value)
}

/// Parse a single data item from the start of `data`.
///
/// `f` receives the value, whether its head (and any tags) were in shortest
/// form, and any tags. Returns the result of `f` plus the encoded length of
/// the item, or `None` if `data` is empty.
pub fn try_parse_value<T, F, E>(data: &[u8], f: F) -> Result<Option<(T, usize)>, E>
where
    F: FnOnce(Value, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    let (tags, mut offset, mut shortest) = parse_tags(data)?;
    let Some(&initial) = data.get(offset) else {
        return if tags.is_empty() {
            Ok(None)
        } else {
            Err(Error::JustTags.into())
        };
    };
    offset += 1;

    let r = match (initial >> 5, initial & 0x1F) {
        (0, minor) => {
            let (v, len, s) = parse_uint_minor(minor, &data[offset..])?;
            offset += len;
            f(Value::UnsignedInteger(v), shortest && s, &tags)?
        }
        (1, minor) => {
            let (v, len, s) = parse_uint_minor(minor, &data[offset..])?;
            offset += len;
            f(Value::NegativeInteger(v), shortest && s, &tags)?
        }
        (2, 31) => {
            let (chunks, len) = parse_data_chunked(2, &data[offset..])?;
            let chunks = chunks
                .into_iter()
                .map(|r| &data[offset + r.start..offset + r.end])
                .collect();
            offset += len;
            f(Value::ByteStream(chunks), false, &tags)?
        }
        (2, minor) => {
            let (r, len, s) = parse_data_minor(minor, &data[offset..])?;
            let bytes = &data[offset + r.start..offset + r.end];
            offset += len;
            f(Value::Bytes(bytes), shortest && s, &tags)?
        }
        (3, 31) => {
            let (chunks, len) = parse_data_chunked(3, &data[offset..])?;
            let chunks = chunks
                .into_iter()
                .map(|r| core::str::from_utf8(&data[offset + r.start..offset + r.end]))
                .collect::<Result<Vec<_>, _>>()
                .map_err(Error::from)?;
            offset += len;
            f(Value::TextStream(chunks), false, &tags)?
        }
        (3, minor) => {
            let (r, len, s) = parse_data_minor(minor, &data[offset..])?;
            let text =
                core::str::from_utf8(&data[offset + r.start..offset + r.end]).map_err(Error::from)?;
            offset += len;
            f(Value::Text(text), shortest && s, &tags)?
        }
        (major @ (4 | 5), minor) => {
            let count = if minor == 31 {
                None
            } else {
                let (count, len, s) = parse_uint_minor(minor, &data[offset..])?;
                offset += len;
                shortest = shortest && s;
                Some(usize::try_from(count).map_err(Error::from)?)
            };
            if major == 4 {
                let mut a = Array::new(data, count, &mut offset);
                let r = f(Value::Array(&mut a), shortest, &tags)?;
                a.complete()?;
                r
            } else {
                let mut m = Map::new(data, count, &mut offset);
                let r = f(Value::Map(&mut m), shortest, &tags)?;
                m.complete()?;
                r
            }
        }
        (7, 20) => f(Value::False, shortest, &tags)?,
        (7, 21) => f(Value::True, shortest, &tags)?,
        (7, 22) => f(Value::Null, shortest, &tags)?,
        (7, 23) => f(Value::Undefined, shortest, &tags)?,
        (7, minor @ 0..=19) => f(Value::Simple(minor), shortest, &tags)?,
        (7, 24) => {
            let v = u8::from_be_bytes(take(&data[offset..])?);
            if v < 32 {
                return Err(Error::InvalidSimpleValue(v).into());
            }
            offset += 1;
            f(Value::Simple(v), shortest, &tags)?
        }
        (7, 25) => {
            let v = half::f16::from_be_bytes(take(&data[offset..])?);
            offset += 2;
            f(Value::Float(v.into()), shortest, &tags)?
        }
        (7, 26) => {
            let v = f32::from_be_bytes(take(&data[offset..])?) as f64;
            offset += 4;
            f(
                Value::Float(v),
                shortest && !lossless_float::<half::f16>(v),
                &tags,
            )?
        }
        (7, 27) => {
            let v = f64::from_be_bytes(take(&data[offset..])?);
            offset += 8;
            f(
                Value::Float(v),
                shortest && !lossless_float::<half::f16>(v) && !lossless_float::<f32>(v),
                &tags,
            )?
        }
        (_, minor) => return Err(Error::InvalidMinorValue(minor).into()),
    };
    Ok(Some((r, offset)))
}

pub fn parse_value<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(Value, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_value(data, f)?.ok_or(Error::NeedMoreData(1).into())
}

pub fn try_parse_array<T, F, E>(data: &[u8], f: F) -> Result<Option<(T, usize)>, E>
where
    F: FnOnce(&mut Array, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_value(data, |value, shortest, tags| match value {
        Value::Array(a) => f(a, shortest, tags),
        value => Err(
            Error::IncorrectType("Array".to_string(), value.type_name(!tags.is_empty())).into(),
        ),
    })
}

pub fn parse_array<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Array, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_array(data, f)?.ok_or(Error::NeedMoreData(1).into())
}

pub fn try_parse_map<T, F, E>(data: &[u8], f: F) -> Result<Option<(T, usize)>, E>
where
    F: FnOnce(&mut Map, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_value(data, |value, shortest, tags| match value {
        Value::Map(m) => f(m, shortest, tags),
        value => Err(
            Error::IncorrectType("Map".to_string(), value.type_name(!tags.is_empty())).into(),
        ),
    })
}

pub fn parse_map<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Map, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_map(data, f)?.ok_or(Error::NeedMoreData(1).into())
}

#[inline]
pub fn try_parse<T: FromCbor>(data: &[u8]) -> Result<Option<(T, bool, usize)>, T::Error> {
    T::try_from_cbor(data)
}

/// Parse a value, also returning its shortest-form flag and encoded length.
pub fn parse_detail<T: FromCbor>(data: &[u8]) -> Result<(T, bool, usize), T::Error> {
    T::try_from_cbor(data)?.ok_or(Error::NeedMoreData(1).into())
}

pub fn parse<T: FromCbor>(data: &[u8]) -> Result<T, T::Error> {
    parse_detail(data).map(|(v, _, _)| v)
}

impl FromCbor for u64 {
    type Error = Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        try_parse_value(data, |value, shortest, tags| match value {
            Value::UnsignedInteger(v) => Ok((v, shortest && tags.is_empty())),
            value => Err(Error::IncorrectType(
                "Untagged Unsigned Integer".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

macro_rules! impl_uint_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                type Error = Error;

                fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
                    u64::try_from_cbor(data)?
                        .map(|(v, s, len)| Ok((<$ty>::try_from(v)?, s, len)))
                        .transpose()
                }
            }
        )*
    };
}

impl_uint_from_cbor!(u8, u16, u32, usize);

impl FromCbor for i64 {
    type Error = Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        try_parse_value::<_, _, Error>(data, |value, shortest, tags| match value {
            Value::UnsignedInteger(v) => Ok((i64::try_from(v)?, shortest && tags.is_empty())),
            Value::NegativeInteger(v) => Ok((-1 - i64::try_from(v)?, shortest && tags.is_empty())),
            value => Err(Error::IncorrectType(
                "Untagged Integer".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

macro_rules! impl_int_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                type Error = Error;

                fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
                    i64::try_from_cbor(data)?
                        .map(|(v, s, len)| Ok((<$ty>::try_from(v)?, s, len)))
                        .transpose()
                }
            }
        )*
    };
}

impl_int_from_cbor!(i8, i16, i32, isize);

impl FromCbor for f64 {
    type Error = Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        try_parse_value(data, |value, shortest, tags| match value {
            Value::Float(v) => Ok((v, shortest && tags.is_empty())),
            value => Err(Error::IncorrectType(
                "Untagged Float".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

impl FromCbor for f32 {
    type Error = Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        f64::try_from_cbor(data)?
            .map(|(v, s, len)| {
                if v.is_nan() || lossless_float::<f32>(v) {
                    Ok((v as f32, s, len))
                } else {
                    Err(Error::PrecisionLoss)
                }
            })
            .transpose()
    }
}

impl FromCbor for bool {
    type Error = Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        try_parse_value(data, |value, shortest, tags| match value {
            Value::False => Ok((false, shortest && tags.is_empty())),
            Value::True => Ok((true, shortest && tags.is_empty())),
            value => Err(Error::IncorrectType(
                "Untagged Boolean".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

impl FromCbor for String {
    type Error = Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        try_parse_value(data, |value, shortest, tags| match value {
            Value::Text(s) => Ok((s.to_string(), shortest && tags.is_empty())),
            Value::TextStream(chunks) => Ok((chunks.concat(), false)),
            value => Err(Error::IncorrectType(
                "Untagged Text String".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

impl FromCbor for Vec<u8> {
    type Error = Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        try_parse_value(data, |value, shortest, tags| match value {
            Value::Bytes(b) => Ok((b.to_vec(), shortest && tags.is_empty())),
            Value::ByteStream(chunks) => Ok((chunks.concat(), false)),
            value => Err(Error::IncorrectType(
                "Untagged Byte String".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}
