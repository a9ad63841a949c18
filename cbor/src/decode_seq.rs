use super::decode::*;

/// A definite or indefinite length CBOR array (`D == 1`) or map (`D == 2`)
/// being parsed in place.
pub struct Sequence<'a, const D: usize> {
    data: &'a [u8],
    count: Option<usize>,
    offset: &'a mut usize,
    parsed: usize,
}

impl<'a, const D: usize> Sequence<'a, D> {
    pub(super) fn new(data: &'a [u8], count: Option<usize>, offset: &'a mut usize) -> Self {
        Self {
            data,
            count: count.map(|c| c.saturating_mul(D)),
            offset,
            parsed: 0,
        }
    }

    /// The number of entries, if the sequence is definite-length.
    pub fn len(&self) -> Option<usize> {
        self.count.map(|c| c / D)
    }

    pub fn is_definite(&self) -> bool {
        self.count.is_some()
    }

    /// The current offset, relative to the start of the enclosing buffer.
    pub fn offset(&self) -> usize {
        *self.offset
    }

    fn check_for_end(&mut self) -> Result<bool, Error> {
        match self.count {
            Some(count) => Ok(self.parsed >= count),
            None => match self.data.get(*self.offset) {
                None => Err(Error::NeedMoreData(1)),
                Some(0xFF) => {
                    if self.parsed % D != 0 {
                        return Err(Error::PartialMap);
                    }
                    *self.offset += 1;
                    self.count = Some(self.parsed);
                    Ok(true)
                }
                Some(_) => Ok(false),
            },
        }
    }

    /// Returns the offset just past the sequence if no items remain.
    pub fn end(&mut self) -> Result<Option<usize>, Error> {
        if self.check_for_end()? {
            Ok(Some(*self.offset))
        } else {
            Ok(None)
        }
    }

    pub(super) fn complete(mut self) -> Result<(), Error> {
        if self.check_for_end()? {
            Ok(())
        } else {
            Err(Error::AdditionalItems)
        }
    }

    pub fn skip_value(&mut self, max_recursion: usize) -> Result<Option<bool>, Error> {
        self.try_parse_value(|mut value, shortest, tags| {
            value
                .skip(max_recursion)
                .map(|s| s && shortest && tags.is_empty())
        })
        .map(|o| o.map(|(s, _)| s))
    }

    /// Skip every remaining item, returning `true` if all were in shortest form.
    pub fn skip_to_end(&mut self, max_recursion: usize) -> Result<bool, Error> {
        let mut shortest = true;
        while let Some(s) = self.skip_value(max_recursion)? {
            shortest = shortest && s;
        }
        Ok(shortest)
    }

    pub fn try_parse_value<T, F, E>(&mut self, f: F) -> Result<Option<(T, usize)>, E>
    where
        F: FnOnce(Value, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        if self.check_for_end()? {
            return Ok(None);
        }
        match try_parse_value(&self.data[*self.offset..], f)? {
            Some((v, len)) => {
                self.parsed += 1;
                *self.offset += len;
                Ok(Some((v, len)))
            }
            None => Err(Error::NeedMoreData(1).into()),
        }
    }

    pub fn parse_value<T, F, E>(&mut self, f: F) -> Result<(T, usize), E>
    where
        F: FnOnce(Value, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(f)?.ok_or(Error::NoMoreItems.into())
    }

    pub fn try_parse<T: FromCbor>(&mut self) -> Result<Option<(T, bool)>, T::Error> {
        if self.check_for_end()? {
            return Ok(None);
        }
        match T::try_from_cbor(&self.data[*self.offset..])? {
            Some((v, shortest, len)) => {
                self.parsed += 1;
                *self.offset += len;
                Ok(Some((v, shortest)))
            }
            None => Err(Error::NeedMoreData(1).into()),
        }
    }

    pub fn parse<T: FromCbor>(&mut self) -> Result<(T, bool), T::Error> {
        self.try_parse::<T>()?.ok_or(Error::NoMoreItems.into())
    }

    pub fn try_parse_array<T, F, E>(&mut self, f: F) -> Result<Option<(T, usize)>, E>
    where
        F: FnOnce(&mut Array, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        if self.check_for_end()? {
            return Ok(None);
        }
        match try_parse_array(&self.data[*self.offset..], f)? {
            Some((v, len)) => {
                self.parsed += 1;
                *self.offset += len;
                Ok(Some((v, len)))
            }
            None => Err(Error::NeedMoreData(1).into()),
        }
    }

    pub fn parse_array<T, F, E>(&mut self, f: F) -> Result<(T, usize), E>
    where
        F: FnOnce(&mut Array, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_array(f)?.ok_or(Error::NoMoreItems.into())
    }
}

impl<const D: usize> core::fmt::Debug for Sequence<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct(if D == 2 { "Map" } else { "Array" })
            .field("count", &self.len())
            .field("parsed", &(self.parsed / D))
            .field("offset", &self.offset)
            .finish()
    }
}
