// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Variable-length integers, bounded reads over byte slices and the allocation limit.

use crate::{AvroResult, error::Details, schema::Documentation};
use serde_json::{Map, Value as JsonValue};
use std::sync::{
    Once,
    atomic::{AtomicUsize, Ordering},
};

/// Maximum number of bytes that can be allocated when decoding
/// Avro-encoded values. This is a protection against ill-formed
/// data, whose length field might be interpreted as enormous.
/// See [`max_allocation_bytes`] to change this limit.
pub const DEFAULT_MAX_ALLOCATION_BYTES: usize = 512 * 1024 * 1024;
static MAX_ALLOCATION_BYTES: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_ALLOCATION_BYTES);
static MAX_ALLOCATION_BYTES_ONCE: Once = Once::new();

/// Set a new maximum number of bytes that can be allocated when decoding data.
/// Once called, the limit cannot be changed.
///
/// **NOTE** This function must be called before decoding **any** data. The
/// limit is fixed either by the first call of this function or by the
/// first decode, whichever comes first.
pub fn max_allocation_bytes(num_bytes: usize) -> usize {
    MAX_ALLOCATION_BYTES_ONCE.call_once(|| {
        MAX_ALLOCATION_BYTES.store(num_bytes, Ordering::Release);
    });
    MAX_ALLOCATION_BYTES.load(Ordering::Acquire)
}

pub(crate) fn safe_len(len: usize) -> AvroResult<usize> {
    let max_bytes = max_allocation_bytes(DEFAULT_MAX_ALLOCATION_BYTES);

    if len <= max_bytes {
        Ok(len)
    } else {
        Err(Details::MemoryAllocation {
            desired: len,
            maximum: max_bytes,
        }
        .into())
    }
}

pub(crate) trait MapHelper {
    fn string(&self, key: &str) -> Option<String>;

    fn name(&self) -> Option<String> {
        self.string("name")
    }

    fn doc(&self) -> Documentation {
        self.string("doc")
    }

    fn aliases(&self) -> Option<Vec<String>>;
}

impl MapHelper for Map<String, JsonValue> {
    fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str()).map(str::to_string)
    }

    fn aliases(&self) -> Option<Vec<String>> {
        self.get("aliases")
            .and_then(|aliases| aliases.as_array())
            .and_then(|aliases| {
                aliases
                    .iter()
                    .map(|alias| alias.as_str().map(str::to_string))
                    .collect::<Option<_>>()
            })
    }
}

/// Appends the zig-zag varint encoding of `n` and returns the number of bytes written.
pub fn zig_i32(n: i32, buffer: &mut Vec<u8>) -> usize {
    zig_i64(i64::from(n), buffer)
}

/// Appends the zig-zag varint encoding of `n` and returns the number of bytes written.
pub fn zig_i64(n: i64, buffer: &mut Vec<u8>) -> usize {
    encode_variable(((n << 1) ^ (n >> 63)) as u64, buffer)
}

/// Reads a zig-zag varint that must fit in an `int`, advancing `reader` past it.
pub fn zag_i32(reader: &mut &[u8]) -> AvroResult<i32> {
    let i = zag_i64(reader)?;
    i32::try_from(i).map_err(|e| Details::ZagI32(e, i).into())
}

/// Reads a zig-zag varint, advancing `reader` past it.
pub fn zag_i64(reader: &mut &[u8]) -> AvroResult<i64> {
    let z = decode_variable(reader)?;
    Ok(if z & 0x1 == 0 {
        (z >> 1) as i64
    } else {
        !(z >> 1) as i64
    })
}

fn encode_variable(mut z: u64, buffer: &mut Vec<u8>) -> usize {
    let start = buffer.len();
    while z > 0x7F {
        buffer.push((0x80 | (z & 0x7F)) as u8);
        z >>= 7;
    }
    buffer.push(z as u8);
    buffer.len() - start
}

fn decode_variable(reader: &mut &[u8]) -> AvroResult<u64> {
    let mut i = 0u64;
    for j in 0..10 {
        let [byte] = read_array::<1>(reader)?;
        // The tenth byte only has room for the top bit of a u64.
        if j == 9 && byte > 1 {
            return Err(Details::IntegerOverflow.into());
        }
        i |= u64::from(byte & 0x7F) << (j * 7);
        if byte >> 7 == 0 {
            return Ok(i);
        }
    }
    Err(Details::IntegerOverflow.into())
}

/// Splits `n` bytes off the front of `reader`.
pub(crate) fn read_bytes<'a>(reader: &mut &'a [u8], n: usize) -> AvroResult<&'a [u8]> {
    if n > reader.len() {
        return Err(Details::Truncated {
            needed: n,
            remaining: reader.len(),
        }
        .into());
    }
    let (head, tail) = reader.split_at(n);
    *reader = tail;
    Ok(head)
}

pub(crate) fn read_array<const N: usize>(reader: &mut &[u8]) -> AvroResult<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_bytes(reader, N)?);
    Ok(out)
}

/// Reads a `long` length prefix, rejecting negative values and anything above the allocation limit.
pub(crate) fn read_len(reader: &mut &[u8]) -> AvroResult<usize> {
    let len = zag_i64(reader)?;
    let len = usize::try_from(len).map_err(|_| Details::NegativeLength(len))?;
    safe_len(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    type TestResult<T = ()> = anyhow::Result<T>;
    use pretty_assertions::assert_eq;

    fn zig(n: i64) -> Vec<u8> {
        let mut s = Vec::new();
        zig_i64(n, &mut s);
        s
    }

    #[test]
    fn test_zigzag() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        zig_i32(42i32, &mut a);
        zig_i64(42i64, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zig_i64() {
        assert_eq!(zig(0), [0]);
        assert_eq!(zig(-1), [1]);
        assert_eq!(zig(1), [2]);
        assert_eq!(zig(-64), [127]);
        assert_eq!(zig(64), [128, 1]);
        assert_eq!(zig(i32::MAX as i64), [254, 255, 255, 255, 15]);
        assert_eq!(zig(i32::MIN as i64 - 1), [129, 128, 128, 128, 16]);
        assert_eq!(zig(i64::MAX), [254, 255, 255, 255, 255, 255, 255, 255, 255, 1]);
        assert_eq!(zig(i64::MIN), [255, 255, 255, 255, 255, 255, 255, 255, 255, 1]);
    }

    #[test]
    fn test_zag_reads_back_and_advances() -> TestResult {
        for n in [0, -1, 1, 63, -64, 64, 300, i64::MAX, i64::MIN] {
            let mut bytes = zig(n);
            bytes.push(0xAA);
            let mut reader = &bytes[..];
            assert_eq!(zag_i64(&mut reader)?, n);
            assert_eq!(reader, [0xAA]);
        }
        Ok(())
    }

    #[test]
    fn test_zag_i32_out_of_range() {
        let bytes = zig(i64::from(i32::MAX) + 1);
        let err = zag_i32(&mut &bytes[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_truncated_varint() {
        let err = zag_i64(&mut &[0x80u8, 0x80][..]).unwrap_err();
        assert!(matches!(err.details(), Details::Truncated { .. }));
    }

    #[test]
    fn test_overflow() {
        let causes_overflow: &[u8] = &[0xe1; 11];
        assert!(matches!(
            decode_variable(&mut &*causes_overflow).unwrap_err().details(),
            Details::IntegerOverflow
        ));
        let tenth_byte_too_big: &[u8] = &[
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02,
        ];
        assert!(decode_variable(&mut &*tenth_byte_too_big).is_err());
    }

    #[test]
    fn test_read_len() -> TestResult {
        assert_eq!(read_len(&mut &[0x06u8][..])?, 3);
        assert!(matches!(
            read_len(&mut &[0x01u8][..]).unwrap_err().details(),
            Details::NegativeLength(-1)
        ));
        Ok(())
    }

    #[test]
    fn test_read_bytes() -> TestResult {
        let mut reader = &b"abcdef"[..];
        assert_eq!(read_bytes(&mut reader, 2)?, b"ab");
        assert_eq!(read_array::<3>(&mut reader)?, *b"cde");
        assert!(read_bytes(&mut reader, 2).is_err());
        Ok(())
    }

    #[test]
    fn test_safe_len() -> TestResult {
        assert_eq!(42usize, safe_len(42usize)?);
        assert!(safe_len(1024 * 1024 * 1024).is_err());
        Ok(())
    }
}
