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

//! Block compression codecs of the object container format.

use crate::{
    AvroResult,
    error::Details,
    util::{DEFAULT_MAX_ALLOCATION_BYTES, max_allocation_bytes},
};
use std::borrow::Cow;
use strum_macros::{EnumString, IntoStaticStr};

/// Settings for the `Deflate` codec.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct DeflateSettings {
    compression_level: u8,
}

impl DeflateSettings {
    /// Creates settings with a level from 0 (no compression) to 10 (best compression).
    pub fn new(compression_level: u8) -> Self {
        DeflateSettings {
            compression_level: compression_level.min(10),
        }
    }

    pub fn compression_level(&self) -> u8 {
        self.compression_level
    }
}

impl Default for DeflateSettings {
    fn default() -> Self {
        Self::new(6)
    }
}

/// The compression codec used to compress blocks.
///
/// Parsed from and rendered to the `avro.codec` header value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab_case")]
pub enum Codec {
    /// Blocks are stored uncompressed.
    Null,
    /// Raw deflate as specified in RFC 1951, without the zlib header or checksum.
    Deflate(DeflateSettings),
    #[cfg(feature = "snappy")]
    /// Google's [Snappy](http://google.github.io/snappy/) compression. Each compressed
    /// block is followed by the 4-byte, big-endian CRC32 checksum of the uncompressed data.
    Snappy,
}

impl Codec {
    /// The `avro.codec` header value of this codec.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Compress a block of bytes in-place.
    pub fn compress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        match self {
            Codec::Null => (),
            Codec::Deflate(settings) => {
                *stream =
                    miniz_oxide::deflate::compress_to_vec(stream, settings.compression_level());
            }
            #[cfg(feature = "snappy")]
            Codec::Snappy => {
                let mut encoded: Vec<u8> = vec![0; snap::raw::max_compress_len(stream.len())];
                let compressed_size = snap::raw::Encoder::new()
                    .compress(&stream[..], &mut encoded[..])
                    .map_err(Details::SnappyCompress)?;

                let checksum = crc32fast::hash(&stream[..]).to_be_bytes();
                encoded.truncate(compressed_size);
                encoded.extend_from_slice(&checksum);
                *stream = encoded;
            }
        };
        Ok(())
    }

    /// Decompress a block of bytes, borrowing it unchanged for the null codec.
    pub fn decompress(self, block: &[u8]) -> AvroResult<Cow<'_, [u8]>> {
        let limit = max_allocation_bytes(DEFAULT_MAX_ALLOCATION_BYTES);
        Ok(match self {
            Codec::Null => Cow::Borrowed(block),
            Codec::Deflate(_) => Cow::Owned(
                miniz_oxide::inflate::decompress_to_vec_with_limit(block, limit)
                    .map_err(|e| Details::DeflateDecompress(format!("{:?}", e.status)))?,
            ),
            #[cfg(feature = "snappy")]
            Codec::Snappy => {
                let Some(split) = block.len().checked_sub(4) else {
                    return Err(Details::TruncatedContainer.into());
                };
                let (compressed, checksum) = block.split_at(split);
                let decompressed_size =
                    snap::raw::decompress_len(compressed).map_err(Details::SnappyDecompress)?;
                let mut decoded = vec![0; crate::util::safe_len(decompressed_size)?];
                snap::raw::Decoder::new()
                    .decompress(compressed, &mut decoded[..])
                    .map_err(Details::SnappyDecompress)?;

                let mut last_four: [u8; 4] = [0; 4];
                last_four.copy_from_slice(checksum);
                let expected = u32::from_be_bytes(last_four);
                let actual = crc32fast::hash(&decoded);
                if expected != actual {
                    return Err(Details::SnappyCrc32 { expected, actual }.into());
                }
                Cow::Owned(decoded)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    type TestResult<T = ()> = anyhow::Result<T>;
    use pretty_assertions::{assert_eq, assert_ne};
    use std::str::FromStr;

    const INPUT: &[u8] = b"theanswertolifetheuniverseandeverythingis42theanswertolifetheuniverseandeverythingis4theanswertolifetheuniverseandeverythingis2";

    #[test]
    fn null_compress_and_decompress() -> TestResult {
        let codec = Codec::Null;
        let mut stream = INPUT.to_vec();
        codec.compress(&mut stream)?;
        assert_eq!(INPUT, stream.as_slice());
        assert!(matches!(codec.decompress(&stream)?, Cow::Borrowed(_)));
        Ok(())
    }

    #[test]
    fn deflate_compress_and_decompress() -> TestResult {
        let codec = Codec::Deflate(DeflateSettings::default());
        let mut stream = INPUT.to_vec();
        codec.compress(&mut stream)?;
        assert_ne!(INPUT, stream.as_slice());
        assert!(INPUT.len() > stream.len());
        assert_eq!(INPUT, &*codec.decompress(&stream)?);
        Ok(())
    }

    #[test]
    fn deflate_rejects_garbage() {
        let err = Codec::Deflate(DeflateSettings::default())
            .decompress(&[0xff, 0xff, 0xff])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Container);
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn snappy_compress_and_decompress() -> TestResult {
        let codec = Codec::Snappy;
        let mut stream = INPUT.to_vec();
        codec.compress(&mut stream)?;
        assert_ne!(INPUT, stream.as_slice());
        assert!(INPUT.len() > stream.len());
        assert_eq!(INPUT, &*codec.decompress(&stream)?);

        let last = stream.len() - 1;
        stream[last] ^= 0xff;
        assert!(matches!(
            codec.decompress(&stream).unwrap_err().details(),
            Details::SnappyCrc32 { .. }
        ));
        Ok(())
    }

    #[test]
    fn codec_names() -> TestResult {
        assert_eq!(Codec::Null.name(), "null");
        assert_eq!(Codec::Deflate(DeflateSettings::default()).name(), "deflate");
        assert_eq!(Codec::from_str("null")?, Codec::Null);
        assert_eq!(
            Codec::from_str("deflate")?,
            Codec::Deflate(DeflateSettings::default())
        );
        assert!(Codec::from_str("lz4").is_err());
        #[cfg(feature = "snappy")]
        assert_eq!(Codec::from_str("snappy")?, Codec::Snappy);
        Ok(())
    }

    #[test]
    fn compression_level_is_clamped() {
        assert_eq!(DeflateSettings::new(42).compression_level(), 10);
    }
}
