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

//! Little-endian byte codec used by the sketch serialization format.

use std::io;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    pub fn write_u8(&mut self, n: u8) {
        // Vec<u8> as io::Write cannot fail
        WriteBytesExt::write_u8(&mut self.bytes, n).expect("write to Vec");
    }

    pub fn write_u32_le(&mut self, n: u32) {
        self.bytes
            .write_u32::<LittleEndian>(n)
            .expect("write to Vec");
    }

    pub fn write_f64_le(&mut self, n: f64) {
        self.bytes
            .write_f64::<LittleEndian>(n)
            .expect("write to Vec");
    }
}

pub(crate) struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl SketchSlice<'_> {
    pub fn new(slice: &[u8]) -> SketchSlice {
        SketchSlice {
            slice: Cursor::new(slice),
        }
    }

    pub fn remaining(&self) -> usize {
        let len = self.slice.get_ref().len() as u64;
        len.saturating_sub(self.slice.position()) as usize
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        ReadBytesExt::read_u8(&mut self.slice)
    }

    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        self.slice.read_u32::<LittleEndian>()
    }

    pub fn read_f64_le(&mut self) -> io::Result<f64> {
        self.slice.read_f64::<LittleEndian>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut out = SketchBytes::with_capacity(32);
        out.write_u8(7);
        out.write_u32_le(0xDEAD_BEEF);
        out.write_f64_le(1.5);
        out.write(&[1, 2, 3]);
        assert_eq!(out.len(), 16);

        let bytes = out.into_bytes();
        let mut input = SketchSlice::new(&bytes);
        assert_eq!(input.read_u8().unwrap(), 7);
        assert_eq!(input.read_u32_le().unwrap(), 0xDEAD_BEEF);
        assert_eq!(input.read_f64_le().unwrap(), 1.5);
        assert_eq!(input.remaining(), 3);

        let mut tail = [0u8; 3];
        input.read_exact(&mut tail).unwrap();
        assert_eq!(tail, [1, 2, 3]);
        assert!(input.read_u8().is_err());
    }
}
