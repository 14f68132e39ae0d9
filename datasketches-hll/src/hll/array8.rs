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

//! 8-bit slot storage - one byte per slot, no packing.

/// Number of bytes for k slots at 8 bits each.
pub(crate) fn hll8_arr_bytes(lg_config_k: u8) -> usize {
    1 << lg_config_k
}

/// One byte per slot: bytes[slot] = value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hll8Slots {
    bytes: Box<[u8]>,
}

impl Hll8Slots {
    pub fn new(lg_config_k: u8) -> Self {
        Self {
            bytes: vec![0u8; hll8_arr_bytes(lg_config_k)].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn get(&self, slot: u32) -> u8 {
        self.bytes[slot as usize]
    }

    #[inline]
    pub fn put(&mut self, slot: u32, value: u8) {
        self.bytes[slot as usize] = value;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
