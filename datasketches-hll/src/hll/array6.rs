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

//! 6-bit slot storage - values packed as a contiguous bitstream.
//!
//! Slots may span byte boundaries, so get/put work through a 16-bit
//! little-endian window around the slot's starting bit.

const VAL_MASK_6: u16 = 0x3F;

/// Number of bytes for k slots at 6 bits each.
///
/// k * 3/4 bytes of payload, plus one trailing byte so the 16-bit window
/// read of the last slot stays in bounds.
pub(crate) fn hll6_arr_bytes(lg_config_k: u8) -> usize {
    let k = 1usize << lg_config_k;
    ((k * 3) >> 2) + 1
}

/// 6-bit values packed across byte boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hll6Slots {
    bytes: Box<[u8]>,
}

impl Hll6Slots {
    pub fn new(lg_config_k: u8) -> Self {
        Self {
            bytes: vec![0u8; hll6_arr_bytes(lg_config_k)].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn get(&self, slot: u32) -> u8 {
        let start_bit = slot * 6;
        let byte_idx = (start_bit >> 3) as usize;
        let shift = (start_bit & 7) as u8;

        let two_bytes = u16::from_le_bytes([self.bytes[byte_idx], self.bytes[byte_idx + 1]]);
        ((two_bytes >> shift) & VAL_MASK_6) as u8
    }

    #[inline]
    pub fn put(&mut self, slot: u32, value: u8) {
        debug_assert!(value <= 63, "6-bit value must be 0-63");

        let start_bit = slot * 6;
        let byte_idx = (start_bit >> 3) as usize;
        let shift = (start_bit & 7) as u8;

        // Read-modify-write the 16-bit window to preserve neighboring slots.
        let mut two_bytes = u16::from_le_bytes([self.bytes[byte_idx], self.bytes[byte_idx + 1]]);
        two_bytes &= !(VAL_MASK_6 << shift);
        two_bytes |= ((value as u16) & VAL_MASK_6) << shift;

        let out = two_bytes.to_le_bytes();
        self.bytes[byte_idx] = out[0];
        self.bytes[byte_idx + 1] = out[1];
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_size() {
        // k=16: 96 bits = 12 bytes payload + 1
        assert_eq!(hll6_arr_bytes(4), 13);
        // k=1024: 6144 bits = 768 bytes payload + 1
        assert_eq!(hll6_arr_bytes(10), 769);
    }

    #[test]
    fn test_get_put_all_slots() {
        let mut slots = Hll6Slots::new(6); // 64 slots

        for slot in 0..64u32 {
            slots.put(slot, (slot % 64) as u8);
        }
        for slot in 0..64u32 {
            assert_eq!(slots.get(slot), (slot % 64) as u8);
        }
    }

    #[test]
    fn test_boundary_crossing() {
        let mut slots = Hll6Slots::new(8);

        // Slot 1 starts at bit 6 and crosses the byte 0/1 boundary.
        slots.put(1, 0b111111);
        assert_eq!(slots.get(1), 63);

        // Slot 3 starts at bit 18 and crosses the byte 2/3 boundary.
        slots.put(3, 0b110011);
        assert_eq!(slots.get(3), 51);

        slots.put(2, 0b101010);
        assert_eq!(slots.get(2), 42);

        // Neighbors untouched.
        assert_eq!(slots.get(1), 63);
        assert_eq!(slots.get(3), 51);
        assert_eq!(slots.get(0), 0);
        assert_eq!(slots.get(4), 0);
    }
}
