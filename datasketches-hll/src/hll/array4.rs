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

//! 4-bit slot storage - two slots per byte, with overflow exceptions.
//!
//! Values are stored relative to the array's `cur_min`. A stored nibble of
//! [`AUX_TOKEN`] means the true value lives in the auxiliary hash map. The
//! coupon-update and minimum-shift logic that maintains that invariant is
//! in `array.rs`; this type owns only the packed bytes and the map.

use crate::hll::aux_map::AuxHashMap;

/// Nibble sentinel: "see the aux map for the true value".
pub(crate) const AUX_TOKEN: u8 = 15;

/// Number of bytes for k slots at 4 bits each.
pub(crate) fn hll4_arr_bytes(lg_config_k: u8) -> usize {
    1 << (lg_config_k - 1)
}

/// Two 4-bit values per byte; even slots in the low nibble, odd slots in
/// the high nibble.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Hll4Slots {
    bytes: Box<[u8]>,
    aux: Option<AuxHashMap>,
}

impl Hll4Slots {
    pub fn new(lg_config_k: u8) -> Self {
        Self {
            bytes: vec![0u8; hll4_arr_bytes(lg_config_k)].into_boxed_slice(),
            aux: None,
        }
    }

    /// Raw 4-bit value for a slot, not adjusted for cur_min.
    #[inline]
    pub fn get_raw(&self, slot: u32) -> u8 {
        debug_assert!((slot >> 1) < self.bytes.len() as u32);

        let byte = self.bytes[(slot >> 1) as usize];
        if slot & 1 == 0 { byte & 0x0F } else { byte >> 4 }
    }

    #[inline]
    pub fn put_raw(&mut self, slot: u32, value: u8) {
        debug_assert!(value <= AUX_TOKEN);
        debug_assert!((slot >> 1) < self.bytes.len() as u32);

        let byte_idx = (slot >> 1) as usize;
        let old_byte = self.bytes[byte_idx];
        self.bytes[byte_idx] = if slot & 1 == 0 {
            (old_byte & 0xF0) | (value & 0x0F)
        } else {
            (old_byte & 0x0F) | (value << 4)
        };
    }

    /// Resolved value for a slot: raw + cur_min, or the aux map entry when
    /// the raw nibble is the sentinel.
    pub fn get(&self, slot: u32, cur_min: u8) -> u8 {
        let raw = self.get_raw(slot);
        if raw < AUX_TOKEN {
            raw + cur_min
        } else {
            self.aux
                .as_ref()
                .expect("AUX_TOKEN present but no aux map")
                .get(slot)
                .expect("AUX_TOKEN present but slot not in aux map")
        }
    }

    pub fn aux(&self) -> Option<&AuxHashMap> {
        self.aux.as_ref()
    }

    pub fn aux_mut(&mut self) -> Option<&mut AuxHashMap> {
        self.aux.as_mut()
    }

    pub fn aux_or_insert(&mut self, lg_config_k: u8) -> &mut AuxHashMap {
        self.aux.get_or_insert_with(|| AuxHashMap::new(lg_config_k))
    }

    pub fn take_aux(&mut self) -> Option<AuxHashMap> {
        self.aux.take()
    }

    pub fn set_aux(&mut self, aux: Option<AuxHashMap>) {
        self.aux = aux;
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
        assert_eq!(hll4_arr_bytes(4), 8);
        assert_eq!(hll4_arr_bytes(10), 512);
    }

    #[test]
    fn test_nibble_packing() {
        let mut slots = Hll4Slots::new(4); // 16 slots

        slots.put_raw(0, 5);
        slots.put_raw(1, 7);
        assert_eq!(slots.get_raw(0), 5);
        assert_eq!(slots.get_raw(1), 7);
        // Both nibbles share byte 0: 0111_0101.
        assert_eq!(slots.bytes()[0], 0x75);

        slots.put_raw(2, 15);
        slots.put_raw(3, 3);
        assert_eq!(slots.get_raw(2), 15);
        assert_eq!(slots.get_raw(3), 3);
    }

    #[test]
    fn test_resolved_get_with_cur_min() {
        let mut slots = Hll4Slots::new(4);
        slots.put_raw(6, 9);
        assert_eq!(slots.get(6, 0), 9);
        assert_eq!(slots.get(6, 3), 12);
        assert_eq!(slots.get(5, 3), 3);
    }

    #[test]
    fn test_sentinel_resolves_through_aux() {
        let mut slots = Hll4Slots::new(7);
        slots.put_raw(11, AUX_TOKEN);
        slots.aux_or_insert(7).must_add(11, 21);
        assert_eq!(slots.get(11, 0), 21);
    }
}
