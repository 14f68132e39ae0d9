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

//! Auxiliary overflow map for the 4-bit array.
//!
//! An open-addressed table of (slot, value) pairs for slots whose value does
//! not fit in 4 bits above `cur_min`. Pairs use the coupon packing (slot in
//! the low 26 bits, value above), so a pair of 0 marks an empty cell - the
//! stored values are always >= 15 and never encode to 0.
//!
//! Collisions probe with an odd stride derived from the slot number, which
//! visits every cell of the power-of-two table exactly once.

use crate::hll::{RESIZE_DENOM, RESIZE_NUMER};
use crate::hll::{coupon_slot, coupon_value, pack_coupon};

/// Initial aux table size (log2 of u32 cells), indexed by lg_config_k.
pub(crate) const LG_AUX_ARR_INTS: [u8; 22] = [
    0, 2, 2, 2, 2, 2, 2, 3, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 11, 12, 13,
];

const EMPTY_PAIR: u32 = 0;

/// Open-addressed overflow table mapping slot number to true value.
#[derive(Debug, Clone)]
pub struct AuxHashMap {
    lg_config_k: u8,
    lg_aux_arr_ints: u8,
    aux_count: u32,
    aux_arr: Box<[u32]>,
}

impl AuxHashMap {
    pub(crate) fn new(lg_config_k: u8) -> Self {
        Self::with_lg_aux_arr_ints(lg_config_k, LG_AUX_ARR_INTS[lg_config_k as usize])
    }

    pub(crate) fn with_lg_aux_arr_ints(lg_config_k: u8, lg_aux_arr_ints: u8) -> Self {
        Self {
            lg_config_k,
            lg_aux_arr_ints,
            aux_count: 0,
            aux_arr: vec![EMPTY_PAIR; 1 << lg_aux_arr_ints].into_boxed_slice(),
        }
    }

    /// Rebuild a map around a deserialized updatable table image.
    pub(crate) fn from_raw(
        lg_config_k: u8,
        lg_aux_arr_ints: u8,
        aux_count: u32,
        aux_arr: Box<[u32]>,
    ) -> Self {
        debug_assert_eq!(aux_arr.len(), 1 << lg_aux_arr_ints);
        debug_assert_eq!(
            aux_arr.iter().filter(|&&p| p != EMPTY_PAIR).count(),
            aux_count as usize
        );
        Self {
            lg_config_k,
            lg_aux_arr_ints,
            aux_count,
            aux_arr,
        }
    }

    /// Number of populated entries.
    pub fn aux_count(&self) -> u32 {
        self.aux_count
    }

    /// Log2 of the backing table size in u32 cells.
    pub fn lg_aux_arr_ints(&self) -> u8 {
        self.lg_aux_arr_ints
    }

    pub(crate) fn aux_arr(&self) -> &[u32] {
        &self.aux_arr
    }

    /// True value for a slot, if present.
    pub fn get(&self, slot: u32) -> Option<u8> {
        match self.find(slot) {
            Ok(idx) => Some(coupon_value(self.aux_arr[idx])),
            Err(_) => None,
        }
    }

    /// Insert a new entry. The slot must not already be present; a
    /// duplicate insert means the sentinel invariant was broken upstream.
    pub(crate) fn must_add(&mut self, slot: u32, value: u8) {
        match self.find(slot) {
            Ok(_) => panic!("aux map: slot {slot} already present"),
            Err(idx) => {
                self.aux_arr[idx] = pack_coupon(slot, value);
                self.aux_count += 1;
                self.grow_if_needed();
            }
        }
    }

    /// Update an existing entry. The slot must be present.
    pub(crate) fn must_replace(&mut self, slot: u32, value: u8) {
        match self.find(slot) {
            Ok(idx) => self.aux_arr[idx] = pack_coupon(slot, value),
            Err(_) => panic!("aux map: slot {slot} not found for replace"),
        }
    }

    /// Iterate populated (slot, value) entries in table order.
    pub fn iter(&self) -> AuxIter<'_> {
        AuxIter {
            arr: &self.aux_arr,
            idx: 0,
        }
    }

    /// Locate a slot: Ok(index) when present, Err(insertion index) when not.
    fn find(&self, slot: u32) -> Result<usize, usize> {
        let aux_arr_mask = (1usize << self.lg_aux_arr_ints) - 1;
        let config_k_mask = (1u32 << self.lg_config_k) - 1;
        let mut probe = slot as usize & aux_arr_mask;
        let loop_index = probe;

        loop {
            let pair = self.aux_arr[probe];
            if pair == EMPTY_PAIR {
                return Err(probe);
            }
            if coupon_slot(pair) & config_k_mask == slot {
                return Ok(probe);
            }
            let stride = ((slot >> self.lg_aux_arr_ints) | 1) as usize;
            probe = (probe + stride) & aux_arr_mask;
            assert_ne!(probe, loop_index, "aux map full; no empty cells");
        }
    }

    fn grow_if_needed(&mut self) {
        if RESIZE_DENOM * self.aux_count <= RESIZE_NUMER * (self.aux_arr.len() as u32) {
            return;
        }

        let mut grown =
            Self::with_lg_aux_arr_ints(self.lg_config_k, self.lg_aux_arr_ints + 1);
        for (slot, value) in self.iter() {
            grown.must_add(slot, value);
        }
        debug_assert_eq!(grown.aux_count, self.aux_count);
        *self = grown;
    }
}

impl PartialEq for AuxHashMap {
    /// Content equality. Cell layout depends on insertion order, so two maps
    /// holding the same entries may differ byte-for-byte.
    fn eq(&self, other: &Self) -> bool {
        self.aux_count == other.aux_count
            && self
                .iter()
                .all(|(slot, value)| other.get(slot) == Some(value))
    }
}

/// Iterator over populated aux entries.
pub struct AuxIter<'a> {
    arr: &'a [u32],
    idx: usize,
}

impl Iterator for AuxIter<'_> {
    type Item = (u32, u8);

    fn next(&mut self) -> Option<(u32, u8)> {
        while self.idx < self.arr.len() {
            let pair = self.arr[self.idx];
            self.idx += 1;
            if pair != EMPTY_PAIR {
                return Some((coupon_slot(pair), coupon_value(pair)));
            }
        }
        None
    }
}
