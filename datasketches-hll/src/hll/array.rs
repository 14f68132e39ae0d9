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

//! Dense HLL array: base estimator state over variant slot storage.

use crate::hll::array4::{AUX_TOKEN, Hll4Slots, hll4_arr_bytes};
use crate::hll::array6::{Hll6Slots, hll6_arr_bytes};
use crate::hll::array8::{Hll8Slots, hll8_arr_bytes};
use crate::hll::aux_map::AuxHashMap;
use crate::hll::estimator;
use crate::hll::estimator::inv_pow2;
use crate::hll::iterator::HllPairIterator;
use crate::hll::relative_error;
use crate::hll::{HllType, MAX_LG_K, MIN_LG_K};
use crate::hll::{check_num_std_dev, coupon_slot, coupon_value, pack_coupon};

/// Packed slot bytes for the configured storage width.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slots {
    Hll4(Hll4Slots),
    Hll6(Hll6Slots),
    Hll8(Hll8Slots),
}

/// Number of slot-storage bytes for a given width and lg_config_k.
pub fn hll_arr_bytes(tgt_hll_type: HllType, lg_config_k: u8) -> usize {
    match tgt_hll_type {
        HllType::Hll4 => hll4_arr_bytes(lg_config_k),
        HllType::Hll6 => hll6_arr_bytes(lg_config_k),
        HllType::Hll8 => hll8_arr_bytes(lg_config_k),
    }
}

/// Dense HyperLogLog array.
///
/// Holds K = 2^lg_config_k counter slots in one of three packed widths,
/// together with the running estimator state: the HIP accumulator, the
/// split KxQ sums, and the minimum-tracking pair (`cur_min`,
/// `num_at_cur_min`). Updates are fed as coupons; estimates, bounds,
/// iteration and serialization are read-only queries.
#[derive(Debug, Clone, PartialEq)]
pub struct HllArray {
    pub(crate) lg_config_k: u8,
    /// Smallest value currently stored in any slot. Nonzero only for the
    /// 4-bit width, which re-bases its nibbles on this.
    pub(crate) cur_min: u8,
    /// Number of slots holding exactly cur_min; the zero-slot count while
    /// cur_min == 0.
    pub(crate) num_at_cur_min: u32,
    pub(crate) hip_accum: f64,
    /// Sum of 2^-value over slots with value < 32.
    pub(crate) kxq0: f64,
    /// Sum of 2^-value over slots with value >= 32.
    pub(crate) kxq1: f64,
    /// Set when slots were populated by a non-order-preserving operation;
    /// disables the HIP estimator.
    pub(crate) ooo_flag: bool,
    pub(crate) slots: Slots,
}

impl HllArray {
    /// Create an empty array with 2^lg_config_k slots.
    ///
    /// # Panics
    ///
    /// Panics unless `lg_config_k` is in [[`MIN_LG_K`], [`MAX_LG_K`]].
    pub fn new(lg_config_k: u8, tgt_hll_type: HllType) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
            "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}]; got {lg_config_k}"
        );

        let k = 1u32 << lg_config_k;
        let slots = match tgt_hll_type {
            HllType::Hll4 => Slots::Hll4(Hll4Slots::new(lg_config_k)),
            HllType::Hll6 => Slots::Hll6(Hll6Slots::new(lg_config_k)),
            HllType::Hll8 => Slots::Hll8(Hll8Slots::new(lg_config_k)),
        };

        Self {
            lg_config_k,
            cur_min: 0,
            num_at_cur_min: k,
            hip_accum: 0.0,
            // All slots start at 0, contributing 2^-0 = 1 each.
            kxq0: k as f64,
            kxq1: 0.0,
            ooo_flag: false,
            slots,
        }
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    pub fn tgt_hll_type(&self) -> HllType {
        match self.slots {
            Slots::Hll4(_) => HllType::Hll4,
            Slots::Hll6(_) => HllType::Hll6,
            Slots::Hll8(_) => HllType::Hll8,
        }
    }

    pub fn cur_min(&self) -> u8 {
        self.cur_min
    }

    pub fn num_at_cur_min(&self) -> u32 {
        self.num_at_cur_min
    }

    pub fn hip_accum(&self) -> f64 {
        self.hip_accum
    }

    pub fn kxq0(&self) -> f64 {
        self.kxq0
    }

    pub fn kxq1(&self) -> f64 {
        self.kxq1
    }

    pub fn is_out_of_order_flag(&self) -> bool {
        self.ooo_flag
    }

    /// Mark the array as populated out of insertion order (e.g. by a merge).
    /// The HIP accumulator is left in place but ignored until the flag is
    /// cleared.
    pub fn put_out_of_order_flag(&mut self, flag: bool) {
        self.ooo_flag = flag;
    }

    /// True iff no coupon has ever been applied.
    pub fn is_empty(&self) -> bool {
        self.cur_min == 0 && self.num_at_cur_min == 1u32 << self.lg_config_k
    }

    /// Size of the packed slot buffer in bytes.
    pub fn hll_byte_arr_bytes(&self) -> usize {
        hll_arr_bytes(self.tgt_hll_type(), self.lg_config_k)
    }

    /// Apply one coupon. A coupon that does not raise its slot's value is a
    /// no-op, so the call is idempotent and slot values never decrease.
    pub fn coupon_update(&mut self, coupon: u32) {
        let slot = coupon_slot(coupon) & ((1u32 << self.lg_config_k) - 1);
        let new_value = coupon_value(coupon);

        match self.slots {
            Slots::Hll4(_) => self.update_hll4(slot, new_value),
            _ => self.update_direct(slot, new_value),
        }
    }

    /// Resolved value of a slot; 4-bit sentinels are looked up in the aux
    /// map transparently.
    pub fn get_slot(&self, slot: u32) -> u8 {
        debug_assert!(slot < 1u32 << self.lg_config_k);

        match &self.slots {
            Slots::Hll4(s) => s.get(slot, self.cur_min),
            Slots::Hll6(s) => s.get(slot),
            Slots::Hll8(s) => s.get(slot),
        }
    }

    /// Current cardinality estimate: the HIP accumulator while insertion
    /// order is known, the composite estimate otherwise.
    pub fn get_estimate(&self) -> f64 {
        if self.ooo_flag {
            self.get_composite_estimate()
        } else {
            self.hip_accum
        }
    }

    /// Composite estimate: raw HLL estimator blended with the bit-map
    /// estimator in the low-fill regime.
    pub fn get_composite_estimate(&self) -> f64 {
        estimator::composite_estimate(
            self.lg_config_k,
            self.kxq0 + self.kxq1,
            self.cur_min,
            self.num_at_cur_min,
        )
    }

    /// Lower confidence bound at 1, 2, or 3 standard deviations.
    ///
    /// Never less than the number of slots known to be non-zero.
    ///
    /// # Panics
    ///
    /// Panics if `num_std_dev` is not 1, 2, or 3.
    pub fn get_lower_bound(&self, num_std_dev: u8) -> f64 {
        check_num_std_dev(num_std_dev);

        let k = 1u64 << self.lg_config_k;
        let num_non_zeros = if self.cur_min == 0 {
            k - self.num_at_cur_min as u64
        } else {
            k
        } as f64;

        let estimate = self.get_estimate();
        let rel_err = relative_error::rel_err(false, self.ooo_flag, self.lg_config_k, num_std_dev);
        (estimate / (1.0 + rel_err)).max(num_non_zeros)
    }

    /// Upper confidence bound at 1, 2, or 3 standard deviations.
    ///
    /// # Panics
    ///
    /// Panics if `num_std_dev` is not 1, 2, or 3.
    pub fn get_upper_bound(&self, num_std_dev: u8) -> f64 {
        check_num_std_dev(num_std_dev);

        let estimate = self.get_estimate();
        let rel_err = relative_error::rel_err(true, self.ooo_flag, self.lg_config_k, num_std_dev);
        estimate / (1.0 + rel_err)
    }

    /// The overflow map, when this is a 4-bit array that has spilled slots.
    pub fn get_aux_hash_map(&self) -> Option<&AuxHashMap> {
        match &self.slots {
            Slots::Hll4(s) => s.aux(),
            _ => None,
        }
    }

    /// Iterate (slot, value) pairs in ascending slot order.
    pub fn iter(&self) -> HllPairIterator<'_> {
        HllPairIterator::new(self)
    }

    /// Re-encode this array's logical contents at a different storage width.
    ///
    /// The result carries the same slot values, HIP accumulator and
    /// out-of-order state; estimates agree up to floating-point rounding of
    /// the re-accumulated KxQ sums.
    pub fn copy_as(&self, tgt_hll_type: HllType) -> HllArray {
        let mut out = HllArray::new(self.lg_config_k, tgt_hll_type);
        for (slot, value) in self.iter() {
            if value != 0 {
                out.coupon_update(pack_coupon(slot, value));
            }
        }
        out.hip_accum = self.hip_accum;
        out.ooo_flag = self.ooo_flag;
        out
    }

    /// Update rule shared by every accepted coupon: credit the HIP
    /// accumulator from the current KxQ sums, then move the old value's
    /// contribution to the new value's. Must run before the slot write.
    fn hip_and_kxq_update(&mut self, old_value: u8, new_value: u8) {
        debug_assert!(new_value > old_value);

        let k = (1u64 << self.lg_config_k) as f64;
        if !self.ooo_flag {
            self.hip_accum += k / (self.kxq0 + self.kxq1);
        }

        if old_value < 32 {
            self.kxq0 -= inv_pow2(old_value);
        } else {
            self.kxq1 -= inv_pow2(old_value);
        }
        if new_value < 32 {
            self.kxq0 += inv_pow2(new_value);
        } else {
            self.kxq1 += inv_pow2(new_value);
        }
    }

    /// 6-bit and 8-bit update path: plain compare-and-raise.
    fn update_direct(&mut self, slot: u32, new_value: u8) {
        let old_value = match &self.slots {
            Slots::Hll6(s) => s.get(slot),
            Slots::Hll8(s) => s.get(slot),
            Slots::Hll4(_) => unreachable!("direct update on 4-bit storage"),
        };
        if new_value <= old_value {
            return;
        }

        self.hip_and_kxq_update(old_value, new_value);
        match &mut self.slots {
            Slots::Hll6(s) => s.put(slot, new_value),
            Slots::Hll8(s) => s.put(slot, new_value),
            Slots::Hll4(_) => unreachable!(),
        }

        // cur_min stays 0 for these widths; num_at_cur_min is the zero count.
        if old_value == 0 {
            self.num_at_cur_min -= 1;
        }
    }

    /// 4-bit update path: values are stored relative to cur_min, with the
    /// sentinel nibble spilling into the aux map.
    fn update_hll4(&mut self, slot: u32, new_value: u8) {
        if new_value <= self.cur_min {
            return;
        }

        let (raw_stored, old_value) = {
            let Slots::Hll4(s) = &self.slots else {
                unreachable!()
            };
            let raw = s.get_raw(slot);
            let old = if raw < AUX_TOKEN {
                raw + self.cur_min
            } else {
                s.aux()
                    .expect("AUX_TOKEN present but no aux map")
                    .get(slot)
                    .expect("AUX_TOKEN present but slot not in aux map")
            };
            (raw, old)
        };
        if new_value <= old_value {
            return;
        }

        self.hip_and_kxq_update(old_value, new_value);

        let cur_min = self.cur_min;
        let lg_config_k = self.lg_config_k;
        let shifted_new = new_value - cur_min;
        {
            let Slots::Hll4(s) = &mut self.slots else {
                unreachable!()
            };
            match (raw_stored, shifted_new) {
                // Already an exception, stays one: update in place.
                (AUX_TOKEN, shifted) if shifted >= AUX_TOKEN => {
                    s.aux_mut()
                        .expect("AUX_TOKEN present but no aux map")
                        .must_replace(slot, new_value);
                }
                // A sentinel slot's true value is at least cur_min + 15, so a
                // larger new value shifts to at least 16.
                (AUX_TOKEN, _) => unreachable!("sentinel slot with in-range new value"),
                // Newly overflows 4 bits: mark the nibble, spill the value.
                (_, shifted) if shifted >= AUX_TOKEN => {
                    s.put_raw(slot, AUX_TOKEN);
                    s.aux_or_insert(lg_config_k).must_add(slot, new_value);
                }
                (_, shifted) => s.put_raw(slot, shifted),
            }
        }

        if old_value == cur_min {
            self.num_at_cur_min -= 1;
            while self.num_at_cur_min == 0 {
                self.shift_to_bigger_cur_min();
            }
        }
    }

    /// Raise cur_min by one: decrement every stored nibble and rebuild the
    /// aux map, swapping in a fresh one so the sentinel/aux invariant holds
    /// by construction. Externally observed slot values do not change.
    fn shift_to_bigger_cur_min(&mut self) {
        let new_cur_min = self.cur_min + 1;
        let k = 1u32 << self.lg_config_k;
        let lg_config_k = self.lg_config_k;
        let mut num_at_new = 0u32;

        let Slots::Hll4(s) = &mut self.slots else {
            unreachable!("minimum shift only applies to 4-bit storage")
        };

        for slot in 0..k {
            let raw = s.get_raw(slot);
            debug_assert_ne!(raw, 0, "no slot may sit at cur_min when shifting");
            if raw < AUX_TOKEN {
                let decremented = raw - 1;
                s.put_raw(slot, decremented);
                if decremented == 0 {
                    num_at_new += 1;
                }
            }
        }

        // Some exceptions may fall back into the 4-bit range under the new
        // baseline; the rest move to a freshly built map.
        if let Some(old_aux) = s.take_aux() {
            let mut new_aux: Option<AuxHashMap> = None;
            for (slot, actual) in old_aux.iter() {
                debug_assert_eq!(s.get_raw(slot), AUX_TOKEN);
                let shifted = actual - new_cur_min;
                if shifted < AUX_TOKEN {
                    s.put_raw(slot, shifted);
                } else {
                    new_aux
                        .get_or_insert_with(|| AuxHashMap::new(lg_config_k))
                        .must_add(slot, actual);
                }
            }
            s.set_aux(new_aux);
        }

        self.cur_min = new_cur_min;
        self.num_at_cur_min = num_at_new;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::coupon;

    #[test]
    fn test_fresh_state() {
        let arr = HllArray::new(12, HllType::Hll8);
        assert!(arr.is_empty());
        assert_eq!(arr.get_estimate(), 0.0);
        assert_eq!(arr.cur_min(), 0);
        assert_eq!(arr.num_at_cur_min(), 4096);
        assert_eq!(arr.kxq0(), 4096.0);
        assert_eq!(arr.kxq1(), 0.0);
        assert!(!arr.is_out_of_order_flag());
        for slot in 0..4096 {
            assert_eq!(arr.get_slot(slot), 0);
        }
    }

    #[test]
    #[should_panic(expected = "lg_config_k")]
    fn test_lg_k_out_of_range() {
        let _ = HllArray::new(3, HllType::Hll8);
    }

    #[test]
    fn test_update_monotone_and_idempotent() {
        for tgt in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
            let mut arr = HllArray::new(10, tgt);

            arr.coupon_update(pack_coupon(7, 5));
            assert_eq!(arr.get_slot(7), 5);

            // Smaller value: no-op.
            arr.coupon_update(pack_coupon(7, 3));
            assert_eq!(arr.get_slot(7), 5);

            // Same coupon twice: state unchanged.
            let snapshot = arr.clone();
            arr.coupon_update(pack_coupon(7, 5));
            assert_eq!(arr, snapshot);

            arr.coupon_update(pack_coupon(7, 9));
            assert_eq!(arr.get_slot(7), 9);
        }
    }

    #[test]
    fn test_kxq_split_at_32() {
        let mut arr = HllArray::new(8, HllType::Hll8);

        arr.coupon_update(pack_coupon(0, 10));
        assert!(arr.kxq0() < 256.0);
        assert_eq!(arr.kxq1(), 0.0);

        arr.coupon_update(pack_coupon(1, 40));
        assert!(arr.kxq1() > 0.0);
        assert!(arr.kxq1() < 0.001);
    }

    #[test]
    fn test_kxq_matches_recomputation_from_slots() {
        // The incremental sums must agree with a from-scratch pass.
        let mut arr = HllArray::new(10, HllType::Hll8);
        for i in 0..5000u64 {
            arr.coupon_update(coupon(i));
        }

        let (mut kxq0, mut kxq1) = (0.0f64, 0.0f64);
        for (_, v) in arr.iter() {
            if v < 32 {
                kxq0 += inv_pow2(v);
            } else {
                kxq1 += inv_pow2(v);
            }
        }
        assert!((arr.kxq0() - kxq0).abs() < 1e-9);
        assert!((arr.kxq1() - kxq1).abs() < 1e-12);
    }

    #[test]
    fn test_hll4_overflow_into_aux() {
        let mut arr = HllArray::new(7, HllType::Hll4);

        arr.coupon_update(pack_coupon(3, 20));
        assert_eq!(arr.get_slot(3), 20);

        let aux = arr.get_aux_hash_map().expect("slot 3 must have spilled");
        assert_eq!(aux.aux_count(), 1);
        assert_eq!(aux.get(3), Some(20));

        // Growing the exception updates the map, not a second entry.
        arr.coupon_update(pack_coupon(3, 33));
        let aux = arr.get_aux_hash_map().unwrap();
        assert_eq!(aux.aux_count(), 1);
        assert_eq!(aux.get(3), Some(33));
        assert_eq!(arr.get_slot(3), 33);
    }

    #[test]
    fn test_aux_never_present_for_wide_slots() {
        for tgt in [HllType::Hll6, HllType::Hll8] {
            let mut arr = HllArray::new(7, tgt);
            arr.coupon_update(pack_coupon(3, 40));
            assert!(arr.get_aux_hash_map().is_none());
        }
    }

    #[test]
    fn test_min_shift_preserves_observed_values() {
        let mut arr = HllArray::new(4, HllType::Hll4);

        // Fill every slot with 3; the last fill empties the cur_min
        // population and forces shifts until one slot sits at the base.
        for slot in 0..16u32 {
            arr.coupon_update(pack_coupon(slot, 3));
        }
        assert_eq!(arr.cur_min(), 3);
        assert_eq!(arr.num_at_cur_min(), 16);
        for slot in 0..16u32 {
            assert_eq!(arr.get_slot(slot), 3);
        }
        assert!(!arr.is_empty());
    }

    #[test]
    fn test_min_shift_rebuilds_aux() {
        let mut arr = HllArray::new(4, HllType::Hll4);

        // Slot 0 overflows; the rest sit at 2.
        arr.coupon_update(pack_coupon(0, 20));
        for slot in 1..16u32 {
            arr.coupon_update(pack_coupon(slot, 2));
        }
        assert_eq!(arr.cur_min(), 2);

        // Shifted value 20 - 2 = 18 still exceeds the nibble range, so the
        // rebuilt map keeps the entry with its true value.
        let aux = arr.get_aux_hash_map().expect("exception must survive shift");
        assert_eq!(aux.get(0), Some(20));
        assert_eq!(arr.get_slot(0), 20);
        for slot in 1..16u32 {
            assert_eq!(arr.get_slot(slot), 2);
        }
    }

    #[test]
    fn test_min_shift_retires_aux_entries() {
        let mut arr = HllArray::new(4, HllType::Hll4);

        // Slot 0 spills at 16; once cur_min reaches 2 its shifted value 14
        // fits in 4 bits again and the map empties out.
        arr.coupon_update(pack_coupon(0, 16));
        assert!(arr.get_aux_hash_map().is_some());
        for slot in 1..16u32 {
            arr.coupon_update(pack_coupon(slot, 2));
        }
        assert_eq!(arr.cur_min(), 2);
        assert!(arr.get_aux_hash_map().is_none());
        assert_eq!(arr.get_slot(0), 16);
    }

    #[test]
    fn test_copy_as_preserves_contents() {
        let mut arr = HllArray::new(10, HllType::Hll8);
        for i in 0..3000u64 {
            arr.coupon_update(coupon(i));
        }

        for tgt in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
            let copy = arr.copy_as(tgt);
            assert_eq!(copy.tgt_hll_type(), tgt);
            assert_eq!(copy.hip_accum(), arr.hip_accum());
            for slot in 0..1024u32 {
                assert_eq!(copy.get_slot(slot), arr.get_slot(slot), "slot {slot}");
            }
            assert!((copy.get_estimate() - arr.get_estimate()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ooo_switches_to_composite() {
        let mut arr = HllArray::new(11, HllType::Hll8);
        for i in 0..500u64 {
            arr.coupon_update(coupon(i));
        }
        assert_eq!(arr.get_estimate(), arr.hip_accum());

        arr.put_out_of_order_flag(true);
        assert_eq!(arr.get_estimate(), arr.get_composite_estimate());
        // The accumulator itself is retained.
        assert!(arr.hip_accum() > 0.0);
    }

    #[test]
    #[should_panic(expected = "num_std_dev")]
    fn test_bounds_reject_bad_num_std_dev() {
        let arr = HllArray::new(10, HllType::Hll8);
        let _ = arr.get_upper_bound(4);
    }
}
