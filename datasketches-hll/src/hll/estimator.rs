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

//! Pure estimator functions over the array's aggregate statistics.
//!
//! Three estimators cooperate:
//!
//! - the **HIP accumulator** (maintained incrementally in `array.rs`) is the
//!   primary estimate while updates arrived in a known order;
//! - the **raw estimator** `alpha_k * k^2 / sum(2^-value)` computed from the
//!   split KxQ sums;
//! - the **bit-map estimator** based on the count of empty slots, which the
//!   composite estimator substitutes in the low-fill regime where the raw
//!   log-harmonic-mean estimator is biased.

use crate::hll::harmonic_numbers;

/// 1 / 2^value.
#[inline]
pub(crate) fn inv_pow2(value: u8) -> f64 {
    if value == 0 {
        1.0
    } else if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-(value as f64))
    }
}

/// Raw HLL estimate: alpha_k * k^2 / (kxq0 + kxq1).
///
/// The small-k alpha values are the standard empirical corrections; above
/// lg_k = 6 the closed form applies.
pub(crate) fn raw_estimate(lg_config_k: u8, kxq_sum: f64) -> f64 {
    let k = (1u64 << lg_config_k) as f64;

    let correction_factor = match lg_config_k {
        4 => 0.673,
        5 => 0.697,
        6 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / k),
    };

    (correction_factor * k * k) / kxq_sum
}

/// Small-range estimate from the number of never-hit slots.
///
/// Only meaningful while cur_min == 0; once the minimum has shifted every
/// slot has been hit and the bit-map view saturates.
pub(crate) fn bitmap_estimate(lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
    let k = 1u32 << lg_config_k;

    let num_unhit = if cur_min == 0 { num_at_cur_min } else { 0 };
    if num_unhit == 0 {
        return (k as f64) * (k as f64 / 0.5).ln();
    }

    let num_hit = k - num_unhit;
    harmonic_numbers::bitmap_estimate(k, num_hit)
}

/// Composite estimate: the raw estimator, switched to the bit-map estimator
/// in the low-fill regime.
///
/// Above 3k the raw estimator is trusted outright. Below that, comparing a
/// single estimator against a threshold to decide whether to use it creates
/// bias at the boundary, so the average of both estimators is what gets
/// compared against the crossover threshold.
pub(crate) fn composite_estimate(
    lg_config_k: u8,
    kxq_sum: f64,
    cur_min: u8,
    num_at_cur_min: u32,
) -> f64 {
    let raw_est = raw_estimate(lg_config_k, kxq_sum);

    let k = 1u32 << lg_config_k;
    if raw_est > (3 * k) as f64 {
        return raw_est;
    }

    let lin_est = bitmap_estimate(lg_config_k, cur_min, num_at_cur_min);
    let avg_est = (raw_est + lin_est) / 2.0;

    let crossover = match lg_config_k {
        4 => 0.718,
        5 => 0.672,
        _ => 0.64,
    };

    if avg_est > crossover * (k as f64) {
        raw_est
    } else {
        lin_est
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inv_pow2() {
        assert_eq!(inv_pow2(0), 1.0);
        assert_eq!(inv_pow2(1), 0.5);
        assert_eq!(inv_pow2(10), 1.0 / 1024.0);
        assert!(inv_pow2(63) > 0.0);
        assert!(inv_pow2(64) > 0.0);
    }

    #[test]
    fn test_raw_estimate_fresh_array_is_alpha_k() {
        // All slots zero: kxq_sum == k, so the estimate collapses to
        // alpha_k * k.
        let k = 4096.0;
        let est = raw_estimate(12, k);
        let alpha = 0.7213 / (1.0 + 1.079 / k);
        assert!((est - alpha * k).abs() < 1e-9);
    }

    #[test]
    fn test_bitmap_estimate_zero_hits() {
        assert_eq!(bitmap_estimate(12, 0, 4096), 0.0);
    }

    #[test]
    fn test_bitmap_estimate_saturated() {
        // cur_min > 0 means every slot was hit; the estimate pins at the
        // saturation value regardless of num_at_cur_min.
        let saturated = bitmap_estimate(10, 1, 512);
        assert_eq!(saturated, 1024.0 * (1024.0_f64 / 0.5).ln());
    }

    #[test]
    fn test_composite_prefers_bitmap_at_low_fill() {
        // 50 hits out of 4096: far below crossover, so the composite must
        // track the bit-map estimate, which is close to the hit count.
        let kxq_sum = 4096.0 - 50.0 + 50.0 * inv_pow2(1);
        let est = composite_estimate(12, kxq_sum, 0, 4096 - 50);
        let lin = bitmap_estimate(12, 0, 4096 - 50);
        assert_eq!(est, lin);
        assert!((est - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_composite_uses_raw_when_saturated() {
        // A tiny kxq_sum drives the raw estimate far above 3k.
        let est = composite_estimate(12, 1.0, 3, 100);
        let raw = raw_estimate(12, 1.0);
        assert_eq!(est, raw);
        assert!(raw > (3 * 4096) as f64);
    }
}
