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

//! Harmonic numbers for the small-range ("bit-map") estimator.

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// Exact summation below this, asymptotic expansion above.
const NUM_EXACT: u64 = 25;

/// The nth harmonic number: 1 + 1/2 + ... + 1/n.
fn harmonic_number(n: u64) -> f64 {
    if n < NUM_EXACT {
        let mut sum = 0.0;
        for i in 1..=n {
            sum += 1.0 / i as f64;
        }
        return sum;
    }

    // ln(n) + gamma + 1/(2n) - 1/(12n^2) + 1/(120n^4)
    let x = n as f64;
    let inv_sq = 1.0 / (x * x);
    let mut sum = x.ln() + EULER_MASCHERONI + 1.0 / (2.0 * x);
    sum -= inv_sq * ((1.0 / 12.0) - (inv_sq / 120.0));
    sum
}

/// Cardinality estimate from the number of occupied cells of a size-k
/// bit vector: k * (H(k) - H(k - num_hit)).
pub(crate) fn bitmap_estimate(k: u32, num_hit: u32) -> f64 {
    (k as f64) * (harmonic_number(k as u64) - harmonic_number((k - num_hit) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_values() {
        assert_eq!(harmonic_number(0), 0.0);
        assert_eq!(harmonic_number(1), 1.0);
        assert_eq!(harmonic_number(2), 1.5);
        assert!((harmonic_number(3) - 11.0 / 6.0).abs() < 1e-15);
    }

    #[test]
    fn test_asymptotic_matches_exact_sum() {
        // Compare the expansion against brute-force summation above the
        // exact-table cutoff.
        for n in [25u64, 100, 10_000] {
            let exact: f64 = (1..=n).map(|i| 1.0 / i as f64).sum();
            assert!(
                (harmonic_number(n) - exact).abs() < 1e-10,
                "mismatch at n={n}"
            );
        }
    }

    #[test]
    fn test_bitmap_estimate_low_fill() {
        // With few cells hit, the estimate is close to the hit count.
        let est = bitmap_estimate(4096, 10);
        assert!((est - 10.0).abs() < 0.1, "estimate {est}");

        // Higher fill implies more collisions, so the estimate exceeds the
        // hit count.
        let est = bitmap_estimate(4096, 2048);
        assert!(est > 2048.0);
    }
}
