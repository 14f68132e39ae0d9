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

//! Relative-error lookup for confidence bounds.
//!
//! This is the seam to the external bias-correction tables: bound
//! computation treats `rel_err` as an opaque function of (direction,
//! estimation mode, lg_config_k, num_std_dev). The factors here are the
//! asymptotic relative standard errors of the two estimators.

/// RSE factor for the HIP estimator: sqrt(ln 2).
pub(crate) fn hip_rse_factor() -> f64 {
    std::f64::consts::LN_2.sqrt()
}

/// RSE factor for the raw/composite estimator: sqrt(3 ln 2 - 1).
pub(crate) fn non_hip_rse_factor() -> f64 {
    (3.0 * std::f64::consts::LN_2 - 1.0).sqrt()
}

/// Signed relative error at `num_std_dev` standard deviations.
///
/// Positive for lower bounds, negative for upper bounds; callers divide the
/// estimate by `1 + rel_err`.
pub(crate) fn rel_err(upper_bound: bool, ooo: bool, lg_config_k: u8, num_std_dev: u8) -> f64 {
    let factor = if ooo {
        non_hip_rse_factor()
    } else {
        hip_rse_factor()
    };
    let k = (1u64 << lg_config_k) as f64;
    let rel = (num_std_dev as f64) * factor / k.sqrt();
    if upper_bound { -rel } else { rel }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factors() {
        assert!((hip_rse_factor() - 0.8325546111576977).abs() < 1e-15);
        assert!((non_hip_rse_factor() - 1.03896).abs() < 1e-5);
    }

    #[test]
    fn test_rel_err_signs_and_scaling() {
        let lo = rel_err(false, false, 12, 2);
        let hi = rel_err(true, false, 12, 2);
        assert!(lo > 0.0);
        assert_eq!(hi, -lo);

        // Doubling num_std_dev doubles the error; larger k shrinks it.
        assert_eq!(rel_err(false, false, 12, 2), 2.0 * rel_err(false, false, 12, 1));
        assert!(rel_err(false, false, 14, 1) < rel_err(false, false, 12, 1));

        // Out-of-order sketches carry the larger non-HIP error.
        assert!(rel_err(false, true, 12, 1) > rel_err(false, false, 12, 1));
    }
}
