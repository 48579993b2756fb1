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

//! Confidence bounds for the theta-sketch cardinality estimator.
//!
//! A theta sketch is a Bernoulli(theta) sample of the true stream of
//! distinct keys, so `retainedCount` behaves like a binomial count. We use
//! the usual large-sample normal approximation to the binomial proportion:
//! the relative standard error of `retainedCount / theta` is approximately
//! `sqrt((1 - theta) / (theta * retainedCount))`.

use crate::common::NumStdDev;
use crate::error::Error;

/// Lower confidence bound on the cardinality estimate.
///
/// # Errors
///
/// Returns `InvalidArgument` if `theta` is not in `(0.0, 1.0]`.
pub fn lower_bound(num_retained: u64, theta: f64, num_std_dev: NumStdDev) -> Result<f64, Error> {
    validate_theta(theta)?;
    if num_retained == 0 {
        return Ok(0.0);
    }
    let estimate = num_retained as f64 / theta;
    let rse = relative_standard_error(num_retained, theta);
    Ok((estimate * (1.0 - num_std_dev.as_f64() * rse)).max(num_retained as f64))
}

/// Upper confidence bound on the cardinality estimate.
///
/// When `num_retained == 0` and the sketch is not logically empty (every
/// update happened to be screened out by theta), the bound falls back to a
/// small constant derived from the sampling rate rather than `0`, since a
/// non-empty-but-zero-retained sketch still carries upper-tail uncertainty
/// about how many items might have been seen.
///
/// # Errors
///
/// Returns `InvalidArgument` if `theta` is not in `(0.0, 1.0]`.
pub fn upper_bound(
    num_retained: u64,
    theta: f64,
    num_std_dev: NumStdDev,
    is_empty: bool,
) -> Result<f64, Error> {
    validate_theta(theta)?;
    if num_retained == 0 {
        if is_empty {
            return Ok(0.0);
        }
        // Poisson-style tail bound for zero observed successes: roughly
        // numStdDev^2 expected events are still consistent with seeing none.
        return Ok(num_std_dev.as_f64().powi(2) / theta);
    }
    let estimate = num_retained as f64 / theta;
    let rse = relative_standard_error(num_retained, theta);
    Ok(estimate * (1.0 + num_std_dev.as_f64() * rse))
}

fn relative_standard_error(num_retained: u64, theta: f64) -> f64 {
    ((1.0 - theta) / (theta * num_retained as f64)).max(0.0).sqrt()
}

fn validate_theta(theta: f64) -> Result<(), Error> {
    if theta > 0.0 && theta <= 1.0 {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "theta must be in (0.0, 1.0], got {theta}"
        )))
    }
}
