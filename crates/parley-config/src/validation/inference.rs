//! Validation for the default inference parameters.

use parley_common::MAX_TEMPERATURE;

use crate::schema::ParleyConfig;

use super::helpers::{validate_range_f64, validate_range_usize};

pub(crate) fn validate_inference(errors: &mut Vec<String>, config: &ParleyConfig) {
    let params = &config.inference;

    validate_range_usize(errors, "inference.batch_size", params.batch_size, 1, 4096);
    validate_range_usize(errors, "inference.top_k", params.top_k, 1, 100_000);
    validate_range_usize(
        errors,
        "inference.repeat_last_n",
        params.repeat_last_n,
        0,
        32_768,
    );
    validate_range_f64(errors, "inference.top_p", f64::from(params.top_p), 0.0, 1.0);
    validate_range_f64(
        errors,
        "inference.temperature",
        f64::from(params.temperature),
        0.0,
        f64::from(MAX_TEMPERATURE),
    );
    validate_range_f64(
        errors,
        "inference.repeat_penalty",
        f64::from(params.repeat_penalty),
        0.01,
        10.0,
    );
}
