use crate::models::{Challenge, Flag};

/// Maps a challenge's configured miss policy to the flag applied when a day
/// goes unrecorded. Only MIN and FAIL are valid policies; anything else,
/// including an empty value, degrades to FAIL. Never errors.
pub fn resolve(challenge: &Challenge) -> Flag {
    match challenge.miss_policy.trim().to_ascii_uppercase().as_str() {
        "MIN" => Flag::Min,
        "FAIL" => Flag::Fail,
        other => {
            tracing::debug!(
                challenge_id = challenge.id,
                policy = other,
                "unrecognized miss policy, defaulting to FAIL"
            );
            Flag::Fail
        }
    }
}
