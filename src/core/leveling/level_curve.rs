// Level curve - the pure math behind leveling.
//
// Experience is the source of truth. Levels are always derived from it, never
// stored independently of it, so everything here is a total function over u64.

/// Level every user starts at. Reached at 0 XP.
pub const BASELINE_LEVEL: u32 = 0;

/// Threshold for `level` computed wide so large levels never saturate.
fn threshold(level: u32) -> u128 {
    if level == BASELINE_LEVEL {
        return 0;
    }
    let level = level as u128;
    3 * level * level + 50 * level + 100
}

/// Minimum cumulative experience needed to **be at** `level`.
///
/// Levels above the baseline follow `3·level² + 50·level + 100`, so level 1
/// starts at 153 XP and level 2 at 212 XP. The baseline level starts at 0 XP;
/// the formula's value at level 0 (100) is not a floor.
pub fn required_experience(level: u32) -> u64 {
    threshold(level).min(u64::MAX as u128) as u64
}

/// Greatest level whose threshold is at or below `experience`.
///
/// Inverts the quadratic in closed form, then re-checks the estimate against
/// the exact integer thresholds so floating-point error can never leave us one
/// level off in either direction.
pub fn level_from_experience(experience: u64) -> u32 {
    // 3L² + 50L + (100 - e) = 0
    let e = experience as f64;
    let discriminant = 2500.0 - 12.0 * (100.0 - e);
    let estimate = ((-50.0 + discriminant.sqrt()) / 6.0).floor();
    let mut level = if estimate.is_finite() && estimate > 0.0 {
        estimate.min(u32::MAX as f64) as u32
    } else {
        BASELINE_LEVEL
    };

    let experience = experience as u128;
    while level > BASELINE_LEVEL && threshold(level) > experience {
        level -= 1;
    }
    while level < u32::MAX && threshold(level + 1) <= experience {
        level += 1;
    }
    level
}

/// Reference implementation: walk up from the baseline one level at a time.
///
/// O(level), so only fit for checking the closed form.
pub fn level_from_experience_iterative(experience: u64) -> u32 {
    let experience = experience as u128;
    let mut level = BASELINE_LEVEL;
    while threshold(level + 1) <= experience {
        level += 1;
    }
    level
}

/// XP earned since reaching `level`.
pub fn progress_in_level(experience: u64, level: u32) -> u64 {
    experience.saturating_sub(required_experience(level))
}

/// XP still missing before `level + 1`.
pub fn needed_for_next_level(experience: u64, level: u32) -> u64 {
    required_experience(level.saturating_add(1)).saturating_sub(experience)
}
