/// Cumulative XP required to reach `level`.
///
/// `threshold_for(0)` is 100 even though level 0 is where everyone starts;
/// advancing from `level` means reaching `threshold_for(level + 1)`.
pub fn threshold_for(level: i64) -> i64 {
    if level < 0 {
        return 0;
    }
    5 * level * level + 50 * level + 100
}

/// Highest level reachable from `level` with `xp`; never goes down.
pub fn level_after(level: i64, xp: i64) -> i64 {
    let mut candidate = level;
    while xp >= threshold_for(candidate + 1) {
        candidate += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_thresholds() {
        assert_eq!(threshold_for(0), 100);
        assert_eq!(threshold_for(1), 155);
        assert_eq!(threshold_for(2), 220);
        assert_eq!(threshold_for(3), 295);
        assert_eq!(threshold_for(-1), 0);
        assert_eq!(threshold_for(-50), 0);
    }

    #[test]
    fn strictly_increasing() {
        for level in 0..5_000 {
            assert!(threshold_for(level + 1) > threshold_for(level), "level {level}");
        }
    }

    #[test]
    fn level_after_stays_below_next_threshold() {
        assert_eq!(level_after(0, 0), 0);
        assert_eq!(level_after(0, 154), 0);
        assert_eq!(level_after(0, 155), 1);
        // 475 = threshold_for(5), 580 = threshold_for(6)
        assert_eq!(level_after(0, 500), 5);
        assert_eq!(level_after(3, 100), 3);

        for xp in (0..20_000).step_by(37) {
            let level = level_after(0, xp);
            assert!(xp < threshold_for(level + 1));
        }
    }
}
