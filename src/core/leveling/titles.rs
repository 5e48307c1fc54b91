// Cosmetic titles unlocked by level.

/// (minimum level, title), ascending by level.
const TITLES: [(u32, &str); 10] = [
    (1, "Earthling"),
    (5, "Explorer"),
    (10, "Traveler"),
    (15, "Pioneer"),
    (20, "Cosmonaut"),
    (25, "Planet"),
    (30, "Star"),
    (35, "Solar System"),
    (40, "Galaxy"),
    (45, "Supercluster"),
];

/// Highest title the level qualifies for. Users below the first threshold
/// still get the first title.
pub fn title_for_level(level: u32) -> &'static str {
    TITLES
        .iter()
        .take_while(|(min_level, _)| level >= *min_level)
        .last()
        .map(|(_, title)| *title)
        .unwrap_or(TITLES[0].1)
}

/// The next title and how many levels are left until it.
/// `None` once the last title is reached.
pub fn next_title(level: u32) -> Option<(&'static str, u32)> {
    let current = title_for_level(level);
    TITLES
        .iter()
        .find(|(min_level, title)| *min_level > level && *title != current)
        .map(|(min_level, title)| (*title, min_level - level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_follow_thresholds() {
        assert_eq!(title_for_level(0), "Earthling");
        assert_eq!(title_for_level(4), "Earthling");
        assert_eq!(title_for_level(5), "Explorer");
        assert_eq!(title_for_level(29), "Planet");
        assert_eq!(title_for_level(200), "Supercluster");
    }

    #[test]
    fn test_next_title_counts_remaining_levels() {
        assert_eq!(next_title(0), Some(("Explorer", 5)));
        assert_eq!(next_title(7), Some(("Traveler", 3)));
        assert_eq!(next_title(45), None);
    }
}
