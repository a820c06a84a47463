//! Scroll depth tracking.

use std::collections::HashMap;

/// Percentage of the scrollable range reached at `scroll_y`, 0-100
///
/// Content that fits in the viewport has no scroll range and counts as
/// fully seen.
pub fn scroll_depth(scroll_y: f64, content_height: f64, viewport_height: f64) -> u8 {
    let range = content_height - viewport_height;
    if range <= 0.0 {
        return 100;
    }
    let depth = (100.0 * scroll_y / range).round().clamp(0.0, 100.0);
    if depth.is_nan() {
        0
    } else {
        depth as u8
    }
}

/// Deepest scroll percentage seen per screen since it was last activated
#[derive(Debug, Default)]
pub struct ScrollDepthTable {
    marks: HashMap<String, u8>,
}

impl ScrollDepthTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn high_water(&self, screen: &str) -> u8 {
        self.marks.get(screen).copied().unwrap_or(0)
    }

    /// Forget the mark of one screen
    pub fn reset(&mut self, screen: &str) {
        self.marks.insert(screen.to_string(), 0);
    }

    /// Raise the mark if `depth` is deeper; returns whether it was raised
    pub fn observe(&mut self, screen: &str, depth: u8) -> bool {
        let mark = self.marks.entry(screen.to_string()).or_insert(0);
        if depth > *mark {
            *mark = depth;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_depth() {
        assert_eq!(scroll_depth(50.0, 200.0, 100.0), 50);
        assert_eq!(scroll_depth(33.4, 200.0, 100.0), 33);
        assert_eq!(scroll_depth(250.0, 200.0, 100.0), 100);
        assert_eq!(scroll_depth(-20.0, 200.0, 100.0), 0);
        assert_eq!(scroll_depth(0.0, 100.0, 100.0), 100);
        assert_eq!(scroll_depth(0.0, 80.0, 100.0), 100);
    }

    #[test]
    fn test_high_water_mark_is_monotonic() {
        let mut table = ScrollDepthTable::new();
        assert!(table.observe("feed", 50));
        assert!(!table.observe("feed", 30));
        assert!(!table.observe("feed", 50));
        assert!(table.observe("feed", 80));
        assert_eq!(table.high_water("feed"), 80);
    }

    #[test]
    fn test_reset_is_per_screen() {
        let mut table = ScrollDepthTable::new();
        table.observe("feed", 70);
        table.observe("detail", 40);

        table.reset("feed");
        assert_eq!(table.high_water("feed"), 0);
        assert_eq!(table.high_water("detail"), 40);
    }
}
