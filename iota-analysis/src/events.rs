//! Event selection - candidate grain positions in the source

/// Step through the source at a fixed stride and collect every offset that
/// still has room for a full grain and a full spacing step.
pub fn select_events(source_len: usize, spacing: usize, grain_size: usize) -> Vec<usize> {
    if spacing == 0 {
        return Vec::new();
    }

    let biggest_gap = spacing.max(grain_size);
    (0..)
        .map(|n| n * spacing)
        .take_while(|&pos| pos + biggest_gap <= source_len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_second_at_200ms() {
        // 1 s at 44.1 kHz, 20 ms grains, 200 ms spacing
        let events = select_events(44100, 8820, 882);
        assert_eq!(events, vec![0, 8820, 17640, 26460, 35280]);
    }

    #[test]
    fn test_grain_larger_than_spacing() {
        let events = select_events(100, 10, 40);
        assert_eq!(events.first(), Some(&0));
        assert_eq!(events.last(), Some(&60));
    }

    #[test]
    fn test_trailing_partial_region_dropped() {
        let events = select_events(105, 10, 5);
        assert_eq!(events.len(), 10);
        assert_eq!(events.last(), Some(&90));
    }

    #[test]
    fn test_source_too_short() {
        assert!(select_events(50, 100, 20).is_empty());
        assert!(select_events(50, 0, 20).is_empty());
    }
}
