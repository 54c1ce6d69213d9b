//! Session counters shared between the frame source and the scan worker

use serde::Serialize;

/// Running totals for one scanning session (not persisted)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Frames offered by the frame source
    pub frames_received: u64,
    /// Frames discarded because the worker was busy
    pub frames_dropped: u64,
    /// Frames that went through locate or track
    pub frames_processed: u64,
    /// Searching -> Tracking transitions
    pub cards_located: u64,
    /// Tracking -> Searching transitions
    pub cards_lost: u64,
    /// Extraction jobs handed to the pool
    pub extractions_dispatched: u64,
    /// Tracked frames not read because too many extractions were in flight
    pub extractions_skipped: u64,
}

impl SessionStats {
    /// Share of offered frames that were discarded
    pub fn drop_rate(&self) -> f32 {
        if self.frames_received == 0 {
            return 0.0;
        }
        self.frames_dropped as f32 / self.frames_received as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_rate() {
        assert_eq!(SessionStats::default().drop_rate(), 0.0);

        let stats = SessionStats {
            frames_received: 10,
            frames_dropped: 4,
            ..Default::default()
        };
        assert!((stats.drop_rate() - 0.4).abs() < 1e-6);
    }
}
