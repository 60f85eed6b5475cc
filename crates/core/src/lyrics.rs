use crate::show::song::LyricLine;

/// Cadence at which the lyrics scheduler polls the master clock.
pub const LYRICS_POLL_MS: u64 = 50;

/// `-1` published for "no active line" (clock stopped near the start).
pub const LYRICS_IDLE_INDEX: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LyricsUpdate {
    ActiveIndex { index: usize, t: f64 },
    Idle,
    EndOfSong,
}

/// Tracks which lyric line should be showing given the master clock's
/// position, with a configurable read-ahead so a line highlights slightly
/// before its timestamp rather than exactly on it.
pub struct LyricsScheduler {
    lines: Vec<LyricLine>,
    read_ahead_secs: f64,
    last_published: Option<i32>,
}

impl LyricsScheduler {
    pub fn new(lines: Vec<LyricLine>, read_ahead_secs: f64) -> Self {
        let mut lines = lines;
        lines.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());
        Self { lines, read_ahead_secs, last_published: None }
    }

    pub fn set_read_ahead(&mut self, read_ahead_secs: f64) {
        self.read_ahead_secs = read_ahead_secs;
    }

    /// Evaluates at the given clock position; returns `Some` only when the
    /// published state actually changes from the previous call.
    pub fn poll(&mut self, current_time: f64, duration: f64, clock_stopped: bool) -> Option<LyricsUpdate> {
        let t = current_time + self.read_ahead_secs;

        if clock_stopped && current_time.abs() < 1e-6 {
            return self.publish(LYRICS_IDLE_INDEX, LyricsUpdate::Idle);
        }

        if clock_stopped && duration > 0.0 && t >= duration {
            return self.publish(i32::MAX, LyricsUpdate::EndOfSong);
        }

        let mut found: Option<usize> = None;
        for (i, line) in self.lines.iter().enumerate() {
            if line.time <= t + 0.05 {
                found = Some(i);
            } else {
                break;
            }
        }

        match found {
            Some(index) => self.publish(index as i32, LyricsUpdate::ActiveIndex { index, t }),
            None => self.publish(LYRICS_IDLE_INDEX, LyricsUpdate::Idle),
        }
    }

    fn publish(&mut self, key: i32, update: LyricsUpdate) -> Option<LyricsUpdate> {
        if self.last_published == Some(key) {
            None
        } else {
            self.last_published = Some(key);
            Some(update)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> Vec<LyricLine> {
        vec![
            LyricLine { line: "first".to_string(), time: 1.0 },
            LyricLine { line: "second".to_string(), time: 3.0 },
            LyricLine { line: "third".to_string(), time: 5.0 },
        ]
    }

    #[test]
    fn read_ahead_advances_the_active_line_before_its_timestamp() {
        let mut scheduler = LyricsScheduler::new(lines(), 1.0);
        // current_time 2.1 + read_ahead 1.0 = 3.1 >= line[1].time (3.0)
        let update = scheduler.poll(2.1, 10.0, false);
        assert_eq!(update, Some(LyricsUpdate::ActiveIndex { index: 1, t: 3.1 }));
    }

    #[test]
    fn repeated_poll_at_same_index_emits_nothing() {
        let mut scheduler = LyricsScheduler::new(lines(), 1.0);
        scheduler.poll(2.1, 10.0, false);
        assert_eq!(scheduler.poll(2.15, 10.0, false), None);
    }

    #[test]
    fn stopped_clock_near_zero_publishes_idle() {
        let mut scheduler = LyricsScheduler::new(lines(), 1.0);
        scheduler.poll(2.1, 10.0, false);
        assert_eq!(scheduler.poll(0.0, 10.0, true), Some(LyricsUpdate::Idle));
    }

    #[test]
    fn reaching_duration_while_stopped_publishes_end_of_song() {
        let mut scheduler = LyricsScheduler::new(lines(), 1.0);
        assert_eq!(scheduler.poll(9.5, 10.0, true), Some(LyricsUpdate::EndOfSong));
    }
}
