// Playback timeline domain model

pub const DEFAULT_FRAME_COUNT: u32 = 100;

/// Frame position of the flow video and whether it is advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    current_frame: u32,
    is_playing: bool,
    frame_count: u32,
}

impl PlaybackState {
    pub fn new(frame_count: u32) -> Self {
        Self {
            current_frame: 0,
            is_playing: false,
            frame_count: frame_count.max(1),
        }
    }

    /// Always in `[0, frame_count)`.
    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Returns true if the state changed.
    pub fn start(&mut self) -> bool {
        let changed = !self.is_playing;
        self.is_playing = true;
        changed
    }

    /// Returns true if the state changed.
    pub fn stop(&mut self) -> bool {
        let changed = self.is_playing;
        self.is_playing = false;
        changed
    }

    /// One clock tick. Ignored while stopped.
    pub fn advance(&mut self) {
        if self.is_playing {
            self.current_frame = (self.current_frame + 1) % self.frame_count;
        }
    }

    pub fn progress_percent(&self) -> f64 {
        self.current_frame as f64 / self.frame_count as f64 * 100.0
    }

    /// Readout shown under the player, e.g. "42s / 100s".
    pub fn readout(&self) -> String {
        format!("{}s / {}s", self.current_frame, self.frame_count)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wraps_at_modulus() {
        let mut state = PlaybackState::default();
        state.start();
        for n in 1..=250u32 {
            state.advance();
            assert_eq!(state.current_frame(), n % 100);
            assert!(state.current_frame() < 100);
        }
    }

    #[test]
    fn test_advance_ignored_while_stopped() {
        let mut state = PlaybackState::default();
        state.advance();
        state.advance();
        assert_eq!(state.current_frame(), 0);
    }

    #[test]
    fn test_restart_resumes_from_last_frame() {
        let mut state = PlaybackState::default();
        state.start();
        for _ in 0..7 {
            state.advance();
        }
        assert!(state.stop());
        assert!(!state.stop());
        state.advance();
        assert!(state.start());
        state.advance();
        assert_eq!(state.current_frame(), 8);
    }

    #[test]
    fn test_readout() {
        let mut state = PlaybackState::new(100);
        state.start();
        for _ in 0..42 {
            state.advance();
        }
        assert_eq!(state.readout(), "42s / 100s");
        assert_eq!(state.progress_percent(), 42.0);
    }
}
