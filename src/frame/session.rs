// Frame session state machine
//
// Idle -> (begin) -> Recording -> (end) -> Idle
//
// Calling begin/end out of order is a programming error and panics. The slot
// index only advances when a frame is ended, so after K completed frames it
// is K mod MAX_FRAMES_IN_FLIGHT.

use super::MAX_FRAMES_IN_FLIGHT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Recording { image_index: u32 },
}

#[derive(Debug, Clone)]
pub struct FrameSession {
    state: FrameState,
    slot: usize,
    frames_completed: u64,
}

impl Default for FrameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSession {
    pub fn new() -> Self {
        Self {
            state: FrameState::Idle,
            slot: 0,
            frames_completed: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, FrameState::Recording { .. })
    }

    /// Frame-in-flight slot the next (or current) frame uses
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// Swapchain image acquired for the open frame
    pub fn image_index(&self) -> Option<u32> {
        match self.state {
            FrameState::Recording { image_index } => Some(image_index),
            FrameState::Idle => None,
        }
    }

    pub fn begin(&mut self, image_index: u32) {
        assert!(
            !self.is_recording(),
            "Can't begin a frame while another frame is in progress"
        );
        self.state = FrameState::Recording { image_index };
    }

    /// Close the open frame and rotate to the next slot. Returns the image index.
    pub fn end(&mut self) -> u32 {
        let image_index = match self.state {
            FrameState::Recording { image_index } => image_index,
            FrameState::Idle => panic!("Can't end a frame that is not in progress"),
        };
        self.state = FrameState::Idle;
        self.slot = (self.slot + 1) % MAX_FRAMES_IN_FLIGHT;
        self.frames_completed += 1;
        image_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_on_slot_zero() {
        let session = FrameSession::new();
        assert_eq!(session.state(), FrameState::Idle);
        assert_eq!(session.slot(), 0);
        assert_eq!(session.image_index(), None);
    }

    #[test]
    fn begin_end_cycle() {
        let mut session = FrameSession::new();
        session.begin(2);
        assert!(session.is_recording());
        assert_eq!(session.image_index(), Some(2));
        assert_eq!(session.slot(), 0);

        assert_eq!(session.end(), 2);
        assert!(!session.is_recording());
        assert_eq!(session.slot(), 1);
    }

    #[test]
    fn slot_after_k_frames_is_k_mod_frames_in_flight() {
        let mut session = FrameSession::new();
        for k in 0..17u64 {
            assert_eq!(session.slot(), (k as usize) % MAX_FRAMES_IN_FLIGHT);
            assert_eq!(session.frames_completed(), k);
            session.begin((k % 3) as u32);
            session.end();
        }
    }

    #[test]
    #[should_panic(expected = "another frame is in progress")]
    fn double_begin_panics() {
        let mut session = FrameSession::new();
        session.begin(0);
        session.begin(1);
    }

    #[test]
    #[should_panic(expected = "not in progress")]
    fn end_without_begin_panics() {
        let mut session = FrameSession::new();
        session.end();
    }
}
