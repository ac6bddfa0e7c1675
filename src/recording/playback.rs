use tracing::debug;

/// An active playback of a recorded segment
pub trait Playback: Send {
    /// Stop playback and release whatever it holds
    fn teardown(&mut self);
}

/// Holds at most one active playback; starting another tears down the first.
pub struct PlaybackSlot<P: Playback> {
    active: Option<P>,
}

impl<P: Playback> Default for PlaybackSlot<P> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<P: Playback> PlaybackSlot<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self, playback: P) {
        self.stop();
        self.active = Some(playback);
    }

    pub fn stop(&mut self) {
        if let Some(mut previous) = self.active.take() {
            debug!("Tearing down previous playback");
            previous.teardown();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }
}

impl<P: Playback> Drop for PlaybackSlot<P> {
    fn drop(&mut self) {
        self.stop();
    }
}
