//! Renderer collaborator trait.

use crate::types::{LatLon, Outcome};

/// Receives the events the playback scheduler releases.
///
/// # Call Flow
///
/// ```text
/// Scheduler                         Renderer
///   | tick: batch due                  |
///   |-- render(fallback, ..) --------->|   (only for unreached events)
///   |-- render(principal, ..) -------->|
///   | ...                              |
///   | queue drained                    |
///   |-- on_playback_complete(..) ----->|   (exactly once)
/// ```
///
/// Calls are made synchronously on the playback thread; an implementation
/// must not block for long or it stalls the tick.
pub trait Renderer {
    /// Draws one released event.
    ///
    /// # Arguments
    /// * `location` - Raw coordinate (projection is the renderer's job)
    /// * `outcome` - Classification used to pick a color or ratio shade
    /// * `consolidated` - True if the event aggregates co-located events
    fn render(&mut self, location: LatLon, outcome: Outcome, consolidated: bool);
    
    /// Signals that the playback queue has drained.
    ///
    /// # Arguments
    /// * `snapshot_requested` - True in single-day snapshot mode
    /// * `label` - Label for the snapshot (the configured start bound)
    fn on_playback_complete(&mut self, snapshot_requested: bool, label: &str);
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, location: LatLon, outcome: Outcome, consolidated: bool) {
        (**self).render(location, outcome, consolidated)
    }
    
    fn on_playback_complete(&mut self, snapshot_requested: bool, label: &str) {
        (**self).on_playback_complete(snapshot_requested, label)
    }
}

/// Renderer that only counts what it receives.
#[derive(Debug, Default, Clone)]
pub struct NullRenderer {
    /// Number of `render` calls
    pub rendered: u64,
    
    /// Number of `on_playback_complete` calls
    pub completions: u32,
    
    /// Snapshot flag of the last completion
    pub snapshot_requested: bool,
}

impl Renderer for NullRenderer {
    fn render(&mut self, _location: LatLon, _outcome: Outcome, _consolidated: bool) {
        self.rendered += 1;
    }
    
    fn on_playback_complete(&mut self, snapshot_requested: bool, _label: &str) {
        self.completions += 1;
        self.snapshot_requested = snapshot_requested;
    }
}
