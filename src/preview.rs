use crate::{
    assets::SceneBitmaps,
    compose::{Compositor, RenderedFrame, render_scene},
    error::VisorResult,
    scene::{RenderMode, SceneSnapshot},
};

/// Coalesces rapid scene changes into at most one preview render per frame.
///
/// The embedder calls [`request`](Self::request) whenever any transform or
/// flag changes, and [`run_frame`](Self::run_frame) once per frame boundary
/// (the requestAnimationFrame tick of a browser host, or a plain loop in a
/// headless one). Consecutive requests overwrite each other; only the last
/// snapshot seen before the frame boundary is rendered. Export renders
/// bypass the scheduler entirely via [`render_scene`].
#[derive(Clone, Debug, Default)]
pub struct PreviewScheduler {
    pending: Option<SceneSnapshot>,
    cancelled: bool,
    frames_requested: u64,
    frames_rendered: u64,
}

impl PreviewScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest scene state; overwrites any pending snapshot.
    pub fn request(&mut self, snapshot: SceneSnapshot) {
        if self.cancelled {
            return;
        }
        self.pending = Some(snapshot);
        self.frames_requested += 1;
    }

    /// Render the pending snapshot, if any. At most one composite per call.
    pub fn run_frame(
        &mut self,
        compositor: &mut Compositor,
        bitmaps: &SceneBitmaps,
        container_px: u32,
    ) -> VisorResult<Option<RenderedFrame>> {
        if self.cancelled {
            return Ok(None);
        }
        let Some(snapshot) = self.pending.take() else {
            return Ok(None);
        };

        let frame = render_scene(
            compositor,
            &snapshot,
            RenderMode::Preview { container_px },
            bitmaps,
        )?;
        self.frames_rendered += 1;
        Ok(Some(frame))
    }

    /// Stop the scheduler: drops the pending snapshot and refuses further
    /// requests. No pixels are produced after this (component unmount).
    pub fn cancel(&mut self) {
        self.pending = None;
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn frames_requested(&self) -> u64 {
        self.frames_requested
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}
