use crate::{
    error::{VisorError, VisorResult},
    geom::Frac2,
    transform::{HelmetTransform, UserImageTransform},
};

/// Keyboard nudge step in surface fractions; shift multiplies by 5.
pub const KEY_STEP: f64 = 0.01;
pub const KEY_STEP_SHIFT: f64 = 0.05;
/// Helmet scale increment for the `+`/`-` keys.
pub const KEY_SCALE_STEP: f64 = 0.05;

/// A pointer coordinate in absolute (client) pixels, normalized from either
/// a mouse event or a touch list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerInput {
    pub x: f64,
    pub y: f64,
}

impl PointerInput {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Multi-touch collapses to the first touch point.
    pub fn from_touches(touches: &[PointerInput]) -> Option<Self> {
        touches.first().copied()
    }
}

/// Absolute pixel rect of the preview container, used to turn client
/// coordinates into surface fractions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> VisorResult<Self> {
        if width <= 0.0 || height <= 0.0 {
            return Err(VisorError::validation(
                "container rect width/height must be > 0",
            ));
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    pub fn fraction(&self, pointer: PointerInput) -> Frac2 {
        Frac2::new(
            (pointer.x - self.left) / self.width,
            (pointer.y - self.top) / self.height,
        )
    }
}

/// Which layer currently receives drag and keyboard input. External UI
/// state, passed in explicitly; the controllers never guess.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EditMode {
    Helmet,
    UserImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    /// `+` / `=`
    ScaleUp,
    /// `-` / `_`
    ScaleDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub shift: bool,
}

/// Routes a unified pointer/keyboard stream to whichever controller the
/// current [`EditMode`] selects.
///
/// While a drag is active the router captures the pointer: moves and the
/// final up keep going to the controller that began the drag even if the
/// edit mode changes mid-drag or the pointer leaves the preview bounds.
/// Capture is released unconditionally on pointer-up.
#[derive(Clone, Debug)]
pub struct InputRouter {
    mode: EditMode,
    capture: Option<EditMode>,
    pub helmet: HelmetTransform,
    pub user_image: UserImageTransform,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new(EditMode::Helmet)
    }
}

impl InputRouter {
    pub fn new(mode: EditMode) -> Self {
        Self {
            mode,
            capture: None,
            helmet: HelmetTransform::new(),
            user_image: UserImageTransform::new(),
        }
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Switching modes never steals an in-flight drag.
    pub fn set_mode(&mut self, mode: EditMode) {
        self.mode = mode;
    }

    pub fn is_dragging(&self) -> bool {
        self.capture.is_some()
    }

    pub fn on_pointer_down(&mut self, pointer: PointerInput, rect: &ContainerRect) {
        match self.mode {
            EditMode::Helmet => self.helmet.control_mut().begin_drag(pointer, rect),
            EditMode::UserImage => self.user_image.control_mut().begin_drag(pointer, rect),
        }
        self.capture = Some(self.mode);
    }

    pub fn on_pointer_move(&mut self, pointer: PointerInput, rect: &ContainerRect) {
        match self.capture.unwrap_or(self.mode) {
            EditMode::Helmet => self.helmet.control_mut().update_drag(pointer, rect),
            EditMode::UserImage => self.user_image.control_mut().update_drag(pointer, rect),
        }
    }

    pub fn on_pointer_up(&mut self) {
        match self.capture.take() {
            Some(EditMode::Helmet) => self.helmet.control_mut().end_drag(),
            Some(EditMode::UserImage) => self.user_image.control_mut().end_drag(),
            None => {
                // Stray up with no capture; end_drag is idempotent on both.
                self.helmet.control_mut().end_drag();
                self.user_image.control_mut().end_drag();
            }
        }
    }

    /// Keyboard deltas go exclusively to the helmet, and only while the
    /// preview holds focus. Returns whether the key was consumed.
    pub fn on_key(&mut self, input: KeyInput, preview_focused: bool) -> bool {
        if self.mode != EditMode::Helmet || !preview_focused {
            return false;
        }

        let step = if input.shift { KEY_STEP_SHIFT } else { KEY_STEP };
        let control = self.helmet.control_mut();
        match input.key {
            Key::ArrowLeft => control.nudge(-step, 0.0),
            Key::ArrowRight => control.nudge(step, 0.0),
            Key::ArrowUp => control.nudge(0.0, -step),
            Key::ArrowDown => control.nudge(0.0, step),
            Key::ScaleUp => control.adjust_scale(KEY_SCALE_STEP),
            Key::ScaleDown => control.adjust_scale(-KEY_SCALE_STEP),
        }
        true
    }
}
