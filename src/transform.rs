use crate::{
    geom::Frac2,
    input::{ContainerRect, PointerInput},
};

/// Helmet scale clamp range and default.
pub const HELMET_SCALE_MIN: f64 = 0.7;
pub const HELMET_SCALE_MAX: f64 = 2.0;
pub const HELMET_SCALE_DEFAULT: f64 = 1.74;

/// User-image scale clamp range.
pub const USER_SCALE_MIN: f64 = 0.1;
pub const USER_SCALE_MAX: f64 = 3.0;

/// Perspective skew clamp range (both axes).
pub const PERSPECTIVE_MAX: f64 = 50.0;

/// Static behavior of one draggable layer.
#[derive(Clone, Copy, Debug)]
pub struct LayerParams {
    pub default_position: Frac2,
    pub default_scale: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    /// Whether drag/nudge results are clamped into `[0, 1]` per axis.
    /// The user photo keeps this off so it can be panned partly off-canvas.
    pub clamp_position: bool,
}

/// Ephemeral drag state: the offset between the pointer-down point and the
/// layer center, in surface fractions. Created on pointer-down, consumed on
/// every move, dropped on pointer-up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragSession {
    pub offset: Frac2,
}

/// The shared drag/scale mechanics behind both layers.
///
/// Pointer math happens once here; the helmet and user-image controllers are
/// two instances with different clamp ranges and defaults.
#[derive(Clone, Debug)]
pub struct LayerControl {
    position: Frac2,
    scale: f64,
    drag: Option<DragSession>,
    params: LayerParams,
}

impl LayerControl {
    pub fn new(params: LayerParams) -> Self {
        Self {
            position: params.default_position,
            scale: params.default_scale,
            drag: None,
            params,
        }
    }

    pub fn position(&self) -> Frac2 {
        self.position
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn begin_drag(&mut self, pointer: PointerInput, rect: &ContainerRect) {
        let p = rect.fraction(pointer);
        self.drag = Some(DragSession {
            offset: Frac2::new(p.x - self.position.x, p.y - self.position.y),
        });
    }

    pub fn update_drag(&mut self, pointer: PointerInput, rect: &ContainerRect) {
        let Some(drag) = self.drag else {
            return;
        };
        let p = rect.fraction(pointer);
        let next = Frac2::new(p.x - drag.offset.x, p.y - drag.offset.y);
        self.position = self.apply_clamp(next);
    }

    /// Idempotent; safe to call on a stray pointer-up with no active drag.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn adjust_scale(&mut self, delta: f64) {
        self.scale = (self.scale + delta).clamp(self.params.scale_min, self.params.scale_max);
    }

    /// Keyboard-style relative move.
    pub fn nudge(&mut self, dx: f64, dy: f64) {
        let next = Frac2::new(self.position.x + dx, self.position.y + dy);
        self.position = self.apply_clamp(next);
    }

    pub fn set_position(&mut self, position: Frac2) {
        self.position = self.apply_clamp(position);
    }

    pub fn reset(&mut self) {
        self.position = self.params.default_position;
        self.scale = self.params.default_scale;
        self.drag = None;
    }

    fn apply_clamp(&self, p: Frac2) -> Frac2 {
        if self.params.clamp_position { p.clamp_unit() } else { p }
    }
}

/// Plain-value snapshot of the helmet layer, as handed to the compositor.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HelmetState {
    pub position: Frac2,
    pub scale: f64,
}

impl Default for HelmetState {
    fn default() -> Self {
        Self {
            position: Frac2::CENTER,
            scale: HELMET_SCALE_DEFAULT,
        }
    }
}

/// Plain-value snapshot of the user-image layer.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserImageState {
    pub position: Frac2,
    pub scale: f64,
    pub rotation_deg: f64,
    pub flipped: bool,
    pub perspective_x: f64,
    pub perspective_y: f64,
}

impl Default for UserImageState {
    fn default() -> Self {
        Self {
            position: Frac2::CENTER,
            scale: 1.0,
            rotation_deg: 0.0,
            flipped: false,
            perspective_x: 0.0,
            perspective_y: 0.0,
        }
    }
}

/// Interactive state for the helmet overlay.
#[derive(Clone, Debug)]
pub struct HelmetTransform {
    control: LayerControl,
}

impl Default for HelmetTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl HelmetTransform {
    pub fn new() -> Self {
        Self {
            control: LayerControl::new(LayerParams {
                default_position: Frac2::CENTER,
                default_scale: HELMET_SCALE_DEFAULT,
                scale_min: HELMET_SCALE_MIN,
                scale_max: HELMET_SCALE_MAX,
                clamp_position: true,
            }),
        }
    }

    pub fn control(&self) -> &LayerControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut LayerControl {
        &mut self.control
    }

    pub fn reset(&mut self) {
        self.control.reset();
    }

    pub fn snapshot(&self) -> HelmetState {
        HelmetState {
            position: self.control.position(),
            scale: self.control.scale(),
        }
    }
}

/// Interactive state for the user photo: shared drag/scale mechanics plus
/// rotation, horizontal flip and the pseudo-perspective skew.
#[derive(Clone, Debug)]
pub struct UserImageTransform {
    control: LayerControl,
    rotation_deg: f64,
    flipped: bool,
    perspective_x: f64,
    perspective_y: f64,
}

impl Default for UserImageTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl UserImageTransform {
    pub fn new() -> Self {
        Self {
            control: LayerControl::new(LayerParams {
                default_position: Frac2::CENTER,
                default_scale: 1.0,
                scale_min: USER_SCALE_MIN,
                scale_max: USER_SCALE_MAX,
                clamp_position: false,
            }),
            rotation_deg: 0.0,
            flipped: false,
            perspective_x: 0.0,
            perspective_y: 0.0,
        }
    }

    pub fn control(&self) -> &LayerControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut LayerControl {
        &mut self.control
    }

    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    /// Wraps into `[0, 360)`. Negative deltas land back in range instead of
    /// going negative the way a plain `%` would.
    pub fn adjust_rotation(&mut self, delta_deg: f64) {
        self.rotation_deg = (self.rotation_deg + delta_deg).rem_euclid(360.0);
    }

    pub fn flipped(&self) -> bool {
        self.flipped
    }

    pub fn toggle_flip(&mut self) {
        self.flipped = !self.flipped;
    }

    pub fn perspective(&self) -> (f64, f64) {
        (self.perspective_x, self.perspective_y)
    }

    pub fn adjust_perspective_x(&mut self, delta: f64) {
        self.perspective_x = (self.perspective_x + delta).clamp(-PERSPECTIVE_MAX, PERSPECTIVE_MAX);
    }

    pub fn adjust_perspective_y(&mut self, delta: f64) {
        self.perspective_y = (self.perspective_y + delta).clamp(-PERSPECTIVE_MAX, PERSPECTIVE_MAX);
    }

    pub fn reset(&mut self) {
        self.control.reset();
        self.rotation_deg = 0.0;
        self.flipped = false;
        self.perspective_x = 0.0;
        self.perspective_y = 0.0;
    }

    pub fn snapshot(&self) -> UserImageState {
        UserImageState {
            position: self.control.position(),
            scale: self.control.scale(),
            rotation_deg: self.rotation_deg,
            flipped: self.flipped,
            perspective_x: self.perspective_x,
            perspective_y: self.perspective_y,
        }
    }
}
