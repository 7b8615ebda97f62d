use crate::{
    error::{VisorError, VisorResult},
    geom::{Affine, Circle, Rgba8, SurfaceSize},
    transform::{HelmetState, UserImageState},
};

/// Fraction of the surface width a helmet at scale 1.0 occupies.
const HELMET_WIDTH_FACTOR: f64 = 0.5;
/// Visor aperture, as proportions of the helmet's drawn bounds.
const VISOR_CENTER_X: f64 = 0.533;
const VISOR_CENTER_Y: f64 = 0.5;
const VISOR_RADIUS: f64 = 0.37;

/// Everything the compositor needs to know about one render, by value.
/// The compositor never mutates it; only the transform controllers produce
/// new snapshots. Doubles as the scene JSON file format.
#[derive(Clone, Copy, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SceneSnapshot {
    pub helmet: HelmetState,
    pub user_image: UserImageState,
    pub use_background: bool,
    pub dark_mode: bool,
}

impl SceneSnapshot {
    /// Parse a snapshot from its JSON representation.
    pub fn from_json(json: &str) -> VisorResult<Self> {
        serde_json::from_str(json).map_err(|e| VisorError::serde(format!("scene snapshot: {e}")))
    }

    pub fn to_json(&self) -> VisorResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VisorError::serde(format!("scene snapshot: {e}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Square low-res surface sized to the preview container.
    Preview { container_px: u32 },
    /// Surface sized to the user bitmap's native dimensions.
    Export,
}

/// How the bottom of the stack is produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BackgroundOp {
    /// Flat theme fallback; no background bitmap is sampled.
    Flat(Rgba8),
    /// Background bitmap stretched to fill the surface.
    Stretch { natural: (f64, f64) },
}

/// One layer's draw: the affine mapping its natural pixels onto the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerDraw {
    pub affine: Affine,
    pub natural: (f64, f64),
}

/// Backend-agnostic geometry for a single composite, resolved before any
/// pixels move.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposePlan {
    pub surface: SurfaceSize,
    pub background: BackgroundOp,
    /// Clip for the user image; present only when a background is drawn.
    pub visor_clip: Option<Circle>,
    pub user: LayerDraw,
    pub helmet: LayerDraw,
}

/// The affine skew approximating perspective. Coefficients follow the
/// canvas `transform(a, b, c, d, e, f)` layout: skew terms are
/// `perspective/200`, diagonal adjustments `perspective/100`. This is not a
/// projective warp and is kept as-is for visual compatibility.
pub fn perspective_skew(perspective_x: f64, perspective_y: f64) -> Affine {
    Affine::new([
        1.0 + perspective_x / 100.0,
        perspective_y / 200.0,
        perspective_x / 200.0,
        1.0 + perspective_y / 100.0,
        0.0,
        0.0,
    ])
}

/// Resolve a snapshot plus bitmap dimensions into a [`ComposePlan`].
///
/// Pure geometry; given equal inputs the plan (and therefore the rendered
/// pixels) is identical. Preview and export share one code path, differing
/// only in surface size and the user fit-scale.
pub fn plan_scene(
    snapshot: &SceneSnapshot,
    mode: RenderMode,
    user_dims: (u32, u32),
    helmet_dims: (u32, u32),
    background_dims: Option<(u32, u32)>,
) -> VisorResult<ComposePlan> {
    if user_dims.0 == 0 || user_dims.1 == 0 || helmet_dims.0 == 0 || helmet_dims.1 == 0 {
        return Err(VisorError::validation("layer bitmaps must be non-empty"));
    }

    let surface = match mode {
        RenderMode::Preview { container_px } => SurfaceSize::square(container_px)?,
        RenderMode::Export => SurfaceSize::new(user_dims.0, user_dims.1)?,
    };
    let (surface_w, surface_h) = (f64::from(surface.width), f64::from(surface.height));

    let (user_w, user_h) = (f64::from(user_dims.0), f64::from(user_dims.1));
    let fit = match mode {
        RenderMode::Preview { .. } => {
            (surface_w / user_w).min(surface_h / user_h) * snapshot.user_image.scale
        }
        RenderMode::Export => snapshot.user_image.scale,
    };
    let (scaled_w, scaled_h) = (user_w * fit, user_h * fit);
    let center = snapshot.user_image.position.to_pixels(surface_w, surface_h);

    let mut user_affine = Affine::translate((center.x, center.y));
    if snapshot.user_image.flipped {
        user_affine = user_affine * Affine::scale_non_uniform(-1.0, 1.0);
    }
    user_affine = user_affine
        * Affine::rotate(snapshot.user_image.rotation_deg.to_radians())
        * perspective_skew(
            snapshot.user_image.perspective_x,
            snapshot.user_image.perspective_y,
        )
        * Affine::translate((-scaled_w / 2.0, -scaled_h / 2.0))
        * Affine::scale(fit);

    let (helmet_nat_w, helmet_nat_h) = (f64::from(helmet_dims.0), f64::from(helmet_dims.1));
    let helmet_w = surface_w * snapshot.helmet.scale * HELMET_WIDTH_FACTOR;
    let helmet_h = (helmet_nat_h / helmet_nat_w) * helmet_w;
    let helmet_x = surface_w * snapshot.helmet.position.x - helmet_w / 2.0;
    let helmet_y = surface_h * snapshot.helmet.position.y - helmet_h / 2.0;
    let helmet_affine =
        Affine::translate((helmet_x, helmet_y)) * Affine::scale(helmet_w / helmet_nat_w);

    let (background, visor_clip) = if snapshot.use_background {
        let (bg_w, bg_h) = background_dims.ok_or_else(|| {
            VisorError::validation("use_background set but no background bitmap was loaded")
        })?;
        if bg_w == 0 || bg_h == 0 {
            return Err(VisorError::validation("background bitmap must be non-empty"));
        }
        let clip = Circle::new(
            (
                helmet_x + helmet_w * VISOR_CENTER_X,
                helmet_y + helmet_h * VISOR_CENTER_Y,
            ),
            helmet_w * VISOR_RADIUS,
        );
        (
            BackgroundOp::Stretch {
                natural: (f64::from(bg_w), f64::from(bg_h)),
            },
            Some(clip),
        )
    } else {
        let fill = if snapshot.dark_mode {
            Rgba8::FALLBACK_DARK
        } else {
            Rgba8::FALLBACK_LIGHT
        };
        (BackgroundOp::Flat(fill), None)
    };

    Ok(ComposePlan {
        surface,
        background,
        visor_clip,
        user: LayerDraw {
            affine: user_affine,
            natural: (user_w, user_h),
        },
        helmet: LayerDraw {
            affine: helmet_affine,
            natural: (helmet_nat_w, helmet_nat_h),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Frac2, Point};

    fn snapshot() -> SceneSnapshot {
        SceneSnapshot::default()
    }

    #[test]
    fn preview_surface_is_square_container() {
        let plan = plan_scene(
            &snapshot(),
            RenderMode::Preview { container_px: 320 },
            (800, 600),
            (512, 512),
            None,
        )
        .unwrap();
        assert_eq!(plan.surface, SurfaceSize::new(320, 320).unwrap());
    }

    #[test]
    fn export_surface_matches_user_bitmap() {
        let plan = plan_scene(&snapshot(), RenderMode::Export, (800, 600), (512, 512), None)
            .unwrap();
        assert_eq!(plan.surface, SurfaceSize::new(800, 600).unwrap());
    }

    #[test]
    fn helmet_extent_uses_half_width_factor() {
        // Default scale 1.74 on a 100px surface: width 87, centered.
        let plan = plan_scene(
            &snapshot(),
            RenderMode::Preview { container_px: 100 },
            (100, 100),
            (64, 64),
            None,
        )
        .unwrap();
        let origin = plan.helmet.affine * Point::new(0.0, 0.0);
        assert!((origin.x - 6.5).abs() < 1e-9);
        assert!((origin.y - 6.5).abs() < 1e-9);
        let far = plan.helmet.affine * Point::new(64.0, 64.0);
        assert!((far.x - 93.5).abs() < 1e-9);
    }

    #[test]
    fn visor_clip_tracks_helmet_bounds() {
        let mut snap = snapshot();
        snap.use_background = true;
        let plan = plan_scene(
            &snap,
            RenderMode::Preview { container_px: 100 },
            (100, 100),
            (64, 64),
            Some((10, 10)),
        )
        .unwrap();
        let clip = plan.visor_clip.unwrap();
        // helmet: x 6.5, w 87 -> center x = 6.5 + 87*0.533
        assert!((clip.center.x - (6.5 + 87.0 * 0.533)).abs() < 1e-9);
        assert!((clip.center.y - 50.0).abs() < 1e-9);
        assert!((clip.radius - 87.0 * 0.37).abs() < 1e-9);
    }

    #[test]
    fn missing_background_bitmap_is_rejected() {
        let mut snap = snapshot();
        snap.use_background = true;
        let err = plan_scene(
            &snap,
            RenderMode::Preview { container_px: 100 },
            (100, 100),
            (64, 64),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("background"));
    }

    #[test]
    fn flat_fill_follows_theme() {
        let mut snap = snapshot();
        let light = plan_scene(
            &snap,
            RenderMode::Preview { container_px: 64 },
            (10, 10),
            (10, 10),
            None,
        )
        .unwrap();
        assert_eq!(light.background, BackgroundOp::Flat(Rgba8::FALLBACK_LIGHT));

        snap.dark_mode = true;
        let dark = plan_scene(
            &snap,
            RenderMode::Preview { container_px: 64 },
            (10, 10),
            (10, 10),
            None,
        )
        .unwrap();
        assert_eq!(dark.background, BackgroundOp::Flat(Rgba8::FALLBACK_DARK));
    }

    #[test]
    fn preview_fit_scale_divides_by_container() {
        // 200x100 image in a 100px container: fit = min(0.5, 1.0) = 0.5.
        let plan = plan_scene(
            &snapshot(),
            RenderMode::Preview { container_px: 100 },
            (200, 100),
            (64, 64),
            None,
        )
        .unwrap();
        // Image center maps to the surface center; its left edge is at
        // 50 - (200*0.5)/2 = 0.
        let left = plan.user.affine * Point::new(0.0, 50.0);
        assert!((left.x - 0.0).abs() < 1e-9);
        let right = plan.user.affine * Point::new(200.0, 50.0);
        assert!((right.x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn export_fit_scale_is_user_scale_alone() {
        let mut snap = snapshot();
        snap.user_image.scale = 2.0;
        let plan =
            plan_scene(&snap, RenderMode::Export, (100, 100), (64, 64), None).unwrap();
        let left = plan.user.affine * Point::new(0.0, 50.0);
        let right = plan.user.affine * Point::new(100.0, 50.0);
        assert!((right.x - left.x - 200.0).abs() < 1e-9);
    }

    #[test]
    fn flip_negates_x_around_center() {
        let mut snap = snapshot();
        snap.user_image.flipped = true;
        let plan = plan_scene(
            &snap,
            RenderMode::Preview { container_px: 100 },
            (100, 100),
            (64, 64),
            None,
        )
        .unwrap();
        // The image's left edge lands on the right side of center.
        let left = plan.user.affine * Point::new(0.0, 50.0);
        assert!((left.x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn perspective_skew_matches_formula() {
        let m = perspective_skew(20.0, -40.0).as_coeffs();
        assert_eq!(m, [1.2, -0.2, 0.1, 0.6, 0.0, 0.0]);

        let identity = perspective_skew(0.0, 0.0);
        assert_eq!(identity, Affine::IDENTITY);
    }

    #[test]
    fn user_position_is_not_clamped_at_plan_time() {
        let mut snap = snapshot();
        snap.user_image.position = Frac2::new(-0.5, 1.5);
        let plan = plan_scene(
            &snap,
            RenderMode::Preview { container_px: 100 },
            (100, 100),
            (64, 64),
            None,
        )
        .unwrap();
        let center = plan.user.affine * Point::new(50.0, 50.0);
        assert!((center.x - -50.0).abs() < 1e-9);
        assert!((center.y - 150.0).abs() < 1e-9);
    }

    #[test]
    fn scene_snapshot_json_round_trip() {
        let snap = SceneSnapshot {
            use_background: true,
            dark_mode: true,
            ..SceneSnapshot::default()
        };
        let s = snap.to_json().unwrap();
        let de = SceneSnapshot::from_json(&s).unwrap();
        assert_eq!(de, snap);
    }

    #[test]
    fn malformed_snapshot_json_is_a_serde_error() {
        let err = SceneSnapshot::from_json("{ not json").unwrap_err();
        assert!(matches!(err, VisorError::Serde(_)));
        assert!(err.to_string().contains("serialization error:"));
    }
}
