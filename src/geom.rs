use crate::error::{VisorError, VisorResult};

pub use kurbo::{Affine, BezPath, Circle, Point, Rect, Vec2};

/// A point expressed as fractions of a surface's width/height.
///
/// `(0.5, 0.5)` is the surface center. Helmet positions are kept inside
/// `[0, 1]` on both axes; the user image may drift outside so it can be
/// panned partly off-canvas.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Frac2 {
    pub x: f64,
    pub y: f64,
}

impl Frac2 {
    pub const CENTER: Self = Self { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn clamp_unit(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }

    /// Resolve to absolute pixels on a surface of the given dimensions.
    pub fn to_pixels(self, width: f64, height: f64) -> Point {
        Point::new(self.x * width, self.y * height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> VisorResult<Self> {
        if width == 0 || height == 0 {
            return Err(VisorError::validation("surface width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn square(side: u32) -> VisorResult<Self> {
        Self::new(side, side)
    }

    /// The CPU raster surface addresses pixels with u16 coordinates.
    pub fn to_u16(self) -> VisorResult<(u16, u16)> {
        let w: u16 = self
            .width
            .try_into()
            .map_err(|_| VisorError::render("surface width exceeds u16"))?;
        let h: u16 = self
            .height
            .try_into()
            .map_err(|_| VisorError::render("surface height exceeds u16"))?;
        Ok((w, h))
    }
}

/// Straight-alpha RGBA8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    /// Flat preview fallback in light theme (`#f9fafb`).
    pub const FALLBACK_LIGHT: Self = Self::opaque(0xf9, 0xfa, 0xfb);
    /// Flat preview fallback in dark theme (`#374151`).
    pub const FALLBACK_DARK: Self = Self::opaque(0x37, 0x41, 0x51);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_premul(self) -> [u8; 4] {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        [
            premul(self.r, self.a),
            premul(self.g, self.a),
            premul(self.b, self.a),
            self.a,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_unit_bounds_both_axes() {
        let p = Frac2::new(-0.2, 1.7).clamp_unit();
        assert_eq!(p, Frac2::new(0.0, 1.0));

        let inside = Frac2::new(0.3, 0.9).clamp_unit();
        assert_eq!(inside, Frac2::new(0.3, 0.9));
    }

    #[test]
    fn to_pixels_resolves_against_dimensions() {
        let p = Frac2::new(0.25, 0.5).to_pixels(400.0, 200.0);
        assert_eq!(p, Point::new(100.0, 100.0));
    }

    #[test]
    fn surface_size_rejects_zero() {
        assert!(SurfaceSize::new(0, 10).is_err());
        assert!(SurfaceSize::new(10, 0).is_err());
        assert!(SurfaceSize::new(10, 10).is_ok());
    }

    #[test]
    fn surface_size_u16_guard() {
        assert!(SurfaceSize::new(100_000, 10).unwrap().to_u16().is_err());
        assert_eq!(SurfaceSize::new(800, 600).unwrap().to_u16().unwrap(), (800, 600));
    }

    #[test]
    fn opaque_premul_is_identity() {
        let c = Rgba8::FALLBACK_LIGHT;
        assert_eq!(c.to_premul(), [0xf9, 0xfa, 0xfb, 255]);
    }

    #[test]
    fn premul_scales_by_alpha() {
        let c = Rgba8 {
            r: 100,
            g: 50,
            b: 200,
            a: 128,
        };
        assert_eq!(
            c.to_premul(),
            [
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128
            ]
        );
    }
}
