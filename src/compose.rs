use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    assets::{BitmapId, PreparedBitmap, SceneBitmaps},
    error::{VisorError, VisorResult},
    geom,
    scene::{BackgroundOp, ComposePlan, RenderMode, SceneSnapshot, plan_scene},
};

/// Finished composite: premultiplied RGBA8, row-major, tightly packed.
#[derive(Clone, Debug)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RenderedFrame {
    /// Unpremultiply for encoders that expect straight alpha (PNG).
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a == 0 || a == 255 {
                continue;
            }
            px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
            px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
            px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
        }
        out
    }
}

/// Executes [`ComposePlan`]s on the CPU.
///
/// Each render draws into a fresh off-screen pixmap, so a failure partway
/// through never leaves a half-composited frame anywhere a caller can see.
/// Bitmap paints are cached across renders keyed by [`BitmapId`], which
/// keeps the per-frame preview path from re-wrapping the same bitmaps.
/// Ids are never reused, so a swapped-out bitmap can never be served a
/// predecessor's pixels; entries for bitmaps absent from the current scene
/// are evicted at the start of each render.
pub struct Compositor {
    paint_cache: HashMap<BitmapId, vello_cpu::Image>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            paint_cache: HashMap::new(),
        }
    }

    pub fn execute(
        &mut self,
        plan: &ComposePlan,
        bitmaps: &SceneBitmaps,
    ) -> VisorResult<RenderedFrame> {
        self.evict_stale_paints(bitmaps);

        let (width_u16, height_u16) = plan.surface.to_u16()?;
        let mut ctx = vello_cpu::RenderContext::new(width_u16, height_u16);
        let mut pixmap = vello_cpu::Pixmap::new(width_u16, height_u16);

        let (surface_w, surface_h) = (
            f64::from(plan.surface.width),
            f64::from(plan.surface.height),
        );

        match plan.background {
            BackgroundOp::Flat(color) => {
                ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    color.r, color.g, color.b, color.a,
                ));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, surface_w, surface_h));
            }
            BackgroundOp::Stretch { natural } => {
                let bg = bitmaps.background.as_ref().ok_or_else(|| {
                    VisorError::render("plan has a background op but no background bitmap")
                })?;
                let affine = geom::Affine::scale_non_uniform(
                    surface_w / natural.0,
                    surface_h / natural.1,
                );
                self.draw_bitmap(&mut ctx, bg, affine, natural)?;
            }
        }

        let clipped = if let Some(circle) = plan.visor_clip {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.push_clip_layer(&circle_to_cpu_path(circle));
            true
        } else {
            false
        };
        self.draw_bitmap(&mut ctx, &bitmaps.user, plan.user.affine, plan.user.natural)?;
        if clipped {
            ctx.pop_layer();
        }

        // Helmet on top, never clipped.
        self.draw_bitmap(
            &mut ctx,
            &bitmaps.helmet,
            plan.helmet.affine,
            plan.helmet.natural,
        )?;

        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        Ok(RenderedFrame {
            width: plan.surface.width,
            height: plan.surface.height,
            data: pixmap.data_as_u8_slice().to_vec(),
        })
    }

    fn draw_bitmap(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        bitmap: &PreparedBitmap,
        affine: geom::Affine,
        natural: (f64, f64),
    ) -> VisorResult<()> {
        let paint = self.paint_for(bitmap)?;
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(affine_to_cpu(affine));
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, natural.0, natural.1));
        Ok(())
    }

    fn paint_for(&mut self, bitmap: &PreparedBitmap) -> VisorResult<vello_cpu::Image> {
        if let Some(paint) = self.paint_cache.get(&bitmap.id()) {
            return Ok(paint.clone());
        }

        let pixmap = premul_bytes_to_pixmap(&bitmap.rgba8_premul, bitmap.width, bitmap.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.paint_cache.insert(bitmap.id(), paint.clone());
        Ok(paint)
    }

    /// Drop cached paints for bitmaps the current scene no longer uses, so
    /// repeated uploads do not grow the cache without bound.
    fn evict_stale_paints(&mut self, bitmaps: &SceneBitmaps) {
        let live = [
            Some(bitmaps.user.id()),
            Some(bitmaps.helmet.id()),
            bitmaps.background.as_ref().map(|b| b.id()),
        ];
        self.paint_cache.retain(|id, _| live.contains(&Some(*id)));
    }
}

/// Plan and execute one composite for a scene snapshot.
#[tracing::instrument(skip(compositor, snapshot, bitmaps))]
pub fn render_scene(
    compositor: &mut Compositor,
    snapshot: &SceneSnapshot,
    mode: RenderMode,
    bitmaps: &SceneBitmaps,
) -> VisorResult<RenderedFrame> {
    let plan = plan_scene(
        snapshot,
        mode,
        bitmaps.user.dims(),
        bitmaps.helmet.dims(),
        bitmaps.background.as_ref().map(|b| b.dims()),
    )?;
    tracing::debug!(
        width = plan.surface.width,
        height = plan.surface.height,
        clipped = plan.visor_clip.is_some(),
        "compositing scene"
    );
    compositor.execute(&plan, bitmaps)
}

fn affine_to_cpu(a: geom::Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn circle_to_cpu_path(circle: geom::Circle) -> vello_cpu::kurbo::BezPath {
    use kurbo::{PathEl, Shape as _};

    let path = circle.to_path(0.1);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn point_to_cpu(p: geom::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> VisorResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| VisorError::bitmap_load("bitmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| VisorError::bitmap_load("bitmap height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(VisorError::bitmap_load("bitmap byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}
