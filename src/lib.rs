#![forbid(unsafe_code)]

//! Helmet-avatar compositing engine.
//!
//! Two raster layers (a user photo and a helmet overlay) plus an optional
//! background are composited onto a square preview surface or a
//! native-resolution export surface:
//!
//! 1. [`InputRouter`] turns pointer/keyboard input into transform state.
//! 2. [`SceneSnapshot`] captures that state by value.
//! 3. [`plan_scene`] resolves the snapshot into pure geometry.
//! 4. [`Compositor`] executes the plan on the CPU into premultiplied RGBA8.
//!
//! The live preview path goes through [`PreviewScheduler`], which coalesces
//! rapid state changes into one composite per frame; exports call
//! [`render_scene`] directly.

pub mod assets;
pub mod compose;
pub mod error;
pub mod geom;
pub mod input;
pub mod preview;
pub mod scene;
pub mod transform;

pub use assets::{BitmapId, PreparedBitmap, SceneBitmaps, SceneSources, decode_bitmap, load_bitmap};
pub use compose::{Compositor, RenderedFrame, render_scene};
pub use error::{VisorError, VisorResult};
pub use geom::{Frac2, Rgba8, SurfaceSize};
pub use input::{ContainerRect, EditMode, InputRouter, Key, KeyInput, PointerInput};
pub use preview::PreviewScheduler;
pub use scene::{ComposePlan, RenderMode, SceneSnapshot, plan_scene};
pub use transform::{HelmetState, HelmetTransform, UserImageState, UserImageTransform};
