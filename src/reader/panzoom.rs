//! Pan/zoom transform for the paged reading surface and the rules for which
//! gestures reach it.

use tracing::trace;

use crate::config::ReaderOptions;

/// Never zoom out past fit-to-width.
pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 10.0;
/// Multiplicative step for one wheel notch.
const WHEEL_ZOOM_FACTOR: f64 = 1.1;
/// Double-click zooms back to 1 at or beyond this scale.
const DOUBLE_CLICK_RESET_SCALE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl Transform {
    pub fn is_zoomed(&self) -> bool {
        self.scale != 1.0
    }
}

/// A pan/zoom controller. Points are in surface coordinates.
pub trait ZoomTransform {
    fn transform(&self) -> Transform;

    /// Zoom to an absolute scale keeping `(x, y)` fixed on screen.
    fn zoom_abs(&mut self, x: f64, y: f64, scale: f64);

    /// Multiply the scale by `factor` around `(x, y)`.
    fn zoom_by(&mut self, x: f64, y: f64, factor: f64) {
        let scale = self.transform().scale * factor;
        self.zoom_abs(x, y, scale);
    }

    fn pan_by(&mut self, dx: f64, dy: f64);

    /// Size of the surface the transform is bounded to.
    fn set_bounds(&mut self, width: f64, height: f64);

    fn reset(&mut self) {
        self.zoom_abs(0.0, 0.0, 1.0);
    }
}

/// Transform that keeps the zoomed surface covering the viewport.
#[derive(Debug, Clone, Default)]
pub struct BoundedTransform {
    current: Transform,
    width: f64,
    height: f64,
}

impl BoundedTransform {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            current: Transform::default(),
            width,
            height,
        }
    }

    fn clamp_offsets(&mut self) {
        let t = &mut self.current;
        let min_x = self.width * (1.0 - t.scale);
        let min_y = self.height * (1.0 - t.scale);
        t.x = t.x.clamp(min_x.min(0.0), 0.0);
        t.y = t.y.clamp(min_y.min(0.0), 0.0);
    }
}

impl ZoomTransform for BoundedTransform {
    fn transform(&self) -> Transform {
        self.current
    }

    fn zoom_abs(&mut self, x: f64, y: f64, scale: f64) {
        let old = self.current;
        let mut scale = scale.clamp(MIN_ZOOM, MAX_ZOOM);
        // Snap float drift back to exactly 1.
        if (scale - MIN_ZOOM).abs() < 1e-6 {
            scale = MIN_ZOOM;
        }
        if (scale - old.scale).abs() < 1e-9 {
            return;
        }
        // Keep the surface point under (x, y) where it is.
        let ratio = scale / old.scale;
        self.current = Transform {
            scale,
            x: x - (x - old.x) * ratio,
            y: y - (y - old.y) * ratio,
        };
        self.clamp_offsets();
    }

    fn pan_by(&mut self, dx: f64, dy: f64) {
        self.current.x += dx;
        self.current.y += dy;
        self.clamp_offsets();
    }

    fn set_bounds(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.clamp_offsets();
    }
}

/// Whether a wheel event should zoom instead of scrolling or turning pages.
pub fn wheel_zoom_allowed(option: &ReaderOptions, modifier: bool, zoomed: bool) -> bool {
    !option.disable_zoom && !option.scroll_mode && (modifier || zoomed)
}

/// Whether a pointer drag should pan the surface.
pub fn pan_allowed(option: &ReaderOptions, modifier: bool, zoomed: bool) -> bool {
    !option.scroll_mode || modifier || zoomed
}

/// Owns the transform and applies gesture gating on top of it.
pub struct PanZoom {
    inner: Box<dyn ZoomTransform>,
}

impl PanZoom {
    pub fn new(inner: Box<dyn ZoomTransform>) -> Self {
        Self { inner }
    }

    pub fn transform(&self) -> Transform {
        self.inner.transform()
    }

    pub fn set_bounds(&mut self, width: f64, height: f64) {
        self.inner.set_bounds(width, height);
    }

    /// Zoom for one wheel notch. Returns whether the scale changed.
    pub fn wheel(&mut self, x: f64, y: f64, delta_y: f64) -> bool {
        let before = self.inner.transform().scale;
        let factor = if delta_y < 0.0 {
            WHEEL_ZOOM_FACTOR
        } else {
            1.0 / WHEEL_ZOOM_FACTOR
        };
        self.inner.zoom_by(x, y, factor);
        self.changed(before)
    }

    /// Step in by one at the click point, or back to 1 from 2 and above.
    pub fn double_click(&mut self, x: f64, y: f64) -> bool {
        let before = self.inner.transform().scale;
        if before >= DOUBLE_CLICK_RESET_SCALE {
            self.inner.reset();
        } else {
            self.inner.zoom_abs(x, y, before + 1.0);
        }
        self.changed(before)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.inner.pan_by(dx, dy);
    }

    pub fn reset(&mut self) -> bool {
        let before = self.inner.transform().scale;
        self.inner.reset();
        self.changed(before)
    }

    fn changed(&self, before: f64) -> bool {
        let after = self.inner.transform().scale;
        let changed = (after - before).abs() > 1e-9;
        if changed {
            trace!(before, after, "Zoom changed");
        }
        changed
    }
}

impl Default for PanZoom {
    fn default() -> Self {
        Self::new(Box::new(BoundedTransform::default()))
    }
}

impl std::fmt::Debug for PanZoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanZoom")
            .field("transform", &self.inner.transform())
            .finish()
    }
}
