//! The reading engine.
//!
//! [`MangaReader`] owns the [`Store`] and wires the layout engine, navigation,
//! the progressive loader, scrollbar sync and pan/zoom together. Host input
//! arrives through the public methods; every mutation is one store batch.
//! After each batch the reaction table below is consulted: reactions whose
//! dependencies intersect the batch's [`Changes`] run in table order, and any
//! changes they make are fed back until nothing is left.
//!
//! Time-based work (debounced relayout and loading, throttled tooltip and zoom
//! handling, lock release) is deadline driven. The host calls [`MangaReader::tick`]
//! and can sleep until [`MangaReader::next_deadline`].

pub mod hooks;
pub mod loader;
pub mod navigation;
pub mod panzoom;
pub mod scrollbar;

use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::config::{ReaderOptions, MAX_IMG_SCALE, MIN_IMG_SCALE};
use crate::error::ReaderError;
use crate::layout::{classify, layout, page_of, segment_of, Proportion};
use crate::models::{ComicImage, LoadType, Page, Translation};
use crate::store::{Batch, Changes, EndPageType, State, Store, SubscriptionId, Viewport};
use crate::timing::{earliest, Clock, SystemClock, Throttle, Timer};

pub use hooks::{HookAvailability, HostButton, HostHooks};
pub use loader::{LoadPass, LoadStep};
pub use navigation::{TurnDirection, Transition};
pub use panzoom::{BoundedTransform, PanZoom, Transform, ZoomTransform};
pub use scrollbar::{
    DragAction, DragPhase, DragTracker, Extent, FlowGeometry, ScrollBehavior, TrackDrag,
};

/// Coalescing window for relayout after image classes change.
const RELAYOUT_DEBOUNCE: Duration = Duration::from_millis(100);
/// Coalescing window for load scheduling.
const LOAD_DEBOUNCE: Duration = Duration::from_millis(100);
const TIP_THROTTLE: Duration = Duration::from_millis(100);
/// How long a freshly entered boundary ignores further turns.
const BOUNDARY_LOCK: Duration = Duration::from_millis(200);
const ZOOM_THROTTLE: Duration = Duration::from_millis(200);
/// Grace period before turning is allowed again after zooming back out.
const ZOOM_UNLOCK_GRACE: Duration = Duration::from_millis(200);
/// The end-page prompt outlives the boundary state by this much.
const END_TIP_LINGER: Duration = Duration::from_millis(500);
const MAX_REACTION_ROUNDS: usize = 8;

/// Request for the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Scroll so the content top sits at `fraction` of the content height.
    ScrollTo {
        fraction: f64,
        behavior: ScrollBehavior,
    },
    /// Layout mode changed; report scroll geometry again.
    RefreshScroll,
}

struct Reaction {
    name: &'static str,
    deps: Changes,
    run: fn(&mut MangaReader, Changes) -> Changes,
}

const REACTIONS: &[Reaction] = &[
    Reaction {
        name: "leave_boundary_on_move",
        deps: Changes::ACTIVE_PAGE,
        run: MangaReader::leave_boundary_on_move,
    },
    Reaction {
        name: "track_end_page",
        deps: Changes::END_PAGE,
        run: MangaReader::track_end_page,
    },
    Reaction {
        name: "queue_relayout",
        deps: Changes::IMAGE_SIZE,
        run: MangaReader::queue_relayout,
    },
    Reaction {
        name: "queue_load",
        deps: Changes::IMAGE_LIST
            .union(Changes::PAGES)
            .union(Changes::ACTIVE_PAGE)
            .union(Changes::IMAGE_SIZE)
            .union(Changes::IMAGE_RESULT)
            .union(Changes::VIEWPORT),
        run: MangaReader::queue_load,
    },
    Reaction {
        name: "queue_tip",
        deps: Changes::IMAGE_LIST
            .union(Changes::PAGES)
            .union(Changes::ACTIVE_PAGE)
            .union(Changes::SCROLLBAR)
            .union(Changes::OPTIONS)
            .union(Changes::IMAGE_LOAD)
            .union(Changes::IMAGE_RESULT),
        run: MangaReader::queue_tip,
    },
];

pub struct MangaReader {
    store: Store,
    hooks: HostHooks,
    clock: Rc<dyn Clock>,
    relayout: Timer,
    load: Timer,
    tip: Throttle<()>,
    boundary_unlock: Timer,
    zoom_events: Throttle<()>,
    zoom_unlock: Timer,
    end_tip_clear: Timer,
    /// Boundary shown by the end-page prompt; trails `end_page` when it clears.
    shown_end_page: Option<EndPageType>,
    drag: DragTracker,
    /// Last scroll geometry reported in scroll mode.
    geometry: Option<FlowGeometry>,
    panzoom: PanZoom,
    effects: Vec<Effect>,
}

impl MangaReader {
    pub fn new(option: ReaderOptions) -> Self {
        Self::with_clock(option, Rc::new(SystemClock))
    }

    pub fn with_clock(option: ReaderOptions, clock: Rc<dyn Clock>) -> Self {
        Self {
            store: Store::new(State::new(option)),
            hooks: HostHooks::default(),
            clock,
            relayout: Timer::new(RELAYOUT_DEBOUNCE),
            load: Timer::new(LOAD_DEBOUNCE),
            tip: Throttle::new(TIP_THROTTLE),
            boundary_unlock: Timer::new(BOUNDARY_LOCK),
            zoom_events: Throttle::new(ZOOM_THROTTLE),
            zoom_unlock: Timer::new(ZOOM_UNLOCK_GRACE),
            end_tip_clear: Timer::new(END_TIP_LINGER),
            shown_end_page: None,
            drag: DragTracker::default(),
            geometry: None,
            panzoom: PanZoom::default(),
            effects: Vec::new(),
        }
    }

    /// Replace the pan/zoom controller.
    pub fn with_zoom_transform(mut self, transform: Box<dyn ZoomTransform>) -> Self {
        self.panzoom = PanZoom::new(transform);
        self
    }

    // ---- Read access ----

    pub fn state(&self) -> &State {
        self.store.state()
    }

    pub fn subscribe<F>(&mut self, deps: Changes, listener: F) -> SubscriptionId
    where
        F: FnMut(&State, Changes) + 'static,
    {
        self.store.subscribe(deps, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    pub fn active_page(&self) -> Option<&Page> {
        self.state().active_page()
    }

    pub fn active_image_index(&self) -> usize {
        self.state().active_image_index()
    }

    /// Pairing segment of the active image, or `None` if it stands alone.
    pub fn now_fill_index(&self) -> Option<usize> {
        let state = self.state();
        segment_of(&state.images, state.active_image_index())
    }

    pub fn zoom_transform(&self) -> Transform {
        self.panzoom.transform()
    }

    /// Height reserved for images that have not loaded yet in scroll mode.
    pub fn placeholder_height(&self) -> f64 {
        let state = self.state();
        if !state.option.scroll_mode {
            return 0.0;
        }
        let mut heights: Vec<u32> = state
            .images
            .iter()
            .filter(|img| img.is_loaded())
            .filter_map(|img| img.height)
            .collect();
        if heights.is_empty() {
            return state.viewport.height;
        }
        heights.sort_unstable();
        f64::from(heights[heights.len() / 2]) * state.option.scroll_mode_img_scale
    }

    /// Prompt for the end page.
    pub fn end_page_tip(&self) -> &'static str {
        navigation::end_page_tip(
            self.shown_end_page,
            self.hooks.availability(),
            self.state().option.flip_to_next,
        )
    }

    /// Comments to show; only on the end page and only when enabled.
    pub fn comments(&self) -> &[String] {
        let state = self.state();
        if self.shown_end_page == Some(EndPageType::End) && state.option.show_comment {
            state.comments.as_slice()
        } else {
            &[]
        }
    }

    pub fn edit_buttons(&self) -> impl Iterator<Item = &str> {
        self.hooks.edit_buttons.iter().map(|b| b.label.as_str())
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // ---- Host adapter entry points ----

    /// Install a new chapter, resetting all reading state.
    pub fn init_reader<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let images: Vec<ComicImage> = urls
            .into_iter()
            .map(|url| ComicImage::new(Some(url.into())))
            .collect();
        info!(images = images.len(), "Installing image list");

        self.relayout.cancel();
        self.load.cancel();
        self.tip.cancel();
        self.boundary_unlock.cancel();
        self.zoom_events.cancel();
        self.zoom_unlock.cancel();
        self.end_tip_clear.cancel();
        self.shown_end_page = None;
        self.drag = DragTracker::default();
        self.geometry = None;
        self.panzoom.reset();

        self.commit(|b| {
            b.install_images(images);
            b.set_scroll_lock(false);
            b.set_zoomed(false);
            b.set_drag(0.0, 0.0);
            relayout_in(b, None);
        });
    }

    pub fn set_host_hooks(&mut self, mut hooks: HostHooks) {
        let comments = std::mem::take(&mut hooks.comments);
        debug!(hooks = ?hooks, comments = comments.len(), "Host hooks set");
        self.hooks = hooks;
        self.commit(|b| b.set_comments(comments));
    }

    /// The reading surface changed size.
    pub fn resize(&mut self, width: f64, height: f64) {
        let Some(proportion) = Proportion::from_viewport(width, height) else {
            debug!(width, height, "Ignoring degenerate viewport");
            return;
        };
        self.panzoom.set_bounds(width, height);

        let geometry = self.geometry.as_ref();
        let (_, changes) = self.store.update(|b| {
            b.set_viewport(Viewport { width, height }, Some(proportion));
            let mut reclassified = 0usize;
            for img in b.images_mut(Changes::NONE).iter_mut() {
                if let Some(kind) = classify(img, &proportion) {
                    if kind != img.kind {
                        img.kind = kind;
                        reclassified += 1;
                    }
                }
            }
            if reclassified > 0 {
                debug!(reclassified, width, height, "Image classes changed");
                b.touch(Changes::IMAGE_SIZE);
            }
            sync_drag(b, geometry);
        });
        self.react(changes);
    }

    /// An image's natural size became known.
    pub fn set_image_size(&mut self, index: usize, width: u32, height: u32) -> Result<(), ReaderError> {
        self.check_index(index)?;
        if width == 0 || height == 0 {
            return Err(ReaderError::EmptyDimensions {
                index,
                width,
                height,
            });
        }
        let proportion = self.state().proportion;
        self.commit(|b| {
            let img = &mut b.images_mut(Changes::IMAGE_RESULT)[index];
            img.width = Some(width);
            img.height = Some(height);
            let kind = proportion.and_then(|p| classify(img, &p));
            if let Some(kind) = kind.filter(|k| *k != img.kind) {
                trace!(index, ?kind, "Image reclassified");
                img.kind = kind;
                b.touch(Changes::IMAGE_SIZE);
            }
        });
        Ok(())
    }

    pub fn mark_image_loaded(&mut self, index: usize) -> Result<(), ReaderError> {
        self.set_load_result(index, LoadType::Loaded)
    }

    pub fn mark_image_error(&mut self, index: usize) -> Result<(), ReaderError> {
        self.set_load_result(index, LoadType::Error)
    }

    fn set_load_result(
        &mut self,
        index: usize,
        result: LoadType,
    ) -> Result<(), ReaderError> {
        self.check_index(index)?;
        trace!(index, ?result, "Load result");
        self.commit(|b| b.images_mut(Changes::IMAGE_RESULT)[index].load_type = result);
        Ok(())
    }

    /// Resolve (or replace) an image's source.
    pub fn set_image_src(&mut self, index: usize, src: impl Into<String>) -> Result<(), ReaderError> {
        self.check_index(index)?;
        let fresh = ComicImage::new(Some(src.into()));
        self.commit(|b| {
            let img = &mut b.images_mut(Changes::IMAGE_RESULT)[index];
            img.src = fresh.src;
            img.load_type = LoadType::Wait;
        });
        Ok(())
    }

    pub fn set_translation(
        &mut self,
        index: usize,
        translation: Option<Translation>,
    ) -> Result<(), ReaderError> {
        self.check_index(index)?;
        self.commit(|b| b.images_mut(Changes::IMAGE_RESULT)[index].translation = translation);
        Ok(())
    }

    pub fn click_host_button(&mut self, index: usize) -> Result<(), ReaderError> {
        let len = self.hooks.edit_buttons.len();
        let button = self
            .hooks
            .edit_buttons
            .get_mut(index)
            .ok_or(ReaderError::ButtonIndex { index, len })?;
        debug!(label = %button.label, "Host button clicked");
        (button.on_click)();
        Ok(())
    }

    // ---- Navigation ----

    pub fn turn_page(&mut self, dir: TurnDirection) {
        let transition = navigation::transition(self.state(), self.hooks.availability(), dir);
        match transition {
            Transition::Ignored => {}
            Transition::MoveTo(page) => {
                self.commit(|b| b.set_active_page(page));
            }
            Transition::EnterBoundary(kind) => {
                debug!(?kind, "Entering boundary");
                self.commit(|b| {
                    b.set_end_page(Some(kind));
                    b.set_scroll_lock(true);
                });
                self.boundary_unlock.arm(self.clock.now());
            }
            Transition::LeaveBoundary => {
                self.commit(|b| b.set_end_page(None));
            }
            Transition::CallPrev => {
                info!("Moving to previous chapter");
                self.hooks.call_prev();
            }
            Transition::CallNext => {
                info!("Moving to next chapter");
                self.hooks.call_next();
            }
            Transition::CallExit => {
                info!("Exiting reader at end");
                self.hooks.call_exit(true);
            }
        }
    }

    /// End-page "previous chapter" button.
    pub fn end_page_prev(&mut self) -> bool {
        self.hooks.call_prev()
    }

    /// End-page "next chapter" button.
    pub fn end_page_next(&mut self) -> bool {
        self.hooks.call_next()
    }

    /// End-page "exit" button.
    pub fn end_page_exit(&mut self) -> bool {
        let at_end = self.state().end_page == Some(EndPageType::End);
        self.hooks.call_exit(at_end)
    }

    /// Click on the end-page backdrop.
    pub fn dismiss_end_page(&mut self) {
        self.commit(|b| b.set_end_page(None));
    }

    /// Wheel over the reading surface. Returns whether the wheel was consumed.
    pub fn handle_wheel(&mut self, delta_y: f64, modifier: bool, x: f64, y: f64) -> bool {
        let state = self.state();
        let at_boundary = state.end_page.is_some();
        let zoomed = self.panzoom.transform().is_zoomed();
        let zoom_allowed = panzoom::wheel_zoom_allowed(&state.option, modifier, zoomed);
        let blocked = state.scroll_lock || state.is_zoomed;

        if at_boundary {
            self.turn_page(TurnDirection::from_delta(delta_y));
            return true;
        }
        if zoom_allowed {
            if self.panzoom.wheel(x, y, delta_y) {
                self.on_zoom_changed();
            }
            return true;
        }
        if blocked || delta_y == 0.0 {
            return false;
        }
        self.turn_page(TurnDirection::from_delta(delta_y));
        true
    }

    // ---- Mode switches ----

    /// Toggle the fill slot of the active spread's segment. Only acts on spreads.
    pub fn switch_fill_effect(&mut self) -> bool {
        if !self.active_page().is_some_and(Page::is_spread) {
            return false;
        }
        let Some(segment) = self.now_fill_index() else {
            return false;
        };
        debug!(segment, "Toggling fill");
        self.relayout_keeping_position(|b| b.fill_effect_mut().toggle(segment));
        true
    }

    pub fn switch_scroll_mode(&mut self) {
        if self.panzoom.reset() {
            self.on_zoom_changed();
        }
        self.relayout.cancel();
        self.geometry = None;
        self.commit(|b| {
            b.set_active_page(0);
            let option = b.option_mut();
            option.scroll_mode = !option.scroll_mode;
            option.one_page_mode = option.scroll_mode;
            b.set_visible_images(Vec::new());
            b.set_drag(0.0, 0.0);
            relayout_in(b, None);
        });
        info!(scroll_mode = self.state().option.scroll_mode, "Scroll mode switched");
        self.effects.push(Effect::RefreshScroll);
    }

    pub fn switch_one_page_mode(&mut self) {
        self.relayout_keeping_position(|b| {
            let option = b.option_mut();
            option.one_page_mode = !option.one_page_mode;
        });
        debug!(one_page = self.state().option.one_page_mode, "One-page mode switched");
    }

    pub fn switch_dir(&mut self) {
        self.commit(|b| {
            let option = b.option_mut();
            option.dir = option.dir.flipped();
        });
    }

    /// Step the scroll-mode image scale by `delta`; `None` or zero resets it.
    pub fn zoom_scroll_mode_img(&mut self, delta: Option<f64>) {
        let current = self.state().option.scroll_mode_img_scale;
        let scale = match delta {
            // Step in tenths so repeated steps do not drift.
            Some(d) if d != 0.0 && d.is_finite() => {
                ((current * 10.0 + d * 10.0).round() / 10.0).clamp(MIN_IMG_SCALE, MAX_IMG_SCALE)
            }
            _ => 1.0,
        };
        self.commit(|b| b.option_mut().scroll_mode_img_scale = scale);

        let state = self.state();
        if state.option.scroll_mode && scale != current {
            // Content grows by `scale / current`; keep the viewport center in place.
            let bar = &state.scrollbar;
            let center = bar.drag_top + bar.drag_height / 2.0;
            let height = bar.drag_height * current / scale;
            let fraction = (center - height / 2.0).clamp(0.0, 1.0);
            self.effects.push(Effect::ScrollTo {
                fraction,
                behavior: ScrollBehavior::Instant,
            });
        }
    }

    // ---- Viewport / scrollbar ----

    /// Scroll-mode geometry after a scroll, resize or image load.
    pub fn on_scroll(&mut self, geometry: FlowGeometry) {
        if !self.state().option.scroll_mode {
            return;
        }
        let (top, height) = geometry.thumb();
        let visible = geometry.visible_images();
        let active = visible.first().copied().unwrap_or(0);
        self.geometry = Some(geometry);
        self.commit(|b| {
            b.set_drag(top, height);
            b.set_visible_images(visible);
            b.set_active_page(active);
        });
    }

    pub fn handle_scrollbar_drag(&mut self, drag: TrackDrag) {
        match self.drag.interpret(drag, self.store.state()) {
            DragAction::None => {}
            DragAction::ScrollTo { fraction, behavior } => {
                self.effects.push(Effect::ScrollTo { fraction, behavior });
            }
            DragAction::SetPage(page) => {
                self.commit(|b| b.set_active_page(page));
            }
        }
    }

    // ---- Pan / zoom ----

    /// Double click on the paged surface.
    pub fn double_click(&mut self, x: f64, y: f64) -> bool {
        let option = &self.state().option;
        if option.scroll_mode || option.disable_zoom {
            return false;
        }
        let changed = self.panzoom.double_click(x, y);
        if changed {
            self.on_zoom_changed();
        }
        changed
    }

    /// Pointer drag over the surface. Returns whether it panned.
    pub fn pan_by(&mut self, dx: f64, dy: f64, modifier: bool) -> bool {
        let zoomed = self.panzoom.transform().is_zoomed();
        if !panzoom::pan_allowed(&self.state().option, modifier, zoomed) {
            return false;
        }
        self.panzoom.pan_by(dx, dy);
        true
    }

    fn on_zoom_changed(&mut self) {
        if self.zoom_events.call(self.clock.now(), ()).is_some() {
            self.apply_zoom_state();
        }
    }

    fn apply_zoom_state(&mut self) -> Changes {
        let zoomed = self.panzoom.transform().is_zoomed();
        let changes = self.commit(|b| {
            b.set_scroll_lock(true);
            b.set_zoomed(zoomed);
        });
        if zoomed {
            self.zoom_unlock.cancel();
        } else {
            self.zoom_unlock.arm(self.clock.now());
        }
        debug!(zoomed, "Zoom state applied");
        changes
    }

    // ---- Timers ----

    /// Run every timer whose deadline has passed. Returns what changed.
    pub fn tick(&mut self) -> Changes {
        let now = self.clock.now();
        let mut changes = Changes::NONE;

        if self.relayout.fired(now) {
            changes |= self.run_relayout();
        }
        if self.load.fired(now) {
            changes |= self.run_loader();
        }
        if self.tip.poll(now).is_some() {
            let tip = self.refresh_tip();
            changes |= self.react(tip);
        }
        if self.boundary_unlock.fired(now) {
            trace!("Boundary lock released");
            changes |= self.commit(|b| b.set_scroll_lock(false));
        }
        if self.zoom_events.poll(now).is_some() {
            changes |= self.apply_zoom_state();
        }
        if self.zoom_unlock.fired(now) {
            trace!("Zoom lock released");
            changes |= self.commit(|b| b.set_scroll_lock(false));
        }
        if self.end_tip_clear.fired(now) {
            self.shown_end_page = self.state().end_page;
            changes |= Changes::END_PAGE;
        }
        changes
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.relayout.deadline(),
            self.load.deadline(),
            self.tip.deadline(),
            self.boundary_unlock.deadline(),
            self.zoom_events.deadline(),
            self.zoom_unlock.deadline(),
            self.end_tip_clear.deadline(),
        ])
    }

    // ---- Internals ----

    fn check_index(&self, index: usize) -> Result<(), ReaderError> {
        let len = self.state().images.len();
        if index < len {
            Ok(())
        } else {
            Err(ReaderError::ImageIndex { index, len })
        }
    }

    /// Apply a batch and run the reactions it triggers.
    fn commit(&mut self, f: impl FnOnce(&mut Batch<'_>)) -> Changes {
        let (_, changes) = self.store.update(f);
        self.react(changes)
    }

    fn react(&mut self, changes: Changes) -> Changes {
        let mut total = changes;
        let mut pending = changes;
        for _ in 0..MAX_REACTION_ROUNDS {
            if pending.is_empty() {
                return total;
            }
            let mut next = Changes::NONE;
            for reaction in REACTIONS {
                if reaction.deps.intersects(pending) {
                    trace!(reaction = reaction.name, "Running reaction");
                    next |= (reaction.run)(self, pending);
                }
            }
            total |= next;
            pending = next;
        }
        if !pending.is_empty() {
            warn!(?pending, "Reactions did not settle");
        }
        total
    }

    /// Relayout now, keeping the active image in view.
    /// Relayout after `f`, then move to whichever page now holds the image
    /// that was active before.
    fn relayout_keeping_position(&mut self, f: impl FnOnce(&mut Batch<'_>)) -> Changes {
        let anchor = self.active_image_index();
        self.relayout.cancel();
        let geometry = self.geometry.as_ref();
        let (_, changes) = self.store.update(|b| {
            f(b);
            relayout_in(b, geometry);
            if let Some(page) = page_of(&b.state().pages, anchor) {
                b.set_active_page(page);
            }
        });
        self.react(changes)
    }

    fn run_relayout(&mut self) -> Changes {
        self.relayout_keeping_position(|_| {})
    }

    fn run_loader(&mut self) -> Changes {
        let mut pass = LoadPass::default();
        let changes = self.commit(|b| {
            let always_load_all = b.state().option.always_load_all_img;
            let active = b.state().active_page_index;
            let (images, pages) = b.images_with_pages();
            pass = loader::schedule(images, pages, active, always_load_all);
            if pass.reset > 0 || !pass.marked.is_empty() {
                b.touch(Changes::IMAGE_LOAD);
            }
        });
        debug!(step = ?pass.step, marked = ?pass.marked, reset = pass.reset, "Load pass");
        changes
    }

    fn refresh_tip(&mut self) -> Changes {
        let text = scrollbar::tip_text(self.store.state());
        let (_, changes) = self.store.update(|b| b.set_tip_text(text));
        changes
    }

    // ---- Reactions ----

    fn leave_boundary_on_move(&mut self, _: Changes) -> Changes {
        if self.state().end_page.is_none() {
            return Changes::NONE;
        }
        let (_, changes) = self.store.update(|b| b.set_end_page(None));
        changes
    }

    fn track_end_page(&mut self, _: Changes) -> Changes {
        match self.state().end_page {
            Some(kind) => {
                self.shown_end_page = Some(kind);
                self.end_tip_clear.cancel();
            }
            None if self.shown_end_page.is_some() => self.end_tip_clear.arm(self.clock.now()),
            None => {}
        }
        Changes::NONE
    }

    fn queue_relayout(&mut self, _: Changes) -> Changes {
        self.relayout.arm(self.clock.now());
        Changes::NONE
    }

    fn queue_load(&mut self, _: Changes) -> Changes {
        self.load.arm(self.clock.now());
        Changes::NONE
    }

    fn queue_tip(&mut self, _: Changes) -> Changes {
        if self.tip.call(self.clock.now(), ()).is_some() {
            self.refresh_tip()
        } else {
            Changes::NONE
        }
    }
}

impl std::fmt::Debug for MangaReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MangaReader")
            .field("images", &state.images.len())
            .field("pages", &state.pages.len())
            .field("active_page_index", &state.active_page_index)
            .field("end_page", &state.end_page)
            .field("hooks", &self.hooks)
            .field("panzoom", &self.panzoom)
            .finish()
    }
}

/// Recompute pages from the current images, fill toggles and mode.
fn relayout_in(b: &mut Batch<'_>, geometry: Option<&FlowGeometry>) {
    let state = b.state();
    let pages = layout(
        &state.images,
        &state.fill_effect,
        state.is_single_page_layout(),
    );
    debug!(
        images = state.images.len(),
        pages = pages.len(),
        single = state.is_single_page_layout(),
        "Relayout"
    );
    b.set_pages(pages);
    sync_drag(b, geometry);
}

/// Thumb metrics: collapsed in paged mode, from the last geometry in scroll mode.
fn sync_drag(b: &mut Batch<'_>, geometry: Option<&FlowGeometry>) {
    if !b.state().option.scroll_mode {
        b.set_drag(0.0, 0.0);
        return;
    }
    if let Some(geometry) = geometry {
        let (_, height) = geometry.thumb();
        let top = b.state().scrollbar.drag_top;
        b.set_drag(top, height);
    }
}
