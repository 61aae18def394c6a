//! Single source of truth for the reader.
//!
//! Mutations happen inside a [`Batch`]. Each `*_mut` accessor records which part
//! of the state it exposes; when the batch closure returns, listeners whose
//! dependencies intersect the recorded [`Changes`] are called once, in
//! registration order, with the finished state. Nobody observes a half-applied
//! batch.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::config::ReaderOptions;
use crate::layout::Proportion;
use crate::models::{ComicImage, FillEffect, Page};

/// Set of state fields touched by a batch.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Changes(u16);

impl Changes {
    pub const NONE: Self = Self(0);
    /// The image list was replaced wholesale.
    pub const IMAGE_LIST: Self = Self(1 << 0);
    /// An image's layout class changed.
    pub const IMAGE_SIZE: Self = Self(1 << 1);
    /// The loader marked or reset images.
    pub const IMAGE_LOAD: Self = Self(1 << 2);
    /// A load result, a resolved size, a source or an annotation arrived.
    pub const IMAGE_RESULT: Self = Self(1 << 3);
    pub const PAGES: Self = Self(1 << 4);
    pub const ACTIVE_PAGE: Self = Self(1 << 5);
    pub const FILL_EFFECT: Self = Self(1 << 6);
    pub const END_PAGE: Self = Self(1 << 7);
    pub const SCROLL_LOCK: Self = Self(1 << 8);
    pub const ZOOM: Self = Self(1 << 9);
    pub const SCROLLBAR: Self = Self(1 << 10);
    pub const TIP_TEXT: Self = Self(1 << 11);
    pub const VIEWPORT: Self = Self(1 << 12);
    pub const OPTIONS: Self = Self(1 << 13);
    pub const COMMENTS: Self = Self(1 << 14);
    pub const ALL: Self = Self(u16::MAX);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Changes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Changes {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for Changes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Changes({:#017b})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndPageType {
    Start,
    End,
}

/// Scrollbar thumb metrics and tooltip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollbarState {
    /// Thumb height as a fraction of the track.
    pub drag_height: f64,
    /// Thumb top as a fraction of the track.
    pub drag_top: f64,
    pub tip_text: String,
}

/// Pixel size of the reading surface.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default)]
pub struct State {
    pub images: Vec<ComicImage>,
    pub pages: Vec<Page>,
    pub active_page_index: usize,
    pub fill_effect: FillEffect,
    pub end_page: Option<EndPageType>,
    pub scroll_lock: bool,
    pub is_zoomed: bool,
    pub scrollbar: ScrollbarState,
    pub viewport: Viewport,
    /// `None` until a non-degenerate viewport was reported.
    pub proportion: Option<Proportion>,
    /// Images intersecting the viewport in scroll mode, in order.
    pub visible_images: Vec<usize>,
    pub option: ReaderOptions,
    pub comments: Vec<String>,
}

impl State {
    pub fn new(option: ReaderOptions) -> Self {
        Self {
            option,
            ..Self::default()
        }
    }

    pub fn active_page(&self) -> Option<&Page> {
        self.pages.get(self.active_page_index)
    }

    /// First real image of the active page, 0 when there is none.
    pub fn active_image_index(&self) -> usize {
        self.active_page().and_then(|p| p.first_image()).unwrap_or(0)
    }

    /// Pages lay out one image each.
    pub fn is_single_page_layout(&self) -> bool {
        self.option.one_page_mode || self.option.scroll_mode
    }
}

/// Mutable view of the state for the duration of one batch.
pub struct Batch<'a> {
    state: &'a mut State,
    changes: Changes,
}

impl<'a> Batch<'a> {
    pub fn state(&self) -> &State {
        self.state
    }

    pub fn changes(&self) -> Changes {
        self.changes
    }

    pub fn touch(&mut self, changes: Changes) {
        self.changes |= changes;
    }

    /// Replace the image list and reset everything derived from it.
    pub fn install_images(&mut self, images: Vec<ComicImage>) {
        self.state.images = images;
        self.state.fill_effect = FillEffect::default();
        self.state.active_page_index = 0;
        self.state.end_page = None;
        self.state.visible_images.clear();
        self.changes |= Changes::IMAGE_LIST
            | Changes::FILL_EFFECT
            | Changes::ACTIVE_PAGE
            | Changes::END_PAGE;
    }

    /// Mutable image access; `changes` says what the caller is about to modify.
    pub fn images_mut(&mut self, changes: Changes) -> &mut Vec<ComicImage> {
        self.changes |= changes;
        &mut self.state.images
    }

    /// Images and the page list together, for passes that read one and write
    /// the other. Nothing is recorded; report what changed with [`Batch::touch`].
    pub fn images_with_pages(&mut self) -> (&mut [ComicImage], &[Page]) {
        (&mut self.state.images, &self.state.pages)
    }

    pub fn set_pages(&mut self, pages: Vec<Page>) {
        if self.state.pages != pages {
            self.state.pages = pages;
            self.changes |= Changes::PAGES;
        }
        let max = self.state.pages.len().saturating_sub(1);
        if self.state.active_page_index > max {
            self.set_active_page(max);
        }
    }

    /// Set the active page, clamped to the page list.
    pub fn set_active_page(&mut self, index: usize) {
        let index = index.min(self.state.pages.len().saturating_sub(1));
        if self.state.active_page_index != index {
            self.state.active_page_index = index;
            self.changes |= Changes::ACTIVE_PAGE;
        }
    }

    pub fn fill_effect_mut(&mut self) -> &mut FillEffect {
        self.changes |= Changes::FILL_EFFECT;
        &mut self.state.fill_effect
    }

    pub fn set_end_page(&mut self, end_page: Option<EndPageType>) {
        if self.state.end_page != end_page {
            self.state.end_page = end_page;
            self.changes |= Changes::END_PAGE;
        }
    }

    pub fn set_scroll_lock(&mut self, locked: bool) {
        if self.state.scroll_lock != locked {
            self.state.scroll_lock = locked;
            self.changes |= Changes::SCROLL_LOCK;
        }
    }

    pub fn set_zoomed(&mut self, zoomed: bool) {
        if self.state.is_zoomed != zoomed {
            self.state.is_zoomed = zoomed;
            self.changes |= Changes::ZOOM;
        }
    }

    pub fn set_drag(&mut self, drag_top: f64, drag_height: f64) {
        let bar = &mut self.state.scrollbar;
        if bar.drag_top != drag_top || bar.drag_height != drag_height {
            bar.drag_top = drag_top;
            bar.drag_height = drag_height;
            self.changes |= Changes::SCROLLBAR;
        }
    }

    pub fn set_tip_text(&mut self, text: String) {
        if self.state.scrollbar.tip_text != text {
            self.state.scrollbar.tip_text = text;
            self.changes |= Changes::TIP_TEXT;
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport, proportion: Option<Proportion>) {
        self.state.viewport = viewport;
        self.state.proportion = proportion;
        self.changes |= Changes::VIEWPORT;
    }

    pub fn set_visible_images(&mut self, visible: Vec<usize>) {
        if self.state.visible_images != visible {
            self.state.visible_images = visible;
            self.changes |= Changes::SCROLLBAR;
        }
    }

    pub fn option_mut(&mut self) -> &mut ReaderOptions {
        self.changes |= Changes::OPTIONS;
        &mut self.state.option
    }

    pub fn set_comments(&mut self, comments: Vec<String>) {
        self.state.comments = comments;
        self.changes |= Changes::COMMENTS;
    }
}

/// Read-only observer notified once per batch.
pub type Listener = Box<dyn FnMut(&State, Changes)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct Store {
    state: State,
    listeners: Vec<(SubscriptionId, Changes, Listener)>,
    next_id: u64,
}

impl Store {
    pub fn new(state: State) -> Self {
        Self {
            state,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Apply one batch of mutations and notify listeners once.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut Batch<'_>) -> R) -> (R, Changes) {
        let mut batch = Batch {
            state: &mut self.state,
            changes: Changes::NONE,
        };
        let result = f(&mut batch);
        let changes = batch.changes;
        if !changes.is_empty() {
            for (_, deps, listener) in &mut self.listeners {
                if deps.intersects(changes) {
                    listener(&self.state, changes);
                }
            }
        }
        (result, changes)
    }

    pub fn subscribe<F>(&mut self, deps: Changes, listener: F) -> SubscriptionId
    where
        F: FnMut(&State, Changes) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, deps, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _, _)| *lid != id);
        before != self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store_with_pages(n: usize) -> Store {
        let mut store = Store::new(State::default());
        store.update(|b| b.set_pages((0..n).map(Page::single).collect()));
        store
    }

    #[test]
    fn test_changes_set_ops() {
        let c = Changes::PAGES | Changes::ACTIVE_PAGE;
        assert!(c.contains(Changes::PAGES));
        assert!(c.intersects(Changes::ACTIVE_PAGE | Changes::ZOOM));
        assert!(!c.intersects(Changes::ZOOM));
        assert!(Changes::NONE.is_empty());
    }

    #[test]
    fn test_listener_called_once_per_batch() {
        let mut store = store_with_pages(5);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = calls.clone();
        store.subscribe(Changes::ACTIVE_PAGE, move |state, changes| {
            seen.borrow_mut().push((state.active_page_index, changes));
        });

        store.update(|b| {
            b.set_active_page(1);
            b.set_active_page(2);
            b.set_active_page(3);
        });
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(calls.borrow()[0].0, 3);

        // Unrelated batch does not notify.
        store.update(|b| b.set_zoomed(true));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let mut store = store_with_pages(2);
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = order.clone();
            store.subscribe(Changes::ALL, move |_, _| order.borrow_mut().push(tag));
        }
        store.update(|b| b.set_active_page(1));
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = store_with_pages(2);
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        let id = store.subscribe(Changes::ALL, move |_, _| *h.borrow_mut() += 1);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.update(|b| b.set_active_page(1));
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn test_active_page_is_clamped() {
        let mut store = store_with_pages(3);
        store.update(|b| b.set_active_page(10));
        assert_eq!(store.state().active_page_index, 2);
        store.update(|b| b.set_pages(vec![Page::single(0)]));
        assert_eq!(store.state().active_page_index, 0);
    }

    #[test]
    fn test_noop_setters_report_no_changes() {
        let mut store = store_with_pages(3);
        let (_, changes) = store.update(|b| {
            b.set_active_page(0);
            b.set_end_page(None);
            b.set_scroll_lock(false);
        });
        assert!(changes.is_empty());
    }
}
