//! Progressive image loading around the active page.
//!
//! A pass first abandons stale in-flight work, then walks a fixed list of page
//! windows in priority order and marks a small batch of images `Loading` in the
//! first window that still has something to load. The rendering collaborator
//! reports back `Loaded`/`Error`, which triggers the next pass.

use tracing::debug;

use crate::models::{ComicImage, LoadType, Page};

/// Per-window budget for the near windows.
const NEAR_BUDGET: usize = 2;
/// Per-window budget for the eager background windows.
const EAGER_BUDGET: usize = 5;
/// Pages after the active page covered by the look-ahead window.
const AHEAD_PAGES: isize = 19;
/// Start of the look-behind window, in pages before the active page.
const BEHIND_PAGES: isize = 10;
/// Above this many images, background loading stops after the near windows
/// unless the reader is told to load everything.
const EAGER_LOAD_LIMIT: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStep {
    ActivePage,
    Ahead,
    Behind,
    AfterActive,
    Remaining,
}

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPass {
    pub step: Option<LoadStep>,
    pub marked: Vec<usize>,
    /// Images moved back from `Loading`/`Error` to `Wait`.
    pub reset: usize,
}

/// Run one scheduling pass over the image list.
pub fn schedule(
    images: &mut [ComicImage],
    pages: &[Page],
    active_page: usize,
    always_load_all: bool,
) -> LoadPass {
    let mut pass = LoadPass::default();
    for img in images.iter_mut() {
        if matches!(img.load_type, LoadType::Loading | LoadType::Error) {
            img.load_type = LoadType::Wait;
            pass.reset += 1;
        }
    }

    let active = active_page as isize;
    let total = images.len() as isize;
    let near = [
        (LoadStep::ActivePage, active, active + 1),
        (LoadStep::Ahead, active + 1, active + 1 + AHEAD_PAGES),
        (LoadStep::Behind, active - BEHIND_PAGES, active - 1),
    ];
    for (step, start, end) in near {
        if mark_range(images, pages, start, end, NEAR_BUDGET, &mut pass.marked) {
            pass.step = Some(step);
            return pass;
        }
    }

    if !always_load_all && images.len() > EAGER_LOAD_LIMIT {
        return pass;
    }

    let eager = [
        (LoadStep::AfterActive, active + 1, total),
        (LoadStep::Remaining, 0, total),
    ];
    for (step, start, end) in eager {
        if mark_range(images, pages, start, end, EAGER_BUDGET, &mut pass.marked) {
            pass.step = Some(step);
            return pass;
        }
    }

    debug!(images = images.len(), "Nothing left to load");
    pass
}

/// Mark up to `budget` loadable images in pages `[start, end)`; the range is
/// clamped to the page list. Returns whether anything was marked.
fn mark_range(
    images: &mut [ComicImage],
    pages: &[Page],
    start: isize,
    end: isize,
    budget: usize,
    marked: &mut Vec<usize>,
) -> bool {
    let start = start.max(0) as usize;
    let end = end.clamp(0, pages.len() as isize) as usize;
    if start >= end {
        return false;
    }

    let before = marked.len();
    for index in pages[start..end].iter().flat_map(|p| p.images()) {
        if marked.len() - before >= budget {
            break;
        }
        let Some(img) = images.get_mut(index) else {
            continue;
        };
        if img.has_src() && img.load_type != LoadType::Loaded {
            img.load_type = LoadType::Loading;
            marked.push(index);
        }
    }
    marked.len() > before
}
