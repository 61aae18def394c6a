//! Scrollbar thumb metrics, position tooltip, and track drag input.

use crate::config::ReadingDirection;
use crate::models::Slot;
use crate::store::State;

/// Vertical extent of one rendered image in scroll mode, in content pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub top: f64,
    pub height: f64,
}

/// Scroll-mode geometry reported by the host after a scroll or resize.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowGeometry {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
    /// One entry per image, in image order.
    pub extents: Vec<Extent>,
}

impl FlowGeometry {
    /// Geometry for images stacked top to bottom without gaps.
    pub fn stacked(heights: &[f64], viewport_height: f64, scroll_top: f64) -> Self {
        let mut top = 0.0;
        let extents = heights
            .iter()
            .map(|&height| {
                let extent = Extent { top, height };
                top += height;
                extent
            })
            .collect();
        Self {
            scroll_top,
            viewport_height,
            content_height: top,
            extents,
        }
    }

    /// `(drag_top, drag_height)` for this geometry.
    pub fn thumb(&self) -> (f64, f64) {
        let top = if self.content_height > 0.0 {
            self.scroll_top / self.content_height
        } else {
            0.0
        };
        let denom = if self.content_height > 0.0 {
            self.content_height
        } else {
            self.viewport_height
        };
        let height = if denom > 0.0 {
            self.viewport_height / denom
        } else {
            0.0
        };
        (top, height)
    }

    /// Images whose extent intersects the viewport, in order.
    pub fn visible_images(&self) -> Vec<usize> {
        let top = self.scroll_top;
        let bottom = top + self.viewport_height;
        let mut visible = Vec::new();
        for (i, extent) in self.extents.iter().enumerate() {
            if extent.top > bottom {
                break;
            }
            if extent.top + extent.height < top {
                continue;
            }
            visible.push(i);
        }
        visible
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Start,
    Dragging,
    End,
}

/// Pointer input on the scrollbar track, in track pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackDrag {
    pub phase: DragPhase,
    pub y: f64,
    pub initial_y: f64,
    pub track_height: f64,
}

/// What a track drag asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragAction {
    None,
    /// Scroll so the content top sits at this fraction of the content height.
    ScrollTo { fraction: f64, behavior: ScrollBehavior },
    SetPage(usize),
}

/// Drag anchor kept between the press and the following moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct DragTracker {
    start_top: f64,
}

impl DragTracker {
    pub fn interpret(&mut self, drag: TrackDrag, state: &State) -> DragAction {
        // A click fires both start and end; the start already did the work.
        if drag.phase == DragPhase::End {
            return DragAction::None;
        }
        if drag.phase == DragPhase::Dragging && drag.y == drag.initial_y {
            return DragAction::None;
        }
        if drag.track_height <= 0.0 || state.pages.is_empty() {
            return DragAction::None;
        }

        let click_top = drag.y / drag.track_height;

        if state.option.scroll_mode {
            return match drag.phase {
                DragPhase::Dragging => {
                    let dy = (drag.y - drag.initial_y) / drag.track_height;
                    DragAction::ScrollTo {
                        fraction: (self.start_top + dy).clamp(0.0, 1.0),
                        behavior: ScrollBehavior::Instant,
                    }
                }
                _ => {
                    // Center the thumb on the pointer.
                    let top = (click_top - state.scrollbar.drag_height / 2.0).clamp(0.0, 1.0);
                    self.start_top = top;
                    DragAction::ScrollTo {
                        fraction: top,
                        behavior: ScrollBehavior::Smooth,
                    }
                }
            };
        }

        let count = state.pages.len();
        let page = (click_top * count as f64).floor().max(0.0) as usize;
        let page = page.min(count - 1);
        if page == state.active_page_index {
            DragAction::None
        } else {
            DragAction::SetPage(page)
        }
    }
}

fn image_tip(state: &State, slot: Slot) -> String {
    let Slot::Image(i) = slot else {
        return "filler".to_string();
    };
    let Some(img) = state.images.get(i) else {
        return format!("{}", i + 1);
    };
    if !img.is_loaded() {
        return format!("{} ({})", i + 1, img.load_type.label());
    }
    match img.visible_translation() {
        Some(message) => format!("{}：{}", i + 1, message),
        None => format!("{}", i + 1),
    }
}

fn page_tip(state: &State, page_index: usize) -> Option<String> {
    let page = state.pages.get(page_index)?;
    let mut parts: Vec<String> = page.slots().map(|s| image_tip(state, s)).collect();
    if state.option.dir == ReadingDirection::Rtl {
        parts.reverse();
    }
    Some(parts.join(" | "))
}

/// Tooltip describing the reading position.
pub fn tip_text(state: &State) -> String {
    if state.pages.is_empty() {
        return String::new();
    }
    if !state.option.scroll_mode {
        return page_tip(state, state.active_page_index).unwrap_or_default();
    }
    // Scroll mode lays out one image per page, so image and page indices agree.
    state
        .visible_images
        .iter()
        .filter_map(|&i| page_tip(state, i))
        .collect::<Vec<_>>()
        .join("\n")
}
