//! Page turning and the start/end boundary states.
//!
//! `transition` is pure: it reads the state and hook availability and says what
//! should happen. `MangaReader::turn_page` applies the result, arms the
//! boundary lock and calls the host hooks after the batch is committed.

use tracing::trace;

use super::hooks::HookAvailability;
use crate::store::{EndPageType, State};

/// Thumb bottom at or past this counts as scrolled to the end.
const BOTTOM_EPSILON: f64 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Prev,
    Next,
}

impl TurnDirection {
    /// Direction for a wheel delta: positive scrolls forward.
    pub fn from_delta(delta_y: f64) -> Self {
        if delta_y > 0.0 {
            Self::Next
        } else {
            Self::Prev
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Ignored,
    MoveTo(usize),
    EnterBoundary(EndPageType),
    LeaveBoundary,
    CallPrev,
    CallNext,
    /// Exit the reader from the end.
    CallExit,
}

/// Whether reading is at the top: thumb at 0 in scroll mode, first page otherwise.
pub fn is_top(state: &State) -> bool {
    if state.option.scroll_mode {
        state.scrollbar.drag_top <= 0.0
    } else {
        state.active_page_index == 0
    }
}

/// Whether reading is at the bottom: thumb touching the end in scroll mode,
/// last page otherwise.
pub fn is_bottom(state: &State) -> bool {
    if state.option.scroll_mode {
        state.scrollbar.drag_height + state.scrollbar.drag_top >= BOTTOM_EPSILON
    } else {
        state.active_page_index + 1 >= state.pages.len()
    }
}

pub fn transition(state: &State, hooks: HookAvailability, dir: TurnDirection) -> Transition {
    let flip = state.option.flip_to_next;
    let result = match (dir, state.end_page) {
        (TurnDirection::Prev, Some(EndPageType::Start)) => {
            if !state.scroll_lock && flip && hooks.prev {
                Transition::CallPrev
            } else {
                Transition::Ignored
            }
        }
        (TurnDirection::Prev, Some(EndPageType::End)) => Transition::LeaveBoundary,
        (TurnDirection::Prev, None) => {
            if is_top(state) {
                // The start page only appears when there is somewhere to go.
                if hooks.exit && hooks.prev && flip {
                    Transition::EnterBoundary(EndPageType::Start)
                } else {
                    Transition::Ignored
                }
            } else if state.option.scroll_mode {
                Transition::Ignored
            } else {
                Transition::MoveTo(state.active_page_index - 1)
            }
        }
        (TurnDirection::Next, Some(EndPageType::End)) => {
            if state.scroll_lock {
                Transition::Ignored
            } else if hooks.next && flip {
                Transition::CallNext
            } else if hooks.exit {
                Transition::CallExit
            } else {
                Transition::Ignored
            }
        }
        (TurnDirection::Next, Some(EndPageType::Start)) => Transition::LeaveBoundary,
        (TurnDirection::Next, None) => {
            if is_bottom(state) {
                if hooks.exit {
                    Transition::EnterBoundary(EndPageType::End)
                } else {
                    Transition::Ignored
                }
            } else if state.option.scroll_mode {
                Transition::Ignored
            } else {
                Transition::MoveTo(state.active_page_index + 1)
            }
        }
    };
    trace!(?dir, end_page = ?state.end_page, ?result, "Turn request");
    result
}

/// Prompt shown on the end page.
pub fn end_page_tip(end_page: Option<EndPageType>, hooks: HookAvailability, flip: bool) -> &'static str {
    match end_page {
        Some(EndPageType::Start) if hooks.prev && flip => {
            "Reached the beginning; turning back again opens the previous chapter"
        }
        Some(EndPageType::End) if hooks.next && flip => {
            "Reached the end; turning forward again opens the next chapter"
        }
        Some(EndPageType::End) if hooks.exit => "Reached the end; turning again exits the reader",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Page;

    const ALL_HOOKS: HookAvailability = HookAvailability {
        prev: true,
        next: true,
        exit: true,
    };
    const EXIT_ONLY: HookAvailability = HookAvailability {
        prev: false,
        next: false,
        exit: true,
    };

    fn paged_state(pages: usize, active: usize) -> State {
        let mut state = State::default();
        state.pages = (0..pages).map(Page::single).collect();
        state.active_page_index = active;
        state
    }

    #[test]
    fn test_move_within_chapter() {
        let state = paged_state(5, 2);
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Next), Transition::MoveTo(3));
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Prev), Transition::MoveTo(1));
    }

    #[test]
    fn test_end_boundary_without_next_exits() {
        let mut state = paged_state(3, 2);
        assert_eq!(
            transition(&state, EXIT_ONLY, TurnDirection::Next),
            Transition::EnterBoundary(EndPageType::End)
        );
        state.end_page = Some(EndPageType::End);
        assert_eq!(transition(&state, EXIT_ONLY, TurnDirection::Next), Transition::CallExit);
        state.scroll_lock = true;
        assert_eq!(transition(&state, EXIT_ONLY, TurnDirection::Next), Transition::Ignored);
    }

    #[test]
    fn test_end_boundary_with_next_hook() {
        let mut state = paged_state(3, 2);
        state.end_page = Some(EndPageType::End);
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Next), Transition::CallNext);
        state.option.flip_to_next = false;
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Next), Transition::CallExit);
    }

    #[test]
    fn test_no_exit_hook_means_no_end_page() {
        let state = paged_state(3, 2);
        let none = HookAvailability::default();
        assert_eq!(transition(&state, none, TurnDirection::Next), Transition::Ignored);
        let state = paged_state(3, 0);
        assert_eq!(transition(&state, none, TurnDirection::Prev), Transition::Ignored);
    }

    #[test]
    fn test_start_boundary_needs_prev_exit_and_flip() {
        let mut state = paged_state(3, 0);
        assert_eq!(transition(&state, EXIT_ONLY, TurnDirection::Prev), Transition::Ignored);
        assert_eq!(
            transition(&state, ALL_HOOKS, TurnDirection::Prev),
            Transition::EnterBoundary(EndPageType::Start)
        );
        state.option.flip_to_next = false;
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Prev), Transition::Ignored);
    }

    #[test]
    fn test_leaving_boundaries() {
        let mut state = paged_state(3, 0);
        state.end_page = Some(EndPageType::Start);
        assert_eq!(
            transition(&state, ALL_HOOKS, TurnDirection::Next),
            Transition::LeaveBoundary
        );
        state.end_page = Some(EndPageType::End);
        assert_eq!(
            transition(&state, ALL_HOOKS, TurnDirection::Prev),
            Transition::LeaveBoundary
        );
    }

    #[test]
    fn test_start_page_prev_respects_lock() {
        let mut state = paged_state(3, 0);
        state.end_page = Some(EndPageType::Start);
        state.scroll_lock = true;
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Prev), Transition::Ignored);
        state.scroll_lock = false;
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Prev), Transition::CallPrev);
    }

    #[test]
    fn test_scroll_mode_only_acts_at_boundaries() {
        let mut state = paged_state(10, 4);
        state.option.scroll_mode = true;
        state.scrollbar.drag_top = 0.3;
        state.scrollbar.drag_height = 0.2;
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Next), Transition::Ignored);
        assert_eq!(transition(&state, ALL_HOOKS, TurnDirection::Prev), Transition::Ignored);

        state.scrollbar.drag_top = 0.7995;
        assert!(is_bottom(&state));
        assert_eq!(
            transition(&state, ALL_HOOKS, TurnDirection::Next),
            Transition::EnterBoundary(EndPageType::End)
        );

        state.scrollbar.drag_top = 0.0;
        assert!(is_top(&state));
    }

    #[test]
    fn test_empty_page_list_never_moves() {
        let state = paged_state(0, 0);
        let none = HookAvailability::default();
        assert_eq!(transition(&state, none, TurnDirection::Next), Transition::Ignored);
        assert_eq!(transition(&state, none, TurnDirection::Prev), Transition::Ignored);
    }

    #[test]
    fn test_end_page_tip() {
        assert!(end_page_tip(Some(EndPageType::Start), ALL_HOOKS, true).contains("previous"));
        assert!(end_page_tip(Some(EndPageType::End), ALL_HOOKS, true).contains("next"));
        assert!(end_page_tip(Some(EndPageType::End), EXIT_ONLY, true).contains("exits"));
        assert_eq!(end_page_tip(Some(EndPageType::Start), EXIT_ONLY, true), "");
        assert_eq!(end_page_tip(None, ALL_HOOKS, true), "");
    }
}
