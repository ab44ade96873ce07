pub mod geometry;

pub use geometry::{
    to_pdf_space, to_unscaled, to_viewport, GeometryError, PdfRect, Rect, Selection,
    ViewportPoint, Zoom, MIN_SELECTION_PX,
};

use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.25;

/// Author label used for annotations created interactively
pub const DEFAULT_AUTHOR: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    pub zoom: Zoom,
    pub current_page: u32,
    pub page_count: u32,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self { zoom: Zoom::ACTUAL_SIZE, current_page: 1, page_count: 1 }
    }
}

impl ViewerState {
    pub fn for_document(page_count: u32, zoom: Zoom) -> Self {
        Self { zoom: clamp_zoom(zoom.factor()), current_page: 1, page_count: page_count.max(1) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerAction {
    ZoomIn,
    ZoomOut,
    SetZoom(f32),
    NextPage,
    PreviousPage,
    GoToPage(u32),
}

fn clamp_zoom(factor: f32) -> Zoom {
    let factor = if factor.is_finite() { factor } else { 1.0 };
    Zoom::new(factor.clamp(MIN_ZOOM, MAX_ZOOM)).unwrap_or(Zoom::ACTUAL_SIZE)
}

pub fn apply_viewer_action(state: &mut ViewerState, action: ViewerAction) {
    match action {
        ViewerAction::ZoomIn => state.zoom = clamp_zoom(state.zoom.factor() + ZOOM_STEP),
        ViewerAction::ZoomOut => state.zoom = clamp_zoom(state.zoom.factor() - ZOOM_STEP),
        ViewerAction::SetZoom(factor) => state.zoom = clamp_zoom(factor),
        ViewerAction::NextPage => {
            state.current_page = (state.current_page + 1).min(state.page_count.max(1));
        }
        ViewerAction::PreviousPage => {
            state.current_page = state.current_page.saturating_sub(1).max(1);
        }
        ViewerAction::GoToPage(page) => {
            state.current_page = page.max(1).min(state.page_count.max(1));
        }
    }
}

/// User-level settings persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub default_author: String,
    pub default_zoom: Zoom,
    pub analysis_base_url: Option<String>,
    pub analysis_model: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_author: DEFAULT_AUTHOR.to_owned(),
            default_zoom: Zoom::ACTUAL_SIZE,
            analysis_base_url: None,
            analysis_model: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_steps_are_clamped() {
        let mut state = ViewerState::default();
        for _ in 0..20 {
            apply_viewer_action(&mut state, ViewerAction::ZoomIn);
        }
        assert_eq!(state.zoom.factor(), MAX_ZOOM);

        for _ in 0..20 {
            apply_viewer_action(&mut state, ViewerAction::ZoomOut);
        }
        assert_eq!(state.zoom.factor(), MIN_ZOOM);
    }

    #[test]
    fn zoom_in_moves_by_one_step() {
        let mut state = ViewerState::default();
        apply_viewer_action(&mut state, ViewerAction::ZoomIn);
        assert_eq!(state.zoom.factor(), 1.25);
    }

    #[test]
    fn set_zoom_clamps_out_of_range_values() {
        let mut state = ViewerState::default();
        apply_viewer_action(&mut state, ViewerAction::SetZoom(10.0));
        assert_eq!(state.zoom.factor(), MAX_ZOOM);
        apply_viewer_action(&mut state, ViewerAction::SetZoom(f32::NAN));
        assert_eq!(state.zoom.factor(), 1.0);
    }

    #[test]
    fn next_page_is_clamped_to_document_bounds() {
        let mut state = ViewerState::for_document(2, Zoom::ACTUAL_SIZE);
        apply_viewer_action(&mut state, ViewerAction::NextPage);
        apply_viewer_action(&mut state, ViewerAction::NextPage);
        apply_viewer_action(&mut state, ViewerAction::NextPage);
        assert_eq!(state.current_page, 2);

        apply_viewer_action(&mut state, ViewerAction::PreviousPage);
        apply_viewer_action(&mut state, ViewerAction::PreviousPage);
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn go_to_page_is_clamped_to_document_bounds() {
        let mut state = ViewerState::for_document(3, Zoom::ACTUAL_SIZE);
        apply_viewer_action(&mut state, ViewerAction::GoToPage(100));
        assert_eq!(state.current_page, 3);
        apply_viewer_action(&mut state, ViewerAction::GoToPage(0));
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn preferences_fill_missing_fields_with_defaults() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"default_author":"Ada"}"#).expect("valid json");
        assert_eq!(prefs.default_author, "Ada");
        assert_eq!(prefs.default_zoom, Zoom::ACTUAL_SIZE);
        assert_eq!(prefs.analysis_model, None);
    }
}
