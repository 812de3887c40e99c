//! Pointer interaction on the preview surface.
//!
//! [`InteractionController`] is a synchronous state machine over
//! `Idle -> Hovering -> Dragging`. It never renders by itself; every event
//! returns an optional [`RenderRequest`] that the host honours immediately.
//! Placement changes replace the settings value wholesale (a new `Arc`), they
//! never mutate it in place.

use std::sync::Arc;

use crate::geometry::{self, Point, Rect, ScaleContext};
use crate::render::Renderer;
use crate::settings::{Placement, PresetAnchor, WatermarkSettings};

/// Anything that can measure a watermark's hit-test rectangle.
pub trait BoundsSource {
    /// Bounds of `settings` at `scale`, in scaled (preview) coordinates.
    fn compute_bounds(&self, settings: &WatermarkSettings, scale: f32) -> Rect;
}

impl BoundsSource for Renderer {
    fn compute_bounds(&self, settings: &WatermarkSettings, scale: f32) -> Rect {
        Renderer::compute_bounds(self, settings, scale)
    }
}

/// Pointer buttons; only [`PointerButton::Left`] drags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Primary button.
    Left,
    /// Middle button / wheel click.
    Middle,
    /// Secondary button.
    Right,
}

/// Cursor affordance the host should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Regular arrow.
    Default,
    /// Pointer over the watermark: it can be grabbed.
    OpenHand,
    /// Watermark is being dragged.
    ClosedHand,
}

/// What the host should redraw after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderRequest {
    /// Lightweight frame during a drag; cached geometry is still valid.
    Draft,
    /// Full frame; bounds were re-measured.
    Full,
}

/// Interaction state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    /// Pointer away from the watermark.
    Idle,
    /// Pointer over the watermark bounds.
    Hovering,
    /// Left button held; `offset` is watermark center minus pointer, in
    /// preview-space.
    Dragging {
        /// Watermark center minus grab point.
        offset: Point,
    },
}

/// Drag/hover state machine for one preview surface.
pub struct InteractionController<B: BoundsSource + ?Sized = Renderer> {
    bounds_source: Arc<B>,
    settings: Arc<WatermarkSettings>,
    scale: ScaleContext,
    state: DragState,
    bounds: Rect,
}

impl<B: BoundsSource + ?Sized> InteractionController<B> {
    /// Create a controller for `settings` shown through `scale`.
    ///
    /// A non-custom placement is resolved against the image size right away.
    pub fn new(bounds_source: Arc<B>, settings: WatermarkSettings, scale: ScaleContext) -> Self {
        let settings = Arc::new(settings.resolved_for(scale.image));
        let bounds = bounds_source.compute_bounds(&settings, scale.factor);
        Self {
            bounds_source,
            settings,
            scale,
            state: DragState::Idle,
            bounds,
        }
    }

    /// Current settings value.
    #[must_use]
    pub fn settings(&self) -> &Arc<WatermarkSettings> {
        &self.settings
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DragState {
        self.state
    }

    /// Current scale context.
    #[must_use]
    pub fn scale(&self) -> ScaleContext {
        self.scale
    }

    /// Cached hit-test bounds in preview-space.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Cursor for the current state.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        match self.state {
            DragState::Idle => Cursor::Default,
            DragState::Hovering => Cursor::OpenHand,
            DragState::Dragging { .. } => Cursor::ClosedHand,
        }
    }

    /// `true` while the left button holds the watermark.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Replace the settings wholesale (e.g. from the settings panel or a
    /// loaded template).
    pub fn set_settings(&mut self, settings: WatermarkSettings) -> Option<RenderRequest> {
        self.settings = Arc::new(settings.resolved_for(self.scale.image));
        self.remeasure();
        Some(RenderRequest::Full)
    }

    /// The preview surface or the source image changed size.
    pub fn set_geometry(&mut self, scale: ScaleContext) -> Option<RenderRequest> {
        self.scale = scale;
        if !self.settings.placement.is_custom {
            self.settings = Arc::new(self.settings.resolved_for(scale.image));
        }
        self.remeasure();
        Some(RenderRequest::Full)
    }

    /// Lock the watermark to a preset anchor. Ignored while dragging.
    pub fn select_anchor(&mut self, anchor: PresetAnchor) -> Option<RenderRequest> {
        if self.is_dragging() {
            return None;
        }
        let placement = Placement::anchored(anchor).resolved(self.scale.image);
        self.settings = Arc::new(self.settings.with_placement(placement));
        self.remeasure();
        Some(RenderRequest::Full)
    }

    /// Pointer moved to `pos` (preview-space).
    pub fn pointer_move(&mut self, pos: Point) -> Option<RenderRequest> {
        match self.state {
            DragState::Dragging { offset } => self.drag_to(pos + offset),
            DragState::Idle | DragState::Hovering => {
                self.state = self.hover_state(pos);
                None
            }
        }
    }

    /// Button pressed at `pos` (preview-space).
    pub fn pointer_down(&mut self, pos: Point, button: PointerButton) -> Option<RenderRequest> {
        if button != PointerButton::Left || self.is_dragging() {
            return None;
        }
        let placement = self.settings.placement;
        let offset = self.scale.to_preview(placement.position) - pos;
        self.state = DragState::Dragging { offset };
        if !placement.is_custom {
            self.settings = Arc::new(self.settings.with_placement(Placement {
                is_custom: true,
                ..placement
            }));
        }
        Some(RenderRequest::Draft)
    }

    /// Button released at `pos` (preview-space).
    pub fn pointer_up(&mut self, pos: Point, button: PointerButton) -> Option<RenderRequest> {
        if button != PointerButton::Left || !self.is_dragging() {
            return None;
        }
        self.remeasure();
        self.state = self.hover_state(pos);
        Some(RenderRequest::Full)
    }

    /// Move the watermark center to `target` (preview-space) if it stays on
    /// the canvas. Off-canvas targets are dropped without any state change.
    fn drag_to(&mut self, target: Point) -> Option<RenderRequest> {
        if !geometry::is_within_canvas(target, self.scale.preview) {
            return None;
        }
        let placement = self.settings.placement;
        let position = self.scale.to_image(target);
        let delta = self.scale.to_preview(position) - self.scale.to_preview(placement.position);
        self.settings = Arc::new(self.settings.with_placement(Placement {
            position,
            is_custom: true,
            ..placement
        }));
        self.bounds = self.bounds.translated(delta);
        Some(RenderRequest::Draft)
    }

    fn hover_state(&self, pos: Point) -> DragState {
        if self.bounds.contains(pos) {
            DragState::Hovering
        } else {
            DragState::Idle
        }
    }

    fn remeasure(&mut self) {
        self.bounds = self
            .bounds_source
            .compute_bounds(&self.settings, self.scale.factor);
    }
}

impl<B: BoundsSource + ?Sized> std::fmt::Debug for InteractionController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionController")
            .field("state", &self.state)
            .field("scale", &self.scale)
            .field("bounds", &self.bounds)
            .field("placement", &self.settings.placement)
            .finish_non_exhaustive()
    }
}
