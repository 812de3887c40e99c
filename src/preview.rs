//! Interactive preview session.
//!
//! Glues a source image, a fitted preview base, an [`InteractionController`]
//! and a shared [`Renderer`] together. The host forwards pointer events and
//! viewport changes; the session keeps [`PreviewSession::frame`] up to date and
//! reports every new settings value through a single callback.

use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::Result;
use crate::geometry::{Point, ScaleContext, Size};
use crate::interaction::{Cursor, InteractionController, PointerButton, RenderRequest};
use crate::render::{DetailLevel, Renderer};
use crate::settings::{PresetAnchor, WatermarkSettings};

type SettingsListener = Box<dyn FnMut(&Arc<WatermarkSettings>)>;

/// A live preview of one source image.
pub struct PreviewSession {
    renderer: Arc<Renderer>,
    source: RgbaImage,
    base: RgbaImage,
    viewport: Size,
    controller: InteractionController,
    frame: RgbaImage,
    listener: Option<SettingsListener>,
}

impl PreviewSession {
    /// Start a session for `source` shown inside `viewport`.
    #[must_use]
    pub fn new(
        renderer: Arc<Renderer>,
        source: RgbaImage,
        settings: WatermarkSettings,
        viewport: Size,
    ) -> Self {
        let scale = ScaleContext::fit(Size::of(&source), viewport);
        let base = fit_base(&source, scale);
        let controller = InteractionController::new(Arc::clone(&renderer), settings, scale);
        let mut session = Self {
            renderer,
            source,
            base,
            viewport,
            controller,
            frame: RgbaImage::new(0, 0),
            listener: None,
        };
        session.redraw(RenderRequest::Full);
        session
    }

    /// Open the image at `path` and start a session for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be read or decoded.
    pub fn open(
        renderer: Arc<Renderer>,
        path: &Path,
        settings: WatermarkSettings,
        viewport: Size,
    ) -> Result<Self> {
        let source = image::open(path)?.to_rgba8();
        tracing::debug!(
            "preview source {} ({}x{})",
            path.display(),
            source.width(),
            source.height()
        );
        Ok(Self::new(renderer, source, settings, viewport))
    }

    /// Register the callback that receives every new settings value.
    /// Replaces any previous callback.
    pub fn on_settings_changed(&mut self, callback: impl FnMut(&Arc<WatermarkSettings>) + 'static) {
        self.listener = Some(Box::new(callback));
    }

    /// The latest composited preview.
    #[must_use]
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// The full-resolution source.
    #[must_use]
    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    /// Current settings value.
    #[must_use]
    pub fn settings(&self) -> &Arc<WatermarkSettings> {
        self.controller.settings()
    }

    /// Cursor the host should show.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.controller.cursor()
    }

    /// Current preview mapping.
    #[must_use]
    pub fn scale(&self) -> ScaleContext {
        self.controller.scale()
    }

    /// The preview area changed size.
    pub fn set_viewport(&mut self, viewport: Size) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        let scale = ScaleContext::fit(Size::of(&self.source), viewport);
        if scale != self.controller.scale() {
            self.base = fit_base(&self.source, scale);
        }
        let request = self.controller.set_geometry(scale);
        self.apply(request);
    }

    /// Replace the settings, e.g. from the settings panel or a template.
    pub fn set_settings(&mut self, settings: WatermarkSettings) {
        let request = self.controller.set_settings(settings);
        self.apply(request);
    }

    /// Lock the watermark to a preset anchor.
    pub fn select_anchor(&mut self, anchor: PresetAnchor) {
        let request = self.controller.select_anchor(anchor);
        self.apply(request);
    }

    /// Forward a pointer press.
    pub fn pointer_down(&mut self, pos: Point, button: PointerButton) {
        let request = self.controller.pointer_down(pos, button);
        self.apply(request);
    }

    /// Forward a pointer move.
    pub fn pointer_move(&mut self, pos: Point) {
        let request = self.controller.pointer_move(pos);
        self.apply(request);
    }

    /// Forward a pointer release.
    pub fn pointer_up(&mut self, pos: Point, button: PointerButton) {
        let request = self.controller.pointer_up(pos, button);
        self.apply(request);
    }

    fn apply(&mut self, request: Option<RenderRequest>) {
        let Some(request) = request else {
            return;
        };
        self.redraw(request);
        if let Some(listener) = self.listener.as_mut() {
            listener(self.controller.settings());
        }
    }

    fn redraw(&mut self, request: RenderRequest) {
        let detail = match request {
            RenderRequest::Draft => DetailLevel::Interactive,
            RenderRequest::Full => DetailLevel::Final,
        };
        let scale = self.controller.scale().factor;
        self.frame = self
            .renderer
            .render(&self.base, self.controller.settings(), scale, detail);
    }
}

impl std::fmt::Debug for PreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSession")
            .field("viewport", &self.viewport)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

fn fit_base(source: &RgbaImage, scale: ScaleContext) -> RgbaImage {
    if scale.preview == scale.image {
        source.clone()
    } else {
        imageops::resize(
            source,
            scale.preview.width,
            scale.preview.height,
            FilterType::Triangle,
        )
    }
}
