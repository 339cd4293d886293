//! Two-stage auto-resize negotiation
//!
//! Sizing a window to its content directly is unstable: a too-small window
//! shows a scrollbar, the scrollbar narrows the layout, text rewraps and the
//! measured height changes again. Instead the window opens oversized (twice
//! the requested height, so no scrollbar appears), the content is measured
//! once, and the window shrinks to fit.
//!
//! ```text
//! NotStarted --open--> MeasuringOversized --measured--> Resized
//! ```
//!
//! `Resized` is terminal; measurements after the first are ignored.

use crate::config::ChromeOffset;

/// Outer window size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStage {
    NotStarted,
    MeasuringOversized,
    Resized,
}

/// Per-window auto-resize state, owned by the window's session
#[derive(Debug, Clone)]
pub struct AutoResize {
    stage: ResizeStage,
    requested: Geometry,
    chrome: ChromeOffset,
    padding: u32,
    measured: Option<Geometry>,
}

impl AutoResize {
    pub fn new(requested: Geometry, chrome: ChromeOffset, padding: u32) -> Self {
        Self {
            stage: ResizeStage::NotStarted,
            requested,
            chrome,
            padding,
            measured: None,
        }
    }

    pub fn stage(&self) -> ResizeStage {
        self.stage
    }

    pub fn measured(&self) -> Option<Geometry> {
        self.measured
    }

    /// Size to open the window at. Moves to `MeasuringOversized`.
    pub fn open_geometry(&mut self) -> Geometry {
        if self.stage == ResizeStage::NotStarted {
            self.stage = ResizeStage::MeasuringOversized;
        }
        Geometry::new(self.requested.width, self.requested.height.saturating_mul(2))
    }

    /// Script to inject once the content has loaded, if still measuring
    pub fn on_loaded(&self) -> Option<String> {
        (self.stage == ResizeStage::MeasuringOversized).then(|| measurement_script(self.padding))
    }

    /// Apply a measurement. Returns the final window size the first time only.
    pub fn on_measured(&mut self, measured: Geometry) -> Option<Geometry> {
        if self.stage != ResizeStage::MeasuringOversized {
            return None;
        }
        self.stage = ResizeStage::Resized;
        self.measured = Some(measured);
        Some(final_size(measured, self.chrome))
    }
}

/// Outer size for measured content: content plus the host's chrome
pub fn final_size(measured: Geometry, chrome: ChromeOffset) -> Geometry {
    Geometry::new(
        measured.width.saturating_add(chrome.width),
        measured.height.saturating_add(chrome.height),
    )
}

/// Script evaluating to `{width, height}` of the rendered body plus `padding`.
///
/// Measures the body rather than the viewport so the oversized window does
/// not inflate the result.
pub fn measurement_script(padding: u32) -> String {
    format!(
        r#"(function () {{
  var body = document.body;
  if (!body) {{ return null; }}
  var style = window.getComputedStyle(body);
  var marginX = (parseFloat(style.marginLeft) || 0) + (parseFloat(style.marginRight) || 0);
  var marginY = (parseFloat(style.marginTop) || 0) + (parseFloat(style.marginBottom) || 0);
  var rect = body.getBoundingClientRect();
  return {{
    width: Math.ceil(Math.max(body.scrollWidth, rect.width) + marginX) + {padding},
    height: Math.ceil(Math.max(body.scrollHeight, rect.height) + marginY) + {padding}
  }};
}})();"#,
        padding = padding
    )
}
