//! Scroll- and frame-driven motion for the landing page.
//!
//! Everything here talks to the page through [`PageSurface`], so the numbers
//! (navbar state, zoom progress, carousel offset) can be driven without a
//! browser. The wasm build wires these types to `web_sys`.

pub const HEADER_ID: &str = "main-header";
pub const HERO_ID: &str = "hero";
pub const COLLAB_SECTION_ID: &str = "collab-section";
pub const COLLAB_CONTENT_ID: &str = "collab-content";
pub const PARTNER_TRACK_ID: &str = "partner-track";

pub const NAV_HIDDEN_CLASS: &str = "nav-hidden";
pub const NAV_LIGHT_CLASS: &str = "nav-light";
pub const NAV_DARK_CLASS: &str = "nav-dark";
pub const COLLAB_SCALE_VAR: &str = "--collab-scale";

pub const NAV_HIDE_THRESHOLD: f64 = 80.0;
pub const NAV_THEME_SWITCH_LEAD: f64 = 100.0;
pub const ANCHOR_SCROLL_OFFSET: f64 = -80.0;
const NARROW_VIEWPORT_WIDTH: f64 = 640.0;
const ZOOM_START_VIEWPORT_FRACTION: f64 = 0.3;
const ZOOM_END_SECTION_FRACTION: f64 = 0.6;
const FADE_COMPLETE_AT_PROGRESS: f64 = 0.3;

pub const CAROUSEL_SPEED_PX_PER_FRAME: f64 = 0.8;
pub const CAROUSEL_ITEM_GAP_PX: f64 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementMetrics {
    pub top: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Minimal view of the page the motion controllers need. Lookups of missing
/// elements return `None`/empty and mutations on them are no-ops.
pub trait PageSurface {
    fn element_metrics(&self, id: &str) -> Option<ElementMetrics>;

    fn viewport(&self) -> Viewport;

    fn set_style_property(&self, id: &str, name: &str, value: &str);

    fn set_class(&self, id: &str, class: &str, enabled: bool);

    /// Appends a deep clone of every current child of `id` and returns how
    /// many originals there were.
    fn duplicate_children(&self, id: &str) -> Option<usize>;

    /// Rendered widths of the first `count` children of `id`.
    fn child_widths(&self, id: &str, count: usize) -> Vec<f64>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavTheme {
    Light,
    Dark,
}

impl NavTheme {
    fn for_scroll(scroll: f64, switch_point: f64) -> Self {
        if scroll > switch_point {
            Self::Light
        } else {
            Self::Dark
        }
    }

    fn class(self) -> &'static str {
        match self {
            Self::Light => NAV_LIGHT_CLASS,
            Self::Dark => NAV_DARK_CLASS,
        }
    }

    fn opposite(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
}

impl ScaleRange {
    pub const NARROW: Self = Self { min: 0.95, max: 1.08 };
    pub const WIDE: Self = Self { min: 0.9, max: 1.25 };

    pub fn for_viewport_width(width: f64) -> Self {
        if width < NARROW_VIEWPORT_WIDTH {
            Self::NARROW
        } else {
            Self::WIDE
        }
    }

    pub fn at(self, progress: f64) -> f64 {
        self.min + (self.max - self.min) * progress
    }
}

/// Scroll range over which the collaboration section zooms in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomWindow {
    pub start: f64,
    pub end: f64,
}

impl ZoomWindow {
    pub fn for_section(section: ElementMetrics, viewport_height: f64) -> Self {
        Self {
            start: section.top - viewport_height * ZOOM_START_VIEWPORT_FRACTION,
            end: section.top + section.height * ZOOM_END_SECTION_FRACTION,
        }
    }

    pub fn progress(self, scroll: f64) -> f64 {
        if scroll <= self.start {
            return 0.0;
        }
        if scroll >= self.end {
            return 1.0;
        }

        ((scroll - self.start) / (self.end - self.start)).clamp(0.0, 1.0)
    }
}

pub fn fade_opacity(progress: f64) -> f64 {
    (progress / FADE_COMPLETE_AT_PROGRESS).min(1.0)
}

pub fn nav_hidden(scroll: f64, last_scroll: f64) -> bool {
    scroll > last_scroll && scroll > NAV_HIDE_THRESHOLD
}

/// Returns the selector an in-page link points at, or `None` for bare `#`.
pub fn anchor_target(href: Option<&str>) -> Option<&str> {
    href.filter(|value| !value.is_empty() && *value != "#")
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomStyle {
    pub progress: f64,
    pub scale: f64,
    pub opacity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollFrame {
    pub nav_hidden: bool,
    pub theme: NavTheme,
    pub zoom: Option<ZoomStyle>,
}

#[derive(Debug)]
pub struct ScrollReactor {
    last_scroll: f64,
    switch_point: f64,
    scale_range: ScaleRange,
}

impl ScrollReactor {
    /// Captures the hero height and viewport class once, at page start.
    pub fn new(page: &impl PageSurface) -> Self {
        let viewport = page.viewport();
        let hero_height = page
            .element_metrics(HERO_ID)
            .map(|hero| hero.height)
            .unwrap_or(viewport.height);

        Self {
            last_scroll: 0.0,
            switch_point: hero_height - NAV_THEME_SWITCH_LEAD,
            scale_range: ScaleRange::for_viewport_width(viewport.width),
        }
    }

    pub fn switch_point(&self) -> f64 {
        self.switch_point
    }

    pub fn scale_range(&self) -> ScaleRange {
        self.scale_range
    }

    pub fn on_scroll(&mut self, page: &impl PageSurface, scroll: f64) -> ScrollFrame {
        let hidden = nav_hidden(scroll, self.last_scroll);
        let theme = NavTheme::for_scroll(scroll, self.switch_point);

        if page.element_metrics(HEADER_ID).is_some() {
            page.set_class(HEADER_ID, NAV_HIDDEN_CLASS, hidden);
            page.set_class(HEADER_ID, theme.class(), true);
            page.set_class(HEADER_ID, theme.opposite().class(), false);
        }

        let zoom = self.apply_zoom(page, scroll);
        self.last_scroll = scroll;

        ScrollFrame {
            nav_hidden: hidden,
            theme,
            zoom,
        }
    }

    fn apply_zoom(&self, page: &impl PageSurface, scroll: f64) -> Option<ZoomStyle> {
        let section = page.element_metrics(COLLAB_SECTION_ID)?;
        page.element_metrics(COLLAB_CONTENT_ID)?;

        let window = ZoomWindow::for_section(section, page.viewport().height);
        let progress = window.progress(scroll);
        let style = ZoomStyle {
            progress,
            scale: self.scale_range.at(progress),
            opacity: fade_opacity(progress),
        };

        page.set_style_property(COLLAB_CONTENT_ID, COLLAB_SCALE_VAR, &style.scale.to_string());
        page.set_style_property(COLLAB_CONTENT_ID, "opacity", &style.opacity.to_string());
        Some(style)
    }
}

/// Endless horizontal scroller over a track whose items were duplicated once.
#[derive(Debug)]
pub struct CarouselDriver {
    track_id: &'static str,
    original_count: usize,
    offset: f64,
    speed: f64,
    paused: bool,
    half_width: f64,
}

impl CarouselDriver {
    /// Duplicates the track's items and takes the first width measurement.
    /// Returns `None` when the track is not on the page.
    pub fn mount(page: &impl PageSurface, track_id: &'static str) -> Option<Self> {
        let original_count = page.duplicate_children(track_id)?;
        let mut driver = Self {
            track_id,
            original_count,
            offset: 0.0,
            speed: CAROUSEL_SPEED_PX_PER_FRAME,
            paused: false,
            half_width: 0.0,
        };
        driver.measure(page);
        Some(driver)
    }

    pub fn measure(&mut self, page: &impl PageSurface) {
        self.half_width = page
            .child_widths(self.track_id, self.original_count)
            .into_iter()
            .map(|width| width + CAROUSEL_ITEM_GAP_PX)
            .sum();
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Moves the offset one frame and returns it, or `None` while paused or
    /// before the track has a width.
    pub fn advance(&mut self) -> Option<f64> {
        if self.paused || self.half_width <= 0.0 {
            return None;
        }

        self.offset -= self.speed;
        if self.offset.abs() >= self.half_width {
            self.offset = 0.0;
        }
        Some(self.offset)
    }

    pub fn frame(&mut self, page: &impl PageSurface) {
        if let Some(offset) = self.advance() {
            page.set_style_property(self.track_id, "transform", &format!("translateX({offset}px)"));
        }
    }
}
