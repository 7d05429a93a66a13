//! Slide shows - a monitor that shows one slide at a time.
//!
//! A slide show takes over its application's current monitor. Images are
//! downloaded on the application's task queue into a slot reserved by the
//! slide, so an image that arrives after the user moved on or closed the
//! show lands nowhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::app::Application;
use crate::lock;
use crate::monitor::{Monitor, Slot};

/// Shown in a slide's image slot until the download finishes.
pub const IMAGE_LOADING: &str = "loading";
/// Shown in a slide's image slot when the download failed.
pub const IMAGE_UNAVAILABLE: &str = "image unavailable";

/// One slide: a caption, an optional date line and an optional image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Slide {
    pub text: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Slide {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

struct SlideShowShared {
    app: Weak<Application>,
    alive: Arc<AtomicBool>,
    monitor: Monitor,
    slides: Vec<Slide>,
    index: Mutex<usize>,
}

/// Handle to an open slide show. Cloning yields another handle to the
/// same show.
#[derive(Clone)]
pub struct SlideShow {
    shared: Arc<SlideShowShared>,
}

impl SlideShow {
    /// Only `Application::open_slideshow` creates slide shows.
    pub(crate) fn new(app: &Arc<Application>, monitor: Monitor, slides: Vec<Slide>) -> Self {
        let show = Self {
            shared: Arc::new(SlideShowShared {
                app: Arc::downgrade(app),
                alive: Arc::new(AtomicBool::new(true)),
                monitor,
                slides,
                index: Mutex::new(0),
            }),
        };
        show.render(0);
        show
    }

    /// False once the show or its monitor has been closed.
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire) && self.shared.monitor.is_alive()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.shared.monitor
    }

    pub fn len(&self) -> usize {
        self.shared.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.slides.is_empty()
    }

    /// Zero-based index of the slide on screen.
    pub fn position(&self) -> usize {
        *lock(&self.shared.index)
    }

    pub fn current_slide(&self) -> Option<Slide> {
        self.shared.slides.get(self.position()).cloned()
    }

    /// Move to the next slide. Does nothing on the last one.
    pub fn next(&self) -> bool {
        self.step(|index, len| (index + 1 < len).then_some(index + 1))
    }

    /// Move to the previous slide. Does nothing on the first one.
    pub fn previous(&self) -> bool {
        self.step(|index, _| index.checked_sub(1))
    }

    /// Redraw the current slide, downloading its image again.
    pub fn refresh(&self) {
        if self.is_alive() {
            let index = lock(&self.shared.index);
            self.render(*index);
        }
    }

    /// Close the show and its monitor. Idempotent.
    pub fn close(&self) {
        if self.shared.alive.swap(false, Ordering::AcqRel) {
            tracing::debug!(slides = self.len(), "slide show closed");
        }
        self.shared.monitor.close();
    }

    fn step(&self, target: impl FnOnce(usize, usize) -> Option<usize>) -> bool {
        if !self.is_alive() {
            return false;
        }
        let mut index = lock(&self.shared.index);
        let Some(next) = target(*index, self.len()) else {
            return false;
        };
        *index = next;
        self.render(next);
        true
    }

    /// Draw slide `index`. Callers hold the index lock so concurrent steps
    /// render one at a time.
    fn render(&self, index: usize) {
        let monitor = &self.shared.monitor;
        monitor.clear();

        let Some(slide) = self.shared.slides.get(index) else {
            monitor.write("No slides");
            return;
        };

        if let Some(url) = &slide.image_url {
            let slot = monitor.add_slot();
            slot.write(IMAGE_LOADING);
            self.load_image(slot, url.clone());
        }
        monitor.write(&slide.text);
        if let Some(date) = &slide.date {
            monitor.write_line(date, 1);
        }
        monitor.write(format!("{} / {}", index + 1, self.len()));
    }

    fn load_image(&self, slot: Slot, url: String) {
        let Some(app) = self.shared.app.upgrade() else {
            return;
        };
        let owner = self.shared.app.clone();
        let alive = self.shared.alive.clone();

        app.enqueue(format!("slide {}", url), move || {
            let app_alive = owner.upgrade().is_some_and(|app| app.is_alive());
            if !app_alive || !alive.load(Ordering::Acquire) || !slot.is_alive() {
                tracing::debug!(url = %url, "slide gone before its image loaded");
                return Ok(());
            }
            if !slot.write_image_from_url(&url) {
                slot.write(IMAGE_UNAVAILABLE);
            }
            Ok(())
        });
    }
}
