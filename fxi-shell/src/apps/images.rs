//! Downloads images into a monitor without blocking the command thread.

use fxi_kernel::{CommandRegistry, Slide};

use super::{AppContext, AppModule};

const LOADING: &str = "loading";
const UNAVAILABLE: &str = "image unavailable";

pub struct Images;

impl AppModule for Images {
    fn name(&self) -> &'static str {
        "images"
    }

    fn description(&self) -> &'static str {
        "Show images from urls"
    }

    fn commands(&self, _ctx: &AppContext) -> CommandRegistry {
        let mut commands = CommandRegistry::new();

        commands.register("show", Some("Show every <url> in order"), |app, urls| {
            let monitor = app.open_monitor(Some("Images"));
            for url in urls {
                monitor.write(url);
                let slot = monitor.add_slot();
                slot.write(LOADING);

                let url = url.clone();
                app.enqueue(format!("image {}", url), move || {
                    if !slot.write_image_from_url(&url) {
                        slot.write(UNAVAILABLE);
                    }
                    Ok(())
                });
            }
            Ok(())
        });

        commands.register("slides", Some("Show every <url> as a slide"), |app, urls| {
            let slides = urls
                .iter()
                .map(|url| Slide::new(url.as_str()).with_image(url.as_str()))
                .collect();
            app.open_slideshow(slides);
            Ok(())
        });

        commands.register("one", Some("Download <url> in the foreground"), |app, urls| {
            let monitor = app.open_monitor(None);
            for url in urls {
                monitor.write(url);
                monitor.write_image_from_url(url);
            }
            Ok(())
        });

        commands
    }
}
