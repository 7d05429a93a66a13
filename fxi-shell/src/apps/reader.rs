//! Paged plain-text reader for urls and local files.

use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};
use fxi_kernel::fetch::fetch_text;
use fxi_kernel::{Application, CommandRegistry};

use super::{AppContext, AppModule};
use crate::lock;

/// Lines of the next page repeated at the bottom of each page.
const PAGE_OVERLAP: usize = 50;

pub struct Reader;

#[derive(Default)]
struct Document {
    title: String,
    lines: Vec<String>,
    page: usize,
    pages: usize,
}

impl Document {
    fn new(title: String, text: &str, page_size: usize) -> Self {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let pages = lines.len().div_ceil(page_size).max(1);
        Self {
            title,
            lines,
            page: 1,
            pages,
        }
    }

    /// Lines shown on the current page.
    fn page_lines(&self, page_size: usize) -> &[String] {
        let start = ((self.page - 1) * page_size).min(self.lines.len());
        let end = (start + page_size + PAGE_OVERLAP).min(self.lines.len());
        &self.lines[start..end]
    }
}

impl AppModule for Reader {
    fn name(&self) -> &'static str {
        "reader"
    }

    fn description(&self) -> &'static str {
        "Read text documents page by page"
    }

    fn commands(&self, ctx: &AppContext) -> CommandRegistry {
        let page_size = ctx.settings.reader_page_size.max(1);
        let document: Arc<Mutex<Option<Document>>> = Arc::new(Mutex::new(None));
        let mut commands = CommandRegistry::new();

        let doc = document.clone();
        commands.register("r", Some("Read <url-or-path>"), move |app, args| {
            let source = args.first().context("usage: r <url-or-path>")?;
            app.info(Some(&format!("Downloading {}", source)));
            let text = load(app, source);
            app.info(None);
            let text = text?;

            let mut doc = lock(&doc);
            *doc = Some(Document::new(source.clone(), &text, page_size));
            if let Some(doc) = doc.as_ref() {
                app.open_monitor(Some(&doc.title));
                view_page(app, doc, page_size);
            }
            Ok(())
        });

        let doc = document;
        commands.register("p", Some("Go to page <n>"), move |app, args| {
            let requested: i64 = args
                .first()
                .context("usage: p <n>")?
                .parse()
                .context("p: <n> must be a number")?;

            let mut doc = lock(&doc);
            let Some(doc) = doc.as_mut() else {
                bail!("no document loaded");
            };
            doc.page = usize::try_from(requested.max(1))
                .unwrap_or(usize::MAX)
                .min(doc.pages);
            view_page(app, doc, page_size);
            Ok(())
        });

        commands
    }
}

fn load(app: &Application, source: &str) -> anyhow::Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(fetch_text(app.env().fetcher.as_ref(), source)?)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))
    }
}

fn view_page(app: &Application, doc: &Document, page_size: usize) {
    let Some(monitor) = app.current_monitor() else {
        return;
    };
    monitor.clear();
    monitor.h1(&doc.title);
    monitor.h2(format!("Page {} of {}", doc.page, doc.pages));
    for line in doc.page_lines(page_size) {
        monitor.write(line);
    }
}
