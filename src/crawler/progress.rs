// file: src/crawler/progress.rs
// description: spinner reporting crawl progress on the terminal
// reference: uses indicatif for progress reporting

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone)]
pub struct CrawlProgress {
    bar: ProgressBar,
    downloaded: Arc<AtomicUsize>,
    skipped: Arc<AtomicUsize>,
}

impl CrawlProgress {
    pub fn new(visible: bool, colored: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new_spinner();
            bar.set_style(create_spinner_style(colored));
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            downloaded: Arc::new(AtomicUsize::new(0)),
            skipped: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn hidden() -> Self {
        Self::new(false, false)
    }

    pub fn enter_directory(&self, path: &str) {
        let shown = if path.is_empty() { "/" } else { path };
        self.bar.set_prefix(shown.to_string());
    }

    pub fn file_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
        self.update();
    }

    pub fn file_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.update();
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn update(&self) {
        self.bar.set_message(format!(
            "Downloaded: {} | Skipped: {}",
            self.downloaded(),
            self.skipped()
        ));
        self.bar.tick();
    }
}

fn create_spinner_style(colored: bool) -> ProgressStyle {
    let template = if colored {
        "{spinner:.green} [{elapsed_precise}] {prefix:.cyan} {msg}"
    } else {
        "{spinner} [{elapsed_precise}] {prefix} {msg}"
    };

    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
