// Checkpoint screenshots
//
// One full-page capture per scenario step, named `{prefix}_{label}.png`.
// A failed capture is logged and skipped; it never fails the scenario.

use crate::automation::BrowserAutomation;
use std::path::{Path, PathBuf};

pub struct Checkpoints<'a, B: ?Sized> {
    browser: &'a B,
    dir: PathBuf,
    prefix: String,
    taken: Vec<PathBuf>,
}

impl<'a, B> Checkpoints<'a, B>
where
    B: BrowserAutomation + ?Sized,
{
    pub fn new(browser: &'a B, dir: &Path, prefix: impl Into<String>) -> Self {
        Self {
            browser,
            dir: dir.to_path_buf(),
            prefix: prefix.into(),
            taken: Vec::new(),
        }
    }

    pub async fn capture(&mut self, label: &str) {
        let path = self.dir.join(format!("{}_{}.png", self.prefix, label));
        match self.browser.screenshot(Some(&path)).await {
            Ok(_) => {
                tracing::debug!("Checkpoint {}", path.display());
                self.taken.push(path);
            }
            Err(e) => tracing::warn!("Checkpoint '{}' not captured: {}", label, e),
        }
    }

    /// Paths written, in capture order
    pub fn into_paths(self) -> Vec<PathBuf> {
        self.taken
    }
}
