use fs_err as fs;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::wire::GenerationKind;

/// Installs the global subscriber. `RUST_LOG` wins over the flag.
pub fn init_tracing(debug: bool) {
    let default = if debug { "levelup_ai=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn tx_dir(root: &Path, tx: Uuid) -> PathBuf {
    root.join(tx.to_string())
}

/// Per-request diagnostic files: `<root>/<tx>/<kind>.<stage>.{txt,json}`.
/// Writes are best effort; a failed write is logged and ignored.
#[derive(Debug, Clone)]
pub struct Artifacts {
    root: Option<PathBuf>,
    tx: Uuid,
}

impl Artifacts {
    pub fn new(root: Option<&str>) -> Self {
        Self { root: root.map(PathBuf::from), tx: Uuid::new_v4() }
    }

    pub fn tx(&self) -> Uuid {
        self.tx
    }

    pub fn dir(&self) -> Option<PathBuf> {
        self.root.as_deref().map(|r| tx_dir(r, self.tx))
    }

    fn write(&self, file: String, body: &str) -> Option<PathBuf> {
        let dir = self.dir()?;
        let path = dir.join(file);
        let res = fs::create_dir_all(&dir).and_then(|_| fs::write(&path, body));
        match res {
            Ok(()) => {
                debug!(path = %path.display(), "artifact saved");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not save artifact");
                None
            }
        }
    }

    pub fn save_text(&self, kind: GenerationKind, stage: &str, text: &str) -> Option<PathBuf> {
        self.write(format!("{kind}.{stage}.txt"), text)
    }

    pub fn save_json<T: Serialize>(&self, kind: GenerationKind, stage: &str, value: &T) -> Option<PathBuf> {
        self.root.as_ref()?;
        match to_string_pretty(value) {
            Ok(body) => self.write(format!("{kind}.{stage}.json"), &body),
            Err(e) => {
                warn!(stage, error = %e, "could not serialize artifact");
                None
            }
        }
    }
}
