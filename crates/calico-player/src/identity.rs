use std::fs;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Anonymous, stable identifier sent with every rating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerId(String);

impl ListenerId {
    /// Read the id stored at `path`, or generate and store a new one.
    ///
    /// An unreadable or unwritable file never stops the player: the freshly
    /// generated id is used for this run and a warning is logged.
    pub fn load_or_create(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            let id = content.trim();
            if !id.is_empty() {
                return Self(id.to_string());
            }
        }

        let id = Uuid::new_v4().to_string();
        let stored = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(path, &id));
        match stored {
            Ok(()) => info!("Generated listener id, stored in {}", path.display()),
            Err(e) => warn!(
                "Could not store listener id at {} ({}); using a temporary one",
                path.display(),
                e
            ),
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListenerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
