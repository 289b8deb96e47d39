use std::collections::VecDeque;
use std::path::{Path, PathBuf};

pub const MAX_RECENT: usize = 5;
const LABEL_LENGTH: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRef {
    pub path: PathBuf,
    pub label: String,
}

impl ThumbnailRef {
    pub fn new(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let label = if name.chars().count() > LABEL_LENGTH {
            format!("{}...", name.chars().take(LABEL_LENGTH).collect::<String>())
        } else {
            name
        };

        Self {
            path: path.to_path_buf(),
            label,
        }
    }
}

/// Last few saved images, newest first.
#[derive(Debug, Default)]
pub struct RecentImages {
    items: VecDeque<ThumbnailRef>,
}

impl RecentImages {
    pub fn push(&mut self, path: &Path) {
        self.items.push_front(ThumbnailRef::new(path));
        self.items.truncate(MAX_RECENT);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThumbnailRef> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_five_newest_first() {
        let mut recent = RecentImages::default();
        for i in 0..8 {
            recent.push(Path::new(&format!("out/{i}.png")));
        }

        assert_eq!(recent.len(), MAX_RECENT);
        let labels: Vec<&str> = recent.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["7.png", "6.png", "5.png", "4.png", "3.png"]);
    }

    #[test]
    fn test_long_names_are_shortened() {
        let thumb = ThumbnailRef::new(Path::new("out/20240309_140507_1024x1024_1.png"));
        assert_eq!(thumb.label, "20240309_140507...");
    }
}
