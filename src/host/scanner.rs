//! Chapter directory discovery.
//!
//! A chapter is one directory of image files read in natural file-name order
//! (`2.jpg` before `10.jpg`). Sibling directories of the chapter, in the same
//! order, are the previous and next chapters.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Scanner options.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
    /// Include dot files.
    pub include_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
            include_hidden: false,
        }
    }
}

/// A scanned chapter and its neighbours.
#[derive(Debug, Clone, Default)]
pub struct Chapter {
    pub dir: PathBuf,
    pub images: Vec<PathBuf>,
    pub prev: Option<PathBuf>,
    pub next: Option<PathBuf>,
}

impl Chapter {
    pub fn title(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.display().to_string())
    }
}

pub fn is_image_extension(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tiff" | "tif"
    )
}

/// Scan `dir` and locate its sibling chapters.
pub fn scan_chapter(dir: &Path, config: &ScanConfig) -> Result<Chapter> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve chapter directory: {:?}", dir))?;
    let images = list_images(&dir, config)?;
    let (prev, next) = match dir.parent() {
        Some(parent) => neighbours(parent, &dir, config)?,
        None => (None, None),
    };
    debug!(dir = ?dir, images = images.len(), ?prev, ?next, "Scanned chapter");
    Ok(Chapter {
        dir,
        images,
        prev,
        next,
    })
}

/// Image files directly inside `dir`, naturally ordered.
pub fn list_images(dir: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in entries(dir, config)? {
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !is_image_extension(ext) {
            trace!(?path, "Skipping non-image file");
            continue;
        }
        images.push(path.to_path_buf());
    }
    images.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(images)
}

/// Subdirectories of `parent`, naturally ordered.
pub fn list_chapters(parent: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = entries(parent, config)?
        .into_iter()
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    dirs.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(dirs)
}

fn neighbours(
    parent: &Path,
    dir: &Path,
    config: &ScanConfig,
) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
    let chapters = list_chapters(parent, config)?;
    let Some(pos) = chapters.iter().position(|c| c == dir) else {
        return Ok((None, None));
    };
    let prev = pos.checked_sub(1).and_then(|i| chapters.get(i)).cloned();
    let next = chapters.get(pos + 1).cloned();
    Ok((prev, next))
}

fn entries(dir: &Path, config: &ScanConfig) -> Result<Vec<walkdir::DirEntry>> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {:?}", dir);
    }
    let walker = WalkDir::new(dir)
        .follow_links(config.follow_symlinks)
        .min_depth(1)
        .max_depth(1);
    Ok(walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| config.include_hidden || !e.file_name().to_string_lossy().starts_with('.'))
        .collect())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compare names with embedded numbers ordered by value, letters case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_number(&mut a);
                let nb = take_number(&mut b);
                // Compare by value, then shorter (fewer leading zeros) first.
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_natural_order() {
        let mut names = vec!["10.jpg", "2.jpg", "1.jpg", "page_b.png", "Page_a.png", "02.jpg"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["1.jpg", "2.jpg", "02.jpg", "10.jpg", "Page_a.png", "page_b.png"]
        );
        assert_eq!(natural_cmp("ch9", "ch10"), Ordering::Less);
        assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        for name in ["10.jpg", "2.PNG", "1.webp", "notes.txt", ".hidden.jpg"] {
            touch(&tmp.path().join(name));
        }
        fs::create_dir(tmp.path().join("extras.jpg")).unwrap();
        touch(&tmp.path().join("extras.jpg").join("3.jpg"));

        let images = list_images(tmp.path(), &ScanConfig::default()).unwrap();
        let names: Vec<String> = images.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["1.webp", "2.PNG", "10.jpg"]);
    }

    #[test]
    fn test_scan_chapter_finds_neighbours() {
        let tmp = TempDir::new().unwrap();
        for name in ["ch1", "ch2", "ch10"] {
            fs::create_dir(tmp.path().join(name)).unwrap();
        }
        touch(&tmp.path().join("ch2").join("001.jpg"));
        touch(&tmp.path().join("cover.jpg"));

        let chapter = scan_chapter(&tmp.path().join("ch2"), &ScanConfig::default()).unwrap();
        assert_eq!(chapter.images.len(), 1);
        assert_eq!(chapter.title(), "ch2");
        assert_eq!(chapter.prev.as_deref().map(file_name), Some("ch1".to_string()));
        assert_eq!(chapter.next.as_deref().map(file_name), Some("ch10".to_string()));

        let first = scan_chapter(&tmp.path().join("ch1"), &ScanConfig::default()).unwrap();
        assert!(first.prev.is_none());
        assert!(first.images.is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_chapter(&tmp.path().join("nope"), &ScanConfig::default()).is_err());
        assert!(list_images(&tmp.path().join("nope"), &ScanConfig::default()).is_err());
    }
}
