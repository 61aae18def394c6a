/// Layout class of an image, derived from its aspect ratio against the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageKind {
    /// Spread-eligible portrait page.
    #[default]
    Normal,
    /// Wider than half the viewport but no wider than the viewport itself.
    Wide,
    /// Wider than the viewport; always shown alone.
    Long,
    /// Narrow strip (webtoon slice); always shown alone.
    Vertical,
}

impl ImageKind {
    /// Whether an image of this kind can share a page with a neighbour.
    pub fn is_pairable(self) -> bool {
        self == Self::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadType {
    #[default]
    Wait,
    Loading,
    Loaded,
    Error,
}

impl LoadType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Wait => "waiting",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationKind {
    Hide,
    Server,
    Local,
}

/// Annotation attached by an external OCR/translation collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub kind: TranslationKind,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ComicImage {
    pub src: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub kind: ImageKind,
    pub load_type: LoadType,
    pub translation: Option<Translation>,
}

impl ComicImage {
    pub fn new(src: Option<String>) -> Self {
        Self {
            src: src.filter(|s| !s.is_empty()),
            ..Self::default()
        }
    }

    /// Width divided by height, or `None` until both dimensions are known.
    pub fn aspect_ratio(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(w as f64 / h as f64),
            _ => None,
        }
    }

    pub fn has_src(&self) -> bool {
        self.src.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.load_type == LoadType::Loaded
    }

    /// Translation message to show in the tooltip, if any.
    pub fn visible_translation(&self) -> Option<&str> {
        self.translation
            .as_ref()
            .filter(|t| t.kind != TranslationKind::Hide && !t.message.is_empty())
            .map(|t| t.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_src_is_absent() {
        assert!(!ComicImage::new(Some(String::new())).has_src());
        assert!(ComicImage::new(Some("a.jpg".into())).has_src());
        assert!(!ComicImage::new(None).has_src());
    }

    #[test]
    fn test_aspect_ratio_requires_both_dimensions() {
        let mut img = ComicImage::new(None);
        assert_eq!(img.aspect_ratio(), None);
        img.width = Some(800);
        assert_eq!(img.aspect_ratio(), None);
        img.height = Some(0);
        assert_eq!(img.aspect_ratio(), None);
        img.height = Some(1600);
        assert!((img.aspect_ratio().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_hidden_translation_is_not_shown() {
        let mut img = ComicImage::new(None);
        img.translation = Some(Translation {
            kind: TranslationKind::Hide,
            message: "hello".into(),
        });
        assert_eq!(img.visible_translation(), None);
        img.translation = Some(Translation {
            kind: TranslationKind::Server,
            message: "hello".into(),
        });
        assert_eq!(img.visible_translation(), Some("hello"));
    }
}
