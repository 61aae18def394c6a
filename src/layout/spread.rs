use crate::models::{ComicImage, FillEffect, ImageKind, Page};

/// Aspect-ratio thresholds derived from the viewport size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proportion {
    /// Widest ratio that still fits half the viewport (capped at 1).
    pub single_ratio: f64,
    /// Ratio of the viewport itself.
    pub wide_ratio: f64,
    /// Anything narrower than this is a strip.
    pub strip_ratio: f64,
}

impl Proportion {
    /// Returns `None` for a degenerate (zero or non-finite) viewport.
    pub fn from_viewport(width: f64, height: f64) -> Option<Self> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return None;
        }
        let single_ratio = (width / 2.0 / height).min(1.0);
        Some(Self {
            single_ratio,
            wide_ratio: width / height,
            strip_ratio: single_ratio / 2.0,
        })
    }

    /// Classify an aspect ratio against these thresholds.
    pub fn classify(&self, ratio: f64) -> ImageKind {
        if ratio <= self.single_ratio {
            if ratio < self.strip_ratio {
                ImageKind::Vertical
            } else {
                ImageKind::Normal
            }
        } else if ratio > self.wide_ratio {
            ImageKind::Long
        } else {
            ImageKind::Wide
        }
    }
}

/// Classify an image, or `None` while its size is still unknown.
pub fn classify(image: &ComicImage, proportion: &Proportion) -> Option<ImageKind> {
    image.aspect_ratio().map(|r| proportion.classify(r))
}

/// Group images into pages.
///
/// # Algorithm
/// 1. In single-page layouts (one-page or scroll mode, or one image) every image
///    is its own page.
/// 2. Otherwise non-pairable images (wide, long, vertical) stand alone and split
///    the list into segments of pairable images.
/// 3. Each segment is paired greedily. An odd leftover goes last, or first when
///    the segment's fill toggle is set.
pub fn layout(images: &[ComicImage], fill: &FillEffect, single_page: bool) -> Vec<Page> {
    if single_page || images.len() <= 1 {
        return (0..images.len()).map(Page::single).collect();
    }

    let mut pages = Vec::with_capacity(images.len() / 2 + 1);
    let mut run: Vec<usize> = Vec::new();
    let mut segment = 0usize;

    for (i, img) in images.iter().enumerate() {
        if img.kind.is_pairable() {
            run.push(i);
            continue;
        }
        if !run.is_empty() {
            push_segment(&mut pages, &run, fill.get(segment));
            segment += 1;
            run.clear();
        }
        pages.push(Page::single(i));
    }
    if !run.is_empty() {
        push_segment(&mut pages, &run, fill.get(segment));
    }

    pages
}

fn push_segment(pages: &mut Vec<Page>, run: &[usize], leftover_first: bool) {
    let mut rest = run;
    if run.len() % 2 == 1 && leftover_first {
        pages.push(Page::single(run[0]));
        rest = &run[1..];
    }
    let mut chunks = rest.chunks_exact(2);
    for pair in chunks.by_ref() {
        pages.push(Page::spread(pair[0], pair[1]));
    }
    if let [last] = chunks.remainder() {
        pages.push(Page::single(*last));
    }
}

/// Index of the pairing segment containing `image`, or `None` when the image is
/// not pairable (or out of range).
pub fn segment_of(images: &[ComicImage], image: usize) -> Option<usize> {
    if !images.get(image)?.kind.is_pairable() {
        return None;
    }
    let mut segment = 0usize;
    let mut in_run = false;
    for img in &images[..image] {
        if img.kind.is_pairable() {
            in_run = true;
        } else if in_run {
            segment += 1;
            in_run = false;
        }
    }
    Some(segment)
}

/// Index of the page containing `image`.
pub fn page_of(pages: &[Page], image: usize) -> Option<usize> {
    pages.iter().position(|p| p.contains(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Slot;

    fn make_images(kinds: &[ImageKind]) -> Vec<ComicImage> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| ComicImage {
                src: Some(format!("{i}.jpg")),
                kind: *kind,
                ..ComicImage::default()
            })
            .collect()
    }

    fn indices(pages: &[Page]) -> Vec<Vec<usize>> {
        pages.iter().map(|p| p.images().collect()).collect()
    }

    fn assert_covers(pages: &[Page], count: usize) {
        let flat: Vec<usize> = pages.iter().flat_map(|p| p.images()).collect();
        assert_eq!(flat, (0..count).collect::<Vec<_>>());
    }

    use ImageKind::{Long, Normal, Vertical, Wide};

    #[test]
    fn test_empty_list() {
        assert!(layout(&[], &FillEffect::default(), false).is_empty());
    }

    #[test]
    fn test_five_normal_pages() {
        let images = make_images(&[Normal; 5]);
        let fill = FillEffect::new(vec![false]);
        let pages = layout(&images, &fill, false);
        assert_eq!(indices(&pages), vec![vec![0, 1], vec![2, 3], vec![4]]);

        let toggled = FillEffect::new(vec![true]);
        let pages = layout(&images, &toggled, false);
        assert_eq!(indices(&pages), vec![vec![0], vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_single_page_mode_bypasses_grouping() {
        let images = make_images(&[Normal; 4]);
        let pages = layout(&images, &FillEffect::default(), true);
        assert_eq!(indices(&pages), vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_boundaries_split_segments() {
        let images = make_images(&[Normal, Normal, Normal, Long, Normal, Normal, Vertical, Normal]);
        let pages = layout(&images, &FillEffect::default(), false);
        assert_eq!(
            indices(&pages),
            vec![vec![0, 1], vec![2], vec![3], vec![4, 5], vec![6], vec![7]]
        );
        assert_covers(&pages, images.len());
    }

    #[test]
    fn test_fill_toggle_only_affects_its_segment() {
        let images = make_images(&[Normal, Normal, Normal, Wide, Normal, Normal, Normal]);
        let fill = FillEffect::new(vec![false, true]);
        let pages = layout(&images, &fill, false);
        assert_eq!(
            indices(&pages),
            vec![vec![0, 1], vec![2], vec![3], vec![4], vec![5, 6]]
        );
    }

    #[test]
    fn test_wide_stands_alone() {
        let images = make_images(&[Normal, Wide, Normal]);
        let pages = layout(&images, &FillEffect::default(), false);
        assert!(pages.iter().all(|p| !p.is_spread()));
        assert_covers(&pages, 3);
    }

    #[test]
    fn test_layout_is_idempotent_and_covering() {
        let patterns: [&[ImageKind]; 4] = [
            &[Normal, Wide, Normal, Normal, Long, Normal],
            &[Vertical, Vertical, Normal],
            &[Normal; 9],
            &[Long, Normal, Normal, Normal, Normal, Wide, Normal],
        ];
        for kinds in patterns {
            let images = make_images(kinds);
            for bits in 0u8..8 {
                let fill = FillEffect::new((0..3).map(|k| bits & (1 << k) != 0).collect());
                let first = layout(&images, &fill, false);
                let second = layout(&images, &fill, false);
                assert_eq!(first, second);
                assert_covers(&first, images.len());
                assert!(first.iter().all(|p| p.slots().all(|s| s != Slot::Filler)));
            }
        }
    }

    #[test]
    fn test_segment_of() {
        let images = make_images(&[Normal, Normal, Long, Normal, Wide, Wide, Normal]);
        assert_eq!(segment_of(&images, 0), Some(0));
        assert_eq!(segment_of(&images, 1), Some(0));
        assert_eq!(segment_of(&images, 2), None);
        assert_eq!(segment_of(&images, 3), Some(1));
        assert_eq!(segment_of(&images, 6), Some(2));
        assert_eq!(segment_of(&images, 99), None);
    }

    #[test]
    fn test_proportion_degenerate_viewport() {
        assert!(Proportion::from_viewport(0.0, 800.0).is_none());
        assert!(Proportion::from_viewport(800.0, 0.0).is_none());
        assert!(Proportion::from_viewport(f64::NAN, 800.0).is_none());
    }

    #[test]
    fn test_classify_thresholds() {
        let square = Proportion::from_viewport(1000.0, 1000.0).unwrap();
        assert!((square.single_ratio - 0.5).abs() < 1e-9);
        assert!((square.wide_ratio - 1.0).abs() < 1e-9);
        assert!((square.strip_ratio - 0.25).abs() < 1e-9);

        assert_eq!(square.classify(0.1), Vertical);
        assert_eq!(square.classify(0.25), Normal);
        assert_eq!(square.classify(0.5), Normal);
        assert_eq!(square.classify(0.9), Wide);
        assert_eq!(square.classify(1.0), Wide);
        assert_eq!(square.classify(1.5), Long);
    }

    #[test]
    fn test_classify_follows_viewport() {
        let img = ComicImage {
            width: Some(900),
            height: Some(1000),
            ..ComicImage::default()
        };
        let square = Proportion::from_viewport(1000.0, 1000.0).unwrap();
        assert_eq!(classify(&img, &square), Some(Wide));

        let banner = Proportion::from_viewport(2000.0, 500.0).unwrap();
        assert!((banner.wide_ratio - 4.0).abs() < 1e-9);
        assert_eq!(classify(&img, &banner), Some(Normal));

        let panorama = ComicImage {
            width: Some(4500),
            height: Some(1000),
            ..ComicImage::default()
        };
        assert_eq!(classify(&panorama, &banner), Some(Long));
        assert_eq!(classify(&ComicImage::default(), &banner), None);
    }
}
