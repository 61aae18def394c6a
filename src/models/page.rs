/// One position of a page: either an image index or an empty filler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Image(usize),
    /// `layout` never produces this: an odd leftover in a segment gets a page
    /// of its own. Fillers only arrive in page lists built elsewhere.
    Filler,
}

impl Slot {
    pub fn image(self) -> Option<usize> {
        match self {
            Self::Image(i) => Some(i),
            Self::Filler => None,
        }
    }
}

/// A reading unit: one image, or a two-slot spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Single(Slot),
    Spread(Slot, Slot),
}

impl Page {
    pub fn single(index: usize) -> Self {
        Self::Single(Slot::Image(index))
    }

    pub fn spread(first: usize, second: usize) -> Self {
        Self::Spread(Slot::Image(first), Slot::Image(second))
    }

    pub fn slots(&self) -> impl Iterator<Item = Slot> {
        let (a, b) = match *self {
            Self::Single(a) => (a, None),
            Self::Spread(a, b) => (a, Some(b)),
        };
        std::iter::once(a).chain(b)
    }

    /// Image indices of this page, fillers skipped.
    pub fn images(&self) -> impl Iterator<Item = usize> {
        self.slots().filter_map(Slot::image)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Spread(..) => 2,
        }
    }

    pub fn is_spread(&self) -> bool {
        matches!(self, Self::Spread(..))
    }

    pub fn contains(&self, image: usize) -> bool {
        self.images().any(|i| i == image)
    }

    pub fn first_image(&self) -> Option<usize> {
        self.images().next()
    }
}

/// Per-segment filler placement toggles.
///
/// Entry `k` belongs to the `k`-th run of pairable images. Missing entries read
/// as `false` (leftover image placed after the pairs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillEffect(Vec<bool>);

impl FillEffect {
    pub fn new(entries: Vec<bool>) -> Self {
        Self(entries)
    }

    pub fn get(&self, segment: usize) -> bool {
        self.0.get(segment).copied().unwrap_or(false)
    }

    pub fn toggle(&mut self, segment: usize) {
        if self.0.len() <= segment {
            self.0.resize(segment + 1, false);
        }
        self.0[segment] = !self.0[segment];
    }

    pub fn entries(&self) -> &[bool] {
        &self.0
    }
}
