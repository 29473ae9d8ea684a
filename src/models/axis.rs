use std::fmt;
use std::rc::Rc;

/// Produces a cell for a given position, e.g. to alternate widths
pub type Generator<C> = Rc<dyn Fn(&Axis<C>, isize) -> C>;

/// One entry of an axis: a fixed cell or a generator invoked at lookup
pub enum AxisEntry<C> {
    Static(C),
    Generated(Generator<C>),
}

impl<C: Clone> Clone for AxisEntry<C> {
    fn clone(&self) -> Self {
        match self {
            AxisEntry::Static(cell) => AxisEntry::Static(cell.clone()),
            AxisEntry::Generated(generator) => AxisEntry::Generated(Rc::clone(generator)),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for AxisEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisEntry::Static(cell) => f.debug_tuple("Static").field(cell).finish(),
            AxisEntry::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

/// Ordered cell specifications for the columns or the rows of a grid
///
/// Lookups past the end either wrap around or repeat the last entry.
#[derive(Debug, Clone)]
pub struct Axis<C> {
    entries: Vec<AxisEntry<C>>,
    pub wrap_around: bool,
}

impl<C> Default for Axis<C> {
    fn default() -> Self {
        Axis {
            entries: Vec::new(),
            wrap_around: false,
        }
    }
}

impl<C: Clone + Default> Axis<C> {
    /// Create an axis from static cells, repeating the last one
    pub fn new(cells: impl IntoIterator<Item = C>) -> Self {
        Axis {
            entries: cells.into_iter().map(AxisEntry::Static).collect(),
            wrap_around: false,
        }
    }

    /// Create an axis from static cells, cycling through them
    pub fn wrapping(cells: impl IntoIterator<Item = C>) -> Self {
        Axis {
            wrap_around: true,
            ..Axis::new(cells)
        }
    }

    pub fn push(&mut self, cell: C) -> &mut Self {
        self.entries.push(AxisEntry::Static(cell));
        self
    }

    pub fn push_generated<F>(&mut self, generator: F) -> &mut Self
    where
        F: Fn(&Axis<C>, isize) -> C + 'static,
    {
        self.entries.push(AxisEntry::Generated(Rc::new(generator)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cell at `index`
    ///
    /// Negative indexes count from the end. Out of range indexes wrap
    /// (`wrap_around`) or clamp to the last entry. Generators receive the
    /// index as requested. An empty axis yields `C::default()`.
    pub fn resolve(&self, index: isize) -> C {
        let len = self.entries.len() as isize;
        if len == 0 {
            return C::default();
        }

        let direct = if index < 0 { index + len } else { index };
        let slot = if (0..len).contains(&direct) {
            direct
        } else if self.wrap_around {
            index.rem_euclid(len)
        } else {
            len - 1
        };

        match &self.entries[slot as usize] {
            AxisEntry::Static(cell) => cell.clone(),
            AxisEntry::Generated(generator) => generator(self, index),
        }
    }

    /// Cell for a zero based column or row number
    pub fn at(&self, position: usize) -> C {
        self.resolve(isize::try_from(position).unwrap_or(isize::MAX))
    }
}

impl<C: Clone + Default> FromIterator<C> for Axis<C> {
    fn from_iter<T: IntoIterator<Item = C>>(iter: T) -> Self {
        Axis::new(iter)
    }
}
