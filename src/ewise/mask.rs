//! Mask evaluation shared by every masked kernel
//!
//! An output entry `(i, j)` survives when the mask is absent, or when the
//! mask entry is set and the mask is not complemented, or when it is not set
//! and the mask is complemented. A mask entry is set when it is present and,
//! unless the mask is structural, its value is true.

use crate::matrix::{Matrix, Sparsity, View};
use crate::types::Scalar;

/// A finished mask in the output's orientation
#[derive(Clone, Copy)]
pub(crate) struct Mask<'a, M> {
    view: View<'a, M>,
    structural: bool,
    complement: bool,
}

impl<'a, M: Scalar> Mask<'a, M> {
    pub fn new(m: &'a Matrix<M>, structural: bool, complement: bool) -> Self {
        Self {
            view: m.view(),
            structural,
            complement,
        }
    }

    pub fn is_complement(&self) -> bool {
        self.complement
    }

    pub fn is_structural(&self) -> bool {
        self.structural
    }

    pub fn sparsity(&self) -> Sparsity {
        self.view.sparsity
    }

    pub fn view(&self) -> &View<'a, M> {
        &self.view
    }

    /// True if the mask entry at position `p` is set
    #[inline]
    pub fn is_set_at(&self, p: usize) -> bool {
        self.view.is_live(p) && (self.structural || self.view.value(p).is_truthy())
    }

    /// The mask restricted to vector `j`
    pub fn column(&self, j: usize) -> MaskColumn<'a, M> {
        MaskColumn {
            mask: *self,
            k: self.view.find_vector(j),
        }
    }

    /// Letter used in diagnostics, `.` when there is no mask
    pub fn describe(mask: Option<&Self>) -> String {
        match mask {
            None => ".".to_string(),
            Some(m) if m.complement => format!("!{}", m.sparsity().letter()),
            Some(m) => m.sparsity().letter().to_string(),
        }
    }
}

/// One vector of a mask
#[derive(Clone, Copy)]
pub(crate) struct MaskColumn<'a, M> {
    mask: Mask<'a, M>,
    k: Option<usize>,
}

impl<'a, M: Scalar> MaskColumn<'a, M> {
    /// True if the mask entry at index `i` is set, ignoring complement
    #[inline]
    pub fn is_set(&self, i: usize) -> bool {
        match self.k.and_then(|k| self.mask.view.search(k, i)) {
            Some(p) => self.mask.is_set_at(p),
            None => false,
        }
    }

    /// True if an output entry at index `i` may be written
    #[inline]
    pub fn allows(&self, i: usize) -> bool {
        self.is_set(i) != self.mask.complement
    }

    /// Indices of the set entries of this vector, in order
    pub fn set_indices(&self) -> impl Iterator<Item = usize> + 'a {
        let mask = self.mask;
        let view = mask.view;
        self.k
            .into_iter()
            .flat_map(move |k| view.range(k))
            .filter(move |&p| mask.is_set_at(p))
            .map(move |p| view.index(p))
    }
}
