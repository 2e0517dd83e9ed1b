//! Per-call modifiers of an operation

use crate::config::AxBMethod;

/// Options that modify how one call treats its mask and operands
///
/// The default descriptor uses the mask values as given, keeps unmasked
/// entries of the output, does not transpose and lets the multiply pick its
/// own method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Descriptor {
    /// Use the complement of the mask
    pub mask_comp: bool,
    /// Use only the pattern of the mask, ignoring its values
    pub mask_struct: bool,
    /// Clear output entries not written by the call
    pub replace: bool,
    /// Use the transpose of the first operand
    pub transpose_a: bool,
    /// Use the transpose of the second operand
    pub transpose_b: bool,
    /// Multiply method; `None` defers to the process-wide setting
    pub axb_method: Option<AxBMethod>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complement(mut self) -> Self {
        self.mask_comp = true;
        self
    }

    pub fn structural(mut self) -> Self {
        self.mask_struct = true;
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn transpose_a(mut self) -> Self {
        self.transpose_a = true;
        self
    }

    pub fn transpose_b(mut self) -> Self {
        self.transpose_b = true;
        self
    }

    pub fn method(mut self, method: AxBMethod) -> Self {
        self.axb_method = Some(method);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let desc = Descriptor::new().complement().transpose_b().method(AxBMethod::Dot);
        assert!(desc.mask_comp);
        assert!(!desc.mask_struct);
        assert!(desc.transpose_b);
        assert_eq!(desc.axb_method, Some(AxBMethod::Dot));
        assert_eq!(Descriptor::default(), Descriptor::new());
    }
}
