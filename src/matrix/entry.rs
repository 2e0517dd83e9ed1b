//! Index slots that can be tagged as zombies

use std::fmt;

const ZOMBIE_BIT: u64 = 1 << 63;

/// One slot of the index array of a sparse or hypersparse matrix
///
/// The slot holds the index of the entry within its vector. The high bit marks
/// a zombie: an entry that has been deleted but still occupies its slot until
/// the next flush. The index survives tagging, so a zombie can be found by
/// binary search and revived in place.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Entry(u64);

impl Entry {
    #[inline(always)]
    pub const fn present(index: usize) -> Self {
        Entry(index as u64)
    }

    #[inline(always)]
    pub const fn zombie(index: usize) -> Self {
        Entry(index as u64 | ZOMBIE_BIT)
    }

    /// The index, whether or not the slot is a zombie
    #[inline(always)]
    pub const fn index(self) -> usize {
        (self.0 & !ZOMBIE_BIT) as usize
    }

    #[inline(always)]
    pub const fn is_zombie(self) -> bool {
        self.0 & ZOMBIE_BIT != 0
    }

    #[inline(always)]
    pub const fn is_present(self) -> bool {
        !self.is_zombie()
    }

    #[inline(always)]
    pub const fn killed(self) -> Self {
        Entry(self.0 | ZOMBIE_BIT)
    }

    #[inline(always)]
    pub const fn revived(self) -> Self {
        Entry(self.0 & !ZOMBIE_BIT)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zombie() {
            write!(f, "zombie({})", self.index())
        } else {
            write!(f, "{}", self.index())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zombie_tagging() {
        let e = Entry::present(42);
        assert!(e.is_present());
        assert_eq!(e.index(), 42);

        let z = e.killed();
        assert!(z.is_zombie());
        assert_eq!(z.index(), 42);
        assert_eq!(z, Entry::zombie(42));
        assert_eq!(z.revived(), e);
        assert_eq!(format!("{:?}", z), "zombie(42)");
    }

    #[test]
    fn test_zero_index() {
        // index 0 must stay distinguishable from its zombie
        assert_ne!(Entry::present(0), Entry::zombie(0));
        assert_eq!(Entry::zombie(0).index(), 0);
    }
}
