/// SMT sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtSort {
    Bool,
    Int,
    /// Fixed-width bit-vector. Widths are at least 1.
    BitVec(u32),
}

impl SmtSort {
    pub fn bv(width: u32) -> Self {
        SmtSort::BitVec(width)
    }

    /// Bit width for bit-vector sorts, `None` otherwise.
    pub fn bv_width(&self) -> Option<u32> {
        match self {
            SmtSort::BitVec(w) => Some(*w),
            _ => None,
        }
    }
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Int => write!(f, "Int"),
            SmtSort::BitVec(w) => write!(f, "(_ BitVec {w})"),
        }
    }
}

/// Signature of an uninterpreted function: argument sorts and result sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunSignature {
    pub domain: Vec<SmtSort>,
    pub range: SmtSort,
}

impl FunSignature {
    pub fn new(domain: Vec<SmtSort>, range: SmtSort) -> Self {
        Self { domain, range }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitvec_sort_prints_indexed_form() {
        assert_eq!(SmtSort::bv(12).to_string(), "(_ BitVec 12)");
        assert_eq!(SmtSort::bv(3).bv_width(), Some(3));
        assert_eq!(SmtSort::Int.bv_width(), None);
    }
}
