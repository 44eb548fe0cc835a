use crate::sorts::SmtSort;

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    /// Variable reference by name (declared constant or quantifier binding).
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Boolean literal.
    BoolLit(bool),
    /// Bit-vector literal; `value` is truncated to `width` bits.
    BvLit { value: u64, width: u32 },

    // Arithmetic
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // Bit-vectors
    /// Bits `hi..=lo` of the operand (bit 0 is the least significant).
    Extract {
        hi: u32,
        lo: u32,
        term: Box<SmtTerm>,
    },
    /// Concatenation; the first operand supplies the high bits.
    Concat(Box<SmtTerm>, Box<SmtTerm>),
    /// Unsigned value of a bit-vector as an integer.
    BvToInt(Box<SmtTerm>),

    /// Application of a declared uninterpreted function.
    App(String, Vec<SmtTerm>),

    /// Universal quantification over the named variables.
    ForAll(Vec<(String, SmtSort)>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn bv(value: u64, width: u32) -> Self {
        let value = if width >= 64 {
            value
        } else {
            value & ((1u64 << width) - 1)
        };
        SmtTerm::BvLit { value, width }
    }

    pub fn app(name: impl Into<String>, args: Vec<SmtTerm>) -> Self {
        SmtTerm::App(name.into(), args)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn ne(self, other: SmtTerm) -> Self {
        self.eq(other).not()
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn extract(self, hi: u32, lo: u32) -> Self {
        SmtTerm::Extract {
            hi,
            lo,
            term: Box::new(self),
        }
    }

    pub fn concat(self, low: SmtTerm) -> Self {
        SmtTerm::Concat(Box::new(self), Box::new(low))
    }

    pub fn bv2int(self) -> Self {
        SmtTerm::BvToInt(Box::new(self))
    }

    pub fn forall(bindings: Vec<(String, SmtSort)>, body: SmtTerm) -> Self {
        SmtTerm::ForAll(bindings, Box::new(body))
    }
}

/// The bit-vector `bv` (of `width` bits) with bit `position` removed.
///
/// The result is `width - 1` bits wide; `width` must be at least 2.
pub fn bits_except(bv: SmtTerm, width: u32, position: u32) -> SmtTerm {
    if position == 0 {
        return bv.extract(width - 1, 1);
    }
    if position == width - 1 {
        return bv.extract(width - 2, 0);
    }
    let hi = bv.clone().extract(width - 1, position + 1);
    let lo = bv.extract(position - 1, 0);
    hi.concat(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bv_literal_truncates_to_width() {
        assert_eq!(
            SmtTerm::bv(0b1_0110, 4),
            SmtTerm::BvLit {
                value: 0b0110,
                width: 4
            }
        );
    }

    #[test]
    fn bits_except_edges_use_single_extract() {
        let v = SmtTerm::var("v");
        assert_eq!(bits_except(v.clone(), 4, 0), v.clone().extract(3, 1));
        assert_eq!(bits_except(v.clone(), 4, 3), v.clone().extract(2, 0));
        assert_eq!(
            bits_except(v.clone(), 4, 2),
            v.clone().extract(3, 3).concat(v.extract(1, 0))
        );
    }
}
