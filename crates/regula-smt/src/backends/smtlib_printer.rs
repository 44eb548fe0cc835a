use crate::sorts::{FunSignature, SmtSort};
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => name.clone(),
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::BvLit { value, width } => format!("(_ bv{value} {width})"),
        SmtTerm::Add(lhs, rhs) => format!("(+ {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
        SmtTerm::Extract { hi, lo, term } => {
            format!("((_ extract {hi} {lo}) {})", to_smtlib(term))
        }
        SmtTerm::Concat(hi, lo) => format!("(concat {} {})", to_smtlib(hi), to_smtlib(lo)),
        SmtTerm::BvToInt(inner) => format!("(bv2nat {})", to_smtlib(inner)),
        SmtTerm::App(name, args) => {
            if args.is_empty() {
                name.clone()
            } else {
                let inner: Vec<String> = args.iter().map(to_smtlib).collect();
                format!("({name} {})", inner.join(" "))
            }
        }
        SmtTerm::ForAll(bindings, body) => {
            let vars: Vec<String> = bindings.iter().map(|(n, s)| format!("({n} {s})")).collect();
            format!("(forall ({}) {})", vars.join(" "), to_smtlib(body))
        }
    }
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> String {
    sort.to_string()
}

/// Print a `declare-fun` command for an uninterpreted function.
pub fn fun_decl_to_smtlib(name: &str, signature: &FunSignature) -> String {
    let domain: Vec<String> = signature.domain.iter().map(sort_to_smtlib).collect();
    format!(
        "(declare-fun {name} ({}) {})",
        domain.join(" "),
        sort_to_smtlib(&signature.range)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_affine_constraint() {
        let term = SmtTerm::var("a")
            .mul(SmtTerm::int(3))
            .add(SmtTerm::var("b"))
            .eq(SmtTerm::int(-2));
        assert_eq!(to_smtlib(&term), "(= (+ (* a 3) b) (- 2))");
    }

    #[test]
    fn print_negated_implication() {
        let term = SmtTerm::var("p").implies(SmtTerm::bool(false)).not();
        assert_eq!(to_smtlib(&term), "(not (=> p false))");
    }

    #[test]
    fn print_bitvector_operations() {
        let term = SmtTerm::var("v")
            .extract(3, 2)
            .concat(SmtTerm::bv(1, 1))
            .bv2int();
        assert_eq!(
            to_smtlib(&term),
            "(bv2nat (concat ((_ extract 3 2) v) (_ bv1 1)))"
        );
    }

    #[test]
    fn print_quantified_function_law() {
        let law = SmtTerm::forall(
            vec![("l".to_string(), SmtSort::bv(2))],
            SmtTerm::app("sh", vec![SmtTerm::var("l")])
                .eq(SmtTerm::app("t", vec![SmtTerm::var("l")])),
        );
        assert_eq!(
            to_smtlib(&law),
            "(forall ((l (_ BitVec 2))) (= (sh l) (t l)))"
        );
    }

    #[test]
    fn print_negative_literal_and_declaration() {
        assert_eq!(to_smtlib(&SmtTerm::int(-7)), "(- 7)");
        let sig = FunSignature::new(vec![SmtSort::Int, SmtSort::Bool], SmtSort::Int);
        assert_eq!(fun_decl_to_smtlib("f", &sig), "(declare-fun f (Int Bool) Int)");
    }
}
