#![doc = include_str!("../README.md")]

//! SMT terms and solver integration for encoding regularity analysis.
//!
//! Terms mix linear integer arithmetic, fixed-width bit-vectors and
//! uninterpreted functions, with optional quantifiers over bit-vector
//! variables. Z3 (in-process) and cvc5 (subprocess) backends implement the
//! common [`solver::SmtSolver`] trait.

pub mod backends;
pub mod solver;
pub mod sorts;
pub mod terms;
