use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;

use crate::backends::smtlib_printer::{fun_decl_to_smtlib, sort_to_smtlib, to_smtlib};
use crate::solver::{ModelValue, SatResult, SmtSolver};
use crate::sorts::{FunSignature, SmtSort};
use crate::terms::SmtTerm;

/// Quantified bit-vector, uninterpreted-function and integer queries all
/// appear in one session.
const LOGIC: &str = "(set-logic ALL)";

#[derive(Debug, Error)]
pub enum Cvc5Error {
    #[error("cvc5 I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cvc5 not found: {0}")]
    NotFound(String),
    #[error("cvc5 error: {0}")]
    SolverError(String),
    #[error("Failed to parse cvc5 output: {0}")]
    ParseError(String),
}

pub struct Cvc5Solver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
    has_model: bool,
}

impl Cvc5Solver {
    pub fn new() -> Result<Self, Cvc5Error> {
        Self::with_command_and_timeout("cvc5", None)
    }

    pub fn with_command_and_timeout_secs(cmd: &str, timeout_secs: u64) -> Result<Self, Cvc5Error> {
        if timeout_secs == 0 {
            return Self::with_command_and_timeout(cmd, None);
        }
        Self::with_command_and_timeout(cmd, Some(timeout_secs.saturating_mul(1000)))
    }

    /// Spawn `cmd` in incremental SMT-LIB2 mode. `timeout_ms` bounds every
    /// individual `check-sat`.
    pub fn with_command_and_timeout(cmd: &str, timeout_ms: Option<u64>) -> Result<Self, Cvc5Error> {
        let mut command = Command::new(cmd);
        command.args(["--lang", "smt2", "--incremental", "--produce-models"]);
        if let Some(ms) = timeout_ms {
            command.arg(format!("--tlimit-per={ms}"));
        }
        Self::spawn(cmd, command)
    }

    fn spawn(name: &str, mut command: Command) -> Result<Self, Cvc5Error> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Cvc5Error::NotFound(format!("{name}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stderr".into()))?;

        let mut solver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr: BufReader::new(stderr),
            has_model: false,
        };

        solver.send_command_no_response(LOGIC)?;
        Ok(solver)
    }

    /// Send a command and read one complete response (an atom, or an
    /// s-expression that may span several lines).
    fn send_command(&mut self, cmd: &str) -> Result<String, Cvc5Error> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;

        let mut response = String::new();
        let mut depth: i64 = 0;
        loop {
            let mut line = String::new();
            let read = self.stdout.read_line(&mut line)?;
            if read == 0 {
                let mut stderr = String::new();
                let _ = self.stderr.read_line(&mut stderr);
                return Err(Cvc5Error::SolverError(format!(
                    "No response from cvc5 for command `{cmd}`. stderr: {}",
                    stderr.trim()
                )));
            }
            depth += paren_balance(&line);
            response.push_str(&line);
            if depth <= 0 && !response.trim().is_empty() {
                break;
            }
        }
        let response = response.trim().to_string();
        if response.starts_with("(error") {
            return Err(Cvc5Error::SolverError(response));
        }
        Ok(response)
    }

    fn send_command_no_response(&mut self, cmd: &str) -> Result<(), Cvc5Error> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        Ok(())
    }
}

fn paren_balance(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '(' => acc + 1,
        ')' => acc - 1,
        _ => acc,
    })
}

impl Drop for Cvc5Solver {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        // a solver stuck in a query never reads the exit command
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl SmtSolver for Cvc5Solver {
    type Error = Cvc5Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Cvc5Error> {
        let sort_str = sort_to_smtlib(sort);
        self.send_command_no_response(&format!("(declare-const {name} {sort_str})"))
    }

    fn declare_fun(&mut self, name: &str, signature: &FunSignature) -> Result<(), Cvc5Error> {
        self.send_command_no_response(&fun_decl_to_smtlib(name, signature))
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Cvc5Error> {
        let smt_str = to_smtlib(term);
        self.send_command_no_response(&format!("(assert {smt_str})"))?;
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Cvc5Error> {
        let response = self.send_command("(check-sat)")?;
        let result = match response.as_str() {
            "sat" => SatResult::Sat,
            "unsat" => SatResult::Unsat,
            "unknown" => SatResult::Unknown("cvc5 returned unknown".into()),
            other => return Err(Cvc5Error::SolverError(other.to_string())),
        };
        self.has_model = result == SatResult::Sat;
        Ok(result)
    }

    fn eval(&mut self, term: &SmtTerm) -> Result<Option<ModelValue>, Cvc5Error> {
        if !self.has_model {
            return Ok(None);
        }
        let response = self.send_command(&format!("(get-value ({}))", to_smtlib(term)))?;
        parse_get_value(&response)
    }
}

/// Minimal s-expression tree for solver responses.
#[derive(Debug, Clone, PartialEq)]
enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

fn parse_sexpr(input: &str) -> Result<SExpr, Cvc5Error> {
    let mut stack: Vec<Vec<SExpr>> = vec![Vec::new()];
    let mut atom = String::new();
    let mut in_quoted_symbol = false;
    let flush = |atom: &mut String, stack: &mut Vec<Vec<SExpr>>| {
        if !atom.is_empty() {
            if let Some(top) = stack.last_mut() {
                top.push(SExpr::Atom(std::mem::take(atom)));
            }
        }
    };
    for ch in input.chars() {
        match ch {
            '|' => in_quoted_symbol = !in_quoted_symbol,
            '(' if !in_quoted_symbol => {
                flush(&mut atom, &mut stack);
                stack.push(Vec::new());
            }
            ')' if !in_quoted_symbol => {
                flush(&mut atom, &mut stack);
                let done = stack
                    .pop()
                    .ok_or_else(|| Cvc5Error::ParseError(input.to_string()))?;
                stack
                    .last_mut()
                    .ok_or_else(|| Cvc5Error::ParseError(input.to_string()))?
                    .push(SExpr::List(done));
            }
            c if c.is_whitespace() && !in_quoted_symbol => flush(&mut atom, &mut stack),
            other => atom.push(other),
        }
    }
    flush(&mut atom, &mut stack);
    if stack.len() != 1 {
        return Err(Cvc5Error::ParseError(input.to_string()));
    }
    let mut top = stack.pop().unwrap_or_default();
    if top.len() != 1 {
        return Err(Cvc5Error::ParseError(input.to_string()));
    }
    Ok(top.remove(0))
}

/// Parse a `get-value` response of the form `((term value))`.
fn parse_get_value(response: &str) -> Result<Option<ModelValue>, Cvc5Error> {
    let SExpr::List(pairs) = parse_sexpr(response)? else {
        return Err(Cvc5Error::ParseError(response.to_string()));
    };
    match pairs.first() {
        Some(SExpr::List(pair)) if pair.len() == 2 => Ok(parse_value(&pair[1])),
        _ => Err(Cvc5Error::ParseError(response.to_string())),
    }
}

fn parse_value(expr: &SExpr) -> Option<ModelValue> {
    match expr {
        SExpr::Atom(a) => parse_atom(a),
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Atom(minus), inner] if minus == "-" => match parse_value(inner)? {
                ModelValue::Int(n) => Some(ModelValue::Int(-n)),
                _ => None,
            },
            [SExpr::Atom(underscore), SExpr::Atom(bv), SExpr::Atom(width)]
                if underscore == "_" && bv.starts_with("bv") =>
            {
                let value = bv.trim_start_matches("bv").parse::<u64>().ok()?;
                let width = width.parse::<u32>().ok()?;
                Some(ModelValue::BitVec { value, width })
            }
            _ => None,
        },
    }
}

fn parse_atom(atom: &str) -> Option<ModelValue> {
    match atom {
        "true" => return Some(ModelValue::Bool(true)),
        "false" => return Some(ModelValue::Bool(false)),
        _ => {}
    }
    if let Some(bits) = atom.strip_prefix("#b") {
        let value = u64::from_str_radix(bits, 2).ok()?;
        return Some(ModelValue::BitVec {
            value,
            width: bits.len() as u32,
        });
    }
    if let Some(hex) = atom.strip_prefix("#x") {
        let value = u64::from_str_radix(hex, 16).ok()?;
        return Some(ModelValue::BitVec {
            value,
            width: 4 * hex.len() as u32,
        });
    }
    atom.parse::<i64>().ok().map(ModelValue::Int)
}
