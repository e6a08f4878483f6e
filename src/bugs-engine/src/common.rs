// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

use lazy_static::lazy_static;
use regex::Regex;

pub type Ident = String;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnresolvableLoopBound,
    UnresolvableIndex,
    NonIntegerIndex,
    OverwriteData,
    PartialObservation,
    RepeatedAssignment,
    LogicalStochasticConflict,
    UndefinedLinkFunction,
    UndefinedDistribution,
    UndefinedFunction,
    UndefinedVariable,
    MultipleDistributionsFor,
    CycleInDependencyGraph,
    ShapeMismatch,
    UnsupportedExpression,
    BadIdentifier,
    BadFunctionArgs,
    BadDistributionArgs,
    Generic,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            UnresolvableLoopBound => "unresolvable_loop_bound",
            UnresolvableIndex => "unresolvable_index",
            NonIntegerIndex => "non_integer_index",
            OverwriteData => "overwrite_data",
            PartialObservation => "partial_observation",
            RepeatedAssignment => "repeated_assignment",
            LogicalStochasticConflict => "logical_stochastic_conflict",
            UndefinedLinkFunction => "undefined_link_function",
            UndefinedDistribution => "undefined_distribution",
            UndefinedFunction => "undefined_function",
            UndefinedVariable => "undefined_variable",
            MultipleDistributionsFor => "multiple_distributions_for",
            CycleInDependencyGraph => "cycle_in_dependency_graph",
            ShapeMismatch => "shape_mismatch",
            UnsupportedExpression => "unsupported_expression",
            BadIdentifier => "bad_identifier",
            BadFunctionArgs => "bad_function_args",
            BadDistributionArgs => "bad_distribution_args",
            Generic => "generic",
        };

        write!(f, "{}", name)
    }
}

/// Error is the single failure channel of the compiler.  `details` carries
/// the pretty-printed offending AST fragment (or value) when one exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub code: ErrorCode,
    pub(crate) details: Option<String>,
}

impl Error {
    pub fn new(code: ErrorCode, details: Option<String>) -> Self {
        Error { code, details }
    }

    pub fn get_details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.details {
            Some(ref details) => write!(f, "CompileError{{{}: {}}}", self.code, details),
            None => write!(f, "CompileError{{{}}}", self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! comp_err {
    ($code:tt, $details:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(ErrorCode::$code, Some($details.to_string())))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(ErrorCode::$code, None))
    }};
}

/// canonicalize validates a BUGS identifier and returns its canonical
/// (trimmed) form.  BUGS names are letters, digits, dots and underscores,
/// starting with a letter.
pub fn canonicalize(name: &str) -> Result<Ident> {
    let name = name.trim();

    lazy_static! {
        static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9._]*$").unwrap();
    }

    if IDENT_RE.is_match(name) {
        Ok(name.to_owned())
    } else {
        comp_err!(BadIdentifier, name)
    }
}

#[test]
fn test_canonicalize() {
    assert_eq!("alpha", canonicalize("alpha").unwrap());
    assert_eq!("alpha.tau", canonicalize(" alpha.tau ").unwrap());
    assert_eq!("b_2", canonicalize("b_2").unwrap());
    assert!(canonicalize("2b").is_err());
    assert!(canonicalize("").is_err());
    assert!(canonicalize("a b").is_err());
}

#[test]
fn test_error_display() {
    let err = Error::new(ErrorCode::OverwriteData, Some("u[1] = 2".to_string()));
    assert_eq!("CompileError{overwrite_data: u[1] = 2}", format!("{}", err));
    let err = Error::new(ErrorCode::CycleInDependencyGraph, None);
    assert_eq!(
        "CompileError{cycle_in_dependency_graph}",
        format!("{}", err)
    );
}
