// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property tests for the partial evaluator: constant folding agrees with a
//! direct interpreter, and folding is idempotent.

use proptest::prelude::*;

use crate::ast::Expr;
use crate::builtins::FunctionRegistry;
use crate::env::Env;
use crate::eval::{eval, Partial};
use crate::value::Scalar;

fn arb_arith_expr() -> impl Strategy<Value = Expr> {
    let leaf = (-5i64..=5).prop_map(Expr::Int);
    leaf.prop_recursive(4, 32, 2, |inner| {
        (
            prop_oneof![Just("+"), Just("-"), Just("*")],
            inner.clone(),
            inner,
        )
            .prop_map(|(op, a, b)| Expr::Call(op.to_owned(), vec![a, b]))
    })
}

/// A reference interpreter for the integer fragment; bounded depth and leaf
/// magnitude keep every intermediate inside i64.
fn reference(expr: &Expr) -> i64 {
    match expr {
        Expr::Int(n) => *n,
        Expr::Call(op, args) => {
            let a = reference(&args[0]);
            let b = reference(&args[1]);
            match op.as_str() {
                "+" => a + b,
                "-" => a - b,
                "*" => a * b,
                _ => unreachable!(),
            }
        }
        _ => unreachable!(),
    }
}

proptest! {
    #[test]
    fn folding_matches_the_reference_interpreter(expr in arb_arith_expr()) {
        let env = Env::default();
        let reg = FunctionRegistry::new();
        let folded = eval(&expr, &env, &reg).unwrap();
        prop_assert_eq!(Partial::Const(Scalar::Int(reference(&expr))), folded);
    }

    #[test]
    fn folding_is_idempotent(expr in arb_arith_expr()) {
        let env = Env::default();
        let reg = FunctionRegistry::new();
        let once = eval(&expr, &env, &reg).unwrap();
        let again = eval(&once.clone().into_expr(), &env, &reg).unwrap();
        prop_assert_eq!(once, again);
    }
}
