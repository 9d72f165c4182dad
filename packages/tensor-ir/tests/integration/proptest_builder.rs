//! Property-based tests for frame nesting, binding order and pass ordering

#[path = "../common/mod.rs"]
mod common;

use common::*;
use proptest::prelude::*;
use tensor_ir::shared::models::{op, Expr, Var};
use tensor_ir::{BuilderError, IRBuilder, PassPipelineRunner};

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Subtract,
    Multiply,
}

fn bin_op() -> impl Strategy<Value = BinOp> {
    prop_oneof![Just(BinOp::Add), Just(BinOp::Subtract), Just(BinOp::Multiply)]
}

fn apply(kind: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    match kind {
        BinOp::Add => op::add(lhs, rhs),
        BinOp::Subtract => op::subtract(lhs, rhs),
        BinOp::Multiply => op::multiply(lhs, rhs),
    }
}

fn emit_chain(b: &mut IRBuilder, x: &Var, n: usize) -> Var {
    let mut last = x.clone();
    for _ in 0..n {
        last = b.emit(op::add(last.into(), x.clone().into()), false).unwrap();
    }
    last
}

/// Nested conditionals `depth` deep, starting from a plain block on top
fn nested_if(b: &mut IRBuilder, c: &Var, x: &Var, depth: usize, n: usize) -> Var {
    if depth == 0 {
        return emit_chain(b, x, n);
    }
    let before = b.depth();
    b.open_if(c.clone()).unwrap();
    b.open_then().unwrap();
    b.open_block(false).unwrap();
    nested_if(b, c, x, depth - 1, n);
    b.close_then().unwrap();
    b.open_else().unwrap();
    b.open_block(false).unwrap();
    emit_chain(b, x, n);
    b.close_else().unwrap();
    let v = b.close_if().unwrap();
    assert_eq!(b.depth(), before);
    v
}

/// Pass specs: (name, opt level, requirements), requirements only on lower
/// indices so the graph is acyclic
fn pass_graph() -> impl Strategy<Value = Vec<(String, u8, Vec<String>)>> {
    (1usize..8)
        .prop_flat_map(|n| {
            (
                prop::collection::vec(0u8..4, n),
                prop::collection::vec((0..n, 0..n), 0..n * 2),
            )
        })
        .prop_map(|(levels, edges)| {
            levels
                .iter()
                .enumerate()
                .map(|(j, &level)| {
                    let required: Vec<String> = edges
                        .iter()
                        .filter(|&&(i, k)| k == j && i < k)
                        .map(|(i, _)| format!("P{i}"))
                        .collect();
                    (format!("P{j}"), level, required)
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

proptest! {
    /// Property: matched open/close pairs restore the depth, and one exit too many fails
    #[test]
    fn prop_nesting_restores_depth(depth in 0usize..5, n in 1usize..4) {
        let mut b = IRBuilder::new();
        b.open_function("main").unwrap();
        let c = b.arg("c", None, None).unwrap();
        let x = b.arg("x", None, None).unwrap();
        b.open_block(false).unwrap();
        let v = nested_if(&mut b, &c, &x, depth, n);
        prop_assert_eq!(b.depth(), 2);

        b.set_return(v).unwrap();
        b.close_function().unwrap();
        prop_assert_eq!(b.depth(), 0);
        let is_frame_error = matches!(b.exit(), Err(BuilderError::FrameStack { .. }));
        prop_assert!(is_frame_error);
    }

    /// Property: bindings appear in emission order
    #[test]
    fn prop_binding_order(ops in prop::collection::vec(bin_op(), 1..20)) {
        let mut b = IRBuilder::new();
        b.open_function("main").unwrap();
        let x = b.arg("x", None, None).unwrap();
        b.open_block(false).unwrap();
        let mut emitted = Vec::new();
        let mut last = x.clone();
        for kind in ops {
            last = b.emit(apply(kind, last.into(), x.clone().into()), false).unwrap();
            emitted.push(last.name.clone());
        }
        b.set_return(last).unwrap();
        let f = b.close_function().unwrap();

        let bound: Vec<String> = f.body.blocks[0].bound_vars().map(|v| v.name.clone()).collect();
        prop_assert_eq!(bound, emitted);
    }

    /// Property: requirements always run first, and the order is deterministic
    #[test]
    fn prop_pipeline_order_respects_requirements(specs in pass_graph()) {
        let passes: Vec<_> = specs
            .iter()
            .map(|(name, level, required)| {
                let required: Vec<&str> = required.iter().map(String::as_str).collect();
                trail_pass(name, *level, &required)
            })
            .collect();

        let runner = PassPipelineRunner::default();
        let first = runner.run_with_report(fixture_n_functions(2), &passes, 3).unwrap();
        let second = runner.run_with_report(fixture_n_functions(2), &passes, 3).unwrap();
        prop_assert_eq!(&first.executed, &second.executed);
        prop_assert_eq!(first.executed.len(), specs.len());

        let position = |name: &str| first.executed.iter().position(|p| p == name);
        for (name, _, required) in &specs {
            for dep in required {
                prop_assert!(position(dep) < position(name));
            }
        }
        prop_assert_eq!(trail_of(&first.module, "func_1"), first.executed.clone());
    }
}
