//! End-to-end construction scenarios for IRBuilder

#[path = "../common/mod.rs"]
mod common;

use common::*;
use pretty_assertions::assert_eq;
use tensor_ir::features::ir_builder::{BuilderError, FrameKind};
use tensor_ir::shared::models::{
    op, shape, Binding, BindingBlock, DataType, Expr, GlobalVar, PrimExpr, SeqExpr, Type, Var,
};
use tensor_ir::{BuildOutput, IRBuilder};

fn tensor2() -> (Option<Type>, Option<Vec<PrimExpr>>) {
    (Some(Type::tensor(2, DataType::Float32)), Some(shape([2i64, 3])))
}

#[test]
fn test_add_twice_dataflow_function() {
    let f = fixture_add_twice();

    assert_eq!(f.params.len(), 1);
    assert_eq!(f.body.blocks.len(), 1);
    let block = &f.body.blocks[0];
    assert!(block.is_dataflow);
    assert_eq!(block.bindings.len(), 2);

    let names: Vec<&str> = block.bound_vars().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["lv0", "gv0"]);
    assert!(block.bindings[0].is_dataflow_var());
    assert!(!block.bindings[1].is_dataflow_var());

    let outputs: Vec<&str> = block.output_vars.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(outputs, vec!["gv0"]);
    assert_eq!(f.body.body.as_var().map(|v| v.name.as_str()), Some("gv0"));

    // add of two [2, 3] float tensors keeps the shape
    let gv0 = f.body.body.as_var().unwrap();
    assert_eq!(gv0.ty, Some(Type::tensor(2, DataType::Float32)));
    assert_eq!(gv0.shape, Some(shape([2i64, 3])));
}

#[test]
fn test_nesting_depth_returns_after_matched_pairs() {
    let mut b = IRBuilder::new();
    assert_eq!(b.depth(), 0);
    b.open_module().unwrap();
    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    assert_eq!(b.depth(), 2);

    b.open_block(false).unwrap();
    assert_eq!(b.current().unwrap(), FrameKind::Block { is_dataflow: false });
    let y = b.emit(op::add(x.clone().into(), x.into()), false).unwrap();
    b.close_block().unwrap();
    assert_eq!(b.depth(), 2);

    b.set_return(y).unwrap();
    b.exit().unwrap();
    assert_eq!(b.depth(), 1);
    b.exit().unwrap();
    assert_eq!(b.depth(), 0);

    let err = b.exit().unwrap_err();
    assert!(matches!(err, BuilderError::FrameStack { op: "exit", .. }));
    assert!(matches!(b.finish().unwrap(), BuildOutput::Module(m) if m.contains("main")));
}

#[test]
fn test_illegal_nesting_is_rejected() {
    let mut b = IRBuilder::new();
    // Block needs a function
    assert!(matches!(
        b.open_block(false).unwrap_err(),
        BuilderError::FrameStack { .. }
    ));

    b.open_function("main").unwrap();
    // Module only on an empty stack
    assert!(b.open_module().is_err());
    // close_block with a Function on top
    assert!(b.close_block().is_err());
    assert_eq!(b.depth(), 1);
}

#[test]
fn test_binding_order_is_preserved() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    b.open_block(false).unwrap();
    let b1 = b.emit(op::add(x.clone().into(), x.clone().into()), false).unwrap();
    let b2 = b.emit(op::multiply(b1.clone().into(), x.clone().into()), false).unwrap();
    let b3 = b.emit_named("result", op::subtract(b2.clone().into(), b1.clone().into()), false).unwrap();
    b.set_return(b3.clone()).unwrap();
    let f = b.close_function().unwrap();

    let names: Vec<String> = f.body.blocks[0].bound_vars().map(|v| v.name.clone()).collect();
    assert_eq!(names, vec![b1.name, b2.name, b3.name]);
}

#[test]
fn test_output_requires_bound_var() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    b.open_block(true).unwrap();
    let lv = b.emit(op::add(x.clone().into(), x.clone().into()), true).unwrap();

    let stranger = Var::new("stranger");
    let err = b.output(&[stranger]).unwrap_err();
    assert_eq!(err, BuilderError::UndefinedOutput { var: "stranger".to_string() });

    // Parameters are visible but not bound in this block
    assert!(matches!(b.output(&[x]).unwrap_err(), BuilderError::UndefinedOutput { .. }));

    b.output(&[lv.clone()]).unwrap();
    b.close_block().unwrap();

    // The output is promoted as a non-dataflow var and usable outside
    b.open_block(false).unwrap();
    let y = b.emit(op::add(lv.clone().into(), lv.into()), false).unwrap();
    b.set_return(y).unwrap();
    let f = b.close_function().unwrap();
    assert!(f.body.blocks[0].output_vars.iter().all(|v| !v.is_dataflow));
}

#[test]
fn test_output_var_used_later_in_same_block() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    b.open_block(true).unwrap();
    let lv = b.emit(op::add(x.clone().into(), x.clone().into()), true).unwrap();
    b.output(&[lv.clone()]).unwrap();
    let gv = b.emit(op::add(lv.into(), x.into()), false).unwrap();
    b.close_block().unwrap();
    b.set_return(gv).unwrap();
    let f = b.close_function().unwrap();

    let block = &f.body.blocks[0];
    let def = block.bindings[0].var().unwrap();
    assert!(!def.is_dataflow);
    let used = match block.bindings[1].value() {
        Expr::Call(call) => call.args[0].as_var().unwrap(),
        other => panic!("expected a call, got {:?}", other),
    };
    assert_eq!(used, def);
}

#[test]
fn test_dataflow_vars_stay_local() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    b.open_block(true).unwrap();
    let lv = b.emit(op::add(x.clone().into(), x.into()), true).unwrap();
    b.close_block().unwrap();

    let err = b.set_return(lv).unwrap_err();
    assert!(matches!(err, BuilderError::UndefinedVar { ref name } if name == "lv0"));
}

#[test]
fn test_dataflow_var_outside_dataflow_block() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    b.open_block(false).unwrap();
    let err = b.emit(op::add(x.clone().into(), x.into()), true).unwrap_err();
    assert_eq!(err, BuilderError::NotInDataflowBlock { op: "emit" });
    assert!(matches!(
        b.output(&[]).unwrap_err(),
        BuilderError::NotInDataflowBlock { op: "output" }
    ));
}

#[test]
fn test_empty_block_and_missing_return() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    b.open_block(false).unwrap();
    assert_eq!(b.close_block().unwrap_err(), BuilderError::EmptyBlock);

    let err = b.close_function().unwrap_err();
    assert!(matches!(err, BuilderError::MissingReturn { ref function } if function == "main"));
}

#[test]
fn test_duplicate_named_binding() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    b.open_block(false).unwrap();
    let err = b.emit_named("x", op::add(x.clone().into(), x.into()), false).unwrap_err();
    assert!(matches!(err, BuilderError::DuplicateVar { ref name, .. } if name == "x"));
}

#[test]
fn test_if_then_else_binds_fresh_var() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let (ty, sh) = tensor2();
    let cond = b.arg("cond", Some(Type::tensor(0, DataType::Bool)), None).unwrap();
    let x = b.arg("x", ty, sh).unwrap();
    b.open_block(false).unwrap();

    b.open_if(cond).unwrap();
    b.open_then().unwrap();
    b.open_block(false).unwrap();
    b.emit(op::add(x.clone().into(), x.clone().into()), false).unwrap();
    b.close_then().unwrap();
    b.open_else().unwrap();
    b.open_block(false).unwrap();
    b.emit(op::multiply(x.clone().into(), x.clone().into()), false).unwrap();
    b.close_else().unwrap();
    let v = b.close_if().unwrap();

    assert_eq!(v.ty, Some(Type::tensor(2, DataType::Float32)));
    b.set_return(v.clone()).unwrap();
    let f = b.close_function().unwrap();

    let binding = f.body.blocks[0].bindings.last().unwrap();
    assert_eq!(binding.var(), Some(&v));
    match binding.value() {
        Expr::If { then_branch, else_branch, .. } => {
            assert!(matches!(then_branch.as_ref(), Expr::Seq(seq) if seq.blocks.len() == 1));
            assert!(matches!(else_branch.as_ref(), Expr::Seq(_)));
        }
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn test_else_before_then_and_branch_locals() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let c = b.arg("c", None, None).unwrap();
    b.open_block(false).unwrap();
    b.open_if(c.clone()).unwrap();
    assert!(matches!(b.open_else().unwrap_err(), BuilderError::FrameStack { op: "open_else", .. }));
    assert!(matches!(b.close_if().unwrap_err(), BuilderError::IncompleteBranch { .. }));

    b.open_if(c.clone()).unwrap();
    b.open_then().unwrap();
    b.open_block(false).unwrap();
    let local = b.emit(op::add(c.clone().into(), c.clone().into()), false).unwrap();
    b.close_then().unwrap();
    b.open_else().unwrap();
    // Then-branch vars are not visible in the else branch
    b.open_block(false).unwrap();
    let err = b.emit(op::add(local.clone().into(), c.into()), false).unwrap_err();
    assert!(matches!(err, BuilderError::UndefinedVar { .. }));
}

#[test]
fn test_module_resolves_forward_references() {
    let mut b = IRBuilder::new();
    b.open_module().unwrap();
    let helper = b.declare_function("helper").unwrap();

    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    b.open_block(false).unwrap();
    let y = b.emit(op::call_global(helper, vec![x.into()]), false).unwrap();
    b.set_return(y).unwrap();
    b.close_function().unwrap();

    b.define_function("helper", fixture_calling(&[])).unwrap();
    let module = b.close_module().unwrap();

    assert_eq!(module.names(), vec!["helper", "main"]);
    assert_eq!(module.get("main").unwrap().global_symbol(), Some("main"));
    let canonical = module.global_var("helper").unwrap().clone();
    let mut seen = Vec::new();
    module
        .get("main")
        .unwrap()
        .body
        .visit_globals(&mut |gv: &GlobalVar| seen.push(gv.clone()));
    assert_eq!(seen, vec![canonical]);
}

#[test]
fn test_module_rejects_unresolved_globals() {
    let mut b = IRBuilder::new();
    b.open_module().unwrap();
    b.declare_function("never_defined").unwrap();
    let err = b.close_module().unwrap_err();
    assert!(matches!(err, BuilderError::UnresolvedGlobal { ref name, .. } if name == "never_defined"));

    let mut b = IRBuilder::new();
    b.open_module().unwrap();
    b.define_function("main", fixture_calling(&["ghost"])).unwrap();
    let err = b.close_module().unwrap_err();
    assert!(matches!(err, BuilderError::UnresolvedGlobal { ref name, .. } if name == "ghost"));

    let mut b = IRBuilder::new();
    b.open_module().unwrap();
    b.define_function("main", fixture_calling(&[])).unwrap();
    assert!(matches!(
        b.define_function("main", fixture_calling(&[])).unwrap_err(),
        BuilderError::DuplicateGlobal { .. }
    ));
}

#[test]
fn test_match_shape_binds_symbols_consistently() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let x = b
        .arg("x", Some(Type::tensor(2, DataType::Float32)), Some(shape([4i64, 8])))
        .unwrap();
    let y = b
        .arg("y", Some(Type::tensor(1, DataType::Float32)), Some(shape([5i64])))
        .unwrap();
    b.open_block(false).unwrap();

    let matched = b
        .emit_match_shape(x.clone(), shape(["n", "m"]), true, false)
        .unwrap()
        .unwrap();
    assert_eq!(matched.shape, Some(shape(["n", "m"])));
    assert_eq!(matched.ty, Some(Type::tensor(2, DataType::Float32)));

    // `n` is already 4
    let err = b.emit_match_shape(y, shape(["n"]), false, false).unwrap_err();
    assert!(matches!(err, BuilderError::ShapeMismatch { .. }));

    // Rank mismatch
    assert!(b.emit_match_shape(x.clone(), shape(["n"]), false, false).is_err());

    // Unknown shapes defer to runtime
    let opaque = b.emit(op::call_extern("opaque", vec![x.into()]), false).unwrap();
    assert_eq!(b.emit_match_shape(opaque, shape(["k"]), false, false).unwrap(), None);
}

#[test]
fn test_annotate_refines_later_uses() {
    let mut b = IRBuilder::new();
    b.open_function("main").unwrap();
    let x = b.arg("x", None, None).unwrap();
    b.open_block(false).unwrap();
    let y = b.emit(op::call_extern("opaque", vec![x.into()]), false).unwrap();
    assert_eq!(y.ty, None);

    let refined = b
        .annotate_type_shape(&y, Some(Type::tensor(1, DataType::Int64)), Some(shape([3i64])))
        .unwrap();
    assert_eq!(refined.shape, Some(shape([3i64])));

    let z = b.emit(op::add(y.clone().into(), y.into()), false).unwrap();
    assert_eq!(z.shape, Some(shape([3i64])));
    assert_eq!(z.ty, Some(Type::tensor(1, DataType::Int64)));

    let err = b
        .annotate_type_shape(&refined, Some(Type::tensor(1, DataType::Float32)), None)
        .unwrap_err();
    assert!(matches!(err, BuilderError::TypeConflict { .. }));
}

#[test]
fn test_scoped_helpers_discard_on_error() {
    let mut b = IRBuilder::new();
    let result = b.with_function("broken", |b| {
        let x = b.arg("x", None, None)?;
        b.with_block(false, |b| {
            b.emit(op::add(x.clone().into(), Var::new("missing").into()), false)?;
            Ok(())
        })
    });
    assert!(matches!(result, Err(BuilderError::UndefinedVar { .. })));
    assert_eq!(b.depth(), 0);

    let module = b
        .with_module(|b| {
            b.with_function("main", |b| {
                let x = b.arg("x", None, None)?;
                b.with_block(false, |b| {
                    let y = b.emit(op::add(x.clone().into(), x.clone().into()), false)?;
                    b.set_return(y)
                })
            })?;
            Ok(())
        })
        .unwrap();
    assert_eq!(module.names(), vec!["main"]);
    assert_eq!(b.depth(), 0);
}

#[test]
fn test_guard_drop_discards_frames() {
    let mut b = IRBuilder::new();
    {
        let mut guard = b.function_scope("main").unwrap();
        guard.arg("x", None, None).unwrap();
        assert_eq!(guard.depth(), 1);
    }
    assert_eq!(b.depth(), 0);
    assert!(b.finish().is_err());
}

#[test]
fn test_plain_function_output() {
    let expected_body = SeqExpr::new(
        vec![BindingBlock::plain(vec![Binding::Var {
            var: Var::new("gv0"),
            value: op::call_extern("opaque", vec![]),
        }])],
        Var::new("gv0").into(),
    );

    let mut b = IRBuilder::new();
    b.open_function("solo").unwrap();
    b.open_block(false).unwrap();
    let v = b.emit(op::call_extern("opaque", vec![]), false).unwrap();
    b.set_return(v).unwrap();
    b.close_function().unwrap();

    match b.finish().unwrap() {
        BuildOutput::Function { name, function } => {
            assert_eq!(name, "solo");
            assert_eq!(function.body, expected_body);
        }
        other => panic!("expected function, got {other:?}"),
    }
}
