//! Module-level collaborator passes: parameter binding, reachability, global resolution

#[path = "../common/mod.rs"]
mod common;

use common::*;
use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;
use tensor_ir::features::transform::PassContext;
use tensor_ir::shared::models::{op, shape, Constant, DataType, Expr, GlobalVar, IRModule, Type};
use tensor_ir::{
    bind_params, remove_unused_functions, resolve_globals, IRBuilder, PassError,
    PassPipelineRunner,
};

fn weight() -> Constant {
    Constant::new(DataType::Float32, vec![2], vec![0.5, 1.5]).unwrap()
}

/// main(x, w) = helper(x * w); `orphan` also calls helper but nothing calls it
fn module_with_orphan() -> IRModule {
    let mut b = IRBuilder::new();
    b.open_module().unwrap();
    let helper = b.define_function("helper", fixture_calling(&[])).unwrap();
    b.define_function("orphan", fixture_calling(&["helper"])).unwrap();

    b.open_function("main").unwrap();
    let x = b
        .arg("x", Some(Type::tensor(1, DataType::Float32)), Some(shape([2i64])))
        .unwrap();
    let w = b
        .arg("w", Some(Type::tensor(1, DataType::Float32)), Some(shape([2i64])))
        .unwrap();
    b.open_block(false).unwrap();
    let y = b.emit(op::multiply(x.into(), w.into()), false).unwrap();
    let z = b.emit(op::call_global(helper, vec![y.into()]), false).unwrap();
    b.set_return(z).unwrap();
    b.close_function().unwrap();
    b.close_module().unwrap()
}

#[test]
fn test_bind_then_prune_unreachable() {
    let mut params = FxHashMap::default();
    params.insert("w".to_string(), weight());

    let passes = vec![
        bind_params("main", params),
        remove_unused_functions(Some(vec!["main".to_string()])),
    ];
    let out = PassPipelineRunner::default()
        .run(module_with_orphan(), &passes, 0)
        .unwrap();

    assert_eq!(out.names(), vec!["helper", "main"]);
    let main = out.get("main").unwrap();
    let params: Vec<&str> = main.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["x"]);
    assert_eq!(
        main.body.blocks[0].bindings[0].value(),
        &op::multiply(Expr::Var(main.params[0].clone()), Expr::Constant(weight()))
    );
}

#[test]
fn test_bind_params_rejects_wrong_shape() {
    let mut params = FxHashMap::default();
    params.insert(
        "w".to_string(),
        Constant::new(DataType::Float32, vec![3], vec![1.0, 2.0, 3.0]).unwrap(),
    );
    let err = bind_params("main", params)
        .apply(module_with_orphan(), &PassContext::default())
        .unwrap_err();
    assert!(matches!(err, PassError::ParamBinding { ref param, .. } if param == "w"));
}

#[test]
fn test_default_entry_is_main() {
    let out = remove_unused_functions(None)
        .apply(module_with_orphan(), &PassContext::default())
        .unwrap();
    assert!(!out.module.contains("orphan"));
    assert!(out.module.contains("helper"));
}

#[test]
fn test_resolve_globals_rebinds_by_name() {
    let mut module = IRModule::new();
    module.insert(GlobalVar::reference("leaf"), fixture_calling(&[]));
    module.insert(GlobalVar::reference("root"), fixture_calling(&["leaf"]));

    let out = resolve_globals()
        .apply(module, &PassContext::default())
        .unwrap()
        .module;
    let canonical = out.global_var("leaf").unwrap().clone();
    let mut seen = Vec::new();
    out.get("root")
        .unwrap()
        .body
        .visit_globals(&mut |gv: &GlobalVar| seen.push(gv.clone()));
    assert_eq!(seen, vec![canonical]);
}

#[test]
fn test_pruning_exposes_dangling_reference() {
    // main and orphan still call the removed helper
    let mut module = module_with_orphan();
    module.remove("helper");
    let err = resolve_globals()
        .apply(module, &PassContext::default())
        .unwrap_err();
    assert!(matches!(err, PassError::UnresolvedGlobal { ref name, .. } if name == "helper"));
}
