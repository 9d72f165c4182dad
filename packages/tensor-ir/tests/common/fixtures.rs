//! IR and pass fixtures

use tensor_ir::features::transform::{Pass, PassBuilder};
use tensor_ir::shared::models::{
    op, shape, DataType, Function, GlobalVar, IRModule, SeqExpr, Type, Var,
};
use tensor_ir::IRBuilder;

/// `f(x)` with `lv0 = add(x, x)` and output `gv0 = add(x, x)` in one
/// dataflow block, returning `gv0`
pub fn fixture_add_twice() -> Function {
    let mut b = IRBuilder::new();
    b.open_function("f").unwrap();
    let x = b
        .arg("x", Some(Type::tensor(2, DataType::Float32)), Some(shape([2i64, 3])))
        .unwrap();
    b.open_block(true).unwrap();
    b.emit(op::add(x.clone().into(), x.clone().into()), true).unwrap();
    let gv0 = b.emit(op::add(x.clone().into(), x.into()), false).unwrap();
    b.output(&[gv0.clone()]).unwrap();
    b.close_block().unwrap();
    b.set_return(gv0).unwrap();
    b.close_function().unwrap()
}

/// Identity function `name(x) = x`, calling `callees` in a chain
pub fn fixture_calling(callees: &[&str]) -> Function {
    let x = Var::new("x");
    let mut body: tensor_ir::Expr = x.clone().into();
    for callee in callees {
        body = op::call_global(GlobalVar::reference(*callee), vec![body]);
    }
    Function::new(vec![x], SeqExpr::new(vec![], body))
}

/// Module of `n` independent functions `func_0 .. func_{n-1}`
pub fn fixture_n_functions(n: usize) -> IRModule {
    let mut module = IRModule::new();
    for i in 0..n {
        module.insert(GlobalVar::reference(format!("func_{i}")), fixture_calling(&[]));
    }
    module
}

/// Function pass returning its input unchanged
pub fn identity_pass(name: &str, opt_level: u8, required: &[&str]) -> Pass {
    PassBuilder::new(opt_level)
        .name(name)
        .required(required.iter().copied())
        .function(|f, _, _| Ok(f))
}

/// Function pass appending its name to the `trail` attribute
pub fn trail_pass(name: &str, opt_level: u8, required: &[&str]) -> Pass {
    let tag = name.to_string();
    PassBuilder::new(opt_level)
        .name(name)
        .required(required.iter().copied())
        .function(move |f, _, _| {
            let trail = match f.attrs.get("trail") {
                Some(tensor_ir::shared::models::AttrValue::Str(s)) => format!("{s},{tag}"),
                _ => tag.clone(),
            };
            Ok(f.with_attr("trail", trail))
        })
}

/// Trail recorded on `function` by `trail_pass`
pub fn trail_of(module: &IRModule, function: &str) -> Vec<String> {
    match module.get(function).and_then(|f| f.attrs.get("trail")) {
        Some(tensor_ir::shared::models::AttrValue::Str(s)) => {
            s.split(',').map(str::to_string).collect()
        }
        _ => Vec::new(),
    }
}
