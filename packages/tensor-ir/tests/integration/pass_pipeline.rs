//! Pass adapters and pipeline ordering, gating and failure behavior

#[path = "../common/mod.rs"]
mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;
use tensor_ir::features::transform::{BoxError, PassContext, UnitId, UnitValue};
use tensor_ir::pipeline::SkipReason;
use tensor_ir::shared::models::{BindingBlock, Function, GlobalVar, IRModule};
use tensor_ir::{
    Pass, PassBuilder, PassError, PassInfo, PassPipelineRunner, PipelineConfig, Preset,
};

#[test]
fn test_identity_pass_keeps_module() {
    let module = fixture_n_functions(3);
    let passes = vec![identity_pass("Identity", 0, &[])];
    let out = PassPipelineRunner::default()
        .run(module.clone(), &passes, 0)
        .unwrap();
    assert_eq!(out, module);
}

#[test]
fn test_unnamed_closure_passes_run_together() {
    let module = fixture_n_functions(2);
    let passes = vec![
        PassBuilder::new(0).function(|f, _, _| Ok(f)),
        PassBuilder::new(0).function(|f, _, _| Ok(f)),
    ];
    let out = PassPipelineRunner::default()
        .run(module.clone(), &passes, 0)
        .unwrap();
    assert_eq!(out, module);
}

#[test]
fn test_requirements_order_execution() {
    let passes = vec![trail_pass("B", 0, &["A"]), trail_pass("A", 0, &[])];
    let out = PassPipelineRunner::default()
        .run(fixture_n_functions(1), &passes, 0)
        .unwrap();
    assert_eq!(trail_of(&out, "func_0"), vec!["A", "B"]);
}

#[test]
fn test_ties_break_by_level_then_input_order() {
    let passes = vec![
        trail_pass("Late", 2, &[]),
        trail_pass("Early", 0, &[]),
        trail_pass("Middle", 1, &[]),
        trail_pass("Early2", 0, &[]),
    ];
    let report = PassPipelineRunner::default()
        .run_with_report(fixture_n_functions(1), &passes, 2)
        .unwrap();
    assert_eq!(report.executed, vec!["Early", "Early2", "Middle", "Late"]);
    assert_eq!(trail_of(&report.module, "func_0"), report.executed);
}

#[test]
fn test_missing_requirement_fails() {
    let passes = vec![identity_pass("B", 0, &["Missing"])];
    let err = PassPipelineRunner::default()
        .run(fixture_n_functions(1), &passes, 0)
        .unwrap_err();
    assert!(matches!(
        err,
        PassError::Dependency { ref pass, ref missing } if pass == "B" && missing == "Missing"
    ));
}

#[test]
fn test_cycle_fails() {
    let passes = vec![identity_pass("A", 0, &["B"]), identity_pass("B", 0, &["A"])];
    let err = PassPipelineRunner::default()
        .run(fixture_n_functions(1), &passes, 0)
        .unwrap_err();
    match err {
        PassError::Cycle { members } => assert_eq!(members, vec!["A", "B"]),
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn test_failure_identifies_unit_and_aborts() {
    let failing = PassBuilder::new(0).name("Picky").function(|f, _, _| {
        if f.attrs.contains_key("reject") {
            return Err(BoxError::from("rejected"));
        }
        Ok(f)
    });

    let mut module = IRModule::new();
    module.insert(GlobalVar::reference("first"), fixture_calling(&[]));
    module.insert(
        GlobalVar::reference("second"),
        fixture_calling(&[]).with_attr("reject", true),
    );
    module.insert(
        GlobalVar::reference("third"),
        fixture_calling(&[]).with_attr("reject", true),
    );

    let passes = vec![trail_pass("Before", 0, &[]), failing];
    let err = PassPipelineRunner::default()
        .run(module, &passes, 0)
        .unwrap_err();
    match &err {
        PassError::Execution { pass, unit, source } => {
            assert_eq!(pass, "Picky");
            assert_eq!(unit, &UnitId::function("second"));
            assert_eq!(source.to_string(), "rejected");
        }
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[test]
fn test_parallel_and_sequential_agree() {
    let passes = vec![trail_pass("A", 0, &[]), trail_pass("B", 1, &["A"])];
    let sequential = PassPipelineRunner::new(PipelineConfig::preset(Preset::O1).build().unwrap())
        .run(fixture_n_functions(16), &passes, 1)
        .unwrap();
    let parallel = PassPipelineRunner::new(PipelineConfig::preset(Preset::O3).build().unwrap())
        .run(fixture_n_functions(16), &passes, 1)
        .unwrap();
    assert_eq!(sequential, parallel);
    assert_eq!(sequential.names(), fixture_n_functions(16).names());
}

#[test]
fn test_dataflow_block_pass_rewrites_in_place() {
    let mut module = IRModule::new();
    module.insert(GlobalVar::reference("f"), fixture_add_twice());
    module.insert(GlobalVar::reference("g"), fixture_calling(&[]));

    let drop_dead = PassBuilder::new(0)
        .name("DropDeadLocals")
        .traceable(true)
        .dataflow_block(|block: BindingBlock, _, _| {
            let keep = block
                .bindings
                .into_iter()
                .filter(|b| !b.is_dataflow_var())
                .collect();
            Ok(BindingBlock::dataflow(keep, block.output_vars))
        });
    let out = drop_dead.apply(module, &PassContext::new(0)).unwrap();

    let f = out.module.get("f").unwrap();
    assert_eq!(f.body.blocks[0].bindings.len(), 1);
    assert!(f.body.blocks[0].is_dataflow);
    assert_eq!(out.snapshots.len(), 1);
    assert_eq!(out.snapshots[0].unit, UnitId::block("f", 0));
    assert!(matches!(out.snapshots[0].before, UnitValue::DataflowBlock(_)));
    assert!(out.snapshots[0].changed());
}

#[test]
fn test_dataflow_block_pass_must_return_dataflow_block() {
    let mut module = IRModule::new();
    module.insert(GlobalVar::reference("f"), fixture_add_twice());
    let flatten = PassBuilder::new(0)
        .name("Flatten")
        .dataflow_block(|block: BindingBlock, _, _| Ok(BindingBlock::plain(block.bindings)));
    let err = flatten.apply(module, &PassContext::new(0)).unwrap_err();
    assert_eq!(err.unit(), Some(&UnitId::block("f", 0)));
}

struct Renamer {
    suffix: String,
}

impl Renamer {
    fn rename(
        &self,
        func: Function,
        _module: &IRModule,
        ctx: &PassContext,
    ) -> Result<Function, BoxError> {
        let target = ctx.setting("target").unwrap_or("none").to_string();
        Ok(func.with_attr("suffix", format!("{}-{}", self.suffix, target)))
    }
}

#[test]
fn test_stateful_pass_sees_configured_context() {
    let pass = Pass::function_from_stateful(
        PassInfo::new("Renamer", 1),
        Renamer {
            suffix: "v2".to_string(),
        },
        Renamer::rename,
    );
    let config = PipelineConfig::preset(Preset::O1)
        .setting("target", "llvm")
        .build()
        .unwrap();
    let report = PassPipelineRunner::new(config)
        .run_configured(fixture_n_functions(1), &[pass])
        .unwrap();
    let attr = report.module.get("func_0").unwrap().attrs.get("suffix").cloned();
    assert_eq!(attr, Some("v2-llvm".into()));
}

#[test]
fn test_config_file_drives_gating() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        b"version: 1\npreset: o1\noverrides:\n  disabled_passes: [Cleanup]\n  required_passes: [Heavy]\n  trace_all: true\n",
    )
    .unwrap();
    let config = PipelineConfig::from_yaml(file.path()).unwrap();

    let passes = vec![
        trail_pass("Heavy", 3, &[]),
        trail_pass("Cleanup", 0, &[]),
        trail_pass("AfterCleanup", 0, &["Cleanup"]),
        trail_pass("Light", 1, &[]),
        trail_pass("TooCostly", 2, &[]),
    ];
    let report = PassPipelineRunner::new(config)
        .run_configured(fixture_n_functions(1), &passes)
        .unwrap();

    assert_eq!(report.executed, vec!["Light", "Heavy"]);
    assert_eq!(report.was_skipped("Cleanup"), Some(&SkipReason::Disabled));
    assert!(matches!(
        report.was_skipped("AfterCleanup"),
        Some(SkipReason::DependencySkipped { dependency }) if dependency == "Cleanup"
    ));
    assert_eq!(
        report.was_skipped("TooCostly"),
        Some(&SkipReason::OptLevel { level: 2, ceiling: 1 })
    );
    // trace_all records every executed pass
    assert_eq!(report.traces.len(), 2);
    assert!(report.traces_to_json().unwrap().contains("func_0"));
}
