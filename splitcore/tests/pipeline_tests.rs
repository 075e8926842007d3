use std::collections::{BTreeMap, BTreeSet};

use splitcore::{
    callgraph::{CallGraph, check_viability},
    config::{SplitConfig, Strategy},
    scheduler::{RunReport, Scheduler},
};
use splitir::{
    module::Module,
    store::{load, parse},
    symbol::{GlobalValue, Linkage, SymbolKind},
    verify::verify,
};

const CALLS: &str = r#"
source_filename = "calls.c"

@counter = internal global i32 0

define i32 @a(i32 %x) {
entry:
  %y = add i32 %x, 1
  ret i32 %y
}

define i32 @b(i32 %x) {
entry:
  %r = call i32 @a(i32 %x)
  ret i32 %r
}

define void @cc() {
entry:
  %old = load i32, ptr @counter
  %new = call i32 @a(i32 %old)
  store i32 %new, ptr @counter
  ret void
}
"#;

const TABLE: &str = r#"
source_filename = "table.c"

@counter = internal global i32 0
@.str = private constant [2 x i8] c"a\00"
@.str.1 = private constant [3 x i8] c"cc\00"
@table = constant [2 x { ptr, ptr }] [{ ptr, ptr } { ptr @.str, ptr @a }, { ptr, ptr } { ptr @.str.1, ptr @cc }]

define i32 @a(i32 %x) {
entry:
  %y = add i32 %x, 1
  ret i32 %y
}

define internal void @cc() {
entry:
  %old = load i32, ptr @counter
  %new = call i32 @a(i32 %old)
  store i32 %new, ptr @counter
  ret void
}
"#;

const STATE: &str = r#"
@limit = global i32 10
@cursor = global ptr @buffer
@buffer = global [4 x i32] zeroinitializer
@.name = private constant [5 x i8] c"fill\00"
@log = external global ptr
@config = externally_initialized global i32 0
@spare = global i32 7

define void @fill(i32 %v) {
entry:
  %p = load ptr, ptr @cursor
  store i32 %v, ptr %p
  ret void
}

define i32 @bound() {
entry:
  %l = load i32, ptr @limit
  %c = load i32, ptr @config
  ret i32 %l
}

define ptr @name() {
entry:
  ret ptr @.name
}
"#;

fn module(source: &str) -> Module {
    parse(source, Some("input.ir")).expect("test module must parse")
}

fn clone_config(dir: &tempfile::TempDir) -> SplitConfig {
    SplitConfig {
        output_dir: Some(dir.path().to_path_buf()),
        strategy: Strategy::Clone,
        ..Default::default()
    }
}

fn load_partitions(report: &RunReport) -> BTreeMap<String, Module> {
    report
        .partitions
        .iter()
        .map(|p| (p.root.clone(), load(&p.output).expect("partition must load")))
        .collect()
}

/// Every partition verifies, every exported definition appears exactly once,
/// and every declaration is defined by some partition unless it is listed in
/// `imported`.
fn assert_partitions_link(partitions: &BTreeMap<String, Module>, imported: &[&str]) {
    let mut definitions: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for (root, module) in partitions {
        verify(module).expect("partition must verify");
        for symbol in module.symbols() {
            let value = symbol.as_global_value();
            if !value.is_declaration() && !value.linkage().is_local() {
                definitions
                    .entry(value.name().to_string())
                    .or_default()
                    .push(root);
            }
        }
    }

    for (name, owners) in &definitions {
        assert_eq!(owners.len(), 1, "@{name} is defined by {owners:?}");
    }
    for module in partitions.values() {
        for symbol in module.symbols() {
            let value = symbol.as_global_value();
            if value.is_declaration() && !imported.contains(&value.name()) {
                assert!(
                    definitions.contains_key(value.name()),
                    "@{} is never defined",
                    value.name()
                );
            }
        }
    }
}

#[test]
fn viability_of_the_three_function_scenario() {
    let module = module(CALLS);
    let graph = CallGraph::build(&module);
    for name in ["a", "b", "cc"] {
        assert!(check_viability(&module, &graph, name).is_viable());
    }

    let mut internal = module.clone();
    internal.function_mut("a").unwrap().linkage = Linkage::Internal;
    let graph = CallGraph::build(&internal);
    assert!(check_viability(&internal, &graph, "a").is_viable());
    assert!(!check_viability(&internal, &graph, "b").is_viable());
    assert!(!check_viability(&internal, &graph, "cc").is_viable());
}

#[test]
fn three_function_split_links_back_together() {
    let dir = tempfile::tempdir().unwrap();
    let report = Scheduler::new(clone_config(&dir)).run(module(CALLS)).unwrap();
    assert!(report.is_success(), "{:?}", report.failures);

    let partitions = load_partitions(&report);
    assert_eq!(
        partitions.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["a", "b", "cc", "counter"]
    );
    assert_partitions_link(&partitions, &[]);

    let cc = &partitions["cc"];
    assert!(cc.global("counter").unwrap().is_declaration());
    assert!(cc.function("a").unwrap().is_declaration());
    assert!(partitions["counter"].global("counter").unwrap().has_initializer());

    let snapshot = load(report.snapshot.as_ref().unwrap()).unwrap();
    assert!(snapshot.global("counter").unwrap().is_declaration());
    assert!(
        snapshot
            .functions
            .iter()
            .all(|f| f.linkage == Linkage::External)
    );
}

#[test]
fn table_partition_reaches_both_handlers() {
    let dir = tempfile::tempdir().unwrap();
    let config = SplitConfig {
        keep_exported_orphans: true,
        ..clone_config(&dir)
    };
    let report = Scheduler::new(config).run(module(TABLE)).unwrap();
    assert!(report.is_success(), "{:?}", report.failures);

    let partitions = load_partitions(&report);
    let table = &partitions["table"];
    assert!(table.global("table").unwrap().has_initializer());
    assert!(table.global(".str").unwrap().has_initializer());
    assert!(table.function("a").unwrap().is_declaration());
    assert!(table.function("cc").unwrap().is_declaration());

    for handler in ["a", "cc"] {
        let partition = &partitions[handler];
        assert!(!partition.function(handler).unwrap().is_declaration());
        assert!(partition.global("table").is_none());
    }
    assert!(partitions["cc"].function("a").unwrap().is_declaration());

    assert_partitions_link(&partitions, &[]);
}

#[test]
fn partition_count_is_bounded_by_definitions_and_mutable_dependencies() {
    let module = module(STATE);
    let functions = module.defined_functions().count();
    let dir = tempfile::tempdir().unwrap();
    let report = Scheduler::new(clone_config(&dir)).run(module).unwrap();
    assert!(report.is_success(), "{:?}", report.failures);

    let globals: BTreeSet<&str> = report
        .partitions
        .iter()
        .filter(|p| p.kind == SymbolKind::Global)
        .map(|p| p.root.as_str())
        .collect();
    assert_eq!(globals, BTreeSet::from(["buffer", "cursor", "limit"]));
    assert!(report.partitions.len() <= functions + globals.len());
    assert_eq!(report.partitions.len(), functions + globals.len());

    let partitions = load_partitions(&report);
    assert!(partitions["name"].global(".name").unwrap().has_initializer());
    assert!(partitions["cursor"].global("buffer").unwrap().is_declaration());
    assert!(partitions["bound"].global("config").unwrap().is_declaration());
    assert_partitions_link(&partitions, &["config"]);
}

#[test]
fn exported_orphans_are_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let config = SplitConfig {
        keep_exported_orphans: true,
        dry_run: true,
        ..clone_config(&dir)
    };
    let report = Scheduler::new(config).run(module(STATE)).unwrap();

    let spare = report.partition("spare").unwrap();
    assert_eq!(spare.kind, SymbolKind::Global);
    assert!(report.partition("config").is_none());
    assert!(report.partition("log").is_none());
    assert_eq!(report.partitions.len(), 7);
}

#[cfg(unix)]
#[test]
fn failed_global_extraction_leaves_the_global_defined() {
    let dir = tempfile::tempdir().unwrap();
    let config = SplitConfig {
        strategy: Strategy::Extract,
        extractor: Some("false".to_string()),
        ..clone_config(&dir)
    };
    let report = Scheduler::new(config).run(module(CALLS)).unwrap();

    let failed: BTreeSet<&str> = report.failures.iter().map(|f| f.symbol.as_str()).collect();
    assert_eq!(failed, BTreeSet::from(["a", "b", "cc", "counter"]));

    let snapshot = load(report.snapshot.as_ref().unwrap()).unwrap();
    assert!(snapshot.global("counter").unwrap().has_initializer());
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = SplitConfig {
        dry_run: true,
        strategy: Strategy::Extract,
        extractor: Some("irextract".to_string()),
        ..clone_config(&dir)
    };
    let report = Scheduler::new(config).run(module(CALLS)).unwrap();

    assert_eq!(report.partitions.len(), 4);
    assert!(report.snapshot.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let snapshot = dir.path().join("_snapshot.ir");
    let cc = report.partition("cc").unwrap();
    assert_eq!(
        cc.command.as_deref().unwrap(),
        format!(
            "irextract {} --func=cc -o {}",
            snapshot.display(),
            dir.path().join("_cc.ir").display()
        )
    );
}

#[test]
fn parse_error_of_the_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.ir");
    std::fs::write(&input, "define i32 @f( {\n").unwrap();

    let error = Scheduler::new(clone_config(&dir))
        .run_file(&input)
        .unwrap_err();
    assert!(error.is_parse_error());
}
