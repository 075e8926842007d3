use splitir::{
    extract::{ExtractSelection, extract},
    instructions::Instruction,
    module::Module,
    parser::extend_module_from_string,
    store::{load, parse, write_snapshot},
    symbol::{GlobalValue, Linkage, Visibility},
    types::Type,
    utils::Error,
    verify::{VerifyIssue, verify, verify_issues},
};

const TABLE_SOURCE: &str = r#"
; dispatch table over two handlers
source_filename = "table.c"
target datalayout = "e-m:e-i64:64"
target triple = "x86_64-unknown-linux-gnu"
module asm ".globl marker"

@counter = internal global i32 0, source "table.c"
@.str = private constant [2 x i8] c"a\00"
@.str.1 = private constant [3 x i8] c"cc\00"
@table = constant [2 x { ptr, ptr }] [{ ptr, ptr } { ptr @.str, ptr @a }, { ptr, ptr } { ptr @.str.1, ptr @cc }]
@limit = external global i32

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

define internal void @cc() source "table.c" {
entry:
  %old = load i32, ptr @counter
  %cmp = icmp slt i32 %old, 10 ; bounded
  br i1 %cmp, label %bump, label %done

bump:
  %new = add i32 %old, 1
  store i32 %new, ptr @counter
  %ignored = call i32 @a(i32 %new)
  br label %done

done:
  %v = phi i32 [ %old, %entry ], [ %new, %bump ]
  ret void
}

declare i32 @printf(ptr, ...)
"#;

fn table_module() -> Module {
    parse(TABLE_SOURCE, Some("table.ir")).expect("failed to parse sample module")
}

#[test]
fn parses_metadata_and_symbols_in_declaration_order() {
    let module = table_module();

    assert_eq!(module.name.as_deref(), Some("table.c"));
    assert_eq!(module.target_triple.as_deref(), Some("x86_64-unknown-linux-gnu"));
    assert_eq!(module.inline_asm, vec![".globl marker".to_string()]);

    let globals: Vec<_> = module.globals.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(globals, vec!["counter", ".str", ".str.1", "table", "limit"]);
    let functions: Vec<_> = module.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(functions, vec!["a", "b", "cc", "printf"]);

    let counter = module.global("counter").unwrap();
    assert_eq!(counter.linkage, Linkage::Internal);
    assert!(!counter.is_constant);
    assert_eq!(counter.source.as_deref(), Some("table.c"));

    assert!(module.global("limit").unwrap().is_declaration());
    let printf = module.function("printf").unwrap();
    assert!(printf.is_declaration() && printf.variadic);
    assert_eq!(printf.params[0].ty, Type::Ptr);

    let cc = module.function("cc").unwrap();
    assert_eq!(cc.blocks.len(), 3);
    assert_eq!(cc.join_names().collect::<Vec<_>>(), vec!["v"]);
}

#[test]
fn printed_module_parses_back_to_the_same_module() {
    let module = table_module();
    let printed = module.to_string();
    let reparsed = parse(&printed, Some("printed.ir")).expect("printer output must parse");
    assert_eq!(module, reparsed);
}

#[test]
fn sample_module_verifies() {
    let module = table_module();
    assert_eq!(verify_issues(&module), Vec::new());
    assert!(verify(&module).is_ok());
}

#[test]
fn unknown_local_and_label_are_reported() {
    let source = r#"
define i32 @broken() {
entry:
  %x = add i32 %missing, 1
  br label %nowhere
}
"#;
    let module = parse(source, None).unwrap();
    let issues = verify_issues(&module);
    assert!(issues.contains(&VerifyIssue::UnresolvedLocal {
        function: "broken".to_string(),
        name: "missing".to_string(),
    }));
    assert!(issues.contains(&VerifyIssue::UnknownLabel {
        function: "broken".to_string(),
        label: "nowhere".to_string(),
    }));
}

#[test]
fn extracting_a_caller_declares_its_callee() {
    let module = table_module();
    let part = extract(&module, &ExtractSelection::new().with_function("b")).unwrap();

    assert!(part.globals.is_empty());
    assert!(!part.function("b").unwrap().is_declaration());
    let a = part.function("a").unwrap();
    assert!(a.is_declaration());
    assert_eq!(a.linkage, Linkage::External);
    assert!(part.function("cc").is_none());
    assert_eq!(part.target_triple, module.target_triple);
    assert!(verify(&part).is_ok());
}

#[test]
fn extracting_a_table_keeps_selected_data_and_declares_functions() {
    let module = table_module();
    let selection = ExtractSelection::new()
        .with_global("table")
        .with_global(".str")
        .with_global(".str.1");
    let part = extract(&module, &selection).unwrap();

    assert!(part.global("table").unwrap().has_initializer());
    assert!(part.global(".str").unwrap().has_initializer());
    assert!(part.function("a").unwrap().is_declaration());
    assert!(part.function("cc").unwrap().is_declaration());
    assert!(part.global("counter").is_none());
    assert!(verify(&part).is_ok());
}

#[test]
fn extracting_an_unknown_symbol_fails() {
    let module = table_module();
    let error = extract(&module, &ExtractSelection::new().with_function("table")).unwrap_err();
    assert!(error.is_unknown_symbol());
}

#[test]
fn snapshot_written_to_disk_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("_snapshot.ir");

    let mut module = table_module();
    module.function_mut("cc").unwrap().visibility = Visibility::Hidden;
    module.function_mut("cc").unwrap().linkage = Linkage::External;
    write_snapshot(&module, &path).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded, module);
}

#[test]
fn parse_errors_carry_file_and_span() {
    let source = "@g = global i32 0\ndefine i32 @f( {\n";
    let mut module = Module::default();
    let error = extend_module_from_string(&mut module, source, Some("bad.ir")).unwrap_err();

    let Error::ParserErrors { file, errors } = error else {
        panic!("expected parser errors, got {error:?}");
    };
    assert_eq!(file.as_deref(), Some("bad.ir"));
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|e| e.file.as_deref() == Some("bad.ir")));
    assert!(errors[0].start >= 18);
}

#[test]
fn call_operands_expose_direct_callee() {
    let module = table_module();
    let callees: Vec<_> = module
        .function("cc")
        .unwrap()
        .instructions()
        .filter_map(|instr| instr.try_as_call_ref())
        .filter_map(|call| call.direct_callee())
        .collect();
    assert_eq!(callees, vec!["a"]);

    let stores = module
        .function("cc")
        .unwrap()
        .instructions()
        .filter(|instr| instr.is_store())
        .flat_map(|instr| instr.operands())
        .filter_map(|operand| operand.as_symbol())
        .collect::<Vec<_>>();
    assert_eq!(stores, vec!["counter"]);
}
