use splitir::{module::Module, store::parse};

/// Three functions: `a` is a leaf, `b` calls `a`, `cc` calls `a` and bumps a
/// module-private counter.
pub const CALLS_SOURCE: &str = r#"
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

pub fn parse_module(source: &str) -> Module {
    parse(source, Some("test.ir")).expect("test module must parse")
}
