use expect_test::expect;
use kaleidoscope::{
    ast::{Item, Prototype},
    codegen::{CodeGen, CodegenErr, PrototypeRegistry},
    lexer::Lexer,
    module::Module,
    parser::{Parser, PrecedenceTable},
    result::{ErrorKind, Result},
};

mod common;
use common::init_env_logger;

/// Generate IR for every item of `src` into one module.
fn codegen_all(src: &str) -> (Module, Vec<Result<()>>) {
    init_env_logger();
    let table = PrecedenceTable::default();
    let mut lexer = Lexer::new(src.as_bytes());
    let mut module = Module::new("test");
    let mut protos = PrototypeRegistry::new();
    let mut results = vec![];
    while let Some(item) = Parser::new(&mut lexer, &table)
        .parse_top_level_item()
        .unwrap()
    {
        let mut codegen = CodeGen::new(&mut module, &mut protos);
        let result = match item {
            Item::Definition(f) | Item::Expression(f) => codegen.codegen_function(&f).map(|_| ()),
            Item::Extern(proto) => codegen.codegen_prototype(&proto).map(|_| ()),
        };
        results.push(result);
    }
    (module, results)
}

fn codegen_ok(src: &str) -> Module {
    let (module, results) = codegen_all(src);
    for result in results {
        if let Err(err) = result {
            panic!("{}", err);
        }
    }
    module
}

#[test]
fn arithmetic() {
    let module = codegen_ok("def foo(x y) x+y*2");
    expect![[r#"
        ; ModuleID = 'test'

        define double @foo(double %x, double %y) {
        entry:
          %multmp = fmul double %y, 2.000000e+00
          %addtmp = fadd double %x, %multmp
          ret double %addtmp
        }
    "#]]
    .assert_eq(&module.dump());
}

#[test]
fn comparison_and_if() {
    let module = codegen_ok("def f(x) if x < 3 then 1 else x*2");
    expect![[r#"
        ; ModuleID = 'test'

        define double @f(double %x) {
        entry:
          %cmptmp = fcmp ult double %x, 3.000000e+00
          %booltmp = uitofp i1 %cmptmp to double
          %ifcond = fcmp one double %booltmp, 0.000000e+00
          br i1 %ifcond, label %then, label %else

        then:
          br label %ifcont

        else:
          %multmp = fmul double %x, 2.000000e+00
          br label %ifcont

        ifcont:
          %iftmp = phi double [ 1.000000e+00, %then ], [ %multmp, %else ]
          ret double %iftmp
        }
    "#]]
    .assert_eq(&module.dump());
}

#[test]
fn for_loop_and_extern_call() {
    let module = codegen_ok("extern count(x); def repeat(n) for i = 0, i < n in count(i)");
    expect![[r#"
        ; ModuleID = 'test'

        declare double @count(double)

        define double @repeat(double %n) {
        entry:
          br label %loop

        loop:
          %i = phi double [ 0.000000e+00, %entry ], [ %nextvar, %loop ]
          %calltmp = call double @count(double %i)
          %nextvar = fadd double %i, 1.000000e+00
          %cmptmp = fcmp ult double %i, %n
          %booltmp = uitofp i1 %cmptmp to double
          %loopcond = fcmp one double %booltmp, 0.000000e+00
          br i1 %loopcond, label %loop, label %afterloop

        afterloop:
          ret double 0.000000e+00
        }
    "#]]
    .assert_eq(&module.dump());
}

#[test]
fn nested_if_rereads_the_current_block() {
    // The phi of the outer `if` must name the block where the inner one ended.
    let module = codegen_ok("def g(a b) if a then (if b then 1 else 2) else 3");
    expect![[r#"
        ; ModuleID = 'test'

        define double @g(double %a, double %b) {
        entry:
          %ifcond = fcmp one double %a, 0.000000e+00
          br i1 %ifcond, label %then, label %else1

        then:
          %ifcond1 = fcmp one double %b, 0.000000e+00
          br i1 %ifcond1, label %then1, label %else

        then1:
          br label %ifcont

        else:
          br label %ifcont

        ifcont:
          %iftmp = phi double [ 1.000000e+00, %then1 ], [ 2.000000e+00, %else ]
          br label %ifcont1

        else1:
          br label %ifcont1

        ifcont1:
          %iftmp1 = phi double [ %iftmp, %ifcont ], [ 3.000000e+00, %else1 ]
          ret double %iftmp1
        }
    "#]]
    .assert_eq(&module.dump());
}

#[test]
fn calls_declare_registered_prototypes() {
    init_env_logger();
    // A fresh unit that calls a function defined in an earlier one.
    let mut protos = PrototypeRegistry::new();
    protos.insert(Prototype::new("twice", vec!["x".to_string()]));
    let mut module = Module::new("next");
    let table = PrecedenceTable::default();
    let mut lexer = Lexer::new("twice(4)".as_bytes());
    let Some(Item::Expression(f)) = Parser::new(&mut lexer, &table)
        .parse_top_level_item()
        .unwrap()
    else {
        panic!("expected an expression");
    };
    CodeGen::new(&mut module, &mut protos)
        .codegen_function(&f)
        .unwrap();
    expect![[r#"
        ; ModuleID = 'next'

        define double @__anon_expr() {
        entry:
          %calltmp = call double @twice(double 4.000000e+00)
          ret double %calltmp
        }

        declare double @twice(double)
    "#]]
    .assert_eq(&module.dump());
}

fn codegen_error(src: &str) -> (Module, kaleidoscope::result::Error) {
    let (module, results) = codegen_all(src);
    let err = results
        .into_iter()
        .find_map(Result::err)
        .unwrap_or_else(|| panic!("{src} should fail"));
    assert_eq!(err.kind, ErrorKind::Codegen);
    assert!(err.err.is::<CodegenErr>());
    (module, err)
}

#[test]
fn unknown_variable() {
    let (module, err) = codegen_error("def f(x) y");
    assert_eq!(err.err.to_string(), "unknown variable name y");
    // The failed function is erased.
    assert!(module.get_function("f").is_none());
}

#[test]
fn unknown_function() {
    let (_, err) = codegen_error("g(1)");
    assert_eq!(err.err.to_string(), "Unknown function referenced: g");
}

#[test]
fn redefinition_in_one_unit() {
    let (module, err) = codegen_error("def f(x) x; def f(x) x+1");
    assert_eq!(err.err.to_string(), "Function cannot be redefined: f");
    // The first definition survives.
    let f = module.get_function("f").unwrap();
    assert!(!module.func(f).is_declaration());
}

#[test]
fn extern_then_definition() {
    let module = codegen_ok("extern f(a); def f(x) x+1");
    let f = module.get_function("f").unwrap();
    assert_eq!(module.func(f).params(), ["x".to_string()]);
    assert!(!module.func(f).is_declaration());
}

#[test]
fn definition_disagreeing_with_extern() {
    let (module, err) = codegen_error("extern f(a b); def f(x) x");
    assert!(matches!(
        err.err.downcast_ref::<CodegenErr>(),
        Some(CodegenErr::SignatureMismatch {
            expected: 2,
            found: 1,
            ..
        })
    ));
    // The declaration is kept.
    let f = module.get_function("f").unwrap();
    assert!(module.func(f).is_declaration());
}

#[test]
fn conflicting_extern_is_rejected() {
    let (module, err) = codegen_error("extern f(a); extern f(a b)");
    assert!(matches!(
        err.err.downcast_ref::<CodegenErr>(),
        Some(CodegenErr::SignatureMismatch {
            expected: 1,
            found: 2,
            ..
        })
    ));
    let f = module.get_function("f").unwrap();
    assert_eq!(module.func(f).arity(), 1);
}

#[test]
fn failed_definition_keeps_the_earlier_prototype() {
    init_env_logger();
    let mut module = Module::new("test");
    let mut protos = PrototypeRegistry::new();
    let table = PrecedenceTable::default();
    let mut lexer = Lexer::new("extern f(a); def f(x y) x".as_bytes());
    let mut parse = || {
        Parser::new(&mut lexer, &table)
            .parse_top_level_item()
            .unwrap()
            .unwrap()
    };
    let (Item::Extern(proto), Item::Definition(function)) = (parse(), parse()) else {
        panic!("expected an extern and a definition");
    };
    let mut codegen = CodeGen::new(&mut module, &mut protos);
    codegen.codegen_prototype(&proto).unwrap();
    assert!(codegen.codegen_function(&function).is_err());
    assert_eq!(protos.get("f").unwrap().params, vec!["a".to_string()]);
}

#[test]
fn arity_is_checked_before_arguments() {
    // Would fail with an unknown variable if the argument were generated first.
    let (_, err) = codegen_error("extern sin(x); sin(nope, 2)");
    assert_eq!(
        err.err.to_string(),
        "Incorrect # arguments passed to sin: expected 1, got 2"
    );
}

#[test]
fn scope_is_reset_between_functions() {
    let (module, err) = codegen_error("def f(x) x; def g(y) x");
    assert_eq!(err.err.to_string(), "unknown variable name x");
    assert!(module.get_function("f").is_some());
    assert!(module.get_function("g").is_none());
}

#[test]
fn loop_variable_is_restored() {
    let (_, err) = codegen_error("def f(x) (for i = 0, i < x in i) + i");
    assert_eq!(err.err.to_string(), "unknown variable name i");
    let module = codegen_ok("def g(i) (for i = 0, i < 3 in i) + i");
    assert!(module.get_function("g").is_some());
}

#[test]
fn invalid_operator() {
    init_env_logger();
    // `%` parses once it has a precedence, but has no code generation.
    let mut table = PrecedenceTable::default();
    table.install('%', 40);
    let mut lexer = Lexer::new("def f(a b) a % b".as_bytes());
    let Some(Item::Definition(f)) = Parser::new(&mut lexer, &table)
        .parse_top_level_item()
        .unwrap()
    else {
        panic!("expected a definition");
    };
    let mut module = Module::new("test");
    let mut protos = PrototypeRegistry::new();
    let err = CodeGen::new(&mut module, &mut protos)
        .codegen_function(&f)
        .unwrap_err();
    assert_eq!(err.err.to_string(), "invalid binary operator %");
    assert!(module.is_empty());
}
