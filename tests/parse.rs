use kaleidoscope::{
    ast::{Expr, Item},
    lexer::Lexer,
    location::Location,
    parser::{ParseErr, Parser, PrecedenceTable, ANON_EXPR_NAME},
    result::{ErrorKind, Result},
    token::Token,
};

mod common;
use common::init_env_logger;

fn parse_all(src: &str) -> Vec<Result<Item>> {
    let table = PrecedenceTable::default();
    let mut lexer = Lexer::new(src.as_bytes());
    let mut items = vec![];
    loop {
        let mut parser = Parser::new(&mut lexer, &table);
        match parser.parse_top_level_item() {
            Ok(Some(item)) => items.push(Ok(item)),
            Ok(None) => return items,
            Err(err) => {
                items.push(Err(err));
                parser.skip_token().unwrap();
            }
        }
    }
}

#[test]
fn tokens_with_comments_and_keywords() {
    init_env_logger();
    let mut lexer = Lexer::new("def fib(x) # comment\n  if x < 3.5 then 1 else fib(x-1)".as_bytes());
    let mut tokens = vec![];
    loop {
        let (tok, _) = lexer.next_token().unwrap();
        if tok == Token::Eof {
            break;
        }
        tokens.push(tok.to_string());
    }
    assert_eq!(
        tokens,
        vec![
            "'def'",
            "identifier 'fib'",
            "'('",
            "identifier 'x'",
            "')'",
            "'if'",
            "identifier 'x'",
            "'<'",
            "number 3.5",
            "'then'",
            "number 1",
            "'else'",
            "identifier 'fib'",
            "'('",
            "identifier 'x'",
            "'-'",
            "number 1",
            "')'",
        ]
    );
}

#[test]
fn token_locations() {
    let mut lexer = Lexer::new("extern\n  sin(a)".as_bytes());
    assert_eq!(lexer.next_token().unwrap().1, Location::SrcPos { line: 1, column: 1 });
    assert_eq!(
        lexer.next_token().unwrap(),
        (
            Token::Identifier("sin".to_string()),
            Location::SrcPos { line: 2, column: 3 }
        )
    );
    // Peeking does not consume.
    assert_eq!(lexer.peek_token().unwrap().0, Token::Char('('));
    assert_eq!(lexer.next_token().unwrap().0, Token::Char('('));
}

#[test]
fn items_of_each_kind() {
    init_env_logger();
    let items: Vec<_> = parse_all("def f(a b) a*b; extern sin(x); f(1, 2);;")
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(items.len(), 3);

    let Item::Definition(f) = &items[0] else {
        panic!("expected a definition");
    };
    assert_eq!(f.proto.to_string(), "f(a b)");
    assert_eq!(f.body.to_string(), "(a * b)");

    let Item::Extern(sin) = &items[1] else {
        panic!("expected an extern");
    };
    assert_eq!(sin.name, "sin");
    assert_eq!(sin.arity(), 1);

    let Item::Expression(anon) = &items[2] else {
        panic!("expected an expression");
    };
    assert_eq!(anon.proto.name, ANON_EXPR_NAME);
    assert!(anon.proto.params.is_empty());
    assert_eq!(
        anon.body,
        Expr::Call {
            callee: "f".to_string(),
            args: vec![Expr::Number(1.0), Expr::Number(2.0)],
        }
    );
}

#[test]
fn control_flow_expressions() {
    let items = parse_all("if a < b then for i = 1, i < n, 2 in f(i) else (c)");
    let Ok(Item::Expression(anon)) = &items[0] else {
        panic!("expected an expression");
    };
    let Expr::If { cond, then, else_ } = &anon.body else {
        panic!("expected an if");
    };
    assert_eq!(cond.to_string(), "(a < b)");
    assert_eq!(**else_, Expr::Variable("c".to_string()));
    let Expr::For { var, step, .. } = &**then else {
        panic!("expected a for");
    };
    assert_eq!(var, "i");
    assert_eq!(step.as_deref(), Some(&Expr::Number(2.0)));
}

#[test]
fn for_without_step() {
    let items = parse_all("for i = 0, i < 3 in i");
    let Ok(Item::Expression(anon)) = &items[0] else {
        panic!("expected an expression");
    };
    assert!(matches!(&anon.body, Expr::For { step: None, .. }));
}

#[test]
fn error_messages() {
    let cases = [
        ("def 1", "Expected function name in prototype, found number 1"),
        ("def f x", "Expected '(' in prototype, found identifier 'x'"),
        ("def f(x, y) x", "Expected ')' in prototype, found ','"),
        ("(1 + 2", "expected ')', found end of input"),
        ("f(1 2)", "Expected ')' or ',' in argument list, found number 2"),
        ("if x 1 else 2", "expected then, found number 1"),
        ("if x then 1", "expected else, found end of input"),
        ("for 1", "expected identifier after for, found number 1"),
        ("for i 1", "expected '=' after for, found number 1"),
        ("for i = 1 in x", "expected ',' after for start value, found 'in'"),
        ("for i = 1, 2 x", "expected 'in' after for, found identifier 'x'"),
        (")", "unknown token when expecting an expression, found ')'"),
    ];
    for (src, message) in cases {
        let items = parse_all(src);
        let err = items
            .into_iter()
            .find_map(Result::err)
            .unwrap_or_else(|| panic!("{src} should not parse"));
        assert_eq!(err.kind, ErrorKind::Parse, "{src}");
        assert!(err.err.is::<ParseErr>(), "{src}");
        assert_eq!(err.err.to_string(), message, "{src}");
    }
}

#[test]
fn error_location_and_display() {
    let items = parse_all("def f(x)\n  if x 1 else 2");
    let Err(err) = &items[0] else {
        panic!("expected an error");
    };
    assert_eq!(err.loc, Location::SrcPos { line: 2, column: 8 });
    assert_eq!(
        err.to_string(),
        "[2:8] parse error: expected then, found number 1"
    );
}

#[test]
fn recovery_skips_one_token() {
    // `)` fails and is skipped, then parsing resumes with `4`.
    let items = parse_all(") 4");
    assert_eq!(items.len(), 2);
    assert!(items[0].is_err());
    let Ok(Item::Expression(anon)) = &items[1] else {
        panic!("expected an expression");
    };
    assert_eq!(anon.body, Expr::Number(4.0));
}

#[test]
fn malformed_numbers() {
    let items = parse_all("1.2.3");
    let Ok(Item::Expression(anon)) = &items[0] else {
        panic!("expected an expression");
    };
    assert_eq!(anon.body, Expr::Number(1.2));
}
