#[cfg(test)]
mod resolver_tests {
    use pretty_assertions::assert_eq;
    use rlox_tree as lox;

    use lox::ast::{Expr, Stmt};
    use lox::parser::Parser;
    use lox::resolver::{Locals, Resolver};
    use lox::scanner::Scanner;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);

        Parser::new(tokens).parse().expect("program should parse")
    }

    fn resolve(source: &str) -> Result<Locals, Vec<String>> {
        Resolver::new()
            .resolve(&parse(source))
            .map_err(|errors| errors.iter().map(|e| e.to_string()).collect())
    }

    fn resolve_errors(source: &str) -> Vec<String> {
        resolve(source).expect_err("program should not resolve")
    }

    #[test]
    fn test_local_distances() {
        let statements = parse("{ var a = 1; { print a; a = 2; } }");

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected block");
        };
        let Stmt::Block(inner) = &outer[1] else {
            panic!("expected inner block");
        };
        let Stmt::Print(Expr::Variable { id: read, .. }) = &inner[0] else {
            panic!("expected print of a variable");
        };
        let Stmt::Expression(Expr::Assign { id: write, .. }) = &inner[1] else {
            panic!("expected assignment");
        };

        let locals = Resolver::new().resolve(&statements).expect("should resolve");

        assert_eq!(locals.get(read), Some(&1));
        assert_eq!(locals.get(write), Some(&1));
        assert_eq!(locals.len(), 2);
    }

    #[test]
    fn test_globals_are_left_out_of_the_table() {
        let locals = resolve("var a = 1; print a; fun f() { return a; }").expect("should resolve");

        assert!(locals.is_empty());
    }

    #[test]
    fn test_duplicate_local_declaration() {
        assert_eq!(
            resolve_errors("{ var a = 1; var a = 2; }"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );
        assert_eq!(
            resolve_errors("fun f(a, a) {}"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_duplicate_global_declaration_is_allowed() {
        assert!(resolve("var a = 1; var a = 2;").is_ok());
    }

    #[test]
    fn test_return_outside_function() {
        assert_eq!(
            resolve_errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
    }

    #[test]
    fn test_return_value_from_initializer() {
        assert_eq!(
            resolve_errors("class A { init() { return 1; } }"),
            vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
        );

        // A bare return is fine.
        assert!(resolve("class A { init() { return; } }").is_ok());
    }

    #[test]
    fn test_this_and_super_outside_class() {
        assert_eq!(
            resolve_errors("print this;\nfun f() { super.g(); }"),
            vec![
                "[line 1] Error at 'this': Can't use 'this' outside of a class.",
                "[line 2] Error at 'super': Can't use 'super' outside of a class.",
            ]
        );
    }

    #[test]
    fn test_super_without_superclass() {
        assert_eq!(
            resolve_errors("class A { f() { super.f(); } }"),
            vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
        );
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        assert_eq!(
            resolve_errors("class A < A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_eq!(
            resolve_errors("{ var a = a; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_initializer_sees_enclosing_binding() {
        // Outer local.
        assert!(resolve("{ var a = 1; { var a = a + 1; } }").is_ok());

        // Global declared earlier in the same program.
        assert!(resolve("var a = 1; { var a = a + 1; }").is_ok());

        // Global known from an earlier run.
        let statements = parse("{ var a = a; }");
        let resolved = Resolver::new()
            .with_globals(vec!["a".to_string()])
            .resolve(&statements);

        assert!(resolved.is_ok());
    }

    #[test]
    fn test_initializer_read_resolves_one_scope_out() {
        let statements = parse("{ var a = 1; { var a = a; } }");

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected block");
        };
        let Stmt::Block(inner) = &outer[1] else {
            panic!("expected inner block");
        };
        let Stmt::Var {
            initializer: Some(Expr::Variable { id, .. }),
            ..
        } = &inner[0]
        else {
            panic!("expected var with variable initializer");
        };

        let locals = Resolver::new().resolve(&statements).expect("should resolve");

        assert_eq!(locals.get(id), Some(&1));
    }

    #[test]
    fn test_collects_all_errors() {
        let errors = resolve_errors("return;\n{ var x = 1; var x = 2; }\nprint this;");

        assert_eq!(errors.len(), 3);
    }
}
