#[cfg(test)]
mod parser_tests {
    use pretty_assertions::assert_eq;
    use rlox_tree as lox;

    use lox::ast::{Expr, Stmt};
    use lox::ast_printer::AstPrinter;
    use lox::parser::Parser;
    use lox::scanner::Scanner;

    fn parse(source: &str) -> Result<Vec<Stmt>, Vec<String>> {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);

        Parser::new(tokens)
            .parse()
            .map_err(|errors| errors.iter().map(|e| e.to_string()).collect())
    }

    fn print_program(source: &str) -> Vec<String> {
        parse(source)
            .expect("program should parse")
            .iter()
            .map(AstPrinter::print_stmt)
            .collect()
    }

    fn parse_errors(source: &str) -> Vec<String> {
        parse(source).expect_err("program should not parse")
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(
            print_program("1 + 2 * 3 - -4;"),
            vec!["(; (- (+ 1.0 (* 2.0 3.0)) (- 4.0)))"]
        );
        assert_eq!(
            print_program("a = b = c;"),
            vec!["(; (= a (= b c)))"]
        );
        assert_eq!(
            print_program("print !(1 < 2) == false or x and y;"),
            vec!["(print (or (== (! (group (< 1.0 2.0))) false) (and x y)))"]
        );
    }

    #[test]
    fn test_calls_properties_and_set() {
        assert_eq!(
            print_program("a.b(1, \"s\").c = nil;"),
            vec!["(; (= (. (call (. a b) 1.0 s) c) nil))"]
        );
    }

    #[test]
    fn test_for_desugars_to_while() {
        assert_eq!(
            print_program("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["(block (var i 0.0) (while (< i 3.0) (block (print i) (; (= i (+ i 1.0))))))"]
        );
    }

    #[test]
    fn test_for_without_clauses_loops_on_true() {
        assert_eq!(print_program("for (;;) print 1;"), vec!["(while true (print 1.0))"]);
    }

    #[test]
    fn test_class_with_superclass_and_methods() {
        let statements = parse("class B < A { init(x) { this.x = x; } get() { return super.get(); } }")
            .expect("class should parse");

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &statements[0]
        else {
            panic!("expected class, got {:?}", statements[0]);
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].params.len(), 1);

        assert_eq!(
            AstPrinter::print_stmt(&statements[0]),
            "(class B < A (fun init (x) (; (= (. this x) x))) (fun get () (return (call (super get)))))"
        );
    }

    #[test]
    fn test_reports_every_error_after_synchronizing() {
        let errors = parse_errors("var = 1;\nprint 2;\nvar b 3;\n");

        assert_eq!(
            errors,
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 3] Error at '3': Expect ';' after variable declaration.",
            ]
        );
    }

    #[test]
    fn test_error_at_end() {
        assert_eq!(
            parse_errors("print 1"),
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
    }

    #[test]
    fn test_invalid_assignment_target_does_not_unwind() {
        assert_eq!(
            parse_errors("a + b = c;\nprint 1;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn test_error_inside_block_keeps_parsing() {
        assert_eq!(
            parse_errors("{ var 1; print 2; }\nprint );"),
            vec![
                "[line 1] Error at '1': Expect variable name.",
                "[line 2] Error at ')': Expect expression.",
            ]
        );
    }

    #[test]
    fn test_too_many_arguments() {
        let args: Vec<String> = (0..=255).map(|n| n.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        assert_eq!(
            parse_errors(&source),
            vec!["[line 1] Error at '255': Can't have more than 255 arguments."]
        );
    }

    #[test]
    fn test_too_many_parameters() {
        let params: Vec<String> = (0..=255).map(|n| format!("p{}", n)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));

        assert_eq!(
            parse_errors(&source),
            vec!["[line 1] Error at 'p255': Can't have more than 255 parameters."]
        );
    }

    #[test]
    fn test_parse_single_expression() {
        let (tokens, _) = Scanner::new("(1 + 2) * 3").scan_tokens();
        let expr = Parser::new(tokens).parse_expression().expect("should parse");

        assert_eq!(AstPrinter::print(&expr), "(* (group (+ 1.0 2.0)) 3.0)");

        let (tokens, _) = Scanner::new("1 2").scan_tokens();
        let errors = Parser::new(tokens).parse_expression().unwrap_err();

        assert_eq!(errors[0].to_string(), "[line 1] Error at '2': Expect end of expression.");
    }
}
