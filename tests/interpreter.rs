#[cfg(test)]
mod interpreter_tests {
    use pretty_assertions::assert_eq;
    use rlox_tree as lox;

    use lox::error::StreamReporter;
    use lox::interpreter::{Interpreter, InterpreterConfig};
    use lox::session::{Session, Status};

    type TestSession = Session<Vec<u8>, StreamReporter<Vec<u8>>>;

    fn session(config: InterpreterConfig) -> TestSession {
        Session::new(
            Interpreter::with_config(Vec::new(), config),
            StreamReporter::new(Vec::new()),
        )
    }

    fn output(session: &TestSession) -> String {
        String::from_utf8(session.interpreter().output().clone()).unwrap()
    }

    fn diagnostics(session: &TestSession) -> String {
        String::from_utf8(session.reporter().get_ref().clone()).unwrap()
    }

    /// Run one program in a fresh session; returns status, stdout, stderr.
    fn run(source: &str) -> (Status, String, String) {
        let mut session = session(InterpreterConfig::default());
        let status = session.run(source);

        (status, output(&session), diagnostics(&session))
    }

    fn run_ok(source: &str) -> String {
        let (status, out, err) = run(source);
        assert_eq!(err, "");
        assert_eq!(status, Status::Ok);
        out
    }

    fn run_err(source: &str) -> String {
        let (status, _, err) = run(source);
        assert_eq!(status, Status::RuntimeError);
        err
    }

    #[test]
    fn test_arithmetic_and_concatenation() {
        assert_eq!(
            run_ok("print 1 + 2; print 7 / 2; print \"a\" + \"b\"; print -3; print (1 + 2) * 3 - 4 / 2;"),
            "3\n3.5\nab\n-3\n7\n"
        );
    }

    #[test]
    fn test_comparison() {
        assert_eq!(
            run_ok("print 1 < 2; print 2 <= 2; print 3 > 4; print 4 >= 5;"),
            "true\ntrue\nfalse\nfalse\n"
        );
    }

    #[test]
    fn test_truthiness() {
        let source = r#"
            if (0) print "zero";
            if ("") print "empty";
            if (nil) print "nil"; else print "nil is falsy";
            if (false) print "false"; else print "false is falsy";
            print !nil;
            print !0;
        "#;

        assert_eq!(
            run_ok(source),
            "zero\nempty\nnil is falsy\nfalse is falsy\ntrue\nfalse\n"
        );
    }

    #[test]
    fn test_equality() {
        let source = r#"
            print 1 == 1;
            print "a" == "a";
            print nil == nil;
            print 1 == "1";
            print nil == false;
            print 0 / 0 == 0 / 0;
            print 1 != 2;
        "#;

        assert_eq!(
            run_ok(source),
            "true\ntrue\ntrue\nfalse\nfalse\nfalse\ntrue\n"
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(
            run_ok("print nil or \"x\"; print 1 and 2; print false and boom; print true or boom;"),
            "x\n2\nfalse\ntrue\n"
        );
    }

    #[test]
    fn test_while_and_for() {
        let source = r#"
            var i = 0;
            while (i < 3) { print i; i = i + 1; }
            for (var j = 10; j > 7; j = j - 1) print j;
        "#;

        assert_eq!(run_ok(source), "0\n1\n2\n10\n9\n8\n");
    }

    #[test]
    fn test_return_unwinds_loops_and_blocks() {
        let source = r#"
            fun find() {
                for (var i = 0; i < 10; i = i + 1) {
                    { if (i == 3) return i; }
                }
                return -1;
            }
            print find();
            fun nothing() { return; }
            print nothing();
            fun implicit() {}
            print implicit();
        "#;

        assert_eq!(run_ok(source), "3\nnil\nnil\n");
    }

    #[test]
    fn test_recursion() {
        let source = r#"
            fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
            print fib(15);
        "#;

        assert_eq!(run_ok(source), "610\n");
    }

    #[test]
    fn test_closure_counter() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var c = makeCounter();
            print c();
            print c();
            var d = makeCounter();
            print d();
            print c();
        "#;

        assert_eq!(run_ok(source), "1\n2\n1\n3\n");
    }

    #[test]
    fn test_closure_binds_statically() {
        let source = r#"
            var a = "global";
            {
                fun showA() { print a; }
                showA();
                var a = "block";
                showA();
                print a;
            }
        "#;

        assert_eq!(run_ok(source), "global\nglobal\nblock\n");
    }

    #[test]
    fn test_shadowing_initializer_reads_outer() {
        assert_eq!(
            run_ok("var a = 1; { var a = a + 1; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn test_class_with_initializer() {
        let source = r#"
            class A {
                init(x) { this.x = x; }
                getX() { return this.x; }
            }
            var a = A(5);
            print a.getX();
            a.x = 7;
            print a.getX();
        "#;

        assert_eq!(run_ok(source), "5\n7\n");
    }

    #[test]
    fn test_display_of_callables_and_instances() {
        let source = r#"
            class A { getX() { return 1; } }
            var a = A();
            print A;
            print a;
            print a.getX;
            print clock;
            fun f() {}
            print f;
        "#;

        assert_eq!(
            run_ok(source),
            "A\nA instance\n<fn getX>\n<native fn>\n<fn f>\n"
        );
    }

    #[test]
    fn test_initializer_returns_this() {
        let source = r#"
            class A {
                init() { this.x = 1; return; this.x = 2; }
            }
            var a = A();
            print a.x;
            print a.init() == a;
            var i = a.init;
            print i() == a;
        "#;

        assert_eq!(run_ok(source), "1\ntrue\ntrue\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = r#"
            class A { f() { return "method"; } }
            fun g() { return "g"; }
            var a = A();
            print a.f();
            a.f = g;
            print a.f();
        "#;

        assert_eq!(run_ok(source), "method\ng\n");
    }

    #[test]
    fn test_bound_method_keeps_this() {
        let source = r#"
            class P {
                init(n) { this.n = n; }
                say() { print this.n; }
            }
            var m = P("hi").say;
            m();
        "#;

        assert_eq!(run_ok(source), "hi\n");
    }

    #[test]
    fn test_super_chain_across_three_classes() {
        let source = r#"
            class A { method() { return "A"; } }
            class B < A { method() { return "B" + super.method(); } }
            class C < B { method() { return "C" + super.method(); } }
            print C().method();
        "#;

        assert_eq!(run_ok(source), "CBA\n");
    }

    #[test]
    fn test_inherited_initializer_and_methods() {
        let source = r#"
            class Base {
                init(name) { this.name = name; }
                greet() { return "hello " + this.name; }
            }
            class Derived < Base {}
            var d = Derived("lox");
            print d.greet();
        "#;

        assert_eq!(run_ok(source), "hello lox\n");
    }

    #[test]
    fn test_closures_inside_methods() {
        let source = r#"
            class Counter {
                init() { this.n = 0; }
                incrementer() {
                    fun inc() { this.n = this.n + 1; return this.n; }
                    return inc;
                }
            }
            var c = Counter();
            var inc = c.incrementer();
            inc();
            inc();
            print c.n;
        "#;

        assert_eq!(run_ok(source), "2\n");
    }

    #[test]
    fn test_clock_returns_a_number() {
        assert_eq!(run_ok("print clock() > 0;"), "true\n");
    }

    #[test]
    fn test_operand_type_errors() {
        assert_eq!(
            run_err("print 1 + \"a\";"),
            "Operands must be two numbers or two strings.\n[line 1]\n"
        );
        assert_eq!(
            run_err("\"a\" - \"b\";"),
            "Operands must be numbers.\n[line 1]\n"
        );
        assert_eq!(
            run_err("print 1 < \"b\";"),
            "Operands must be numbers.\n[line 1]\n"
        );
        assert_eq!(run_err("-\"x\";"), "Operand must be a number.\n[line 1]\n");
    }

    #[test]
    fn test_call_errors() {
        assert_eq!(
            run_err("var x = 1;\nx();"),
            "Can only call functions and classes.\n[line 2]\n"
        );
        assert_eq!(
            run_err("\"str\"(1);"),
            "Can only call functions and classes.\n[line 1]\n"
        );
        assert_eq!(
            run_err("fun f(a) {}\nf(1, 2);"),
            "Expected 1 arguments but got 2.\n[line 2]\n"
        );
        assert_eq!(
            run_err("class A { init(a, b) {} }\nA(1);"),
            "Expected 2 arguments but got 1.\n[line 2]\n"
        );
        assert_eq!(
            run_err("class A {}\nA(1);"),
            "Expected 0 arguments but got 1.\n[line 2]\n"
        );
    }

    #[test]
    fn test_variable_and_property_errors() {
        assert_eq!(
            run_err("print undefinedVar;"),
            "Undefined variable 'undefinedVar'.\n[line 1]\n"
        );
        assert_eq!(
            run_err("undefinedVar = 1;"),
            "Undefined variable 'undefinedVar'.\n[line 1]\n"
        );
        assert_eq!(
            run_err("class A {}\nA().missing;"),
            "Undefined property 'missing'.\n[line 2]\n"
        );
        assert_eq!(
            run_err("class A {}\nA().missing();"),
            "Undefined property 'missing'.\n[line 2]\n"
        );
        assert_eq!(
            run_err("var n = 1;\nn.x = 2;"),
            "Only instances have fields.\n[line 2]\n"
        );
        assert_eq!(
            run_err("var n = 1;\nprint n.x;"),
            "Only instances have properties.\n[line 2]\n"
        );
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        assert_eq!(
            run_err("var NotClass = 1;\nclass B < NotClass {}"),
            "Superclass must be a class.\n[line 2]\n"
        );
    }

    #[test]
    fn test_runtime_error_stops_the_program() {
        let (status, out, err) = run("print 1;\nprint 2;\nprint nil + 1;\nprint 4;");

        assert_eq!(status, Status::RuntimeError);
        assert_eq!(status.exit_code(), 70);
        assert_eq!(out, "1\n2\n");
        assert_eq!(err, "Operands must be two numbers or two strings.\n[line 3]\n");
    }

    #[test]
    fn test_static_errors_prevent_execution() {
        let (status, out, err) = run("print 1;\nprint (;");

        assert_eq!(status, Status::StaticError);
        assert_eq!(status.exit_code(), 65);
        assert_eq!(out, "");
        assert_eq!(err, "[line 2] Error at ';': Expect expression.\n");

        let (status, out, err) = run("print 1;\nreturn 2;");

        assert_eq!(status, Status::StaticError);
        assert_eq!(out, "");
        assert_eq!(err, "[line 2] Error at 'return': Can't return from top-level code.\n");
    }

    #[test]
    fn test_lex_and_parse_errors_reported_together() {
        let (status, _, err) = run("var a = @;\nprint 1");

        assert_eq!(status, Status::StaticError);
        assert_eq!(
            err,
            "[line 1] Error: Unexpected character.\n\
             [line 1] Error at ';': Expect expression.\n\
             [line 2] Error at end: Expect ';' after value.\n"
        );
    }

    #[test]
    fn test_stack_overflow_is_a_runtime_error() {
        let mut session = session(InterpreterConfig { max_call_depth: 16 });

        let status = session.run("fun f(n) { return f(n + 1); }\nf(0);");
        assert_eq!(status, Status::RuntimeError);
        assert_eq!(diagnostics(&session), "Stack overflow.\n[line 1]\n");

        // The call depth is reset for the next run.
        let status = session.run("fun g(n) { if (n > 0) return g(n - 1); return \"done\"; }\nprint g(10);");
        assert_eq!(status, Status::Ok);
        assert_eq!(output(&session), "done\n");
    }

    #[test]
    fn test_default_depth_limit_stops_unbounded_recursion() {
        let (status, out, err) = run("fun f(n) { return f(n + 1); }\nf(0);\nprint \"unreached\";");

        assert_eq!(status, Status::RuntimeError);
        assert_eq!(out, "");
        assert_eq!(err, "Stack overflow.\n[line 1]\n");
    }

    #[test]
    fn test_recursion_just_under_the_default_limit() {
        let source = r#"
            fun depth(n) { if (n == 0) return 0; return 1 + depth(n - 1); }
            print depth(250);
        "#;

        assert_eq!(run_ok(source), "250\n");
    }

    #[test]
    fn test_super_calls_in_a_loop() {
        let source = r#"
            class A { m(x) { return x * 2; } }
            class B < A { m(x) { return super.m(x) + 1; } }
            var b = B();
            var total = 0;
            for (var i = 0; i < 100; i = i + 1) total = total + b.m(i);
            print total;
        "#;

        assert_eq!(run_ok(source), "10000\n");
    }

    #[test]
    fn test_session_state_survives_errors() {
        let mut session = session(InterpreterConfig::default());

        assert_eq!(session.run("var a = 1;"), Status::Ok);
        assert_eq!(session.run("fun f() { return a; }"), Status::Ok);
        assert_eq!(session.run("print a + b;"), Status::RuntimeError);
        assert_eq!(session.run("print (;"), Status::StaticError);
        assert_eq!(session.run("{ var x = 1; print x + nil; }"), Status::RuntimeError);
        assert_eq!(session.run("a = a + 1; print a; print f();"), Status::Ok);

        // A global from an earlier line may be read by a shadowing initializer.
        assert_eq!(session.run("{ var a = a * 10; print a; }"), Status::Ok);

        assert_eq!(output(&session), "2\n2\n20\n");
    }
}
