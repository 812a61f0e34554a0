#[cfg(test)]
mod interpreter_tests {
    use pretty_assertions::assert_eq;

    use sparklecode::error::RunError;
    use sparklecode::session::Session;

    fn run(source: &str) -> (String, Result<(), RunError>) {
        let mut session = Session::with_output(Vec::new());
        let result = session.run(source);
        let printed = String::from_utf8(session.into_output()).expect("output is UTF-8");

        (printed, result)
    }

    /// Output of a program that must run cleanly.
    fn output_of(source: &str) -> String {
        let (printed, result) = run(source);

        if let Err(e) = result {
            panic!("Program failed:\n{}\nafter printing:\n{}", e, printed);
        }

        printed
    }

    /// Output before the failure, and the rendered runtime error.
    fn runtime_failure(source: &str) -> (String, String) {
        match run(source) {
            (printed, Err(RunError::Runtime(e))) => (printed, e.to_string()),
            (printed, other) => panic!("Expected a runtime error, got {:?} ({:?})", other, printed),
        }
    }

    // ───────────────────────────── scenarios ──────────────────────────────

    #[test]
    fn test_shadowing_initializer_reads_outer_variable() {
        assert_eq!(output_of("var a = 1; { var a = a + 1; print a; }"), "2\n");
        assert_eq!(
            output_of("{ var a = 1; { var a = a + 1; print a; } print a; }"),
            "2\n1\n"
        );
    }

    #[test]
    fn test_divide_by_zero_halts() {
        let (printed, error) = runtime_failure("print 0;\nprint 1 / 0;\nprint 2;");

        assert_eq!(printed, "0\n");
        assert_eq!(error, "Divide by zero.\n[line 2]");
    }

    #[test]
    fn test_method_found_through_superclass() {
        assert_eq!(
            output_of(r#"class A { greet() { return "A"; } } class B < A {} print B().greet();"#),
            "A\n"
        );
    }

    #[test]
    fn test_closures_share_mutable_state() {
        let source = r#"
            fn makeCounter() {
                var count = 0;
                fn increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }

            var first = makeCounter();
            var second = makeCounter();
            print first();
            print first();
            print second();
            print first();
        "#;

        assert_eq!(output_of(source), "1\n2\n1\n3\n");
    }

    #[test]
    fn test_arity_mismatch() {
        let (_, error) = runtime_failure("fn f() {}\nf(1);");

        assert_eq!(error, "Expected 0 arguments but got 1.\n[line 2]");
    }

    #[test]
    fn test_nested_comments_are_skipped() {
        assert_eq!(output_of("/* /* */ */ print 1;"), "1\n");

        match run("/* /* */ print 1;") {
            (printed, Err(RunError::Static(diagnostics))) => {
                assert!(printed.is_empty());
                assert_eq!(
                    diagnostics.to_string(),
                    "[line 1] Error: Unterminated block comment."
                );
            }
            other => panic!("Expected a lexical error, got {:?}", other),
        }
    }

    // ───────────────────────────── semantics ──────────────────────────────

    #[test]
    fn test_number_and_value_formatting() {
        let source = r#"
            print 1;
            print 2.5;
            print 10 / 4;
            print -0.5 * 2;
            print 100000000000000000000000;
            print nil;
            print true;
            print "text";
            fn f() {}
            print f;
            print clock;
            class K {}
            print K;
            print K();
        "#;

        assert_eq!(
            output_of(source),
            "1\n2.5\n2.5\n-1\n100000000000000000000000\nnil\ntrue\ntext\n<fn f>\n<fn clock>\nK\nK Instance\n"
        );
    }

    #[test]
    fn test_truthiness() {
        let source = r#"
            if (0) print "0 is truthy";
            if ("") print "empty string is truthy";
            if (nil) print "unreachable"; else print "nil is falsy";
            if (!false) print "false is falsy";
        "#;

        assert_eq!(
            output_of(source),
            "0 is truthy\nempty string is truthy\nnil is falsy\nfalse is falsy\n"
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(
            output_of(r#"print nil or "default"; print 1 and 2; print false and undefined;"#),
            "default\n2\nfalse\n"
        );
    }

    #[test]
    fn test_equality() {
        let source = r#"
            print nil == nil;
            print nil == false;
            print 1 == 1;
            print "a" == "a";
            print 1 == "1";
            print 1 != 2;
            class A {}
            var a = A();
            var b = a;
            print a == b;
            print a == A();
        "#;

        assert_eq!(
            output_of(source),
            "true\nfalse\ntrue\ntrue\nfalse\ntrue\ntrue\nfalse\n"
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(output_of(r#"var s = "spar" + "kle"; print s + "code";"#), "sparklecode\n");
    }

    #[test]
    fn test_type_errors_name_the_operands() {
        let (_, error) = runtime_failure(r#"print 1 + "a";"#);
        assert_eq!(
            error,
            "Operands must be two numbers or two strings. Got number and string.\n[line 1]"
        );

        let (_, error) = runtime_failure("print true < nil;");
        assert_eq!(error, "Operands must be numbers. Got boolean and nil.\n[line 1]");

        let (_, error) = runtime_failure(r#"print -"x";"#);
        assert_eq!(error, "Operand must be a number. Got string.\n[line 1]");
    }

    #[test]
    fn test_divide_by_zero_beats_type_check() {
        let (_, error) = runtime_failure(r#"print "a" / 0;"#);

        assert_eq!(error, "Divide by zero.\n[line 1]");
    }

    #[test]
    fn test_undefined_variable() {
        let (printed, error) = runtime_failure("print 1;\nprint missing;");

        assert_eq!(printed, "1\n");
        assert_eq!(error, "Undefined variable 'missing'.\n[line 2]");

        let (_, error) = runtime_failure("missing = 1;");
        assert_eq!(error, "Undefined variable 'missing'.\n[line 1]");
    }

    #[test]
    fn test_var_without_initializer_is_nil() {
        assert_eq!(output_of("var a; print a; { var b; print b; }"), "nil\nnil\n");
    }

    #[test]
    fn test_for_and_while_loops() {
        let source = r#"
            var total = 0;
            for (var i = 1; i <= 4; i = i + 1) total = total + i;
            print total;

            var n = 3;
            while (n > 0) { print n; n = n - 1; }
        "#;

        assert_eq!(output_of(source), "10\n3\n2\n1\n");
    }

    #[test]
    fn test_return_unwinds_loops_and_blocks() {
        let source = r#"
            fn find() {
                for (var i = 0; ; i = i + 1) {
                    { if (i == 3) return i; }
                }
            }
            print find();
            fn nothing() { return; }
            print nothing();
        "#;

        assert_eq!(output_of(source), "3\nnil\n");
    }

    #[test]
    fn test_recursion() {
        let source = r#"
            fn fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(15);
        "#;

        assert_eq!(output_of(source), "610\n");
    }

    #[test]
    fn test_closure_captures_definition_scope() {
        let source = r#"
            var a = "global";
            {
                fn show() { print a; }
                show();
                var a = "block";
                show();
            }
        "#;

        assert_eq!(output_of(source), "global\nglobal\n");
    }

    #[test]
    fn test_calling_non_callables() {
        let (_, error) = runtime_failure(r#""text"();"#);
        assert_eq!(
            error,
            "Can only call functions and classes. Got string.\n[line 1]"
        );
    }

    // ───────────────────────────── classes ────────────────────────────────

    #[test]
    fn test_fields_and_methods() {
        let source = r#"
            class Point {
                init(x, y) {
                    this.x = x;
                    this.y = y;
                }
                sum() { return this.x + this.y; }
            }
            var p = Point(1, 2);
            print p.sum();
            p.x = 10;
            print p.sum();
            var m = p.sum;
            print m();
        "#;

        assert_eq!(output_of(source), "3\n12\n12\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = r#"
            class A { m() { return "method"; } }
            var a = A();
            a.m = "field";
            print a.m;
        "#;

        assert_eq!(output_of(source), "field\n");
    }

    #[test]
    fn test_initializer_always_returns_instance() {
        let source = r#"
            class A {
                init(n) {
                    this.n = n;
                    if (n > 0) return;
                    this.n = -1;
                }
            }
            var a = A(5);
            print a.n;
            print a.init(0) == a;
            print a.n;
        "#;

        assert_eq!(output_of(source), "5\ntrue\n-1\n");
    }

    #[test]
    fn test_class_arity_comes_from_init() {
        let (_, error) = runtime_failure("class A { init(a, b) {} }\nA(1);");
        assert_eq!(error, "Expected 2 arguments but got 1.\n[line 2]");

        let (_, error) = runtime_failure("class B {}\nB(1);");
        assert_eq!(error, "Expected 0 arguments but got 1.\n[line 2]");
    }

    #[test]
    fn test_super_calls_bind_this() {
        let source = r#"
            class A {
                name() { return "A of " + this.tag; }
            }
            class B < A {
                name() { return "B, " + super.name(); }
            }
            class C < B {}
            var c = C();
            c.tag = "c";
            print c.name();
        "#;

        assert_eq!(output_of(source), "B, A of c\n");
    }

    #[test]
    fn test_methods_reference_their_class() {
        let source = r#"
            class Node {
                init(depth) { this.depth = depth; }
                child() { return Node(this.depth + 1); }
            }
            print Node(0).child().child().depth;
        "#;

        assert_eq!(output_of(source), "2\n");
    }

    #[test]
    fn test_property_errors() {
        let (_, error) = runtime_failure("class A {}\nprint A().missing;");
        assert_eq!(error, "Undefined property 'missing'.\n[line 2]");

        let (_, error) = runtime_failure("var n = 1;\nprint n.x;");
        assert_eq!(error, "Only instances have properties. Got number.\n[line 2]");

        let (_, error) = runtime_failure("var n = 1;\nn.x = 2;");
        assert_eq!(error, "Only instances have fields.\n[line 2]");

        let (_, error) = runtime_failure(
            "class A {}\nclass B < A { m() { return super.missing; } }\nB().m();",
        );
        assert_eq!(error, "Undefined property 'missing'.\n[line 2]");
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let (_, error) =
            runtime_failure("var NotAClass = 1;\nfn make() {\n  class B < NotAClass {}\n}\nmake();");

        assert_eq!(error, "Superclass must be a class.\n[line 3]");
    }

    #[test]
    fn test_clock_moves_forward() {
        let source = r#"
            var start = clock();
            print start > 1000000000;
            print clock() >= start;
        "#;

        assert_eq!(output_of(source), "true\ntrue\n");
    }
}
