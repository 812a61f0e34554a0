#[cfg(test)]
mod scanner_tests {
    use sparklecode::error::{Diagnostics, SparkleError};
    use sparklecode::scanner::*;
    use sparklecode::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(
            tokens.len(),
            expected.len(),
            "Token count mismatch for {:?}: {:?}",
            source,
            tokens
        );

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    fn assert_token_matches(
        result: &Result<Token, SparkleError>,
        expected_type: TokenType,
        expected_lexeme: &str,
    ) {
        match result {
            Ok(token) => {
                assert_eq!(
                    token.token_type, expected_type,
                    "Expected token type {:?}, got {:?}",
                    expected_type, token.token_type
                );
                assert_eq!(
                    token.lexeme, expected_lexeme,
                    "Expected lexeme '{}', got '{}'",
                    expected_lexeme, token.lexeme
                );
            }
            Err(e) => panic!("Expected token but got error: {}", e),
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_maximal_munch() {
        assert_token_sequence(
            "!= == <= >= ! = < > /",
            &[
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::BANG, "!"),
                (TokenType::EQUAL, "="),
                (TokenType::LESS, "<"),
                (TokenType::GREATER, ">"),
                (TokenType::SLASH, "/"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "fn class_ init _x var while orchid",
            &[
                (TokenType::FN, "fn"),
                (TokenType::IDENTIFIER, "class_"),
                (TokenType::IDENTIFIER, "init"),
                (TokenType::IDENTIFIER, "_x"),
                (TokenType::VAR, "var"),
                (TokenType::WHILE, "while"),
                (TokenType::IDENTIFIER, "orchid"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_numbers() {
        let tokens: Vec<Token> = Scanner::new("123 45.67 8.").filter_map(Result::ok).collect();

        assert_eq!(tokens[0].literal(), Some(Literal::Number(123.0)));
        assert_eq!(tokens[1].literal(), Some(Literal::Number(45.67)));
        assert_eq!(tokens[2].literal(), Some(Literal::Number(8.0)));

        // No trailing-dot fractions: `8.` is a number then a dot.
        assert_eq!(tokens[3].token_type, TokenType::DOT);
        assert_eq!(tokens[4].token_type, TokenType::EOF);

        assert_eq!(tokens[0].to_string(), "NUMBER 123 123.0");
        assert_eq!(tokens[1].to_string(), "NUMBER 45.67 45.67");
    }

    #[test]
    fn test_scanner_05_strings_span_lines() {
        let tokens: Vec<Token> = Scanner::new("\"one\ntwo\" after")
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens[0].literal(), Some(Literal::Str("one\ntwo")));
        assert_eq!(tokens[1].lexeme, "after");
        assert_eq!(tokens[1].line, 2, "Newline inside a string must count");
    }

    #[test]
    fn test_scanner_06_string_display() {
        let tokens: Vec<Token> = Scanner::new("\"hi\"").filter_map(Result::ok).collect();

        assert_eq!(tokens[0].to_string(), "STRING \"hi\" hi");
        assert_eq!(tokens[1].to_string(), "EOF  null");
    }

    #[test]
    fn test_scanner_07_line_comments() {
        let tokens: Vec<Token> = Scanner::new("// nothing here\nprint // trailing\n1")
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].token_type, TokenType::PRINT);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_scanner_08_nested_block_comments() {
        assert_token_sequence(
            "/* /* */ */ print 1;",
            &[
                (TokenType::PRINT, "print"),
                (TokenType::NUMBER(0.0), "1"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_09_block_comment_counts_lines() {
        let tokens: Vec<Token> = Scanner::new("/* a\n/* b\n*/ c\n*/ x")
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[0].line, 4);
    }

    #[test]
    fn test_scanner_10_unterminated_nested_comment() {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan_tokens("/* /* */ print 1;", &mut diagnostics);

        assert_eq!(tokens.len(), 1, "Only EOF survives: {:?}", tokens);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.to_string(),
            "[line 1] Error: Unterminated block comment."
        );
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let scanner = Scanner::new(source);

        let results: Vec<_> = scanner.collect();

        // COMMA, DOT, error '$', LEFT_PAREN, error '#', EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
        }
    }

    #[test]
    fn test_scanning_continues_after_errors() {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan_tokens("var a = 1;\n@\nprint a; \"open", &mut diagnostics);

        assert_eq!(
            diagnostics.to_string(),
            "[line 2] Error: Unexpected character '@'.\n[line 3] Error: Unterminated string."
        );

        let kinds: Vec<&str> = tokens.iter().map(|t| t.token_type.name()).collect();
        assert_eq!(
            kinds,
            [
                "VAR",
                "IDENTIFIER",
                "EQUAL",
                "NUMBER",
                "SEMICOLON",
                "PRINT",
                "IDENTIFIER",
                "SEMICOLON",
                "EOF"
            ]
        );
    }

    #[test]
    fn test_scanning_is_repeatable() {
        let source = "class A { init() { this.x = \"y\"; } } /* c */ print A().x;";

        let mut first = Diagnostics::new();
        let mut second = Diagnostics::new();

        assert_eq!(
            scan_tokens(source, &mut first),
            scan_tokens(source, &mut second)
        );
        assert!(first.is_empty() && second.is_empty());
    }

    #[test]
    fn test_scanner_is_fused() {
        let mut scanner = Scanner::new("");

        assert!(matches!(scanner.next(), Some(Ok(ref t)) if t.token_type == TokenType::EOF));
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }
}
