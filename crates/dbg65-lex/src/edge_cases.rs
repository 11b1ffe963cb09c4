//! Edge case tests for dbg65-lex.

#[cfg(test)]
mod tests {
    use crate::{Keyword, Lexer, Token};
    use dbg65_util::{Collector, Reporter};

    fn lex_all(source: &str) -> Vec<Token> {
        let mut collector = Collector::new();
        let mut reporter = Reporter::new("edge.dbg", &mut collector);
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token(&mut reporter);
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn test_edge_empty_source() {
        assert!(lex_all("").is_empty());
    }

    #[test]
    fn test_edge_blank_lines_only() {
        assert_eq!(lex_all("\n\n\n"), vec![Token::Eol, Token::Eol, Token::Eol]);
    }

    #[test]
    fn test_edge_single_char_ident() {
        assert_eq!(lex_all("x"), vec![Token::Ident("x".into())]);
    }

    #[test]
    fn test_edge_long_identifier() {
        let name = "a".repeat(10000);
        assert_eq!(lex_all(&name), vec![Token::Ident(name.clone())]);
    }

    #[test]
    fn test_edge_keywords_not_idents() {
        let t = lex_all("seg span sym");
        assert_eq!(t[0], Token::Keyword(Keyword::Segment));
        assert_eq!(t[1], Token::Keyword(Keyword::Span));
        assert_eq!(t[2], Token::Keyword(Keyword::Sym));
    }

    #[test]
    fn test_edge_case_sensitivity() {
        let t = lex_all("Mod mod");
        assert_eq!(t[0], Token::Ident("Mod".into()));
        assert_eq!(t[1], Token::Keyword(Keyword::Module));
    }

    #[test]
    fn test_edge_keyword_prefix_is_ident() {
        // A keyword followed by more ident characters is one identifier.
        assert_eq!(lex_all("segment"), vec![Token::Ident("segment".into())]);
    }

    #[test]
    fn test_edge_hex_bounds() {
        let t = lex_all("0x0 0xFF 0xffffffffffffffff");
        assert_eq!(t[0], Token::Int(0));
        assert_eq!(t[1], Token::Int(255));
        assert_eq!(t[2], Token::Int(u64::MAX));
    }

    #[test]
    fn test_edge_octal() {
        let t = lex_all("00 017 0777");
        assert_eq!(t[0], Token::Int(0));
        assert_eq!(t[1], Token::Int(15));
        assert_eq!(t[2], Token::Int(511));
    }

    #[test]
    fn test_edge_octal_stops_at_eight() {
        // "08" is octal zero followed by decimal eight.
        assert_eq!(lex_all("08"), vec![Token::Int(0), Token::Int(8)]);
    }

    #[test]
    fn test_edge_max_decimal() {
        assert_eq!(
            lex_all("18446744073709551615"),
            vec![Token::Int(u64::MAX)]
        );
    }

    #[test]
    fn test_edge_empty_string() {
        assert_eq!(lex_all("\"\""), vec![Token::Str(String::new())]);
    }

    #[test]
    fn test_edge_string_with_blanks_and_punctuation() {
        assert_eq!(
            lex_all("\"a b,c=d+e\""),
            vec![Token::Str("a b,c=d+e".into())]
        );
    }

    #[test]
    fn test_edge_adjacent_punctuation() {
        assert_eq!(
            lex_all(",=+-"),
            vec![Token::Comma, Token::Eq, Token::Plus, Token::Minus]
        );
    }

    #[test]
    fn test_edge_no_trailing_newline() {
        let t = lex_all("minor=0");
        assert_eq!(
            t,
            vec![Token::Keyword(Keyword::Minor), Token::Eq, Token::Int(0)]
        );
    }

    #[test]
    fn test_edge_tabs_between_tokens() {
        let t = lex_all("version\tmajor\t=\t2");
        assert_eq!(t[0], Token::Keyword(Keyword::Version));
        assert_eq!(t[3], Token::Int(2));
    }

    #[test]
    fn test_err_run_of_invalid_chars() {
        let mut collector = Collector::new();
        let mut reporter = Reporter::new("edge.dbg", &mut collector);
        let mut lexer = Lexer::new("!@#$%^&*");
        assert_eq!(lexer.next_token(&mut reporter), Token::Eof);
        drop(reporter);
        assert_eq!(collector.error_count(), 8);
    }

    #[test]
    fn test_err_invalid_char_between_valid_tokens() {
        let mut collector = Collector::new();
        let mut reporter = Reporter::new("edge.dbg", &mut collector);
        let mut lexer = Lexer::new("id;=1");
        assert_eq!(
            lexer.next_token(&mut reporter),
            Token::Keyword(Keyword::Id)
        );
        assert_eq!(lexer.next_token(&mut reporter), Token::Eq);
        assert_eq!(lexer.next_token(&mut reporter), Token::Int(1));
        drop(reporter);
        assert_eq!(collector.error_count(), 1);
    }
}
