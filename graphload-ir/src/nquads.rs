//! Line-oriented N-Quads / N-Triples reader
//!
//! Covers the line-based subset the bulk loader's CLI and tests need: one
//! statement per line, `<iri>` / `_:label` / quoted literals with `@lang` or
//! `^^<datatype>`, an optional graph position, `#` comments. Not a
//! conformance parser; full-format parsing is an external concern.

use crate::{Datatype, IrError, Result, Statement, StatementSink, Term};
use crate::parser::DocumentParser;
use std::io::BufRead;

#[derive(Debug, Default)]
pub struct NQuadsParser;

impl NQuadsParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for NQuadsParser {
    fn parse(
        &self,
        reader: &mut dyn BufRead,
        default_graph: Option<&str>,
        sink: &mut dyn StatementSink,
    ) -> Result<()> {
        let mut line_no = 0usize;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(());
            }
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let statement = parse_line(trimmed, line_no, default_graph)?;
            sink.handle_statement(statement)?;
        }
    }
}

fn parse_line(line: &str, line_no: usize, default_graph: Option<&str>) -> Result<Statement> {
    let mut lexer = Lexer::new(line, line_no);
    let subject = lexer.term()?;
    if subject.is_literal() {
        return Err(IrError::syntax(line_no, "literal in subject position"));
    }
    let predicate = lexer.term()?;
    if !predicate.is_iri() {
        return Err(IrError::syntax(line_no, "predicate must be an IRI"));
    }
    let object = lexer.term()?;

    lexer.skip_ws();
    let graph = if lexer.peek() == Some('.') {
        None
    } else {
        let g = lexer.term()?;
        if g.is_literal() {
            return Err(IrError::syntax(line_no, "literal in graph position"));
        }
        Some(g)
    };
    lexer.expect_dot()?;

    let graph = graph.or_else(|| default_graph.map(Term::iri));
    Ok(Statement::explicit(subject, predicate, object, graph))
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, line: usize) -> Self {
        Self {
            chars: input.chars().peekable(),
            line,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn err(&self, message: impl Into<String>) -> IrError {
        IrError::syntax(self.line, message)
    }

    fn term(&mut self) -> Result<Term> {
        self.skip_ws();
        match self.peek() {
            Some('<') => self.iri().map(Term::Iri),
            Some('_') => self.blank(),
            Some('"') => self.literal(),
            Some(c) => Err(self.err(format!("unexpected character '{}'", c))),
            None => Err(self.err("unexpected end of line")),
        }
    }

    fn iri(&mut self) -> Result<std::sync::Arc<str>> {
        self.chars.next(); // '<'
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('>') => return Ok(out.into()),
                Some(c) => out.push(c),
                None => return Err(self.err("unterminated IRI")),
            }
        }
    }

    fn blank(&mut self) -> Result<Term> {
        self.chars.next(); // '_'
        if self.chars.next() != Some(':') {
            return Err(self.err("expected ':' after '_' in blank node label"));
        }
        let mut label = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            label.push(c);
            self.chars.next();
        }
        if label.is_empty() {
            return Err(self.err("empty blank node label"));
        }
        Ok(Term::blank(label))
    }

    fn literal(&mut self) -> Result<Term> {
        self.chars.next(); // '"'
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some('"') => break,
                Some('\\') => match self.chars.next() {
                    Some('t') => value.push('\t'),
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(c) => return Err(self.err(format!("unknown escape '\\{}'", c))),
                    None => return Err(self.err("unterminated escape")),
                },
                Some(c) => value.push(c),
                None => return Err(self.err("unterminated literal")),
            }
        }
        match self.peek() {
            Some('@') => {
                self.chars.next();
                let mut lang = String::new();
                while let Some(c) = self.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    lang.push(c);
                    self.chars.next();
                }
                if lang.is_empty() {
                    return Err(self.err("empty language tag"));
                }
                Ok(Term::lang_string(value, lang))
            }
            Some('^') => {
                self.chars.next();
                if self.chars.next() != Some('^') {
                    return Err(self.err("expected '^^' before datatype"));
                }
                self.skip_ws();
                if self.peek() != Some('<') {
                    return Err(self.err("expected '<' to open datatype IRI"));
                }
                let dt = self.iri()?;
                typed_literal(value, &dt, self.line)
            }
            _ => Ok(Term::string(value)),
        }
    }

    fn expect_dot(&mut self) -> Result<()> {
        self.skip_ws();
        if self.chars.next() != Some('.') {
            return Err(self.err("expected '.' terminating statement"));
        }
        self.skip_ws();
        match self.peek() {
            None => Ok(()),
            Some('#') => Ok(()),
            Some(c) => Err(self.err(format!("trailing content after '.': '{}'", c))),
        }
    }
}

/// Known numeric and boolean datatypes get their values parsed so the
/// pipeline can recognize inlinable literals; everything else stays lexical.
fn typed_literal(value: String, datatype_iri: &str, line: usize) -> Result<Term> {
    use crate::datatype::iri;
    match datatype_iri {
        iri::XSD_STRING => Ok(Term::string(value)),
        iri::XSD_INTEGER => value
            .parse::<i64>()
            .map(Term::integer)
            .map_err(|_| IrError::syntax(line, format!("invalid xsd:integer '{}'", value))),
        iri::XSD_BOOLEAN => match value.as_str() {
            "true" | "1" => Ok(Term::boolean(true)),
            "false" | "0" => Ok(Term::boolean(false)),
            _ => Err(IrError::syntax(
                line,
                format!("invalid xsd:boolean '{}'", value),
            )),
        },
        iri::XSD_DOUBLE => value
            .parse::<f64>()
            .map(Term::double)
            .map_err(|_| IrError::syntax(line, format!("invalid xsd:double '{}'", value))),
        other => Ok(Term::typed(value, Datatype::custom(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnSink;
    use std::io::Cursor;

    fn parse_all(input: &str, default_graph: Option<&str>) -> Result<Vec<Statement>> {
        let mut out = Vec::new();
        let mut sink = FnSink(|s: Statement| {
            out.push(s);
            Ok(())
        });
        NQuadsParser::new().parse(&mut Cursor::new(input), default_graph, &mut sink)?;
        Ok(out)
    }

    #[test]
    fn test_parse_triples() {
        let input = "\
<http://e.org/a> <http://e.org/p> <http://e.org/b> .
<http://e.org/a> <http://e.org/name> \"Alice\" .
_:b0 <http://e.org/p> \"bonjour\"@fr .
";
        let stmts = parse_all(input, None).unwrap();
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[0].object, Term::iri("http://e.org/b"));
        assert_eq!(stmts[1].object, Term::string("Alice"));
        assert!(stmts[2].subject.is_blank());
        assert_eq!(stmts[2].object, Term::lang_string("bonjour", "fr"));
        assert!(stmts.iter().all(|s| s.graph.is_none()));
    }

    #[test]
    fn test_parse_quad() {
        let input = "<http://e.org/a> <http://e.org/p> \"x\" <http://e.org/g> .\n";
        let stmts = parse_all(input, None).unwrap();
        assert_eq!(stmts[0].graph, Some(Term::iri("http://e.org/g")));
    }

    #[test]
    fn test_default_graph_applied() {
        let input = "<http://e.org/a> <http://e.org/p> \"x\" .\n";
        let stmts = parse_all(input, Some("http://e.org/load")).unwrap();
        assert_eq!(stmts[0].graph, Some(Term::iri("http://e.org/load")));
    }

    #[test]
    fn test_typed_literals() {
        let input = "\
<http://e.org/a> <http://e.org/n> \"42\"^^<http://www.w3.org/2001/XMLSchema#integer> .
<http://e.org/a> <http://e.org/f> \"true\"^^<http://www.w3.org/2001/XMLSchema#boolean> .
<http://e.org/a> <http://e.org/d> \"2024-01-01\"^^<http://www.w3.org/2001/XMLSchema#dateTime> .
";
        let stmts = parse_all(input, None).unwrap();
        assert_eq!(stmts[0].object, Term::integer(42));
        assert_eq!(stmts[1].object, Term::boolean(true));
        assert_eq!(
            stmts[2].object,
            Term::typed("2024-01-01", Datatype::xsd_date_time())
        );
    }

    #[test]
    fn test_escapes() {
        let input = "<http://e.org/a> <http://e.org/p> \"line\\nbreak \\\"q\\\"\" .\n";
        let stmts = parse_all(input, None).unwrap();
        assert_eq!(stmts[0].object, Term::string("line\nbreak \"q\""));
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let input = "\n# comment\n<http://e.org/a> <http://e.org/p> \"x\" . # trailing\n";
        let stmts = parse_all(input, None).unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_syntax_errors_carry_line_numbers() {
        let input = "<http://e.org/a> <http://e.org/p> \"x\" .\n\"lit\" <http://e.org/p> \"x\" .\n";
        let err = parse_all(input, None).unwrap_err();
        match err {
            IrError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_dot_rejected() {
        let input = "<http://e.org/a> <http://e.org/p> \"x\"\n";
        assert!(parse_all(input, None).is_err());
    }

    #[test]
    fn test_sink_error_aborts() {
        let input = "<http://e.org/a> <http://e.org/p> \"x\" .\n<http://e.org/b> <http://e.org/p> \"y\" .\n";
        let mut seen = 0;
        let mut sink = FnSink(|_s: Statement| {
            seen += 1;
            Err(IrError::Handler("stop".into()))
        });
        let res = NQuadsParser::new().parse(&mut Cursor::new(input), None, &mut sink);
        assert!(res.is_err());
        assert_eq!(seen, 1);
    }
}
