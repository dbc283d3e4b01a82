//! Property tests for comment stripping.

use proptest::prelude::*;

use sqldeploy_core::sanitize::strip_comments;

/// A line of generated script text.
#[derive(Debug, Clone)]
enum Piece {
    Code,
    CodeWithLineComment(String),
    BlockComment(usize),
    CodeAroundBlockComment(usize),
    Blank,
}

fn piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        Just(Piece::Code),
        "[a-z /*'-]{0,12}".prop_map(Piece::CodeWithLineComment),
        (0usize..4).prop_map(Piece::BlockComment),
        (0usize..4).prop_map(Piece::CodeAroundBlockComment),
        Just(Piece::Blank),
    ]
}

/// Renders the pieces and returns the text plus the line each code token
/// starts on.
fn render(pieces: &[Piece]) -> (String, Vec<(String, usize)>) {
    let mut text = String::new();
    let mut tokens = Vec::new();
    let mut line = 1;

    for (idx, piece) in pieces.iter().enumerate() {
        let token = format!("tok{idx}");
        match piece {
            Piece::Code => {
                text.push_str(&format!("select {token};"));
                tokens.push((token, line));
            }
            Piece::CodeWithLineComment(comment) => {
                text.push_str(&format!("select {token}; --{comment}"));
                tokens.push((token, line));
            }
            Piece::BlockComment(breaks) => {
                text.push_str(&format!("/* c{}*/", "\nx".repeat(*breaks)));
                line += breaks;
            }
            Piece::CodeAroundBlockComment(breaks) => {
                text.push_str(&format!("/*{}*/ select {token};", "\n".repeat(*breaks)));
                line += breaks;
                tokens.push((token, line));
            }
            Piece::Blank => {}
        }
        text.push('\n');
        line += 1;
    }

    (text, tokens)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: stripping keeps the line count and every code line's position.
    #[test]
    fn property_code_keeps_its_line(pieces in proptest::collection::vec(piece(), 0..24)) {
        let (text, tokens) = render(&pieces);
        let sanitized = strip_comments(&text).unwrap();

        prop_assert_eq!(sanitized.matches('\n').count(), text.matches('\n').count());

        let lines: Vec<&str> = sanitized.split('\n').collect();
        for (token, line) in tokens {
            prop_assert!(
                lines[line - 1].contains(&format!("select {token};")),
                "{} not on line {} of {:?}", token, line, sanitized
            );
        }
    }

    /// PROPERTY: text without comment markers is returned unchanged.
    #[test]
    fn property_plain_text_unchanged(text in "[a-zA-Z0-9 ;,()\n]{0,200}") {
        prop_assert_eq!(strip_comments(&text).unwrap(), text);
    }
}
