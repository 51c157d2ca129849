//! Concrete syntax tree for formula text.
//!
//! The only structure the parser recovers is the function call: an
//! identifier followed (after optional whitespace) by `(`. Everything else
//! stays a flat run of token leaves. Argument slices split on top-level `,`
//! or `;` and keep their separator as the last node, so serializing a tree
//! reproduces the input exactly.

use crate::tokenizer::{tokenize, Token, TokenKind};
use std::fmt;

/// A CST node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A plain token
    Token(Token),
    /// `NAME ( args... )`
    Call(FunctionCall),
}

/// A function call with every token it spans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: Token,
    /// Whitespace between the name and `(`
    pub pre_paren_whitespace: Vec<Token>,
    pub lparen: Token,
    /// Argument slices; all but the last end with their separator token
    pub args: Vec<Vec<Node>>,
    /// Missing when the input ends before the call is closed
    pub rparen: Option<Token>,
}

impl Node {
    /// Append this node's source text to `out`
    pub fn write_to(&self, out: &mut String) {
        match self {
            Node::Token(token) => out.push_str(&token.text),
            Node::Call(call) => call.write_to(out),
        }
    }

    /// The token of a leaf node
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Node::Token(token) => Some(token),
            Node::Call(_) => None,
        }
    }
}

impl FunctionCall {
    /// Check the call name, ignoring case
    pub fn is_named(&self, name: &str) -> bool {
        self.name.text.eq_ignore_ascii_case(name)
    }

    /// Append this call's source text to `out`
    pub fn write_to(&self, out: &mut String) {
        out.push_str(&self.name.text);
        for ws in &self.pre_paren_whitespace {
            out.push_str(&ws.text);
        }
        out.push_str(&self.lparen.text);
        for arg in &self.args {
            for node in arg {
                node.write_to(out);
            }
        }
        if let Some(rparen) = &self.rparen {
            out.push_str(&rparen.text);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

/// Serialize a node sequence back to text
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.write_to(&mut out);
    }
    out
}

/// Recursive descent parser over a token slice
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser over `tokens`
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parse every remaining token
    pub fn parse(mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        while self.pos < self.tokens.len() {
            nodes.push(self.parse_next());
        }
        nodes
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    /// Number of whitespace tokens before a `(` that follows the cursor, if any
    fn call_lookahead(&self) -> Option<usize> {
        let mut ahead = self.pos + 1;
        while let Some(token) = self.tokens.get(ahead) {
            match token.kind {
                TokenKind::Whitespace => ahead += 1,
                TokenKind::LParen => return Some(ahead - self.pos - 1),
                _ => return None,
            }
        }
        None
    }

    /// Parse one node; the cursor must be on a token
    fn parse_next(&mut self) -> Node {
        if let Some(token) = self.peek() {
            if token.is_identifier() {
                if let Some(whitespace) = self.call_lookahead() {
                    return Node::Call(self.parse_call(whitespace));
                }
            }
        }
        Node::Token(self.bump())
    }

    fn parse_call(&mut self, whitespace: usize) -> FunctionCall {
        let name = self.bump();
        let pre_paren_whitespace = (0..whitespace).map(|_| self.bump()).collect();
        let lparen = self.bump();

        let mut args = Vec::new();
        let mut current = Vec::new();
        // Closers owed by brackets opened inside the current argument
        let mut open: Vec<TokenKind> = Vec::new();
        let mut rparen = None;

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::RParen if !open.contains(&TokenKind::RParen) => {
                    rparen = Some(self.bump());
                    break;
                },
                TokenKind::Comma | TokenKind::Semicolon if open.is_empty() => {
                    current.push(Node::Token(self.bump()));
                    args.push(std::mem::take(&mut current));
                },
                TokenKind::LParen => {
                    open.push(TokenKind::RParen);
                    current.push(Node::Token(self.bump()));
                },
                TokenKind::LBrace => {
                    open.push(TokenKind::RBrace);
                    current.push(Node::Token(self.bump()));
                },
                TokenKind::LBracket => {
                    open.push(TokenKind::RBracket);
                    current.push(Node::Token(self.bump()));
                },
                kind @ (TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket) => {
                    // Close the matching opener and anything left open inside it
                    if let Some(index) = open.iter().rposition(|k| *k == kind) {
                        open.truncate(index);
                    }
                    current.push(Node::Token(self.bump()));
                },
                _ => current.push(self.parse_next()),
            }
        }

        if !current.is_empty() {
            args.push(current);
        }

        FunctionCall {
            name,
            pre_paren_whitespace,
            lparen,
            args,
            rparen,
        }
    }
}

/// Tokenize and parse formula text
pub fn parse(input: &str) -> Vec<Node> {
    let tokens = tokenize(input);
    Parser::new(&tokens).parse()
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn formula() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![
            "[A-Z][A-Z0-9_]{0,6}",
            "[0-9]{1,4}",
            Just("\"text\"".to_string()),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                (inner.clone(), "[+*/&-]", inner.clone()).prop_map(|(a, op, b)| format!("{}{}{}", a, op, b)),
                (
                    "[A-Z]{1,6}",
                    " ?",
                    prop::collection::vec(inner.clone(), 0..4),
                    prop_oneof![Just(","), Just(", "), Just(";")]
                )
                    .prop_map(|(name, ws, args, sep)| format!("{}{}({})", name, ws, args.join(sep))),
                inner.prop_map(|e| format!("({})", e)),
            ]
        })
    }

    proptest! {
        #[test]
        fn parse_round_trips_grammar(input in formula()) {
            let text = format!("={}", input);
            prop_assert_eq!(serialize(&parse(&text)), text);
        }

        #[test]
        fn parse_round_trips_any_text(input in any::<String>()) {
            prop_assert_eq!(serialize(&parse(&input)), input);
        }
    }
}
