//! Parser for textual array-shape descriptors such as `<int[],string>[]`.
//!
//! A descriptor is a sequence of type names combined with postfix `[]`
//! (array-of), `[+]` (non-empty array-of), `<a,b>` tuples and `(...)`
//! grouping. Tokens feed a stack of open groups; a type name is only valid
//! where no shape has been completed yet in the innermost group.

use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

use super::shape::{ArrayShape, Contents, Member, TypeName};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("empty shape descriptor")]
    Empty,
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unexpected type '{name}' at offset {offset}, expected `[]`, `,` or a closing bracket")]
    ConsecutiveTypes { name: String, offset: usize },
    #[error("`{token}` at offset {offset} does not follow a shape")]
    MissingOperand { token: &'static str, offset: usize },
    #[error("unexpected `{token}` at offset {offset} after a complete shape")]
    UnexpectedOpen { token: char, offset: usize },
    #[error("`,` at offset {offset} is outside of a tuple")]
    CommaOutsideTuple { offset: usize },
    #[error("missing tuple member before `{token}` at offset {offset}")]
    MissingMember { token: char, offset: usize },
    #[error("empty tuple `<>` at offset {offset}")]
    EmptyTuple { offset: usize },
    #[error("empty group `()` at offset {offset}")]
    EmptyGroup { offset: usize },
    #[error("unmatched `{token}` at offset {offset}")]
    Unmatched { token: char, offset: usize },
    #[error("unterminated `{opener}` opened at offset {offset}")]
    Unterminated { opener: char, offset: usize },
    #[error("shape '{0}' is not an array")]
    NotAnArray(String),
}

#[derive(Debug, Clone)]
enum Token {
    Name(String),
    ArrayOf { non_empty: bool },
    LParen,
    RParen,
    LAngle,
    RAngle,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, DescriptorError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '<' => Token::LAngle,
            '>' => Token::RAngle,
            ',' => Token::Comma,
            '[' => {
                skip_whitespace(&mut chars);
                let non_empty = matches!(chars.peek(), Some((_, '+')));
                if non_empty {
                    chars.next();
                    skip_whitespace(&mut chars);
                }
                match chars.next() {
                    Some((_, ']')) => Token::ArrayOf { non_empty },
                    Some((offset, ch)) => return Err(DescriptorError::UnexpectedChar { ch, offset }),
                    None => return Err(DescriptorError::Unterminated { opener: '[', offset }),
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let mut name = c.to_string();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Name(name)
            }
            ch => return Err(DescriptorError::UnexpectedChar { ch, offset }),
        };
        tokens.push((token, offset));
    }

    Ok(tokens)
}

fn skip_whitespace(chars: &mut Peekable<CharIndices<'_>>) {
    while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
}

/// Parse tree before conversion into shapes. Groups leave no trace.
#[derive(Debug, Clone)]
enum Node {
    Name(String),
    ArrayOf(Box<Node>, bool),
    Tuple(Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FrameKind {
    Root,
    Group,
    Tuple,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    offset: usize,
    members: Vec<Node>,
    current: Option<Node>,
}

impl Frame {
    fn new(kind: FrameKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            members: Vec::new(),
            current: None,
        }
    }
}

fn parse_tree(input: &str) -> Result<Node, DescriptorError> {
    let mut stack = vec![Frame::new(FrameKind::Root, 0)];

    for (token, offset) in tokenize(input)? {
        let top = stack.last_mut().ok_or(DescriptorError::Empty)?;
        match token {
            Token::Name(name) => {
                if top.current.is_some() {
                    return Err(DescriptorError::ConsecutiveTypes { name, offset });
                }
                top.current = Some(Node::Name(name));
            }
            Token::ArrayOf { non_empty } => match top.current.take() {
                Some(inner) => top.current = Some(Node::ArrayOf(Box::new(inner), non_empty)),
                None => {
                    let token = if non_empty { "[+]" } else { "[]" };
                    return Err(DescriptorError::MissingOperand { token, offset });
                }
            },
            Token::LParen => open(&mut stack, FrameKind::Group, '(', offset)?,
            Token::LAngle => open(&mut stack, FrameKind::Tuple, '<', offset)?,
            Token::Comma => {
                if top.kind != FrameKind::Tuple {
                    return Err(DescriptorError::CommaOutsideTuple { offset });
                }
                match top.current.take() {
                    Some(member) => top.members.push(member),
                    None => return Err(DescriptorError::MissingMember { token: ',', offset }),
                }
            }
            Token::RParen => {
                if top.kind != FrameKind::Group {
                    return Err(DescriptorError::Unmatched { token: ')', offset });
                }
                let Some(inner) = top.current.take() else {
                    return Err(DescriptorError::EmptyGroup { offset: top.offset });
                };
                stack.pop();
                close_into(&mut stack, inner);
            }
            Token::RAngle => {
                if top.kind != FrameKind::Tuple {
                    return Err(DescriptorError::Unmatched { token: '>', offset });
                }
                match top.current.take() {
                    Some(member) => top.members.push(member),
                    None if top.members.is_empty() => {
                        return Err(DescriptorError::EmptyTuple { offset: top.offset });
                    }
                    None => return Err(DescriptorError::MissingMember { token: '>', offset }),
                }
                let members = std::mem::take(&mut top.members);
                stack.pop();
                close_into(&mut stack, Node::Tuple(members));
            }
        }
    }

    let top = stack.pop().ok_or(DescriptorError::Empty)?;
    match top.kind {
        FrameKind::Root => top.current.ok_or(DescriptorError::Empty),
        FrameKind::Group => Err(DescriptorError::Unterminated {
            opener: '(',
            offset: top.offset,
        }),
        FrameKind::Tuple => Err(DescriptorError::Unterminated {
            opener: '<',
            offset: top.offset,
        }),
    }
}

fn open(stack: &mut Vec<Frame>, kind: FrameKind, token: char, offset: usize) -> Result<(), DescriptorError> {
    if stack.last().is_some_and(|top| top.current.is_some()) {
        return Err(DescriptorError::UnexpectedOpen { token, offset });
    }
    stack.push(Frame::new(kind, offset));
    Ok(())
}

fn close_into(stack: &mut [Frame], node: Node) {
    // openers are only pushed when the enclosing frame has no current shape
    if let Some(parent) = stack.last_mut() {
        parent.current = Some(node);
    }
}

fn describe(node: &Node) -> String {
    match node {
        Node::Name(name) => name.clone(),
        Node::ArrayOf(inner, non_empty) => {
            format!("{}{}", describe(inner), if *non_empty { "[+]" } else { "[]" })
        }
        Node::Tuple(members) => {
            let members = members.iter().map(describe).collect::<Vec<_>>().join(",");
            format!("<{}>", members)
        }
    }
}

fn to_shape(node: &Node) -> Option<ArrayShape> {
    let description = describe(node);
    match node {
        Node::Name(_) => None,
        Node::ArrayOf(inner, non_empty) => {
            let contains = match inner.as_ref() {
                Node::Name(name) => Contents::Simple(TypeName::parse(name)),
                other => Contents::Nested(Box::new(to_shape(other)?)),
            };
            Some(ArrayShape {
                contains,
                non_empty: *non_empty,
                description,
            })
        }
        Node::Tuple(members) => {
            let members = members
                .iter()
                .map(|member| match member {
                    Node::Name(name) => Some(Member::Simple(TypeName::parse(name))),
                    other => to_shape(other).map(Member::Shape),
                })
                .collect::<Option<Vec<_>>>()?;
            Some(ArrayShape {
                contains: Contents::Tuple(members),
                non_empty: false,
                description,
            })
        }
    }
}

/// Parses a descriptor into an array shape.
///
/// A descriptor that is a bare type name (or a group around one) is rejected,
/// since it describes no array.
pub fn parse_shape(input: &str) -> Result<ArrayShape, DescriptorError> {
    tracing::trace!(descriptor = input, "parsing shape descriptor");
    let tree = parse_tree(input)?;
    to_shape(&tree).ok_or_else(|| DescriptorError::NotAnArray(describe(&tree)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::types::TypeId;

    fn description(input: &str) -> String {
        parse_shape(input).unwrap().description
    }

    #[test]
    fn test_descriptions_round_trip() {
        for input in ["int[]", "string[][]", "<int,string>", "<int,string>[]", "<int[],string>"] {
            assert_eq!(description(input), input);
        }
    }

    #[test]
    fn test_whitespace_and_groups_are_dropped() {
        assert_eq!(description(" < int , string > [ ] "), "<int,string>[]");
        assert_eq!(description("(int[])[]"), "int[][]");
        assert_eq!(description("((int))[+]"), "int[+]");
        assert_eq!(description("int[ ]"), "int[]");
        assert_eq!(description("string[ + ]"), "string[+]");
        assert!(matches!(parse_shape("int[ x]"), Err(DescriptorError::UnexpectedChar { ch: 'x', offset: 5 })));
    }

    #[test]
    fn test_simple_array() {
        let shape = parse_shape("int[]").unwrap();
        assert_eq!(shape.contains, Contents::Simple(TypeName::Builtin(TypeId::Int)));
        assert!(!shape.non_empty);
    }

    #[test]
    fn test_non_empty_array() {
        let shape = parse_shape("string[+]").unwrap();
        assert!(shape.non_empty);
        assert_eq!(shape.description, "string[+]");
    }

    #[test]
    fn test_nested_array() {
        let shape = parse_shape("int[][]").unwrap();
        match shape.contains {
            Contents::Nested(inner) => {
                assert_eq!(inner.description, "int[]");
                assert_eq!(inner.contains, Contents::Simple(TypeName::Builtin(TypeId::Int)));
            }
            other => panic!("expected nested contents, got {:?}", other),
        }
    }

    #[test]
    fn test_top_level_tuple_is_not_wrapped() {
        let shape = parse_shape("<int[],string>").unwrap();
        match shape.contains {
            Contents::Tuple(members) => {
                assert_eq!(members.len(), 2);
                assert!(matches!(&members[0], Member::Shape(s) if s.description == "int[]"));
                assert_eq!(members[1], Member::Simple(TypeName::Builtin(TypeId::String)));
            }
            other => panic!("expected tuple contents, got {:?}", other),
        }
    }

    #[test]
    fn test_array_of_tuples() {
        let shape = parse_shape("<int,string>[]").unwrap();
        assert!(matches!(shape.contains, Contents::Nested(ref inner) if inner.is_tuple()));
    }

    #[test]
    fn test_custom_type_names() {
        let shape = parse_shape("Point[]").unwrap();
        assert_eq!(shape.contains, Contents::Simple(TypeName::Named("Point".to_string())));
    }

    #[test]
    fn test_bare_type_is_not_an_array() {
        assert_eq!(parse_shape("int"), Err(DescriptorError::NotAnArray("int".to_string())));
        assert_eq!(parse_shape("(int)"), Err(DescriptorError::NotAnArray("int".to_string())));
        let err = parse_shape("int").unwrap_err();
        assert!(err.to_string().contains("not an array"));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(parse_shape(""), Err(DescriptorError::Empty));
        assert_eq!(parse_shape("   "), Err(DescriptorError::Empty));
        assert!(matches!(
            parse_shape("int string[]"),
            Err(DescriptorError::ConsecutiveTypes { .. })
        ));
        assert!(matches!(
            parse_shape("int[] string"),
            Err(DescriptorError::ConsecutiveTypes { .. })
        ));
        assert!(matches!(parse_shape("int,string"), Err(DescriptorError::CommaOutsideTuple { offset: 3 })));
        assert!(matches!(parse_shape("<>"), Err(DescriptorError::EmptyTuple { offset: 0 })));
        assert!(matches!(parse_shape("()[]"), Err(DescriptorError::EmptyGroup { .. })));
        assert!(matches!(parse_shape("<,int>"), Err(DescriptorError::MissingMember { token: ',', .. })));
        assert!(matches!(parse_shape("<int,>"), Err(DescriptorError::MissingMember { token: '>', .. })));
        assert!(matches!(parse_shape("<int,,string>"), Err(DescriptorError::MissingMember { .. })));
        assert!(matches!(parse_shape("[]"), Err(DescriptorError::MissingOperand { token: "[]", .. })));
        assert!(matches!(parse_shape("int[]>"), Err(DescriptorError::Unmatched { token: '>', .. })));
        assert!(matches!(parse_shape("(int>"), Err(DescriptorError::Unmatched { token: '>', .. })));
        assert!(matches!(parse_shape("(int|string)[]"), Err(DescriptorError::UnexpectedChar { ch: '|', .. })));
        assert!(matches!(parse_shape("int[x]"), Err(DescriptorError::UnexpectedChar { ch: 'x', .. })));
        assert!(matches!(parse_shape("int<string>"), Err(DescriptorError::UnexpectedOpen { token: '<', .. })));
    }

    #[test]
    fn test_unterminated_names_opener() {
        assert_eq!(
            parse_shape("<int,(string[]"),
            Err(DescriptorError::Unterminated { opener: '(', offset: 5 })
        );
        assert_eq!(
            parse_shape("  <int,string"),
            Err(DescriptorError::Unterminated { opener: '<', offset: 2 })
        );
        assert_eq!(
            parse_shape("int["),
            Err(DescriptorError::Unterminated { opener: '[', offset: 3 })
        );
    }
}
