use crate::checker::ast::*;
use crate::checker::lexer::{Lexer, Span, Token, TokenKind};

/// A recursive descent parser for checked source files.
pub struct Parser<'a> {
    filename: &'a str,
    tokens: Vec<Token>,
    current: usize,
    next_node: u32,
    next_func: u32,
    depth: usize,
}

/// Deepest nesting of statements, expressions and patterns accepted.
const MAX_NESTING: usize = 100;

/// Parses a standalone expression, as found inside a type-tag literal.
pub fn parse_expression(filename: &str, source: &str) -> Result<Expr, String> {
    let mut lexer = Lexer::new(filename, source);
    let tokens = lexer.scan_tokens()?;
    let mut parser = Parser::new(filename, tokens);
    let expr = parser.expression()?;
    if !parser.is_at_end() {
        return Err(parser.error("unexpected token after expression"));
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    pub fn new(filename: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            filename,
            tokens,
            current: 0,
            next_node: 0,
            next_func: 0,
            depth: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Program, String> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.statement()?);
        }

        Ok(Program {
            body,
            node_count: self.next_node as usize,
            function_count: self.next_func as usize,
        })
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    fn func_id(&mut self) -> FuncId {
        let id = FuncId(self.next_func);
        self.next_func += 1;
        id
    }

    // Statements

    fn statement(&mut self) -> Result<Stmt, String> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Stmt, String> {
        let span = self.current_span();
        match self.peek_kind() {
            Some(TokenKind::Var) | Some(TokenKind::Let) | Some(TokenKind::Const) => {
                let (kind, declarators) = self.var_declaration()?;
                self.consume_semi()?;
                Ok(Stmt::Var {
                    kind,
                    declarators,
                    span,
                })
            }
            Some(TokenKind::Function) => {
                self.advance();
                Ok(Stmt::Function(self.function(span, true)?))
            }
            Some(TokenKind::Return) => self.return_stmt(),
            Some(TokenKind::If) => self.if_stmt(),
            Some(TokenKind::While) => self.while_stmt(),
            Some(TokenKind::Do) => self.do_while_stmt(),
            Some(TokenKind::For) => self.for_stmt(),
            Some(TokenKind::LBrace) => Ok(Stmt::Block(self.block()?)),
            Some(TokenKind::Semi) => {
                self.advance();
                Ok(Stmt::Empty(span))
            }
            Some(TokenKind::Break) => {
                self.advance();
                self.consume_semi()?;
                Ok(Stmt::Break(span))
            }
            Some(TokenKind::Continue) => {
                self.advance();
                self.consume_semi()?;
                Ok(Stmt::Continue(span))
            }
            _ => {
                let expr = self.expression()?;
                self.consume_semi()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn var_declaration(&mut self) -> Result<(VarKind, Vec<Declarator>), String> {
        let kind = match self.peek_kind() {
            Some(TokenKind::Let) => VarKind::Let,
            Some(TokenKind::Const) => VarKind::Const,
            _ => VarKind::Var,
        };
        self.advance();

        let mut declarators = Vec::new();
        loop {
            let span = self.current_span();
            let target = self.binding_target()?;
            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.assignment()?)
            } else {
                None
            };
            declarators.push(Declarator { target, init, span });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok((kind, declarators))
    }

    fn block(&mut self) -> Result<Block, String> {
        let span = self.current_span();
        self.expect(&TokenKind::LBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.statement()?);
        }

        self.expect(&TokenKind::RBrace)?;

        Ok(Block { body, span })
    }

    fn return_stmt(&mut self) -> Result<Stmt, String> {
        let span = self.current_span();
        self.expect(&TokenKind::Return)?;

        let ends_here = self.check(&TokenKind::Semi)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.peek().is_some_and(|t| t.newline_before);
        let argument = if ends_here {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume_semi()?;

        Ok(Stmt::Return { argument, span })
    }

    fn if_stmt(&mut self) -> Result<Stmt, String> {
        let span = self.current_span();
        self.expect(&TokenKind::If)?;
        let test = self.paren_expression()?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            test,
            consequent,
            alternate,
            span,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, String> {
        let span = self.current_span();
        self.expect(&TokenKind::While)?;
        let test = self.paren_expression()?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { test, body, span })
    }

    fn do_while_stmt(&mut self) -> Result<Stmt, String> {
        let span = self.current_span();
        self.expect(&TokenKind::Do)?;
        let body = Box::new(self.statement()?);
        self.expect(&TokenKind::While)?;
        let test = self.paren_expression()?;
        self.match_token(&TokenKind::Semi);

        Ok(Stmt::DoWhile { body, test, span })
    }

    fn for_stmt(&mut self) -> Result<Stmt, String> {
        let span = self.current_span();
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LParen)?;

        let init = match self.peek_kind() {
            Some(TokenKind::Semi) => None,
            Some(TokenKind::Var) | Some(TokenKind::Let) | Some(TokenKind::Const) => {
                let (kind, declarators) = self.var_declaration()?;
                Some(ForInit::Var { kind, declarators })
            }
            _ => Some(ForInit::Expr(self.expression()?)),
        };
        self.expect(&TokenKind::Semi)?;

        let test = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semi)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::RParen)?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::For {
            init,
            test,
            update,
            body,
            span,
        })
    }

    fn paren_expression(&mut self) -> Result<Expr, String> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.expression()?;
        self.expect(&TokenKind::RParen)?;
        Ok(expr)
    }

    /// Automatic semicolon insertion: a missing `;` is accepted before `}`,
    /// at end of input, or when a line break precedes the next token.
    fn consume_semi(&mut self) -> Result<(), String> {
        if self.match_token(&TokenKind::Semi)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.peek().is_some_and(|t| t.newline_before)
        {
            Ok(())
        } else {
            Err(self.error("expected ';'"))
        }
    }

    // Functions

    /// Parses a `function` after its keyword: optional name, params, body.
    fn function(&mut self, span: Span, is_declaration: bool) -> Result<Function, String> {
        let node = self.node_id();
        let func = self.func_id();

        let name = if self.check_ident() {
            Some(self.ident()?)
        } else if is_declaration {
            return Err(self.error("expected function name"));
        } else {
            None
        };

        let params = self.params()?;
        let body = FunctionBody::Block(self.block()?);

        Ok(Function {
            node,
            func,
            name,
            params,
            body,
            is_arrow: false,
            is_declaration,
            span,
        })
    }

    fn params(&mut self) -> Result<Vec<Pattern>, String> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if self.check(&TokenKind::Ellipsis) {
                params.push(self.rest_pattern()?);
            } else {
                params.push(self.binding_element()?);
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn arrow_function(&mut self) -> Result<Expr, String> {
        let span = self.current_span();
        let node = self.node_id();
        let func = self.func_id();

        let params = if self.check(&TokenKind::LParen) {
            self.params()?
        } else {
            vec![self.ident_pattern()?]
        };
        self.expect(&TokenKind::Arrow)?;

        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(Box::new(self.assignment()?))
        };

        Ok(Expr {
            id: node,
            kind: ExprKind::Function(Function {
                node,
                func,
                name: None,
                params,
                body,
                is_arrow: true,
                is_declaration: false,
                span,
            }),
            span,
        })
    }

    /// Whether the `(` at the cursor opens an arrow function parameter list.
    fn is_arrow_ahead(&self) -> bool {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(self.current) {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self
                            .tokens
                            .get(i + 1)
                            .is_some_and(|t| t.kind == TokenKind::Arrow && !t.newline_before);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    // Binding patterns

    fn binding_target(&mut self) -> Result<Pattern, String> {
        self.nested(Self::binding_target_inner)
    }

    fn binding_target_inner(&mut self) -> Result<Pattern, String> {
        let span = self.current_span();
        match self.peek_kind() {
            Some(TokenKind::LBracket) => {
                self.advance();
                let id = self.node_id();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    if self.match_token(&TokenKind::Comma) {
                        elements.push(None);
                        continue;
                    }
                    if self.check(&TokenKind::Ellipsis) {
                        elements.push(Some(self.rest_pattern()?));
                    } else {
                        elements.push(Some(self.binding_element()?));
                    }
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(Pattern {
                    id,
                    kind: PatternKind::Array(elements),
                    span,
                })
            }
            Some(TokenKind::LBrace) => {
                self.advance();
                let id = self.node_id();
                let mut props = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    if self.check(&TokenKind::Ellipsis) {
                        props.push(PatternProp::Rest(self.rest_pattern()?));
                    } else {
                        let key_span = self.current_span();
                        let key = self.property_name()?;
                        let value = if self.match_token(&TokenKind::Colon) {
                            self.binding_element()?
                        } else {
                            let ident_id = self.node_id();
                            let ident = Pattern {
                                id: ident_id,
                                kind: PatternKind::Ident(Ident {
                                    id: ident_id,
                                    name: key.clone(),
                                    span: key_span,
                                }),
                                span: key_span,
                            };
                            self.with_default(ident)?
                        };
                        props.push(PatternProp::Prop { key, value });
                    }
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace)?;
                Ok(Pattern {
                    id,
                    kind: PatternKind::Object(props),
                    span,
                })
            }
            _ => self.ident_pattern(),
        }
    }

    /// A binding target optionally followed by `= default`.
    fn binding_element(&mut self) -> Result<Pattern, String> {
        let target = self.binding_target()?;
        self.with_default(target)
    }

    fn with_default(&mut self, target: Pattern) -> Result<Pattern, String> {
        if !self.match_token(&TokenKind::Eq) {
            return Ok(target);
        }
        let span = target.span;
        let id = self.node_id();
        let right = self.assignment()?;
        Ok(Pattern {
            id,
            kind: PatternKind::Assign {
                left: Box::new(target),
                right: Box::new(right),
            },
            span,
        })
    }

    fn rest_pattern(&mut self) -> Result<Pattern, String> {
        let span = self.current_span();
        self.expect(&TokenKind::Ellipsis)?;
        let id = self.node_id();
        let argument = self.binding_target()?;
        Ok(Pattern {
            id,
            kind: PatternKind::Rest(Box::new(argument)),
            span,
        })
    }

    fn ident_pattern(&mut self) -> Result<Pattern, String> {
        let ident = self.ident()?;
        Ok(Pattern {
            id: ident.id,
            span: ident.span,
            kind: PatternKind::Ident(ident),
        })
    }

    /// Reinterprets a parsed expression as a destructuring target.
    fn to_pattern(&self, expr: Expr) -> Result<Pattern, String> {
        let Expr { id, kind, span } = expr;
        let kind = match kind {
            ExprKind::Ident(ident) => PatternKind::Ident(ident),
            ExprKind::Array(elements) => {
                let mut patterns = Vec::new();
                for element in elements {
                    patterns.push(match element {
                        None => None,
                        Some(Element::Expr(expr)) => Some(self.to_pattern(expr)?),
                        Some(Element::Spread(spread)) => Some(Pattern {
                            id: spread.id,
                            kind: PatternKind::Rest(Box::new(self.to_pattern(*spread.argument)?)),
                            span: spread.span,
                        }),
                    });
                }
                PatternKind::Array(patterns)
            }
            ExprKind::Object(props) => {
                let mut patterns = Vec::new();
                for prop in props {
                    patterns.push(match prop {
                        Property::KeyValue {
                            key: PropKey::Name(key),
                            value,
                            ..
                        } => PatternProp::Prop {
                            key,
                            value: self.to_pattern(value)?,
                        },
                        Property::Spread(spread) => PatternProp::Rest(Pattern {
                            id: spread.id,
                            kind: PatternKind::Rest(Box::new(self.to_pattern(*spread.argument)?)),
                            span: spread.span,
                        }),
                        _ => return Err(self.error_at(span, "invalid destructuring target")),
                    });
                }
                PatternKind::Object(patterns)
            }
            ExprKind::Assign {
                target: AssignTarget::Pattern(left),
                value,
            } => PatternKind::Assign {
                left: Box::new(left),
                right: value,
            },
            _ => return Err(self.error_at(span, "invalid destructuring target")),
        };
        Ok(Pattern { id, kind, span })
    }

    // Expressions

    pub fn expression(&mut self) -> Result<Expr, String> {
        let first = self.assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let span = first.span;
        let mut expressions = vec![first];
        while self.match_token(&TokenKind::Comma) {
            expressions.push(self.assignment()?);
        }

        Ok(Expr {
            id: self.node_id(),
            kind: ExprKind::Sequence(expressions),
            span,
        })
    }

    fn assignment(&mut self) -> Result<Expr, String> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> Result<Expr, String> {
        if self.check_ident() && self.check_ahead(&TokenKind::Arrow, 1) {
            return self.arrow_function();
        }
        if self.check(&TokenKind::LParen) && self.is_arrow_ahead() {
            return self.arrow_function();
        }

        let left = self.conditional()?;
        if !self.match_token(&TokenKind::Eq) {
            return Ok(left);
        }

        let span = left.span;
        let target = match left.kind {
            ExprKind::Member { .. } => AssignTarget::Member(Box::new(left)),
            ExprKind::Ident(_) | ExprKind::Array(_) | ExprKind::Object(_) => {
                AssignTarget::Pattern(self.to_pattern(left)?)
            }
            _ => return Err(self.error_at(span, "invalid assignment target")),
        };
        let value = self.assignment()?;

        Ok(Expr {
            id: self.node_id(),
            kind: ExprKind::Assign {
                target,
                value: Box::new(value),
            },
            span,
        })
    }

    fn conditional(&mut self) -> Result<Expr, String> {
        let test = self.binary(1)?;
        if !self.match_token(&TokenKind::Question) {
            return Ok(test);
        }

        let span = test.span;
        let consequent = self.assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.assignment()?;

        Ok(Expr {
            id: self.node_id(),
            kind: ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        })
    }

    fn binary_precedence(&self) -> Option<(u8, BinaryKind)> {
        let kind = self.peek_kind()?;
        let entry = match kind {
            TokenKind::OrOr => (1, BinaryKind::Logical(LogicalOp::Or)),
            TokenKind::AndAnd => (2, BinaryKind::Logical(LogicalOp::And)),
            TokenKind::Pipe => (3, BinaryKind::Binary(BinaryOp::BitOr)),
            TokenKind::Caret => (4, BinaryKind::Binary(BinaryOp::BitXor)),
            TokenKind::Amp => (5, BinaryKind::Binary(BinaryOp::BitAnd)),
            TokenKind::EqEq => (6, BinaryKind::Binary(BinaryOp::Eq)),
            TokenKind::NotEq => (6, BinaryKind::Binary(BinaryOp::NotEq)),
            TokenKind::EqEqEq => (6, BinaryKind::Binary(BinaryOp::StrictEq)),
            TokenKind::NotEqEq => (6, BinaryKind::Binary(BinaryOp::StrictNotEq)),
            TokenKind::Lt => (7, BinaryKind::Binary(BinaryOp::Lt)),
            TokenKind::Le => (7, BinaryKind::Binary(BinaryOp::Le)),
            TokenKind::Gt => (7, BinaryKind::Binary(BinaryOp::Gt)),
            TokenKind::Ge => (7, BinaryKind::Binary(BinaryOp::Ge)),
            TokenKind::In => (7, BinaryKind::Binary(BinaryOp::In)),
            TokenKind::Instanceof => (7, BinaryKind::Binary(BinaryOp::Instanceof)),
            TokenKind::Shl => (8, BinaryKind::Binary(BinaryOp::Shl)),
            TokenKind::Shr => (8, BinaryKind::Binary(BinaryOp::Shr)),
            TokenKind::UShr => (8, BinaryKind::Binary(BinaryOp::UShr)),
            TokenKind::Plus => (9, BinaryKind::Binary(BinaryOp::Add)),
            TokenKind::Minus => (9, BinaryKind::Binary(BinaryOp::Sub)),
            TokenKind::Star => (10, BinaryKind::Binary(BinaryOp::Mul)),
            TokenKind::Slash => (10, BinaryKind::Binary(BinaryOp::Div)),
            TokenKind::Percent => (10, BinaryKind::Binary(BinaryOp::Mod)),
            _ => return None,
        };
        Some(entry)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, String> {
        let mut left = self.unary()?;

        while let Some((precedence, kind)) = self.binary_precedence() {
            if precedence < min_precedence {
                break;
            }
            self.advance();

            let span = left.span;
            let right = Box::new(self.binary(precedence + 1)?);
            let left_box = Box::new(left);
            let kind = match kind {
                BinaryKind::Logical(op) => ExprKind::Logical {
                    op,
                    left: left_box,
                    right,
                },
                BinaryKind::Binary(op) => ExprKind::Binary {
                    op,
                    left: left_box,
                    right,
                },
            };
            left = Expr {
                id: self.node_id(),
                kind,
                span,
            };
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        self.nested(Self::unary_inner)
    }

    fn unary_inner(&mut self) -> Result<Expr, String> {
        let span = self.current_span();
        let op = match self.peek_kind() {
            Some(TokenKind::Bang) => Some(UnaryOp::Not),
            Some(TokenKind::Tilde) => Some(UnaryOp::BitNot),
            Some(TokenKind::Plus) => Some(UnaryOp::Plus),
            Some(TokenKind::Minus) => Some(UnaryOp::Minus),
            Some(TokenKind::Typeof) => Some(UnaryOp::Typeof),
            Some(TokenKind::Void) => Some(UnaryOp::Void),
            Some(TokenKind::Delete) => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let argument = Box::new(self.unary()?);
            return Ok(Expr {
                id: self.node_id(),
                kind: ExprKind::Unary { op, argument },
                span,
            });
        }

        let update = match self.peek_kind() {
            Some(TokenKind::PlusPlus) => Some(UpdateOp::Increment),
            Some(TokenKind::MinusMinus) => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(op) = update {
            self.advance();
            let argument = Box::new(self.unary()?);
            return Ok(Expr {
                id: self.node_id(),
                kind: ExprKind::Update {
                    op,
                    prefix: true,
                    argument,
                },
                span,
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let expr = self.call_member()?;

        let op = match self.peek() {
            Some(token) if token.newline_before => None,
            Some(token) if token.kind == TokenKind::PlusPlus => Some(UpdateOp::Increment),
            Some(token) if token.kind == TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(expr);
        };
        self.advance();

        let span = expr.span;
        Ok(Expr {
            id: self.node_id(),
            kind: ExprKind::Update {
                op,
                prefix: false,
                argument: Box::new(expr),
            },
            span,
        })
    }

    fn call_member(&mut self) -> Result<Expr, String> {
        let mut expr = if self.check(&TokenKind::New) {
            self.new_expr()?
        } else {
            self.primary()?
        };

        loop {
            let span = expr.span;
            if self.check(&TokenKind::LParen) {
                let arguments = self.arguments()?;
                expr = Expr {
                    id: self.node_id(),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    span,
                };
            } else if self.check_member() {
                expr = self.member(expr)?;
            } else if self.check_template() {
                let quasi = self.template()?;
                expr = Expr {
                    id: self.node_id(),
                    kind: ExprKind::TaggedTemplate {
                        tag: Box::new(expr),
                        quasi,
                    },
                    span,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn check_member(&self) -> bool {
        self.check(&TokenKind::Dot) || self.check(&TokenKind::LBracket)
    }

    /// Parses `.name` or `[expr]` after `object`.
    fn member(&mut self, object: Expr) -> Result<Expr, String> {
        let property = if self.match_token(&TokenKind::Dot) {
            MemberProp::Name(self.property_name()?)
        } else {
            self.expect(&TokenKind::LBracket)?;
            let property = self.expression()?;
            self.expect(&TokenKind::RBracket)?;
            MemberProp::Computed(Box::new(property))
        };

        let span = object.span;
        Ok(Expr {
            id: self.node_id(),
            kind: ExprKind::Member {
                object: Box::new(object),
                property,
            },
            span,
        })
    }

    fn new_expr(&mut self) -> Result<Expr, String> {
        let span = self.current_span();
        self.expect(&TokenKind::New)?;

        let mut callee = if self.check(&TokenKind::New) {
            self.new_expr()?
        } else {
            self.primary()?
        };
        while self.check_member() {
            callee = self.member(callee)?;
        }

        let arguments = if self.check(&TokenKind::LParen) {
            self.arguments()?
        } else {
            Vec::new()
        };

        Ok(Expr {
            id: self.node_id(),
            kind: ExprKind::New {
                callee: Box::new(callee),
                arguments,
            },
            span,
        })
    }

    fn arguments(&mut self) -> Result<Vec<Element>, String> {
        self.expect(&TokenKind::LParen)?;
        let mut arguments = Vec::new();
        while !self.check(&TokenKind::RParen) {
            arguments.push(self.element()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn element(&mut self) -> Result<Element, String> {
        if self.check(&TokenKind::Ellipsis) {
            Ok(Element::Spread(self.spread()?))
        } else {
            Ok(Element::Expr(self.assignment()?))
        }
    }

    fn spread(&mut self) -> Result<Spread, String> {
        let span = self.current_span();
        self.expect(&TokenKind::Ellipsis)?;
        let id = self.node_id();
        let argument = Box::new(self.assignment()?);
        Ok(Spread { id, argument, span })
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let span = self.current_span();
        let Some(kind) = self.peek_kind().cloned() else {
            return Err(self.error("expected expression"));
        };

        let kind = match kind {
            TokenKind::Number(value) => {
                self.advance();
                ExprKind::Number(value)
            }
            TokenKind::BigInt(digits) => {
                self.advance();
                ExprKind::BigInt(digits)
            }
            TokenKind::Str(value) => {
                self.advance();
                ExprKind::Str(value)
            }
            TokenKind::Regex { pattern, flags } => {
                self.advance();
                ExprKind::Regex { pattern, flags }
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Null
            }
            TokenKind::This => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Template { .. } | TokenKind::TemplateHead { .. } => {
                ExprKind::Template(self.template()?)
            }
            TokenKind::Ident(_) => {
                let ident = self.ident()?;
                return Ok(Expr {
                    id: ident.id,
                    span: ident.span,
                    kind: ExprKind::Ident(ident),
                });
            }
            TokenKind::Function => {
                self.advance();
                let function = self.function(span, false)?;
                return Ok(Expr {
                    id: function.node,
                    kind: ExprKind::Function(function),
                    span,
                });
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::LBracket => {
                self.advance();
                let id = self.node_id();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    if self.match_token(&TokenKind::Comma) {
                        elements.push(None);
                        continue;
                    }
                    elements.push(Some(self.element()?));
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                return Ok(Expr {
                    id,
                    kind: ExprKind::Array(elements),
                    span,
                });
            }
            TokenKind::LBrace => {
                self.advance();
                let id = self.node_id();
                let properties = self.object_properties()?;
                return Ok(Expr {
                    id,
                    kind: ExprKind::Object(properties),
                    span,
                });
            }
            _ => return Err(self.error("expected expression")),
        };

        Ok(Expr {
            id: self.node_id(),
            kind,
            span,
        })
    }

    fn object_properties(&mut self) -> Result<Vec<Property>, String> {
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Ellipsis) {
                properties.push(Property::Spread(self.spread()?));
            } else {
                let key_span = self.current_span();
                let key = if self.match_token(&TokenKind::LBracket) {
                    let key = self.assignment()?;
                    self.expect(&TokenKind::RBracket)?;
                    PropKey::Computed(Box::new(key))
                } else {
                    PropKey::Name(self.property_name()?)
                };

                if self.match_token(&TokenKind::Colon) {
                    let value = self.assignment()?;
                    properties.push(Property::KeyValue {
                        key,
                        value,
                        shorthand: false,
                    });
                } else if self.check(&TokenKind::LParen) {
                    let node = self.node_id();
                    let func = self.func_id();
                    let params = self.params()?;
                    let body = FunctionBody::Block(self.block()?);
                    properties.push(Property::Method {
                        key,
                        function: Function {
                            node,
                            func,
                            name: None,
                            params,
                            body,
                            is_arrow: false,
                            is_declaration: false,
                            span: key_span,
                        },
                    });
                } else {
                    let PropKey::Name(name) = &key else {
                        return Err(self.error("expected ':' after computed property key"));
                    };
                    let id = self.node_id();
                    let value = Expr {
                        id,
                        kind: ExprKind::Ident(Ident {
                            id,
                            name: name.clone(),
                            span: key_span,
                        }),
                        span: key_span,
                    };
                    properties.push(Property::KeyValue {
                        key,
                        value,
                        shorthand: true,
                    });
                }
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(properties)
    }

    fn check_template(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(TokenKind::Template { .. }) | Some(TokenKind::TemplateHead { .. })
        )
    }

    fn template(&mut self) -> Result<Template, String> {
        let span = self.current_span();
        let mut quasis = Vec::new();
        let mut expressions = Vec::new();

        match self.peek_kind().cloned() {
            Some(TokenKind::Template { cooked, raw }) => {
                self.advance();
                quasis.push(TemplateElement { cooked, raw, span });
            }
            Some(TokenKind::TemplateHead { cooked, raw }) => {
                self.advance();
                quasis.push(TemplateElement { cooked, raw, span });
                loop {
                    expressions.push(self.expression()?);
                    let part_span = self.current_span();
                    match self.peek_kind().cloned() {
                        Some(TokenKind::TemplateMiddle { cooked, raw }) => {
                            self.advance();
                            quasis.push(TemplateElement {
                                cooked,
                                raw,
                                span: part_span,
                            });
                        }
                        Some(TokenKind::TemplateTail { cooked, raw }) => {
                            self.advance();
                            quasis.push(TemplateElement {
                                cooked,
                                raw,
                                span: part_span,
                            });
                            break;
                        }
                        _ => return Err(self.error("expected '}' in template literal")),
                    }
                }
            }
            _ => return Err(self.error("expected template literal")),
        }

        Ok(Template {
            quasis,
            expressions,
            span,
        })
    }

    // Helper methods

    fn ident(&mut self) -> Result<Ident, String> {
        let span = self.current_span();
        if let Some(TokenKind::Ident(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            Ok(Ident {
                id: self.node_id(),
                name,
                span,
            })
        } else {
            Err(self.error("expected identifier"))
        }
    }

    /// Identifier, keyword, string or number used as a property name.
    fn property_name(&mut self) -> Result<String, String> {
        let name = match self.peek_kind() {
            Some(TokenKind::Ident(name)) | Some(TokenKind::Str(name)) => name.clone(),
            Some(TokenKind::Number(value)) => crate::runtime::js_number(*value),
            Some(kind) => match keyword_text(kind) {
                Some(text) => text.to_string(),
                None => return Err(self.error("expected property name")),
            },
            None => return Err(self.error("expected property name")),
        };
        self.advance();
        Ok(name)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn check_ident(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
    }

    fn check_ahead(&self, kind: &TokenKind, offset: usize) -> bool {
        self.tokens
            .get(self.current + offset)
            .map(|t| &t.kind)
            == Some(kind)
    }

    fn advance(&mut self) -> Option<&Token> {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens.get(self.current - 1)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), String> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", kind)))
        }
    }

    fn current_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or(Span::new(1, 1))
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(&format!("nesting exceeds {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn error(&self, message: &str) -> String {
        self.error_at(self.current_span(), message)
    }

    fn error_at(&self, span: Span, message: &str) -> String {
        format!(
            "error: {}\n  --> {}:{}:{}",
            message, self.filename, span.line, span.column
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum BinaryKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    let text = match kind {
        TokenKind::Var => "var",
        TokenKind::Let => "let",
        TokenKind::Const => "const",
        TokenKind::Function => "function",
        TokenKind::Return => "return",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::While => "while",
        TokenKind::Do => "do",
        TokenKind::For => "for",
        TokenKind::Break => "break",
        TokenKind::Continue => "continue",
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        TokenKind::New => "new",
        TokenKind::Typeof => "typeof",
        TokenKind::Void => "void",
        TokenKind::Delete => "delete",
        TokenKind::In => "in",
        TokenKind::Instanceof => "instanceof",
        TokenKind::This => "this",
        _ => return None,
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Program, String> {
        let mut lexer = Lexer::new("test.js", source);
        let tokens = lexer.scan_tokens()?;
        let mut parser = Parser::new("test.js", tokens);
        parser.parse()
    }

    fn single_expr(source: &str) -> Expr {
        let program = parse(source).unwrap();
        match program.body.into_iter().next() {
            Some(Stmt::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_var_declaration() {
        let program = parse("var x = int`42`, y;").unwrap();
        assert_eq!(program.body.len(), 1);
        match &program.body[0] {
            Stmt::Var {
                kind, declarators, ..
            } => {
                assert_eq!(*kind, VarKind::Var);
                assert_eq!(declarators.len(), 2);
                assert_eq!(declarators[0].target.as_ident().unwrap().name, "x");
                match &declarators[0].init.as_ref().unwrap().kind {
                    ExprKind::TaggedTemplate { tag, quasi } => {
                        assert_eq!(tag.as_ident().unwrap().name, "int");
                        assert_eq!(quasi.quasis[0].raw, "42");
                    }
                    other => panic!("expected tagged template, got {:?}", other),
                }
                assert!(declarators[1].init.is_none());
            }
            other => panic!("expected var, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = single_expr("a + b * c;");
        match expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("expected addition, got {:?}", other),
        }

        let expr = single_expr("a || b && c;");
        match expr.kind {
            ExprKind::Logical {
                op: LogicalOp::Or,
                right,
                ..
            } => assert!(matches!(right.kind, ExprKind::Logical { op: LogicalOp::And, .. })),
            other => panic!("expected logical or, got {:?}", other),
        }
    }

    #[test]
    fn test_functions_and_arrows() {
        let program = parse(
            "function foo(a, b = int`1`, ...rest) { return a; }\nvar f = (x) => x + 1;\nvar g = y => { return y; };",
        )
        .unwrap();
        assert_eq!(program.function_count, 3);
        match &program.body[0] {
            Stmt::Function(function) => {
                assert_eq!(function.name.as_ref().unwrap().name, "foo");
                assert_eq!(function.params.len(), 3);
                assert!(matches!(function.params[1].kind, PatternKind::Assign { .. }));
                assert!(matches!(function.params[2].kind, PatternKind::Rest(_)));
                assert!(function.is_declaration);
            }
            other => panic!("expected function, got {:?}", other),
        }
        match &program.body[1] {
            Stmt::Var { declarators, .. } => {
                let init = declarators[0].init.as_ref().unwrap();
                let function = init.as_function().unwrap();
                assert!(function.is_arrow);
                assert_eq!(function.node, init.id);
                assert!(matches!(function.body, FunctionBody::Expr(_)));
            }
            other => panic!("expected var, got {:?}", other),
        }
    }

    #[test]
    fn test_destructuring_assignment() {
        let expr = single_expr("[a, [b], c = 3] = x;");
        match expr.kind {
            ExprKind::Assign {
                target: AssignTarget::Pattern(pattern),
                ..
            } => match pattern.kind {
                PatternKind::Array(elements) => {
                    assert_eq!(elements.len(), 3);
                    assert!(matches!(
                        elements[1].as_ref().unwrap().kind,
                        PatternKind::Array(_)
                    ));
                    assert!(matches!(
                        elements[2].as_ref().unwrap().kind,
                        PatternKind::Assign { .. }
                    ));
                }
                other => panic!("expected array pattern, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_template_with_expressions() {
        let expr = single_expr("int`${x}`;");
        match expr.kind {
            ExprKind::TaggedTemplate { quasi, .. } => {
                assert_eq!(quasi.quasis.len(), 2);
                assert_eq!(quasi.expressions.len(), 1);
            }
            other => panic!("expected tagged template, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_tag() {
        let expr = single_expr("array`int[]``[1, 2]`;");
        match expr.kind {
            ExprKind::TaggedTemplate { tag, .. } => {
                assert!(matches!(tag.kind, ExprKind::TaggedTemplate { .. }))
            }
            other => panic!("expected tagged template, got {:?}", other),
        }
    }

    #[test]
    fn test_automatic_semicolons() {
        let program = parse("var a = 1\nvar b = 2\nfoo(a)\nreturn\n").unwrap();
        assert_eq!(program.body.len(), 4);
        assert!(matches!(program.body[3], Stmt::Return { argument: None, .. }));
    }

    #[test]
    fn test_member_and_new() {
        let expr = single_expr("new Foo(1).bar[0](2);");
        assert!(matches!(expr.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_object_literal() {
        let expr = single_expr("x = { a: 1, b, 'c': 2, m() { return 1; }, ...rest };");
        match expr.kind {
            ExprKind::Assign { value, .. } => match value.kind {
                ExprKind::Object(properties) => assert_eq!(properties.len(), 5),
                other => panic!("expected object, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_control_flow() {
        let program = parse(
            "if (a) { b(); } else if (c) d(); while (x) {} do { y(); } while (z); for (var i = 0; i < 3; i++) {}",
        )
        .unwrap();
        assert_eq!(program.body.len(), 4);
    }

    #[test]
    fn test_errors() {
        assert!(parse("var = 1;").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("1 = 2;").is_err());
        let err = parse("foo(1;").unwrap_err();
        assert!(err.contains("test.js:1:"));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("var a = {}1{};", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse(&deep).unwrap_err();
        assert!(err.contains("nesting exceeds"), "{}", err);

        let unary = format!("var a = {}1;", "!".repeat(20_000));
        assert!(parse(&unary).unwrap_err().contains("nesting exceeds"));

        let blocks = format!("{}{}", "{".repeat(20_000), "}".repeat(20_000));
        assert!(parse(&blocks).unwrap_err().contains("nesting exceeds"));

        let shallow = format!("var a = {}1{};", "[".repeat(30), "]".repeat(30));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn test_parse_expression() {
        let expr = parse_expression("literal", "[1, 'a', [2]]").unwrap();
        assert!(matches!(expr.kind, ExprKind::Array(_)));
        assert!(parse_expression("literal", "1 2").is_err());
    }
}
