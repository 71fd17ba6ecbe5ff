use std::fmt;

#[derive(Debug, PartialEq, Clone)]
pub struct Prototype {
    pub name: String,
    pub args: Vec<String>,
}

impl Prototype {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Prototype {
            name: name.into(),
            args,
        }
    }

    /// the nameless prototype wrapping a bare top-level expression
    pub fn anonymous() -> Self {
        Prototype::new("", Vec::new())
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(f64),
    Variable(String),
    Binary(char, Box<Expression>, Box<Expression>),
    Call(String, Vec<Expression>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub prototype: Prototype,
    pub body: Expression,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ASTNode {
    Extern(Prototype),
    Function(Function),
}

/// A consumer of the tree, one method per concrete node kind.
///
/// `Expr` is what visiting an expression yields, `Item` what visiting a
/// prototype or a function yields.
pub trait Visitor {
    type Expr;
    type Item;

    fn visit_literal(&mut self, value: f64) -> Self::Expr;
    fn visit_variable(&mut self, name: &str) -> Self::Expr;
    fn visit_binary(&mut self, op: char, lhs: &Expression, rhs: &Expression) -> Self::Expr;
    fn visit_call(&mut self, callee: &str, args: &[Expression]) -> Self::Expr;
    fn visit_prototype(&mut self, proto: &Prototype) -> Self::Item;
    fn visit_function(&mut self, function: &Function) -> Self::Item;
}

impl Expression {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Expr {
        match self {
            Expression::Literal(value) => visitor.visit_literal(*value),
            Expression::Variable(name) => visitor.visit_variable(name),
            Expression::Binary(op, lhs, rhs) => visitor.visit_binary(*op, lhs, rhs),
            Expression::Call(callee, args) => visitor.visit_call(callee, args),
        }
    }
}

impl Prototype {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Item {
        visitor.visit_prototype(self)
    }
}

impl Function {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Item {
        visitor.visit_function(self)
    }
}

impl ASTNode {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Item {
        match self {
            ASTNode::Extern(proto) => proto.accept(visitor),
            ASTNode::Function(function) => function.accept(visitor),
        }
    }
}

/// Renders nodes as S-expressions, e.g. `(+ x (* 2 y))`.
#[derive(Debug, Default)]
pub struct Printer;

impl Visitor for Printer {
    type Expr = String;
    type Item = String;

    fn visit_literal(&mut self, value: f64) -> String {
        value.to_string()
    }

    fn visit_variable(&mut self, name: &str) -> String {
        name.to_string()
    }

    fn visit_binary(&mut self, op: char, lhs: &Expression, rhs: &Expression) -> String {
        format!("({} {} {})", op, lhs.accept(self), rhs.accept(self))
    }

    fn visit_call(&mut self, callee: &str, args: &[Expression]) -> String {
        let mut res = format!("(call {}", callee);
        for arg in args {
            res.push(' ');
            res.push_str(&arg.accept(self));
        }
        res.push(')');
        res
    }

    fn visit_prototype(&mut self, proto: &Prototype) -> String {
        format!("(extern {} ({}))", proto.name, proto.args.join(" "))
    }

    fn visit_function(&mut self, function: &Function) -> String {
        let body = function.body.accept(self);
        if function.prototype.is_anonymous() {
            format!("(toplevel {})", body)
        } else {
            format!(
                "(def {} ({}) {})",
                function.prototype.name,
                function.prototype.args.join(" "),
                body
            )
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.accept(&mut Printer))
    }
}

impl fmt::Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.accept(&mut Printer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str) -> Box<Expression> {
        Box::new(Expression::Variable(name.to_string()))
    }

    /// counts nodes without knowing anything about how they are stored
    struct Counter;

    impl Visitor for Counter {
        type Expr = usize;
        type Item = usize;

        fn visit_literal(&mut self, _: f64) -> usize {
            1
        }

        fn visit_variable(&mut self, _: &str) -> usize {
            1
        }

        fn visit_binary(&mut self, _: char, lhs: &Expression, rhs: &Expression) -> usize {
            1 + lhs.accept(self) + rhs.accept(self)
        }

        fn visit_call(&mut self, _: &str, args: &[Expression]) -> usize {
            1 + args.iter().map(|arg| arg.accept(self)).sum::<usize>()
        }

        fn visit_prototype(&mut self, _: &Prototype) -> usize {
            1
        }

        fn visit_function(&mut self, function: &Function) -> usize {
            function.prototype.accept(self) + function.body.accept(self)
        }
    }

    #[test]
    fn accept_dispatches_per_kind() {
        let node = ASTNode::Function(Function {
            prototype: Prototype::new("f", vec!["x".to_string()]),
            body: Expression::Call(
                "g".to_string(),
                vec![
                    Expression::Binary('+', var("x"), Box::new(Expression::Literal(1.0))),
                    Expression::Literal(2.0),
                ],
            ),
        });
        assert_eq!(node.accept(&mut Counter), 6);
        assert_eq!(ASTNode::Extern(Prototype::anonymous()).accept(&mut Counter), 1);
    }

    #[test]
    fn printer_renders_sexprs() {
        let expr = Expression::Binary(
            '*',
            var("a"),
            Box::new(Expression::Call("sin".to_string(), vec![Expression::Literal(0.5)])),
        );
        assert_eq!(expr.to_string(), "(* a (call sin 0.5))");

        let def = ASTNode::Function(Function {
            prototype: Prototype::new("id", vec!["x".to_string(), "y".to_string()]),
            body: Expression::Variable("x".to_string()),
        });
        assert_eq!(def.to_string(), "(def id (x y) x)");

        let toplevel = ASTNode::Function(Function {
            prototype: Prototype::anonymous(),
            body: Expression::Literal(3.0),
        });
        assert_eq!(toplevel.to_string(), "(toplevel 3)");
        assert_eq!(
            ASTNode::Extern(Prototype::new("cos", vec!["t".to_string()])).to_string(),
            "(extern cos (t))"
        );
    }
}
