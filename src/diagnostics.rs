//! Best-effort source rendering for script-level stack frames (`spec.md` §6
//! "EvalError runtime stack line format").
//!
//! The AST does not retain raw source text (nodes only carry a [`crate::source::CodeLoc`]),
//! so a thrown error's call stack is reconstructed by re-rendering the
//! statement/expression that was executing in each frame. This does not aim
//! to be a general unparser — only to reproduce the concise, single-line
//! shape ES engines show in a stack trace (`foo.x = 1`, `a(x)`, `b(null)`).

use crate::ast::{
    ArrayElement, AssignOp, BinOp, Expr, ExprKind, Literal, LogicalOp, Pattern, Stmt, StmtKind, UnOp, UpdateOp,
};

pub fn render_stmt(stmt: &Stmt) -> String {
    match &stmt.kind {
        StmtKind::Expr(e) => render_expr(e),
        StmtKind::VarDecl(kind, decls) => {
            let kw = match kind {
                crate::ast::DeclKind::Var => "var",
                crate::ast::DeclKind::Let => "let",
                crate::ast::DeclKind::Const => "const",
            };
            let parts: Vec<String> = decls
                .iter()
                .map(|d| match &d.init {
                    Some(init) => format!("{} = {}", render_pattern(&d.pattern), render_expr(init)),
                    None => render_pattern(&d.pattern),
                })
                .collect();
            format!("{kw} {}", parts.join(", "))
        }
        StmtKind::Return(Some(e)) => format!("return {}", render_expr(e)),
        StmtKind::Return(None) => "return".to_string(),
        StmtKind::Throw(e) => format!("throw {}", render_expr(e)),
        StmtKind::Break(Some(l)) => format!("break {l}"),
        StmtKind::Break(None) => "break".to_string(),
        StmtKind::Continue(Some(l)) => format!("continue {l}"),
        StmtKind::Continue(None) => "continue".to_string(),
        StmtKind::If { test, .. } => format!("if ({})", render_expr(test)),
        StmtKind::While { test, .. } => format!("while ({})", render_expr(test)),
        StmtKind::DoWhile { test, .. } => format!("do ... while ({})", render_expr(test)),
        StmtKind::For { .. } => "for (...)".to_string(),
        StmtKind::ForIn { pattern, object, .. } => format!("for ({} in {})", render_pattern(pattern), render_expr(object)),
        StmtKind::ForOf { pattern, iterable, .. } => {
            format!("for ({} of {})", render_pattern(pattern), render_expr(iterable))
        }
        StmtKind::Switch { discriminant, .. } => format!("switch ({})", render_expr(discriminant)),
        StmtKind::Try { .. } => "try { ... }".to_string(),
        StmtKind::FunctionDecl(def) => format!("function {}(...)", def.name.as_deref().unwrap_or("")),
        StmtKind::Block(_) => "{ ... }".to_string(),
        StmtKind::Labeled(label, inner) => format!("{label}: {}", render_stmt(inner)),
        StmtKind::Empty => ";".to_string(),
        StmtKind::Program(_) => "<program>".to_string(),
    }
}

pub fn render_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(lit) => render_literal(lit),
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::This => "this".to_string(),
        ExprKind::Array(_) => "[...]".to_string(),
        ExprKind::Object(_) => "{...}".to_string(),
        ExprKind::Template(_) => "`...`".to_string(),
        ExprKind::Function(def) => format!("function {}(...)", def.name.as_deref().unwrap_or("")),
        ExprKind::Arrow { .. } => "(...) => ...".to_string(),
        ExprKind::Unary(op, e) => format!("{}{}", unop_str(*op), render_expr(e)),
        ExprKind::Update { op, prefix, target } => {
            let s = if *op == UpdateOp::Increment { "++" } else { "--" };
            if *prefix { format!("{s}{}", render_expr(target)) } else { format!("{}{s}", render_expr(target)) }
        }
        ExprKind::Binary(op, l, r) => format!("{} {} {}", render_expr(l), binop_str(*op), render_expr(r)),
        ExprKind::Logical(op, l, r) => format!("{} {} {}", render_expr(l), logicalop_str(*op), render_expr(r)),
        ExprKind::Assign(op, l, r) => format!("{} {} {}", render_expr(l), assignop_str(*op), render_expr(r)),
        ExprKind::Conditional { test, consequent, alternate } => {
            format!("{} ? {} : {}", render_expr(test), render_expr(consequent), render_expr(alternate))
        }
        ExprKind::Call { callee, args, optional } => {
            format!("{}{}({})", render_expr(callee), if *optional { "?." } else { "" }, render_args(args))
        }
        ExprKind::New { callee, args } => format!("new {}({})", render_expr(callee), render_args(args)),
        ExprKind::Member { object, property, optional } => {
            format!("{}{}{}", render_expr(object), if *optional { "?." } else { "." }, property)
        }
        ExprKind::ComputedMember { object, property, optional } => {
            format!("{}{}[{}]", render_expr(object), if *optional { "?." } else { "" }, render_expr(property))
        }
        ExprKind::Sequence(parts) => parts.iter().map(render_expr).collect::<Vec<_>>().join(", "),
        ExprKind::Spread(e) => format!("...{}", render_expr(e)),
    }
}

fn render_args(args: &[ArrayElement]) -> String {
    args.iter()
        .map(|a| match a {
            ArrayElement::Item(e) => render_expr(e),
            ArrayElement::Spread(e) => format!("...{}", render_expr(e)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_pattern(p: &Pattern) -> String {
    match p {
        Pattern::Identifier(name) => name.clone(),
        Pattern::Array(_) => "[...]".to_string(),
        Pattern::Object(_, _) => "{...}".to_string(),
    }
}

fn render_literal(lit: &Literal) -> String {
    match lit {
        Literal::Number(n) => crate::value::number_to_string(*n),
        Literal::Str(s) => format!("'{s}'"),
        Literal::Bool(b) => b.to_string(),
        Literal::Null => "null".to_string(),
        Literal::Undefined => "undefined".to_string(),
    }
}

fn unop_str(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Plus => "+",
        UnOp::Not => "!",
        UnOp::BitNot => "~",
        UnOp::Typeof => "typeof ",
        UnOp::Void => "void ",
        UnOp::Delete => "delete ",
    }
}

fn binop_str(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
        BinOp::Eq => "==",
        BinOp::NotEq => "!=",
        BinOp::StrictEq => "===",
        BinOp::StrictNotEq => "!==",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::LtEq => "<=",
        BinOp::GtEq => ">=",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::UShr => ">>>",
        BinOp::Instanceof => "instanceof",
        BinOp::In => "in",
    }
}

fn logicalop_str(op: LogicalOp) -> &'static str {
    match op {
        LogicalOp::And => "&&",
        LogicalOp::Or => "||",
        LogicalOp::NullishCoalesce => "??",
    }
}

fn assignop_str(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Assign => "=",
        AssignOp::Add => "+=",
        AssignOp::Sub => "-=",
        AssignOp::Mul => "*=",
        AssignOp::Div => "/=",
        AssignOp::Mod => "%=",
        AssignOp::Pow => "**=",
        AssignOp::BitAnd => "&=",
        AssignOp::BitOr => "|=",
        AssignOp::BitXor => "^=",
        AssignOp::Shl => "<<=",
        AssignOp::Shr => ">>=",
        AssignOp::UShr => ">>>=",
        AssignOp::And => "&&=",
        AssignOp::Or => "||=",
        AssignOp::NullishCoalesce => "??=",
    }
}
