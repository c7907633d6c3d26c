/// Statement lowering, plus the pre-scan that hoists local variable
/// declarations to function scope.
use crate::ast::{AssignOp, IfStmt, JumpKind, Stmt, TypeExpr, WhileStmt, MAX_BODY_DEPTH};
use crate::errors::GenError;

use super::c_emitter::CEmitter;
use super::c_mangle::V_PREFIX;
use super::c_types;
use super::{Gen, Parentheses};

impl Gen<'_> {
    /// Emit a C declaration for every source-level `var` anywhere in the
    /// block. Hoisting them to function scope sidesteps C's rules about
    /// jumping over initializers with goto.
    pub(crate) fn write_vars(
        &mut self,
        block: &[Stmt],
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        if depth > MAX_BODY_DEPTH {
            return Err(GenError::BodyTooDeep);
        }
        let depth = depth + 1;

        for o in block {
            match o {
                Stmt::If(n) => {
                    let mut link = Some(n);
                    while let Some(i) = link {
                        self.write_vars(&i.body_if_true, depth, emitter)?;
                        self.write_vars(&i.body_if_false, depth, emitter)?;
                        link = i.else_if.as_deref();
                    }
                }
                Stmt::Var { name, xtype, .. } => {
                    c_types::write_c_type_name(
                        self.pkg_name,
                        self.tm,
                        emitter,
                        xtype,
                        V_PREFIX,
                        self.tm.resolve(*name),
                    )?;
                    emitter.emit(";\n");
                }
                Stmt::While(n) => {
                    self.write_vars(&n.body, depth, emitter)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub(crate) fn write_statement(
        &mut self,
        n: &Stmt,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        if depth > MAX_BODY_DEPTH {
            return Err(GenError::BodyTooDeep);
        }
        let depth = depth + 1;

        match n {
            Stmt::Assert { .. } => {
                // Assertions only apply at compile time.
                Ok(())
            }

            Stmt::Assign { op, lhs, rhs } => {
                self.write_suspendibles(lhs, depth, emitter)?;
                self.write_suspendibles(rhs, depth, emitter)?;
                self.write_expr(lhs, Parentheses::Mandatory, depth, emitter)?;
                emitter.emit(c_assign_op_name(*op));
                self.write_expr(rhs, Parentheses::Mandatory, depth, emitter)?;
                emitter.emit(";\n");
                Ok(())
            }

            Stmt::Expr(n) => {
                self.write_suspendibles(n, depth, emitter)?;
                if n.call_suspendible {
                    return Ok(());
                }
                Err(GenError::Unsupported(format!(
                    "expression statement \"{}\" is not a suspendible call",
                    n.display(self.tm)
                )))
            }

            Stmt::If(n) => self.write_if(n, depth, emitter),

            Stmt::Jump { keyword, target } => {
                let jt = self.jump_target(*target)?;
                let keyword = match keyword {
                    JumpKind::Break => "break",
                    JumpKind::Continue => "continue",
                };
                emitter.emit(&format!("goto label_{jt}_{keyword};\n"));
                Ok(())
            }

            Stmt::Return { status } => {
                let ret = match status {
                    None => format!("puffs_{}_status_ok", self.pkg_name),
                    Some(message) => match self.status_map.get(message) {
                        Some(s) => s.name.clone(),
                        None => {
                            return Err(GenError::BadSourceForm(format!(
                                "return of undeclared status {}",
                                self.tm.resolve(*message)
                            )))
                        }
                    },
                };
                if !self.per_func.suspendible {
                    emitter.emit("return;\n");
                } else if self.per_func.public {
                    emitter.emit(&format!("status = {ret}; goto cleanup0;\n"));
                } else {
                    emitter.emit(&format!("return {ret};\n"));
                }
                Ok(())
            }

            Stmt::Var { name, xtype, value } => {
                if let Some(v) = value {
                    self.write_suspendibles(v, depth, emitter)?;
                }
                if let TypeExpr::Array { length, .. } = xtype {
                    if value.is_some() {
                        return Err(GenError::Unsupported(
                            "array initializers with non-zero default values".to_string(),
                        ));
                    }
                    emitter.emit(&format!(
                        "for (size_t i = 0; i < {length}; i++) {{ {}{}[i] = 0; }}\n",
                        V_PREFIX,
                        self.tm.resolve(*name)
                    ));
                } else {
                    emitter.emit(&format!("{}{} = ", V_PREFIX, self.tm.resolve(*name)));
                    match value {
                        Some(v) => {
                            self.write_expr(v, Parentheses::Mandatory, 0, emitter)?;
                        }
                        None => emitter.emit("0"),
                    }
                    emitter.emit(";\n");
                }
                Ok(())
            }

            Stmt::While(n) => self.write_while(n, depth, emitter),
        }
    }

    fn write_if(
        &mut self,
        n: &IfStmt,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        const MAX_CLOSE_CURLY: u32 = 1000;
        let mut n_close_curly: u32 = 1;
        let mut node = n;
        let mut first = true;
        loop {
            if node.condition.suspendible {
                if !first {
                    // An else-if with a suspendible condition needs its own
                    // block so the hoisted statements sit between the "else"
                    // and the "if".
                    emitter.emit("{");
                    if n_close_curly == MAX_CLOSE_CURLY {
                        return Err(GenError::TooDeep);
                    }
                    n_close_curly += 1;
                }
                self.write_suspendibles(&node.condition, depth, emitter)?;
            }

            emitter.emit("if (");
            self.write_expr(&node.condition, Parentheses::Optional, 0, emitter)?;
            emitter.emit(") {\n");
            for o in &node.body_if_true {
                self.write_statement(o, depth, emitter)?;
            }
            if !node.body_if_false.is_empty() {
                emitter.emit("} else {");
                for o in &node.body_if_false {
                    self.write_statement(o, depth, emitter)?;
                }
                break;
            }
            match &node.else_if {
                Some(next) => {
                    emitter.emit("} else ");
                    node = next;
                    first = false;
                }
                None => break,
            }
        }
        for _ in 0..n_close_curly {
            emitter.emit("}\n");
        }
        Ok(())
    }

    fn write_while(
        &mut self,
        n: &WhileStmt,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        if n.condition.suspendible {
            return Err(GenError::Unsupported(format!(
                "suspendible condition \"{}\" in a while loop",
                n.condition.display(self.tm)
            )));
        }

        if n.has_continue {
            let jt = self.jump_target(n.label)?;
            emitter.emit(&format!("label_{jt}_continue:;\n"));
        }
        emitter.emit("while (");
        self.write_expr(&n.condition, Parentheses::Optional, 0, emitter)?;
        emitter.emit(") {\n");
        for o in &n.body {
            self.write_statement(o, depth, emitter)?;
        }
        emitter.emit("}\n");
        if n.has_break {
            let jt = self.jump_target(n.label)?;
            emitter.emit(&format!("label_{jt}_break:;\n"));
        }
        Ok(())
    }
}

/// The C spelling of an assignment operator. The `~^=` bit-clear compound
/// has no C equivalent yet and emits a sentinel.
fn c_assign_op_name(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Eq => " = ",
        AssignOp::PlusEq => " += ",
        AssignOp::MinusEq => " -= ",
        AssignOp::StarEq => " *= ",
        AssignOp::SlashEq => " /= ",
        AssignOp::ShiftLEq => " <<= ",
        AssignOp::ShiftREq => " >>= ",
        AssignOp::AmpEq => " &= ",
        AssignOp::AmpHatEq => " no_such_amp_hat_C_operator ",
        AssignOp::PipeEq => " |= ",
        AssignOp::HatEq => " ^= ",
    }
}
