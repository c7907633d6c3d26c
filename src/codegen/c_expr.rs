/// Expression lowering, including the hoisting of suspendible calls.
use crate::ast::{AssocOp, BinaryOp, Expr, ExprKind, TypeExpr, MAX_EXPR_DEPTH};
use crate::errors::GenError;
use crate::intern::Interner;

use super::c_emitter::CEmitter;
use super::c_mangle::{A_PREFIX, F_PREFIX, T_PREFIX, V_PREFIX};
use super::c_types;
use super::{Gen, Parentheses, MAX_TEMP};

impl Gen<'_> {
    /// Hoist every suspendible call inside `n` into C statements, leaving a
    /// numbered temporary behind for each. No-op for pure subtrees.
    pub(crate) fn write_suspendibles(
        &mut self,
        n: &Expr,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        if !n.suspendible {
            return Ok(());
        }
        self.write_call_suspendibles(n, depth, emitter)
    }

    fn write_call_suspendibles(
        &mut self,
        n: &Expr,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        // The evaluation order for suspendible calls (which can have side
        // effects) matters: LHS, MHS, RHS, the argument list, and finally
        // the node itself.
        if !n.call_suspendible {
            if depth > MAX_EXPR_DEPTH {
                return Err(GenError::ExprTooDeep);
            }
            let depth = depth + 1;
            for o in n.sub_exprs() {
                self.write_call_suspendibles(o, depth, emitter)?;
            }
            return Ok(());
        }

        if is_in_src_read_u8(self.tm, n) {
            if self.per_func.temp_w >= MAX_TEMP {
                return Err(GenError::TooManyTemporaries);
            }
            let temp = self.per_func.temp_w;
            self.per_func.temp_w += 1;

            emitter.emit(&format!(
                "if ({0}src->ri >= {0}src->wi) {{ status = {0}src->closed ? \
                 puffs_{1}_error_unexpected_eof : puffs_{1}_status_short_read;",
                A_PREFIX, self.pkg_name
            ));
            self.write_suspend_exit(emitter);
            emitter.emit("}\n");
            let mtype = n.mtype.as_ref().ok_or_else(|| {
                GenError::InternalInvariant(
                    "suspendible call has no resolved type".to_string(),
                )
            })?;
            c_types::write_c_type_name(
                self.pkg_name,
                self.tm,
                emitter,
                mtype,
                T_PREFIX,
                &temp.to_string(),
            )?;
            emitter.emit(&format!(" = {0}src->ptr[{0}src->ri++];\n", A_PREFIX));
        } else if is_in_dst_method(self.tm, n, "write") {
            // TODO: support write payloads other than the this.stack[s:] form.
            emitter.emit(&format!(
                "if ({0}dst->closed) {{ status = puffs_{1}_error_closed_for_writes;",
                A_PREFIX, self.pkg_name
            ));
            self.write_suspend_exit(emitter);
            emitter.emit("}\n");
            emitter.emit(&format!(
                "if (({0}dst->len - {0}dst->wi) < \
                 (sizeof(self->private_impl.f_stack) - {1}s)) {{",
                A_PREFIX, V_PREFIX
            ));
            emitter.emit(&format!(
                "status = puffs_{}_status_short_write;",
                self.pkg_name
            ));
            self.write_suspend_exit(emitter);
            emitter.emit("}\n");
            emitter.emit(
                "memmove(a_dst->ptr + a_dst->wi,\
                 self->private_impl.f_stack + v_s,\
                 sizeof(self->private_impl.f_stack) - v_s);\n",
            );
            emitter.emit("a_dst->wi += sizeof(self->private_impl.f_stack) - v_s;\n");
        } else if is_in_dst_method(self.tm, n, "write_u8") {
            emitter.emit(&format!(
                "if ({0}dst->wi >= {0}dst->len) {{ status = puffs_{1}_status_short_write;",
                A_PREFIX, self.pkg_name
            ));
            self.write_suspend_exit(emitter);
            emitter.emit("}\n");
            emitter.emit(&format!("{0}dst->ptr[{0}dst->wi++] = ", A_PREFIX));
            let ExprKind::Call { args, .. } = &n.kind else {
                return Err(GenError::InternalInvariant(
                    "matched a call shape on a non-call node".to_string(),
                ));
            };
            self.write_expr(&args[0].value, Parentheses::Mandatory, depth, emitter)?;
            emitter.emit(";\n");
        } else if is_this_decode_header(self.tm, n) {
            let receiver = self.per_func.receiver.ok_or_else(|| {
                GenError::BadSourceForm("this.decode_header call outside a method".to_string())
            })?;
            emitter.emit(&format!(
                "status = puffs_{}_{}_decode_header(self, {}src);\n",
                self.pkg_name,
                self.tm.resolve(receiver),
                A_PREFIX
            ));
            emitter.emit("if (status) { goto cleanup0; }\n");
        } else {
            return Err(GenError::Unsupported(format!(
                "cannot convert call \"{}\" to C",
                n.display(self.tm)
            )));
        }
        Ok(())
    }

    /// The exit path taken when a suspendible precondition fails: public
    /// suspendible functions funnel through the cleanup label, everything
    /// else returns the status directly.
    fn write_suspend_exit(&self, emitter: &mut CEmitter) {
        if self.per_func.public && self.per_func.suspendible {
            emitter.emit(" goto cleanup0; ");
        } else {
            emitter.emit(" return status; ");
        }
    }

    /// Write `n` as a C expression. Suspendible calls inside it must already
    /// have been hoisted; they are replaced by their temporaries, consumed
    /// in the same order they were emitted.
    pub(crate) fn write_expr(
        &mut self,
        n: &Expr,
        pp: Parentheses,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        if depth > MAX_EXPR_DEPTH {
            return Err(GenError::ExprTooDeep);
        }
        let depth = depth + 1;

        if n.call_suspendible {
            if self.per_func.temp_r >= self.per_func.temp_w {
                return Err(GenError::InternalInvariant(
                    "temporary variable count out of sync".to_string(),
                ));
            }
            emitter.emit(&format!("{}{}", T_PREFIX, self.per_func.temp_r));
            self.per_func.temp_r += 1;
            return Ok(());
        }

        if let Some(cv) = n.const_value {
            let is_bool = n.mtype.as_ref().is_some_and(TypeExpr::is_bool);
            if !is_bool {
                emitter.emit(&cv.to_string());
            } else if cv == 0 {
                emitter.emit("false");
            } else if cv == 1 {
                emitter.emit("true");
            } else {
                return Err(GenError::InternalInvariant(format!(
                    "\"{}\" has type bool but constant value {} is neither 0 nor 1",
                    n.display(self.tm),
                    cv
                )));
            }
            return Ok(());
        }

        match &n.kind {
            ExprKind::Unary { .. } => Err(GenError::Unsupported(format!(
                "unary operator in \"{}\"",
                n.display(self.tm)
            ))),
            ExprKind::Binary { op, lhs, rhs } => {
                self.write_expr_binary_op(*op, lhs, rhs, pp, depth, emitter)
            }
            ExprKind::As { lhs, to } => self.write_expr_as(lhs, to, depth, emitter),
            ExprKind::Associative { op, args } => {
                self.write_expr_associative_op(*op, args, depth, emitter)
            }
            _ => self.write_expr_other(n, depth, emitter),
        }
    }

    fn write_expr_binary_op(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        pp: Parentheses,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        if pp == Parentheses::Mandatory {
            emitter.emit("(");
        }
        self.write_expr(lhs, Parentheses::Mandatory, depth, emitter)?;
        emitter.emit(c_binary_op_name(op));
        self.write_expr(rhs, Parentheses::Mandatory, depth, emitter)?;
        if pp == Parentheses::Mandatory {
            emitter.emit(")");
        }
        Ok(())
    }

    fn write_expr_as(
        &mut self,
        lhs: &Expr,
        to: &TypeExpr,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        emitter.emit("((");
        c_types::write_c_type_name(self.pkg_name, self.tm, emitter, to, "", "")?;
        emitter.emit(")(");
        self.write_expr(lhs, Parentheses::Mandatory, depth, emitter)?;
        emitter.emit("))");
        Ok(())
    }

    fn write_expr_associative_op(
        &mut self,
        op: AssocOp,
        args: &[Expr],
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        let op_name = c_assoc_op_name(op);
        for (i, o) in args.iter().enumerate() {
            if i != 0 {
                emitter.emit(op_name);
            }
            self.write_expr(o, Parentheses::Mandatory, depth, emitter)?;
        }
        Ok(())
    }

    fn write_expr_other(
        &mut self,
        n: &Expr,
        depth: u32,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        match &n.kind {
            ExprKind::This => {
                emitter.emit("self->private_impl");
                Ok(())
            }
            ExprKind::Ident(id) => {
                emitter.emit(V_PREFIX);
                emitter.emit(self.tm.resolve(*id));
                Ok(())
            }
            ExprKind::Call { callee, args, .. } if is_low_bits(self.tm, n) => {
                let ExprKind::Dot { lhs, .. } = &callee.kind else {
                    return Err(GenError::InternalInvariant(
                        "matched a call shape on a non-call node".to_string(),
                    ));
                };
                emitter.emit("PUFFS_LOW_BITS(");
                self.write_expr(lhs, Parentheses::Mandatory, depth, emitter)?;
                emitter.emit(",");
                self.write_expr(&args[0].value, Parentheses::Mandatory, depth, emitter)?;
                emitter.emit(")");
                Ok(())
            }
            ExprKind::Index { lhs, index } => {
                self.write_expr(lhs, Parentheses::Mandatory, depth, emitter)?;
                emitter.emit("[");
                self.write_expr(index, Parentheses::Optional, depth, emitter)?;
                emitter.emit("]");
                Ok(())
            }
            ExprKind::Dot { lhs, name } => {
                if matches!(lhs.kind, ExprKind::In) {
                    emitter.emit(A_PREFIX);
                    emitter.emit(self.tm.resolve(*name));
                    return Ok(());
                }
                self.write_expr(lhs, Parentheses::Mandatory, depth, emitter)?;
                emitter.emit(".");
                emitter.emit(F_PREFIX);
                emitter.emit(self.tm.resolve(*name));
                Ok(())
            }
            _ => Err(GenError::Unsupported(format!(
                "cannot convert expression \"{}\" to C",
                n.display(self.tm)
            ))),
        }
    }
}

/// Matches `in.src.read_u8?()`.
fn is_in_src_read_u8(tm: &Interner, n: &Expr) -> bool {
    let ExprKind::Call { callee, args, .. } = &n.kind else {
        return false;
    };
    if !n.call_suspendible || !args.is_empty() {
        return false;
    }
    let ExprKind::Dot { lhs, name } = &callee.kind else {
        return false;
    };
    if tm.resolve(*name) != "read_u8" {
        return false;
    }
    let ExprKind::Dot { lhs, name } = &lhs.kind else {
        return false;
    };
    tm.resolve(*name) == "src" && matches!(lhs.kind, ExprKind::In)
}

/// Matches `in.dst.method?(x:...)` for a given method name.
fn is_in_dst_method(tm: &Interner, n: &Expr, method: &str) -> bool {
    let ExprKind::Call { callee, args, .. } = &n.kind else {
        return false;
    };
    if !n.call_suspendible || args.len() != 1 {
        return false;
    }
    let ExprKind::Dot { lhs, name } = &callee.kind else {
        return false;
    };
    if tm.resolve(*name) != method {
        return false;
    }
    let ExprKind::Dot { lhs, name } = &lhs.kind else {
        return false;
    };
    tm.resolve(*name) == "dst" && matches!(lhs.kind, ExprKind::In)
}

/// Matches `this.decode_header?(src:in.src)`.
fn is_this_decode_header(tm: &Interner, n: &Expr) -> bool {
    let ExprKind::Call { callee, args, .. } = &n.kind else {
        return false;
    };
    if !n.call_suspendible || args.len() != 1 {
        return false;
    }
    let ExprKind::Dot { lhs, name } = &callee.kind else {
        return false;
    };
    tm.resolve(*name) == "decode_header" && matches!(lhs.kind, ExprKind::This)
}

/// Matches the pure builtin `x.low_bits(n:...)`.
fn is_low_bits(tm: &Interner, n: &Expr) -> bool {
    let ExprKind::Call { callee, args, impure } = &n.kind else {
        return false;
    };
    if *impure || n.call_suspendible || args.len() != 1 {
        return false;
    }
    let ExprKind::Dot { name, .. } = &callee.kind else {
        return false;
    };
    tm.resolve(*name) == "low_bits"
}

fn c_binary_op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Plus => " + ",
        BinaryOp::Minus => " - ",
        BinaryOp::Star => " * ",
        BinaryOp::Slash => " / ",
        BinaryOp::ShiftL => " << ",
        BinaryOp::ShiftR => " >> ",
        BinaryOp::Amp => " & ",
        BinaryOp::AmpHat => " no_such_amp_hat_C_operator ",
        BinaryOp::Pipe => " | ",
        BinaryOp::Hat => " ^ ",
        BinaryOp::NotEq => " != ",
        BinaryOp::LessThan => " < ",
        BinaryOp::LessEq => " <= ",
        BinaryOp::EqEq => " == ",
        BinaryOp::GreaterEq => " >= ",
        BinaryOp::GreaterThan => " > ",
        BinaryOp::And => " && ",
        BinaryOp::Or => " || ",
    }
}

fn c_assoc_op_name(op: AssocOp) -> &'static str {
    match op {
        AssocOp::Plus => " + ",
        AssocOp::Star => " * ",
        AssocOp::Amp => " & ",
        AssocOp::Pipe => " | ",
        AssocOp::Hat => " ^ ",
        AssocOp::And => " && ",
        AssocOp::Or => " || ",
    }
}
