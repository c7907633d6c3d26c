/// Top-level item lowering: struct layouts, constructors and destructors,
/// function signatures, prototypes and bodies.
use crate::ast::{Field, FuncDecl, StructDecl, TypeExpr, TypeName};
use crate::errors::GenError;

use super::c_emitter::CEmitter;
use super::c_mangle::{A_PREFIX, F_PREFIX};
use super::c_types;
use super::{Gen, PerFunc};

impl Gen<'_> {
    pub(crate) fn write_struct(
        &self,
        n: &StructDecl,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        // For API/ABI compatibility, the very first field in the struct's
        // private_impl must be the status code. This lets the constructor
        // callee set "self->private_impl.status = etc_error_bad_version;"
        // regardless of the sizeof(*self) struct reserved by the caller and
        // even if the caller and callee were built with different versions.
        let struct_name = self.tm.resolve(n.name);
        emitter.emit("typedef struct {\n");
        emitter.emit(
            "// Do not access the private_impl's fields directly. There is no API/ABI\n\
             // compatibility or safety guarantee if you do so. Instead, use the\n",
        );
        emitter.emit(&format!(
            "// puffs_{}_{}_etc functions.\n",
            self.pkg_name, struct_name
        ));
        emitter.emit(
            "//\n\
             // In C++, these fields would be \"private\", but C does not support that.\n\
             //\n\
             // It is a struct, not a struct*, so that it can be stack allocated.\n",
        );
        emitter.emit("struct {\n");
        if n.suspendible {
            emitter.emit(&format!("puffs_{}_status status;\n", self.pkg_name));
            emitter.emit("uint32_t magic;\n");
        }
        for o in &n.fields {
            c_types::write_c_type_name(
                self.pkg_name,
                self.tm,
                emitter,
                &o.xtype,
                F_PREFIX,
                self.tm.resolve(o.name),
            )?;
            emitter.emit(";\n");
        }
        emitter.emit(&format!(
            "}} private_impl;\n }} puffs_{}_{};\n\n",
            self.pkg_name, struct_name
        ));
        Ok(())
    }

    fn write_ctor_signature(
        &self,
        n: &StructDecl,
        public: bool,
        ctor: bool,
        emitter: &mut CEmitter,
    ) {
        let struct_name = self.tm.resolve(n.name);
        let ctor_name = if ctor { "constructor" } else { "destructor" };
        if ctor && public {
            emitter.emit(&format!(
                "// puffs_{0}_{1}_{2} is a constructor function.\n\
                 //\n\
                 // It should be called before any other puffs_{0}_{1}_* function.\n\
                 //\n\
                 // Pass PUFFS_VERSION and 0 for puffs_version and for_internal_use_only.\n",
                self.pkg_name, struct_name, ctor_name
            ));
        }
        emitter.emit(&format!(
            "void puffs_{0}_{1}_{2}(puffs_{0}_{1} *self",
            self.pkg_name, struct_name, ctor_name
        ));
        if ctor {
            emitter.emit(", uint32_t puffs_version, uint32_t for_internal_use_only");
        }
        emitter.emit(")");
    }

    pub(crate) fn write_ctor_prototype(&self, n: &StructDecl, emitter: &mut CEmitter) {
        if !n.suspendible {
            return;
        }
        for ctor in [true, false] {
            self.write_ctor_signature(n, n.public, ctor, emitter);
            emitter.emit(";\n\n");
        }
    }

    pub(crate) fn write_ctor_impl(&self, n: &StructDecl, emitter: &mut CEmitter) {
        if !n.suspendible {
            return;
        }
        for ctor in [true, false] {
            self.write_ctor_signature(n, false, ctor, emitter);
            emitter.emit("{\n");
            emitter.emit("if (!self) { return; }\n");

            if ctor {
                emitter.emit(&format!(
                    "if (puffs_version != PUFFS_VERSION) {{\n\
                     self->private_impl.status = puffs_{}_error_bad_version;\n\
                     return;\n\
                     }}\n",
                    self.pkg_name
                ));
                emitter.emit(
                    "if (for_internal_use_only != PUFFS_ALREADY_ZEROED) {\
                     memset(self, 0, sizeof(*self)); }\n",
                );
                emitter.emit("self->private_impl.magic = PUFFS_MAGIC;\n");

                for f in &n.fields {
                    // TODO: set default values for array types.
                    if let Some(dv) = f.default_value {
                        emitter.emit(&format!(
                            "self->private_impl.{}{} = {};\n",
                            F_PREFIX,
                            self.tm.resolve(f.name),
                            dv
                        ));
                    }
                }
            }

            // Call any ctor/dtors on sub-structs.
            for f in &n.fields {
                let Some(sub_name) = self.embedded_struct_name(f) else {
                    continue;
                };
                if ctor {
                    emitter.emit(&format!(
                        "puffs_{0}_{1}_constructor(&self->private_impl.{2}{3},\
                         PUFFS_VERSION, PUFFS_ALREADY_ZEROED);\n",
                        self.pkg_name,
                        sub_name,
                        F_PREFIX,
                        self.tm.resolve(f.name)
                    ));
                } else {
                    emitter.emit(&format!(
                        "puffs_{0}_{1}_destructor(&self->private_impl.{2}{3});\n",
                        self.pkg_name,
                        sub_name,
                        F_PREFIX,
                        self.tm.resolve(f.name)
                    ));
                }
            }

            emitter.emit("}\n\n");
        }
    }

    /// The name of the package struct a field embeds by value, if any.
    fn embedded_struct_name(&self, f: &Field) -> Option<&str> {
        // TODO: arrays of sub-structs.
        let TypeExpr::Base {
            name: TypeName::Ident(id),
            ..
        } = &f.xtype
        else {
            return None;
        };
        if !self.struct_map.contains_key(id) {
            return None;
        }
        Some(self.tm.resolve(*id))
    }

    pub(crate) fn write_func_signature(
        &self,
        n: &FuncDecl,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        // Source-level return values other than the status are not yet
        // supported.
        if n.suspendible {
            emitter.emit(&format!("puffs_{}_status", self.pkg_name));
        } else {
            emitter.emit("void");
        }
        emitter.emit(&format!(" puffs_{}", self.pkg_name));
        if let Some(r) = n.receiver {
            emitter.emit(&format!("_{}", self.tm.resolve(r)));
        }
        emitter.emit(&format!("_{}(", self.tm.resolve(n.name)));

        let mut comma = false;
        if let Some(r) = n.receiver {
            emitter.emit(&format!(
                "puffs_{}_{} *self",
                self.pkg_name,
                self.tm.resolve(r)
            ));
            comma = true;
        }
        for o in &n.in_fields {
            if comma {
                emitter.emit(",");
            }
            comma = true;
            c_types::write_c_type_name(
                self.pkg_name,
                self.tm,
                emitter,
                &o.xtype,
                A_PREFIX,
                self.tm.resolve(o.name),
            )?;
        }

        emitter.emit(")");
        Ok(())
    }

    pub(crate) fn write_func_prototype(
        &self,
        n: &FuncDecl,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        self.write_func_signature(n, emitter)?;
        emitter.emit(";\n\n");
        Ok(())
    }

    pub(crate) fn write_func_impl(
        &mut self,
        n: &FuncDecl,
        emitter: &mut CEmitter,
    ) -> Result<(), GenError> {
        self.per_func = PerFunc {
            receiver: n.receiver,
            public: n.public,
            suspendible: n.suspendible,
            ..PerFunc::default()
        };
        self.write_func_signature(n, emitter)?;
        emitter.emit("{\n");

        // Check the previous status and the "self" arg.
        if n.public && n.receiver.is_some() {
            emitter.emit("if (!self) {\n");
            if n.suspendible {
                emitter.emit(&format!(
                    "return puffs_{}_error_bad_receiver;",
                    self.pkg_name
                ));
            } else {
                emitter.emit("return;");
            }
            emitter.emit("}\n");
        }

        if n.suspendible {
            emitter.emit(&format!("puffs_{}_status status = ", self.pkg_name));
            if n.receiver.is_some() {
                emitter.emit("self->private_impl.status;\n");
                if n.public {
                    emitter.emit("if (status & 1) { return status; }");
                }
            } else {
                emitter.emit(&format!("puffs_{}_status_ok;\n", self.pkg_name));
            }
            if n.public && n.receiver.is_some() {
                emitter.emit(&format!(
                    "if (self->private_impl.magic != PUFFS_MAGIC) {{\
                     status = puffs_{}_error_constructor_not_called; goto cleanup0; }}\n",
                    self.pkg_name
                ));
            }
        } else if n.receiver.is_some() && n.public {
            emitter.emit("if (self->private_impl.status & 1) { return; }");
            emitter.emit(&format!(
                "if (self->private_impl.magic != PUFFS_MAGIC) {{\
                 self->private_impl.status = puffs_{}_error_constructor_not_called; \
                 return; }}\n",
                self.pkg_name
            ));
        }

        // For public functions, check (at runtime) the other args for bounds
        // and null-ness. For private functions, those checks are done at
        // compile time.
        if n.public {
            self.write_func_impl_arg_checks(n, emitter);
        }
        emitter.emit("\n");

        self.write_vars(&n.body, 0, emitter)?;
        emitter.emit("\n");

        for o in &n.body {
            self.write_statement(o, 0, emitter)?;
        }
        emitter.emit("\n");

        if self.per_func.suspendible {
            if self.per_func.public {
                emitter.emit("cleanup0: self->private_impl.status = status;\n");
            }
            emitter.emit("return status;\n");
        }
        emitter.emit("}\n\n");

        if self.per_func.temp_w != self.per_func.temp_r {
            return Err(GenError::InternalInvariant(
                "temporary variable count out of sync".to_string(),
            ));
        }
        Ok(())
    }

    fn write_func_impl_arg_checks(&self, n: &FuncDecl, emitter: &mut CEmitter) {
        let mut checks: Vec<String> = Vec::new();

        for o in &n.in_fields {
            match &o.xtype {
                TypeExpr::Ptr { .. } => {
                    checks.push(format!("!{}{}", A_PREFIX, self.tm.resolve(o.name)));
                }
                TypeExpr::Base { name, bounds } if o.xtype.is_refined() => {
                    // Refinement bounds already implied by the C type's
                    // natural range need no check.
                    let mut bounds = *bounds;
                    let ntb = c_types::num_type_bounds(*name);
                    for i in 0..2 {
                        if bounds[i].is_some() && bounds[i] == ntb[i] {
                            bounds[i] = None;
                        }
                    }
                    for (i, b) in bounds.iter().enumerate() {
                        if let Some(b) = b {
                            let op = if i == 0 { '<' } else { '>' };
                            checks.push(format!(
                                "{}{} {} {}",
                                A_PREFIX,
                                self.tm.resolve(o.name),
                                op,
                                b
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        if checks.is_empty() {
            return;
        }

        emitter.emit("if (");
        emitter.emit(&checks.join(" || "));
        emitter.emit(") {");
        if n.suspendible {
            emitter.emit(&format!(
                "status = puffs_{}_error_bad_argument; goto cleanup0;",
                self.pkg_name
            ));
        } else if n.receiver.is_some() {
            emitter.emit(&format!(
                "self->private_impl.status = puffs_{}_error_bad_argument; return;",
                self.pkg_name
            ));
        } else {
            emitter.emit("return;");
        }
        emitter.emit("}\n");
    }
}
