/// C code generation backend: lowers one checked package to a single C
/// translation unit, a public header section followed by a private
/// implementation section.
pub mod c_base;
pub mod c_emitter;
pub mod c_expr;
pub mod c_item;
pub mod c_mangle;
pub mod c_stmt;
pub mod c_types;

use rustc_hash::FxHashMap;

use crate::ast::{self, Decl, File, FuncDecl, LoopId, StatusDecl, StatusKind, StructDecl};
use crate::errors::GenError;
use crate::intern::{Interner, NameId};

use c_emitter::CEmitter;

/// The enum index at which user-defined status codes begin; indices below
/// it are reserved for future built-in statuses.
pub const USER_DEFINED_STATUS_BASE: usize = 128;

/// Built-in status messages, in ABI order.
///
/// For API/ABI forwards and backwards compatibility, the very first two
/// statuses must be "status ok" (with generated value 0) and "error bad
/// version" (with generated value -2 + 1). This lets caller code check the
/// constructor return value for "error bad version" even if the caller and
/// callee were built with different versions.
///
/// The order of the remaining statuses is less important, but must remain
/// stable for API/ABI backwards compatibility: append, never reorder.
pub const BUILT_IN_STATUSES: [&str; 9] = [
    "status ok",
    "error bad version",
    "error bad receiver",
    "error bad argument",
    "error constructor not called",
    "error unexpected EOF", // Used if reading when closed == true.
    "status short read",    // Used if reading when closed == false.
    "status short write",
    "error closed for writes",
];

const _: () = assert!(BUILT_IN_STATUSES.len() <= USER_DEFINED_STATUS_BASE);

/// Maximum number of hoisted temporaries per function.
pub const MAX_TEMP: u32 = 10_000;

/// The numeric value of the status at enum index `index`. Errors get a +1
/// nudge so that the least significant bit of a status value is 1 exactly
/// when the status is an error.
pub fn status_value(index: usize, is_error: bool) -> i64 {
    -2 * (index as i64) + i64::from(is_error)
}

/// Controls whether to print the outer parentheses in an expression like
/// "(x + y)". An "if" or "while" prints its own parentheses for "if (expr)"
/// because it needs to be able to say "if (x)", and a double-parenthesized
/// "if ((x == y))" trips clang's -Wparentheses-equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parentheses {
    Mandatory,
    Optional,
}

/// A gathered status code: its mangled C enum name, its source message, and
/// its severity.
#[derive(Debug, Clone)]
pub struct Status {
    pub name: String,
    pub msg: String,
    pub is_error: bool,
}

/// Scratch state reset at the start of every function body. The write and
/// read cursors number hoisted temporaries; they must agree again by the
/// end of the function.
#[derive(Default)]
struct PerFunc {
    receiver: Option<NameId>,
    jump_targets: FxHashMap<LoopId, u32>,
    temp_w: u32,
    temp_r: u32,
    public: bool,
    suspendible: bool,
}

/// Context threaded through all codegen functions for one package.
struct Gen<'a> {
    pkg_name: &'a str,
    tm: &'a Interner,
    files: &'a [File],
    status_list: Vec<Status>,
    status_map: FxHashMap<NameId, Status>,
    struct_list: Vec<&'a StructDecl>,
    struct_map: FxHashMap<NameId, &'a StructDecl>,
    per_func: PerFunc,
}

/// Generate the pre-formatter C source for one package.
pub fn generate_c(pkg_name: &str, tm: &Interner, files: &[File]) -> Result<String, GenError> {
    let mut g = Gen::new(pkg_name, tm, files);
    g.collect()?;

    let mut emitter = CEmitter::new();
    g.gen_header(&mut emitter)?;
    emitter.emit("// C HEADER ENDS HERE.\n\n");
    g.gen_impl(&mut emitter)?;
    Ok(emitter.finish())
}

/// Generate the formatted C translation unit for one package, piping the
/// output through the external C formatter.
pub fn generate(pkg_name: &str, tm: &Interner, files: &[File]) -> Result<Vec<u8>, GenError> {
    let out = generate_c(pkg_name, tm, files)?;
    crate::formatter::format_c(out.as_bytes())
}

/// Splits a built-in status entry into its severity and bare message.
fn split_built_in(s: &str) -> (bool, &str) {
    match s.strip_prefix("error ") {
        Some(msg) => (true, msg),
        None => (false, s.strip_prefix("status ").unwrap_or(s)),
    }
}

impl<'a> Gen<'a> {
    fn new(pkg_name: &'a str, tm: &'a Interner, files: &'a [File]) -> Gen<'a> {
        Gen {
            pkg_name,
            tm,
            files,
            status_list: Vec::new(),
            status_map: FxHashMap::default(),
            struct_list: Vec::new(),
            struct_map: FxHashMap::default(),
            per_func: PerFunc::default(),
        }
    }

    /// Walk the top-level declarations once, gathering the ordered status
    /// list and the topologically sorted struct list.
    fn collect(&mut self) -> Result<(), GenError> {
        // Seed the status map with any built-in whose message this package
        // mentions, so that `return status "short read"` resolves to the
        // built-in enum name. User-defined statuses shadow on collision.
        for s in &BUILT_IN_STATUSES {
            let (is_error, msg) = split_built_in(s);
            if let Some(id) = self.tm.get(&format!("\"{msg}\"")) {
                self.status_map.insert(
                    id,
                    Status {
                        name: c_mangle::c_name(self.pkg_name, s),
                        msg: msg.to_string(),
                        is_error,
                    },
                );
            }
        }

        for file in self.files {
            for decl in &file.decls {
                if let Decl::Status(n) = decl {
                    self.gather_status(n)?;
                }
            }
        }

        let mut unsorted: Vec<&'a StructDecl> = Vec::new();
        for file in self.files {
            for decl in &file.decls {
                if let Decl::Struct(n) = decl {
                    unsorted.push(n);
                }
            }
        }
        self.struct_list =
            ast::topological_sort_structs(&unsorted).ok_or(GenError::CyclicStructs)?;
        let mut struct_map = FxHashMap::default();
        for n in &self.struct_list {
            struct_map.insert(n.name, *n);
        }
        self.struct_map = struct_map;
        Ok(())
    }

    fn gather_status(&mut self, n: &StatusDecl) -> Result<(), GenError> {
        let token = self.tm.resolve(n.message);
        if token.len() < 2 || !token.starts_with('"') || !token.ends_with('"') {
            return Err(GenError::BadSourceForm(format!(
                "bad status message {token:?}"
            )));
        }
        let msg = &token[1..token.len() - 1];
        let is_error = n.keyword == StatusKind::Error;
        let prefix = if is_error { "error " } else { "status " };
        let s = Status {
            name: c_mangle::c_name(self.pkg_name, &format!("{prefix}{msg}")),
            msg: msg.to_string(),
            is_error,
        };
        self.status_list.push(s.clone());
        self.status_map.insert(n.message, s);
        Ok(())
    }

    /// All functions in declaration order.
    fn funcs(&self) -> impl Iterator<Item = &'a FuncDecl> + 'a {
        let files = self.files;
        files
            .iter()
            .flat_map(|f| f.decls.iter())
            .filter_map(|d| match d {
                Decl::Func(n) => Some(n),
                _ => None,
            })
    }

    /// Resolve a break/continue target loop to a dense label id, allocating
    /// one on first sight.
    pub(crate) fn jump_target(&mut self, loop_id: LoopId) -> Result<u32, GenError> {
        if let Some(&jt) = self.per_func.jump_targets.get(&loop_id) {
            return Ok(jt);
        }
        let jt = self.per_func.jump_targets.len() as u32;
        if jt == 1_000_000 {
            return Err(GenError::TooManyJumpTargets);
        }
        self.per_func.jump_targets.insert(loop_id, jt);
        Ok(jt)
    }

    fn gen_header(&self, emitter: &mut CEmitter) -> Result<(), GenError> {
        let include_guard = format!("PUFFS_{}_H", self.pkg_name.to_ascii_uppercase());
        emitter.emit(&format!(
            "#ifndef {include_guard}\n#define {include_guard}\n\n"
        ));

        emitter.emit("// Code generated by puffs-cgen. DO NOT EDIT.\n\n");
        emitter.emit(c_base::BASE_HEADER);
        emitter.emit("\n#ifdef __cplusplus\nextern \"C\" {\n#endif\n\n");

        emitter.emit("// ---------------- Status Codes\n\n");
        emitter.emit("// Status codes are non-positive integers.\n");
        emitter.emit("//\n");
        emitter.emit(
            "// The least significant bit indicates a non-recoverable status code: \
             an error.\n",
        );
        emitter.emit("typedef enum {\n");
        for (i, s) in BUILT_IN_STATUSES.iter().enumerate() {
            let (is_error, _) = split_built_in(s);
            emitter.emit(&format!(
                "{} = {},\n",
                c_mangle::c_name(self.pkg_name, s),
                status_value(i, is_error)
            ));
        }
        for (i, s) in self.status_list.iter().enumerate() {
            emitter.emit(&format!(
                "{} = {},\n",
                s.name,
                status_value(USER_DEFINED_STATUS_BASE + i, s.is_error)
            ));
        }
        emitter.emit(&format!("}} puffs_{}_status;\n\n", self.pkg_name));
        emitter.emit(&format!(
            "bool puffs_{0}_status_is_error(puffs_{0}_status s);\n\n",
            self.pkg_name
        ));
        emitter.emit(&format!(
            "const char* puffs_{0}_status_string(puffs_{0}_status s);\n\n",
            self.pkg_name
        ));

        emitter.emit("// ---------------- Structs\n\n");
        for n in &self.struct_list {
            self.write_struct(n, emitter)?;
        }

        emitter.emit("// ---------------- Public Constructor and Destructor Prototypes\n\n");
        for n in &self.struct_list {
            if n.public {
                self.write_ctor_prototype(n, emitter);
            }
        }

        emitter.emit("// ---------------- Public Function Prototypes\n\n");
        for n in self.funcs() {
            if n.public {
                self.write_func_prototype(n, emitter)?;
            }
        }

        emitter.emit("\n#ifdef __cplusplus\n}  // extern \"C\"\n#endif\n\n");
        emitter.emit(&format!("#endif  // {include_guard}\n\n"));
        Ok(())
    }

    fn gen_impl(&mut self, emitter: &mut CEmitter) -> Result<(), GenError> {
        emitter.emit(c_base::BASE_IMPL);
        emitter.emit("\n");

        emitter.emit("// ---------------- Status Codes Implementations\n\n");
        emitter.emit(&format!(
            "bool puffs_{0}_status_is_error(puffs_{0}_status s) {{ return s & 1; }}\n\n",
            self.pkg_name
        ));

        let n_statuses = BUILT_IN_STATUSES.len() + self.status_list.len();
        emitter.emit(&format!(
            "const char* puffs_{}_status_strings[{}] = {{\n",
            self.pkg_name, n_statuses
        ));
        for s in &BUILT_IN_STATUSES {
            let (_, msg) = split_built_in(s);
            emitter.emit(&format!("{:?},", format!("{}: {}", self.pkg_name, msg)));
        }
        for s in &self.status_list {
            emitter.emit(&format!("{:?},", format!("{}: {}", self.pkg_name, s.msg)));
        }
        emitter.emit("};\n\n");

        emitter.emit(&format!(
            "const char* puffs_{0}_status_string(puffs_{0}_status s) {{\n",
            self.pkg_name
        ));
        emitter.emit("s = -(s >> 1); if (0 <= s) {\n");
        emitter.emit(&format!(
            "if (s < {}) {{ return puffs_{}_status_strings[s]; }}\n",
            BUILT_IN_STATUSES.len(),
            self.pkg_name
        ));
        emitter.emit(&format!(
            "s -= {};\n",
            USER_DEFINED_STATUS_BASE - BUILT_IN_STATUSES.len()
        ));
        emitter.emit(&format!(
            "if (({} <= s) && (s < {})) {{ return puffs_{}_status_strings[s]; }}\n",
            BUILT_IN_STATUSES.len(),
            n_statuses,
            self.pkg_name
        ));
        emitter.emit(&format!(
            "}}\nreturn \"{}: unknown status\";\n",
            self.pkg_name
        ));
        emitter.emit("}\n\n");

        emitter.emit("// ---------------- Private Constructor and Destructor Prototypes\n\n");
        for n in &self.struct_list {
            if !n.public {
                self.write_ctor_prototype(n, emitter);
            }
        }

        emitter.emit("// ---------------- Private Function Prototypes\n\n");
        for n in self.funcs() {
            if !n.public {
                self.write_func_prototype(n, emitter)?;
            }
        }

        emitter.emit("// ---------------- Constructor and Destructor Implementations\n\n");
        emitter.emit(
            "// PUFFS_MAGIC is a magic number to check that constructors are called. It's\n\
             // not foolproof, given C doesn't automatically zero memory before use, but it\n\
             // should catch 99.99% of cases.\n\
             //\n\
             // Its (non-zero) value is arbitrary, based on md5sum(\"puffs\").\n\
             #define PUFFS_MAGIC (0xCB3699CCU)\n\n",
        );
        emitter.emit(
            "// PUFFS_ALREADY_ZEROED is passed from a container struct's constructor to a\n\
             // containee struct's constructor when the container has already zeroed the\n\
             // containee's memory.\n\
             //\n\
             // Its (non-zero) value is arbitrary, based on md5sum(\"zeroed\").\n\
             #define PUFFS_ALREADY_ZEROED (0x68602EF1U)\n\n",
        );
        for n in &self.struct_list {
            self.write_ctor_impl(n, emitter);
        }

        emitter.emit("// ---------------- Function Implementations\n\n");
        let funcs: Vec<&'a FuncDecl> = self.funcs().collect();
        for n in funcs {
            self.write_func_impl(n, emitter)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Field, Stmt, TypeExpr, TypeName};

    fn gen_foo(decls: Vec<Decl>, tm: &Interner) -> String {
        generate_c("foo", tm, &[File { decls }]).unwrap()
    }

    fn normalize(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn assert_contains(haystack: &str, needle: &str) {
        assert!(
            normalize(haystack).contains(&normalize(needle)),
            "generated C does not contain {needle:?}:\n{haystack}"
        );
    }

    #[test]
    fn built_in_status_enum_values() {
        let tm = Interner::new();
        let c = gen_foo(Vec::new(), &tm);
        assert_contains(&c, "puffs_foo_status_ok = 0,");
        assert_contains(&c, "puffs_foo_error_bad_version = -1,");
        assert_contains(&c, "puffs_foo_error_bad_receiver = -3,");
        assert_contains(&c, "puffs_foo_error_unexpected_eof = -9,");
        assert_contains(&c, "puffs_foo_status_short_read = -12,");
        assert_contains(&c, "puffs_foo_error_closed_for_writes = -15,");
    }

    #[test]
    fn status_value_invariants() {
        for i in 0..300 {
            for is_error in [false, true] {
                let v = status_value(i, is_error);
                assert!(v <= 0);
                assert_eq!(v & 1 == 1, is_error);
            }
        }
        assert_eq!(status_value(0, false), 0);
        assert_eq!(status_value(1, true), -1);
    }

    #[test]
    fn user_statuses_start_at_the_user_base() {
        let mut tm = Interner::new();
        let bad_magic = tm.intern("\"bad magic\"");
        let not_done = tm.intern("\"not done\"");
        let c = gen_foo(
            vec![
                Decl::Status(StatusDecl {
                    keyword: StatusKind::Error,
                    message: bad_magic,
                    public: true,
                }),
                Decl::Status(StatusDecl {
                    keyword: StatusKind::Status,
                    message: not_done,
                    public: false,
                }),
            ],
            &tm,
        );
        assert_contains(&c, "puffs_foo_error_bad_magic = -255,");
        assert_contains(&c, "puffs_foo_status_not_done = -258,");
        assert_contains(&c, "\"foo: bad magic\",");
        assert_contains(&c, "const char* puffs_foo_status_strings[11]");
    }

    #[test]
    fn status_string_falls_back_to_unknown() {
        let tm = Interner::new();
        let c = gen_foo(Vec::new(), &tm);
        assert_contains(&c, "const char* puffs_foo_status_strings[9]");
        assert_contains(&c, "return \"foo: unknown status\";");
        assert_contains(&c, "s = -(s >> 1);");
    }

    #[test]
    fn malformed_status_message_is_rejected() {
        let mut tm = Interner::new();
        let unquoted = tm.intern("bad magic");
        let err = generate_c(
            "foo",
            &tm,
            &[File {
                decls: vec![Decl::Status(StatusDecl {
                    keyword: StatusKind::Error,
                    message: unquoted,
                    public: true,
                })],
            }],
        )
        .unwrap_err();
        assert!(matches!(err, GenError::BadSourceForm(_)));
    }

    #[test]
    fn exactly_one_header_marker() {
        let tm = Interner::new();
        let c = gen_foo(Vec::new(), &tm);
        assert_eq!(c.matches("// C HEADER ENDS HERE.").count(), 1);
    }

    #[test]
    fn generation_is_deterministic() {
        let mut tm = Interner::new();
        let bar = tm.intern("bar");
        let count = tm.intern("count");
        let decls = vec![Decl::Struct(StructDecl {
            name: bar,
            fields: vec![Field {
                name: count,
                xtype: TypeExpr::base(TypeName::U32),
                default_value: None,
            }],
            public: true,
            suspendible: true,
        })];
        let a = generate_c("foo", &tm, &[File { decls: decls.clone() }]).unwrap();
        let b = generate_c("foo", &tm, &[File { decls }]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cyclic_structs_are_rejected() {
        let mut tm = Interner::new();
        let a_name = tm.intern("alpha");
        let b_name = tm.intern("beta");
        let field = tm.intern("sub");
        let mk = |name, other| {
            Decl::Struct(StructDecl {
                name,
                fields: vec![Field {
                    name: field,
                    xtype: TypeExpr::base(TypeName::Ident(other)),
                    default_value: None,
                }],
                public: false,
                suspendible: true,
            })
        };
        let err = generate_c(
            "foo",
            &tm,
            &[File {
                decls: vec![mk(a_name, b_name), mk(b_name, a_name)],
            }],
        )
        .unwrap_err();
        assert_eq!(err, GenError::CyclicStructs);
    }

    #[test]
    fn constructor_implementation_shape() {
        let mut tm = Interner::new();
        let inner = tm.intern("inner");
        let outer = tm.intern("outer");
        let sub = tm.intern("sub");
        let count = tm.intern("count");
        let c = gen_foo(
            vec![
                Decl::Struct(StructDecl {
                    name: outer,
                    fields: vec![
                        Field {
                            name: count,
                            xtype: TypeExpr::base(TypeName::U32),
                            default_value: Some(7),
                        },
                        Field {
                            name: sub,
                            xtype: TypeExpr::base(TypeName::Ident(inner)),
                            default_value: None,
                        },
                    ],
                    public: true,
                    suspendible: true,
                }),
                Decl::Struct(StructDecl {
                    name: inner,
                    fields: Vec::new(),
                    public: false,
                    suspendible: true,
                }),
            ],
            &tm,
        );
        assert_contains(&c, "if (!self) { return; }");
        assert_contains(
            &c,
            "if (puffs_version != PUFFS_VERSION) { \
             self->private_impl.status = puffs_foo_error_bad_version; return; }",
        );
        assert_contains(
            &c,
            "if (for_internal_use_only != PUFFS_ALREADY_ZEROED) \
             {memset(self, 0, sizeof(*self)); }",
        );
        assert_contains(&c, "self->private_impl.magic = PUFFS_MAGIC;");
        assert_contains(&c, "self->private_impl.f_count = 7;");
        assert_contains(
            &c,
            "puffs_foo_inner_constructor(&self->private_impl.f_sub,\
             PUFFS_VERSION, PUFFS_ALREADY_ZEROED);",
        );
        assert_contains(&c, "puffs_foo_inner_destructor(&self->private_impl.f_sub);");
        // The embedded struct's typedef must appear before its container's.
        let inner_pos = c.find("} puffs_foo_inner;").unwrap();
        let outer_pos = c.find("} puffs_foo_outer;").unwrap();
        assert!(inner_pos < outer_pos);
    }

    #[test]
    fn non_suspendible_structs_get_no_constructor() {
        let mut tm = Interner::new();
        let plain = tm.intern("plain");
        let c = gen_foo(
            vec![Decl::Struct(StructDecl {
                name: plain,
                fields: Vec::new(),
                public: true,
                suspendible: false,
            })],
            &tm,
        );
        assert!(!c.contains("puffs_foo_plain_constructor"));
        assert!(!c.contains("status status;"));
    }

    #[test]
    fn temp_cursors_must_agree_at_function_end() {
        // A suspendible call on the RHS of an assignment is hoisted and then
        // consumed; the generated function must balance its temp cursors.
        let mut tm = Interner::new();
        let bar = tm.intern("bar");
        let decode = tm.intern("decode");
        let src = tm.intern("src");
        let read_u8 = tm.intern("read_u8");
        let x = tm.intern("x");

        let call = Expr::call_suspendible(
            Expr::dot(Expr::dot(Expr::in_token(), src), read_u8),
            Vec::new(),
            TypeExpr::base(TypeName::U8),
        );
        let c = gen_foo(
            vec![
                Decl::Struct(StructDecl {
                    name: bar,
                    fields: Vec::new(),
                    public: true,
                    suspendible: true,
                }),
                Decl::Func(FuncDecl {
                    receiver: Some(bar),
                    name: decode,
                    in_fields: vec![Field {
                        name: src,
                        xtype: TypeExpr::ptr(TypeExpr::base(TypeName::Buf1)),
                        default_value: None,
                    }],
                    body: vec![
                        Stmt::Var {
                            name: x,
                            xtype: TypeExpr::base(TypeName::U8),
                            value: None,
                        },
                        Stmt::Assign {
                            op: crate::ast::AssignOp::Eq,
                            lhs: Expr::ident(x, TypeExpr::base(TypeName::U8)),
                            rhs: call,
                        },
                    ],
                    public: true,
                    suspendible: true,
                }),
            ],
            &tm,
        );
        assert_contains(&c, "uint8_t t_0 = a_src->ptr[a_src->ri++];");
        assert_contains(&c, "v_x = t_0;");
    }
}
