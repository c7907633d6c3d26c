//! End-to-end scenarios: each builds a small checked package AST and checks
//! the generated C for the expected (whitespace-normalized) fragments.
mod common;

use common::*;
use puffs_cgen::ast::*;
use puffs_cgen::intern::Interner;

#[test]
fn empty_package_emits_the_status_enum() {
    let tm = Interner::new();
    let c = generate_foo(&tm, Vec::new());
    assert_contains(&c, "typedef enum {");
    assert_contains(&c, "puffs_foo_status_ok = 0,");
    assert_contains(&c, "puffs_foo_error_bad_version = -1,");
    assert_contains(&c, "} puffs_foo_status;");
}

#[test]
fn suspendible_struct_layout() {
    let mut tm = Interner::new();
    let bar = tm.intern("bar");
    let count = tm.intern("count");
    let decls = vec![Decl::Struct(StructDecl {
        name: bar,
        fields: vec![Field {
            name: count,
            xtype: u32_t(),
            default_value: None,
        }],
        public: true,
        suspendible: true,
    })];
    let c = generate_foo(&tm, decls);
    assert_contains(
        &c,
        "struct { puffs_foo_status status; uint32_t magic; uint32_t f_count; } \
         private_impl;",
    );
    assert_contains(&c, "} puffs_foo_bar;");
    assert_contains(
        &c,
        "void puffs_foo_bar_constructor(puffs_foo_bar *self, \
         uint32_t puffs_version, uint32_t for_internal_use_only);",
    );
    assert_contains(&c, "void puffs_foo_bar_destructor(puffs_foo_bar *self);");
}

#[test]
fn public_suspendible_method_prototype_and_epilogue() {
    let mut tm = Interner::new();
    let bar = tm.intern("bar");
    let decode = tm.intern("decode");
    let decls = vec![
        empty_struct(&mut tm, "bar", true, true),
        func(Some(bar), decode, Vec::new(), Vec::new(), true, true),
    ];
    let c = generate_foo(&tm, decls);
    assert_contains(
        &c,
        "puffs_foo_status puffs_foo_bar_decode(puffs_foo_bar *self);",
    );
    assert_contains(&c, "if (!self) { return puffs_foo_error_bad_receiver;}");
    assert_contains(&c, "puffs_foo_status status = self->private_impl.status;");
    assert_contains(&c, "if (status & 1) { return status; }");
    assert_contains(
        &c,
        "if (self->private_impl.magic != PUFFS_MAGIC) \
         {status = puffs_foo_error_constructor_not_called; goto cleanup0; }",
    );
    assert_contains(&c, "cleanup0: self->private_impl.status = status;");
    assert_contains(&c, "return status;");
}

#[test]
fn read_u8_is_hoisted_into_a_temporary() {
    let mut tm = Interner::new();
    let bar = tm.intern("bar");
    let decode = tm.intern("decode");
    let x = tm.intern("x");
    let body = vec![
        Stmt::Var {
            name: x,
            xtype: u8_t(),
            value: None,
        },
        Stmt::Assign {
            op: AssignOp::Eq,
            lhs: Expr::ident(x, u8_t()),
            rhs: read_u8_call(&mut tm),
        },
    ];
    let src = src_field(&mut tm);
    let decls = vec![
        empty_struct(&mut tm, "bar", true, true),
        func(Some(bar), decode, vec![src], body, true, true),
    ];
    let c = generate_foo(&tm, decls);
    assert_contains(&c, "uint8_t v_x;");
    assert_contains(
        &c,
        "if (a_src->ri >= a_src->wi) { status = a_src->closed ? \
         puffs_foo_error_unexpected_eof : puffs_foo_status_short_read; \
         goto cleanup0; }",
    );
    assert_contains(&c, "t_0 = a_src->ptr[a_src->ri++];");
    assert_contains(&c, "v_x = t_0;");
}

#[test]
fn user_defined_error_status() {
    let mut tm = Interner::new();
    let bad_magic = tm.intern("\"bad magic\"");
    let decls = vec![Decl::Status(StatusDecl {
        keyword: StatusKind::Error,
        message: bad_magic,
        public: true,
    })];
    let c = generate_foo(&tm, decls);
    // The first user-defined status sits at enum index 128: -2*128, nudged
    // +1 because it is an error.
    assert_contains(&c, "puffs_foo_error_bad_magic = -255,");
    assert_contains(&c, "\"foo: bad magic\",");
}

#[test]
fn return_with_a_built_in_status() {
    let mut tm = Interner::new();
    let bar = tm.intern("bar");
    let decode = tm.intern("decode");
    let fill = tm.intern("fill");
    let short_read = tm.intern("\"short read\"");
    let body = || {
        vec![Stmt::Return {
            status: Some(short_read),
        }]
    };
    let decls = vec![
        empty_struct(&mut tm, "bar", true, true),
        func(Some(bar), decode, Vec::new(), body(), true, true),
        func(Some(bar), fill, Vec::new(), body(), false, true),
    ];
    let c = generate_foo(&tm, decls);
    // Public suspendible: funnel through the cleanup label. Private
    // suspendible: return the status directly.
    assert_contains(&c, "status = puffs_foo_status_short_read; goto cleanup0;");
    assert_contains(&c, "return puffs_foo_status_short_read;");
}

#[test]
fn plain_return_yields_ok() {
    let mut tm = Interner::new();
    let bar = tm.intern("bar");
    let fill = tm.intern("fill");
    let decls = vec![
        empty_struct(&mut tm, "bar", true, true),
        func(
            Some(bar),
            fill,
            Vec::new(),
            vec![Stmt::Return { status: None }],
            false,
            true,
        ),
    ];
    let c = generate_foo(&tm, decls);
    assert_contains(&c, "return puffs_foo_status_ok;");
}
