//! Shared AST builders for the backend integration tests.
#![allow(dead_code)]

use puffs_cgen::ast::*;
use puffs_cgen::intern::{Interner, NameId};

pub fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        normalize(haystack).contains(&normalize(needle)),
        "generated C does not contain {needle:?}:\n{haystack}"
    );
}

pub fn u8_t() -> TypeExpr {
    TypeExpr::base(TypeName::U8)
}

pub fn u32_t() -> TypeExpr {
    TypeExpr::base(TypeName::U32)
}

pub fn bool_t() -> TypeExpr {
    TypeExpr::base(TypeName::Bool)
}

pub fn buf1_ptr_t() -> TypeExpr {
    TypeExpr::ptr(TypeExpr::base(TypeName::Buf1))
}

/// The `src ptr buf1` input parameter.
pub fn src_field(tm: &mut Interner) -> Field {
    Field {
        name: tm.intern("src"),
        xtype: buf1_ptr_t(),
        default_value: None,
    }
}

/// The `dst ptr buf1` input parameter.
pub fn dst_field(tm: &mut Interner) -> Field {
    Field {
        name: tm.intern("dst"),
        xtype: buf1_ptr_t(),
        default_value: None,
    }
}

/// `in.src.read_u8?()`
pub fn read_u8_call(tm: &mut Interner) -> Expr {
    let src = tm.intern("src");
    let read_u8 = tm.intern("read_u8");
    Expr::call_suspendible(
        Expr::dot(Expr::dot(Expr::in_token(), src), read_u8),
        Vec::new(),
        u8_t(),
    )
}

/// `in.dst.write_u8?(x:value)`
pub fn write_u8_call(tm: &mut Interner, value: Expr) -> Expr {
    let dst = tm.intern("dst");
    let write_u8 = tm.intern("write_u8");
    let x = tm.intern("x");
    Expr::call_suspendible(
        Expr::dot(Expr::dot(Expr::in_token(), dst), write_u8),
        vec![Arg { name: x, value }],
        u8_t(),
    )
}

/// `this.decode_header?(src:in.src)`
pub fn decode_header_call(tm: &mut Interner) -> Expr {
    let decode_header = tm.intern("decode_header");
    let src = tm.intern("src");
    let arg = Expr::dot(Expr::in_token(), src);
    Expr::call_suspendible(
        Expr::dot(Expr::this(), decode_header),
        vec![Arg {
            name: src,
            value: arg,
        }],
        u8_t(),
    )
}

pub fn empty_struct(tm: &mut Interner, name: &str, public: bool, suspendible: bool) -> Decl {
    Decl::Struct(StructDecl {
        name: tm.intern(name),
        fields: Vec::new(),
        public,
        suspendible,
    })
}

pub fn func(
    receiver: Option<NameId>,
    name: NameId,
    in_fields: Vec<Field>,
    body: Vec<Stmt>,
    public: bool,
    suspendible: bool,
) -> Decl {
    Decl::Func(FuncDecl {
        receiver,
        name,
        in_fields,
        body,
        public,
        suspendible,
    })
}

pub fn generate_foo(tm: &Interner, decls: Vec<Decl>) -> String {
    puffs_cgen::codegen::generate_c("foo", tm, &[File { decls }]).unwrap()
}
