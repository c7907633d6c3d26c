/// Mapping from source types to C type declarations.
use crate::ast::{TypeExpr, TypeName};
use crate::errors::GenError;
use crate::intern::Interner;

use super::c_emitter::CEmitter;

/// Maximum levels of pointer nesting in a single type.
pub const MAX_NUM_POINTERS: u32 = 16;

/// The C spelling of a built-in scalar or buffer type, or `None` for a
/// package-level type.
pub fn c_type_name(name: TypeName) -> Option<&'static str> {
    match name {
        TypeName::I8 => Some("int8_t"),
        TypeName::I16 => Some("int16_t"),
        TypeName::I32 => Some("int32_t"),
        TypeName::I64 => Some("int64_t"),
        TypeName::U8 => Some("uint8_t"),
        TypeName::U16 => Some("uint16_t"),
        TypeName::U32 => Some("uint32_t"),
        TypeName::U64 => Some("uint64_t"),
        TypeName::Usize => Some("size_t"),
        TypeName::Bool => Some("bool"),
        TypeName::Buf1 => Some("puffs_base_buf1"),
        TypeName::Buf2 => Some("puffs_base_buf2"),
        TypeName::Ident(_) => None,
    }
}

/// The natural [min, max] range of a numeric type. Refinement bounds equal
/// to these are implied by the C type itself and need no runtime check.
pub fn num_type_bounds(name: TypeName) -> [Option<i128>; 2] {
    match name {
        TypeName::I8 => [Some(i8::MIN as i128), Some(i8::MAX as i128)],
        TypeName::I16 => [Some(i16::MIN as i128), Some(i16::MAX as i128)],
        TypeName::I32 => [Some(i32::MIN as i128), Some(i32::MAX as i128)],
        TypeName::I64 => [Some(i64::MIN as i128), Some(i64::MAX as i128)],
        TypeName::U8 => [Some(0), Some(u8::MAX as i128)],
        TypeName::U16 => [Some(0), Some(u16::MAX as i128)],
        TypeName::U32 => [Some(0), Some(u32::MAX as i128)],
        TypeName::U64 => [Some(0), Some(u64::MAX as i128)],
        TypeName::Usize => [Some(0), Some(0)],
        TypeName::Bool => [Some(0), Some(1)],
        _ => [None, None],
    }
}

/// Write the C declaration of `prefix``var_name` with type `n`, in C
/// declarator order: base type, pointer stars, the variable name, then
/// trailing array extents. See http://unixwiz.net/techtips/reading-cdecl.html
pub fn write_c_type_name(
    pkg_name: &str,
    tm: &Interner,
    emitter: &mut CEmitter,
    n: &TypeExpr,
    prefix: &str,
    var_name: &str,
) -> Result<(), GenError> {
    // Peel the outer array extents; they render after the variable name.
    let mut x = n;
    while let TypeExpr::Array { inner, .. } = x {
        x = inner;
    }

    let mut num_pointers: u32 = 0;
    let mut innermost = x;
    while let TypeExpr::Ptr { inner } = innermost {
        if num_pointers == MAX_NUM_POINTERS {
            return Err(GenError::TooManyPointers(n.display(tm)));
        }
        num_pointers += 1;
        innermost = inner;
    }

    let TypeExpr::Base { name, .. } = innermost else {
        return Err(GenError::Unsupported(format!(
            "cannot convert type \"{}\" to C",
            n.display(tm)
        )));
    };
    match *name {
        TypeName::Ident(id) => {
            emitter.emit(&format!("puffs_{}_{}", pkg_name, tm.resolve(id)));
        }
        builtin => match c_type_name(builtin) {
            Some(s) => emitter.emit(s),
            None => {
                return Err(GenError::InternalInvariant(format!(
                    "no C spelling for type \"{}\"",
                    n.display(tm)
                )))
            }
        },
    }

    for _ in 0..num_pointers {
        emitter.emit("*");
    }

    emitter.emit(" ");
    emitter.emit(prefix);
    emitter.emit(var_name);

    let mut x = n;
    while let TypeExpr::Array { length, inner } = x {
        emitter.emit(&format!("[{length}]"));
        x = inner;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(n: &TypeExpr, prefix: &str, var_name: &str) -> Result<String, GenError> {
        let tm = Interner::new();
        let mut emitter = CEmitter::new();
        write_c_type_name("foo", &tm, &mut emitter, n, prefix, var_name)?;
        Ok(emitter.finish())
    }

    #[test]
    fn scalar_declarations() {
        let n = TypeExpr::base(TypeName::U32);
        assert_eq!(render(&n, "f_", "count").unwrap(), "uint32_t f_count");
        let n = TypeExpr::base(TypeName::Usize);
        assert_eq!(render(&n, "v_", "i").unwrap(), "size_t v_i");
    }

    #[test]
    fn pointer_declarations() {
        let n = TypeExpr::ptr(TypeExpr::base(TypeName::Buf1));
        assert_eq!(render(&n, "a_", "src").unwrap(), "puffs_base_buf1* a_src");
        let n = TypeExpr::ptr(TypeExpr::ptr(TypeExpr::base(TypeName::U8)));
        assert_eq!(render(&n, "v_", "p").unwrap(), "uint8_t** v_p");
    }

    #[test]
    fn array_extents_render_after_the_name() {
        let n = TypeExpr::array(4096, TypeExpr::base(TypeName::U8));
        assert_eq!(render(&n, "f_", "stack").unwrap(), "uint8_t f_stack[4096]");
        let n = TypeExpr::array(2, TypeExpr::array(8, TypeExpr::base(TypeName::U8)));
        assert_eq!(render(&n, "v_", "grid").unwrap(), "uint8_t v_grid[2][8]");
    }

    #[test]
    fn package_types() {
        let mut tm = Interner::new();
        let bar = tm.intern("bar");
        let mut emitter = CEmitter::new();
        let n = TypeExpr::base(TypeName::Ident(bar));
        write_c_type_name("foo", &tm, &mut emitter, &n, "f_", "sub").unwrap();
        assert_eq!(emitter.finish(), "puffs_foo_bar f_sub");
    }

    #[test]
    fn seventeen_pointers_is_too_many() {
        let mut n = TypeExpr::base(TypeName::U8);
        for _ in 0..17 {
            n = TypeExpr::ptr(n);
        }
        assert!(matches!(
            render(&n, "v_", "p"),
            Err(GenError::TooManyPointers(_))
        ));
    }
}
