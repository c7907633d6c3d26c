/// Name mangling for emitted C identifiers.

/// Prefixes are prepended to names to form a namespace and to avoid e.g.
/// "double" being a valid source variable name but not a valid C one.
pub const A_PREFIX: &str = "a_"; // Function argument.
pub const F_PREFIX: &str = "f_"; // Struct field.
pub const T_PREFIX: &str = "t_"; // Temporary for a hoisted suspendible call.
pub const V_PREFIX: &str = "v_"; // Local variable.

/// Mangle a logical name into the package namespace: prepend
/// `puffs_<pkg>_`, lowercase ASCII letters, keep digits and underscores,
/// map spaces to underscores and drop everything else.
pub fn c_name(pkg_name: &str, name: &str) -> String {
    let mut out = String::with_capacity("puffs_".len() + pkg_name.len() + 1 + name.len());
    out.push_str("puffs_");
    out.push_str(pkg_name);
    out.push('_');
    for c in name.chars() {
        match c {
            'A'..='Z' => out.push(c.to_ascii_lowercase()),
            'a'..='z' | '0'..='9' | '_' => out.push(c),
            ' ' => out.push('_'),
            _ => {}
        }
    }
    out
}
