//! Mangled name construction.
//!
//! A mangled name is the callable's identity in the IL: the `__`-joined
//! enclosing scope chain (root excluded), the unmangled name, the ordered
//! parameter type fingerprints, and the return type fingerprint (`void`
//! when absent). `fn main(): i32` at the top level mangles to `main__i32`;
//! `fn f(): i32` inside `namespace A` mangles to `A__f__i32`.
//!
//! Externally linked declarations are not mangled.

use dusk_core::TypeRef;

/// Build the mangled name of a function or affix.
pub fn mangle(chain: &[String], name: &str, params: &[TypeRef], ret: Option<&TypeRef>) -> String {
    let mut segments: Vec<String> = Vec::with_capacity(chain.len() + params.len() + 2);
    segments.extend(chain.iter().cloned());
    segments.push(name.to_string());
    segments.extend(params.iter().map(|p| p.fingerprint()));
    segments.push(ret.map(|r| r.fingerprint()).unwrap_or_else(|| "void".into()));
    segments.join("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_main() {
        let mangled = mangle(&[], "main", &[], Some(&TypeRef::named("i32")));
        assert_eq!(mangled, "main__i32");
    }

    #[test]
    fn namespaced_function() {
        let chain = vec!["A".to_string()];
        let mangled = mangle(&chain, "f", &[], Some(&TypeRef::named("i32")));
        assert_eq!(mangled, "A__f__i32");
    }

    #[test]
    fn params_fingerprint_in_order() {
        let params = vec![TypeRef::named("i32"), TypeRef::array_of(TypeRef::named("u8"))];
        let mangled = mangle(&[], "write", &params, None);
        assert_eq!(mangled, "write__i32__u8[]__void");
    }

    #[test]
    fn operator_names_pass_through() {
        let params = vec![TypeRef::named("i32"), TypeRef::named("i32")];
        let mangled = mangle(&[], "+", &params, Some(&TypeRef::named("i32")));
        assert_eq!(mangled, "+__i32__i32__i32");
    }
}
