use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::memory;

//===----------------------------------------------------------------------===//
// String interner
//
// Canonicalizes equal byte content to a single heap string so equality
// reduces to pointer identity. The interner holds a strong handle on every
// canonical string; the interpreter is single-threaded, so the table lives
// in a thread-local.
//===----------------------------------------------------------------------===//

/// An interned, immutable string with its FNV-1a hash.
#[derive(Debug)]
pub struct StrObj {
    pub hash: u32,
    text: Box<str>,
}

impl StrObj {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Drop for StrObj {
    fn drop(&mut self) {
        memory::release(std::mem::size_of::<StrObj>() + self.text.len());
    }
}

pub type RStr = Rc<StrObj>;

/// 32-bit FNV-1a, the hash stored in every string object and consulted by
/// the equality fallback for transient uninterned copies.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in bytes {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

thread_local! {
    static INTERNER: RefCell<FxHashMap<Box<str>, RStr>> =
        RefCell::new(FxHashMap::default());
}

/// Returns the canonical string object for `text`, creating and recording
/// it on first sight.
pub fn intern(text: &str) -> RStr {
    INTERNER.with(|table| {
        let mut table = table.borrow_mut();
        if let Some(existing) = table.get(text) {
            return Rc::clone(existing);
        }

        memory::track(std::mem::size_of::<StrObj>() + text.len());
        let obj = Rc::new(StrObj {
            hash: fnv1a(text.as_bytes()),
            text: text.into(),
        });
        table.insert(text.into(), Rc::clone(&obj));
        obj
    })
}

/// Two strings are the same value when they are the same object, or, for a
/// transient uninterned copy, when hash and bytes agree.
pub fn str_eq(a: &RStr, b: &RStr) -> bool {
    Rc::ptr_eq(a, b) || (a.hash == b.hash && a.text == b.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bytes_intern_to_same_object() {
        let a = intern("hello");
        let b = intern("hello");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_bytes_intern_to_different_objects() {
        let a = intern("hello");
        let b = intern("world");
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn hash_is_fnv1a() {
        // FNV-1a of the empty input is the offset basis.
        assert_eq!(fnv1a(b""), 2166136261);
        let s = intern("abc");
        assert_eq!(s.hash, fnv1a(b"abc"));
    }

    #[test]
    fn str_eq_falls_back_to_bytes() {
        let a = intern("fallback");
        let b = Rc::new(StrObj {
            hash: fnv1a(b"fallback"),
            text: "fallback".into(),
        });
        assert!(str_eq(&a, &b));
    }
}
