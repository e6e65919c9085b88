use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize,
            Deserialize,
        )]
        #[display("{}{}", $prefix, _0)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// A generic (or not yet realized) function or class definition.
    TemplateId,
    "tmpl"
);
define_id!(
    /// Arena slot of a realized function.
    FuncHandle,
    "fn"
);
define_id!(
    /// Arena slot of a realized class.
    ClassHandle,
    "class"
);
define_id!(
    /// A local binding within one realized function body.
    VarId,
    "v"
);
define_id!(GlobalId, "g");
define_id!(FuncId, "f");
define_id!(BlockId, "bb");
define_id!(LocalId, "_");

/// Monotonic allocator shared by the id types above.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next<T: From<u32>>(&mut self) -> T {
        let id = self.next;
        self.next += 1;
        T::from(id)
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(FuncHandle(3).to_string(), "fn3");
        assert_eq!(BlockId(0).to_string(), "bb0");
        assert_eq!(LocalId(12).to_string(), "_12");
    }

    #[test]
    fn allocator_is_monotonic() {
        let mut ids = IdAllocator::new();
        let a: VarId = ids.next();
        let b: VarId = ids.next();
        assert_eq!((a, b), (VarId(0), VarId(1)));
    }
}
