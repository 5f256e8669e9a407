//! Sandbox type model

use std::fmt;

/// Checked type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Int,
    Double,
    Boolean,
    Str,
    Void,
    /// Type of the `null` literal
    Null,
    /// Top of the reference hierarchy
    Object,
    /// `List<T>` or `Map<K, V>`; only `null` inhabits them
    Generic { name: String, args: Vec<Ty> },
    /// User class and the class file that declares it
    Class { name: String, provider: String },
    /// Already reported; compatible with everything
    Error,
}

/// Builtin generic types and their arity
pub const GENERICS: &[(&str, usize)] = &[("List", 1), ("Map", 2)];

impl Ty {
    /// Builtin non-generic type for a written name
    pub fn builtin(name: &str) -> Option<Ty> {
        let ty = match name {
            "int" => Ty::Int,
            "double" => Ty::Double,
            "boolean" => Ty::Boolean,
            "String" => Ty::Str,
            "Object" => Ty::Object,
            "void" => Ty::Void,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Double | Ty::Error)
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Ty::Str | Ty::Null | Ty::Object | Ty::Generic { .. } | Ty::Class { .. }
        )
    }

    /// A value of `self` can be stored in a slot of type `target`
    pub fn assignable_to(
        &self,
        target: &Ty,
    ) -> bool {
        match (self, target) {
            (Ty::Error, _) | (_, Ty::Error) => true,
            (Ty::Void, _) | (_, Ty::Void) => false,
            (Ty::Int, Ty::Double) => true,
            (Ty::Null, t) => t.is_reference() && *t != Ty::Null,
            (_, Ty::Object) => true,
            (Ty::Generic { name: a, .. }, Ty::Generic { name: b, .. }) => a == b && self == target,
            (a, b) => a == b,
        }
    }

    /// Type stored for an inferred variable: `null` widens to `Object`
    pub fn denotable(&self) -> Ty {
        match self {
            Ty::Null | Ty::Error => Ty::Object,
            other => other.clone(),
        }
    }

    /// Result of a numeric binary operator
    pub fn numeric_join(
        &self,
        other: &Ty,
    ) -> Ty {
        match (self, other) {
            (Ty::Error, _) | (_, Ty::Error) => Ty::Error,
            (Ty::Int, Ty::Int) => Ty::Int,
            _ => Ty::Double,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Double => write!(f, "double"),
            Ty::Boolean => write!(f, "boolean"),
            Ty::Str => write!(f, "String"),
            Ty::Void => write!(f, "void"),
            Ty::Null => write!(f, "null"),
            Ty::Object => write!(f, "Object"),
            Ty::Generic { name, args } => {
                let args: Vec<String> = args.iter().map(Ty::to_string).collect();
                write!(f, "{}<{}>", name, args.join(", "))
            }
            Ty::Class { name, .. } => write!(f, "{}", name),
            Ty::Error => write!(f, "<error>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> Ty {
        Ty::Class {
            name: name.to_string(),
            provider: format!("$S_{}", name),
        }
    }

    #[test]
    fn test_widening_and_null() {
        assert!(Ty::Int.assignable_to(&Ty::Double));
        assert!(!Ty::Double.assignable_to(&Ty::Int));
        assert!(Ty::Null.assignable_to(&Ty::Str));
        assert!(Ty::Null.assignable_to(&class("A")));
        assert!(!Ty::Null.assignable_to(&Ty::Int));
        assert!(Ty::Int.assignable_to(&Ty::Object));
        assert!(!Ty::Void.assignable_to(&Ty::Object));
    }

    #[test]
    fn test_classes_compare_by_provider() {
        let old = Ty::Class {
            name: "A".to_string(),
            provider: "$S1_0".to_string(),
        };
        let new = Ty::Class {
            name: "A".to_string(),
            provider: "$S1_1".to_string(),
        };
        assert!(!old.assignable_to(&new));
        assert!(class("A").assignable_to(&class("A")));
    }

    #[test]
    fn test_generics() {
        let strings = Ty::Generic {
            name: "List".to_string(),
            args: vec![Ty::Str],
        };
        let ints = Ty::Generic {
            name: "List".to_string(),
            args: vec![Ty::Int],
        };
        assert!(!strings.assignable_to(&ints));
        assert_eq!(strings.to_string(), "List<String>");
        assert_eq!(Ty::Null.denotable(), Ty::Object);
    }
}
