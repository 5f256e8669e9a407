//! Sandbox class files
//!
//! A class file is the annotated declaration of one snippet, serialized with
//! serde_json. Its [`Shape`] is what a redefinition must preserve: the static
//! layout and the member signatures other classes were linked against.

use serde::{Deserialize, Serialize};

use crate::sandbox::syntax::ast::{ClassDecl, Item, MethodDecl, TypeRef};

/// Generated class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassFile {
    /// Class name the engine chose
    pub name: String,
    /// Entry point, for executable snippets
    pub entry: Option<String>,
    /// Annotated declaration
    pub item: Item,
}

impl ClassFile {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Structure a redefinition has to keep
    pub fn shape(&self) -> Shape {
        match &self.item {
            Item::Var(var) => Shape::Var(TypeShape::of(&var.ty)),
            Item::Method(method) => Shape::Method(MethodShape::of(method)),
            Item::Class(class) => class_shape(class),
            Item::Import { .. } | Item::Stmt(_) => Shape::Code,
        }
    }

    /// Declared class, if this file holds one
    pub fn class(&self) -> Option<&ClassDecl> {
        match &self.item {
            Item::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Declared top-level method, if this file holds one
    pub fn method(&self) -> Option<&MethodDecl> {
        match &self.item {
            Item::Method(method) => Some(method),
            _ => None,
        }
    }
}

/// Written type together with the classes it was resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeShape {
    written: String,
    providers: Vec<Option<String>>,
}

impl TypeShape {
    fn of(ty: &TypeRef) -> Self {
        let mut providers = Vec::new();
        collect_providers(ty, &mut providers);
        Self {
            written: ty.written(),
            providers,
        }
    }
}

fn collect_providers(
    ty: &TypeRef,
    out: &mut Vec<Option<String>>,
) {
    out.push(ty.provider.clone());
    for arg in &ty.args {
        collect_providers(arg, out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodShape {
    name: String,
    erased: String,
    params: Vec<TypeShape>,
    ret: TypeShape,
}

impl MethodShape {
    fn of(method: &MethodDecl) -> Self {
        Self {
            name: method.name.clone(),
            erased: method.erased_signature(),
            params: method.params.iter().map(|p| TypeShape::of(&p.ty)).collect(),
            ret: TypeShape::of(&method.ret),
        }
    }
}

/// Redefinition-relevant structure of a class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Executable code only; always redefinable
    Code,
    Var(TypeShape),
    Method(MethodShape),
    Class {
        fields: Vec<(String, TypeShape)>,
        methods: Vec<MethodShape>,
    },
}

fn class_shape(class: &ClassDecl) -> Shape {
    Shape::Class {
        fields: class
            .fields
            .iter()
            .map(|f| (f.name.clone(), TypeShape::of(&f.ty)))
            .collect(),
        methods: class.methods.iter().map(MethodShape::of).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::syntax::parse_item;

    fn file(source: &str) -> ClassFile {
        ClassFile {
            name: "$Snip1_0".to_string(),
            entry: None,
            item: parse_item(source).unwrap(),
        }
    }

    #[test]
    fn test_encode_decode() {
        let original = file("int f(int a) { return a + 1; }");
        let decoded = ClassFile::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded.shape(), original.shape());
        assert!(decoded.method().is_some());
        assert!(ClassFile::decode(b"not json").is_err());
    }

    #[test]
    fn test_bodies_do_not_change_shape() {
        assert_eq!(
            file("int f(int a) { return a; }").shape(),
            file("int f(int a) { return a * 2; }").shape()
        );
        assert_ne!(file("int f(int a) { return a; }").shape(), file("double f(int a) { return a; }").shape());
        assert_eq!(file("int x = 1;").shape(), file("int x = 2;").shape());
        assert_ne!(file("int x;").shape(), file("String x;").shape());
    }

    #[test]
    fn test_class_shape_tracks_providers() {
        let a = file("class A { B b; }");
        let mut b = file("class A { B b; }");
        if let Item::Class(class) = &mut b.item {
            class.fields[0].ty.provider = Some("$Snip2_1".to_string());
        }
        assert_ne!(a.shape(), b.shape());
        assert_eq!(file("class A { int n; int get() { return n; } }").shape(), file("class A { int n; int get() { return 0; } }").shape());
    }
}
