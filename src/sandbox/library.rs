//! Builtin library
//!
//! Native functions grouped in packages (`lib.math`, `lib.text`, `lib.sys`).
//! They are only visible through imports: `import lib.math.max;` or
//! `import lib.math.*;`.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::sandbox::types::Ty;
use crate::sandbox::value::{Trap, Value};
use crate::service::IndexEntry;

/// Native function: arguments and the console buffer in, value out
pub type NativeHandler = fn(&[Value], &mut Vec<String>) -> Result<Value, Trap>;

/// One library function
pub struct NativeFunction {
    /// Fully qualified name, e.g. `lib.math.max`
    pub qualified_name: &'static str,
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub handler: NativeHandler,
}

impl NativeFunction {
    /// Package part of the qualified name
    pub fn package(&self) -> &'static str {
        self.qualified_name
            .rsplit_once('.')
            .map(|(package, _)| package)
            .unwrap_or("")
    }

    /// Last segment of the qualified name
    pub fn simple_name(&self) -> &'static str {
        self.qualified_name
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(self.qualified_name)
    }

    /// `max(int, int) -> int`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(Ty::to_string).collect();
        format!("{}({}) -> {}", self.simple_name(), params.join(", "), self.ret)
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("qualified_name", &self.qualified_name)
            .field("signature", &self.signature())
            .finish()
    }
}

/// Every builtin function, keyed by qualified name
#[derive(Debug)]
pub struct Library {
    functions: BTreeMap<&'static str, NativeFunction>,
}

static LIBRARY: Lazy<Library> = Lazy::new(Library::builtin);

impl Library {
    /// The shared builtin library
    pub fn get() -> &'static Library {
        &LIBRARY
    }

    fn builtin() -> Self {
        let mut library = Self {
            functions: BTreeMap::new(),
        };
        register_math(&mut library);
        register_text(&mut library);
        register_sys(&mut library);
        library
    }

    fn register(
        &mut self,
        qualified_name: &'static str,
        params: Vec<Ty>,
        ret: Ty,
        handler: NativeHandler,
    ) {
        self.functions.insert(
            qualified_name,
            NativeFunction {
                qualified_name,
                params,
                ret,
                handler,
            },
        );
    }

    /// Look up a function by qualified name
    pub fn function(
        &self,
        qualified_name: &str,
    ) -> Option<&NativeFunction> {
        self.functions.get(qualified_name)
    }

    /// Check if `package` holds any function
    pub fn has_package(
        &self,
        package: &str,
    ) -> bool {
        self.functions.values().any(|f| f.package() == package)
    }

    /// Functions of one package
    pub fn package(
        &self,
        package: &str,
    ) -> Vec<&NativeFunction> {
        self.functions.values().filter(|f| f.package() == package).collect()
    }

    /// Entries for the background library index
    pub fn index_entries(&self) -> Vec<IndexEntry> {
        self.functions
            .values()
            .map(|f| IndexEntry {
                qualified_name: f.qualified_name.to_string(),
                detail: f.signature(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn int_arg(
    args: &[Value],
    index: usize,
) -> Result<i64, Trap> {
    args.get(index)
        .and_then(Value::as_int)
        .ok_or_else(|| Trap::Internal(format!("argument {} is not an int", index)))
}

fn double_arg(
    args: &[Value],
    index: usize,
) -> Result<f64, Trap> {
    args.get(index)
        .and_then(Value::as_double)
        .ok_or_else(|| Trap::Internal(format!("argument {} is not a number", index)))
}

fn str_arg(
    args: &[Value],
    index: usize,
) -> Result<String, Trap> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(Value::Null) => Err(Trap::Exception("NullPointerException".to_string())),
        _ => Err(Trap::Internal(format!("argument {} is not a String", index))),
    }
}

fn register_math(library: &mut Library) {
    library.register("lib.math.abs", vec![Ty::Int], Ty::Int, |args, _| {
        Ok(Value::Int(int_arg(args, 0)?.wrapping_abs()))
    });
    library.register("lib.math.max", vec![Ty::Int, Ty::Int], Ty::Int, |args, _| {
        Ok(Value::Int(int_arg(args, 0)?.max(int_arg(args, 1)?)))
    });
    library.register("lib.math.min", vec![Ty::Int, Ty::Int], Ty::Int, |args, _| {
        Ok(Value::Int(int_arg(args, 0)?.min(int_arg(args, 1)?)))
    });
    library.register("lib.math.sqrt", vec![Ty::Double], Ty::Double, |args, _| {
        Ok(Value::Double(double_arg(args, 0)?.sqrt()))
    });
    library.register("lib.math.pow", vec![Ty::Double, Ty::Double], Ty::Double, |args, _| {
        Ok(Value::Double(double_arg(args, 0)?.powf(double_arg(args, 1)?)))
    });
}

fn register_text(library: &mut Library) {
    library.register("lib.text.length", vec![Ty::Str], Ty::Int, |args, _| {
        Ok(Value::Int(str_arg(args, 0)?.chars().count() as i64))
    });
    library.register("lib.text.upper", vec![Ty::Str], Ty::Str, |args, _| {
        Ok(Value::Str(str_arg(args, 0)?.to_uppercase()))
    });
    library.register("lib.text.repeat", vec![Ty::Str, Ty::Int], Ty::Str, |args, _| {
        let count = int_arg(args, 1)?;
        if count < 0 {
            return Err(Trap::Exception(format!("IllegalArgumentException: count is negative: {}", count)));
        }
        Ok(Value::Str(str_arg(args, 0)?.repeat(count as usize)))
    });
}

fn register_sys(library: &mut Library) {
    library.register("lib.sys.println", vec![Ty::Object], Ty::Void, |args, console| {
        console.push(args.first().map(Value::to_text).unwrap_or_default());
        Ok(Value::Void)
    });
    library.register("lib.sys.exit", vec![Ty::Int], Ty::Void, |args, _| Err(Trap::Exit(int_arg(args, 0)?)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packages() {
        let library = Library::get();
        assert!(library.has_package("lib.math"));
        assert!(!library.has_package("lib"));
        assert_eq!(library.package("lib.text").len(), 3);
        assert_eq!(library.index_entries().len(), library.len());
    }

    #[test]
    fn test_handlers() {
        let library = Library::get();
        let mut console = Vec::new();
        let max = library.function("lib.math.max").unwrap();
        let result = (max.handler)(&[Value::Int(3), Value::Int(9)], &mut console).unwrap();
        assert_eq!(result.as_int(), Some(9));
        assert_eq!(max.signature(), "max(int, int) -> int");

        let println = library.function("lib.sys.println").unwrap();
        (println.handler)(&[Value::Double(1.5)], &mut console).unwrap();
        assert_eq!(console, vec!["1.5".to_string()]);

        let exit = library.function("lib.sys.exit").unwrap();
        assert!(matches!((exit.handler)(&[Value::Int(2)], &mut console), Err(Trap::Exit(2))));
    }
}
