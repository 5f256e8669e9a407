//! Sandbox compiler
//!
//! Analyzes and generates batches of wrapped units. Units are independent, so
//! both operations run them in parallel with rayon; inside a
//! [`PooledCompiler`](crate::service::PooledCompiler) the work stays on the
//! pool's threads.

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::sandbox::check::check_unit;
use crate::sandbox::classfile::ClassFile;
use crate::sandbox::syntax::ast::Item;
use crate::service::{
    AnalysisOutcome, ClassBytes, CompilationUnit, Compiler, GenerationOutcome, UnitAnalysis, UnitGeneration,
};
use crate::util::diagnostic::{codes, Diagnostic};

/// Compiler for the sandbox language
#[derive(Debug, Clone)]
pub struct SandboxCompiler {
    entry_point: String,
}

impl SandboxCompiler {
    /// Executable units get an entry point named `entry_point`
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
        }
    }

    fn analyze_unit(unit: &CompilationUnit) -> UnitAnalysis {
        match check_unit(&unit.source) {
            Ok(checked) => UnitAnalysis {
                diagnostics: checked.diagnostics,
                erased_signature: checked.erased_signature,
            },
            Err(err) => UnitAnalysis {
                diagnostics: vec![failure(&unit.class_name, err)],
                erased_signature: None,
            },
        }
    }

    fn generate_unit(
        &self,
        unit: &CompilationUnit,
    ) -> UnitGeneration {
        let checked = match check_unit(&unit.source) {
            Ok(checked) => checked,
            Err(err) => {
                return UnitGeneration {
                    diagnostics: vec![failure(&unit.class_name, err)],
                    classes: Vec::new(),
                }
            }
        };
        let item = match checked.item {
            Some(item) if !checked.diagnostics.iter().any(Diagnostic::is_error) => item,
            _ => {
                return UnitGeneration {
                    diagnostics: checked.diagnostics,
                    classes: Vec::new(),
                }
            }
        };
        if matches!(item, Item::Import { .. }) {
            return UnitGeneration {
                diagnostics: checked.diagnostics,
                classes: Vec::new(),
            };
        }

        let entry = matches!(item, Item::Var(_) | Item::Stmt(_)).then(|| self.entry_point.clone());
        let file = ClassFile {
            name: unit.class_name.clone(),
            entry,
            item,
        };
        match file.encode() {
            Ok(bytes) => {
                trace!(class = %unit.class_name, size = bytes.len(), "class generated");
                UnitGeneration {
                    diagnostics: checked.diagnostics,
                    classes: vec![ClassBytes {
                        name: unit.class_name.clone(),
                        bytes,
                    }],
                }
            }
            Err(err) => UnitGeneration {
                diagnostics: vec![failure(&unit.class_name, err)],
                classes: Vec::new(),
            },
        }
    }
}

fn failure(
    class_name: &str,
    err: impl std::fmt::Display,
) -> Diagnostic {
    Diagnostic::error(codes::COMPILER_FAILURE, format!("{}: {}", class_name, err), None)
}

impl Compiler for SandboxCompiler {
    fn analyze(
        &self,
        batch: &[CompilationUnit],
    ) -> AnalysisOutcome {
        debug!(units = batch.len(), "analyze");
        AnalysisOutcome::Ok(batch.par_iter().map(Self::analyze_unit).collect())
    }

    fn generate(
        &self,
        batch: &[CompilationUnit],
    ) -> GenerationOutcome {
        debug!(units = batch.len(), "generate");
        GenerationOutcome::Ok(batch.par_iter().map(|unit| self.generate_unit(unit)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SubKind;
    use crate::sandbox::wrap::TextWrapper;
    use crate::service::{ContextEntry, WrapRequest, Wrapper};

    fn unit(
        class_name: &str,
        fragment: &str,
        context: &[ContextEntry],
    ) -> CompilationUnit {
        TextWrapper::new().wrap(&WrapRequest {
            class_name,
            sub_kind: SubKind::Unknown,
            fragment,
            context,
        })
    }

    #[test]
    fn test_analyze_keeps_batch_order() {
        let batch = vec![
            unit("$Snip1_0", "int x = 1;", &[]),
            unit("$Snip2_0", "int f(String s) { return y; }", &[]),
            unit("$Snip3_0", "int f( {", &[]),
        ];
        let AnalysisOutcome::Ok(results) = SandboxCompiler::new("__run").analyze(&batch) else {
            panic!("analysis failed");
        };
        assert_eq!(results.len(), 3);
        assert!(results[0].diagnostics.is_empty());
        assert_eq!(results[1].erased_signature.as_deref(), Some("(String)"));
        assert!(results[1].diagnostics[0].is_resolution());
        assert!(results[2].diagnostics.iter().any(|d| d.is_error() && !d.is_resolution()));
    }

    #[test]
    fn test_generate_emits_one_class_per_unit() {
        let context = vec![ContextEntry {
            class_name: "$Snip1_0".to_string(),
            sub_kind: SubKind::VarDeclaration,
            fragment: "int x;".to_string(),
        }];
        let batch = vec![
            unit("$Snip2_0", "x + 1", &context),
            unit("$Snip3_0", "int g() { return x; }", &context),
            unit("$Snip4_0", "import lib.math.*;", &[]),
        ];
        let GenerationOutcome::Ok(results) = SandboxCompiler::new("__run").generate(&batch) else {
            panic!("generation failed");
        };
        let expression = ClassFile::decode(&results[0].classes[0].bytes).unwrap();
        assert_eq!(expression.name, "$Snip2_0");
        assert_eq!(expression.entry.as_deref(), Some("__run"));
        let method = ClassFile::decode(&results[1].classes[0].bytes).unwrap();
        assert_eq!(method.entry, None);
        assert!(results[2].classes.is_empty());
    }

    #[test]
    fn test_malformed_unit_is_a_compiler_failure() {
        let batch = vec![CompilationUnit {
            class_name: "$Snip1_0".to_string(),
            source: "not a unit".to_string(),
            ..Default::default()
        }];
        let GenerationOutcome::Ok(results) = SandboxCompiler::new("__run").generate(&batch) else {
            panic!("generation failed");
        };
        assert_eq!(results[0].diagnostics[0].code, codes::COMPILER_FAILURE);
    }
}
