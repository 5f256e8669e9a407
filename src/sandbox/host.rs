//! In-process execution host
//!
//! Holds the loaded class files, the values of top-level variables, and the
//! console output written by `lib.sys.println`. A redefinition is accepted
//! only when it keeps the [`Shape`](crate::sandbox::classfile::Shape) of the
//! loaded class; bodies and initializers may change freely.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::sandbox::classfile::ClassFile;
use crate::sandbox::interp::{default_value, Interpreter};
use crate::sandbox::syntax::ast::Item;
use crate::sandbox::value::{Trap, Value};
use crate::service::{ClassBytes, ExecutionHost, HostError, InstallReport, InvokeError};

#[derive(Debug, Default)]
struct HostState {
    classes: HashMap<String, ClassFile>,
    statics: HashMap<String, Value>,
    console: Vec<String>,
    exit_code: Option<i64>,
}

impl HostState {
    fn ensure_running(&self) -> Result<(), HostError> {
        match self.exit_code {
            Some(code) => Err(HostError::Terminated(format!("exited with status {}", code))),
            None => Ok(()),
        }
    }
}

/// Execution host running class files in this process
#[derive(Debug, Default)]
pub struct SandboxHost {
    state: Mutex<HostState>,
    stop: AtomicBool,
}

impl SandboxHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the console output produced so far
    pub fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().console)
    }

    /// Status passed to `lib.sys.exit`, once the program exited
    pub fn exit_code(&self) -> Option<i64> {
        self.state.lock().exit_code
    }

    /// Number of loaded classes
    pub fn loaded(&self) -> usize {
        self.state.lock().classes.len()
    }
}

fn decode(class: &ClassBytes) -> Result<ClassFile, String> {
    let file = ClassFile::decode(&class.bytes).map_err(|err| err.to_string())?;
    if file.name != class.name {
        return Err(format!("class file declares {}", file.name));
    }
    Ok(file)
}

impl ExecutionHost for SandboxHost {
    fn load(
        &self,
        classes: &[ClassBytes],
    ) -> Result<InstallReport, HostError> {
        let mut state = self.state.lock();
        state.ensure_running()?;
        let mut report = InstallReport::all_installed();
        for class in classes {
            match decode(class) {
                Ok(file) => {
                    if let Item::Var(var) = &file.item {
                        state.statics.insert(class.name.clone(), default_value(&var.ty));
                    }
                    debug!(class = %class.name, "loaded");
                    state.classes.insert(class.name.clone(), file);
                }
                Err(reason) => {
                    warn!(class = %class.name, %reason, "load failed");
                    report.failed.push((class.name.clone(), reason));
                }
            }
        }
        Ok(report)
    }

    fn redefine(
        &self,
        classes: &[ClassBytes],
    ) -> Result<InstallReport, HostError> {
        let mut state = self.state.lock();
        state.ensure_running()?;
        let mut report = InstallReport::all_installed();
        for class in classes {
            let file = match decode(class) {
                Ok(file) => file,
                Err(reason) => {
                    report.failed.push((class.name.clone(), reason));
                    continue;
                }
            };
            let refused = match state.classes.get(&class.name) {
                None => Some("class is not loaded".to_string()),
                Some(loaded) if loaded.shape() != file.shape() => Some("class shape changed".to_string()),
                Some(_) => None,
            };
            match refused {
                Some(reason) => {
                    debug!(class = %class.name, %reason, "redefinition refused");
                    report.failed.push((class.name.clone(), reason));
                }
                None => {
                    debug!(class = %class.name, "redefined");
                    state.classes.insert(class.name.clone(), file);
                }
            }
        }
        Ok(report)
    }

    fn invoke(
        &self,
        class_name: &str,
        entry_point: &str,
    ) -> Result<Option<String>, InvokeError> {
        let mut state = self.state.lock();
        state.ensure_running()?;
        self.stop.store(false, Ordering::Relaxed);

        let has_entry = state
            .classes
            .get(class_name)
            .is_some_and(|file| file.entry.as_deref() == Some(entry_point));
        if !has_entry {
            return Err(HostError::Internal(format!("{} has no entry point {}", class_name, entry_point)).into());
        }

        let HostState {
            classes,
            statics,
            console,
            exit_code,
        } = &mut *state;
        let result = Interpreter::new(classes, statics, console, &self.stop).run_entry(class_name);
        match result {
            Ok(value) | Err(Trap::Return(value)) => Ok(value.display()),
            Err(Trap::Exception(message)) => Err(InvokeError::User { message }),
            Err(Trap::Unresolved { class_name, member }) => Err(InvokeError::Unresolved { class_name, member }),
            Err(Trap::Stopped) => Err(InvokeError::Stopped),
            Err(Trap::Exit(code)) => {
                info!(code, "program exited");
                *exit_code = Some(code);
                Err(HostError::Terminated(format!("exited with status {}", code)).into())
            }
            Err(Trap::Internal(message)) => {
                warn!(class = %class_name, %message, "internal error while running");
                Err(InvokeError::User {
                    message: format!("java.lang.InternalError: {}", message),
                })
            }
        }
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
