//! Evaluation fixpoint loop
//!
//! `compile_and_load` takes a working set of units and repeats
//!
//! 1. wrap every unit against the working set and analyze the batch,
//! 2. corral recoverable declarations and re-analyze if any were corralled,
//! 3. generate the defined units, dropping generation failures and retrying,
//! 4. load new classes and redefine stale ones, replacing units whose
//!    redefinition was refused,
//! 5. pull in the dependents of every unit whose outcome may affect them,
//!
//! until no dependent is added and no replacement was needed. The working set
//! only grows, so the loop is bounded by the snippet graph.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace, warn};

use crate::engine::event::SnippetEvent;
use crate::engine::snippet::{Snippet, SnippetId, Status, SubKind};
use crate::engine::tracker::ArtifactState;
use crate::engine::unit::Unit;
use crate::engine::{Engine, EngineResult};
use crate::service::{AnalysisOutcome, ClassBytes, CompilationUnit, ContextEntry, GenerationOutcome, UnitGeneration, WrapRequest};
use crate::util::diagnostic::{codes, DiagList, Diagnostic};

type WorkingSet = IndexMap<SnippetId, Unit>;

/// Per-unit analysis, translated into snippet coordinates
struct Analyzed {
    diagnostics: DiagList,
    erased_signature: Option<String>,
}

impl Engine {
    /// Run the working set to convergence and persist the outcome
    ///
    /// Returns every unit that took part, in the order it joined.
    pub(crate) fn compile_and_load(
        &mut self,
        initial: Vec<Unit>,
    ) -> EngineResult<Vec<Unit>> {
        let mut ins: WorkingSet = initial.into_iter().map(|u| (u.snippet(), u)).collect();
        if ins.is_empty() {
            return Ok(Vec::new());
        }
        let mut replaced: IndexSet<SnippetId> = IndexSet::new();
        let mut pass = 0usize;

        loop {
            pass += 1;
            debug!(pass, working = ?ins.keys().collect::<Vec<_>>(), "compile and load");

            let ids: Vec<SnippetId> = ins.keys().copied().collect();
            for id in &ids {
                if let Some(old) = ins[id].initialize() {
                    self.overwrite_slot_occupant(old, &mut ins[id]);
                }
            }

            self.wrap_units(&mut ins, &ids, &ids);
            let analyzed = self.analyze(&ins, &ids);
            for (id, result) in ids.iter().zip(analyzed) {
                let unit = &mut ins[id];
                unit.set_diagnostics(result.diagnostics);
                unit.set_erased_signature(result.erased_signature);
            }

            let mut any_corralled = false;
            for id in &ids {
                if ins[id].corral_if_needed(&self.store[*id]) {
                    trace!(snippet = %id, "corralled");
                    any_corralled = true;
                }
            }
            if any_corralled {
                self.wrap_units(&mut ins, &ids, &ids);
                let reanalyzed = self.analyze(&ins, &ids);
                for (id, result) in ids.iter().zip(reanalyzed) {
                    ins[id].set_corral_diagnostics(result.diagnostics);
                }
            }

            for id in &ids {
                ins[id].set_status();
                trace!(snippet = %id, status = %ins[id].status(), "analyzed");
                self.check_for_erasure_overwrite(&ins, *id)
                    .into_iter()
                    .for_each(|event| ins[id].record_erasure_overwrite(event));
            }

            let success = self.generate_and_load(&mut ins, &mut replaced)?;

            let mut new_dependents: IndexMap<SnippetId, Unit> = IndexMap::new();
            for unit in ins.values() {
                let snippet = &self.store[unit.snippet()];
                if !unit.affects_dependents(snippet) {
                    continue;
                }
                for dependent in self.dependents(snippet, &ins) {
                    new_dependents.entry(dependent.snippet()).or_insert(dependent);
                }
            }
            debug!(
                pass,
                dependents = ?new_dependents.keys().collect::<Vec<_>>(),
                success,
                "pass finished"
            );

            if new_dependents.is_empty() && success {
                let units: Vec<Unit> = ins.into_values().collect();
                for unit in &units {
                    self.finish(unit);
                }
                return Ok(units);
            }
            ins.extend(new_dependents);
        }
    }

    /// Active snippets referencing `snippet`, as dependency units
    pub(crate) fn dependents(
        &self,
        snippet: &Snippet,
        working: &WorkingSet,
    ) -> Vec<Unit> {
        self.deps
            .dependents_of(snippet)
            .into_iter()
            .filter_map(|index| self.store.latest(index))
            .filter(|dep| dep.id() != snippet.id() && dep.status().is_active() && !working.contains_key(&dep.id()))
            .map(|dep| Unit::dependency(dep, snippet.id()))
            .collect()
    }

    /// Mark the previous occupant of the unit's slot as overwritten
    fn overwrite_slot_occupant(
        &mut self,
        old: SnippetId,
        unit: &mut Unit,
    ) {
        let occupant = &mut self.store[old];
        if old == unit.snippet() || !occupant.status().is_active() {
            return;
        }
        let previous_status = occupant.status();
        occupant.set_status(Status::Overwritten);
        debug!(snippet = %old, by = %unit.snippet(), "overwritten");
        unit.push_secondary_event(SnippetEvent {
            snippet: old,
            previous_status,
            status: Status::Overwritten,
            signature_changed: false,
            cause: Some(unit.snippet()),
            value: None,
            exception: None,
        });
    }

    /// Overwrite other active methods whose erased signature matches a
    /// directly submitted method's
    fn check_for_erasure_overwrite(
        &mut self,
        ins: &WorkingSet,
        id: SnippetId,
    ) -> Vec<SnippetEvent> {
        let unit = &ins[&id];
        let signature = match unit.erased_signature() {
            Some(signature) if !unit.is_dependency() && unit.sub_kind() == SubKind::Method && unit.is_defined() => signature,
            _ => return Vec::new(),
        };
        let name = self.store[id].name().map(str::to_string);
        let matching: Vec<SnippetId> = self
            .store
            .iter()
            .filter(|other| {
                other.id() != id
                    && other.sub_kind() == SubKind::Method
                    && other.name().map(str::to_string) == name
                    && other.status().is_active()
                    && !ins.contains_key(&other.id())
                    && other.erased_signature() == Some(signature)
            })
            .map(Snippet::id)
            .collect();

        matching
            .into_iter()
            .map(|other| {
                let snippet = &mut self.store[other];
                let previous_status = snippet.status();
                snippet.set_status(Status::Overwritten);
                debug!(snippet = %other, by = %id, signature, "overwritten by erasure");
                SnippetEvent {
                    snippet: other,
                    previous_status,
                    status: Status::Overwritten,
                    signature_changed: false,
                    cause: Some(id),
                    value: None,
                    exception: None,
                }
            })
            .collect()
    }

    /// Declarations outside the working set that wrapped units may use
    fn outside_context(
        &self,
        ins: &WorkingSet,
    ) -> Vec<ContextEntry> {
        let working_keys: HashSet<usize> = ins.keys().map(|id| self.store[*id].key().index()).collect();
        self.store
            .iter()
            .filter(|s| s.kind().is_persistent() && s.status().is_defined() && !working_keys.contains(&s.key().index()))
            .map(|s| {
                let fragment = match (s.status(), s.corralled()) {
                    (Status::RecoverableDefined, Some(corralled)) => corralled,
                    _ => s.guts(),
                };
                ContextEntry {
                    class_name: s.class_name().to_string(),
                    sub_kind: s.sub_kind(),
                    fragment: fragment.to_string(),
                }
            })
            .collect()
    }

    /// Wrap `targets` so that each sees the outside context plus the other
    /// `visible` units
    fn wrap_units(
        &self,
        ins: &mut WorkingSet,
        targets: &[SnippetId],
        visible: &[SnippetId],
    ) {
        let outside = self.outside_context(ins);
        for id in targets {
            let mut context = outside.clone();
            for other in visible.iter().filter(|other| *other != id) {
                let snippet = &self.store[*other];
                if !snippet.kind().is_persistent() {
                    continue;
                }
                context.push(ContextEntry {
                    class_name: snippet.class_name().to_string(),
                    sub_kind: snippet.sub_kind(),
                    fragment: ins[other].active_fragment(snippet).to_string(),
                });
            }

            let snippet = &self.store[*id];
            let wrapped = self.wrapper.wrap(&WrapRequest {
                class_name: snippet.class_name(),
                sub_kind: snippet.sub_kind(),
                fragment: ins[id].active_fragment(snippet),
                context: &context,
            });
            ins[id].set_wrapped(wrapped);
        }
    }

    fn batch(
        ins: &WorkingSet,
        ids: &[SnippetId],
    ) -> Vec<CompilationUnit> {
        ids.iter().map(|id| ins[id].wrapped().clone()).collect()
    }

    /// Analyze `ids`; a failed batch attributes the failure to every unit
    fn analyze(
        &self,
        ins: &WorkingSet,
        ids: &[SnippetId],
    ) -> Vec<Analyzed> {
        let batch = Self::batch(ins, ids);
        let failure = |reason: String| -> Vec<Analyzed> {
            warn!(%reason, "analysis failed");
            batch
                .iter()
                .map(|_| Analyzed {
                    diagnostics: vec![Diagnostic::error(codes::COMPILER_FAILURE, reason.clone(), None)].into(),
                    erased_signature: None,
                })
                .collect()
        };

        match self.compiler.analyze(&batch) {
            AnalysisOutcome::Ok(results) if results.len() == batch.len() => results
                .into_iter()
                .zip(&batch)
                .map(|(result, unit)| Analyzed {
                    diagnostics: to_fragment(unit, result.diagnostics),
                    erased_signature: result.erased_signature,
                })
                .collect(),
            AnalysisOutcome::Ok(results) => failure(format!(
                "compiler answered {} of {} units",
                results.len(),
                batch.len()
            )),
            AnalysisOutcome::Fatal(reason) => failure(reason),
        }
    }

    /// Generate the defined units and install their classes
    ///
    /// Returns `false` when some redefinition was refused and units were
    /// moved to fresh class names.
    fn generate_and_load(
        &mut self,
        ins: &mut WorkingSet,
        replaced: &mut IndexSet<SnippetId>,
    ) -> EngineResult<bool> {
        loop {
            let legit: Vec<SnippetId> = ins.values().filter(|u| u.is_defined()).map(Unit::snippet).collect();
            debug!(legit = ?legit, "generate");
            if legit.is_empty() {
                return Ok(true);
            }

            self.wrap_units(ins, &legit, &legit);
            let batch = Self::batch(ins, &legit);
            let generated: Vec<UnitGeneration> = match self.compiler.generate(&batch) {
                GenerationOutcome::Ok(results) if results.len() == batch.len() => results,
                GenerationOutcome::Ok(results) => {
                    let reason = format!("compiler generated {} of {} units", results.len(), batch.len());
                    self.smash_all(ins, &legit, &reason);
                    continue;
                }
                GenerationOutcome::Fatal(reason) => {
                    self.smash_all(ins, &legit, &reason);
                    continue;
                }
            };

            let mut smashed = false;
            for ((id, result), unit) in legit.iter().zip(&generated).zip(&batch) {
                let diagnostics = to_fragment(unit, result.diagnostics.clone());
                if diagnostics.has_errors() {
                    debug!(snippet = %id, "generation failed, retrying without it");
                    ins[id].smash(diagnostics);
                    smashed = true;
                }
            }
            if smashed {
                continue;
            }

            let mut to_load: Vec<ClassBytes> = Vec::new();
            for (id, result) in legit.iter().zip(generated) {
                let mut new = Vec::new();
                let mut stale = Vec::new();
                for class in result.classes {
                    self.tracker.record_compiled(&class);
                    match self.tracker.state(&class.name) {
                        Some(ArtifactState::New) => new.push(class),
                        Some(ArtifactState::Stale) => stale.push(class),
                        _ => {}
                    }
                }
                to_load.extend(ins[id].classes_to_load(new, stale));
            }
            self.load(&to_load)?;

            let mut to_replace = Vec::new();
            for id in &legit {
                let classes = ins[id].take_redefinitions();
                if classes.is_empty() {
                    continue;
                }
                if !self.redefine(&classes)? {
                    to_replace.push(*id);
                }
            }

            if to_replace.is_empty() {
                return Ok(true);
            }
            debug!(replace = ?to_replace, "redefinition refused");
            replaced.extend(to_replace);
            for id in replaced.iter() {
                let sequence = self.keys.next_sequence(self.store[*id].key().index());
                self.store[*id].set_sequence(sequence, &self.config.class_prefix);
                trace!(snippet = %id, class = self.store[*id].class_name(), "replaced");
            }
            return Ok(false);
        }
    }

    fn smash_all(
        &self,
        ins: &mut WorkingSet,
        legit: &[SnippetId],
        reason: &str,
    ) {
        warn!(%reason, "generation failed");
        for id in legit {
            let diagnostics = vec![Diagnostic::error(codes::COMPILER_FAILURE, reason, None)].into();
            ins[id].smash(diagnostics);
        }
    }

    fn load(
        &mut self,
        classes: &[ClassBytes],
    ) -> EngineResult<()> {
        if classes.is_empty() {
            return Ok(());
        }
        let report = match self.host.load(classes) {
            Ok(report) => report,
            Err(err) => return Err(self.host_failed(err)),
        };
        for class in classes {
            if report.is_installed(&class.name) {
                self.tracker.mark_loaded(&class.name);
            } else {
                warn!(class = %class.name, "class could not be loaded");
            }
        }
        Ok(())
    }

    /// Returns `false` if any class was refused
    fn redefine(
        &mut self,
        classes: &[ClassBytes],
    ) -> EngineResult<bool> {
        let report = match self.host.redefine(classes) {
            Ok(report) => report,
            Err(err) => return Err(self.host_failed(err)),
        };
        let mut all = true;
        for class in classes {
            if report.is_installed(&class.name) {
                self.tracker.mark_loaded(&class.name);
            } else {
                all = false;
            }
        }
        Ok(all)
    }

    /// Persist the unit's outcome on its snippet
    fn finish(
        &mut self,
        unit: &Unit,
    ) {
        let snippet = &mut self.store[unit.snippet()];
        snippet.set_compilation_status(unit.status(), unit.unresolved().to_vec(), unit.final_diagnostics());
        if unit.erased_signature().is_some() {
            snippet.set_erased_signature(unit.erased_signature().map(str::to_string));
        }
        self.deps.record_references(&self.store[unit.snippet()]);
    }
}

fn to_fragment(
    unit: &CompilationUnit,
    diagnostics: Vec<Diagnostic>,
) -> DiagList {
    diagnostics.into_iter().map(|d| unit.to_fragment_diagnostic(d)).collect()
}
