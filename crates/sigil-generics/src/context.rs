// context.rs
//
// GenericContext: the owning context for everything uniqued by the generics
// core. All handles (types, signatures, substitution maps, conformances)
// index into tables owned here and are only meaningful against the context
// that produced them.

use rustc_hash::FxHashMap;
use sigil_identity::{Interner, Symbol};

use crate::config::{ContextBuilder, ContextConfig};
use crate::conformance::ConformanceTables;
use crate::decls::DeclRegistry;
use crate::machine::RequirementMachine;
use crate::requirement::Requirement;
use crate::signature::{CanGenericSignature, SignatureId, SignatureTable};
use crate::subst::SubstMapTable;
use crate::types::{RequirementDisplay, TypeArena, TypeDisplay, TypeId};

pub struct GenericContext {
    pub interner: Interner,
    pub types: TypeArena,
    pub decls: DeclRegistry,
    pub(crate) conformances: ConformanceTables,
    pub(crate) signatures: SignatureTable,
    pub(crate) subst_maps: SubstMapTable,
    /// One machine per canonical signature, built on first query.
    machines: FxHashMap<SignatureId, Box<RequirementMachine>>,
    /// Signatures whose machine is checked out by a running query.
    machines_in_use: Vec<SignatureId>,
    config: ContextConfig,
}

impl Default for GenericContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericContext {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            interner: Interner::new(),
            types: TypeArena::new(),
            decls: DeclRegistry::new(),
            conformances: ConformanceTables::default(),
            signatures: SignatureTable::default(),
            subst_maps: SubstMapTable::default(),
            machines: FxHashMap::default(),
            machines_in_use: Vec::new(),
            config,
        }
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    pub fn display_type(&self, ty: TypeId) -> TypeDisplay<'_> {
        TypeDisplay::new(self, ty)
    }

    pub fn display_requirement(&self, req: Requirement) -> RequirementDisplay<'_> {
        RequirementDisplay::new(self, req)
    }

    /// Number of requirement machines built so far.
    pub fn machine_count(&self) -> usize {
        self.machines.len() + self.machines_in_use.len()
    }

    /// Run `f` against the machine of `sig`, building it on first use.
    ///
    /// The machine is taken out of the cache for the duration of the call, so
    /// `f` may freely use the context, including queries on other
    /// signatures. A nested query on the same signature runs against a
    /// scratch machine and leaves the cached one alone.
    pub(crate) fn with_machine<R>(
        &mut self,
        sig: CanGenericSignature,
        f: impl FnOnce(&mut GenericContext, &mut RequirementMachine) -> R,
    ) -> R {
        let Some(id) = sig.id() else {
            let mut machine = RequirementMachine::new(self, &[]);
            return f(self, &mut machine);
        };
        let mut machine = match self.machines.remove(&id) {
            Some(machine) => machine,
            None if self.machines_in_use.contains(&id) => {
                tracing::debug!(?id, "re-entrant query, using a scratch machine");
                let mut scratch = RequirementMachine::for_signature(self, sig);
                return f(self, &mut scratch);
            }
            None => Box::new(RequirementMachine::for_signature(self, sig)),
        };
        self.machines_in_use.push(id);
        let result = f(self, &mut machine);
        self.machines_in_use.pop();
        self.machines.insert(id, machine);
        result
    }
}
