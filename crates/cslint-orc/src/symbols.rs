//! Scoped symbol table.
//!
//! One global scope lives for the whole parse; each instrument or
//! opcode-definition body opens one nested scope. Identifier and label
//! namespaces are separate. Opcode lookups fall back from user-defined
//! opcodes (registered at lex time) to the injected catalog, which is a
//! shared immutable reference and is never mutated.

use crate::opcodes::{OpcodeCatalog, OpcodeEntry};
use cslint_foundation::Range;
use indexmap::IndexMap;
use std::sync::Arc;

/// A declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    /// Type code with array suffixes, e.g. `"k"` or `"i[][]"`.
    pub var_type: String,
    pub range: Range,
}

/// A declared label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub range: Range,
}

/// An identifier-namespace symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Opcode(OpcodeEntry),
    Variable(Variable),
}

impl Symbol {
    fn as_opcode(&self) -> Option<&OpcodeEntry> {
        match self {
            Symbol::Opcode(entry) => Some(entry),
            Symbol::Variable(_) => None,
        }
    }

    fn as_variable(&self) -> Option<&Variable> {
        match self {
            Symbol::Variable(variable) => Some(variable),
            Symbol::Opcode(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    identifiers: IndexMap<String, Symbol>,
}

/// Outcome of a variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Declared {
    /// First declaration, or re-declaration with the same type.
    Ok,
    /// Re-declaration with a different type; carries the first
    /// declaration for the trace.
    TypeConflict(Variable),
}

/// The front end's symbol registry.
#[derive(Debug)]
pub struct SymbolTable {
    catalog: Arc<OpcodeCatalog>,
    global: Scope,
    local: Option<Scope>,
    labels: IndexMap<String, Label>,
}

impl SymbolTable {
    /// Create a table over a catalog of built-in opcodes.
    pub fn new(catalog: Arc<OpcodeCatalog>) -> Self {
        SymbolTable {
            catalog,
            global: Scope::default(),
            local: None,
            labels: IndexMap::new(),
        }
    }

    /// Open the nested scope of an instrument or opcode body.
    pub fn enter_scope(&mut self) {
        debug_assert!(self.local.is_none(), "scopes nest at most one deep");
        self.local = Some(Scope::default());
    }

    pub fn exit_scope(&mut self) {
        self.local = None;
    }

    pub fn in_local_scope(&self) -> bool {
        self.local.is_some()
    }

    /// Register a user-defined opcode in the global scope (done by the
    /// lexer when it sees the definition, so later uses classify).
    pub fn add_user_opcode(&mut self, name: &str, input_signature: &str, output_signature: &str) {
        let output_signature = if output_signature == "0" {
            ""
        } else {
            output_signature
        };
        let mut overloads = IndexMap::new();
        let outputs = if output_signature.is_empty() {
            Vec::new()
        } else {
            vec![output_signature.to_string()]
        };
        overloads.insert(input_signature.to_string(), outputs);
        self.global.identifiers.insert(
            name.to_string(),
            Symbol::Opcode(OpcodeEntry {
                name: name.to_string(),
                overloads,
                is_void: output_signature.is_empty(),
            }),
        );
    }

    /// Opcode lookup: user-defined opcodes shadow the catalog.
    pub fn opcode(&self, name: &str) -> Option<&OpcodeEntry> {
        self.global
            .identifiers
            .get(name)
            .and_then(Symbol::as_opcode)
            .or_else(|| self.catalog.get(name))
    }

    /// Declare a variable; `global` forces the global scope (g-prefixed
    /// names). Within one scope a name maps to at most one symbol:
    /// re-declaring with the same type keeps the first declaration.
    pub fn declare_variable(
        &mut self,
        name: &str,
        var_type: &str,
        range: Range,
        global: bool,
    ) -> Declared {
        let scope = if global || self.local.is_none() {
            &mut self.global
        } else {
            self.local.as_mut().expect("BUG: local scope checked above")
        };
        if let Some(existing) = scope.identifiers.get(name).and_then(Symbol::as_variable) {
            if existing.var_type == var_type {
                return Declared::Ok;
            }
            return Declared::TypeConflict(existing.clone());
        }
        scope.identifiers.insert(
            name.to_string(),
            Symbol::Variable(Variable {
                name: name.to_string(),
                var_type: var_type.to_string(),
                range,
            }),
        );
        Declared::Ok
    }

    /// Variable lookup, local scope first.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.local
            .as_ref()
            .and_then(|scope| scope.identifiers.get(name))
            .and_then(Symbol::as_variable)
            .or_else(|| {
                self.global
                    .identifiers
                    .get(name)
                    .and_then(Symbol::as_variable)
            })
    }

    /// Register a label. The first declaration wins; a duplicate
    /// returns the original for the caller's warning trace.
    pub fn add_label(&mut self, name: &str, range: Range) -> Option<Label> {
        if let Some(existing) = self.labels.get(name) {
            return Some(existing.clone());
        }
        self.labels.insert(
            name.to_string(),
            Label {
                name: name.to_string(),
                range,
            },
        );
        None
    }

    pub fn label(&self, name: &str) -> Option<&Label> {
        self.labels.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes;

    fn table() -> SymbolTable {
        SymbolTable::new(opcodes::builtin().clone())
    }

    #[test]
    fn catalog_opcodes_resolve() {
        let symbols = table();
        assert!(symbols.opcode("oscili").is_some());
        assert!(symbols.opcode("prints").map(|e| e.is_void).unwrap_or(false));
        assert!(symbols.opcode("nothere").is_none());
    }

    #[test]
    fn user_opcodes_shadow_catalog() {
        let mut symbols = table();
        symbols.add_user_opcode("anOpcode", "0", "0");
        let entry = symbols.opcode("anOpcode").unwrap();
        assert!(entry.is_void);
        symbols.add_user_opcode("anOpcode", "k", "a");
        assert!(!symbols.opcode("anOpcode").unwrap().is_void);
    }

    #[test]
    fn local_lookup_falls_back_to_global() {
        let mut symbols = table();
        let range = Range::on_line(0, 0, 6);
        assert_eq!(
            symbols.declare_variable("kValue", "k", range, false),
            Declared::Ok
        );
        symbols.enter_scope();
        assert!(symbols.variable("kValue").is_some());
        symbols.declare_variable("aLocal", "a", range, false);
        symbols.exit_scope();
        assert!(symbols.variable("aLocal").is_none());
    }

    #[test]
    fn redeclaration_with_different_type_conflicts() {
        let mut symbols = table();
        let first = Range::on_line(1, 2, 11);
        symbols.enter_scope();
        symbols.declare_variable("kVariable", "k[]", first, false);
        assert_eq!(
            symbols.declare_variable("kVariable", "k[]", Range::on_line(2, 2, 11), false),
            Declared::Ok
        );
        match symbols.declare_variable("kVariable", "k", Range::on_line(3, 2, 11), false) {
            Declared::TypeConflict(existing) => assert_eq!(existing.range, first),
            Declared::Ok => panic!("expected a type conflict"),
        }
    }

    #[test]
    fn first_label_wins() {
        let mut symbols = table();
        let first = Range::on_line(0, 0, 5);
        assert!(symbols.add_label("label", first).is_none());
        let existing = symbols.add_label("label", Range::on_line(1, 0, 5)).unwrap();
        assert_eq!(existing.range, first);
        assert_eq!(symbols.label("label").unwrap().range, first);
    }
}
