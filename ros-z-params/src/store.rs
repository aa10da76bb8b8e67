//! Declaration storage.
//!
//! `DeclarationStore` holds the write-once metadata of every parameter the
//! registry manages. It is append-only: there is no redeclare and no delete.

use std::collections::HashMap;

use crate::error::DeclareError;
use crate::types::{Declaration, NumericConstraint};

#[derive(Debug, Default)]
pub struct DeclarationStore {
    declarations: HashMap<String, Declaration>,
}

impl DeclarationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a declaration.
    ///
    /// Rejects duplicate names, malformed numeric constraints and default
    /// values that do not match the declared type or range.
    pub fn declare(&mut self, decl: Declaration) -> Result<(), DeclareError> {
        self.check(&decl)?;
        self.declarations.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Run every check `declare` performs without inserting.
    pub fn check(&self, decl: &Declaration) -> Result<(), DeclareError> {
        if decl.name.is_empty() {
            return Err(DeclareError::EmptyName);
        }
        if self.declarations.contains_key(&decl.name) {
            return Err(DeclareError::AlreadyDeclared(decl.name.clone()));
        }
        validate_declaration(decl)
    }

    pub fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declared names in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.declarations.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }
}

fn validate_declaration(decl: &Declaration) -> Result<(), DeclareError> {
    let actual = decl.default_value.parameter_type();
    if actual != decl.type_ {
        return Err(DeclareError::DefaultTypeMismatch {
            name: decl.name.clone(),
            expected: decl.type_,
            actual,
        });
    }

    let Some(constraint) = decl.numeric_constraint else {
        if decl.type_.is_numeric() {
            return Err(DeclareError::MissingConstraint {
                name: decl.name.clone(),
                type_: decl.type_,
            });
        }
        return Ok(());
    };

    let kind_matches = match constraint {
        NumericConstraint::Integer(_) => decl.type_.is_integer(),
        NumericConstraint::FloatingPoint(_) => decl.type_.is_floating_point(),
    };
    if !kind_matches {
        return Err(DeclareError::UnexpectedConstraint {
            name: decl.name.clone(),
            type_: decl.type_,
        });
    }

    if let NumericConstraint::FloatingPoint(r) = constraint {
        if !r.from_value.is_finite() || !r.to_value.is_finite() {
            return Err(DeclareError::InvalidBounds(decl.name.clone()));
        }
        if !r.step.is_finite() || r.step < 0.0 {
            return Err(DeclareError::InvalidStep(decl.name.clone()));
        }
    }

    if !constraint.is_ordered() {
        return Err(DeclareError::InvalidBounds(decl.name.clone()));
    }

    constraint
        .check(&decl.default_value)
        .map_err(|reason| DeclareError::DefaultOutOfRange {
            name: decl.name.clone(),
            reason,
        })
}
