//! Collection of entry-point descriptions from the request and procedure roots.

use thiserror::Error;
use tracing::debug;

use crate::description::{Description, DescriptionKind};
use crate::entry_point::{DefinitionSource, LogicalName};
use crate::registry::FieldLookup;

/// Errors raised while collecting descriptions.
///
/// These point at a misconfigured definition tree rather than bad data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    /// A root could not be listed.
    #[error("failed to discover entry points in {root}: {reason}")]
    Discovery { root: String, reason: String },

    /// A discovered definition could not be instantiated.
    #[error("cannot instantiate entry point {expected} (searched {roots}): {reason}")]
    Instantiation {
        expected: String,
        roots: String,
        reason: String,
    },

    /// A definition produced a description of the wrong variant for its root.
    #[error("entry point {name} must describe a {expected}, found a {found}")]
    KindMismatch {
        name: String,
        expected: DescriptionKind,
        found: DescriptionKind,
    },
}

/// Walks the request and procedure roots and gathers their descriptions.
///
/// Every description is named after its logical path below the root.
/// Requests come first, then procedures, each in discovery order.
///
/// # Examples
///
/// ```
/// use dal_doc_core::*;
///
/// let mut requests = Manifest::new("requests");
/// requests.register_fn("user/get", |_: &dyn FieldLookup| {
///     RequestDescription::new(RequestType::Select).into()
/// });
/// let procedures = Manifest::new("procedures");
///
/// let lookup = RawSchema::new();
/// let descriptions = EntryPointCollector::new(&requests, &procedures)
///     .collect(&lookup)
///     .unwrap();
/// assert_eq!(descriptions[0].name(), "user/get");
/// ```
pub struct EntryPointCollector<'a> {
    requests: &'a dyn DefinitionSource,
    procedures: &'a dyn DefinitionSource,
}

impl<'a> EntryPointCollector<'a> {
    pub fn new(requests: &'a dyn DefinitionSource, procedures: &'a dyn DefinitionSource) -> Self {
        Self {
            requests,
            procedures,
        }
    }

    /// Instantiates every discovered definition and returns its description.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] when a root cannot be listed, a definition
    /// cannot be instantiated, or a definition describes the wrong variant.
    pub fn collect(&self, fields: &dyn FieldLookup) -> Result<Vec<Description>, CollectError> {
        let mut descriptions = Vec::new();
        self.collect_root(
            self.requests,
            DescriptionKind::Request,
            fields,
            &mut descriptions,
        )?;
        self.collect_root(
            self.procedures,
            DescriptionKind::Procedure,
            fields,
            &mut descriptions,
        )?;
        Ok(descriptions)
    }

    fn collect_root(
        &self,
        root: &dyn DefinitionSource,
        expected: DescriptionKind,
        fields: &dyn FieldLookup,
        out: &mut Vec<Description>,
    ) -> Result<(), CollectError> {
        let names = root.discover().map_err(|reason| CollectError::Discovery {
            root: root.location(),
            reason,
        })?;
        debug!(root = %root.location(), count = names.len(), "Discovered entry points");

        for name in names {
            let mut description = self.describe(root, &name, fields)?;
            if description.kind() != expected {
                return Err(CollectError::KindMismatch {
                    name: name.qualified(root.namespace()),
                    expected,
                    found: description.kind(),
                });
            }
            description.set_name(name.to_string());
            out.push(description);
        }
        Ok(())
    }

    fn describe(
        &self,
        root: &dyn DefinitionSource,
        name: &LogicalName,
        fields: &dyn FieldLookup,
    ) -> Result<Description, CollectError> {
        let entry_point = root
            .instantiate(name)
            .map_err(|reason| CollectError::Instantiation {
                expected: name.qualified(root.namespace()),
                roots: self.searched_roots(),
                reason,
            })?;
        Ok(entry_point.description(fields))
    }

    fn searched_roots(&self) -> String {
        format!(
            "{}, {}",
            self.requests.location(),
            self.procedures.location()
        )
    }
}
