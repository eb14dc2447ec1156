//! Grains: named schemas owning tables, indices, sequences and views.

use std::collections::HashSet;

use indexmap::IndexMap;

use celesta_error::{CelestaError, CelestaResult};

use crate::ident::validate_identifier;
use crate::index::Index;
use crate::sequence::Sequence;
use crate::table::Table;
use crate::version::VersionString;
use crate::view::{MaterializedView, ParameterizedView, View};

/// Kind discriminant of a grain element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Sequence,
    Table,
    Index,
    View,
    ParameterizedView,
    MaterializedView,
}

/// An outgoing edge of the element reference graph: the referenced element
/// is identified by lookup keys, never by a borrowed handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrainElementReference {
    pub grain_name: String,
    pub element_name: String,
    pub kind: ElementKind,
}

impl GrainElementReference {
    #[must_use]
    pub fn table(grain_name: &str, element_name: &str) -> Self {
        Self {
            grain_name: grain_name.to_owned(),
            element_name: element_name.to_owned(),
            kind: ElementKind::Table,
        }
    }
}

/// A named schema: the unit of versioning and of independent upgrade.
#[derive(Debug, Clone)]
pub struct Grain {
    name: String,
    version: VersionString,
    length: u32,
    checksum: u32,
    autoupdate: bool,
    dependency_order: u32,
    sequences: IndexMap<String, Sequence>,
    tables: IndexMap<String, Table>,
    indices: IndexMap<String, Index>,
    views: IndexMap<String, View>,
    parameterized_views: IndexMap<String, ParameterizedView>,
    materialized_views: IndexMap<String, MaterializedView>,
    element_names: HashSet<String>,
}

impl Grain {
    pub fn new(name: &str) -> CelestaResult<Self> {
        validate_identifier(name)?;
        Ok(Self {
            name: name.to_owned(),
            version: VersionString::default(),
            length: 0,
            checksum: 0,
            autoupdate: true,
            dependency_order: 0,
            sequences: IndexMap::new(),
            tables: IndexMap::new(),
            indices: IndexMap::new(),
            views: IndexMap::new(),
            parameterized_views: IndexMap::new(),
            materialized_views: IndexMap::new(),
            element_names: HashSet::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &VersionString {
        &self.version
    }

    /// Parse and set the declared version.
    pub fn set_version(&mut self, text: &str) -> CelestaResult<()> {
        self.version = VersionString::new(text)?;
        Ok(())
    }

    /// Byte length of the grain's CelestaSQL source.
    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// CRC-32 of the grain's CelestaSQL source.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Record the CelestaSQL source this grain was parsed from, fixing the
    /// length and checksum the catalog row is compared against.
    pub fn set_source(&mut self, source: &str) {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(source.as_bytes());
        self.checksum = hasher.finalize();
        self.length = source.len() as u32;
    }

    #[must_use]
    pub fn is_autoupdate(&self) -> bool {
        self.autoupdate
    }

    pub fn set_autoupdate(&mut self, autoupdate: bool) {
        self.autoupdate = autoupdate;
    }

    /// Position of this grain in the inter-grain dependency order; grains
    /// with lower values upgrade first. Computed during score resolution.
    #[must_use]
    pub fn dependency_order(&self) -> u32 {
        self.dependency_order
    }

    pub(crate) fn set_dependency_order(&mut self, order: u32) {
        self.dependency_order = order;
    }

    fn claim_name(&mut self, name: &str) -> CelestaResult<()> {
        if !self.element_names.insert(name.to_owned()) {
            return Err(CelestaError::DuplicateElement {
                grain: self.name.clone(),
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    fn check_owned(&self, element_grain: &str, name: &str) -> CelestaResult<()> {
        if element_grain != self.name {
            return Err(CelestaError::IllegalState {
                detail: format!(
                    "element '{name}' belongs to grain '{element_grain}', not '{}'",
                    self.name
                ),
            });
        }
        Ok(())
    }

    pub fn add_sequence(&mut self, sequence: Sequence) -> CelestaResult<()> {
        self.check_owned(sequence.grain_name(), sequence.name())?;
        self.claim_name(sequence.name())?;
        self.sequences.insert(sequence.name().to_owned(), sequence);
        Ok(())
    }

    pub fn add_table(&mut self, table: Table) -> CelestaResult<()> {
        self.check_owned(table.grain_name(), table.name())?;
        self.claim_name(table.name())?;
        self.tables.insert(table.name().to_owned(), table);
        Ok(())
    }

    /// Add an index; the indexed table must already be declared.
    pub fn add_index(&mut self, index: Index) -> CelestaResult<()> {
        self.check_owned(index.grain_name(), index.name())?;
        if !self.tables.contains_key(index.table_name()) {
            return Err(CelestaError::UnknownElement {
                grain: self.name.clone(),
                name: index.table_name().to_owned(),
            });
        }
        self.claim_name(index.name())?;
        self.indices.insert(index.name().to_owned(), index);
        Ok(())
    }

    pub fn add_view(&mut self, view: View) -> CelestaResult<()> {
        self.check_owned(view.grain_name(), view.name())?;
        self.claim_name(view.name())?;
        self.views.insert(view.name().to_owned(), view);
        Ok(())
    }

    pub fn add_parameterized_view(&mut self, view: ParameterizedView) -> CelestaResult<()> {
        self.check_owned(view.grain_name(), view.name())?;
        self.claim_name(view.name())?;
        self.parameterized_views
            .insert(view.name().to_owned(), view);
        Ok(())
    }

    /// Add a materialized view; its source table must already be declared.
    pub fn add_materialized_view(&mut self, view: MaterializedView) -> CelestaResult<()> {
        self.check_owned(view.grain_name(), view.name())?;
        if !self.tables.contains_key(view.ref_table()) {
            return Err(CelestaError::UnknownElement {
                grain: self.name.clone(),
                name: view.ref_table().to_owned(),
            });
        }
        self.claim_name(view.name())?;
        self.materialized_views
            .insert(view.name().to_owned(), view);
        Ok(())
    }

    #[must_use]
    pub fn sequences(&self) -> &IndexMap<String, Sequence> {
        &self.sequences
    }

    #[must_use]
    pub fn tables(&self) -> &IndexMap<String, Table> {
        &self.tables
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub(crate) fn tables_mut(&mut self) -> &mut IndexMap<String, Table> {
        &mut self.tables
    }

    #[must_use]
    pub fn indices(&self) -> &IndexMap<String, Index> {
        &self.indices
    }

    #[must_use]
    pub fn views(&self) -> &IndexMap<String, View> {
        &self.views
    }

    pub(crate) fn views_mut(&mut self) -> &mut IndexMap<String, View> {
        &mut self.views
    }

    #[must_use]
    pub fn parameterized_views(&self) -> &IndexMap<String, ParameterizedView> {
        &self.parameterized_views
    }

    pub(crate) fn parameterized_views_mut(&mut self) -> &mut IndexMap<String, ParameterizedView> {
        &mut self.parameterized_views
    }

    #[must_use]
    pub fn materialized_views(&self) -> &IndexMap<String, MaterializedView> {
        &self.materialized_views
    }

    /// Materialized views fed from the given source table.
    #[must_use]
    pub fn materialized_views_of(&self, table_name: &str) -> Vec<&MaterializedView> {
        self.materialized_views
            .values()
            .filter(|mv| mv.ref_table() == table_name)
            .collect()
    }

    /// Outgoing references of one element, as lookup-key edges.
    #[must_use]
    pub fn element_references(&self, kind: ElementKind, name: &str) -> Vec<GrainElementReference> {
        match kind {
            ElementKind::Sequence => Vec::new(),
            ElementKind::Table => self.tables.get(name).map_or_else(Vec::new, |t| {
                t.foreign_keys()
                    .iter()
                    .map(|fk| {
                        let (g, t) = fk.declared_target();
                        GrainElementReference::table(g, t)
                    })
                    .collect()
            }),
            ElementKind::Index => self.indices.get(name).map_or_else(Vec::new, |ix| {
                vec![GrainElementReference::table(&self.name, ix.table_name())]
            }),
            ElementKind::View => self.views.get(name).map_or_else(Vec::new, |v| {
                v.table_refs()
                    .iter()
                    .map(|r| GrainElementReference::table(&r.grain, &r.table))
                    .collect()
            }),
            ElementKind::ParameterizedView => {
                self.parameterized_views.get(name).map_or_else(Vec::new, |v| {
                    v.view()
                        .table_refs()
                        .iter()
                        .map(|r| GrainElementReference::table(&r.grain, &r.table))
                        .collect()
                })
            }
            ElementKind::MaterializedView => {
                self.materialized_views.get(name).map_or_else(Vec::new, |mv| {
                    vec![GrainElementReference::table(&self.name, mv.ref_table())]
                })
            }
        }
    }

    /// Names of other grains this grain references.
    #[must_use]
    pub fn referenced_grains(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        let kinds_and_names: Vec<(ElementKind, String)> = self.element_kinds_and_names();
        for (kind, name) in kinds_and_names {
            for reference in self.element_references(kind, &name) {
                if reference.grain_name != self.name {
                    out.insert(reference.grain_name);
                }
            }
        }
        out
    }

    fn element_kinds_and_names(&self) -> Vec<(ElementKind, String)> {
        let mut out = Vec::new();
        out.extend(
            self.sequences
                .keys()
                .map(|n| (ElementKind::Sequence, n.clone())),
        );
        out.extend(self.tables.keys().map(|n| (ElementKind::Table, n.clone())));
        out.extend(self.indices.keys().map(|n| (ElementKind::Index, n.clone())));
        out.extend(self.views.keys().map(|n| (ElementKind::View, n.clone())));
        out.extend(
            self.parameterized_views
                .keys()
                .map(|n| (ElementKind::ParameterizedView, n.clone())),
        );
        out.extend(
            self.materialized_views
                .keys()
                .map(|n| (ElementKind::MaterializedView, n.clone())),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;

    fn grain_with_table() -> Grain {
        let mut g = Grain::new("g").unwrap();
        let mut t = Table::new("g", "t1").unwrap();
        t.add_column(Column::identity("ida").unwrap()).unwrap();
        t.add_pk("ida").unwrap();
        t.finalize_pk().unwrap();
        g.add_table(t).unwrap();
        g
    }

    #[test]
    fn test_element_names_unique_across_kinds() {
        let mut g = grain_with_table();
        // A view may not reuse a table name.
        let v = View::new("g", "t1").unwrap();
        assert!(matches!(
            g.add_view(v),
            Err(CelestaError::DuplicateElement { .. })
        ));
    }

    #[test]
    fn test_index_requires_declared_table() {
        let mut g = grain_with_table();
        let ix = Index::new("g", "ix1", "ghost").unwrap();
        assert!(matches!(
            g.add_index(ix),
            Err(CelestaError::UnknownElement { .. })
        ));
    }

    #[test]
    fn test_mv_requires_source_table() {
        let mut g = grain_with_table();
        let mv = MaterializedView::new("g", "mv1", "ghost").unwrap();
        assert!(g.add_materialized_view(mv).is_err());

        let mv = MaterializedView::new("g", "mv1", "t1").unwrap();
        g.add_materialized_view(mv).unwrap();
        assert_eq!(g.materialized_views_of("t1").len(), 1);
    }

    #[test]
    fn test_source_checksum() {
        let mut g = grain_with_table();
        g.set_source("create table t1(ida int identity not null primary key);");
        assert_ne!(g.checksum(), 0);
        assert_eq!(g.length(), 55);
    }

    #[test]
    fn test_wrong_grain_element_rejected() {
        let mut g = grain_with_table();
        let t = Table::new("other", "t9").unwrap();
        assert!(matches!(
            g.add_table(t),
            Err(CelestaError::IllegalState { .. })
        ));
    }
}
