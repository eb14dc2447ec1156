//! The score: every grain known to a running instance.
//!
//! After the front end has populated the grains, [`Score::resolve_references`]
//! runs the whole-model validation pass: primary keys are checked, foreign
//! keys are resolved against their targets' primary keys, view expressions
//! are bound and type-checked, inter-grain dependency order is computed and
//! cross-grain cycles are rejected. The model is frozen afterwards.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use celesta_error::{CelestaError, CelestaResult};

use crate::expr::TableRef;
use crate::grain::{Grain, GrainElementReference};

/// Name of the system grain and of the schema holding the system catalog.
pub const DEFAULT_SYS_SCHEMA_NAME: &str = "celesta";

/// The process-wide collection of grains.
#[derive(Debug, Clone, Default)]
pub struct Score {
    grains: IndexMap<String, Grain>,
    resolved: bool,
}

impl Score {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the designated system grain.
    #[must_use]
    pub fn sys_schema_name(&self) -> &str {
        DEFAULT_SYS_SCHEMA_NAME
    }

    pub fn add_grain(&mut self, grain: Grain) -> CelestaResult<()> {
        if self.resolved {
            return Err(CelestaError::IllegalState {
                detail: "score is frozen after reference resolution".to_owned(),
            });
        }
        if self.grains.contains_key(grain.name()) {
            return Err(CelestaError::DuplicateElement {
                grain: grain.name().to_owned(),
                name: grain.name().to_owned(),
            });
        }
        self.grains.insert(grain.name().to_owned(), grain);
        Ok(())
    }

    #[must_use]
    pub fn grains(&self) -> &IndexMap<String, Grain> {
        &self.grains
    }

    #[must_use]
    pub fn grain(&self, name: &str) -> Option<&Grain> {
        self.grains.get(name)
    }

    pub fn grain_mut(&mut self, name: &str) -> Option<&mut Grain> {
        self.grains.get_mut(name)
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Declared grains sorted by ascending dependency order, the order the
    /// updater walks them in.
    #[must_use]
    pub fn grains_in_dependency_order(&self) -> Vec<&Grain> {
        let mut grains: Vec<&Grain> = self.grains.values().collect();
        grains.sort_by_key(|g| g.dependency_order());
        grains
    }

    /// Run the whole-model validation and freeze the score.
    pub fn resolve_references(&mut self) -> CelestaResult<()> {
        // Primary keys must be non-empty and finalized before anything else
        // can rely on them.
        for grain in self.grains.values() {
            for table in grain.tables().values() {
                if !table.is_pk_finalized() || table.pk().is_empty() {
                    return Err(CelestaError::MissingPk {
                        table: table.name().to_owned(),
                    });
                }
            }
        }

        // Snapshot of every table's columns and primary key, so foreign keys
        // can be resolved without borrowing two grains at once.
        let mut targets: HashMap<(String, String), (Vec<String>, Vec<String>)> = HashMap::new();
        for grain in self.grains.values() {
            for table in grain.tables().values() {
                targets.insert(
                    (grain.name().to_owned(), table.name().to_owned()),
                    (
                        table.columns().keys().cloned().collect(),
                        table.pk().to_vec(),
                    ),
                );
            }
        }

        for grain in self.grains.values_mut() {
            for table in grain.tables_mut().values_mut() {
                for fk in table.foreign_keys_mut() {
                    let (target_grain, target_table) = fk.declared_target();
                    let key = (target_grain.to_owned(), target_table.to_owned());
                    let Some((columns, pk)) = targets.get(&key) else {
                        return Err(CelestaError::UnknownElement {
                            grain: key.0,
                            name: key.1,
                        });
                    };
                    fk.resolve(columns, pk)?;
                }
            }
        }

        self.resolve_views()?;
        self.compute_dependency_order()?;

        for grain in self.grains.values_mut() {
            for table in grain.tables_mut().values_mut() {
                table.freeze();
            }
        }
        self.resolved = true;
        Ok(())
    }

    /// Bind and type-check the expressions of every view and parameterized
    /// view. Each grain's views are taken out of the grain while resolving,
    /// so the referenced tables can be borrowed from the score.
    fn resolve_views(&mut self) -> CelestaResult<()> {
        let grain_names: Vec<String> = self.grains.keys().cloned().collect();
        for grain_name in &grain_names {
            let mut views =
                std::mem::take(self.grains.get_mut(grain_name).expect("known grain").views_mut());
            let result = views
                .values_mut()
                .try_for_each(|v| self.resolve_one_view(v));
            *self
                .grains
                .get_mut(grain_name)
                .expect("known grain")
                .views_mut() = views;
            result?;

            let mut pviews = std::mem::take(
                self.grains
                    .get_mut(grain_name)
                    .expect("known grain")
                    .parameterized_views_mut(),
            );
            let result = pviews
                .values_mut()
                .try_for_each(|pv| self.resolve_one_view(pv.view_mut()));
            *self
                .grains
                .get_mut(grain_name)
                .expect("known grain")
                .parameterized_views_mut() = pviews;
            result?;
        }
        Ok(())
    }

    fn resolve_one_view(&self, view: &mut crate::view::View) -> CelestaResult<()> {
        let mut refs: Vec<TableRef<'_>> = Vec::new();
        for from_ref in view.table_refs() {
            let grain =
                self.grains
                    .get(&from_ref.grain)
                    .ok_or_else(|| CelestaError::UnknownGrain {
                        name: from_ref.grain.clone(),
                    })?;
            let table = grain
                .table(&from_ref.table)
                .ok_or_else(|| CelestaError::UnknownElement {
                    grain: from_ref.grain.clone(),
                    name: from_ref.table.clone(),
                })?;
            refs.push(TableRef::new(table, from_ref.alias.clone()));
        }
        view.resolve_and_validate(&refs)
    }

    /// Longest-path dependency order over the inter-grain reference DAG;
    /// cross-grain cycles are rejected.
    fn compute_dependency_order(&mut self) -> CelestaResult<()> {
        let mut edges: HashMap<String, HashSet<String>> = HashMap::new();
        for grain in self.grains.values() {
            let referenced = grain.referenced_grains();
            for target in &referenced {
                if !self.grains.contains_key(target) {
                    return Err(CelestaError::UnknownGrain {
                        name: target.clone(),
                    });
                }
            }
            edges.insert(grain.name().to_owned(), referenced);
        }

        let mut orders: HashMap<String, u32> = HashMap::new();
        let mut in_progress: Vec<String> = Vec::new();
        for name in self.grains.keys() {
            longest_path(name, &edges, &mut orders, &mut in_progress)?;
        }
        for (name, order) in orders {
            if let Some(grain) = self.grains.get_mut(&name) {
                grain.set_dependency_order(order);
            }
        }
        Ok(())
    }
}

fn longest_path(
    name: &str,
    edges: &HashMap<String, HashSet<String>>,
    orders: &mut HashMap<String, u32>,
    in_progress: &mut Vec<String>,
) -> CelestaResult<u32> {
    if let Some(&order) = orders.get(name) {
        return Ok(order);
    }
    if in_progress.iter().any(|n| n == name) {
        let mut path: Vec<&str> = in_progress.iter().map(String::as_str).collect();
        path.push(name);
        return Err(CelestaError::CyclicGrainDependency {
            path: path.join(" -> "),
        });
    }
    in_progress.push(name.to_owned());
    let mut order = 0;
    if let Some(targets) = edges.get(name) {
        for target in targets {
            order = order.max(1 + longest_path(target, edges, orders, in_progress)?);
        }
    }
    in_progress.pop();
    orders.insert(name.to_owned(), order);
    Ok(order)
}

/// Sort grain elements so that referenced elements come before referencing
/// ones: an element is emitted only after everything it transitively
/// references. Unrelated elements keep their incoming relative order, giving
/// a stable topological order with an arbitrary tiebreak. Reference cycles
/// produce no ordering constraint (cross-grain cycles are rejected at
/// resolution; within a grain the remainder is emitted in input order).
#[must_use]
pub fn element_update_order(
    score: &Score,
    elements: Vec<GrainElementReference>,
) -> Vec<GrainElementReference> {
    let n = elements.len();
    let mut depends: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, first) in elements.iter().enumerate() {
        for (j, second) in elements.iter().enumerate() {
            if i != j && depends_on(score, first, second, &mut HashSet::new()) {
                depends[i].push(j);
            }
        }
    }

    let mut emitted = vec![false; n];
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let mut progressed = false;
        for i in 0..n {
            if !emitted[i] && depends[i].iter().all(|&j| emitted[j]) {
                emitted[i] = true;
                out.push(elements[i].clone());
                progressed = true;
            }
        }
        if !progressed {
            for i in 0..n {
                if !emitted[i] {
                    out.push(elements[i].clone());
                }
            }
            break;
        }
    }
    out
}

/// Transitive reachability over element references. The visited set guards
/// against reference cycles, which produce no ordering constraint.
fn depends_on(
    score: &Score,
    first: &GrainElementReference,
    second: &GrainElementReference,
    visited: &mut HashSet<GrainElementReference>,
) -> bool {
    if !visited.insert(first.clone()) {
        return false;
    }
    let Some(grain) = score.grain(&first.grain_name) else {
        return false;
    };
    for reference in grain.element_references(first.kind, &first.element_name) {
        if &reference == second || depends_on(score, &reference, second, visited) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::fk::ForeignKey;
    use crate::table::Table;

    fn table(grain: &str, name: &str, pk: &str) -> Table {
        let mut t = Table::new(grain, name).unwrap();
        t.add_column(Column::identity(pk).unwrap()).unwrap();
        t.add_pk(pk).unwrap();
        t.finalize_pk().unwrap();
        t.add_column(Column::integer("intcol").unwrap()).unwrap();
        t
    }

    fn two_table_score() -> Score {
        let mut g = Grain::new("g").unwrap();
        g.set_version("app 1.0").unwrap();
        g.add_table(table("g", "t1", "ida")).unwrap();
        g.add_table(table("g", "t2", "idb")).unwrap();
        let mut score = Score::new();
        score.add_grain(g).unwrap();
        score
    }

    #[test]
    fn test_fk_happy_path() {
        let mut score = two_table_score();
        {
            let g = score.grain_mut("g").unwrap();
            let mut fk = ForeignKey::new();
            {
                let t1 = g.table("t1").unwrap();
                fk.add_column(t1, "intcol").unwrap();
            }
            fk.add_referenced_column("idb").unwrap();
            let t1 = g.table_mut("t1").unwrap();
            fk.set_referenced_table(t1, "g", "t2").unwrap();
        }
        score.resolve_references().unwrap();

        let t1 = score.grain("g").unwrap().table("t1").unwrap();
        assert_eq!(t1.foreign_keys().len(), 1);
        assert_eq!(t1.foreign_keys()[0].referenced_table(), Some(("g", "t2")));
    }

    #[test]
    fn test_fk_to_non_pk_column_rejected() {
        let mut score = two_table_score();
        {
            let g = score.grain_mut("g").unwrap();
            let mut fk = ForeignKey::new();
            fk.add_column(g.table("t1").unwrap(), "intcol").unwrap();
            fk.add_referenced_column("intcol").unwrap();
            fk.set_referenced_table(g.table_mut("t1").unwrap(), "g", "t2")
                .unwrap();
        }
        assert!(matches!(
            score.resolve_references(),
            Err(CelestaError::FkReferencedColumnsNotPk { .. })
        ));
    }

    #[test]
    fn test_missing_pk_rejected() {
        let mut g = Grain::new("g").unwrap();
        let mut t = Table::new("g", "t1").unwrap();
        t.add_column(Column::integer("a").unwrap()).unwrap();
        g.add_table(t).unwrap();
        let mut score = Score::new();
        score.add_grain(g).unwrap();
        assert!(matches!(
            score.resolve_references(),
            Err(CelestaError::MissingPk { .. })
        ));
    }

    #[test]
    fn test_dependency_order_follows_references() {
        let mut base = Grain::new("base").unwrap();
        base.add_table(table("base", "t2", "idb")).unwrap();

        let mut app = Grain::new("app").unwrap();
        let mut t1 = table("app", "t1", "ida");
        let mut fk = ForeignKey::new();
        fk.add_column(&t1, "intcol").unwrap();
        fk.add_referenced_column("idb").unwrap();
        fk.set_referenced_table(&mut t1, "base", "t2").unwrap();
        app.add_table(t1).unwrap();

        let mut score = Score::new();
        // Insertion order is reversed relative to the dependency.
        score.add_grain(app).unwrap();
        score.add_grain(base).unwrap();
        score.resolve_references().unwrap();

        assert_eq!(score.grain("base").unwrap().dependency_order(), 0);
        assert_eq!(score.grain("app").unwrap().dependency_order(), 1);
        let ordered: Vec<&str> = score
            .grains_in_dependency_order()
            .iter()
            .map(|g| g.name())
            .collect();
        assert_eq!(ordered, ["base", "app"]);
    }

    #[test]
    fn test_cross_grain_cycle_rejected() {
        let mut a = Grain::new("a").unwrap();
        let mut ta = table("a", "ta", "ida");
        let mut b = Grain::new("b").unwrap();
        let mut tb = table("b", "tb", "idb");

        let mut fk = ForeignKey::new();
        fk.add_column(&ta, "intcol").unwrap();
        fk.add_referenced_column("idb").unwrap();
        fk.set_referenced_table(&mut ta, "b", "tb").unwrap();

        let mut fk = ForeignKey::new();
        fk.add_column(&tb, "intcol").unwrap();
        fk.add_referenced_column("ida").unwrap();
        fk.set_referenced_table(&mut tb, "a", "ta").unwrap();

        a.add_table(ta).unwrap();
        b.add_table(tb).unwrap();
        let mut score = Score::new();
        score.add_grain(a).unwrap();
        score.add_grain(b).unwrap();
        assert!(matches!(
            score.resolve_references(),
            Err(CelestaError::CyclicGrainDependency { .. })
        ));
    }

    #[test]
    fn test_element_update_order_topological() {
        let mut score = two_table_score();
        {
            let g = score.grain_mut("g").unwrap();
            let mut fk = ForeignKey::new();
            fk.add_column(g.table("t1").unwrap(), "intcol").unwrap();
            fk.add_referenced_column("idb").unwrap();
            fk.set_referenced_table(g.table_mut("t1").unwrap(), "g", "t2")
                .unwrap();
        }
        score.resolve_references().unwrap();

        let ordered = element_update_order(
            &score,
            vec![
                GrainElementReference::table("g", "t1"),
                GrainElementReference::table("g", "t2"),
            ],
        );
        assert_eq!(ordered[0].element_name, "t2");
        assert_eq!(ordered[1].element_name, "t1");
    }

    #[test]
    fn test_frozen_after_resolution() {
        let mut score = two_table_score();
        score.resolve_references().unwrap();
        assert!(score.is_resolved());
        let t1 = score.grain_mut("g").unwrap().table_mut("t1").unwrap();
        assert!(t1.add_column(Column::integer("late").unwrap()).is_err());
    }
}
