//! Apply catalog seed documents to a store
//!
//! Seeding is additive: categories and exams that already exist (by name and
//! code) are left untouched, so a seed directory can be applied on every start.

use crate::error::Result;
use crate::repository::{catalog, components, fields};
use crate::sqlite_store::{validate_attributes, LabStore};
use labcore_core::composition::check_new_link;
use labcore_core::{CatalogSeed, LabError, NewExam};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories_created: usize,
    pub exams_created: usize,
    pub fields_created: usize,
    pub links_created: usize,
    pub exams_skipped: usize,
}

#[allow(clippy::result_large_err)]
impl LabStore {
    /// Create the seed's categories, exams, fields and links in one transaction
    pub fn apply_seed(&self, seed: &CatalogSeed) -> Result<SeedSummary> {
        let summary = self.in_transaction(|tx| {
            let mut summary = SeedSummary::default();

            for name in &seed.categories {
                if catalog::find_category_by_name(tx, name)?.is_none() {
                    catalog::insert_category(tx, name)?;
                    summary.categories_created += 1;
                }
            }

            let mut created = HashMap::new();
            for seed_exam in &seed.exams {
                if catalog::find_exam_by_code(tx, &seed_exam.code)?.is_some() {
                    summary.exams_skipped += 1;
                    continue;
                }

                let category_id = match &seed_exam.category {
                    Some(name) => match catalog::find_category_by_name(tx, name)? {
                        Some(category) => Some(category.id),
                        None => Some(catalog::insert_category(tx, name)?.id),
                    },
                    None => None,
                };

                let exam = catalog::insert_exam(
                    tx,
                    &NewExam {
                        code: seed_exam.code.clone(),
                        name: seed_exam.name.clone(),
                        category_id,
                        kind: seed_exam.kind,
                        is_profile: seed_exam.is_profile,
                        sampling_instructions: seed_exam.sampling_instructions.clone(),
                        method: seed_exam.method.clone(),
                    },
                )?;

                if !seed_exam.fields.is_empty() && !exam.kind.permits_own_fields() {
                    return Err(LabError::InvalidKindForOperation {
                        exam_id: exam.id,
                        reason: format!("seed exam {} is {} but lists fields", exam.code, exam.kind),
                    }
                    .into());
                }
                for attributes in &seed_exam.fields {
                    validate_attributes(attributes)?;
                    fields::insert_field(tx, exam.id, attributes)?;
                    summary.fields_created += 1;
                }

                created.insert(exam.code.clone(), exam.id);
                summary.exams_created += 1;
            }

            // Links are resolved after every exam exists so seeds may list
            // components in any order.
            for seed_exam in &seed.exams {
                let Some(&parent) = created.get(seed_exam.code.trim()) else {
                    continue;
                };
                for (order, code) in seed_exam.components.iter().enumerate() {
                    let child = catalog::find_exam_by_code(tx, code)?.ok_or_else(|| {
                        LabError::InvalidDefinition(format!(
                            "seed exam {} references unknown component {}",
                            seed_exam.code, code
                        ))
                    })?;
                    if !seed_exam.kind.permits_components() {
                        return Err(LabError::InvalidKindForOperation {
                            exam_id: parent,
                            reason: format!("seed exam {} cannot have components", seed_exam.code),
                        }
                        .into());
                    }
                    let links = components::list_active_links(tx)?;
                    check_new_link(&links, parent, child.id).map_err(|rejection| {
                        LabError::InvalidCompositionLink {
                            parent,
                            child: child.id,
                            reason: rejection.describe().to_string(),
                        }
                    })?;
                    components::upsert_link(tx, parent, child.id, order as i32)?;
                    summary.links_created += 1;
                }
            }

            Ok(summary)
        })?;

        tracing::info!(
            categories = summary.categories_created,
            exams = summary.exams_created,
            fields = summary.fields_created,
            links = summary.links_created,
            skipped = summary.exams_skipped,
            "Catalog seed applied"
        );
        Ok(summary)
    }
}
