//! The per-feature component table and its tab-separated serialization
use std::collections::HashMap;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::components::{ComponentAssignment, ComponentId, SINGLETON_COMPONENT};
use crate::spectrum::FeatureSpectrum;

pub const TABLE_HEADER: [&str; 3] = ["feature_id", "component_id", "precursor_mz"];

/// One row of a [`ComponentTable`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRow {
    pub feature_id: String,
    pub component_id: ComponentId,
    /// The precursor m/z of the feature's spectrum, if it is known
    pub precursor_mz: Option<f64>,
}

impl ComponentRow {
    pub fn is_singleton(&self) -> bool {
        self.component_id == SINGLETON_COMPONENT
    }
}

/// The component assignment of every node of a network, with its precursor m/z.
///
/// There is exactly one row per node, in the order the assignments were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentTable {
    rows: Vec<ComponentRow>,
}

impl ComponentTable {
    pub fn new(rows: Vec<ComponentRow>) -> Self {
        Self { rows }
    }

    /// Left-join `assignments` with the precursor m/z of `spectra` on feature ID.
    ///
    /// Every assignment produces a row. Features without a matching spectrum, or whose
    /// spectrum has no precursor m/z, get `None`. If several spectra share a feature ID
    /// the first one is used.
    pub fn merge_precursor_mz(
        assignments: Vec<ComponentAssignment>,
        spectra: &[FeatureSpectrum],
    ) -> Self {
        let mut precursors: HashMap<&str, Option<f64>> = HashMap::with_capacity(spectra.len());
        for spec in spectra.iter() {
            precursors
                .entry(spec.feature_id.as_str())
                .or_insert(spec.precursor_mz);
        }

        let rows = assignments
            .into_iter()
            .map(|assignment| {
                let precursor_mz = match precursors.get(assignment.feature_id.as_str()) {
                    Some(mz) => *mz,
                    None => {
                        warn!(
                            "Feature {} is not present in the spectrum metadata",
                            assignment.feature_id
                        );
                        None
                    }
                };
                ComponentRow {
                    feature_id: assignment.feature_id,
                    component_id: assignment.component_id,
                    precursor_mz,
                }
            })
            .collect();
        Self::new(rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComponentRow> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[ComponentRow] {
        &self.rows
    }

    pub fn get(&self, feature_id: &str) -> Option<&ComponentRow> {
        self.rows.iter().find(|r| r.feature_id == feature_id)
    }

    /// The feature IDs of each non-singleton component
    pub fn clusters(&self) -> HashMap<ComponentId, Vec<&str>> {
        let mut clusters: HashMap<ComponentId, Vec<&str>> = HashMap::new();
        for row in self.rows.iter().filter(|r| !r.is_singleton()) {
            clusters
                .entry(row.component_id)
                .or_default()
                .push(row.feature_id.as_str());
        }
        clusters
    }

    /// The number of components with more than one member
    pub fn component_count(&self) -> usize {
        self.clusters().len()
    }

    pub fn singleton_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_singleton()).count()
    }

    /// Write the table as tab-separated values with a header row.
    ///
    /// A missing precursor m/z is written as an empty field.
    pub fn write_tsv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(TABLE_HEADER)?;
        for row in self.rows.iter() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a table written by [`ComponentTable::write_tsv`]
    pub fn read_tsv<R: io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<ComponentRow>, csv::Error>>()?;
        Ok(Self::new(rows))
    }
}

impl std::ops::Index<usize> for ComponentTable {
    type Output = ComponentRow;

    fn index(&self, index: usize) -> &Self::Output {
        &self.rows[index]
    }
}

impl IntoIterator for ComponentTable {
    type Item = ComponentRow;

    type IntoIter = <std::vec::Vec<ComponentRow> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ComponentTable {
    type Item = &'a ComponentRow;

    type IntoIter = std::slice::Iter<'a, ComponentRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
