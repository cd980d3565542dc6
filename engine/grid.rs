// ========================================================================================
//
//                       THE SPARSE OBSERVATION GRID
//
// ========================================================================================
//
// The input is a handful of observations per entity scattered over an
// (entities × slots) grid. It is held in compressed sparse row form: one contiguous
// run of (slot, value) pairs per entity, sorted by slot, with repeated cells summed.
// The reducer materializes one dense row at a time into a reusable scratch buffer.

use crate::config::SlotLayout;
use crate::data::Observation;
use ndarray::Array1;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GridError {
    #[error(
        "Observation at entity {entity}, slot {slot} lies outside the {entities}x{slots} grid."
    )]
    ObservationOutsideGrid {
        entity: usize,
        slot: usize,
        entities: usize,
        slots: usize,
    },
    #[error("Entity {entity} is out of range for a grid of {entities} entities.")]
    EntityOutOfRange { entity: usize, entities: usize },
    #[error("Scratch row holds {found} values but the grid has {expected} slots.")]
    ScratchLength { expected: usize, found: usize },
}

#[derive(Debug, Clone)]
pub struct ObservationGrid {
    entities: usize,
    slots: usize,
    /// `row_offsets[e]..row_offsets[e + 1]` indexes the entries of entity `e`.
    row_offsets: Vec<usize>,
    slot_indices: Vec<usize>,
    values: Vec<f64>,
}

impl ObservationGrid {
    /// Builds the grid from zero-based observations.
    ///
    /// Observations for the same (entity, slot) cell are added together in input
    /// order. Coordinates outside the layout are rejected.
    pub fn from_observations(
        observations: &[Observation],
        layout: &SlotLayout,
    ) -> Result<Self, GridError> {
        let mut sorted: Vec<Observation> = observations.to_vec();
        // Stable, so duplicates keep their file order when summed.
        sorted.sort_by_key(|obs| (obs.entity, obs.slot));

        let mut row_offsets = vec![0usize; layout.entities + 1];
        let mut slot_indices = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut last_cell: Option<(usize, usize)> = None;

        for obs in &sorted {
            if obs.entity >= layout.entities || obs.slot >= layout.slots {
                return Err(GridError::ObservationOutsideGrid {
                    entity: obs.entity,
                    slot: obs.slot,
                    entities: layout.entities,
                    slots: layout.slots,
                });
            }
            let cell = (obs.entity, obs.slot);
            if last_cell == Some(cell) {
                if let Some(total) = values.last_mut() {
                    *total += obs.value;
                }
                continue;
            }
            last_cell = Some(cell);
            slot_indices.push(obs.slot);
            values.push(obs.value);
            row_offsets[obs.entity + 1] += 1;
        }

        for entity in 0..layout.entities {
            row_offsets[entity + 1] += row_offsets[entity];
        }

        Ok(Self {
            entities: layout.entities,
            slots: layout.slots,
            row_offsets,
            slot_indices,
            values,
        })
    }

    pub fn entity_count(&self) -> usize {
        self.entities
    }

    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// Number of stored (non-duplicate) cells.
    pub fn stored_cells(&self) -> usize {
        self.values.len()
    }

    /// Entities with at least one stored cell.
    pub fn populated_entities(&self) -> usize {
        self.row_offsets
            .windows(2)
            .filter(|bounds| bounds[1] > bounds[0])
            .count()
    }

    /// Iterates the stored `(slot, value)` pairs of one entity in slot order.
    pub fn entity_entries(
        &self,
        entity: usize,
    ) -> Result<impl Iterator<Item = (usize, f64)> + '_, GridError> {
        if entity >= self.entities {
            return Err(GridError::EntityOutOfRange {
                entity,
                entities: self.entities,
            });
        }
        let range = self.row_offsets[entity]..self.row_offsets[entity + 1];
        Ok(self.slot_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied()))
    }

    /// Overwrites `dense` with the full row of `entity`; absent cells are zero.
    pub fn fill_dense(&self, entity: usize, dense: &mut Array1<f64>) -> Result<(), GridError> {
        if dense.len() != self.slots {
            return Err(GridError::ScratchLength {
                expected: self.slots,
                found: dense.len(),
            });
        }
        let entries = self.entity_entries(entity)?;
        dense.fill(0.0);
        for (slot, value) in entries {
            dense[slot] = value;
        }
        Ok(())
    }

    pub fn dense_row(&self, entity: usize) -> Result<Array1<f64>, GridError> {
        let mut dense = Array1::zeros(self.slots);
        self.fill_dense(entity, &mut dense)?;
        Ok(dense)
    }
}
