//! Pairing of concrete entity shapes with concrete DTO shapes.

use crate::record::project;
use crate::{Record, ShapeSide, TesseraError, TesseraResult};
use std::collections::HashMap;
use tracing::debug;

const ENTITY_SUFFIX: &str = "Entity";
const DTO_SUFFIX: &str = "Dto";

/// Bidirectional entity ↔ DTO shape table, built once per DAO.
///
/// When both sides hold a single shape the pairing is the identity pair.
/// Otherwise shapes are paired by name after stripping the `Entity` and
/// `Dto` suffixes (`Tph1Entity` ↔ `Tph1Dto`). Explicit override pairs take
/// precedence over the naming convention.
#[derive(Debug, Clone)]
pub struct ShapeResolver {
    forward: HashMap<&'static str, &'static str>,
    inverse: HashMap<&'static str, &'static str>,
}

impl ShapeResolver {
    /// Builds the table for entity type `E` and DTO type `D`.
    ///
    /// Every concrete shape on either side must end up with exactly one
    /// partner, otherwise construction fails with a configuration error.
    pub fn for_records<E: Record, D: Record>(
        overrides: &[(&'static str, &'static str)],
    ) -> TesseraResult<Self> {
        let entities = E::shapes();
        let dtos = D::shapes();
        let mut resolver = Self {
            forward: HashMap::with_capacity(entities.len()),
            inverse: HashMap::with_capacity(dtos.len()),
        };

        for &(entity, dto) in overrides {
            let entity = lookup(entities, entity, ShapeSide::Entity)?;
            let dto = lookup(dtos, dto, ShapeSide::Dto)?;
            resolver.insert(entity, dto)?;
        }

        if let ([entity], [dto]) = (entities, dtos) {
            if resolver.forward.is_empty() {
                resolver.insert(*entity, *dto)?;
            }
        } else {
            let mut by_stem = HashMap::new();
            for &dto in dtos.iter().filter(|d| !resolver.inverse.contains_key(*d)) {
                if let Some(previous) = by_stem.insert(stem(dto, DTO_SUFFIX), dto) {
                    return Err(TesseraError::configuration(format!(
                        "DTO shapes {previous} and {dto} share the name stem {}",
                        stem(dto, DTO_SUFFIX)
                    )));
                }
            }
            let unpaired: Vec<&'static str> = entities
                .iter()
                .copied()
                .filter(|e| !resolver.forward.contains_key(e))
                .collect();
            for entity in unpaired {
                let dto = by_stem.get(stem(entity, ENTITY_SUFFIX)).copied().ok_or_else(|| {
                    TesseraError::UnmatchedShape {
                        shape: entity.to_string(),
                        side: ShapeSide::Dto,
                    }
                })?;
                resolver.insert(entity, dto)?;
            }
        }

        if let Some(dto) = dtos.iter().find(|d| !resolver.inverse.contains_key(*d)) {
            return Err(TesseraError::UnmatchedShape {
                shape: (*dto).to_string(),
                side: ShapeSide::Entity,
            });
        }
        if let Some(entity) = entities.iter().find(|e| !resolver.forward.contains_key(*e)) {
            return Err(TesseraError::UnmatchedShape {
                shape: (*entity).to_string(),
                side: ShapeSide::Dto,
            });
        }

        debug!(pairs = resolver.forward.len(), "Resolved entity/DTO shape pairs");
        Ok(resolver)
    }

    fn insert(&mut self, entity: &'static str, dto: &'static str) -> TesseraResult<()> {
        if self.forward.contains_key(entity) || self.inverse.contains_key(dto) {
            return Err(TesseraError::configuration(format!(
                "shape pair {entity} <-> {dto} conflicts with an existing pair"
            )));
        }
        self.forward.insert(entity, dto);
        self.inverse.insert(dto, entity);
        Ok(())
    }

    /// Returns the DTO shape paired with an entity shape.
    pub fn dto_shape(&self, entity_shape: &str) -> TesseraResult<&'static str> {
        self.forward
            .get(entity_shape)
            .copied()
            .ok_or_else(|| TesseraError::UnmatchedShape {
                shape: entity_shape.to_string(),
                side: ShapeSide::Dto,
            })
    }

    /// Returns the entity shape paired with a DTO shape.
    pub fn entity_shape(&self, dto_shape: &str) -> TesseraResult<&'static str> {
        self.inverse
            .get(dto_shape)
            .copied()
            .ok_or_else(|| TesseraError::UnmatchedShape {
                shape: dto_shape.to_string(),
                side: ShapeSide::Entity,
            })
    }

    /// Returns true when more than one pair is registered.
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        self.forward.len() > 1
    }

    /// Iterates over `(entity, dto)` pairs in no particular order.
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.forward.iter().map(|(e, d)| (*e, *d))
    }

    /// Converts a stored entity to the DTO of its paired concrete shape.
    pub fn to_dto<E: Record, D: Record>(&self, entity: &E) -> TesseraResult<D> {
        project(entity, self.dto_shape(entity.shape())?)
    }

    /// Converts an incoming DTO to the entity of its paired concrete shape.
    pub fn to_entity<D: Record, E: Record>(&self, dto: &D) -> TesseraResult<E> {
        project(dto, self.entity_shape(dto.shape())?)
    }
}

fn stem<'a>(shape: &'a str, suffix: &str) -> &'a str {
    shape.strip_suffix(suffix).unwrap_or(shape)
}

fn lookup(
    shapes: &'static [&'static str],
    name: &str,
    side: ShapeSide,
) -> TesseraResult<&'static str> {
    shapes.iter().copied().find(|s| *s == name).ok_or_else(|| {
        TesseraError::configuration(format!("override names unknown {side} shape {name}"))
    })
}
