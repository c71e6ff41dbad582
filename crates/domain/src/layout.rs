//! Layout: the static building description the engine reasons over.
//!
//! A [`Layout`] bundles the area registry, the sensor registry, and the
//! symmetric [`AdjacencyGraph`]. It is built once from configuration and is
//! read-only afterwards; every reference between its parts is checked by
//! [`LayoutBuilder::build`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;

use crate::area::Area;
use crate::error::{OccupancyError, ValidationError};
use crate::id::{AreaId, SensorId};
use crate::sensor::Sensor;

/// Symmetric closure of a directed adjacency listing.
///
/// Declaring `A: [B]` makes `A` and `B` neighbours of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdjacencyGraph {
    edges: BTreeMap<AreaId, BTreeSet<AreaId>>,
}

impl AdjacencyGraph {
    /// Record that `a` and `b` are physically connected. Self-loops are ignored.
    pub fn connect(&mut self, a: AreaId, b: AreaId) {
        if a == b {
            return;
        }
        self.edges.entry(a.clone()).or_default().insert(b.clone());
        self.edges.entry(b).or_default().insert(a);
    }

    /// Neighbours of `area_id` in ascending id order.
    pub fn neighbors<'a>(&'a self, area_id: &AreaId) -> impl Iterator<Item = &'a AreaId> + 'a {
        self.edges.get(area_id).into_iter().flatten()
    }

    #[must_use]
    pub fn are_adjacent(&self, a: &AreaId, b: &AreaId) -> bool {
        self.edges.get(a).is_some_and(|set| set.contains(b))
    }

    /// Whether `goal` is reachable from `start` in at most `max_hops` edges.
    #[must_use]
    pub fn within_hops(&self, start: &AreaId, goal: &AreaId, max_hops: usize) -> bool {
        if start == goal {
            return true;
        }
        let mut visited: BTreeSet<&AreaId> = BTreeSet::from([start]);
        let mut queue: VecDeque<(&AreaId, usize)> = VecDeque::from([(start, 0)]);
        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_hops {
                continue;
            }
            for neighbor in self.neighbors(node) {
                if neighbor == goal {
                    return true;
                }
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        false
    }

    /// Every area mentioned by at least one edge.
    pub fn areas(&self) -> impl Iterator<Item = &AreaId> {
        self.edges.keys()
    }
}

/// Immutable building description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Layout {
    areas: BTreeMap<AreaId, Area>,
    sensors: BTreeMap<SensorId, Sensor>,
    adjacency: AdjacencyGraph,
}

impl Layout {
    /// Create a builder for constructing a [`Layout`].
    #[must_use]
    pub fn builder() -> LayoutBuilder {
        LayoutBuilder::default()
    }

    #[must_use]
    pub fn area(&self, id: &str) -> Option<&Area> {
        self.areas.get(id)
    }

    #[must_use]
    pub fn sensor(&self, id: &str) -> Option<&Sensor> {
        self.sensors.get(id)
    }

    pub fn areas(&self) -> impl Iterator<Item = &Area> {
        self.areas.values()
    }

    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.values()
    }

    #[must_use]
    pub fn adjacency(&self) -> &AdjacencyGraph {
        &self.adjacency
    }
}

/// Step-by-step builder for [`Layout`].
#[derive(Debug, Default)]
pub struct LayoutBuilder {
    areas: Vec<Area>,
    sensors: Vec<Sensor>,
    adjacency: Vec<(AreaId, AreaId)>,
}

impl LayoutBuilder {
    #[must_use]
    pub fn area(mut self, area: Area) -> Self {
        self.areas.push(area);
        self
    }

    #[must_use]
    pub fn sensor(mut self, sensor: Sensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    /// Declare `area_id` adjacent to each of `neighbors` (and vice versa).
    #[must_use]
    pub fn adjacent<I, A>(mut self, area_id: impl Into<AreaId>, neighbors: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AreaId>,
    {
        let area_id = area_id.into();
        for neighbor in neighbors {
            self.adjacency.push((area_id.clone(), neighbor.into()));
        }
        self
    }

    /// Consume the builder, check every cross-reference, and return a [`Layout`].
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] when:
    /// - an area or sensor fails its own validation
    /// - an id is declared twice ([`ValidationError::DuplicateId`])
    /// - a sensor or adjacency entry names an undeclared area
    ///   ([`ValidationError::UnknownArea`])
    pub fn build(self) -> Result<Layout, OccupancyError> {
        let mut areas = BTreeMap::new();
        for area in self.areas {
            area.validate()?;
            if areas.contains_key(&area.id) {
                return Err(ValidationError::DuplicateId(area.id.to_string()).into());
            }
            areas.insert(area.id.clone(), area);
        }

        let mut sensors = BTreeMap::new();
        for sensor in self.sensors {
            sensor.validate()?;
            if sensors.contains_key(&sensor.id) {
                return Err(ValidationError::DuplicateId(sensor.id.to_string()).into());
            }
            for area_id in &sensor.area_ids {
                if !areas.contains_key(area_id) {
                    return Err(ValidationError::UnknownArea {
                        area_id: area_id.to_string(),
                        referenced_by: format!("sensor {}", sensor.id),
                    }
                    .into());
                }
            }
            sensors.insert(sensor.id.clone(), sensor);
        }

        let mut adjacency = AdjacencyGraph::default();
        for (a, b) in self.adjacency {
            for (id, other) in [(&a, &b), (&b, &a)] {
                if !areas.contains_key(id) {
                    return Err(ValidationError::UnknownArea {
                        area_id: id.to_string(),
                        referenced_by: format!("adjacency {other}"),
                    }
                    .into());
                }
            }
            adjacency.connect(a, b);
        }

        Ok(Layout {
            areas,
            sensors,
            adjacency,
        })
    }
}
