//! # Room Graph and Topology
//!
//! Turns the partition tree into an undirected room graph, then analyses it
//! from the start room: BFS distances, the critical path to the furthest
//! room, and the leaf rooms hanging off the rest of the graph.

use crate::generation::utils::{connect_rooms, room_index};
use crate::{BspNode, Corridor, Room};
use log::debug;
use pathfinding::prelude::bfs_reach;
use rand::{rngs::StdRng, Rng};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Rooms extracted from a partition tree plus the corridors joining them.
#[derive(Debug, Clone)]
pub struct RoomGraph {
    pub rooms: Vec<Room>,
    /// Planned connections; tiles are filled in by the corridor carver
    pub corridors: Vec<Corridor>,
}

impl RoomGraph {
    /// Collects the leaf rooms of `root` and joins every pair of sibling subtrees.
    ///
    /// For each internal node a random room is drawn from each child subtree
    /// and the two are linked with an L-shaped corridor whose orientation is
    /// also drawn at random.
    pub fn build(root: &BspNode, rng: &mut StdRng) -> Self {
        let mut graph = Self {
            rooms: root.rooms().into_iter().cloned().collect(),
            corridors: Vec::new(),
        };
        graph.connect_subtrees(root, rng);
        debug!(
            "Room graph: {} rooms, {} corridors",
            graph.rooms.len(),
            graph.corridors.len()
        );
        graph
    }

    fn connect_subtrees(&mut self, node: &BspNode, rng: &mut StdRng) {
        let (Some(left), Some(right)) = (&node.left, &node.right) else {
            return;
        };
        self.connect_subtrees(left, rng);
        self.connect_subtrees(right, rng);

        let left_ids = left.room_ids();
        let right_ids = right.room_ids();
        if left_ids.is_empty() || right_ids.is_empty() {
            return;
        }

        let from = left_ids[rng.gen_range(0..left_ids.len())];
        let to = right_ids[rng.gen_range(0..right_ids.len())];
        let horizontal_first = rng.gen_bool(0.5);

        connect_rooms(&mut self.rooms, from, to);
        self.corridors
            .push(Corridor::planned(from, to, horizontal_first));
    }
}

/// Result of analysing the room graph from the start room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub start: u32,
    /// BFS hop count from the start, for every reachable room
    pub distances: BTreeMap<u32, u32>,
    pub predecessors: BTreeMap<u32, u32>,
    /// Furthest room from the start
    pub terminus: u32,
    /// Rooms from start to terminus, inclusive
    pub critical_path: Vec<u32>,
    /// Rooms with exactly one connection, start excluded
    pub leaves: Vec<u32>,
}

impl Topology {
    /// Runs a breadth-first search over room connections from `start`.
    ///
    /// Ties for the furthest room go to the room discovered first.
    pub fn analyze(rooms: &[Room], start: u32) -> Self {
        let mut distances = BTreeMap::new();
        let mut predecessors = BTreeMap::new();
        let mut queue = VecDeque::new();

        distances.insert(start, 0);
        queue.push_back(start);
        let mut terminus = start;
        let mut furthest = 0;

        while let Some(current) = queue.pop_front() {
            let distance = distances[&current];
            if distance > furthest {
                furthest = distance;
                terminus = current;
            }

            let Some(index) = room_index(rooms, current) else {
                continue;
            };
            for &next in &rooms[index].connections {
                if distances.contains_key(&next) {
                    continue;
                }
                distances.insert(next, distance + 1);
                predecessors.insert(next, current);
                queue.push_back(next);
            }
        }

        let mut critical_path = vec![terminus];
        let mut cursor = terminus;
        while let Some(&previous) = predecessors.get(&cursor) {
            critical_path.push(previous);
            cursor = previous;
        }
        critical_path.reverse();

        let leaves = rooms
            .iter()
            .filter(|room| room.id != start && room.is_leaf())
            .map(|room| room.id)
            .collect();

        Self {
            start,
            distances,
            predecessors,
            terminus,
            critical_path,
            leaves,
        }
    }
}

/// Rooms reachable from `start` without entering any room in `blocked`.
///
/// `start` itself is always included.
pub fn reachable_rooms(rooms: &[Room], start: u32, blocked: &BTreeSet<u32>) -> BTreeSet<u32> {
    bfs_reach(start, |&id| {
        room_index(rooms, id)
            .map(|i| rooms[i].connections.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|next| !blocked.contains(next))
            .collect::<Vec<_>>()
    })
    .collect()
}
