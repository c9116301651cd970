//! # Space Partitioner
//!
//! Recursively splits the floor into a binary tree of partitions. Every leaf
//! owns one room placed with random margins inside its partition.

use crate::{GenerationConfig, Position, Rect, Room};
use log::debug;
use rand::{rngs::StdRng, Rng};

/// Tiles kept free between a room and the edge of its partition.
///
/// Leaves a gap of at least two wall tiles between neighbouring rooms, so
/// footprints never touch.
const PARTITION_PADDING: u32 = 1;

/// A node of the partition tree.
#[derive(Debug, Clone)]
pub struct BspNode {
    pub bounds: Rect,
    pub left: Option<Box<BspNode>>,
    pub right: Option<Box<BspNode>>,
    /// Present only on leaves
    pub room: Option<Room>,
}

impl BspNode {
    fn leaf(bounds: Rect) -> Self {
        Self {
            bounds,
            left: None,
            right: None,
            room: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Rooms of this subtree in left-to-right leaf order.
    pub fn rooms(&self) -> Vec<&Room> {
        let mut rooms = Vec::new();
        self.collect_rooms(&mut rooms);
        rooms
    }

    fn collect_rooms<'a>(&'a self, out: &mut Vec<&'a Room>) {
        if let Some(room) = &self.room {
            out.push(room);
        }
        if let Some(left) = &self.left {
            left.collect_rooms(out);
        }
        if let Some(right) = &self.right {
            right.collect_rooms(out);
        }
    }

    /// Ids of the rooms in this subtree.
    pub fn room_ids(&self) -> Vec<u32> {
        self.rooms().iter().map(|room| room.id).collect()
    }

    pub fn leaf_count(&self) -> usize {
        match (&self.left, &self.right) {
            (None, None) => 1,
            (left, right) => {
                left.as_ref().map_or(0, |n| n.leaf_count())
                    + right.as_ref().map_or(0, |n| n.leaf_count())
            }
        }
    }
}

/// Builds partition trees for a floor.
#[derive(Debug, Clone)]
pub struct SpacePartitioner {
    pub depth: u32,
    pub min_room_size: u32,
    pub max_room_size: u32,
}

impl SpacePartitioner {
    pub fn new(depth: u32, min_room_size: u32, max_room_size: u32) -> Self {
        Self {
            depth,
            min_room_size,
            max_room_size: max_room_size.max(min_room_size),
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.bsp_depth, config.min_room_size, config.max_room_size)
    }

    /// Smallest partition that can still hold a room.
    pub fn min_partition(&self) -> u32 {
        self.min_room_size + 2 * PARTITION_PADDING
    }

    /// Partitions a `width` x `height` floor and places one room per leaf.
    ///
    /// Room ids are assigned in left-to-right leaf order starting at 0.
    pub fn partition(&self, width: u32, height: u32, rng: &mut StdRng) -> BspNode {
        let mut root = BspNode::leaf(Rect::new(0, 0, width, height));
        self.split(&mut root, self.depth, rng);

        let mut next_id = 0;
        self.place_rooms(&mut root, &mut next_id, rng);
        debug!(
            "Partitioned {}x{} floor into {} leaves ({} rooms)",
            width,
            height,
            root.leaf_count(),
            next_id
        );
        root
    }

    fn split(&self, node: &mut BspNode, depth: u32, rng: &mut StdRng) {
        if depth == 0 {
            return;
        }

        let bounds = node.bounds;
        let min = self.min_partition();
        let can_split_x = bounds.width >= min * 2;
        let can_split_y = bounds.height >= min * 2;

        let split_vertical = match (can_split_x, can_split_y) {
            (false, false) => return,
            (true, false) => true,
            (false, true) => false,
            (true, true) => {
                let ratio = bounds.width as f64 / bounds.height as f64;
                if ratio >= 1.25 {
                    true
                } else if ratio <= 0.8 {
                    false
                } else {
                    rng.gen_bool(0.5)
                }
            }
        };

        let (left, right) = if split_vertical {
            let cut = rng.gen_range(min..=bounds.width - min);
            (
                Rect::new(bounds.x, bounds.y, cut, bounds.height),
                Rect::new(bounds.x + cut as i32, bounds.y, bounds.width - cut, bounds.height),
            )
        } else {
            let cut = rng.gen_range(min..=bounds.height - min);
            (
                Rect::new(bounds.x, bounds.y, bounds.width, cut),
                Rect::new(bounds.x, bounds.y + cut as i32, bounds.width, bounds.height - cut),
            )
        };

        let mut left = BspNode::leaf(left);
        let mut right = BspNode::leaf(right);
        self.split(&mut left, depth - 1, rng);
        self.split(&mut right, depth - 1, rng);
        node.left = Some(Box::new(left));
        node.right = Some(Box::new(right));
    }

    fn place_rooms(&self, node: &mut BspNode, next_id: &mut u32, rng: &mut StdRng) {
        if node.is_leaf() {
            if let Some(room) = self.room_in(node.bounds, *next_id, rng) {
                node.room = Some(room);
                *next_id += 1;
            }
            return;
        }
        if let Some(left) = node.left.as_mut() {
            self.place_rooms(left, next_id, rng);
        }
        if let Some(right) = node.right.as_mut() {
            self.place_rooms(right, next_id, rng);
        }
    }

    /// Sizes a room inside `bounds`, clamped to the configured size range.
    ///
    /// Returns `None` when the partition is too small for a minimum room.
    fn room_in(&self, bounds: Rect, id: u32, rng: &mut StdRng) -> Option<Room> {
        let avail_w = bounds.width.checked_sub(2 * PARTITION_PADDING)?;
        let avail_h = bounds.height.checked_sub(2 * PARTITION_PADDING)?;
        if avail_w < self.min_room_size || avail_h < self.min_room_size {
            return None;
        }

        let width = rng.gen_range(self.min_room_size..=avail_w.min(self.max_room_size));
        let height = rng.gen_range(self.min_room_size..=avail_h.min(self.max_room_size));
        let x = bounds.x + PARTITION_PADDING as i32 + rng.gen_range(0..=(avail_w - width)) as i32;
        let y = bounds.y + PARTITION_PADDING as i32 + rng.gen_range(0..=(avail_h - height)) as i32;

        Some(Room::new(id, Position::new(x, y), width, height))
    }
}
