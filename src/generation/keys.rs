//! # Keys and Progression Items
//!
//! Every room behind a locked door gets one key, hosted in a room that is
//! neither locked nor the entrance or exit. When reachability checking is
//! on, hosts the player can reach from the entrance without passing a lock
//! are preferred. Each host holds at most one key.

use crate::{
    config, random_free_tile, reachable_rooms, Level, PlacementQueue, PlacementRequest, Room,
    RoomType,
};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;

/// A key and the room it was left in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPlacement {
    pub unlocks_room: u32,
    pub host_room: u32,
}

/// Chooses key hosts for locked rooms.
#[derive(Debug, Clone, Copy)]
pub struct KeyPlacer {
    pub verify_reachability: bool,
}

impl KeyPlacer {
    pub fn new(verify_reachability: bool) -> Self {
        Self {
            verify_reachability,
        }
    }

    /// Emits one key request per locked room, at the host room's centre.
    ///
    /// Locked rooms left without a host are logged and skipped.
    pub fn place(
        &self,
        rooms: &[Room],
        locked: &BTreeSet<u32>,
        start: u32,
        queue: &mut PlacementQueue,
        rng: &mut StdRng,
    ) -> Vec<KeyPlacement> {
        let mut hosts: Vec<u32> = rooms
            .iter()
            .filter(|room| !locked.contains(&room.id))
            .filter(|room| !matches!(room.room_type, RoomType::Entrance | RoomType::Exit))
            .map(|room| room.id)
            .collect();
        let reachable = if self.verify_reachability {
            reachable_rooms(rooms, start, locked)
        } else {
            hosts.iter().copied().collect()
        };

        let mut placements = Vec::new();
        for &unlocks_room in locked {
            let preferred: Vec<u32> = hosts
                .iter()
                .copied()
                .filter(|id| reachable.contains(id))
                .collect();
            let host = match preferred.choose(rng) {
                Some(&host) => host,
                None => match hosts.choose(rng) {
                    Some(&host) => {
                        warn!(
                            "Key for room {} placed in room {}, which is only reachable through a lock",
                            unlocks_room, host
                        );
                        host
                    }
                    None => {
                        warn!("No room left to hold the key for room {}, skipping", unlocks_room);
                        continue;
                    }
                },
            };
            hosts.retain(|&id| id != host);

            let Some(room) = rooms.iter().find(|room| room.id == host) else {
                continue;
            };
            queue.push(PlacementRequest::Key {
                position: room.center(),
                unlocks_room,
            });
            placements.push(KeyPlacement {
                unlocks_room,
                host_room: host,
            });
        }

        debug!("Placed {} of {} keys", placements.len(), locked.len());
        placements
    }
}

/// Requests one guaranteed progression item on a free floor tile.
///
/// Each attempt draws a fresh room and tile; returns `None` with a warning
/// once `attempts` draws have failed.
pub fn place_progression_item(
    level: &Level,
    rooms: &[Room],
    attempts: u32,
    queue: &mut PlacementQueue,
    rng: &mut StdRng,
) -> Option<String> {
    for _ in 0..attempts {
        let Some(room) = rooms.choose(rng) else {
            break;
        };
        let Some(position) = random_free_tile(level, room, 1, rng, |pos| !queue.is_occupied(pos))
        else {
            continue;
        };
        let item_id = config::PROGRESSION_ITEMS.choose(rng)?.to_string();
        queue.push(PlacementRequest::Item {
            position,
            item_id: item_id.clone(),
        });
        return Some(item_id);
    }

    warn!(
        "No free floor tile for a progression item after {} attempts",
        attempts
    );
    None
}
