//! Door resolution protocol.
//!
//! Decides what a door slot becomes from what the scene reports at its
//! door-side check point:
//! - Found door geometry => Doorway (both rooms opened the same spot)
//! - Found wall geometry => Wall
//! - Found nothing       => Door
//!
//! Occupants are read in the order the scene returns them and the last
//! matching tag wins, so a wall seen after a door downgrades to Wall.

use crate::constants::{DOOR_TAG, WALL_TAG};
use crate::room::DoorState;
use crate::scene::Occupant;

/// Resolve a slot from the occupants found at its door point
pub fn resolve(occupants: &[Occupant]) -> DoorState {
    let mut state = DoorState::Door;
    for occupant in occupants {
        if occupant.tag == DOOR_TAG {
            state = DoorState::Doorway;
        } else if occupant.tag == WALL_TAG {
            state = DoorState::Wall;
        }
    }
    state
}
