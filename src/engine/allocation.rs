use crate::model::*;

use super::EngineError;

/// A catalog room after its availability has been evaluated.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub room: &'a Room,
    pub available: bool,
}

/// Best-fit selection over evaluated candidates (in catalog order).
///
/// Returns the index of the smallest available room that seats
/// `number_of_people`, ties going to the earlier room. When nothing fits,
/// the error carries the smaller free rooms, largest first.
pub fn select_room(candidates: &[Candidate<'_>], number_of_people: u32) -> Result<usize, EngineError> {
    if candidates.is_empty() {
        return Err(EngineError::NoRoomAvailable {
            number_of_people,
            fallback: Vec::new(),
        });
    }
    if !candidates.iter().any(|c| c.available) {
        return Err(EngineError::AllRoomsBooked);
    }

    let best = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.available && c.room.capacity >= number_of_people)
        .min_by_key(|(_, c)| c.room.capacity);
    if let Some((idx, _)) = best {
        return Ok(idx);
    }

    let mut fallback: Vec<RoomSuggestion> = candidates
        .iter()
        .filter(|c| c.available && c.room.capacity < number_of_people)
        .map(|c| RoomSuggestion {
            name: c.room.name.clone(),
            capacity: c.room.capacity,
        })
        .collect();
    fallback.sort_by(|a, b| b.capacity.cmp(&a.capacity));

    Err(EngineError::NoRoomAvailable {
        number_of_people,
        fallback,
    })
}
