use crate::VehicleId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Something that happens to the race at a point in simulated time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Runs the controller and physics of a vehicle over the step ending now.
    PeriodicUpdate(VehicleId),
    /// Checks every pair involving a vehicle which moved since the last check.
    CollisionCheck,
    /// Runs the lane change policy for a vehicle.
    LaneChangeDecision(VehicleId),
    /// Rolls for the elimination of a vehicle after a collision.
    EliminationRoll(VehicleId),
}

/// An event waiting in the queue.
#[derive(Clone, Copy, Debug)]
pub struct ScheduledEvent {
    /// The simulated time at which the event fires, in s.
    pub time: f64,
    /// Breaks ties between events at the same time, in order of scheduling.
    pub seq: u64,
    pub kind: EventKind,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    /// Reversed, so that the earliest event is at the top of a [BinaryHeap].
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A queue of events ordered by (time, sequence number).
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Default::default()
    }

    /// Schedules an event to fire at the given time.
    pub fn schedule(&mut self, time: f64, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledEvent { time, seq, kind });
    }

    /// Gets the time of the next event.
    pub fn next_time(&self) -> Option<f64> {
        self.heap.peek().map(|event| event.time)
    }

    /// Removes the next event, but only if it fires at exactly `time`.
    pub fn pop_at(&mut self, time: f64) -> Option<ScheduledEvent> {
        if self.next_time() == Some(time) {
            self.heap.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pops_in_time_then_sequence_order() {
        let mut queue = EventQueue::new();
        let id = VehicleId::default();
        queue.schedule(0.2, EventKind::CollisionCheck);
        queue.schedule(0.1, EventKind::PeriodicUpdate(id));
        queue.schedule(0.1, EventKind::CollisionCheck);
        queue.schedule(0.1, EventKind::EliminationRoll(id));
        assert_eq!(queue.len(), 4);

        let order = std::iter::from_fn(|| queue.next_time().and_then(|t| queue.pop_at(t)))
            .map(|event| (event.time, event.kind))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                (0.1, EventKind::PeriodicUpdate(id)),
                (0.1, EventKind::CollisionCheck),
                (0.1, EventKind::EliminationRoll(id)),
                (0.2, EventKind::CollisionCheck),
            ]
        );
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn pop_at_only_takes_the_current_instant() {
        let mut queue = EventQueue::new();
        queue.schedule(0.3, EventKind::CollisionCheck);
        assert!(queue.pop_at(0.1).is_none());
        assert_eq!(queue.next_time(), Some(0.3));
        assert!(queue.pop_at(0.3).is_some());
        assert!(queue.pop_at(0.3).is_none());
    }
}
