use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::geocode::Geocoder;
use crate::model::{Coords, ItineraryLeg};

/// A leg waiting for its start and end to be geocoded
#[derive(Debug, Clone, PartialEq)]
pub struct LegDraft {
    pub date: String,
    pub start: String,
    pub end: String,
    pub hours: f64,
}

/// Where a looked-up leg goes once it is ready
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Append,
    /// Replace `original`, last seen at `index`
    Replace { index: usize, original: ItineraryLeg },
}

/// A finished lookup, ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub ticket: u64,
    pub leg: ItineraryLeg,
    pub placement: Placement,
}

struct LookupRequest {
    ticket: u64,
    draft: LegDraft,
    placement: Placement,
}

/// Background geocoding. A single worker thread takes submissions in order,
/// so outcomes come back in submission order.
pub struct LookupQueue {
    requests: Option<Sender<LookupRequest>>,
    results: Receiver<LookupOutcome>,
    #[allow(dead_code)]
    handle: Option<JoinHandle<()>>,
    /// Outcomes produced without the worker, returned on the next poll
    fallback: Vec<LookupOutcome>,
    next_ticket: u64,
    pending: usize,
}

impl LookupQueue {
    pub fn spawn(geocoder: Box<dyn Geocoder>) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<LookupRequest>();
        let (res_tx, res_rx) = mpsc::channel::<LookupOutcome>();

        let handle = thread::Builder::new()
            .name("geocode".to_string())
            .spawn(move || {
                for request in req_rx {
                    let outcome = resolve_draft(geocoder.as_ref(), request);
                    if res_tx.send(outcome).is_err() {
                        break;
                    }
                }
                debug!("geocode worker stopped");
            });

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(error = %e, "failed to start geocode worker");
                None
            }
        };

        Self {
            requests: Some(req_tx),
            results: res_rx,
            handle,
            fallback: Vec::new(),
            next_ticket: 0,
            pending: 0,
        }
    }

    /// Queue a new leg for lookup, returning its ticket
    pub fn submit(&mut self, draft: LegDraft) -> u64 {
        self.submit_at(draft, Placement::Append)
    }

    pub fn submit_at(&mut self, draft: LegDraft, placement: Placement) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let request = LookupRequest { ticket, draft, placement };
        let sent = match &self.requests {
            Some(tx) => tx.send(request).map_err(|e| e.0),
            None => Err(request),
        };
        match sent {
            Ok(()) => {
                self.pending += 1;
                debug!(ticket, pending = self.pending, "lookup queued");
            }
            Err(request) => {
                // worker is gone, keep the leg without coordinates
                warn!(ticket, "geocode worker unavailable, storing leg without coordinates");
                self.requests = None;
                self.fallback.push(unresolved(request));
            }
        }
        ticket
    }

    /// Outcomes that have arrived since the last poll, without blocking
    pub fn poll(&mut self) -> Vec<LookupOutcome> {
        let mut out: Vec<LookupOutcome> = self.fallback.drain(..).collect();
        while let Ok(outcome) = self.results.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            out.push(outcome);
        }
        out
    }

    /// Block until the next outcome arrives or `timeout` passes
    pub fn wait_next(&mut self, timeout: Duration) -> Option<LookupOutcome> {
        if !self.fallback.is_empty() {
            return Some(self.fallback.remove(0));
        }
        let outcome = self.results.recv_timeout(timeout).ok()?;
        self.pending = self.pending.saturating_sub(1);
        Some(outcome)
    }

    pub fn pending(&self) -> usize {
        self.pending
    }
}

fn unresolved(request: LookupRequest) -> LookupOutcome {
    let d = request.draft;
    LookupOutcome {
        ticket: request.ticket,
        leg: ItineraryLeg::new(d.date, d.start, d.end, d.hours),
        placement: request.placement,
    }
}

fn lookup(geocoder: &dyn Geocoder, address: &str, ticket: u64) -> Option<Coords> {
    match geocoder.resolve(address) {
        Ok(Some(coords)) => Some(coords),
        Ok(None) => {
            warn!(ticket, address, "address not found, leaving coordinates unset");
            None
        }
        Err(e) => {
            warn!(ticket, address, error = %e, "geocoding failed, leaving coordinates unset");
            None
        }
    }
}

fn resolve_draft(geocoder: &dyn Geocoder, request: LookupRequest) -> LookupOutcome {
    let ticket = request.ticket;
    let start = lookup(geocoder, &request.draft.start, ticket);
    let end = lookup(geocoder, &request.draft.end, ticket);
    let mut outcome = unresolved(request);
    outcome.leg = outcome.leg.with_coords(start, end);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeocodeError;
    use std::collections::HashMap;

    const WAIT: Duration = Duration::from_secs(5);

    struct FakeGeocoder {
        places: HashMap<String, Coords>,
        delay: HashMap<String, Duration>,
    }

    impl FakeGeocoder {
        fn new(places: &[(&str, f64, f64)]) -> Self {
            Self {
                places: places
                    .iter()
                    .map(|(name, lat, lon)| (name.to_string(), Coords::new(*lat, *lon).unwrap()))
                    .collect(),
                delay: HashMap::new(),
            }
        }

        fn slow(mut self, name: &str, delay: Duration) -> Self {
            self.delay.insert(name.to_string(), delay);
            self
        }
    }

    impl Geocoder for FakeGeocoder {
        fn resolve(&self, address: &str) -> Result<Option<Coords>, GeocodeError> {
            if let Some(d) = self.delay.get(address) {
                thread::sleep(*d);
            }
            if address == "offline" {
                return Err(GeocodeError::Status(503));
            }
            Ok(self.places.get(address).copied())
        }
    }

    fn draft(start: &str, end: &str) -> LegDraft {
        LegDraft { date: "2024-06-01".to_string(), start: start.to_string(), end: end.to_string(), hours: 2.0 }
    }

    #[test]
    fn test_resolves_both_ends() {
        let mut queue = LookupQueue::spawn(Box::new(FakeGeocoder::new(&[("NYC", 40.7, -74.0), ("Boston", 42.36, -71.06)])));
        let ticket = queue.submit(draft("NYC", "Boston"));
        assert_eq!(queue.pending(), 1);

        let outcome = queue.wait_next(WAIT).unwrap();
        assert_eq!(outcome.ticket, ticket);
        assert_eq!(outcome.leg.start_coords, Coords::new(40.7, -74.0));
        assert_eq!(outcome.leg.end_coords, Coords::new(42.36, -71.06));
        assert_eq!(outcome.leg.hours, 2.0);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_failures_leave_coordinates_unset() {
        let mut queue = LookupQueue::spawn(Box::new(FakeGeocoder::new(&[("NYC", 40.7, -74.0)])));
        queue.submit(draft("offline", "Atlantis"));
        queue.submit(draft("NYC", "offline"));

        let first = queue.wait_next(WAIT).unwrap();
        assert_eq!(first.leg.start_coords, None);
        assert_eq!(first.leg.end_coords, None);
        assert_eq!(first.leg.start, "offline");

        let second = queue.wait_next(WAIT).unwrap();
        assert!(second.leg.start_coords.is_some());
        assert_eq!(second.leg.end_coords, None);
    }

    #[test]
    fn test_outcomes_follow_submission_order() {
        let geocoder = FakeGeocoder::new(&[("A", 1.0, 1.0), ("B", 2.0, 2.0)])
            .slow("A", Duration::from_millis(50));
        let mut queue = LookupQueue::spawn(Box::new(geocoder));
        let t0 = queue.submit(draft("A", "A"));
        let t1 = queue.submit(draft("B", "B"));

        let tickets: Vec<u64> = (0..2).filter_map(|_| queue.wait_next(WAIT)).map(|o| o.ticket).collect();
        assert_eq!(tickets, vec![t0, t1]);
    }

    #[test]
    fn test_placement_travels_with_the_outcome() {
        let mut queue = LookupQueue::spawn(Box::new(FakeGeocoder::new(&[("NYC", 40.7, -74.0)])));
        let original = ItineraryLeg::new("2024-06-01", "NYC", "Boston", 4.0);
        let placement = Placement::Replace { index: 3, original };
        queue.submit_at(draft("NYC", "Nowhere"), placement.clone());

        let outcome = queue.wait_next(WAIT).unwrap();
        assert_eq!(outcome.placement, placement);
        assert_eq!(outcome.leg.end, "Nowhere");
    }

    #[test]
    fn test_poll_does_not_block() {
        let geocoder = FakeGeocoder::new(&[]).slow("slow", Duration::from_millis(200));
        let mut queue = LookupQueue::spawn(Box::new(geocoder));
        queue.submit(draft("slow", "x"));
        assert!(queue.poll().is_empty());
        assert_eq!(queue.pending(), 1);
    }
}
