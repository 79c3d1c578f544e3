//! Drawing the next event of the SSE process.
//!
//! Rates are piecewise constant in time, so waiting times are exponential
//! within an epoch. A draw that would carry the process past the next epoch
//! boundary (or the stop horizon) is discarded: the process is moved to that
//! time, nothing fires, and the caller draws again under the new rates. A
//! draw within `epsilon` of a boundary is treated as landing on it.

use crate::evolution::epochs::{EpochIndex, EpochSchedule};
use crate::evolution::rates::{EpochRates, ReplicateRates, StateRates};
use crate::simulation::Lineage;
use rand::Rng;
use rand_distr::{Distribution, Exp};

/// An event acting on one live lineage, identified by its position in the
/// live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseEvent {
    /// Split into two daughters with the given states. Within-state
    /// speciation has `left == right == ` the parent state.
    Speciation {
        lineage: usize,
        left: usize,
        right: usize,
    },
    Extinction { lineage: usize },
    Transition { lineage: usize, to: usize },
    AncestorSampling { lineage: usize },
}

impl SseEvent {
    pub fn lineage(&self) -> usize {
        match *self {
            Self::Speciation { lineage, .. }
            | Self::Extinction { lineage }
            | Self::Transition { lineage, .. }
            | Self::AncestorSampling { lineage } => lineage,
        }
    }
}

/// Outcome of one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Draw {
    /// An event fires at `time`.
    Event { time: f64, event: SseEvent },
    /// The process reaches an epoch boundary at `time`; nothing fires.
    Boundary { time: f64 },
    /// The process reaches the stop horizon at `time`; nothing fires.
    Horizon { time: f64 },
    /// No event can fire and no boundary or horizon lies ahead.
    Stalled,
}

/// Chooses waiting times and events from the live lineages of one replicate.
#[derive(Debug, Clone, Copy)]
pub struct EventSelector<'a> {
    rates: &'a ReplicateRates,
    schedule: &'a EpochSchedule,
    epsilon: f64,
}

impl<'a> EventSelector<'a> {
    pub fn new(rates: &'a ReplicateRates, schedule: &'a EpochSchedule, epsilon: f64) -> Self {
        Self {
            rates,
            schedule,
            epsilon,
        }
    }

    /// Sum over live lineages of every event rate in `epoch`.
    pub fn total_rate(&self, epoch: EpochIndex, lineages: &[Lineage]) -> f64 {
        let table = self.rates.epoch(epoch);
        lineages
            .iter()
            .map(|lineage| table.state(lineage.state()).total())
            .sum()
    }

    /// Draw the next step of the process from time `now`.
    ///
    /// `horizon` is the stop time of an age-stopped replicate.
    pub fn next<R: Rng + ?Sized>(
        &self,
        now: f64,
        horizon: Option<f64>,
        lineages: &[Lineage],
        rng: &mut R,
    ) -> Draw {
        let epoch = self.schedule.epoch_at(now);
        let total = self.total_rate(epoch, lineages);

        let event_time = match Exp::new(total) {
            Ok(exp) if total > 0.0 => now + exp.sample(rng),
            _ => f64::INFINITY,
        };

        // The horizon wins a tie with a boundary: the replicate ends there.
        let limit = match (self.schedule.next_boundary(now), horizon) {
            (Some(b), Some(h)) if b < h - self.epsilon => Some(Draw::Boundary { time: b }),
            (_, Some(h)) => Some(Draw::Horizon { time: h }),
            (Some(b), None) => Some(Draw::Boundary { time: b }),
            (None, None) => None,
        };

        match limit {
            Some(
                draw @ (Draw::Boundary { time: limit_time } | Draw::Horizon { time: limit_time }),
            ) if event_time >= limit_time - self.epsilon => draw,
            _ if event_time.is_infinite() => Draw::Stalled,
            _ => Draw::Event {
                time: event_time,
                event: self.choose_event(self.rates.epoch(epoch), lineages, total, rng),
            },
        }
    }

    /// Pick a lineage with probability proportional to its total rate, then
    /// one of its events proportionally to the event rates.
    fn choose_event<R: Rng + ?Sized>(
        &self,
        table: &EpochRates,
        lineages: &[Lineage],
        total: f64,
        rng: &mut R,
    ) -> SseEvent {
        let target = rng.random::<f64>() * total;
        let mut cumulative = 0.0;
        let mut chosen = lineages.len() - 1;
        for (i, lineage) in lineages.iter().enumerate() {
            let rate = table.state(lineage.state()).total();
            if rate <= 0.0 {
                continue;
            }
            chosen = i;
            cumulative += rate;
            if target < cumulative {
                break;
            }
        }

        let lineage = &lineages[chosen];
        let rates = table.state(lineage.state());
        let target = rng.random::<f64>() * rates.total();
        pick_component(chosen, lineage.state(), rates, target)
    }
}

/// Walk the event rates of one state in a fixed order until `target` is
/// covered. Rounding leftovers fall on the last positive component.
fn pick_component(lineage: usize, state: usize, rates: &StateRates, target: f64) -> SseEvent {
    let mut components: Vec<(f64, SseEvent)> = Vec::with_capacity(
        3 + rates.cladogenesis.len() + rates.transitions.len(),
    );
    components.push((
        rates.speciation,
        SseEvent::Speciation {
            lineage,
            left: state,
            right: state,
        },
    ));
    for &(left, right, rate) in &rates.cladogenesis {
        components.push((rate, SseEvent::Speciation { lineage, left, right }));
    }
    components.push((rates.extinction, SseEvent::Extinction { lineage }));
    for &(to, rate) in &rates.transitions {
        components.push((rate, SseEvent::Transition { lineage, to }));
    }
    components.push((
        rates.ancestor_sampling,
        SseEvent::AncestorSampling { lineage },
    ));

    let mut cumulative = 0.0;
    let mut last_positive = components[0].1;
    for (rate, event) in components {
        if rate <= 0.0 {
            continue;
        }
        last_positive = event;
        cumulative += rate;
        if target < cumulative {
            return event;
        }
    }
    last_positive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::{Rate, RateModel};
    use crate::tree::NodeId;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn lineages(states: &[usize]) -> Vec<Lineage> {
        states
            .iter()
            .enumerate()
            .map(|(i, &s)| Lineage::new(i, s, 0.0, NodeId(i)))
            .collect()
    }

    #[test]
    fn test_total_rate_sums_lineages() {
        let model = RateModel::single_epoch(
            2,
            vec![
                Rate::speciation(0, 1.0),
                Rate::extinction(1, 0.5),
                Rate::transition(1, 0, 0.25),
            ],
        )
        .unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::single(1e-12);
        let selector = EventSelector::new(&rates, &schedule, 1e-12);

        let total = selector.total_rate(EpochIndex::PRESENT, &lineages(&[0, 0, 1]));
        assert!((total - 2.75).abs() < 1e-12);
    }

    #[test]
    fn test_only_possible_event_is_chosen() {
        let model = RateModel::single_epoch(2, vec![Rate::transition(1, 0, 2.0)]).unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::single(1e-12);
        let selector = EventSelector::new(&rates, &schedule, 1e-12);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);

        for _ in 0..50 {
            match selector.next(0.0, None, &lineages(&[0, 1, 0]), &mut rng) {
                Draw::Event { time, event } => {
                    assert!(time > 0.0);
                    assert_eq!(event, SseEvent::Transition { lineage: 1, to: 0 });
                }
                other => panic!("unexpected draw {other:?}"),
            }
        }
    }

    #[test]
    fn test_stalled_without_rates() {
        let model = RateModel::single_epoch(1, vec![]).unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::single(1e-12);
        let selector = EventSelector::new(&rates, &schedule, 1e-12);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);

        assert_eq!(
            selector.next(0.0, None, &lineages(&[0]), &mut rng),
            Draw::Stalled
        );
        assert_eq!(
            selector.next(0.0, Some(2.0), &lineages(&[0]), &mut rng),
            Draw::Horizon { time: 2.0 }
        );
    }

    #[test]
    fn test_boundary_before_horizon() {
        // No rate in the old epoch: the process must first reach the boundary
        let rates = vec![Rate::speciation(0, 1.0)];
        let model = RateModel::new(1, vec![1.0], rates).unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::new(&[1.0], 3.0, 1e-12);
        let selector = EventSelector::new(&rates, &schedule, 1e-12);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);

        assert_eq!(
            selector.next(0.0, Some(3.0), &lineages(&[0]), &mut rng),
            Draw::Boundary { time: 2.0 }
        );
    }

    #[test]
    fn test_event_never_crosses_boundary() {
        let model = RateModel::new(
            1,
            vec![1.0],
            vec![
                Rate::speciation(0, 5.0).in_epoch(EpochIndex::new(2).unwrap()),
                Rate::speciation(0, 5.0),
            ],
        )
        .unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::new(&[1.0], 2.0, 1e-12);
        let selector = EventSelector::new(&rates, &schedule, 1e-12);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);

        for _ in 0..200 {
            match selector.next(0.0, Some(2.0), &lineages(&[0]), &mut rng) {
                Draw::Event { time, .. } => assert!(time < 1.0),
                Draw::Boundary { time } => assert_eq!(time, 1.0),
                other => panic!("unexpected draw {other:?}"),
            }
        }
    }

    #[test]
    fn test_pick_component_order() {
        let rates = RateModel::single_epoch(
            2,
            vec![
                Rate::speciation(0, 1.0),
                Rate::extinction(0, 1.0),
                Rate::transition(0, 1, 1.0),
            ],
        )
        .unwrap()
        .for_sample(0);
        let table = rates.epoch(EpochIndex::PRESENT).state(0);

        assert!(matches!(
            pick_component(0, 0, table, 0.5),
            SseEvent::Speciation { left: 0, right: 0, .. }
        ));
        assert_eq!(
            pick_component(0, 0, table, 1.5),
            SseEvent::Extinction { lineage: 0 }
        );
        assert_eq!(
            pick_component(0, 0, table, 2.5),
            SseEvent::Transition { lineage: 0, to: 1 }
        );
        // Rounding overshoot lands on the last positive component
        assert_eq!(
            pick_component(0, 0, table, 3.0),
            SseEvent::Transition { lineage: 0, to: 1 }
        );
    }
}
