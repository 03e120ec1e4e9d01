// Analysis module - per-event selection pipeline
//
// Pipeline for one event:
//   EventRecord → EventEnergies (calibrate, readout check, sector sums)
//               → SignificanceScorer → SelectionCascade → CascadeDecision
//
// Counters, histograms and accumulators are filled from the decision by the
// per-worker SelectionContext.

pub mod accepted;
pub mod cascade;
pub mod counters;
pub mod energy;
pub mod event;
pub mod significance;

pub use accepted::AcceptedEvent;
pub use cascade::{BandCoverage, CascadeDecision, Classification, RejectStage, SelectionCascade};
pub use counters::{EventCounters, Stage};
pub use energy::{EventEnergies, MalformedEvent};
pub use event::{EventId, EventRecord, Hit, TriggerFlags};
pub use significance::{ScoreSite, SignificanceScorer, SignificanceScores, ZERO_RMS_SENTINEL};
